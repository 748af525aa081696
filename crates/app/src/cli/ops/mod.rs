pub mod keygen;
pub mod run;
pub mod version;

pub use keygen::Keygen;
pub use run::Run;
pub use version::Version;

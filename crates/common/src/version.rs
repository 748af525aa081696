use std::fmt;

use serde::Serialize;

/// Build metadata stamped into a binary by its build script
///
/// Construct it with [`build_info!`](crate::build_info) from the crate that
/// owns the build script, so the `env!` lookups resolve against that crate's
/// compile-time environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub build_profile: &'static str,
    pub build_features: &'static str,
    pub version: &'static str,
    pub build_timestamp: &'static str,
    pub rust_version: &'static str,
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "version:   {}", self.version)?;
        writeln!(f, "profile:   {}", self.build_profile)?;
        writeln!(f, "features:  {}", self.build_features)?;
        writeln!(f, "built at:  {}", self.build_timestamp)?;
        write!(f, "toolchain: {}", self.rust_version)
    }
}

/// Collect [`BuildInfo`] from `BUILD_PROFILE`, `BUILD_FEATURES`,
/// `REPO_VERSION`, `BUILD_TIMESTAMP` and `RUST_VERSION`
#[macro_export]
macro_rules! build_info {
    () => {
        $crate::version::BuildInfo {
            build_profile: env!("BUILD_PROFILE"),
            build_features: env!("BUILD_FEATURES"),
            version: env!("REPO_VERSION"),
            build_timestamp: env!("BUILD_TIMESTAMP"),
            rust_version: env!("RUST_VERSION"),
        }
    };
}

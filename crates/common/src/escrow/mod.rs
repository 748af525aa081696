//! The escrow protocol
//!
//! Three kinds of actor take part, each spawned as its own task:
//!
//! - the [`Depositor`] generates the secret, splits it and seals one share
//!   packet per agent,
//! - every [`EscrowAgent`] keeps its envelope in a single-slot vault until
//!   the authority asks for it, then re-seals the packet for the authority,
//! - the [`RecoveryAuthority`] waits for the deposit to complete, broadcasts
//!   the authorization, collects `t` packets and reconstructs the secret.
//!
//! Actors never call each other. Every interaction is a message on an
//! unbounded FIFO channel, and every receive carries a deadline so a missing
//! peer surfaces as a timeout instead of a hang.
//!
//! ```text
//! Depositor --Deposit(envelope)--> Agent i --Envelope--> Authority
//!     |                              ^                      |
//!     +----DepositNotice------------------------------------+
//!                                    +------Authorize-------+
//! ```

mod agent;
mod authority;
mod config;
mod depositor;
mod messages;
mod packet;
mod session;
mod vault;

pub use agent::{AgentError, AgentState, EscrowAgent};
pub use authority::{AuthorityError, ReconstructionSet, RecoveryAuthority, RecoveryOutcome};
pub use config::{ConfigError, EscrowConfig};
pub use depositor::{Depositor, DepositorError};
pub use messages::{
    channel, AgentHandle, AgentMessage, AuthorityHandle, ChannelError, DepositNotice, Inbox,
};
pub use packet::{format_packet, parse_packet, PacketError};
pub use session::{EscrowSession, SessionError, SessionReport};
pub use vault::{Vault, VaultError};

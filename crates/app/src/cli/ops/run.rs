use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use common::escrow::{EscrowSession, SessionError, SessionReport};
use common::keystore::{KeyRegistry, ProvisioningError};
use common::reference::FileReferenceStore;
use escrow_app::state::{AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Run {
    /// Number of escrow agents (default from config)
    #[arg(long)]
    pub agents: Option<usize>,

    /// Shares needed to recover the secret (default from config)
    #[arg(long)]
    pub threshold: Option<usize>,

    /// Where to write the verification copy of the secret (default from config)
    #[arg(long)]
    pub reference: Option<PathBuf>,

    /// Override the receive deadline, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("key material unavailable: {0}")]
    Provisioning(#[from] ProvisioningError),

    #[error("escrow session failed: {0}")]
    Session(#[from] SessionError),

    #[error("secret was not recovered\n{0}")]
    Unverified(Box<SessionReport>),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Run {
    type Error = RunError;
    type Output = SessionReport;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load_or_init(ctx.config_path.clone())?;

        let mut config = state.config.escrow_config();
        if let Some(agents) = self.agents {
            config.agents = agents;
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config = config.with_receive_timeout(Duration::from_millis(timeout_ms));
        }
        let reference_path = self
            .reference
            .clone()
            .unwrap_or_else(|| state.reference_path.clone());

        if !KeyRegistry::exists(&state.public_key_dir, &state.private_key_dir) {
            tracing::info!("no keys found, provisioning {} agents", config.agents);
            KeyRegistry::provision(config.agents, &state.public_key_dir, &state.private_key_dir)?;
        }
        let registry =
            KeyRegistry::load(config.agents, &state.public_key_dir, &state.private_key_dir)?;

        let reference = Arc::new(FileReferenceStore::new(reference_path));
        let report = EscrowSession::new(config, registry, reference).run().await?;

        if report.is_verified() {
            Ok(report)
        } else {
            Err(RunError::Unverified(Box::new(report)))
        }
    }
}

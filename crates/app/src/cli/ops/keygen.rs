use clap::Args;

use common::keystore::{KeyRegistry, ProvisioningError};
use escrow_app::state::{AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Keygen {
    /// Number of escrow agents to provision keys for (default from config)
    #[arg(long)]
    pub agents: Option<usize>,

    /// Overwrite keys that are already provisioned
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum KeygenError {
    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("keys already provisioned in {0}, pass --force to replace them")]
    AlreadyProvisioned(String),

    #[error("provisioning failed: {0}")]
    Provisioning(#[from] ProvisioningError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Keygen {
    type Error = KeygenError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load_or_init(ctx.config_path.clone())?;
        let agents = self.agents.unwrap_or(state.config.agents);

        if !self.force && KeyRegistry::exists(&state.public_key_dir, &state.private_key_dir) {
            return Err(KeygenError::AlreadyProvisioned(
                state.public_key_dir.display().to_string(),
            ));
        }

        KeyRegistry::provision(agents, &state.public_key_dir, &state.private_key_dir)?;

        Ok(format!(
            "provisioned keys for {} agents, the authority and the depositor\n  public:  {}\n  private: {}",
            agents,
            state.public_key_dir.display(),
            state.private_key_dir.display()
        ))
    }
}

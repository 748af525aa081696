use crate::crypto::Envelope;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VaultError {
    #[error("vault already holds an envelope")]
    Occupied,
    #[error("vault is empty")]
    Empty,
    #[error("vault contents were already released")]
    Released,
}

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Empty,
    Sealed(Envelope),
    Released,
}

/// An escrow agent's single-slot store: written once, read once
#[derive(Debug, Default)]
pub struct Vault {
    slot: Slot,
}

impl Vault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the agent's envelope; a vault never accepts a second one
    pub fn store(&mut self, envelope: Envelope) -> Result<(), VaultError> {
        match self.slot {
            Slot::Empty => {
                self.slot = Slot::Sealed(envelope);
                Ok(())
            }
            Slot::Sealed(_) => Err(VaultError::Occupied),
            Slot::Released => Err(VaultError::Released),
        }
    }

    /// Hand out the stored envelope, leaving the vault permanently spent
    pub fn take(&mut self) -> Result<Envelope, VaultError> {
        match std::mem::replace(&mut self.slot, Slot::Released) {
            Slot::Sealed(envelope) => Ok(envelope),
            Slot::Empty => {
                self.slot = Slot::Empty;
                Err(VaultError::Empty)
            }
            Slot::Released => Err(VaultError::Released),
        }
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self.slot, Slot::Sealed(_))
    }
}

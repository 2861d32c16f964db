use std::sync::Mutex;
use tracing::info;

use crate::error::AppError;
use crate::models::Amount;

/// Moves funds out of the pool on the external ledger. Called while the
/// withdrawal is still uncommitted; an error aborts the withdrawal.
pub trait PayoutTransfer: Send + Sync {
    fn transfer(&self, amount: Amount, memo: &str) -> Result<(), AppError>;
}

/// Accepts every transfer without side effects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransfer;

impl PayoutTransfer for NoopTransfer {
    fn transfer(&self, amount: Amount, memo: &str) -> Result<(), AppError> {
        info!("Transfer of {} accepted ({})", amount, memo);
        Ok(())
    }
}

/// Keeps every requested transfer and can be told to reject the next ones.
#[derive(Debug, Default)]
pub struct RecordingTransfer {
    transfers: Mutex<Vec<(Amount, String)>>,
    failure: Mutex<Option<AppError>>,
}

impl RecordingTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, error: Option<AppError>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = error;
    }

    pub fn transfers(&self) -> Vec<(Amount, String)> {
        self.transfers.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl PayoutTransfer for RecordingTransfer {
    fn transfer(&self, amount: Amount, memo: &str) -> Result<(), AppError> {
        if let Some(error) = self.failure.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(error);
        }
        self.transfers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((amount, memo.to_string()));
        Ok(())
    }
}

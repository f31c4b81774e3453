//! Error kinds surfaced by the ledger operations

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Payment gateway error: {0}")]
    Gateway(String),
    #[error("Payment verification failed: {0}")]
    VerificationFailed(String),
    #[error("Submitted receipt number does not match the gateway receipt")]
    ReceiptMismatch,
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Atomic operation aborted: {0}")]
    Aborted(String),
    #[error("A transaction with reference {0} has already been recorded")]
    DuplicateReference(String),
    #[error("Caller is not allowed to {0}")]
    Forbidden(String),
    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("Codec error: {0}")]
    Codec(String),
}

impl LedgerError {
    /// Outcomes a teller is expected to correct and re-enter.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LedgerError::ReceiptMismatch | LedgerError::VerificationFailed(_)
        )
    }

    /// The operation did not happen and may be issued again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Aborted(_))
    }
}

impl From<minicbor::decode::Error> for LedgerError {
    fn from(value: minicbor::decode::Error) -> Self {
        LedgerError::Codec(value.to_string())
    }
}

impl<E: std::fmt::Display> From<minicbor::encode::Error<E>> for LedgerError {
    fn from(value: minicbor::encode::Error<E>) -> Self {
        LedgerError::Codec(value.to_string())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

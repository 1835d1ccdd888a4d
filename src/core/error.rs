use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Invalid object id '{0}'")]
    InvalidObjectId(String),

    #[error("Transaction failed, rolled back: {source}")]
    TransactionFailed {
        #[source]
        source: Box<StoreError>,
    },

    #[error("Write conflict on '{0}'")]
    WriteConflict(String),

    #[error("Duplicate key: {field} = {value} in '{collection}'")]
    DuplicateKey {
        collection: String,
        field: String,
        value: String,
    },

    #[error("Field '{0}' is immutable")]
    ImmutableField(String),

    #[error("Transaction marked rollback-only: {0}")]
    RollbackOnly(String),

    #[error("No active transaction")]
    NoActiveTransaction,

    #[error("Transaction already in progress")]
    TransactionInProgress,

    #[error("Session {0} has ended")]
    SessionEnded(u64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Member with email '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    /// Wraps a failure that ended a transaction.
    ///
    /// An error that is already a `TransactionFailed` is returned as is, so
    /// callers never see the kind nested inside itself.
    pub fn transaction_failed(cause: StoreError) -> Self {
        match cause {
            StoreError::TransactionFailed { .. } => cause,
            other => StoreError::TransactionFailed {
                source: Box::new(other),
            },
        }
    }

    pub fn is_transaction_failure(&self) -> bool {
        matches!(self, StoreError::TransactionFailed { .. })
    }

    /// The original error behind a `TransactionFailed`, or `self`.
    pub fn root_cause(&self) -> &StoreError {
        match self {
            StoreError::TransactionFailed { source } => source.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_failed_wraps_once() {
        let err = StoreError::transaction_failed(StoreError::Store("boom".into()));
        let again = StoreError::transaction_failed(err);

        assert!(again.is_transaction_failure());
        match again {
            StoreError::TransactionFailed { source } => {
                assert!(matches!(*source, StoreError::Store(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_message_mentions_rollback() {
        let err = StoreError::transaction_failed(StoreError::WriteConflict("members".into()));
        let message = err.to_string();
        assert!(message.contains("Transaction failed, rolled back"));
        assert!(matches!(err.root_cause(), StoreError::WriteConflict(_)));
    }

    #[test]
    fn test_poisoned_lock_maps_to_lock() {
        let lock = std::sync::Arc::new(std::sync::Mutex::new(0));
        let poisoner = std::sync::Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        let err: StoreError = lock.lock().unwrap_err().into();
        assert!(matches!(err, StoreError::Lock(_)));
        assert!(err.to_string().starts_with("Lock error"));
    }
}

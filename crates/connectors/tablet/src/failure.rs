use tracing::warn;
use tundra_common::{Error, Result, RowError};

/// Decides what happens to rejected operations and unmappable records.
///
/// `on_failure` receives the row errors collected since the last check as
/// one batch, in no particular order. Returning an error fails the write or
/// flush that surfaced them.
pub trait FailureHandler: Send + Sync {
    fn on_failure(&mut self, failures: Vec<RowError>) -> Result<()>;

    fn on_type_mismatch(&mut self, error: Error) -> Result<()> {
        Err(error)
    }
}

/// Treats every failure as fatal.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFailureHandler;

impl FailureHandler for DefaultFailureHandler {
    fn on_failure(&mut self, failures: Vec<RowError>) -> Result<()> {
        Err(Error::row_mutation(failures))
    }
}

/// Logs failures and keeps going.
#[derive(Debug, Default)]
pub struct LoggingFailureHandler {
    rows_dropped: usize,
    records_skipped: usize,
}

impl LoggingFailureHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows_dropped(&self) -> usize {
        self.rows_dropped
    }

    pub fn records_skipped(&self) -> usize {
        self.records_skipped
    }
}

impl FailureHandler for LoggingFailureHandler {
    fn on_failure(&mut self, failures: Vec<RowError>) -> Result<()> {
        for failure in failures.iter() {
            warn!("Dropping rejected operation: {}", failure);
        }
        self.rows_dropped += failures.len();
        Ok(())
    }

    fn on_type_mismatch(&mut self, error: Error) -> Result<()> {
        warn!("Skipping record: {}", error);
        self.records_skipped += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tundra_common::{Operation, PartialRow, RowErrorKind};

    fn failure() -> RowError {
        RowError::new(
            Operation::insert("events", PartialRow::new().with("id", 1i64)),
            RowErrorKind::AlreadyPresent,
            "key already present",
        )
    }

    #[test]
    fn default_handler_is_fatal() {
        let mut handler = DefaultFailureHandler;
        match handler.on_failure(vec![failure(), failure()]) {
            Err(Error::RowMutation { count, errors, .. }) => {
                assert_eq!(count, 2);
                assert_eq!(errors.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        let err = handler.on_type_mismatch(Error::TypeMismatch("bad".into())).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
    }

    #[test]
    fn logging_handler_counts_and_continues() {
        let mut handler = LoggingFailureHandler::new();
        handler.on_failure(vec![failure(), failure(), failure()]).unwrap();
        handler.on_type_mismatch(Error::TypeMismatch("bad".into())).unwrap();
        assert_eq!(handler.rows_dropped(), 3);
        assert_eq!(handler.records_skipped(), 1);
    }
}

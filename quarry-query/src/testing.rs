//! Test support: a recording mock executor.
//!
//! Enabled for this crate's tests and, behind the `testing` feature, for
//! downstream crates.

use std::collections::VecDeque;

use parking_lot::Mutex;
use thiserror::Error;

use crate::sql::CompiledStatement;
use crate::traits::{BoxFuture, Executor};
use crate::value::Record;

/// Error produced by [`MockExecutor`] when a failure is scripted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("mock executor failure: {0}")]
pub struct MockError(pub String);

/// Executor that records every statement and replays scripted responses.
///
/// Responses are consumed in order; once exhausted every statement returns no
/// rows.
#[derive(Debug, Default)]
pub struct MockExecutor {
    statements: Mutex<Vec<CompiledStatement>>,
    responses: Mutex<VecDeque<Result<Vec<Record>, MockError>>>,
}

impl MockExecutor {
    /// An executor with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the rows for the next statement.
    pub fn with_rows(self, rows: Vec<Record>) -> Self {
        self.push_rows(rows);
        self
    }

    /// Script a failure for the next statement.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.responses.lock().push_back(Err(MockError(message.into())));
        self
    }

    /// Script the rows for the next statement.
    pub fn push_rows(&self, rows: Vec<Record>) {
        self.responses.lock().push_back(Ok(rows));
    }

    /// Statements executed so far.
    pub fn statements(&self) -> Vec<CompiledStatement> {
        self.statements.lock().clone()
    }

    /// SQL text of the statements executed so far.
    pub fn sql(&self) -> Vec<String> {
        self.statements.lock().iter().map(|s| s.text.clone()).collect()
    }

    /// Number of statements executed.
    pub fn round_trips(&self) -> usize {
        self.statements.lock().len()
    }
}

impl Executor for MockExecutor {
    type Error = MockError;

    fn query<'a>(&'a self, statement: &'a CompiledStatement) -> BoxFuture<'a, Result<Vec<Record>, Self::Error>> {
        self.statements.lock().push(statement.clone());
        let response = self.responses.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()));
        Box::pin(async move { response })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::Params;

    #[tokio::test]
    async fn test_mock_records_and_replays() {
        let mock = MockExecutor::new()
            .with_rows(vec![Record::new().set("id", 1)])
            .with_error("boom");
        let statement = CompiledStatement::new("SELECT 1", Params::new());

        let rows = mock.query(&statement).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(mock.query(&statement).await.unwrap_err(), MockError("boom".into()));
        assert!(mock.query(&statement).await.unwrap().is_empty());
        assert_eq!(mock.round_trips(), 3);
        assert_eq!(mock.sql()[0], "SELECT 1");
    }
}

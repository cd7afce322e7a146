//! Query-execution boundary over the reading store

use async_trait::async_trait;

use crate::error::Result;

/// One result row as a loosely typed mapping
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Named text parameter, e.g. `@devId`
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParam {
    pub name: String,
    pub value: String,
}

impl QueryParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A store that evaluates queries against the `c` collection alias.
///
/// When `partition_key` is set the query only sees rows of that partition,
/// otherwise it runs across all partitions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn execute(
        &self,
        query: &str,
        params: &[QueryParam],
        partition_key: Option<&str>,
    ) -> Result<Vec<Row>>;

    /// Check that the store is reachable
    async fn ping(&self) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod stub {
    //! Canned-response store for handler and query tests

    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// Arguments of one `execute` call
    #[derive(Debug, Clone)]
    pub struct Call {
        pub query: String,
        pub params: Vec<QueryParam>,
        pub partition_key: Option<String>,
    }

    #[derive(Default)]
    pub struct StubStore {
        rows: Vec<Row>,
        failure: Option<String>,
        calls: Mutex<Vec<Call>>,
    }

    impl StubStore {
        pub fn with_rows(rows: Vec<serde_json::Value>) -> Self {
            Self {
                rows: rows
                    .into_iter()
                    .map(|v| v.as_object().cloned().unwrap())
                    .collect(),
                ..Default::default()
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                failure: Some(message.to_string()),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DocumentStore for StubStore {
        async fn execute(
            &self,
            query: &str,
            params: &[QueryParam],
            partition_key: Option<&str>,
        ) -> Result<Vec<Row>> {
            self.calls.lock().unwrap().push(Call {
                query: query.to_string(),
                params: params.to_vec(),
                partition_key: partition_key.map(str::to_string),
            });
            match &self.failure {
                Some(msg) => Err(AppError::Upstream(msg.clone())),
                None => Ok(self.rows.clone()),
            }
        }

        async fn ping(&self) -> Result<()> {
            match &self.failure {
                Some(msg) => Err(AppError::Upstream(msg.clone())),
                None => Ok(()),
            }
        }
    }
}

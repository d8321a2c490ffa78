//! Read/append access to the subscriber sheet.
//!
//! The sheet is a header row followed by one row per subscriber, five columns
//! in [`SubscriberRecord::to_row`] order. Uniqueness of the user id column is
//! not enforced here: callers check with [`SubscriberStore::find_by_user_id`]
//! before calling [`SubscriberStore::append`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::domain::subscriber_record::SubscriberRecord;
use crate::domain::user_id::UserId;

const USER_ID_COLUMN: usize = 0;

pub type Row = Vec<Value>;

/// Authenticated client of a remote append-only table addressed by ranges.
#[async_trait::async_trait]
pub trait TabularStore: Send + Sync {
    /// All rows of `range`, header row included.
    async fn read_range(&self, range: &str) -> Result<Vec<Row>, StoreError>;

    /// Inserts `row` after the last row of `range`, never overwriting existing rows.
    async fn append_row(&self, range: &str, row: Row) -> Result<(), StoreError>;
}

#[derive(thiserror::Error)]
pub enum StoreError {
    #[error("Failed to reach the subscriber sheet.")]
    Request(#[from] reqwest::Error),
    #[error("The subscriber sheet did not answer within {0:?}.")]
    Timeout(Duration),
    #[error("The subscriber sheet rejected the request: {0}")]
    Rejected(String),
}

impl std::fmt::Debug for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::error_chain_fmt(self, f)
    }
}

pub struct SubscriberStore {
    client: Arc<dyn TabularStore>,
    range: String,
    timeout: Duration,
}

impl SubscriberStore {
    pub fn new(client: Arc<dyn TabularStore>, range: String, timeout: Duration) -> Self {
        Self {
            client,
            range,
            timeout,
        }
    }

    #[tracing::instrument(
        name = "Looking up a subscriber in the sheet",
        skip(self),
        fields(user_id = %user_id, range = %self.range)
    )]
    pub async fn find_by_user_id(&self, user_id: &UserId) -> Result<bool, StoreError> {
        let rows = tokio::time::timeout(self.timeout, self.client.read_range(&self.range))
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))??;

        if rows.is_empty() {
            tracing::info!("The subscriber sheet has no rows yet");
        }

        let user_id: &str = user_id.as_ref();
        // Row 0 is the header.
        let found = rows
            .iter()
            .skip(1)
            .filter_map(|row| row.get(USER_ID_COLUMN).and_then(Value::as_str))
            .any(|cell| cell == user_id);

        Ok(found)
    }

    #[tracing::instrument(
        name = "Appending a subscriber to the sheet",
        skip(self, record),
        fields(user_id = %record.user_id, range = %self.range)
    )]
    pub async fn append(&self, record: &SubscriberRecord) -> Result<(), StoreError> {
        tokio::time::timeout(
            self.timeout,
            self.client.append_row(&self.range, record.to_row()),
        )
        .await
        .map_err(|_| StoreError::Timeout(self.timeout))?
    }
}

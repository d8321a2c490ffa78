use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::domain::display_name::DisplayName;
use crate::domain::subscriber_status::SubscriberStatus;
use crate::domain::user_id::UserId;

/// One row of the subscriber sheet.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberRecord {
    pub user_id: UserId,
    pub display_name: DisplayName,
    pub picture_url: String,
    pub join_date: DateTime<Utc>,
    pub status: SubscriberStatus,
}

impl SubscriberRecord {
    /// Record for a user subscribing right now.
    pub fn new(user_id: UserId, display_name: DisplayName, picture_url: String) -> Self {
        Self {
            user_id,
            display_name,
            picture_url,
            join_date: Utc::now(),
            status: SubscriberStatus::Subscribed,
        }
    }

    /// Cells in sheet column order: user id, display name, picture url, join date, status.
    pub fn to_row(&self) -> Vec<Value> {
        vec![
            Value::String(self.user_id.to_string()),
            Value::String(self.display_name.to_string()),
            Value::String(self.picture_url.clone()),
            Value::String(self.join_date.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::String(String::from(self.status.as_ref())),
        ]
    }
}

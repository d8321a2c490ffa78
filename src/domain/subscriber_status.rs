/// Status column of a subscriber row. Rows are only ever appended, so the
/// bot never writes anything but `subscribed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriberStatus {
    Subscribed,
}

impl AsRef<str> for SubscriberStatus {
    fn as_ref(&self) -> &str {
        match self {
            SubscriberStatus::Subscribed => "subscribed",
        }
    }
}

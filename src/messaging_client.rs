use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use std::time;

const REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(10);

/// Outbound message of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyMessage {
    Text(String),
    /// Two-button prompt; tapping a button sends its text back as a message.
    Confirm {
        alt_text: String,
        text: String,
        yes_label: String,
        yes_text: String,
        no_label: String,
        no_text: String,
    },
}

/// Public profile of a platform user.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub picture_url: String,
    #[serde(default)]
    pub status_message: String,
}

#[derive(thiserror::Error)]
pub enum MessagingError {
    #[error("Failed to call the messaging API.")]
    Request(#[from] reqwest::Error),
    #[error("The messaging API rejected the request: {0}")]
    Rejected(String),
}

impl std::fmt::Debug for MessagingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::error_chain_fmt(self, f)
    }
}

#[async_trait::async_trait]
pub trait ReplySender: Send + Sync {
    async fn reply(
        &self,
        reply_token: &str,
        messages: Vec<ReplyMessage>,
    ) -> Result<(), MessagingError>;
}

#[async_trait::async_trait]
pub trait ProfileSource: Send + Sync {
    async fn profile(&self, user_id: &str) -> Result<Profile, MessagingError>;
}

/// Makes the bot leave a multi-person chat.
#[async_trait::async_trait]
pub trait ChatLeaver: Send + Sync {
    async fn leave_group(&self, group_id: &str) -> Result<(), MessagingError>;

    async fn leave_room(&self, room_id: &str) -> Result<(), MessagingError>;
}

pub struct MessagingClient {
    http_client: Client,
    base_url: String,
    channel_token: Secret<String>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyBody<'a> {
    reply_token: &'a str,
    messages: Vec<LineMessage<'a>>,
}

#[derive(serde::Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum LineMessage<'a> {
    Text {
        text: &'a str,
    },
    Template {
        #[serde(rename = "altText")]
        alt_text: &'a str,
        template: LineConfirmTemplate<'a>,
    },
}

#[derive(serde::Serialize)]
struct LineConfirmTemplate<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
    actions: [LineMessageAction<'a>; 2],
}

#[derive(serde::Serialize)]
struct LineMessageAction<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    label: &'a str,
    text: &'a str,
}

impl<'a> From<&'a ReplyMessage> for LineMessage<'a> {
    fn from(message: &'a ReplyMessage) -> Self {
        match message {
            ReplyMessage::Text(text) => LineMessage::Text { text },
            ReplyMessage::Confirm {
                alt_text,
                text,
                yes_label,
                yes_text,
                no_label,
                no_text,
            } => LineMessage::Template {
                alt_text,
                template: LineConfirmTemplate {
                    kind: "confirm",
                    text,
                    actions: [
                        LineMessageAction {
                            kind: "message",
                            label: yes_label,
                            text: yes_text,
                        },
                        LineMessageAction {
                            kind: "message",
                            label: no_label,
                            text: no_text,
                        },
                    ],
                },
            },
        }
    }
}

impl MessagingClient {
    pub fn new(
        base_url: String,
        channel_token: Secret<String>,
        timeout: Option<time::Duration>,
    ) -> Result<MessagingClient, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()?;

        Ok(MessagingClient {
            http_client,
            base_url,
            channel_token,
        })
    }

    async fn post_leave(&self, url: String) -> Result<(), MessagingError> {
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.channel_token.expose_secret())
            .send()
            .await?;
        ensure_success(response).await?;

        Ok(())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, MessagingError> {
    if response.status().is_success() {
        return Ok(response);
    }

    Err(MessagingError::Rejected(
        crate::describe_rejection(response).await,
    ))
}

#[async_trait::async_trait]
impl ReplySender for MessagingClient {
    #[tracing::instrument(name = "Sending a reply", skip(self, messages), fields(message_count = messages.len()))]
    async fn reply(
        &self,
        reply_token: &str,
        messages: Vec<ReplyMessage>,
    ) -> Result<(), MessagingError> {
        let url = format!("{}/v2/bot/message/reply", self.base_url);
        let body = ReplyBody {
            reply_token,
            messages: messages.iter().map(LineMessage::from).collect(),
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.channel_token.expose_secret())
            .json(&body)
            .send()
            .await?;
        ensure_success(response).await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl ProfileSource for MessagingClient {
    #[tracing::instrument(name = "Fetching a user profile", skip(self))]
    async fn profile(&self, user_id: &str) -> Result<Profile, MessagingError> {
        let url = format!("{}/v2/bot/profile/{}", self.base_url, user_id);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(self.channel_token.expose_secret())
            .send()
            .await?;
        let profile = ensure_success(response).await?.json().await?;

        Ok(profile)
    }
}

#[async_trait::async_trait]
impl ChatLeaver for MessagingClient {
    #[tracing::instrument(name = "Leaving a group", skip(self))]
    async fn leave_group(&self, group_id: &str) -> Result<(), MessagingError> {
        self.post_leave(format!("{}/v2/bot/group/{}/leave", self.base_url, group_id))
            .await
    }

    #[tracing::instrument(name = "Leaving a room", skip(self))]
    async fn leave_room(&self, room_id: &str) -> Result<(), MessagingError> {
        self.post_leave(format!("{}/v2/bot/room/{}/leave", self.base_url, room_id))
            .await
    }
}

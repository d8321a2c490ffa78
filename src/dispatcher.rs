//! Reacts to platform events: registers followers and drives the
//! approve/reject conversation.

use std::sync::Arc;

use crate::domain::display_name::DisplayName;
use crate::domain::subscriber_record::SubscriberRecord;
use crate::domain::user_id::UserId;
use crate::messaging_client::{
    ChatLeaver, MessagingError, ProfileSource, ReplyMessage, ReplySender,
};
use crate::webhook::{Event, EventSource, Message, Postback};
use crate::workflow::{
    build_approval_prompt, resolve_approval_reply, ApprovalDecision, ApprovalError,
    SubscribeError, SubscriptionWorkflow,
};

const STORE_UNAVAILABLE_REPLY: &str =
    "Sorry, we could not complete your subscription right now. Please try again later.";
const DATE_TIME_POSTBACKS: [&str; 3] = ["DATE", "TIME", "DATETIME"];

#[derive(thiserror::Error)]
pub enum DispatchError {
    #[error("The event does not disclose a valid user id.")]
    MissingUserId,
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error(transparent)]
    Approval(#[from] ApprovalError),
}

impl std::fmt::Debug for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::error_chain_fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    /// React to text messages at all.
    pub handle_text: bool,
    /// Echo text that is neither a command nor an approval reply.
    pub enable_echo: bool,
}

pub struct EventDispatcher {
    workflow: Arc<SubscriptionWorkflow>,
    reply_sender: Arc<dyn ReplySender>,
    profiles: Arc<dyn ProfileSource>,
    chats: Arc<dyn ChatLeaver>,
    options: DispatchOptions,
}

impl EventDispatcher {
    pub fn new(
        workflow: Arc<SubscriptionWorkflow>,
        reply_sender: Arc<dyn ReplySender>,
        profiles: Arc<dyn ProfileSource>,
        chats: Arc<dyn ChatLeaver>,
        options: DispatchOptions,
    ) -> Self {
        Self {
            workflow,
            reply_sender,
            profiles,
            chats,
            options,
        }
    }

    /// Handles every event, one at a time. A failing event is logged and does
    /// not prevent the following ones from being handled.
    pub async fn dispatch_all(&self, events: &[Event]) -> usize {
        let mut handled = 0;

        for event in events {
            match self.dispatch(event).await {
                Ok(()) => handled += 1,
                Err(err) => tracing::error!("Failed to handle event: {:?}", err),
            }
        }

        handled
    }

    pub async fn dispatch(&self, event: &Event) -> Result<(), DispatchError> {
        match event {
            Event::Follow {
                reply_token,
                source,
            } => self.handle_follow(reply_token, source).await,
            Event::Unfollow { source } => {
                tracing::info!(user_id = ?source.user_id(), "Unfollowed this bot");
                Ok(())
            }
            Event::Join {
                reply_token,
                source,
            } => {
                tracing::info!(source = source.kind(), "Joined");
                self.reply_text(reply_token, format!("Joined {}", source.kind()))
                    .await
            }
            Event::Leave { source } => {
                tracing::info!(source = source.kind(), "Left");
                Ok(())
            }
            Event::Postback {
                reply_token,
                postback,
                ..
            } => self.reply_text(reply_token, postback_reply(postback)).await,
            Event::Message {
                reply_token,
                source,
                message: Message::Text { text },
            } => {
                if !self.options.handle_text {
                    return Ok(());
                }
                self.handle_text(reply_token, source, text).await
            }
            Event::Message { .. } => {
                tracing::info!("Ignoring non-text message");
                Ok(())
            }
            Event::Unknown => {
                tracing::info!("Ignoring unknown event");
                Ok(())
            }
        }
    }

    #[tracing::instrument(name = "Handling a follow event", skip(self, reply_token))]
    async fn handle_follow(
        &self,
        reply_token: &str,
        source: &EventSource,
    ) -> Result<(), DispatchError> {
        let user_id = sender(source)?;
        let profile = self.profiles.profile(user_id.as_ref()).await?;
        let record = SubscriberRecord::new(
            user_id,
            DisplayName::new(profile.display_name.clone()),
            profile.picture_url,
        );

        let reply = match self.workflow.subscribe(&record).await {
            Ok(()) => format!("Welcome: {}", record.display_name),
            Err(err) => subscribe_failure_reply(err),
        };

        self.reply_text(reply_token, reply).await
    }

    #[tracing::instrument(name = "Handling a text message", skip(self, reply_token, source))]
    async fn handle_text(
        &self,
        reply_token: &str,
        source: &EventSource,
        text: &str,
    ) -> Result<(), DispatchError> {
        match text {
            "profile" => {
                let Some(user_id) = source.user_id() else {
                    return self
                        .reply_text(reply_token, "Bot can't use profile API without user ID".into())
                        .await;
                };
                let profile = self.profiles.profile(user_id).await?;
                let mut messages = vec![
                    ReplyMessage::Text(format!("Display name: {}", profile.display_name)),
                    ReplyMessage::Text(format!("Status message: {}", profile.status_message)),
                ];
                if let EventSource::Group { group_id, .. } = source {
                    messages.push(ReplyMessage::Text(format!("Group: {}", group_id)));
                }
                Ok(self.reply_sender.reply(reply_token, messages).await?)
            }
            "bye" => self.leave(reply_token, source).await,
            "approve" => {
                let user_id = sender(source)?;
                let profile = self.profiles.profile(user_id.as_ref()).await?;
                let prompt =
                    build_approval_prompt(&DisplayName::new(profile.display_name), &user_id);
                let confirm = ReplyMessage::Confirm {
                    alt_text: prompt.prompt_text.clone(),
                    text: prompt.prompt_text,
                    yes_label: String::from("Approve"),
                    yes_text: prompt.approve_action_text,
                    no_label: String::from("Reject"),
                    no_text: prompt.reject_action_text,
                };
                Ok(self.reply_sender.reply(reply_token, vec![confirm]).await?)
            }
            text => match resolve_approval_reply(text) {
                Ok(approval) => {
                    self.handle_approval(reply_token, approval.decision, approval.user_id)
                        .await
                }
                Err(ApprovalError::NotAnApprovalMessage) => {
                    if self.options.enable_echo {
                        self.reply_text(reply_token, text.to_owned()).await
                    } else {
                        Ok(())
                    }
                }
                Err(err) => Err(err.into()),
            },
        }
    }

    #[tracing::instrument(name = "Handling an approval reply", skip(self, reply_token))]
    async fn handle_approval(
        &self,
        reply_token: &str,
        decision: ApprovalDecision,
        user_id: UserId,
    ) -> Result<(), DispatchError> {
        let profile = self.profiles.profile(user_id.as_ref()).await?;
        let display_name = DisplayName::new(profile.display_name);

        let reply = match decision {
            ApprovalDecision::Rejected => format!("Rejected, {}", display_name),
            ApprovalDecision::Approved => {
                let record = SubscriberRecord::new(user_id, display_name, profile.picture_url);
                match self.workflow.subscribe(&record).await {
                    Ok(()) => format!("Approved, {}", record.display_name),
                    Err(err) => subscribe_failure_reply(err),
                }
            }
        };

        self.reply_text(reply_token, reply).await
    }

    #[tracing::instrument(name = "Leaving a chat", skip(self, reply_token))]
    async fn leave(&self, reply_token: &str, source: &EventSource) -> Result<(), DispatchError> {
        match source {
            EventSource::Group { group_id, .. } => {
                self.reply_text(reply_token, format!("Leaving group: {}", group_id))
                    .await?;
                Ok(self.chats.leave_group(group_id).await?)
            }
            EventSource::Room { room_id, .. } => {
                self.reply_text(reply_token, format!("Leaving room: {}", room_id))
                    .await?;
                Ok(self.chats.leave_room(room_id).await?)
            }
            EventSource::User { .. } | EventSource::Unknown => {
                self.reply_text(reply_token, String::from("Bot can't leave from 1:1 chat"))
                    .await
            }
        }
    }

    async fn reply_text(&self, reply_token: &str, text: String) -> Result<(), DispatchError> {
        self.reply_sender
            .reply(reply_token, vec![ReplyMessage::Text(text)])
            .await?;

        Ok(())
    }
}

fn sender(source: &EventSource) -> Result<UserId, DispatchError> {
    let user_id = source.user_id().ok_or(DispatchError::MissingUserId)?;

    UserId::parse(user_id.to_owned()).map_err(|_| DispatchError::MissingUserId)
}

fn subscribe_failure_reply(err: SubscribeError) -> String {
    match err {
        SubscribeError::AlreadySubscribed(_) => err.to_string(),
        SubscribeError::StoreUnavailable(_) => {
            tracing::error!("Failed to subscribe member: {:?}", err);
            String::from(STORE_UNAVAILABLE_REPLY)
        }
    }
}

fn postback_reply(postback: &Postback) -> String {
    let mut data = postback.data.clone();

    if DATE_TIME_POSTBACKS.contains(&data.as_str()) {
        let mut params: Vec<String> = postback
            .params
            .iter()
            .flatten()
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect();
        params.sort();
        data.push_str(&format!("({})", params.join(", ")));
    }

    format!("Got postback: {}", data)
}

//! Subscription workflow: duplicate-checked registration plus the approval
//! prompts that carry a subscriber token through the chat.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::codec::{self, CodecError};
use crate::domain::display_name::DisplayName;
use crate::domain::subscriber_record::SubscriberRecord;
use crate::domain::user_id::UserId;
use crate::store::{StoreError, SubscriberStore};

pub const APPROVE_PREFIX: &str = "Approve subscriber";
pub const REJECT_PREFIX: &str = "Reject subscriber";

#[derive(thiserror::Error)]
pub enum SubscribeError {
    #[error("{0} already subscribed")]
    AlreadySubscribed(DisplayName),
    #[error("The subscriber sheet is unavailable.")]
    StoreUnavailable(#[source] StoreError),
}

impl std::fmt::Debug for SubscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::error_chain_fmt(self, f)
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("The message is not an approval reply.")]
    NotAnApprovalMessage,
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Texts of a confirm prompt asking an administrator to approve a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalPrompt {
    pub prompt_text: String,
    pub approve_action_text: String,
    pub reject_action_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalReply {
    pub decision: ApprovalDecision,
    pub user_id: UserId,
}

pub struct SubscriptionWorkflow {
    store: SubscriberStore,
    // One lock per user id with a subscription in flight.
    in_flight: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
}

/// Holds a caller's share of a per-user lock. Dropping it, including when the
/// `subscribe` future is cancelled, removes the map entry once unused.
struct InFlight<'a> {
    workflow: &'a SubscriptionWorkflow,
    user_id: &'a UserId,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .workflow
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        // The map and this guard hold the last two references.
        if in_flight
            .get(self.user_id)
            .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2)
        {
            in_flight.remove(self.user_id);
        }
    }
}

impl SubscriptionWorkflow {
    pub fn new(store: SubscriberStore) -> Self {
        Self {
            store,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Appends `record` unless its user id is already in the sheet.
    ///
    /// Concurrent calls for the same user id within this process run one after
    /// the other. Nothing prevents another process from appending the same user
    /// between the lookup and the append.
    #[tracing::instrument(
        name = "Subscribing a member",
        skip(self, record),
        fields(
            user_id = %record.user_id,
            display_name = %record.display_name
        )
    )]
    pub async fn subscribe(&self, record: &SubscriberRecord) -> Result<(), SubscribeError> {
        let in_flight = self.enter(&record.user_id);
        let _guard = in_flight.lock.lock().await;

        self.check_and_append(record).await
    }

    async fn check_and_append(&self, record: &SubscriberRecord) -> Result<(), SubscribeError> {
        let already_subscribed = self
            .store
            .find_by_user_id(&record.user_id)
            .await
            .map_err(SubscribeError::StoreUnavailable)?;

        if already_subscribed {
            tracing::info!("Subscriber is already in the sheet");
            return Err(SubscribeError::AlreadySubscribed(
                record.display_name.clone(),
            ));
        }

        self.store
            .append(record)
            .await
            .map_err(SubscribeError::StoreUnavailable)
    }

    fn enter<'a>(&'a self, user_id: &'a UserId) -> InFlight<'a> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        let lock = in_flight.entry(user_id.clone()).or_default().clone();

        InFlight {
            workflow: self,
            user_id,
            lock,
        }
    }

    #[cfg(test)]
    fn in_flight_count(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }
}

pub fn build_approval_prompt(display_name: &DisplayName, user_id: &UserId) -> ApprovalPrompt {
    let name = display_name.for_prompt();
    let token = user_id.to_token();

    ApprovalPrompt {
        prompt_text: format!("\"{}\" request the subscription, Approve? ({})", name, token),
        approve_action_text: format!("{} \"{}\" ({})", APPROVE_PREFIX, name, token),
        reject_action_text: format!("{} \"{}\" ({})", REJECT_PREFIX, name, token),
    }
}

pub fn resolve_approval_reply(message_text: &str) -> Result<ApprovalReply, ApprovalError> {
    let decision = if message_text.starts_with(APPROVE_PREFIX) {
        ApprovalDecision::Approved
    } else if message_text.starts_with(REJECT_PREFIX) {
        ApprovalDecision::Rejected
    } else {
        return Err(ApprovalError::NotAnApprovalMessage);
    };

    let user_id = codec::extract_user_id(message_text)?;

    Ok(ApprovalReply { decision, user_id })
}

use std::sync::Arc;

use secrecy::Secret;

use crate::config::Settings;
use crate::dispatcher::{DispatchOptions, EventDispatcher};
use crate::messaging_client::MessagingClient;
use crate::sheets_client::SheetsClient;
use crate::store::SubscriberStore;
use crate::webhook::{verify_signature, WebhookError, WebhookPayload};
use crate::workflow::SubscriptionWorkflow;

#[derive(thiserror::Error)]
pub enum StartupError {
    #[error("Failed to build the spreadsheet client.")]
    SpreadsheetClient(#[source] reqwest::Error),
    #[error("Failed to build the messaging client.")]
    MessagingClient(#[source] reqwest::Error),
}

impl std::fmt::Debug for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::error_chain_fmt(self, f)
    }
}

/// The bot wired together, ready to be handed webhook deliveries by whatever
/// HTTP server hosts it.
pub struct Application {
    channel_secret: Secret<String>,
    dispatcher: EventDispatcher,
}

impl Application {
    pub fn build(config: Settings) -> Result<Self, StartupError> {
        let sheets_client = SheetsClient::new(
            config.spreadsheet.base_url.clone(),
            config.spreadsheet.spreadsheet_id.clone(),
            config.spreadsheet.access_token.clone(),
            Some(config.spreadsheet.timeout()),
        )
        .map_err(StartupError::SpreadsheetClient)?;
        let messaging_client = Arc::new(
            MessagingClient::new(
                config.messaging.base_url.clone(),
                config.messaging.channel_token.clone(),
                Some(config.messaging.timeout()),
            )
            .map_err(StartupError::MessagingClient)?,
        );

        let store = SubscriberStore::new(
            Arc::new(sheets_client),
            config.spreadsheet.range.clone(),
            config.spreadsheet.timeout(),
        );
        let workflow = Arc::new(SubscriptionWorkflow::new(store));
        let dispatcher = EventDispatcher::new(
            workflow,
            messaging_client.clone(),
            messaging_client.clone(),
            messaging_client,
            DispatchOptions {
                handle_text: config.application.handle_text,
                enable_echo: config.application.enable_echo,
            },
        );

        Ok(Self {
            channel_secret: config.messaging.channel_secret,
            dispatcher,
        })
    }

    /// Verifies, parses and dispatches one webhook delivery. Returns the number
    /// of events handled without error.
    #[tracing::instrument(name = "Handling a webhook delivery", skip(self, body, signature))]
    pub async fn handle_webhook(&self, body: &[u8], signature: &str) -> Result<usize, WebhookError> {
        verify_signature(&self.channel_secret, body, signature)?;
        let payload = WebhookPayload::parse(body)?;

        tracing::info!(
            destination = ?payload.destination,
            event_count = payload.events.len(),
            "Received webhook events"
        );

        Ok(self.dispatcher.dispatch_all(&payload.events).await)
    }
}

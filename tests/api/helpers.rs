use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::Sha256;
use std::sync::LazyLock;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use subscriber_bot::{
    config::{get_configuration, Settings},
    startup::Application,
    telemetry::{get_subscriber, init_subscriber},
    webhook::WebhookError,
};

pub const USER_ID: &str = "U4960c75d29849705bba861ff06c70f2f";
pub const TOKEN: &str = "SWDHXSmElwW7qGH_BscPLw";
pub const DISPLAY_NAME: &str = "Nguan ffr";

// Ensure that the `tracing` stack is only initialised once
static TRACING: LazyLock<()> = LazyLock::new(|| {
    let default_filter_level = String::from("info");
    let subscriber_name = String::from("test");

    // Logs are only printed when TEST_LOG is set, e.g. `TEST_LOG=true cargo test`
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber).expect("Failed to init tracing.");
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber).expect("Failed to init tracing.");
    }
});

pub struct TestApp {
    pub config: Settings,
    pub application: Application,
    pub sheets_server: MockServer,
    pub messaging_server: MockServer,
}

impl TestApp {
    pub async fn spawn_app() -> TestApp {
        LazyLock::force(&TRACING);

        let mut config = get_configuration().expect("Missing configuration file.");
        let sheets_server = MockServer::start().await;
        let messaging_server = MockServer::start().await;

        config.set_spreadsheet_base_url(sheets_server.uri());
        config.set_messaging_base_url(messaging_server.uri());

        let application =
            Application::build(config.clone()).expect("Failed to build application.");

        TestApp {
            config,
            application,
            sheets_server,
            messaging_server,
        }
    }

    /// Delivers `body` the way the platform does, signed with the channel secret.
    pub async fn post_webhook(&self, body: serde_json::Value) -> Result<usize, WebhookError> {
        let body = body.to_string();
        let signature = self.sign(body.as_bytes());

        self.application
            .handle_webhook(body.as_bytes(), &signature)
            .await
    }

    pub fn sign(&self, body: &[u8]) -> String {
        let secret = self.config.messaging.channel_secret.expose_secret();
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        STANDARD.encode(mac.finalize().into_bytes())
    }

    pub fn values_path(&self) -> String {
        format!(
            "/v4/spreadsheets/{}/values/{}",
            self.config.spreadsheet.spreadsheet_id, self.config.spreadsheet.range
        )
    }

    pub fn append_path(&self) -> String {
        format!("{}:append", self.values_path())
    }

    /// Serves `rows` (header first) for every read of the subscriber range.
    pub async fn mount_sheet_rows(&self, rows: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(self.values_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "range": self.config.spreadsheet.range,
                "majorDimension": "ROWS",
                "values": rows
            })))
            .mount(&self.sheets_server)
            .await;
    }

    pub async fn mount_profile(&self, user_id: &str, display_name: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/v2/bot/profile/{}", user_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "userId": user_id,
                "displayName": display_name,
                "pictureUrl": "https://profile.line-scdn.net/abcdefghijklmn",
                "statusMessage": "Hello, LINE!"
            })))
            .mount(&self.messaging_server)
            .await;
    }

    pub async fn mount_any_reply(&self) {
        Mock::given(method("POST"))
            .and(path_regex("^/v2/bot/message/reply$"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.messaging_server)
            .await;
    }

    /// Bodies of every reply the bot sent so far.
    pub async fn sent_replies(&self) -> Vec<serde_json::Value> {
        self.messaging_server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|request| request.url.path() == "/v2/bot/message/reply")
            .map(|request| serde_json::from_slice(&request.body).unwrap())
            .collect()
    }
}

pub fn header_row() -> serde_json::Value {
    serde_json::json!(["User ID", "Display Name", "Picture URL", "Join Date", "Status"])
}

pub fn follow_event(user_id: &str) -> serde_json::Value {
    serde_json::json!({
        "destination": "U0000000000000000000000000000000",
        "events": [{
            "type": "follow",
            "replyToken": "nHuyWiB7yP5Zw52FIkcQobQuGDXCTA",
            "timestamp": 1462629479859u64,
            "source": { "type": "user", "userId": user_id }
        }]
    })
}

pub fn text_event(user_id: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "events": [{
            "type": "message",
            "replyToken": "8cf9239d56244f4197887e939187e19e",
            "timestamp": 1462629479859u64,
            "source": { "type": "user", "userId": user_id },
            "message": { "id": "325708", "type": "text", "text": text }
        }]
    })
}

use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use std::time;

use crate::store::{Row, StoreError, TabularStore};

const REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(10);

/// Google Sheets v4 values API, authenticated with a bearer access token.
pub struct SheetsClient {
    http_client: Client,
    base_url: String,
    spreadsheet_id: String,
    access_token: Secret<String>,
}

#[derive(serde::Deserialize)]
struct ValueRange {
    // Absent when the range holds no data.
    #[serde(default)]
    values: Vec<Row>,
}

#[derive(serde::Serialize)]
struct AppendBody<'a> {
    values: [&'a Row; 1],
}

impl SheetsClient {
    pub fn new(
        base_url: String,
        spreadsheet_id: String,
        access_token: Secret<String>,
        timeout: Option<time::Duration>,
    ) -> Result<SheetsClient, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()?;

        Ok(SheetsClient {
            http_client,
            base_url,
            spreadsheet_id,
            access_token,
        })
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url, self.spreadsheet_id, range
        )
    }
}

#[async_trait::async_trait]
impl TabularStore for SheetsClient {
    #[tracing::instrument(name = "Reading a sheet range", skip(self), fields(spreadsheet_id = %self.spreadsheet_id))]
    async fn read_range(&self, range: &str) -> Result<Vec<Row>, StoreError> {
        let response = self
            .http_client
            .get(self.values_url(range))
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await?;
        let value_range: ValueRange = ensure_success(response).await?.json().await?;

        Ok(value_range.values)
    }

    #[tracing::instrument(name = "Appending a sheet row", skip(self, row), fields(spreadsheet_id = %self.spreadsheet_id))]
    async fn append_row(&self, range: &str, row: Row) -> Result<(), StoreError> {
        let url = format!("{}:append", self.values_url(range));

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.access_token.expose_secret())
            // RAW keeps user supplied names from being parsed as formulas,
            // INSERT_ROWS never overwrites rows below the table.
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&AppendBody { values: [&row] })
            .send()
            .await?;
        ensure_success(response).await?;

        Ok(())
    }
}

// 4xx and 5xx answers carry an explanation in the body.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    if response.status().is_success() {
        return Ok(response);
    }

    Err(StoreError::Rejected(crate::describe_rejection(response).await))
}

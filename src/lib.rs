pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod messaging_client;
pub mod sheets_client;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod webhook;
pub mod workflow;

/// Prints an error followed by every error in its `source` chain.
pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}

/// Status line and body of a non-2xx response, for error reports.
pub(crate) async fn describe_rejection(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    format!("{} {}", status, body.trim())
}

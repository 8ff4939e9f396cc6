//! Serve command - start the HTTP API server.

use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the HTTP API server with CLI overrides applied.
pub async fn run_serve(host: &str, port: u16, mut settings: Settings) -> Result<()> {
    settings.server.host = host.to_string();
    settings.server.port = port;

    Output::info(&format!("Starting Opptak server on {}:{}", host, port));
    Output::kv("POST", "/api/process");
    Output::kv("GET ", "/api/sessions/{resource_id}/status");
    Output::kv("GET ", "/api/sessions/{resource_id}/audio");

    crate::server::run_server(settings).await
}

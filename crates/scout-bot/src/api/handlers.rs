use axum::{extract::State, response::Html, Json};

use super::dto::HealthResponse;
use crate::AppState;

pub async fn index(State(state): State<AppState>) -> Html<String> {
    tracing::debug!("Serving status page");

    let page = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Eden Scout</title></head>
<body>
<h1>Eden Scout</h1>
<p>Magic Eden wallet checker bot is running.</p>
<p>Send a wallet address or private key to the bot in Telegram. Up to {} wallets are checked per message.</p>
</body>
</html>
"#,
        state.config.report.max_batch
    );
    Html(page)
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_secs = state.started_at.elapsed().as_secs();
    tracing::debug!(uptime_secs = %uptime_secs, "Health check");

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs,
    })
}

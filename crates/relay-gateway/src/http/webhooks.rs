//! Webhook ingress endpoint — POST /webhooks/:source.
//!
//! Accepts JSON payloads from any configured endpoint (GitHub, Sentry,
//! generic), verifies authenticity per the endpoint's name, normalizes the
//! payload into a `WebhookEvent`, and publishes `webhook.received` on the bus.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use hmac::{Hmac, Mac};
use relay_core::types::{Event, WebhookEvent};
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::AppState;

type HmacSha256 = Hmac<Sha256>;

/// POST /webhooks/:source
///
/// Verifies the request, normalizes it, and publishes `webhook.received`.
/// Returns 200 on success, 400 on bad JSON, 404 on unknown source, 401 on
/// auth failure.
pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let cfg = &state.config.webhooks;

    if !cfg.enabled {
        warn!(source = %source, "webhook received but subsystem is disabled");
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "webhook subsystem is disabled"})),
        ));
    }

    let endpoint = cfg
        .endpoints
        .iter()
        .find(|e| e.name == source)
        .ok_or_else(|| {
            warn!(source = %source, "unknown webhook endpoint");
            (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "unknown webhook endpoint"})),
            )
        })?;

    info!(source = %source, bytes = body.len(), "webhook arrived");

    verify(&endpoint.name, &headers, &body, endpoint.secret.as_deref())
        .map_err(|e| auth_error(&e))?;

    let payload: Value = serde_json::from_slice(&body).map_err(|e| {
        warn!(source = %source, error = %e, "invalid JSON in webhook body");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid JSON body"})),
        )
    })?;

    let (event_type, summary) = normalize(&endpoint.name, &headers, &payload);

    let event = WebhookEvent {
        source: endpoint.name.clone(),
        event_type,
        summary,
        payload,
        channel_target: endpoint.channel.clone(),
    };
    let now = chrono::Utc::now().timestamp();
    state.bus.publish(Event::webhook_received(event, now));

    info!(source = %source, "webhook accepted");
    Ok(Json(json!({"ok": true})))
}

/// Dispatch authentication by endpoint name: "github" endpoints use
/// X-Hub-Signature-256, "sentry" endpoints use Sentry-Hook-Signature,
/// everything else compares X-Webhook-Secret (or Authorization) directly.
/// An empty configured secret always rejects — there is no open mode.
fn verify(name: &str, headers: &HeaderMap, body: &Bytes, secret: Option<&str>) -> Result<(), String> {
    let secret = secret
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "no secret configured for this endpoint".to_string())?;

    if name.contains("github") {
        verify_hmac_header(headers, body, secret, "x-hub-signature-256", "sha256=")
    } else if name.contains("sentry") {
        verify_hmac_header(headers, body, secret, "sentry-hook-signature", "")
    } else {
        verify_shared_secret(headers, secret)
    }
}

fn verify_hmac_header(
    headers: &HeaderMap,
    body: &Bytes,
    secret: &str,
    header_name: &str,
    prefix: &str,
) -> Result<(), String> {
    let sig_header = headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| format!("missing {header_name} header"))?;

    let sig_hex = if prefix.is_empty() {
        sig_header
    } else {
        sig_header
            .strip_prefix(prefix)
            .ok_or_else(|| format!("malformed {header_name} header"))?
    };

    let expected = hex::decode(sig_hex).map_err(|_| format!("{header_name} is not valid hex"))?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "invalid HMAC key length".to_string())?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| "HMAC signature mismatch".to_string())
}

/// Constant-time comparison against `X-Webhook-Secret`, falling back to a
/// bearer-scheme `Authorization` header.
fn verify_shared_secret(headers: &HeaderMap, secret: &str) -> Result<(), String> {
    let provided = headers
        .get("x-webhook-secret")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_string)
        })
        .ok_or_else(|| "missing X-Webhook-Secret or Authorization header".to_string())?;

    ring::constant_time::verify_slices_are_equal(provided.as_bytes(), secret.as_bytes())
        .map_err(|_| "shared secret mismatch".to_string())
}

/// Produce a normalized `(event_type, summary)` pair for the webhook's
/// payload shape.
fn normalize(name: &str, headers: &HeaderMap, payload: &Value) -> (String, String) {
    if name.contains("github") {
        normalize_github(headers, payload)
    } else if name.contains("sentry") {
        normalize_sentry(payload)
    } else {
        normalize_generic(payload)
    }
}

fn normalize_github(headers: &HeaderMap, payload: &Value) -> (String, String) {
    let event_type = headers
        .get("x-github-event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let repo = payload
        .get("repository")
        .and_then(|r| r.get("full_name"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown repo");

    let summary = match event_type.as_str() {
        "push" => {
            let ref_name = payload.get("ref").and_then(|v| v.as_str()).unwrap_or("?");
            let count = payload.get("commits").and_then(|c| c.as_array()).map(|c| c.len()).unwrap_or(0);
            format!("{count} commit(s) pushed to {ref_name} on {repo}")
        }
        "pull_request" => {
            let action = payload.get("action").and_then(|v| v.as_str()).unwrap_or("updated");
            let number = payload.get("number").and_then(|v| v.as_i64()).unwrap_or(0);
            let title = payload
                .get("pull_request")
                .and_then(|p| p.get("title"))
                .and_then(|v| v.as_str())
                .unwrap_or("");
            format!("PR #{number} {action} on {repo}: {title}")
        }
        "issues" => {
            let action = payload.get("action").and_then(|v| v.as_str()).unwrap_or("updated");
            let number = payload.get("issue").and_then(|i| i.get("number")).and_then(|v| v.as_i64()).unwrap_or(0);
            format!("Issue #{number} {action} on {repo}")
        }
        "workflow_run" => {
            let conclusion = payload
                .get("workflow_run")
                .and_then(|w| w.get("conclusion"))
                .and_then(|v| v.as_str())
                .unwrap_or("in progress");
            format!("Workflow run on {repo}: {conclusion}")
        }
        other => format!("{other} event on {repo}"),
    };

    (event_type, summary)
}

fn normalize_sentry(payload: &Value) -> (String, String) {
    let title = payload.get("title").and_then(|v| v.as_str()).unwrap_or("unknown issue");
    let project = payload
        .get("project")
        .and_then(|v| v.as_str())
        .or_else(|| payload.get("project_name").and_then(|v| v.as_str()))
        .unwrap_or("unknown project");
    let level = payload.get("level").and_then(|v| v.as_str()).unwrap_or("error");

    ("issue".to_string(), format!("[{level}] {title} ({project})"))
}

fn normalize_generic(payload: &Value) -> (String, String) {
    let summary = payload
        .get("summary")
        .or_else(|| payload.get("message"))
        .and_then(|v| v.as_str())
        .unwrap_or("webhook received")
        .to_string();
    ("generic".to_string(), summary)
}

fn auth_error(reason: &str) -> (StatusCode, Json<Value>) {
    warn!(reason = %reason, "webhook authentication failed");
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "authentication failed", "reason": reason})),
    )
}

/// Log a warning at startup for any endpoint with no secret — it will
/// reject every request, since an empty secret never authenticates.
pub fn warn_on_open_endpoints(cfg: &relay_core::config::WebhooksConfig) {
    for endpoint in &cfg.endpoints {
        if endpoint.secret.as_deref().unwrap_or("").is_empty() {
            warn!(endpoint = %endpoint.name, "webhook endpoint has no secret configured — it will reject every request");
        }
    }
}

//! Wire-level send/receive for both Signal backends.
//!
//! `signal-cli` mode shells out to the `signal-cli` binary for every receive
//! and send. REST mode talks to a running `signal-cli-rest-api` bridge over
//! HTTP. Both normalize through [`crate::envelope::parse_envelope`].

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use relay_core::config::SignalConfig;

use crate::envelope::{parse_envelope, SignalEnvelope};
use crate::error::SignalError;

/// Run `signal-cli receive --json --timeout 5` once and collect every
/// envelope it prints before the process exits.
pub async fn receive_once_cli(config: &SignalConfig) -> Result<Vec<SignalEnvelope>, SignalError> {
    let cli_path = config.signal_cli_path.as_deref().ok_or(SignalError::NoCliPath)?;

    let mut child = Command::new(cli_path)
        .args(["-a", &config.phone_number, "receive", "--json", "--timeout", "5"])
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take().expect("stdout piped at spawn");
    let mut lines = BufReader::new(stdout).lines();
    let mut envelopes = Vec::new();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(v) => {
                if let Some(env) = parse_envelope(&v) {
                    envelopes.push(env);
                }
            }
            Err(e) => debug!(error = %e, line = %line.chars().take(200).collect::<String>(), "signal-cli: unparseable line"),
        }
    }

    child.wait().await?;
    Ok(envelopes)
}

/// `signal-cli -a <phone> send -m <msg> [--group-id <gid>] [<recipient>]`
pub async fn send_cli(
    config: &SignalConfig,
    recipient: &str,
    message: &str,
    group_id: Option<&str>,
) -> Result<(), SignalError> {
    let cli_path = config.signal_cli_path.as_deref().ok_or(SignalError::NoCliPath)?;

    let mut args = vec![
        "-a".to_string(),
        config.phone_number.clone(),
        "send".to_string(),
        "-m".to_string(),
        message.to_string(),
    ];
    match group_id {
        Some(gid) => {
            args.push("--group-id".to_string());
            args.push(gid.to_string());
        }
        None => args.push(recipient.to_string()),
    }

    let output = Command::new(cli_path).args(&args).output().await?;
    if !output.status.success() {
        return Err(SignalError::CliFailed(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }
    Ok(())
}

/// `GET {rest_api_url}/v1/receive/{phone_number}`
pub async fn receive_once_rest(
    client: &reqwest::Client,
    config: &SignalConfig,
) -> Result<Vec<SignalEnvelope>, SignalError> {
    let base = config.rest_api_url.as_deref().ok_or(SignalError::NoRestUrl)?;
    let url = format!("{}/v1/receive/{}", base.trim_end_matches('/'), config.phone_number);

    let resp = client.get(&url).send().await?;
    if !resp.status().is_success() {
        return Err(SignalError::RestStatus(resp.status().as_u16(), "receive failed".to_string()));
    }

    let messages: Vec<Value> = resp.json().await?;
    Ok(messages.iter().filter_map(parse_envelope).collect())
}

/// `POST {rest_api_url}/v2/send {message, number, recipients}`
pub async fn send_rest(
    client: &reqwest::Client,
    config: &SignalConfig,
    recipient: &str,
    message: &str,
    group_id: Option<&str>,
) -> Result<(), SignalError> {
    let base = config.rest_api_url.as_deref().ok_or(SignalError::NoRestUrl)?;
    let url = format!("{}/v2/send", base.trim_end_matches('/'));

    let body = serde_json::json!({
        "message": message,
        "number": config.phone_number,
        "recipients": [group_id.unwrap_or(recipient)],
    });

    let resp = client.post(&url).json(&body).send().await?;
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        return Err(SignalError::RestStatus(status, text));
    }
    Ok(())
}

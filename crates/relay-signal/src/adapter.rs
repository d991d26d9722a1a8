//! Signal channel adapter.
//!
//! Polls for inbound messages via `signal-cli` (subprocess mode) or the
//! `signal-cli-rest-api` bridge (HTTP mode), normalizes each envelope, and
//! spawns the shared agentic pipeline per message. Retries indefinitely on
//! transport errors — the bot is always listening.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use relay_core::config::{SignalConfig, SignalMode};

use crate::context::SignalAppContext;
use crate::envelope::SignalEnvelope;

pub struct SignalAdapter<C: SignalAppContext + 'static> {
    ctx: Arc<C>,
    config: SignalConfig,
}

impl<C: SignalAppContext + 'static> SignalAdapter<C> {
    pub fn new(config: &SignalConfig, ctx: Arc<C>) -> Self {
        Self {
            ctx,
            config: config.clone(),
        }
    }

    /// Drive the receive loop for the configured mode. Never returns — runs
    /// for the lifetime of the process.
    pub async fn run(self) {
        info!(mode = ?self.config.mode, phone = %self.config.phone_number, "Signal: starting receive loop");
        match self.config.mode {
            SignalMode::Cli => self.poll_cli_loop().await,
            SignalMode::Rest => self.poll_rest_loop().await,
        }
    }

    async fn poll_cli_loop(&self) {
        loop {
            match crate::transport::receive_once_cli(&self.config).await {
                Ok(envelopes) => {
                    for env in envelopes {
                        self.spawn_handler(env);
                    }
                }
                Err(e) => {
                    error!(error = %e, "signal-cli receive failed, retrying in 5s");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }

    async fn poll_rest_loop(&self) {
        let client = reqwest::Client::new();
        loop {
            match crate::transport::receive_once_rest(&client, &self.config).await {
                Ok(envelopes) => {
                    for env in envelopes {
                        self.spawn_handler(env);
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(e) => {
                    error!(error = %e, "signal rest poll failed, retrying in 10s");
                    tokio::time::sleep(Duration::from_secs(10)).await;
                }
            }
        }
    }

    fn spawn_handler(&self, env: SignalEnvelope) {
        let ctx = Arc::clone(&self.ctx);
        let config = self.config.clone();
        tokio::spawn(async move {
            crate::handler::handle_envelope(ctx, config, env).await;
        });
    }
}

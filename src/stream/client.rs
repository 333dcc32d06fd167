use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{error, info, warn};

use super::backoff::{Backoff, ReconnectPolicy};
use super::frame::StreamFrame;
use crate::actions::Action;

/// Stream server URL scoped to one agent
pub fn stream_endpoint(base: &str, agent_id: &str) -> String {
    let mut url = base.to_string();
    let authority_start = url.find("://").map(|i| i + 3).unwrap_or(0);
    if !url[authority_start..].contains(['/', '?']) {
        url.push('/');
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}agent={}", url, separator, urlencoding::encode(agent_id))
}

/// Read-only client for the agent stream socket
pub struct StreamClient {
    url: String,
    policy: ReconnectPolicy,
}

impl StreamClient {
    pub fn new(base_url: &str, agent_id: &str, policy: ReconnectPolicy) -> Self {
        Self {
            url: stream_endpoint(base_url, agent_id),
            policy,
        }
    }

    /// Forward decoded frames to `tx` until retries are exhausted or the
    /// receiver goes away. Nothing is ever sent to the server.
    pub async fn run(self, tx: mpsc::UnboundedSender<Action>) {
        let mut backoff = Backoff::new(self.policy);

        loop {
            info!(url = %self.url, attempt = backoff.retries() + 1, "connecting to stream");

            match connect_async(self.url.as_str()).await {
                Ok((mut socket, _)) => {
                    info!(url = %self.url, "stream connected");
                    backoff.reset();

                    while let Some(message) = socket.next().await {
                        match message {
                            Ok(Message::Text(text)) => match StreamFrame::parse(text.as_str()) {
                                Ok(frame) => {
                                    if tx.send(Action::Frame(Box::new(frame))).is_err() {
                                        return;
                                    }
                                }
                                Err(e) => warn!(error = %e, "dropping malformed stream frame"),
                            },
                            Ok(Message::Close(_)) => break,
                            Ok(_) => {}
                            Err(e) => {
                                error!(error = %e, "stream error");
                                break;
                            }
                        }
                    }

                    info!(url = %self.url, "stream disconnected");
                }
                Err(e) => error!(url = %self.url, error = %e, "stream connection failed"),
            }

            if tx.is_closed() {
                return;
            }

            match backoff.next_delay() {
                Some(delay) => {
                    info!(
                        delay_ms = delay.as_millis() as u64,
                        retry = backoff.retries(),
                        max = backoff.max_retries(),
                        "reconnecting to stream"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    warn!(url = %self.url, "max retries reached, giving up");
                    return;
                }
            }
        }
    }
}

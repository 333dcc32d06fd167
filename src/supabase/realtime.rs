//! Supabase Realtime change feed (Phoenix channel protocol, vsn 1.0.0).

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::{EventRecord, Session, SupabaseConfig, EVENTS_TABLE, SESSIONS_TABLE};
use crate::actions::Action;
use crate::stream::{Backoff, ReconnectPolicy};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// A row change relevant to the watched session
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Inserted(EventRecord),
    SessionUpdated(Session),
}

/// What one inbound socket message means for the feed
#[derive(Debug, PartialEq)]
enum Inbound {
    Change(ChangeEvent),
    /// The server closed or errored the channel
    ChannelClosed,
    Ignored,
}

pub fn socket_url(base_url: &str, anon_key: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!(
        "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
        ws_base,
        urlencoding::encode(anon_key)
    )
}

fn topic(session_id: &str) -> String {
    format!("realtime:stream-{}", session_id)
}

fn join_message(session_id: &str, access_token: &str, msg_ref: u64) -> Value {
    json!({
        "topic": topic(session_id),
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": {"self": false},
                "presence": {"key": ""},
                "postgres_changes": [
                    {
                        "event": "INSERT",
                        "schema": "public",
                        "table": EVENTS_TABLE,
                        "filter": format!("session_id=eq.{}", session_id),
                    },
                    {
                        "event": "UPDATE",
                        "schema": "public",
                        "table": SESSIONS_TABLE,
                        "filter": format!("id=eq.{}", session_id),
                    },
                ],
            },
            "access_token": access_token,
        },
        "ref": msg_ref.to_string(),
        "join_ref": msg_ref.to_string(),
    })
}

fn heartbeat_message(msg_ref: u64) -> Value {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string(),
    })
}

/// Decode a `postgres_changes` message into a change for this viewer
fn change_from_value(value: &Value) -> Option<ChangeEvent> {
    if value.get("event")?.as_str()? != "postgres_changes" {
        return None;
    }
    let data = value.get("payload")?.get("data")?;
    let record = data.get("record")?;
    match (data.get("table")?.as_str()?, data.get("type")?.as_str()?) {
        (EVENTS_TABLE, "INSERT") => EventRecord::deserialize(record)
            .ok()
            .map(ChangeEvent::Inserted),
        (SESSIONS_TABLE, "UPDATE") => Session::deserialize(record)
            .ok()
            .map(ChangeEvent::SessionUpdated),
        _ => None,
    }
}

fn classify(text: &str) -> Inbound {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        warn!("dropping malformed realtime message");
        return Inbound::Ignored;
    };
    match value.get("event").and_then(Value::as_str) {
        Some("postgres_changes") => change_from_value(&value)
            .map(Inbound::Change)
            .unwrap_or(Inbound::Ignored),
        Some("phx_error") | Some("phx_close") => Inbound::ChannelClosed,
        Some("phx_reply") => {
            let status = value
                .pointer("/payload/status")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if status != "ok" {
                warn!(status, response = %value["payload"]["response"], "realtime join rejected");
            }
            Inbound::Ignored
        }
        _ => Inbound::Ignored,
    }
}

/// Subscription to inserts and session updates for one session
pub struct RealtimeFeed {
    url: String,
    session_id: String,
    access_token: String,
    policy: ReconnectPolicy,
}

impl RealtimeFeed {
    pub fn new(config: &SupabaseConfig, session_id: &str, policy: ReconnectPolicy) -> Self {
        Self {
            url: socket_url(&config.url, &config.anon_key),
            session_id: session_id.to_string(),
            access_token: config.anon_key.clone(),
            policy,
        }
    }

    /// Forward changes to `tx` until retries are exhausted or the receiver
    /// goes away
    pub async fn run(self, tx: mpsc::UnboundedSender<Action>) {
        let mut backoff = Backoff::new(self.policy);
        let mut msg_ref: u64 = 0;
        let topic = topic(&self.session_id);

        loop {
            match connect_async(self.url.as_str()).await {
                Ok((mut socket, _)) => {
                    msg_ref += 1;
                    let join = join_message(&self.session_id, &self.access_token, msg_ref);
                    match socket.send(Message::text(join.to_string())).await {
                        Ok(()) => {
                            info!(topic = %topic, "realtime subscribed");
                            backoff.reset();
                            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
                            heartbeat.tick().await;

                            loop {
                                tokio::select! {
                                    message = socket.next() => match message {
                                        Some(Ok(Message::Text(text))) => match classify(text.as_str()) {
                                            Inbound::Change(change) => {
                                                if tx.send(Action::Change(change)).is_err() {
                                                    return;
                                                }
                                            }
                                            Inbound::ChannelClosed => break,
                                            Inbound::Ignored => {}
                                        },
                                        Some(Ok(Message::Close(_))) | None => break,
                                        Some(Ok(_)) => {}
                                        Some(Err(e)) => {
                                            error!(error = %e, "realtime error");
                                            break;
                                        }
                                    },
                                    _ = heartbeat.tick() => {
                                        msg_ref += 1;
                                        let beat = heartbeat_message(msg_ref).to_string();
                                        if let Err(e) = socket.send(Message::text(beat)).await {
                                            error!(error = %e, "realtime heartbeat failed");
                                            break;
                                        }
                                        debug!(msg_ref, "realtime heartbeat");
                                    }
                                }
                            }
                        }
                        Err(e) => error!(error = %e, "realtime join failed"),
                    }
                    info!(topic = %topic, "realtime disconnected");
                }
                Err(e) => error!(error = %e, "realtime connection failed"),
            }

            if tx.is_closed() {
                return;
            }

            match backoff.next_delay() {
                Some(delay) => {
                    info!(
                        delay_ms = delay.as_millis() as u64,
                        retry = backoff.retries(),
                        "reconnecting to realtime"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    warn!(topic = %topic, "realtime retries exhausted");
                    return;
                }
            }
        }
    }
}

//! Realtime change feed over the Phoenix websocket protocol.
//!
//! The rental client listens for row changes on the bike table so a rental
//! ended from anywhere (another device, an admin override) reconciles the
//! local cache without polling.

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, trace, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::error::Error;

/// Row-change kinds emitted by the change feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
pub enum ChangeKind {
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
}

impl ChangeKind {
    fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        }
    }
}

/// A single row change delivered to a subscriber
#[derive(Debug, Clone)]
pub struct ChangeEvent<T> {
    pub kind: ChangeKind,
    /// Row after the change; absent for deletes
    pub record: Option<T>,
    /// Row before the change, when replica identity provides it
    pub old_record: Option<T>,
}

/// Wire shape of an incoming Phoenix frame
#[derive(Debug, Deserialize)]
struct WireMessage {
    topic: String,
    event: String,
    payload: serde_json::Value,
}

/// Wire shape of a `postgres_changes` payload body
#[derive(Debug, Deserialize)]
struct WireChange {
    #[serde(rename = "type")]
    kind: ChangeKind,
    #[serde(default)]
    record: Option<serde_json::Value>,
    #[serde(default)]
    old_record: Option<serde_json::Value>,
}

/// Handle to a live subscription; the socket tasks stop when this is
/// stopped or dropped
pub struct Subscription {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Subscription {
    /// Tear the subscription down
    pub fn stop(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Client for the realtime change feed
pub struct RealtimeClient {
    url: String,
    key: String,
    heartbeat_interval: Duration,
    next_ref: AtomicU32,
}

impl RealtimeClient {
    pub fn new(url: &str, key: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            heartbeat_interval: Duration::from_secs(30),
            next_ref: AtomicU32::new(1),
        }
    }

    fn next_ref(&self) -> String {
        self.next_ref.fetch_add(1, Ordering::SeqCst).to_string()
    }

    fn websocket_url(&self) -> Result<String, Error> {
        let base = Url::parse(&self.url)?;
        match base.scheme() {
            "http" | "https" | "ws" | "wss" => {}
            s => return Err(Error::realtime(format!("unsupported URL scheme: {}", s))),
        }
        let joined = base.join("/realtime/v1/websocket?vsn=2.0.0")?;
        let ws = joined
            .as_str()
            .replacen("http://", "ws://", 1)
            .replacen("https://", "wss://", 1);
        Ok(format!("{}&apikey={}", ws, self.key))
    }

    /// Subscribe to row changes on a table. Events arrive on the returned
    /// receiver; rows that fail to decode are logged and skipped.
    pub async fn subscribe<T>(
        &self,
        schema: &str,
        table: &str,
        kinds: &[ChangeKind],
    ) -> Result<(Subscription, mpsc::UnboundedReceiver<ChangeEvent<T>>), Error>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let ws_url = self.websocket_url()?;
        let topic = format!("realtime:{}:{}", schema, table);

        let (ws_stream, _) = connect_async(&ws_url)
            .await
            .map_err(|e| Error::realtime(format!("websocket connection failed: {}", e)))?;
        debug!("realtime socket connected for {}", topic);

        let (mut write, mut read) = ws_stream.split();

        // writer task, fed through an internal channel
        let (socket_tx, mut socket_rx) = mpsc::channel::<Message>(100);
        let writer = tokio::spawn(async move {
            while let Some(message) = socket_rx.recv().await {
                if let Err(e) = write.send(message).await {
                    error!("realtime send failed, closing socket: {}", e);
                    socket_rx.close();
                    break;
                }
            }
        });

        let changes: Vec<serde_json::Value> = kinds
            .iter()
            .map(|kind| {
                json!({
                    "event": kind.as_str(),
                    "schema": schema,
                    "table": table,
                })
            })
            .collect();
        let join = json!({
            "topic": topic,
            "event": "phx_join",
            "payload": { "config": { "postgres_changes": changes } },
            "ref": self.next_ref(),
        });
        socket_tx
            .send(Message::Text(join.to_string()))
            .await
            .map_err(|e| Error::realtime(format!("failed to send join: {}", e)))?;

        let (event_tx, event_rx) = mpsc::unbounded_channel::<ChangeEvent<T>>();
        let heartbeat_interval = self.heartbeat_interval;
        let heartbeat_ref = AtomicU32::new(1);
        let expected_topic = topic.clone();

        let reader = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    frame = read.next() => {
                        match frame {
                            Some(Ok(Message::Text(text))) => {
                                let parsed: WireMessage = match serde_json::from_str(&text) {
                                    Ok(msg) => msg,
                                    Err(e) => {
                                        warn!("unparseable realtime frame, skipping: {}", e);
                                        continue;
                                    }
                                };
                                if parsed.topic != expected_topic
                                    || parsed.event != "postgres_changes"
                                {
                                    trace!("ignoring frame: topic={} event={}", parsed.topic, parsed.event);
                                    continue;
                                }
                                let Some(data) = parsed.payload.get("data") else {
                                    continue;
                                };
                                let change: WireChange = match serde_json::from_value(data.clone()) {
                                    Ok(change) => change,
                                    Err(e) => {
                                        warn!("unreadable change payload, skipping: {}", e);
                                        continue;
                                    }
                                };
                                let record = change.record.and_then(|value| {
                                    serde_json::from_value::<T>(value)
                                        .map_err(|e| warn!("change record failed to decode, skipping: {}", e))
                                        .ok()
                                });
                                let old_record = change
                                    .old_record
                                    .and_then(|value| serde_json::from_value::<T>(value).ok());
                                let event = ChangeEvent {
                                    kind: change.kind,
                                    record,
                                    old_record,
                                };
                                if event_tx.send(event).is_err() {
                                    debug!("change receiver dropped, stopping reader");
                                    break;
                                }
                            }
                            Some(Ok(msg)) if msg.is_close() => {
                                debug!("realtime socket closed by remote");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                error!("realtime read error: {}", e);
                                break;
                            }
                            None => {
                                debug!("realtime stream ended");
                                break;
                            }
                        }
                    }

                    _ = sleep(heartbeat_interval) => {
                        let heartbeat = json!({
                            "topic": "phoenix",
                            "event": "heartbeat",
                            "payload": {},
                            "ref": heartbeat_ref.fetch_add(1, Ordering::SeqCst).to_string(),
                        });
                        if socket_tx.send(Message::Text(heartbeat.to_string())).await.is_err() {
                            error!("heartbeat send failed, assuming connection lost");
                            break;
                        }
                    }
                }
            }
        });

        Ok((Subscription { reader, writer }, event_rx))
    }
}

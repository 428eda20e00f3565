//! WebSocket connections to Nostr-style relays: subscribing for gift-wrap
//! events addressed to our identity, and publishing outgoing wraps.
//!
//! One `RelayConnection` per configured relay URL, split into its sink and
//! stream halves on connect so a publish never waits behind the read loop's
//! `next().await`. Connections are established lazily; publish and
//! subscribe operations on a relay that is not currently connected fail
//! that single relay without affecting the others (§4.9's per-relay
//! isolation).

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};
use wrap_core::RelayPool;
use wrap_protocol::Event;

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

#[derive(Debug)]
pub enum RelayError {
    Connect(String),
    Ws(String),
    Serialization(String),
    Disconnected,
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::Connect(s) => write!(f, "connect error: {}", s),
            RelayError::Ws(s) => write!(f, "websocket error: {}", s),
            RelayError::Serialization(s) => write!(f, "serialization error: {}", s),
            RelayError::Disconnected => write!(f, "relay disconnected"),
        }
    }
}

impl std::error::Error for RelayError {}

/// The subscribe filter a Nostr-style relay expects inside a `["REQ",
/// sub_id, filter]` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub since: i64,
    pub kinds: Vec<u32>,
    #[serde(rename = "#p")]
    pub p_tag: Vec<String>,
}

struct RelayConnection {
    sink: Mutex<Option<WsSink>>,
    source: Mutex<Option<WsSource>>,
    url: String,
}

impl RelayConnection {
    fn new(url: String) -> Self {
        RelayConnection { sink: Mutex::new(None), source: Mutex::new(None), url }
    }

    async fn ensure_connected(&self) -> Result<(), RelayError> {
        if self.sink.lock().await.is_some() {
            return Ok(());
        }
        let (ws, _response) =
            tokio_tungstenite::connect_async(&self.url).await.map_err(|e| RelayError::Connect(e.to_string()))?;
        let (sink, source) = ws.split();
        *self.sink.lock().await = Some(sink);
        *self.source.lock().await = Some(source);
        info!(relay = %self.url, "relay connected");
        Ok(())
    }

    async fn send_text(&self, json: String) -> Result<(), RelayError> {
        self.ensure_connected().await?;
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(RelayError::Disconnected)?;
        if let Err(e) = sink.send(Message::Text(json.into())).await {
            *guard = None;
            return Err(RelayError::Ws(e.to_string()));
        }
        Ok(())
    }

    /// Take ownership of the read half for the lifetime of the read loop.
    /// Only one reader may run per connection at a time.
    async fn take_source(&self) -> Result<WsSource, RelayError> {
        self.ensure_connected().await?;
        self.source.lock().await.take().ok_or(RelayError::Disconnected)
    }

    fn is_connected(&self) -> bool {
        self.sink.try_lock().map(|g| g.is_some()).unwrap_or(true)
    }
}

/// A callback invoked for every event delivered by any subscribed relay.
/// The pipeline's own wrap-dedup map, not the relay layer, is the source of
/// truth for suppressing duplicates across relays.
pub type EventHandler = Arc<dyn Fn(Event) + Send + Sync>;

/// Owns one `RelayConnection` per configured relay and runs the read loops
/// that deliver subscribed events to the pipeline.
pub struct TungsteniteRelayPool {
    connections: HashMap<String, Arc<RelayConnection>>,
}

impl TungsteniteRelayPool {
    pub fn new(relays: &[String]) -> Self {
        let connections =
            relays.iter().map(|url| (url.clone(), Arc::new(RelayConnection::new(url.clone())))).collect();
        TungsteniteRelayPool { connections }
    }

    /// Subscribe on every relay with `filter`, forwarding parsed events to
    /// `on_event`. Returns immediately; each relay's read loop runs as a
    /// spawned task so a hung relay cannot block the others.
    pub async fn subscribe_all(self: &Arc<Self>, sub_id: &str, filter: Filter, on_event: EventHandler) {
        for (url, conn) in &self.connections {
            let conn = conn.clone();
            let on_event = on_event.clone();
            let sub_id = sub_id.to_owned();
            let filter = filter.clone();
            let url = url.clone();
            tokio::spawn(async move {
                if let Err(e) = run_subscription(conn, sub_id, filter, on_event).await {
                    warn!(relay = %url, error = %e, "subscription loop ended");
                }
            });
        }
    }

    pub fn connected_count(&self) -> usize {
        self.connections.values().filter(|c| c.is_connected()).count()
    }

    /// Dial every configured relay concurrently. Used during startup
    /// warm-up (§5); a relay that fails to connect here is simply logged —
    /// the caller decides whether zero connections overall is fatal.
    pub async fn connect_all(&self) {
        let futures = self.connections.values().map(|conn| {
            let conn = conn.clone();
            async move {
                if let Err(e) = conn.ensure_connected().await {
                    warn!(relay = %conn.url, error = %e, "relay warm-up connect failed");
                }
            }
        });
        futures_util::future::join_all(futures).await;
    }
}

async fn run_subscription(
    conn: Arc<RelayConnection>,
    sub_id: String,
    filter: Filter,
    on_event: EventHandler,
) -> Result<(), RelayError> {
    let req =
        serde_json::to_string(&("REQ", &sub_id, &filter)).map_err(|e| RelayError::Serialization(e.to_string()))?;
    conn.send_text(req).await?;
    let mut source = conn.take_source().await?;

    loop {
        match source.next().await {
            None => return Err(RelayError::Disconnected),
            Some(Err(e)) => return Err(RelayError::Ws(e.to_string())),
            Some(Ok(Message::Text(text))) => {
                if let Some(event) = parse_event_message(&text) {
                    on_event(event);
                } else {
                    debug!(relay = %conn.url, "ignoring non-EVENT relay message");
                }
            }
            Some(Ok(Message::Close(_))) => return Err(RelayError::Disconnected),
            Some(Ok(_)) => continue,
        }
    }
}

fn parse_event_message(text: &str) -> Option<Event> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let array = value.as_array()?;
    if array.first()?.as_str()? != "EVENT" {
        return None;
    }
    let event_value = array.get(2).or_else(|| array.get(1))?;
    serde_json::from_value(event_value.clone()).ok()
}

#[async_trait]
impl RelayPool for TungsteniteRelayPool {
    async fn publish(&self, relay_url: &str, event: &Event) -> Result<(), String> {
        let conn = self.connections.get(relay_url).ok_or_else(|| format!("unknown relay {}", relay_url))?;
        let json = serde_json::to_string(&("EVENT", event)).map_err(|e| e.to_string())?;
        conn.send_text(json).await.map_err(|e| e.to_string())
    }

    fn connected_relays(&self) -> Vec<String> {
        self.connections.iter().filter(|(_, c)| c.is_connected()).map(|(url, _)| url.clone()).collect()
    }
}

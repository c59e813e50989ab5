use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMsg};

use crate::core::commands::{MessagingClient, MessagingError, SlackEvent};

const SLACK_API_URL: &str = "https://slack.com/api";

/// Slack Web API plus a Real Time Messaging socket.
///
/// A background task reads the socket and queues every JSON object it sees,
/// so `read_available_events` only drains the queue and never waits.
pub struct SlackRtmClient {
    client: Client,
    token: String,
    base_url: String,
    events: Mutex<Option<UnboundedReceiver<SlackEvent>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SlackRtmClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            base_url: SLACK_API_URL.to_string(),
            events: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    /// Call a Web API method. Slack reports most failures as `200 {"ok": false}`.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, MessagingError> {
        let url = format!("{}/{}", self.base_url, method);
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| MessagingError::Api(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(MessagingError::Api(format!(
                "{} returned {}",
                method,
                resp.status()
            )));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| MessagingError::Api(e.to_string()))?;
        parse_api_response(method, &text)
    }
}

fn parse_api_response<T: DeserializeOwned>(method: &str, text: &str) -> Result<T, MessagingError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| MessagingError::Api(format!("{} returned invalid JSON: {}", method, e)))?;

    if value.get("ok").and_then(serde_json::Value::as_bool) != Some(true) {
        let error = value
            .get("error")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown");
        return Err(MessagingError::Api(format!("{} failed: {}", method, error)));
    }

    serde_json::from_value(value)
        .map_err(|e| MessagingError::Api(format!("{} returned unexpected body: {}", method, e)))
}

/// Turn one text frame into an event. Frames that are not JSON objects are dropped.
fn parse_frame(text: &str) -> Option<SlackEvent> {
    match serde_json::from_str(text) {
        Ok(value) => SlackEvent::from_value(value),
        Err(e) => {
            tracing::warn!("Slack: unparseable RTM frame: {e}");
            None
        }
    }
}

async fn pump_socket<S>(stream: S, events: UnboundedSender<SlackEvent>)
where
    S: Stream<Item = Result<WsMsg, WsError>> + Sink<WsMsg> + Unpin,
{
    let (mut write, mut read) = stream.split();

    while let Some(frame) = read.next().await {
        match frame {
            Ok(WsMsg::Text(text)) => {
                if let Some(event) = parse_frame(&text) {
                    if events.send(event).is_err() {
                        break;
                    }
                }
            }
            Ok(WsMsg::Ping(data)) => {
                if write.send(WsMsg::Pong(data)).await.is_err() {
                    tracing::warn!("Slack: failed to answer ping");
                }
            }
            Ok(WsMsg::Close(_)) => {
                tracing::info!("Slack: RTM socket closed by server");
                break;
            }
            Err(e) => {
                tracing::error!("Slack: RTM read error: {e}");
                break;
            }
            Ok(_) => {}
        }
    }
}

#[async_trait]
impl MessagingClient for SlackRtmClient {
    async fn connect(&self) -> Result<(), MessagingError> {
        let body: RtmConnect = self
            .call("rtm.connect", json!({}))
            .await
            .map_err(|e| MessagingError::Connect(e.to_string()))?;

        let (socket, _) = tokio_tungstenite::connect_async(body.url.as_str())
            .await
            .map_err(|e| MessagingError::Connect(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(pump_socket(socket, tx));

        *self.events.lock().await = Some(rx);
        if let Some(previous) = self.reader.lock().await.replace(handle) {
            previous.abort();
        }

        tracing::debug!(url = %body.url, "Slack: RTM socket open");
        Ok(())
    }

    async fn resolve_own_identity(&self) -> Result<String, MessagingError> {
        let body: AuthTest = self.call("auth.test", json!({})).await?;
        Ok(body.user_id)
    }

    async fn read_available_events(&self) -> Result<Vec<SlackEvent>, MessagingError> {
        let mut guard = self.events.lock().await;
        let events = guard.as_mut().ok_or(MessagingError::NotConnected)?;

        let mut batch = Vec::new();
        loop {
            match events.try_recv() {
                Ok(event) => batch.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // Hand out what was already queued; report the close next time
                    if batch.is_empty() {
                        return Err(MessagingError::Disconnected);
                    }
                    break;
                }
            }
        }

        Ok(batch)
    }

    async fn post_message(&self, channel: &str, text: &str) -> Result<(), MessagingError> {
        let _: serde_json::Value = self
            .call("chat.postMessage", json!({ "channel": channel, "text": text }))
            .await?;
        Ok(())
    }
}

impl Drop for SlackRtmClient {
    fn drop(&mut self) {
        if let Some(handle) = self.reader.get_mut().take() {
            handle.abort();
        }
    }
}

#[derive(Debug, Deserialize)]
struct RtmConnect {
    url: String,
}

#[derive(Debug, Deserialize)]
struct AuthTest {
    user_id: String,
}

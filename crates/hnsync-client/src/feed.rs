//! Subscription to the `updates` endpoint.
//!
//! Firebase serves the endpoint as a server-sent event stream: the first
//! `put` carries the current value, later `put`/`patch` events replace or
//! merge the value at a `path` below it. Each connection keeps a local copy
//! of the value; after every event the lists it touched are forwarded as an
//! [`UpdateNotice`]. A background task keeps the connection open,
//! reconnecting with exponential backoff.

use std::time::Duration;

use futures::StreamExt as _;
use hnsync_core::{
  UpdateNotice,
  feed::{FeedHandle, Subscription},
};
use serde::Deserialize;
use serde_json::Value;
use tokio::{
  sync::{mpsc, watch},
  task::JoinHandle,
};

use crate::{Error, HnClient, Result, SseEvent, SseParser};

/// Connect timeout for the stream; the stream itself has no overall timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long [`StreamHandle::close`] waits for the task to wind down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Notices buffered between the connection task and the consumer.
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct FeedConfig {
  pub reconnect_initial: Duration,
  pub reconnect_max:     Duration,
}

impl Default for FeedConfig {
  fn default() -> Self {
    Self {
      reconnect_initial: Duration::from_secs(1),
      reconnect_max:     Duration::from_secs(60),
    }
  }
}

const ITEMS: &str = "items";
const PROFILES: &str = "profiles";

/// Payload of a Firebase `put`/`patch` event.
#[derive(Deserialize)]
struct FirebaseEvent {
  #[serde(default)]
  path: String,
  #[serde(default)]
  data: Value,
}

/// Why one connection ended.
enum Ended {
  /// The consumer went away or shutdown was requested.
  Stop,
  /// The server closed the stream or asked us to go away.
  Disconnected(&'static str),
}

// ─── Stream ──────────────────────────────────────────────────────────────────

pub struct UpdateStream {
  http:   reqwest::Client,
  url:    String,
  config: FeedConfig,
}

impl UpdateStream {
  /// Build a stream against the same base URL as `client`.
  pub fn new(client: &HnClient, config: FeedConfig) -> Result<Self> {
    let http = reqwest::Client::builder()
      .connect_timeout(CONNECT_TIMEOUT)
      .build()?;
    Ok(Self { http, url: client.url("updates"), config })
  }

  /// Spawn the connection task and return the subscription.
  pub fn start(self) -> Subscription<StreamHandle> {
    let (tx, notices) = mpsc::channel(CHANNEL_CAPACITY);
    let (stop_tx, stop_rx) = watch::channel(false);

    let task = tokio::spawn(async move { self.run_loop(tx, stop_rx).await });

    Subscription {
      notices,
      handle: StreamHandle { stop: stop_tx, task },
    }
  }

  async fn run_loop(self, tx: mpsc::Sender<UpdateNotice>, mut stop: watch::Receiver<bool>) {
    let mut delay = self.config.reconnect_initial;
    let mut parser = SseParser::new();

    loop {
      parser.reset();
      let outcome = tokio::select! {
        outcome = self.connect_and_stream(&tx, &mut parser, &mut delay) => outcome,
        _ = stop.wait_for(|stop| *stop) => return,
      };

      match outcome {
        Ok(Ended::Stop) => return,
        Ok(Ended::Disconnected(reason)) => {
          tracing::info!(reason, "update stream disconnected");
        }
        Err(e) => {
          tracing::warn!(error = %e, reconnect_in_ms = delay.as_millis() as u64, "update stream failed");
        }
      }

      tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = stop.wait_for(|stop| *stop) => return,
      }
      delay = (delay * 2).min(self.config.reconnect_max);
    }
  }

  async fn connect_and_stream(
    &self,
    tx: &mpsc::Sender<UpdateNotice>,
    parser: &mut SseParser,
    delay: &mut Duration,
  ) -> Result<Ended> {
    tracing::info!(url = %self.url, "connecting to update stream");

    let resp = self
      .http
      .get(&self.url)
      .header(reqwest::header::ACCEPT, "text/event-stream")
      .send()
      .await?;
    if !resp.status().is_success() {
      return Err(Error::Status { status: resp.status(), url: self.url.clone() });
    }

    *delay = self.config.reconnect_initial;
    let mut body = resp.bytes_stream();
    let mut state = FeedState::default();

    while let Some(chunk) = body.next().await {
      let chunk: bytes::Bytes = chunk?;
      for event in parser.feed(&chunk) {
        match state.apply(&event) {
          Ok(Decoded::Notice(notice)) => {
            if tx.send(notice).await.is_err() {
              return Ok(Ended::Stop);
            }
          }
          Ok(Decoded::Skip) => {}
          Ok(Decoded::Close(reason)) => return Ok(Ended::Disconnected(reason)),
          Err(e) => {
            tracing::warn!(error = %e, event = ?event.event, "undecodable update event");
          }
        }
      }
    }
    Ok(Ended::Disconnected("stream ended"))
  }
}

enum Decoded {
  Notice(UpdateNotice),
  Skip,
  Close(&'static str),
}

// ─── Value cache ─────────────────────────────────────────────────────────────

/// Local copy of the `updates` value for one connection.
#[derive(Debug, Default)]
struct FeedState {
  value: Value,
}

impl FeedState {
  /// Apply one event to the cached value and report the lists it touched.
  fn apply(&mut self, event: &SseEvent) -> Result<Decoded> {
    let patch = match event.event.as_deref() {
      Some("put") => false,
      Some("patch") => true,
      Some("cancel") => return Ok(Decoded::Close("cancelled by server")),
      Some("auth_revoked") => return Ok(Decoded::Close("auth revoked")),
      _ => return Ok(Decoded::Skip),
    };
    let FirebaseEvent { path, data } = serde_json::from_str(&event.data)?;
    let path: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let touched: Vec<String> = match path.first() {
      Some(top) => vec![(*top).to_owned()],
      None if patch => data.as_object().map(|m| m.keys().cloned().collect()).unwrap_or_default(),
      None => vec![ITEMS.to_owned(), PROFILES.to_owned()],
    };

    match data {
      Value::Object(fields) if patch => {
        for (key, value) in fields {
          put(&mut self.value, path.iter().copied().chain([key.as_str()]), value);
        }
      }
      data => put(&mut self.value, path.iter().copied(), data),
    }

    let touches = |list: &str| touched.iter().any(|key| key == list);
    let mut notice = UpdateNotice::default();
    if touches(ITEMS) {
      notice.items = entries(self.value.get(ITEMS))
        .into_iter()
        .filter_map(Value::as_i64)
        .collect();
    }
    if touches(PROFILES) {
      notice.profiles = entries(self.value.get(PROFILES))
        .into_iter()
        .filter_map(Value::as_str)
        .map(str::to_owned)
        .collect();
    }

    if notice.is_empty() { Ok(Decoded::Skip) } else { Ok(Decoded::Notice(notice)) }
  }
}

/// Replace the value at `path` below `root`, creating parents as needed.
fn put<'p>(root: &mut Value, path: impl IntoIterator<Item = &'p str>, data: Value) {
  let node = path.into_iter().fold(root, child);
  *node = data;
}

/// The child of `node` under `key`. Firebase lists are objects keyed by
/// index, so a numeric key indexes an array and any other key turns the
/// node into an object.
fn child<'a>(node: &'a mut Value, key: &str) -> &'a mut Value {
  let index = key.parse::<usize>().ok();
  match (&mut *node, index) {
    (Value::Array(list), Some(index)) => {
      if list.len() <= index {
        list.resize(index + 1, Value::Null);
      }
    }
    (Value::Array(list), None) => {
      let list = std::mem::take(list);
      *node = list.into_iter().enumerate().map(|(i, v)| (i.to_string(), v)).collect();
    }
    (Value::Object(_), _) => {}
    (other, _) => *other = Value::Null,
  }
  match index {
    Some(index) if node.is_array() => &mut node[index],
    _ => &mut node[key],
  }
}

/// Members of a list value, whether Firebase sent it as an array or as an
/// index-keyed object.
fn entries(list: Option<&Value>) -> Vec<&Value> {
  match list {
    Some(Value::Array(list)) => list.iter().collect(),
    Some(Value::Object(map)) => map.values().collect(),
    _ => Vec::new(),
  }
}

// ─── Handle ──────────────────────────────────────────────────────────────────

/// Stops the connection task started by [`UpdateStream::start`].
pub struct StreamHandle {
  stop: watch::Sender<bool>,
  task: JoinHandle<()>,
}

impl FeedHandle for StreamHandle {
  type Error = Error;

  async fn close(self) -> Result<()> {
    // The task may already be gone; that is not an error.
    let _ = self.stop.send(true);
    match tokio::time::timeout(CLOSE_TIMEOUT, self.task).await {
      Ok(joined) => joined.map_err(Error::from),
      Err(_) => Err(Error::CloseTimeout),
    }
  }
}

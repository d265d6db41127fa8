//! Incremental parser for `text/event-stream` bodies.
//!
//! Bytes are buffered until a full line is available, so multi-byte UTF-8
//! sequences split across network chunks decode correctly. A blank line
//! dispatches the event being built; `:` lines are keep-alive comments.

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
  /// The `event:` field; `None` when the server sent only data.
  pub event: Option<String>,
  /// All `data:` lines of the event joined with `\n`.
  pub data:  String,
}

#[derive(Debug, Default)]
pub struct SseParser {
  pending: Vec<u8>,
  event:   Option<String>,
  data:    Vec<String>,
}

impl SseParser {
  pub fn new() -> Self { Self::default() }

  /// Feed a chunk of the body and return every event it completed.
  pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
    self.pending.extend_from_slice(chunk);

    let mut events = Vec::new();
    while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
      let raw: Vec<u8> = self.pending.drain(..=pos).collect();
      let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
      let line = line.strip_suffix('\r').unwrap_or(&line);

      if line.is_empty() {
        if let Some(event) = self.dispatch() {
          events.push(event);
        }
        continue;
      }
      if line.starts_with(':') {
        continue;
      }

      let (field, value) = match line.split_once(':') {
        Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
        None => (line, ""),
      };
      match field {
        "event" => self.event = Some(value.to_owned()),
        "data" => self.data.push(value.to_owned()),
        // `id` and `retry` carry nothing the update feed uses.
        _ => {}
      }
    }
    events
  }

  /// Forget any partially received event, e.g. after a reconnect.
  pub fn reset(&mut self) {
    self.pending.clear();
    self.event = None;
    self.data.clear();
  }

  fn dispatch(&mut self) -> Option<SseEvent> {
    if self.event.is_none() && self.data.is_empty() {
      return None;
    }
    let data = self.data.join("\n");
    self.data.clear();
    Some(SseEvent { event: self.event.take(), data })
  }
}

//! In-memory fakes shared by the pipeline's unit and integration tests.

use std::{
  collections::HashMap,
  fmt,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
  },
};

use hnsync_core::{
  FetchError, Item, ItemId, ItemKind, KidEdge, User,
  feed::FeedHandle,
  sink::{RecordSink, SinkWrite, WritePolicy},
  source::ItemSource,
};
use hnsync_store_sqlite::SqliteSink;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FakeError {
  transient: bool,
}

impl FakeError {
  pub fn transient() -> Self { Self { transient: true } }

  pub fn permanent() -> Self { Self { transient: false } }
}

impl fmt::Display for FakeError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.transient { f.write_str("fake transient failure") } else { f.write_str("fake failure") }
  }
}

impl std::error::Error for FakeError {}

impl FetchError for FakeError {
  fn is_transient(&self) -> bool { self.transient }
}

// ─── Records ─────────────────────────────────────────────────────────────────

pub fn story(id: ItemId, title: &str) -> Item {
  Item {
    kind: Some(ItemKind::Story),
    by: Some(format!("user{}", id % 3)),
    time: Some(1_175_714_200 + id),
    title: Some(title.into()),
    ..Item::new(id)
  }
}

pub fn user(handle: &str) -> User {
  User {
    id:        handle.into(),
    created:   1_173_923_446,
    karma:     1,
    about:     None,
    submitted: None,
  }
}

// ─── Source ──────────────────────────────────────────────────────────────────

type FetchHook = Box<dyn Fn(ItemId, &mut HashMap<ItemId, Item>) + Send + Sync>;

/// An [`ItemSource`] over in-memory maps with a fetch log, injectable
/// failures and a hook that runs after every item fetch.
#[derive(Default)]
pub struct FakeSource {
  items:             Mutex<HashMap<ItemId, Item>>,
  users:             Mutex<HashMap<String, User>>,
  max_item:          ItemId,
  failures:          Mutex<HashMap<ItemId, (usize, bool)>>,
  max_item_failures: Mutex<(usize, bool)>,
  hook:              Option<FetchHook>,
  log:               Mutex<Vec<ItemId>>,
}

impl FakeSource {
  /// A source holding a story for each of `ids`; `max_item` is the largest.
  pub fn with_stories(ids: &[ItemId]) -> Self {
    let items = ids.iter().map(|&id| (id, story(id, &format!("story {id}")))).collect();
    Self {
      items: Mutex::new(items),
      max_item: ids.iter().copied().max().unwrap_or(0),
      ..Self::default()
    }
  }

  pub fn with_max_item(mut self, max: ItemId) -> Self {
    self.max_item = max;
    self
  }

  pub fn with_item(self, item: Item) -> Self {
    self.items.lock().unwrap().insert(item.id, item);
    self
  }

  pub fn with_user(self, user: User) -> Self {
    self.users.lock().unwrap().insert(user.id.clone(), user);
    self
  }

  /// Fail the next `times` fetches of `id`.
  pub fn failing(self, id: ItemId, times: usize, transient: bool) -> Self {
    self.failures.lock().unwrap().insert(id, (times, transient));
    self
  }

  /// Fail the next `times` calls to `max_item`.
  pub fn failing_max_item(self, times: usize, transient: bool) -> Self {
    *self.max_item_failures.lock().unwrap() = (times, transient);
    self
  }

  pub fn on_fetch(
    mut self,
    hook: impl Fn(ItemId, &mut HashMap<ItemId, Item>) + Send + Sync + 'static,
  ) -> Self {
    self.hook = Some(Box::new(hook));
    self
  }

  /// Every item ID requested so far, in request order.
  pub fn fetched(&self) -> Vec<ItemId> { self.log.lock().unwrap().clone() }

  pub fn fetch_count(&self, id: ItemId) -> usize {
    self.log.lock().unwrap().iter().filter(|&&f| f == id).count()
  }
}

impl ItemSource for FakeSource {
  type Error = FakeError;

  async fn fetch_item(&self, id: ItemId) -> Result<Option<Item>, FakeError> {
    tokio::task::yield_now().await;
    self.log.lock().unwrap().push(id);

    {
      let mut failures = self.failures.lock().unwrap();
      if let Some((left, transient)) = failures.get_mut(&id)
        && *left > 0
      {
        *left -= 1;
        return Err(FakeError { transient: *transient });
      }
    }

    let mut items = self.items.lock().unwrap();
    let found = items.get(&id).cloned();
    if let Some(hook) = &self.hook {
      hook(id, &mut *items);
    }
    Ok(found)
  }

  async fn fetch_user(&self, handle: &str) -> Result<Option<User>, FakeError> {
    tokio::task::yield_now().await;
    Ok(self.users.lock().unwrap().get(handle).cloned())
  }

  async fn max_item(&self) -> Result<ItemId, FakeError> {
    let mut failures = self.max_item_failures.lock().unwrap();
    if failures.0 > 0 {
      failures.0 -= 1;
      return Err(FakeError { transient: failures.1 });
    }
    Ok(self.max_item)
  }
}

// ─── Sink ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SinkError(pub String);

impl fmt::Display for SinkError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl std::error::Error for SinkError {}

fn wrap(e: hnsync_store_sqlite::Error) -> SinkError { SinkError(e.to_string()) }

/// An in-memory [`SqliteSink`] whose writes or close can be made to fail.
///
/// `close` only records the call and leaves the database open, so tests
/// can inspect what a finished run wrote.
pub struct FlakySink {
  pub inner:   SqliteSink,
  fail_writes: AtomicBool,
  fail_close:  bool,
  closed:      AtomicBool,
}

impl FlakySink {
  pub async fn new() -> Self {
    Self {
      inner:       SqliteSink::open_in_memory().await.unwrap(),
      fail_writes: AtomicBool::new(false),
      fail_close:  false,
      closed:      AtomicBool::new(false),
    }
  }

  pub fn closed(&self) -> bool { self.closed.load(Ordering::SeqCst) }

  pub fn failing_close(mut self) -> Self {
    self.fail_close = true;
    self
  }

  pub fn fail_writes(&self) { self.fail_writes.store(true, Ordering::SeqCst); }

  fn check_writes(&self) -> Result<(), SinkError> {
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(SinkError("disk full".into()));
    }
    Ok(())
  }
}

impl RecordSink for FlakySink {
  type Error = SinkError;

  async fn write_items(&self, items: Vec<Item>, policy: WritePolicy) -> Result<SinkWrite, SinkError> {
    self.check_writes()?;
    self.inner.write_items(items, policy).await.map_err(wrap)
  }

  async fn write_users(&self, users: Vec<User>, policy: WritePolicy) -> Result<SinkWrite, SinkError> {
    self.check_writes()?;
    self.inner.write_users(users, policy).await.map_err(wrap)
  }

  async fn max_item_id(&self) -> Result<ItemId, SinkError> {
    self.inner.max_item_id().await.map_err(wrap)
  }

  async fn record_absent(&self, ids: Vec<ItemId>) -> Result<usize, SinkError> {
    self.check_writes()?;
    self.inner.record_absent(ids).await.map_err(wrap)
  }

  async fn missing_item_ids(&self, upper: ItemId, limit: usize) -> Result<Vec<ItemId>, SinkError> {
    self.inner.missing_item_ids(upper, limit).await.map_err(wrap)
  }

  async fn missing_authors(&self) -> Result<Vec<String>, SinkError> {
    self.inner.missing_authors().await.map_err(wrap)
  }

  async fn get_item(&self, id: ItemId) -> Result<Option<Item>, SinkError> {
    self.inner.get_item(id).await.map_err(wrap)
  }

  async fn get_kids(&self, id: ItemId) -> Result<Vec<KidEdge>, SinkError> {
    self.inner.get_kids(id).await.map_err(wrap)
  }

  async fn get_user(&self, handle: &str) -> Result<Option<User>, SinkError> {
    self.inner.get_user(handle).await.map_err(wrap)
  }

  async fn close(&self) -> Result<(), SinkError> {
    self.closed.store(true, Ordering::SeqCst);
    if self.fail_close {
      return Err(SinkError("fsync failed".into()));
    }
    Ok(())
  }
}

// ─── Feed ────────────────────────────────────────────────────────────────────

/// A [`FeedHandle`] that records whether it was closed.
pub struct FakeFeed {
  pub closed: Arc<AtomicBool>,
  fail:       bool,
}

impl FakeFeed {
  pub fn new() -> Self {
    Self { closed: Arc::new(AtomicBool::new(false)), fail: false }
  }

  pub fn failing() -> Self {
    Self { fail: true, ..Self::new() }
  }
}

impl FeedHandle for FakeFeed {
  type Error = FakeError;

  async fn close(self) -> Result<(), FakeError> {
    self.closed.store(true, Ordering::SeqCst);
    if self.fail {
      return Err(FakeError::permanent());
    }
    Ok(())
  }
}

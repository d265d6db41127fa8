//! Async HTTP client for the Hacker News Firebase REST API.

use std::time::Duration;

use hnsync_core::{Item, ItemId, User, source::ItemSource};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";

/// Connection settings for the source API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
  pub base_url: String,
  pub timeout:  Duration,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_string(),
      timeout:  Duration::from_secs(30),
    }
  }
}

/// Async HTTP client for the source API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HnClient {
  client: Client,
  config: ClientConfig,
}

impl HnClient {
  pub fn new(config: ClientConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()?;
    Ok(Self { client, config })
  }

  pub(crate) fn url(&self, path: &str) -> String {
    format!("{}/{}.json", self.config.base_url.trim_end_matches('/'), path)
  }

  /// `GET {base}/{path}.json`, mapping both `404` and a JSON `null` body to
  /// `None`.
  async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
    let url = self.url(path);
    let resp = self.client.get(&url).send().await?;

    if resp.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    if !resp.status().is_success() {
      return Err(Error::Status { status: resp.status(), url });
    }
    let body = resp.bytes().await?;
    Ok(serde_json::from_slice::<Option<T>>(&body)?)
  }
}

impl ItemSource for HnClient {
  type Error = Error;

  /// `GET /item/<id>.json`
  async fn fetch_item(&self, id: ItemId) -> Result<Option<Item>> {
    self.get_optional(&format!("item/{id}")).await
  }

  /// `GET /user/<handle>.json`
  async fn fetch_user(&self, handle: &str) -> Result<Option<User>> {
    self.get_optional(&format!("user/{handle}")).await
  }

  /// `GET /maxitem.json`
  async fn max_item(&self) -> Result<ItemId> {
    let url = self.url("maxitem");
    let resp = self.client.get(&url).send().await?;
    if !resp.status().is_success() {
      return Err(Error::Status { status: resp.status(), url });
    }
    Ok(resp.json().await?)
  }
}

#[cfg(test)]
mod tests {
  use axum::{Router, extract::Path, http::StatusCode, response::IntoResponse, routing::get};
  use hnsync_core::FetchError as _;
  use tokio::net::TcpListener;

  use super::*;

  async fn item_handler(Path(file): Path<String>) -> impl IntoResponse {
    match file.as_str() {
      "8863.json" => (
        StatusCode::OK,
        r#"{"by":"dhouston","id":8863,"kids":[9224,8917],"time":1175714200,"type":"story"}"#,
      ),
      "2.json" => (StatusCode::OK, "null"),
      "500.json" => (StatusCode::INTERNAL_SERVER_ERROR, "boom"),
      _ => (StatusCode::NOT_FOUND, ""),
    }
  }

  async fn user_handler(Path(file): Path<String>) -> impl IntoResponse {
    match file.as_str() {
      "jl.json" => (StatusCode::OK, r#"{"id":"jl","created":1173923446,"karma":2937}"#),
      _ => (StatusCode::OK, "null"),
    }
  }

  /// Serve a fake API on an ephemeral port and return a client pointed at it.
  async fn client() -> HnClient {
    let app = Router::new()
      .route("/v0/item/{file}", get(item_handler))
      .route("/v0/user/{file}", get(user_handler))
      .route("/v0/maxitem.json", get(|| async { "41234567" }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    HnClient::new(ClientConfig {
      base_url: format!("http://{addr}/v0/"),
      timeout:  Duration::from_secs(5),
    })
    .unwrap()
  }

  #[test]
  fn url_joins_base_and_path() {
    let c = HnClient::new(ClientConfig::default()).unwrap();
    assert_eq!(c.url("item/1"), "https://hacker-news.firebaseio.com/v0/item/1.json");
  }

  #[tokio::test]
  async fn fetches_item() {
    let c = client().await;
    let item = c.fetch_item(8863).await.unwrap().unwrap();
    assert_eq!(item.by.as_deref(), Some("dhouston"));
    assert_eq!(item.kids, Some(vec![9224, 8917]));
  }

  #[tokio::test]
  async fn null_body_and_404_are_absent() {
    let c = client().await;
    assert!(c.fetch_item(2).await.unwrap().is_none());
    assert!(c.fetch_item(3).await.unwrap().is_none());
    assert!(c.fetch_user("nobody").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn server_error_is_transient() {
    let c = client().await;
    let err = c.fetch_item(500).await.unwrap_err();
    assert!(err.is_transient(), "{err}");
  }

  #[tokio::test]
  async fn fetches_user_and_max_item() {
    let c = client().await;
    let user = c.fetch_user("jl").await.unwrap().unwrap();
    assert_eq!(user.karma, 2937);
    assert!(user.submitted.is_none());
    assert_eq!(c.max_item().await.unwrap(), 41234567);
  }
}

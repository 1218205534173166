//! Signed-in store: PostgREST tables on the hosted database.

use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{Filter, Query, Store, Table};
use crate::error::StoreError;

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteConfig {
  /// Project URL, e.g. https://xyz.supabase.co
  pub base_url: String,
  pub anon_key: String,
  /// Session token of the signed-in user; falls back to the anon key
  pub access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostgrestError {
  message: String,
}

/// ---------------------------------------------------------------------------
/// Client
/// ---------------------------------------------------------------------------

pub struct RemoteStore {
  client: Client,
  rest_url: Url,
  config: RemoteConfig,
}

impl RemoteStore {
  pub fn new(config: RemoteConfig) -> Result<Self, StoreError> {
    let mut base = config.base_url.clone();
    if !base.ends_with('/') {
      base.push('/');
    }
    let rest_url = Url::parse(&base)?.join("rest/v1/")?;

    Ok(Self {
      client: Client::new(),
      rest_url,
      config,
    })
  }

  fn endpoint(&self, table: Table) -> Result<Url, StoreError> {
    Ok(self.rest_url.join(table.as_str())?)
  }

  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    let token = self
      .config
      .access_token
      .as_deref()
      .unwrap_or(&self.config.anon_key);

    self
      .client
      .request(method, url)
      .header("apikey", &self.config.anon_key)
      .header("Authorization", format!("Bearer {}", token))
  }

  async fn send(&self, request: RequestBuilder) -> Result<Vec<Value>, StoreError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
      let message = serde_json::from_str::<PostgrestError>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
      tracing::warn!("Remote store returned {}: {}", status, message);
      return Err(StoreError::Api {
        status: status.as_u16(),
        message,
      });
    }

    if body.trim().is_empty() {
      return Ok(Vec::new());
    }

    match serde_json::from_str::<Value>(&body)? {
      Value::Array(rows) => Ok(rows),
      other => Ok(vec![other]),
    }
  }

  fn first_row(rows: Vec<Value>, table: Table) -> Result<Value, StoreError> {
    rows
      .into_iter()
      .next()
      .ok_or_else(|| StoreError::InvalidRow(format!("no row returned from {}", table)))
  }
}

/// PostgREST literal for a filter value
fn literal(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Null => "null".to_string(),
    other => other.to_string(),
  }
}

fn in_list_item(value: &Value) -> String {
  match value {
    Value::String(s) => format!("\"{}\"", s.replace('"', "\\\"")),
    other => literal(other),
  }
}

fn filter_param(filter: &Filter) -> (String, String) {
  let column = filter.column().to_string();
  let expr = match filter {
    Filter::Eq(_, Value::Null) => "is.null".to_string(),
    Filter::Eq(_, v) => format!("eq.{}", literal(v)),
    Filter::Gte(_, v) => format!("gte.{}", literal(v)),
    Filter::Lte(_, v) => format!("lte.{}", literal(v)),
    Filter::In(_, values) => format!(
      "in.({})",
      values.iter().map(in_list_item).collect::<Vec<_>>().join(",")
    ),
  };
  (column, expr)
}

/// Append filters, ordering and limit as PostgREST query parameters
fn apply_query(url: &mut Url, query: &Query) {
  let mut pairs = url.query_pairs_mut();
  for filter in &query.filters {
    let (column, expr) = filter_param(filter);
    pairs.append_pair(&column, &expr);
  }
  if !query.order.is_empty() {
    let order = query
      .order
      .iter()
      .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
      .collect::<Vec<_>>()
      .join(",");
    pairs.append_pair("order", &order);
  }
  if let Some(limit) = query.limit {
    pairs.append_pair("limit", &limit.to_string());
  }
}

impl Store for RemoteStore {
  async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
    let mut url = self.endpoint(query.table)?;
    url.query_pairs_mut().append_pair("select", "*");
    apply_query(&mut url, query);

    self.send(self.request(Method::GET, url)).await
  }

  async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError> {
    let url = self.endpoint(table)?;
    let request = self
      .request(Method::POST, url)
      .header("Prefer", "return=representation")
      .json(&row);

    Self::first_row(self.send(request).await?, table)
  }

  async fn upsert(&self, table: Table, row: Value, on_conflict: &[&str]) -> Result<Value, StoreError> {
    let mut url = self.endpoint(table)?;
    url
      .query_pairs_mut()
      .append_pair("on_conflict", &on_conflict.join(","));
    let request = self
      .request(Method::POST, url)
      .header("Prefer", "resolution=merge-duplicates,return=representation")
      .json(&row);

    Self::first_row(self.send(request).await?, table)
  }

  async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>, StoreError> {
    let mut url = self.endpoint(query.table)?;
    apply_query(&mut url, query);
    let request = self
      .request(Method::PATCH, url)
      .header("Prefer", "return=representation")
      .json(&patch);

    self.send(request).await
  }

  async fn delete(&self, query: &Query) -> Result<u64, StoreError> {
    let mut url = self.endpoint(query.table)?;
    apply_query(&mut url, query);
    let request = self
      .request(Method::DELETE, url)
      .header("Prefer", "return=representation");

    Ok(self.send(request).await?.len() as u64)
  }
}

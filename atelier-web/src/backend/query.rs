//! Table access over the backend's REST surface.

use super::client::{decode, to_body, Authorization, BackendClient};
use super::error::{BackendError, RemoteCallError};
use reqwest::header::{HeaderName, HeaderValue, ACCEPT};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn as_str(self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        }
    }
}

/// A query against one table. Filters accumulate; a terminal method sends it.
#[must_use = "queries do nothing until a terminal method is awaited"]
pub struct TableQuery<'a> {
    client: &'a BackendClient,
    table: String,
    columns: Option<String>,
    filters: Vec<(String, String)>,
    order: Vec<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl<'a> TableQuery<'a> {
    pub(crate) fn new(client: &'a BackendClient, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
            columns: None,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.columns = Some(columns.to_string());
        self
    }

    pub fn eq(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, "eq", value)
    }

    pub fn neq(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, "neq", value)
    }

    /// Case-insensitive match; `*` is the wildcard.
    pub fn ilike(self, column: &str, pattern: &str) -> Self {
        self.filter(column, "ilike", pattern)
    }

    pub fn order(mut self, column: &str, order: Order) -> Self {
        self.order.push(format!("{}.{}", column, order.as_str()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Inclusive row range, zero based.
    pub fn range(mut self, from: usize, to: usize) -> Self {
        self.offset = Some(from);
        self.limit = Some(to.saturating_sub(from) + 1);
        self
    }

    fn filter(mut self, column: &str, operator: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), format!("{}.{}", operator, value.to_string())));
        self
    }

    fn url(&self, with_modifiers: bool) -> Url {
        let mut url = self.client.url(&["rest", "v1", self.table.as_str()]);
        {
            let mut query = url.query_pairs_mut();
            if let Some(columns) = &self.columns {
                query.append_pair("select", columns);
            }
            for (column, expression) in &self.filters {
                query.append_pair(column, expression);
            }
            if with_modifiers {
                if !self.order.is_empty() {
                    query.append_pair("order", &self.order.join(","));
                }
                if let Some(limit) = self.limit {
                    query.append_pair("limit", &limit.to_string());
                }
                if let Some(offset) = self.offset {
                    query.append_pair("offset", &offset.to_string());
                }
            }
        }

        // query_pairs_mut leaves a dangling `?` when nothing was appended.
        if url.query() == Some("") {
            url.set_query(None);
        }
        url
    }

    fn require_filter(&self, operation: &str) -> Result<(), BackendError> {
        if self.filters.is_empty() {
            return Err(RemoteCallError::invalid_request(format!(
                "refusing unfiltered {} on {}",
                operation, self.table
            ))
            .into());
        }
        Ok(())
    }

    pub async fn fetch<T: DeserializeOwned>(self) -> Result<Vec<T>, BackendError> {
        let response = self
            .client
            .send(
                Method::GET,
                self.url(true),
                Vec::new(),
                None,
                Authorization::Session,
                "rest",
            )
            .await?;
        decode(response).await
    }

    /// Exactly one row. Zero rows is [`NotFound`](super::RemoteErrorKind::NotFound).
    pub async fn fetch_one<T: DeserializeOwned>(self) -> Result<T, BackendError> {
        let response = self
            .client
            .send(
                Method::GET,
                self.url(true),
                vec![(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT))],
                None,
                Authorization::Session,
                "rest",
            )
            .await?;
        decode(response).await
    }

    /// Insert one row or an array of rows and return what was stored.
    pub async fn insert<B, T>(self, rows: &B) -> Result<Vec<T>, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = to_body(rows)?;
        let response = self
            .client
            .send(
                Method::POST,
                self.url(false),
                prefer("return=representation"),
                Some(body),
                Authorization::Session,
                "rest",
            )
            .await?;
        decode(response).await
    }

    /// Insert without reading the row back, for callers that may write but not select.
    pub async fn insert_minimal<B>(self, rows: &B) -> Result<(), BackendError>
    where
        B: Serialize + ?Sized,
    {
        let body = to_body(rows)?;
        self.client
            .send(
                Method::POST,
                self.url(false),
                prefer("return=minimal"),
                Some(body),
                Authorization::Session,
                "rest",
            )
            .await?;
        Ok(())
    }

    /// Patch every row matching the filters. At least one filter is required.
    pub async fn update<B, T>(self, patch: &B) -> Result<Vec<T>, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.require_filter("update")?;
        let body = to_body(patch)?;
        let response = self
            .client
            .send(
                Method::PATCH,
                self.url(false),
                prefer("return=representation"),
                Some(body),
                Authorization::Session,
                "rest",
            )
            .await?;
        decode(response).await
    }

    /// Delete every row matching the filters and return how many went.
    pub async fn delete(self) -> Result<usize, BackendError> {
        self.require_filter("delete")?;
        let response = self
            .client
            .send(
                Method::DELETE,
                self.url(false),
                prefer("return=representation"),
                None,
                Authorization::Session,
                "rest",
            )
            .await?;
        let deleted: Vec<Value> = decode(response).await?;
        Ok(deleted.len())
    }

    /// Exact row count for the filters, without fetching rows.
    pub async fn count(self) -> Result<u64, BackendError> {
        let response = self
            .client
            .send(
                Method::HEAD,
                self.url(false),
                prefer("count=exact"),
                None,
                Authorization::Session,
                "rest",
            )
            .await?;

        response
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| RemoteCallError::unexpected("missing row count in Content-Range").into())
    }
}

fn prefer(value: &'static str) -> Vec<(HeaderName, HeaderValue)> {
    vec![(
        HeaderName::from_static("prefer"),
        HeaderValue::from_static(value),
    )]
}

/// Total from `0-24/3573` or `*/0`.
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::client::{Credential, CredentialKind};
    use secrecy::Secret;

    fn client() -> BackendClient {
        BackendClient::new(
            reqwest::Client::new(),
            Url::parse("http://localhost:54321").unwrap(),
            Credential::new(CredentialKind::Public, Secret::new("anon".to_string())),
            None,
        )
    }

    #[test]
    fn builds_filtered_ordered_url() {
        let c = client();
        let url = c
            .from("projects")
            .select("id,title")
            .eq("featured", true)
            .order("created_at", Order::Desc)
            .range(10, 19)
            .url(true);

        assert_eq!(url.path(), "/rest/v1/projects");
        assert_eq!(
            url.query(),
            Some("select=id%2Ctitle&featured=eq.true&order=created_at.desc&limit=10&offset=10")
        );
    }

    #[test]
    fn write_urls_skip_modifiers() {
        let c = client();
        let url = c.from("customers").eq("id", 7).limit(5).url(false);
        assert_eq!(url.query(), Some("id=eq.7"));

        let bare = c.from("customers").url(false);
        assert_eq!(bare.query(), None);
    }

    #[test]
    fn negated_filter() {
        let c = client();
        let url = c.from("customers").neq("status", "lost").url(true);
        assert_eq!(url.query(), Some("status=neq.lost"));
    }

    #[test]
    fn ilike_pattern_is_encoded() {
        let c = client();
        let url = c.from("customers").ilike("name", "*o'brien*").url(true);
        assert_eq!(url.query(), Some("name=ilike.*o%27brien*"));
    }

    #[tokio::test]
    async fn unfiltered_delete_is_refused_locally() {
        let c = client();
        let err = c.from("projects").delete().await.unwrap_err();
        assert_eq!(err.kind(), Some(crate::backend::RemoteErrorKind::InvalidRequest));
    }

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_content_range("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("*/*"), None);
    }
}

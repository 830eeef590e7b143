//! Local analytics API adapter
//!
//! The local API pages with `skip`/`limit` query parameters and wraps
//! paginated results as `{total, skip, limit, items}`. Non-paginated
//! endpoints return either a bare array or a single object; both are
//! normalized to rows.

use super::{map_reqwest_error, CallError, DataEndpoint, ParamMap};
use crate::config::LocalApiConfig;
use crate::paginate::value_at_path;
use crate::registry::OperationDescriptor;
use async_trait::async_trait;
use sdk::types::{Cursor, Page};
use std::time::Duration;

pub struct LocalApiEndpoint {
    base_url: String,
    page_size: u64,
    client: reqwest::Client,
}

impl LocalApiEndpoint {
    pub fn new(config: &LocalApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            client,
        }
    }
}

#[async_trait]
impl DataEndpoint for LocalApiEndpoint {
    async fn fetch(
        &self,
        op: &OperationDescriptor,
        params: &ParamMap,
        cursor: Option<&Cursor>,
    ) -> Result<Page, CallError> {
        let (path, remaining) = super::fill_path_template(&op.path, params)?;
        let url = format!("{}{}", self.base_url, path);

        let mut query: Vec<(String, String)> = remaining
            .iter()
            .map(|(k, v)| (k.clone(), super::value_to_segment(v)))
            .collect();

        let skip = match cursor {
            Some(Cursor::Offset(offset)) => *offset,
            Some(Cursor::Key(_)) => {
                return Err(CallError::Decode(format!(
                    "Operation '{}' pages by offset but received a key cursor",
                    op.name
                )))
            }
            None => 0,
        };

        if op.paginated.is_some() {
            query.push(("skip".into(), skip.to_string()));
            query.push(("limit".into(), self.page_size.to_string()));
        }

        tracing::debug!("GET {} (skip={})", url, skip);

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 429 {
                return Err(CallError::RateLimited);
            }
            let body = response.text().await.unwrap_or_default();
            return Err(CallError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CallError::Decode(e.to_string()))?;

        let Some(pagination) = &op.paginated else {
            // Bare arrays become rows; single objects become one row
            return Ok(match data {
                serde_json::Value::Array(items) => Page::last(items),
                other => Page::last(vec![other]),
            });
        };

        let rows = match value_at_path(&data, &pagination.rows_path) {
            Some(serde_json::Value::Array(items)) => items.clone(),
            _ => {
                return Err(CallError::Decode(format!(
                    "No row list at '{}' in response for '{}'",
                    pagination.rows_path, op.name
                )))
            }
        };

        let total = data.get("total").and_then(|t| t.as_u64());
        let fetched = skip + rows.len() as u64;
        let next_cursor = match total {
            Some(total) if fetched < total && !rows.is_empty() => Some(Cursor::Offset(fetched)),
            // Without a reported total, a full page implies there may be more
            None if rows.len() as u64 == self.page_size => Some(Cursor::Offset(fetched)),
            _ => None,
        };

        Ok(Page {
            rows,
            next_cursor,
            total,
        })
    }
}

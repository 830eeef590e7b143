//! Upstream Cosmos REST API adapter
//!
//! Translates registry operations into Cosmos REST calls: fills `{param}`
//! path templates, passes remaining parameters as query parameters, and
//! speaks the `pagination.key` / `pagination.limit` convention. The first
//! page requests `pagination.count_total` so the walker can report total
//! row counts when the provider supplies them.

use super::{map_reqwest_error, CallError, DataEndpoint, ParamMap};
use crate::config::UpstreamConfig;
use crate::paginate::value_at_path;
use crate::registry::OperationDescriptor;
use async_trait::async_trait;
use sdk::types::{Cursor, Page};
use std::time::Duration;

pub struct CosmosEndpoint {
    base_url: String,
    page_size: u64,
    client: reqwest::Client,
}

impl CosmosEndpoint {
    pub fn new(config: &UpstreamConfig) -> Self {
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
impl DataEndpoint for CosmosEndpoint {
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

        if op.paginated.is_some() {
            query.push(("pagination.limit".into(), self.page_size.to_string()));
            match cursor {
                Some(Cursor::Key(key)) => {
                    query.push(("pagination.key".into(), key.clone()));
                }
                Some(Cursor::Offset(offset)) => {
                    // Cosmos also accepts numeric offsets; not used by the
                    // builtin catalog but kept for completeness
                    query.push(("pagination.offset".into(), offset.to_string()));
                }
                None => {
                    query.push(("pagination.count_total".into(), "true".into()));
                }
            }
        }

        tracing::debug!("GET {} ({} query params)", url, query.len());

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
            // Non-paginated operations yield the whole response as one row
            return Ok(Page::last(vec![data]));
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

        let next_cursor = data
            .get("pagination")
            .and_then(|p| p.get("next_key"))
            .and_then(|k| k.as_str())
            .filter(|k| !k.is_empty())
            .map(|k| Cursor::Key(k.to_string()));

        let total = data
            .get("pagination")
            .and_then(|p| p.get("total"))
            .and_then(|t| match t {
                serde_json::Value::String(s) => s.parse::<u64>().ok(),
                other => other.as_u64(),
            })
            .filter(|t| *t > 0);

        Ok(Page {
            rows,
            next_cursor,
            total,
        })
    }
}

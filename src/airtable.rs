//! Read-only client for the Airtable-style layout and tone tables.
//!
//! The core loop only needs two questions answered: "give me the field
//! descriptions for layout L" and "give me the tone guide for company C".
//! [`TableSource`] answers both from `/v0/{base}/{table}` with bearer-token
//! auth. Failures surface as errors, never panics.

use crate::error::Result;
use crate::layout::Layout;
use crate::CopyfitError;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;

/// Default Airtable API root.
const DEFAULT_API_URL: &str = "https://api.airtable.com";

/// Read-only source for layout rows and company tone guides.
#[derive(Clone)]
pub struct TableSource {
    api_url: String,
    base_id: String,
    token: String,
    client: Client,
}

impl std::fmt::Debug for TableSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableSource")
            .field("api_url", &self.api_url)
            .field("base_id", &self.base_id)
            .field("token", &"***")
            .finish()
    }
}

impl TableSource {
    /// Create a source for one base with a personal access token.
    pub fn new(base_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            base_id: base_id.into(),
            token: token.into(),
            client: Client::new(),
        }
    }

    /// Override the API root (self-hosted proxies, tests).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a custom HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/v0/{}/{}", self.api_url, self.base_id, table)
    }

    /// Fetch every record's `fields` object from a table.
    async fn fetch_fields(&self, table: &str) -> Result<Vec<Value>> {
        let url = self.table_url(table);
        let resp = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CopyfitError::HttpError {
                status,
                body,
                retry_after: None,
            });
        }

        let json: Value = resp.json().await?;
        let records = json
            .get("records")
            .and_then(|r| r.as_array())
            .ok_or_else(|| {
                CopyfitError::Other(format!("table {} response has no records array", table))
            })?;

        Ok(records
            .iter()
            .filter_map(|r| r.get("fields").cloned())
            .collect())
    }

    /// Fetch a table of layout rows, sorted by layout number.
    ///
    /// Rows without a parseable layout number are skipped.
    pub async fn layouts(&self, table: &str) -> Result<Vec<Layout>> {
        let fields = self.fetch_fields(table).await?;
        Ok(layouts_from_records(&fields))
    }

    /// Fetch a company-name to tone-guide mapping.
    ///
    /// `name_field` and `tone_field` are the column names holding the
    /// company name and its tone/style text. Rows missing either are
    /// skipped.
    pub async fn tone_guides(
        &self,
        table: &str,
        name_field: &str,
        tone_field: &str,
    ) -> Result<HashMap<String, String>> {
        let fields = self.fetch_fields(table).await?;
        Ok(tone_map_from_records(&fields, name_field, tone_field))
    }
}

/// Map record field objects to layouts, sorted by layout number.
pub fn layouts_from_records(records: &[Value]) -> Vec<Layout> {
    let mut layouts: Vec<Layout> = records.iter().filter_map(Layout::from_record).collect();
    layouts.sort_by_key(|l| l.number);
    layouts
}

/// Map record field objects to a company -> tone guide mapping.
pub fn tone_map_from_records(
    records: &[Value],
    name_field: &str,
    tone_field: &str,
) -> HashMap<String, String> {
    records
        .iter()
        .filter_map(|fields| {
            let name = fields.get(name_field)?.as_str()?;
            let tone = fields.get(tone_field)?.as_str()?;
            Some((name.to_string(), tone.to_string()))
        })
        .collect()
}

//! Downtime ledger client
//!
//! Request/response accessor for historical incident records. No local
//! cache: callers re-query after a mutation.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::{FleetError, Result};
use crate::io::HttpClient;
use crate::types::DowntimeEvent;

/// Which slice of the incident history a query asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DowntimeFilter {
    /// Server-level outages that are still ongoing
    ServersDown,
    /// Camera-level outages that are still ongoing
    CamerasDown,
    /// Incidents that have recovered
    Completed,
}

impl DowntimeFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            DowntimeFilter::ServersDown => "servers_down",
            DowntimeFilter::CamerasDown => "cameras_down",
            DowntimeFilter::Completed => "completed",
        }
    }

    /// Canonical predicate: `up_at == None` discriminates ongoing incidents
    pub fn matches(&self, event: &DowntimeEvent) -> bool {
        match self {
            DowntimeFilter::ServersDown => event.is_server_level() && event.is_ongoing(),
            DowntimeFilter::CamerasDown => !event.is_server_level() && event.is_ongoing(),
            DowntimeFilter::Completed => !event.is_ongoing(),
        }
    }
}

/// Query parameters for the ledger
#[derive(Debug, Clone)]
pub struct DowntimeQuery {
    pub filter: DowntimeFilter,
    pub url: Option<String>,
    pub port: Option<u16>,
}

impl DowntimeQuery {
    pub fn new(filter: DowntimeFilter) -> Self {
        Self {
            filter,
            url: None,
            port: None,
        }
    }

    /// Scope the query to one server
    pub fn for_server(filter: DowntimeFilter, url: impl Into<String>, port: u16) -> Self {
        Self {
            filter,
            url: Some(url.into()),
            port: Some(port),
        }
    }
}

/// Deletion target: one event, or every event for a server
#[derive(Debug, Clone)]
pub enum DowntimeSelector {
    ById(i64),
    ByServer { url: String, port: u16 },
}

#[derive(Debug, Deserialize)]
struct DowntimeResponse {
    #[serde(default)]
    data: Vec<DowntimeEvent>,
}

/// Client for the downtime ledger endpoint
pub struct DowntimeClient {
    base_url: String,
    http: Arc<dyn HttpClient>,
}

impl DowntimeClient {
    pub fn new(base_url: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, http }
    }

    /// Fetch incident records matching the query.
    ///
    /// The filter predicate is re-applied to the response, so the `up_at`
    /// discriminator holds even when the backend ignores the parameter.
    pub async fn query(&self, query: &DowntimeQuery) -> Result<Vec<DowntimeEvent>> {
        let mut url = format!(
            "{}/downtime?filter={}",
            self.base_url,
            query.filter.as_str()
        );
        if let Some(server_url) = &query.url {
            url.push_str(&format!("&url={}", server_url));
        }
        if let Some(port) = query.port {
            url.push_str(&format!("&port={}", port));
        }

        let response = self.http.get(&url).await?;
        if !(200..300).contains(&response.status) {
            return Err(FleetError::Api {
                status: response.status,
                message: response.body,
            });
        }

        let parsed: DowntimeResponse = serde_json::from_str(&response.body)?;
        Ok(parsed
            .data
            .into_iter()
            .filter(|event| query.filter.matches(event))
            .collect())
    }

    /// Delete one event by id, or every event for a server by (url, port)
    pub async fn delete(&self, selector: &DowntimeSelector) -> Result<()> {
        let body = match selector {
            DowntimeSelector::ById(id) => serde_json::json!({ "id": id }),
            DowntimeSelector::ByServer { url, port } => {
                serde_json::json!({ "url": url, "port": port })
            }
        };

        let url = format!("{}/downtime", self.base_url);
        let response = self.http.delete_json(&url, &body.to_string()).await?;
        if !(200..300).contains(&response.status) {
            return Err(FleetError::Api {
                status: response.status,
                message: response.body,
            });
        }
        Ok(())
    }
}

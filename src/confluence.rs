//! Real Confluence REST client.
//!
//! Implements [`ConfluenceApi`] with `reqwest` and HTTP Basic auth
//! (email + API token). Endpoints:
//! - space by key: <https://developer.atlassian.com/cloud/confluence/rest/v1/>
//! - pages/children/title: <https://developer.atlassian.com/cloud/confluence/rest/v2/api-group-page/>
//! - two-step PDF export: <https://confluence.atlassian.com/confkb/rest-api-to-export-and-download-a-page-in-pdf-format-1388160685.html>
//!
//! The PDF export endpoint is undocumented glue: it answers with markup whose
//! meta tags embed a task/cloud id pair. That scraping is isolated in
//! [`extract_export_task`] so the pattern matching can change without
//! touching any orchestration logic.

use std::sync::LazyLock;

use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::contract::{ConfluenceApi, Credentials, ExportTask, PageId, SpaceId};
use crate::error::ApiError;

/// Export view of a page that contains nothing.
const EMPTY_PARAGRAPH_MARKER: &str = "<p />";

static TASK_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta\s+name="ajs-taskId"\s+content="([^"]+)""#).unwrap()
});
static CLOUD_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta\s+name="ajs-cloud-id"\s+content="([^"]+)""#).unwrap()
});

/// Confluence client over `reqwest`, holding the credentials for the
/// lifetime of a run. Cheap to clone; the inner client is pooled.
#[derive(Debug, Clone)]
pub struct RestConfluenceClient {
    http: Client,
    credentials: Credentials,
}

impl RestConfluenceClient {
    pub fn new(credentials: Credentials) -> Self {
        // Redirects stay enabled: the pdfpageexport action answers through
        // a redirect chain.
        Self {
            http: Client::new(),
            credentials,
        }
    }

    fn wiki_url(&self, path: &str) -> String {
        format!("https://{}/wiki{}", self.credentials.domain, path)
    }

    async fn get_authenticated(&self, url: &str) -> Result<Response, ApiError> {
        let response = self
            .http
            .get(url)
            .basic_auth(&self.credentials.email, Some(&self.credentials.api_token))
            .header("Accept", "application/json")
            .send()
            .await?;
        check_status(response).await
    }

    async fn get_json(&self, url: &str) -> Result<Value, ApiError> {
        let response = self.get_authenticated(url).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::Parse(format!("response from {url} is not JSON: {e}")))
    }

    /// Raw export view of a page, as the REST API renders it. The emptiness
    /// check compares this against the empty-paragraph marker.
    pub async fn get_export_view(&self, page_id: &PageId) -> Result<String, ApiError> {
        let url = self.wiki_url(&format!(
            "/rest/api/content/{page_id}?expand=body.export_view"
        ));
        let json = self.get_json(&url).await?;
        json.pointer("/body/export_view/value")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                ApiError::Parse(format!("page {page_id} response has no body.export_view.value"))
            })
    }
}

#[async_trait]
impl ConfluenceApi for RestConfluenceClient {
    async fn resolve_space_id(&self, space_key: &str) -> Result<SpaceId, ApiError> {
        let url = self.wiki_url(&format!("/rest/api/space/{space_key}"));
        let json = self.get_json(&url).await?;
        let id = match json.get("id") {
            // The v1 space API reports the id as a number.
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => {
                return Err(ApiError::Parse(format!(
                    "space {space_key} response has no id field"
                )))
            }
        };
        debug!(space_key, space_id = %id, "Resolved space id");
        Ok(SpaceId(id))
    }

    async fn resolve_homepage_id(&self, space_id: &SpaceId) -> Result<PageId, ApiError> {
        let url = self.wiki_url(&format!("/api/v2/spaces/{space_id}/pages"));
        let json = self.get_json(&url).await?;
        let results = json
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ApiError::Parse(format!("space {space_id} page list has no results array"))
            })?;

        // The homepage is the one page without a parent.
        for page in results {
            let parentless = page
                .get("parentType")
                .map(Value::is_null)
                .unwrap_or(true);
            if parentless {
                if let Some(id) = page.get("id").and_then(value_as_id) {
                    debug!(%space_id, homepage_id = %id, "Resolved homepage id");
                    return Ok(PageId(id));
                }
            }
        }
        Err(ApiError::HomepageNotFound)
    }

    async fn list_children(&self, page_id: &PageId) -> Result<Vec<(PageId, String)>, ApiError> {
        let url = self.wiki_url(&format!("/api/v2/pages/{page_id}/children"));
        let json = self.get_json(&url).await?;
        let Some(results) = json.get("results").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };

        let mut children = Vec::with_capacity(results.len());
        for child in results {
            let (Some(id), Some(title)) = (
                child.get("id").and_then(value_as_id),
                child.get("title").and_then(Value::as_str),
            ) else {
                return Err(ApiError::Parse(format!(
                    "child of page {page_id} is missing id or title"
                )));
            };
            children.push((PageId(id), title.to_owned()));
        }
        Ok(children)
    }

    async fn get_title(&self, page_id: &PageId) -> Result<String, ApiError> {
        let url = self.wiki_url(&format!("/api/v2/pages/{page_id}"));
        let json = self.get_json(&url).await?;
        json.get("title")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| ApiError::Parse(format!("page {page_id} response has no title")))
    }

    async fn is_empty(&self, page_id: &PageId) -> Result<bool, ApiError> {
        let content = self.get_export_view(page_id).await?;
        Ok(is_empty_marker(&content))
    }

    async fn initiate_pdf_export(&self, page_id: &PageId) -> Result<Option<String>, ApiError> {
        let export_url = self.wiki_url(&format!(
            "/spaces/flyingpdf/pdfpageexport.action?pageId={page_id}&unmatched-route=true"
        ));
        let response = self
            .http
            .get(&export_url)
            .basic_auth(&self.credentials.email, Some(&self.credentials.api_token))
            .header("X-Atlassian-Token", "no-check")
            .send()
            .await?;
        let response = check_status(response).await?;
        let html = response.text().await?;

        let Some(task) = extract_export_task(&html) else {
            warn!(%page_id, "Export markup carried no task/cloud id pair");
            return Ok(None);
        };

        let download_url = self.wiki_url(&format!(
            "/services/api/v1/download/pdf?taskId={}&cloudId={}",
            task.task_id, task.cloud_id
        ));
        let response = self.get_authenticated(&download_url).await?;
        let presigned_url = response.text().await?;
        debug!(%page_id, "Resolved presigned export URL");
        Ok(Some(presigned_url))
    }

    async fn fetch_export_pdf(&self, presigned_url: &str) -> Result<Option<Bytes>, ApiError> {
        // The presigned URL embeds its own authentication.
        let response = self.http.get(presigned_url).send().await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "Presigned download returned non-success status");
            return Ok(None);
        }
        let body = response.bytes().await?;
        Ok(Some(body))
    }
}

/// Pull the transient task/cloud id pair out of the export action's markup.
/// `None` if either meta tag is absent.
pub fn extract_export_task(html: &str) -> Option<ExportTask> {
    let task_id = TASK_ID_RE.captures(html)?.get(1)?.as_str().to_owned();
    let cloud_id = CLOUD_ID_RE.captures(html)?.get(1)?.as_str().to_owned();
    Some(ExportTask { task_id, cloud_id })
}

/// A page is empty when its export view is blank or the bare paragraph
/// Confluence writes for untouched pages.
pub fn is_empty_marker(export_view: &str) -> bool {
    export_view.is_empty() || export_view == EMPTY_PARAGRAPH_MARKER
}

fn value_as_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ApiError::Auth {
            status: status.as_u16(),
        });
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Remote {
        status: status.as_u16(),
        body,
    })
}

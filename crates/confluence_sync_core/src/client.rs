use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ENV_URL, Settings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Space {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageStatus {
    #[default]
    Current,
    Draft,
}

impl PageStatus {
    pub const LISTED: [PageStatus; 2] = [PageStatus::Current, PageStatus::Draft];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Draft => "draft",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "current" => Some(Self::Current),
            "draft" => Some(Self::Draft),
            _ => None,
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listing metadata for one page; content is fetched separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSummary {
    pub id: String,
    pub title: String,
    pub status: PageStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePageRequest {
    pub space_key: String,
    pub title: String,
    pub body: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPage {
    pub id: String,
    pub webui: Option<String>,
}

pub trait ConfluenceApi {
    fn list_spaces(&mut self, limit: usize) -> Result<Vec<Space>>;
    fn list_pages(
        &mut self,
        space_key: &str,
        status: PageStatus,
        limit: usize,
    ) -> Result<Vec<PageSummary>>;
    /// Fetch the storage-format body, re-specifying `status` on the content request.
    fn get_page_content(&mut self, page_id: &str, status: PageStatus) -> Result<String>;
    fn create_page(&mut self, request: &CreatePageRequest) -> Result<CreatedPage>;
    fn request_count(&self) -> usize;
}

pub struct ConfluenceClient {
    client: Client,
    api_root: String,
    username: String,
    token: String,
    request_count: usize,
}

impl ConfluenceClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .user_agent(settings.user_agent.clone())
            .build()
            .context("failed to build Confluence HTTP client")?;

        Ok(Self {
            client,
            api_root: api_root(&settings.base_url)?,
            username: settings.username.clone(),
            token: settings.token.clone(),
            request_count: 0,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_root, path)
    }

    fn get_json<T: DeserializeOwned>(&mut self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.endpoint(path);
        self.request_count += 1;
        debug!(%url, ?query, "GET");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.token))
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .with_context(|| format!("failed to call Confluence API: GET {path}"))?;

        decode_response(response, "GET", path)
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(&mut self, path: &str, body: &B) -> Result<T> {
        let url = self.endpoint(path);
        self.request_count += 1;
        debug!(%url, "POST");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.token))
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .with_context(|| format!("failed to call Confluence API: POST {path}"))?;

        decode_response(response, "POST", path)
    }
}

impl ConfluenceApi for ConfluenceClient {
    fn list_spaces(&mut self, limit: usize) -> Result<Vec<Space>> {
        let parsed: ListResponse<SpaceItem> = self.get_json(
            "space",
            &[("start", "0".to_string()), ("limit", limit.to_string())],
        )?;
        Ok(parsed
            .results
            .into_iter()
            .map(|item| Space {
                key: item.key,
                name: item.name,
            })
            .collect())
    }

    fn list_pages(
        &mut self,
        space_key: &str,
        status: PageStatus,
        limit: usize,
    ) -> Result<Vec<PageSummary>> {
        let parsed: ListResponse<ContentItem> = self.get_json(
            "content",
            &[
                ("spaceKey", space_key.to_string()),
                ("type", "page".to_string()),
                ("status", status.as_str().to_string()),
                ("start", "0".to_string()),
                ("limit", limit.to_string()),
            ],
        )?;
        Ok(parsed
            .results
            .into_iter()
            .map(|item| item.into_summary())
            .collect())
    }

    fn get_page_content(&mut self, page_id: &str, status: PageStatus) -> Result<String> {
        let parsed: ContentResponse = self.get_json(
            &format!("content/{page_id}"),
            &[
                ("status", status.as_str().to_string()),
                ("expand", "body.storage".to_string()),
            ],
        )?;
        parsed
            .body
            .and_then(|body| body.storage)
            .map(|storage| storage.value)
            .ok_or_else(|| anyhow::anyhow!("page {page_id} response has no storage body"))
    }

    fn create_page(&mut self, request: &CreatePageRequest) -> Result<CreatedPage> {
        let payload = CreatePayload {
            content_type: "page",
            title: &request.title,
            space: SpaceRef {
                key: &request.space_key,
            },
            body: CreateBody {
                storage: CreateStorage {
                    value: &request.body,
                    representation: "storage",
                },
            },
            ancestors: request
                .parent_id
                .as_deref()
                .map(|id| vec![AncestorRef { id }])
                .unwrap_or_default(),
        };
        let parsed: CreateResponse = self
            .post_json("content", &payload)
            .with_context(|| format!("failed to create page '{}'", request.title))?;
        Ok(CreatedPage {
            id: parsed.id,
            webui: parsed.links.and_then(|links| links.webui),
        })
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

/// Build the REST root for a configured base URL.
///
/// Atlassian Cloud serves the content API under `/wiki`.
pub fn api_root(base_url: &str) -> Result<String> {
    let trimmed = base_url.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).with_context(|| format!("invalid {ENV_URL}: {base_url}"))?;
    let is_cloud = url
        .host_str()
        .is_some_and(|host| host.ends_with(".atlassian.net"));
    let has_wiki = url
        .path_segments()
        .is_some_and(|mut segments| segments.any(|segment| segment == "wiki"));
    if is_cloud && !has_wiki {
        Ok(format!("{trimmed}/wiki/rest/api"))
    } else {
        Ok(format!("{trimmed}/rest/api"))
    }
}

fn decode_response<T: DeserializeOwned>(
    response: reqwest::blocking::Response,
    method: &str,
    path: &str,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .unwrap_or_else(|_| "(unable to read error body)".to_string());
        bail!("Confluence API {method} {path} failed with HTTP {status}: {body}");
    }
    response
        .json::<T>()
        .with_context(|| format!("failed to decode Confluence API response for {method} {path}"))
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SpaceItem {
    key: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    id: String,
    title: Option<String>,
    status: Option<String>,
}

impl ContentItem {
    fn into_summary(self) -> PageSummary {
        let title = match self.title {
            Some(title) if !title.is_empty() => title,
            _ => format!("Untitled_{}", self.id),
        };
        let status = self
            .status
            .as_deref()
            .and_then(PageStatus::parse)
            .unwrap_or_default();
        PageSummary {
            id: self.id,
            title,
            status,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    body: Option<BodyPayload>,
}

#[derive(Debug, Deserialize)]
struct BodyPayload {
    storage: Option<StoragePayload>,
}

#[derive(Debug, Deserialize)]
struct StoragePayload {
    value: String,
}

#[derive(Debug, Serialize)]
struct CreatePayload<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    title: &'a str,
    space: SpaceRef<'a>,
    body: CreateBody<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ancestors: Vec<AncestorRef<'a>>,
}

#[derive(Debug, Serialize)]
struct SpaceRef<'a> {
    key: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateBody<'a> {
    storage: CreateStorage<'a>,
}

#[derive(Debug, Serialize)]
struct CreateStorage<'a> {
    value: &'a str,
    representation: &'a str,
}

#[derive(Debug, Serialize)]
struct AncestorRef<'a> {
    id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: String,
    #[serde(rename = "_links", default)]
    links: Option<LinksPayload>,
}

#[derive(Debug, Deserialize)]
struct LinksPayload {
    webui: Option<String>,
}

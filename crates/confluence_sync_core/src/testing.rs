use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Result, bail};

use crate::client::{
    ConfluenceApi, CreatePageRequest, CreatedPage, PageStatus, PageSummary, Space,
};
use crate::config::Settings;

pub(crate) fn space(key: &str, name: &str) -> Space {
    Space {
        key: key.to_string(),
        name: name.to_string(),
    }
}

pub(crate) fn page(id: &str, title: &str, status: PageStatus) -> PageSummary {
    PageSummary {
        id: id.to_string(),
        title: title.to_string(),
        status,
    }
}

#[derive(Default)]
pub(crate) struct MockApi {
    pub spaces: Vec<Space>,
    pub current_pages: Vec<PageSummary>,
    pub draft_pages: Vec<PageSummary>,
    pub contents: BTreeMap<String, String>,
    pub failing_content: BTreeSet<String>,
    pub fail_list_spaces: bool,
    pub fail_list_pages: bool,
    pub created_webui: Option<String>,
    pub created: Vec<CreatePageRequest>,
    pub content_requests: Vec<(String, PageStatus)>,
    pub calls: Vec<String>,
    request_count: usize,
}

impl MockApi {
    pub fn with_spaces(spaces: Vec<Space>) -> Self {
        Self {
            spaces,
            ..Self::default()
        }
    }

    fn record(&mut self, call: &str) {
        self.request_count += 1;
        self.calls.push(call.to_string());
    }
}

impl ConfluenceApi for MockApi {
    fn list_spaces(&mut self, _limit: usize) -> Result<Vec<Space>> {
        self.record("list_spaces");
        if self.fail_list_spaces {
            bail!("connection refused");
        }
        Ok(self.spaces.clone())
    }

    fn list_pages(
        &mut self,
        _space_key: &str,
        status: PageStatus,
        limit: usize,
    ) -> Result<Vec<PageSummary>> {
        self.record(&format!("list_pages:{status}"));
        if self.fail_list_pages {
            bail!("HTTP 401 Unauthorized");
        }
        let pages = match status {
            PageStatus::Current => &self.current_pages,
            PageStatus::Draft => &self.draft_pages,
        };
        Ok(pages.iter().take(limit).cloned().collect())
    }

    fn get_page_content(&mut self, page_id: &str, status: PageStatus) -> Result<String> {
        self.record("get_page_content");
        self.content_requests.push((page_id.to_string(), status));
        if self.failing_content.contains(page_id) {
            bail!("HTTP 500 Internal Server Error");
        }
        match self.contents.get(page_id) {
            Some(markup) => Ok(markup.clone()),
            None => bail!("page {page_id} response has no storage body"),
        }
    }

    fn create_page(&mut self, request: &CreatePageRequest) -> Result<CreatedPage> {
        self.record("create_page");
        self.created.push(request.clone());
        Ok(CreatedPage {
            id: "900".to_string(),
            webui: self.created_webui.clone(),
        })
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

pub(crate) fn settings(output_dir: &Path) -> Settings {
    Settings {
        base_url: "https://example.atlassian.net/".to_string(),
        username: "user@example.com".to_string(),
        token: "secret".to_string(),
        output_dir: output_dir.to_path_buf(),
        user_agent: "confluence-sync/test".to_string(),
        timeout_ms: 1_000,
        space_limit: 500,
        page_limit: 100,
    }
}

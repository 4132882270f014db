use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, ETAG, LINK, RANGE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth;
use crate::error::{HubError, HubResult};
use crate::repo::{RepoId, RepoKind};

/// Default service endpoint, overridable via `HF_ENDPOINT`.
pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

const USER_AGENT: &str = concat!("hubcache/", env!("CARGO_PKG_VERSION"));

/// Commit hash of the revision that served a response.
const HEADER_REPO_COMMIT: &str = "x-repo-commit";
/// Size of the linked (LFS) payload, when the file is an LFS pointer.
const HEADER_LINKED_SIZE: &str = "x-linked-size";

/// Result of a metadata probe for a single file.
#[derive(Debug, Clone, Default)]
pub struct FileProbe {
    pub exists: bool,
    pub size: Option<u64>,
    pub etag: Option<String>,
    pub commit: Option<String>,
    pub is_lfs: bool,
}

/// One entry of a revision's file tree.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: TreeEntryKind,
    pub size: Option<u64>,
    pub oid: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeEntryKind {
    File,
    Directory,
    #[serde(other)]
    Unknown,
}

/// A single operation inside a commit request body.
#[derive(Debug, Clone, Serialize)]
pub struct CommitOperation {
    pub op: String,
    pub path: String,
}

/// Typed client for the hub's metadata and content endpoints.
#[derive(Debug, Clone)]
pub struct HubApi {
    endpoint: String,
    client: reqwest::Client,
    token: Option<String>,
}

#[derive(Debug, Default)]
pub struct HubApiBuilder {
    endpoint: Option<String>,
    token: Option<String>,
}

impl HubApiBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn build(self) -> HubResult<HubApi> {
        let endpoint = self
            .endpoint
            .or_else(|| std::env::var("HF_ENDPOINT").ok().filter(|v| !v.is_empty()))
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let token = self.token.or_else(auth::resolve_token);
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(HubApi {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
            token,
        })
    }
}

impl HubApi {
    pub fn builder() -> HubApiBuilder {
        HubApiBuilder::new()
    }

    /// Client configured entirely from the environment.
    pub fn from_env() -> HubResult<Self> {
        Self::builder().build()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.header("Authorization", format!("Bearer {token}")),
            None => req,
        }
    }

    /// Content URL for a file at a revision.
    pub fn file_url(&self, kind: RepoKind, id: &RepoId, revision: &str, filename: &str) -> String {
        format!(
            "{}/{}{}/resolve/{}/{}",
            self.endpoint,
            kind.url_prefix(),
            id,
            urlencoding::encode(revision),
            filename
        )
    }

    fn tree_url(&self, kind: RepoKind, id: &RepoId, revision: &str) -> String {
        format!(
            "{}/api/{}/{}/tree/{}?recursive=true",
            self.endpoint,
            kind.plural(),
            id,
            urlencoding::encode(revision)
        )
    }

    fn commit_url(&self, kind: RepoKind, id: &RepoId, revision: &str) -> String {
        format!(
            "{}/api/{}/{}/commit/{}",
            self.endpoint,
            kind.plural(),
            id,
            urlencoding::encode(revision)
        )
    }

    /// Probe a file's metadata with a zero-length range request.
    ///
    /// 200 and 206 both mean the file exists; 404 means it does not. The
    /// probed size comes from `Content-Range` on a 206 (falling back to the
    /// linked size for LFS files) and from `Content-Length` on a 200.
    pub async fn probe_file(
        &self,
        kind: RepoKind,
        id: &RepoId,
        revision: &str,
        filename: &str,
    ) -> HubResult<FileProbe> {
        let url = self.file_url(kind, id, revision, filename);
        debug!(%url, "probing file metadata");
        let resp = self
            .authed(self.client.head(&url))
            .header(RANGE, "bytes=0-0")
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(FileProbe { exists: false, ..Default::default() });
        }
        if !(status == StatusCode::OK || status == StatusCode::PARTIAL_CONTENT) {
            return Err(HubError::Http { status: status.as_u16() });
        }

        let header_str = |name: &str| -> Option<String> {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };

        let etag = resp
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let commit = header_str(HEADER_REPO_COMMIT);
        let linked_size = header_str(HEADER_LINKED_SIZE).and_then(|v| v.parse().ok());
        let link_mentions_lfs = resp
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("lfs"))
            .unwrap_or(false);

        let size = if status == StatusCode::PARTIAL_CONTENT {
            // Content-Length covers only the requested range here; the full
            // size is the Content-Range denominator when the server sends one.
            resp.headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(content_range_total)
                .or(linked_size)
        } else {
            resp.headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
        };

        Ok(FileProbe {
            exists: true,
            size,
            etag,
            commit,
            is_lfs: linked_size.is_some() || link_mentions_lfs,
        })
    }

    /// GET a file's content, optionally resuming from a byte offset.
    pub async fn fetch_file(
        &self,
        kind: RepoKind,
        id: &RepoId,
        revision: &str,
        filename: &str,
        resume_offset: u64,
    ) -> HubResult<Response> {
        let url = self.file_url(kind, id, revision, filename);
        let mut req = self.authed(self.client.get(&url));
        if resume_offset > 0 {
            req = req.header(RANGE, format!("bytes={resume_offset}-"));
        }
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(HubError::Http { status: status.as_u16() });
        }
        Ok(resp)
    }

    /// List every file path reachable in a revision, following pagination.
    pub async fn list_tree(
        &self,
        kind: RepoKind,
        id: &RepoId,
        revision: &str,
    ) -> HubResult<Vec<TreeEntry>> {
        let mut entries = Vec::new();
        let mut url = self.tree_url(kind, id, revision);
        loop {
            debug!(%url, "listing tree page");
            let resp = self.authed(self.client.get(&url)).send().await?;
            let status = resp.status();
            if status == StatusCode::NOT_FOUND {
                return Err(HubError::NotFound);
            }
            if !status.is_success() {
                return Err(HubError::Http { status: status.as_u16() });
            }
            let next = resp
                .headers()
                .get(LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(next_page_url);
            let page: Vec<TreeEntry> = resp.json().await?;
            entries.extend(page);
            match next {
                Some(n) => url = n,
                None => break,
            }
        }
        Ok(entries)
    }

    /// Create a commit from a list of typed operations.
    pub async fn create_commit(
        &self,
        kind: RepoKind,
        id: &RepoId,
        revision: &str,
        title: &str,
        operations: &[CommitOperation],
    ) -> HubResult<()> {
        let body = serde_json::json!({
            "title": title,
            "operations": operations,
        });
        let resp = self
            .authed(self.client.post(self.commit_url(kind, id, revision)))
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(HubError::Http { status: status.as_u16() });
        }
        Ok(())
    }
}

/// Total size from a `Content-Range: bytes 0-0/1024` header.
fn content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

/// URL of the next page from a `Link` header, per `rel="next"` (either quote
/// style). Missing or malformed headers mean "no next page".
pub(crate) fn next_page_url(header: &str) -> Option<String> {
    for part in header.split(',') {
        let mut sections = part.trim().split(';');
        let url_section = sections.next().unwrap_or("").trim();
        if !(url_section.starts_with('<') && url_section.ends_with('>')) {
            continue;
        }
        let is_next = sections.any(|param| {
            param
                .trim()
                .strip_prefix("rel=")
                .map(|v| v.trim().trim_matches('"').trim_matches('\'') == "next")
                .unwrap_or(false)
        });
        if is_next {
            return Some(url_section[1..url_section.len() - 1].to_string());
        }
    }
    None
}

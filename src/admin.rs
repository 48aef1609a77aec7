// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Project setup through the content-admin API.
//!
//! ```text
//! UrlInfo (owner/repo/ref/sp/origin)
//!   └─► GET {status_api}/{owner}/{repo}/{ref}/?editUrl=<sp>   → FileStatus { webPath, edit.name }
//!         └─► Project { url = origin + webPath, .. }
//!               └─► GET project.url                          → ProjectDetail
//! ```

use crate::config::AdminConfig;
use crate::error::{Result, SyncError};
use crate::project::{split_path, ProjectDetail};
use serde::Deserialize;
use tracing::{debug, info, instrument};

/// Identifying parameters of a project request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlInfo {
    /// Origin serving the project data file, e.g. `https://main--site--org.hlx.page`.
    pub origin: String,
    pub owner: String,
    pub repo: String,
    /// Branch or tag.
    pub reference: String,
    /// Edit URL of the data file in the document store.
    pub sp: String,
}

impl UrlInfo {
    /// Read `origin`, `owner`, `repo`, `ref` and `sp` from a query string.
    pub fn from_query(query: &str) -> Self {
        let mut info = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            let value = value.into_owned();
            match key.as_ref() {
                "origin" => info.origin = value,
                "owner" => info.owner = value,
                "repo" => info.repo = value,
                "ref" => info.reference = value,
                "sp" => info.sp = value,
                _ => {}
            }
        }
        info
    }

    /// Every field must be present.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("origin", &self.origin),
            ("owner", &self.owner),
            ("repo", &self.repo),
            ("ref", &self.reference),
            ("sp", &self.sp),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(SyncError::InvalidInput(format!("{} is missing", name)));
            }
        }
        Ok(())
    }
}

/// Status of the project data file as reported by the admin API.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct FileStatus {
    #[serde(rename = "webPath", default)]
    pub web_path: Option<String>,
    #[serde(default)]
    pub edit: Option<EditStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct EditStatus {
    #[serde(default)]
    pub name: Option<String>,
}

/// A located project data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub url: String,
    pub path: String,
    pub name: String,
    /// Store path of the spreadsheet behind the data file.
    pub excel_path: String,
    pub sp: String,
    pub owner: String,
    pub repo: String,
    pub reference: String,
}

impl Project {
    pub fn from_status(info: &UrlInfo, status: &FileStatus) -> Result<Self> {
        let path = status
            .web_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| SyncError::InvalidInput("data file does not have valid web path".into()))?;
        let name = status
            .edit
            .as_ref()
            .and_then(|e| e.name.clone())
            .unwrap_or_else(|| split_path(path).1.to_string());
        let (parent, _) = split_path(path);

        Ok(Self {
            url: format!("{}{}", info.origin, path),
            path: path.to_string(),
            excel_path: format!("{}/{}", parent, name),
            name,
            sp: info.sp.clone(),
            owner: info.owner.clone(),
            repo: info.repo.clone(),
            reference: info.reference.clone(),
        })
    }
}

/// Client for the content-admin status API and project data files.
pub struct AdminClient {
    client: reqwest::Client,
    config: AdminConfig,
    child_folder: String,
}

impl AdminClient {
    pub fn new(config: AdminConfig, child_folder: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout_duration())
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config,
            child_folder: child_folder.into(),
        })
    }

    /// `{status_api}/{owner}/{repo}/{ref}/?editUrl=<encoded sp>`
    pub fn status_url(&self, info: &UrlInfo) -> String {
        let edit_url: String = url::form_urlencoded::byte_serialize(info.sp.as_bytes()).collect();
        format!(
            "{}/{}/{}/{}/?editUrl={}",
            self.config.status_api.trim_end_matches('/'),
            info.owner,
            info.repo,
            info.reference,
            edit_url
        )
    }

    /// Ask the admin API where the project data file is published.
    #[instrument(skip(self, info), fields(owner = %info.owner, repo = %info.repo))]
    pub async fn project_file_status(&self, info: &UrlInfo) -> Result<FileStatus> {
        info.validate()?;
        let url = self.status_url(info);
        debug!(url = %url, "Fetching project file status");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::transport("project_file_status", e))?;
        if !response.status().is_success() {
            return Err(SyncError::remote_status("project_file_status", response.status().as_u16()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SyncError::transport("project_file_status", e))?;
        let status: FileStatus = serde_json::from_slice(&bytes)?;
        if status.web_path.as_deref().map_or(true, str::is_empty) {
            return Err(SyncError::InvalidInput("data file does not have valid web path".into()));
        }
        Ok(status)
    }

    /// Resolve a [`Project`] from request parameters.
    pub async fn project(&self, info: &UrlInfo) -> Result<Project> {
        let status = self.project_file_status(info).await?;
        Project::from_status(info, &status)
    }

    /// Fetch and parse the project data file.
    #[instrument(skip(self, project), fields(project = %project.name))]
    pub async fn load_detail(&self, project: &Project) -> Result<ProjectDetail> {
        let response = self
            .client
            .get(&project.url)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(|e| SyncError::transport("load_detail", e))?;
        if !response.status().is_success() {
            return Err(SyncError::remote_status("load_detail", response.status().as_u16()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SyncError::transport("load_detail", e))?;

        let detail = ProjectDetail::from_data_file(&project.url, &project.name, &bytes, &self.child_folder)?;
        info!(urls = detail.urls.len(), "Loaded project detail");
        Ok(detail)
    }
}

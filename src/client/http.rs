//! reqwest-backed esxcloud API client.
//!
//! Speaks the `/v1` REST surface. Non-2xx responses become
//! [`ApiError::Status`] with the body preserved for diagnostics. Ids are
//! pushed as single percent-encoded path segments.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use super::{ApiError, CloudClient, DiskCreateSpec, PersistentDisk, Task, Vm, VmCreateSpec};

/// HTTP client for a single esxcloud API endpoint.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: Url,
    upload_timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VmDiskOperation<'a> {
    disk_id: &'a str,
}

impl HttpClient {
    /// Create a client for `target` (e.g. `http://10.0.0.1:9000`).
    ///
    /// Uploads share `request_timeout` until [`Self::with_upload_timeout`]
    /// says otherwise.
    pub fn new(target: &str, request_timeout: Duration) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(target).map_err(|e| ApiError::InvalidTarget(format!("{target}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidTarget(target.to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url,
            upload_timeout: request_timeout,
        })
    }

    /// Deadline for whole image and ISO uploads, body included.
    #[must_use]
    pub fn with_upload_timeout(mut self, upload_timeout: Duration) -> Self {
        self.upload_timeout = upload_timeout;
        self
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidTarget(self.base_url.to_string()))?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), body_len = body.len(), "esxcloud response");

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Stream `path` as the multipart `file` field of a POST to `url`.
    async fn upload(&self, url: Url, path: &Path) -> Result<Task, ApiError> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
        debug!(len, file_name = %file_name, "Uploading");

        let part = Part::stream_with_length(file, len).file_name(file_name);
        let request = self
            .http
            .post(url)
            .multipart(Form::new().part("file", part))
            .timeout(self.upload_timeout);
        self.send(request).await
    }
}

#[async_trait]
impl CloudClient for HttpClient {
    #[instrument(skip(self), fields(path = %image_path.display()))]
    async fn create_image(&self, image_path: &Path) -> Result<Task, ApiError> {
        self.upload(self.url(&["images"])?, image_path).await
    }

    async fn delete_image(&self, image_id: &str) -> Result<Task, ApiError> {
        self.send(self.http.delete(self.url(&["images", image_id])?))
            .await
    }

    async fn create_disk(
        &self,
        project_id: &str,
        spec: &DiskCreateSpec,
    ) -> Result<Task, ApiError> {
        let url = self.url(&["projects", project_id, "disks"])?;
        self.send(self.http.post(url).json(spec)).await
    }

    async fn delete_disk(&self, disk_id: &str) -> Result<Task, ApiError> {
        self.send(self.http.delete(self.url(&["disks", disk_id])?))
            .await
    }

    async fn get_disk(&self, disk_id: &str) -> Result<PersistentDisk, ApiError> {
        self.send(self.http.get(self.url(&["disks", disk_id])?))
            .await
    }

    async fn attach_disk(&self, vm_id: &str, disk_id: &str) -> Result<Task, ApiError> {
        let url = self.url(&["vms", vm_id, "attach_disk"])?;
        self.send(self.http.post(url).json(&VmDiskOperation { disk_id }))
            .await
    }

    async fn detach_disk(&self, vm_id: &str, disk_id: &str) -> Result<Task, ApiError> {
        let url = self.url(&["vms", vm_id, "detach_disk"])?;
        self.send(self.http.post(url).json(&VmDiskOperation { disk_id }))
            .await
    }

    async fn create_vm(&self, project_id: &str, spec: &VmCreateSpec) -> Result<Task, ApiError> {
        let url = self.url(&["projects", project_id, "vms"])?;
        self.send(self.http.post(url).json(spec)).await
    }

    async fn delete_vm(&self, vm_id: &str) -> Result<Task, ApiError> {
        let url = self.url(&["vms", vm_id])?;
        self.send(self.http.delete(url).query(&[("force", "true")]))
            .await
    }

    async fn get_vm(&self, vm_id: &str) -> Result<Vm, ApiError> {
        self.send(self.http.get(self.url(&["vms", vm_id])?))
            .await
    }

    #[instrument(skip(self), fields(path = %iso_path.display()))]
    async fn attach_iso(&self, vm_id: &str, iso_path: &Path) -> Result<Task, ApiError> {
        self.upload(self.url(&["vms", vm_id, "attach_iso"])?, iso_path)
            .await
    }

    async fn start_vm(&self, vm_id: &str) -> Result<Task, ApiError> {
        self.send(self.http.post(self.url(&["vms", vm_id, "start"])?))
            .await
    }

    async fn get_task(&self, task_id: &str) -> Result<Task, ApiError> {
        self.send(self.http.get(self.url(&["tasks", task_id])?))
            .await
    }
}

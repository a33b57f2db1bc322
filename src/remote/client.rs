//! Dropbox API Client
//!
//! Provides authenticated access to Dropbox for metadata lookups, file
//! operations and content transfer. The HTTP work is async; the
//! `RemoteApi` surface is blocking and drives each request on a tokio
//! runtime handle.

use std::io::{self, Read};
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::stream;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, Response};
use tokio::runtime::Handle;
use tracing::{debug, info};

use super::errors::RemoteError;
use super::types::Metadata;
use super::{Download, MetadataRequest, RemoteApi, UploadBody};
use crate::config::DropboxConfig;

/// Connection timeout; transfers themselves may take arbitrarily long
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bytes read from an upload body per streamed chunk
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Format a path the way the Dropbox API expects it
///
/// Collapses repeated slashes and strips trailing ones. The root maps to
/// the empty string.
pub fn format_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    if parts.is_empty() {
        return String::new();
    }
    format!("/{}", parts.join("/"))
}

/// Format a path and percent-encode each component for use in a URL
fn encode_path(path: &str) -> String {
    format_path(path)
        .split('/')
        .map(|part| urlencoding::encode(part).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Dropbox API client for making authenticated requests
#[derive(Clone)]
pub struct DropboxClient {
    /// HTTP client for making requests
    http_client: Client,
    /// OAuth bearer token
    access_token: String,
    /// Root segment ("dropbox" or "sandbox")
    root: &'static str,
    api_url: String,
    content_url: String,
    /// Tokio runtime handle for async operations
    runtime: Handle,
}

impl DropboxClient {
    /// Create a client from configuration
    ///
    /// # Arguments
    /// * `config` - Token, access type and endpoints
    /// * `runtime` - Runtime that drives the HTTP futures. Blocking calls
    ///   must not be made from inside that runtime's worker threads.
    pub fn new(config: &DropboxConfig, runtime: Handle) -> Result<Self> {
        let http_client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        info!(
            root = config.access_type.root(),
            api_url = %config.api_url,
            "Dropbox client ready"
        );

        Ok(Self {
            http_client,
            access_token: config.access_token.clone(),
            root: config.access_type.root(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            content_url: config.content_url.trim_end_matches('/').to_string(),
            runtime,
        })
    }

    fn metadata_url(&self, path: &str) -> String {
        format!("{}/metadata/{}{}", self.api_url, self.root, encode_path(path))
    }

    fn fileops_url(&self, op: &str) -> String {
        format!("{}/fileops/{}", self.api_url, op)
    }

    fn files_put_url(&self, path: &str) -> String {
        format!("{}/files_put/{}{}", self.content_url, self.root, encode_path(path))
    }

    fn files_url(&self, path: &str) -> String {
        format!("{}/files/{}{}", self.content_url, self.root, encode_path(path))
    }

    /// Turn a non-success response into a classified error
    async fn check(response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %body, "Dropbox request failed");
        Err(RemoteError::from_status(status.as_u16(), &body))
    }

    async fn parse_metadata(response: Response) -> Result<Metadata, RemoteError> {
        response
            .json::<Metadata>()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }

    /// POST a fileops request and parse the returned metadata
    async fn fileop(&self, op: &str, form: &[(&str, &str)]) -> Result<Metadata, RemoteError> {
        let mut params = vec![("root", self.root)];
        params.extend_from_slice(form);

        let response = self
            .http_client
            .post(self.fileops_url(op))
            .bearer_auth(&self.access_token)
            .form(&params)
            .send()
            .await?;

        let response = Self::check(response).await?;
        Self::parse_metadata(response).await
    }
}

impl RemoteApi for DropboxClient {
    fn fetch_metadata(
        &self,
        path: &str,
        request: MetadataRequest<'_>,
    ) -> Result<Metadata, RemoteError> {
        let mut query = vec![
            ("list", request.list.to_string()),
            ("include_deleted", request.include_deleted.to_string()),
        ];
        if let Some(hash) = request.hash {
            query.push(("hash", hash.to_string()));
        }

        debug!(path = path, list = request.list, hash = ?request.hash, "Fetching metadata");

        self.runtime.block_on(async {
            let response = self
                .http_client
                .get(self.metadata_url(path))
                .bearer_auth(&self.access_token)
                .query(&query)
                .send()
                .await?;
            let response = Self::check(response).await?;
            Self::parse_metadata(response).await
        })
    }

    fn create_directory(&self, path: &str) -> Result<Metadata, RemoteError> {
        info!(path = path, "Creating folder in Dropbox");
        self.runtime
            .block_on(self.fileop("create_folder", &[("path", path)]))
    }

    fn copy(&self, src: &str, dst: &str) -> Result<Metadata, RemoteError> {
        info!(src = src, dst = dst, "Copying in Dropbox");
        self.runtime
            .block_on(self.fileop("copy", &[("from_path", src), ("to_path", dst)]))
    }

    fn move_entry(&self, src: &str, dst: &str) -> Result<Metadata, RemoteError> {
        info!(src = src, dst = dst, "Moving in Dropbox");
        self.runtime
            .block_on(self.fileop("move", &[("from_path", src), ("to_path", dst)]))
    }

    fn delete(&self, path: &str) -> Result<Metadata, RemoteError> {
        info!(path = path, "Deleting from Dropbox");
        self.runtime.block_on(self.fileop("delete", &[("path", path)]))
    }

    fn upload(
        &self,
        path: &str,
        body: UploadBody,
        overwrite: bool,
    ) -> Result<Metadata, RemoteError> {
        let len = body.len();
        info!(path = path, size = len, overwrite = overwrite, "Uploading file to Dropbox");

        let chunks = stream::iter(ReadChunks { body });

        let metadata = self.runtime.block_on(async {
            let response = self
                .http_client
                .put(self.files_put_url(path))
                .bearer_auth(&self.access_token)
                .query(&[("overwrite", overwrite.to_string())])
                .header(CONTENT_LENGTH, len)
                .body(reqwest::Body::wrap_stream(chunks))
                .send()
                .await?;
            let response = Self::check(response).await?;
            Self::parse_metadata(response).await
        })?;

        info!(path = path, rev = ?metadata.rev, "File uploaded to Dropbox");
        Ok(metadata)
    }

    fn download(&self, path: &str) -> Result<Download, RemoteError> {
        debug!(path = path, "Downloading file from Dropbox");

        let response = self.runtime.block_on(async {
            let response = self
                .http_client
                .get(self.files_url(path))
                .bearer_auth(&self.access_token)
                .send()
                .await?;
            Self::check(response).await
        })?;

        let content_length = response.content_length().ok_or_else(|| {
            RemoteError::InvalidResponse(format!("missing Content-Length for {}", path))
        })?;

        Ok(Download {
            body: Box::new(ResponseReader {
                runtime: self.runtime.clone(),
                response,
                pending: Bytes::new(),
            }),
            content_length,
        })
    }
}

/// Iterator of fixed-size chunks read from an upload body
struct ReadChunks {
    body: UploadBody,
}

impl Iterator for ReadChunks {
    type Item = io::Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
        match self.body.read(&mut buf) {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some(Ok(Bytes::from(buf)))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Blocking reader over a streamed response body
struct ResponseReader {
    runtime: Handle,
    response: Response,
    /// Unread remainder of the last chunk
    pending: Bytes,
}

impl Read for ResponseReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pending.is_empty() {
            match self.runtime.block_on(self.response.chunk()) {
                Ok(Some(chunk)) => self.pending = chunk,
                Ok(None) => return Ok(0),
                Err(e) => return Err(io::Error::other(e)),
            }
        }

        let n = buf.len().min(self.pending.len());
        let head = self.pending.split_to(n);
        buf[..n].copy_from_slice(&head);
        Ok(n)
    }
}

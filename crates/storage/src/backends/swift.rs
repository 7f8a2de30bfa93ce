//! OpenStack Swift storage backend (TempAuth).

use crate::error::{StorageError, StorageResult};
use crate::traits::{ByteStream, ObjectMeta, ObjectSink, StorageBackend};
use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Method, StatusCode};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;

/// Swift rejects single PUTs above 5 GiB; larger objects would need SLO/DLO
/// manifests, which this backend does not use.
const MAX_SINGLE_OBJECT: u64 = 5 * 1024 * 1024 * 1024;

/// An authenticated Swift session.
#[derive(Clone)]
struct SwiftSession {
    token: String,
    storage_url: String,
}

/// Shared Swift client state, usable from both the backend and its sinks.
struct SwiftClient {
    http: reqwest::Client,
    auth_url: String,
    username: String,
    key: String,
    container: String,
    session: RwLock<Option<SwiftSession>>,
}

impl SwiftClient {
    /// Authenticate against the TempAuth endpoint and cache the session.
    async fn authenticate(&self) -> StorageResult<SwiftSession> {
        let response = self
            .http
            .get(&self.auth_url)
            .header("X-Auth-User", &self.username)
            .header("X-Auth-Key", &self.key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Auth(format!(
                "swift auth failed with status {status}"
            )));
        }

        let header = |name: &str| -> StorageResult<String> {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
                .ok_or_else(|| {
                    StorageError::Auth(format!("swift auth response missing {name} header"))
                })
        };

        let session = SwiftSession {
            token: header("X-Auth-Token")?,
            storage_url: header("X-Storage-Url")?,
        };

        tracing::debug!(storage_url = %session.storage_url, "authenticated against swift");
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    /// Get the cached session, authenticating on first use.
    async fn session(&self) -> StorageResult<SwiftSession> {
        if let Some(session) = self.session.read().await.clone() {
            return Ok(session);
        }
        self.authenticate().await
    }

    /// Build the container URL for a session.
    fn container_url(&self, session: &SwiftSession) -> String {
        format!("{}/{}", session.storage_url, self.container)
    }

    /// Build the object URL for a key, percent-encoding each path segment.
    fn object_url(&self, session: &SwiftSession, key: &str) -> String {
        let encoded: Vec<String> = key
            .split('/')
            .map(|segment| utf8_percent_encode(segment, NON_ALPHANUMERIC).to_string())
            .collect();
        format!("{}/{}", self.container_url(session), encoded.join("/"))
    }

    /// Send a request with the auth token, re-authenticating once on 401.
    ///
    /// `path` is `None` for container-level requests, `Some(key)` for object
    /// requests.
    async fn send(
        &self,
        method: Method,
        path: Option<&str>,
        body: Option<Bytes>,
    ) -> StorageResult<reqwest::Response> {
        let mut session = self.session().await?;

        for attempt in 0..2 {
            let url = match path {
                Some(key) => self.object_url(&session, key),
                None => self.container_url(&session),
            };
            let mut request = self
                .http
                .request(method.clone(), url)
                .header("X-Auth-Token", &session.token);
            if let Some(body) = &body {
                request = request.body(body.clone());
            }

            let response = request.send().await?;
            if response.status() == StatusCode::UNAUTHORIZED && attempt == 0 {
                tracing::debug!("swift token expired, re-authenticating");
                session = self.authenticate().await?;
                continue;
            }
            return Ok(response);
        }

        Err(StorageError::Auth(
            "swift request unauthorized after re-authentication".to_string(),
        ))
    }

    /// Upload a complete object with a single PUT.
    async fn put_object(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let response = self.send(Method::PUT, Some(key), Some(data)).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Swift(format!(
                "put of {key} failed with status {status}"
            )));
        }
        Ok(())
    }
}

/// OpenStack Swift object store using TempAuth v1.
///
/// Objects are written with single PUT requests; Swift assembles nothing
/// server-side, so the streaming sink buffers in memory until commit.
pub struct SwiftBackend {
    client: Arc<SwiftClient>,
}

impl SwiftBackend {
    /// Create a new Swift backend. No network traffic happens until the
    /// first operation needs a token.
    pub fn new(auth_url: &str, username: &str, key: &str, container: &str) -> StorageResult<Self> {
        if auth_url.is_empty() || username.is_empty() || key.is_empty() {
            return Err(StorageError::Config(
                "swift config requires auth_url, username and key".to_string(),
            ));
        }
        if container.is_empty() {
            return Err(StorageError::Config(
                "swift config requires a container".to_string(),
            ));
        }

        Ok(Self {
            client: Arc::new(SwiftClient {
                http: reqwest::Client::new(),
                auth_url: auth_url.trim_end_matches('/').to_string(),
                username: username.to_string(),
                key: key.to_string(),
                container: container.to_string(),
                session: RwLock::new(None),
            }),
        })
    }
}

#[async_trait]
impl StorageBackend for SwiftBackend {
    #[instrument(skip(self), fields(backend = "swift"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let response = self.client.send(Method::HEAD, Some(key), None).await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StorageError::Swift(format!(
                "head of {key} failed with status {status}"
            ))),
        }
    }

    #[instrument(skip(self), fields(backend = "swift"))]
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        let response = self.client.send(Method::HEAD, Some(key), None).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            return Err(StorageError::Swift(format!(
                "head of {key} failed with status {status}"
            )));
        }

        let size = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        // Swift reports creation time as a unix epoch float in X-Timestamp
        let last_modified = response
            .headers()
            .get("X-Timestamp")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<f64>().ok())
            .and_then(|secs| time::OffsetDateTime::from_unix_timestamp(secs as i64).ok());

        Ok(ObjectMeta {
            size,
            last_modified,
        })
    }

    #[instrument(skip(self), fields(backend = "swift"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let response = self.client.send(Method::GET, Some(key), None).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            return Err(StorageError::Swift(format!(
                "get of {key} failed with status {status}"
            )));
        }
        Ok(response.bytes().await?)
    }

    #[instrument(skip(self), fields(backend = "swift"))]
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let response = self.client.send(Method::GET, Some(key), None).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            return Err(StorageError::Swift(format!(
                "get of {key} failed with status {status}"
            )));
        }

        use futures::StreamExt;
        let stream = response
            .bytes_stream()
            .map(|result| result.map_err(StorageError::Http));

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self, data), fields(backend = "swift", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.client.put_object(key, data).await
    }

    #[instrument(skip(self), fields(backend = "swift"))]
    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn ObjectSink>> {
        Ok(Box::new(SwiftSink {
            client: Arc::clone(&self.client),
            key: key.to_string(),
            buffer: Vec::new(),
        }))
    }

    #[instrument(skip(self), fields(backend = "swift"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        let response = self.client.send(Method::DELETE, Some(key), None).await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            // Idempotent: deleting a missing object succeeds
            StatusCode::NOT_FOUND => Ok(()),
            status => Err(StorageError::Swift(format!(
                "delete of {key} failed with status {status}"
            ))),
        }
    }

    #[instrument(skip(self), fields(backend = "swift"))]
    async fn total_size(&self) -> StorageResult<u64> {
        let response = self.client.send(Method::HEAD, None, None).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Swift(format!(
                "container head failed with status {status}"
            )));
        }

        response
            .headers()
            .get("X-Container-Bytes-Used")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                StorageError::Swift("container head missing X-Container-Bytes-Used".to_string())
            })
    }

    fn backend_name(&self) -> &'static str {
        "swift"
    }

    #[instrument(skip(self), fields(backend = "swift"))]
    async fn health_check(&self) -> StorageResult<()> {
        let response = self.client.send(Method::HEAD, None, None).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Swift(format!(
                "container not accessible, status {status}"
            )));
        }
        Ok(())
    }
}

/// Streaming upload for the Swift backend.
///
/// Swift has no multipart assembly, so writes accumulate in memory and the
/// object is committed with one PUT on finish. Nothing is visible before
/// finish, and abort simply drops the buffer.
struct SwiftSink {
    client: Arc<SwiftClient>,
    key: String,
    buffer: Vec<u8>,
}

#[async_trait]
impl ObjectSink for SwiftSink {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        let written = self.buffer.len() as u64 + data.len() as u64;
        if written > MAX_SINGLE_OBJECT {
            return Err(StorageError::SinkTooLarge {
                written,
                limit: MAX_SINGLE_OBJECT,
            });
        }
        self.buffer.extend_from_slice(&data);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> StorageResult<u64> {
        let size = self.buffer.len() as u64;
        self.client
            .put_object(&self.key, Bytes::from(self.buffer))
            .await?;
        Ok(size)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        // Nothing was sent, so there is nothing to clean up
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_client() -> SwiftClient {
        SwiftClient {
            http: reqwest::Client::new(),
            auth_url: "http://swift:8080/auth/v1.0".to_string(),
            username: "test:tester".to_string(),
            key: "testing".to_string(),
            container: "depot".to_string(),
            session: RwLock::new(None),
        }
    }

    #[test]
    fn test_new_validates_fields() {
        assert!(SwiftBackend::new("http://s/auth/v1.0", "u", "k", "c").is_ok());
        assert!(SwiftBackend::new("", "u", "k", "c").is_err());
        assert!(SwiftBackend::new("http://s/auth/v1.0", "u", "k", "").is_err());
    }

    #[test]
    fn test_object_url_encodes_segments() {
        let client = make_client();
        let session = SwiftSession {
            token: "tok".to_string(),
            storage_url: "http://swift:8080/v1/AUTH_test".to_string(),
        };

        assert_eq!(
            client.object_url(&session, "plain"),
            "http://swift:8080/v1/AUTH_test/depot/plain"
        );
        assert_eq!(
            client.object_url(&session, "dir/my file.txt"),
            "http://swift:8080/v1/AUTH_test/depot/dir/my%20file%2Etxt"
        );
    }

    #[tokio::test]
    async fn test_sink_buffers_without_network() {
        // Writes and abort touch only the in-memory buffer; no token is
        // fetched until finish
        let backend = SwiftBackend::new("http://s/auth/v1.0", "u", "k", "c").unwrap();
        let mut sink = backend.put_stream("pending").await.unwrap();
        sink.write(Bytes::from(vec![0u8; 1024])).await.unwrap();
        sink.write(Bytes::from(vec![1u8; 512])).await.unwrap();
        sink.abort().await.unwrap();
    }
}

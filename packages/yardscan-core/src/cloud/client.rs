use crate::cloud::EndpointConfig;
use crate::scan::CombinedDocument;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

/// Request body posted to the collection endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    #[serde(rename = "qrData")]
    pub qr_data: CombinedDocument,
}

impl SubmitRequest {
    pub fn new(document: CombinedDocument) -> Self {
        Self { qr_data: document }
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    /// The request never got a response
    #[error("Failed to reach {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx status
    #[error("Server returned error: {status} - {body}")]
    Status { status: StatusCode, body: String },
}

/// Delivers a submission to the remote end.
pub trait Submitter: Send + Sync + 'static {
    fn submit(
        &self,
        request: &SubmitRequest,
    ) -> impl Future<Output = Result<(), SubmitError>> + Send;
}

#[derive(Debug, Clone)]
pub struct CloudClient {
    http: reqwest::Client,
    url: String,
}

impl CloudClient {
    pub fn new(endpoint: &EndpointConfig) -> Self {
        Self::with_http_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_http_client(http: reqwest::Client, endpoint: &EndpointConfig) -> Self {
        Self {
            http,
            url: endpoint.submit_url(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Submitter for CloudClient {
    async fn submit(&self, request: &SubmitRequest) -> Result<(), SubmitError> {
        tracing::info!("Submitting scan pair to {}", self.url);

        let resp = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|source| SubmitError::Network {
                url: self.url.clone(),
                source,
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(SubmitError::Status { status, body });
        }

        tracing::debug!("Data sent successfully: {}", body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::ConfigSource;
    use crate::scan::ScanResult;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Captured request: head (request line + headers) and body
    type Captured = (String, Vec<u8>);

    /// Accept one connection, capture the request and answer with `status_line` and `body`.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, oneshot::Receiver<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];

            let head_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
                assert!(n > 0, "connection closed before headers");
            };

            let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
            let content_length = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);

            while buf.len() < head_end + content_length {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before body");
                buf.extend_from_slice(&chunk[..n]);
            }

            let response = format!(
                "{}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();

            let _ = tx.send((head, buf[head_end..head_end + content_length].to_vec()));
        });

        (format!("http://{}", addr), rx)
    }

    fn endpoint(base_url: &str) -> EndpointConfig {
        EndpointConfig {
            base_url: base_url.to_string(),
            path: "/store-data.php".to_string(),
            source: ConfigSource::CommandLine,
        }
    }

    fn client(base_url: &str) -> CloudClient {
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        CloudClient::with_http_client(http, &endpoint(base_url))
    }

    fn request() -> SubmitRequest {
        let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 31, 0).unwrap();
        let scan_a = ScanResult::decode(r#"{"plate":"ABC123"}"#, t1).unwrap();
        let scan_b = ScanResult::decode(r#"{"lot":"B7"}"#, t2).unwrap();
        SubmitRequest::new(CombinedDocument::new(&scan_a, &scan_b))
    }

    #[tokio::test]
    async fn test_submit_posts_json_body() {
        let (base_url, captured) = serve_once("HTTP/1.1 200 OK", "stored").await;
        let client = client(&base_url);
        assert_eq!(client.url(), format!("{}/store-data.php", base_url));

        client.submit(&request()).await.unwrap();

        let (head, body) = captured.await.unwrap();
        assert!(head.starts_with("POST /store-data.php HTTP/1.1"));
        assert!(head.to_ascii_lowercase().contains("content-type: application/json"));

        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body,
            json!({
                "qrData": {
                    "Scan 1": {"data": {"plate": "ABC123", "timestamp": "2024-05-01T08:30:00.000Z"}},
                    "Scan 2": {"data": {"lot": "B7", "timestamp": "2024-05-01T08:31:00.000Z"}},
                }
            })
        );
    }

    #[tokio::test]
    async fn test_submit_accepts_any_2xx() {
        let (base_url, _captured) = serve_once("HTTP/1.1 201 Created", "").await;
        assert!(client(&base_url).submit(&request()).await.is_ok());
    }

    #[tokio::test]
    async fn test_submit_reports_status_errors() {
        let (base_url, _captured) =
            serve_once("HTTP/1.1 500 Internal Server Error", "db down").await;

        let err = client(&base_url).submit(&request()).await.unwrap_err();
        match err {
            SubmitError::Status { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "db down");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_reports_network_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{}", addr))
            .submit(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Network { .. }));
    }
}

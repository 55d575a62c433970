//! Go Playground Backend
//!
//! The three calls a submission goes through: fetch the shared snippet,
//! format it, compile and run it. [`HttpPlayground`] talks to go.dev.

use std::future::Future;
use std::time::Duration;
use reqwest::StatusCode;
use serde::{Serialize, Deserialize};

use crate::challenge::validator::CheckError;

/// Go Playground base URL.
pub const GO_PLAYGROUND_BASE: &str = "https://go.dev";

/// Per-request timeout for playground calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Reply of the `fmt` endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatResponse {
    /// Formatted source.
    #[serde(rename = "Body", default)]
    pub body: String,
    /// Formatter error, empty on success.
    #[serde(rename = "Error", default)]
    pub error: String,
}

/// One output event of a program run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEvent {
    /// Output chunk.
    #[serde(rename = "Message", default)]
    pub message: String,
    /// `stdout`, `stderr` or something unexpected.
    #[serde(rename = "Kind", default)]
    pub kind: String,
    /// Delay before the chunk, in nanoseconds.
    #[serde(rename = "Delay", default)]
    pub delay: i64,
}

/// Reply of the `compile` endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileResponse {
    /// Build errors, empty on success.
    #[serde(rename = "Errors", default)]
    pub errors: String,
    /// Program output events. The playground sends `null` for none.
    #[serde(rename = "Events", default)]
    pub events: Option<Vec<RunEvent>>,
    /// `go vet` findings, empty when clean.
    #[serde(rename = "VetErrors", default)]
    pub vet_errors: String,
}

/// Code execution backend.
pub trait Playground: Send + Sync {
    /// Raw source of a shared snippet.
    fn fetch_source(&self, snippet_id: &str) -> impl Future<Output = Result<String, CheckError>> + Send;

    /// Format the source, resolving imports.
    fn format(&self, source: &str) -> impl Future<Output = Result<FormatResponse, CheckError>> + Send;

    /// Build, vet and run the source.
    fn compile(&self, source: &str) -> impl Future<Output = Result<CompileResponse, CheckError>> + Send;
}

/// [`Playground`] over HTTPS.
#[derive(Clone, Debug)]
pub struct HttpPlayground {
    http: reqwest::Client,
    base: String,
}

impl HttpPlayground {
    /// Client for go.dev with the default timeout.
    pub fn new() -> Result<Self, CheckError> {
        Self::with_base(GO_PLAYGROUND_BASE, REQUEST_TIMEOUT)
    }

    /// Client for another playground deployment.
    pub fn with_base(base: impl Into<String>, timeout: Duration) -> Result<Self, CheckError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("live-quest/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, base: base.into().trim_end_matches('/').to_string() })
    }

    async fn call(&self, req: reqwest::RequestBuilder, url: &str) -> Result<String, CheckError> {
        let resp = req.send().await?;
        if resp.status() != StatusCode::OK {
            return Err(CheckError::Status { url: url.to_string(), status: resp.status().as_u16() });
        }
        Ok(resp.text().await?)
    }
}

impl Playground for HttpPlayground {
    async fn fetch_source(&self, snippet_id: &str) -> Result<String, CheckError> {
        let url = format!("{}/_/share", self.base);
        let req = self.http.get(&url).query(&[("id", snippet_id)]);
        self.call(req, &url).await
    }

    async fn format(&self, source: &str) -> Result<FormatResponse, CheckError> {
        let url = format!("{}/_/fmt?backend=", self.base);
        let req = self.http.post(&url).form(&[("body", source), ("imports", "true")]);
        let body = self.call(req, &url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn compile(&self, source: &str) -> Result<CompileResponse, CheckError> {
        let url = format!("{}/_/compile?backend=", self.base);
        let req = self.http
            .post(&url)
            .form(&[("body", source), ("withVet", "true"), ("version", "2")]);
        let body = self.call(req, &url).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// In-memory playground for tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use super::*;

    /// Serves canned snippets; `compile` echoes `stdout` as the program output.
    #[derive(Default)]
    pub struct FakePlayground {
        pub snippets: HashMap<String, String>,
        pub format_error: String,
        pub compile_errors: String,
        pub stdout: String,
        pub compiles: AtomicUsize,
    }

    impl FakePlayground {
        pub fn with_snippet(id: &str, source: &str, stdout: &str) -> Self {
            let mut fake = Self::default();
            fake.snippets.insert(id.to_string(), source.to_string());
            fake.stdout = stdout.to_string();
            fake
        }

        pub fn compile_count(&self) -> usize {
            self.compiles.load(Ordering::SeqCst)
        }
    }

    impl Playground for FakePlayground {
        async fn fetch_source(&self, snippet_id: &str) -> Result<String, CheckError> {
            self.snippets.get(snippet_id).cloned().ok_or(CheckError::Status {
                url: format!("fake/_/share?id={}", snippet_id),
                status: 404,
            })
        }

        async fn format(&self, source: &str) -> Result<FormatResponse, CheckError> {
            Ok(FormatResponse { body: source.to_string(), error: self.format_error.clone() })
        }

        async fn compile(&self, _source: &str) -> Result<CompileResponse, CheckError> {
            self.compiles.fetch_add(1, Ordering::SeqCst);
            Ok(CompileResponse {
                errors: self.compile_errors.clone(),
                events: Some(vec![
                    RunEvent { message: self.stdout.clone(), kind: "stdout".to_string(), delay: 0 },
                    RunEvent { message: String::new(), kind: "system".to_string(), delay: 0 },
                ]),
                vet_errors: String::new(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_response_decoding() {
        let resp: CompileResponse = serde_json::from_str(r#"{
            "Errors": "",
            "Events": [
                {"Message": "Olá ", "Kind": "stdout", "Delay": 0},
                {"Message": "Mundo\n", "Kind": "stdout", "Delay": 100}
            ],
            "Status": 0,
            "IsTest": false,
            "TestsFailed": 0,
            "VetErrors": ""
        }"#).unwrap();

        let events = resp.events.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].message, "Mundo\n");
        assert_eq!(events[1].delay, 100);
    }

    #[test]
    fn test_null_events() {
        let resp: CompileResponse = serde_json::from_str(
            r#"{"Errors": "prog.go:3: undefined: x", "Events": null}"#
        ).unwrap();
        assert!(resp.events.is_none());
        assert!(!resp.errors.is_empty());
    }

    #[test]
    fn test_format_response_decoding() {
        let resp: FormatResponse = serde_json::from_str(r#"{"Body": "package main\n", "Error": ""}"#).unwrap();
        assert_eq!(resp.body, "package main\n");
        assert!(resp.error.is_empty());
    }

    #[tokio::test]
    async fn test_snippet_id_is_query_encoded() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = sock.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            sock.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 12\r\nConnection: close\r\n\r\npackage main")
                .await
                .unwrap();
            let head = String::from_utf8_lossy(&head).into_owned();
            head.lines().next().unwrap_or_default().to_string()
        });

        let pg = HttpPlayground::with_base(format!("http://{}", addr), Duration::from_secs(5)).unwrap();
        let source = pg.fetch_source("a&b=c#d").await.unwrap();
        assert_eq!(source, "package main");
        assert_eq!(server.await.unwrap(), "GET /_/share?id=a%26b%3Dc%23d HTTP/1.1");
    }

    #[test]
    fn test_base_trailing_slash() {
        let pg = HttpPlayground::with_base("http://localhost:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(pg.base, "http://localhost:8080");
    }
}

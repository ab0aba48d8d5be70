pub mod clist;
pub mod codechef;
pub mod codeforces;
pub mod leetcode;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};

use crate::error::{FetchError, Result};
use crate::models::Contest;

pub use clist::ClistClient;
pub use codechef::CodeChefClient;
pub use codeforces::CodeforcesClient;
pub use leetcode::LeetCodeClient;

/// What the aggregator does with a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the error and contribute no contests for the cycle
    Isolate,
    /// Report the error to feed readers
    Propagate,
}

/// An upstream source of contests
#[async_trait]
pub trait ContestProvider: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Fetch and normalize the upcoming contests of this source
    async fn fetch_contests(&self) -> Result<Vec<Contest>>;

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Isolate
    }
}

/// Build the HTTP client shared by all providers
pub fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("contest-feed/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to build HTTP client ({}), using defaults", e);
            Client::new()
        })
}

/// Wrap a target URL in a relay that takes it as the `url` query parameter
pub fn relay_url(relay: &str, target: &str) -> String {
    format!("{}?url={}", relay, urlencoding::encode(target))
}

/// Turn a non-success response into a status error
pub(crate) async fn ensure_success(provider: &'static str, response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(FetchError::Status {
        provider,
        status,
        body,
    })
}

/// Drop mapped records that break the contest invariants
pub(crate) fn retain_valid(provider: &'static str, contests: Vec<Contest>) -> Vec<Contest> {
    contests
        .into_iter()
        .filter(|contest| match contest.check() {
            Ok(()) => true,
            Err(reason) => {
                tracing::warn!("{}: dropping '{}': {}", provider, contest.name, reason);
                false
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn local_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        (listener, base_url)
    }

    #[tokio::test]
    async fn test_unresponsive_server_times_out() {
        let (listener, base_url) = local_listener().await;
        let server = tokio::spawn(async move {
            // Accept and never answer
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let client = CodeforcesClient::new(build_client(Duration::from_millis(300)), &base_url);
        let err = client.fetch_contests().await.unwrap_err();

        assert!(matches!(err, FetchError::Timeout { provider: "codeforces" }));
        assert!(err.to_string().contains("timed out"));
        server.abort();
    }

    #[tokio::test]
    async fn test_error_status_carries_code_and_body() {
        let (listener, base_url) = local_listener().await;
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await.unwrap();
            socket
                .write_all(
                    b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\nConnection: close\r\n\r\nbusy",
                )
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        let client = CodeforcesClient::new(build_client(Duration::from_secs(5)), &base_url);
        let err = client.fetch_contests().await.unwrap_err();

        match &err {
            FetchError::Status {
                provider,
                status,
                body,
            } => {
                assert_eq!(*provider, "codeforces");
                assert_eq!(status.as_u16(), 503);
                assert_eq!(body, "busy");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("503"));
        server.await.unwrap();
    }

    #[test]
    fn test_relay_url_encodes_target() {
        assert_eq!(
            relay_url(
                "https://api.allorigins.win/raw",
                "https://www.codechef.com/api/list/contests/all?sort_by=START&offset=0"
            ),
            "https://api.allorigins.win/raw?url=https%3A%2F%2Fwww.codechef.com%2Fapi%2Flist%2Fcontests%2Fall%3Fsort_by%3DSTART%26offset%3D0"
        );
    }
}

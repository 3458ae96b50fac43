pub mod error;

pub use error::{ClientError, Result};

use std::time::Duration;

use tracing::{debug, info};

/// Longest error body kept in [`ClientError::Api`].
const MAX_ERROR_BODY: usize = 512;

pub struct LeaderboardClient {
    client: reqwest::Client,
}

impl LeaderboardClient {
    /// Build a client that sends `user_agent` and gives up after `timeout`.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        info!(timeout_secs = timeout.as_secs(), "LeaderboardClient initialized");
        Ok(Self { client })
    }

    /// GET `url` and return the body as text. Any non-2xx status is an error.
    pub async fn page(&self, url: &str) -> Result<String> {
        debug!(url, "Fetching leaderboard page");

        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let mut message = resp.text().await.unwrap_or_default();
            message.truncate(floor_char_boundary(&message, MAX_ERROR_BODY));
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = resp.text().await?;
        debug!(url, bytes = body.len(), "Fetched leaderboard page");
        Ok(body)
    }
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "aé";
        assert_eq!(floor_char_boundary(s, 2), 1);
        assert_eq!(floor_char_boundary(s, 10), s.len());
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let client = LeaderboardClient::new("test-agent", Duration::from_secs(2)).unwrap();
        let err = client.page("http://127.0.0.1:9/leaderboard").await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
    }
}

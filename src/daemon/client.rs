use crate::daemon::server::DAEMON_ID;
use crate::models::FileRecord;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);
const QUERY_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP client for a running daemon's control API
pub struct ControlClient {
    http: reqwest::Client,
    base_url: String,
}

impl ControlClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("http://{addr}"),
        }
    }

    pub async fn ping(&self) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/ping", self.base_url))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await
            .context("Daemon is not reachable")?
            .error_for_status()?;
        response.json().await.context("Unexpected ping response")
    }

    /// True if something answers on the control port and identifies as the daemon
    pub async fn is_running(&self) -> bool {
        matches!(self.ping().await, Ok(id) if id == DAEMON_ID)
    }

    /// Ask the daemon to stop; does not wait for it to finish
    pub async fn shutdown(&self) -> Result<()> {
        self.http
            .post(format!("{}/shutdown", self.base_url))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await
            .context("Daemon is not reachable")?
            .error_for_status()?;
        Ok(())
    }

    /// Resync watchers with the configured watch paths, returning the active set
    pub async fn refresh(&self) -> Result<Vec<PathBuf>> {
        let response = self
            .http
            .post(format!("{}/refresh", self.base_url))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await
            .context("Daemon is not reachable")?
            .error_for_status()
            .context("Daemon refused to refresh")?;
        response.json().await.context("Unexpected refresh response")
    }

    /// Connection failures are errors; an empty list means no match
    pub async fn query(&self, query: &str, return_length: usize) -> Result<Vec<FileRecord>> {
        let return_length = return_length.to_string();
        let response = self
            .http
            .get(format!("{}/query", self.base_url))
            .query(&[("query", query), ("return_length", return_length.as_str())])
            .timeout(QUERY_TIMEOUT)
            .send()
            .await
            .context("Daemon is not reachable")?
            .error_for_status()
            .context("Daemon failed to answer the query")?;
        response.json().await.context("Unexpected query response")
    }
}

//! Subprocess transport to the node's API binary.
//!
//! Every call runs `<prefix> <args…>` and reads a single JSON object from
//! stdout. By default the prefix is `docker exec rocketpool_api
//! /go/bin/rocketpool api`; with `api.ssh` configured the same command is run
//! on the remote host through `ssh`.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ApiConfig, ReadinessConfig, SshConfig};
use crate::gateway::{LedgerGateway, ReadinessGate};
use crate::types::{Address, MinipoolStatus};
use crate::{NodeError, Result};

// ─── Responses ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AccountResponse {
    account: Address,
}

#[derive(Debug, Deserialize)]
struct NodeStatusResponse {
    registered: bool,
}

#[derive(Debug, Deserialize)]
struct SyncStatusResponse {
    synced: bool,
}

#[derive(Debug, Deserialize)]
struct AddressesResponse {
    #[serde(default)]
    addresses: Vec<Address>,
}

#[derive(Debug, Deserialize)]
struct MinipoolStatusResponse {
    minipool_status: String,
}

// ─── ApiClient ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ApiClient {
    prefix: Vec<String>,
}

impl ApiClient {
    /// Build a client from an explicit argv prefix.
    pub fn new(prefix: Vec<String>) -> Result<Self> {
        if prefix.is_empty() {
            return Err(NodeError::InvalidConfig("api command is empty".into()));
        }
        Ok(Self { prefix })
    }

    pub fn from_config(api: &ApiConfig) -> Result<Self> {
        let local = match &api.command {
            Some(command) => command.clone(),
            None => vec![
                "docker".to_string(),
                "exec".to_string(),
                api.container.clone(),
                api.binary.clone(),
                "api".to_string(),
            ],
        };
        let prefix = match &api.ssh {
            Some(ssh) => ssh_prefix(ssh, local)?,
            None => local,
        };
        Self::new(prefix)
    }

    /// Run one API call and deserialize its JSON response.
    pub async fn call<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T> {
        let command = args.join(" ");
        debug!(command = %command, "api call");

        let output = Command::new(&self.prefix[0])
            .args(&self.prefix[1..])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| NodeError::Api {
                command: command.clone(),
                message: format!("failed to spawn '{}': {e}", self.prefix[0]),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(NodeError::Api { command, message });
        }

        parse_response(&command, &output.stdout)
    }

    pub async fn node_account(&self) -> Result<Address> {
        let res: AccountResponse = self.call(&["node", "account"]).await?;
        Ok(res.account)
    }

    pub async fn node_registered(&self) -> Result<bool> {
        let res: NodeStatusResponse = self.call(&["node", "status"]).await?;
        Ok(res.registered)
    }

    pub async fn client_synced(&self) -> Result<bool> {
        let res: SyncStatusResponse = self.call(&["network", "sync-status"]).await?;
        Ok(res.synced)
    }
}

#[async_trait]
impl LedgerGateway for ApiClient {
    async fn owned_minipools(&self, owner: Address) -> Result<Vec<Address>> {
        let owner = owner.to_hex();
        let res: AddressesResponse = self.call(&["minipool", "addresses", &owner]).await?;
        Ok(res.addresses)
    }

    async fn minipool_status(&self, minipool: Address) -> Result<MinipoolStatus> {
        let address = minipool.to_hex();
        let res: MinipoolStatusResponse = self.call(&["minipool", "status", &address]).await?;
        res.minipool_status.parse()
    }
}

fn ssh_prefix(ssh: &SshConfig, remote: Vec<String>) -> Result<Vec<String>> {
    let user = ssh
        .user
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| NodeError::InvalidConfig("the SSH user must be specified".into()))?;
    let key = ssh
        .key
        .as_ref()
        .ok_or_else(|| NodeError::InvalidConfig("the SSH private key path must be specified".into()))?;

    let mut argv = vec![
        "ssh".to_string(),
        "-i".to_string(),
        key.display().to_string(),
        "-p".to_string(),
        ssh.port.to_string(),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        format!("{user}@{}", ssh.host),
        "--".to_string(),
    ];
    argv.extend(remote);
    Ok(argv)
}

/// Decode an API response, surfacing `{"status":"error","error":"…"}` as an
/// error.
fn parse_response<T: DeserializeOwned>(command: &str, stdout: &[u8]) -> Result<T> {
    let value: serde_json::Value = serde_json::from_slice(stdout).map_err(|e| {
        NodeError::ApiResponse(format!(
            "'{command}' returned invalid JSON ({e}): {}",
            String::from_utf8_lossy(stdout).trim()
        ))
    })?;

    if value.get("status").and_then(|s| s.as_str()) == Some("error") {
        let message = value
            .get("error")
            .and_then(|e| e.as_str())
            .filter(|e| !e.is_empty())
            .unwrap_or("unknown error")
            .to_string();
        return Err(NodeError::Api {
            command: command.to_string(),
            message,
        });
    }

    serde_json::from_value(value)
        .map_err(|e| NodeError::ApiResponse(format!("'{command}' response: {e}")))
}

// ─── ApiReadiness ─────────────────────────────────────────────────────────

/// Readiness gate backed by the node API: the node account must be known and
/// registered, and the execution client synced.
///
/// The account comes from config when set, otherwise from `node account` the
/// first time that call succeeds. Once resolved it is kept for the lifetime
/// of the gate.
pub struct ApiReadiness {
    client: Arc<ApiClient>,
    account: OnceCell<Address>,
    wait: bool,
    retry: Duration,
}

impl ApiReadiness {
    pub fn new(client: Arc<ApiClient>, wait: bool, retry: Duration) -> Self {
        Self {
            client,
            account: OnceCell::new(),
            wait,
            retry,
        }
    }

    pub fn from_config(client: Arc<ApiClient>, cfg: &ReadinessConfig) -> Self {
        Self::new(client, cfg.wait, cfg.retry_interval())
    }

    /// Use a fixed account instead of asking the API for one.
    pub fn with_account(self, account: Option<Address>) -> Self {
        Self {
            account: OnceCell::new_with(account),
            ..self
        }
    }

    async fn account(&self) -> Result<Address> {
        let account = self
            .account
            .get_or_try_init(|| async {
                let account = self
                    .client
                    .node_account()
                    .await
                    .map_err(|e| NodeError::AccountUnavailable(e.to_string()))?;
                info!(account = %account, "node account resolved");
                Ok::<_, NodeError>(account)
            })
            .await?;
        Ok(*account)
    }

    async fn check(&self) -> Result<Address> {
        let account = self.account().await?;
        if !self.client.node_registered().await? {
            return Err(NodeError::NotRegistered);
        }
        if !self.client.client_synced().await? {
            return Err(NodeError::NotSynced);
        }
        Ok(account)
    }
}

#[async_trait]
impl ReadinessGate for ApiReadiness {
    async fn wait_ready(&self, cancel: &CancellationToken) -> Result<Address> {
        loop {
            match self.check().await {
                Ok(account) => return Ok(account),
                Err(
                    e @ (NodeError::AccountUnavailable(_)
                    | NodeError::NotRegistered
                    | NodeError::NotSynced),
                ) if self.wait => {
                    warn!(
                        reason = %e,
                        "node not ready, retrying in {}s",
                        self.retry.as_secs()
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(NodeError::Cancelled),
                        _ = tokio::time::sleep(self.retry) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

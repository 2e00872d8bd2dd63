//! Bearer tokens and subscription discovery for Azure Resource Manager
//!
//! A token comes from `AZURE_ACCESS_TOKEN` when set, otherwise from the
//! Azure CLI's logged-in session. CLI tokens are cached until shortly before
//! they expire.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;
use wasm_aks_common::{Error, Result, Secret};

/// Audience ARM tokens are issued for
pub const ARM_RESOURCE: &str = "https://management.azure.com/";

/// Environment variable holding a pre-issued ARM token
pub const ACCESS_TOKEN_ENV: &str = "AZURE_ACCESS_TOKEN";

/// Tokens are refreshed this long before they expire
const EXPIRY_SKEW_SECS: i64 = 300;

/// Lifetime assumed when the CLI does not report one
const DEFAULT_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    /// Unix timestamp; newer CLI versions only
    #[serde(default, rename = "expires_on")]
    expires_on: Option<i64>,
}

#[derive(Clone, Debug)]
struct CachedToken {
    token: Secret<String>,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(EXPIRY_SKEW_SECS) < self.expires_at
    }
}

/// Source of ARM bearer tokens
pub struct TokenSource {
    fixed: Option<Secret<String>>,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenSource {
    /// Use `AZURE_ACCESS_TOKEN` if set, otherwise the Azure CLI
    pub fn from_env() -> Self {
        match std::env::var(ACCESS_TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => Self::fixed(token.trim().to_string()),
            _ => Self::azure_cli(),
        }
    }

    /// Always hand out the given token
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            fixed: Some(Secret::new(token.into())),
            cache: RwLock::new(None),
        }
    }

    /// Ask the Azure CLI for tokens
    pub fn azure_cli() -> Self {
        Self {
            fixed: None,
            cache: RwLock::new(None),
        }
    }

    /// A valid bearer token
    pub async fn token(&self) -> Result<Secret<String>> {
        if let Some(token) = &self.fixed {
            return Ok(token.clone());
        }

        {
            let cache = self.cache.read();
            if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh(Utc::now())) {
                return Ok(cached.token.clone());
            }
        }

        let fetched = fetch_cli_token().await?;
        let token = fetched.token.clone();
        *self.cache.write() = Some(fetched);
        Ok(token)
    }
}

async fn fetch_cli_token() -> Result<CachedToken> {
    debug!("Requesting ARM token from Azure CLI");

    let output = Command::new("az")
        .args([
            "account",
            "get-access-token",
            "--resource",
            ARM_RESOURCE,
            "--output",
            "json",
        ])
        .output()
        .await
        .map_err(|e| Error::command("az account get-access-token", e.to_string()))?;

    if !output.status.success() {
        return Err(Error::command(
            "az account get-access-token",
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    parse_cli_token(&output.stdout, Utc::now())
}

fn parse_cli_token(stdout: &[u8], now: DateTime<Utc>) -> Result<CachedToken> {
    let parsed: CliToken = serde_json::from_slice(stdout)
        .map_err(|e| Error::decode("az access token", e.to_string()))?;

    let expires_at = parsed
        .expires_on
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(|| now + ChronoDuration::seconds(DEFAULT_LIFETIME_SECS));

    Ok(CachedToken {
        token: Secret::new(parsed.access_token),
        expires_at,
    })
}

/// Subscription of the Azure CLI's active account
pub async fn default_subscription() -> Result<String> {
    let output = Command::new("az")
        .args(["account", "show", "--query", "id", "--output", "tsv"])
        .output()
        .await
        .map_err(|e| Error::command("az account show", e.to_string()))?;

    if !output.status.success() {
        return Err(Error::command(
            "az account show",
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if id.is_empty() {
        return Err(Error::lookup(
            "subscription",
            "az account show returned no subscription; run `az login` or set AZURE_SUBSCRIPTION_ID",
        ));
    }
    Ok(id)
}

//! Gateway configuration
//!
//! Loaded from JSON:
//!
//! ```json
//! {
//!   "serverName": "edge-1",
//!   "defaultDomain": "app",
//!   "security": {
//!     "enabled": true,
//!     "rules": [{ "id": "ops", "include": ["*"], "actions": ["get*", "query*"] }]
//!   }
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::permissions::{Authorizer, GrantRule, RuleAuthorizer};

pub const DEFAULT_SERVER_NAME: &str = "nsmux";
pub const DEFAULT_DOMAIN: &str = "DefaultDomain";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    /// Name used in permission checks
    pub server_name: String,
    /// Domain of names registered without one
    pub default_domain: String,
    pub security: SecurityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server_name: DEFAULT_SERVER_NAME.to_string(),
            default_domain: DEFAULT_DOMAIN.to_string(),
            security: SecurityConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse gateway configuration")
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Self::from_json_str(&json)
            .with_context(|| format!("Invalid configuration file {}", path.display()))
    }
}

/// Permission enforcement. Disabled means no checks at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityConfig {
    pub enabled: bool,
    pub rules: Vec<GrantRule>,
}

impl SecurityConfig {
    /// The authorizer for interceptors, `None` when enforcement is disabled
    pub fn authorizer(&self) -> Option<Arc<dyn Authorizer>> {
        if !self.enabled {
            return None;
        }
        Some(Arc::new(RuleAuthorizer::new(self.rules.clone())))
    }
}

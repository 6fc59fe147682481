//! Rule-based authorizer
//!
//! Grants are include/exclude glob lists over permission targets
//! (`class#member[name]`). Excludes win over includes and any rule may grant.

use nsmux_core::name::wildcard_match;
use nsmux_core::{ManagementError, ManagementResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Authorizer, Permission, PermissionKind};

/// A glob over the three parts of a permission target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionPattern {
    class_name: String,
    member: String,
    name: String,
}

impl PermissionPattern {
    /// Parse `class#member[name]`. Missing parts match anything.
    pub fn parse(text: &str) -> Self {
        let (head, name) = match text.find('[') {
            Some(open) if text.ends_with(']') => (&text[..open], &text[open + 1..text.len() - 1]),
            _ => (text, "*"),
        };
        let (class_name, member) = head.split_once('#').unwrap_or((head, "*"));

        let or_any = |part: &str| {
            if part.is_empty() {
                "*".to_string()
            } else {
                part.to_string()
            }
        };
        Self {
            class_name: or_any(class_name),
            member: or_any(member),
            name: or_any(name),
        }
    }

    /// Parts the permission leaves open match any include, but only a `*`
    /// exclude
    fn matches(&self, permission: &Permission, exclusion: bool) -> bool {
        let name = permission.name.as_ref().map(|n| n.canonical_name());
        part_matches(&self.class_name, permission.class_name.as_deref(), exclusion)
            && part_matches(&self.member, permission.member.as_deref(), exclusion)
            && part_matches(&self.name, name, exclusion)
    }
}

fn part_matches(pattern: &str, value: Option<&str>, exclusion: bool) -> bool {
    match value {
        Some(value) => wildcard_match(pattern, value),
        None => !exclusion || pattern == "*",
    }
}

/// One grant: actions allowed on the targets `include` matches and
/// `exclude` does not
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRule {
    pub id: String,
    /// Restrict the rule to one kind of permission
    #[serde(default)]
    pub kind: Option<PermissionKind>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Action names, globs allowed (`get*`, `*`)
    #[serde(default)]
    pub actions: Vec<String>,
}

impl GrantRule {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: None,
            include: Vec::new(),
            exclude: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: PermissionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn including(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    pub fn excluding(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    pub fn allowing(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    /// Check if the rule grants `permission`
    pub fn allows(&self, permission: &Permission) -> bool {
        if self.kind.is_some_and(|kind| kind != permission.kind) {
            return false;
        }
        if !self
            .actions
            .iter()
            .any(|a| wildcard_match(a, permission.action.as_str()))
        {
            return false;
        }

        // First check excludes
        for pattern in &self.exclude {
            if PermissionPattern::parse(pattern).matches(permission, true) {
                return false;
            }
        }
        // Then check includes
        self.include
            .iter()
            .any(|pattern| PermissionPattern::parse(pattern).matches(permission, false))
    }
}

/// Authorizer over an ordered list of grant rules. No matching rule denies.
#[derive(Debug, Clone, Default)]
pub struct RuleAuthorizer {
    rules: Vec<GrantRule>,
}

impl RuleAuthorizer {
    pub fn new(rules: Vec<GrantRule>) -> Self {
        if rules.is_empty() {
            warn!("[Authorizer] No grant rules configured, every check will be denied");
        }
        Self { rules }
    }

    pub fn rules(&self) -> &[GrantRule] {
        &self.rules
    }
}

impl Authorizer for RuleAuthorizer {
    fn check_permission(&self, permission: &Permission) -> ManagementResult<()> {
        // Any matching rule grants access
        if let Some(rule) = self.rules.iter().find(|rule| rule.allows(permission)) {
            debug!(permission = %permission, rule = %rule.id, "[Authorizer] Granted");
            return Ok(());
        }

        debug!(permission = %permission, "[Authorizer] Denied");
        Err(ManagementError::Security(permission.to_string()))
    }
}

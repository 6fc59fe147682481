//! Name Router - rewrites object names across a namespace boundary
//!
//! A router joins two views of the same resource:
//! - the **target view**, as seen by a caller outside the namespace
//!   (names carry `target_namespace//`),
//! - the **source view**, as seen by the delegate that owns the resources
//!   (names carry `source_namespace//`).

use super::path::{normalize_domain, normalize_namespace_path, NAMESPACE_SEPARATOR};
use super::ObjectName;
use crate::error::{ManagementError, ManagementResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameRouter {
    target_namespace: String,
    source_namespace: String,
    target_prefix: String,
    source_prefix: String,
}

impl NameRouter {
    /// Create a router stripping `target_namespace` and adding `source_namespace`
    /// on the way to the source view. Both paths are normalized.
    pub fn new(target_namespace: &str, source_namespace: &str) -> ManagementResult<Self> {
        let target_namespace = normalize_namespace_path(target_namespace, true, true, false)?;
        let source_namespace = normalize_namespace_path(source_namespace, true, true, false)?;
        Ok(Self {
            target_prefix: prefix_of(&target_namespace),
            source_prefix: prefix_of(&source_namespace),
            target_namespace,
            source_namespace,
        })
    }

    /// The root router: both namespaces empty
    pub fn root() -> Self {
        Self {
            target_namespace: String::new(),
            source_namespace: String::new(),
            target_prefix: String::new(),
            source_prefix: String::new(),
        }
    }

    pub fn target_namespace(&self) -> &str {
        &self.target_namespace
    }

    pub fn source_namespace(&self) -> &str {
        &self.source_namespace
    }

    /// Identity routers leave every name untouched
    pub fn is_identity(&self) -> bool {
        self.target_namespace == self.source_namespace
    }

    pub fn is_root(&self) -> bool {
        self.target_namespace.is_empty() && self.source_namespace.is_empty()
    }

    /// Translate a target-view name into the source view
    pub fn to_source_view(
        &self,
        name: &ObjectName,
        strip_leading_separators: bool,
    ) -> ManagementResult<ObjectName> {
        self.reroute(
            name,
            strip_leading_separators,
            &self.target_prefix,
            &self.source_prefix,
        )
    }

    /// Translate a source-view name into the target view
    pub fn to_target_view(
        &self,
        name: &ObjectName,
        strip_leading_separators: bool,
    ) -> ManagementResult<ObjectName> {
        self.reroute(
            name,
            strip_leading_separators,
            &self.source_prefix,
            &self.target_prefix,
        )
    }

    fn reroute(
        &self,
        name: &ObjectName,
        strip_leading_separators: bool,
        remove: &str,
        add: &str,
    ) -> ManagementResult<ObjectName> {
        if self.is_identity() {
            return Ok(name.clone());
        }

        let mut domain = name.domain().to_string();
        if domain.starts_with(NAMESPACE_SEPARATOR) {
            if !strip_leading_separators {
                return Ok(name.clone());
            }
            domain = normalize_domain(&domain, true)?;
        }

        if !remove.is_empty() {
            let Some(rest) = domain.strip_prefix(remove) else {
                return Err(ManagementError::invalid_name(
                    name.to_string(),
                    format!("name is not in namespace '{}'", remove),
                ));
            };
            domain = rest.to_string();
        }

        if !add.is_empty() {
            domain = format!("{}{}", add, domain);
        }

        name.with_domain(&domain)
    }
}

impl Default for NameRouter {
    fn default() -> Self {
        Self::root()
    }
}

fn prefix_of(namespace: &str) -> String {
    if namespace.is_empty() {
        String::new()
    } else {
        format!("{}{}", namespace, NAMESPACE_SEPARATOR)
    }
}

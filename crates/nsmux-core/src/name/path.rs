//! Namespace paths
//!
//! A namespace path is a sequence of segments joined by `//`. The domain of an
//! object name is a namespace path whose last segment is the plain domain:
//! `a//b//D` is domain `D` in namespace `b`, itself mounted in namespace `a`.

use super::ObjectName;
use crate::error::{ManagementError, ManagementResult};

/// Separator between namespace path segments
pub const NAMESPACE_SEPARATOR: &str = "//";

/// Key property identifying a namespace handler resource
pub const NAMESPACE_HANDLER_TYPE: &str = "JMXNamespace";

/// Key property identifying a domain handler resource
pub const DOMAIN_HANDLER_TYPE: &str = "JMXDomain";

/// Normalize a namespace path
///
/// Empty segments (duplicate separators) are dropped and the remaining
/// segments are joined with single separators. A leading separator survives
/// only if `remove_leading` is false, a trailing one only if
/// `remove_trailing` is false.
///
/// A segment starting or ending with `/` means a stray separator and is
/// rejected, except for the last segment when `ends_with_domain` is set: that
/// segment is a literal domain and may contain `/`.
pub fn normalize_namespace_path(
    path: &str,
    remove_leading: bool,
    remove_trailing: bool,
    ends_with_domain: bool,
) -> ManagementResult<String> {
    if path.is_empty() {
        return Ok(String::new());
    }

    let mut segments: Vec<&str> = path.split(NAMESPACE_SEPARATOR).collect();
    // Trailing empty segments come from trailing separators; the last real
    // segment is the one that may be a literal domain
    let split_len = segments.len();
    while segments.last().is_some_and(|segment| segment.is_empty()) {
        segments.pop();
    }
    let trailing_separator = segments.len() < split_len;
    let last = segments.len().saturating_sub(1);

    let mut out = String::with_capacity(path.len());
    if !remove_leading && path.starts_with(NAMESPACE_SEPARATOR) {
        out.push_str(NAMESPACE_SEPARATOR);
    }

    let mut count = 0;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if (segment.starts_with('/') || segment.ends_with('/')) && !(ends_with_domain && i == last)
        {
            return Err(ManagementError::invalid_name(
                path,
                format!("invalid namespace path element '{}'", segment),
            ));
        }
        if count > 0 {
            out.push_str(NAMESPACE_SEPARATOR);
        }
        out.push_str(segment);
        count += 1;
    }

    // A literal final domain such as "/" never gets one appended
    if !remove_trailing && count > 0 && trailing_separator {
        out.push_str(NAMESPACE_SEPARATOR);
    }

    Ok(out)
}

/// Normalize the domain part of an object name. The last segment is the
/// literal domain and trailing separators (handler names) are kept.
pub fn normalize_domain(domain: &str, remove_leading: bool) -> ManagementResult<String> {
    normalize_namespace_path(domain, remove_leading, false, true)
}

/// Join two namespace paths into one normalized path
pub fn concat_paths(parent: &str, child: &str) -> ManagementResult<String> {
    let joined = match (parent.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (_, true) => parent.to_string(),
        _ => format!("{}{}{}", parent, NAMESPACE_SEPARATOR, child),
    };
    normalize_namespace_path(&joined, true, true, false)
}

/// First namespace segment of a domain, if the domain lives in a namespace
pub fn namespace_of(domain: &str) -> Option<&str> {
    let trimmed = domain.trim_start_matches('/');
    match trimmed.find(NAMESPACE_SEPARATOR) {
        Some(0) | None => None,
        Some(i) => Some(&trimmed[..i]),
    }
}

/// Name of the handler resource of `namespace`: `namespace//:type=JMXNamespace`
pub fn handler_name(namespace: &str) -> ManagementResult<ObjectName> {
    let path = normalize_namespace_path(namespace, true, true, false)?;
    ObjectName::parse(&format!(
        "{}{}:type={}",
        path, NAMESPACE_SEPARATOR, NAMESPACE_HANDLER_TYPE
    ))
}

/// Name of the handler resource of a mounted domain: `domain:type=JMXDomain`
pub fn domain_handler_name(domain: &str) -> ManagementResult<ObjectName> {
    ObjectName::parse(&format!("{}:type={}", domain, DOMAIN_HANDLER_TYPE))
}

/// Whether `name` is the handler resource of a namespace
pub fn is_handler_name(name: &ObjectName) -> bool {
    name.domain().ends_with(NAMESPACE_SEPARATOR)
        && name.properties().len() == 1
        && name.key_property("type") == Some(NAMESPACE_HANDLER_TYPE)
}

/// Whether `name` is the handler resource of a mounted domain
pub fn is_domain_handler_name(name: &ObjectName) -> bool {
    !name.is_pattern()
        && name.properties().len() == 1
        && name.key_property("type") == Some(DOMAIN_HANDLER_TYPE)
}

//! Object names: `domain:key=value[,key=value]*[,*]`
//!
//! The domain may carry a namespace path (`a//b//D`). Key properties are an
//! unordered set: equality, ordering and hashing go through the canonical form
//! (keys sorted), while `Display` keeps the order the caller wrote.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::pattern::{has_wildcard, wildcard_match};
use crate::error::{ManagementError, ManagementResult};

const KEY_FORBIDDEN: &[char] = &[':', ',', '=', '*', '?', '"', '\n'];
const VALUE_FORBIDDEN: &[char] = &[':', ',', '=', '"', '\n'];

/// A resource name, exact or pattern
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectName {
    domain: String,
    properties: Vec<(String, String)>,
    property_list_pattern: bool,
    property_value_pattern: bool,
    domain_pattern: bool,
    canonical: String,
}

impl ObjectName {
    /// Parse a name from its textual form
    pub fn parse(text: &str) -> ManagementResult<Self> {
        let Some(colon) = text.find(':') else {
            return Err(ManagementError::invalid_name(
                text,
                "missing ':' between domain and key properties",
            ));
        };

        let domain = &text[..colon];
        check_domain(text, domain)?;

        let mut properties: Vec<(String, String)> = Vec::new();
        let mut list_pattern = false;
        let mut value_pattern = false;

        for item in split_properties(text, &text[colon + 1..])? {
            if item == "*" {
                if list_pattern {
                    return Err(ManagementError::invalid_name(text, "repeated '*'"));
                }
                list_pattern = true;
                continue;
            }

            let Some(eq) = item.find('=') else {
                return Err(ManagementError::invalid_name(
                    text,
                    format!("key property '{}' has no '='", item),
                ));
            };
            let (key, value) = (&item[..eq], &item[eq + 1..]);
            check_key(text, key)?;
            value_pattern |= check_value(text, value)?;

            if properties.iter().any(|(k, _)| k == key) {
                return Err(ManagementError::invalid_name(
                    text,
                    format!("duplicate key '{}'", key),
                ));
            }
            properties.push((key.to_string(), value.to_string()));
        }

        if properties.is_empty() && !list_pattern {
            return Err(ManagementError::invalid_name(
                text,
                "key properties cannot be empty",
            ));
        }

        Ok(Self::assemble(
            domain.to_string(),
            properties,
            list_pattern,
            value_pattern,
        ))
    }

    /// Build a name from a domain and `(key, value)` pairs
    pub fn from_parts(domain: &str, properties: &[(&str, &str)]) -> ManagementResult<Self> {
        let props: Vec<String> = properties
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        Self::parse(&format!("{}:{}", domain, props.join(",")))
    }

    /// Build a name from parts known to be valid
    pub(crate) fn new_unchecked(domain: &str, properties: &[(&str, &str)]) -> Self {
        let properties: Vec<(String, String)> = properties
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let value_pattern = properties.iter().any(|(_, v)| has_wildcard(v));
        Self::assemble(domain.to_string(), properties, false, value_pattern)
    }

    /// The `*:*` pattern, matching every name
    pub fn wildcard() -> Self {
        Self::assemble("*".to_string(), Vec::new(), true, false)
    }

    fn assemble(
        domain: String,
        properties: Vec<(String, String)>,
        property_list_pattern: bool,
        property_value_pattern: bool,
    ) -> Self {
        let mut sorted: Vec<&(String, String)> = properties.iter().collect();
        sorted.sort();
        let canonical = render(&domain, sorted.into_iter(), property_list_pattern);
        Self {
            domain_pattern: has_wildcard(&domain),
            domain,
            properties,
            property_list_pattern,
            property_value_pattern,
            canonical,
        }
    }

    /// Same key properties and pattern flags under another domain
    pub fn with_domain(&self, domain: &str) -> ManagementResult<Self> {
        check_domain(&format!("{}:{}", domain, self.property_text()), domain)?;
        Ok(Self::assemble(
            domain.to_string(),
            self.properties.clone(),
            self.property_list_pattern,
            self.property_value_pattern,
        ))
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Key properties in the order they were written
    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    pub fn key_property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Domain followed by the sorted key properties
    pub fn canonical_name(&self) -> &str {
        &self.canonical
    }

    pub fn is_pattern(&self) -> bool {
        self.domain_pattern || self.property_list_pattern || self.property_value_pattern
    }

    pub fn is_domain_pattern(&self) -> bool {
        self.domain_pattern
    }

    pub fn is_property_list_pattern(&self) -> bool {
        self.property_list_pattern
    }

    pub fn is_property_value_pattern(&self) -> bool {
        self.property_value_pattern
    }

    /// Whether this name (usually a pattern) matches the exact name `name`
    pub fn apply(&self, name: &ObjectName) -> bool {
        if name.is_pattern() {
            return false;
        }

        let domain_ok = if self.domain_pattern {
            wildcard_match(&self.domain, &name.domain)
        } else {
            self.domain == name.domain
        };
        if !domain_ok {
            return false;
        }

        if !self.property_list_pattern && self.properties.len() != name.properties.len() {
            return false;
        }

        self.properties.iter().all(|(key, value)| match name.key_property(key) {
            Some(actual) if self.property_value_pattern && !value.starts_with('"') => {
                wildcard_match(value, actual)
            }
            Some(actual) => actual == value,
            None => false,
        })
    }

    fn property_text(&self) -> String {
        let text = render("", self.properties.iter(), self.property_list_pattern);
        text[1..].to_string()
    }
}

fn render<'a>(
    domain: &str,
    properties: impl Iterator<Item = &'a (String, String)>,
    list_pattern: bool,
) -> String {
    let mut out = String::with_capacity(domain.len() + 16);
    out.push_str(domain);
    out.push(':');
    let mut first = true;
    for (k, v) in properties {
        if !first {
            out.push(',');
        }
        out.push_str(k);
        out.push('=');
        out.push_str(v);
        first = false;
    }
    if list_pattern {
        if !first {
            out.push(',');
        }
        out.push('*');
    }
    out
}

fn check_domain(text: &str, domain: &str) -> ManagementResult<()> {
    if domain.contains(':') || domain.contains('\n') {
        return Err(ManagementError::invalid_name(
            text,
            "domain contains ':' or a newline",
        ));
    }
    Ok(())
}

fn check_key(text: &str, key: &str) -> ManagementResult<()> {
    if key.is_empty() {
        return Err(ManagementError::invalid_name(text, "empty key"));
    }
    if key.contains(KEY_FORBIDDEN) {
        return Err(ManagementError::invalid_name(
            text,
            format!("invalid character in key '{}'", key),
        ));
    }
    Ok(())
}

/// Validate a value, returning whether it is a wildcard pattern.
/// Quoted values are always literal.
fn check_value(text: &str, value: &str) -> ManagementResult<bool> {
    if value.is_empty() {
        return Err(ManagementError::invalid_name(text, "empty value"));
    }

    if let Some(inner) = value.strip_prefix('"') {
        let Some(inner) = inner.strip_suffix('"') else {
            return Err(ManagementError::invalid_name(text, "unterminated quote"));
        };
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some('\\' | '"' | '*' | '?' | 'n') => {}
                    _ => {
                        return Err(ManagementError::invalid_name(
                            text,
                            "invalid escape in quoted value",
                        ))
                    }
                },
                '"' | '\n' => {
                    return Err(ManagementError::invalid_name(
                        text,
                        "invalid character in quoted value",
                    ))
                }
                _ => {}
            }
        }
        return Ok(false);
    }

    if value.contains(VALUE_FORBIDDEN) {
        return Err(ManagementError::invalid_name(
            text,
            format!("invalid character in value '{}'", value),
        ));
    }
    Ok(has_wildcard(value))
}

/// Split the key-property list on commas outside quotes
fn split_properties<'a>(text: &str, list: &'a str) -> ManagementResult<Vec<&'a str>> {
    if list.is_empty() {
        return Ok(Vec::new());
    }

    let mut items = Vec::new();
    let mut start = 0;
    let mut in_quote = false;
    let mut escaped = false;

    for (i, c) in list.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quote => escaped = true,
            '"' => in_quote = !in_quote,
            ',' if !in_quote => {
                items.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_quote {
        return Err(ManagementError::invalid_name(text, "unterminated quote"));
    }
    items.push(&list[start..]);

    if items.iter().any(|item| item.is_empty()) {
        return Err(ManagementError::invalid_name(text, "empty key property"));
    }
    Ok(items)
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(
            &self.domain,
            self.properties.iter(),
            self.property_list_pattern,
        ))
    }
}

impl PartialEq for ObjectName {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for ObjectName {}

impl Hash for ObjectName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for ObjectName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl FromStr for ObjectName {
    type Err = ManagementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectName {
    type Error = ManagementError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ObjectName> for String {
    fn from(name: ObjectName) -> Self {
        name.to_string()
    }
}

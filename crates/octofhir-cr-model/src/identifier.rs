//! Versioned logic identifiers and version selection

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Identifier of a logic library: name plus optional version.
///
/// An absent version means "latest/any".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LibraryIdentifier {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl LibraryIdentifier {
    pub fn new(name: impl Into<String>, version: Option<impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            version: version.map(Into::into),
        }
    }

    /// Identifier without a version
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }
}

impl fmt::Display for LibraryIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}|{}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Split a canonical reference `url|version` into its parts
pub fn split_canonical(canonical: &str) -> (&str, Option<&str>) {
    match canonical.split_once('|') {
        Some((url, version)) if !version.is_empty() => (url, Some(version)),
        Some((url, _)) => (url, None),
        None => (canonical, None),
    }
}

/// Compare dotted version strings segment by segment.
///
/// Missing segments count as zero. A missing version sorts after every
/// present version.
pub fn compare_versions(left: Option<&str>, right: Option<&str>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let a: Vec<&str> = a.split('.').collect();
            let b: Vec<&str> = b.split('.').collect();
            for i in 0..a.len().max(b.len()) {
                let x = a.get(i).copied().unwrap_or("0");
                let y = b.get(i).copied().unwrap_or("0");
                let ordering = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => x.cmp(y),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        }
    }
}

/// Pick the item whose version equals `version`, otherwise the item with
/// the greatest version.
pub fn select_from_list<'a, T, F>(items: &'a [T], version: Option<&str>, get_version: F) -> Option<&'a T>
where
    F: Fn(&T) -> Option<&str>,
{
    if let Some(wanted) = version {
        if let Some(found) = items.iter().find(|item| get_version(item) == Some(wanted)) {
            return Some(found);
        }
    }

    items
        .iter()
        .max_by(|a, b| compare_versions(get_version(a), get_version(b)))
}

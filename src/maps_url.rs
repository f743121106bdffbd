//! Canonical comparison keys for Google Maps links.
//!
//! Owners paste the same place in many shapes (`https://www.google.com/maps/place/...?hl=en`,
//! `google.com/maps/place/.../`, mixed case, stray whitespace). The normalized form is the only
//! key used for duplicate detection, so it must be pure and idempotent.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Path prefixes accepted as Google Maps links, matched against the normalized form.
pub const KNOWN_PREFIXES: &[&str] = &[
    "g.page/r/",
    "maps.google.com",
    "www.google.com/maps",
    "google.com/maps",
    "goo.gl/maps",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapsUrlError {
    #[error("Google Maps URL is required")]
    Empty,
    #[error("'{0}' is not a recognized Google Maps URL")]
    Unrecognized(String),
}

/// Normalize a raw link into its comparison key.
///
/// Steps are applied until nothing changes, so `normalize(normalize(x)) == normalize(x)`
/// holds even for inputs such as `https://https://www.www.…`.
pub fn normalize(raw: &str) -> String {
    let mut current = normalize_once(raw);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let mut rest = lowered.as_str();

    for scheme in ["https://", "http://"] {
        if let Some(stripped) = rest.strip_prefix(scheme) {
            rest = stripped;
            break;
        }
    }
    if let Some(stripped) = rest.strip_prefix("www.") {
        rest = stripped;
    }
    if let Some(cut) = rest.find(['?', '#']) {
        rest = &rest[..cut];
    }

    rest.trim_end_matches('/').trim().to_string()
}

/// Whether an already-normalized key points at a known Google Maps location.
pub fn is_valid(normalized: &str) -> bool {
    if normalized.is_empty() {
        return false;
    }

    KNOWN_PREFIXES.iter().any(|prefix| {
        normalized.strip_prefix(prefix).is_some_and(|remainder| {
            if prefix.ends_with('/') {
                !remainder.is_empty()
            } else {
                remainder.is_empty() || remainder.starts_with('/')
            }
        })
    })
}

/// A Google Maps link that passed normalization and validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedMapsUrl(String);

impl NormalizedMapsUrl {
    pub fn parse(raw: &str) -> Result<Self, MapsUrlError> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return Err(MapsUrlError::Empty);
        }
        if !is_valid(&normalized) {
            return Err(MapsUrlError::Unrecognized(raw.trim().to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedMapsUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedMapsUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

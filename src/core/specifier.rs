//! Dependency specifiers and base identifiers.
//!
//! A [`Specifier`] is the raw requirement string as declared by a wheel
//! (`name[extra]>=1.2; condition`). A [`BaseId`] is the canonical,
//! version-free name derived from it. Two specifiers with the same `BaseId`
//! are the same package for every purpose of the closure walk.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Leading distribution name of a PEP 508 requirement.
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)").expect("valid name regex")
});

/// Runs of separator characters collapsed by canonicalization.
static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_.]+").expect("valid separator regex"));

/// Characters allowed in a version constraint list.
static VERSION_SPEC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(?\s*(?:(?:~=|===|==|!=|<=|>=|<|>)\s*[A-Za-z0-9.*+!_-]+\s*,?\s*)*\)?$")
        .expect("valid version spec regex")
});

/// Error parsing a requirement string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecifierError {
    #[error("empty requirement")]
    Empty,

    #[error("requirement `{0}` does not start with a distribution name")]
    MissingName(String),

    #[error("unterminated extras in `{0}`")]
    UnterminatedExtras(String),

    #[error("invalid version constraint `{constraint}` in `{requirement}`")]
    InvalidConstraint {
        requirement: String,
        constraint: String,
    },
}

/// A dependency specifier, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Specifier(String);

impl Specifier {
    pub fn new(raw: impl Into<String>) -> Self {
        Specifier(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the specifier carries nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// The canonical base identity of this specifier.
    pub fn base(&self) -> BaseId {
        BaseId::from_specifier(&self.0)
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Specifier {
    fn from(s: &str) -> Self {
        Specifier::new(s)
    }
}

impl From<String> for Specifier {
    fn from(s: String) -> Self {
        Specifier(s)
    }
}

/// Canonical, version-free package name.
///
/// Lowercase, with every run of `-`, `_` and `.` collapsed to a single `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaseId(String);

impl BaseId {
    /// Canonicalize an already-extracted distribution name.
    pub fn canonicalize(name: &str) -> Self {
        BaseId(SEPARATOR_RE.replace_all(name.trim(), "-").to_lowercase())
    }

    /// Derive the base identity of a specifier.
    ///
    /// Structured parsing is tried first. If the requirement is malformed the
    /// leading name token is used instead, and as a last resort the whole
    /// trimmed string.
    pub fn from_specifier(spec: &str) -> Self {
        match Requirement::parse(spec) {
            Ok(req) => req.base(),
            Err(_) => match NAME_RE.captures(spec) {
                Some(caps) => BaseId::canonicalize(&caps[1]),
                None => BaseId::canonicalize(spec),
            },
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The underscore-separated form used in wheel filenames.
    pub fn underscored(&self) -> String {
        self.0.replace('-', "_")
    }

    /// Both separator forms, deduplicated.
    pub fn forms(&self) -> Vec<String> {
        let underscored = self.underscored();
        if underscored == self.0 {
            vec![underscored]
        } else {
            vec![self.0.clone(), underscored]
        }
    }
}

impl fmt::Display for BaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parsed PEP 508 requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Distribution name as written.
    pub name: String,
    /// Requested extras.
    pub extras: Vec<String>,
    /// Version constraint list, empty when unconstrained.
    pub constraint: String,
    /// Direct reference URL (`name @ url`).
    pub url: Option<String>,
    /// Environment marker expression after `;`.
    pub marker: Option<String>,
}

impl Requirement {
    /// Parse a requirement string.
    pub fn parse(raw: &str) -> Result<Self, SpecifierError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SpecifierError::Empty);
        }

        let (body, marker) = match trimmed.split_once(';') {
            Some((body, marker)) => {
                let marker = marker.trim();
                (body.trim(), (!marker.is_empty()).then(|| marker.to_string()))
            }
            None => (trimmed, None),
        };

        let caps = NAME_RE
            .captures(body)
            .ok_or_else(|| SpecifierError::MissingName(raw.to_string()))?;
        let name = caps[1].to_string();
        let mut rest = body[caps.get(0).map_or(0, |m| m.end())..].trim_start();

        let mut extras = Vec::new();
        if let Some(after_bracket) = rest.strip_prefix('[') {
            let close = after_bracket
                .find(']')
                .ok_or_else(|| SpecifierError::UnterminatedExtras(raw.to_string()))?;
            extras = after_bracket[..close]
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect();
            rest = after_bracket[close + 1..].trim_start();
        }

        let mut url = None;
        let mut constraint = String::new();
        if let Some(reference) = rest.strip_prefix('@') {
            url = Some(reference.trim().to_string());
        } else if !rest.is_empty() {
            if !VERSION_SPEC_RE.is_match(rest) {
                return Err(SpecifierError::InvalidConstraint {
                    requirement: raw.to_string(),
                    constraint: rest.to_string(),
                });
            }
            constraint = rest.to_string();
        }

        Ok(Requirement {
            name,
            extras,
            constraint,
            url,
            marker,
        })
    }

    pub fn base(&self) -> BaseId {
        BaseId::canonicalize(&self.name)
    }
}

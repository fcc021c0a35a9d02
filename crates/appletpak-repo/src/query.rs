//! Package metadata queries
//!
//! An [`AppletQuery`] is a conjunction of per-field terms over the fields of
//! [`AppletInfo`]. It is evaluated locally by the filesystem backend and
//! translated into query parameters by the HTTP backend: `id=value` for an
//! exact match, `id=~value` for a substring match.

use appletpak_core::AppletInfo;

/// How a field value is compared
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMatch {
    Exact(String),
    Contains(String),
}

impl FieldMatch {
    fn matches(&self, value: &str) -> bool {
        match self {
            FieldMatch::Exact(expected) => value == expected,
            FieldMatch::Contains(needle) => value.contains(needle.as_str()),
        }
    }

    fn matches_opt(&self, value: Option<&str>) -> bool {
        value.is_some_and(|v| self.matches(v))
    }

    fn to_param(&self) -> String {
        match self {
            FieldMatch::Exact(value) => value.clone(),
            FieldMatch::Contains(value) => format!("~{}", value),
        }
    }
}

/// Predicate over package metadata; an empty query matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppletQuery {
    pub id: Option<FieldMatch>,
    pub version: Option<FieldMatch>,
    pub hash: Option<FieldMatch>,
    pub public_key_token: Option<FieldMatch>,
}

impl AppletQuery {
    /// Query matching every package
    pub fn all() -> Self {
        Self::default()
    }

    /// Query matching every version of one package
    pub fn by_id(id: impl Into<String>) -> Self {
        Self::default().id(FieldMatch::Exact(id.into()))
    }

    pub fn id(mut self, term: FieldMatch) -> Self {
        self.id = Some(term);
        self
    }

    pub fn version(mut self, term: FieldMatch) -> Self {
        self.version = Some(term);
        self
    }

    pub fn hash(mut self, term: FieldMatch) -> Self {
        self.hash = Some(term);
        self
    }

    pub fn public_key_token(mut self, term: FieldMatch) -> Self {
        self.public_key_token = Some(term);
        self
    }

    /// Evaluate the query against one entry
    pub fn matches(&self, info: &AppletInfo) -> bool {
        self.id.as_ref().is_none_or(|t| t.matches(&info.id))
            && self.version.as_ref().is_none_or(|t| t.matches(&info.version))
            && self.hash.as_ref().is_none_or(|t| t.matches(&info.hash))
            && self
                .public_key_token
                .as_ref()
                .is_none_or(|t| t.matches_opt(info.public_key_token.as_deref()))
    }

    /// Query string parameters for the HTTP search endpoint
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        [
            ("id", &self.id),
            ("version", &self.version),
            ("hash", &self.hash),
            ("publicKeyToken", &self.public_key_token),
        ]
        .into_iter()
        .filter_map(|(name, term)| term.as_ref().map(|t| (name, t.to_param())))
        .collect()
    }
}

//! Stream - 同期対象のストリームとカタログ
//!
//! カタログは実行中に変化しない（read-only）。
//! ストリームに紐づくタスクは、カタログに含まれるストリームしか指せない。

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Identifier of one data stream being synchronized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(String);

impl StreamId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// CatalogError はカタログ構築時のエラー
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("stream '{0}' appears more than once in the catalog")]
    Duplicate(StreamId),
}

/// Ordered, duplicate-free set of streams fixed for the whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamCatalog {
    streams: Vec<StreamId>,
}

impl StreamCatalog {
    /// Build a catalog, keeping the caller's order.
    pub fn new<I, S>(streams: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<StreamId>,
    {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for stream in streams {
            let stream = stream.into();
            if !seen.insert(stream.clone()) {
                return Err(CatalogError::Duplicate(stream));
            }
            ordered.push(stream);
        }
        Ok(Self { streams: ordered })
    }

    pub fn contains(&self, stream: &StreamId) -> bool {
        self.streams.contains(stream)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreamId> {
        self.streams.iter()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl<'a> IntoIterator for &'a StreamCatalog {
    type Item = &'a StreamId;
    type IntoIter = std::slice::Iter<'a, StreamId>;

    fn into_iter(self) -> Self::IntoIter {
        self.streams.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_keeps_declared_order() {
        let catalog = StreamCatalog::new(["users", "orders", "items"]).unwrap();
        let names: Vec<&str> = catalog.iter().map(StreamId::as_str).collect();
        assert_eq!(names, vec!["users", "orders", "items"]);
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn catalog_rejects_duplicates() {
        let err = StreamCatalog::new(["users", "users"]).unwrap_err();
        assert_eq!(err, CatalogError::Duplicate(StreamId::new("users")));
    }

    #[test]
    fn contains_only_declared_streams() {
        let catalog = StreamCatalog::new(["users"]).unwrap();
        assert!(catalog.contains(&StreamId::new("users")));
        assert!(!catalog.contains(&StreamId::new("orders")));
    }
}

//! Table Selector
//!
//! Resolves an exact table name or a `prefix*` wildcard into concrete table
//! names, either from the live store or from the Dump Units under the
//! storage root.

use crate::domain::ports::TableStore;
use crate::error::{Error, Result};
use crate::storage::{DumpStorage, DumpUnit};
use tracing::{debug, warn};

// =============================================================================
// Separator
// =============================================================================

/// How a table name splits into a prefix segment and a remainder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Separator {
    /// The prefix segment is the text before the first occurrence
    Delimited(String),
    /// The prefix is matched as a plain string prefix
    NoSeparator,
}

impl Separator {
    pub fn new(separator: &str, no_separator: bool) -> Result<Self> {
        if no_separator {
            return Ok(Separator::NoSeparator);
        }
        if separator.is_empty() {
            return Err(Error::Configuration(
                "prefix separator must not be empty (use --noSeparator instead)".into(),
            ));
        }
        Ok(Separator::Delimited(separator.to_string()))
    }
}

impl Default for Separator {
    fn default() -> Self {
        Separator::Delimited(crate::config::DEFAULT_PREFIX_SEPARATOR.to_string())
    }
}

// =============================================================================
// Table Pattern
// =============================================================================

/// An exact table name or a `prefix*` wildcard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePattern {
    raw: String,
    prefix: String,
    wildcard: bool,
}

impl TablePattern {
    pub fn parse(pattern: &str) -> Self {
        let (prefix, wildcard) = match pattern.split_once('*') {
            Some((prefix, _)) => (prefix, true),
            None => (pattern, false),
        };
        Self {
            raw: pattern.to_string(),
            prefix: prefix.to_string(),
            wildcard,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Literal text before the `*`, or the whole name for exact patterns
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, name: &str, separator: &Separator) -> bool {
        if !self.wildcard {
            return name == self.raw;
        }
        match separator {
            Separator::NoSeparator => name.starts_with(&self.prefix),
            Separator::Delimited(sep) => split_prefix(name, sep).0 == self.prefix,
        }
    }
}

impl std::fmt::Display for TablePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_prefix<'a>(name: &'a str, sep: &str) -> (&'a str, Option<&'a str>) {
    match name.split_once(sep) {
        Some((head, rest)) => (head, Some(rest)),
        None => (name, None),
    }
}

/// Rewrite `source_name` from the source pattern's prefix to the destination's
///
/// Returns `None` when the name's prefix segment is not the source prefix.
pub fn change_prefix(
    source_name: &str,
    source: &TablePattern,
    destination: &TablePattern,
    separator: &Separator,
) -> Option<String> {
    match separator {
        Separator::Delimited(sep) => match split_prefix(source_name, sep) {
            (head, Some(rest)) if head == source.prefix() => {
                Some(format!("{}{}{}", destination.prefix(), sep, rest))
            }
            (head, None) if head == source.prefix() => Some(destination.prefix().to_string()),
            _ => None,
        },
        Separator::NoSeparator => source_name
            .strip_prefix(source.prefix())
            .map(|rest| format!("{}{}", destination.prefix(), rest)),
    }
}

// =============================================================================
// Table Selector
// =============================================================================

/// Resolves patterns against the live store or the dump root
#[derive(Debug, Clone, Default)]
pub struct TableSelector {
    separator: Separator,
}

impl TableSelector {
    pub fn new(separator: Separator) -> Self {
        Self { separator }
    }

    pub fn separator(&self) -> &Separator {
        &self.separator
    }

    /// Every live table matching `pattern`, following the listing's
    /// continuation token until it runs out
    pub async fn resolve_live(
        &self,
        store: &dyn TableStore,
        pattern: &TablePattern,
    ) -> Result<Vec<String>> {
        let mut all_tables = Vec::new();
        let mut start: Option<String> = None;

        loop {
            let page = store.list_tables(start.as_deref()).await?;
            all_tables.extend(page.table_names);
            match page.last_evaluated_table_name {
                Some(next) => start = Some(next),
                None => break,
            }
        }

        debug!("Listed {} table(s) from {}", all_tables.len(), store.store_name());

        Ok(all_tables
            .into_iter()
            .filter(|name| pattern.matches(name, &self.separator))
            .collect())
    }

    /// Every Dump Unit under the storage root matching `pattern`
    pub async fn resolve_dump(
        &self,
        storage: &dyn DumpStorage,
        pattern: &TablePattern,
    ) -> Result<Vec<String>> {
        let mut matches = Vec::new();
        for name in storage.list("").await? {
            if !pattern.matches(&name, &self.separator) {
                continue;
            }
            if storage.get(&DumpUnit::new(&name).schema_path()).await?.is_none() {
                warn!("Skipping {}: no schema record under {}", name, storage.location());
                continue;
            }
            matches.push(name);
        }
        Ok(matches)
    }

    /// Destination table for a restored source table
    ///
    /// Names matched by a wildcard source always get their prefix rewritten.
    /// For an exact source, an exact destination is used as is and a wildcard
    /// destination replaces the name's own prefix segment.
    pub fn destination_name(
        &self,
        source_name: &str,
        source: &TablePattern,
        destination: &TablePattern,
    ) -> Option<String> {
        if !source.is_wildcard() {
            if !destination.is_wildcard() {
                return Some(destination.as_str().to_string());
            }
            let own_prefix = match &self.separator {
                Separator::Delimited(sep) => split_prefix(source_name, sep).0,
                Separator::NoSeparator => source_name,
            };
            return change_prefix(
                source_name,
                &TablePattern::parse(&format!("{}*", own_prefix)),
                destination,
                &self.separator,
            );
        }
        change_prefix(source_name, source, destination, &self.separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::backends::{MemoryStoreConfig, MemoryTableStore};
    use crate::domain::model::{ProvisionedThroughput, ScalarAttributeType, TableDescription};
    use crate::storage::MemoryStorage;
    use bytes::Bytes;

    fn dash() -> Separator {
        Separator::Delimited("-".into())
    }

    #[test]
    fn test_change_prefix_with_separator() {
        let src = TablePattern::parse("orders*");
        let dst = TablePattern::parse("archive*");

        assert_eq!(
            change_prefix("orders-2024", &src, &dst, &dash()).as_deref(),
            Some("archive-2024")
        );
        assert_eq!(change_prefix("other-2024", &src, &dst, &dash()), None);
        assert_eq!(
            change_prefix("orders-eu-west", &src, &dst, &dash()).as_deref(),
            Some("archive-eu-west")
        );
        assert_eq!(
            change_prefix("orders", &src, &dst, &dash()).as_deref(),
            Some("archive")
        );
    }

    #[test]
    fn test_change_prefix_without_separator() {
        let src = TablePattern::parse("orders*");
        let dst = TablePattern::parse("archive*");
        let sep = Separator::NoSeparator;

        assert_eq!(
            change_prefix("ordersfoo", &src, &dst, &sep).as_deref(),
            Some("archivefoo")
        );
        assert_eq!(change_prefix("other", &src, &dst, &sep), None);
    }

    #[test]
    fn test_wildcard_matching() {
        let pattern = TablePattern::parse("orders*");
        assert!(pattern.is_wildcard());
        assert_eq!(pattern.prefix(), "orders");

        assert!(pattern.matches("orders-eu", &dash()));
        assert!(pattern.matches("orders-us", &dash()));
        assert!(!pattern.matches("ordersfoo", &dash()));
        assert!(!pattern.matches("other-orders", &dash()));

        assert!(pattern.matches("ordersfoo", &Separator::NoSeparator));
        assert!(!pattern.matches("other-orders", &Separator::NoSeparator));
    }

    #[test]
    fn test_exact_matching() {
        let pattern = TablePattern::parse("orders-eu");
        assert!(!pattern.is_wildcard());
        assert!(pattern.matches("orders-eu", &dash()));
        assert!(!pattern.matches("orders-eu-2", &dash()));
    }

    #[test]
    fn test_empty_separator_is_rejected() {
        assert!(Separator::new("", false).is_err());
        assert_eq!(Separator::new("", true).unwrap(), Separator::NoSeparator);
        assert_eq!(Separator::new("_", false).unwrap(), Separator::Delimited("_".into()));
    }

    #[test]
    fn test_destination_name() {
        let selector = TableSelector::new(dash());
        let wildcard = TablePattern::parse("orders*");

        assert_eq!(
            selector
                .destination_name("orders-eu", &wildcard, &TablePattern::parse("copy*"))
                .as_deref(),
            Some("copy-eu")
        );
        let exact = TablePattern::parse("orders-eu");
        assert_eq!(
            selector
                .destination_name("orders-eu", &exact, &TablePattern::parse("staging"))
                .as_deref(),
            Some("staging")
        );
        assert_eq!(
            selector
                .destination_name("orders-eu", &exact, &TablePattern::parse("copy*"))
                .as_deref(),
            Some("copy-eu")
        );
    }

    #[tokio::test]
    async fn test_resolve_live_follows_pagination() {
        let store = MemoryTableStore::with_config(MemoryStoreConfig {
            list_page_size: 2,
            ..Default::default()
        });
        for name in ["orders-eu", "orders-us", "ordersfoo", "other-orders", "orders-ap"] {
            store.insert_table(TableDescription::new(
                name,
                ("id", ScalarAttributeType::S),
                None,
                ProvisionedThroughput::new(1, 1),
            ));
        }

        let selector = TableSelector::new(dash());
        let matches = selector
            .resolve_live(&store, &TablePattern::parse("orders*"))
            .await
            .unwrap();

        assert_eq!(matches, vec!["orders-ap", "orders-eu", "orders-us"]);
    }

    #[tokio::test]
    async fn test_resolve_dump_requires_schema() {
        let storage = MemoryStorage::new();
        for name in ["orders-eu", "orders-us", "other-eu"] {
            storage
                .put(&DumpUnit::new(name).schema_path(), Bytes::from_static(b"{}"))
                .await
                .unwrap();
        }
        storage
            .put("orders-tmp/notes.txt", Bytes::from_static(b"x"))
            .await
            .unwrap();

        let selector = TableSelector::new(dash());
        let matches = selector
            .resolve_dump(&storage, &TablePattern::parse("orders*"))
            .await
            .unwrap();

        assert_eq!(matches, vec!["orders-eu", "orders-us"]);
    }
}

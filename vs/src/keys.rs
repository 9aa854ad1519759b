//! Key families for durable volume records

use std::fmt;

/// Prefix for tab-scoped keys
pub const TAB_KEY_PREFIX: &str = "tab-volume-";

/// Prefix for address-scoped keys
pub const URL_KEY_PREFIX: &str = "url-volume-";

/// A parsed durable key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// State for one open tab
    Tab(i64),
    /// State remembered for a page address
    Address(String),
}

impl StoreKey {
    /// Parse a raw key, returning None for keys outside both families
    ///
    /// Tab keys with a non-numeric suffix and address keys with an empty
    /// suffix are treated as foreign.
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(rest) = raw.strip_prefix(TAB_KEY_PREFIX) {
            return rest.parse::<i64>().ok().map(StoreKey::Tab);
        }
        if let Some(rest) = raw.strip_prefix(URL_KEY_PREFIX)
            && !rest.is_empty()
        {
            return Some(StoreKey::Address(rest.to_string()));
        }
        None
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tab(id) => write!(f, "{TAB_KEY_PREFIX}{id}"),
            Self::Address(address) => write!(f, "{URL_KEY_PREFIX}{address}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_key_display() {
        assert_eq!(StoreKey::Tab(42).to_string(), "tab-volume-42");
    }

    #[test]
    fn test_address_key_display() {
        let key = StoreKey::Address("https://example.com/watch".to_string());
        assert_eq!(key.to_string(), "url-volume-https://example.com/watch");
    }

    #[test]
    fn test_parse_both_families() {
        assert_eq!(StoreKey::parse("tab-volume-7"), Some(StoreKey::Tab(7)));
        assert_eq!(
            StoreKey::parse("url-volume-https://a.test/"),
            Some(StoreKey::Address("https://a.test/".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_foreign_keys() {
        assert_eq!(StoreKey::parse("settings"), None);
        assert_eq!(StoreKey::parse("tab-volume-abc"), None);
        assert_eq!(StoreKey::parse("url-volume-"), None);
    }
}

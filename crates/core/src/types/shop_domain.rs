//! Shopify store domain type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ShopDomain`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShopDomainError {
    /// The input string is empty.
    #[error("shop domain cannot be empty")]
    Empty,
    /// The input is not a `*.myshopify.com` host.
    #[error("shop domain must end with {}", ShopDomain::SUFFIX)]
    InvalidSuffix,
    /// The store handle before the suffix is empty or has invalid characters.
    #[error("shop handle must be letters, digits and hyphens")]
    InvalidHandle,
}

/// A `*.myshopify.com` store domain.
///
/// Used wherever a domain ends up in an outbound URL (OAuth redirects,
/// token exchange). Input is trimmed and lowercased before validation.
///
/// ## Examples
///
/// ```
/// use chatbi_core::ShopDomain;
///
/// assert!(ShopDomain::parse("acme.myshopify.com").is_ok());
/// assert!(ShopDomain::parse("  ACME.myshopify.com ").is_ok());
///
/// assert!(ShopDomain::parse("").is_err());
/// assert!(ShopDomain::parse("acme.com").is_err());
/// assert!(ShopDomain::parse("evil.com/.myshopify.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ShopDomain(String);

impl ShopDomain {
    /// Required host suffix.
    pub const SUFFIX: &'static str = ".myshopify.com";

    /// Parse a `ShopDomain` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, does not end with
    /// `.myshopify.com`, or its handle contains anything other than ASCII
    /// letters, digits and hyphens.
    pub fn parse(s: &str) -> Result<Self, ShopDomainError> {
        let normalized = s.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(ShopDomainError::Empty);
        }

        let handle = normalized
            .strip_suffix(Self::SUFFIX)
            .ok_or(ShopDomainError::InvalidSuffix)?;

        if handle.is_empty()
            || !handle
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(ShopDomainError::InvalidHandle);
        }

        Ok(Self(normalized))
    }

    /// Returns the domain as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShopDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ShopDomain {
    type Err = ShopDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ShopDomain {
    type Error = ShopDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ShopDomain> for String {
    fn from(domain: ShopDomain) -> Self {
        domain.0
    }
}

impl AsRef<str> for ShopDomain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let domain = ShopDomain::parse("  Acme-Tea.MyShopify.com\n").expect("valid");
        assert_eq!(domain.as_str(), "acme-tea.myshopify.com");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(ShopDomain::parse("   "), Err(ShopDomainError::Empty));
    }

    #[test]
    fn test_parse_rejects_other_hosts() {
        assert_eq!(
            ShopDomain::parse("acme.com"),
            Err(ShopDomainError::InvalidSuffix)
        );
        assert_eq!(
            ShopDomain::parse("acme.myshopify.com.evil.io"),
            Err(ShopDomainError::InvalidSuffix)
        );
    }

    #[test]
    fn test_parse_rejects_bad_handles() {
        for input in [".myshopify.com", "a.b.myshopify.com", "x/y.myshopify.com"] {
            assert_eq!(
                ShopDomain::parse(input),
                Err(ShopDomainError::InvalidHandle),
                "{input}"
            );
        }
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<ShopDomain, _> = serde_json::from_str("\"acme.myshopify.com\"");
        assert!(ok.is_ok());
        let bad: Result<ShopDomain, _> = serde_json::from_str("\"acme.com\"");
        assert!(bad.is_err());
    }
}

//! Marketplace identifier types

use crate::ValidationError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of characters in a canonical ASIN.
pub const ASIN_LEN: usize = 10;

/// Amazon Standard Identification Number.
///
/// Always stored in canonical form: exactly ten ASCII characters drawn from
/// `[A-Z0-9]`. Parsing is case-insensitive and ignores surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Asin(String);

impl Asin {
    /// Trim, upper-case and validate a raw identifier.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let canonical = raw.trim().to_ascii_uppercase();
        let valid = canonical.len() == ASIN_LEN
            && canonical
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        if valid {
            Ok(Self(canonical))
        } else {
            Err(ValidationError::InvalidIdentifier {
                value: raw.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which the normalized product is cached.
    pub fn cache_key(&self) -> String {
        format!("product:{}", self.0)
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Asin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Asin {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Asin {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for Asin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Asin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Asin::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_canonicalizes_case_and_whitespace() {
        let asin = Asin::parse("  b07xjwd7z3 ").unwrap();
        assert_eq!(asin.as_str(), "B07XJWD7Z3");
        assert_eq!(asin.cache_key(), "product:B07XJWD7Z3");
    }

    #[test]
    fn test_parse_rejects_wrong_length_and_symbols() {
        assert!(Asin::parse("B07XJWD7Z").is_err());
        assert!(Asin::parse("B07XJWD7Z33").is_err());
        assert!(Asin::parse("B07XJ-D7Z3").is_err());
        assert!(Asin::parse("").is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Asin = serde_json::from_str("\"b000000001\"").unwrap();
        assert_eq!(ok.as_str(), "B000000001");
        assert!(serde_json::from_str::<Asin>("\"nope\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_valid_identifiers_roundtrip(raw in "[a-zA-Z0-9]{10}") {
            let asin = Asin::parse(&raw).unwrap();
            prop_assert_eq!(asin.as_str(), raw.to_ascii_uppercase());
            prop_assert_eq!(Asin::parse(asin.as_str()).unwrap(), asin);
        }

        #[test]
        fn prop_wrong_length_never_parses(raw in "[A-Z0-9]{0,9}|[A-Z0-9]{11,20}") {
            prop_assert!(Asin::parse(&raw).is_err());
        }
    }
}

//! Shared identifier types.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// An autonomous system within an isolation domain, e.g. `1-7`.
///
/// Serializes as the `"isd-as"` string form used throughout the wire
/// protocol (topology link ends, location-table keys).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IsdAs {
    /// Isolation domain.
    pub isd: u16,
    /// Autonomous system within the ISD.
    pub asn: u32,
}

impl IsdAs {
    pub fn new(isd: u16, asn: u32) -> Self {
        Self { isd, asn }
    }
}

impl fmt::Display for IsdAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.isd, self.asn)
    }
}

/// Error parsing an `"isd-as"` string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid ISD-AS identifier: {0:?}")]
pub struct IsdAsParseError(pub String);

impl FromStr for IsdAs {
    type Err = IsdAsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (isd, asn) = s
            .split_once('-')
            .ok_or_else(|| IsdAsParseError(s.to_string()))?;
        let isd = isd
            .parse::<u16>()
            .map_err(|_| IsdAsParseError(s.to_string()))?;
        let asn = asn
            .parse::<u32>()
            .map_err(|_| IsdAsParseError(s.to_string()))?;
        Ok(Self { isd, asn })
    }
}

impl Serialize for IsdAs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IsdAs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IsdAsVisitor;

        impl Visitor<'_> for IsdAsVisitor {
            type Value = IsdAs;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an \"isd-as\" string such as \"1-7\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<IsdAs, E> {
                value.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(IsdAsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn parse_and_display() {
        let id: IsdAs = "1-13".parse().unwrap();
        assert_eq!(id, IsdAs::new(1, 13));
        assert_eq!(id.to_string(), "1-13");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<IsdAs>().is_err());
        assert!("1".parse::<IsdAs>().is_err());
        assert!("one-two".parse::<IsdAs>().is_err());
        assert!("1-".parse::<IsdAs>().is_err());
    }

    #[test]
    fn serde_string_form() {
        let id = IsdAs::new(2, 26);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""2-26""#);

        let back: IsdAs = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn usable_as_map_key() {
        let json = r#"{"1-11": "US", "1-12": "CH"}"#;
        let map: BTreeMap<IsdAs, String> = serde_json::from_str(json).unwrap();
        assert_eq!(map[&IsdAs::new(1, 12)], "CH");

        let round = serde_json::to_string(&map).unwrap();
        assert!(round.contains(r#""1-11":"US""#));
    }

    #[test]
    fn ordering_is_numeric() {
        let a = IsdAs::new(1, 9);
        let b = IsdAs::new(1, 10);
        assert!(a < b);
    }
}

//! Strongly-typed identifiers for gateway entities
//!
//! Newtype wrappers around UUIDs keep a claim id from being passed where an
//! audit entry id is expected. The remote claim number assigned by E-Klaim is
//! a plain string and lives on the claim itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new time-ordered identifier (v7)
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Returns the identifier prefix for display
            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                // Strip prefix if present
                let uuid_str = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(uuid_str)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

define_id!(ClaimId, "CLM");
define_id!(AuditEventId, "AUD");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_id_display() {
        let id = ClaimId::new();
        assert!(id.to_string().starts_with("CLM-"));
    }

    #[test]
    fn test_id_parsing_accepts_prefixed_and_bare() {
        let original = AuditEventId::new();
        let prefixed: AuditEventId = original.to_string().parse().unwrap();
        let bare: AuditEventId = original.as_uuid().to_string().parse().unwrap();
        assert_eq!(original, prefixed);
        assert_eq!(original, bare);
    }
}

//! Newtype identifiers.
//!
//! Every entity id is its own string-backed type, so a swapped tenant and
//! connection argument is a compile error rather than a silent cross-tenant
//! read. Serialized form is the plain string.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh random identifier.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(TenantId, "Identifies one tenant of the platform.");
string_id!(ConnectionId, "Identifies a tenant's configured connector instance.");
string_id!(EventId, "Identifies one integration event.");
string_id!(JobId, "Identifies one sync job run.");
string_id!(EndpointId, "Identifies a tenant's registered webhook endpoint.");

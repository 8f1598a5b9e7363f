use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }

            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub fn parse(s: &str) -> Result<Self, CoreError> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| CoreError::InvalidData(format!("invalid {}: {e}", stringify!($name))))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &self.0.to_string()[..8])
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(PlanId);

/// Branch identifiers are issued by the branch directory, so they are opaque
/// strings here rather than generated ids.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(String);

impl BranchId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BranchId({})", self.0)
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BranchId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BranchId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_id_parse_matches_display() {
        let id = PlanId::new();
        let parsed = PlanId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn plan_id_parse_rejects_garbage() {
        let err = PlanId::parse("not-a-uuid").unwrap_err();
        assert!(matches!(err, CoreError::InvalidData(_)), "got {err:?}");
    }

    #[test]
    fn plan_ids_are_time_ordered() {
        let a = PlanId::new();
        let b = PlanId::new();
        assert!(a < b, "expected {a:?} < {b:?}");
    }

    #[test]
    fn branch_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&BranchId::from("B1")).unwrap();
        assert_eq!(json, "\"B1\"");
    }
}

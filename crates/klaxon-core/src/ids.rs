use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn parse(s: &str) -> Result<Self, DomainError> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| DomainError::InvalidId(stringify!($name).into()))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

define_id!(AlertId);
define_id!(UserId);
define_id!(TeamId);
define_id!(OrganizationId);
define_id!(ScheduleId);
define_id!(RotationId);
define_id!(OverrideId);
define_id!(PolicyId);
define_id!(RoutingRuleId);
define_id!(NotificationId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_uuid_succeeds() {
        let id = AlertId::new();
        let parsed = AlertId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_invalid_uuid_fails() {
        let result = AlertId::parse("not-a-uuid");
        assert_eq!(result, Err(DomainError::InvalidId("AlertId".into())));
    }

    #[test]
    fn parse_error_names_the_id_type() {
        let result = ScheduleId::parse("");
        assert_eq!(result, Err(DomainError::InvalidId("ScheduleId".into())));
    }

    #[test]
    fn serializes_as_bare_string() {
        let id = PolicyId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: PolicyId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn from_str_matches_parse() {
        let id = RoutingRuleId::new();
        let parsed: RoutingRuleId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("".parse::<NotificationId>().is_err());
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the three assignable cluster roles. `MessageBroker` and `Gateway`
/// are cluster-wide singletons; `Editing` is held by every node that is
/// neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "MESSAGE_BROKER")]
    MessageBroker,
    #[serde(rename = "GATEWAY")]
    Gateway,
    #[serde(rename = "EDITING")]
    Editing,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role string: {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MESSAGE_BROKER" => Ok(Role::MessageBroker),
            "GATEWAY" => Ok(Role::Gateway),
            "EDITING" => Ok(Role::Editing),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::MessageBroker => "MESSAGE_BROKER",
            Role::Gateway => "GATEWAY",
            Role::Editing => "EDITING",
        };

        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_fromstr() {
        for role in [Role::MessageBroker, Role::Gateway, Role::Editing] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn rejects_unknown_role_strings() {
        assert!("ADMIN".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn serializes_to_the_wire_strings() {
        assert_eq!(serde_json::to_string(&Role::MessageBroker).unwrap(), "\"MESSAGE_BROKER\"");
        assert_eq!(serde_json::to_string(&Role::Gateway).unwrap(), "\"GATEWAY\"");
        assert_eq!(serde_json::to_string(&Role::Editing).unwrap(), "\"EDITING\"");
    }

    #[test]
    fn deserialize_rejects_unknown_role() {
        let result: Result<Role, _> = serde_json::from_str("\"ADMIN\"");
        assert!(result.is_err());
    }
}

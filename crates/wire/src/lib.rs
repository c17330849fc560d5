//! Wire codec for the seven discovery/election message types (spec §4.2).
//!
//! All messages are UTF-8 text datagrams: space-separated header tokens,
//! with JSON as the payload token where applicable. The parser fails
//! loudly on anything malformed and never mutates caller state — callers
//! are expected to drop the datagram and log on `Err`.
use std::collections::HashSet;

use primitives::{NodeAddress, Role};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("unknown message type: {0:?}")]
    UnknownType(String),

    #[error("missing payload for message type {0}")]
    MissingPayload(&'static str),

    #[error("unexpected payload for message type {0}")]
    UnexpectedPayload(&'static str),

    #[error("invalid node-list JSON: {0}")]
    InvalidJson(String),

    #[error("invalid IPv4 address in payload: {0:?}")]
    InvalidAddress(String),
}

/// A single entry in a node-list payload, as carried by HELLO, ACK HELLO,
/// COORDINATOR and ACK COORDINATOR (spec §4.2, §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub address: NodeAddress,
    pub roles: HashSet<Role>,
}

/// The seven discovery/election message types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Join,
    Hello(Vec<NodeDescriptor>),
    AckHello(Vec<NodeDescriptor>),
    Election,
    Ok,
    Coordinator(Vec<NodeDescriptor>),
    AckCoordinator(Vec<NodeDescriptor>),
}

impl Message {
    pub fn parse(raw: &str) -> Result<Message, WireError> {
        let raw = raw.trim();

        if let Some(rest) = strip_keyword(raw, "ACK HELLO") {
            return Ok(Message::AckHello(parse_node_list(rest, "ACK HELLO")?));
        }

        if let Some(rest) = strip_keyword(raw, "ACK COORDINATOR") {
            return Ok(Message::AckCoordinator(parse_node_list(rest, "ACK COORDINATOR")?));
        }

        if let Some(rest) = strip_keyword(raw, "HELLO") {
            return Ok(Message::Hello(parse_node_list(rest, "HELLO")?));
        }

        if let Some(rest) = strip_keyword(raw, "COORDINATOR") {
            return Ok(Message::Coordinator(parse_node_list(rest, "COORDINATOR")?));
        }

        if let Some(rest) = strip_keyword(raw, "JOIN") {
            return no_payload(rest, "JOIN").map(|_| Message::Join);
        }

        if let Some(rest) = strip_keyword(raw, "ELECTION") {
            return no_payload(rest, "ELECTION").map(|_| Message::Election);
        }

        if let Some(rest) = strip_keyword(raw, "OK") {
            return no_payload(rest, "OK").map(|_| Message::Ok);
        }

        Err(WireError::UnknownType(raw.to_string()))
    }

    pub fn encode(&self) -> String {
        match self {
            Message::Join => "JOIN".to_string(),
            Message::Election => "ELECTION".to_string(),
            Message::Ok => "OK".to_string(),
            Message::Hello(nodes) => format!("HELLO {}", encode_node_list(nodes)),
            Message::AckHello(nodes) => format!("ACK HELLO {}", encode_node_list(nodes)),
            Message::Coordinator(nodes) => format!("COORDINATOR {}", encode_node_list(nodes)),
            Message::AckCoordinator(nodes) => format!("ACK COORDINATOR {}", encode_node_list(nodes)),
        }
    }
}

/// Strips a leading keyword followed by either whitespace-then-payload or
/// end of string. Returns `None` if `raw` doesn't start with `keyword` as a
/// whole token (so "HELLOX" never matches "HELLO").
fn strip_keyword<'a>(raw: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = raw.strip_prefix(keyword)?;

    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix(' ')
    }
}

fn no_payload(rest: &str, kind: &'static str) -> Result<(), WireError> {
    if rest.trim().is_empty() {
        Ok(())
    } else {
        Err(WireError::UnexpectedPayload(kind))
    }
}

fn parse_node_list(rest: &str, kind: &'static str) -> Result<Vec<NodeDescriptor>, WireError> {
    let rest = rest.trim();

    if rest.is_empty() {
        return Err(WireError::MissingPayload(kind));
    }

    let raw: Vec<RawNodeDescriptor> =
        serde_json::from_str(rest).map_err(|err| WireError::InvalidJson(err.to_string()))?;

    raw.into_iter().map(RawNodeDescriptor::into_descriptor).collect()
}

fn encode_node_list(nodes: &[NodeDescriptor]) -> String {
    let raw: Vec<RawNodeDescriptor> = nodes
        .iter()
        .map(|n| RawNodeDescriptor {
            address: n.address.to_string(),
            roles: n.roles.iter().copied().collect(),
        })
        .collect();

    serde_json::to_string(&raw).unwrap_or_else(|_| "[]".to_string())
}

/// Wire shape of a single node-list entry. Deliberately uses `String` for
/// `address` (never `NodeAddress` directly) so that a missing field, a
/// `null`, or a malformed IPv4 literal all surface as explicit errors
/// instead of silently defaulting (spec §9: reject `undefined`-vs-`null`-
/// vs-absent ambiguities uniformly).
#[derive(Debug, Serialize, Deserialize)]
struct RawNodeDescriptor {
    address: String,
    roles: Vec<Role>,
}

impl RawNodeDescriptor {
    fn into_descriptor(self) -> Result<NodeDescriptor, WireError> {
        let address = primitives::parse_ipv4(&self.address)
            .map_err(|_| WireError::InvalidAddress(self.address.clone()))?;

        Ok(NodeDescriptor {
            address,
            roles: self.roles.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> NodeAddress {
        s.parse().unwrap()
    }

    #[test]
    fn parses_join() {
        assert_eq!(Message::parse("JOIN").unwrap(), Message::Join);
    }

    #[test]
    fn join_with_trailing_payload_is_rejected() {
        assert!(Message::parse("JOIN garbage").is_err());
    }

    #[test]
    fn parses_election_and_ok() {
        assert_eq!(Message::parse("ELECTION").unwrap(), Message::Election);
        assert_eq!(Message::parse("OK").unwrap(), Message::Ok);
    }

    #[test]
    fn parses_hello_with_node_list() {
        let raw = r#"HELLO [{"address":"10.0.0.1","roles":[]}]"#;
        let msg = Message::parse(raw).unwrap();

        match msg {
            Message::Hello(nodes) => {
                assert_eq!(nodes.len(), 1);
                assert_eq!(nodes[0].address, addr("10.0.0.1"));
                assert!(nodes[0].roles.is_empty());
            },
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn parses_ack_hello_and_ack_coordinator() {
        let raw = r#"ACK HELLO [{"address":"10.0.0.2","roles":["MESSAGE_BROKER"]}]"#;
        let msg = Message::parse(raw).unwrap();

        assert!(matches!(msg, Message::AckHello(_)));

        let raw = r#"ACK COORDINATOR [{"address":"10.0.0.2","roles":["GATEWAY"]}]"#;
        let msg = Message::parse(raw).unwrap();

        assert!(matches!(msg, Message::AckCoordinator(_)));
    }

    #[test]
    fn parses_coordinator_with_roles() {
        let raw = r#"COORDINATOR [{"address":"10.0.0.3","roles":["MESSAGE_BROKER"]},{"address":"10.0.0.1","roles":["GATEWAY"]}]"#;
        let msg = Message::parse(raw).unwrap();

        match msg {
            Message::Coordinator(nodes) => {
                assert_eq!(nodes.len(), 2);
                assert!(nodes[0].roles.contains(&Role::MessageBroker));
                assert!(nodes[1].roles.contains(&Role::Gateway));
            },
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(Message::parse("PING").is_err());
        assert!(Message::parse("ASSIGN").is_err());
    }

    #[test]
    fn rejects_non_json_payload() {
        assert!(Message::parse("HELLO not-json").is_err());
    }

    #[test]
    fn rejects_missing_payload_on_payload_bearing_types() {
        assert!(Message::parse("HELLO").is_err());
        assert!(Message::parse("HELLO ").is_err());
    }

    #[test]
    fn rejects_non_array_payload() {
        assert!(Message::parse(r#"HELLO {"address":"10.0.0.1","roles":[]}"#).is_err());
    }

    #[test]
    fn rejects_missing_address_field() {
        assert!(Message::parse(r#"HELLO [{"roles":[]}]"#).is_err());
    }

    #[test]
    fn rejects_null_address() {
        assert!(Message::parse(r#"HELLO [{"address":null,"roles":[]}]"#).is_err());
    }

    #[test]
    fn rejects_invalid_ipv4_in_payload() {
        assert!(Message::parse(r#"HELLO [{"address":"999.0.0.1","roles":[]}]"#).is_err());
    }

    #[test]
    fn rejects_roles_not_array() {
        assert!(Message::parse(r#"HELLO [{"address":"10.0.0.1","roles":"MESSAGE_BROKER"}]"#).is_err());
    }

    #[test]
    fn rejects_unknown_role_string() {
        assert!(Message::parse(r#"HELLO [{"address":"10.0.0.1","roles":["ADMIN"]}]"#).is_err());
    }

    #[test]
    fn encode_then_parse_round_trips_for_coordinator() {
        let mut roles = HashSet::new();
        roles.insert(Role::MessageBroker);

        let original = Message::Coordinator(vec![NodeDescriptor {
            address: addr("10.0.0.3"),
            roles,
        }]);

        let encoded = original.encode();
        let parsed = Message::parse(&encoded).unwrap();

        assert_eq!(parsed, original);
    }
}

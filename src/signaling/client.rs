//! Signaling client capability
//!
//! The wire protocol lives behind [`SessionClient`]. Its asynchronous
//! notifications reach the session as [`ClientEvent`] values.

use super::negotiation::{Negotiation, TransportError};
use crate::media::StreamId;
use serde::{Deserialize, Serialize};

/// Permissions granted by the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub op: bool,
    pub present: bool,
    pub record: bool,
}

impl Permissions {
    /// Short description shown next to the user name
    pub fn describe(&self) -> &'static str {
        match (self.op, self.present) {
            (true, true) => "(op, presenter)",
            (true, false) => "operator",
            (false, true) => "presenter",
            (false, false) => "",
        }
    }
}

/// Roster change kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserChange {
    Add,
    Delete,
    Other(String),
}

impl UserChange {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "add" => UserChange::Add,
            "delete" => UserChange::Delete,
            other => UserChange::Other(other.to_string()),
        }
    }
}

/// A remote stream announced by the server
#[derive(Debug)]
pub struct DownstreamOffer {
    pub id: StreamId,
    pub negotiation: Negotiation,
}

/// Notifications from the signaling layer
#[derive(Debug)]
pub enum ClientEvent {
    Connected,
    Closed { code: u16, reason: String },
    Downstream(DownstreamOffer),
    User {
        id: String,
        change: UserChange,
        name: Option<String>,
    },
    Permissions(Permissions),
}

/// Operations the session needs from the signaling layer
pub trait SessionClient: Send + Sync {
    fn login(&self, username: &str, password: &str) -> Result<(), TransportError>;

    fn join(&self, group: &str) -> Result<(), TransportError>;

    /// Ask the server which downstream media to send us
    fn request(&self, tier: &str) -> Result<(), TransportError>;

    fn chat(&self, username: &str, kind: &str, dest: &str, message: &str)
        -> Result<(), TransportError>;

    fn group_action(&self, action: &str, arg: Option<&str>) -> Result<(), TransportError>;

    fn user_action(&self, action: &str, id: &str, arg: Option<&str>)
        -> Result<(), TransportError>;

    /// Register a new upstream stream with the server
    fn new_up_stream(&self, id: &StreamId) -> Result<Negotiation, TransportError>;

    fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_text() {
        let both = Permissions { op: true, present: true, record: false };
        assert_eq!(both.describe(), "(op, presenter)");
        assert_eq!(Permissions { op: true, ..Default::default() }.describe(), "operator");
        assert_eq!(Permissions { present: true, ..Default::default() }.describe(), "presenter");
        assert_eq!(Permissions::default().describe(), "");
    }

    #[test]
    fn test_user_change_parse() {
        assert_eq!(UserChange::parse("add"), UserChange::Add);
        assert_eq!(UserChange::parse("delete"), UserChange::Delete);
        assert_eq!(UserChange::parse("rename"), UserChange::Other("rename".to_string()));
    }
}

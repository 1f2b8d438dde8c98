//! Handler identifiers: the numeric tag that selects a frame's schema and
//! the client callback it is routed to.

use std::fmt;

/// Numeric handler identifier carried in every frame header and in every
/// [`Response`](crate::Response).
///
/// The known values below are the ones the game server speaks; any other
/// value is still representable so that unknown messages can be logged
/// instead of failing to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub u32);

impl HandlerId {
    /// Ping request / pong reply used for latency measurement.
    pub const PING: HandlerId = HandlerId(1);
    /// Client → server: "I moved to (x, y)".
    pub const LOCATION_UPDATE_PAYLOAD: HandlerId = HandlerId(2);
    /// Server → client: positions of every user in the world.
    pub const LOCATION_UPDATE: HandlerId = HandlerId(3);
    /// Handshake: client identity out, initial world state back.
    pub const INIT: HandlerId = HandlerId(4);

    /// Returns the name of a well-known id, or `None`.
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::PING => Some("PING"),
            Self::LOCATION_UPDATE_PAYLOAD => Some("LOCATION_UPDATE_PAYLOAD"),
            Self::LOCATION_UPDATE => Some("LOCATION_UPDATE"),
            Self::INIT => Some("INIT"),
            _ => None,
        }
    }
}

impl From<u32> for HandlerId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}({})", self.0),
            None => write!(f, "handler-{}", self.0),
        }
    }
}

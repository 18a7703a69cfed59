use serde::{Deserialize, Serialize};

/// Addressable party reachable through the message transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: i64,
    pub address: String,
    pub receive_notifications: bool,
}

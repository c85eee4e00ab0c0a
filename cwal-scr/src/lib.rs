// ABOUTME: Client for the web API StarCraft: Remastered serves on localhost, plus the events SC:R emits.
// ABOUTME: Shared between the settings/bootstrap layer and anything else that needs to talk to the game.

mod api;
mod cache;
mod connection;
mod error;

use serde::{Deserialize, Serialize};

pub use api::{CachedScrApi, GATEWAY_ENDPOINT, Gateway, ScrApi};
pub use cache::{CachedFetch, DEFAULT_TTL};
pub use connection::{BroodWarConnection, Fetch};
pub use error::ClientError;

/// A player as identified by the game client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub alias: String,
    pub gateway: u16,
}

/// Events observed from the running game process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrEvent {
    ProfileSelect(Player),
    MatchFound {
        player1: Player,
        player2: Player,
        map: String,
    },
    GameEnded,
    WebServerRunning {
        port: u16,
    },
    WebServerDown,
}

impl ScrEvent {
    /// The web server port this event implies.
    ///
    /// `Some(Some(port))` when the server came up, `Some(None)` when it went away,
    /// `None` when the event says nothing about the server.
    pub fn port_signal(&self) -> Option<Option<u16>> {
        match self {
            ScrEvent::WebServerRunning { port } => Some(Some(*port)),
            ScrEvent::WebServerDown => Some(None),
            _ => None,
        }
    }
}

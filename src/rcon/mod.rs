pub mod client;
pub mod packet;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};
use crate::models::PlayerChatMap;

pub use client::SquadRcon;

lazy_static! {
    static ref CURRENT_AND_NEXT_MAP: Regex =
        Regex::new(r"Current map is (.+), Next map is (.+)").unwrap();
}

/// The transport contract the voter needs from an RCON connection.
///
/// The real implementation is [`SquadRcon`]; tests substitute a mock.
#[async_trait]
pub trait RconClient: Send + Sync {
    /// Sends a console command to the server and returns its response body.
    async fn exec_command(&self, command: &str) -> Result<String>;

    /// Returns the chat collected since the last [`clear_player_chat`]
    /// call, keyed by player id.
    ///
    /// [`clear_player_chat`]: RconClient::clear_player_chat
    async fn get_player_chat(&self) -> PlayerChatMap;

    /// Discards all collected chat.
    async fn clear_player_chat(&self);

    /// Sends an admin broadcast message to the server.
    async fn broadcast(&self, message: &str) -> Result<()> {
        self.exec_command(&format!("AdminBroadcast {}", message))
            .await?;
        Ok(())
    }

    /// Sets the next map on the server.
    async fn set_next_map(&self, next_map: &str) -> Result<()> {
        self.exec_command(&format!("AdminSetNextMap \"{}\"", next_map))
            .await?;
        Ok(())
    }

    /// Asks the server for the current and next map.
    async fn get_current_and_next_map(&self) -> Result<(String, String)> {
        let response = self.exec_command("ShowNextMap").await?;
        parse_current_and_next_map(&response)
    }
}

fn parse_current_and_next_map(response: &str) -> Result<(String, String)> {
    let captures = CURRENT_AND_NEXT_MAP
        .captures(response.trim())
        .ok_or_else(|| Error::BadResponse(format!("ShowNextMap returned {:?}", response)))?;
    Ok((captures[1].to_string(), captures[2].trim().to_string()))
}

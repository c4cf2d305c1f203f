use std::collections::HashMap;

/// Everything one player said over a listening window, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerChat {
    pub player_name: String,
    pub messages: Vec<String>,
}

impl PlayerChat {
    pub fn new(player_name: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            messages: Vec::new(),
        }
    }
}

/// Chat snapshot keyed by player id (Steam id on Squad servers).
pub type PlayerChatMap = HashMap<String, PlayerChat>;

/// How a single map vote resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// A real map won and was set as next map.
    MapSet { map: String, votes: usize },
    /// The "none of the above" option won; a redo vote with random
    /// candidates should start as soon as possible.
    Redo { votes: usize },
    /// Nobody cast a valid ballot.
    Failed,
}

/// Test helper to build a chat snapshot from literals.
#[cfg(test)]
pub fn chat_snapshot(entries: &[(&str, &str, &[&str])]) -> PlayerChatMap {
    entries
        .iter()
        .map(|(id, name, messages)| {
            (
                id.to_string(),
                PlayerChat {
                    player_name: name.to_string(),
                    messages: messages.iter().map(|m| m.to_string()).collect(),
                },
            )
        })
        .collect()
}

use crate::models::PlayerChatMap;

/// The list of recognized map vote commands.
pub const MAP_VOTE_COMMANDS: [&str; 3] = ["!mapvote", "!votemap", "!rtv"];

/// Returns true if the message contains any of the map vote commands.
pub fn has_map_vote_command(message: &str) -> bool {
    let lowered = message.to_lowercase();
    MAP_VOTE_COMMANDS
        .iter()
        .any(|command| lowered.contains(command))
}

/// Returns the ids of all players who issued a map vote command in the
/// given chat snapshot.
pub fn requesting_players(chat: &PlayerChatMap) -> impl Iterator<Item = &str> {
    chat.iter().filter_map(|(player_id, player_chat)| {
        player_chat
            .messages
            .iter()
            .any(|message| has_map_vote_command(message))
            .then_some(player_id.as_str())
    })
}

/// Returns true if any player whose display name contains `clan_tag`
/// issued a map vote command. Clan members bypass the vote cooldown.
pub fn has_privileged_request(chat: &PlayerChatMap, clan_tag: &str) -> bool {
    chat.values().any(|player_chat| {
        player_chat.player_name.contains(clan_tag)
            && player_chat
                .messages
                .iter()
                .any(|message| has_map_vote_command(message))
    })
}

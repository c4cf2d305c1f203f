pub mod candidates;
pub mod tally;
pub mod trigger;

/// Wait this long in between map votes.
pub const DEFAULT_VOTING_COOLDOWN_S: u64 = 60 * 30;

/// How long to listen to chat for vote casts, in seconds.
pub const DEFAULT_VOTING_DURATION_S: u64 = 30;

/// How many of the next maps in the current rotation to offer as candidates.
pub const NUM_NEXT_MAPS_IN_ROTATION: usize = 4;

/// The minimum number of distinct players that must request a map vote
/// before one is allowed to start.
pub const VOTE_REQUEST_THRESHOLD: usize = 5;

/// The default clan tag whose members may force a map vote.
pub const DEFAULT_CLAN_TAG: &str = "[FP]";

/// The default URL of the Squad map layers JSON document.
pub const DEFAULT_LAYERS_URL: &str =
    "https://raw.githubusercontent.com/bsubei/squad_map_layers/master/layers.json";

/// The last option in every map vote: runs the vote again with random candidates.
pub const REDO_VOTE_OPTION: &str = "None of the above (do nothing)";

/// Sent to the server when a map vote starts (candidate list appended).
pub const START_VOTE_MESSAGE_PREFIX: &str =
    "Please cast a vote for the next map by typing the corresponding number in AllChat.";

/// Sent to the server when the listening window closes. Broadcasting also
/// forces the server to flush any chat packets it buffered while we slept.
pub const VOTING_OVER_MESSAGE: &str = "Voting is over!";

/// Sent to the server when a map vote ends without a single valid ballot.
pub const VOTE_FAILED_MESSAGE: &str = "The map vote failed!";

/// Returns the numbered candidate list shown to players in chat.
pub fn format_candidate_maps(candidate_maps: &[String]) -> String {
    candidate_maps
        .iter()
        .enumerate()
        .map(|(index, candidate)| format!("{}) {}", index, candidate))
        .collect::<Vec<_>>()
        .join("\n")
}

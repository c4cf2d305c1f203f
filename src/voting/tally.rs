use std::collections::HashMap;

use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

use crate::models::PlayerChatMap;

lazy_static! {
    /// The last word of a message is the vote.
    static ref VOTE_TOKEN: Regex = Regex::new(r"\w+$").unwrap();
}

/// Parses one message as a ballot: the last whitespace-trimmed token must be
/// an index into `candidate_maps`.
fn parse_ballot(message: &str, num_candidates: usize) -> Option<usize> {
    let token = VOTE_TOKEN.find(message.trim())?.as_str();
    match token.parse::<usize>() {
        Ok(index) if index < num_candidates => Some(index),
        _ => None,
    }
}

/// Given the candidate maps and the chat collected over the voting window,
/// returns the winning map and its vote count, or `None` if nobody cast a
/// valid ballot.
///
/// Each player gets at most one ballot: their messages are scanned newest
/// first and the first one that parses as a valid vote counts, so voting
/// again overrides an earlier vote. Ties are broken by the candidate's
/// position in `candidate_maps` (earliest wins), which makes the outcome
/// reproducible from the same chat snapshot.
pub fn get_highest_map_vote(
    candidate_maps: &[String],
    player_messages: &PlayerChatMap,
) -> Option<(String, usize)> {
    let mut map_votes: HashMap<usize, usize> = HashMap::new();

    for (player_id, player_chat) in player_messages {
        for message in player_chat.messages.iter().rev() {
            match parse_ballot(message, candidate_maps.len()) {
                Some(index) => {
                    *map_votes.entry(index).or_insert(0) += 1;
                    // Ignore this player's older messages so their vote is
                    // not double-counted.
                    break;
                }
                None => {
                    warn!(
                        "Player with id {} entered invalid mapvote message {:?}. Skipping...",
                        player_id, message
                    );
                }
            }
        }
    }

    // Lowest index wins ties, so walk the candidates in offer order and
    // only replace the winner on a strictly higher count.
    let mut winner: Option<(usize, usize)> = None;
    for (index, _) in candidate_maps.iter().enumerate() {
        if let Some(&count) = map_votes.get(&index) {
            if winner.map_or(true, |(_, best)| count > best) {
                winner = Some((index, count));
            }
        }
    }

    winner.map(|(index, count)| (candidate_maps[index].clone(), count))
}

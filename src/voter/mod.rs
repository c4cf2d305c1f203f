use std::collections::HashSet;
use std::mem;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use tokio::time::sleep;

use crate::catalog::{CatalogSource, LayerCatalog};
use crate::error::{Error, Result};
use crate::models::{PlayerChatMap, VoteOutcome};
use crate::rcon::RconClient;
use crate::rotation::get_rotation_from_filepath;
use crate::voting::candidates::get_map_candidates;
use crate::voting::tally::get_highest_map_vote;
use crate::voting::trigger::{has_privileged_request, requesting_players};
use crate::voting::{
    format_candidate_maps, REDO_VOTE_OPTION, START_VOTE_MESSAGE_PREFIX, VOTE_FAILED_MESSAGE,
    VOTE_REQUEST_THRESHOLD, VOTING_OVER_MESSAGE,
};

/// All mutable voting state, owned by the [`MapVoter`] and only touched
/// from the single poll thread.
#[derive(Debug)]
pub struct VoterState {
    /// When the last vote concluded with a map change (or the voter
    /// started up).
    last_vote_resolved_at: DateTime<Utc>,
    cooldown: Duration,
    listen_duration: StdDuration,
    /// Players who asked for a map vote since the last reset.
    requesting_players: HashSet<String>,
    /// Set when the redo option won; the next vote starts immediately
    /// with random candidates.
    redo_requested: bool,
}

impl VoterState {
    fn new(now: DateTime<Utc>, cooldown_s: u64, voting_duration_s: u64) -> Self {
        Self {
            last_vote_resolved_at: now,
            cooldown: Duration::seconds(cooldown_s as i64),
            listen_duration: StdDuration::from_secs(voting_duration_s),
            requesting_players: HashSet::new(),
            redo_requested: false,
        }
    }

    /// Called whenever a vote concludes with a map change, to put the next
    /// threshold-triggered vote on cooldown.
    fn reset(&mut self, now: DateTime<Utc>) {
        self.last_vote_resolved_at = now;
        self.requesting_players.clear();
    }

    /// Positive while the cooldown still has time to run. A clock that
    /// jumped backwards makes the elapsed time negative, which never
    /// counts as an elapsed cooldown.
    fn duration_until_vote_available(&self, now: DateTime<Utc>) -> Duration {
        self.cooldown - now.signed_duration_since(self.last_vote_resolved_at)
    }
}

/// Runs map votes over an RCON connection.
///
/// Drive it by calling [`run_once`] every poll tick with the fresh chat
/// snapshot; when a vote triggers, `run_once` blocks for the whole
/// listening window before returning.
///
/// [`run_once`]: MapVoter::run_once
pub struct MapVoter<R: RconClient> {
    rcon: R,
    state: VoterState,
    clan_tag: String,
    rotation_filepath: Option<PathBuf>,
    catalog_source: CatalogSource,
}

impl<R: RconClient> MapVoter<R> {
    pub fn new(
        rcon: R,
        cooldown_s: u64,
        voting_duration_s: u64,
        clan_tag: String,
        rotation_filepath: Option<PathBuf>,
        catalog_source: CatalogSource,
    ) -> Self {
        Self {
            rcon,
            state: VoterState::new(Utc::now(), cooldown_s, voting_duration_s),
            clan_tag,
            rotation_filepath,
            catalog_source,
        }
    }

    /// The underlying RCON connection, shared with the poll loop.
    pub fn rcon(&self) -> &R {
        &self.rcon
    }

    /// Decides whether a map vote should start now.
    ///
    /// True when enough distinct players asked for one and the cooldown
    /// has elapsed, when a clan member asked for one (no cooldown), or
    /// when the previous vote ended in a redo (no cooldown either).
    pub async fn should_start_map_vote(
        &mut self,
        now: DateTime<Utc>,
        chat: &PlayerChatMap,
    ) -> Result<bool> {
        let enough_asked = self.update_vote_requests(chat).await?;
        let cooldown_elapsed = self.state.duration_until_vote_available(now) <= Duration::zero();

        Ok(has_privileged_request(chat, &self.clan_tag)
            || self.state.redo_requested
            || (cooldown_elapsed && enough_asked))
    }

    /// Folds the snapshot's vote requests into the request set and returns
    /// whether the threshold is met. When new requests arrive but more are
    /// still needed, players get a nudge broadcast.
    async fn update_vote_requests(&mut self, chat: &PlayerChatMap) -> Result<bool> {
        let previous_requests = self.state.requesting_players.len();
        for player_id in requesting_players(chat) {
            self.state.requesting_players.insert(player_id.to_string());
        }

        let requests = self.state.requesting_players.len();
        let enough_asked = requests >= VOTE_REQUEST_THRESHOLD;
        if !enough_asked && requests != previous_requests {
            let remaining = VOTE_REQUEST_THRESHOLD - requests;
            self.rcon
                .broadcast(&format!(
                    "{} more requests needed to start a map vote.",
                    remaining
                ))
                .await?;
        }
        Ok(enough_asked)
    }

    /// Runs the mapvoter logic once: keeps the rotation unstuck, and
    /// starts a map vote (blocking through the whole listening window)
    /// when one is due.
    pub async fn run_once(
        &mut self,
        current_map: &str,
        next_map: &str,
        chat: &PlayerChatMap,
    ) -> Result<()> {
        let now = Utc::now();
        let until_available = self.state.duration_until_vote_available(now);
        if until_available > Duration::zero() {
            debug!("Time until map vote is available: {}s", until_available.num_seconds());
        } else {
            debug!("Time since map vote was available: {}s", -until_available.num_seconds());
        }
        debug!(
            "Number of players asking for map vote: {}.",
            self.state.requesting_players.len()
        );

        // The previous vote could have set the next map to the current
        // one; never let the same map run twice in a row.
        if current_map == next_map {
            self.fix_stuck_rotation(current_map).await?;
        }

        if self.should_start_map_vote(now, chat).await? {
            // A redo vote ignores the rotation so the candidates come out
            // different this time. Consume the flag either way.
            let redo = mem::take(&mut self.state.redo_requested);
            let candidates = self.build_candidates(current_map, !redo).await?;
            let outcome = self.start_map_vote(&candidates).await?;
            info!("Map vote finished: {:?}", outcome);
        }
        Ok(())
    }

    /// Sets a random real candidate as next map when the server reports
    /// the same map for current and next.
    async fn fix_stuck_rotation(&mut self, current_map: &str) -> Result<()> {
        let candidates = self.build_candidates(current_map, true).await?;
        // Exclude the skirmish opener and the trailing redo option.
        let real_candidates = &candidates[1..candidates.len() - 1];
        let random_map = match real_candidates.choose(&mut rand::thread_rng()) {
            Some(map) => map.clone(),
            None => return Ok(()),
        };
        warn!(
            "Next map is same as current map! Setting to a random map: {}",
            random_map
        );
        self.rcon.set_next_map(&random_map).await
    }

    /// Builds the candidate list, falling back to random catalog draws
    /// when the rotation is unusable.
    async fn build_candidates(&self, current_map: &str, use_rotation: bool) -> Result<Vec<String>> {
        let catalog = LayerCatalog::load(&self.catalog_source).await?;

        let rotation = match &self.rotation_filepath {
            Some(path) if use_rotation => Some(get_rotation_from_filepath(path)?),
            _ => None,
        };

        let mut rng = rand::thread_rng();
        match get_map_candidates(rotation.as_deref(), &catalog, current_map, &mut rng) {
            Err(Error::MapNotInRotation(_)) => {
                warn!("Failed to find current map in rotation! Using random maps as candidates instead of rotation!");
                get_map_candidates(None, &catalog, current_map, &mut rng)
            }
            result => result,
        }
    }

    /// Announces the candidates, listens for ballots for the configured
    /// duration (blocking), tallies them, and applies the outcome.
    pub async fn start_map_vote(&mut self, candidate_maps: &[String]) -> Result<VoteOutcome> {
        let candidates_formatted = format_candidate_maps(candidate_maps);
        info!("Starting a new map vote! Candidate maps:\n{}", candidates_formatted);

        let start_vote_message =
            format!("{}\n{}", START_VOTE_MESSAGE_PREFIX, candidates_formatted);
        self.rcon.broadcast(&start_vote_message).await?;

        // Drop whatever chat accumulated before the announcement so stale
        // messages cannot count as ballots.
        self.rcon.clear_player_chat().await;

        self.listen_to_votes(&start_vote_message).await?;
        let player_chat = self.rcon.get_player_chat().await;
        debug!("The received player messages were:\n{:?}", player_chat);

        let outcome = match get_highest_map_vote(candidate_maps, &player_chat) {
            Some((winner_map, vote_count)) if winner_map != REDO_VOTE_OPTION => {
                let result_message = format!(
                    "The map with the most votes is: {} with {} votes!",
                    winner_map, vote_count
                );
                self.rcon.broadcast(&result_message).await?;
                info!("{}", result_message);
                self.rcon.set_next_map(&winner_map).await?;
                // Put the next threshold-triggered vote on cooldown.
                self.state.reset(Utc::now());
                VoteOutcome::MapSet {
                    map: winner_map,
                    votes: vote_count,
                }
            }
            Some((_, vote_count)) => {
                let redo_message = format!(
                    "The none of the above option had the most votes ({} votes). !rtv to restart map vote.",
                    vote_count
                );
                self.rcon.broadcast(&redo_message).await?;
                info!("{}", redo_message);
                // No cooldown reset: the redo vote starts on the next tick.
                self.state.redo_requested = true;
                VoteOutcome::Redo { votes: vote_count }
            }
            None => {
                // We do not reset the cooldown because the map vote failed,
                // so the engine may trigger again on the next tick.
                self.rcon.broadcast(VOTE_FAILED_MESSAGE).await?;
                warn!("{}", VOTE_FAILED_MESSAGE);
                VoteOutcome::Failed
            }
        };
        Ok(outcome)
    }

    /// Waits out the voting window. The announcement is re-broadcast at the
    /// halfway point (a single broadcast can get swallowed by the server's
    /// message deduplication), and the closing broadcast makes the server
    /// flush any buffered chat packets.
    async fn listen_to_votes(&self, halftime_message: &str) -> Result<()> {
        sleep(self.state.listen_duration / 2).await;
        self.rcon.broadcast(halftime_message).await?;
        sleep(self.state.listen_duration / 2).await;
        self.rcon.broadcast(VOTING_OVER_MESSAGE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{chat_snapshot, PlayerChatMap};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every command sent and hands back a scripted chat snapshot.
    #[derive(Default)]
    struct MockRcon {
        commands: Mutex<Vec<String>>,
        chat: Mutex<PlayerChatMap>,
        chat_clears: AtomicUsize,
    }

    impl MockRcon {
        fn with_chat(chat: PlayerChatMap) -> Self {
            Self {
                chat: Mutex::new(chat),
                ..Default::default()
            }
        }

        fn sent_commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RconClient for MockRcon {
        async fn exec_command(&self, command: &str) -> Result<String> {
            self.commands.lock().unwrap().push(command.to_string());
            Ok(String::new())
        }

        async fn get_player_chat(&self) -> PlayerChatMap {
            self.chat.lock().unwrap().clone()
        }

        async fn clear_player_chat(&self) {
            self.chat_clears.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_voter(rcon: MockRcon, cooldown_s: u64) -> MapVoter<MockRcon> {
        MapVoter::new(
            rcon,
            cooldown_s,
            0, // no listening delay in tests
            "[FP]".to_string(),
            None,
            CatalogSource::File("/nonexistent/layers.json".into()),
        )
    }

    fn candidates() -> Vec<String> {
        vec![
            "skirmish opener".to_string(),
            "real map one".to_string(),
            "real map two".to_string(),
            REDO_VOTE_OPTION.to_string(),
        ]
    }

    fn request_chat(player_ids: &[&str]) -> PlayerChatMap {
        let entries: Vec<(&str, &str, &[&str])> = player_ids
            .iter()
            .map(|id| (*id, "some pleb", &["!rtv"][..]))
            .collect();
        chat_snapshot(&entries)
    }

    #[tokio::test]
    async fn vote_triggers_on_fifth_distinct_requester_after_cooldown() {
        let mut voter = test_voter(MockRcon::default(), 0);
        let now = Utc::now() + Duration::seconds(1);

        let four = request_chat(&["p1", "p2", "p3", "p4"]);
        assert!(!voter.should_start_map_vote(now, &four).await.unwrap());
        assert_eq!(
            voter.rcon.sent_commands(),
            vec!["AdminBroadcast 1 more requests needed to start a map vote."]
        );

        // The same four players asking again changes nothing and sends no
        // second nudge.
        assert!(!voter.should_start_map_vote(now, &four).await.unwrap());
        assert_eq!(voter.rcon.sent_commands().len(), 1);

        let fifth = request_chat(&["p5"]);
        assert!(voter.should_start_map_vote(now, &fifth).await.unwrap());
    }

    #[tokio::test]
    async fn cooldown_blocks_threshold_triggering() {
        let mut voter = test_voter(MockRcon::default(), 1800);
        let now = Utc::now();

        let five = request_chat(&["p1", "p2", "p3", "p4", "p5"]);
        assert!(!voter.should_start_map_vote(now, &five).await.unwrap());

        // Once the cooldown has elapsed the banked requests are enough.
        let later = now + Duration::seconds(1801);
        assert!(voter.should_start_map_vote(later, &five).await.unwrap());
    }

    #[tokio::test]
    async fn negative_elapsed_time_never_triggers() {
        let mut voter = test_voter(MockRcon::default(), 0);
        let past = Utc::now() - Duration::seconds(100_000);

        let five = request_chat(&["p1", "p2", "p3", "p4", "p5"]);
        assert!(!voter.should_start_map_vote(past, &five).await.unwrap());
    }

    #[tokio::test]
    async fn clan_member_bypasses_cooldown() {
        let mut voter = test_voter(MockRcon::default(), 1800);
        let now = Utc::now();

        let chat = chat_snapshot(&[("clan1", "[FP] boss", &["!mapvote"][..])]);
        assert!(voter.should_start_map_vote(now, &chat).await.unwrap());
    }

    #[tokio::test]
    async fn redo_bypasses_cooldown() {
        let mut voter = test_voter(MockRcon::default(), 1800);
        voter.state.redo_requested = true;
        assert!(voter
            .should_start_map_vote(Utc::now(), &PlayerChatMap::new())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn winning_map_is_broadcast_set_and_resets_cooldown() {
        // p1 votes 1 then changes their mind to 0; p2 votes 0.
        let chat = chat_snapshot(&[
            ("p1", "p1", &["1", "0"][..]),
            ("p2", "p2", &["0"][..]),
        ]);
        let mut voter = test_voter(MockRcon::with_chat(chat), 1800);
        voter.state.requesting_players.insert("p1".to_string());
        let before = Utc::now() - Duration::seconds(10_000);
        voter.state.last_vote_resolved_at = before;

        let outcome = voter.start_map_vote(&candidates()).await.unwrap();
        assert_eq!(
            outcome,
            VoteOutcome::MapSet {
                map: "skirmish opener".to_string(),
                votes: 2
            }
        );

        let commands = voter.rcon.sent_commands();
        assert!(commands[0].starts_with(&format!("AdminBroadcast {}", START_VOTE_MESSAGE_PREFIX)));
        assert!(commands.contains(
            &"AdminBroadcast The map with the most votes is: skirmish opener with 2 votes!"
                .to_string()
        ));
        assert!(commands.contains(&"AdminSetNextMap \"skirmish opener\"".to_string()));
        // Chat accumulated before the announcement was dropped.
        assert_eq!(voter.rcon.chat_clears.load(Ordering::SeqCst), 1);
        // Cooldown state was reset.
        assert!(voter.state.last_vote_resolved_at > before);
        assert!(voter.state.requesting_players.is_empty());
    }

    #[tokio::test]
    async fn redo_win_sets_flag_and_keeps_cooldown() {
        let redo_index = (candidates().len() - 1).to_string();
        let chat = chat_snapshot(&[("p1", "p1", &[redo_index.as_str()][..])]);
        let mut voter = test_voter(MockRcon::with_chat(chat), 1800);
        let before = voter.state.last_vote_resolved_at;

        let outcome = voter.start_map_vote(&candidates()).await.unwrap();
        assert_eq!(outcome, VoteOutcome::Redo { votes: 1 });
        assert!(voter.state.redo_requested);
        assert_eq!(voter.state.last_vote_resolved_at, before);

        let commands = voter.rcon.sent_commands();
        assert!(commands.contains(
            &"AdminBroadcast The none of the above option had the most votes (1 votes). !rtv to restart map vote."
                .to_string()
        ));
        // The next map must not change on a redo.
        assert!(!commands.iter().any(|c| c.starts_with("AdminSetNextMap")));
    }

    #[tokio::test]
    async fn failed_vote_leaves_state_untouched() {
        let chat = chat_snapshot(&[("p1", "p1", &["not a ballot"][..])]);
        let mut voter = test_voter(MockRcon::with_chat(chat), 1800);
        voter.state.requesting_players.insert("p1".to_string());
        let before = voter.state.last_vote_resolved_at;

        let outcome = voter.start_map_vote(&candidates()).await.unwrap();
        assert_eq!(outcome, VoteOutcome::Failed);
        assert_eq!(voter.state.last_vote_resolved_at, before);
        assert_eq!(voter.state.requesting_players.len(), 1);

        let commands = voter.rcon.sent_commands();
        assert!(commands.contains(&"AdminBroadcast The map vote failed!".to_string()));
        assert!(!commands.iter().any(|c| c.starts_with("AdminSetNextMap")));
    }

    #[tokio::test]
    async fn announcement_repeats_at_halftime_and_voting_over_closes_window() {
        let mut voter = test_voter(MockRcon::default(), 1800);
        voter.start_map_vote(&candidates()).await.unwrap();

        let commands = voter.rcon.sent_commands();
        let announcement = format!(
            "AdminBroadcast {}\n{}",
            START_VOTE_MESSAGE_PREFIX,
            format_candidate_maps(&candidates())
        );
        assert_eq!(commands[0], announcement);
        assert_eq!(commands[1], announcement);
        assert_eq!(commands[2], "AdminBroadcast Voting is over!");
    }

    #[tokio::test]
    async fn stuck_rotation_sets_a_random_real_candidate() {
        let layers = r#"[
            {"name": "Sumari Skirmish v1", "gamemode": "Skirmish"},
            {"name": "Gorodok AAS v1", "gamemode": "AAS"},
            {"name": "Yehorivka RAAS v2", "gamemode": "RAAS"}
        ]"#;
        let path = std::env::temp_dir().join("mapvoter_stuck_rotation_layers.json");
        std::fs::write(&path, layers).unwrap();

        let mut voter = MapVoter::new(
            MockRcon::default(),
            1800,
            0,
            "[FP]".to_string(),
            None,
            CatalogSource::File(path.clone()),
        );
        voter
            .run_once("Gorodok AAS v1", "Gorodok AAS v1", &PlayerChatMap::new())
            .await
            .unwrap();
        std::fs::remove_file(&path).ok();

        let commands = voter.rcon.sent_commands();
        assert_eq!(commands.len(), 1);
        // A real candidate: neither the skirmish opener nor the redo slot.
        assert!(commands[0].starts_with("AdminSetNextMap \""));
        assert!(!commands[0].contains("Skirmish"));
        assert!(!commands[0].contains(REDO_VOTE_OPTION));
    }
}

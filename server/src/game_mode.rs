//! Phase and elimination policy.
//!
//! [`GameModeLogic`] is the strategy the phase orchestrator consults at every
//! decision point. Default method bodies are the race policy: a phase ends
//! once enough players finish, the top finishers qualify and everyone else
//! still connected is eliminated. Variants override only what differs; the
//! orchestrator never needs to know which variant it holds.

use log::{debug, info};
use shared::{GameModeKind, PlayerId};
use std::collections::BTreeSet;

/// Why a player left the running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EliminationReason {
    /// Did not qualify when the phase ended.
    NotQualified,
    /// Fell below the level with no respawn available.
    Fell,
    /// Reduced to zero health with no respawn available.
    Killed,
}

pub trait GameModeLogic: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_phase_start(&mut self, phase: u32, total_players: usize, qualifying_players: usize) {
        info!(
            "[{}] phase {} started: {} players, {} qualify",
            self.name(),
            phase,
            total_players,
            qualifying_players
        );
    }

    fn should_end_phase(&self, finished: usize, qualifying: usize, total_players: usize) -> bool {
        default_should_end_phase(finished, qualifying, total_players)
    }

    fn players_to_eliminate(
        &self,
        finished: &[PlayerId],
        qualifying: usize,
        connected: &[PlayerId],
    ) -> Vec<PlayerId> {
        top_finishers_qualify(finished, qualifying, connected)
    }

    fn should_end_game(&self, players_alive: usize, current_phase: u32, total_phases: u32) -> bool {
        players_alive <= 1 || current_phase >= total_phases
    }

    fn on_player_finished(&mut self, id: PlayerId, position: usize) {
        debug!("[{}] player {} finished in position {}", self.name(), id, position);
    }

    fn on_player_eliminated(&mut self, id: PlayerId, reason: EliminationReason) {
        debug!("[{}] player {} eliminated: {:?}", self.name(), id, reason);
    }

    fn on_player_disconnected(&mut self, id: PlayerId) {
        debug!("[{}] player {} disconnected", self.name(), id);
    }

    /// Seconds before `id` respawns; `f32::INFINITY` means never.
    fn respawn_delay(&self, _id: PlayerId, default_delay: f32) -> f32 {
        default_delay
    }

    fn on_phase_end(&mut self, phase: u32, qualified: &[PlayerId], eliminated: &[PlayerId]) {
        info!(
            "[{}] phase {} ended: qualified {:?}, eliminated {:?}",
            self.name(),
            phase,
            qualified,
            eliminated
        );
    }

    fn on_game_end(&mut self, winner: Option<PlayerId>) {
        info!("[{}] game over, winner: {:?}", self.name(), winner);
    }
}

pub fn default_should_end_phase(finished: usize, qualifying: usize, _total_players: usize) -> bool {
    finished >= qualifying
}

/// The first `qualifying` finishers advance; every other connected player is out.
///
/// Returns nobody when `qualifying` covers every connected player.
pub fn top_finishers_qualify(
    finished: &[PlayerId],
    qualifying: usize,
    connected: &[PlayerId],
) -> Vec<PlayerId> {
    if qualifying >= connected.len() {
        return Vec::new();
    }
    let qualified: BTreeSet<PlayerId> = finished.iter().take(qualifying).copied().collect();
    connected
        .iter()
        .filter(|id| !qualified.contains(id))
        .copied()
        .collect()
}

/// Race to the finish zone with respawns.
#[derive(Debug, Default)]
pub struct RaceMode {
    finish_order: Vec<PlayerId>,
}

impl RaceMode {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameModeLogic for RaceMode {
    fn name(&self) -> &'static str {
        "race"
    }

    fn on_phase_start(&mut self, phase: u32, total_players: usize, qualifying_players: usize) {
        self.finish_order.clear();
        info!(
            "[race] phase {} started: {} players racing for {} spots",
            phase, total_players, qualifying_players
        );
    }

    fn on_player_finished(&mut self, id: PlayerId, position: usize) {
        self.finish_order.push(id);
        info!("[race] player {} crossed the line in position {}", id, position);
    }

    fn on_phase_end(&mut self, phase: u32, qualified: &[PlayerId], eliminated: &[PlayerId]) {
        info!(
            "[race] phase {} ended: finish order {:?}, qualified {:?}, eliminated {:?}",
            phase, self.finish_order, qualified, eliminated
        );
    }
}

/// Sudden death: no respawns, the phase ends on the first finish or when at
/// most one player is left standing.
#[derive(Debug, Default)]
pub struct LastStandingMode {
    eliminated: BTreeSet<PlayerId>,
}

impl LastStandingMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eliminated_this_phase(&self) -> usize {
        self.eliminated.len()
    }
}

impl GameModeLogic for LastStandingMode {
    fn name(&self) -> &'static str {
        "last-standing"
    }

    fn on_phase_start(&mut self, phase: u32, total_players: usize, _qualifying_players: usize) {
        self.eliminated.clear();
        info!(
            "[last-standing] phase {} started with {} players",
            phase, total_players
        );
    }

    fn should_end_phase(&self, finished: usize, _qualifying: usize, total_players: usize) -> bool {
        total_players.saturating_sub(self.eliminated.len()) <= 1 || finished >= 1
    }

    /// Everyone who neither finished nor already went out this phase.
    ///
    /// A finish wins the phase outright, even when the qualifying count
    /// equals the roster. When nobody finished, the players still standing
    /// are the survivors and are kept.
    fn players_to_eliminate(
        &self,
        finished: &[PlayerId],
        qualifying: usize,
        connected: &[PlayerId],
    ) -> Vec<PlayerId> {
        if qualifying > connected.len() || finished.is_empty() {
            return Vec::new();
        }
        connected
            .iter()
            .filter(|id| !finished.contains(id) && !self.eliminated.contains(id))
            .copied()
            .collect()
    }

    fn on_player_eliminated(&mut self, id: PlayerId, reason: EliminationReason) {
        if self.eliminated.insert(id) {
            info!("[last-standing] player {} is out ({:?})", id, reason);
        }
    }

    fn on_player_disconnected(&mut self, id: PlayerId) {
        // The roster already stops counting them; keeping them here too would
        // subtract them twice.
        self.eliminated.remove(&id);
        debug!("[last-standing] player {} disconnected", id);
    }

    fn respawn_delay(&self, _id: PlayerId, _default_delay: f32) -> f32 {
        f32::INFINITY
    }
}

/// Builds a fresh per-session strategy for a configured mode.
pub fn create_game_mode(kind: GameModeKind) -> Box<dyn GameModeLogic> {
    match kind {
        GameModeKind::Race => Box::new(RaceMode::new()),
        GameModeKind::LastStanding => Box::new(LastStandingMode::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_eliminates_beyond_top_finishers() {
        let mode = RaceMode::new();
        let out = mode.players_to_eliminate(&[1, 2, 3, 4], 3, &[1, 2, 3, 4]);
        assert_eq!(out, vec![4]);
    }

    #[test]
    fn test_default_eliminates_non_finishers() {
        let mode = RaceMode::new();
        let out = mode.players_to_eliminate(&[5, 2, 3, 4], 3, &[1, 2, 3, 4, 5]);
        assert_eq!(out, vec![1, 4]);
    }

    #[test]
    fn test_default_no_over_elimination() {
        let mode = RaceMode::new();
        assert!(mode.players_to_eliminate(&[1], 3, &[1, 2, 3]).is_empty());
        assert!(mode.players_to_eliminate(&[1], 5, &[1, 2, 3]).is_empty());
    }

    #[test]
    fn test_default_should_end_phase() {
        let mode = RaceMode::new();
        assert!(!mode.should_end_phase(2, 3, 8));
        assert!(mode.should_end_phase(3, 3, 8));
    }

    #[test]
    fn test_should_end_game() {
        let mode = RaceMode::new();
        assert!(mode.should_end_game(1, 2, 5));
        assert!(mode.should_end_game(5, 5, 5));
        assert!(!mode.should_end_game(5, 2, 5));
        assert!(mode.should_end_game(0, 1, 5));
    }

    #[test]
    fn test_race_tracks_finish_order_per_phase() {
        let mut mode = RaceMode::new();
        mode.on_phase_start(1, 3, 2);
        mode.on_player_finished(3, 1);
        mode.on_player_finished(1, 2);
        assert_eq!(mode.finish_order, vec![3, 1]);
        mode.on_phase_end(1, &[3, 1], &[2]);

        mode.on_phase_start(2, 2, 1);
        assert!(mode.finish_order.is_empty());
    }

    #[test]
    fn test_race_respawns_with_default_delay() {
        let mode = RaceMode::new();
        assert_eq!(mode.respawn_delay(1, 2.5), 2.5);
    }

    #[test]
    fn test_last_standing_ends_on_first_finish() {
        let mode = LastStandingMode::new();
        assert!(mode.should_end_phase(1, 4, 8));
        assert!(!mode.should_end_phase(0, 1, 8));
    }

    #[test]
    fn test_last_standing_ends_when_one_left() {
        let mut mode = LastStandingMode::new();
        mode.on_phase_start(1, 3, 1);
        mode.on_player_eliminated(1, EliminationReason::Fell);
        assert!(!mode.should_end_phase(0, 1, 3));
        mode.on_player_eliminated(2, EliminationReason::Fell);
        assert!(mode.should_end_phase(0, 1, 3));
    }

    #[test]
    fn test_last_standing_no_double_elimination() {
        let mut mode = LastStandingMode::new();
        mode.on_phase_start(1, 4, 1);
        mode.on_player_eliminated(2, EliminationReason::Killed);
        mode.on_player_eliminated(2, EliminationReason::Killed);
        assert_eq!(mode.eliminated_this_phase(), 1);

        let first = mode.players_to_eliminate(&[1], 1, &[1, 2, 3, 4]);
        let second = mode.players_to_eliminate(&[1], 1, &[1, 2, 3, 4]);
        assert_eq!(first, vec![3, 4]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_last_standing_finish_at_full_qualifying_count() {
        let mut mode = LastStandingMode::new();
        mode.on_phase_start(1, 4, 4);
        assert_eq!(mode.players_to_eliminate(&[1], 4, &[1, 2, 3, 4]), vec![2, 3, 4]);
        assert!(mode.players_to_eliminate(&[1], 5, &[1, 2, 3, 4]).is_empty());
    }

    #[test]
    fn test_last_standing_survivor_kept_without_finishers() {
        let mut mode = LastStandingMode::new();
        mode.on_phase_start(1, 2, 1);
        mode.on_player_eliminated(1, EliminationReason::Fell);
        assert!(mode.players_to_eliminate(&[], 1, &[1, 2]).is_empty());
    }

    #[test]
    fn test_last_standing_disconnect_not_counted_twice() {
        let mut mode = LastStandingMode::new();
        mode.on_phase_start(1, 3, 1);
        mode.on_player_eliminated(1, EliminationReason::Fell);
        // Player 1 leaves; the roster shrinks to 2.
        mode.on_player_disconnected(1);
        assert!(!mode.should_end_phase(0, 1, 2));
    }

    #[test]
    fn test_last_standing_never_respawns() {
        let mode = LastStandingMode::new();
        assert!(mode.respawn_delay(1, 2.0).is_infinite());
    }

    #[test]
    fn test_phase_start_resets_bookkeeping() {
        let mut mode = LastStandingMode::new();
        mode.on_player_eliminated(3, EliminationReason::Fell);
        mode.on_phase_start(2, 4, 1);
        assert_eq!(mode.eliminated_this_phase(), 0);
    }

    #[test]
    fn test_create_game_mode_selects_variant() {
        assert_eq!(create_game_mode(GameModeKind::Race).name(), "race");
        assert_eq!(
            create_game_mode(GameModeKind::LastStanding).name(),
            "last-standing"
        );
    }
}

//! Phase orchestration (the game state manager).
//!
//! Owns the roster bookkeeping for one game: who is still alive, who takes
//! part in the current phase, the finish order and the phase counter. Every
//! policy decision is delegated to the session's [`GameModeLogic`].

use log::{info, warn};
use shared::{MiniGameConfig, PhaseConfig, PlayerId};
use std::sync::Arc;

use crate::game_mode::{EliminationReason, GameModeLogic};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    NotStarted,
    InPhase,
    /// Between phases, waiting for `advance`.
    PhaseOver,
    GameOver { winner: Option<PlayerId> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseStart {
    pub phase: u32,
    pub qualifying_players: u32,
    pub participants: Vec<PlayerId>,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseOutcome {
    pub phase: u32,
    pub qualified: Vec<PlayerId>,
    /// Mid-phase eliminations followed by end-of-phase eliminations.
    pub eliminated: Vec<PlayerId>,
    /// `Some(winner)` when this phase ended the game.
    pub game_over: Option<Option<PlayerId>>,
}

pub struct GameStateManager {
    config: Arc<MiniGameConfig>,
    mode: Box<dyn GameModeLogic>,
    status: GameStatus,
    /// 1-based; 0 before the first phase.
    current_phase: u32,
    alive: Vec<PlayerId>,
    participants: Vec<PlayerId>,
    finished: Vec<PlayerId>,
    eliminated_this_phase: Vec<PlayerId>,
}

impl GameStateManager {
    pub fn new(config: Arc<MiniGameConfig>, mode: Box<dyn GameModeLogic>) -> Self {
        Self {
            config,
            mode,
            status: GameStatus::NotStarted,
            current_phase: 0,
            alive: Vec::new(),
            participants: Vec::new(),
            finished: Vec::new(),
            eliminated_this_phase: Vec::new(),
        }
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn current_phase(&self) -> u32 {
        self.current_phase
    }

    pub fn total_phases(&self) -> u32 {
        self.config.total_phases()
    }

    pub fn alive(&self) -> &[PlayerId] {
        &self.alive
    }

    pub fn participants(&self) -> &[PlayerId] {
        &self.participants
    }

    pub fn finished(&self) -> &[PlayerId] {
        &self.finished
    }

    pub fn is_participant(&self, id: PlayerId) -> bool {
        self.participants.contains(&id)
    }

    /// Still racing in the current phase: taking part, not finished, not out.
    pub fn is_active(&self, id: PlayerId) -> bool {
        self.status == GameStatus::InPhase
            && self.participants.contains(&id)
            && !self.finished.contains(&id)
            && !self.eliminated_this_phase.contains(&id)
    }

    pub fn phase_config(&self) -> Option<&PhaseConfig> {
        let index = self.current_phase.checked_sub(1)? as usize;
        self.config.phases.get(index)
    }

    /// Qualifying count for the current phase, clamped to the roster size.
    pub fn qualifying_count(&self) -> usize {
        self.phase_config()
            .map(|phase| (phase.qualifying_players as usize).min(self.participants.len()))
            .unwrap_or(0)
    }

    pub fn start_game(&mut self, players: &[PlayerId]) -> PhaseStart {
        self.alive = players.to_vec();
        self.current_phase = 0;
        info!(
            "Starting '{}' with {} players",
            self.config.name,
            self.alive.len()
        );
        self.start_next_phase()
    }

    /// Starts the phase after the current one with everyone still alive.
    pub fn start_next_phase(&mut self) -> PhaseStart {
        self.current_phase += 1;
        self.participants = self.alive.clone();
        self.finished.clear();
        self.eliminated_this_phase.clear();
        self.status = GameStatus::InPhase;

        let qualifying = self.qualifying_count();
        self.mode
            .on_phase_start(self.current_phase, self.participants.len(), qualifying);

        PhaseStart {
            phase: self.current_phase,
            qualifying_players: qualifying as u32,
            participants: self.participants.clone(),
            level: self
                .phase_config()
                .map(|phase| phase.level.clone())
                .unwrap_or_default(),
        }
    }

    /// Records a finish; returns the 1-based finishing position.
    pub fn player_finished(&mut self, id: PlayerId) -> Option<usize> {
        if !self.is_active(id) {
            return None;
        }
        self.finished.push(id);
        let position = self.finished.len();
        self.mode.on_player_finished(id, position);
        Some(position)
    }

    /// Removes a player mid-phase (no respawn available).
    pub fn player_eliminated(&mut self, id: PlayerId, reason: EliminationReason) -> bool {
        if !self.is_active(id) {
            return false;
        }
        self.eliminated_this_phase.push(id);
        self.alive.retain(|p| *p != id);
        self.mode.on_player_eliminated(id, reason);
        true
    }

    /// Drops a player from every roster so they no longer count anywhere.
    pub fn player_disconnected(&mut self, id: PlayerId) {
        let known = self.alive.contains(&id) || self.participants.contains(&id);
        self.alive.retain(|p| *p != id);
        self.participants.retain(|p| *p != id);
        self.finished.retain(|p| *p != id);
        self.eliminated_this_phase.retain(|p| *p != id);
        if known {
            self.mode.on_player_disconnected(id);
        }
    }

    pub fn respawn_delay(&self, id: PlayerId) -> f32 {
        let default_delay = self
            .phase_config()
            .map(|phase| phase.respawn_delay)
            .unwrap_or(0.0);
        self.mode.respawn_delay(id, default_delay)
    }

    /// Ends the phase if the strategy says so.
    pub fn evaluate(&mut self) -> Option<PhaseOutcome> {
        if self.status != GameStatus::InPhase {
            return None;
        }
        let should_end = self.participants.is_empty()
            || self.mode.should_end_phase(
                self.finished.len(),
                self.qualifying_count(),
                self.participants.len(),
            );
        if should_end {
            Some(self.end_phase())
        } else {
            None
        }
    }

    pub fn end_phase(&mut self) -> PhaseOutcome {
        let qualifying = self.qualifying_count();
        let to_eliminate =
            self.mode
                .players_to_eliminate(&self.finished, qualifying, &self.participants);

        for id in &to_eliminate {
            if self.eliminated_this_phase.contains(id) {
                warn!("Player {} was already out this phase, skipping", id);
                continue;
            }
            self.mode
                .on_player_eliminated(*id, EliminationReason::NotQualified);
        }

        let mut eliminated = self.eliminated_this_phase.clone();
        for id in to_eliminate {
            if !eliminated.contains(&id) {
                eliminated.push(id);
            }
        }

        self.alive.retain(|id| !eliminated.contains(id));
        let qualified: Vec<PlayerId> = self
            .participants
            .iter()
            .filter(|id| !eliminated.contains(id))
            .copied()
            .collect();

        self.mode
            .on_phase_end(self.current_phase, &qualified, &eliminated);

        let game_over = if self.mode.should_end_game(
            self.alive.len(),
            self.current_phase,
            self.total_phases(),
        ) {
            let winner = self.pick_winner();
            self.mode.on_game_end(winner);
            self.status = GameStatus::GameOver { winner };
            Some(winner)
        } else {
            self.status = GameStatus::PhaseOver;
            None
        };

        PhaseOutcome {
            phase: self.current_phase,
            qualified,
            eliminated,
            game_over,
        }
    }

    fn pick_winner(&self) -> Option<PlayerId> {
        if self.alive.len() == 1 {
            return self.alive.first().copied();
        }
        self.finished
            .iter()
            .find(|id| self.alive.contains(id))
            .copied()
    }
}

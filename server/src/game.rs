use log::{debug, error, info, warn};
use shared::{
    DespawnCause, EffectId, EffectPayload, EntitySnapshot, InputState, MiniGameConfig, Packet,
    PlayerId, ProjectileDespawn, SpellId, Vec2, Vec3, WorldDelta, WorldSnapshot,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::catalog::MiniGameCatalog;
use crate::error::{Result, ServerError};
use crate::game_mode::{create_game_mode, EliminationReason};
use crate::level::LevelLayout;
use crate::movement::MovementController;
use crate::phase::{GameStateManager, PhaseOutcome, PhaseStart};
use crate::projectile::{resolve_impact, Damageable, Health, ImpactTargets, Projectile, TargetInfo};
use crate::replication::Replicator;
use crate::spells::{CastRequest, CasterState, SpellCaster, CAST_HEIGHT};
use crate::status_effects::{EffectEvent, StatusEffectEngine};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    /// Connected players needed before the lobby countdown starts.
    pub min_players: usize,
    pub lobby_countdown: f32,
    /// Pause between phases.
    pub intermission: f32,
    /// Pause after the game ends before returning to the lobby.
    pub restart_delay: f32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            min_players: 2,
            lobby_countdown: 5.0,
            intermission: 3.0,
            restart_delay: 8.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionState {
    Lobby { countdown: Option<f32> },
    Playing,
    Intermission { remaining: f32 },
    GameOver { remaining: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRole {
    Player,
    /// Joined after the game started; watches until the next one.
    Spectator,
}

/// Roster changes observers need to hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseStarted {
        phase: u32,
        qualifying_players: u32,
        participants: Vec<PlayerId>,
    },
    PhaseEnded {
        phase: u32,
        qualified: Vec<PlayerId>,
        eliminated: Vec<PlayerId>,
    },
    GameEnded {
        winner: Option<PlayerId>,
    },
}

impl From<SessionEvent> for Packet {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::PhaseStarted {
                phase,
                qualifying_players,
                participants,
            } => Packet::PhaseStarted {
                phase,
                qualifying_players,
                participants,
            },
            SessionEvent::PhaseEnded {
                phase,
                qualified,
                eliminated,
            } => Packet::PhaseEnded {
                phase,
                qualified,
                eliminated,
            },
            SessionEvent::GameEnded { winner } => Packet::GameEnded { winner },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TickOutput {
    pub delta: WorldDelta,
    pub events: Vec<SessionEvent>,
}

/// One character in the world.
#[derive(Debug)]
struct PlayerEntity {
    movement: MovementController,
    effects: StatusEffectEngine,
    health: Option<Health>,
    /// Present and simulated; false while awaiting respawn or after elimination.
    in_world: bool,
    respawn_timer: Option<f32>,
    input: InputState,
    spawn_slot: usize,
}

impl PlayerEntity {
    fn new(config: &MiniGameConfig, position: Vec3, spawn_slot: usize) -> Self {
        Self {
            movement: MovementController::new(config.movement, position, 0.0),
            effects: StatusEffectEngine::new(config.movement.base_speed),
            health: config.player_health.map(Health::new),
            in_world: true,
            respawn_timer: None,
            input: InputState::default(),
            spawn_slot,
        }
    }

    /// Puts the character back at `position` with full health and no effects.
    fn place(&mut self, position: Vec3) {
        self.movement.reset(position, 0.0);
        self.effects.clear();
        self.effects.take_speed_change();
        self.movement.set_move_speed(self.effects.derived_speed());
        if let Some(health) = self.health.as_mut() {
            let missing = health.max - health.current;
            health.heal(missing);
        }
        self.in_world = true;
        self.respawn_timer = None;
        self.input.move_vector = Vec2::ZERO;
        self.input.jump_velocity = 0.0;
    }

    fn remove_from_world(&mut self, respawn_in: Option<f32>) {
        self.in_world = false;
        self.respawn_timer = respawn_in;
        self.effects.clear();
    }

    fn is_dead(&self) -> bool {
        self.health.map(|h| h.is_depleted()).unwrap_or(false)
    }

    fn snapshot(&self, id: PlayerId) -> EntitySnapshot {
        let state = self.movement.state();
        EntitySnapshot {
            id,
            position: state.position,
            yaw: state.yaw,
            animation_speed: state.animation_speed,
            movement_speed: state.move_speed,
            health: self.health.map(|h| h.current),
            alive: self.in_world,
        }
    }
}

/// The authoritative world for one minigame.
///
/// Every tick runs in a fixed order: queued casts, status effects, movement,
/// projectiles and impacts, respawns, finish/fall/death detection, phase
/// evaluation. The resulting delta is what gets broadcast.
pub struct GameSession {
    catalog: Arc<MiniGameCatalog>,
    config: Arc<MiniGameConfig>,
    settings: SessionSettings,
    state: SessionState,
    manager: GameStateManager,
    level: Arc<LevelLayout>,
    players: BTreeMap<PlayerId, PlayerEntity>,
    spectators: BTreeSet<PlayerId>,
    projectiles: Vec<Projectile>,
    spells: SpellCaster,
    replicator: Replicator,
    pending_casts: Vec<CastRequest>,
    tick: u32,
    time: f32,
}

impl GameSession {
    pub fn new(
        catalog: Arc<MiniGameCatalog>,
        minigame: &str,
        settings: SessionSettings,
    ) -> Result<Self> {
        let config = catalog.minigame(minigame)?;
        let first_phase = config.phases.first().ok_or_else(|| {
            ServerError::InvalidConfig(format!("minigame '{}' has no phases", config.id))
        })?;
        let level = catalog.level(&first_phase.level)?;
        let manager = GameStateManager::new(Arc::clone(&config), create_game_mode(config.mode));
        info!(
            "Created session for '{}' ({} phases, lobby level '{}')",
            config.name,
            config.total_phases(),
            level.name
        );

        Ok(Self {
            catalog,
            config,
            settings,
            state: SessionState::Lobby { countdown: None },
            manager,
            level,
            players: BTreeMap::new(),
            spectators: BTreeSet::new(),
            projectiles: Vec::new(),
            spells: SpellCaster::new(),
            replicator: Replicator::new(),
            pending_casts: Vec::new(),
            tick: 0,
            time: 0.0,
        })
    }

    pub fn add_player(&mut self, id: PlayerId) -> JoinRole {
        if self.players.contains_key(&id) {
            return JoinRole::Player;
        }
        if self.spectators.contains(&id) {
            return JoinRole::Spectator;
        }

        if matches!(self.state, SessionState::Lobby { .. }) {
            self.spawn_entity(id);
            info!("Player {} joined the lobby", id);
            JoinRole::Player
        } else {
            self.spectators.insert(id);
            info!("Player {} joined mid-game as a spectator", id);
            JoinRole::Spectator
        }
    }

    pub fn remove_player(&mut self, id: PlayerId) {
        if self.players.remove(&id).is_some() {
            self.replicator.forget_entity(id);
        }
        self.spectators.remove(&id);
        self.pending_casts.retain(|cast| cast.caster != id);
        self.manager.player_disconnected(id);
        info!("Player {} left the session", id);
    }

    /// Latest-wins: an input older than the one held is dropped.
    pub fn submit_input(&mut self, id: PlayerId, input: InputState) -> bool {
        let Some(entity) = self.players.get_mut(&id) else {
            return false;
        };
        if !entity.in_world || input.sequence < entity.input.sequence {
            return false;
        }
        entity.input = input;
        true
    }

    /// Queues a cast request; it is validated on the next tick.
    pub fn submit_cast(&mut self, id: PlayerId, spell_id: SpellId, slot: u8) -> bool {
        if !self.players.contains_key(&id) {
            return false;
        }
        self.pending_casts.push(CastRequest {
            caster: id,
            spell_id,
            slot,
        });
        true
    }

    pub fn tick(&mut self, dt: f32) -> TickOutput {
        self.tick = self.tick.wrapping_add(1);
        self.time += dt;
        let mut events = Vec::new();

        self.process_casts();
        self.update_status_effects(dt);
        self.update_movement(dt);
        self.update_projectiles(dt);
        self.update_respawns(dt);
        self.detect_outcomes();
        self.advance_state(dt, &mut events);

        let entities = self.entity_snapshots();
        TickOutput {
            delta: self.replicator.build_delta(self.tick, &entities),
            events,
        }
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        let projectiles = self.projectiles.iter().map(Projectile::spawn_record).collect();
        self.replicator.full_snapshot(
            self.tick,
            self.manager.current_phase(),
            &self.entity_snapshots(),
            projectiles,
        )
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_tick(&self) -> u32 {
        self.tick
    }

    pub fn manager(&self) -> &GameStateManager {
        &self.manager
    }

    pub fn level(&self) -> &LevelLayout {
        &self.level
    }

    pub fn spell_slots(&self) -> &[SpellId] {
        &self.config.spell_slots
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_spectator(&self, id: PlayerId) -> bool {
        self.spectators.contains(&id)
    }

    pub fn entity(&self, id: PlayerId) -> Option<EntitySnapshot> {
        self.players.get(&id).map(|entity| entity.snapshot(id))
    }

    pub fn effect_stacks(&self, id: PlayerId, effect: EffectId) -> u32 {
        self.players
            .get(&id)
            .map(|entity| entity.effects.stacks_of(effect))
            .unwrap_or(0)
    }

    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }

    fn entity_snapshots(&self) -> Vec<EntitySnapshot> {
        self.players
            .iter()
            .map(|(id, entity)| entity.snapshot(*id))
            .collect()
    }

    fn spawn_entity(&mut self, id: PlayerId) {
        let slot = self.players.len();
        let position = self.level.spawn_point(slot);
        self.players
            .insert(id, PlayerEntity::new(&self.config, position, slot));
        self.replicator.track_entity(id);
    }

    fn process_casts(&mut self) {
        for request in std::mem::take(&mut self.pending_casts) {
            let caster = self.players.get(&request.caster).map(|entity| CasterState {
                position: entity.movement.position(),
                yaw: entity.movement.yaw(),
                body_radius: entity.movement.body_radius(),
                active: self.state == SessionState::Playing
                    && entity.in_world
                    && self.manager.is_active(request.caster),
            });

            match self
                .spells
                .handle_cast(request, caster, &self.config.spell_slots, &self.catalog)
            {
                Ok(projectile) => {
                    self.replicator.record_spawn(projectile.spawn_record());
                    self.projectiles.push(projectile);
                }
                Err(rejection) => {
                    debug!("Rejected cast from player {}: {}", request.caster, rejection);
                }
            }
        }
    }

    fn update_status_effects(&mut self, dt: f32) {
        let now = self.time;
        for (id, entity) in self.players.iter_mut() {
            if !entity.in_world {
                continue;
            }
            for event in entity.effects.tick(now, dt) {
                match event {
                    EffectEvent::Applied { effect } => {
                        debug!("Player {} gained {}", id, effect.name);
                    }
                    EffectEvent::Ticked { effect, stacks, dt } => {
                        let EffectPayload::DamageOverTime { damage_per_second } = effect.payload
                        else {
                            continue;
                        };
                        if let Some(health) = entity.health.as_mut() {
                            health.take_damage(damage_per_second * stacks as f32 * dt);
                        }
                    }
                    EffectEvent::Removed { effect } => {
                        debug!("Player {} lost {}", id, effect.name);
                    }
                }
            }
            if let Some(speed) = entity.effects.take_speed_change() {
                entity.movement.set_move_speed(speed);
            }
        }
    }

    fn update_movement(&mut self, dt: f32) {
        let level = Arc::clone(&self.level);
        for entity in self.players.values_mut().filter(|e| e.in_world) {
            entity.movement.step(&entity.input, level.as_ref(), dt);
            entity.input.jump_velocity = 0.0;
        }
    }

    fn update_projectiles(&mut self, dt: f32) {
        let mut survivors = Vec::with_capacity(self.projectiles.len());

        for mut projectile in std::mem::take(&mut self.projectiles) {
            if let Some(contact) = projectile.advance(dt, &*self) {
                let report = resolve_impact(&projectile, contact, &mut *self);
                debug!(
                    "Projectile {} impacted at {:?}, damaged {:?}",
                    projectile.id,
                    contact.point(),
                    report.damaged
                );
                self.replicator.record_despawn(ProjectileDespawn {
                    id: projectile.id,
                    position: contact.point(),
                    cause: DespawnCause::Impact,
                    effect_prefab: report.effect_prefab,
                });
            } else if projectile.is_expired() || self.level.below_kill_plane(projectile.position) {
                self.replicator.record_despawn(ProjectileDespawn {
                    id: projectile.id,
                    position: projectile.position,
                    cause: DespawnCause::Expired,
                    effect_prefab: None,
                });
            } else {
                survivors.push(projectile);
            }
        }

        self.projectiles = survivors;
    }

    fn update_respawns(&mut self, dt: f32) {
        let level = Arc::clone(&self.level);
        for (id, entity) in self.players.iter_mut() {
            let Some(timer) = entity.respawn_timer.as_mut() else {
                continue;
            };
            *timer -= dt;
            if *timer <= 0.0 {
                entity.place(level.spawn_point(entity.spawn_slot));
                debug!("Player {} respawned", id);
            }
        }
    }

    fn detect_outcomes(&mut self) {
        let playing = self.state == SessionState::Playing;
        let mut fallen = Vec::new();
        let mut finished = Vec::new();

        for (id, entity) in self.players.iter().filter(|(_, e)| e.in_world) {
            let position = entity.movement.position();
            if entity.is_dead() {
                fallen.push((*id, EliminationReason::Killed));
            } else if self.level.below_kill_plane(position) {
                fallen.push((*id, EliminationReason::Fell));
            } else if playing
                && self.level.in_finish_zone(position)
                && self.manager.is_active(*id)
            {
                finished.push(*id);
            }
        }

        for id in finished {
            if let Some(position) = self.manager.player_finished(id) {
                info!(
                    "Player {} finished phase {} in position {}",
                    id,
                    self.manager.current_phase(),
                    position
                );
            }
        }

        for (id, reason) in fallen {
            let delay = if playing && self.manager.is_participant(id) {
                self.manager.respawn_delay(id)
            } else {
                0.0
            };
            let Some(entity) = self.players.get_mut(&id) else {
                continue;
            };
            if delay.is_finite() {
                debug!("Player {} out ({:?}), respawning in {:.1}s", id, reason, delay);
                entity.remove_from_world(Some(delay));
            } else {
                entity.remove_from_world(None);
                self.manager.player_eliminated(id, reason);
            }
        }
    }

    fn advance_state(&mut self, dt: f32, events: &mut Vec<SessionEvent>) {
        match self.state {
            SessionState::Lobby { countdown } => {
                if self.players.len() < self.settings.min_players {
                    self.state = SessionState::Lobby { countdown: None };
                    return;
                }
                let remaining = countdown.unwrap_or(self.settings.lobby_countdown) - dt;
                if remaining <= 0.0 {
                    self.start_game(events);
                } else {
                    self.state = SessionState::Lobby {
                        countdown: Some(remaining),
                    };
                }
            }
            SessionState::Playing => {
                if let Some(outcome) = self.manager.evaluate() {
                    self.finish_phase(outcome, events);
                }
            }
            SessionState::Intermission { remaining } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    let start = self.manager.start_next_phase();
                    self.begin_phase(start, events);
                } else {
                    self.state = SessionState::Intermission { remaining };
                }
            }
            SessionState::GameOver { remaining } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    self.enter_lobby();
                } else {
                    self.state = SessionState::GameOver { remaining };
                }
            }
        }
    }

    fn start_game(&mut self, events: &mut Vec<SessionEvent>) {
        self.manager = GameStateManager::new(
            Arc::clone(&self.config),
            create_game_mode(self.config.mode),
        );
        let roster: Vec<PlayerId> = self.players.keys().copied().collect();
        let start = self.manager.start_game(&roster);
        self.begin_phase(start, events);
    }

    fn begin_phase(&mut self, start: PhaseStart, events: &mut Vec<SessionEvent>) {
        match self.catalog.level(&start.level) {
            Ok(level) => self.level = level,
            Err(e) => error!("Phase {} keeps the previous level: {}", start.phase, e),
        }
        self.clear_projectiles();

        let level = Arc::clone(&self.level);
        for (id, entity) in self.players.iter_mut() {
            match start.participants.iter().position(|p| p == id) {
                Some(slot) => {
                    entity.spawn_slot = slot;
                    entity.place(level.spawn_point(slot));
                }
                None => entity.remove_from_world(None),
            }
        }

        self.state = SessionState::Playing;
        events.push(SessionEvent::PhaseStarted {
            phase: start.phase,
            qualifying_players: start.qualifying_players,
            participants: start.participants,
        });
    }

    fn finish_phase(&mut self, outcome: PhaseOutcome, events: &mut Vec<SessionEvent>) {
        for id in &outcome.eliminated {
            if let Some(entity) = self.players.get_mut(id) {
                entity.remove_from_world(None);
            }
        }

        events.push(SessionEvent::PhaseEnded {
            phase: outcome.phase,
            qualified: outcome.qualified,
            eliminated: outcome.eliminated,
        });

        match outcome.game_over {
            Some(winner) => {
                events.push(SessionEvent::GameEnded { winner });
                self.state = SessionState::GameOver {
                    remaining: self.settings.restart_delay,
                };
            }
            None => {
                self.state = SessionState::Intermission {
                    remaining: self.settings.intermission,
                };
            }
        }
    }

    /// Back to the first level with everyone, spectators included, as players.
    fn enter_lobby(&mut self) {
        if let Some(first_phase) = self.config.phases.first() {
            match self.catalog.level(&first_phase.level) {
                Ok(level) => self.level = level,
                Err(e) => warn!("Lobby keeps the previous level: {}", e),
            }
        }
        self.clear_projectiles();

        for id in std::mem::take(&mut self.spectators) {
            self.spawn_entity(id);
        }
        let level = Arc::clone(&self.level);
        for (slot, entity) in self.players.values_mut().enumerate() {
            entity.spawn_slot = slot;
            entity.place(level.spawn_point(slot));
        }

        self.state = SessionState::Lobby { countdown: None };
        info!("Back in the lobby with {} players", self.players.len());
    }

    fn clear_projectiles(&mut self) {
        for projectile in self.projectiles.drain(..) {
            self.replicator.record_despawn(ProjectileDespawn {
                id: projectile.id,
                position: projectile.position,
                cause: DespawnCause::Expired,
                effect_prefab: None,
            });
        }
    }
}

impl ImpactTargets for GameSession {
    fn targets(&self) -> Vec<TargetInfo> {
        self.players
            .iter()
            .filter(|(_, entity)| entity.in_world)
            .map(|(id, entity)| TargetInfo {
                id: *id,
                position: entity.movement.position() + Vec3::Y * CAST_HEIGHT,
                radius: entity.movement.body_radius(),
            })
            .collect()
    }

    fn touches_solid(&self, center: Vec3, radius: f32) -> bool {
        self.level.touches_solid(center, radius)
    }

    fn damageable(&mut self, id: PlayerId) -> Option<&mut dyn Damageable> {
        self.players
            .get_mut(&id)
            .filter(|entity| entity.in_world)
            .and_then(|entity| entity.health.as_mut())
            .map(|health| health as &mut dyn Damageable)
    }

    fn apply_status(&mut self, id: PlayerId, effect: EffectId) -> bool {
        let definition = match self.catalog.effect(effect) {
            Ok(definition) => definition,
            Err(e) => {
                warn!("Impact on player {} skipped a status: {}", id, e);
                return false;
            }
        };
        match self.players.get_mut(&id).filter(|entity| entity.in_world) {
            Some(entity) => {
                entity.effects.queue_effect(definition);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{builtin_file, EFFECT_BURN, SPELL_FIREBALL, SPELL_MAGIC_MISSILE};

    const DT: f32 = 1.0 / 60.0;

    fn instant_settings(min_players: usize) -> SessionSettings {
        SessionSettings {
            min_players,
            lobby_countdown: 0.0,
            intermission: 0.0,
            restart_delay: 0.5,
        }
    }

    /// Arena where player slot 0 faces player slot 1 six units away.
    fn duel_catalog() -> Arc<MiniGameCatalog> {
        let mut file = builtin_file();
        for level in file.levels.iter_mut().filter(|l| l.name == "arena-ring") {
            level.spawn_points = vec![Vec3::new(0.0, 0.0, -3.0), Vec3::new(0.0, 0.0, 3.0)];
            level.finish_zone = None;
        }
        Arc::new(MiniGameCatalog::from_file(file).unwrap())
    }

    fn session(minigame: &str, min_players: usize) -> GameSession {
        GameSession::new(
            Arc::new(MiniGameCatalog::builtin()),
            minigame,
            instant_settings(min_players),
        )
        .unwrap()
    }

    fn run(session: &mut GameSession, ticks: usize) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        for _ in 0..ticks {
            events.extend(session.tick(DT).events);
        }
        events
    }

    fn forward(sequence: u32) -> InputState {
        InputState {
            sequence,
            move_vector: Vec2::new(0.0, 1.0),
            jump_velocity: 0.0,
        }
    }

    #[test]
    fn test_unknown_minigame_is_an_error() {
        let result = GameSession::new(
            Arc::new(MiniGameCatalog::builtin()),
            "nope",
            SessionSettings::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_lobby_waits_for_min_players() {
        let mut s = session("race", 2);
        assert_eq!(s.add_player(1), JoinRole::Player);
        assert!(run(&mut s, 5).is_empty());
        assert!(matches!(s.state(), SessionState::Lobby { countdown: None }));

        s.add_player(2);
        let events = run(&mut s, 1);
        assert_eq!(s.state(), SessionState::Playing);
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::PhaseStarted { phase: 1, .. }]
        ));
    }

    #[test]
    fn test_late_joiner_is_spectator() {
        let mut s = session("race", 1);
        s.add_player(1);
        run(&mut s, 1);
        assert_eq!(s.add_player(2), JoinRole::Spectator);
        assert!(s.is_spectator(2));
        assert!(s.entity(2).is_none());
        assert!(!s.submit_input(2, forward(1)));
    }

    #[test]
    fn test_stale_input_dropped() {
        let mut s = session("race", 2);
        s.add_player(1);
        assert!(s.submit_input(1, forward(5)));
        assert!(!s.submit_input(1, forward(4)));
        assert!(s.submit_input(1, forward(5)));
    }

    #[test]
    fn test_input_moves_player_forward() {
        let mut s = session("race", 1);
        s.add_player(1);
        run(&mut s, 1);
        let start = s.entity(1).unwrap().position;
        s.submit_input(1, forward(1));
        run(&mut s, 60);
        let end = s.entity(1).unwrap().position;
        assert!(end.z > start.z + 3.0);
        assert!(s.entity(1).unwrap().animation_speed > 0.0);
    }

    #[test]
    fn test_solo_race_finishes_game() {
        let mut s = session("race", 1);
        s.add_player(1);
        run(&mut s, 1);
        s.submit_input(1, forward(1));

        let events = run(&mut s, 60 * 15);
        assert!(events.contains(&SessionEvent::GameEnded { winner: Some(1) }));
        assert!(matches!(
            s.state(),
            SessionState::GameOver { .. } | SessionState::Lobby { .. }
        ));
    }

    #[test]
    fn test_spectator_promoted_after_game_over() {
        let mut s = session("race", 1);
        s.add_player(1);
        run(&mut s, 1);
        s.add_player(2);
        s.submit_input(1, forward(1));

        let mut saw_lobby = false;
        for _ in 0..60 * 20 {
            s.tick(DT);
            if matches!(s.state(), SessionState::Lobby { .. }) {
                saw_lobby = true;
                break;
            }
        }
        assert!(saw_lobby);
        assert!(!s.is_spectator(2));
        assert!(s.entity(2).is_some());
    }

    #[test]
    fn test_cast_rejected_outside_phase() {
        let mut s = session("race", 2);
        s.add_player(1);
        assert!(s.submit_cast(1, SPELL_MAGIC_MISSILE, 0));
        run(&mut s, 1);
        assert_eq!(s.projectile_count(), 0);
    }

    #[test]
    fn test_fireball_damages_and_burns_opponent() {
        let mut s = GameSession::new(duel_catalog(), "last-standing", instant_settings(2)).unwrap();
        s.add_player(1);
        s.add_player(2);
        run(&mut s, 1);
        assert_eq!(s.state(), SessionState::Playing);

        s.submit_cast(1, SPELL_FIREBALL, 0);
        let first = s.tick(DT);
        assert_eq!(first.delta.spawned.len(), 1);
        assert_eq!(s.projectile_count(), 1);

        let mut despawned = Vec::new();
        for _ in 0..30 {
            despawned.extend(s.tick(DT).delta.despawned);
        }
        assert_eq!(despawned.len(), 1);
        assert_eq!(despawned[0].cause, DespawnCause::Impact);
        assert!(despawned[0].effect_prefab.is_some());

        let victim = s.entity(2).unwrap();
        let health = victim.health.unwrap();
        assert!(health < 100.0 && health > 0.0);
        assert_eq!(s.effect_stacks(2, EFFECT_BURN), 1);
        assert_eq!(s.entity(1).unwrap().health, Some(100.0));
    }

    #[test]
    fn test_killed_player_eliminated_in_sudden_death() {
        let mut s = GameSession::new(duel_catalog(), "last-standing", instant_settings(2)).unwrap();
        s.add_player(1);
        s.add_player(2);
        run(&mut s, 1);

        let mut events = Vec::new();
        for _ in 0..6 {
            s.submit_cast(1, SPELL_FIREBALL, 0);
            events.extend(run(&mut s, 40));
        }

        assert!(events.contains(&SessionEvent::PhaseEnded {
            phase: 1,
            qualified: vec![1],
            eliminated: vec![2],
        }));
        assert!(events.contains(&SessionEvent::GameEnded { winner: Some(1) }));
    }

    #[test]
    fn test_disconnect_forgets_entity() {
        let mut s = session("race", 3);
        s.add_player(1);
        s.add_player(2);
        run(&mut s, 1);
        s.remove_player(2);
        let output = s.tick(DT);
        assert_eq!(output.delta.removed_entities, vec![2]);
        assert_eq!(s.player_count(), 1);
    }

    #[test]
    fn test_snapshot_lists_every_player() {
        let mut s = session("race", 3);
        s.add_player(1);
        s.add_player(2);
        run(&mut s, 1);
        let snapshot = s.snapshot();
        assert_eq!(snapshot.entities.len(), 2);
        assert_eq!(snapshot.tick, 1);
    }
}

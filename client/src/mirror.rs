//! Observer-side mirror of the replicated world
//!
//! The mirror never decides anything. It stores what the server last said
//! about each character, extrapolates projectiles along their straight-line
//! flight between updates, and keeps the phase bookkeeping announced by the
//! server so a front end can present it.

use log::{debug, info};
use shared::{
    EntityDelta, EntityId, EntitySnapshot, PlayerId, ProjectileSpawn, Vec3, WorldDelta,
    WorldSnapshot,
};
use std::collections::BTreeMap;

/// A projectile as seen by an observer
#[derive(Debug, Clone, PartialEq)]
pub struct MirroredProjectile {
    pub spawn: ProjectileSpawn,
    /// Seconds since the spawn record was applied
    pub age: f32,
}

impl MirroredProjectile {
    /// Extrapolated position along the spawn direction
    pub fn position(&self) -> Vec3 {
        self.spawn.position + self.spawn.direction * (self.spawn.speed * self.age)
    }
}

/// Explosion to play where a projectile died
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEffect {
    pub prefab: String,
    pub position: Vec3,
}

/// Where the mirror thinks the game currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorPhase {
    Waiting,
    InPhase {
        phase: u32,
        qualifying_players: u32,
        participants: Vec<PlayerId>,
    },
    BetweenPhases {
        phase: u32,
        qualified: Vec<PlayerId>,
        eliminated: Vec<PlayerId>,
    },
    Finished {
        winner: Option<PlayerId>,
    },
}

pub struct ObserverMirror {
    entities: BTreeMap<PlayerId, EntitySnapshot>,
    projectiles: BTreeMap<EntityId, MirroredProjectile>,
    pending_effects: Vec<PendingEffect>,
    last_tick: Option<u32>,
    phase: MirrorPhase,
}

impl ObserverMirror {
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            pending_effects: Vec::new(),
            last_tick: None,
            phase: MirrorPhase::Waiting,
        }
    }

    /// Replaces the whole mirrored world
    ///
    /// Snapshots older than what has already been applied are ignored.
    /// A snapshot for the same tick as the last delta still wins, since it
    /// is the complete picture.
    pub fn apply_snapshot(&mut self, snapshot: WorldSnapshot) -> bool {
        if let Some(last) = self.last_tick {
            if snapshot.tick < last {
                debug!("Ignoring stale snapshot for tick {}", snapshot.tick);
                return false;
            }
        }

        self.entities = snapshot
            .entities
            .into_iter()
            .map(|entity| (entity.id, entity))
            .collect();
        self.projectiles = snapshot
            .projectiles
            .into_iter()
            .map(|spawn| (spawn.id, MirroredProjectile { spawn, age: 0.0 }))
            .collect();
        self.last_tick = Some(snapshot.tick);
        true
    }

    /// Applies the changed fields of a delta
    ///
    /// Deltas for a tick that is not newer than the last applied one are
    /// dropped; the next periodic snapshot heals anything missed.
    pub fn apply_delta(&mut self, delta: WorldDelta) -> bool {
        if let Some(last) = self.last_tick {
            if delta.tick <= last {
                debug!("Ignoring stale delta for tick {}", delta.tick);
                return false;
            }
        }

        for change in delta.entities {
            self.apply_entity_delta(change);
        }
        for id in delta.removed_entities {
            self.entities.remove(&id);
        }
        for spawn in delta.spawned {
            self.projectiles
                .insert(spawn.id, MirroredProjectile { spawn, age: 0.0 });
        }
        for despawn in delta.despawned {
            self.projectiles.remove(&despawn.id);
            if let Some(prefab) = despawn.effect_prefab {
                self.pending_effects.push(PendingEffect {
                    prefab,
                    position: despawn.position,
                });
            }
        }

        self.last_tick = Some(delta.tick);
        true
    }

    fn apply_entity_delta(&mut self, change: EntityDelta) {
        let entity = self
            .entities
            .entry(change.id)
            .or_insert_with(|| EntitySnapshot {
                id: change.id,
                position: Vec3::ZERO,
                yaw: 0.0,
                animation_speed: 0.0,
                movement_speed: 0.0,
                health: None,
                alive: true,
            });

        if let Some(position) = change.position {
            entity.position = position;
        }
        if let Some(yaw) = change.yaw {
            entity.yaw = yaw;
        }
        if let Some(animation_speed) = change.animation_speed {
            entity.animation_speed = animation_speed;
        }
        if let Some(movement_speed) = change.movement_speed {
            entity.movement_speed = movement_speed;
        }
        if change.health.is_some() {
            entity.health = change.health;
        }
        if let Some(alive) = change.alive {
            entity.alive = alive;
        }
    }

    /// Ages mirrored projectiles so their extrapolated position advances
    pub fn advance(&mut self, dt: f32) {
        for projectile in self.projectiles.values_mut() {
            projectile.age += dt;
        }
    }

    pub fn on_phase_started(
        &mut self,
        phase: u32,
        qualifying_players: u32,
        participants: Vec<PlayerId>,
    ) {
        info!(
            "Phase {} started with {} participants, {} qualify",
            phase,
            participants.len(),
            qualifying_players
        );
        self.phase = MirrorPhase::InPhase {
            phase,
            qualifying_players,
            participants,
        };
    }

    pub fn on_phase_ended(
        &mut self,
        phase: u32,
        qualified: Vec<PlayerId>,
        eliminated: Vec<PlayerId>,
    ) {
        info!(
            "Phase {} ended: qualified {:?}, eliminated {:?}",
            phase, qualified, eliminated
        );
        self.phase = MirrorPhase::BetweenPhases {
            phase,
            qualified,
            eliminated,
        };
    }

    pub fn on_game_ended(&mut self, winner: Option<PlayerId>) {
        match winner {
            Some(id) => info!("Game over, player {} wins", id),
            None => info!("Game over without a winner"),
        }
        self.phase = MirrorPhase::Finished { winner };
    }

    pub fn entity(&self, id: PlayerId) -> Option<&EntitySnapshot> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.entities.values()
    }

    pub fn projectiles(&self) -> impl Iterator<Item = &MirroredProjectile> {
        self.projectiles.values()
    }

    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }

    /// Hands over explosion effects queued since the last call
    pub fn take_effects(&mut self) -> Vec<PendingEffect> {
        std::mem::take(&mut self.pending_effects)
    }

    pub fn last_tick(&self) -> Option<u32> {
        self.last_tick
    }

    pub fn phase(&self) -> &MirrorPhase {
        &self.phase
    }
}

impl Default for ObserverMirror {
    fn default() -> Self {
        Self::new()
    }
}

//! Wire protocol between participants and the authority.
//!
//! Client packets carry intent only (input, cast requests). Server packets
//! carry replicated projections; observers never receive anything that
//! would let them mutate authority state.

use serde::{Deserialize, Serialize};

use crate::math::{Vec2, Vec3};
use crate::{EntityId, PlayerId, SpellId};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    // Client -> server
    Connect {
        client_version: u32,
    },
    Input(InputState),
    CastSpell {
        spell_id: SpellId,
        slot: u8,
    },
    Disconnect,

    // Server -> client
    Connected {
        client_id: PlayerId,
        spectator: bool,
        /// Spell loadout of the hosted minigame, indexed by slot.
        spell_slots: Vec<SpellId>,
    },
    Snapshot(WorldSnapshot),
    Delta(WorldDelta),
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
    Disconnected {
        reason: String,
    },
}

impl Packet {
    /// True for packet kinds only the authority may send.
    pub fn is_authority_only(&self) -> bool {
        matches!(
            self,
            Packet::Connected { .. }
                | Packet::Snapshot(_)
                | Packet::Delta(_)
                | Packet::PhaseStarted { .. }
                | Packet::PhaseEnded { .. }
                | Packet::GameEnded { .. }
                | Packet::Disconnected { .. }
        )
    }
}

/// Movement intent relayed from the owning participant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InputState {
    pub sequence: u32,
    pub move_vector: Vec2,
    /// Requested jump velocity; zero means no jump this tick.
    pub jump_velocity: f32,
}

/// Full replicated view of one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: PlayerId,
    pub position: Vec3,
    pub yaw: f32,
    pub animation_speed: f32,
    pub movement_speed: f32,
    pub health: Option<f32>,
    pub alive: bool,
}

/// Changed fields of one character since the last delta.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityDelta {
    pub id: PlayerId,
    pub position: Option<Vec3>,
    pub yaw: Option<f32>,
    pub animation_speed: Option<f32>,
    pub movement_speed: Option<f32>,
    pub health: Option<f32>,
    pub alive: Option<bool>,
}

impl EntityDelta {
    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.yaw.is_none()
            && self.animation_speed.is_none()
            && self.movement_speed.is_none()
            && self.health.is_none()
            && self.alive.is_none()
    }
}

/// A projectile came into existence on the authority.
///
/// Observers extrapolate the straight-line flight from this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSpawn {
    pub id: EntityId,
    pub spell_id: SpellId,
    pub caster: PlayerId,
    pub position: Vec3,
    pub direction: Vec3,
    pub speed: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DespawnCause {
    Impact,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileDespawn {
    pub id: EntityId,
    pub position: Vec3,
    pub cause: DespawnCause,
    /// Explosion effect to play at `position`, if the spell had an area payload.
    pub effect_prefab: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u32,
    pub phase: u32,
    pub entities: Vec<EntitySnapshot>,
    pub projectiles: Vec<ProjectileSpawn>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldDelta {
    pub tick: u32,
    pub entities: Vec<EntityDelta>,
    pub removed_entities: Vec<PlayerId>,
    pub spawned: Vec<ProjectileSpawn>,
    pub despawned: Vec<ProjectileDespawn>,
}

impl WorldDelta {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.removed_entities.is_empty()
            && self.spawned.is_empty()
            && self.despawned.is_empty()
    }
}

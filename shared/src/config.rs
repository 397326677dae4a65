//! Immutable content definitions shared between the authority and observers.
//!
//! Everything in here is authored once (built-in tables or a catalog file),
//! validated, and then only ever read. The server wraps loaded values in
//! `Arc` and hands the same instance to every session.

use serde::{Deserialize, Serialize};

use crate::{EffectId, SpellId};

/// Which phase/elimination policy a minigame runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameModeKind {
    /// Top finishers qualify, everyone else connected is eliminated.
    Race,
    /// Sudden death: falling or dying eliminates, last one standing wins.
    LastStanding,
}

/// Upper bound on sensor rays; each ground check allocates one sample per ray.
pub const MAX_GROUND_RAYS: u32 = 64;

fn require_positive(value: f32, what: &str) -> Result<(), String> {
    if value.is_nan() || value <= 0.0 {
        return Err(format!("{} must be positive, got {}", what, value));
    }
    Ok(())
}

fn require_non_negative(value: f32, what: &str) -> Result<(), String> {
    if value.is_nan() || value < 0.0 {
        return Err(format!("{} must not be negative, got {}", what, value));
    }
    Ok(())
}

/// One phase of a minigame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// How many players may advance past this phase. Always at least 1.
    pub qualifying_players: u32,
    /// Seconds before a fallen player re-enters the phase.
    pub respawn_delay: f32,
    /// Name of the level layout the phase is played on.
    pub level: String,
}

impl PhaseConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.qualifying_players < 1 {
            return Err(format!(
                "phase on level '{}' must qualify at least one player",
                self.level
            ));
        }
        if self.respawn_delay.is_nan() || self.respawn_delay < 0.0 {
            return Err(format!(
                "phase on level '{}' has negative respawn delay",
                self.level
            ));
        }
        Ok(())
    }
}

/// Ground sensor parameters handed to the ground query collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundSensorConfig {
    /// Radius of the ray circle beneath the entity.
    pub radius: f32,
    /// How far below the feet a ray may travel and still count as contact.
    pub distance: f32,
    /// Rays on the circle, not counting the center ray.
    pub ray_count: u32,
    /// Widest surface discontinuity that still counts as grounded.
    pub max_gap_width: f32,
    pub layer_mask: u32,
}

impl GroundSensorConfig {
    pub fn validate(&self) -> Result<(), String> {
        require_non_negative(self.radius, "ground sensor radius")?;
        require_positive(self.distance, "ground sensor distance")?;
        require_non_negative(self.max_gap_width, "ground sensor max gap width")?;
        if self.ray_count > MAX_GROUND_RAYS {
            return Err(format!(
                "ground sensor ray count {} exceeds {}",
                self.ray_count, MAX_GROUND_RAYS
            ));
        }
        Ok(())
    }
}

impl Default for GroundSensorConfig {
    fn default() -> Self {
        Self {
            radius: 0.4,
            distance: 0.15,
            ray_count: 8,
            max_gap_width: 0.35,
            layer_mask: 1,
        }
    }
}

/// Tuning for the authority-side character controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementConfig {
    pub base_speed: f32,
    pub acceleration: f32,
    pub deceleration: f32,
    pub max_speed: f32,
    /// Multiplier on target speed while airborne.
    pub air_control: f32,
    pub ground_drag: f32,
    pub air_drag: f32,
    /// Slerp rate (per second) of facing toward the movement direction.
    pub rotation_speed: f32,
    pub rotate_toward_movement: bool,
    pub gravity: f32,
    pub mass: f32,
    /// Collision radius of the character body.
    pub body_radius: f32,
    pub ground_sensor: GroundSensorConfig,
}

impl MovementConfig {
    pub fn validate(&self) -> Result<(), String> {
        require_positive(self.base_speed, "base speed")?;
        require_positive(self.max_speed, "max speed")?;
        require_positive(self.acceleration, "acceleration")?;
        require_positive(self.deceleration, "deceleration")?;
        require_positive(self.mass, "mass")?;
        require_positive(self.body_radius, "body radius")?;
        require_non_negative(self.ground_drag, "ground drag")?;
        require_non_negative(self.air_drag, "air drag")?;
        require_non_negative(self.rotation_speed, "rotation speed")?;
        require_non_negative(self.gravity, "gravity")?;
        if !(0.0..=1.0).contains(&self.air_control) {
            return Err(format!("air control {} outside [0, 1]", self.air_control));
        }
        self.ground_sensor.validate()
    }
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            base_speed: 6.0,
            acceleration: 40.0,
            deceleration: 30.0,
            max_speed: 9.0,
            air_control: 0.5,
            ground_drag: 0.0,
            air_drag: 0.1,
            rotation_speed: 12.0,
            rotate_toward_movement: true,
            gravity: 20.0,
            mass: 1.0,
            body_radius: 0.5,
            ground_sensor: GroundSensorConfig::default(),
        }
    }
}

/// Definition of a whole minigame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiniGameConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub mode: GameModeKind,
    pub phases: Vec<PhaseConfig>,
    /// Starting health; `None` means players cannot be damaged.
    #[serde(default)]
    pub player_health: Option<f32>,
    #[serde(default)]
    pub movement: MovementConfig,
    /// Spell loadout, indexed by slot.
    #[serde(default)]
    pub spell_slots: Vec<SpellId>,
}

impl MiniGameConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.phases.is_empty() {
            return Err(format!("minigame '{}' has no phases", self.id));
        }
        for phase in &self.phases {
            phase.validate()?;
        }
        if let Some(health) = self.player_health {
            if health.is_nan() || health <= 0.0 {
                return Err(format!("minigame '{}' has non-positive health", self.id));
            }
        }
        self.movement
            .validate()
            .map_err(|e| format!("minigame '{}': {}", self.id, e))
    }

    pub fn total_phases(&self) -> u32 {
        self.phases.len() as u32
    }
}

/// What happens when an effect is applied while an instance is already active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackingPolicy {
    Refresh,
    Stack,
    Ignore,
    Independent,
}

/// Effect-specific data carried by a definition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EffectPayload {
    /// Fractional movement slow per stack, in `[0, 0.9]`.
    Slow { percentage: f32 },
    /// Damage dealt every second per stack.
    DamageOverTime { damage_per_second: f32 },
}

/// Template of a temporary modifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEffectDefinition {
    pub id: EffectId,
    pub name: String,
    pub duration: f32,
    pub stacking: StackingPolicy,
    pub max_stacks: u32,
    pub payload: EffectPayload,
}

impl StatusEffectDefinition {
    pub fn is_movement_affecting(&self) -> bool {
        matches!(self.payload, EffectPayload::Slow { .. })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_stacks < 1 {
            return Err(format!("effect '{}' needs max_stacks >= 1", self.name));
        }
        if self.duration.is_nan() || self.duration <= 0.0 {
            return Err(format!("effect '{}' needs a positive duration", self.name));
        }
        if let EffectPayload::Slow { percentage } = self.payload {
            if !(0.0..=0.9).contains(&percentage) {
                return Err(format!(
                    "effect '{}' slow {} outside [0, 0.9]",
                    self.name, percentage
                ));
            }
        }
        Ok(())
    }
}

/// One piece of a projectile's on-impact behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImpactEffect {
    /// Damage to the struck entity only.
    DirectDamage { amount: f32 },
    /// Radius damage with linear falloff, caster excluded.
    Area {
        radius: f32,
        damage: f32,
        effect_prefab: String,
    },
    /// Status effect on the struck entity.
    ApplyStatus { effect: EffectId },
}

/// A castable projectile spell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellDefinition {
    pub id: SpellId,
    pub name: String,
    pub speed: f32,
    /// Seconds before the projectile despawns on its own.
    #[serde(default)]
    pub lifetime: Option<f32>,
    /// Collision radius of the projectile.
    pub radius: f32,
    pub impacts: Vec<ImpactEffect>,
}

impl SpellDefinition {
    pub fn validate(&self) -> Result<(), String> {
        if self.speed.is_nan() || self.speed <= 0.0 {
            return Err(format!("spell '{}' needs a positive speed", self.name));
        }
        for impact in &self.impacts {
            if let ImpactEffect::Area { radius, .. } = impact {
                if radius.is_nan() || *radius <= 0.0 {
                    return Err(format!("spell '{}' has a zero area radius", self.name));
                }
            }
        }
        Ok(())
    }
}

//! Content catalog: minigames, levels, spells and status effects.
//!
//! Loaded once at startup, either from the built-in tables or a JSON file,
//! validated, then shared read-only (`Arc`) by every session.

use log::{error, info};
use serde::{Deserialize, Serialize};
use shared::{
    EffectId, EffectPayload, GameModeKind, ImpactEffect, MiniGameConfig, MovementConfig,
    PhaseConfig, SpellDefinition, SpellId, StackingPolicy, StatusEffectDefinition, Vec3,
};
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, ServerError};
use crate::level::{Aabb, LevelLayout, Platform};

/// On-disk catalog layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub minigames: Vec<MiniGameConfig>,
    #[serde(default)]
    pub levels: Vec<LevelLayout>,
    #[serde(default)]
    pub spells: Vec<SpellDefinition>,
    #[serde(default)]
    pub effects: Vec<StatusEffectDefinition>,
}

#[derive(Debug, Clone, Default)]
pub struct MiniGameCatalog {
    minigames: HashMap<String, Arc<MiniGameConfig>>,
    levels: HashMap<String, Arc<LevelLayout>>,
    spells: HashMap<SpellId, Arc<SpellDefinition>>,
    effects: HashMap<EffectId, Arc<StatusEffectDefinition>>,
}

impl MiniGameCatalog {
    pub fn from_file(file: CatalogFile) -> Result<Self> {
        let catalog = Self::index(file)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Keys every definition by its id; a repeated id is a config error.
    fn index(file: CatalogFile) -> Result<Self> {
        Ok(Self {
            minigames: unique_by_key(file.minigames, "minigame", |m| m.id.clone())?,
            levels: unique_by_key(file.levels, "level", |l| l.name.clone())?,
            spells: unique_by_key(file.spells, "spell", |s| s.id)?,
            effects: unique_by_key(file.effects, "effect", |e| e.id)?,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::from_file(file)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&json)?;
        info!(
            "Loaded catalog from {}: {} minigames, {} levels, {} spells, {} effects",
            path.display(),
            catalog.minigames.len(),
            catalog.levels.len(),
            catalog.spells.len(),
            catalog.effects.len()
        );
        Ok(catalog)
    }

    pub fn minigame(&self, id: &str) -> Result<Arc<MiniGameConfig>> {
        self.minigames
            .get(id)
            .cloned()
            .ok_or_else(|| ServerError::UnknownMiniGame(id.to_string()))
    }

    pub fn level(&self, name: &str) -> Result<Arc<LevelLayout>> {
        self.levels
            .get(name)
            .cloned()
            .ok_or_else(|| ServerError::UnknownLevel(name.to_string()))
    }

    pub fn spell(&self, id: SpellId) -> Result<Arc<SpellDefinition>> {
        self.spells
            .get(&id)
            .cloned()
            .ok_or(ServerError::UnknownSpell(id))
    }

    pub fn effect(&self, id: EffectId) -> Result<Arc<StatusEffectDefinition>> {
        self.effects
            .get(&id)
            .cloned()
            .ok_or(ServerError::UnknownEffect(id))
    }

    pub fn minigame_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.minigames.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Checks definitions and every cross reference between them.
    fn validate(&self) -> Result<()> {
        for effect in self.effects.values() {
            effect.validate().map_err(ServerError::InvalidConfig)?;
        }
        for spell in self.spells.values() {
            spell.validate().map_err(ServerError::InvalidConfig)?;
            for impact in &spell.impacts {
                if let ImpactEffect::ApplyStatus { effect } = impact {
                    self.effect(*effect)?;
                }
            }
        }
        for minigame in self.minigames.values() {
            minigame.validate().map_err(ServerError::InvalidConfig)?;
            for phase in &minigame.phases {
                self.level(&phase.level)?;
            }
            for spell in &minigame.spell_slots {
                self.spell(*spell)?;
            }
        }
        Ok(())
    }

    /// Built-in content; see `test_builtin_catalog_is_valid`.
    pub fn builtin() -> Self {
        Self::index(builtin_file()).unwrap_or_else(|e| {
            error!("Built-in catalog is inconsistent: {}", e);
            Self::default()
        })
    }
}

fn unique_by_key<K, T, F>(items: Vec<T>, kind: &str, key: F) -> Result<HashMap<K, Arc<T>>>
where
    K: Eq + Hash + Display,
    F: Fn(&T) -> K,
{
    let mut indexed = HashMap::with_capacity(items.len());
    for item in items {
        let id = key(&item);
        if indexed.contains_key(&id) {
            return Err(ServerError::InvalidConfig(format!(
                "duplicate {} id '{}'",
                kind, id
            )));
        }
        indexed.insert(id, Arc::new(item));
    }
    Ok(indexed)
}

pub fn builtin_file() -> CatalogFile {
    CatalogFile {
        minigames: builtin_minigames(),
        levels: builtin_levels(),
        spells: builtin_spells(),
        effects: builtin_effects(),
    }
}

pub const EFFECT_SLOW: EffectId = 1;
pub const EFFECT_FROSTBITE: EffectId = 2;
pub const EFFECT_BURN: EffectId = 3;
pub const EFFECT_CHILL: EffectId = 4;

pub const SPELL_FIREBALL: SpellId = 1;
pub const SPELL_FROST_BOLT: SpellId = 2;
pub const SPELL_MAGIC_MISSILE: SpellId = 3;

fn builtin_effects() -> Vec<StatusEffectDefinition> {
    vec![
        StatusEffectDefinition {
            id: EFFECT_SLOW,
            name: "slow".to_string(),
            duration: 3.0,
            stacking: StackingPolicy::Refresh,
            max_stacks: 1,
            payload: EffectPayload::Slow { percentage: 0.3 },
        },
        StatusEffectDefinition {
            id: EFFECT_FROSTBITE,
            name: "frostbite".to_string(),
            duration: 4.0,
            stacking: StackingPolicy::Stack,
            max_stacks: 3,
            payload: EffectPayload::Slow { percentage: 0.2 },
        },
        StatusEffectDefinition {
            id: EFFECT_BURN,
            name: "burn".to_string(),
            duration: 3.0,
            stacking: StackingPolicy::Stack,
            max_stacks: 3,
            payload: EffectPayload::DamageOverTime {
                damage_per_second: 5.0,
            },
        },
        StatusEffectDefinition {
            id: EFFECT_CHILL,
            name: "chill".to_string(),
            duration: 2.0,
            stacking: StackingPolicy::Independent,
            max_stacks: 1,
            payload: EffectPayload::Slow { percentage: 0.5 },
        },
    ]
}

fn builtin_spells() -> Vec<SpellDefinition> {
    vec![
        SpellDefinition {
            id: SPELL_FIREBALL,
            name: "fireball".to_string(),
            speed: 18.0,
            lifetime: Some(3.0),
            radius: 0.3,
            impacts: vec![
                ImpactEffect::DirectDamage { amount: 20.0 },
                ImpactEffect::Area {
                    radius: 3.0,
                    damage: 30.0,
                    effect_prefab: "fx_fireball_explosion".to_string(),
                },
                ImpactEffect::ApplyStatus {
                    effect: EFFECT_BURN,
                },
            ],
        },
        SpellDefinition {
            id: SPELL_FROST_BOLT,
            name: "frost-bolt".to_string(),
            speed: 22.0,
            lifetime: Some(2.0),
            radius: 0.25,
            impacts: vec![
                ImpactEffect::DirectDamage { amount: 10.0 },
                ImpactEffect::ApplyStatus {
                    effect: EFFECT_FROSTBITE,
                },
            ],
        },
        SpellDefinition {
            id: SPELL_MAGIC_MISSILE,
            name: "magic-missile".to_string(),
            speed: 30.0,
            lifetime: Some(1.5),
            radius: 0.2,
            impacts: vec![
                ImpactEffect::DirectDamage { amount: 8.0 },
                ImpactEffect::ApplyStatus {
                    effect: EFFECT_CHILL,
                },
            ],
        },
    ]
}

fn slab(min: (f32, f32, f32), max: (f32, f32, f32)) -> Platform {
    Platform {
        bounds: Aabb::new(Vec3::new(min.0, min.1, min.2), Vec3::new(max.0, max.1, max.2)),
        layer: 1,
    }
}

fn start_line(count: usize, z: f32) -> Vec<Vec3> {
    (0..count)
        .map(|i| Vec3::new(-7.0 + 2.0 * i as f32, 0.0, z))
        .collect()
}

fn builtin_levels() -> Vec<LevelLayout> {
    let ring: Vec<Vec3> = (0..8)
        .map(|i| {
            let angle = std::f32::consts::TAU * i as f32 / 8.0;
            Vec3::new(8.0 * angle.cos(), 0.0, 8.0 * angle.sin())
        })
        .collect();

    vec![
        LevelLayout {
            name: "meadow-run".to_string(),
            platforms: vec![slab((-10.0, -1.0, -5.0), (10.0, 0.0, 60.0))],
            spawn_points: start_line(8, 0.0),
            finish_zone: Some(Aabb::new(
                Vec3::new(-10.0, 0.0, 55.0),
                Vec3::new(10.0, 3.0, 60.0),
            )),
            kill_plane: -10.0,
        },
        LevelLayout {
            name: "gap-bridge".to_string(),
            platforms: vec![
                slab((-10.0, -1.0, -5.0), (10.0, 0.0, 20.0)),
                // A seam narrow enough to run across.
                slab((-10.0, -1.0, 20.3), (10.0, 0.0, 38.0)),
                // A gap that needs a jump.
                slab((-10.0, -1.0, 40.0), (10.0, 0.0, 60.0)),
            ],
            spawn_points: start_line(8, 0.0),
            finish_zone: Some(Aabb::new(
                Vec3::new(-10.0, 0.0, 55.0),
                Vec3::new(10.0, 3.0, 60.0),
            )),
            kill_plane: -10.0,
        },
        LevelLayout {
            name: "arena-ring".to_string(),
            platforms: vec![slab((-12.0, -1.0, -12.0), (12.0, 0.0, 12.0))],
            spawn_points: ring,
            // The crown: jump into it at the center to win the phase outright.
            finish_zone: Some(Aabb::new(
                Vec3::new(-1.0, 1.2, -1.0),
                Vec3::new(1.0, 3.0, 1.0),
            )),
            kill_plane: -10.0,
        },
    ]
}

fn builtin_minigames() -> Vec<MiniGameConfig> {
    vec![
        MiniGameConfig {
            id: "race".to_string(),
            name: "Meadow Dash".to_string(),
            description: "Reach the finish line before the spots run out.".to_string(),
            mode: GameModeKind::Race,
            phases: vec![
                PhaseConfig {
                    qualifying_players: 8,
                    respawn_delay: 2.0,
                    level: "meadow-run".to_string(),
                },
                PhaseConfig {
                    qualifying_players: 4,
                    respawn_delay: 2.0,
                    level: "gap-bridge".to_string(),
                },
                PhaseConfig {
                    qualifying_players: 1,
                    respawn_delay: 1.0,
                    level: "meadow-run".to_string(),
                },
            ],
            player_health: None,
            movement: MovementConfig::default(),
            spell_slots: vec![SPELL_MAGIC_MISSILE],
        },
        MiniGameConfig {
            id: "last-standing".to_string(),
            name: "Ring of Fire".to_string(),
            description: "Knock everyone else out of the arena.".to_string(),
            mode: GameModeKind::LastStanding,
            phases: vec![
                PhaseConfig {
                    qualifying_players: 4,
                    respawn_delay: 0.0,
                    level: "arena-ring".to_string(),
                },
                PhaseConfig {
                    qualifying_players: 1,
                    respawn_delay: 0.0,
                    level: "arena-ring".to_string(),
                },
            ],
            player_health: Some(100.0),
            movement: MovementConfig::default(),
            spell_slots: vec![SPELL_FIREBALL, SPELL_FROST_BOLT],
        },
    ]
}

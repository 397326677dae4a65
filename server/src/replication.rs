//! Authority-to-observer replication.
//!
//! The channel is last-value-wins: each delta carries only the fields that
//! changed since the previous delta, projectile spawn/despawn records
//! accumulated since then, and the ids of entities that went away. A full
//! snapshot is sent to joiners and periodically to everyone so a lost
//! delta never leaves an observer permanently wrong.

use shared::{
    EntityDelta, EntitySnapshot, PlayerId, ProjectileDespawn, ProjectileSpawn, WorldDelta,
    WorldSnapshot,
};
use std::collections::BTreeMap;

/// Float changes smaller than this are not worth a packet.
const FIELD_EPSILON: f32 = 1e-4;

#[derive(Debug, Default)]
pub struct Replicator {
    /// Last values sent per entity; `None` until the first delta after tracking.
    baselines: BTreeMap<PlayerId, Option<EntitySnapshot>>,
    removed: Vec<PlayerId>,
    spawned: Vec<ProjectileSpawn>,
    despawned: Vec<ProjectileDespawn>,
}

impl Replicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts replicating an entity; its next delta carries every field.
    pub fn track_entity(&mut self, id: PlayerId) {
        self.baselines.insert(id, None);
        self.removed.retain(|removed| *removed != id);
    }

    pub fn forget_entity(&mut self, id: PlayerId) {
        if self.baselines.remove(&id).is_some() {
            self.removed.push(id);
        }
    }

    pub fn record_spawn(&mut self, spawn: ProjectileSpawn) {
        self.spawned.push(spawn);
    }

    pub fn record_despawn(&mut self, despawn: ProjectileDespawn) {
        self.despawned.push(despawn);
    }

    /// Diffs `entities` against the baselines and drains pending records.
    pub fn build_delta(&mut self, tick: u32, entities: &[EntitySnapshot]) -> WorldDelta {
        let mut changes = Vec::new();

        for current in entities {
            let Some(baseline) = self.baselines.get_mut(&current.id) else {
                continue;
            };
            let delta = diff(baseline.as_ref(), current);
            if !delta.is_empty() {
                changes.push(delta);
            }
            *baseline = Some(current.clone());
        }

        WorldDelta {
            tick,
            entities: changes,
            removed_entities: std::mem::take(&mut self.removed),
            spawned: std::mem::take(&mut self.spawned),
            despawned: std::mem::take(&mut self.despawned),
        }
    }

    /// Complete state for a joiner or a periodic resync.
    pub fn full_snapshot(
        &self,
        tick: u32,
        phase: u32,
        entities: &[EntitySnapshot],
        projectiles: Vec<ProjectileSpawn>,
    ) -> WorldSnapshot {
        WorldSnapshot {
            tick,
            phase,
            entities: entities
                .iter()
                .filter(|entity| self.baselines.contains_key(&entity.id))
                .cloned()
                .collect(),
            projectiles,
        }
    }
}

fn float_changed(old: f32, new: f32) -> bool {
    (old - new).abs() > FIELD_EPSILON
}

fn diff(baseline: Option<&EntitySnapshot>, current: &EntitySnapshot) -> EntityDelta {
    let Some(old) = baseline else {
        return EntityDelta {
            id: current.id,
            position: Some(current.position),
            yaw: Some(current.yaw),
            animation_speed: Some(current.animation_speed),
            movement_speed: Some(current.movement_speed),
            health: current.health,
            alive: Some(current.alive),
        };
    };

    let health_changed = match (old.health, current.health) {
        (Some(a), Some(b)) => float_changed(a, b),
        (None, None) => false,
        _ => true,
    };

    EntityDelta {
        id: current.id,
        position: (old.position.distance(current.position) > FIELD_EPSILON)
            .then_some(current.position),
        yaw: float_changed(old.yaw, current.yaw).then_some(current.yaw),
        animation_speed: float_changed(old.animation_speed, current.animation_speed)
            .then_some(current.animation_speed),
        movement_speed: float_changed(old.movement_speed, current.movement_speed)
            .then_some(current.movement_speed),
        health: if health_changed { current.health } else { None },
        alive: (old.alive != current.alive).then_some(current.alive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{DespawnCause, Vec3};

    fn entity(id: PlayerId, x: f32) -> EntitySnapshot {
        EntitySnapshot {
            id,
            position: Vec3::new(x, 0.0, 0.0),
            yaw: 0.0,
            animation_speed: 0.0,
            movement_speed: 6.0,
            health: Some(100.0),
            alive: true,
        }
    }

    #[test]
    fn test_first_delta_carries_everything() {
        let mut replicator = Replicator::new();
        replicator.track_entity(1);
        let delta = replicator.build_delta(1, &[entity(1, 0.0)]);
        assert_eq!(delta.entities.len(), 1);
        assert_eq!(delta.entities[0].movement_speed, Some(6.0));
        assert_eq!(delta.entities[0].health, Some(100.0));
    }

    #[test]
    fn test_unchanged_entity_sends_nothing() {
        let mut replicator = Replicator::new();
        replicator.track_entity(1);
        replicator.build_delta(1, &[entity(1, 0.0)]);
        let delta = replicator.build_delta(2, &[entity(1, 0.0)]);
        assert!(delta.is_empty());
    }

    #[test]
    fn test_only_changed_fields_sent() {
        let mut replicator = Replicator::new();
        replicator.track_entity(1);
        replicator.build_delta(1, &[entity(1, 0.0)]);

        let mut moved = entity(1, 2.0);
        moved.movement_speed = 3.0;
        let delta = replicator.build_delta(2, &[moved]);

        let change = &delta.entities[0];
        assert_eq!(change.position, Some(Vec3::new(2.0, 0.0, 0.0)));
        assert_eq!(change.movement_speed, Some(3.0));
        assert_eq!(change.yaw, None);
        assert_eq!(change.health, None);
        assert_eq!(change.alive, None);
    }

    #[test]
    fn test_untracked_entities_ignored() {
        let mut replicator = Replicator::new();
        let delta = replicator.build_delta(1, &[entity(5, 0.0)]);
        assert!(delta.entities.is_empty());
    }

    #[test]
    fn test_forget_reports_removal_once() {
        let mut replicator = Replicator::new();
        replicator.track_entity(1);
        replicator.forget_entity(1);
        replicator.forget_entity(1);
        assert_eq!(replicator.build_delta(1, &[]).removed_entities, vec![1]);
        assert!(replicator.build_delta(2, &[]).removed_entities.is_empty());
    }

    #[test]
    fn test_projectile_records_drained() {
        let mut replicator = Replicator::new();
        replicator.record_spawn(ProjectileSpawn {
            id: 9,
            spell_id: 1,
            caster: 1,
            position: Vec3::ZERO,
            direction: Vec3::new(0.0, 0.0, 1.0),
            speed: 10.0,
        });
        replicator.record_despawn(ProjectileDespawn {
            id: 9,
            position: Vec3::ZERO,
            cause: DespawnCause::Expired,
            effect_prefab: None,
        });

        let delta = replicator.build_delta(1, &[]);
        assert_eq!(delta.spawned.len(), 1);
        assert_eq!(delta.despawned.len(), 1);
        assert!(replicator.build_delta(2, &[]).is_empty());
    }

    #[test]
    fn test_snapshot_contains_tracked_entities() {
        let mut replicator = Replicator::new();
        replicator.track_entity(1);
        let snapshot = replicator.full_snapshot(10, 2, &[entity(1, 0.0), entity(2, 1.0)], vec![]);
        assert_eq!(snapshot.tick, 10);
        assert_eq!(snapshot.phase, 2);
        assert_eq!(snapshot.entities.len(), 1);
        assert_eq!(snapshot.entities[0].id, 1);
    }
}

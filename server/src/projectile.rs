//! Server-owned projectiles and impact resolution.
//!
//! There is a single projectile type. What happens on impact is decided by
//! the spell's list of [`ImpactEffect`]s (direct damage, area damage, status
//! effect), so new spells are new data rather than new types.

use log::debug;
use shared::{EffectId, EntityId, ImpactEffect, PlayerId, ProjectileSpawn, SpellDefinition, Vec3};
use std::sync::Arc;

/// Capability to receive damage and healing.
pub trait Damageable {
    fn take_damage(&mut self, amount: f32);
    fn heal(&mut self, amount: f32);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn is_depleted(&self) -> bool {
        self.current <= 0.0
    }
}

impl Damageable for Health {
    fn take_damage(&mut self, amount: f32) {
        self.current = (self.current - amount.max(0.0)).max(0.0);
    }

    fn heal(&mut self, amount: f32) {
        self.current = (self.current + amount.max(0.0)).min(self.max);
    }
}

/// Something a projectile can collide with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetInfo {
    pub id: PlayerId,
    pub position: Vec3,
    pub radius: f32,
}

/// The world as seen by impact resolution.
///
/// Entities lacking a capability return `None`/`false` and are skipped.
pub trait ImpactTargets {
    fn targets(&self) -> Vec<TargetInfo>;
    fn touches_solid(&self, center: Vec3, radius: f32) -> bool;
    fn damageable(&mut self, id: PlayerId) -> Option<&mut dyn Damageable>;
    /// Queues a status effect on `id`; false if it cannot carry effects.
    fn apply_status(&mut self, id: PlayerId, effect: EffectId) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Contact {
    Entity { id: PlayerId, point: Vec3 },
    Solid { point: Vec3 },
}

impl Contact {
    pub fn point(&self) -> Vec3 {
        match self {
            Contact::Entity { point, .. } | Contact::Solid { point } => *point,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImpactReport {
    pub direct_hit: Option<PlayerId>,
    pub damaged: Vec<(PlayerId, f32)>,
    pub effects_applied: Vec<(PlayerId, EffectId)>,
    pub effect_prefab: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: EntityId,
    pub spell: Arc<SpellDefinition>,
    pub caster: PlayerId,
    pub position: Vec3,
    pub direction: Vec3,
    pub age: f32,
}

impl Projectile {
    pub fn spawn(
        id: EntityId,
        spell: Arc<SpellDefinition>,
        caster: PlayerId,
        origin: Vec3,
        direction: Vec3,
    ) -> Self {
        Self {
            id,
            spell,
            caster,
            position: origin,
            direction: direction.normalize_or_zero(),
            age: 0.0,
        }
    }

    pub fn speed(&self) -> f32 {
        self.spell.speed
    }

    pub fn is_expired(&self) -> bool {
        self.spell
            .lifetime
            .map(|lifetime| self.age >= lifetime)
            .unwrap_or(false)
    }

    /// Moves forward one step and reports the first qualifying contact.
    ///
    /// Characters are swept along the travelled segment so fast projectiles
    /// cannot tunnel through them; the caster is never a contact.
    pub fn advance(&mut self, dt: f32, world: &dyn ImpactTargets) -> Option<Contact> {
        let start = self.position;
        let end = start + self.direction * (self.spell.speed * dt);
        self.position = end;
        self.age += dt;

        let hit = world
            .targets()
            .into_iter()
            .filter(|target| target.id != self.caster)
            .filter_map(|target| {
                let reach = target.radius + self.spell.radius;
                let t = sweep_sphere(start, end, target.position, reach)?;
                Some((t, target.id))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0));

        if let Some((t, id)) = hit {
            let point = start + (end - start) * t;
            self.position = point;
            return Some(Contact::Entity { id, point });
        }

        if world.touches_solid(end, self.spell.radius) {
            return Some(Contact::Solid { point: end });
        }
        None
    }

    pub fn spawn_record(&self) -> ProjectileSpawn {
        ProjectileSpawn {
            id: self.id,
            spell_id: self.spell.id,
            caster: self.caster,
            position: self.position,
            direction: self.direction,
            speed: self.spell.speed,
        }
    }
}

/// Damage at `distance` from an explosion: linear falloff, zero at `radius`.
pub fn area_damage(damage: f32, distance: f32, radius: f32) -> f32 {
    if radius <= 0.0 || distance >= radius {
        return 0.0;
    }
    damage * (1.0 - distance / radius)
}

/// Applies every impact effect of the projectile's spell at a contact.
pub fn resolve_impact(
    projectile: &Projectile,
    contact: Contact,
    world: &mut dyn ImpactTargets,
) -> ImpactReport {
    let mut report = ImpactReport::default();
    let point = contact.point();
    let struck = match contact {
        Contact::Entity { id, .. } => Some(id),
        Contact::Solid { .. } => None,
    };
    report.direct_hit = struck;

    for impact in &projectile.spell.impacts {
        match impact {
            ImpactEffect::DirectDamage { amount } => {
                let Some(id) = struck else { continue };
                match world.damageable(id) {
                    Some(target) => {
                        target.take_damage(*amount);
                        report.damaged.push((id, *amount));
                    }
                    None => debug!("Player {} has no health, direct hit skipped", id),
                }
            }
            ImpactEffect::Area {
                radius,
                damage,
                effect_prefab,
            } => {
                report.effect_prefab = Some(effect_prefab.clone());
                let in_range: Vec<(PlayerId, f32)> = world
                    .targets()
                    .into_iter()
                    .filter(|target| target.id != projectile.caster)
                    .map(|target| (target.id, target.position.distance(point)))
                    .filter(|(_, distance)| *distance <= *radius)
                    .collect();

                for (id, distance) in in_range {
                    let amount = area_damage(*damage, distance, *radius);
                    if let Some(target) = world.damageable(id) {
                        target.take_damage(amount);
                        report.damaged.push((id, amount));
                    }
                }
            }
            ImpactEffect::ApplyStatus { effect } => {
                let Some(id) = struck else { continue };
                if world.apply_status(id, *effect) {
                    report.effects_applied.push((id, *effect));
                }
            }
        }
    }

    report
}

/// Earliest parameter `t` in `[0, 1]` at which the segment comes within
/// `radius` of `center`.
fn sweep_sphere(start: Vec3, end: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let d = end - start;
    let m = start - center;
    let c = m.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let a = d.length_squared();
    if a < 1e-12 {
        return None;
    }
    let b = m.dot(d);
    let discriminant = b * b - a * c;
    if discriminant < 0.0 {
        return None;
    }
    let t = (-b - discriminant.sqrt()) / a;
    if (0.0..=1.0).contains(&t) {
        Some(t)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::collections::HashMap;

    struct TestWorld {
        positions: HashMap<PlayerId, Vec3>,
        health: HashMap<PlayerId, Health>,
        statuses: Vec<(PlayerId, EffectId)>,
        floor_y: f32,
    }

    impl TestWorld {
        fn new() -> Self {
            Self {
                positions: HashMap::new(),
                health: HashMap::new(),
                statuses: Vec::new(),
                floor_y: -100.0,
            }
        }

        fn add(&mut self, id: PlayerId, position: Vec3, health: Option<f32>) {
            self.positions.insert(id, position);
            if let Some(max) = health {
                self.health.insert(id, Health::new(max));
            }
        }

        fn hp(&self, id: PlayerId) -> f32 {
            self.health[&id].current
        }
    }

    impl ImpactTargets for TestWorld {
        fn targets(&self) -> Vec<TargetInfo> {
            let mut targets: Vec<TargetInfo> = self
                .positions
                .iter()
                .map(|(id, position)| TargetInfo {
                    id: *id,
                    position: *position,
                    radius: 0.5,
                })
                .collect();
            targets.sort_by_key(|t| t.id);
            targets
        }

        fn touches_solid(&self, center: Vec3, radius: f32) -> bool {
            center.y - radius <= self.floor_y
        }

        fn damageable(&mut self, id: PlayerId) -> Option<&mut dyn Damageable> {
            self.health.get_mut(&id).map(|h| h as &mut dyn Damageable)
        }

        fn apply_status(&mut self, id: PlayerId, effect: EffectId) -> bool {
            self.statuses.push((id, effect));
            true
        }
    }

    fn spell(impacts: Vec<ImpactEffect>) -> Arc<SpellDefinition> {
        Arc::new(SpellDefinition {
            id: 1,
            name: "test".to_string(),
            speed: 10.0,
            lifetime: Some(1.0),
            radius: 0.1,
            impacts,
        })
    }

    #[test]
    fn test_area_damage_falloff() {
        assert_approx_eq!(area_damage(40.0, 0.0, 4.0), 40.0);
        assert_approx_eq!(area_damage(40.0, 2.0, 4.0), 20.0);
        assert_eq!(area_damage(40.0, 4.0, 4.0), 0.0);
        assert_eq!(area_damage(40.0, 5.0, 4.0), 0.0);
    }

    #[test]
    fn test_moves_in_straight_line() {
        let world = TestWorld::new();
        let mut p = Projectile::spawn(1, spell(vec![]), 9, Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0));
        assert!(p.advance(0.5, &world).is_none());
        assert_approx_eq!(p.position.z, 5.0);
        assert_approx_eq!(p.position.x, 0.0);
    }

    #[test]
    fn test_ignores_caster() {
        let mut world = TestWorld::new();
        world.add(9, Vec3::ZERO, Some(100.0));
        let mut p = Projectile::spawn(1, spell(vec![]), 9, Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        assert!(p.advance(0.01, &world).is_none());
    }

    #[test]
    fn test_sweep_prevents_tunneling() {
        let mut world = TestWorld::new();
        world.add(2, Vec3::new(5.0, 0.0, 0.0), Some(100.0));
        let mut p = Projectile::spawn(1, spell(vec![]), 9, Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        // One step travels 10 units, well past the target.
        match p.advance(1.0, &world) {
            Some(Contact::Entity { id, point }) => {
                assert_eq!(id, 2);
                assert_approx_eq!(point.x, 4.4, 1e-4);
            }
            other => panic!("expected entity contact, got {:?}", other),
        }
    }

    #[test]
    fn test_direct_damage_only_struck_entity() {
        let mut world = TestWorld::new();
        world.add(2, Vec3::new(1.0, 0.0, 0.0), Some(100.0));
        world.add(3, Vec3::new(1.5, 0.0, 0.0), Some(100.0));
        let p = Projectile::spawn(
            1,
            spell(vec![ImpactEffect::DirectDamage { amount: 25.0 }]),
            9,
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
        );
        let contact = Contact::Entity {
            id: 2,
            point: Vec3::new(0.5, 0.0, 0.0),
        };
        let report = resolve_impact(&p, contact, &mut world);
        assert_eq!(report.direct_hit, Some(2));
        assert_approx_eq!(world.hp(2), 75.0);
        assert_approx_eq!(world.hp(3), 100.0);
    }

    #[test]
    fn test_area_excludes_caster_and_falls_off() {
        let mut world = TestWorld::new();
        world.add(9, Vec3::ZERO, Some(100.0));
        world.add(2, Vec3::new(4.0, 0.0, 0.0), Some(100.0));
        world.add(3, Vec3::new(2.0, 0.0, 0.0), Some(100.0));
        world.add(4, Vec3::new(2.0, 0.0, 4.0), Some(100.0));
        let p = Projectile::spawn(
            1,
            spell(vec![ImpactEffect::Area {
                radius: 4.0,
                damage: 40.0,
                effect_prefab: "boom".to_string(),
            }]),
            9,
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
        );
        let report = resolve_impact(&p, Contact::Solid { point: Vec3::ZERO }, &mut world);

        assert_approx_eq!(world.hp(9), 100.0);
        assert_approx_eq!(world.hp(2), 100.0);
        assert_approx_eq!(world.hp(3), 80.0);
        assert_approx_eq!(world.hp(4), 100.0);
        assert_eq!(report.effect_prefab.as_deref(), Some("boom"));
    }

    #[test]
    fn test_area_full_damage_at_center() {
        let mut world = TestWorld::new();
        world.add(2, Vec3::new(3.0, 0.0, 0.0), Some(100.0));
        let p = Projectile::spawn(
            1,
            spell(vec![ImpactEffect::Area {
                radius: 4.0,
                damage: 40.0,
                effect_prefab: "boom".to_string(),
            }]),
            9,
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
        );
        let contact = Contact::Entity {
            id: 2,
            point: Vec3::new(3.0, 0.0, 0.0),
        };
        resolve_impact(&p, contact, &mut world);
        assert_approx_eq!(world.hp(2), 60.0);
    }

    #[test]
    fn test_missing_health_is_skipped() {
        let mut world = TestWorld::new();
        world.add(2, Vec3::new(1.0, 0.0, 0.0), None);
        let p = Projectile::spawn(
            1,
            spell(vec![
                ImpactEffect::DirectDamage { amount: 10.0 },
                ImpactEffect::ApplyStatus { effect: 5 },
            ]),
            9,
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
        );
        let contact = Contact::Entity {
            id: 2,
            point: Vec3::new(1.0, 0.0, 0.0),
        };
        let report = resolve_impact(&p, contact, &mut world);
        assert!(report.damaged.is_empty());
        assert_eq!(report.effects_applied, vec![(2, 5)]);
    }

    #[test]
    fn test_lifetime_expiry() {
        let world = TestWorld::new();
        let mut p = Projectile::spawn(1, spell(vec![]), 9, Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0));
        p.advance(0.6, &world);
        assert!(!p.is_expired());
        p.advance(0.6, &world);
        assert!(p.is_expired());
    }

    #[test]
    fn test_health_heal_clamped() {
        let mut health = Health::new(50.0);
        health.take_damage(30.0);
        health.heal(100.0);
        assert_eq!(health.current, 50.0);
        health.take_damage(80.0);
        assert!(health.is_depleted());
        assert_eq!(health.current, 0.0);
    }
}

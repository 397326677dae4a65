//! Authority-side handling of cast requests.
//!
//! Participants only ever ask to cast. The caster checks the request against
//! the session's view of the world and spawns the projectile itself.

use log::debug;
use shared::math::direction_from_yaw;
use shared::{EntityId, PlayerId, SpellDefinition, SpellId, Vec3};
use std::sync::Arc;
use thiserror::Error;

use crate::catalog::MiniGameCatalog;
use crate::projectile::Projectile;

/// Height above the feet that projectiles leave from and characters are hit at.
pub const CAST_HEIGHT: f32 = 1.0;

/// Gap between the caster's body and a freshly spawned projectile.
const SPAWN_CLEARANCE: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CastRequest {
    pub caster: PlayerId,
    pub spell_id: SpellId,
    pub slot: u8,
}

/// What the session knows about the caster when the request arrives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CasterState {
    pub position: Vec3,
    pub yaw: f32,
    pub body_radius: f32,
    /// Taking part in the current phase and not finished or out.
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CastRejection {
    #[error("caster is not an active participant")]
    NotActive,
    #[error("slot {0} is empty")]
    EmptySlot(u8),
    #[error("slot {slot} holds spell {expected}, not {requested}")]
    SlotMismatch {
        slot: u8,
        expected: SpellId,
        requested: SpellId,
    },
    #[error("spell {0} is not in the catalog")]
    UnknownSpell(SpellId),
}

/// Hands out projectile ids and turns accepted casts into projectiles.
#[derive(Debug)]
pub struct SpellCaster {
    next_projectile_id: EntityId,
}

impl SpellCaster {
    pub fn new() -> Self {
        Self {
            next_projectile_id: 1,
        }
    }

    /// Validates a cast against the loadout and spawns its projectile.
    ///
    /// `caster` is `None` when the requester has no character in the world.
    pub fn handle_cast(
        &mut self,
        request: CastRequest,
        caster: Option<CasterState>,
        loadout: &[SpellId],
        catalog: &MiniGameCatalog,
    ) -> Result<Projectile, CastRejection> {
        let caster_state = caster
            .filter(|state| state.active)
            .ok_or(CastRejection::NotActive)?;
        let spell = validate_slot(request, loadout, catalog)?;

        let forward = direction_from_yaw(caster_state.yaw);
        let origin = caster_state.position
            + Vec3::Y * CAST_HEIGHT
            + forward * (caster_state.body_radius + spell.radius + SPAWN_CLEARANCE);

        let id = self.next_projectile_id;
        self.next_projectile_id = self.next_projectile_id.wrapping_add(1).max(1);
        debug!(
            "Player {} cast {} (projectile {})",
            request.caster, spell.name, id
        );
        Ok(Projectile::spawn(id, spell, request.caster, origin, forward))
    }
}

impl Default for SpellCaster {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_slot(
    request: CastRequest,
    loadout: &[SpellId],
    catalog: &MiniGameCatalog,
) -> Result<Arc<SpellDefinition>, CastRejection> {
    let expected = *loadout
        .get(request.slot as usize)
        .ok_or(CastRejection::EmptySlot(request.slot))?;
    if expected != request.spell_id {
        return Err(CastRejection::SlotMismatch {
            slot: request.slot,
            expected,
            requested: request.spell_id,
        });
    }
    catalog
        .spell(request.spell_id)
        .map_err(|_| CastRejection::UnknownSpell(request.spell_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{SPELL_FIREBALL, SPELL_FROST_BOLT};
    use assert_approx_eq::assert_approx_eq;

    fn caster(active: bool) -> Option<CasterState> {
        Some(CasterState {
            position: Vec3::new(2.0, 0.0, 3.0),
            yaw: 0.0,
            body_radius: 0.5,
            active,
        })
    }

    fn request(spell_id: SpellId, slot: u8) -> CastRequest {
        CastRequest {
            caster: 7,
            spell_id,
            slot,
        }
    }

    #[test]
    fn test_accepted_cast_spawns_in_front_of_caster() {
        let catalog = MiniGameCatalog::builtin();
        let mut spells = SpellCaster::new();
        let loadout = [SPELL_FIREBALL, SPELL_FROST_BOLT];

        let projectile = spells
            .handle_cast(request(SPELL_FIREBALL, 0), caster(true), &loadout, &catalog)
            .unwrap();

        assert_eq!(projectile.caster, 7);
        assert_eq!(projectile.spell.id, SPELL_FIREBALL);
        assert_approx_eq!(projectile.position.x, 2.0);
        assert_approx_eq!(projectile.position.y, CAST_HEIGHT);
        assert!(projectile.position.z > 3.5);
        assert_approx_eq!(projectile.direction.z, 1.0);
    }

    #[test]
    fn test_projectile_ids_are_unique() {
        let catalog = MiniGameCatalog::builtin();
        let mut spells = SpellCaster::new();
        let loadout = [SPELL_FROST_BOLT];

        let a = spells
            .handle_cast(request(SPELL_FROST_BOLT, 0), caster(true), &loadout, &catalog)
            .unwrap();
        let b = spells
            .handle_cast(request(SPELL_FROST_BOLT, 0), caster(true), &loadout, &catalog)
            .unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_inactive_caster_rejected() {
        let catalog = MiniGameCatalog::builtin();
        let mut spells = SpellCaster::new();
        let loadout = [SPELL_FIREBALL];

        assert_eq!(
            spells
                .handle_cast(request(SPELL_FIREBALL, 0), caster(false), &loadout, &catalog)
                .unwrap_err(),
            CastRejection::NotActive
        );
        assert_eq!(
            spells
                .handle_cast(request(SPELL_FIREBALL, 0), None, &loadout, &catalog)
                .unwrap_err(),
            CastRejection::NotActive
        );
    }

    #[test]
    fn test_slot_must_hold_requested_spell() {
        let catalog = MiniGameCatalog::builtin();
        let mut spells = SpellCaster::new();
        let loadout = [SPELL_FIREBALL];

        assert_eq!(
            spells
                .handle_cast(request(SPELL_FIREBALL, 3), caster(true), &loadout, &catalog)
                .unwrap_err(),
            CastRejection::EmptySlot(3)
        );
        assert!(matches!(
            spells.handle_cast(request(SPELL_FROST_BOLT, 0), caster(true), &loadout, &catalog),
            Err(CastRejection::SlotMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_spell_in_loadout_rejected() {
        let catalog = MiniGameCatalog::builtin();
        let mut spells = SpellCaster::new();
        let loadout = [42];

        assert_eq!(
            spells
                .handle_cast(request(42, 0), caster(true), &loadout, &catalog)
                .unwrap_err(),
            CastRejection::UnknownSpell(42)
        );
    }
}

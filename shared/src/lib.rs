pub mod config;
pub mod math;
pub mod protocol;

pub use config::{
    EffectPayload, GameModeKind, GroundSensorConfig, ImpactEffect, MiniGameConfig, MovementConfig,
    PhaseConfig, SpellDefinition, StackingPolicy, StatusEffectDefinition,
};
pub use math::{Vec2, Vec3};
pub use protocol::{
    DespawnCause, EntityDelta, EntitySnapshot, InputState, Packet, ProjectileDespawn,
    ProjectileSpawn, WorldDelta, WorldSnapshot,
};

/// Identifies a connected participant for the lifetime of its connection.
pub type PlayerId = u32;
/// Identifies a server-spawned networked actor (projectiles).
pub type EntityId = u32;
pub type SpellId = u32;
pub type EffectId = u32;

pub const PROTOCOL_VERSION: u32 = 1;
pub const DEFAULT_TICK_RATE: u32 = 60;
/// Below this input magnitude the character neither accelerates nor turns.
pub const INPUT_DEADZONE: f32 = 0.01;
/// Derived movement speed never drops under this fraction of base speed.
pub const MIN_SPEED_FRACTION: f32 = 0.1;
/// Largest datagram either side will try to decode.
pub const MAX_PACKET_SIZE: usize = 8192;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_packet_serialization_connect() {
        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Connect { client_version } => assert_eq!(client_version, PROTOCOL_VERSION),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_input() {
        let packet = Packet::Input(InputState {
            sequence: 123,
            move_vector: Vec2::new(0.5, -1.0),
            jump_velocity: 7.5,
        });

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Input(input) => {
                assert_eq!(input.sequence, 123);
                assert_approx_eq!(input.move_vector.x, 0.5);
                assert_approx_eq!(input.move_vector.y, -1.0);
                assert_approx_eq!(input.jump_velocity, 7.5);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_delta() {
        let delta = WorldDelta {
            tick: 42,
            entities: vec![EntityDelta {
                id: 3,
                animation_speed: Some(2.5),
                ..Default::default()
            }],
            removed_entities: vec![9],
            spawned: vec![ProjectileSpawn {
                id: 1,
                spell_id: 2,
                caster: 3,
                position: Vec3::new(1.0, 1.0, 1.0),
                direction: Vec3::new(0.0, 0.0, 1.0),
                speed: 20.0,
            }],
            despawned: vec![],
        };

        let serialized = bincode::serialize(&Packet::Delta(delta.clone())).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Delta(d) => assert_eq!(d, delta),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_authority_only_packets() {
        assert!(Packet::Snapshot(WorldSnapshot::default()).is_authority_only());
        assert!(Packet::GameEnded { winner: None }.is_authority_only());
        assert!(!Packet::Disconnect.is_authority_only());
        assert!(!Packet::CastSpell {
            spell_id: 1,
            slot: 0
        }
        .is_authority_only());
    }

    #[test]
    fn test_empty_delta() {
        assert!(WorldDelta::default().is_empty());
        assert!(EntityDelta::default().is_empty());
        let delta = EntityDelta {
            id: 1,
            alive: Some(false),
            ..Default::default()
        };
        assert!(!delta.is_empty());
    }
}

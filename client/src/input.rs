//! Bot input generation with sequencing and change detection

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{InputState, Vec2};
use std::time::{Duration, Instant};

/// Jump velocity requested when the bot decides to jump
pub const JUMP_VELOCITY: f32 = 8.0;
/// Longest gap between two inputs even when nothing changed
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(250);

/// What the bot wants to do this frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BotCommand {
    pub move_vector: Vec2,
    pub jump: bool,
    /// Spell slot to cast from, if any
    pub cast_slot: Option<u8>,
}

/// Randomised stand-in for a human at the controls
///
/// The bot holds a heading for a while, then picks a new one. Jumps and
/// casts are rolled independently every frame.
pub struct BotInput {
    rng: StdRng,
    heading: Vec2,
    frames_until_retarget: u32,
    jump_chance: f64,
    cast_chance: f64,
}

impl BotInput {
    /// Same seed, same decisions. Without a seed the bot draws from entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            heading: Vec2::default(),
            frames_until_retarget: 0,
            jump_chance: 0.02,
            cast_chance: 0.01,
        }
    }

    pub fn with_chances(mut self, jump_chance: f64, cast_chance: f64) -> Self {
        self.jump_chance = jump_chance.clamp(0.0, 1.0);
        self.cast_chance = cast_chance.clamp(0.0, 1.0);
        self
    }

    /// Rolls the next command. `slot_count` bounds the cast slot.
    pub fn next_command(&mut self, slot_count: usize) -> BotCommand {
        if self.frames_until_retarget == 0 {
            let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
            let magnitude = self.rng.gen_range(0.5..=1.0);
            self.heading = Vec2::new(angle.sin() * magnitude, angle.cos() * magnitude);
            self.frames_until_retarget = self.rng.gen_range(20..90);
        }
        self.frames_until_retarget -= 1;

        let jump = self.rng.gen_bool(self.jump_chance);
        let cast_slot = if slot_count > 0 && self.rng.gen_bool(self.cast_chance) {
            Some(self.rng.gen_range(0..slot_count.min(u8::MAX as usize)) as u8)
        } else {
            None
        };

        BotCommand {
            move_vector: self.heading,
            jump,
            cast_slot,
        }
    }
}

/// Turns commands into sequenced inputs for the server
///
/// Inputs are only sent when the intent changes, on every jump, or after
/// `KEEPALIVE_INTERVAL` so the server does not time the client out.
pub struct InputRelay {
    next_sequence: u32,
    last_sent: Option<(Vec2, Instant)>,
}

impl InputRelay {
    pub fn new() -> Self {
        Self {
            next_sequence: 0,
            last_sent: None,
        }
    }

    /// Returns the input to send for this command, if any
    pub fn relay(&mut self, command: &BotCommand, now: Instant) -> Option<InputState> {
        let should_send = command.jump
            || match self.last_sent {
                None => true,
                Some((move_vector, at)) => {
                    move_vector != command.move_vector
                        || now.duration_since(at) >= KEEPALIVE_INTERVAL
                }
            };
        if !should_send {
            return None;
        }

        let input = InputState {
            sequence: self.next_sequence,
            move_vector: command.move_vector,
            jump_velocity: if command.jump { JUMP_VELOCITY } else { 0.0 },
        };
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.last_sent = Some((command.move_vector, now));
        Some(input)
    }

    pub fn sent_count(&self) -> u32 {
        self.next_sequence
    }
}

impl Default for InputRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn command(x: f32, jump: bool) -> BotCommand {
        BotCommand {
            move_vector: Vec2::new(x, 0.0),
            jump,
            cast_slot: None,
        }
    }

    #[test]
    fn test_seeded_bots_agree() {
        let mut a = BotInput::new(Some(7));
        let mut b = BotInput::new(Some(7));
        for _ in 0..200 {
            assert_eq!(a.next_command(2), b.next_command(2));
        }
    }

    #[test]
    fn test_bot_move_vector_within_unit_circle() {
        let mut bot = BotInput::new(Some(3));
        for _ in 0..500 {
            let command = bot.next_command(0);
            assert!(command.move_vector.length() <= 1.0 + 1e-4);
            assert!(command.cast_slot.is_none());
        }
    }

    #[test]
    fn test_bot_cast_slot_in_range() {
        let mut bot = BotInput::new(Some(11)).with_chances(0.0, 1.0);
        for _ in 0..100 {
            let command = bot.next_command(2);
            assert!(!command.jump);
            assert!(matches!(command.cast_slot, Some(0) | Some(1)));
        }
    }

    #[test]
    fn test_relay_sends_first_input() {
        let mut relay = InputRelay::new();
        let input = relay.relay(&command(1.0, false), Instant::now()).unwrap();
        assert_eq!(input.sequence, 0);
        assert_approx_eq!(input.move_vector.x, 1.0);
        assert_approx_eq!(input.jump_velocity, 0.0);
    }

    #[test]
    fn test_relay_skips_unchanged_input() {
        let mut relay = InputRelay::new();
        let now = Instant::now();
        assert!(relay.relay(&command(1.0, false), now).is_some());
        assert!(relay.relay(&command(1.0, false), now).is_none());
        assert_eq!(relay.sent_count(), 1);
    }

    #[test]
    fn test_relay_sends_on_change_and_jump() {
        let mut relay = InputRelay::new();
        let now = Instant::now();
        relay.relay(&command(1.0, false), now);

        let changed = relay.relay(&command(-1.0, false), now).unwrap();
        assert_eq!(changed.sequence, 1);

        let jump = relay.relay(&command(-1.0, true), now).unwrap();
        assert_eq!(jump.sequence, 2);
        assert_approx_eq!(jump.jump_velocity, JUMP_VELOCITY);
    }

    #[test]
    fn test_relay_keepalive() {
        let mut relay = InputRelay::new();
        let start = Instant::now();
        relay.relay(&command(0.5, false), start);

        let later = start + KEEPALIVE_INTERVAL;
        assert!(relay.relay(&command(0.5, false), later).is_some());
    }
}

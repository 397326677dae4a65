//! Per-entity status effect engine.
//!
//! Each character owns one [`StatusEffectEngine`]. Applications arriving
//! during a tick are queued with [`StatusEffectEngine::queue_effect`] and
//! folded in by [`StatusEffectEngine::tick`] only after existing instances
//! have been expired or ticked, so an instance that runs out on this tick
//! is removed before a same-tick re-application can touch it.
//!
//! Lifecycle hooks (apply / tick / remove) are reported as [`EffectEvent`]s
//! for the owner to act on, instead of callbacks into the world.

use log::debug;
use shared::{EffectPayload, StackingPolicy, StatusEffectDefinition, MIN_SPEED_FRACTION};
use std::sync::Arc;

/// Live record of one applied effect.
#[derive(Debug, Clone)]
pub struct StatusEffectInstance {
    pub definition: Arc<StatusEffectDefinition>,
    pub start_time: f32,
    pub duration: f32,
    pub stacks: u32,
}

impl StatusEffectInstance {
    fn new(definition: Arc<StatusEffectDefinition>, now: f32) -> Self {
        Self {
            duration: definition.duration,
            definition,
            start_time: now,
            stacks: 1,
        }
    }

    pub fn is_expired(&self, now: f32) -> bool {
        now >= self.start_time + self.duration
    }

    /// Movement multiplier contributed by this instance; 1.0 if not a slow.
    fn speed_factor(&self) -> f32 {
        match self.definition.payload {
            EffectPayload::Slow { percentage } => (1.0 - percentage).powi(self.stacks as i32),
            _ => 1.0,
        }
    }
}

/// What `apply_effect` did with an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Added,
    Refreshed,
    Stacked,
    /// `Stack` policy already at `max_stacks`.
    AtMaxStacks,
    Ignored,
}

/// Hook notifications produced by the engine.
#[derive(Debug, Clone)]
pub enum EffectEvent {
    Applied {
        effect: Arc<StatusEffectDefinition>,
    },
    Ticked {
        effect: Arc<StatusEffectDefinition>,
        stacks: u32,
        dt: f32,
    },
    Removed {
        effect: Arc<StatusEffectDefinition>,
    },
}

#[derive(Debug)]
pub struct StatusEffectEngine {
    instances: Vec<StatusEffectInstance>,
    pending: Vec<Arc<StatusEffectDefinition>>,
    base_speed: f32,
    derived_speed: f32,
    last_replicated_speed: f32,
}

impl StatusEffectEngine {
    pub fn new(base_speed: f32) -> Self {
        Self {
            instances: Vec::new(),
            pending: Vec::new(),
            base_speed,
            derived_speed: base_speed,
            last_replicated_speed: base_speed,
        }
    }

    pub fn instances(&self) -> &[StatusEffectInstance] {
        &self.instances
    }

    pub fn stacks_of(&self, effect_id: u32) -> u32 {
        self.instances
            .iter()
            .filter(|i| i.definition.id == effect_id)
            .map(|i| i.stacks)
            .sum()
    }

    /// Buffers an application for the next [`tick`](Self::tick).
    pub fn queue_effect(&mut self, definition: Arc<StatusEffectDefinition>) {
        self.pending.push(definition);
    }

    /// Applies an effect immediately, honouring its stacking policy.
    pub fn apply_effect(
        &mut self,
        definition: Arc<StatusEffectDefinition>,
        now: f32,
        events: &mut Vec<EffectEvent>,
    ) -> ApplyOutcome {
        let existing = self
            .instances
            .iter_mut()
            .find(|i| i.definition.id == definition.id);

        let outcome = match (existing, definition.stacking) {
            (None, _) | (Some(_), StackingPolicy::Independent) => {
                self.instances
                    .push(StatusEffectInstance::new(Arc::clone(&definition), now));
                events.push(EffectEvent::Applied {
                    effect: Arc::clone(&definition),
                });
                ApplyOutcome::Added
            }
            (Some(instance), StackingPolicy::Refresh) => {
                instance.start_time = now;
                instance.duration = definition.duration;
                ApplyOutcome::Refreshed
            }
            (Some(instance), StackingPolicy::Stack) => {
                if instance.stacks < definition.max_stacks {
                    instance.stacks += 1;
                    instance.start_time = now;
                    ApplyOutcome::Stacked
                } else {
                    ApplyOutcome::AtMaxStacks
                }
            }
            (Some(_), StackingPolicy::Ignore) => ApplyOutcome::Ignored,
        };

        debug!("Applied '{}': {:?}", definition.name, outcome);

        if outcome != ApplyOutcome::Ignored && definition.is_movement_affecting() {
            self.recompute_speed();
        }
        outcome
    }

    /// Removes every instance of an effect, reporting each removal.
    pub fn remove_effect(&mut self, effect_id: u32, events: &mut Vec<EffectEvent>) -> bool {
        let mut removed_movement = false;
        let before = self.instances.len();
        self.instances.retain(|instance| {
            if instance.definition.id == effect_id {
                removed_movement |= instance.definition.is_movement_affecting();
                events.push(EffectEvent::Removed {
                    effect: Arc::clone(&instance.definition),
                });
                false
            } else {
                true
            }
        });
        if removed_movement {
            self.recompute_speed();
        }
        self.instances.len() != before
    }

    /// Advances the engine to `now`.
    ///
    /// Expired instances are removed first, surviving ones are ticked, then
    /// queued applications are folded in.
    pub fn tick(&mut self, now: f32, dt: f32) -> Vec<EffectEvent> {
        let mut events = Vec::new();
        let mut removed_movement = false;

        self.instances.retain(|instance| {
            if instance.is_expired(now) {
                removed_movement |= instance.definition.is_movement_affecting();
                events.push(EffectEvent::Removed {
                    effect: Arc::clone(&instance.definition),
                });
                false
            } else {
                events.push(EffectEvent::Ticked {
                    effect: Arc::clone(&instance.definition),
                    stacks: instance.stacks,
                    dt,
                });
                true
            }
        });

        if removed_movement {
            self.recompute_speed();
        }

        for definition in std::mem::take(&mut self.pending) {
            self.apply_effect(definition, now, &mut events);
        }

        events
    }

    /// Drops all instances and queued applications without hooks.
    pub fn clear(&mut self) {
        self.instances.clear();
        self.pending.clear();
        self.recompute_speed();
    }

    /// Product of all slow factors, floored at [`MIN_SPEED_FRACTION`].
    pub fn speed_multiplier(&self) -> f32 {
        self.instances
            .iter()
            .map(StatusEffectInstance::speed_factor)
            .product::<f32>()
            .max(MIN_SPEED_FRACTION)
    }

    pub fn derived_speed(&self) -> f32 {
        self.derived_speed
    }

    /// Returns the derived speed if it changed since it was last taken.
    pub fn take_speed_change(&mut self) -> Option<f32> {
        if (self.derived_speed - self.last_replicated_speed).abs() > f32::EPSILON {
            self.last_replicated_speed = self.derived_speed;
            Some(self.derived_speed)
        } else {
            None
        }
    }

    fn recompute_speed(&mut self) {
        self.derived_speed = self.base_speed * self.speed_multiplier();
    }
}

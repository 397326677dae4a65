//! Authority-side character movement.
//!
//! Every fixed tick the controller runs
//! `check_ground -> handle_movement -> handle_rotation -> handle_jump`
//! and then integrates its rigid body. Horizontal steering is applied as a
//! force so the body keeps any velocity imparted by other sources; only the
//! jump writes a velocity component directly.
//!
//! The pipeline does not care where input came from: remote participants'
//! relayed [`InputState`] and a host's local device input go through the
//! same [`MovementController::step`].

use shared::{math, InputState, MovementConfig, Vec2, Vec3, INPUT_DEADZONE};

use crate::ground::{GroundHit, GroundQuery};

/// Minimal point-mass body with force accumulation and linear damping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidBody {
    pub position: Vec3,
    pub velocity: Vec3,
    pub mass: f32,
    pub linear_damping: f32,
    force: Vec3,
}

impl RigidBody {
    pub fn new(position: Vec3, mass: f32) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            mass: mass.max(f32::EPSILON),
            linear_damping: 0.0,
            force: Vec3::ZERO,
        }
    }

    pub fn add_force(&mut self, force: Vec3) {
        self.force += force;
    }

    /// Semi-implicit Euler step; clears accumulated force.
    pub fn integrate(&mut self, dt: f32, gravity: f32) {
        self.velocity += self.force * (dt / self.mass);
        self.velocity.y -= gravity * dt;
        let damping = (1.0 - self.linear_damping * dt).clamp(0.0, 1.0);
        self.velocity = self.velocity * damping;
        self.position += self.velocity * dt;
        self.force = Vec3::ZERO;
    }
}

/// Read-only view of a controller's authoritative state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementState {
    pub input: Vec2,
    pub grounded: bool,
    pub position: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
    pub move_speed: f32,
    pub animation_speed: f32,
}

#[derive(Debug, Clone)]
pub struct MovementController {
    config: MovementConfig,
    body: RigidBody,
    yaw: f32,
    ground: GroundHit,
    input: Vec2,
    move_speed: f32,
    animation_speed: f32,
}

impl MovementController {
    pub fn new(config: MovementConfig, position: Vec3, yaw: f32) -> Self {
        Self {
            body: RigidBody::new(position, config.mass),
            move_speed: config.base_speed,
            config,
            yaw,
            ground: GroundHit::default(),
            input: Vec2::ZERO,
            animation_speed: 0.0,
        }
    }

    /// Runs one fixed-timestep movement update.
    pub fn step(&mut self, input: &InputState, ground: &dyn GroundQuery, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        self.input = input.move_vector;

        self.check_ground(ground);
        self.handle_movement(input.move_vector, dt);
        self.handle_rotation(input.move_vector, dt);
        if input.jump_velocity > 0.0 {
            self.handle_jump(input.jump_velocity);
        }

        self.body.linear_damping = if self.ground.is_grounded {
            self.config.ground_drag
        } else {
            self.config.air_drag
        };
        let gravity = if self.ground.is_grounded {
            0.0
        } else {
            self.config.gravity
        };
        self.body.integrate(dt, gravity);

        if self.ground.is_grounded {
            if self.body.position.y < self.ground.point.y {
                self.body.position.y = self.ground.point.y;
            }
            if self.body.velocity.y < 0.0 {
                self.body.velocity.y = 0.0;
            }
        }

        self.clamp_horizontal_speed();
        self.animation_speed = math::flatten(self.body.velocity).length();
    }

    pub fn check_ground(&mut self, ground: &dyn GroundQuery) -> GroundHit {
        self.ground = ground.check_ground(self.body.position, &self.config.ground_sensor);
        self.ground
    }

    /// Steers horizontal velocity toward the input direction by adding a force.
    pub fn handle_movement(&mut self, move_input: Vec2, dt: f32) {
        let direction = if move_input.length() < INPUT_DEADZONE {
            Vec3::ZERO
        } else {
            math::input_to_plane(move_input.normalize_or_zero())
        };
        let speed = if self.ground.is_grounded {
            self.move_speed
        } else {
            self.move_speed * self.config.air_control
        };
        let target = direction * speed;

        let rate = if target.length() > 0.0 {
            self.config.acceleration
        } else {
            self.config.deceleration
        };

        let current = math::flatten(self.body.velocity);
        let mut next = math::move_towards(current, target, rate * dt);
        let next_speed = next.length();
        if next_speed > self.config.max_speed {
            next = next * (self.config.max_speed / next_speed);
        }

        self.body
            .add_force((next - current) * (self.body.mass / dt));
    }

    pub fn handle_rotation(&mut self, move_input: Vec2, dt: f32) {
        if !self.config.rotate_toward_movement || move_input.length() < INPUT_DEADZONE {
            return;
        }
        let target = math::yaw_from_direction(math::input_to_plane(move_input));
        self.yaw = math::slerp_yaw(self.yaw, target, self.config.rotation_speed * dt);
    }

    /// Sets vertical velocity while grounded; returns whether the jump happened.
    pub fn handle_jump(&mut self, jump_velocity: f32) -> bool {
        if !self.ground.is_grounded {
            return false;
        }
        self.body.velocity.y = jump_velocity;
        true
    }

    fn clamp_horizontal_speed(&mut self) {
        let horizontal = math::flatten(self.body.velocity);
        let speed = horizontal.length();
        if speed > self.config.max_speed {
            let clamped = horizontal * (self.config.max_speed / speed);
            self.body.velocity.x = clamped.x;
            self.body.velocity.z = clamped.z;
        }
    }

    /// Puts the body back at rest at a new spot.
    pub fn reset(&mut self, position: Vec3, yaw: f32) {
        self.body = RigidBody::new(position, self.config.mass);
        self.yaw = yaw;
        self.ground = GroundHit::default();
        self.input = Vec2::ZERO;
        self.animation_speed = 0.0;
    }

    /// Sets the speed used for targets, usually the status-effect derived speed.
    pub fn set_move_speed(&mut self, speed: f32) {
        self.move_speed = speed.max(0.0);
    }

    pub fn animation_speed(&self) -> f32 {
        self.animation_speed
    }

    pub fn position(&self) -> Vec3 {
        self.body.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.body.velocity
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn is_grounded(&self) -> bool {
        self.ground.is_grounded
    }

    pub fn body_radius(&self) -> f32 {
        self.config.body_radius
    }

    pub fn body_mut(&mut self) -> &mut RigidBody {
        &mut self.body
    }

    pub fn state(&self) -> MovementState {
        MovementState {
            input: self.input,
            grounded: self.ground.is_grounded,
            position: self.body.position,
            velocity: self.body.velocity,
            yaw: self.yaw,
            move_speed: self.move_speed,
            animation_speed: self.animation_speed,
        }
    }
}

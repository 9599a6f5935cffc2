//! # Vehicle Dynamics
//!
//! One car's kinematic state and the per-tick integrator.
//!
//! The integrator is a pure function of the car, its inputs, the elapsed
//! milliseconds, and the ground drag under the car. It keeps no global
//! state and never touches the network. Status changes are reported back
//! to the caller in a [`TickReport`].

use bytemuck::{Pod, Zeroable};
use tarmac_shared::math::normalize_degrees;
use tarmac_shared::{Segment, Vec2};

use crate::bounds::Boundary;
use crate::checkpoint::CheckpointTracker;
use crate::grid::GroundResistance;

// =============================================================================
// TUNING
// =============================================================================

/// Top forward speed in world units per second.
///
/// Must stay above the roughly 385 units per second where full lock slides.
pub const MAX_SPEED: f32 = 500.0;

/// Speed gained per second with the throttle held.
pub const ACCEL_SPEED: f32 = 200.0;

/// Speed lost per second with the brake held.
pub const BRAKE_POWER: f32 = 400.0;

/// Air drag coefficient, applied everywhere.
pub const AIR_RESIST: f32 = 0.2;

/// Steering angle at full lock, in degrees.
pub const STEER_ANGLE: f32 = 20.0;

/// Divisor turning `tan(angle) * speed` into lateral force.
const FORCE_DIVISOR: f32 = 7.0;

/// Lateral force above which the car slides.
pub const DRIFT_THRESHOLD: f32 = 20.0;

/// Slide offset per unit of force above the threshold.
const DRIFT_SCALE: f32 = 0.1;

/// Speed multiplier after hitting a wall.
pub const BOUND_BOUNCE: f32 = -0.3;

/// Collision outline length along the heading.
pub const CAR_LENGTH: f32 = 40.0;

/// Collision outline width across the heading.
pub const CAR_WIDTH: f32 = 20.0;

/// Heading of a freshly placed car, pointing up the screen.
pub const START_HEADING: f32 = 270.0;

// =============================================================================
// WIRE SNAPSHOT
// =============================================================================

/// Full kinematic snapshot of a car, exactly as it travels on the wire.
///
/// Always the whole state, never a diff.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CarState {
    /// World X
    pub x: f32,
    /// World Y
    pub y: f32,
    /// Heading in degrees
    pub rotation: f32,
    /// Turn input in `[-1, 1]`
    pub turn: f32,
    /// Throttle held (0 or 1)
    pub accelerate: u8,
    /// Brake held (0 or 1)
    pub brake: u8,
    /// Padding to 4-byte alignment
    pub reserved: [u8; 2],
    /// Move vector X
    pub move_x: f32,
    /// Move vector Y
    pub move_y: f32,
    /// Signed speed
    pub speed: f32,
}

impl CarState {
    /// Encoded size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Values a debug overlay may poll after each tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CarTelemetry {
    /// Signed speed after the tick.
    pub speed: f32,
    /// Lateral force magnitude before clamping.
    pub force_magnitude: f32,
    /// Ground drag that applied this tick.
    pub resistance: f32,
    /// Whether the car slid this tick.
    pub drifting: bool,
}

/// What happened during one [`Car::update`].
#[must_use]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Input checksum changed since the last tick.
    pub status_changed: bool,
    /// A lap was completed.
    pub lap_completed: bool,
}

// =============================================================================
// CAR
// =============================================================================

/// A single vehicle.
#[derive(Clone, Debug, Default)]
pub struct Car {
    position: Vec2,
    previous_position: Vec2,
    /// Degrees in `[0, 360)`.
    heading: f32,
    speed: f32,

    turn: f32,
    accelerate: bool,
    brake: bool,

    move_vector: Vec2,
    force: Vec2,
    drift: Vec2,
    drifting: bool,

    checkpoints: CheckpointTracker,
    input_checksum: i32,
    telemetry: CarTelemetry,
}

impl Car {
    /// Creates a stationary car at `position` facing `heading` degrees.
    #[must_use]
    pub fn new(position: Vec2, heading: f32) -> Self {
        Self {
            position,
            previous_position: position,
            heading: normalize_degrees(heading),
            ..Self::default()
        }
    }

    /// Installs the lap checkpoints this car must pass.
    #[must_use]
    pub fn with_checkpoints(mut self, checkpoints: CheckpointTracker) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    // ------------------------------------------------------------------ inputs

    /// Holds or releases the throttle.
    pub fn set_acceleration(&mut self, on: bool) {
        self.accelerate = on;
    }

    /// Holds or releases the brake.
    pub fn set_brake(&mut self, on: bool) {
        self.brake = on;
    }

    /// Sets the turn input, clamped to `[-1, 1]`. NaN means straight.
    pub fn set_turn(&mut self, value: f32) {
        self.turn = if value.is_nan() { 0.0 } else { value.clamp(-1.0, 1.0) };
    }

    /// Teleports the car.
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.previous_position = position;
    }

    /// Sets the heading in degrees.
    pub fn set_rotation(&mut self, degrees: f32) {
        self.heading = normalize_degrees(degrees);
    }

    // --------------------------------------------------------------- accessors

    /// World position.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }

    /// Heading in degrees, `[0, 360)`.
    #[inline]
    #[must_use]
    pub const fn rotation(&self) -> f32 {
        self.heading
    }

    /// Heading in radians.
    #[inline]
    #[must_use]
    pub fn rotation_rad(&self) -> f32 {
        self.heading.to_radians()
    }

    /// Signed speed, forward positive.
    #[inline]
    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.speed
    }

    /// Turn input.
    #[inline]
    #[must_use]
    pub const fn turn(&self) -> f32 {
        self.turn
    }

    /// Throttle state.
    #[inline]
    #[must_use]
    pub const fn is_accelerating(&self) -> bool {
        self.accelerate
    }

    /// Brake state.
    #[inline]
    #[must_use]
    pub const fn is_braking(&self) -> bool {
        self.brake
    }

    /// Velocity the car moved with on the last tick.
    #[inline]
    #[must_use]
    pub const fn move_vector(&self) -> Vec2 {
        self.move_vector
    }

    /// Lateral force after clamping to the drift threshold.
    #[inline]
    #[must_use]
    pub const fn force_vector(&self) -> Vec2 {
        self.force
    }

    /// Position offset applied by sliding on the last tick.
    #[inline]
    #[must_use]
    pub const fn drift_vector(&self) -> Vec2 {
        self.drift
    }

    /// Whether the car slid on the last tick.
    #[inline]
    #[must_use]
    pub const fn is_drifting(&self) -> bool {
        self.drifting
    }

    /// Completed laps.
    #[inline]
    #[must_use]
    pub const fn lap(&self) -> u32 {
        self.checkpoints.lap()
    }

    /// Lap progress.
    #[inline]
    #[must_use]
    pub const fn checkpoints(&self) -> &CheckpointTracker {
        &self.checkpoints
    }

    /// Values from the last tick.
    #[inline]
    #[must_use]
    pub const fn telemetry(&self) -> CarTelemetry {
        self.telemetry
    }

    // ---------------------------------------------------------------- ticking

    /// Advances the car by one tick of `elapsed_ms` milliseconds.
    pub fn update(&mut self, elapsed_ms: u32, ground: &impl GroundResistance) -> TickReport {
        let delta = elapsed_ms as f32 / 1000.0;

        // three-way steering, no intermediate angles
        let steer = if self.turn > 0.0 {
            STEER_ANGLE
        } else if self.turn < 0.0 {
            -STEER_ANGLE
        } else {
            0.0
        };

        if self.accelerate {
            self.speed = (self.speed + ACCEL_SPEED * delta).min(MAX_SPEED);
        }
        if self.brake {
            self.speed = (self.speed - BRAKE_POWER * delta).max(-MAX_SPEED / 2.0);
        }

        self.speed -= delta * AIR_RESIST * self.speed;

        let resistance = ground.resistance_at(self.position);
        self.speed -= delta * resistance * self.speed;

        let forward = Vec2::from_degrees(self.heading);
        let accel_vector = forward * self.speed;

        self.force = Vec2::ZERO;
        self.drift = Vec2::ZERO;
        self.drifting = false;
        let mut force_magnitude = 0.0;

        if steer != 0.0 {
            let force = forward.perp() * (steer.to_radians().tan() * self.speed / FORCE_DIVISOR);
            force_magnitude = force.length();

            self.force = force;
            if force_magnitude > DRIFT_THRESHOLD {
                let direction = force.normalized();
                self.drift = -direction * ((force_magnitude - DRIFT_THRESHOLD) * DRIFT_SCALE);
                self.force = direction * DRIFT_THRESHOLD;
                self.drifting = true;
            }

            let combined = accel_vector + self.force;
            if combined.length_squared() > f32::EPSILON {
                let mut heading = combined.degrees();
                if self.speed < 0.0 {
                    heading += 180.0;
                }
                self.heading = normalize_degrees(heading);
            }
        }

        self.move_vector = Vec2::from_degrees(self.heading) * self.speed;

        // The drift offset is a raw per-tick displacement, not scaled by delta.
        self.previous_position = self.position;
        self.position += self.move_vector * delta + self.drift;

        let lap_completed = self.checkpoints.advance(self.position);

        self.telemetry = CarTelemetry {
            speed: self.speed,
            force_magnitude,
            resistance,
            drifting: self.drifting,
        };

        let checksum = self.calculate_input_checksum();
        let status_changed = checksum != self.input_checksum;
        self.input_checksum = checksum;

        TickReport {
            status_changed,
            lap_completed,
        }
    }

    /// Bit-packed throttle, brake and turn.
    #[must_use]
    pub fn calculate_input_checksum(&self) -> i32 {
        let mut checksum = i32::from(self.accelerate);
        checksum |= i32::from(self.brake) << 1;
        checksum |= ((self.turn * 100.0) as i32) << 2;
        checksum
    }

    // -------------------------------------------------------------- collision

    /// The four edges of the car's rotated rectangle.
    #[must_use]
    pub fn outline(&self) -> [Segment; 4] {
        let forward = Vec2::from_degrees(self.heading) * (CAR_LENGTH / 2.0);
        let side = forward.perp().normalized() * (CAR_WIDTH / 2.0);
        let p = self.position;

        let front_left = p + forward - side;
        let front_right = p + forward + side;
        let rear_right = p - forward + side;
        let rear_left = p - forward - side;

        [
            Segment::new(front_left, front_right),
            Segment::new(front_right, rear_right),
            Segment::new(rear_right, rear_left),
            Segment::new(rear_left, front_left),
        ]
    }

    /// Bounces the car off a wall it ran into this tick.
    pub fn perform_bound_collision(&mut self, _bound: &Boundary) {
        self.position = self.previous_position;
        self.speed *= BOUND_BOUNCE;
        self.move_vector = Vec2::from_degrees(self.heading) * self.speed;
    }

    // ----------------------------------------------------------------- sync

    /// Snapshot for the wire.
    #[must_use]
    pub fn state(&self) -> CarState {
        CarState {
            x: self.position.x,
            y: self.position.y,
            rotation: self.heading,
            turn: self.turn,
            accelerate: u8::from(self.accelerate),
            brake: u8::from(self.brake),
            reserved: [0; 2],
            move_x: self.move_vector.x,
            move_y: self.move_vector.y,
            speed: self.speed,
        }
    }

    /// Overwrites kinematics and inputs with a remote snapshot.
    ///
    /// Lap progress is local and is left untouched.
    pub fn apply_state(&mut self, state: &CarState) {
        self.set_position(Vec2::new(state.x, state.y));
        self.set_rotation(state.rotation);
        self.set_turn(state.turn);
        self.accelerate = state.accelerate != 0;
        self.brake = state.brake != 0;
        self.move_vector = Vec2::new(state.move_x, state.move_y);
        self.speed = state.speed.clamp(-MAX_SPEED / 2.0, MAX_SPEED);
        self.input_checksum = self.calculate_input_checksum();
    }
}

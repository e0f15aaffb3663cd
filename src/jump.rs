//! Jump state machine.
//!
//! A jump goes through a short windup before the impulse fires. Jumps are
//! counted until the agent lands again. Leaving the ground, with or without
//! a jump, keeps the remaining jumps available for `memory` seconds.

use std::time::Duration;

use bevy::prelude::*;

use crate::config::JumpConfig;

/// Phase of the jump controller.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JumpPhase {
    Grounded,
    /// A request was accepted and the impulse is pending.
    Windup,
    #[default]
    Airborne,
}

/// Edge reported by [`JumpController::on_ground_probe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundTransition {
    None,
    Landed,
    LeftGround,
}

/// Impulse released when a windup elapses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JumpImpulse {
    pub scale: f32,
}

impl JumpImpulse {
    /// World-space impulse: `up × mass × force × scale`.
    pub fn vector(&self, up: Vec3, mass: f32, force: f32) -> Vec3 {
        up * mass * force * self.scale
    }
}

/// One-shot timer. Negative or non-finite durations elapse at once.
fn seconds(duration: f32) -> Timer {
    let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
    Timer::from_seconds(duration, TimerMode::Once)
}

#[derive(Debug, Clone)]
struct Windup {
    timer: Timer,
    scale: f32,
}

/// Jump controller for one agent.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct JumpController {
    pub phase: JumpPhase,
    /// Jumps used since the last landing.
    pub count: u32,
    pub max_count: u32,
    /// Whether a jump may start (ground contact or memory window).
    pub memory_valid: bool,
    /// An impulse fired and the agent has not landed since.
    pub is_jumping: bool,
    enabled: bool,
    grounded: bool,
    #[reflect(ignore)]
    memory: Option<Timer>,
    #[reflect(ignore)]
    windup: Option<Windup>,
    #[reflect(ignore)]
    ground_relax: Option<Timer>,
}

impl Default for JumpController {
    fn default() -> Self {
        Self::new(&JumpConfig::default())
    }
}

impl JumpController {
    pub fn new(config: &JumpConfig) -> Self {
        Self {
            phase: JumpPhase::Airborne,
            count: 0,
            max_count: config.max_count,
            memory_valid: false,
            is_jumping: false,
            enabled: config.enabled,
            grounded: false,
            memory: None,
            windup: None,
            ground_relax: None,
        }
    }

    fn sync(&mut self, config: &JumpConfig) {
        self.enabled = config.enabled;
        self.max_count = config.max_count;
        self.count = self.count.min(self.max_count);
    }

    /// Whether a request made now would start a windup.
    pub fn can_jump(&self) -> bool {
        self.enabled && self.count < self.max_count && self.memory_valid && self.windup.is_none()
    }

    pub fn windup_pending(&self) -> bool {
        self.windup.is_some()
    }

    pub fn memory_pending(&self) -> bool {
        self.memory.is_some()
    }

    /// Whether the ground probe is being ignored after a take-off.
    pub fn ground_suppressed(&self) -> bool {
        self.ground_relax.is_some()
    }

    /// Feed the result of the ground probe.
    ///
    /// Landing resets the count, validates memory and cancels the memory
    /// countdown. Leaving the ground (re)starts the countdown.
    pub fn on_ground_probe(&mut self, hit: bool, config: &JumpConfig) -> GroundTransition {
        self.sync(config);

        let was_grounded = self.grounded;
        self.grounded = hit;

        match (was_grounded, hit) {
            (false, true) => {
                self.count = 0;
                self.memory_valid = true;
                self.is_jumping = false;
                self.memory = None;
                if self.windup.is_none() {
                    self.phase = JumpPhase::Grounded;
                }
                GroundTransition::Landed
            }
            (true, false) => {
                self.memory = Some(seconds(config.memory));
                if self.windup.is_none() {
                    self.phase = JumpPhase::Airborne;
                }
                GroundTransition::LeftGround
            }
            (true, true) => {
                self.memory_valid = true;
                GroundTransition::None
            }
            (false, false) => GroundTransition::None,
        }
    }

    /// Request a jump. Returns whether a windup started.
    ///
    /// Requests that cannot be honoured (disabled, out of jumps, memory
    /// expired, or a windup already pending) are ignored.
    pub fn request(&mut self, scale: f32, config: &JumpConfig) -> bool {
        self.sync(config);
        if !self.can_jump() {
            return false;
        }

        self.windup = Some(Windup {
            timer: seconds(config.delay),
            scale,
        });
        self.phase = JumpPhase::Windup;
        true
    }

    /// Advance the timers by one fixed step.
    ///
    /// Returns the impulse to apply when a windup elapses and the jump is
    /// still allowed.
    pub fn tick(&mut self, delta: Duration, config: &JumpConfig) -> Option<JumpImpulse> {
        self.sync(config);

        if let Some(timer) = self.memory.as_mut() {
            timer.tick(delta);
            if timer.finished() {
                self.memory = None;
                self.memory_valid = false;
                self.count = self.max_count;
            }
        }

        if let Some(timer) = self.ground_relax.as_mut() {
            timer.tick(delta);
            if timer.finished() {
                self.ground_relax = None;
            }
        }

        let windup = self.windup.as_mut()?;
        windup.timer.tick(delta);
        if !windup.timer.finished() {
            return None;
        }

        let scale = windup.scale;
        self.windup = None;

        if !(self.enabled && self.count < self.max_count && self.memory_valid) {
            self.phase = if self.grounded {
                JumpPhase::Grounded
            } else {
                JumpPhase::Airborne
            };
            return None;
        }

        self.count += 1;
        self.is_jumping = true;
        self.phase = JumpPhase::Airborne;
        self.ground_relax = Some(seconds(config.ground_relax));
        Some(JumpImpulse { scale })
    }
}

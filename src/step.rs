//! Step-climb assistance.
//!
//! The step probe only says that a low ledge is ahead. [`StepAssist`] pushes
//! the body over it, and only while the collider is actually touching
//! something: the backend's contact system raises the flag on contact begin
//! and stay, and clears it on contact end.

use bevy::prelude::*;

use crate::config::StepConfig;
use crate::probe::{StepProbeResult, StepState};

/// Contact flag and engagement of the step assist.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[reflect(Component)]
pub struct StepAssist {
    /// Raised by contact callbacks while the step ahead is climbable.
    pub contact: bool,
    /// A correction was produced on the last fixed step.
    pub engaged: bool,
}

impl StepAssist {
    pub fn on_contact_begin(&mut self, state: StepState) {
        if state == StepState::Climbable {
            self.contact = true;
        }
    }

    pub fn on_contact_stay(&mut self, state: StepState) {
        self.on_contact_begin(state);
    }

    pub fn on_contact_end(&mut self) {
        self.contact = false;
    }

    /// Correction for this fixed step.
    ///
    /// Zero unless contact is raised and the probe still reports a climbable
    /// ledge. Losing the ledge clears the contact flag.
    pub fn correction(
        &mut self,
        step: &StepProbeResult,
        config: &StepConfig,
        speed: f32,
        up: Vec3,
        dt: f32,
    ) -> StepCorrection {
        if !self.contact {
            self.engaged = false;
            return StepCorrection::default();
        }
        if step.state != StepState::Climbable || step.hit_count == 0 {
            self.contact = false;
            self.engaged = false;
            return StepCorrection::default();
        }

        let rate = up.normalize_or_zero() * config.smooth.clamp(1.0, speed.max(1.0));
        let mut correction = StepCorrection::default();
        if config.mode.translates() {
            correction.translation = rate * dt;
        }
        if config.mode.accelerates() {
            correction.acceleration = rate * 2.0;
        }

        if !self.engaged {
            trace!("step assist engaged, climb {:?}", step.projected_climb);
        }
        self.engaged = !correction.is_zero();
        correction
    }
}

/// Position and acceleration offsets produced by the step assist.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepCorrection {
    pub translation: Vec3,
    pub acceleration: Vec3,
}

impl StepCorrection {
    pub fn is_zero(&self) -> bool {
        self.translation == Vec3::ZERO && self.acceleration == Vec3::ZERO
    }
}

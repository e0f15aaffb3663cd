//! Locomotion events.

use bevy::prelude::*;

/// Transitions reported by the controller systems.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub enum LocomotionEvent {
    /// The ground probe went from miss to hit.
    Landed { entity: Entity },
    /// The ground probe went from hit to miss.
    LeftGround { entity: Entity },
    /// A jump impulse was applied.
    JumpStarted { entity: Entity, impulse: Vec3 },
}

impl LocomotionEvent {
    pub fn entity(&self) -> Entity {
        match *self {
            Self::Landed { entity }
            | Self::LeftGround { entity }
            | Self::JumpStarted { entity, .. } => entity,
        }
    }
}

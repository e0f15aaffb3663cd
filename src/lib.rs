//! # `rigid_locomotion`
//!
//! A physics-driven 3D locomotion controller for dynamic rigid bodies, with a
//! physics backend abstraction.
//!
//! This crate provides a locomotion controller that:
//! - Probes the geometry around the agent for ground, slopes, steps and walls
//! - Resolves a movement intent into smoothed velocities and forces
//! - Climbs low ledges with a contact-gated step assist
//! - Runs a jump state machine with windup, jump memory and multi-jumps
//! - Gates actions on an optional stamina pool
//! - Abstracts the physics backend (Rapier3D included)
//!
//! ## Architecture
//!
//! Work is split over two cadences:
//! 1. The sensing step runs in `Update`. The backend casts the probes and
//!    stores a [`probe::SenseSnapshot`] on the agent, then the state and
//!    marker components are derived from it.
//! 2. The fixed step runs in `FixedUpdate`. Movement, step assist and jumps
//!    read the latest snapshot and write velocities and forces to the body
//!    through the backend.
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use rigid_locomotion::prelude::*;
//!
//! // Controller components for a player-driven agent
//! let controller = LocomotionController::new();
//! let config = ControllerConfig::player();
//! let mut intent = MovementIntent::default();
//! intent.move_axis(Vec2::Y);
//!
//! // These can be spawned together with the backend's physics bundle
//! ```

use bevy::prelude::*;

pub mod backend;
pub mod collision;
pub mod config;
pub mod controller;
pub mod events;
pub mod intent;
pub mod jump;
pub mod movement;
pub mod probe;
pub mod stamina;
pub mod state;
pub mod step;
pub mod systems;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::{
        CapsuleShape, ForceMode, LocomotionBackend, LocomotionGravity, PhysicsQuery,
        SurfaceFriction,
    };
    pub use crate::collision::CollisionData;
    pub use crate::config::{
        ControllerConfig, GroundConfig, JumpConfig, MovementConfig, SlopeConfig, SpringConfig,
        StanceConfig, StepConfig, StepForceMode, WallConfig,
    };
    pub use crate::controller::LocomotionController;
    pub use crate::events::LocomotionEvent;
    pub use crate::intent::{JumpRequest, MovementFrame, MovementIntent};
    pub use crate::jump::{JumpController, JumpPhase};
    pub use crate::probe::{SenseSnapshot, StepState};
    pub use crate::stamina::{FillCurve, Stamina, StaminaEvent, StaminaGate};
    pub use crate::state::{Airborne, Grounded, LocomotionState, TouchingWall};
    pub use crate::step::StepAssist;
    pub use crate::{LocomotionPlugin, LocomotionSet};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::{Rapier3dBackend, Rapier3dLocomotionBundle};
}

/// System sets for the locomotion controller.
///
/// `Intent`, `Sensors` and `State` run chained in `Update`. `Preparation`,
/// `Contacts`, `Movement` and `FinalApplication` run chained in
/// `FixedUpdate`.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocomotionSet {
    /// Intent bookkeeping (idle reset, stamina).
    Intent,
    /// Backend probes write the sense snapshot.
    Sensors,
    /// State, jump landing edges and marker components.
    State,
    /// Backend clears last step's forces.
    Preparation,
    /// Backend feeds contact callbacks to the step assist.
    Contacts,
    /// Movement, step assist and jumps.
    Movement,
    /// Backend writes the accumulated forces to the body.
    FinalApplication,
}

/// Main plugin for the locomotion controller.
///
/// This plugin is generic over a physics backend `B` which provides the actual
/// physics operations (queries, force application, etc.).
///
/// # Type Parameters
/// - `B`: The physics backend implementation (e.g., `Rapier3dBackend`)
///
/// # Examples
///
/// With Rapier3D backend:
/// ```rust,no_run
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use rigid_locomotion::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
///     .add_plugins(LocomotionPlugin::<Rapier3dBackend>::default())
///     .run();
/// ```
pub struct LocomotionPlugin<B: backend::LocomotionBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::LocomotionBackend> Default for LocomotionPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::LocomotionBackend> Plugin for LocomotionPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<config::ControllerConfig>();
        app.register_type::<controller::LocomotionController>();
        app.register_type::<intent::MovementIntent>();
        app.register_type::<intent::MovementFrame>();
        app.register_type::<jump::JumpController>();
        app.register_type::<movement::LocomotionMotor>();
        app.register_type::<stamina::Stamina>();
        app.register_type::<state::LocomotionState>();
        app.register_type::<state::Grounded>();
        app.register_type::<state::Airborne>();
        app.register_type::<state::TouchingWall>();
        app.register_type::<step::StepAssist>();
        app.register_type::<backend::LocomotionGravity>();

        app.add_event::<events::LocomotionEvent>();
        app.add_event::<stamina::StaminaEvent>();
        app.init_resource::<backend::LocomotionGravity>();

        app.configure_sets(
            Update,
            (
                LocomotionSet::Intent,
                LocomotionSet::Sensors,
                LocomotionSet::State,
            )
                .chain(),
        );
        app.configure_sets(
            FixedUpdate,
            (
                LocomotionSet::Preparation,
                LocomotionSet::Contacts,
                LocomotionSet::Movement,
                LocomotionSet::FinalApplication,
            )
                .chain(),
        );

        // Add the physics backend plugin
        app.add_plugins(B::plugin());

        app.add_systems(
            Update,
            (systems::tick_intents, stamina::tick_stamina).in_set(LocomotionSet::Intent),
        );
        app.add_systems(
            Update,
            (systems::update_locomotion_state, systems::sync_state_markers)
                .chain()
                .in_set(LocomotionSet::State),
        );

        // Movement writes velocity before the jump impulse lands on top of it
        app.add_systems(
            FixedUpdate,
            (
                systems::apply_movement::<B>,
                systems::apply_step_assist::<B>,
                systems::apply_jumps::<B>,
            )
                .chain()
                .in_set(LocomotionSet::Movement),
        );
    }
}

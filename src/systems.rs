//! Core controller systems.
//!
//! These systems are generic over the physics backend. The sensing step
//! itself belongs to the backend (it owns the engine's query context) and
//! calls [`sense_agent`]; everything after the snapshot lives here.

use std::time::Duration;

use bevy::prelude::*;

use crate::backend::{ForceMode, LocomotionBackend, PhysicsQuery, SurfaceFriction};
use crate::config::ControllerConfig;
use crate::controller::LocomotionController;
use crate::events::LocomotionEvent;
use crate::intent::{MovementFrame, MovementIntent};
use crate::jump::{GroundTransition, JumpController};
use crate::movement::{
    effective_speed, ground_spring_force, resolve, FrictionCommand, LocomotionMotor,
    ResolveInput,
};
use crate::probe::{sense, ProbeContext};
use crate::stamina::{Stamina, StaminaGate};
use crate::state::{Airborne, Grounded, LocomotionState, TouchingWall};
use crate::step::StepAssist;

/// Probe the geometry around one agent and store the snapshot.
///
/// Called by backend sensing systems with their own [`PhysicsQuery`].
#[allow(clippy::too_many_arguments)]
pub fn sense_agent(
    query: &impl PhysicsQuery,
    config: &ControllerConfig,
    controller: &mut LocomotionController,
    motor: &LocomotionMotor,
    state: &LocomotionState,
    jump: &JumpController,
    position: Vec3,
    rotation: Quat,
    bottom_offset: f32,
) {
    let config = config.sanitized();
    let ctx = ProbeContext::new(position, rotation, bottom_offset)
        .with_motion(motor.direction, effective_speed(&config, state))
        .with_ground_suppressed(jump.ground_suppressed())
        .with_shape(controller.current_shape(&config));

    controller.bottom_offset = bottom_offset;
    controller.snapshot = sense(query, &config, &ctx);
}

/// Advance the idle reset countdown of every intent.
pub fn tick_intents(time: Res<Time>, mut q: Query<(&mut MovementIntent, &ControllerConfig)>) {
    for (mut intent, config) in &mut q {
        let delay = config.movement.idle_reset_delay;
        intent.tick(time.delta(), delay);
    }
}

/// Derive [`LocomotionState`] from the latest snapshot.
///
/// Feeds the ground probe to the jump controller and reports landings and
/// take-offs. Stances are resolved here: sprint, crouch and prone requests
/// are honoured when enabled, and standing back up is refused while the
/// headroom probe is blocked.
pub fn update_locomotion_state(
    mut q: Query<(
        Entity,
        &LocomotionController,
        &ControllerConfig,
        &MovementIntent,
        &mut LocomotionState,
        &mut JumpController,
    )>,
    mut events: EventWriter<LocomotionEvent>,
) {
    for (entity, controller, config, intent, mut state, mut jump) in &mut q {
        let snapshot = &controller.snapshot;
        let grounded = snapshot.is_grounded();
        let jump_config = config.sanitized().jump;

        match jump.on_ground_probe(grounded, &jump_config) {
            GroundTransition::Landed => {
                debug!("{entity} landed");
                events.write(LocomotionEvent::Landed { entity });
            }
            GroundTransition::LeftGround => {
                debug!("{entity} left the ground");
                events.write(LocomotionEvent::LeftGround { entity });
            }
            GroundTransition::None => {}
        }

        let movement = &config.movement;
        let mut prone = intent.prone && movement.prone_enabled;
        let mut crouched = intent.crouch && movement.crouch_enabled;
        let standing_up = (state.is_prone && !prone) || (state.is_crouched && !crouched);
        if standing_up && snapshot.headroom_blocked {
            prone = state.is_prone;
            crouched = state.is_crouched;
        }

        *state = LocomotionState {
            is_grounded: grounded,
            is_sloped: snapshot.slope.is_sloped,
            is_touching_wall: snapshot.wall.touching,
            is_touching_step: snapshot.step.hit_count > 0,
            is_jumping: jump.is_jumping,
            is_crouched: crouched,
            is_sprinting: intent.sprint && movement.sprint_enabled && !crouched && !prone,
            is_prone: prone,
        };
    }
}

/// Sync the marker components with [`LocomotionState`].
pub fn sync_state_markers(
    mut commands: Commands,
    q: Query<(
        Entity,
        &LocomotionState,
        &LocomotionController,
        Has<Grounded>,
        Has<Airborne>,
        Option<&TouchingWall>,
    )>,
) {
    for (entity, state, controller, has_grounded, has_airborne, wall) in &q {
        let mut entity_commands = commands.entity(entity);

        if state.is_grounded && !has_grounded {
            entity_commands.insert(Grounded).remove::<Airborne>();
        } else if !state.is_grounded && !has_airborne {
            entity_commands.insert(Airborne).remove::<Grounded>();
        }

        let probe = controller.snapshot.wall;
        if state.is_touching_wall {
            let touching = TouchingWall::new(probe.normal, probe.distance);
            if wall.is_none_or(|w| w.normal != touching.normal || w.distance != touching.distance) {
                entity_commands.insert(touching);
            }
        } else if wall.is_some() {
            entity_commands.remove::<TouchingWall>();
        }
    }
}

fn fixed_delta<B: LocomotionBackend>(world: &World) -> f32 {
    B::get_fixed_timestep(world)
}

/// Start and release jumps.
///
/// Consumes pending jump requests, advances the jump timers by one fixed
/// step and applies the impulse when a windup elapses.
pub fn apply_jumps<B: LocomotionBackend>(world: &mut World) {
    let dt = fixed_delta::<B>(world);
    let delta = Duration::from_secs_f32(dt);

    let mut fired = Vec::new();
    let mut q = world.query::<(
        Entity,
        &ControllerConfig,
        &mut MovementIntent,
        &mut JumpController,
    )>();
    for (entity, config, mut intent, mut jump) in q.iter_mut(world) {
        let jump_config = config.sanitized().jump;
        if let Some(request) = intent.take_jump_request() {
            if !jump.request(request.scale, &jump_config) {
                trace!("{entity} jump request ignored");
            }
        }
        if let Some(impulse) = jump.tick(delta, &jump_config) {
            fired.push((entity, impulse, jump_config.force));
        }
    }

    for (entity, impulse, force) in fired {
        let up = B::get_rotation(world, entity) * Vec3::Y;
        let mass = B::get_mass(world, entity);
        let vector = impulse.vector(up, mass, force);

        B::add_force(world, entity, vector, ForceMode::Impulse);
        debug!("{entity} jumped with impulse {vector}");
        world.send_event(LocomotionEvent::JumpStarted {
            entity,
            impulse: vector,
        });
    }
}

struct MovementAgent {
    entity: Entity,
    config: ControllerConfig,
    state: LocomotionState,
    controller: LocomotionController,
    intent: MovementIntent,
    frame: MovementFrame,
    motor: LocomotionMotor,
    stamina_empty: bool,
}

/// Resolve and apply movement for every agent.
///
/// Applies the resolver's velocity, acceleration and friction, the ground
/// spring when enabled and the capsule for the current stance.
pub fn apply_movement<B: LocomotionBackend>(world: &mut World) {
    let dt = fixed_delta::<B>(world);
    let gravity = B::get_gravity(world);

    let agents: Vec<MovementAgent> = world
        .query::<(
            Entity,
            &ControllerConfig,
            &LocomotionState,
            &LocomotionController,
            &MovementIntent,
            Option<&MovementFrame>,
            &LocomotionMotor,
            Option<&Stamina>,
        )>()
        .iter(world)
        .map(
            |(entity, config, state, controller, intent, frame, motor, stamina)| MovementAgent {
                entity,
                config: config.sanitized(),
                state: *state,
                controller: controller.clone(),
                intent: intent.clone(),
                frame: frame.copied().unwrap_or_default(),
                motor: motor.clone(),
                stamina_empty: stamina.is_some_and(|s| s.is_empty()),
            },
        )
        .collect();

    for mut agent in agents {
        let entity = agent.entity;
        let body_rotation = B::get_rotation(world, entity);
        let velocity = B::get_velocity(world, entity);

        let input = ResolveInput {
            config: &agent.config,
            state: &agent.state,
            snapshot: &agent.controller.snapshot,
            intent: &agent.intent,
            frame: agent.frame.rotation(world, body_rotation),
            velocity,
            gravity,
            dt,
            stamina_empty: agent.stamina_empty,
        };
        let command = resolve(&input, &mut agent.motor);

        apply_friction::<B>(world, entity, &mut agent.motor, command.friction);

        if let Some(velocity) = command.velocity {
            B::set_velocity(world, entity, velocity);
        }
        if command.acceleration != Vec3::ZERO {
            B::add_force(world, entity, command.acceleration, ForceMode::Acceleration);
        }

        let spring = agent.config.ground.spring;
        if spring.enabled && agent.state.is_grounded && !command.hold {
            if let Some(ground) = agent.controller.snapshot.ground {
                let ground_velocity = ground
                    .body
                    .map(|body| B::get_velocity(world, body))
                    .unwrap_or(Vec3::ZERO);
                let force = ground_spring_force(
                    &spring,
                    agent.config.ground.direction,
                    ground.distance + agent.config.ground.radius,
                    agent.controller.bottom_offset,
                    B::get_velocity(world, entity),
                    ground_velocity,
                );
                B::add_force(world, entity, force, spring.mode);
            }
        }

        let shape = agent
            .config
            .stance_shape(agent.state.is_crouched, agent.state.is_prone);
        let stance_changed = shape != agent.controller.current_shape(&agent.config);
        if stance_changed {
            debug!("{entity} stance capsule {shape:?}");
            B::set_capsule(world, entity, shape);
        }

        if let Some(mut motor) = world.get_mut::<LocomotionMotor>(entity) {
            *motor = agent.motor;
        }
        if stance_changed {
            if let Some(mut controller) = world.get_mut::<LocomotionController>(entity) {
                controller.applied_shape = Some(shape);
            }
        }
    }
}

fn apply_friction<B: LocomotionBackend>(
    world: &mut World,
    entity: Entity,
    motor: &mut LocomotionMotor,
    command: FrictionCommand,
) {
    if command == FrictionCommand::Keep {
        return;
    }
    if !motor.is_friction_cached() {
        match B::get_friction(world, entity) {
            Some(friction) => motor.cache_friction(friction),
            None => {
                warn_once!("{entity} has no friction material, slope sliding keeps friction");
                return;
            }
        }
    }
    let friction = match command {
        FrictionCommand::Sliding => Some(SurfaceFriction::SLIDING),
        _ => motor.cached_friction(),
    };
    if let Some(friction) = friction {
        B::set_friction(world, entity, friction);
    }
}

/// Push agents over low ledges while they are in contact with them.
pub fn apply_step_assist<B: LocomotionBackend>(world: &mut World) {
    let dt = fixed_delta::<B>(world);

    let mut corrections = Vec::new();
    let mut q = world.query::<(
        Entity,
        &ControllerConfig,
        &LocomotionState,
        &LocomotionController,
        &mut StepAssist,
    )>();
    for (entity, config, state, controller, mut assist) in q.iter_mut(world) {
        let config = config.sanitized();
        let speed = effective_speed(&config, state);
        let step = &controller.snapshot.step;
        let up = step.projected_climb.try_normalize().unwrap_or(Vec3::Y);
        let correction = assist.correction(step, &config.step, speed, up, dt);
        if !correction.is_zero() {
            corrections.push((entity, correction));
        }
    }

    for (entity, correction) in corrections {
        if correction.translation != Vec3::ZERO {
            let position = B::get_position(world, entity);
            B::set_position(world, entity, position + correction.translation);
        }
        if correction.acceleration != Vec3::ZERO {
            B::add_force(world, entity, correction.acceleration, ForceMode::Acceleration);
        }
    }
}

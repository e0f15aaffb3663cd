//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

use crate::backend::{
    CapsuleShape, ForceMode, FrictionCombine, LocomotionBackend, LocomotionGravity, PhysicsQuery,
    SurfaceFriction,
};
use crate::collision::CollisionData;
use crate::config::ControllerConfig;
use crate::controller::LocomotionController;
use crate::jump::JumpController;
use crate::movement::LocomotionMotor;
use crate::state::LocomotionState;
use crate::step::StepAssist;
use crate::systems::sense_agent;
use crate::LocomotionSet;

/// Rapier3D physics backend for the locomotion controller.
///
/// This backend uses `bevy_rapier3d` for force application and velocity
/// manipulation. The probes are cast by a dedicated sensing system that
/// receives the Rapier context as a system parameter.
pub struct Rapier3dBackend;

impl LocomotionBackend for Rapier3dBackend {
    fn plugin() -> impl Plugin {
        Rapier3dBackendPlugin
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Velocity>(entity)
            .map(|v| v.linvel)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            vel.linvel = velocity;
        }
    }

    fn add_force(world: &mut World, entity: Entity, force: Vec3, mode: ForceMode) {
        match mode {
            // Accumulated on the controller and written to ExternalForce in FinalApplication
            ForceMode::Force => {
                if let Some(mut controller) = world.get_mut::<LocomotionController>(entity) {
                    controller.add_force(force);
                }
            }
            ForceMode::Acceleration => {
                let mass = Self::get_mass(world, entity);
                if let Some(mut controller) = world.get_mut::<LocomotionController>(entity) {
                    controller.add_force(force * mass);
                }
            }
            ForceMode::Impulse => {
                if let Some(mut ext_impulse) = world.get_mut::<ExternalImpulse>(entity) {
                    ext_impulse.impulse += force;
                } else {
                    // Fallback: apply as velocity change if no ExternalImpulse component
                    let mass = Self::get_mass(world, entity);
                    if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
                        vel.linvel += force / mass;
                    }
                }
            }
            ForceMode::VelocityChange => {
                if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
                    vel.linvel += force;
                }
            }
        }
    }

    fn get_position(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Transform>(entity)
            .map(|t| t.translation)
            .or_else(|| world.get::<GlobalTransform>(entity).map(|t| t.translation()))
            .unwrap_or(Vec3::ZERO)
    }

    fn set_position(world: &mut World, entity: Entity, position: Vec3) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.translation = position;
        }
    }

    fn get_rotation(world: &World, entity: Entity) -> Quat {
        world
            .get::<Transform>(entity)
            .map(|t| t.rotation)
            .or_else(|| {
                world.get::<GlobalTransform>(entity).map(|t| {
                    let (_, rotation, _) = t.to_scale_rotation_translation();
                    rotation
                })
            })
            .unwrap_or(Quat::IDENTITY)
    }

    fn get_mass(world: &World, entity: Entity) -> f32 {
        match world.get::<ReadMassProperties>(entity) {
            Some(props) if props.mass > 0.0 && props.mass.is_finite() => props.mass,
            Some(_) => 1.0,
            None => {
                warn_once!("{entity} has no ReadMassProperties, assuming unit mass");
                1.0
            }
        }
    }

    fn get_bottom_offset(world: &World, entity: Entity) -> f32 {
        world
            .get::<Collider>(entity)
            .map(collider_bottom_offset)
            .unwrap_or(0.0)
    }

    fn get_friction(world: &World, entity: Entity) -> Option<SurfaceFriction> {
        match world.get::<Friction>(entity) {
            Some(friction) => Some(from_rapier_friction(friction)),
            None => world
                .get::<Collider>(entity)
                .map(|_| from_rapier_friction(&Friction::default())),
        }
    }

    fn set_friction(world: &mut World, entity: Entity, friction: SurfaceFriction) {
        let value = to_rapier_friction(friction);
        if let Some(mut current) = world.get_mut::<Friction>(entity) {
            let changed = current.coefficient != value.coefficient
                || current.combine_rule != value.combine_rule;
            if changed {
                *current = value;
            }
        } else if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
            entity_mut.insert(value);
        }
    }

    fn set_capsule(world: &mut World, entity: Entity, shape: CapsuleShape) {
        match world.get_entity_mut(entity) {
            Ok(mut entity_mut) => {
                entity_mut.insert(Collider::capsule_y(shape.half_segment(), shape.radius));
            }
            Err(_) => warn_once!("{entity} despawned before its stance capsule was applied"),
        }
    }
}

fn from_rapier_friction(friction: &Friction) -> SurfaceFriction {
    let combine = match friction.combine_rule {
        CoefficientCombineRule::Min => FrictionCombine::Min,
        CoefficientCombineRule::Multiply => FrictionCombine::Multiply,
        CoefficientCombineRule::Max => FrictionCombine::Max,
        _ => FrictionCombine::Average,
    };
    SurfaceFriction {
        static_friction: friction.coefficient,
        dynamic_friction: friction.coefficient,
        combine,
    }
}

/// Rapier has a single friction coefficient; the dynamic value is used.
fn to_rapier_friction(friction: SurfaceFriction) -> Friction {
    let combine_rule = match friction.combine {
        FrictionCombine::Average => CoefficientCombineRule::Average,
        FrictionCombine::Min => CoefficientCombineRule::Min,
        FrictionCombine::Multiply => CoefficientCombineRule::Multiply,
        FrictionCombine::Max => CoefficientCombineRule::Max,
    };
    Friction {
        coefficient: friction.dynamic_friction,
        combine_rule,
    }
}

/// Plugin that sets up Rapier3D-specific systems for the locomotion controller.
pub struct Rapier3dBackendPlugin;

impl Plugin for Rapier3dBackendPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, sync_rapier_gravity.in_set(LocomotionSet::Intent));
        app.add_systems(Update, rapier_sense.in_set(LocomotionSet::Sensors));

        // Preparation: clear forces from the previous step
        app.add_systems(
            FixedUpdate,
            clear_controller_forces.in_set(LocomotionSet::Preparation),
        );
        app.add_systems(
            FixedUpdate,
            rapier_step_contacts.in_set(LocomotionSet::Contacts),
        );
        // Final application: write accumulated forces to the body
        app.add_systems(
            FixedUpdate,
            apply_controller_forces.in_set(LocomotionSet::FinalApplication),
        );
    }
}

/// Get the distance from collider center to bottom for a given collider.
/// For capsules, this is half_height + radius.
pub fn collider_bottom_offset(collider: &Collider) -> f32 {
    if let Some(capsule) = collider.as_capsule() {
        // For capsule_y(half_height, radius), the segment endpoints are at y = ±half_height
        let segment = capsule.segment();
        let half_height = (segment.a().y - segment.b().y).abs() / 2.0;
        half_height + capsule.radius()
    } else if let Some(ball) = collider.as_ball() {
        ball.radius()
    } else if let Some(cuboid) = collider.as_cuboid() {
        cuboid.half_extents().y
    } else {
        0.0
    }
}

/// [`PhysicsQuery`] over a Rapier context, excluding the agent's own body.
pub struct RapierQuery<'a> {
    context: &'a RapierContext<'a>,
    filter: QueryFilter<'a>,
}

impl<'a> RapierQuery<'a> {
    pub fn new(
        context: &'a RapierContext<'a>,
        agent: Entity,
        groups: Option<CollisionGroups>,
    ) -> Self {
        let mut filter = QueryFilter::default()
            .exclude_rigid_body(agent)
            .exclude_sensors();
        if let Some(groups) = groups {
            filter = filter.groups(groups);
        }
        Self { context, filter }
    }
}

impl PhysicsQuery for RapierQuery<'_> {
    fn sphere_cast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
    ) -> Option<CollisionData> {
        let shape = Collider::ball(radius);
        let options = ShapeCastOptions {
            max_time_of_impact: max_distance,
            stop_at_penetration: false,
            ..default()
        };
        self.context
            .cast_shape(origin, Quat::IDENTITY, direction, &shape, options, self.filter)
            .map(|(hit_entity, hit)| {
                let normal = hit.details.map(|d| d.normal1).unwrap_or(-direction);
                let point = hit
                    .details
                    .map(|d| d.witness1)
                    .unwrap_or(origin + direction * (hit.time_of_impact + radius));
                CollisionData::new(hit.time_of_impact, normal, point, Some(hit_entity))
            })
    }

    fn ray_cast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<CollisionData> {
        self.context
            .cast_ray_and_get_normal(origin, direction, max_distance, true, self.filter)
            .map(|(hit_entity, intersection)| {
                let point = origin + direction * intersection.time_of_impact;
                CollisionData::new(
                    intersection.time_of_impact,
                    intersection.normal,
                    point,
                    Some(hit_entity),
                )
            })
    }
}

/// Rigid body owning a collider: the collider itself or its parent.
fn rigid_body_of(
    collider: Entity,
    bodies: &Query<(), With<RigidBody>>,
    parents: &Query<&ChildOf>,
) -> Option<Entity> {
    if bodies.contains(collider) {
        return Some(collider);
    }
    parents
        .get(collider)
        .ok()
        .map(|child_of| child_of.parent())
        .filter(|parent| bodies.contains(*parent))
}

/// Mirror the Rapier gravity into [`LocomotionGravity`].
fn sync_rapier_gravity(
    q: Query<&RapierConfiguration, With<DefaultRapierContext>>,
    mut gravity: ResMut<LocomotionGravity>,
) {
    if let Ok(config) = q.single() {
        if gravity.0 != config.gravity {
            gravity.0 = config.gravity;
        }
    }
}

/// Rapier-specific sensing system.
///
/// Casts every probe for every agent and stores the snapshot on its
/// [`LocomotionController`]. Agents without a collider are skipped.
#[allow(clippy::type_complexity)]
fn rapier_sense(
    rapier_context: ReadRapierContext,
    mut q: Query<(
        Entity,
        &GlobalTransform,
        &ControllerConfig,
        &mut LocomotionController,
        &LocomotionMotor,
        &LocomotionState,
        &JumpController,
        Option<&Collider>,
        Option<&CollisionGroups>,
    )>,
    bodies: Query<(), With<RigidBody>>,
    parents: Query<&ChildOf>,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };

    for (entity, transform, config, mut controller, motor, state, jump, collider, groups) in
        &mut q
    {
        let Some(collider) = collider else {
            warn_once!("{entity} has no Collider, locomotion probes skipped");
            continue;
        };

        let (_, rotation, position) = transform.to_scale_rotation_translation();
        let query = RapierQuery::new(&context, entity, groups.copied());
        sense_agent(
            &query,
            config,
            &mut controller,
            motor,
            state,
            jump,
            position,
            rotation,
            collider_bottom_offset(collider),
        );

        if let Some(ground) = controller.snapshot.ground.as_mut() {
            ground.body = ground
                .entity
                .and_then(|hit| rigid_body_of(hit, &bodies, &parents));
        }
    }
}

/// Colliders an agent is currently touching.
///
/// Fed by Rapier collision events; requires [`ActiveEvents::COLLISION_EVENTS`]
/// on the agent's collider.
#[derive(Component, Debug, Clone, Default)]
pub struct StepContacts {
    touching: Vec<Entity>,
}

impl StepContacts {
    pub fn is_touching(&self) -> bool {
        !self.touching.is_empty()
    }

    fn begin(&mut self, other: Entity) {
        if !self.touching.contains(&other) {
            self.touching.push(other);
        }
    }

    fn end(&mut self, other: Entity) {
        self.touching.retain(|e| *e != other);
    }
}

/// Feed collision begin, stay and end into the step assist.
fn rapier_step_contacts(
    mut collisions: EventReader<CollisionEvent>,
    mut q: Query<(&mut StepContacts, &mut StepAssist, &LocomotionController)>,
) {
    for event in collisions.read() {
        let (e1, e2, started) = match event {
            CollisionEvent::Started(e1, e2, _) => (*e1, *e2, true),
            CollisionEvent::Stopped(e1, e2, _) => (*e1, *e2, false),
        };
        for (agent, other) in [(e1, e2), (e2, e1)] {
            let Ok((mut contacts, mut assist, controller)) = q.get_mut(agent) else {
                continue;
            };
            if started {
                contacts.begin(other);
                assist.on_contact_begin(controller.snapshot.step.state);
            } else {
                contacts.end(other);
                if !contacts.is_touching() {
                    assist.on_contact_end();
                }
            }
        }
    }

    for (contacts, mut assist, controller) in &mut q {
        if contacts.is_touching() {
            assist.on_contact_stay(controller.snapshot.step.state);
        }
    }
}

/// Clear controller forces at the start of each fixed step.
///
/// Subtracts the force we applied last step from ExternalForce so that
/// external user forces are preserved while ours are isolated between steps.
pub fn clear_controller_forces(mut q: Query<(&mut ExternalForce, &mut LocomotionController)>) {
    for (mut ext_force, mut controller) in &mut q {
        let force_to_subtract = controller.prepare_new_frame();
        ext_force.force -= force_to_subtract;
    }
}

/// Apply controller forces at the end of each fixed step.
///
/// Adds the accumulated force to ExternalForce and remembers it for the next
/// step's subtraction.
pub fn apply_controller_forces(mut q: Query<(&mut ExternalForce, &mut LocomotionController)>) {
    for (mut ext_force, mut controller) in &mut q {
        let force_to_apply = controller.finalize_frame();
        ext_force.force += force_to_apply;
    }
}

/// Bundle for creating a locomotion agent with Rapier3D physics.
///
/// This bundle provides the Rapier3D components the controller writes to: the
/// dynamic body, velocity, external force and impulse, locked rotation,
/// damping, mass properties, a friction material and collision events for the
/// step assist.
///
/// # Example
///
/// ```ignore
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use rigid_locomotion::prelude::*;
///
/// fn spawn_player(mut commands: Commands) {
///     commands.spawn((
///         Transform::from_xyz(0.0, 2.0, 0.0),
///         LocomotionController::new(),
///         ControllerConfig::player(),
///         Rapier3dLocomotionBundle::new(),
///         Collider::capsule_y(0.5, 0.5),
///     ));
/// }
/// ```
///
/// # Defaults
///
/// - `rigid_body`: [`RigidBody::Dynamic`]
/// - `locked_axes`: [`LockedAxes::ROTATION_LOCKED`], agents stay upright
/// - `damping`: Linear 0.0, Angular 1.0 (the resolver does the smoothing)
/// - `active_events`: [`ActiveEvents::COLLISION_EVENTS`]
#[derive(Bundle)]
pub struct Rapier3dLocomotionBundle {
    pub rigid_body: RigidBody,
    pub velocity: Velocity,
    /// Accumulated forces. Controller forces are isolated between steps.
    pub external_force: ExternalForce,
    /// Jump impulses.
    pub external_impulse: ExternalImpulse,
    pub locked_axes: LockedAxes,
    pub damping: Damping,
    /// Rapier updates this from the collider. Jump impulses scale with it.
    pub mass_properties: ReadMassProperties,
    /// Cached by the controller and zeroed during unlocked slope slides.
    pub friction: Friction,
    pub active_events: ActiveEvents,
    pub contacts: StepContacts,
}

impl Default for Rapier3dLocomotionBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl Rapier3dLocomotionBundle {
    pub fn new() -> Self {
        Self {
            rigid_body: RigidBody::Dynamic,
            velocity: Velocity::default(),
            external_force: ExternalForce::default(),
            external_impulse: ExternalImpulse::default(),
            locked_axes: LockedAxes::ROTATION_LOCKED,
            damping: Damping {
                linear_damping: 0.0,
                angular_damping: 1.0,
            },
            mass_properties: ReadMassProperties::default(),
            friction: Friction::default(),
            active_events: ActiveEvents::COLLISION_EVENTS,
            contacts: StepContacts::default(),
        }
    }

    /// Set the rigid body type.
    pub fn with_body(mut self, body: RigidBody) -> Self {
        self.rigid_body = body;
        self
    }

    /// Set the damping coefficients.
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.damping = Damping {
            linear_damping: linear,
            angular_damping: angular,
        };
        self
    }

    /// Set the friction material.
    pub fn with_friction(mut self, coefficient: f32) -> Self {
        self.friction = Friction::coefficient(coefficient);
        self
    }
}

//! Shared harness for the integration tests.
//!
//! [`TestBackend`] drives a plain [`TestBody`] component with a small
//! explicit integrator, and [`TestScene`] answers the probes analytically
//! from a list of planes and boxes. Tests step the schedules by hand, so
//! every tick is exactly one sensing step followed by one fixed step.

#![allow(dead_code)]

use bevy::prelude::*;
use rigid_locomotion::backend::FrictionCombine;
use rigid_locomotion::prelude::*;
use rigid_locomotion::systems::sense_agent;

pub const DT: f32 = 1.0 / 60.0;

/// Kinematic state of a test agent.
#[derive(Component, Debug, Clone)]
pub struct TestBody {
    pub velocity: Vec3,
    pub rotation: Quat,
    pub mass: f32,
    pub friction: Option<SurfaceFriction>,
    pub shape: CapsuleShape,
    /// Continuous forces for the current step.
    pub force: Vec3,
    /// Impulses for the current step.
    pub impulse: Vec3,
}

impl Default for TestBody {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            mass: 1.0,
            friction: Some(SurfaceFriction {
                static_friction: 0.6,
                dynamic_friction: 0.6,
                combine: FrictionCombine::Average,
            }),
            shape: StanceConfig::default().standing,
            force: Vec3::ZERO,
            impulse: Vec3::ZERO,
        }
    }
}

/// Static geometry: infinite planes and axis-aligned boxes.
#[derive(Resource, Default)]
pub struct TestScene {
    pub planes: Vec<(Vec3, Vec3, Entity)>,
    pub boxes: Vec<(Vec3, Vec3, Entity)>,
}

impl TestScene {
    /// Height of the highest flat plane, if any.
    pub fn floor_height(&self) -> Option<f32> {
        self.planes
            .iter()
            .filter(|(_, n, _)| n.y > 0.99)
            .map(|(p, _, _)| p.y)
            .reduce(f32::max)
    }

    /// Whether a capsule at `position` touches the side of a box.
    pub fn touches_box(&self, position: Vec3, shape: CapsuleShape) -> bool {
        let feet = position.y - shape.bottom_offset();
        let head = position.y + shape.bottom_offset();
        self.boxes.iter().any(|&(min, max, _)| {
            let dx = (min.x - position.x).max(position.x - max.x).max(0.0);
            let dz = (min.z - position.z).max(position.z - max.z).max(0.0);
            let horizontal = (dx * dx + dz * dz).sqrt();
            horizontal <= shape.radius + 0.01 && feet < max.y && head > min.y
        })
    }

    fn cast(&self, origin: Vec3, radius: f32, dir: Vec3, max: f32) -> Option<CollisionData> {
        let planes = self.planes.iter().filter_map(|&(p, n, id)| {
            let denom = -n.dot(dir);
            let gap = n.dot(origin - p) - radius;
            if denom <= 1e-6 || gap < 0.0 {
                return None;
            }
            let t = gap / denom;
            (t <= max).then(|| CollisionData::new(t, n, origin + dir * t - n * radius, Some(id)))
        });
        let boxes = self.boxes.iter().filter_map(|&(min, max_corner, id)| {
            let margin = Vec3::splat(radius);
            let (t, n) = slab(origin, dir, min - margin, max_corner + margin)?;
            (t <= max).then(|| CollisionData::new(t, n, origin + dir * t - n * radius, Some(id)))
        });
        planes
            .chain(boxes)
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

fn slab(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<(f32, Vec3)> {
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut normal = Vec3::ZERO;
    for axis in 0..3 {
        let (o, d) = (origin[axis], dir[axis]);
        if d.abs() < 1e-8 {
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }
        let t1 = (min[axis] - o) / d;
        let t2 = (max[axis] - o) / d;
        let (near, far) = if t1 < t2 { (t1, t2) } else { (t2, t1) };
        if near > t_enter {
            t_enter = near;
            normal = Vec3::ZERO;
            normal[axis] = -d.signum();
        }
        t_exit = t_exit.min(far);
    }
    (t_enter >= 0.0 && t_enter <= t_exit).then_some((t_enter, normal))
}

impl PhysicsQuery for TestScene {
    fn sphere_cast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
    ) -> Option<CollisionData> {
        self.cast(origin, radius, direction, max_distance)
    }

    fn ray_cast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<CollisionData> {
        self.cast(origin, 0.0, direction, max_distance)
    }
}

/// Backend over [`TestBody`] and [`Transform`].
pub struct TestBackend;

impl LocomotionBackend for TestBackend {
    fn plugin() -> impl Plugin {
        TestBackendPlugin
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<TestBody>(entity)
            .map(|b| b.velocity)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.velocity = velocity;
        }
    }

    fn add_force(world: &mut World, entity: Entity, force: Vec3, mode: ForceMode) {
        let Some(mut body) = world.get_mut::<TestBody>(entity) else {
            return;
        };
        let mass = body.mass;
        match mode {
            ForceMode::Force => body.force += force,
            ForceMode::Acceleration => body.force += force * mass,
            ForceMode::Impulse => body.impulse += force,
            ForceMode::VelocityChange => body.velocity += force,
        }
    }

    fn get_position(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Transform>(entity)
            .map(|t| t.translation)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_position(world: &mut World, entity: Entity, position: Vec3) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.translation = position;
        }
    }

    fn get_rotation(world: &World, entity: Entity) -> Quat {
        world
            .get::<TestBody>(entity)
            .map(|b| b.rotation)
            .unwrap_or(Quat::IDENTITY)
    }

    fn get_mass(world: &World, entity: Entity) -> f32 {
        world.get::<TestBody>(entity).map(|b| b.mass).unwrap_or(1.0)
    }

    fn get_bottom_offset(world: &World, entity: Entity) -> f32 {
        world
            .get::<TestBody>(entity)
            .map(|b| b.shape.bottom_offset())
            .unwrap_or(0.0)
    }

    fn get_friction(world: &World, entity: Entity) -> Option<SurfaceFriction> {
        world.get::<TestBody>(entity).and_then(|b| b.friction)
    }

    fn set_friction(world: &mut World, entity: Entity, friction: SurfaceFriction) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.friction = Some(friction);
        }
    }

    fn set_capsule(world: &mut World, entity: Entity, shape: CapsuleShape) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.shape = shape;
        }
    }
}

pub struct TestBackendPlugin;

impl Plugin for TestBackendPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TestScene>();
        app.add_systems(Update, test_sense.in_set(LocomotionSet::Sensors));
        app.add_systems(FixedUpdate, test_contacts.in_set(LocomotionSet::Contacts));
        app.add_systems(FixedUpdate, integrate.after(LocomotionSet::FinalApplication));
    }
}

fn test_sense(
    scene: Res<TestScene>,
    mut q: Query<(
        &Transform,
        &TestBody,
        &ControllerConfig,
        &mut LocomotionController,
        &rigid_locomotion::movement::LocomotionMotor,
        &LocomotionState,
        &JumpController,
    )>,
) {
    for (transform, body, config, mut controller, motor, state, jump) in &mut q {
        sense_agent(
            &*scene,
            config,
            &mut controller,
            motor,
            state,
            jump,
            transform.translation,
            body.rotation,
            body.shape.bottom_offset(),
        );
    }
}

fn test_contacts(
    scene: Res<TestScene>,
    mut q: Query<(&Transform, &TestBody, &LocomotionController, &mut StepAssist)>,
) {
    for (transform, body, controller, mut assist) in &mut q {
        if scene.touches_box(transform.translation, body.shape) {
            assist.on_contact_stay(controller.snapshot.step.state);
        } else {
            assist.on_contact_end();
        }
    }
}

/// Explicit Euler with gravity and a hard floor.
fn integrate(
    scene: Res<TestScene>,
    gravity: Res<LocomotionGravity>,
    mut q: Query<(&mut Transform, &mut TestBody)>,
) {
    for (mut transform, mut body) in &mut q {
        let mass = body.mass;
        let acceleration = gravity.0 + body.force / mass;
        let impulse = body.impulse / mass;
        body.velocity += acceleration * DT + impulse;
        transform.translation += body.velocity * DT;

        if let Some(floor) = scene.floor_height() {
            let rest = floor + body.shape.bottom_offset();
            if transform.translation.y < rest {
                transform.translation.y = rest;
                body.velocity.y = body.velocity.y.max(0.0);
            }
        }

        body.force = Vec3::ZERO;
        body.impulse = Vec3::ZERO;
    }
}

pub fn create_test_app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.add_plugins(LocomotionPlugin::<TestBackend>::default());
    app.finish();
    app.cleanup();
    app
}

/// Add a flat floor at height `y`.
pub fn spawn_floor(app: &mut App, y: f32) -> Entity {
    let id = app.world_mut().spawn(Name::new("floor")).id();
    app.world_mut()
        .resource_mut::<TestScene>()
        .planes
        .push((Vec3::new(0.0, y, 0.0), Vec3::Y, id));
    id
}

/// Add an axis-aligned box.
pub fn spawn_box(app: &mut App, min: Vec3, max: Vec3) -> Entity {
    let id = app.world_mut().spawn(Name::new("box")).id();
    app.world_mut()
        .resource_mut::<TestScene>()
        .boxes
        .push((min, max, id));
    id
}

pub fn remove_floor(app: &mut App) {
    app.world_mut().resource_mut::<TestScene>().planes.clear();
}

/// Spawn an agent resting with its standing capsule at `position`.
pub fn spawn_agent(app: &mut App, position: Vec3, config: ControllerConfig) -> Entity {
    app.world_mut()
        .spawn((
            Transform::from_translation(position),
            TestBody::default(),
            LocomotionController::new(),
            config,
        ))
        .id()
}

/// One sensing step followed by one fixed step.
pub fn tick(app: &mut App) {
    app.world_mut().run_schedule(Update);
    app.world_mut().run_schedule(FixedUpdate);
}

pub fn tick_n(app: &mut App, n: u32) {
    for _ in 0..n {
        tick(app);
    }
}

pub fn drain_events(app: &mut App) -> Vec<LocomotionEvent> {
    app.world_mut()
        .resource_mut::<Events<LocomotionEvent>>()
        .drain()
        .collect()
}

pub fn intent_mut(app: &mut App, entity: Entity) -> Mut<'_, MovementIntent> {
    app.world_mut()
        .get_mut::<MovementIntent>(entity)
        .expect("agent has an intent")
}

pub fn body(app: &App, entity: Entity) -> TestBody {
    app.world()
        .get::<TestBody>(entity)
        .cloned()
        .expect("agent has a body")
}

pub fn position(app: &App, entity: Entity) -> Vec3 {
    app.world()
        .get::<Transform>(entity)
        .map(|t| t.translation)
        .expect("agent has a transform")
}

pub fn horizontal_speed(velocity: Vec3) -> f32 {
    Vec2::new(velocity.x, velocity.z).length()
}

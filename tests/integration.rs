//! Integration tests for the locomotion controller.
//!
//! These tests run the complete plugin against an analytic test backend.
//! Each test produces PROOF through explicit velocity, event and state checks.

mod common;

use bevy::prelude::*;
use common::*;
use rigid_locomotion::prelude::*;

fn jumps_started(events: &[LocomotionEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, LocomotionEvent::JumpStarted { .. }))
        .count()
}

fn landed(events: &[LocomotionEvent]) -> bool {
    events
        .iter()
        .any(|e| matches!(e, LocomotionEvent::Landed { .. }))
}

// ==================== Ground Movement Tests ====================

mod movement_tests {
    use super::*;

    #[test]
    fn resting_agent_is_grounded() {
        let mut app = create_test_app();
        spawn_floor(&mut app, 0.0);
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, 0.0), ControllerConfig::default());

        tick(&mut app);

        let state = app.world().get::<LocomotionState>(agent).unwrap();
        let controller = app.world().get::<LocomotionController>(agent).unwrap();
        println!(
            "PROOF: is_grounded={}, ground={:?}",
            state.is_grounded, controller.snapshot.ground
        );
        assert!(state.is_grounded);
        assert!(app.world().get::<Grounded>(agent).is_some());
        assert!(landed(&drain_events(&mut app)));
    }

    #[test]
    fn agent_over_empty_space_is_airborne() {
        let mut app = create_test_app();
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, 0.0), ControllerConfig::default());

        tick(&mut app);

        assert!(!app.world().get::<LocomotionState>(agent).unwrap().is_grounded);
        assert!(app.world().get::<Airborne>(agent).is_some());
        assert!(drain_events(&mut app).is_empty());
    }

    #[test]
    fn grounded_speed_never_exceeds_target() {
        let mut app = create_test_app();
        spawn_floor(&mut app, 0.0);
        let config = ControllerConfig::default();
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, 0.0), config);

        intent_mut(&mut app, agent).move_axis(Vec2::Y);

        let mut peak: f32 = 0.0;
        for _ in 0..120 {
            tick(&mut app);
            peak = peak.max(horizontal_speed(body(&app, agent).velocity));
        }

        let velocity = body(&app, agent).velocity;
        println!("PROOF: peak={peak}, final={velocity:?}");
        assert!(peak <= config.movement.speed + 1e-3);
        assert!(horizontal_speed(velocity) > config.movement.speed * 0.95);
        // +y on the axis moves along world -Z
        assert!(velocity.z < 0.0);
        assert!(velocity.x.abs() < 1e-3);
    }

    #[test]
    fn releasing_input_slows_to_rest() {
        let mut app = create_test_app();
        spawn_floor(&mut app, 0.0);
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, 0.0), ControllerConfig::default());

        intent_mut(&mut app, agent).move_axis(Vec2::X);
        tick_n(&mut app, 60);
        let moving = horizontal_speed(body(&app, agent).velocity);

        intent_mut(&mut app, agent).move_axis(Vec2::ZERO);
        tick_n(&mut app, 60);
        let resting = horizontal_speed(body(&app, agent).velocity);

        println!("PROOF: moving={moving}, resting={resting}");
        assert!(moving > 5.0);
        assert!(resting < 0.05);
    }

    #[test]
    fn root_motion_drives_velocity() {
        let mut app = create_test_app();
        spawn_floor(&mut app, 0.0);
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, 0.0), ControllerConfig::default());

        intent_mut(&mut app, agent).move_root_motion(Vec3::NEG_Z, Vec3::new(0.0, 0.0, -3.0));
        tick_n(&mut app, 2);

        let velocity = body(&app, agent).velocity;
        println!("PROOF: root motion velocity={velocity:?}");
        assert!((velocity.z + 3.0).abs() < 1e-4);
        assert!(velocity.x.abs() < 1e-4);
    }

    #[test]
    fn root_motion_clamped_to_speed() {
        let mut app = create_test_app();
        spawn_floor(&mut app, 0.0);
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, 0.0), ControllerConfig::default());

        intent_mut(&mut app, agent).move_root_motion(Vec3::X, Vec3::new(30.0, 0.0, 0.0));
        tick_n(&mut app, 2);

        let speed = horizontal_speed(body(&app, agent).velocity);
        assert!((speed - 10.0).abs() < 1e-3, "speed {speed}");
    }

    #[test]
    fn empty_stamina_suppresses_movement() {
        let mut app = create_test_app();
        spawn_floor(&mut app, 0.0);
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, 0.0), ControllerConfig::default());
        app.world_mut()
            .entity_mut(agent)
            .insert(Stamina::new(100.0).with_value(0.0));

        intent_mut(&mut app, agent).move_axis(Vec2::Y);
        tick_n(&mut app, 60);

        let speed = horizontal_speed(body(&app, agent).velocity);
        println!("PROOF: speed with empty stamina={speed}");
        assert!(speed < 0.15);
    }

    #[test]
    fn body_frame_rotates_input() {
        let mut app = create_test_app();
        spawn_floor(&mut app, 0.0);
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, 0.0), ControllerConfig::default());
        {
            let mut entity = app.world_mut().entity_mut(agent);
            entity.insert(MovementFrame::Body);
            // Facing +X
            entity.get_mut::<TestBody>().unwrap().rotation =
                Quat::from_rotation_y(-std::f32::consts::FRAC_PI_2);
        }

        intent_mut(&mut app, agent).move_axis(Vec2::Y);
        tick_n(&mut app, 60);

        let velocity = body(&app, agent).velocity;
        println!("PROOF: body frame velocity={velocity:?}");
        assert!(velocity.x > 5.0);
        assert!(velocity.z.abs() < 1e-2);
    }
}

// ==================== Jump Tests ====================

mod jump_tests {
    use super::*;

    #[test]
    fn jump_fires_after_windup_and_lands() {
        let mut app = create_test_app();
        spawn_floor(&mut app, 0.0);
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, 0.0), ControllerConfig::default());

        tick(&mut app);
        drain_events(&mut app);

        intent_mut(&mut app, agent).jump(1.0);
        tick_n(&mut app, 3);
        // Still winding up
        assert_eq!(jumps_started(&drain_events(&mut app)), 0);
        assert!(app.world().get::<JumpController>(agent).unwrap().windup_pending());

        tick_n(&mut app, 7);
        let events = drain_events(&mut app);
        println!("PROOF: events after windup={events:?}");
        assert_eq!(
            events
                .iter()
                .find(|e| matches!(e, LocomotionEvent::JumpStarted { .. })),
            Some(&LocomotionEvent::JumpStarted {
                entity: agent,
                impulse: Vec3::Y * 10.0,
            })
        );

        let mut apex: f32 = 0.0;
        let mut came_back = false;
        for _ in 0..200 {
            tick(&mut app);
            apex = apex.max(position(&app, agent).y);
            if landed(&drain_events(&mut app)) {
                came_back = true;
                break;
            }
        }

        println!("PROOF: apex={apex}, landed={came_back}");
        assert!(apex > 5.0);
        assert!(came_back);
        let jump = app.world().get::<JumpController>(agent).unwrap();
        assert_eq!(jump.count, 0);
        assert!(!jump.is_jumping);
    }

    #[test]
    fn jump_count_bounded_by_max() {
        let mut app = create_test_app();
        spawn_floor(&mut app, 0.0);
        let config = ControllerConfig::default()
            .with_jump(10.0, 2)
            .with_jump_memory(1.0);
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, 0.0), config);
        tick(&mut app);

        let mut started = 0;
        for _ in 0..3 {
            intent_mut(&mut app, agent).jump(1.0);
            tick_n(&mut app, 10);
            started += jumps_started(&drain_events(&mut app));
        }

        let jump = app.world().get::<JumpController>(agent).unwrap();
        println!("PROOF: started={started}, count={}", jump.count);
        assert_eq!(started, 2);
        assert_eq!(jump.count, 2);
    }

    #[test]
    fn jump_memory_allows_late_jump() {
        let mut app = create_test_app();
        spawn_floor(&mut app, 0.0);
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, 0.0), ControllerConfig::player());
        tick(&mut app);

        // Walk off the edge
        remove_floor(&mut app);
        tick(&mut app);
        assert!(app.world().get::<JumpController>(agent).unwrap().memory_pending());

        intent_mut(&mut app, agent).jump(1.0);
        tick_n(&mut app, 10);

        let started = jumps_started(&drain_events(&mut app));
        println!("PROOF: jumps started within memory={started}");
        assert_eq!(started, 1);
    }

    #[test]
    fn expired_memory_refuses_jump() {
        let mut app = create_test_app();
        spawn_floor(&mut app, 0.0);
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, 0.0), ControllerConfig::player());
        tick(&mut app);

        remove_floor(&mut app);
        tick_n(&mut app, 12);

        intent_mut(&mut app, agent).jump(1.0);
        tick_n(&mut app, 10);

        let jump = app.world().get::<JumpController>(agent).unwrap().clone();
        println!(
            "PROOF: memory_valid={}, count={}",
            jump.memory_valid, jump.count
        );
        assert_eq!(jumps_started(&drain_events(&mut app)), 0);
        assert!(!jump.memory_valid);
        assert_eq!(jump.count, jump.max_count);
    }

    #[test]
    fn paid_jump_refused_without_stamina() {
        let mut app = create_test_app();
        spawn_floor(&mut app, 0.0);
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, 0.0), ControllerConfig::default());
        app.world_mut()
            .entity_mut(agent)
            .insert(Stamina::new(100.0).with_value(20.0));
        tick(&mut app);

        let world = app.world_mut();
        let mut q = world.query::<(&mut MovementIntent, &JumpController, &mut Stamina)>();
        let (mut intent, jump, mut stamina) = q.get_mut(world, agent).unwrap();
        assert!(!intent.jump_paid(1.0, 30.0, jump, &mut *stamina));
        assert_eq!(stamina.value, 20.0);
        assert!(intent.jump_paid(1.0, 15.0, jump, &mut *stamina));
        assert_eq!(stamina.value, 5.0);

        tick_n(&mut app, 10);
        assert_eq!(jumps_started(&drain_events(&mut app)), 1);
    }
}

// ==================== Stance Tests ====================

mod stance_tests {
    use super::*;

    #[test]
    fn crouch_swaps_capsule() {
        let mut app = create_test_app();
        spawn_floor(&mut app, 0.0);
        let config = ControllerConfig::default();
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, 0.0), config);

        intent_mut(&mut app, agent).set_crouch(true);
        tick(&mut app);

        println!("PROOF: crouched shape={:?}", body(&app, agent).shape);
        assert_eq!(body(&app, agent).shape, config.stance.crouching);
        assert!(app.world().get::<LocomotionState>(agent).unwrap().is_crouched);
    }

    #[test]
    fn low_ceiling_keeps_agent_crouched() {
        let mut app = create_test_app();
        spawn_floor(&mut app, 0.0);
        let config = ControllerConfig::default();
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, 0.0), config);

        intent_mut(&mut app, agent).set_crouch(true);
        tick_n(&mut app, 60);
        let settled = position(&app, agent).y;

        spawn_box(&mut app, Vec3::new(-5.0, 1.6, -5.0), Vec3::new(5.0, 2.0, 5.0));
        intent_mut(&mut app, agent).set_crouch(false);
        tick_n(&mut app, 5);

        let controller = app.world().get::<LocomotionController>(agent).unwrap();
        println!(
            "PROOF: settled={settled}, headroom_blocked={}",
            controller.snapshot.headroom_blocked
        );
        assert!((settled - 0.6).abs() < 1e-3);
        assert!(controller.snapshot.headroom_blocked);
        assert_eq!(body(&app, agent).shape, config.stance.crouching);

        app.world_mut().resource_mut::<TestScene>().boxes.clear();
        tick_n(&mut app, 2);
        assert_eq!(body(&app, agent).shape, config.stance.standing);
        assert!(!app.world().get::<LocomotionState>(agent).unwrap().is_crouched);
    }

    #[test]
    fn sprint_uses_sprint_speed() {
        let mut app = create_test_app();
        spawn_floor(&mut app, 0.0);
        let config = ControllerConfig::default();
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, 0.0), config);

        {
            let mut intent = intent_mut(&mut app, agent);
            intent.set_sprint(true);
            intent.move_axis(Vec2::Y);
        }
        tick_n(&mut app, 120);

        let speed = horizontal_speed(body(&app, agent).velocity);
        println!("PROOF: sprint speed={speed}");
        assert!(speed > config.movement.speed + 1.0);
        assert!(speed <= config.movement.sprint_speed + 1e-3);
    }
}

// ==================== Step Assist Tests ====================

mod step_tests {
    use super::*;

    fn step_config() -> ControllerConfig {
        let mut config = ControllerConfig::default().with_speed(2.0);
        config.step.distance = 0.7;
        config
    }

    #[test]
    fn step_assist_requires_contact() {
        let mut app = create_test_app();
        spawn_floor(&mut app, 0.0);
        spawn_box(&mut app, Vec3::new(-5.0, 0.0, -3.0), Vec3::new(5.0, 0.15, -0.8));
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, 0.0), step_config());

        intent_mut(&mut app, agent).move_axis(Vec2::Y);

        let mut first_climbable = None;
        let mut first_contact = None;
        let mut engaged_ticks = 0;
        for i in 0..60 {
            tick(&mut app);
            let controller = app.world().get::<LocomotionController>(agent).unwrap();
            let assist = *app.world().get::<StepAssist>(agent).unwrap();
            if controller.snapshot.step.state == StepState::Climbable {
                first_climbable.get_or_insert(i);
            }
            if assist.contact {
                first_contact.get_or_insert(i);
            }
            if assist.engaged {
                assert!(assist.contact, "engaged without contact at tick {i}");
                engaged_ticks += 1;
            }
        }

        println!(
            "PROOF: first_climbable={first_climbable:?}, first_contact={first_contact:?}, \
             engaged_ticks={engaged_ticks}"
        );
        let climbable = first_climbable.expect("ledge seen");
        let contact = first_contact.expect("ledge touched");
        assert!(climbable < contact);
        assert!(engaged_ticks > 0);
    }

    #[test]
    fn step_rise_per_tick_bounded_by_climb_rate() {
        let mut app = create_test_app();
        spawn_floor(&mut app, 0.0);
        spawn_box(&mut app, Vec3::new(-5.0, 0.0, -3.0), Vec3::new(5.0, 0.15, -0.8));
        let config = step_config();
        let rate = config.step.smooth.clamp(1.0, config.movement.speed);
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, 0.0), config);

        intent_mut(&mut app, agent).move_axis(Vec2::Y);

        for i in 0..60 {
            let before = position(&app, agent).y;
            tick(&mut app);
            if !app.world().get::<StepAssist>(agent).unwrap().engaged {
                continue;
            }

            let rise = position(&app, agent).y - before;
            // The integrator moved the body by velocity * DT after the assist.
            let climb = rise - body(&app, agent).velocity.y * DT;
            println!("PROOF: tick {i}, rise={rise:.5}, climb={climb:.5}, bound={:.5}", rate * DT);
            assert!(rise > 0.0);
            assert!(climb > 0.0);
            assert!(climb <= rate * DT + 1e-5);
            return;
        }
        panic!("step assist never engaged");
    }

    #[test]
    fn sideways_contact_never_climbs() {
        let mut app = create_test_app();
        spawn_floor(&mut app, 0.0);
        spawn_box(&mut app, Vec3::new(-5.0, 0.0, -3.0), Vec3::new(5.0, 0.15, -0.8));
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, -0.3), step_config());

        intent_mut(&mut app, agent).move_axis(Vec2::X);

        let mut blocked = 0;
        for _ in 0..30 {
            tick(&mut app);
            let controller = app.world().get::<LocomotionController>(agent).unwrap();
            let assist = app.world().get::<StepAssist>(agent).unwrap();
            if controller.snapshot.step.state == StepState::Blocked {
                blocked += 1;
            }
            assert!(!assist.contact);
            assert!(!assist.engaged);
        }

        println!("PROOF: blocked ticks={blocked}");
        assert!(blocked > 0);
        assert!((position(&app, agent).y - 1.0).abs() < 1e-3);
    }
}

// ==================== Wall Tests ====================

mod wall_tests {
    use super::*;

    #[test]
    fn wall_marker_reports_closest_wall() {
        let mut app = create_test_app();
        spawn_floor(&mut app, 0.0);
        spawn_box(&mut app, Vec3::new(0.6, 0.0, -5.0), Vec3::new(1.0, 3.0, 5.0));
        let agent = spawn_agent(&mut app, Vec3::new(0.0, 1.0, 0.0), ControllerConfig::default());

        tick(&mut app);

        let wall = app.world().get::<TouchingWall>(agent).expect("wall marker");
        println!("PROOF: wall normal={:?}, distance={}", wall.normal, wall.distance);
        assert_eq!(wall.normal, Vec3::NEG_X);
        assert!((wall.distance - 0.6).abs() < 1e-4);
        assert!(app.world().get::<LocomotionState>(agent).unwrap().is_touching_wall);
    }
}

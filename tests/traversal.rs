// tests/traversal.rs

mod common;

use std::f32::consts::FRAC_PI_2;

use common::{yawed, ManualLoader, TestAgent};
use glam::Vec3;
use worldgate::engine_lib::anchor::WorldId;
use worldgate::engine_lib::pose::Pose;
use worldgate::engine_lib::portal_system::PortalSystem;
use worldgate::engine_lib::spawner::SpawnerConfig;
use worldgate::engine_lib::trigger::{CrossWorldExit, TriggerConfig, TriggerOutcome, EXIT_EPSILON};
use worldgate::engine_lib::world_switch::{CoordinatorConfig, LoadMode, WorldSwitchCoordinator};
use worldgate::rendering_lib::portal_rig::RigConfig;
use worldgate::rendering_lib::render_target::HeadlessTargetFactory;

fn trigger(radius: f32, exit_offset: f32) -> TriggerConfig {
    TriggerConfig {
        trigger_radius: radius,
        exit_offset,
        ..TriggerConfig::default()
    }
}

fn system() -> PortalSystem {
    PortalSystem::new(TriggerConfig::default(), RigConfig::default(), SpawnerConfig::default())
}

#[test]
fn exit_lands_outside_destination_trigger() {
    for (radius, exit_offset) in [(2.0, 0.5), (1.0, 3.0), (1.0, 1.0)] {
        let mut factory = HeadlessTargetFactory::new();
        let mut loader = ManualLoader::starting_in(WorldId::A);
        let mut portals = system();
        let config = trigger(radius, exit_offset);
        let entrance = portals
            .add_portal("entrance", Pose::IDENTITY, None, Some(config.clone()), None, &mut factory)
            .unwrap();
        let exit_pose = yawed(Vec3::new(10.0, 0.0, 0.0), FRAC_PI_2);
        let exit = portals
            .add_portal("exit", exit_pose, None, Some(config), None, &mut factory)
            .unwrap();
        portals.link(entrance, exit).unwrap();

        let mut agent = TestAgent::at(Vec3::ZERO);
        let outcome = portals.run_triggers(&mut agent, None, &mut loader);

        let TriggerOutcome::Teleported(pose) = outcome else {
            panic!("expected a teleport, got {:?}", outcome);
        };
        let distance = pose.position.distance(exit_pose.position);
        assert!(distance > radius, "landed inside destination trigger: {} <= {}", distance, radius);
        assert!((distance - exit_offset.max(radius + EXIT_EPSILON)).abs() < 1e-4);
        assert!(pose.forward().abs_diff_eq(exit_pose.forward(), 1e-5));

        // An immediate re-check must not bounce the agent back.
        let again = portals.run_triggers(&mut agent, None, &mut loader);
        assert!(!again.fired());
        assert_eq!(agent.writes.len(), 1);
    }
}

#[test]
fn pose_is_written_with_collision_suspended() {
    let mut factory = HeadlessTargetFactory::new();
    let mut loader = ManualLoader::starting_in(WorldId::A);
    let mut portals = system();
    let a = portals
        .add_portal("a", Pose::IDENTITY, None, Some(TriggerConfig::default()), None, &mut factory)
        .unwrap();
    let b = portals
        .add_portal("b", Pose::from_position(Vec3::new(0.0, 0.0, -20.0)), None, None, None, &mut factory)
        .unwrap();
    portals.link(a, b).unwrap();

    let mut agent = TestAgent::at(Vec3::new(0.3, 0.0, 0.0));
    assert!(portals.run_triggers(&mut agent, None, &mut loader).fired());

    assert_eq!(agent.writes.len(), 1);
    assert!(!agent.writes[0].1, "pose written while collision was active");
    assert!(agent.collision_enabled);
}

#[test]
fn unlinked_trigger_is_inert() {
    let mut factory = HeadlessTargetFactory::new();
    let mut loader = ManualLoader::starting_in(WorldId::A);
    let mut portals = system();
    portals
        .add_portal("lonely", Pose::IDENTITY, None, Some(TriggerConfig::default()), None, &mut factory)
        .unwrap();

    let mut agent = TestAgent::at(Vec3::new(0.0, 0.0, 0.5));
    let before = agent.pose;
    let outcome = portals.run_triggers(&mut agent, None, &mut loader);

    assert_eq!(outcome, TriggerOutcome::Inert);
    assert_eq!(agent.pose, before);
    assert!(agent.writes.is_empty());
    assert!(loader.requests.is_empty());
}

#[test]
fn probe_point_is_used_instead_of_root() {
    let mut factory = HeadlessTargetFactory::new();
    let mut loader = ManualLoader::starting_in(WorldId::A);
    let mut portals = system();
    let raised = Pose::from_position(Vec3::new(0.0, 1.5, 0.0));
    let a = portals
        .add_portal("raised", raised, None, Some(trigger(0.8, 1.5)), None, &mut factory)
        .unwrap();
    let b = portals
        .add_portal("far", Pose::from_position(Vec3::new(50.0, 1.5, 0.0)), None, None, None, &mut factory)
        .unwrap();
    portals.link(a, b).unwrap();

    // Root on the ground is 1.5 below the anchor; the body center is within reach.
    let mut agent = TestAgent::at(Vec3::ZERO);
    assert_eq!(portals.run_triggers(&mut agent, None, &mut loader), TriggerOutcome::Outside);

    agent.probe_height = 1.0;
    assert!(portals.run_triggers(&mut agent, None, &mut loader).fired());
}

#[test]
fn tag_filter_blocks_other_agents() {
    let mut factory = HeadlessTargetFactory::new();
    let mut loader = ManualLoader::starting_in(WorldId::A);
    let mut portals = system();
    let a = portals
        .add_portal("a", Pose::IDENTITY, None, Some(TriggerConfig::default()), None, &mut factory)
        .unwrap();
    let open = TriggerConfig {
        allowed_tag: None,
        ..TriggerConfig::default()
    };
    let b = portals
        .add_portal("b", Pose::from_position(Vec3::new(20.0, 0.0, 0.0)), None, Some(open), None, &mut factory)
        .unwrap();
    portals.link(a, b).unwrap();

    let mut crate_agent = TestAgent::at(Vec3::ZERO).tagged("Crate");
    assert_eq!(portals.run_triggers(&mut crate_agent, None, &mut loader), TriggerOutcome::Filtered);
    assert!(crate_agent.writes.is_empty());

    // The unfiltered side lets anything through.
    let mut crate_agent = TestAgent::at(Vec3::new(20.0, 0.0, 0.0)).tagged("Crate");
    assert!(portals.run_triggers(&mut crate_agent, None, &mut loader).fired());
}

#[test]
fn cross_world_anchor_requests_switch_with_exit_pose() {
    let mut factory = HeadlessTargetFactory::new();
    let mut loader = ManualLoader::starting_in(WorldId::A);
    let mut coordinator = WorldSwitchCoordinator::init(CoordinatorConfig::default(), &mut loader);
    let mut portals = system();

    let gate = portals
        .add_portal("gate", Pose::IDENTITY, None, Some(TriggerConfig::default()), None, &mut factory)
        .unwrap();
    let record_pose = yawed(Vec3::new(-11.0, 1.1, 0.0), -FRAC_PI_2);
    let record = portals
        .add_portal("gate_of_B", record_pose, Some(WorldId::B), None, None, &mut factory)
        .unwrap();
    portals.link(gate, record).unwrap();

    let mut agent = TestAgent::at(Vec3::new(0.0, 0.0, 0.2));
    let outcome = portals.run_triggers(&mut agent, Some(&mut coordinator), &mut loader);

    assert_eq!(outcome, TriggerOutcome::SwitchRequested(WorldId::B));
    assert_eq!(loader.requests, vec![(WorldId::B, LoadMode::Single)]);
    assert_eq!(coordinator.pending_load(), Some(WorldId::B));
    assert!(agent.writes.is_empty(), "agent moved before the new world exists");

    let saved = coordinator.state().last_saved_pose.unwrap();
    assert!(saved.position.abs_diff_eq(record_pose.position + record_pose.forward() * 1.5, 1e-5));
}

#[test]
fn same_coordinates_exit_saves_agent_pose() {
    let mut factory = HeadlessTargetFactory::new();
    let mut loader = ManualLoader::starting_in(WorldId::A);
    let mut coordinator = WorldSwitchCoordinator::init(CoordinatorConfig::default(), &mut loader);
    let mut portals = system();
    let config = TriggerConfig {
        cross_world_exit: CrossWorldExit::SameCoordinates,
        ..TriggerConfig::default()
    };
    let gate = portals
        .add_portal("gate", Pose::IDENTITY, None, Some(config), None, &mut factory)
        .unwrap();
    let record = portals
        .add_portal("twin", Pose::IDENTITY, Some(WorldId::B), None, None, &mut factory)
        .unwrap();
    portals.link(gate, record).unwrap();

    let mut agent = TestAgent::at(Vec3::new(0.1, 0.0, 0.4));
    portals.run_triggers(&mut agent, Some(&mut coordinator), &mut loader);

    assert_eq!(coordinator.state().last_saved_pose, Some(agent.pose));
}

#[test]
fn cross_world_without_coordinator_is_absorbed() {
    let mut factory = HeadlessTargetFactory::new();
    let mut loader = ManualLoader::starting_in(WorldId::A);
    let mut portals = system();
    let gate = portals
        .add_portal("gate", Pose::IDENTITY, None, Some(TriggerConfig::default()), None, &mut factory)
        .unwrap();
    let record = portals
        .add_portal("elsewhere", Pose::IDENTITY, Some(WorldId::B), None, None, &mut factory)
        .unwrap();
    portals.link(gate, record).unwrap();

    let mut agent = TestAgent::at(Vec3::ZERO);
    assert_eq!(portals.run_triggers(&mut agent, None, &mut loader), TriggerOutcome::Absorbed);
    assert!(agent.writes.is_empty());
    assert!(loader.requests.is_empty());
}

#[test]
fn anchor_in_current_world_teleports_in_place() {
    let mut factory = HeadlessTargetFactory::new();
    let mut loader = ManualLoader::starting_in(WorldId::A);
    let mut coordinator = WorldSwitchCoordinator::init(CoordinatorConfig::default(), &mut loader);
    let mut portals = system();
    let gate = portals
        .add_portal("gate", Pose::IDENTITY, None, Some(TriggerConfig::default()), None, &mut factory)
        .unwrap();
    let local = portals
        .add_portal("local", Pose::from_position(Vec3::new(5.0, 0.0, 5.0)), Some(WorldId::A), None, None, &mut factory)
        .unwrap();
    portals.link(gate, local).unwrap();

    let mut agent = TestAgent::at(Vec3::ZERO);
    let outcome = portals.run_triggers(&mut agent, Some(&mut coordinator), &mut loader);

    assert!(matches!(outcome, TriggerOutcome::Teleported(_)));
    assert_eq!(coordinator.pending_load(), None);
    assert!(loader.requests.is_empty());
}

#[test]
fn rejected_switch_leaves_agent_alone() {
    let mut factory = HeadlessTargetFactory::new();
    let mut loader = ManualLoader::starting_in(WorldId::A);
    let mut coordinator = WorldSwitchCoordinator::init(CoordinatorConfig::default(), &mut loader);
    coordinator.switch_world(Some(Pose::IDENTITY), &mut loader).unwrap();

    let mut portals = system();
    let gate = portals
        .add_portal("gate", Pose::IDENTITY, None, Some(TriggerConfig::default()), None, &mut factory)
        .unwrap();
    let record = portals
        .add_portal("gate_of_A", Pose::IDENTITY, Some(WorldId::A), None, None, &mut factory)
        .unwrap();
    portals.link(gate, record).unwrap();

    // Current world already flipped to B while its load is pending; A is a real switch.
    let mut agent = TestAgent::at(Vec3::ZERO);
    let outcome = portals.run_triggers(&mut agent, Some(&mut coordinator), &mut loader);

    assert_eq!(outcome, TriggerOutcome::Absorbed);
    assert_eq!(loader.requests.len(), 1);
    assert!(agent.writes.is_empty());
}

#[test]
fn gate_stays_shut_while_switch_is_loading() {
    let mut factory = HeadlessTargetFactory::new();
    let mut loader = ManualLoader::starting_in(WorldId::A);
    let mut coordinator = WorldSwitchCoordinator::init(CoordinatorConfig::default(), &mut loader);
    let mut portals = system();
    let gate = portals
        .add_portal("gate", Pose::IDENTITY, None, Some(TriggerConfig::default()), None, &mut factory)
        .unwrap();
    let record_pose = yawed(Vec3::new(-11.0, 1.1, 0.0), -FRAC_PI_2);
    let record = portals
        .add_portal("gate_of_B", record_pose, Some(WorldId::B), None, None, &mut factory)
        .unwrap();
    portals.link(gate, record).unwrap();

    let mut agent = TestAgent::at(Vec3::ZERO);
    let first = portals.run_triggers(&mut agent, Some(&mut coordinator), &mut loader);
    assert_eq!(first, TriggerOutcome::SwitchRequested(WorldId::B));

    // Still standing in the gate on the next frames; the load has not finished.
    for _ in 0..3 {
        let again = portals.run_triggers(&mut agent, Some(&mut coordinator), &mut loader);
        assert_eq!(again, TriggerOutcome::Absorbed);
    }
    assert!(agent.writes.is_empty(), "agent moved while load of B was pending");
    assert_eq!(loader.requests, vec![(WorldId::B, LoadMode::Single)]);
    assert_eq!(coordinator.pending_load(), Some(WorldId::B));
}

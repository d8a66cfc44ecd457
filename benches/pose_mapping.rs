// benches/pose_mapping.rs
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use std::f32::consts::PI;

use glam::{Quat, Vec3};
use rand::Rng;
use worldgate::engine_lib::anchor::AnchorSet;
use worldgate::engine_lib::pose::Pose;
use worldgate::engine_lib::trigger::{PortalTrigger, TriggerConfig};
use worldgate::rendering_lib::portal_rig::{derive_secondary_pose, PoseMode};

fn random_pose(rng: &mut impl Rng) -> Pose {
    let position = Vec3::new(
        rng.gen_range(-50.0..50.0),
        rng.gen_range(0.0..5.0),
        rng.gen_range(-50.0..50.0),
    );
    let orientation = Quat::from_rotation_y(rng.gen_range(-PI..PI)) * Quat::from_rotation_x(rng.gen_range(-0.5..0.5));
    Pose::new(position, orientation)
}

fn pose_mapping_benchmark_fn(c: &mut Criterion) {
    let mut rng = rand::thread_rng();

    const NUM_BENCH_CASES: usize = 100;
    let cases: Vec<(Pose, Pose, Pose)> = (0..NUM_BENCH_CASES)
        .map(|_| (random_pose(&mut rng), random_pose(&mut rng), random_pose(&mut rng)))
        .collect();

    let mut group = c.benchmark_group("PoseMapping");

    group.bench_function("viewer_relative_inverted_100_cases", |b| {
        let mode = PoseMode::ViewerRelative { invert_facing: true };
        let mut case_iter = cases.iter().cycle();
        b.iter(|| {
            let (viewer, this, linked) = case_iter.next().unwrap();
            derive_secondary_pose(black_box(mode), Some(black_box(viewer)), black_box(this), black_box(linked))
        })
    });

    group.bench_function("fixed_mount_100_cases", |b| {
        let mode = PoseMode::default();
        let mut case_iter = cases.iter().cycle();
        b.iter(|| {
            let (viewer, this, linked) = case_iter.next().unwrap();
            derive_secondary_pose(black_box(mode), Some(black_box(viewer)), black_box(this), black_box(linked))
        })
    });

    let mut anchors = AnchorSet::new();
    let triggers: Vec<PortalTrigger> = cases
        .iter()
        .map(|(_, this, _)| PortalTrigger::new(anchors.insert("bench", *this, None), TriggerConfig::default()))
        .collect();
    let probes: Vec<Vec3> = cases.iter().map(|(viewer, _, _)| viewer.position).collect();

    group.bench_function("trigger_contains_100_anchors", |b| {
        let mut probe_iter = probes.iter().cycle();
        b.iter(|| {
            let probe = *probe_iter.next().unwrap();
            triggers
                .iter()
                .filter(|trigger| {
                    anchors
                        .get(trigger.anchor)
                        .is_some_and(|anchor| trigger.contains(anchor, black_box(probe)))
                })
                .count()
        })
    });
    group.finish();
}

criterion_group!(benches, pose_mapping_benchmark_fn);
criterion_main!(benches);

use librdice::reconcile::random_correction;
use librdice::{
    shapes, DiceConfig, DiceTable, DieId, DieState, FaceMap, PlaybackMode, Pose, RollEvent, RollRequest, UnitQuaternion,
    Vector3,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn table(seed: u64) -> DiceTable {
    DiceTable::new(DiceConfig {
        seed: Some(seed),
        ..DiceConfig::default()
    })
    .expect("valid config")
}

fn d6(table: &mut DiceTable, x: f32) -> DieId {
    table
        .create_die(FaceMap::standard_d6(), shapes::cube(0.5), 0.17, Pose::at(x, 0.6, 0.0))
        .expect("die")
}

fn toss() -> (Vector3<f32>, Vector3<f32>) {
    (Vector3::new(0.02, 0.05, -0.01), Vector3::new(0.004, 0.0, 0.003))
}

fn play_out(table: &mut DiceTable) -> usize {
    let mut ticks = 0;
    while table.step() {
        ticks += 1;
        assert!(ticks < 10_000, "playback never finished");
    }
    ticks
}

#[test]
fn forced_roll_ends_on_requested_face() {
    for desired in 1..=6 {
        let mut t = table(desired as u64);
        let id = d6(&mut t, 0.0);
        let (force, torque) = toss();
        t.roll(id, RollRequest::forced(desired, force, torque)).unwrap();

        let report = t.run_prediction();
        assert!(report.failures.is_empty());
        assert_eq!(report.outcomes, vec![(id, desired)]);
        assert!(report.simulation.unsettled.is_empty());

        t.play(id).unwrap();
        play_out(&mut t);
        assert_eq!(t.state(id).unwrap(), DieState::Idle);
        assert_eq!(t.face_looking_up(id).unwrap(), desired);

        let events = t.drain_events();
        let started = events.iter().position(|e| *e == RollEvent::RollStarted { die: id });
        let ended = events
            .iter()
            .position(|e| *e == RollEvent::RollEnded { die: id, face: desired });
        assert!(started.is_some() && ended.is_some());
        assert!(started < ended);
    }
}

#[test]
fn random_roll_keeps_physical_face() {
    let mut t = table(3);
    let id = d6(&mut t, 0.0);
    let (force, torque) = toss();
    t.roll(id, RollRequest::random(force, torque)).unwrap();
    let report = t.run_prediction();
    let shadow_face = t.shadow_face(id).unwrap().expect("shadow");
    assert_eq!(report.outcomes, vec![(id, shadow_face)]);
    assert_eq!(t.graphic_rotation(id).unwrap(), UnitQuaternion::identity());

    t.play(id).unwrap();
    play_out(&mut t);
    assert_eq!(t.face_looking_up(id).unwrap(), shadow_face);
}

#[test]
fn several_dice_share_one_prediction_pass() {
    let mut t = table(11);
    let ids: Vec<DieId> = (0..3).map(|i| d6(&mut t, i as f32 * 2.0)).collect();
    let (force, torque) = toss();
    for (i, id) in ids.iter().enumerate() {
        t.roll(*id, RollRequest::forced(i as i32 + 1, force, torque)).unwrap();
    }
    let report = t.run_prediction();
    assert_eq!(report.outcomes.len(), 3);
    assert!(report.simulation.ticks <= t.config().max_iterations);

    // a second pass without new rolls does nothing
    assert!(t.run_prediction().simulation.is_noop());

    for id in &ids {
        t.play(*id).unwrap();
    }
    play_out(&mut t);
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(t.face_looking_up(*id).unwrap(), i as i32 + 1);
    }
    let ended = t
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, RollEvent::RollEnded { .. }))
        .count();
    assert_eq!(ended, 3);
}

#[test]
fn trajectory_is_bounded_and_cleared_on_reroll() {
    let mut t = DiceTable::new(DiceConfig {
        seed: Some(5),
        max_iterations: 25,
        ..DiceConfig::default()
    })
    .unwrap();
    let id = d6(&mut t, 0.0);
    let (force, torque) = toss();
    t.roll(id, RollRequest::random(force * 4.0, torque)).unwrap();
    let report = t.run_prediction();
    assert_eq!(report.simulation.ticks, 25);
    assert_eq!(report.simulation.unsettled, vec![id]);
    assert_eq!(t.trajectory(id).unwrap().unwrap().len(), 25);
    // still reconciled against whatever face is up when the budget runs out
    assert_eq!(t.state(id).unwrap(), DieState::Reconciled);

    t.roll(id, RollRequest::random(force, torque)).unwrap();
    assert!(t.trajectory(id).unwrap().unwrap().is_empty());
}

#[test]
fn forced_roll_cut_off_by_budget_still_shows_requested_face() {
    for desired in [1, 3, 6] {
        let mut t = DiceTable::new(DiceConfig {
            seed: Some(17),
            max_iterations: 6,
            ..DiceConfig::default()
        })
        .unwrap();
        let id = t
            .create_die(FaceMap::standard_d6(), shapes::cube(0.5), 0.17, Pose::at(0.0, 3.0, 0.0))
            .unwrap();
        t.roll(id, RollRequest::forced(desired, Vector3::zeros(), Vector3::new(2.0, 1.0, 0.5)))
            .unwrap();
        let report = t.run_prediction();
        assert_eq!(report.simulation.unsettled, vec![id]);
        assert_eq!(report.outcomes, vec![(id, desired)]);

        // the shadow reads the same pose playback ends on
        let last = *t.trajectory(id).unwrap().unwrap().last().unwrap();
        let faces = t.faces(id).unwrap().clone();
        assert_eq!(t.shadow_face(id).unwrap(), Some(faces.resolve_up_face(&last.orientation)));

        t.play(id).unwrap();
        play_out(&mut t);
        assert_eq!(t.pose(id).unwrap(), last);
        assert_eq!(t.face_looking_up(id).unwrap(), desired);
        assert_eq!(
            t.drain_events().last(),
            Some(&RollEvent::RollEnded { die: id, face: desired })
        );
    }
}

#[test]
fn timed_playback_reaches_final_pose() {
    let mut t = DiceTable::new(DiceConfig {
        seed: Some(9),
        playback: PlaybackMode::Timed { duration: 0.4 },
        ..DiceConfig::default()
    })
    .unwrap();
    let id = d6(&mut t, 0.0);
    let (force, torque) = toss();
    t.roll(id, RollRequest::forced(4, force, torque)).unwrap();
    t.run_prediction();
    t.play(id).unwrap();
    let ticks = play_out(&mut t);
    // 0.4 s at 0.02 s per tick, give or take float accumulation
    assert!((19..=21).contains(&ticks), "ticks = {ticks}");
    let last = *t.trajectory(id).unwrap().unwrap().last().unwrap();
    assert_eq!(t.pose(id).unwrap(), last);
    assert_eq!(t.face_looking_up(id).unwrap(), 4);
}

#[test]
fn duplicate_face_values_are_both_chosen() {
    let mut faces = FaceMap::new();
    faces.add_face(1, Vector3::y());
    faces.add_face(4, Vector3::x());
    faces.add_face(4, Vector3::z());
    let mut rng = StdRng::seed_from_u64(21);

    let (mut hit_x, mut hit_z) = (0, 0);
    for _ in 0..64 {
        let g = random_correction(&faces, &faces.faces()[0], 4, &mut rng).expect("correction");
        if (g * Vector3::x() - Vector3::y()).norm() < 1e-5 {
            hit_x += 1;
        } else if (g * Vector3::z() - Vector3::y()).norm() < 1e-5 {
            hit_z += 1;
        }
    }
    assert_eq!(hit_x + hit_z, 64);
    assert!(hit_x > 0 && hit_z > 0);
}

#[test]
fn shutdown_abandons_rolls_and_next_roll_recreates_world() {
    let mut t = table(13);
    let id = d6(&mut t, 0.0);
    let (force, torque) = toss();
    t.roll(id, RollRequest::forced(2, force, torque)).unwrap();
    let colliders = t.shutdown();
    assert_eq!(colliders.len(), 1);
    assert!(!t.is_world_loaded());
    assert_eq!(t.state(id).unwrap(), DieState::Idle);
    assert!(t.run_prediction().outcomes.is_empty());

    t.roll(id, RollRequest::forced(2, force, torque)).unwrap();
    let report = t.run_prediction();
    assert_eq!(report.outcomes, vec![(id, 2)]);
}

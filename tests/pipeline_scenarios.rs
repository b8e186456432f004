use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::NamedTempFile;

use interaction_filter::config::FilterConfig;
use interaction_filter::ingest::replay::{ScenarioFrame, ScenarioPerson};
use interaction_filter::ingest::{open_scenario, Scenario};
use interaction_filter::pipeline::{prepare_replay, run, RunOptions, RunSummary, StopReason};
use interaction_filter::{
    BBox, Comparator, DepthMap, FrameResult, InteractionRecord, Keypoint, PairKey, ZPlaneMethod,
};

fn person(id: u32, x: f32, ipd: f32) -> ScenarioPerson {
    let bbox = BBox::new(x, 100.0, x + 100.0, 400.0);
    let mut keypoints = vec![Keypoint::default(); 17];
    keypoints[1] = Keypoint::new(x + 50.0 - ipd / 2.0, 120.0, 0.9);
    keypoints[2] = Keypoint::new(x + 50.0 + ipd / 2.0, 120.0, 0.9);
    ScenarioPerson {
        id,
        bbox,
        keypoints,
        confidence: None,
    }
}

fn scenario(frames: Vec<ScenarioFrame>) -> Scenario {
    Scenario {
        fps: 30.0,
        width: 640,
        height: 480,
        frames,
        label: "test".to_string(),
    }
}

fn frame(persons: Vec<ScenarioPerson>) -> ScenarioFrame {
    ScenarioFrame {
        persons,
        depth_map: None,
    }
}

fn close_pair() -> ScenarioFrame {
    frame(vec![person(1, 100.0, 20.0), person(2, 180.0, 20.0)])
}

fn apart_pair() -> ScenarioFrame {
    frame(vec![person(1, 100.0, 20.0), person(2, 400.0, 20.0)])
}

fn pair(a: u32, b: u32) -> PairKey {
    PairKey::new(a, b).expect("distinct ids")
}

fn run_method(
    scenario: Scenario,
    method: ZPlaneMethod,
    comparator: &mut Comparator,
) -> (RunSummary, Vec<FrameResult>) {
    let config = FilterConfig::default();
    let (mut source, mut filter) = prepare_replay(scenario, method, &config).expect("filter");
    let mut results = Vec::new();
    let summary = run(
        &mut source,
        &mut filter,
        comparator,
        &RunOptions::from_config(&config),
        &AtomicBool::new(false),
        |r| results.push(r.clone()),
    )
    .expect("run");
    (summary, results)
}

#[test]
fn sustained_interaction_triggers_once_at_threshold() {
    let mut comparator = Comparator::new();
    let (summary, results) =
        run_method(scenario(vec![close_pair(); 70]), ZPlaneMethod::Hybrid, &mut comparator);

    assert_eq!(summary.frames_processed, 70);
    assert_eq!(summary.total_triggers, 1);
    assert_eq!(summary.stop_reason, StopReason::EndOfStream);

    let trigger_frames: Vec<u64> = results
        .iter()
        .filter(|r| r.triggers_this_frame > 0)
        .map(|r| r.frame)
        .collect();
    assert_eq!(trigger_frames, vec![60]);
    assert_eq!(results[59].new_triggers, vec![pair(1, 2)]);

    for r in &results {
        let record: &InteractionRecord = &r.active_interactions[0];
        assert_eq!(record.start_frame, 1);
        if r.frame >= 60 {
            assert!(record.triggered);
            assert_eq!(record.trigger_frame, Some(60));
        } else {
            assert!(!record.triggered);
        }
    }

    let stats = comparator.stats("hybrid").expect("hybrid stats");
    assert_eq!(stats.overlap_frames, 70);
    assert_eq!(stats.interaction_frames, 70);
    assert_eq!(stats.triggers, 1);
    assert_eq!(stats.annotations.len(), 1);
    let record = &stats.annotations[0];
    assert_eq!(record.start_frame, 1);
    assert_eq!(record.end_frame, Some(70));
    assert_eq!(record.trigger_frame, Some(60));

    let report = comparator.report();
    let hybrid = report.method("hybrid").expect("hybrid report");
    assert_eq!(hybrid.cost_reduction_percent, Some(98.57));
    assert_eq!(hybrid.annotations[0].trigger_time, Some(2.0));
}

#[test]
fn short_interaction_is_buffered_not_triggered() {
    let mut frames = vec![close_pair(); 30];
    frames.extend(vec![apart_pair(); 10]);
    let mut comparator = Comparator::new();
    let (summary, results) = run_method(scenario(frames), ZPlaneMethod::Ipd, &mut comparator);

    assert_eq!(summary.total_triggers, 0);
    assert_eq!(summary.flushed, 0);
    assert_eq!(results[30].ended_interactions.len(), 1);

    let stats = comparator.stats("ipd").expect("ipd stats");
    assert_eq!(stats.overlap_frames, 30);
    assert_eq!(stats.cost_reduction_percent(), Some(100.0));
    let record = &stats.annotations[0];
    assert_eq!((record.start_frame, record.end_frame), (1, Some(30)));
    assert_eq!(record.consecutive_frames, 30);
    assert!(!record.triggered);

    let text = comparator.render_text();
    assert!(text.contains("[BUFFERED] (1, 2) frames 1-30"), "{text}");
    assert!(text.contains("VLM Cost Reduction: 100.00%"), "{text}");
}

#[test]
fn three_way_overlap_forms_one_group() {
    let trio = frame(vec![
        person(3, 160.0, 20.0),
        person(1, 100.0, 20.0),
        person(2, 130.0, 21.0),
        person(9, 500.0, 20.0),
    ]);
    let mut comparator = Comparator::new();
    let (_, results) = run_method(scenario(vec![trio]), ZPlaneMethod::Hybrid, &mut comparator);

    let r = &results[0];
    assert_eq!(r.persons.len(), 4);
    let expected: Vec<PairKey> = vec![pair(1, 2), pair(1, 3), pair(2, 3)];
    assert_eq!(r.interacting_pairs.iter().copied().collect::<Vec<_>>(), expected);
    assert_eq!(r.groups, vec![vec![1, 2, 3]]);
    assert_eq!(r.z_metrics.len(), 4);
}

#[test]
fn depth_separates_what_head_size_cannot() {
    // Same head size, different depth: heuristics interact, MDE does not.
    let map = DepthMap::from_fn(640, 480, |x, _| if x < 180 { 0.3 } else { 0.6 });
    let frames: Vec<ScenarioFrame> = (0..10)
        .map(|_| ScenarioFrame {
            depth_map: Some(map.clone()),
            ..close_pair()
        })
        .collect();

    let mut comparator = Comparator::new();
    run_method(scenario(frames.clone()), ZPlaneMethod::Hybrid, &mut comparator);
    let (_, mde) = run_method(scenario(frames), ZPlaneMethod::Mde, &mut comparator);

    assert_eq!(comparator.stats("hybrid").expect("hybrid").interaction_frames, 10);
    let mde_stats = comparator.stats("mde").expect("mde");
    assert_eq!(mde_stats.overlap_frames, 10);
    assert_eq!(mde_stats.interaction_frames, 0);
    assert_eq!(mde[0].z_metrics[&1], 0.3);
    assert_eq!(mde[0].z_metrics[&2], 0.6);

    let order: Vec<&str> = comparator.methods().map(|(name, _)| name).collect();
    assert_eq!(order, vec!["hybrid", "mde"]);
}

#[test]
fn cancellation_flushes_active_interactions() {
    let config = FilterConfig::default();
    let (mut source, mut filter) =
        prepare_replay(scenario(vec![close_pair(); 70]), ZPlaneMethod::Hybrid, &config)
            .expect("filter");
    let stop = AtomicBool::new(false);
    let mut comparator = Comparator::new();
    let summary = run(
        &mut source,
        &mut filter,
        &mut comparator,
        &RunOptions::default(),
        &stop,
        |r| {
            if r.frame == 10 {
                stop.store(true, Ordering::SeqCst);
            }
        },
    )
    .expect("run");

    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert_eq!(summary.frames_processed, 10);
    assert_eq!(summary.flushed, 1);
    let stats = comparator.stats("hybrid").expect("hybrid stats");
    assert_eq!(stats.annotations[0].end_frame, Some(10));
    assert!(!stats.annotations[0].triggered);
    assert_eq!(comparator.processing_stats().expect("timing").total_frames, 10);
}

#[test]
fn loads_scenario_file_and_samples_frames() {
    let mut file = NamedTempFile::new().expect("temp scenario");
    let mut frames = Vec::new();
    for _ in 0..8 {
        frames.push(
            r#"{ "persons": [
                { "id": 5, "bbox": [0, 0, 50, 100], "keypoints": [[0,0,0],[20,10,0.9],[30,10,0.9]] },
                { "id": 4, "bbox": [40, 0, 90, 100], "keypoints": [[0,0,0],[60,10,0.9],[70,10,0.9]] }
            ] }"#,
        );
    }
    let json = format!(r#"{{ "fps": 2.0, "frames": [{}] }}"#, frames.join(","));
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write scenario");

    let path = file.path().to_str().expect("utf-8 path");
    let loaded = open_scenario(path, None).expect("load scenario");
    assert_eq!(loaded.frame_count(), 8);
    assert_eq!(loaded.label, path);

    // 2 s at 2 fps, every 2nd frame: 2 processed frames to trigger.
    let config = FilterConfig {
        frame_interval: 2,
        ..FilterConfig::default()
    };
    let (mut source, mut filter) =
        prepare_replay(loaded, ZPlaneMethod::Ipd, &config).expect("filter");
    assert_eq!(filter.threshold_frames(), 2);

    let mut comparator = Comparator::new();
    let mut processed = Vec::new();
    let summary = run(
        &mut source,
        &mut filter,
        &mut comparator,
        &RunOptions::from_config(&config),
        &AtomicBool::new(false),
        |r| processed.push((r.frame, r.new_triggers.clone())),
    )
    .expect("run");

    assert_eq!(summary.frames_read, 8);
    assert_eq!(
        processed,
        vec![
            (1, vec![]),
            (3, vec![pair(4, 5)]),
            (5, vec![]),
            (7, vec![]),
        ]
    );
    let record = &comparator.stats("ipd").expect("ipd").annotations[0];
    assert_eq!(record.pair, pair(4, 5));
    assert_eq!((record.start_frame, record.end_frame), (1, Some(7)));
}

#[test]
fn synthetic_scene_triggers_the_close_pair_only() {
    let scene = open_scenario("synthetic://", Some(11)).expect("synthetic scene");
    let mut comparator = Comparator::new();
    for method in [ZPlaneMethod::Hybrid, ZPlaneMethod::Mde] {
        let (summary, _) = run_method(scene.clone(), method, &mut comparator);
        assert_eq!(summary.frames_processed, 120);
        assert_eq!(summary.total_triggers, 1, "{method}");

        let stats = comparator.stats(method.as_str()).expect("stats");
        assert!(stats.overlap_frames > stats.triggers);
        let triggered: Vec<_> = stats.annotations.iter().filter(|a| a.triggered).collect();
        assert_eq!(triggered.len(), 1, "{method}");
        assert_eq!(triggered[0].pair, pair(1, 2));
        assert!(stats.annotations.iter().all(|a| !a.pair.contains(3)));
    }
}

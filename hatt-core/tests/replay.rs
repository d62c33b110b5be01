mod common;

use std::io::Cursor;

use common::*;
use hatt_core::{
    replay, run, Classifier, ConsoleReporter, Decision, Engine, MatchPoint, ReadBuffer, Reporter,
    RunError, RunOptions, RunSummary, Silent,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn concat(requests: &[Vec<u8>]) -> Vec<u8> {
    requests.concat()
}

fn options(read: usize, window: usize) -> RunOptions {
    RunOptions::with_sizes(read, window)
}

#[test]
fn single_minimal_request() {
    let engine = Recording::new(rule_engine(""));
    let mut rec = Recorder::default();
    let summary = replay(&mut Cursor::new(GET.to_vec()), &engine, &RunOptions::default(), &mut rec)
        .unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.reads, 1);
    assert_eq!(rec.completions, vec![(1, GET.len(), 0)]);
    assert_eq!(summary.trailing_bytes, 0);
    assert_eq!(engine.taken(), vec![GET.to_vec(), Vec::new()]);
}

#[test]
fn three_requests_in_one_read() {
    let stream = GET.repeat(3);
    let engine = Recording::new(rule_engine(""));
    let mut rec = Recorder::default();
    let summary = replay(&mut Cursor::new(stream), &engine, &options(4096, 20), &mut rec).unwrap();
    assert_eq!(summary.reads, 1);
    assert_eq!(summary.completed, 3);
    let ordinals: Vec<u64> = rec.completions.iter().map(|c| c.0).collect();
    assert_eq!(ordinals, vec![1, 2, 3]);
    let taken = engine.taken();
    assert_eq!(taken.len(), 4);
    for t in &taken[..3] {
        assert_eq!(t.as_slice(), GET);
    }
    assert!(taken[3].is_empty());
}

#[test]
fn three_completions_inside_one_window() {
    let stream = GET.repeat(3);
    let engine = Recording::new(rule_engine(""));
    let mut rec = Recorder::default();
    replay(&mut Cursor::new(stream.clone()), &engine, &options(4096, 1024), &mut rec).unwrap();
    assert_eq!(rec.feeds.len(), 3);
    assert_eq!(
        rec.completions,
        vec![
            (1, GET.len(), 2 * GET.len()),
            (2, 2 * GET.len(), GET.len()),
            (3, 3 * GET.len(), 0)
        ]
    );
    let offsets: Vec<u64> = rec.feeds.iter().map(|f| f.stream_offset).collect();
    assert_eq!(offsets, vec![0, GET.len() as u64, 2 * GET.len() as u64]);
}

#[test]
fn exact_partition_of_mixed_stream() {
    let requests = sample_requests();
    let mut stream = concat(&requests);
    stream.extend_from_slice(b"GET /trailing HTTP/1.1\r\nHost:");
    let engine = Recording::new(rule_engine(SAMPLE_RULES));
    let summary = replay(&mut Cursor::new(stream.clone()), &engine, &options(37, 11), &mut Silent)
        .unwrap();
    let taken = engine.taken();
    assert_eq!(taken.concat(), stream);
    assert_eq!(&taken[..requests.len()], requests.as_slice());
    assert_eq!(summary.completed, requests.len() as u64);
    assert_eq!(summary.trailing_bytes, 29);
    assert_eq!(summary.bytes, stream.len() as u64);
}

#[test]
fn decisions_follow_rules() {
    let stream = concat(&sample_requests());
    let engine = rule_engine(SAMPLE_RULES);
    let mut rec = Recorder::default();
    replay(&mut Cursor::new(stream), &engine, &RunOptions::default(), &mut rec).unwrap();
    assert_eq!(
        rec.final_decisions(),
        vec![
            (1, Decision::Accept(MatchPoint::NONE)),
            (2, Decision::Deny(MatchPoint::new(2, 2))),
            (3, Decision::Deny(MatchPoint::new(1, 1))),
            (4, Decision::Deny(MatchPoint::new(2, 2))),
            (5, Decision::Accept(MatchPoint::NONE)),
        ]
    );
}

#[test]
fn alignment_independence() {
    let requests = sample_requests();
    let stream = concat(&requests).repeat(4);

    let baseline_engine = Recording::new(rule_engine(SAMPLE_RULES));
    let mut baseline = Recorder::default();
    replay(
        &mut Cursor::new(stream.clone()),
        &baseline_engine,
        &RunOptions::default(),
        &mut baseline,
    )
    .unwrap();
    let expected_taken = baseline_engine.taken();
    let expected_decisions = baseline.final_decisions();
    assert_eq!(expected_decisions.len(), requests.len() * 4);

    let mut rng = StdRng::seed_from_u64(0x4a77);
    for _ in 0..50 {
        let window = rng.gen_range(1..64);
        let read_cap = rng.gen_range(1..256);
        let sizes: Vec<usize> = (0..7).map(|_| rng.gen_range(1..300)).collect();
        let engine = Recording::new(rule_engine(SAMPLE_RULES));
        let mut rec = Recorder::default();
        let mut buffer = ReadBuffer::with_capacity(read_cap);
        let summary = run(
            &mut ScriptedReader::new(stream.clone(), sizes),
            &mut buffer,
            &engine,
            &options(read_cap, window),
            &mut rec,
        )
        .unwrap();
        assert_eq!(engine.taken(), expected_taken, "window {} read {}", window, read_cap);
        assert_eq!(rec.final_decisions(), expected_decisions);
        assert_eq!(summary.completed, (requests.len() * 4) as u64);
        let ordinals: Vec<u64> = rec.completions.iter().map(|c| c.0).collect();
        assert_eq!(ordinals, (1..=summary.completed).collect::<Vec<_>>());
    }
}

#[test]
fn interrupted_reads_are_transparent() {
    let stream = concat(&sample_requests());
    let plain = Recording::new(rule_engine(SAMPLE_RULES));
    let mut plain_rec = Recorder::default();
    replay(
        &mut ScriptedReader::new(stream.clone(), vec![13]),
        &plain,
        &options(64, 16),
        &mut plain_rec,
    )
    .unwrap();

    let interrupted = Recording::new(rule_engine(SAMPLE_RULES));
    let mut rec = Recorder::default();
    let mut reader = ScriptedReader::new(stream.clone(), vec![13]).interrupt_every(2);
    let summary = replay(&mut reader, &interrupted, &options(64, 16), &mut rec).unwrap();
    assert!(reader.interrupts > 0);
    assert_eq!(interrupted.taken().concat(), stream);
    assert_eq!(interrupted.taken(), plain.taken());
    assert_eq!(rec.completions.len(), plain_rec.completions.len());
    assert_eq!(summary.completed, 5);
    assert_eq!(summary.bytes, stream.len() as u64);
}

#[test]
fn classifier_error_stops_the_run() {
    let mut stream = GET.to_vec();
    stream.extend_from_slice(b"BAD REQUEST LINE\r\n\r\n");
    stream.extend_from_slice(GET);
    let engine = rule_engine("");
    let mut rec = Recorder::default();
    let err = replay(&mut Cursor::new(stream), &engine, &RunOptions::default(), &mut rec)
        .unwrap_err();
    assert!(matches!(err, RunError::Classifier { ordinal: 2, .. }));
    assert_eq!(rec.completions, vec![(1, GET.len(), GET.len() + 20)]);
    assert_eq!(rec.errors.len(), 1);
    assert_eq!(rec.errors[0].0, 2);
    assert!(rec.feeds.iter().all(|f| f.ordinal <= 2));
}

#[test]
fn dump_writes_serialized_request() {
    let dir = tempfile::tempdir().unwrap();
    let requests = sample_requests();
    let engine = rule_engine(SAMPLE_RULES);
    let opts = RunOptions {
        dump: 2,
        dump_dir: dir.path().to_path_buf(),
        ..options(100, 10)
    };
    let mut rec = Recorder::default();
    let summary = replay(&mut Cursor::new(concat(&requests)), &engine, &opts, &mut rec).unwrap();
    let path = dir.path().join("hatt_request_2.dump");
    assert_eq!(summary.dump.as_deref(), Some(path.as_path()));
    assert_eq!(rec.dumps, vec![2]);

    let mut reference = engine.new_request().unwrap();
    reference.feed(&requests[1]);
    assert!(reference.is_completed());
    assert_eq!(std::fs::read(&path).unwrap(), reference.serialize().unwrap());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn dump_beyond_last_request_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    let engine = rule_engine("");
    let opts = RunOptions {
        dump: 4,
        dump_dir: dir.path().to_path_buf(),
        ..RunOptions::default()
    };
    let summary = replay(&mut Cursor::new(GET.repeat(3)), &engine, &opts, &mut Silent).unwrap();
    assert_eq!(summary.completed, 3);
    assert!(summary.dump.is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn dump_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let engine = rule_engine("");
    let opts = RunOptions {
        dump: 1,
        dump_dir: dir.path().join("missing"),
        ..RunOptions::default()
    };
    let err = replay(&mut Cursor::new(GET.repeat(2)), &engine, &opts, &mut Silent).unwrap_err();
    assert!(matches!(err, RunError::Dump { ordinal: 1, .. }));
}

#[test]
fn console_output_for_denied_request() {
    let stream = concat(&sample_requests()[..3]);
    let engine = rule_engine(SAMPLE_RULES);
    let mut console = ConsoleReporter::new(Vec::new(), false);
    replay(&mut Cursor::new(stream), &engine, &RunOptions::default(), &mut console).unwrap();
    let out = String::from_utf8(console.into_inner()).unwrap();
    assert_eq!(out, "[DENY: r: 2 point: 2:2]\n[DENY: r: 3 point: 1:1]\n");
}

#[test]
fn verbosity_does_not_change_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let stream = concat(&sample_requests());
    let opts = RunOptions {
        dump: 3,
        dump_dir: dir.path().to_path_buf(),
        ..options(50, 10)
    };
    let replay_with = |reporter: &mut dyn Reporter| -> (RunSummary, Vec<Vec<u8>>) {
        let engine = Recording::new(rule_engine(SAMPLE_RULES));
        let summary = replay(&mut Cursor::new(stream.clone()), &engine, &opts, reporter).unwrap();
        (summary, engine.taken())
    };

    let mut verbose = ConsoleReporter::new(Vec::new(), true);
    let mut quiet = ConsoleReporter::new(Vec::new(), false);
    let loud_run = replay_with(&mut verbose);
    let quiet_run = replay_with(&mut quiet);
    let silent_run = replay_with(&mut Silent);

    assert_eq!(loud_run, quiet_run);
    assert_eq!(quiet_run, silent_run);
    assert_eq!(silent_run.0.completed, 5);
    assert!(silent_run.0.dump.is_some());

    let loud = String::from_utf8(verbose.into_inner()).unwrap();
    let quiet = String::from_utf8(quiet.into_inner()).unwrap();
    assert!(loud.contains("[PENDING]"));
    assert!(loud.contains("---- Completed req: 5"));
    assert!(quiet.contains("[DENY: r: 3 point: 1:1]"));
    assert!(quiet.contains("---- Dump: hatt_request_3.dump"));
    assert!(!quiet.contains("[PENDING]"));
}

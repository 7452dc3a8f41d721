//! End-to-end analysis tests over JSON-lines databases

use predicate_db::analysis::PredicateDbAnalyser;
use predicate_db::backend::Answer;
use predicate_db::storage::{
    JsonFormat, PredicateDbFormat, PredicateSample, SampleStream, TrainingData,
};
use std::path::Path;

/// Write `count` samples for `machine`, the first `contradictions` of them
/// decided valid by one backend and invalid by the other
fn write_machine(root: &Path, machine: &str, count: usize, contradictions: usize) {
    let samples: Vec<PredicateSample> = (0..count)
        .map(|i| {
            let answers = if i < contradictions {
                vec![Answer::Valid, Answer::Invalid]
            } else {
                vec![Answer::Valid, Answer::Timeout]
            };
            PredicateSample::new(format!("x = {i}"), vec![10.0, -1.0], Some(machine.into()))
                .with_answers(answers)
        })
        .collect();

    let data = TrainingData::new(machine, machine, SampleStream::from_samples(samples));
    JsonFormat::new().write_samples(data, root).unwrap();
}

#[test]
fn test_counts_machines_samples_and_contradictions() {
    let db = tempfile::tempdir().unwrap();
    write_machine(db.path(), "lift/Lift.mch", 40, 1);
    write_machine(db.path(), "lift/Door.mch", 40, 0);
    write_machine(db.path(), "train/Train.mch", 40, 1);
    write_machine(db.path(), "Scheduler.mch", 34, 0);

    let analysis = PredicateDbAnalyser::new(JsonFormat::new())
        .with_workers(3)
        .analyse(db.path())
        .unwrap();

    assert_eq!(analysis.machine_count(), 4);
    assert_eq!(analysis.sample_count(), 154);
    assert_eq!(analysis.contradiction_count(), 2);
    assert_eq!(analysis.files_seen(), 4);
    assert_eq!(analysis.files_with_errors(), 0);
}

#[test]
fn test_samples_from_same_machine_counted_once() {
    let db = tempfile::tempdir().unwrap();
    std::fs::write(
        db.path().join("part1.jsonl"),
        "{\"predicate\":\"a\",\"labelling\":[1.0],\"source\":\"Lift.mch\"}\n",
    )
    .unwrap();
    std::fs::write(
        db.path().join("part2.jsonl"),
        "{\"predicate\":\"b\",\"labelling\":[1.0],\"source\":\"Lift.mch\"}\n",
    )
    .unwrap();

    let analysis = PredicateDbAnalyser::new(JsonFormat::new())
        .analyse(db.path())
        .unwrap();

    assert_eq!(analysis.machine_count(), 1);
    assert_eq!(analysis.sample_count(), 2);
}

#[test]
fn test_empty_database() {
    let db = tempfile::tempdir().unwrap();
    let analysis = PredicateDbAnalyser::new(JsonFormat::new())
        .analyse(db.path())
        .unwrap();

    assert_eq!(analysis.machine_count(), 0);
    assert_eq!(analysis.sample_count(), 0);
    assert_eq!(analysis.files_seen(), 0);
}

#[test]
fn test_analysis_serializes_counts() {
    let db = tempfile::tempdir().unwrap();
    write_machine(db.path(), "Lift.mch", 3, 1);

    let analysis = PredicateDbAnalyser::new(JsonFormat::new())
        .analyse(db.path())
        .unwrap();
    let json = serde_json::to_value(&analysis).unwrap();

    assert_eq!(json["sample_count"], 3);
    assert_eq!(json["contradiction_count"], 1);
    assert!(analysis.to_string().contains("Contradictions:  1"));
}

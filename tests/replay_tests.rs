mod common;

use std::io::Write;

use common::{correct, service, wrong};
use mathpath_engine::adaptive::EngineEvent;
use mathpath_engine::replay::{self, ReplayRecord};

fn records() -> Vec<ReplayRecord> {
    let mut records: Vec<ReplayRecord> = (0..10)
        .map(|i| ReplayRecord {
            learner_id: "tom".to_string(),
            submission: correct(1, i),
        })
        .collect();
    records.push(ReplayRecord {
        learner_id: "una".to_string(),
        submission: wrong(1, 20),
    });
    let mut negative = correct(1, 21);
    negative.op1 = -4;
    records.push(ReplayRecord {
        learner_id: "una".to_string(),
        submission: negative,
    });
    records
}

#[tokio::test]
async fn replay_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let json = serde_json::to_string(&records()).unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let loaded = replay::load_records(file.path()).await.unwrap();
    assert_eq!(loaded.len(), 12);

    let service = service();
    let report = replay::run(&service, loaded).unwrap();
    assert_eq!(report.processed, 11);
    assert_eq!(report.rejected, 1);

    let milestones: Vec<_> = report
        .events
        .iter()
        .filter(|e| matches!(e.event, EngineEvent::Milestone(_)))
        .collect();
    assert_eq!(milestones.len(), 1);
    assert_eq!(milestones[0].learner_id, "tom");
    assert_eq!(milestones[0].record, 9);

    let tom = &report.summaries[0];
    assert_eq!(tom.learner_id, "tom");
    assert_eq!(tom.current_level, 2);
    assert_eq!(tom.mastered_levels, 1);
    assert_eq!(tom.level_name, "Counting Meadow 2");
    assert!(tom.zpd_level.is_some());

    let una = &report.summaries[1];
    assert_eq!(una.total_attempts, 1);
    assert_eq!(una.zpd_level, None);
}

#[tokio::test]
async fn missing_or_malformed_input_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(replay::load_records(&dir.path().join("absent.json")).await.is_err());

    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, "{\"not\": \"a list\"}").unwrap();
    assert!(replay::load_records(&bad).await.is_err());
}

#[test]
fn submissions_accept_operator_aliases() {
    let raw = r#"[{
        "learnerId": "vic",
        "submission": {
            "operator": "sub",
            "op1": 13,
            "op2": 5,
            "answer": 8,
            "elapsedMs": 7000,
            "numberRange": 20,
            "level": 1,
            "completedAt": "2024-03-01T10:00:00Z",
            "steps": [
                {"atMs": 900, "representation": "twenty_field", "action": "decompose", "value": 3},
                {"atMs": 2100, "representation": "twenty_field", "action": "jump", "value": 10}
            ]
        }
    }]"#;
    let records: Vec<ReplayRecord> = serde_json::from_str(raw).unwrap();
    let report = replay::run(&service(), records).unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.summaries[0].total_attempts, 1);
}

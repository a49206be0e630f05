use chrono::{DateTime, TimeZone, Utc};
use harvester_core::{
    aggregate, Batch, BucketGranularity, FailureKind, HarvestResult, ItemFailure, ItemReference,
    Record, SourceError, SourceErrorKind, SourceId, SourceStatus, UNDATED_BUCKET,
};
use pretty_assertions::assert_eq;

fn at(month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, month, day, 12, 0, 0).unwrap()
}

fn result(source: &str, status: SourceStatus, records: Vec<Record>) -> HarvestResult {
    let mut batch = Batch::empty(SourceId::new(source), at(1, 1));
    batch.absorb(records, None, at(1, 2));
    HarvestResult {
        source: SourceId::new(source),
        status,
        new_records: batch.len(),
        batch,
        discovery_calls: 1,
        pages_merged: 1,
        budget_exhausted: false,
        item_failures: Vec::new(),
        errors: Vec::new(),
    }
}

fn dated(id: &str, published: Option<DateTime<Utc>>) -> Record {
    let mut record = Record::new(id, id.to_uppercase(), at(12, 1));
    record.published_at = published;
    record
}

#[test]
fn aggregate_preserves_source_then_discovery_order() {
    let a = result(
        "A",
        SourceStatus::Done,
        vec![dated("a1", None), dated("a2", None)],
    );
    let b = result("B", SourceStatus::Done, vec![dated("b1", None)]);

    let report = aggregate(vec![a, b], at(12, 31), false);

    let order: Vec<_> = report
        .entries
        .iter()
        .map(|e| (e.source.as_str().to_string(), e.record.item_id.clone()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("A".to_string(), "a1".to_string()),
            ("A".to_string(), "a2".to_string()),
            ("B".to_string(), "b1".to_string()),
        ]
    );
    assert_eq!(report.total_records, 3);
    assert_eq!(report.count_by_status(SourceStatus::Done), 2);
}

#[test]
fn failed_sources_are_listed_without_records() {
    let mut failed = result("X", SourceStatus::Failed, vec![dated("cached", None)]);
    failed.errors.push(SourceError {
        kind: SourceErrorKind::Discovery,
        failure: Some(FailureKind::NotFound),
        message: "account not found".to_string(),
    });
    let mut partial = result("A", SourceStatus::DoneWithPartialFailures, vec![dated("L1", None)]);
    partial.item_failures.push(ItemFailure {
        item: ItemReference::link("L2"),
        kind: FailureKind::NotFound,
        message: "http status 404".to_string(),
        attempts: 1,
    });

    let report = aggregate(vec![partial, failed], at(12, 31), false);

    assert_eq!(report.total_records, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source, SourceId::new("A"));
    assert_eq!(report.failures[0].item.id, "L2");

    let x = report.summary(&SourceId::new("X")).expect("summary for X");
    assert_eq!(x.status, SourceStatus::Failed);
    assert_eq!(x.record_count, 1);
    assert_eq!(x.errors.len(), 1);
}

#[test]
fn time_buckets_group_by_month_and_day() {
    let records = vec![
        dated("1", Some(at(10, 3))),
        dated("2", Some(at(10, 3))),
        dated("3", Some(at(11, 14))),
        dated("4", None),
    ];
    let report = aggregate(vec![result("S", SourceStatus::Done, records)], at(12, 31), false);

    let months = report.time_buckets(BucketGranularity::Month);
    assert_eq!(months.get("2024-10"), Some(&2));
    assert_eq!(months.get("2024-11"), Some(&1));
    assert_eq!(months.get(UNDATED_BUCKET), Some(&1));

    let days = report.time_buckets(BucketGranularity::Day);
    assert_eq!(days.get("2024-10-03"), Some(&2));

    assert_eq!(report.period(), Some((at(10, 3), at(11, 14))));
}

#[test]
fn status_serializes_kebab_case() {
    let json = serde_json::to_string(&SourceStatus::DoneWithPartialFailures).unwrap();
    assert_eq!(json, "\"done-with-partial-failures\"");
    assert_eq!(SourceStatus::Failed.as_str(), "failed");
}

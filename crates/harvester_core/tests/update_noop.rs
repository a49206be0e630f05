use chrono::{TimeZone, Utc};
use harvester_core::{
    update, Batch, Cursor, RunSettings, SourceEffect, SourceId, SourceMsg, SourcePhase, SourceRun,
};

fn new_run() -> SourceRun {
    let at = Utc.with_ymd_and_hms(2024, 11, 20, 10, 0, 0).unwrap();
    SourceRun::new(SourceId::new("B"), &RunSettings::default(), at)
}

#[test]
fn out_of_phase_messages_are_ignored() {
    let run = new_run();
    let (next, effects) = update(run.clone(), SourceMsg::Persisted);

    assert_eq!(run, next);
    assert!(effects.is_empty());
}

#[test]
fn finished_run_ignores_every_message() {
    let (run, _) = update(new_run(), SourceMsg::Start { cached: None });
    let (run, _) = update(run, SourceMsg::Cancelled { attempts: 0 });
    assert_eq!(run.phase(), SourcePhase::Done);

    let (next, effects) = update(run.clone(), SourceMsg::Start { cached: None });
    assert_eq!(run, next);
    assert!(effects.is_empty());
}

#[test]
fn cached_batch_of_another_source_is_not_adopted() {
    let at = Utc.with_ymd_and_hms(2024, 11, 20, 10, 0, 0).unwrap();
    let mut foreign = Batch::empty(SourceId::new("other"), at);
    foreign.cursor = Some(Cursor::new("c7"));

    let (run, effects) = update(
        new_run(),
        SourceMsg::Start {
            cached: Some(foreign),
        },
    );

    assert_eq!(run.batch().source, SourceId::new("B"));
    assert!(matches!(
        effects.as_slice(),
        [SourceEffect::Discover { cursor: None, .. }]
    ));
}

//! Error handling and edge case tests.

use belltower::{
    AdminSurface, Capability, Engine, EngineConfig, Operation, Preset, Principal, ScheduleDate,
    ScheduleError, SchedulePatch, TokenTable,
};
use chrono::{Duration, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

fn date(d: u32) -> ScheduleDate {
    ScheduleDate::from_ymd(2024, 9, d).unwrap()
}

fn empty_preset(name: &str) -> Preset {
    Preset {
        preset: name.to_string(),
        periods: vec![],
        code: None,
        variant: None,
        name: None,
    }
}

fn admin_fixture() -> (Arc<Engine>, AdminSurface) {
    let engine = Arc::new(Engine::new(EngineConfig::default()));
    let tokens = TokenTable::new();
    tokens.insert(
        "admin",
        Principal::new(
            "admin",
            [
                Capability::Read,
                Capability::SingleWrite,
                Capability::BulkWrite,
            ],
        ),
    );
    let surface = AdminSurface::new(Arc::clone(&engine), Arc::new(tokens));
    (engine, surface)
}

// --- Authorization ---

#[test]
fn test_every_admin_call_rejects_unknown_tokens() {
    let (_engine, admin) = admin_fixture();

    assert!(matches!(
        admin.get_all_presets("bogus").unwrap_err(),
        ScheduleError::Unauthorized
    ));
    assert!(matches!(
        admin
            .add_holidays("bogus", date(2), date(6), "Break".to_string())
            .unwrap_err(),
        ScheduleError::Unauthorized
    ));
    assert!(matches!(
        admin
            .edit_schedule("bogus", date(2), SchedulePatch::default())
            .unwrap_err(),
        ScheduleError::Unauthorized
    ));
}

#[test]
fn test_denied_request_writes_nothing() {
    let (engine, admin) = admin_fixture();

    let _ = admin.add_holidays("bogus", date(2), date(6), "Break".to_string());

    assert!(engine.store().is_empty());
    assert!(engine.revisions().is_empty());
}

// --- Validation ---

#[test]
fn test_stale_freshness_marker_rejected_with_zero_writes() {
    let (engine, admin) = admin_fixture();
    admin.add_preset("admin", empty_preset("regular")).unwrap();

    let err = admin
        .autofill_schedule(
            "admin",
            date(2),
            date(6),
            vec!["regular".to_string()],
            vec![],
            Utc::now() - Duration::minutes(5),
        )
        .unwrap_err();

    assert!(matches!(err, ScheduleError::Validation(_)));
    assert!(engine.store().is_empty());
    assert!(engine.revisions().is_empty());
}

#[test]
fn test_future_freshness_marker_also_rejected() {
    let (engine, admin) = admin_fixture();
    admin.add_preset("admin", empty_preset("regular")).unwrap();

    let err = admin
        .autofill_schedule(
            "admin",
            date(2),
            date(6),
            vec!["regular".to_string()],
            vec![],
            Utc::now() + Duration::minutes(5),
        )
        .unwrap_err();

    assert!(matches!(err, ScheduleError::Validation(_)));
    assert!(engine.store().is_empty());
}

#[test]
fn test_reversed_range_is_an_empty_success() {
    let (engine, admin) = admin_fixture();
    admin.add_preset("admin", empty_preset("regular")).unwrap();

    let reply = admin
        .autofill_schedule(
            "admin",
            date(6),
            date(2),
            vec!["regular".to_string()],
            vec![],
            Utc::now(),
        )
        .unwrap();

    assert_eq!(reply, "Successfully updated 0 schedule(s).");
    assert!(engine.store().is_empty());
}

// --- Not Found ---

#[test]
fn test_missing_preset_names_the_preset() {
    let (engine, admin) = admin_fixture();

    let err = admin
        .add_from_preset("admin", date(2), "phantom".to_string())
        .unwrap_err();

    match err {
        ScheduleError::PresetNotFound(name) => assert_eq!(name, "phantom"),
        other => panic!("expected PresetNotFound, got {:?}", other),
    }
    assert!(engine.store().is_empty());
    assert!(engine.revisions().is_empty());
}

#[test]
fn test_autofill_rejects_first_missing_rotation_entry() {
    let (engine, admin) = admin_fixture();
    admin.add_preset("admin", empty_preset("real")).unwrap();

    let err = admin
        .autofill_schedule(
            "admin",
            date(2),
            date(6),
            vec!["real".to_string(), "phantom".to_string()],
            vec![],
            Utc::now(),
        )
        .unwrap_err();

    assert!(matches!(err, ScheduleError::PresetNotFound(_)));
    assert!(engine.store().is_empty());
}

// --- Retry Safety ---

#[test]
fn test_failed_then_retried_operation_applies_exactly_once() {
    let (engine, admin) = admin_fixture();
    admin.add_preset("admin", empty_preset("regular")).unwrap();

    // First attempt fails validation; the retry with a fresh marker lands.
    let _ = admin.autofill_schedule(
        "admin",
        date(2),
        date(6),
        vec!["regular".to_string()],
        vec![],
        Utc::now() - Duration::minutes(5),
    );
    admin
        .autofill_schedule(
            "admin",
            date(2),
            date(6),
            vec!["regular".to_string()],
            vec![],
            Utc::now(),
        )
        .unwrap();

    assert_eq!(engine.store().len(), 5);
    assert_eq!(engine.revisions().len(), 1);
}

#[test]
fn test_repeated_edit_converges_to_same_document() {
    let engine = Engine::new(EngineConfig::default());
    let operator = Principal::new("ops", [Capability::SingleWrite]);
    let patch = SchedulePatch {
        code: Some("C".to_string()),
        name: Some("Spirit Day".to_string()),
        ..Default::default()
    };

    for _ in 0..2 {
        engine
            .coordinator()
            .apply(
                &operator,
                Operation::EditSchedule {
                    date: date(3),
                    patch: patch.clone(),
                },
            )
            .unwrap();
    }

    let doc = engine.store().get(date(3)).unwrap();
    assert_eq!(doc.code.as_deref(), Some("C"));
    assert_eq!(doc.name.as_deref(), Some("Spirit Day"));
    // Two operations, two revisions, same final state.
    assert_eq!(engine.revisions().len(), 2);
}

#[test]
fn test_empty_rotation_is_a_validation_error() {
    let (engine, admin) = admin_fixture();

    let err = admin
        .autofill_schedule("admin", date(2), date(6), vec![], vec![], Utc::now())
        .unwrap_err();

    assert!(matches!(err, ScheduleError::Validation(_)));
    assert!(engine.store().is_empty());
}

#[test]
fn test_holiday_set_uses_canonical_date_equality() {
    let (engine, admin) = admin_fixture();
    admin.add_preset("admin", empty_preset("regular")).unwrap();

    // The same calendar day listed twice dedupes to one exclusion.
    let holidays: BTreeSet<_> = [date(4), date(4)].into_iter().collect();
    assert_eq!(holidays.len(), 1);

    admin
        .autofill_schedule(
            "admin",
            date(2),
            date(6),
            vec!["regular".to_string()],
            holidays.into_iter().collect(),
            Utc::now(),
        )
        .unwrap();

    assert_eq!(engine.store().len(), 4);
    assert!(engine.store().get(date(4)).is_none());
}

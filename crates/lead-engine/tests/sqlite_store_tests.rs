//! Engine and ledger behaviour on a SQLite file

mod common;

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use futures::future::join_all;
use leadroute_engine::config::DatabaseConfig;
use leadroute_engine::prelude::*;
use serde_json::json;
use tempfile::TempDir;

use common::*;

fn db_url(dir: &TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("leads.db").display())
}

async fn open(dir: &TempDir) -> Arc<LeadDatabase> {
    let config = DatabaseConfig {
        url: db_url(dir),
        max_connections: 4,
    };
    Arc::new(LeadDatabase::connect(&config).await.unwrap())
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

#[tokio::test]
async fn test_database_health_check() {
    let db = LeadDatabase::new_in_memory().await.unwrap();
    assert!(db.health_check().await);
    db.close().await;
    assert!(!db.health_check().await);
}

#[tokio::test]
async fn test_engine_flow_on_sqlite() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;
    db.upsert_handler(&Handler::new("asha", "Asha").with_team("west")).await.unwrap();
    db.upsert_handler(&Handler::new("ravi", "Ravi").with_team("west")).await.unwrap();
    db.upsert_rule(
        &AssignmentRule::new("retail", "Retail", RuleType::RoundRobin, 10)
            .with_condition(Condition::new("profile", Operator::Equals, json!("Retail")))
            .with_target(AssignmentTarget::new("asha"))
            .with_target(AssignmentTarget::new("ravi")),
    )
    .await
    .unwrap();

    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()));
    let engine = LeadEngine::new(EngineConfig::default(), Collaborators::database(db.clone()))
        .unwrap()
        .with_clock(clock.clone());

    let first = engine.create_enquiry(b2c("9876500001", ProfileType::Retail)).await.unwrap();
    let second = engine.create_enquiry(b2c("9876500002", ProfileType::Retail)).await.unwrap();
    assert_eq!(first.assigned_to, Some(HandlerId::new("asha")));
    assert_eq!(second.assigned_to, Some(HandlerId::new("ravi")));
    assert_eq!(first.version, 1);

    clock.advance(chrono::Duration::hours(2));
    let repeat = engine.create_enquiry(b2c("9876500001", ProfileType::Retail)).await.unwrap();
    assert!(repeat.is_duplicate);
    assert_eq!(repeat.duplicate_of, Some(first.id));

    let moved = engine
        .change_status(first.id, EnquiryStatus::InProgress, "asha")
        .await
        .unwrap();
    assert_eq!(moved.version, 2);
    assert_eq!(moved.stage, Stage::ActionInProgress);

    let reloaded = engine.get_enquiry(first.id).await.unwrap();
    assert_eq!(reloaded, moved);

    let kinds: Vec<AuditKind> = engine
        .audit_trail(first.id)
        .await
        .unwrap()
        .iter()
        .map(|r| r.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![AuditKind::Created, AuditKind::Assignment, AuditKind::StatusChange]
    );
}

#[tokio::test]
async fn test_stale_save_is_a_conflict() {
    let db = LeadDatabase::new_in_memory().await.unwrap();
    let engine = LeadEngine::new(EngineConfig::default(), Collaborators::database(Arc::new(db.clone()))).unwrap();
    let enquiry = engine.create_enquiry(b2c("9876500003", ProfileType::Retail)).await.unwrap();

    let mut first = enquiry.clone();
    first.push_remark("priya", "called", Utc::now());
    let saved = db.save(&first, &[]).await.unwrap();
    assert_eq!(saved.version, enquiry.version + 1);

    let mut stale = enquiry.clone();
    stale.push_remark("ravi", "also called", Utc::now());
    let err = db.save(&stale, &[]).await.unwrap_err();
    assert!(matches!(err, LeadError::Conflict(_)));

    let mut unknown = enquiry.clone();
    unknown.id = EnquiryId::new();
    let err = db.save(&unknown, &[]).await.unwrap_err();
    assert!(matches!(err, LeadError::NotFound(_)));
}

#[tokio::test]
async fn test_refused_audit_insert_rolls_back_the_transition() {
    let db = Arc::new(LeadDatabase::new_in_memory().await.unwrap());
    db.upsert_handler(&Handler::new("asha", "Asha")).await.unwrap();
    db.upsert_rule(&AssignmentRule::new("all", "All", RuleType::Fallback, 1).with_fallback("asha"))
        .await
        .unwrap();
    let engine = LeadEngine::new(EngineConfig::default(), Collaborators::database(db.clone())).unwrap();
    let enquiry = engine.create_enquiry(b2c("9876500020", ProfileType::Retail)).await.unwrap();
    let trail_before = engine.audit_trail(enquiry.id).await.unwrap().len();

    sqlx::query(
        "CREATE TRIGGER refuse_audit BEFORE INSERT ON audit_records
         BEGIN SELECT RAISE(ABORT, 'audit store unavailable'); END",
    )
    .execute(db.pool())
    .await
    .unwrap();

    let err = engine
        .change_status(enquiry.id, EnquiryStatus::InProgress, "asha")
        .await
        .unwrap_err();
    assert!(err.is_infrastructure());

    let current = engine.get_enquiry(enquiry.id).await.unwrap();
    assert_eq!(current.status, enquiry.status);
    assert_eq!(current.stage, enquiry.stage);
    assert_eq!(current.version, enquiry.version);
    assert_eq!(engine.audit_trail(enquiry.id).await.unwrap().len(), trail_before);

    sqlx::query("DROP TRIGGER refuse_audit").execute(db.pool()).await.unwrap();
    let moved = engine
        .change_status(enquiry.id, EnquiryStatus::InProgress, "asha")
        .await
        .unwrap();
    assert_eq!(moved.status, EnquiryStatus::InProgress);
    assert_eq!(moved.version, enquiry.version + 1);
}

#[tokio::test]
async fn test_rotation_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let rule = RuleId::new("rr");

    let db = open(&dir).await;
    assert_eq!(db.next_rotation(&rule, 3).await.unwrap(), 0);
    assert_eq!(db.next_rotation(&rule, 3).await.unwrap(), 1);
    db.close().await;

    let db = open(&dir).await;
    assert_eq!(db.next_rotation(&rule, 3).await.unwrap(), 2);
    assert_eq!(db.next_rotation(&rule, 3).await.unwrap(), 0);
    assert!(db.next_rotation(&rule, 0).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_daily_cap_under_concurrent_reservations() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;
    let handler = HandlerId::new("capped");

    let attempts = (0..50).map(|_| {
        let db = db.clone();
        let handler = handler.clone();
        tokio::spawn(async move { db.try_reserve_daily(&handler, day(), 5).await })
    });
    let granted = join_all(attempts)
        .await
        .into_iter()
        .filter(|r| *r.as_ref().unwrap().as_ref().unwrap())
        .count();

    assert_eq!(granted, 5);
    assert_eq!(db.daily_count(&handler, day()).await.unwrap(), 5);

    db.release_daily(&handler, day()).await.unwrap();
    assert_eq!(db.daily_count(&handler, day()).await.unwrap(), 4);
    assert!(db.try_reserve_daily(&handler, day(), 5).await.unwrap());

    // Counters are per day
    let tomorrow = day().succ_opt().unwrap();
    assert_eq!(db.daily_count(&handler, tomorrow).await.unwrap(), 0);
    assert!(db.try_reserve_daily(&handler, tomorrow, 5).await.unwrap());
}

#[tokio::test]
async fn test_unlimited_cap_still_counts() {
    let db = LeadDatabase::new_in_memory().await.unwrap();
    let handler = HandlerId::new("open");
    for _ in 0..3 {
        assert!(db.try_reserve_daily(&handler, day(), 0).await.unwrap());
    }
    assert_eq!(db.daily_count(&handler, day()).await.unwrap(), 3);
}

#[tokio::test]
async fn test_rule_store_round_trip() {
    let db = LeadDatabase::new_in_memory().await.unwrap();
    let low = AssignmentRule::new("low", "Low", RuleType::Fallback, 1).with_fallback("asha");
    let high = AssignmentRule::new("high", "High", RuleType::LoadBased, 9)
        .with_condition(Condition::new("city", Operator::In, json!(["Pune", "Mumbai"])))
        .with_target(AssignmentTarget::new("ravi").with_weight(2).with_daily_cap(10));
    db.upsert_rule(&low).await.unwrap();
    db.upsert_rule(&high).await.unwrap();

    let loaded = db.find_rule(&RuleId::new("high")).await.unwrap().unwrap();
    assert_eq!(loaded.assignment_to, high.assignment_to);
    assert_eq!(loaded.conditions, high.conditions);

    let ordered: Vec<String> = db
        .active_rules_by_priority_desc()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id.to_string())
        .collect();
    assert_eq!(ordered, vec!["high", "low"]);

    assert!(db.set_rule_active(&RuleId::new("high"), false).await.unwrap());
    assert!(!db.set_rule_active(&RuleId::new("missing"), false).await.unwrap());
    let active = db.active_rules_by_priority_desc().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, RuleId::new("low"));

    let invalid = AssignmentRule::new("broken", "Broken", RuleType::RoundRobin, 1)
        .with_target(AssignmentTarget::new("asha").with_weight(0));
    assert!(db.upsert_rule(&invalid).await.is_err());
}

#[tokio::test]
async fn test_handler_directory() {
    let db = LeadDatabase::new_in_memory().await.unwrap();
    db.upsert_handler(&Handler::new("asha", "Asha")).await.unwrap();
    db.upsert_handler(&Handler::new("gone", "Gone").inactive()).await.unwrap();

    let asha = db.find_handler(&HandlerId::new("asha")).await.unwrap().unwrap();
    assert!(asha.is_active);
    let gone = db.find_handler(&HandlerId::new("gone")).await.unwrap().unwrap();
    assert!(!gone.is_active);
    assert!(db.find_handler(&HandlerId::new("nobody")).await.unwrap().is_none());
    assert_eq!(db.list_handlers().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_open_load_counts_only_open_enquiries() {
    let db = Arc::new(LeadDatabase::new_in_memory().await.unwrap());
    db.upsert_handler(&Handler::new("asha", "Asha")).await.unwrap();
    db.upsert_rule(&AssignmentRule::new("all", "All", RuleType::Fallback, 1).with_fallback("asha"))
        .await
        .unwrap();
    let engine = LeadEngine::new(EngineConfig::default(), Collaborators::database(db.clone())).unwrap();

    let a = engine.create_enquiry(b2c("9876500010", ProfileType::Retail)).await.unwrap();
    engine.create_enquiry(b2c("9876500011", ProfileType::Retail)).await.unwrap();
    assert_eq!(db.count_open_for_handler(&HandlerId::new("asha")).await.unwrap(), 2);

    engine.change_status(a.id, EnquiryStatus::Archived, "asha").await.unwrap();
    assert_eq!(db.count_open_for_handler(&HandlerId::new("asha")).await.unwrap(), 1);

    let pending = db.list_by_stage(Stage::Assigned, 10).await.unwrap();
    assert_eq!(pending.len(), 1);
}

//! Subcommand handlers

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use leadroute_engine::database::LeadDatabase;
use leadroute_engine::enquiry::{HandlerId, NewEnquiry};
use leadroute_engine::repository::Handler;
use leadroute_engine::rules::AssignmentRule;
use leadroute_engine::{Collaborators, EngineConfig, LeadEngine};
use serde::Deserialize;
use tracing::info;

use crate::cli::{Command, EnquiryCommand};
use crate::output::Formatter;

/// Handlers and rules imported by `seed`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedFile {
    pub handlers: Vec<Handler>,
    pub rules: Vec<AssignmentRule>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

pub async fn execute(
    command: Command,
    config: EngineConfig,
    actor: &str,
    formatter: &Formatter,
) -> anyhow::Result<String> {
    let db = Arc::new(LeadDatabase::connect(&config.database).await?);
    let output = match command {
        Command::Seed { file } => {
            let seed: SeedFile = read_json(&file)?;
            seed_database(&db, seed, formatter).await
        }
        Command::Enquiry(command) => {
            let engine = LeadEngine::new(config, Collaborators::database(db.clone()))?;
            run(&engine, command, actor, formatter).await
        }
    };
    db.close().await;
    output
}

async fn run(
    engine: &LeadEngine,
    command: EnquiryCommand,
    actor: &str,
    formatter: &Formatter,
) -> anyhow::Result<String> {
    match command {
        EnquiryCommand::Create { file } => {
            let input: NewEnquiry = read_json(&file)?;
            let input = NewEnquiry {
                created_by: input.created_by.or_else(|| Some(actor.to_string())),
                ..input
            };
            formatter.enquiry(&engine.create_enquiry(input).await?)
        }
        EnquiryCommand::Status { id, status } => formatter.enquiry(&engine.change_status(id, status, actor).await?),
        EnquiryCommand::Profile { id, profile } => formatter.enquiry(&engine.identify_profile(id, profile, actor).await?),
        EnquiryCommand::Reassign { id, handler } => {
            let handler = HandlerId::new(handler.trim());
            formatter.enquiry(&engine.reassign_manually(id, &handler, actor).await?)
        }
        EnquiryCommand::Remark { id, text } => formatter.enquiry(&engine.add_remark(id, actor, &text).await?),
        EnquiryCommand::Call { id, next, note } => {
            formatter.enquiry(&engine.record_call(id, actor, next, note.as_deref()).await?)
        }
        EnquiryCommand::Show { id, trail } => {
            let enquiry = engine.get_enquiry(id).await?;
            if trail {
                let records = engine.audit_trail(id).await?;
                formatter.enquiry_with_trail(&enquiry, &records)
            } else {
                formatter.enquiry(&enquiry)
            }
        }
        EnquiryCommand::RetryPending { limit } => {
            let assigned = engine.retry_pending_assignments(actor, limit).await?;
            formatter.value(&serde_json::json!({ "assigned": assigned, "limit": limit }))
        }
    }
}

async fn seed_database(db: &LeadDatabase, seed: SeedFile, formatter: &Formatter) -> anyhow::Result<String> {
    for handler in &seed.handlers {
        db.upsert_handler(handler).await?;
    }
    for rule in &seed.rules {
        db.upsert_rule(rule)
            .await
            .with_context(|| format!("rule {} rejected", rule.id))?;
    }
    info!("🌱 Seeded {} handlers and {} rules", seed.handlers.len(), seed.rules.len());

    formatter.value(&serde_json::json!({
        "handlers": seed.handlers.len(),
        "rules": seed.rules.len(),
    }))
}

//! Output formatting

use colored::Colorize;
use leadroute_engine::audit::AuditRecord;
use leadroute_engine::enquiry::Enquiry;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::object::Rows;
use tabled::settings::{Alignment, Modify, Style};

use crate::cli::OutputFormat;

pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self { format, color_enabled }
    }

    pub fn enquiry(&self, enquiry: &Enquiry) -> anyhow::Result<String> {
        match self.format {
            OutputFormat::Json => json(enquiry),
            OutputFormat::Table => Ok(enquiry_table(enquiry)),
        }
    }

    pub fn enquiry_with_trail(&self, enquiry: &Enquiry, trail: &[AuditRecord]) -> anyhow::Result<String> {
        match self.format {
            OutputFormat::Json => json(&serde_json::json!({
                "enquiry": enquiry,
                "audit": trail,
            })),
            OutputFormat::Table => Ok(format!("{}\n{}", enquiry_table(enquiry), trail_table(trail))),
        }
    }

    /// Free-form JSON value (summaries of bulk commands)
    pub fn value(&self, value: &serde_json::Value) -> anyhow::Result<String> {
        match self.format {
            OutputFormat::Json => json(value),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                if let Some(map) = value.as_object() {
                    for (key, v) in map {
                        builder.push_record([key.clone(), plain(v)]);
                    }
                }
                let mut table = builder.build();
                table.with(Style::rounded());
                Ok(table.to_string())
            }
        }
    }

    pub fn error(&self, message: &str) -> String {
        if self.color_enabled {
            format!("✗ {}", message).red().to_string()
        } else {
            format!("✗ {}", message)
        }
    }
}

fn json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn plain(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn enquiry_table(enquiry: &Enquiry) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    builder.push_record(["id".to_string(), enquiry.id.to_string()]);
    builder.push_record(["mobile".to_string(), enquiry.mobile.clone()]);
    builder.push_record(["name".to_string(), enquiry.name.clone().unwrap_or_default()]);
    builder.push_record(["lead_type".to_string(), enquiry.lead_type().as_str().to_string()]);
    builder.push_record(["profile".to_string(), enquiry.profile.to_string()]);
    builder.push_record(["status".to_string(), enquiry.status.to_string()]);
    builder.push_record(["stage".to_string(), enquiry.stage.to_string()]);
    builder.push_record(["priority".to_string(), enquiry.priority.as_str().to_string()]);
    builder.push_record([
        "assigned_to".to_string(),
        enquiry.assigned_to.as_ref().map(|h| h.to_string()).unwrap_or_default(),
    ]);
    builder.push_record(["team".to_string(), enquiry.assigned_team.clone().unwrap_or_default()]);
    if let Some(original) = enquiry.duplicate_of {
        builder.push_record(["duplicate_of".to_string(), original.to_string()]);
    }
    builder.push_record(["remarks".to_string(), enquiry.remarks.len().to_string()]);
    builder.push_record(["version".to_string(), enquiry.version.to_string()]);

    let mut table = builder.build();
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
    table.to_string()
}

fn trail_table(trail: &[AuditRecord]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["When", "Kind", "Status", "Stage", "Actor", "Reason"]);
    for record in trail {
        let status = match record.old_status {
            Some(old) if old != record.new_status => format!("{} → {}", old, record.new_status),
            _ => record.new_status.to_string(),
        };
        builder.push_record([
            record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            record.kind.as_str().to_string(),
            status,
            record.new_stage.to_string(),
            record.actor.clone(),
            record.reason.clone(),
        ]);
    }

    let mut table = builder.build();
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
    table.to_string()
}

//! Command-line arguments

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use leadroute_engine::enquiry::{EnquiryId, EnquiryStatus, ProfileType};

#[derive(Parser, Debug)]
#[command(name = "leadroute", version, about = "Route and track inbound enquiries")]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, env = "LEADROUTE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database URL, overrides the configuration file
    #[arg(long, global = true, env = "LEADROUTE_DATABASE")]
    pub database: Option<String>,

    /// Who is acting; recorded in remarks and the audit trail
    #[arg(long, global = true, env = "LEADROUTE_ACTOR", default_value = "cli")]
    pub actor: String,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import handlers and assignment rules from a JSON file
    Seed {
        file: PathBuf,
    },

    #[command(flatten)]
    Enquiry(EnquiryCommand),
}

/// Subcommands that run through the engine
#[derive(Subcommand, Debug)]
pub enum EnquiryCommand {
    /// Create an enquiry from a JSON intake payload
    Create {
        file: PathBuf,
    },

    /// Move an enquiry to a new status
    Status {
        id: EnquiryId,
        #[arg(value_parser = parse_status)]
        status: EnquiryStatus,
    },

    /// Record the telecaller's profile classification
    Profile {
        id: EnquiryId,
        #[arg(value_parser = parse_profile)]
        profile: ProfileType,
    },

    /// Hand an enquiry to a specific handler
    Reassign {
        id: EnquiryId,
        handler: String,
    },

    /// Append a remark
    Remark {
        id: EnquiryId,
        text: String,
    },

    /// Log a call and optionally schedule the next follow-up
    Call {
        id: EnquiryId,
        /// Next follow-up (RFC 3339)
        #[arg(long)]
        next: Option<DateTime<Utc>>,
        #[arg(long)]
        note: Option<String>,
    },

    /// Show an enquiry
    Show {
        id: EnquiryId,
        /// Include the audit trail
        #[arg(long)]
        trail: bool,
    },

    /// Retry enquiries waiting in Assignment Pending
    RetryPending {
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
}

fn parse_status(s: &str) -> Result<EnquiryStatus, String> {
    s.parse()
}

fn parse_profile(s: &str) -> Result<ProfileType, String> {
    s.parse()
}

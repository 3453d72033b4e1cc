// src/main.rs
//
// Thin CLI over the leave ledger, backed by a JSON state file. Handy for
// poking at allocation behaviour without a database or web frontend.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use franvaro_core::{
    AllocationMode, AllocationRequest, FileLedger, LeaveGrant, LeaveLedger, LeavePolicy,
    LeaveUnit, MinUnit, RequestDetail, StaticPolicyStore, SystemClock, TracingAuditSink,
    WeekdayCalendar,
};

const DEFAULT_STATE_FILE: &str = "./ledger_state.json";

#[derive(Parser)]
#[command(name = "franvaro", about = "Leave balance allocation ledger")]
struct Cli {
    /// Path to the JSON ledger state file (env: LEDGER_STATE_FILE).
    #[arg(long)]
    state_file: Option<String>,

    #[arg(long, default_value = "default")]
    company: String,

    /// Reject dates the calendar marks as non-business days.
    #[arg(long)]
    business_day_only: bool,

    /// Blackout date, repeatable.
    #[arg(long = "blackout")]
    blackout_dates: Vec<NaiveDate>,

    /// Let grant balances go negative instead of failing on shortfall.
    #[arg(long)]
    allow_negative: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a grant (what the accrual process would do).
    SeedGrant {
        #[arg(long)]
        id: String,
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "vacation")]
        leave_type: String,
        /// Entitlement in hours.
        #[arg(long)]
        quantity: Decimal,
        #[arg(long)]
        granted_on: NaiveDate,
        #[arg(long)]
        expires_on: Option<NaiveDate>,
    },
    /// Reserve or book hours for a request.
    Allocate {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "vacation")]
        leave_type: String,
        #[arg(long)]
        request: String,
        #[arg(long, default_value = "8")]
        hours_per_day: Decimal,
        /// Minimum booking unit: 1h, 0.5d or 1d.
        #[arg(long, default_value = "1h")]
        min_unit: MinUnit,
        /// hold or confirm.
        #[arg(long, default_value = "hold", value_parser = parse_mode)]
        mode: AllocationMode,
        /// Demand line as DATE:HOURS, repeatable.
        #[arg(long = "line", value_parser = parse_line, required = true)]
        lines: Vec<RequestDetail>,
        /// Manual grant priority override, repeatable, exhaustive.
        #[arg(long = "grant")]
        grants: Vec<String>,
    },
    /// Approve a held request.
    Confirm {
        #[arg(long)]
        request: String,
    },
    /// Cancel a held request before approval.
    Release {
        #[arg(long)]
        request: String,
    },
    /// Undo an approved request.
    Reverse {
        #[arg(long)]
        request: String,
        #[arg(long)]
        reason: String,
    },
    /// List grant balances in priority order.
    Grants {
        #[arg(long)]
        user: String,
        #[arg(long)]
        leave_type: Option<String>,
    },
}

fn parse_mode(s: &str) -> Result<AllocationMode, String> {
    match s {
        "hold" => Ok(AllocationMode::Hold),
        "confirm" => Ok(AllocationMode::Confirm),
        other => Err(format!("unknown mode '{}' (expected hold or confirm)", other)),
    }
}

fn parse_line(s: &str) -> Result<RequestDetail, String> {
    let (date_str, hours_str) = s
        .split_once(':')
        .ok_or_else(|| format!("expected DATE:HOURS, got '{}'", s))?;
    let date: NaiveDate = date_str
        .parse()
        .map_err(|e| format!("bad date '{}': {}", date_str, e))?;
    let hours: Decimal = hours_str
        .parse()
        .map_err(|e| format!("bad hours '{}': {}", hours_str, e))?;
    Ok(RequestDetail {
        start_at: date.and_hms_opt(9, 0, 0).unwrap(),
        end_at: date.and_hms_opt(17, 0, 0).unwrap(),
        unit: LeaveUnit::Hour,
        quantity: hours,
    })
}

fn main() -> Result<()> {
    dotenv().ok();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::default().add_directive(Level::INFO.into())),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting tracing subscriber failed")?;

    let cli = Cli::parse();
    let state_file = cli
        .state_file
        .clone()
        .or_else(|| std::env::var("LEDGER_STATE_FILE").ok())
        .unwrap_or_else(|| DEFAULT_STATE_FILE.to_string());
    info!(%state_file, "opening ledger");

    let policy = LeavePolicy {
        business_day_only: cli.business_day_only,
        blackout_dates: cli.blackout_dates.iter().copied().collect::<BTreeSet<_>>(),
        allow_negative: cli.allow_negative,
    };
    let ledger = LeaveLedger::new(
        FileLedger::new(&state_file),
        Arc::new(WeekdayCalendar),
        Arc::new(StaticPolicyStore::new(policy)),
        Arc::new(TracingAuditSink),
        Arc::new(SystemClock),
        cli.company.clone(),
    );

    match cli.command {
        Command::SeedGrant {
            id,
            user,
            leave_type,
            quantity,
            granted_on,
            expires_on,
        } => {
            ledger.add_grant(LeaveGrant {
                id,
                user_id: user,
                leave_type_id: leave_type,
                quantity,
                granted_on,
                expires_on,
            })?;
            println!("grant stored");
        }
        Command::Allocate {
            user,
            leave_type,
            request,
            hours_per_day,
            min_unit,
            mode,
            lines,
            grants,
        } => {
            let rows = ledger.allocate(AllocationRequest {
                user_id: user,
                leave_type_id: leave_type,
                request_id: request,
                hours_per_day,
                min_unit,
                details: lines,
                mode,
                manual_grant_ids: if grants.is_empty() { None } else { Some(grants) },
            })?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Command::Confirm { request } => {
            ledger.confirm(&request)?;
            println!("request {request} confirmed");
        }
        Command::Release { request } => {
            ledger.release(&request)?;
            println!("request {request} released");
        }
        Command::Reverse { request, reason } => {
            let count = ledger.reverse(&request, &reason)?;
            println!("request {request} reversed ({count} rows)");
        }
        Command::Grants { user, leave_type } => {
            let balances = ledger.list_grants(&user, leave_type.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&balances)?);
        }
    }

    Ok(())
}

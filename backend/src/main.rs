use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use field_ledger::domain::{ActivityTypeFilter, CancelEntryCommand, LedgerFilter};
use field_ledger::storage::csv::DATA_DIR_ENV;
use field_ledger::FieldLedger;

#[derive(Parser, Debug)]
#[command(name = "field-ledger")]
#[command(about = "Field activity ledger for organic production plans")]
struct Args {
    /// Data directory (defaults to ~/Documents/Field Ledger)
    #[arg(long, env = DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summary line for every plan in the data directory
    Plans,
    /// Print the ledger of one plan
    List {
        #[arg(long)]
        plan: i64,
        /// Activity type, e.g. Colheita or Manejo ("all" for every type)
        #[arg(long = "type", default_value = "all")]
        activity_type: String,
        #[arg(long)]
        product: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        include_cancelled: bool,
        /// First day, YYYY-MM-DD
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day, YYYY-MM-DD
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Soft-cancel an entry
    Cancel {
        #[arg(long)]
        plan: i64,
        #[arg(long)]
        id: String,
        #[arg(long)]
        reason: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let ledger = match &args.data_dir {
        Some(dir) => FieldLedger::open(dir)?,
        None => FieldLedger::open_default()?,
    };

    match args.command {
        Command::Plans => print_plans(&ledger),
        Command::List {
            plan,
            activity_type,
            product,
            location,
            include_cancelled,
            from,
            to,
        } => {
            let activity_type = ActivityTypeFilter::parse(&activity_type)
                .ok_or_else(|| anyhow!("unknown activity type '{}'", activity_type))?;
            let filter = LedgerFilter {
                include_cancelled,
                activity_type,
                product,
                location,
                date_from: from,
                date_to: to,
            };
            print_ledger(&ledger, plan, &filter)
        }
        Command::Cancel { plan, id, reason } => {
            let entries = ledger.ledger_service.list_entries(plan, None)?;
            let entry = entries
                .iter()
                .find(|e| e.id == id)
                .with_context(|| format!("no entry {} in plan {}", id, plan))?;
            let cancelled = ledger
                .ledger_service
                .cancel_entry(entry, CancelEntryCommand { reason })?;
            info!("Entry {} is now {}", cancelled.id, cancelled.activity_type);
            Ok(())
        }
    }
}

fn print_plans(ledger: &FieldLedger) -> Result<()> {
    for plan_id in ledger.connection.list_plan_ids()? {
        let entries = ledger.ledger_service.list_entries(plan_id, None)?;
        let summary = ledger.table_service.summarize(plan_id, &entries);
        println!(
            "plan {:>4}  {:>4} active  {:>4} cancelled  {}",
            summary.plan_id,
            summary.active_entries,
            summary.cancelled_entries,
            summary.production_total
        );
    }
    Ok(())
}

fn print_ledger(ledger: &FieldLedger, plan_id: i64, filter: &LedgerFilter) -> Result<()> {
    let entries = ledger.ledger_service.list_entries(plan_id, Some(filter))?;
    for row in ledger.table_service.format_entries_for_table(&entries) {
        println!(
            "{}  {:<28} {:<20} {:<30} {:>12}  {}",
            row.formatted_date,
            row.activity_label,
            row.product,
            row.locations,
            row.formatted_quantity,
            row.details_summary
        );
    }

    let summary = ledger.table_service.summarize(plan_id, &entries);
    println!(
        "{} entries, {} cancelled, production {}",
        summary.active_entries, summary.cancelled_entries, summary.production_total
    );
    Ok(())
}

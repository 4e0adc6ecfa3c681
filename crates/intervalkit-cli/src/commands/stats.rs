use chrono::{Duration, Local, TimeZone, Utc};
use clap::Subcommand;
use intervalkit_core::SqliteStore;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's stats per timer kind
    Today,
    /// Stats for the last N hours
    Recent {
        #[arg(long, default_value = "24")]
        hours: i64,
    },
    /// All-time stats
    All,
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = SqliteStore::open()?;

    let since = match action {
        StatsAction::Today => {
            let midnight = Local::now()
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .and_then(|t| Local.from_local_datetime(&t).earliest())
                .map(|t| t.with_timezone(&Utc));
            Some(midnight.ok_or("could not determine local midnight")?)
        }
        StatsAction::Recent { hours } => Some(Utc::now() - Duration::hours(hours.max(0))),
        StatsAction::All => None,
    };
    let stats = db.stats_summary(since)?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

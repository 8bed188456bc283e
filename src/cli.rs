use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Days, Local};
use clap::{Parser, Subcommand};
use log::info;
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    config::PipelineConfig,
    db::Database,
    generator::{parse_target_date, resolve_target_date, UsageGenerator},
    ingest::Ingestor,
    pipeline::Pipeline,
    utils::logging::init_logging,
};

#[derive(Parser, Debug)]
#[command(name = "usage-graph")]
#[command(author, version, about = "Generate app-usage data and load it into a usage graph")]
pub struct Cli {
    /// JSON config file; defaults are used when it does not exist
    #[arg(long, global = true, default_value = "usage-graph.json")]
    pub config: PathBuf,

    /// Override the directory usage files are written to and read from
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override the graph database file
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate usage records for the configured (or given) users
    Generate {
        /// User ids; defaults to the configured users
        #[arg(long, num_args = 1..)]
        users: Vec<String>,
        /// Target date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<String>,
        /// Consecutive days to generate, starting at the target date
        #[arg(long, default_value_t = 1)]
        days: u32,
        /// Write files instead of printing the records
        #[arg(long)]
        save: bool,
    },
    /// Load new usage files into the graph
    Ingest,
    /// Print the ingestion watermark and graph totals
    Heartbeat,
    /// Run generate then ingest for one execution date, with retries
    Run {
        #[arg(long)]
        execution_date: Option<String>,
    },
    /// Run every day from N days ago through today, oldest first
    Backfill {
        /// Defaults to the configured historical window
        #[arg(long)]
        days: Option<u32>,
    },
    /// Write the effective configuration to the config path
    InitConfig,
}

impl Cli {
    fn effective_config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::load(&self.config)?;
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(path) = &self.database {
            config.database_path = path.clone();
        }
        Ok(config)
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = cli.effective_config()?;
    if let Some(path) = init_logging(config.log_dir.as_deref())? {
        info!("Logging to {}", path.display());
    }

    match cli.command {
        Command::Generate {
            users,
            date,
            days,
            save,
        } => {
            let users = if users.is_empty() {
                config.users.clone()
            } else {
                users
            };
            let start = resolve_target_date(date.as_deref(), None)?;
            let mut generator = UsageGenerator::new(config.catalog.clone(), StdRng::from_entropy())?;
            let save_to = save.then_some(config.data_dir.as_path());

            for offset in 0..days.max(1) {
                let date = start
                    .checked_add_days(Days::new(u64::from(offset)))
                    .context("date out of range")?;
                let records = generator.generate_batch(&users, date, save_to)?;
                if !save {
                    println!("{}", serde_json::to_string_pretty(&records)?);
                }
            }
        }
        Command::Ingest => {
            let db = Database::new(config.database_path.clone())?;
            let report = Ingestor::new(db, config.data_dir.clone(), config.validation_mode())
                .run()
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Heartbeat => {
            let db = Database::new(config.database_path.clone())?;
            let summary = db.graph_summary().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Run { execution_date } => {
            let date = match execution_date.as_deref() {
                Some(raw) => parse_target_date(raw)?,
                None => Local::now().date_naive(),
            };
            let db = Database::new(config.database_path.clone())?;
            let report = Pipeline::new(config, db).run_day(date).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Backfill { days } => {
            let days = days.unwrap_or(config.schedule.historical_days);
            let db = Database::new(config.database_path.clone())?;
            let reports = Pipeline::new(config, db)
                .backfill(Local::now().date_naive(), days)
                .await?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        Command::InitConfig => {
            config.save(&cli.config)?;
            info!("Wrote configuration to {}", cli.config.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_generate_flags() {
        let cli = Cli::try_parse_from([
            "usage-graph",
            "--data-dir",
            "/tmp/usage",
            "generate",
            "--users",
            "a@x.com",
            "b@x.com",
            "--date",
            "2024-01-01",
            "--save",
        ])
        .unwrap();

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/usage")));
        match cli.command {
            Command::Generate {
                users, date, days, save,
            } => {
                assert_eq!(users, vec!["a@x.com", "b@x.com"]);
                assert_eq!(date.as_deref(), Some("2024-01-01"));
                assert_eq!(days, 1);
                assert!(save);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}

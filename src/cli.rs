//! CLI interface for itrack

use crate::catalog::parse_catalog_file;
use crate::config::Settings;
use crate::impact::ImpactReport;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::server;
use crate::store::Store;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

/// itrack - IT asset and process tracker
#[derive(Parser, Debug)]
#[command(name = "itrack")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Track systems, scripts, workflows, boards and planning", long_about = None)]
pub struct Cli {
    /// Settings file (TOML or YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database path (overrides settings)
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json or pretty)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        /// Listen address (overrides settings)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Create the database schema and exit
    InitDb,

    /// Import a YAML system catalog
    ImportCatalog {
        /// Path to catalog YAML file
        file: PathBuf,
    },

    /// Show which systems are affected if a system fails
    Impact {
        /// System name or numeric id
        system: String,
    },

    /// Show dashboard counts
    Stats,
}

impl Cli {
    /// Load layered settings, then apply the command-line overrides.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref())?;
        if let Some(path) = &self.db_path {
            settings.database.path = path.clone();
        }
        if let Some(level) = &self.log_level {
            settings.logging.level = LogLevel::from(level.as_str());
        }
        if let Some(format) = &self.log_format {
            settings.logging.format = LogFormat::from(format.as_str());
        }
        if let Commands::Serve { bind: Some(bind) } = &self.command {
            settings.server.bind = bind.clone();
        }
        Ok(settings)
    }

    /// Initialize logging from the merged settings
    pub fn init_logging(&self, settings: &Settings) -> anyhow::Result<()> {
        init_logging(&settings.logging)
    }

    /// Execute the CLI command
    pub async fn execute(&self, settings: &Settings) -> anyhow::Result<()> {
        let store = open_store(&settings.database.path)?;
        match &self.command {
            Commands::Serve { .. } => {
                server::run(store, &settings.server.bind).await?;
            }
            Commands::InitDb => {
                println!("Database ready at {}", settings.database.path.display());
            }
            Commands::ImportCatalog { file } => {
                self.import_catalog(&store, file)?;
            }
            Commands::Impact { system } => {
                self.show_impact(&store, system)?;
            }
            Commands::Stats => {
                self.show_stats(&store)?;
            }
        }
        Ok(())
    }

    fn import_catalog(&self, store: &Store, file: &Path) -> anyhow::Result<()> {
        info!("Loading system catalog from: {:?}", file);
        let catalog = parse_catalog_file(file)?;
        let summary = store.import_catalog(&catalog)?;

        println!("Systems created:        {}", summary.systems_created);
        println!("Systems updated:        {}", summary.systems_updated);
        println!("Relationships created:  {}", summary.relationships_created);
        if !summary.missing.is_empty() {
            println!("\nInputs naming unknown systems:");
            for missing in &summary.missing {
                println!("  {} <- {}", missing.system, missing.input);
            }
        }
        Ok(())
    }

    fn show_impact(&self, store: &Store, system: &str) -> anyhow::Result<()> {
        let id = match system.parse::<i64>() {
            Ok(id) => id,
            Err(_) => store
                .find_system_by_name(system)?
                .map(|s| s.id)
                .ok_or_else(|| anyhow::anyhow!("No system named '{}'", system))?,
        };

        let report = store.impact_analysis(id)?;
        print_impact(&report);
        Ok(())
    }

    fn show_stats(&self, store: &Store) -> anyhow::Result<()> {
        let stats = store.dashboard_stats()?;

        println!("\nSystems:     {}", stats.system_count);
        println!("Workflows:   {}", stats.workflow_count);
        println!("Scripts:     {}", stats.script_count);
        println!("{:-<40}", "");
        println!("Active systems:      {}", stats.active_systems);
        println!("Deprecated systems:  {}", stats.deprecated_systems);

        println!("\nBy category:");
        for count in &stats.category_counts {
            println!("  {:<24} {}", count.label, count.count);
        }
        println!("\nBy status:");
        for count in &stats.status_counts {
            println!("  {:<24} {}", count.label, count.count);
        }
        println!();
        Ok(())
    }
}

fn open_store(path: &Path) -> anyhow::Result<Store> {
    let store = Store::new(path)?;
    info!("Opened database: {:?}", path);
    Ok(store)
}

fn print_impact(report: &ImpactReport) {
    println!("\nImpact of losing '{}'", report.source.name);
    if report.affected.is_empty() {
        println!("No other system depends on it.");
        return;
    }

    println!(
        "{} systems affected, max depth {}{}",
        report.total_affected(),
        report.max_depth,
        if report.has_cycles {
            " (downstream dependencies contain cycles)"
        } else {
            ""
        }
    );
    println!();
    println!("{:<6} {:<30} {}", "Level", "System", "Path");
    println!("{:-<78}", "");
    for affected in &report.affected {
        let path: Vec<&str> = affected.path.iter().map(|step| step.name.as_str()).collect();
        println!(
            "{:<6} {:<30} {}",
            affected.impact_level,
            affected.name,
            path.join(" -> ")
        );
    }
    println!();
}

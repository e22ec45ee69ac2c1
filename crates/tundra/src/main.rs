use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tundra::config::Settings;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file; defaults to $TUNDRA_CONFIG_PATH or crates/tundra/config/default.toml.
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the table the settings describe and how it would be partitioned.
    Plan,
    /// Write, scan and look up generated rows on an in-process cluster.
    Demo {
        #[arg(long, default_value_t = 1000)]
        rows: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tundra=info,tundra_connector_tablet=info,warn")),
        )
        .init();

    let args = Args::parse();
    let settings = match &args.config {
        Some(path) => Settings::from_path(path),
        None => Settings::new(),
    }
    .context("loading settings")?;
    info!("Using table {} on masters {}", settings.table.name, settings.masters);

    match args.command {
        Command::Plan => {
            print!("{}", tundra::plan::describe(&settings)?);
        }
        Command::Demo { rows } => {
            let report = tundra::demo::run(&settings, rows).await?;
            println!(
                "Stored {} row(s) in {} tablet(s); scanned {} row(s) from {} split(s)",
                report.rows_stored,
                report.tablets,
                report.rows_scanned(),
                report.splits.len()
            );
            for split in report.splits.iter() {
                println!("  split {}: {} row(s) on [{}]", split.index, split.rows, split.locations.join(", "));
            }
            println!("Lookup {:?} returned {} row(s)", report.lookup_key, report.lookup_rows.len());
        }
    }
    Ok(())
}

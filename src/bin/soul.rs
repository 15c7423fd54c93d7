#![forbid(unsafe_code)]

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};

use soul_layer::store::DiagnosisStore;
use soul_layer::{normalize, Config, Diagnoser, Slot, Theme};

#[derive(Parser)]
#[command(name = "soul", version, about = "Soul Layer diagnosis CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a request and print the diagnosis as JSON
    Diagnose {
        /// Path to request JSON, or `-` for stdin
        #[arg(long)]
        request: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Overrides any user id in the request; results are recorded when a user is known
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        store: Option<PathBuf>,
        /// Use template copy even if LLM enhancement is configured
        #[arg(long)]
        no_llm: bool,
    },
    /// Print the daily question for a user's slot
    Questions {
        /// morning, noon or night; defaults to the current local slot
        #[arg(long)]
        slot: Option<String>,
        #[arg(long)]
        theme: Option<String>,
        #[arg(long, default_value = "anonymous")]
        user: String,
        /// YYYY-MM-DD; defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        no_llm: bool,
    },
    /// Print a user's recorded results as JSONL, newest first
    History {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Export every recorded result to JSONL
    Export {
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,soul_layer=debug".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Diagnose {
            request,
            out,
            user,
            store,
            no_llm,
        } => {
            let config = apply_overrides(config, store, no_llm);
            let payload: serde_json::Value = serde_json::from_str(&read_input(&request)?)?;
            let mut req = normalize(&payload)?;
            if user.is_some() {
                req.user_id = user;
            }

            let mut diagnoser = Diagnoser::new(config.copy_selector()?);
            if req.user_id.is_some() {
                diagnoser = diagnoser.with_store(Arc::new(config.open_store()?));
            }

            let response = diagnoser.diagnose(&req, None).await?;
            match out {
                Some(path) => write_json(&path, &response)?,
                None => println!("{}", serde_json::to_string_pretty(&response)?),
            }
        }
        Commands::Questions {
            slot,
            theme,
            user,
            date,
            no_llm,
        } => {
            let config = apply_overrides(config, None, no_llm);
            let now = Local::now().naive_local();
            let slot = match slot {
                Some(raw) => Slot::parse(&raw).ok_or_else(|| format!("unknown slot `{raw}`"))?,
                None => Slot::at(&now),
            };
            let theme = match theme {
                Some(raw) => Some(Theme::parse(&raw).ok_or_else(|| format!("unknown theme `{raw}`"))?),
                None => None,
            };
            let date = date.unwrap_or_else(|| now.date());

            let generator = config.question_generator()?;
            let question = generator.generate(slot, theme, &user, date, None).await;
            println!("{}", serde_json::to_string_pretty(&question)?);
        }
        Commands::History { user, limit, store } => {
            let config = apply_overrides(config, store, true);
            let store = config.open_store()?;
            for record in store.history(&user, limit).await? {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
        Commands::Export { out, store } => {
            let config = apply_overrides(config, store, true);
            let store = config.open_store()?;
            let written = store.export_jsonl(&out).await?;
            eprintln!("exported {written} records to {}", out.display());
        }
    }

    Ok(())
}

fn apply_overrides(config: Config, store: Option<PathBuf>, no_llm: bool) -> Config {
    let config = match store {
        Some(path) => config.with_store_path(path),
        None => config,
    };
    if no_llm {
        config.without_llm()
    } else {
        config
    }
}

fn read_input(path: &PathBuf) -> Result<String, io::Error> {
    if path.as_os_str() == "-" {
        let mut raw = String::new();
        io::stdin().read_to_string(&mut raw)?;
        return Ok(raw);
    }
    std::fs::read_to_string(path)
}

fn write_json<T: serde::Serialize>(path: &PathBuf, value: &T) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    std::fs::write(path, json)
}

//! SafeScape CLI - drive a learner's course progress from the terminal.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use safescape_core::{ModuleNum, ProgressDocument, SectionValue};
use safescape_progress::{
    EmbedForwarder, HttpProgressClient, Identity, ProgressTracker, RemoteConfig, TrackerConfig,
};
use safescape_storage::JsonStorage;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "safescape")]
#[command(about = "SafeScape course progress tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding local progress
    #[arg(long, env = "SAFESCAPE_STORAGE", default_value = ".safescape")]
    storage: PathBuf,

    /// Backend origin for remote sync
    #[arg(long, env = "SAFESCAPE_API_URL")]
    api_url: Option<String>,

    /// Signed-in learner id; omit for guest mode
    #[arg(long, env = "SAFESCAPE_USER_ID")]
    user_id: Option<String>,

    /// Learner display name supplied by the host
    #[arg(long, env = "SAFESCAPE_USER_NAME")]
    user_name: Option<String>,

    /// Session credential sent to the backend
    #[arg(long, env = "SAFESCAPE_SESSION")]
    session: Option<String>,

    /// Write every progress event to stdout as a JSON message line
    #[arg(long)]
    emit_events: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show overall progress
    Show,
    /// Show one module
    Module {
        /// Module number (1-5)
        module: u8,
    },
    /// Record a section value
    Complete {
        /// Module number (1-5)
        module: u8,
        /// Section key, e.g. quizPassed
        section: String,
        /// Value as JSON (true, 80, [true,null]); defaults to true
        value: Option<String>,
    },
    /// Award the course certificate
    Certify,
    /// Set the learner's display name
    Name {
        /// Display name
        name: String,
    },
    /// Export progress as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Import progress from a JSON file
    Import {
        /// File to import
        file: PathBuf,
    },
    /// Discard all local progress
    Reset,
    /// Merge the server's progress into local progress
    Sync,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout is reserved for exported JSON and event messages
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let storage = JsonStorage::new(&cli.storage)
        .await
        .with_context(|| format!("Failed to open storage at {}", cli.storage.display()))?;
    let mut tracker = ProgressTracker::new(Arc::new(storage), TrackerConfig::default());

    if let Some(api_url) = &cli.api_url {
        let mut config = RemoteConfig::new(api_url);
        if let Some(session) = &cli.session {
            config = config.with_session(session);
        }
        let identity = cli.user_id.as_ref().map(|id| {
            let identity = Identity::new(id);
            match &cli.user_name {
                Some(name) => identity.with_name(name),
                None => identity,
            }
        });
        tracker = tracker.with_remote(Arc::new(HttpProgressClient::new(&config)), identity);
    }

    let _events = cli
        .emit_events
        .then(|| tracker.subscribe(EmbedForwarder::new(std::io::stdout())));

    // with an event stream on stdout, human output moves to stderr
    let mut out: Box<dyn Write> = if cli.emit_events {
        Box::new(std::io::stderr())
    } else {
        Box::new(std::io::stdout())
    };

    run(&tracker, cli.command, &mut out, cli.emit_events).await?;

    let synced = tracker.flush().await;
    if synced > 0 {
        info!("Synced {} update(s)", synced);
    }
    Ok(())
}

async fn run(
    tracker: &ProgressTracker,
    command: Commands,
    out: &mut dyn Write,
    emit_events: bool,
) -> Result<()> {
    match command {
        Commands::Show => {
            let doc = tracker.progress().await;
            print_summary(out, &doc, &tracker.student_name().await)?;
        }
        Commands::Module { module } => {
            let n = ModuleNum::new(module).context("Module must be between 1 and 5")?;
            let doc = tracker.progress().await;
            let m = doc.module(n);
            writeln!(out, "Module {}", n)?;
            writeln!(out, "  Unlocked: {}", m.unlocked)?;
            writeln!(out, "  Completed: {}", m.completed)?;
            writeln!(out, "  Sections filled: {}%", tracker.module_progress(module).await)?;
            for (key, value) in &m.sections {
                writeln!(out, "    {}: {}", key, serde_json::to_string(value)?)?;
            }
        }
        Commands::Complete { module, section, value } => {
            let value = value
                .as_deref()
                .map(SectionValue::parse_loose)
                .unwrap_or(SectionValue::Flag(true));
            let doc = tracker.complete_section(module, &section, value).await;
            if let Some(n) = ModuleNum::new(module) {
                let m = doc.module(n);
                writeln!(
                    out,
                    "Module {}: {} | next unlocked: {}",
                    n,
                    if m.completed { "COMPLETED" } else { "IN PROGRESS" },
                    n.next().map(|next| doc.module(next).unlocked).unwrap_or(false),
                )?;
            }
            writeln!(out, "Overall: {}%", doc.overall_progress)?;
        }
        Commands::Certify => {
            let doc = tracker.award_certificate().await;
            writeln!(out, "Certificate awarded to {}", tracker.student_name().await)?;
            writeln!(out, "Overall: {}%", doc.overall_progress)?;
        }
        Commands::Name { name } => {
            tracker.set_student_name(name).await;
            writeln!(out, "Name set to {}", tracker.student_name().await)?;
        }
        Commands::Export { output } => {
            let json = tracker.export_json().await;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, json)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    writeln!(out, "Exported to {}", path.display())?;
                }
                // keep stdout line-delimited alongside the event stream
                None if emit_events => println!("{}", compact_json(&json)?),
                None => println!("{}", json),
            }
        }
        Commands::Import { file } => {
            let json = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let doc = tracker
                .try_import_json(&json)
                .await
                .context("Import rejected")?;
            writeln!(out, "Imported progress ({}% overall)", doc.overall_progress)?;
        }
        Commands::Reset => {
            tracker.reset().await;
            writeln!(out, "Progress reset")?;
        }
        Commands::Sync => {
            if !tracker.is_authenticated() {
                writeln!(out, "Not signed in; progress stays local")?;
                return Ok(());
            }
            if tracker.initialize_from_remote().await {
                let doc = tracker.progress().await;
                print_summary(out, &doc, &tracker.student_name().await)?;
            } else {
                writeln!(out, "Server unreachable; using local progress")?;
            }
        }
    }

    Ok(())
}

fn print_summary(out: &mut dyn Write, doc: &ProgressDocument, name: &str) -> std::io::Result<()> {
    writeln!(out, "SafeScape progress for {}", name)?;
    for (n, m) in doc.iter_modules() {
        let status = if m.completed {
            "COMPLETED"
        } else if m.unlocked {
            "UNLOCKED"
        } else {
            "LOCKED"
        };
        writeln!(out, "  Module {}: {}", n, status)?;
    }
    writeln!(out, "  Overall: {}%", doc.overall_progress)?;
    if let Some(at) = doc.last_accessed {
        writeln!(out, "  Last accessed: {}", at)?;
    }
    Ok(())
}

fn compact_json(json: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    Ok(serde_json::to_string(&value)?)
}

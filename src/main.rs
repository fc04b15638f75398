use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;

use radioinfo::app::{App, AppEvent};
use radioinfo::config::Config;
use radioinfo::refresh::{self, SelectOutcome, StartupError};
use radioinfo::source::HttpSource;
use radioinfo::ui;
use radioinfo::util::{format_local, single_line};

#[derive(Parser, Debug)]
#[command(name = "radioinfo", about = "Radio channel schedules in the terminal")]
struct Args {
    /// Config file (default: ~/.config/radioinfo/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Channel to select on startup, overriding the config file
    #[arg(long, value_name = "NAME")]
    channel: Option<String>,

    /// Print the channel catalog and exit
    #[arg(long)]
    list_channels: bool,

    /// Print the current schedule of one channel and exit
    #[arg(long, value_name = "NAME", conflicts_with = "list_channels")]
    print: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with the TUI or --print output
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match args.config.clone().or_else(Config::default_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            tracing::debug!("HOME not set, using default configuration");
            Config::default()
        }
    };

    let source = HttpSource::from_config(&config).context("Failed to create HTTP client")?;

    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(32);

    let engine = match refresh::start(source, event_tx).await {
        Ok(engine) => engine,
        Err(StartupError::Catalog(e)) => {
            eprintln!("Error: could not load the channel list: {}", e);
            eprintln!("Check your network connection or the api_base_url setting.");
            std::process::exit(2);
        }
    };

    if args.list_channels {
        for channel in engine.catalog() {
            match &channel.description {
                Some(desc) => println!("{:<24} {}", channel.name, single_line(desc)),
                None => println!("{}", channel.name),
            }
        }
        engine.shutdown().await;
        return Ok(());
    }

    if let Some(name) = args.print.as_deref() {
        let code = print_schedule(&engine, event_rx, name).await?;
        engine.shutdown().await;
        if code != 0 {
            std::process::exit(code);
        }
        return Ok(());
    }

    let mut app = App::new(engine.catalog().to_vec());

    if let Some(name) = args.channel.or(config.initial_channel) {
        if app.focus_channel(&name) {
            engine
                .post_select_channel(&name)
                .context("Refresh engine stopped")?;
        } else {
            tracing::warn!(channel = %name, "Initial channel not in catalog");
            app.set_status(format!("Unknown channel: {}", name));
        }
    }

    let result = ui::run(&mut app, &engine, event_rx).await;
    engine.shutdown().await;
    result
}

/// Select `name`, wait for its schedule and write it to stdout.
///
/// Returns the process exit code.
async fn print_schedule(
    engine: &refresh::EngineHandle,
    mut event_rx: mpsc::Receiver<AppEvent>,
    name: &str,
) -> Result<i32> {
    // Nobody renders these; keep the channel drained so the engine never waits on it
    let drain = tokio::spawn(async move { while event_rx.recv().await.is_some() {} });

    let outcome = engine
        .select_channel(name)
        .await
        .context("Refresh engine stopped")?;
    drain.abort();

    match outcome {
        SelectOutcome::Published { snapshot, .. } => {
            println!("{}", snapshot.channel_name);
            if snapshot.programs.is_empty() {
                println!("  (no programs in the current window)");
            }
            for (i, program) in snapshot.programs.iter().enumerate() {
                let marker = if snapshot.marked == Some(i) { '>' } else { ' ' };
                println!(
                    "{} {}  {}  {}",
                    marker,
                    format_local(program.start_time),
                    format_local(program.end_time),
                    single_line(&program.title)
                );
            }
            Ok(0)
        }
        SelectOutcome::UnknownChannel => {
            eprintln!("Error: no channel named '{}'. Try --list-channels.", name);
            Ok(1)
        }
        SelectOutcome::Failed(e) => {
            eprintln!("Error: could not load the schedule for '{}': {}", name, e);
            Ok(2)
        }
        SelectOutcome::Cleared => Ok(0),
        SelectOutcome::Busy => {
            eprintln!("Error: the engine is busy, try again");
            Ok(2)
        }
    }
}

use autoscene::{Engine, EngineConfig, EngineHandle, ObsDialer, ScreenCapture, Status};
use clap::Parser;
use crossbeam_channel::Receiver;
use serde::Serialize;
use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;
use tracing_subscriber::EnvFilter;

const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "AutoScene: drive OBS from on-screen templates")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Template directory, overriding `templates_path` from the config.
    #[arg(short, long, value_name = "DIR")]
    templates: Option<PathBuf>,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Start detection immediately instead of waiting for `start`.
    #[arg(long)]
    start: bool,
    /// Print status lines as JSON objects.
    #[arg(long)]
    json: bool,
    /// Enable debug tracing output.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Serialize)]
struct StatusRecord {
    timestamp_ms: u128,
    status: String,
}

enum Command {
    Start,
    Stop,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "start" => Some(Command::Start),
            "stop" => Some(Command::Stop),
            "quit" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }
}

fn print_statuses(rx: Receiver<Status>, json: bool) {
    for status in rx.iter() {
        if json {
            let record = StatusRecord {
                timestamp_ms: SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis())
                    .unwrap_or_default(),
                status: status.to_string(),
            };
            match serde_json::to_string(&record) {
                Ok(line) => println!("{line}"),
                Err(err) => warn!(%err, "cannot encode status"),
            }
        } else {
            println!("[status] {status}");
        }
    }
}

fn start(config: &EngineConfig, status: &crossbeam_channel::Sender<Status>) -> Option<EngineHandle> {
    Engine::start_with(
        config,
        |settings| {
            let source = ScreenCapture::open(settings.monitor_index)?;
            Ok((source, ObsDialer::from_settings(settings)))
        },
        status.clone(),
    )
    .ok()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let directive = if cli.trace {
        "autoscene=debug"
    } else {
        "autoscene=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let mut config = EngineConfig::from_json_str(&config_text)?;
    if let Some(dir) = cli.templates {
        config.templates_path = dir;
    }

    let (tx, rx) = crossbeam_channel::unbounded();
    let json = cli.json;
    let printer = thread::spawn(move || print_statuses(rx, json));

    let mut engine = if cli.start { start(&config, &tx) } else { None };
    if engine.is_none() {
        eprintln!("commands: start | stop | quit");
    }

    for line in io::stdin().lock().lines() {
        let line = line?;
        match Command::parse(&line) {
            Some(Command::Start) => {
                if engine.as_ref().is_some_and(EngineHandle::is_running) {
                    eprintln!("already running");
                    continue;
                }
                engine = start(&config, &tx);
            }
            Some(Command::Stop) => match engine.take() {
                Some(handle) => handle.stop(),
                None => eprintln!("not running"),
            },
            Some(Command::Quit) => break,
            None if line.trim().is_empty() => {}
            None => eprintln!("unknown command: {}", line.trim()),
        }
    }

    if let Some(handle) = engine.take() {
        handle.stop();
    }
    drop(tx);
    let _ = printer.join();
    Ok(())
}

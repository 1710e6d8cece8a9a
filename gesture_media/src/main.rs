//! gesture-media: command-line entry point.

use std::io::{self, BufRead};
use std::path::Path;
use std::thread;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gesture_media::cli::{Cli, Commands, ConfigAction};
use gesture_media::{CommandMapper, Config, Pipeline, PipelineEvent, PipelineHandle, SimEngine, SimSource};
use media_control::{controller_for, ControllerRegistry, DryRunAutomation, Platform};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { platform, script, fps, leap } => run(config, platform, &script, fps, leap),
        Commands::Gestures => {
            print_gestures(&config);
            Ok(())
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                print!("{}", config.to_toml()?);
                Ok(())
            }
            ConfigAction::Validate => {
                config.validate()?;
                println!("  ✓ configuration valid");
                Ok(())
            }
            ConfigAction::Init { path, force } => {
                if path.exists() && !force {
                    bail!("{} already exists (use --force to overwrite)", path.display());
                }
                Config::default().save(&path)?;
                println!("  ✓ wrote {}", path.display());
                Ok(())
            }
        },
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn banner() {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║    Gesture Media · hand-gesture remote for media players     ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    #[cfg(feature = "leap")]
    println!("  Mode: scripted simulation, or LeapMotion hardware with --leap");
    #[cfg(not(feature = "leap"))]
    println!("  Mode: scripted simulation  (use --features leap for hardware)");
    println!("  Keys: 1 YouTube   2 Spotify   3 TikTok   q quit   (then Enter)");
    println!();
}

/// One dry-run controller per platform.
fn registry() -> Result<ControllerRegistry> {
    let mut registry = ControllerRegistry::new();
    for platform in Platform::ALL {
        registry.register(controller_for(platform, DryRunAutomation::new(platform.as_str())))?;
    }
    Ok(registry)
}

fn run(mut config: Config, platform: Option<Platform>, script: &str, fps: u32, leap: bool) -> Result<()> {
    if let Some(platform) = platform {
        config.platform = platform;
    }
    config.validate()?;
    banner();
    let registry = registry()?;

    if leap {
        #[cfg(feature = "leap")]
        {
            use gesture_media::leap::{LeapEngine, LeapSource};
            let handle = Pipeline::start(config, LeapSource::new(), LeapEngine, registry)?;
            return drive(handle);
        }
        #[cfg(not(feature = "leap"))]
        bail!("this build has no Leap Motion support (rebuild with --features leap)");
    }

    let source = SimSource::from_script(script, fps)?.paced();
    let handle = Pipeline::start(config, source, SimEngine, registry)?;
    drive(handle)
}

/// Print events and forward keyboard commands until the pipeline stops.
fn drive(handle: PipelineHandle) -> Result<()> {
    let (keys_tx, keys_rx) = crossbeam_channel::unbounded::<String>();
    thread::Builder::new().name("stdin".into()).spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if keys_tx.send(line.trim().to_string()).is_err() {
                break;
            }
        }
    })?;

    let events = handle.events();
    let no_keys = crossbeam_channel::never::<String>();
    let mut stdin_open = true;
    loop {
        let keys = if stdin_open { &keys_rx } else { &no_keys };
        crossbeam_channel::select! {
            recv(events) -> event => {
                let Ok(event) = event else { break };
                println!("  {event}");
                match event {
                    PipelineEvent::SourceClosed => handle.stop(),
                    PipelineEvent::Stopped { .. } => break,
                    _ => {}
                }
            }
            recv(keys) -> key => {
                let Ok(key) = key else {
                    // stdin closed; keep running on gestures alone
                    stdin_open = false;
                    continue;
                };
                let platform = match key.as_str() {
                    "1" => Platform::YouTube,
                    "2" => Platform::Spotify,
                    "3" => Platform::TikTok,
                    "q" | "quit" => {
                        handle.stop();
                        continue;
                    }
                    "" => continue,
                    other => {
                        println!("  ? '{other}': 1/2/3 switch platform, q quits");
                        continue;
                    }
                };
                // failures also arrive on the event stream
                if let Err(e) = handle.select_platform(platform) {
                    tracing::debug!(error = %e, "platform switch rejected");
                }
            }
        }
    }

    let stats = handle.join();
    println!();
    println!(
        "  frames    {} captured, {} dropped, {} processed",
        stats.frames_captured, stats.frames_dropped, stats.frames_processed
    );
    println!("  gestures  {} fired", stats.gestures_fired);
    println!(
        "  commands  {} dispatched, {} dropped, {} failed",
        stats.commands_dispatched, stats.commands_dropped, stats.commands_failed
    );
    if stats.events_dropped > 0 {
        println!("  events    {} dropped (console fell behind)", stats.events_dropped);
    }
    Ok(())
}

fn print_gestures(config: &Config) {
    let mapper = CommandMapper::from_rules(&config.mapping);
    println!();
    println!("  {:<14} command", "gesture");
    println!("  {:<14} ───────", "───────");
    for (label, command) in mapper.describe() {
        println!("  {:<14} {}", label.as_str(), command);
    }
    println!();
}

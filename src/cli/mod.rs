use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use traypet::config::{CharacterCatalog, ConfigStore, JsonConfigStore};
use traypet::controller::{PetController, PetEvent, PetHandle};
use traypet::core::{expression, fortune};
use traypet::host::{MemoryHost, MenuAction};
use traypet::telemetry::{HostSampler, ScriptedSampler, SystemSampler};

pub use commands::ConfigCommands;

mod commands;

fn open_store(data_dir: Option<PathBuf>) -> JsonConfigStore {
    JsonConfigStore::new(data_dir, CharacterCatalog::discover())
}

pub async fn handle_run(
    data_dir: Option<PathBuf>,
    headless: bool,
    for_secs: Option<u64>,
    snapshots: Option<PathBuf>,
) -> Result<()> {
    let store = open_store(data_dir);
    info!(path = %store.path().display(), "using config");

    let sampler: Arc<dyn SystemSampler> = match snapshots {
        Some(path) => Arc::new(
            ScriptedSampler::from_file(&path)
                .with_context(|| format!("failed to load snapshots from {}", path.display()))?,
        ),
        None => Arc::new(HostSampler::new()),
    };

    let host = if headless {
        MemoryHost::new()
    } else {
        MemoryHost::new().with_logging()
    };
    let controller = PetController::new(host, store, sampler);
    let handle = controller.sender();
    let pet = tokio::spawn(controller.run());

    if !headless {
        println!("commands: sleep, fortune, restore, click, tray, settings, quit");
        let commands = handle.clone();
        // blocking stdin reads must not hold up runtime shutdown
        std::thread::spawn(move || read_commands(commands));
    }

    let deadline = async {
        match for_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        _ = deadline => {
            handle.send(PetEvent::Shutdown);
        }
        _ = tokio::signal::ctrl_c() => {
            handle.send(PetEvent::Shutdown);
        }
        _ = handle.closed() => {}
    }

    pet.await.context("pet task failed")?;
    Ok(())
}

/// Line-oriented stand-in for tray and menu clicks.
fn read_commands(handle: PetHandle) {
    for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else {
            break;
        };
        let event = match line.trim() {
            "" => continue,
            "sleep" | "wake" => PetEvent::Menu(MenuAction::ToggleSleep),
            "fortune" => PetEvent::Menu(MenuAction::Fortune),
            "restore" => PetEvent::Restore,
            "click" => PetEvent::AnchorClicked,
            "tray" => PetEvent::TrayClicked,
            "settings" => PetEvent::Menu(MenuAction::Settings),
            "quit" => PetEvent::Menu(MenuAction::Quit),
            other => {
                warn!(command = other, "unknown command");
                continue;
            }
        };
        if !handle.send(event) {
            break;
        }
    }
}

pub async fn handle_status(data_dir: Option<PathBuf>) -> Result<()> {
    let config = open_store(data_dir).load();
    let snapshot = tokio::task::spawn_blocking(|| HostSampler::new().sample())
        .await
        .context("sampler task failed")?
        .context("failed to read system status")?;

    println!("🔋 battery: {}%{}", snapshot.battery_percent, if snapshot.is_charging { " (charging)" } else { "" });
    match snapshot.wifi_quality {
        Some(quality) => println!("📶 wifi: {}%", quality),
        None => println!("📶 wifi: unavailable"),
    }
    println!("🔊 volume: {}%{}", snapshot.volume, if snapshot.is_muted { " (muted)" } else { "" });
    println!("🌡️  cpu: {:.1}°C", snapshot.cpu_temperature);

    let today = Local::now().date_naive();
    let candidates = expression::candidates(&snapshot, today, &config.birthday);
    println!("\ncandidates ({}):", candidates.len());
    for candidate in &candidates {
        println!(
            "  [{}] {} - {}",
            candidate.icon.file_name(),
            candidate.title,
            candidate.content.replace('\n', " / ")
        );
    }
    Ok(())
}

pub async fn handle_fortune(data_dir: Option<PathBuf>, today: Option<String>) -> Result<()> {
    let config = open_store(data_dir).load();
    let today = match today {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .with_context(|| format!("invalid date: {}", raw))?,
        None => Local::now().date_naive(),
    };

    let message = if config.birthday.is_complete() {
        fortune::generate(&config.birthday, today).to_expression()
    } else {
        fortune::cannot_read()
    };
    println!("{}\n{}", message.title, message.content);
    Ok(())
}

pub async fn handle_config(data_dir: Option<PathBuf>, command: ConfigCommands) -> Result<()> {
    let store = open_store(data_dir);
    match command {
        ConfigCommands::Show => {
            let config = store.load();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Path => {
            println!("{}", store.path().display());
        }
        ConfigCommands::Set { key, value } => {
            let mut config = store.load();
            config
                .set_field(&key, &value)
                .with_context(|| format!("cannot set {}", key))?;
            if let Some(catalog) = store.catalog() {
                catalog
                    .require(&config.character)
                    .context("character has no asset bundle")?;
            }
            let config = store.validate(config);
            store.save(&config).context("failed to save config")?;
            println!("✅ {} updated", key);
        }
    }
    Ok(())
}

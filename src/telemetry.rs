use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sysinfo::Components;
use tracing::debug;

use crate::core::{PetError, Result};

/// One reading of everything the pet reacts to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub battery_percent: u8,
    pub is_charging: bool,
    /// Link quality 0-100, `None` when no wireless connection exists.
    #[serde(default)]
    pub wifi_quality: Option<u8>,
    pub volume: u8,
    pub is_muted: bool,
    /// Degrees Celsius, 0 when the sensor is unreadable.
    #[serde(default)]
    pub cpu_temperature: f32,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            battery_percent: 50,
            is_charging: false,
            wifi_quality: Some(60),
            volume: 50,
            is_muted: false,
            cpu_temperature: 50.0,
        }
    }
}

/// Reads system telemetry. Called off the event loop, so it may block.
pub trait SystemSampler: Send + Sync {
    fn sample(&self) -> Result<Snapshot>;
}

/// Samples the machine the pet runs on.
///
/// Battery and Wi-Fi come from the Linux power-supply and wireless proc files, CPU
/// temperature from `sysinfo`, volume from `pactl`. Missing sources degrade to neutral
/// values instead of failing the whole cycle.
pub struct HostSampler {
    power_supply_dir: &'static str,
    wireless_file: &'static str,
}

impl HostSampler {
    pub fn new() -> Self {
        Self {
            power_supply_dir: "/sys/class/power_supply",
            wireless_file: "/proc/net/wireless",
        }
    }

    fn battery(&self) -> (u8, bool) {
        let dir = Path::new(self.power_supply_dir);
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(?err, "no power supply directory, assuming mains power");
                return (100, true);
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with("BAT") {
                continue;
            }
            let path = entry.path();
            let capacity = fs::read_to_string(path.join("capacity"))
                .ok()
                .and_then(|raw| raw.trim().parse::<u8>().ok());
            let status = fs::read_to_string(path.join("status")).unwrap_or_default();
            if let Some(capacity) = capacity {
                let charging = matches!(status.trim(), "Charging" | "Full");
                return (capacity.min(100), charging);
            }
        }

        (100, true)
    }

    fn wifi_quality(&self) -> Option<u8> {
        let text = fs::read_to_string(self.wireless_file).ok()?;
        parse_wireless(&text)
    }

    fn cpu_temperature(&self) -> f32 {
        let components = Components::new_with_refreshed_list();
        let mut fallback: f32 = 0.0;
        for component in components.list() {
            let label = component.label().to_ascii_lowercase();
            let temp = component.temperature();
            if !temp.is_finite() || temp <= 0.0 {
                continue;
            }
            if label.contains("package") || label.contains("tctl") || label.contains("cpu") {
                return temp.round();
            }
            fallback = fallback.max(temp);
        }
        fallback.round()
    }

    fn volume(&self) -> (u8, bool) {
        let volume = Command::new("pactl")
            .args(["get-sink-volume", "@DEFAULT_SINK@"])
            .output()
            .ok()
            .filter(|out| out.status.success())
            .and_then(|out| parse_pactl_volume(&String::from_utf8_lossy(&out.stdout)));
        let muted = Command::new("pactl")
            .args(["get-sink-mute", "@DEFAULT_SINK@"])
            .output()
            .ok()
            .filter(|out| out.status.success())
            .map(|out| String::from_utf8_lossy(&out.stdout).contains("yes"));

        match (volume, muted) {
            (Some(volume), muted) => (volume, muted.unwrap_or(false)),
            _ => {
                debug!("pactl unavailable, reporting neutral volume");
                (50, false)
            }
        }
    }
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSampler for HostSampler {
    fn sample(&self) -> Result<Snapshot> {
        let (battery_percent, is_charging) = self.battery();
        let (volume, is_muted) = self.volume();
        Ok(Snapshot {
            battery_percent,
            is_charging,
            wifi_quality: self.wifi_quality(),
            volume,
            is_muted,
            cpu_temperature: self.cpu_temperature(),
        })
    }
}

/// Plays back a fixed sequence of readings, repeating the last one once exhausted.
pub struct ScriptedSampler {
    readings: Mutex<VecDeque<std::result::Result<Snapshot, String>>>,
    last: Mutex<Option<Snapshot>>,
}

impl ScriptedSampler {
    pub fn new(readings: Vec<std::result::Result<Snapshot, String>>) -> Self {
        Self {
            readings: Mutex::new(readings.into()),
            last: Mutex::new(None),
        }
    }

    pub fn constant(snapshot: Snapshot) -> Self {
        Self::new(vec![Ok(snapshot)])
    }

    /// Loads a JSON array of snapshots.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let snapshots: Vec<Snapshot> = serde_json::from_str(&text)?;
        Ok(Self::new(snapshots.into_iter().map(Ok).collect()))
    }
}

impl SystemSampler for ScriptedSampler {
    fn sample(&self) -> Result<Snapshot> {
        let next = self
            .readings
            .lock()
            .map_err(|_| PetError::Telemetry("sampler lock poisoned".to_string()))?
            .pop_front();
        let mut last = self
            .last
            .lock()
            .map_err(|_| PetError::Telemetry("sampler lock poisoned".to_string()))?;

        match next {
            Some(Ok(snapshot)) => {
                *last = Some(snapshot.clone());
                Ok(snapshot)
            }
            Some(Err(reason)) => Err(PetError::Telemetry(reason)),
            None => last
                .clone()
                .ok_or_else(|| PetError::Telemetry("no readings scripted".to_string())),
        }
    }
}

/// `/proc/net/wireless` reports link quality out of 70.
fn parse_wireless(text: &str) -> Option<u8> {
    text.lines().skip(2).find_map(|line| {
        let mut fields = line.split_whitespace();
        let _iface = fields.next()?;
        let _status = fields.next()?;
        let link = fields.next()?.trim_end_matches('.').parse::<f32>().ok()?;
        Some(((link / 70.0) * 100.0).round().clamp(0.0, 100.0) as u8)
    })
}

fn parse_pactl_volume(text: &str) -> Option<u8> {
    text.split('/')
        .map(str::trim)
        .find_map(|part| part.strip_suffix('%'))
        .and_then(|digits| digits.trim().parse::<u16>().ok())
        .map(|volume| volume.min(100) as u8)
}

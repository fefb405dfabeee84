use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{PetError, Result};

pub const CURRENT_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_CHARACTER: &str = "pig";
const MIN_INTERVAL_MS: u64 = 1_000;

/// `month == 0` means unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Birthday {
    #[serde(deserialize_with = "lenient_year")]
    pub year: i32,
    #[serde(deserialize_with = "lenient_calendar")]
    pub month: u32,
    #[serde(deserialize_with = "lenient_calendar")]
    pub day: u32,
}

impl Birthday {
    pub fn is_set(&self) -> bool {
        self.month != 0
    }

    /// Year, month and day all given; required for the fortune.
    pub fn is_complete(&self) -> bool {
        self.year != 0 && self.month != 0 && self.day != 0
    }

    /// Month/day pairs that never occur are treated as unset. Feb 29 is kept.
    fn normalized(self) -> Self {
        if !self.is_set() {
            return self;
        }
        if NaiveDate::from_ymd_opt(2000, self.month, self.day).is_some() {
            self
        } else {
            warn!(month = self.month, day = self.day, "impossible birthday, clearing it");
            Birthday::default()
        }
    }

    /// Parses `YYYY-MM-DD`, `MM-DD` or `none`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("none") {
            return Ok(Birthday::default());
        }
        let parts: Vec<&str> = raw.split('-').collect();
        let not_a_date = || PetError::InvalidConfig(format!("not a date: {}", raw));
        let year = |s: &str| s.parse::<i32>().map_err(|_| not_a_date());
        let number = |s: &str| s.parse::<u32>().map_err(|_| not_a_date());
        let birthday = match parts.as_slice() {
            [y, m, d] => Birthday {
                year: year(y)?,
                month: number(m)?,
                day: number(d)?,
            },
            [m, d] => Birthday {
                year: 0,
                month: number(m)?,
                day: number(d)?,
            },
            _ => return Err(PetError::InvalidConfig(format!("not a date: {}", raw))),
        };
        if NaiveDate::from_ymd_opt(2000, birthday.month, birthday.day).is_none() {
            return Err(PetError::InvalidConfig(format!("no such day: {}", raw)));
        }
        Ok(birthday)
    }
}

/// Settings document. Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub schema_version: u32,
    /// Milliseconds between automatic evaluations.
    #[serde(deserialize_with = "lenient_interval")]
    pub interval: u64,
    /// 0-100
    #[serde(deserialize_with = "lenient_volume")]
    pub sound_volume: u8,
    pub character: String,
    pub show_pet: bool,
    pub birthday: Birthday,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            interval: 30_000,
            sound_volume: 50,
            character: DEFAULT_CHARACTER.to_string(),
            show_pet: true,
            birthday: Birthday::default(),
        }
    }
}

impl Config {
    pub fn interval_duration(&self) -> Duration {
        Duration::from_millis(self.interval)
    }

    /// Brings every field into range. Unknown characters fall back to the default bundle.
    pub fn validated(mut self, catalog: Option<&CharacterCatalog>) -> Self {
        self.schema_version = CURRENT_SCHEMA_VERSION;
        if self.interval < MIN_INTERVAL_MS {
            warn!(interval = self.interval, "interval too short, raising it");
            self.interval = MIN_INTERVAL_MS;
        }
        self.sound_volume = self.sound_volume.min(100);
        self.birthday = self.birthday.normalized();

        if let Some(catalog) = catalog {
            if !catalog.resolves(&self.character) {
                warn!(character = %self.character, "character has no asset bundle, using default");
                self.character = DEFAULT_CHARACTER.to_string();
            }
        }
        self
    }

    /// Applies one `key value` edit from the command line.
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = |what: &str| PetError::InvalidConfig(format!("{}: {}", what, value));
        match key {
            "interval" => self.interval = value.parse().map_err(|_| invalid("interval"))?,
            "soundVolume" | "sound_volume" => {
                let volume: u8 = value.parse().map_err(|_| invalid("soundVolume"))?;
                if volume > 100 {
                    return Err(invalid("soundVolume"));
                }
                self.sound_volume = volume;
            }
            "character" => {
                if value.trim().is_empty() {
                    return Err(invalid("character"));
                }
                self.character = value.trim().to_string();
            }
            "showPet" | "show_pet" => self.show_pet = value.parse().map_err(|_| invalid("showPet"))?,
            "birthday" => self.birthday = Birthday::parse(value)?,
            _ => return Err(PetError::InvalidConfig(format!("unknown key: {}", key))),
        }
        Ok(())
    }
}

/// Reads a JSON number (or numeric string) without failing the whole document.
fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let number = match &value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|_| i64::MAX))
            .or_else(|| n.as_f64().map(|f| f.round() as i64)),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    if number.is_none() {
        warn!(%value, "ignoring non-numeric config value");
    }
    Ok(number)
}

fn lenient_interval<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?
        .map(|n| n.max(MIN_INTERVAL_MS as i64) as u64)
        .unwrap_or_else(|| Config::default().interval))
}

fn lenient_volume<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?
        .map(|n| n.clamp(0, 100) as u8)
        .unwrap_or_else(|| Config::default().sound_volume))
}

/// Out-of-range years read as unset.
fn lenient_year<'de, D>(deserializer: D) -> std::result::Result<i32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?
        .and_then(|n| i32::try_from(n).ok())
        .unwrap_or(0))
}

/// Out-of-range months and days read as 0; `normalized` then clears the birthday.
fn lenient_calendar<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0))
}

/// Installed character bundles: one directory of images per character.
#[derive(Debug, Clone)]
pub struct CharacterCatalog {
    root: PathBuf,
}

impl CharacterCatalog {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// First `assets/` directory found next to the working directory or the executable.
    pub fn discover() -> Option<Self> {
        candidate_asset_roots()
            .into_iter()
            .find(|path| path.is_dir())
            .map(Self::new)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolves(&self, character: &str) -> bool {
        !character.is_empty()
            && !character.contains(&['/', '\\'][..])
            && character != ".."
            && self.root.join(character).is_dir()
    }

    pub fn require(&self, character: &str) -> Result<()> {
        if self.resolves(character) {
            Ok(())
        } else {
            Err(PetError::UnknownCharacter(character.to_string()))
        }
    }

    pub fn characters(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn candidate_asset_roots() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join("assets"));
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            paths.push(exe_dir.join("assets"));
            paths.push(exe_dir.join("..").join("assets"));
        }
    }
    paths
}

pub fn default_data_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("traypet")
}

/// Loads and saves the settings document.
pub trait ConfigStore {
    /// Never fails: unreadable or invalid documents yield defaults.
    fn load(&self) -> Config;
    /// Best effort; callers log the error and carry on.
    fn save(&self, config: &Config) -> Result<()>;
    /// Brings an incoming document into range before it goes live.
    fn validate(&self, config: Config) -> Config {
        config.validated(None)
    }
}

/// Pretty JSON at `<data_dir>/config.json`.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
    catalog: Option<CharacterCatalog>,
}

impl JsonConfigStore {
    pub fn new(data_dir: Option<PathBuf>, catalog: Option<CharacterCatalog>) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        Self {
            path: data_dir.join("config.json"),
            catalog,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn catalog(&self) -> Option<&CharacterCatalog> {
        self.catalog.as_ref()
    }

    fn read(&self) -> Result<Option<Config>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str::<Config>(&text)?))
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> Config {
        let config = match self.read() {
            Ok(Some(config)) => config,
            Ok(None) => {
                debug!(path = %self.path.display(), "no config yet, using defaults");
                Config::default()
            }
            Err(err) => {
                warn!(%err, path = %self.path.display(), "failed reading config, using defaults");
                Config::default()
            }
        };
        config.validated(self.catalog.as_ref())
    }

    fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json_str = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, json_str)?;
        Ok(())
    }

    fn validate(&self, config: Config) -> Config {
        config.validated(self.catalog.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn catalog_with(dir: &Path, characters: &[&str]) -> CharacterCatalog {
        let root = dir.join("assets");
        for name in characters {
            fs::create_dir_all(root.join(name)).unwrap();
        }
        CharacterCatalog::new(root)
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let store = JsonConfigStore::new(Some(dir.path().join("nested")), None);
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn test_partial_document_is_merged_with_defaults() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{"interval": 5000, "birthday": {"month": 3, "day": 14}}"#,
        )
        .unwrap();
        let store = JsonConfigStore::new(Some(dir.path().to_path_buf()), None);
        let config = store.load();
        assert_eq!(config.interval, 5000);
        assert_eq!(config.sound_volume, 50);
        assert_eq!(config.character, "pig");
        assert!(config.show_pet);
        assert_eq!(config.birthday, Birthday { year: 0, month: 3, day: 14 });
        assert_eq!(config.schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_out_of_range_numbers_keep_the_rest() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{"interval": 5000, "soundVolume": 300, "character": "cat",
                "birthday": {"year": 1990, "month": 3, "day": 14}}"#,
        )
        .unwrap();
        let store = JsonConfigStore::new(Some(dir.path().to_path_buf()), None);
        let config = store.load();
        assert_eq!(config.sound_volume, 100);
        assert_eq!(config.interval, 5000);
        assert_eq!(config.character, "cat");
        assert_eq!(config.birthday, Birthday { year: 1990, month: 3, day: 14 });

        fs::write(
            dir.path().join("config.json"),
            r#"{"interval": -5, "soundVolume": "loud", "character": "cat",
                "birthday": {"year": 99999999999, "month": -1, "day": 14}}"#,
        )
        .unwrap();
        let config = store.load();
        assert_eq!(config.interval, MIN_INTERVAL_MS);
        assert_eq!(config.sound_volume, 50);
        assert_eq!(config.character, "cat");
        assert!(!config.birthday.is_set());
    }

    #[test]
    fn test_birthday_parse_rejects_overflow() {
        assert!(matches!(
            Birthday::parse("99999999999-01-01"),
            Err(PetError::InvalidConfig(_))
        ));
        assert!(matches!(Birthday::parse("1990-99999999999-01"), Err(PetError::InvalidConfig(_))));
        assert_eq!(
            Birthday::parse("1990-01-01").unwrap(),
            Birthday { year: 1990, month: 1, day: 1 }
        );
    }

    #[test]
    fn test_garbage_document_falls_back() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("config.json"), "{ not json").unwrap();
        let store = JsonConfigStore::new(Some(dir.path().to_path_buf()), None);
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let catalog = catalog_with(dir.path(), &["pig", "cat"]);
        let store = JsonConfigStore::new(Some(dir.path().join("data")), Some(catalog));

        let config = Config {
            schema_version: CURRENT_SCHEMA_VERSION,
            interval: 12_000,
            sound_volume: 80,
            character: "cat".to_string(),
            show_pet: false,
            birthday: Birthday { year: 1990, month: 1, day: 1 },
        };
        store.save(&config).unwrap();
        let loaded = store.load();
        assert_eq!(loaded, config);

        store.save(&loaded).unwrap();
        assert_eq!(store.load(), config);
    }

    #[test]
    fn test_unknown_character_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let catalog = catalog_with(dir.path(), &["pig"]);
        let config = Config {
            character: "dragon".to_string(),
            ..Config::default()
        };
        assert_eq!(config.validated(Some(&catalog)).character, "pig");
        assert!(!catalog.resolves("../pig"));
        assert_eq!(catalog.characters(), vec!["pig".to_string()]);
        assert!(catalog.require("pig").is_ok());
        assert!(matches!(catalog.require("dragon"), Err(PetError::UnknownCharacter(_))));
    }

    #[test]
    fn test_validation_clamps_ranges() {
        let config = Config {
            interval: 10,
            sound_volume: 200,
            birthday: Birthday { year: 1990, month: 2, day: 30 },
            ..Config::default()
        }
        .validated(None);
        assert_eq!(config.interval, 1_000);
        assert_eq!(config.sound_volume, 100);
        assert!(!config.birthday.is_set());
    }

    #[test]
    fn test_set_field() {
        let mut config = Config::default();
        config.set_field("interval", "60000").unwrap();
        config.set_field("soundVolume", "10").unwrap();
        config.set_field("showPet", "false").unwrap();
        config.set_field("birthday", "1990-01-01").unwrap();
        assert_eq!(config.interval, 60_000);
        assert_eq!(config.sound_volume, 10);
        assert!(!config.show_pet);
        assert!(config.birthday.is_complete());

        assert!(config.set_field("soundVolume", "101").is_err());
        assert!(config.set_field("birthday", "02-30").is_err());
        assert!(config.set_field("mood", "happy").is_err());

        config.set_field("birthday", "none").unwrap();
        assert!(!config.birthday.is_set());
    }
}

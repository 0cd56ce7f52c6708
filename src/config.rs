//! Run configuration.
//!
//! Settings are layered, each layer overriding the one before:
//!
//! ```text
//! stock defaults  <  normpic.toml  <  NORMPIC_* environment  <  CLI flags
//! ```
//!
//! Every layer is a sparse `toml::Value` merged onto the previous one; the
//! merged table is then deserialized with unknown keys rejected and
//! validated. The result is frozen into a [`RunConfig`] which every pipeline
//! stage receives explicitly.
//!
//! ## Config file
//!
//! ```toml
//! collection_name = "wedding"
//! collection_description = "Ana & Rui, Porto"
//! source_dir = "/photos/raw/wedding"
//! dest_dir = "/photos/organized/wedding"
//! timestamp_offset_hours = 0   # camera clock correction, -24..=24
//! force_reprocess = false      # relink everything
//! trust_mtime = false          # reuse hashes of files with unchanged size and mtime
//!
//! [camera_codes]
//! "fujifilm x100v" = "x1v"     # lowercase substring of "make model" = code
//! ```
//!
//! Only the keys being changed need to appear; unknown keys are an error.
//!
//! ## Environment
//!
//! Only these variables are read, never the whole environment:
//! `NORMPIC_SOURCE_DIR`, `NORMPIC_DEST_DIR`, `NORMPIC_COLLECTION_NAME`,
//! `NORMPIC_COLLECTION_DESCRIPTION`. `NORMPIC_CONFIG_PATH` points at the
//! config file when `--config` is not given.

use crate::filename::{CameraCodes, default_camera_table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "normpic.toml";

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "NORMPIC_CONFIG_PATH";

/// Whitelisted environment variables and the config keys they set.
pub const ENV_KEYS: &[(&str, &str)] = &[
    ("NORMPIC_SOURCE_DIR", "source_dir"),
    ("NORMPIC_DEST_DIR", "dest_dir"),
    ("NORMPIC_COLLECTION_NAME", "collection_name"),
    ("NORMPIC_COLLECTION_DESCRIPTION", "collection_description"),
];

/// Largest accepted clock correction, in hours either way.
pub const MAX_OFFSET_HOURS: i32 = 24;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Settings as written in `normpic.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Prefix for every destination filename; empty means no prefix.
    pub collection_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_description: Option<String>,
    pub source_dir: String,
    pub dest_dir: String,
    /// Shift applied to every resolved capture instant.
    pub timestamp_offset_hours: i32,
    pub force_reprocess: bool,
    /// Reuse the previous manifest's hash when size and mtime are unchanged.
    pub trust_mtime: bool,
    /// Lowercase `"make model"` substring → short code.
    pub camera_codes: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collection_name: String::new(),
            collection_description: None,
            source_dir: String::new(),
            dest_dir: String::new(),
            timestamp_offset_hours: 0,
            force_reprocess: false,
            trust_mtime: false,
            camera_codes: default_camera_table(),
        }
    }
}

impl Config {
    /// Check values are usable for a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source_dir must be set (config, NORMPIC_SOURCE_DIR or --source)".into(),
            ));
        }
        if self.dest_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "dest_dir must be set (config, NORMPIC_DEST_DIR or --dest)".into(),
            ));
        }
        if self.timestamp_offset_hours.abs() > MAX_OFFSET_HOURS {
            return Err(ConfigError::Validation(format!(
                "timestamp_offset_hours must be within -{MAX_OFFSET_HOURS}..={MAX_OFFSET_HOURS}"
            )));
        }
        for (pattern, code) in &self.camera_codes {
            if pattern.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "camera_codes patterns must not be empty".into(),
                ));
            }
            let valid = !code.is_empty()
                && code.len() <= 8
                && code
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
            if !valid {
                return Err(ConfigError::Validation(format!(
                    "camera_codes.\"{pattern}\" = \"{code}\": codes must be 1-8 lowercase letters or digits"
                )));
            }
        }
        Ok(())
    }
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub source_dir: Option<PathBuf>,
    pub dest_dir: Option<PathBuf>,
    pub collection_name: Option<String>,
    pub collection_description: Option<String>,
    pub force: bool,
}

impl CliOverrides {
    fn to_value(&self) -> toml::Value {
        let mut table = toml::Table::new();
        let mut set = |key: &str, value: Option<String>| {
            if let Some(v) = value {
                table.insert(key.to_string(), toml::Value::String(v));
            }
        };
        set(
            "source_dir",
            self.source_dir.as_ref().map(|p| p.display().to_string()),
        );
        set(
            "dest_dir",
            self.dest_dir.as_ref().map(|p| p.display().to_string()),
        );
        set("collection_name", self.collection_name.clone());
        set("collection_description", self.collection_description.clone());
        if self.force {
            table.insert("force_reprocess".into(), toml::Value::Boolean(true));
        }
        toml::Value::Table(table)
    }
}

/// Immutable per-run state handed to every pipeline stage.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub collection_name: String,
    pub collection_description: Option<String>,
    pub dry_run: bool,
    pub force: bool,
    pub trust_mtime: bool,
    pub timestamp_offset_hours: i32,
    pub camera_codes: CameraCodes,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::from_config(&Config::default(), false)
    }
}

impl RunConfig {
    pub fn from_config(config: &Config, dry_run: bool) -> Self {
        Self {
            collection_name: config.collection_name.clone(),
            collection_description: config.collection_description.clone(),
            dry_run,
            force: config.force_reprocess,
            trust_mtime: config.trust_mtime,
            timestamp_offset_hours: config.timestamp_offset_hours,
            camera_codes: CameraCodes::new(config.camera_codes.clone()),
        }
    }

    pub fn offset(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::hours(i64::from(self.timestamp_offset_hours))
    }
}

// =============================================================================
// Layering
// =============================================================================

/// Stock defaults as a `toml::Value::Table`, the base layer for merging.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Config::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Build the environment layer from a variable lookup.
///
/// Takes a lookup function rather than reading `std::env` directly so only
/// [`ENV_KEYS`] are ever consulted and tests can supply their own values.
/// Empty values are ignored.
pub fn env_overlay<F>(lookup: F) -> toml::Value
where
    F: Fn(&str) -> Option<String>,
{
    let mut table = toml::Table::new();
    for (var, key) in ENV_KEYS {
        if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
            table.insert(key.to_string(), toml::Value::String(value));
        }
    }
    toml::Value::Table(table)
}

/// Resolve the full configuration.
///
/// `config_path` is required to exist when given; when `None`, a
/// `normpic.toml` in the working directory is used if present.
pub fn load_layered<F>(
    config_path: Option<&Path>,
    env: F,
    cli: &CliOverrides,
) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut merged = stock_defaults_value()?;

    let file = match config_path {
        Some(path) if !path.is_file() => return Err(ConfigError::NotFound(path.to_path_buf())),
        Some(path) => Some(path.to_path_buf()),
        None => Some(PathBuf::from(CONFIG_FILE)).filter(|p| p.is_file()),
    };
    if let Some(path) = file {
        log::debug!("loading config from {}", path.display());
        merged = merge_toml(merged, load_raw_config(&path)?);
    }

    merged = merge_toml(merged, env_overlay(env));
    merged = merge_toml(merged, cli.to_value());

    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Fully-commented stock `normpic.toml`, printed by `gen-config`.
///
/// Parses back to [`Config::default`].
pub fn stock_config_toml() -> &'static str {
    r##"# normpic configuration
# =====================
# Values shown are the defaults. Remove any key you don't need to change.
# Unknown keys will cause an error.
#
# Precedence, lowest to highest:
#   defaults < this file < NORMPIC_* environment < command-line flags

# Prefix for every organized filename, e.g. "wedding" gives
# wedding-20240315T143022-r5a.jpg. Empty means no prefix.
collection_name = ""

# Free-text description stored in the manifest.
# collection_description = "Ana & Rui, Porto"

# Directory holding the original photos (read only, not recursed).
# Also settable with NORMPIC_SOURCE_DIR or --source.
source_dir = ""

# Directory receiving the symlinks and manifest.json.
# Also settable with NORMPIC_DEST_DIR or --dest.
dest_dir = ""

# Hours added to every capture time, to correct a camera clock set to the
# wrong zone. Between -24 and 24.
timestamp_offset_hours = 0

# Rehash and relink every photo.
force_reprocess = false

# Skip rehashing files whose size and modification time match the previous
# manifest. Faster on large collections, but an edit that keeps the size and
# restores the mtime (cp -p, rsync -t, exiftool -P) goes unnoticed.
trust_mtime = false

# ---------------------------------------------------------------------------
# Camera codes
# ---------------------------------------------------------------------------
# Lowercase substring of "make model" = short code used in filenames.
# The longest matching pattern wins. Cameras not listed get a stable
# three-character code derived from their name.
[camera_codes]
"canon eos 5d" = "5da"
"canon eos 6d" = "6da"
"canon eos r5" = "r5a"
"canon eos r6" = "r6a"
iphone = "iph"
"iphone 12" = "i12"
"iphone 13" = "i13"
"iphone 14" = "i14"
"iphone 15" = "i15"
"nikon d750" = "d75"
"nikon d850" = "d85"
"sony a7 iii" = "a73"
"sony a7r" = "a7r"
"##
}

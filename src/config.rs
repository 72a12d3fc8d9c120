use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

/// Error type for config and manifest loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// General options
    pub log_level: Option<String>, // e.g., "info" | "debug"
    /// Seed for the unique-id generator (deterministic runs)
    pub seed: Option<u64>,
    /// Frame budget for the main loop; None runs until a Quit event
    pub steps: Option<u64>,
    /// Path to the plugins manifest
    pub plugins: Option<PathBuf>,
    /// Path to the assets manifest
    pub assets: Option<PathBuf>,
    /// Event manager settings
    pub events: Option<EventSettings>,
    /// Render capability settings
    pub render: Option<RenderSettings>,
    /// Compute capability settings
    pub compute: Option<ComputeSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventSettings {
    /// Bounded queue capacity; events past this are rejected
    pub queue_capacity: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RenderSettings {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ComputeSettings {
    /// Backend selector; only "CPU" is recognized by this build
    pub backend: Option<String>,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone)]
#[command(name = "chiron", about = "Chiron simulation host", disable_help_flag = false)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// Run this many frames then exit
    #[arg(long)]
    pub steps: Option<u64>,
    /// Plugins manifest path
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub plugins: Option<PathBuf>,
    /// Assets manifest path
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub assets: Option<PathBuf>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();
    load_with(cli)
}

pub fn load_with(cli: Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, &cli);

    // 4) Validate
    validate(&cfg)?;

    if cli.dump_config {
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/chiron/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/chiron/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/chiron.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["chiron.yaml", "config.yaml", "config/chiron.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some() { dst.log_level = src.log_level; }
    if src.seed.is_some()      { dst.seed = src.seed; }
    if src.steps.is_some()     { dst.steps = src.steps; }
    if src.plugins.is_some()   { dst.plugins = src.plugins; }
    if src.assets.is_some()    { dst.assets = src.assets; }
    if src.events.is_some()    { dst.events = src.events; }
    if src.render.is_some()    { dst.render = src.render; }
    if src.compute.is_some()   { dst.compute = src.compute; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some() { cfg.log_level = cli.log_level.clone(); }
    if cli.seed.is_some()      { cfg.seed = cli.seed; }
    if cli.steps.is_some()     { cfg.steps = cli.steps; }
    if cli.plugins.is_some()   { cfg.plugins = cli.plugins.clone(); }
    if cli.assets.is_some()    { cfg.assets = cli.assets.clone(); }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(ev) = cfg.events.as_ref() {
        if let Some(cap) = ev.queue_capacity {
            if cap == 0 {
                return Err(ConfigError::Validation(
                    "events queue_capacity must be > 0".into(),
                ));
            }
        }
    }
    if let Some(r) = cfg.render.as_ref() {
        if let (Some(w), Some(h)) = (r.width, r.height) {
            if w == 0 || h == 0 {
                return Err(ConfigError::Validation(
                    "render width/height must be > 0".into(),
                ));
            }
        }
    }
    if let Some(c) = cfg.compute.as_ref() {
        if let Some(b) = c.backend.as_deref() {
            if b != "CPU" {
                return Err(ConfigError::Validation(format!(
                    "compute backend '{b}' not available in this build"
                )));
            }
        }
    }
    Ok(())
}

/// Plugins manifest: a declared count plus one entry per loadable library.
///
/// The count is cross-checked against the entry list during plugin-manager
/// initialization; a mismatch fails the whole startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsManifest {
    pub count: usize,
    pub plugins: Vec<PluginEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginEntry {
    /// Plugin name; must resolve to a recognized PluginType
    pub name: String,
    /// Directory holding the library; filename decoration is the host's job
    pub location: Option<PathBuf>,
}

impl PluginsManifest {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path)?;
        Self::parse(&s)
    }

    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let m: PluginsManifest = serde_yaml::from_str(s)?;
        Ok(m)
    }
}

/// Assets manifest: one entry per simulated entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsManifest {
    pub assets: Vec<AssetEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetEntry {
    /// Asset name; must resolve to a recognized AssetId
    pub name: String,
    /// Behavior class; must resolve to a recognized AssetType
    #[serde(rename = "type")]
    pub asset_type: String,
    /// Per-asset component configuration file
    pub config: Option<PathBuf>,
    pub components: Vec<ComponentEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentEntry {
    /// Component slot; must resolve to a recognized AssetComponentType
    #[serde(rename = "type")]
    pub component_type: String,
    /// Which plugin manufactures this component
    pub loading_plugin: String,
}

impl AssetsManifest {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path)?;
        Self::parse(&s)
    }

    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let m: AssetsManifest = serde_yaml::from_str(s)?;
        Ok(m)
    }
}

/// Per-asset component config file: a mapping from component-type name to
/// an arbitrary YAML fragment that the manufacturing plugin interprets.
pub type ComponentFragments = BTreeMap<String, serde_yaml::Value>;

pub fn load_component_fragments(path: &Path) -> Result<ComponentFragments, ConfigError> {
    let s = fs::read_to_string(path)?;
    let frags: ComponentFragments = serde_yaml::from_str(&s)?;
    Ok(frags)
}

/// Serialize a fragment back to YAML text. This is the form a fragment
/// takes when handed to a plugin across the ABI.
pub fn fragment_to_string(value: &serde_yaml::Value) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugins_manifest_parses() {
        let m = PluginsManifest::parse(
            "count: 2\nplugins:\n  - name: Rigid\n    location: ./plugins\n  - name: CpuMsd\n",
        )
        .unwrap();
        assert_eq!(m.count, 2);
        assert_eq!(m.plugins.len(), 2);
        assert_eq!(m.plugins[0].name, "Rigid");
        assert_eq!(
            m.plugins[0].location.as_deref(),
            Some(Path::new("./plugins"))
        );
        assert!(m.plugins[1].location.is_none());
    }

    #[test]
    fn test_assets_manifest_parses() {
        let m = AssetsManifest::parse(
            "assets:\n  - name: Apple\n    type: Rigid\n    components:\n      - type: Geometry\n        loading_plugin: Rigid\n",
        )
        .unwrap();
        assert_eq!(m.assets.len(), 1);
        assert_eq!(m.assets[0].name, "Apple");
        assert_eq!(m.assets[0].asset_type, "Rigid");
        assert_eq!(m.assets[0].components[0].component_type, "Geometry");
        assert_eq!(m.assets[0].components[0].loading_plugin, "Rigid");
    }

    #[test]
    fn test_component_entry_requires_type() {
        // a component entry without a type is a parse failure
        let r = AssetsManifest::parse(
            "assets:\n  - name: Apple\n    type: Rigid\n    components:\n      - loading_plugin: Rigid\n",
        );
        assert!(r.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_queue() {
        let cfg = Config {
            events: Some(EventSettings {
                queue_capacity: Some(0),
            }),
            ..Default::default()
        };
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_compute_backend() {
        let cfg = Config {
            compute: Some(ComputeSettings {
                backend: Some("CUDA".into()),
            }),
            ..Default::default()
        };
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_merge_precedence() {
        let mut dst = Config {
            log_level: Some("info".into()),
            steps: Some(10),
            ..Default::default()
        };
        let src = Config {
            log_level: Some("debug".into()),
            ..Default::default()
        };
        merge(&mut dst, src);
        assert_eq!(dst.log_level.as_deref(), Some("debug"));
        assert_eq!(dst.steps, Some(10));
    }

    #[test]
    fn test_fragment_round_trip() {
        let v: serde_yaml::Value =
            serde_yaml::from_str("vertex_file: apple.vert\nsubsets: 2\n").unwrap();
        let s = fragment_to_string(&v).unwrap();
        let back: serde_yaml::Value = serde_yaml::from_str(&s).unwrap();
        assert_eq!(v, back);
    }
}

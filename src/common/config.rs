use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, bail};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::manager::group::GroupBehaviorSetting;
use crate::manager::DEFAULT_FOLLOW_UP_DEPTH;
use crate::model::{Bounds, ExtendedMode};

pub fn data_dir() -> PathBuf { home_dir().join(".dock-modes") }
pub fn layout_file() -> PathBuf { data_dir().join("modes.ron") }
pub fn config_file() -> PathBuf { home_dir().join(".dock-modes.toml") }

fn home_dir() -> PathBuf { dirs::home_dir().unwrap_or_default() }

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const CTRL = 1 << 0;
        const SHIFT = 1 << 1;
        const ALT = 1 << 2;
        const META = 1 << 3;
    }
}

/// A key plus modifiers, written like `"Ctrl + Shift + M"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyStroke {
    pub modifiers: Modifiers,
    pub key: String,
}

impl KeyStroke {
    pub fn new(modifiers: Modifiers, key: impl Into<String>) -> Self {
        Self { modifiers, key: key.into() }
    }
}

impl FromStr for KeyStroke {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let Some(key) = parts.pop().filter(|k| !k.is_empty()) else {
            bail!("Key stroke '{s}' names no key");
        };
        let mut modifiers = Modifiers::empty();
        for part in parts {
            modifiers |= match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => Modifiers::CTRL,
                "shift" => Modifiers::SHIFT,
                "alt" | "option" => Modifiers::ALT,
                "meta" | "cmd" | "super" => Modifiers::META,
                _ => bail!("Unknown modifier '{part}' in key stroke '{s}'"),
            };
        }
        Ok(Self { modifiers, key: key.to_owned() })
    }
}

impl fmt::Display for KeyStroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, name) in [
            (Modifiers::CTRL, "Ctrl"),
            (Modifiers::SHIFT, "Shift"),
            (Modifiers::ALT, "Alt"),
            (Modifiers::META, "Meta"),
        ] {
            if self.modifiers.contains(flag) {
                write!(f, "{name} + ")?;
            }
        }
        f.write_str(&self.key)
    }
}

/// Which modes a dockable whose key matches `key` may enter.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct DockableRule {
    /// Regular expression matched against the whole dockable key.
    pub key: String,
    #[serde(default = "yes")]
    pub minimizable: bool,
    #[serde(default = "yes")]
    pub maximizable: bool,
    #[serde(default = "yes")]
    pub externalizable: bool,
    /// Modes that are allowed but not offered as actions.
    #[serde(default)]
    pub hidden: Vec<ExtendedMode>,
}

impl Default for DockableRule {
    fn default() -> Self {
        Self {
            key: String::new(),
            minimizable: true,
            maximizable: true,
            externalizable: true,
            hidden: Vec::new(),
        }
    }
}

impl DockableRule {
    pub fn allows(&self, mode: ExtendedMode) -> bool {
        match mode {
            ExtendedMode::Normalized => true,
            ExtendedMode::Minimized => self.minimizable,
            ExtendedMode::Maximized => self.maximizable,
            ExtendedMode::Externalized => self.externalizable,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct FocusSettings {
    #[serde(default = "yes")]
    pub normalized: bool,
    #[serde(default)]
    pub minimized: bool,
    #[serde(default = "yes")]
    pub maximized: bool,
    #[serde(default = "yes")]
    pub externalized: bool,
}

impl Default for FocusSettings {
    fn default() -> Self {
        Self {
            normalized: true,
            minimized: false,
            maximized: true,
            externalized: true,
        }
    }
}

impl FocusSettings {
    pub fn auto_focus(&self, mode: ExtendedMode) -> bool {
        match mode {
            ExtendedMode::Normalized => self.normalized,
            ExtendedMode::Minimized => self.minimized,
            ExtendedMode::Maximized => self.maximized,
            ExtendedMode::Externalized => self.externalized,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct ExternalizedSettings {
    #[serde(default = "default_external_bounds")]
    pub default_bounds: Bounds,
    /// Offset between an external window and the one it was placed aside.
    #[serde(default = "default_cascade")]
    pub cascade: i32,
}

impl Default for ExternalizedSettings {
    fn default() -> Self {
        Self {
            default_bounds: default_external_bounds(),
            cascade: default_cascade(),
        }
    }
}

impl ExternalizedSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let b = self.default_bounds;
        if b.width <= 0 || b.height <= 0 {
            issues.push(format!(
                "externalized.default_bounds must have a positive size, got {}x{}",
                b.width, b.height
            ));
        }
        if self.cascade < 0 {
            issues.push(format!("externalized.cascade must be non-negative, got {}", self.cascade));
        }
        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;
        if self.default_bounds.width <= 0 || self.default_bounds.height <= 0 {
            self.default_bounds = default_external_bounds();
            fixes += 1;
        }
        if self.cascade < 0 {
            self.cascade = default_cascade();
            fixes += 1;
        }
        fixes
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_maximize_key")]
    pub maximize_key: String,
    #[serde(default = "yes")]
    pub double_click_maximizes: bool,
    #[serde(default)]
    pub group_behavior: GroupBehaviorSetting,
    #[serde(default)]
    pub focus: FocusSettings,
    #[serde(default)]
    pub externalized: ExternalizedSettings,
    #[serde(default = "default_follow_up_depth")]
    pub max_follow_up_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            maximize_key: default_maximize_key(),
            double_click_maximizes: true,
            group_behavior: GroupBehaviorSetting::default(),
            focus: FocusSettings::default(),
            externalized: ExternalizedSettings::default(),
            max_follow_up_depth: default_follow_up_depth(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if let Err(err) = self.maximize_key.parse::<KeyStroke>() {
            issues.push(format!("maximize_key is invalid: {err}"));
        }

        if self.max_follow_up_depth == 0 {
            issues.push("max_follow_up_depth must be at least 1".to_string());
        }

        issues.extend(self.externalized.validate());

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;

        if self.maximize_key.parse::<KeyStroke>().is_err() {
            self.maximize_key = default_maximize_key();
            fixes += 1;
        }

        if self.max_follow_up_depth == 0 {
            self.max_follow_up_depth = default_follow_up_depth();
            fixes += 1;
        }

        fixes += self.externalized.auto_fix_values();

        fixes
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    rules: Vec<DockableRule>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub maximize_key: KeyStroke,
    pub rules: Vec<DockableRule>,
}

fn yes() -> bool { true }

fn default_maximize_key() -> String { "Ctrl + M".to_string() }

fn default_follow_up_depth() -> usize { DEFAULT_FOLLOW_UP_DEPTH }

fn default_external_bounds() -> Bounds { Bounds::new(100, 100, 640, 480) }

fn default_cascade() -> i32 { 20 }

impl Default for Config {
    fn default() -> Self {
        Self::parse(include_str!("../../dock-modes.default.toml"))
            .expect("embedded default config parses")
    }
}

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&buf)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let mut settings = self.settings.clone();
        settings.maximize_key = self.maximize_key.to_string();
        let config_file = ConfigFile { settings, rules: self.rules.clone() };

        let toml_string = toml::to_string_pretty(&config_file)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml_string.as_bytes())?;

        Ok(())
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = self.settings.validate();

        let mut seen = crate::common::collections::HashSet::default();
        for (index, rule) in self.rules.iter().enumerate() {
            if let Err(err) = regex::Regex::new(&rule.key) {
                issues.push(format!("Rule {index} has an invalid key pattern: {err}"));
            }
            if !seen.insert(rule.key.as_str()) {
                issues.push(format!("Duplicate rule key '{}' in rule {index}", rule.key));
            }
        }

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = self.settings.auto_fix_values();
        if let Ok(key) = self.settings.maximize_key.parse() {
            self.maximize_key = key;
        }

        let before = self.rules.len();
        let mut seen = crate::common::collections::HashSet::default();
        self.rules.retain(|rule| {
            regex::Regex::new(&rule.key).is_ok() && seen.insert(rule.key.clone())
        });
        fixes += before - self.rules.len();

        fixes
    }

    fn parse(buf: &str) -> anyhow::Result<Config> {
        let c: ConfigFile = toml::from_str(buf)?;
        let Ok(maximize_key) = c.settings.maximize_key.parse() else {
            bail!("Could not parse maximize_key: {}", c.settings.maximize_key);
        };
        Ok(Config {
            settings: c.settings,
            maximize_key,
            rules: c.rules,
        })
    }
}

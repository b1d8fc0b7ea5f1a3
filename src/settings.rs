//! Persisted mode state: per-dockable history and per-mode settings.
//!
//! Three encodings are supported. The binary and XML forms are versioned
//! and can read the legacy version 1 layout, where every maximized slot also
//! carried the key of the dockable that was maximized. RON is used for the
//! layout file on disk.

pub mod binary;
pub mod xml;

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::common::collections::{BTreeMap, IndexMap};
use crate::model::{Bounds, Location, ModeId, Placement};
use binary::{DataInput, DataOutput};
use xml::XElement;

/// Layout written by this crate.
pub const SETTINGS_VERSION: u32 = 2;
/// Layout with an obsolete dockable key in every maximized slot.
pub const LEGACY_VERSION: u32 = 1;

const TAG_NULL: u8 = 0;
const TAG_MAXIMIZED: u8 = 1;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("input ended while {needed} more bytes were expected")]
    Truncated { needed: usize },
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,
    #[error("{0} bytes do not fit the length prefix")]
    TooLong(usize),
    #[error("malformed XML: {0}")]
    Xml(String),
    #[error("<{element}> lacks attribute '{attribute}'")]
    MissingAttribute { element: String, attribute: &'static str },
    #[error("invalid {field}: '{value}'")]
    InvalidValue { field: &'static str, value: String },
    #[error("unsupported settings version {0}")]
    UnsupportedVersion(u32),
    #[error("unknown mode setting tag {0}")]
    UnknownTag(u8),
}

fn check_version(version: u32) -> Result<u32, SettingsError> {
    match version {
        LEGACY_VERSION | SETTINGS_VERSION => Ok(version),
        other => Err(SettingsError::UnsupportedVersion(other)),
    }
}

/// Where the maximized mode sent elements from, per area.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaximizedModeSetting {
    #[serde(default)]
    pub last_maximized_mode: BTreeMap<String, ModeId>,
    #[serde(default)]
    pub last_maximized_location: BTreeMap<String, Location>,
}

impl MaximizedModeSetting {
    fn areas(&self) -> Vec<&String> {
        let mut areas: Vec<&String> =
            self.last_maximized_mode.keys().chain(self.last_maximized_location.keys()).collect();
        areas.sort();
        areas.dedup();
        areas
    }

    pub fn write<W: Write>(&self, out: &mut DataOutput<W>) -> Result<(), SettingsError> {
        let areas = self.areas();
        out.write_len(areas.len())?;
        for area in areas {
            out.write_utf(area)?;
            match self.last_maximized_mode.get(area) {
                Some(mode) => {
                    out.write_bool(true)?;
                    out.write_utf(mode.as_str())?;
                }
                None => out.write_bool(false)?,
            }
            match self.last_maximized_location.get(area) {
                Some(location) => {
                    out.write_bool(true)?;
                    out.write_location(location)?;
                }
                None => out.write_bool(false)?,
            }
        }
        Ok(())
    }

    pub fn read<R: Read>(input: &mut DataInput<R>, version: u32) -> Result<Self, SettingsError> {
        let mut setting = Self::default();
        let count = input.read_len()?;
        for _ in 0..count {
            let area = input.read_utf()?;
            if input.read_bool()? {
                let mode = ModeId::new(input.read_utf()?);
                setting.last_maximized_mode.insert(area.clone(), mode);
            }
            if version == LEGACY_VERSION && input.read_bool()? {
                let key = input.read_utf()?;
                trace!(area, key, "skipping legacy maximized dockable key");
            }
            if input.read_bool()? {
                setting.last_maximized_location.insert(area, input.read_location()?);
            }
        }
        Ok(setting)
    }

    pub fn write_xml(&self, element: &mut XElement) {
        for area in self.areas() {
            let entry = element.add(XElement::new("entry").with_attr("area", area.as_str()));
            if let Some(mode) = self.last_maximized_mode.get(area) {
                entry.set_attr("mode", mode.as_str());
            }
            if let Some(location) = self.last_maximized_location.get(area) {
                entry.add(location_to_xml(location));
            }
        }
    }

    /// Reads `<entry>` children. Version 1 entries may carry a `<dockable>`
    /// child, which is ignored.
    pub fn read_xml(element: &XElement) -> Result<Self, SettingsError> {
        let mut setting = Self::default();
        for entry in element.children_named("entry") {
            let area = entry.require_attr("area")?.to_owned();
            if let Some(mode) = entry.attr("mode") {
                setting.last_maximized_mode.insert(area.clone(), ModeId::new(mode));
            }
            if let Some(location) = entry.child("location") {
                setting.last_maximized_location.insert(area, location_from_xml(location)?);
            }
        }
        Ok(setting)
    }
}

/// Persisted state of one mode.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeSetting {
    #[default]
    Null,
    Maximized(MaximizedModeSetting),
}

/// Persisted history of one dockable, identified by its key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockableModeSettings {
    pub key: String,
    #[serde(default)]
    pub current: Option<ModeId>,
    #[serde(default)]
    pub history: Vec<ModeId>,
    #[serde(default)]
    pub locations: Vec<Location>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSettings {
    #[serde(default)]
    pub dockables: Vec<DockableModeSettings>,
    #[serde(default)]
    pub modes: IndexMap<ModeId, ModeSetting>,
}

impl ModeSettings {
    pub fn write<W: Write>(&self, writer: W) -> Result<(), SettingsError> {
        let mut out = DataOutput::new(writer);
        out.write_u32(SETTINGS_VERSION)?;
        out.write_len(self.dockables.len())?;
        for dockable in &self.dockables {
            out.write_utf(&dockable.key)?;
            match &dockable.current {
                Some(mode) => {
                    out.write_bool(true)?;
                    out.write_utf(mode.as_str())?;
                }
                None => out.write_bool(false)?,
            }
            out.write_len(dockable.history.len())?;
            for mode in &dockable.history {
                out.write_utf(mode.as_str())?;
            }
            out.write_len(dockable.locations.len())?;
            for location in &dockable.locations {
                out.write_location(location)?;
            }
        }
        out.write_len(self.modes.len())?;
        for (id, setting) in &self.modes {
            out.write_utf(id.as_str())?;
            match setting {
                ModeSetting::Null => out.write_u8(TAG_NULL)?,
                ModeSetting::Maximized(setting) => {
                    out.write_u8(TAG_MAXIMIZED)?;
                    setting.write(&mut out)?;
                }
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SettingsError> {
        let mut bytes = Vec::new();
        self.write(&mut bytes)?;
        Ok(bytes)
    }

    pub fn read<R: Read>(reader: R) -> Result<Self, SettingsError> {
        let mut input = DataInput::new(reader);
        let version = check_version(input.read_u32()?)?;
        let mut settings = Self::default();
        for _ in 0..input.read_len()? {
            let key = input.read_utf()?;
            let current = if input.read_bool()? { Some(ModeId::new(input.read_utf()?)) } else { None };
            let history = (0..input.read_len()?)
                .map(|_| input.read_utf().map(ModeId::new))
                .collect::<Result<_, _>>()?;
            let locations =
                (0..input.read_len()?).map(|_| input.read_location()).collect::<Result<_, _>>()?;
            settings.dockables.push(DockableModeSettings { key, current, history, locations });
        }
        for _ in 0..input.read_len()? {
            let id = ModeId::new(input.read_utf()?);
            let setting = match input.read_u8()? {
                TAG_NULL => ModeSetting::Null,
                TAG_MAXIMIZED => ModeSetting::Maximized(MaximizedModeSetting::read(&mut input, version)?),
                tag => return Err(SettingsError::UnknownTag(tag)),
            };
            settings.modes.insert(id, setting);
        }
        debug!(version, dockables = settings.dockables.len(), "read binary mode settings");
        Ok(settings)
    }

    pub fn to_xml(&self) -> XElement {
        let mut root = XElement::new("modes").with_attr("version", SETTINGS_VERSION.to_string());
        let dockables = root.add(XElement::new("dockables"));
        for dockable in &self.dockables {
            let entry = dockables.add(XElement::new("dockable").with_attr("key", dockable.key.as_str()));
            if let Some(current) = &dockable.current {
                entry.set_attr("current", current.as_str());
            }
            let history = entry.add(XElement::new("history"));
            for mode in &dockable.history {
                history.add(XElement::new("mode").with_attr("id", mode.as_str()));
            }
            let locations = entry.add(XElement::new("locations"));
            for location in &dockable.locations {
                locations.add(location_to_xml(location));
            }
        }
        let modes = root.add(XElement::new("settings"));
        for (id, setting) in &self.modes {
            let mode = modes.add(XElement::new("mode").with_attr("id", id.as_str()));
            match setting {
                ModeSetting::Null => mode.set_attr("kind", "null"),
                ModeSetting::Maximized(setting) => {
                    mode.set_attr("kind", "maximized");
                    setting.write_xml(mode);
                }
            }
        }
        root
    }

    pub fn from_xml(root: &XElement) -> Result<Self, SettingsError> {
        let version = root.require_attr("version")?;
        let version = version.parse().map_err(|_| SettingsError::InvalidValue {
            field: "version",
            value: version.to_owned(),
        })?;
        check_version(version)?;
        let mut settings = Self::default();
        for entry in root.child("dockables").into_iter().flat_map(|d| d.children_named("dockable")) {
            let history = entry
                .child("history")
                .into_iter()
                .flat_map(|h| h.children_named("mode"))
                .map(|m| m.require_attr("id").map(ModeId::new))
                .collect::<Result<_, _>>()?;
            let locations = entry
                .child("locations")
                .into_iter()
                .flat_map(|l| l.children_named("location"))
                .map(location_from_xml)
                .collect::<Result<_, _>>()?;
            settings.dockables.push(DockableModeSettings {
                key: entry.require_attr("key")?.to_owned(),
                current: entry.attr("current").map(ModeId::new),
                history,
                locations,
            });
        }
        for mode in root.child("settings").into_iter().flat_map(|s| s.children_named("mode")) {
            let id = ModeId::new(mode.require_attr("id")?);
            let setting = match mode.attr("kind").unwrap_or("null") {
                "null" => ModeSetting::Null,
                "maximized" => ModeSetting::Maximized(MaximizedModeSetting::read_xml(mode)?),
                other => {
                    return Err(SettingsError::InvalidValue {
                        field: "kind",
                        value: other.to_owned(),
                    });
                }
            };
            settings.modes.insert(id, setting);
        }
        Ok(settings)
    }

    pub fn to_xml_string(&self) -> Result<String, SettingsError> { self.to_xml().to_xml_string() }

    pub fn from_xml_str(xml: &str) -> Result<Self, SettingsError> { Self::from_xml(&XElement::parse(xml)?) }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let ron = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, ron)?;
        debug!(?path, "saved mode settings");
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let buf = fs::read_to_string(path)?;
        ron::from_str(&buf).with_context(|| format!("invalid mode settings in {}", path.display()))
    }
}

pub fn location_to_xml(location: &Location) -> XElement {
    let mut element = XElement::new("location")
        .with_attr("mode", location.mode().as_str())
        .with_attr("root", location.root())
        .with_attr("application", location.is_application_defined().to_string());
    if let Some(placement) = location.placement() {
        let path: Vec<String> = placement.path.iter().map(usize::to_string).collect();
        let mut path_element = XElement::new("path");
        if !path.is_empty() {
            path_element.set_text(path.join(" "));
        }
        element.add(path_element);
        if let Some(b) = placement.bounds {
            element.add(
                XElement::new("bounds")
                    .with_attr("x", b.x.to_string())
                    .with_attr("y", b.y.to_string())
                    .with_attr("width", b.width.to_string())
                    .with_attr("height", b.height.to_string()),
            );
        }
    }
    element
}

fn parse_attr<T: std::str::FromStr>(element: &XElement, key: &'static str) -> Result<T, SettingsError> {
    let value = element.require_attr(key)?;
    value.parse().map_err(|_| SettingsError::InvalidValue { field: key, value: value.to_owned() })
}

pub fn location_from_xml(element: &XElement) -> Result<Location, SettingsError> {
    let mode = ModeId::new(element.require_attr("mode")?);
    let root = element.require_attr("root")?;
    if root.is_empty() {
        return Err(SettingsError::InvalidValue { field: "root", value: String::new() });
    }
    let application = match element.attr("application") {
        Some(_) => parse_attr(element, "application")?,
        None => false,
    };
    let placement = match element.child("path") {
        None => None,
        Some(path) => {
            let steps = path
                .text()
                .unwrap_or_default()
                .split_whitespace()
                .map(|step| {
                    step.parse().map_err(|_| SettingsError::InvalidValue {
                        field: "path",
                        value: step.to_owned(),
                    })
                })
                .collect::<Result<Vec<usize>, _>>()?;
            let bounds = match element.child("bounds") {
                None => None,
                Some(b) => Some(Bounds::new(
                    parse_attr(b, "x")?,
                    parse_attr(b, "y")?,
                    parse_attr(b, "width")?,
                    parse_attr(b, "height")?,
                )),
            };
            Some(Placement { path: steps, bounds })
        }
    };
    Ok(Location::new(mode, root, placement).application_defined(application))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::ExtendedMode;

    fn maximized_setting() -> MaximizedModeSetting {
        let mut setting = MaximizedModeSetting::default();
        setting.last_maximized_mode.insert("center".into(), ExtendedMode::Normalized.id());
        setting.last_maximized_location.insert(
            "center".into(),
            Location::new(ExtendedMode::Normalized.id(), "center", Some(Placement::path([1, 0]))),
        );
        setting.last_maximized_mode.insert("side".into(), ExtendedMode::Minimized.id());
        setting
    }

    fn settings() -> ModeSettings {
        let mut modes = IndexMap::new();
        modes.insert(ExtendedMode::Normalized.id(), ModeSetting::Null);
        modes.insert(ExtendedMode::Maximized.id(), ModeSetting::Maximized(maximized_setting()));
        ModeSettings {
            dockables: vec![DockableModeSettings {
                key: "editor".into(),
                current: Some(ExtendedMode::Externalized.id()),
                history: vec![ExtendedMode::Normalized.id(), ExtendedMode::Externalized.id()],
                locations: vec![
                    Location::new(ExtendedMode::Normalized.id(), "center", Some(Placement::at(0))),
                    Location::new(
                        ExtendedMode::Externalized.id(),
                        "external",
                        Some(Placement::at(0).with_bounds(Bounds::new(5, 6, 70, 80))),
                    )
                    .application_defined(true),
                    Location::new(ExtendedMode::Minimized.id(), "west", None),
                ],
            }],
            modes,
        }
    }

    #[test]
    fn binary_round_trip() {
        let settings = settings();
        let bytes = settings.to_bytes().unwrap();
        assert_eq!(ModeSettings::read(bytes.as_slice()).unwrap(), settings);
    }

    #[test]
    fn xml_round_trip() {
        let settings = settings();
        let xml = settings.to_xml_string().unwrap();
        assert_eq!(ModeSettings::from_xml_str(&xml).unwrap(), settings);
    }

    #[test]
    fn ron_round_trip_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("modes.ron");
        let settings = settings();
        settings.save(&path).unwrap();
        assert_eq!(ModeSettings::load(&path).unwrap(), settings);
    }

    #[test]
    fn ron_locations_without_root_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modes.ron");
        let ron = ron::ser::to_string_pretty(&settings(), ron::ser::PrettyConfig::default()).unwrap();
        let broken = ron.replace("root: \"center\"", "root: \"\"");
        assert_ne!(broken, ron);
        fs::write(&path, broken).unwrap();

        let err = ModeSettings::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("needs a root area"), "{err:#}");
    }

    #[test]
    fn legacy_binary_skips_dockable_keys() {
        let location =
            Location::new(ExtendedMode::Normalized.id(), "center", Some(Placement::at(2)));
        let mut out = DataOutput::new(Vec::new());
        out.write_u32(LEGACY_VERSION).unwrap();
        out.write_len(0).unwrap();
        out.write_len(2).unwrap();
        out.write_utf(ExtendedMode::Maximized.id().as_str()).unwrap();
        out.write_u8(TAG_MAXIMIZED).unwrap();
        out.write_len(1).unwrap();
        out.write_utf("center").unwrap();
        out.write_bool(true).unwrap();
        out.write_utf(ExtendedMode::Normalized.id().as_str()).unwrap();
        out.write_bool(true).unwrap();
        out.write_utf("obsolete-dockable").unwrap();
        out.write_bool(true).unwrap();
        out.write_location(&location).unwrap();
        out.write_utf(ExtendedMode::Normalized.id().as_str()).unwrap();
        out.write_u8(TAG_NULL).unwrap();
        let bytes = out.into_inner();

        let settings = ModeSettings::read(bytes.as_slice()).unwrap();
        let mut expected = MaximizedModeSetting::default();
        expected.last_maximized_mode.insert("center".into(), ExtendedMode::Normalized.id());
        expected.last_maximized_location.insert("center".into(), location);
        assert_eq!(
            settings.modes.get(&ExtendedMode::Maximized.id()),
            Some(&ModeSetting::Maximized(expected))
        );
        assert_eq!(
            settings.modes.get(&ExtendedMode::Normalized.id()),
            Some(&ModeSetting::Null)
        );
    }

    #[test]
    fn legacy_xml_ignores_dockable_children() {
        let xml = r#"
            <modes version="1">
              <settings>
                <mode id="dock.mode.maximized" kind="maximized">
                  <entry area="center" mode="dock.mode.normal">
                    <dockable>obsolete</dockable>
                    <location mode="dock.mode.normal" root="center"><path>3</path></location>
                  </entry>
                </mode>
              </settings>
            </modes>"#;
        let settings = ModeSettings::from_xml_str(xml).unwrap();
        let Some(ModeSetting::Maximized(setting)) = settings.modes.get(&ExtendedMode::Maximized.id())
        else {
            panic!("maximized setting missing");
        };
        assert_eq!(
            setting.last_maximized_location.get("center"),
            Some(&Location::new(ExtendedMode::Normalized.id(), "center", Some(Placement::at(3))))
        );
        assert!(settings.dockables.is_empty());
    }

    #[test]
    fn future_versions_are_refused() {
        let mut out = DataOutput::new(Vec::new());
        out.write_u32(7).unwrap();
        assert!(matches!(
            ModeSettings::read(out.into_inner().as_slice()),
            Err(SettingsError::UnsupportedVersion(7))
        ));
        assert!(matches!(
            ModeSettings::from_xml_str(r#"<modes version="0"/>"#),
            Err(SettingsError::UnsupportedVersion(0))
        ));
    }

    #[test]
    fn empty_placement_path_survives_xml() {
        let location = Location::new(ExtendedMode::Externalized.id(), "external", Some(Placement::default()));
        let parsed = location_from_xml(&location_to_xml(&location)).unwrap();
        assert_eq!(parsed, location);
    }
}

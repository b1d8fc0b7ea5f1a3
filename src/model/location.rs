use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

/// Identifier of a location mode. Modes are looked up by this id, never by
/// their [`ExtendedMode`], so an application may register several modes of
/// the same kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModeId(String);

impl ModeId {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for ModeId {
    fn from(value: &str) -> Self { Self::new(value) }
}

/// The externally visible kind of a mode.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    strum::Display,
    strum::EnumString
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExtendedMode {
    Normalized,
    Minimized,
    Maximized,
    Externalized,
}

impl ExtendedMode {
    /// Identifier of the built-in mode implementing this kind.
    pub fn id(self) -> ModeId {
        ModeId::new(match self {
            ExtendedMode::Normalized => "dock.mode.normal",
            ExtendedMode::Minimized => "dock.mode.minimized",
            ExtendedMode::Maximized => "dock.mode.maximized",
            ExtendedMode::Externalized => "dock.mode.externalized",
        })
    }

    pub fn from_id(id: &ModeId) -> Option<Self> { Self::iter().find(|mode| mode.id() == *id) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }
}

/// Area relative position of an element.
///
/// `path` holds one child index per nesting level below the area's station:
/// `[2]` is the third child of the station, `[2, 1]` the second tab of the
/// tab group found there. Screen stations additionally record `bounds`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub path: Vec<usize>,
    #[serde(default)]
    pub bounds: Option<Bounds>,
}

impl Placement {
    pub fn at(index: usize) -> Self {
        Self {
            path: vec![index],
            bounds: None,
        }
    }

    pub fn path(path: impl Into<Vec<usize>>) -> Self {
        Self {
            path: path.into(),
            bounds: None,
        }
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.path)?;
        if let Some(b) = self.bounds {
            write!(f, "@({},{} {}x{})", b.x, b.y, b.width, b.height)?;
        }
        Ok(())
    }
}

/// Where an element was last seen: the mode owning it, the root area inside
/// that mode and the position inside the area. A missing placement means
/// "anywhere in the area".
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawLocation")]
pub struct Location {
    mode: ModeId,
    root: String,
    placement: Option<Placement>,
    #[serde(default)]
    application_defined: bool,
}

/// [`Location`] as read from disk, before the root is checked.
#[derive(Deserialize)]
#[serde(rename = "Location")]
struct RawLocation {
    mode: ModeId,
    root: String,
    placement: Option<Placement>,
    #[serde(default)]
    application_defined: bool,
}

impl TryFrom<RawLocation> for Location {
    type Error = String;

    fn try_from(raw: RawLocation) -> Result<Self, Self::Error> {
        if raw.root.is_empty() {
            return Err(format!("location of mode {} needs a root area", raw.mode));
        }
        Ok(Self {
            mode: raw.mode,
            root: raw.root,
            placement: raw.placement,
            application_defined: raw.application_defined,
        })
    }
}

impl Location {
    /// # Panics
    ///
    /// Panics if `root` is empty, locations always name their area.
    pub fn new(mode: ModeId, root: impl Into<String>, placement: Option<Placement>) -> Self {
        let root = root.into();
        assert!(!root.is_empty(), "location of mode {mode} needs a root area");
        Self {
            mode,
            root,
            placement,
            application_defined: false,
        }
    }

    /// Marks a location that was set up by the application rather than
    /// recorded from the user's actions.
    pub fn application_defined(mut self, value: bool) -> Self {
        self.application_defined = value;
        self
    }

    pub fn mode(&self) -> &ModeId { &self.mode }

    pub fn root(&self) -> &str { &self.root }

    pub fn placement(&self) -> Option<&Placement> { self.placement.as_ref() }

    pub fn is_application_defined(&self) -> bool { self.application_defined }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Location[mode={}, root={}", self.mode, self.root)?;
        match &self.placement {
            Some(p) => write!(f, ", placement={p}")?,
            None => f.write_str(", placement=default")?,
        }
        if self.application_defined {
            f.write_str(", application")?;
        }
        f.write_str("]")
    }
}

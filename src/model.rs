pub mod affected;
pub mod location;
pub mod tree;

pub use affected::AffectedSet;
pub use location::{Bounds, ExtendedMode, Location, ModeId, Placement};
pub use tree::{Acceptance, DockTree, ElementId, PlaceResult, StationKind, TreeError};

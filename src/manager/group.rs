//! Which elements move together when one dockable changes mode.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::mode::ModeError;
use crate::model::{DockTree, ElementId, ExtendedMode, Location, ModeId, StationKind};

/// What a group movement may ask of the manager while it runs.
pub trait GroupBehaviorCallback {
    fn tree(&self) -> &DockTree;

    /// Moves `element` into `mode` at its last known location there.
    fn set_mode(&mut self, element: ElementId, mode: &ModeId) -> Result<bool, ModeError>;

    fn set_location(&mut self, element: ElementId, location: &Location) -> Result<bool, ModeError>;

    /// Last location `element` had in `mode`.
    fn location(&self, element: ElementId, mode: &ModeId) -> Option<Location>;

    fn current_location(&self, element: ElementId) -> Option<Location>;
}

/// A prepared mode change for a set of elements.
pub trait GroupMovement {
    fn apply(&self, callback: &mut dyn GroupBehaviorCallback) -> Result<bool, ModeError>;
}

pub trait GroupBehavior {
    fn prepare(&self, tree: &DockTree, dockable: ElementId, target: &ModeId) -> Box<dyn GroupMovement>;

    /// The element that actually gets maximized when `dockable` is.
    fn maximizing_element(&self, tree: &DockTree, dockable: ElementId) -> ElementId;
}

/// Configured choice of [`GroupBehavior`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBehaviorSetting {
    #[default]
    Dockable,
    Stack,
}

impl GroupBehaviorSetting {
    pub fn build(self) -> Box<dyn GroupBehavior> {
        match self {
            GroupBehaviorSetting::Dockable => Box::new(DockableGroupBehavior),
            GroupBehaviorSetting::Stack => Box::new(StackGroupBehavior),
        }
    }
}

pub struct SingleMovement {
    element: ElementId,
    mode: ModeId,
}

impl SingleMovement {
    pub fn new(element: ElementId, mode: ModeId) -> Self { Self { element, mode } }
}

impl GroupMovement for SingleMovement {
    fn apply(&self, callback: &mut dyn GroupBehaviorCallback) -> Result<bool, ModeError> {
        callback.set_mode(self.element, &self.mode)
    }
}

/// Moves every tab of a tab group. When `together` is set, the first tab goes
/// to its own history and the others are stacked behind it; otherwise each
/// tab goes to its own history.
pub struct StackMovement {
    elements: Vec<ElementId>,
    mode: ModeId,
    together: bool,
}

impl GroupMovement for StackMovement {
    fn apply(&self, callback: &mut dyn GroupBehaviorCallback) -> Result<bool, ModeError> {
        let mut success = true;
        let mut anchor: Option<Location> = None;
        for (offset, &element) in self.elements.iter().enumerate() {
            let placed = match &anchor {
                Some(first) if self.together => {
                    callback.set_location(element, &behind(first, offset))?
                }
                _ => {
                    let placed = callback.set_mode(element, &self.mode)?;
                    anchor = callback
                        .current_location(element)
                        .filter(|l| l.mode() == &self.mode);
                    placed
                }
            };
            trace!(?element, placed, "group member moved");
            success &= placed;
        }
        Ok(success)
    }
}

/// `first` with its innermost index shifted by `offset`, nested one level
/// deeper when `first` sits directly in its station.
fn behind(first: &Location, offset: usize) -> Location {
    let mut placement = first.placement().cloned().unwrap_or_default();
    match placement.path.len() {
        0 => placement.path = vec![usize::MAX],
        1 => placement.path.push(offset),
        _ => {
            if let Some(last) = placement.path.last_mut() {
                *last += offset;
            }
        }
    }
    placement.bounds = None;
    Location::new(first.mode().clone(), first.root(), Some(placement))
}

/// Every dockable moves on its own.
#[derive(Clone, Copy, Debug, Default)]
pub struct DockableGroupBehavior;

impl GroupBehavior for DockableGroupBehavior {
    fn prepare(&self, _tree: &DockTree, dockable: ElementId, target: &ModeId) -> Box<dyn GroupMovement> {
        Box::new(SingleMovement::new(dockable, target.clone()))
    }

    fn maximizing_element(&self, _tree: &DockTree, dockable: ElementId) -> ElementId { dockable }
}

/// Tabs of a group travel together. Maximizing a tab maximizes its group.
#[derive(Clone, Copy, Debug, Default)]
pub struct StackGroupBehavior;

impl StackGroupBehavior {
    fn stack_of(tree: &DockTree, dockable: ElementId) -> Option<ElementId> {
        tree.parent(dockable).filter(|&p| tree.station_kind(p) == Some(StationKind::Stack))
    }
}

impl GroupBehavior for StackGroupBehavior {
    fn prepare(&self, tree: &DockTree, dockable: ElementId, target: &ModeId) -> Box<dyn GroupMovement> {
        let Some(stack) = Self::stack_of(tree, dockable) else {
            return Box::new(SingleMovement::new(dockable, target.clone()));
        };
        let extended = ExtendedMode::from_id(target);
        let stack_maximized = tree.parent(stack).and_then(|s| tree.fullscreen(s)) == Some(stack);
        match extended {
            Some(ExtendedMode::Maximized) => Box::new(SingleMovement::new(dockable, target.clone())),
            Some(ExtendedMode::Normalized) if stack_maximized => {
                Box::new(SingleMovement::new(stack, target.clone()))
            }
            _ => Box::new(StackMovement {
                elements: tree.children(stack).to_vec(),
                mode: target.clone(),
                together: matches!(
                    extended,
                    Some(ExtendedMode::Normalized | ExtendedMode::Externalized)
                ),
            }),
        }
    }

    fn maximizing_element(&self, tree: &DockTree, dockable: ElementId) -> ElementId {
        Self::stack_of(tree, dockable).unwrap_or(dockable)
    }
}

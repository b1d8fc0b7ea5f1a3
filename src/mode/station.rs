//! Modes whose areas keep elements as plain children of a station: normal,
//! minimized and externalized. They differ only in a small [`StationPolicy`].

use tracing::{debug, warn};

use crate::common::config::ExternalizedSettings;
use crate::mode::area::{AreaRegistry, AsideRequest, StationModeArea};
use crate::mode::{LocationMode, ModeContext, ModeCore, ModeError};
use crate::model::{AffectedSet, Bounds, DockTree, ElementId, ExtendedMode, Location, ModeId, Placement};

pub trait StationPolicy {
    fn extended_mode(&self) -> ExtendedMode;

    /// Adjusts the placement a transition is about to use. `placement` is
    /// `None` when the element has no usable history in the target area.
    fn complete(
        &self,
        _tree: &DockTree,
        _element: ElementId,
        placement: Option<Placement>,
    ) -> Option<Placement> {
        placement
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Normal;

impl StationPolicy for Normal {
    fn extended_mode(&self) -> ExtendedMode { ExtendedMode::Normalized }
}

/// Minimized elements line up flat along an edge, there is no tab nesting.
#[derive(Clone, Copy, Debug, Default)]
pub struct Minimized;

impl StationPolicy for Minimized {
    fn extended_mode(&self) -> ExtendedMode { ExtendedMode::Minimized }

    fn complete(
        &self,
        _tree: &DockTree,
        _element: ElementId,
        placement: Option<Placement>,
    ) -> Option<Placement> {
        placement.map(|mut p| {
            p.path.truncate(1);
            p.bounds = None;
            p
        })
    }
}

/// Externalized elements always float with bounds: their own if they had
/// some, the configured default otherwise.
#[derive(Clone, Copy, Debug)]
pub struct Externalized {
    pub default_bounds: Bounds,
}

impl Default for Externalized {
    fn default() -> Self { Self::from_settings(&ExternalizedSettings::default()) }
}

impl Externalized {
    pub fn from_settings(settings: &ExternalizedSettings) -> Self {
        Self { default_bounds: settings.default_bounds }
    }
}

impl StationPolicy for Externalized {
    fn extended_mode(&self) -> ExtendedMode { ExtendedMode::Externalized }

    fn complete(
        &self,
        tree: &DockTree,
        element: ElementId,
        placement: Option<Placement>,
    ) -> Option<Placement> {
        let mut placement = placement.unwrap_or_else(|| Placement::path(Vec::new()));
        if placement.bounds.is_none() {
            placement.bounds = Some(tree.bounds(element).unwrap_or(self.default_bounds));
        }
        Some(placement)
    }
}

pub struct DefaultLocationMode<P> {
    core: ModeCore,
    areas: AreaRegistry<dyn StationModeArea>,
    policy: P,
}

pub type NormalMode = DefaultLocationMode<Normal>;
pub type MinimizedMode = DefaultLocationMode<Minimized>;
pub type ExternalizedMode = DefaultLocationMode<Externalized>;

impl NormalMode {
    pub fn new() -> Self { Self::with_policy(Normal) }
}

impl MinimizedMode {
    pub fn new() -> Self { Self::with_policy(Minimized) }
}

impl ExternalizedMode {
    pub fn new() -> Self { Self::with_policy(Externalized::default()) }
}

impl<P: StationPolicy> DefaultLocationMode<P> {
    pub fn with_policy(policy: P) -> Self { Self::with_id(policy.extended_mode().id(), policy) }

    /// A mode with a custom id, for applications running several modes of the
    /// same kind.
    pub fn with_id(id: ModeId, policy: P) -> Self {
        Self {
            core: ModeCore::new(id.clone(), policy.extended_mode()),
            areas: AreaRegistry::new(id),
            policy,
        }
    }

    pub fn add(&mut self, area: impl StationModeArea + 'static) -> Result<(), ModeError> {
        self.areas.add(Box::new(area))
    }

    pub fn remove(&mut self, id: &str) -> Option<Box<dyn StationModeArea>> { self.areas.remove(id) }

    pub fn areas(&self) -> &AreaRegistry<dyn StationModeArea> { &self.areas }

    pub fn default_area(&self) -> Option<&str> { self.areas.default_area() }

    pub fn set_default_area(&mut self, id: Option<&str>) -> Result<(), ModeError> {
        self.areas.set_default_area(id)
    }

    pub fn policy(&self) -> &P { &self.policy }

    pub fn policy_mut(&mut self) -> &mut P { &mut self.policy }
}

impl<P: StationPolicy> LocationMode for DefaultLocationMode<P> {
    fn core(&self) -> &ModeCore { &self.core }

    fn core_mut(&mut self) -> &mut ModeCore { &mut self.core }

    fn representation_ids(&self) -> Vec<String> { self.areas.ids() }

    fn representation(&self, area: &str) -> Option<ElementId> {
        self.areas.get(area).map(|a| a.station())
    }

    fn is_representing(&self, station: ElementId) -> bool {
        self.areas.by_station(station).is_some()
    }

    fn is_current_mode(&self, tree: &DockTree, element: ElementId) -> bool {
        self.areas.iter().any(|a| a.is_child(tree, element))
    }

    fn current(&self, tree: &DockTree, element: ElementId) -> Option<Location> {
        let (area, _) = self.areas.area_of(tree, element)?;
        Some(Location::new(
            self.core.id().clone(),
            area.unique_id(),
            area.location(tree, element),
        ))
    }

    fn run_apply(
        &mut self,
        cx: &mut ModeContext<'_>,
        dockable: ElementId,
        history: Option<&Location>,
        affected: &mut AffectedSet,
    ) -> Result<bool, ModeError> {
        let Some(area_id) = self.areas.resolve(history) else {
            if let Some(history) = history {
                warn!(mode = %self.core.id(), %history, "no area for history and no default area");
                return Ok(false);
            }
            return Err(ModeError::NoTargetArea {
                mode: self.core.id().clone(),
                element: dockable,
            });
        };
        let placement = history
            .filter(|h| h.root() == area_id)
            .and_then(|h| h.placement().cloned());
        let placement = self.policy.complete(cx.tree, dockable, placement);

        let Some(area) = self.areas.get_mut(&area_id) else {
            return Ok(false);
        };
        let result = area.set_location(cx.tree, dockable, placement.as_ref(), affected)?;
        debug!(mode = %self.core.id(), area = %area_id, ?dockable, ?result, "station apply");
        Ok(result.is_placed())
    }

    fn aside(&self, tree: &DockTree, location: &Location) -> Option<Location> {
        let area = self.areas.get(location.root())?;
        let answer = area.aside(tree, &AsideRequest::new(location.placement().cloned()));
        if answer.canceled {
            return None;
        }
        Some(Location::new(self.core.id().clone(), location.root(), answer.location))
    }
}

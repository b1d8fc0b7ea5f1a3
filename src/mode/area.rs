use tracing::{debug, trace};

use crate::common::collections::IndexMap;
use crate::mode::{ApplyHook, LocationModeEvent, ModeError};
use crate::model::{
    AffectedSet, DockTree, ElementId, Location, ModeId, PlaceResult, Placement, TreeError,
};

/// A station wrapped for one mode. Areas are the only thing a mode touches
/// when it moves elements around.
pub trait ModeArea {
    fn unique_id(&self) -> &str;

    fn station(&self) -> ElementId;

    /// Whether `element` is shown by this area in its mode right now.
    fn is_child(&self, tree: &DockTree, element: ElementId) -> bool;

    /// Whether the area may be picked as default when none was set.
    fn auto_default_area(&self) -> bool { true }

    /// Whether locations may name this area as their root.
    fn is_location_root(&self) -> bool { true }

    /// Called with the owning mode when the area is added and with `None`
    /// when it is removed.
    fn set_mode(&mut self, mode: Option<&ModeId>);
}

/// Area of a mode that keeps its elements as plain children.
pub trait StationModeArea: ModeArea {
    fn location(&self, tree: &DockTree, child: ElementId) -> Option<Placement>;

    /// Drops `element` at `placement`. Elements that actually moved go into
    /// `affected`, a veto leaves it untouched.
    fn set_location(
        &mut self,
        tree: &mut DockTree,
        element: ElementId,
        placement: Option<&Placement>,
        affected: &mut AffectedSet,
    ) -> Result<PlaceResult, TreeError>;

    /// Finds a spot next to `request.location` for a second element.
    fn aside(&self, _tree: &DockTree, request: &AsideRequest) -> AsideAnswer {
        let Some(placement) = &request.location else {
            return AsideAnswer::canceled();
        };
        let mut next = placement.clone();
        if let Some(last) = next.path.last_mut() {
            *last += 1;
        }
        AsideAnswer::at(next)
    }
}

/// Area of the maximized mode. Maximizing an element makes it cover the
/// whole station.
pub trait MaximizedModeArea: ModeArea {
    fn maximized(&self, tree: &DockTree) -> Vec<ElementId>;

    fn location(&self, tree: &DockTree, child: ElementId) -> Option<Placement>;

    fn set_maximized(
        &mut self,
        tree: &mut DockTree,
        element: ElementId,
        maximized: bool,
        placement: Option<&Placement>,
        affected: &mut AffectedSet,
    ) -> Result<PlaceResult, TreeError>;

    /// Whether [`MaximizedModeArea::set_maximized`] would accept `element`
    /// at `placement`, without touching the tree.
    fn can_maximize(
        &self,
        tree: &DockTree,
        element: ElementId,
        placement: Option<&Placement>,
    ) -> Result<bool, TreeError>;

    /// Another mode is about to move `event.dockable()`. The area may lift its
    /// maximize state now and hand back work to run once the move is done.
    fn on_apply(
        &mut self,
        tree: &mut DockTree,
        event: &LocationModeEvent,
        affected: &mut AffectedSet,
    ) -> Option<ApplyHook>;

    /// Like [`MaximizedModeArea::on_apply`] for the case where the moving
    /// dockable is part of the maximized element and `replacement` stays
    /// behind in its place.
    fn on_apply_replacement(
        &mut self,
        tree: &mut DockTree,
        event: &LocationModeEvent,
        replacement: ElementId,
        affected: &mut AffectedSet,
    ) -> Option<ApplyHook>;
}

/// Observes changes an area makes on its own, outside of any mode
/// transition, such as a user reordering tabs.
///
/// Areas do not own the tree, so they cannot notice such changes
/// themselves. The container layer reports them through
/// [`LocationModeManager::internal_location_change`], and listeners are
/// registered there with [`LocationModeManager::add_area_listener`].
///
/// [`LocationModeManager::internal_location_change`]: crate::manager::LocationModeManager::internal_location_change
/// [`LocationModeManager::add_area_listener`]: crate::manager::LocationModeManager::add_area_listener
pub trait ModeAreaListener {
    fn internal_location_change(&mut self, area: &str, elements: &[ElementId]);
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AsideRequest {
    pub location: Option<Placement>,
}

impl AsideRequest {
    pub fn new(location: Option<Placement>) -> Self { Self { location } }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AsideAnswer {
    pub canceled: bool,
    pub location: Option<Placement>,
}

impl AsideAnswer {
    pub fn at(location: Placement) -> Self {
        Self {
            canceled: false,
            location: Some(location),
        }
    }

    pub fn canceled() -> Self {
        Self {
            canceled: true,
            location: None,
        }
    }
}

/// The areas of one mode, keyed by unique id in registration order.
pub struct AreaRegistry<A: ?Sized> {
    mode: ModeId,
    areas: IndexMap<String, Box<A>>,
    default_area: Option<String>,
}

impl<A: ?Sized + ModeArea> AreaRegistry<A> {
    pub fn new(mode: ModeId) -> Self {
        Self {
            mode,
            areas: IndexMap::new(),
            default_area: None,
        }
    }

    pub fn add(&mut self, mut area: Box<A>) -> Result<(), ModeError> {
        let id = area.unique_id().to_owned();
        if id.is_empty() {
            return Err(ModeError::EmptyAreaId { mode: self.mode.clone() });
        }
        if self.areas.contains_key(&id) {
            return Err(ModeError::DuplicateArea { mode: self.mode.clone(), area: id });
        }
        area.set_mode(Some(&self.mode));
        debug!(mode = %self.mode, area = %id, "area added");
        self.areas.insert(id, area);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<Box<A>> {
        let mut area = self.areas.shift_remove(id)?;
        area.set_mode(None);
        if self.default_area.as_deref() == Some(id) {
            self.default_area = None;
        }
        Some(area)
    }

    pub fn get(&self, id: &str) -> Option<&A> { self.areas.get(id).map(|a| &**a) }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut A> {
        self.areas.get_mut(id).map(|a| &mut **a)
    }

    pub fn contains(&self, id: &str) -> bool { self.areas.contains_key(id) }

    pub fn iter(&self) -> impl Iterator<Item = &A> { self.areas.values().map(|a| &**a) }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut A> {
        self.areas.values_mut().map(|a| &mut **a)
    }

    pub fn ids(&self) -> Vec<String> { self.areas.keys().cloned().collect() }

    pub fn len(&self) -> usize { self.areas.len() }

    pub fn is_empty(&self) -> bool { self.areas.is_empty() }

    /// The explicitly set default, else the first area that allows being
    /// picked automatically.
    pub fn default_area(&self) -> Option<&str> {
        match &self.default_area {
            Some(id) => Some(id.as_str()),
            None => self
                .areas
                .iter()
                .find(|(_, a)| a.auto_default_area())
                .map(|(id, _)| id.as_str()),
        }
    }

    pub fn set_default_area(&mut self, id: Option<&str>) -> Result<(), ModeError> {
        if let Some(id) = id
            && !self.areas.contains_key(id)
        {
            return Err(ModeError::UnknownDefaultArea {
                mode: self.mode.clone(),
                area: id.to_owned(),
            });
        }
        self.default_area = id.map(str::to_owned);
        Ok(())
    }

    /// Area wrapping `station`.
    pub fn by_station(&self, station: ElementId) -> Option<&A> {
        self.iter().find(|a| a.station() == station)
    }

    /// Area currently showing `element`, looking at `element` and then its
    /// ancestors.
    pub fn area_of(&self, tree: &DockTree, element: ElementId) -> Option<(&A, ElementId)> {
        std::iter::once(element)
            .chain(tree.ancestors(element))
            .find_map(|e| {
                self.iter()
                    .find(|a| a.is_location_root() && a.is_child(tree, e))
                    .map(|a| (a, e))
            })
    }

    /// Area a transition with `history` should target: the area named by the
    /// history if it is registered here, else the default area.
    pub fn resolve(&self, history: Option<&Location>) -> Option<String> {
        if let Some(root) = history.map(Location::root)
            && self.areas.contains_key(root)
        {
            return Some(root.to_owned());
        }
        self.default_area().map(str::to_owned)
    }
}

/// A station shown by a station mode (normal, minimized, externalized).
/// A child covered by the station's fullscreen element belongs to the
/// maximized mode instead.
#[derive(Debug)]
pub struct StationArea {
    id: String,
    station: ElementId,
    auto_default: bool,
    location_root: bool,
    mode: Option<ModeId>,
    cascade: i32,
}

impl StationArea {
    pub fn new(id: impl Into<String>, station: ElementId) -> Self {
        Self {
            id: id.into(),
            station,
            auto_default: true,
            location_root: true,
            mode: None,
            cascade: 0,
        }
    }

    pub fn auto_default(mut self, value: bool) -> Self {
        self.auto_default = value;
        self
    }

    pub fn location_root(mut self, value: bool) -> Self {
        self.location_root = value;
        self
    }

    /// Offset applied to the bounds of an element placed aside another one.
    pub fn cascade(mut self, offset: i32) -> Self {
        self.cascade = offset;
        self
    }

    pub fn mode(&self) -> Option<&ModeId> { self.mode.as_ref() }
}

impl ModeArea for StationArea {
    fn unique_id(&self) -> &str { &self.id }

    fn station(&self) -> ElementId { self.station }

    fn is_child(&self, tree: &DockTree, element: ElementId) -> bool {
        tree.parent(element) == Some(self.station) && tree.fullscreen(self.station) != Some(element)
    }

    fn auto_default_area(&self) -> bool { self.auto_default }

    fn is_location_root(&self) -> bool { self.location_root }

    fn set_mode(&mut self, mode: Option<&ModeId>) { self.mode = mode.cloned(); }
}

impl StationModeArea for StationArea {
    fn location(&self, tree: &DockTree, child: ElementId) -> Option<Placement> {
        tree.placement_of(self.station, child)
    }

    fn set_location(
        &mut self,
        tree: &mut DockTree,
        element: ElementId,
        placement: Option<&Placement>,
        affected: &mut AffectedSet,
    ) -> Result<PlaceResult, TreeError> {
        if placement.is_none() && tree.parent(element) == Some(self.station) {
            return Ok(PlaceResult::Placed);
        }
        let result = tree.drop_at(self.station, element, placement)?;
        if result.is_placed() {
            trace!(area = %self.id, ?element, "placed");
            affected.add(tree, element);
        }
        Ok(result)
    }

    fn aside(&self, _tree: &DockTree, request: &AsideRequest) -> AsideAnswer {
        let Some(placement) = &request.location else {
            return AsideAnswer::canceled();
        };
        let mut next = placement.clone();
        if let Some(last) = next.path.last_mut() {
            *last += 1;
        }
        if let Some(bounds) = next.bounds {
            next.bounds = Some(bounds.offset(self.cascade, self.cascade));
        }
        AsideAnswer::at(next)
    }
}

/// The maximize side of a station: the station's fullscreen child is the
/// maximized element.
#[derive(Debug)]
pub struct MaximizeArea {
    id: String,
    station: ElementId,
    mode: Option<ModeId>,
}

impl MaximizeArea {
    pub fn new(id: impl Into<String>, station: ElementId) -> Self {
        Self { id: id.into(), station, mode: None }
    }

    pub fn mode(&self) -> Option<&ModeId> { self.mode.as_ref() }

    fn lift(&self, tree: &mut DockTree, affected: &mut AffectedSet) -> Option<ElementId> {
        let maximized = tree.fullscreen(self.station)?;
        _ = tree.set_fullscreen(self.station, None);
        affected.add(tree, maximized);
        Some(maximized)
    }
}

impl ModeArea for MaximizeArea {
    fn unique_id(&self) -> &str { &self.id }

    fn station(&self) -> ElementId { self.station }

    fn is_child(&self, tree: &DockTree, element: ElementId) -> bool {
        tree.fullscreen(self.station) == Some(element)
    }

    fn set_mode(&mut self, mode: Option<&ModeId>) { self.mode = mode.cloned(); }
}

impl MaximizedModeArea for MaximizeArea {
    fn maximized(&self, tree: &DockTree) -> Vec<ElementId> {
        tree.fullscreen(self.station).into_iter().collect()
    }

    fn location(&self, tree: &DockTree, child: ElementId) -> Option<Placement> {
        tree.placement_of(self.station, child)
    }

    fn set_maximized(
        &mut self,
        tree: &mut DockTree,
        element: ElementId,
        maximized: bool,
        placement: Option<&Placement>,
        affected: &mut AffectedSet,
    ) -> Result<PlaceResult, TreeError> {
        if !maximized {
            if tree.fullscreen(self.station) == Some(element) {
                _ = self.lift(tree, affected);
            }
            return Ok(PlaceResult::Placed);
        }
        if tree.parent(element) != Some(self.station)
            && tree.drop_at(self.station, element, placement)? == PlaceResult::Vetoed
        {
            return Ok(PlaceResult::Vetoed);
        }
        let top = tree
            .top_level_child(self.station, element)
            .ok_or(TreeError::NotAChild { station: self.station, element })?;
        if let Some(previous) = tree.fullscreen(self.station) {
            affected.add(tree, previous);
        }
        tree.set_fullscreen(self.station, Some(top))?;
        affected.add(tree, top);
        debug!(area = %self.id, element = ?top, "maximized");
        Ok(PlaceResult::Placed)
    }

    fn can_maximize(
        &self,
        tree: &DockTree,
        element: ElementId,
        placement: Option<&Placement>,
    ) -> Result<bool, TreeError> {
        if tree.parent(element) == Some(self.station) {
            return Ok(true);
        }
        tree.can_drop(self.station, element, placement)
    }

    fn on_apply(
        &mut self,
        tree: &mut DockTree,
        event: &LocationModeEvent,
        affected: &mut AffectedSet,
    ) -> Option<ApplyHook> {
        let maximized = tree.fullscreen(self.station)?;
        let dockable = event.dockable();
        if maximized == dockable || tree.is_ancestor(dockable, maximized) {
            // the maximized element itself changes mode
            self.lift(tree, affected);
            return None;
        }

        // Some other element moves. Step out of the way and come back unless
        // the move normalized into this very station.
        let normalized_here = event.location().is_some_and(|l| l.root() == self.id);
        let station = self.station;
        tree.set_fullscreen(station, None).ok()?;
        Some(Box::new(move |tree: &mut DockTree, event: &LocationModeEvent, affected: &mut AffectedSet| {
            let rewind = !normalized_here || !event.is_success();
            if rewind && tree.parent(maximized) == Some(station) {
                _ = tree.set_fullscreen(station, Some(maximized));
            } else {
                affected.add(tree, maximized);
            }
        }))
    }

    fn on_apply_replacement(
        &mut self,
        tree: &mut DockTree,
        _event: &LocationModeEvent,
        replacement: ElementId,
        affected: &mut AffectedSet,
    ) -> Option<ApplyHook> {
        self.lift(tree, affected)?;
        let station = self.station;
        Some(Box::new(move |tree: &mut DockTree, _: &LocationModeEvent, affected: &mut AffectedSet| {
            if let Some(top) = tree.top_level_child(station, replacement) {
                _ = tree.set_fullscreen(station, Some(top));
                affected.add(tree, top);
            }
        }))
    }
}

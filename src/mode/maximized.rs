//! The maximized mode.
//!
//! Maximizing an element remembers, per area, which mode and location the
//! element came from, so unmaximizing can send it back. Other modes' moves
//! temporarily lift the maximize state through the area hooks and put it
//! back afterwards.

use tracing::{debug, trace};

use crate::common::collections::BTreeMap;
use crate::common::config::KeyStroke;
use crate::mode::area::{AreaRegistry, MaximizedModeArea};
use crate::mode::{
    ApplyHook, LocationMode, LocationModeEvent, ModeContext, ModeCore, ModeError, Transition,
};
use crate::model::{AffectedSet, DockTree, ElementId, ExtendedMode, Location, ModeId, PlaceResult};
use crate::settings::{MaximizedModeSetting, ModeSetting};

pub struct MaximizedMode {
    core: ModeCore,
    areas: AreaRegistry<dyn MaximizedModeArea>,
    last_maximized_location: BTreeMap<String, Location>,
    last_maximized_mode: BTreeMap<String, ModeId>,
    switch_key: Option<KeyStroke>,
}

impl Default for MaximizedMode {
    fn default() -> Self { Self::new() }
}

impl MaximizedMode {
    pub fn new() -> Self { Self::with_id(ExtendedMode::Maximized.id()) }

    pub fn with_id(id: ModeId) -> Self {
        Self {
            core: ModeCore::new(id.clone(), ExtendedMode::Maximized),
            areas: AreaRegistry::new(id),
            last_maximized_location: BTreeMap::new(),
            last_maximized_mode: BTreeMap::new(),
            switch_key: None,
        }
    }

    pub fn add(&mut self, area: impl MaximizedModeArea + 'static) -> Result<(), ModeError> {
        self.areas.add(Box::new(area))
    }

    pub fn remove(&mut self, id: &str) -> Option<Box<dyn MaximizedModeArea>> {
        self.last_maximized_mode.remove(id);
        self.last_maximized_location.remove(id);
        self.areas.remove(id)
    }

    pub fn areas(&self) -> &AreaRegistry<dyn MaximizedModeArea> { &self.areas }

    pub fn set_default_area(&mut self, id: Option<&str>) -> Result<(), ModeError> {
        self.areas.set_default_area(id)
    }

    pub fn switch_key(&self) -> Option<&KeyStroke> { self.switch_key.as_ref() }

    pub fn set_switch_key(&mut self, key: Option<KeyStroke>) { self.switch_key = key; }

    pub fn last_maximized_mode(&self, area: &str) -> Option<&ModeId> {
        self.last_maximized_mode.get(area)
    }

    pub fn last_maximized_location(&self, area: &str) -> Option<&Location> {
        self.last_maximized_location.get(area)
    }

    /// The maximized element covering `element` and the id of its area.
    pub fn maximized_area_of(
        &self,
        tree: &DockTree,
        element: ElementId,
    ) -> Option<(String, ElementId)> {
        std::iter::once(element).chain(tree.ancestors(element)).find_map(|e| {
            self.areas
                .iter()
                .find(|a| a.maximized(tree).contains(&e))
                .map(|a| (a.unique_id().to_owned(), e))
        })
    }

    /// Maximizes `element` in `area_id`.
    ///
    /// If another element is maximized there, it is lifted and sent back to
    /// the mode it came from first, and `element` is maximized by a follow-up
    /// queued behind that. Nothing is lifted when the area would veto
    /// `element`.
    pub fn maximize(
        &mut self,
        cx: &mut ModeContext<'_>,
        area_id: &str,
        element: ElementId,
        history: Option<&Location>,
        affected: &mut AffectedSet,
    ) -> Result<bool, ModeError> {
        let Some(area) = self.areas.get_mut(area_id) else {
            return Err(ModeError::NoTargetArea {
                mode: self.core.id().clone(),
                element,
            });
        };
        let before = area.maximized(cx.tree);
        if before.contains(&element) {
            return Ok(true);
        }
        if !before.is_empty() {
            let placement = history.and_then(Location::placement);
            if !area.can_maximize(cx.tree, element, placement)? {
                debug!(area = %area_id, ?element, "maximize vetoed, keeping the current one");
                return Ok(false);
            }
            let mode = self.last_maximized_mode.remove(area_id);
            let location = self.last_maximized_location.remove(area_id);
            for displaced in before {
                _ = area.set_maximized(cx.tree, displaced, false, None, affected)?;
                cx.follow_up(match &mode {
                    Some(mode) => Transition::To {
                        element: displaced,
                        mode: mode.clone(),
                        location: location.clone(),
                    },
                    None => Transition::Previous { element: displaced },
                });
            }
            cx.follow_up(Transition::To {
                element,
                mode: self.core.id().clone(),
                location: history.cloned(),
            });
            return Ok(true);
        }

        let previous = cx.previous_location(element).cloned();
        let placement = history.and_then(Location::placement);
        if area.set_maximized(cx.tree, element, true, placement, affected)? == PlaceResult::Vetoed {
            return Ok(false);
        }

        match previous {
            Some(location) if location.mode() != self.core.id() => {
                debug!(area = %area_id, %location, "remembering where the maximized element came from");
                self.last_maximized_mode.insert(area_id.to_owned(), location.mode().clone());
                self.last_maximized_location.insert(area_id.to_owned(), location);
            }
            Some(_) => {}
            None => {
                self.last_maximized_mode.remove(area_id);
                self.last_maximized_location.remove(area_id);
            }
        }
        Ok(true)
    }

    /// Lifts the maximize state covering `dockable` and returns the
    /// transition that sends the formerly maximized element home.
    pub fn unmaximize(
        &mut self,
        tree: &mut DockTree,
        dockable: ElementId,
        affected: &mut AffectedSet,
    ) -> Result<Vec<Transition>, ModeError> {
        let Some((area_id, element)) = self.maximized_area_of(tree, dockable) else {
            return Ok(Vec::new());
        };
        if let Some(area) = self.areas.get_mut(&area_id) {
            _ = area.set_maximized(tree, element, false, None, affected)?;
        }
        let mode = self.last_maximized_mode.remove(&area_id);
        let location = self.last_maximized_location.remove(&area_id);
        debug!(area = %area_id, ?element, ?mode, "unmaximized");
        Ok(vec![match mode {
            Some(mode) => Transition::To { element, mode, location },
            None => Transition::Previous { element },
        }])
    }

    /// Forgets the origin of areas that no longer show a maximized element.
    /// Returns whether anything was forgotten.
    pub fn prune(&mut self, tree: &DockTree) -> bool {
        let areas = &self.areas;
        let keep = |area: &String| areas.get(area).is_some_and(|a| !a.maximized(tree).is_empty());
        let before = self.last_maximized_mode.len() + self.last_maximized_location.len();
        self.last_maximized_mode.retain(|area, _| keep(area));
        self.last_maximized_location.retain(|area, _| keep(area));
        let pruned = before != self.last_maximized_mode.len() + self.last_maximized_location.len();
        if pruned {
            trace!("forgot origins of areas without a maximized element");
        }
        pruned
    }

    pub fn setting(&self) -> MaximizedModeSetting {
        MaximizedModeSetting {
            last_maximized_mode: self.last_maximized_mode.clone(),
            last_maximized_location: self.last_maximized_location.clone(),
        }
    }

    pub fn read(&mut self, setting: &MaximizedModeSetting) {
        self.last_maximized_mode = setting.last_maximized_mode.clone();
        self.last_maximized_location = setting.last_maximized_location.clone();
    }
}

impl LocationMode for MaximizedMode {
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
        let element = cx.group().maximizing_element(cx.tree, dockable);
        let known_root = history.map(Location::root).filter(|root| self.areas.contains(root));
        let hosting = std::iter::once(element)
            .chain(cx.tree.ancestors(element))
            .find_map(|e| self.areas.by_station(e))
            .map(|a| a.unique_id().to_owned());
        let area_id = match (known_root, hosting, self.areas.default_area()) {
            (Some(root), _, _) => root.to_owned(),
            (None, Some(hosting), _) => hosting,
            (None, None, Some(default)) => default.to_owned(),
            (None, None, None) if history.is_some() => return Ok(false),
            (None, None, None) => {
                return Err(ModeError::NoTargetArea {
                    mode: self.core.id().clone(),
                    element: dockable,
                });
            }
        };
        let history = history.filter(|h| h.root() == area_id);
        self.maximize(cx, &area_id, element, history, affected)
    }

    fn ensure_not_hidden(
        &mut self,
        cx: &mut ModeContext<'_>,
        dockable: ElementId,
        affected: &mut AffectedSet,
    ) -> Result<(), ModeError> {
        let covering: Vec<ElementId> = self
            .areas
            .iter()
            .filter(|a| cx.tree.is_ancestor(a.station(), dockable))
            .flat_map(|a| a.maximized(cx.tree))
            .filter(|&m| m != dockable && !cx.tree.is_ancestor(m, dockable))
            .collect();
        for maximized in covering {
            trace!(?maximized, ?dockable, "unmaximizing to reveal");
            for transition in self.unmaximize(cx.tree, maximized, affected)? {
                cx.follow_up(transition);
            }
        }
        Ok(())
    }

    fn sibling_apply_starting(
        &mut self,
        tree: &mut DockTree,
        event: &mut LocationModeEvent,
        affected: &mut AffectedSet,
    ) -> Option<ApplyHook> {
        if event.is_done() {
            return None;
        }
        let dockable = event.dockable();
        let normalizing = ExtendedMode::from_id(event.mode()) == Some(ExtendedMode::Normalized);
        let mut hooks = Vec::new();
        for area in self.areas.iter_mut() {
            let Some(maximized) = area.maximized(tree).first().copied() else {
                continue;
            };
            let hook = if maximized != dockable && tree.is_ancestor(maximized, dockable) {
                match tree.children(maximized).iter().copied().find(|&c| c != dockable) {
                    Some(replacement) => {
                        area.on_apply_replacement(tree, event, replacement, affected)
                    }
                    None => area.on_apply(tree, event, affected),
                }
            } else {
                area.on_apply(tree, event, affected)
            };
            hooks.extend(hook);

            // Normalizing the maximized element without a target location:
            // lifting the maximize state already put it back.
            if normalizing
                && maximized == dockable
                && event.location().is_none()
                && tree.parent(dockable) == Some(area.station())
            {
                debug!(?dockable, "normalized by unmaximizing");
                event.done(true);
            }
        }
        if hooks.is_empty() {
            return None;
        }
        Some(Box::new(move |tree: &mut DockTree, event: &LocationModeEvent, affected: &mut AffectedSet| {
            for hook in hooks {
                hook(tree, event, affected);
            }
        }))
    }

    fn sibling_apply_done(&mut self, tree: &DockTree, _event: &LocationModeEvent) {
        self.prune(tree);
    }

    fn write_setting(&self) -> ModeSetting { ModeSetting::Maximized(self.setting()) }

    fn read_setting(&mut self, setting: &ModeSetting) {
        if let ModeSetting::Maximized(setting) = setting {
            self.read(setting);
        }
    }

    fn as_maximized(&self) -> Option<&MaximizedMode> { Some(self) }

    fn as_maximized_mut(&mut self) -> Option<&mut MaximizedMode> { Some(self) }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::manager::group::{DockableGroupBehavior, StackGroupBehavior};
    use crate::mode::area::{MaximizeArea, ModeArea};
    use crate::model::{Acceptance, Placement, StationKind, TreeError};

    /// Counts how often the wrapped area is asked to maximize.
    struct Counting {
        inner: MaximizeArea,
        calls: Rc<Cell<usize>>,
    }

    impl ModeArea for Counting {
        fn unique_id(&self) -> &str { self.inner.unique_id() }

        fn station(&self) -> ElementId { self.inner.station() }

        fn is_child(&self, tree: &DockTree, element: ElementId) -> bool {
            self.inner.is_child(tree, element)
        }

        fn set_mode(&mut self, mode: Option<&ModeId>) { self.inner.set_mode(mode) }
    }

    impl MaximizedModeArea for Counting {
        fn maximized(&self, tree: &DockTree) -> Vec<ElementId> { self.inner.maximized(tree) }

        fn location(&self, tree: &DockTree, child: ElementId) -> Option<crate::model::Placement> {
            self.inner.location(tree, child)
        }

        fn set_maximized(
            &mut self,
            tree: &mut DockTree,
            element: ElementId,
            maximized: bool,
            placement: Option<&crate::model::Placement>,
            affected: &mut AffectedSet,
        ) -> Result<PlaceResult, TreeError> {
            if maximized {
                self.calls.set(self.calls.get() + 1);
            }
            self.inner.set_maximized(tree, element, maximized, placement, affected)
        }

        fn can_maximize(
            &self,
            tree: &DockTree,
            element: ElementId,
            placement: Option<&crate::model::Placement>,
        ) -> Result<bool, TreeError> {
            self.inner.can_maximize(tree, element, placement)
        }

        fn on_apply(
            &mut self,
            tree: &mut DockTree,
            event: &LocationModeEvent,
            affected: &mut AffectedSet,
        ) -> Option<ApplyHook> {
            self.inner.on_apply(tree, event, affected)
        }

        fn on_apply_replacement(
            &mut self,
            tree: &mut DockTree,
            event: &LocationModeEvent,
            replacement: ElementId,
            affected: &mut AffectedSet,
        ) -> Option<ApplyHook> {
            self.inner.on_apply_replacement(tree, event, replacement, affected)
        }
    }

    fn normal_at(index: usize) -> Location {
        Location::new(ExtendedMode::Normalized.id(), "center", Some(Placement::at(index)))
    }

    #[test]
    fn maximize_remembers_origin_and_is_idempotent() {
        let mut tree = DockTree::new();
        let center = tree.add_station("center", StationKind::Split);
        let d = tree.add_dockable("d");
        tree.insert(center, d, 0).unwrap();
        let calls = Rc::new(Cell::new(0));
        let mut mode = MaximizedMode::new();
        mode.add(Counting {
            inner: MaximizeArea::new("center", center),
            calls: calls.clone(),
        })
        .unwrap();

        let group = DockableGroupBehavior;
        let mut affected = AffectedSet::new();
        let mut cx = ModeContext::new(&mut tree, &group).with_snapshot(d, normal_at(0));
        assert!(mode.maximize(&mut cx, "center", d, None, &mut affected).unwrap());
        assert!(mode.maximize(&mut cx, "center", d, None, &mut affected).unwrap());
        assert!(cx.into_follow_ups().is_empty());
        assert_eq!(calls.get(), 1);
        assert_eq!(
            mode.last_maximized_mode("center"),
            Some(&ExtendedMode::Normalized.id())
        );
        assert_eq!(mode.last_maximized_location("center"), Some(&normal_at(0)));

        let back = mode.unmaximize(&mut tree, d, &mut affected).unwrap();
        assert_eq!(back, vec![Transition::To {
            element: d,
            mode: ExtendedMode::Normalized.id(),
            location: Some(normal_at(0)),
        }]);
        assert_eq!(tree.fullscreen(center), None);
        assert_eq!(mode.last_maximized_mode("center"), None);
        assert_eq!(mode.last_maximized_location("center"), None);
    }

    #[test]
    fn maximizing_over_another_element_sends_it_home() {
        let mut tree = DockTree::new();
        let center = tree.add_station("center", StationKind::Split);
        let a = tree.add_dockable("a");
        let b = tree.add_dockable("b");
        tree.insert(center, a, 0).unwrap();
        tree.insert(center, b, 1).unwrap();
        let mut mode = MaximizedMode::new();
        mode.add(MaximizeArea::new("center", center)).unwrap();

        let group = DockableGroupBehavior;
        let mut affected = AffectedSet::new();
        let mut cx = ModeContext::new(&mut tree, &group)
            .with_snapshot(a, normal_at(0))
            .with_snapshot(b, normal_at(1));
        assert!(mode.maximize(&mut cx, "center", a, None, &mut affected).unwrap());
        assert!(mode.maximize(&mut cx, "center", b, None, &mut affected).unwrap());
        assert_eq!(cx.into_follow_ups(), vec![
            Transition::To {
                element: a,
                mode: ExtendedMode::Normalized.id(),
                location: Some(normal_at(0)),
            },
            Transition::To {
                element: b,
                mode: ExtendedMode::Maximized.id(),
                location: None,
            },
        ]);
        assert_eq!(tree.fullscreen(center), None);
        assert_eq!(mode.last_maximized_location("center"), None);
    }

    #[test]
    fn vetoed_maximize_keeps_the_current_one() {
        let mut tree = DockTree::new();
        let center = tree.add_station("center", StationKind::Split);
        let west = tree.add_station("west", StationKind::Flap);
        let a = tree.add_dockable("a");
        let b = tree.add_dockable("b");
        tree.insert(center, a, 0).unwrap();
        tree.insert(west, b, 0).unwrap();
        tree.set_acceptance(center, Acceptance::Nothing).unwrap();
        let mut mode = MaximizedMode::new();
        mode.add(MaximizeArea::new("center", center)).unwrap();

        let group = DockableGroupBehavior;
        let mut affected = AffectedSet::new();
        let mut cx = ModeContext::new(&mut tree, &group).with_snapshot(a, normal_at(0));
        assert!(mode.maximize(&mut cx, "center", a, None, &mut affected).unwrap());
        assert!(!mode.maximize(&mut cx, "center", b, None, &mut affected).unwrap());
        assert!(cx.into_follow_ups().is_empty());
        assert_eq!(tree.fullscreen(center), Some(a));
        assert_eq!(tree.parent(b), Some(west));
        assert_eq!(mode.last_maximized_location("center"), Some(&normal_at(0)));
    }

    #[test]
    fn prune_forgets_areas_without_a_maximized_element() {
        let mut tree = DockTree::new();
        let center = tree.add_station("center", StationKind::Split);
        let d = tree.add_dockable("d");
        tree.insert(center, d, 0).unwrap();
        let mut mode = MaximizedMode::new();
        mode.add(MaximizeArea::new("center", center)).unwrap();

        let group = DockableGroupBehavior;
        let mut cx = ModeContext::new(&mut tree, &group).with_snapshot(d, normal_at(0));
        assert!(mode.maximize(&mut cx, "center", d, None, &mut AffectedSet::new()).unwrap());
        assert!(!mode.prune(&tree));
        tree.set_fullscreen(center, None).unwrap();
        assert!(mode.prune(&tree));
        assert_eq!(mode.last_maximized_mode("center"), None);
        assert_eq!(mode.last_maximized_location("center"), None);
    }

    #[test]
    fn stack_behavior_maximizes_the_whole_tab_group() {
        let mut tree = DockTree::new();
        let center = tree.add_station("center", StationKind::Split);
        let stack = tree.add_stack("s");
        tree.insert(center, stack, 0).unwrap();
        let t1 = tree.add_dockable("t1");
        let t2 = tree.add_dockable("t2");
        tree.insert(stack, t1, 0).unwrap();
        tree.insert(stack, t2, 1).unwrap();
        let mut mode = MaximizedMode::new();
        mode.add(MaximizeArea::new("center", center)).unwrap();

        let group = StackGroupBehavior;
        let mut cx = ModeContext::new(&mut tree, &group);
        assert!(mode.apply(&mut cx, t2, None, &mut AffectedSet::new()).unwrap());
        assert_eq!(tree.fullscreen(center), Some(stack));
        assert_eq!(mode.maximized_area_of(&tree, t2), Some(("center".to_owned(), stack)));
        assert!(mode.current(&tree, t1).is_some());
    }

    #[test]
    fn unmaximize_without_origin_asks_for_previous_mode() {
        let mut tree = DockTree::new();
        let center = tree.add_station("center", StationKind::Split);
        let d = tree.add_dockable("d");
        tree.insert(center, d, 0).unwrap();
        tree.set_fullscreen(center, Some(d)).unwrap();
        let mut mode = MaximizedMode::new();
        mode.add(MaximizeArea::new("center", center)).unwrap();

        let back = mode.unmaximize(&mut tree, d, &mut AffectedSet::new()).unwrap();
        assert_eq!(back, vec![Transition::Previous { element: d }]);
    }

    #[test]
    fn settings_round_trip_through_the_mode() {
        let mut mode = MaximizedMode::new();
        let mut setting = MaximizedModeSetting::default();
        setting.last_maximized_mode.insert("center".into(), ExtendedMode::Normalized.id());
        setting.last_maximized_location.insert("center".into(), normal_at(3));
        mode.read_setting(&ModeSetting::Maximized(setting.clone()));
        assert_eq!(mode.write_setting(), ModeSetting::Maximized(setting));
    }
}

//! The location mode manager.
//!
//! The manager owns the modes and the per-dockable history. Every public
//! operation runs as a transaction: the tree is stalled and focus frozen
//! while modes move elements, follow-up transitions the modes queued are run
//! in the same transaction, and only when the outermost transaction ends are
//! modes recomputed and listeners told about changes.

pub mod double_click;
pub mod enablement;
pub mod group;

use std::iter;

use anyhow::Context;
use tracing::{debug, instrument, trace, warn};

use crate::common::collections::{HashMap, IndexMap};
use crate::common::config::{Config, KeyStroke};
use crate::common::log::trace_misc;
use crate::mode::{
    LocationMode, LocationModeEvent, MaximizedMode, ModeAction, ModeAreaListener, ModeContext,
    ModeError, Transition,
};
use crate::model::{AffectedSet, DockTree, ElementId, ExtendedMode, Location, ModeId, TreeError};
use crate::settings::{DockableModeSettings, ModeSettings};
use double_click::{DefaultDoubleClickStrategy, DoubleClickLocationStrategy, IgnoreDoubleClick};
use enablement::{Availability, DefaultEnablement, ExtendedModeEnablement, RuleEnablement};
use group::{
    DockableGroupBehavior, GroupBehavior, GroupBehaviorCallback, GroupMovement, SingleMovement,
};

pub const DEFAULT_FOLLOW_UP_DEPTH: usize = 8;

/// Observes mode changes of registered dockables.
pub trait ModeManagerListener {
    fn mode_changed(&mut self, element: ElementId, old: Option<&ModeId>, new: Option<&ModeId>);

    fn mode_added(&mut self, _mode: &ModeId) {}

    fn mode_removed(&mut self, _mode: &ModeId) {}
}

/// What the manager knows about one registered dockable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeHistory {
    key: String,
    current: Option<ModeId>,
    history: Vec<ModeId>,
    locations: IndexMap<ModeId, Location>,
}

impl ModeHistory {
    fn new(key: String) -> Self {
        Self {
            key,
            current: None,
            history: Vec::new(),
            locations: IndexMap::new(),
        }
    }

    pub fn key(&self) -> &str { &self.key }

    pub fn current(&self) -> Option<&ModeId> { self.current.as_ref() }

    /// Visited modes, least recent first, each at most once.
    pub fn history(&self) -> &[ModeId] { &self.history }

    pub fn location(&self, mode: &ModeId) -> Option<&Location> { self.locations.get(mode) }

    pub fn locations(&self) -> impl Iterator<Item = &Location> { self.locations.values() }

    fn visit(&mut self, mode: ModeId) {
        self.history.retain(|m| *m != mode);
        self.history.push(mode);
    }

    fn to_settings(&self) -> DockableModeSettings {
        DockableModeSettings {
            key: self.key.clone(),
            current: self.current.clone(),
            history: self.history.clone(),
            locations: self.locations.values().cloned().collect(),
        }
    }

    fn restore(&mut self, settings: &DockableModeSettings) {
        self.history = settings.history.clone();
        self.locations =
            settings.locations.iter().map(|l| (l.mode().clone(), l.clone())).collect();
    }
}

pub struct LocationModeManager {
    modes: IndexMap<ModeId, Box<dyn LocationMode>>,
    handles: IndexMap<ElementId, ModeHistory>,
    /// Settings read for dockables that are not registered (yet).
    pending_settings: HashMap<String, DockableModeSettings>,
    group: Box<dyn GroupBehavior>,
    double_click: Box<dyn DoubleClickLocationStrategy>,
    enablement: Box<dyn ExtendedModeEnablement>,
    listeners: Vec<Box<dyn ModeManagerListener>>,
    area_listeners: Vec<Box<dyn ModeAreaListener>>,
    transaction_depth: usize,
    pending: AffectedSet,
    pending_refresh: bool,
    max_follow_up_depth: usize,
    dirty: bool,
}

impl Default for LocationModeManager {
    fn default() -> Self { Self::new() }
}

impl LocationModeManager {
    pub fn new() -> Self {
        Self {
            modes: IndexMap::new(),
            handles: IndexMap::new(),
            pending_settings: HashMap::default(),
            group: Box::new(DockableGroupBehavior),
            double_click: Box::new(DefaultDoubleClickStrategy),
            enablement: Box::new(DefaultEnablement),
            listeners: Vec::new(),
            area_listeners: Vec::new(),
            transaction_depth: 0,
            pending: AffectedSet::new(),
            pending_refresh: false,
            max_follow_up_depth: DEFAULT_FOLLOW_UP_DEPTH,
            dirty: false,
        }
    }

    /// Applies the strategies and per mode options of `config` to the modes
    /// registered so far.
    pub fn configure(&mut self, config: &Config) -> anyhow::Result<()> {
        let settings = &config.settings;
        self.group = settings.group_behavior.build();
        self.double_click = if settings.double_click_maximizes {
            Box::new(DefaultDoubleClickStrategy)
        } else {
            Box::new(IgnoreDoubleClick)
        };
        self.enablement = Box::new(
            RuleEnablement::from_rules(&config.rules).context("compiling dockable rules")?,
        );
        self.max_follow_up_depth = settings.max_follow_up_depth.max(1);
        for mode in self.modes.values_mut() {
            let extended = mode.extended_mode();
            mode.core_mut().set_auto_focus(settings.focus.auto_focus(extended));
        }
        if let Some(maximized) = self.maximized_mode_mut() {
            maximized.set_switch_key(Some(config.maximize_key.clone()));
        }
        Ok(())
    }

    pub fn register_mode(&mut self, mode: impl LocationMode + 'static) -> Result<(), ModeError> {
        let id = mode.id().clone();
        if self.modes.contains_key(&id) {
            return Err(ModeError::DuplicateMode(id));
        }
        debug!(mode = %id, "mode registered");
        self.modes.insert(id.clone(), Box::new(mode));
        for listener in &mut self.listeners {
            listener.mode_added(&id);
        }
        Ok(())
    }

    pub fn remove_mode(&mut self, id: &ModeId) -> Option<Box<dyn LocationMode>> {
        let mode = self.modes.shift_remove(id)?;
        for listener in &mut self.listeners {
            listener.mode_removed(id);
        }
        Some(mode)
    }

    pub fn mode(&self, id: &ModeId) -> Option<&dyn LocationMode> { self.modes.get(id).map(|m| &**m) }

    pub fn mode_mut(&mut self, id: &ModeId) -> Option<&mut dyn LocationMode> {
        match self.modes.get_mut(id) {
            Some(mode) => Some(&mut **mode),
            None => None,
        }
    }

    pub fn modes(&self) -> impl Iterator<Item = &dyn LocationMode> { self.modes.values().map(|m| &**m) }

    /// Id of the first registered mode of kind `extended`.
    pub fn mode_for(&self, extended: ExtendedMode) -> Result<ModeId, ModeError> {
        self.modes
            .values()
            .find(|m| m.extended_mode() == extended)
            .map(|m| m.id().clone())
            .ok_or_else(|| ModeError::UnknownMode(extended.id()))
    }

    pub fn maximized_mode(&self) -> Option<&MaximizedMode> {
        self.modes.values().find_map(|m| m.as_maximized())
    }

    pub fn maximized_mode_mut(&mut self) -> Option<&mut MaximizedMode> {
        self.modes.values_mut().find_map(|m| m.as_maximized_mut())
    }

    pub fn add_listener(&mut self, listener: Box<dyn ModeManagerListener>) {
        self.listeners.push(listener);
    }

    pub fn add_area_listener(&mut self, listener: Box<dyn ModeAreaListener>) {
        self.area_listeners.push(listener);
    }

    pub fn set_group_behavior(&mut self, group: Box<dyn GroupBehavior>) { self.group = group; }

    pub fn set_double_click_strategy(&mut self, strategy: Box<dyn DoubleClickLocationStrategy>) {
        self.double_click = strategy;
    }

    pub fn set_enablement(&mut self, enablement: Box<dyn ExtendedModeEnablement>) {
        self.enablement = enablement;
    }

    pub fn set_max_follow_up_depth(&mut self, depth: usize) { self.max_follow_up_depth = depth.max(1); }

    /// Registers `element` under its tree key. History read earlier for that
    /// key is attached to it.
    pub fn add_dockable(&mut self, tree: &DockTree, element: ElementId) -> Result<(), ModeError> {
        let key = tree.key(element).ok_or(TreeError::UnknownElement(element))?.to_owned();
        if self.handles.values().any(|h| h.key == key) {
            return Err(ModeError::DuplicateKey(key));
        }
        let mut history = ModeHistory::new(key.clone());
        if let Some(settings) = self.pending_settings.remove(&key) {
            trace!(key, "restoring history read earlier");
            history.restore(&settings);
        }
        self.handles.insert(element, history);
        self.refresh_element(tree, element);
        Ok(())
    }

    /// Unregisters `element`. Its history is kept for a dockable registered
    /// later under the same key.
    pub fn remove_dockable(&mut self, element: ElementId) -> Option<ModeHistory> {
        let history = self.handles.shift_remove(&element)?;
        self.release_actions(element);
        self.pending_settings.insert(history.key.clone(), history.to_settings());
        Some(history)
    }

    pub fn is_registered(&self, element: ElementId) -> bool { self.handles.contains_key(&element) }

    pub fn history(&self, element: ElementId) -> Option<&ModeHistory> { self.handles.get(&element) }

    pub fn dockables(&self) -> impl Iterator<Item = ElementId> + '_ { self.handles.keys().copied() }

    /// Mode of `element`, found on the element or its nearest ancestor that
    /// sits in a mode's area.
    pub fn current_mode(&self, tree: &DockTree, element: ElementId) -> Option<&ModeId> {
        iter::once(element).chain(tree.ancestors(element)).find_map(|e| {
            self.modes.values().find(|m| m.is_current_mode(tree, e)).map(|m| m.id())
        })
    }

    pub fn current_extended_mode(&self, tree: &DockTree, element: ElementId) -> Option<ExtendedMode> {
        let mode = self.current_mode(tree, element)?;
        Some(self.modes.get(mode)?.extended_mode())
    }

    pub fn current_location(&self, tree: &DockTree, element: ElementId) -> Option<Location> {
        let mode = self.current_mode(tree, element)?;
        self.modes.get(mode)?.current(tree, element)
    }

    /// Last location `element` had in `mode`.
    pub fn history_location(&self, element: ElementId, mode: &ModeId) -> Option<Location> {
        self.handles.get(&element)?.locations.get(mode).cloned()
    }

    /// Mode `element` was in before its current one, skipping maximized
    /// modes. Falls back to the normal mode.
    pub fn previous_mode(&self, element: ElementId) -> ModeId {
        let normal = || self.mode_for(ExtendedMode::Normalized).unwrap_or_else(|_| ExtendedMode::Normalized.id());
        let Some(handle) = self.handles.get(&element) else {
            return normal();
        };
        handle
            .history
            .iter()
            .rev()
            .filter(|m| Some(*m) != handle.current.as_ref())
            .find(|m| {
                self.modes.get(*m).is_some_and(|mode| mode.extended_mode() != ExtendedMode::Maximized)
            })
            .cloned()
            .unwrap_or_else(normal)
    }

    pub fn availability(&self, tree: &DockTree, element: ElementId, mode: ExtendedMode) -> Availability {
        self.enablement.availability(tree, element, mode)
    }

    pub fn is_mode_available(&self, tree: &DockTree, element: ElementId, mode: ExtendedMode) -> bool {
        self.modes.values().any(|m| m.extended_mode() == mode)
            && self.availability(tree, element, mode).is_available()
    }

    /// Moves `dockable`, and whatever the group behavior moves with it, into
    /// the first registered mode of kind `mode`.
    #[instrument(skip(self, tree))]
    pub fn set_mode(
        &mut self,
        tree: &mut DockTree,
        dockable: ElementId,
        mode: ExtendedMode,
    ) -> Result<bool, ModeError> {
        let mode_id = self.mode_for(mode)?;
        if !self.is_mode_available(tree, dockable, mode) {
            debug!("mode not available");
            return Ok(false);
        }
        let movement = self.group.prepare(tree, dockable, &mode_id);
        self.apply(tree, dockable, &mode_id, movement)
    }

    /// Runs a prepared group movement as one transaction and settles focus
    /// on `dockable` afterwards.
    pub fn apply(
        &mut self,
        tree: &mut DockTree,
        dockable: ElementId,
        mode: &ModeId,
        movement: Box<dyn GroupMovement>,
    ) -> Result<bool, ModeError> {
        let success = self.transaction(tree, |this, tree, affected| {
            let mut callback = Movement { manager: this, tree, affected };
            movement.apply(&mut callback)
        })?;
        self.settle_focus(tree, dockable, mode, success);
        Ok(success)
    }

    /// Moves `dockable` alone to `location`.
    pub fn set_location(
        &mut self,
        tree: &mut DockTree,
        dockable: ElementId,
        location: Location,
    ) -> Result<bool, ModeError> {
        let mode_id = location.mode().clone();
        let Some(extended) = self.modes.get(&mode_id).map(|m| m.extended_mode()) else {
            return Err(ModeError::UnknownMode(mode_id));
        };
        if !self.is_mode_available(tree, dockable, extended) {
            return Ok(false);
        }
        let movement = Box::new(LocatedMovement { element: dockable, location });
        self.apply(tree, dockable, &mode_id, movement)
    }

    /// Shows `dockable` in the mode it visited last, at its location there.
    pub fn apply_history(&mut self, tree: &mut DockTree, dockable: ElementId) -> Result<bool, ModeError> {
        let handle = self.handles.get(&dockable).ok_or(ModeError::UnknownDockable(dockable))?;
        let mode = match handle.history.last() {
            Some(mode) => mode.clone(),
            None => self.mode_for(ExtendedMode::Normalized)?,
        };
        self.apply(tree, dockable, &mode.clone(), Box::new(SingleMovement::new(dockable, mode)))
    }

    /// Ends the maximization covering `dockable` and sends the maximized
    /// element back where it came from.
    #[instrument(skip(self, tree))]
    pub fn unmaximize(&mut self, tree: &mut DockTree, dockable: ElementId) -> Result<bool, ModeError> {
        let Some(maximized_id) = self.maximized_mode().map(|m| m.id().clone()) else {
            return Ok(false);
        };
        self.transaction(tree, |this, tree, affected| {
            let transitions = match this.modes.get_mut(&maximized_id).and_then(|m| m.as_maximized_mut()) {
                Some(mode) => mode.unmaximize(tree, dockable, affected)?,
                None => Vec::new(),
            };
            if transitions.is_empty() {
                return Ok(false);
            }
            this.run_follow_ups(tree, transitions, affected, 1)?;
            Ok(true)
        })
    }

    pub fn handle_double_click(
        &mut self,
        tree: &mut DockTree,
        element: ElementId,
    ) -> Result<bool, ModeError> {
        let current = self.current_extended_mode(tree, element);
        let target = {
            let available = |mode: ExtendedMode| self.is_mode_available(tree, element, mode);
            self.double_click.handle(current, &available)
        };
        let Some(target) = target else {
            return Ok(false);
        };
        trace!(?element, ?current, %target, "double click");
        self.set_mode(tree, element, target)
    }

    /// Toggles the focused dockable in and out of the maximized mode when
    /// `stroke` is the maximize key.
    pub fn handle_key(&mut self, tree: &mut DockTree, stroke: &KeyStroke) -> Result<bool, ModeError> {
        if self.maximized_mode().and_then(|m| m.switch_key()) != Some(stroke) {
            return Ok(false);
        }
        let Some(focused) = tree.focused() else {
            return Ok(false);
        };
        self.switch_mode(tree, focused)
    }

    pub fn switch_mode(&mut self, tree: &mut DockTree, element: ElementId) -> Result<bool, ModeError> {
        if self.current_extended_mode(tree, element) == Some(ExtendedMode::Maximized) {
            self.unmaximize(tree, element)
        } else {
            self.set_mode(tree, element, ExtendedMode::Maximized)
        }
    }

    /// Makes sure no mode covers `dockable`, for example because another
    /// element is maximized over it.
    pub fn ensure_not_hidden(&mut self, tree: &mut DockTree, dockable: ElementId) -> Result<(), ModeError> {
        self.transaction(tree, |this, tree, affected| {
            let mut follow_ups = Vec::new();
            for mode in this.modes.values_mut() {
                let mut cx = ModeContext::new(tree, &*this.group);
                mode.ensure_not_hidden(&mut cx, dockable, affected)?;
                follow_ups.extend(cx.into_follow_ups());
            }
            this.run_follow_ups(tree, follow_ups, affected, 1)
        })
    }

    /// Gives `dockable` history entries next to every location `aside` has,
    /// so showing `dockable` puts it beside `aside`.
    pub fn set_location_aside(
        &mut self,
        tree: &DockTree,
        dockable: ElementId,
        aside: ElementId,
    ) -> Result<(), ModeError> {
        if !self.handles.contains_key(&dockable) {
            return Err(ModeError::UnknownDockable(dockable));
        }
        self.store(tree, aside);
        let neighbour = self.handles.get(&aside).ok_or(ModeError::UnknownDockable(aside))?;
        let last_mode = neighbour.current.clone().or_else(|| neighbour.history.last().cloned());
        let locations: Vec<Location> = neighbour
            .locations
            .values()
            .filter_map(|l| self.modes.get(l.mode())?.aside(tree, l))
            .collect();

        let Some(handle) = self.handles.get_mut(&dockable) else {
            return Err(ModeError::UnknownDockable(dockable));
        };
        for location in locations {
            trace!(%location, "aside");
            handle.locations.insert(location.mode().clone(), location);
        }
        if handle.current.is_none()
            && let Some(mode) = last_mode
        {
            handle.visit(mode);
        }
        self.dirty = true;
        Ok(())
    }

    /// Recomputes the mode of every dockable, or marks that this must happen
    /// once the tree is no longer stalled.
    pub fn refresh(&mut self, tree: &DockTree) {
        if self.transaction_depth > 0 || tree.is_stalled() {
            self.pending_refresh = true;
            return;
        }
        let all: Vec<ElementId> = self.handles.keys().copied().collect();
        for element in all {
            self.refresh_element(tree, element);
        }
    }

    pub fn stall(&mut self, tree: &mut DockTree) { tree.stall(); }

    /// Releases one stall and runs the refresh that was delayed by it.
    pub fn unstall(&mut self, tree: &mut DockTree) {
        if tree.unstall() && self.transaction_depth == 0 {
            self.flush(tree);
        }
    }

    /// An area moved `elements` on its own, outside of any transition.
    pub fn internal_location_change(&mut self, tree: &DockTree, area: &str, elements: &[ElementId]) {
        for listener in &mut self.area_listeners {
            listener.internal_location_change(area, elements);
        }
        if self.transaction_depth > 0 || tree.is_stalled() {
            for &element in elements {
                self.pending.add(tree, element);
            }
            return;
        }
        let mut moved = AffectedSet::new();
        for &element in elements {
            moved.add(tree, element);
        }
        for element in moved.iter() {
            self.refresh_element(tree, element);
        }
        self.dirty = true;
    }

    /// Moves `element` to `index` inside its parent, as a user dragging a
    /// tab would.
    pub fn reorder(&mut self, tree: &mut DockTree, element: ElementId, index: usize) -> Result<bool, ModeError> {
        if !tree.move_within(element, index)? {
            return Ok(false);
        }
        let Some(parent) = tree.parent(element) else {
            return Ok(true);
        };
        let area = iter::once(parent).chain(tree.ancestors(parent)).find_map(|station| {
            self.modes.values().find_map(|m| {
                m.representation_ids().into_iter().find(|id| m.representation(id) == Some(station))
            })
        });
        if let Some(area) = area {
            let moved = tree.children(parent).to_vec();
            self.internal_location_change(tree, &area, &moved);
        }
        Ok(true)
    }

    /// Actions each mode currently offers on `element`.
    pub fn actions(&mut self, tree: &DockTree, element: ElementId) -> Vec<ModeAction> {
        let current = self.current_mode(tree, element).cloned();
        let mut out = Vec::new();
        for mode in self.modes.values_mut() {
            let availability = self.enablement.availability(tree, element, mode.extended_mode());
            if let Some(action) = mode.core_mut().action_for(element, current.as_ref(), availability) {
                out.push(action.clone());
            }
        }
        out
    }

    pub fn release_actions(&mut self, element: ElementId) {
        for mode in self.modes.values_mut() {
            mode.core_mut().release_actions(element);
        }
    }

    /// Snapshot of all history and mode state, for persisting.
    pub fn settings(&mut self, tree: &DockTree) -> ModeSettings {
        let elements: Vec<ElementId> = self.handles.keys().copied().collect();
        for element in elements {
            self.store(tree, element);
        }
        let mut dockables: Vec<DockableModeSettings> =
            self.handles.values().map(ModeHistory::to_settings).collect();
        let mut pending: Vec<DockableModeSettings> = self.pending_settings.values().cloned().collect();
        pending.sort_by(|a, b| a.key.cmp(&b.key));
        dockables.extend(pending);
        ModeSettings {
            dockables,
            modes: self.modes.iter().map(|(id, m)| (id.clone(), m.write_setting())).collect(),
        }
    }

    /// Restores history and mode state. Entries for keys that are not
    /// registered are kept until such a dockable is added.
    pub fn read_settings(&mut self, settings: &ModeSettings) {
        for entry in &settings.dockables {
            match self.handles.values_mut().find(|h| h.key == entry.key) {
                Some(handle) => handle.restore(entry),
                None => {
                    self.pending_settings.insert(entry.key.clone(), entry.clone());
                }
            }
        }
        for (id, setting) in &settings.modes {
            match self.modes.get_mut(id) {
                Some(mode) => mode.read_setting(setting),
                None => warn!(mode = %id, "ignoring settings of unknown mode"),
            }
        }
    }

    /// Whether anything worth persisting changed since the last
    /// [`LocationModeManager::clear_dirty`].
    pub fn is_dirty(&self) -> bool { self.dirty }

    pub fn clear_dirty(&mut self) { self.dirty = false; }

    fn transaction<R>(
        &mut self,
        tree: &mut DockTree,
        f: impl FnOnce(&mut Self, &mut DockTree, &mut AffectedSet) -> Result<R, ModeError>,
    ) -> Result<R, ModeError> {
        tree.stall();
        tree.freeze_focus();
        self.transaction_depth += 1;
        let mut affected = AffectedSet::new();
        let result = f(self, tree, &mut affected);
        self.transaction_depth -= 1;
        self.pending.merge(affected);
        tree.melt_focus();
        if tree.unstall() && self.transaction_depth == 0 {
            self.flush(tree);
        }
        result
    }

    fn flush(&mut self, tree: &DockTree) {
        for mode in self.modes.values_mut() {
            if let Some(maximized) = mode.as_maximized_mut()
                && maximized.prune(tree)
            {
                self.dirty = true;
            }
        }
        let affected = self.pending.take();
        let elements: Vec<ElementId> = if std::mem::take(&mut self.pending_refresh) {
            self.handles.keys().copied().collect()
        } else {
            affected.iter().collect()
        };
        if !affected.is_empty() {
            self.dirty = true;
        }
        trace_misc("refreshing modes", || {
            for element in elements {
                self.refresh_element(tree, element);
            }
        });
    }

    fn refresh_element(&mut self, tree: &DockTree, element: ElementId) {
        if !self.handles.contains_key(&element) {
            return;
        }
        let now = if tree.contains(element) { self.current_mode(tree, element).cloned() } else { None };
        let location = now.as_ref().and_then(|m| self.modes.get(m)?.current(tree, element));
        let Some(handle) = self.handles.get_mut(&element) else {
            return;
        };
        if let Some(location) = location {
            handle.locations.insert(location.mode().clone(), location);
        }
        if handle.current == now {
            return;
        }
        let old = std::mem::replace(&mut handle.current, now.clone());
        if let Some(mode) = &now {
            handle.visit(mode.clone());
        }
        debug!(?element, ?old, ?now, "mode changed");
        for listener in &mut self.listeners {
            listener.mode_changed(element, old.as_ref(), now.as_ref());
        }
    }

    fn store(&mut self, tree: &DockTree, element: ElementId) {
        let Some(location) = self.current_location(tree, element) else {
            return;
        };
        if let Some(handle) = self.handles.get_mut(&element) {
            handle.locations.insert(location.mode().clone(), location);
        }
    }

    fn snapshot(&self, tree: &DockTree, element: ElementId) -> Vec<(ElementId, Location)> {
        iter::once(element)
            .chain(tree.ancestors(element))
            .filter_map(|e| Some((e, self.current_location(tree, e)?)))
            .collect()
    }

    fn apply_element(
        &mut self,
        tree: &mut DockTree,
        element: ElementId,
        mode: &ModeId,
        location: Option<Location>,
        affected: &mut AffectedSet,
        depth: usize,
    ) -> Result<bool, ModeError> {
        if !self.modes.contains_key(mode) {
            return Err(ModeError::UnknownMode(mode.clone()));
        }
        self.store(tree, element);
        let location = location.or_else(|| self.history_location(element, mode));
        let (success, follow_ups) = self.apply_mode(tree, mode, element, location, affected)?;
        self.run_follow_ups(tree, follow_ups, affected, depth + 1)?;
        Ok(success)
    }

    /// One transition of one element, with the listeners of every mode
    /// around it.
    fn apply_mode(
        &mut self,
        tree: &mut DockTree,
        mode_id: &ModeId,
        element: ElementId,
        location: Option<Location>,
        affected: &mut AffectedSet,
    ) -> Result<(bool, Vec<Transition>), ModeError> {
        let snapshot = self.snapshot(tree, element);
        let mut event = LocationModeEvent::new(mode_id.clone(), location, element);

        let mut hooks = Vec::new();
        for (id, mode) in self.modes.iter_mut() {
            if id != mode_id {
                hooks.extend(mode.sibling_apply_starting(tree, &mut event, affected));
            }
        }

        let Some(mode) = self.modes.get_mut(mode_id) else {
            return Err(ModeError::UnknownMode(mode_id.clone()));
        };
        let mut cx = ModeContext::new(tree, &*self.group);
        for (e, location) in snapshot {
            cx = cx.with_snapshot(e, location);
        }
        let result = mode.apply_event(&mut cx, &mut event, affected);
        let follow_ups = cx.into_follow_ups();

        for hook in hooks {
            hook(tree, &event, affected);
        }
        for (id, mode) in self.modes.iter_mut() {
            if id != mode_id {
                mode.sibling_apply_done(tree, &event);
            }
        }
        result?;
        debug!(?element, mode = %mode_id, success = event.is_success(), "applied");
        Ok((event.is_success(), follow_ups))
    }

    fn run_follow_ups(
        &mut self,
        tree: &mut DockTree,
        transitions: Vec<Transition>,
        affected: &mut AffectedSet,
        depth: usize,
    ) -> Result<(), ModeError> {
        if transitions.is_empty() {
            return Ok(());
        }
        if depth > self.max_follow_up_depth {
            warn!(depth, dropped = transitions.len(), "follow-up transitions nested too deep");
            return Ok(());
        }
        for transition in transitions {
            match transition {
                Transition::To { element, mode, location } => {
                    self.apply_element(tree, element, &mode, location, affected, depth)?;
                }
                Transition::Previous { element } => {
                    self.restore_previous(tree, element, affected, depth)?;
                }
            }
        }
        Ok(())
    }

    fn restore_previous(
        &mut self,
        tree: &mut DockTree,
        element: ElementId,
        affected: &mut AffectedSet,
        depth: usize,
    ) -> Result<(), ModeError> {
        if !tree.contains(element) {
            return Ok(());
        }
        if self.handles.contains_key(&element) {
            let mode = self.previous_mode(element);
            self.apply_element(tree, element, &mode, None, affected, depth)?;
            return Ok(());
        }
        for child in tree.children(element).to_vec() {
            self.restore_previous(tree, child, affected, depth)?;
        }
        Ok(())
    }

    fn settle_focus(&mut self, tree: &mut DockTree, element: ElementId, mode: &ModeId, success: bool) {
        let auto_focus = self.modes.get(mode).is_some_and(|m| m.should_auto_focus());
        if auto_focus {
            if success {
                tree.request_focus(element);
            }
        } else if let Some(focused) = tree.focused()
            && (focused == element || tree.is_ancestor(element, focused))
        {
            tree.clear_focus();
        }
    }
}

/// Group callback backed by the manager, valid for one transaction.
struct Movement<'a> {
    manager: &'a mut LocationModeManager,
    tree: &'a mut DockTree,
    affected: &'a mut AffectedSet,
}

impl GroupBehaviorCallback for Movement<'_> {
    fn tree(&self) -> &DockTree { &*self.tree }

    fn set_mode(&mut self, element: ElementId, mode: &ModeId) -> Result<bool, ModeError> {
        self.manager.apply_element(self.tree, element, mode, None, self.affected, 0)
    }

    fn set_location(&mut self, element: ElementId, location: &Location) -> Result<bool, ModeError> {
        let mode = location.mode().clone();
        self.manager.apply_element(self.tree, element, &mode, Some(location.clone()), self.affected, 0)
    }

    fn location(&self, element: ElementId, mode: &ModeId) -> Option<Location> {
        self.manager.history_location(element, mode)
    }

    fn current_location(&self, element: ElementId) -> Option<Location> {
        self.manager.current_location(self.tree, element)
    }
}

/// Moves one element to an exact location.
struct LocatedMovement {
    element: ElementId,
    location: Location,
}

impl GroupMovement for LocatedMovement {
    fn apply(&self, callback: &mut dyn GroupBehaviorCallback) -> Result<bool, ModeError> {
        callback.set_location(self.element, &self.location)
    }
}

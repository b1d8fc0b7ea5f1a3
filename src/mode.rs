//! Location modes.
//!
//! A mode owns a set of areas and knows how to put an element into one of
//! them. Whether an element is "in" a mode is never stored: every mode
//! answers [`LocationMode::is_current_mode`] by looking at the tree.
//!
//! Modes do not call back into the manager. Anything a transition needs to
//! happen to other elements afterwards is queued as a [`Transition`] on the
//! [`ModeContext`] and run by the manager inside the same transaction.

pub mod actions;
pub mod area;
pub mod maximized;
pub mod station;

pub use actions::{ActionProvider, DefaultActionProvider, DockableHandle, ModeAction};
pub use area::{
    AreaRegistry, AsideAnswer, AsideRequest, MaximizeArea, MaximizedModeArea, ModeArea,
    ModeAreaListener, StationArea, StationModeArea,
};
pub use maximized::MaximizedMode;
pub use station::{
    DefaultLocationMode, Externalized, ExternalizedMode, Minimized, MinimizedMode, Normal,
    NormalMode, StationPolicy,
};
use thiserror::Error;
use tracing::trace;

use crate::common::collections::HashMap;
use crate::manager::enablement::Availability;
use crate::manager::group::GroupBehavior;
use crate::model::{AffectedSet, DockTree, ElementId, ExtendedMode, Location, ModeId, TreeError};
use crate::settings::ModeSetting;

/// Misuse of the mode API. Operational failures such as a vetoed drop are
/// reported as `Ok(false)` instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModeError {
    #[error("area '{area}' is already registered in mode {mode}")]
    DuplicateArea { mode: ModeId, area: String },
    #[error("area '{area}' was never added to mode {mode} and cannot become its default")]
    UnknownDefaultArea { mode: ModeId, area: String },
    #[error("mode {mode} cannot register an area with an empty id")]
    EmptyAreaId { mode: ModeId },
    #[error(
        "mode {mode} still shows actions on {count} dockables, release them before replacing the provider"
    )]
    ActionsInUse { mode: ModeId, count: usize },
    #[error("mode {mode} cannot place {element:?}: no default area and no location history")]
    NoTargetArea { mode: ModeId, element: ElementId },
    #[error("unknown mode {0}")]
    UnknownMode(ModeId),
    #[error("mode {0} is already registered")]
    DuplicateMode(ModeId),
    #[error("element {0:?} is not a registered dockable")]
    UnknownDockable(ElementId),
    #[error("a dockable with key '{0}' is already registered")]
    DuplicateKey(String),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// One transition of one element into one mode, as seen by listeners.
#[derive(Clone, Debug)]
pub struct LocationModeEvent {
    mode: ModeId,
    location: Option<Location>,
    dockable: ElementId,
    done: bool,
    success: bool,
}

impl LocationModeEvent {
    pub fn new(mode: ModeId, location: Option<Location>, dockable: ElementId) -> Self {
        Self {
            mode,
            location,
            dockable,
            done: false,
            success: false,
        }
    }

    pub fn mode(&self) -> &ModeId { &self.mode }

    pub fn location(&self) -> Option<&Location> { self.location.as_ref() }

    pub fn dockable(&self) -> ElementId { self.dockable }

    pub fn is_done(&self) -> bool { self.done }

    pub fn is_success(&self) -> bool { self.success }

    /// Marks the transition as finished. Calling this from
    /// [`LocationModeListener::apply_starting`] skips the mode's own work.
    pub fn done(&mut self, success: bool) {
        self.done = true;
        self.success = success;
    }
}

/// Observes the transitions of one mode. `apply_done` is called for every
/// `apply_starting`, whether the transition ran, failed or was skipped.
pub trait LocationModeListener {
    fn apply_starting(&mut self, event: &mut LocationModeEvent);
    fn apply_done(&mut self, event: &LocationModeEvent);
}

/// Work deferred by one mode until another mode's transition completed.
pub type ApplyHook = Box<dyn FnOnce(&mut DockTree, &LocationModeEvent, &mut AffectedSet)>;

/// Work a transition leaves for the manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Apply `mode` to `element`, at `location` or at the element's history.
    To {
        element: ElementId,
        mode: ModeId,
        location: Option<Location>,
    },
    /// Send `element` back to the last mode it was in before its current one.
    /// Unregistered stations hand this down to their children.
    Previous { element: ElementId },
}

/// What a mode sees while it runs a transition.
pub struct ModeContext<'a> {
    pub tree: &'a mut DockTree,
    group: &'a dyn GroupBehavior,
    snapshot: HashMap<ElementId, Location>,
    follow_ups: Vec<Transition>,
}

impl<'a> ModeContext<'a> {
    pub fn new(tree: &'a mut DockTree, group: &'a dyn GroupBehavior) -> Self {
        Self {
            tree,
            group,
            snapshot: HashMap::default(),
            follow_ups: Vec::new(),
        }
    }

    /// Records where `element` was before the transition started.
    pub fn with_snapshot(mut self, element: ElementId, location: Location) -> Self {
        self.snapshot.insert(element, location);
        self
    }

    pub fn group(&self) -> &dyn GroupBehavior { self.group }

    /// Location of `element` before any area of this transition mutated.
    pub fn previous_location(&self, element: ElementId) -> Option<&Location> {
        self.snapshot.get(&element)
    }

    pub fn follow_up(&mut self, transition: Transition) {
        trace!(?transition, "queued follow-up");
        self.follow_ups.push(transition);
    }

    pub fn into_follow_ups(self) -> Vec<Transition> { self.follow_ups }
}

/// State every mode shares: identity, focus policy, listeners and the
/// action cache.
pub struct ModeCore {
    id: ModeId,
    extended: ExtendedMode,
    auto_focus: bool,
    listeners: Vec<Box<dyn LocationModeListener>>,
    provider: Box<dyn ActionProvider>,
    handles: HashMap<ElementId, DockableHandle>,
}

impl ModeCore {
    pub fn new(id: ModeId, extended: ExtendedMode) -> Self {
        Self {
            id,
            extended,
            auto_focus: extended != ExtendedMode::Minimized,
            listeners: Vec::new(),
            provider: Box::new(DefaultActionProvider),
            handles: HashMap::default(),
        }
    }

    pub fn id(&self) -> &ModeId { &self.id }

    pub fn extended(&self) -> ExtendedMode { self.extended }

    pub fn should_auto_focus(&self) -> bool { self.auto_focus }

    pub fn set_auto_focus(&mut self, auto_focus: bool) { self.auto_focus = auto_focus; }

    pub fn add_listener(&mut self, listener: Box<dyn LocationModeListener>) {
        self.listeners.push(listener);
    }

    pub fn clear_listeners(&mut self) { self.listeners.clear(); }

    pub fn fire_apply_starting(&mut self, event: &mut LocationModeEvent) {
        for listener in &mut self.listeners {
            listener.apply_starting(event);
        }
    }

    pub fn fire_apply_done(&mut self, event: &LocationModeEvent) {
        for listener in &mut self.listeners {
            listener.apply_done(event);
        }
    }

    /// Asks the provider which action this mode shows on `element` and
    /// caches the answer in the element's handle.
    pub fn action_for(
        &mut self,
        element: ElementId,
        current: Option<&ModeId>,
        availability: Availability,
    ) -> Option<&ModeAction> {
        let action = self.provider.action(&self.id, self.extended, current, availability);
        let handle = self.handles.entry(element).or_insert_with(|| DockableHandle::new(element));
        handle.set_action(action);
        handle.action()
    }

    pub fn handle(&self, element: ElementId) -> Option<&DockableHandle> { self.handles.get(&element) }

    pub fn release_actions(&mut self, element: ElementId) -> bool {
        self.handles.remove(&element).is_some()
    }

    /// Replaces the action provider. Dockables showing actions of the old
    /// provider must be released first.
    pub fn set_action_provider(
        &mut self,
        provider: Box<dyn ActionProvider>,
    ) -> Result<(), ModeError> {
        if !self.handles.is_empty() {
            return Err(ModeError::ActionsInUse {
                mode: self.id.clone(),
                count: self.handles.len(),
            });
        }
        self.provider = provider;
        Ok(())
    }
}

pub trait LocationMode {
    fn core(&self) -> &ModeCore;
    fn core_mut(&mut self) -> &mut ModeCore;

    fn id(&self) -> &ModeId { self.core().id() }

    fn extended_mode(&self) -> ExtendedMode { self.core().extended() }

    fn should_auto_focus(&self) -> bool { self.core().should_auto_focus() }

    /// Ids of all areas, in registration order.
    fn representation_ids(&self) -> Vec<String>;

    /// Station wrapped by the area `area`.
    fn representation(&self, area: &str) -> Option<ElementId>;

    fn is_representing(&self, station: ElementId) -> bool;

    /// Whether `element` itself sits directly in one of this mode's areas.
    /// Ancestors are not consulted, the manager walks them.
    fn is_current_mode(&self, tree: &DockTree, element: ElementId) -> bool;

    /// Where `element` currently is in this mode, `None` if it is not below
    /// any of the mode's areas.
    fn current(&self, tree: &DockTree, element: ElementId) -> Option<Location>;

    /// Moves `dockable` into this mode, near `history` if given.
    fn run_apply(
        &mut self,
        cx: &mut ModeContext<'_>,
        dockable: ElementId,
        history: Option<&Location>,
        affected: &mut AffectedSet,
    ) -> Result<bool, ModeError>;

    /// Runs one transition with this mode's listeners around it. A listener
    /// may finish the event early, in which case `run_apply` is skipped.
    fn apply_event(
        &mut self,
        cx: &mut ModeContext<'_>,
        event: &mut LocationModeEvent,
        affected: &mut AffectedSet,
    ) -> Result<(), ModeError> {
        self.core_mut().fire_apply_starting(event);
        let mut result = Ok(());
        if !event.is_done() {
            let history = event.location().cloned();
            match self.run_apply(cx, event.dockable(), history.as_ref(), affected) {
                Ok(success) => event.done(success),
                Err(err) => {
                    event.done(false);
                    result = Err(err);
                }
            }
        }
        self.core_mut().fire_apply_done(event);
        result
    }

    fn apply(
        &mut self,
        cx: &mut ModeContext<'_>,
        dockable: ElementId,
        history: Option<&Location>,
        affected: &mut AffectedSet,
    ) -> Result<bool, ModeError> {
        let mut event = LocationModeEvent::new(self.id().clone(), history.cloned(), dockable);
        self.apply_event(cx, &mut event, affected)?;
        Ok(event.is_success())
    }

    /// Makes sure this mode does not cover `dockable`.
    fn ensure_not_hidden(
        &mut self,
        _cx: &mut ModeContext<'_>,
        _dockable: ElementId,
        _affected: &mut AffectedSet,
    ) -> Result<(), ModeError> {
        Ok(())
    }

    /// A location next to `location`, for an element that should show up
    /// beside the one recorded there.
    fn aside(&self, _tree: &DockTree, _location: &Location) -> Option<Location> { None }

    /// Called before another mode runs a transition.
    fn sibling_apply_starting(
        &mut self,
        _tree: &mut DockTree,
        _event: &mut LocationModeEvent,
        _affected: &mut AffectedSet,
    ) -> Option<ApplyHook> {
        None
    }

    /// Called after another mode finished a transition and all hooks ran.
    fn sibling_apply_done(&mut self, _tree: &DockTree, _event: &LocationModeEvent) {}

    fn write_setting(&self) -> ModeSetting { ModeSetting::Null }

    fn read_setting(&mut self, _setting: &ModeSetting) {}

    fn as_maximized(&self) -> Option<&MaximizedMode> { None }

    fn as_maximized_mut(&mut self) -> Option<&mut MaximizedMode> { None }
}

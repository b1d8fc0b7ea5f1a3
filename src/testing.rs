//! Shared fixture for manager level tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::manager::{LocationModeManager, ModeManagerListener};
use crate::mode::{
    ExternalizedMode, LocationModeEvent, LocationModeListener, MaximizeArea, MaximizedMode,
    MinimizedMode, NormalMode, StationArea,
};
use crate::model::{DockTree, ElementId, ModeId, StationKind};

/// A center split, a west flap and a screen, with one area of every built-in
/// mode on them.
pub struct Fixture {
    pub tree: DockTree,
    pub manager: LocationModeManager,
    pub center: ElementId,
    pub west: ElementId,
    pub screen: ElementId,
}

impl Fixture {
    pub fn new() -> Self {
        let mut tree = DockTree::new();
        let center = tree.add_station("center", StationKind::Split);
        let west = tree.add_station("west", StationKind::Flap);
        let screen = tree.add_station("screen", StationKind::Screen);

        let mut normal = NormalMode::new();
        normal.add(StationArea::new("center", center)).unwrap();
        let mut minimized = MinimizedMode::new();
        minimized.add(StationArea::new("west", west)).unwrap();
        let mut maximized = MaximizedMode::new();
        maximized.add(MaximizeArea::new("center", center)).unwrap();
        let mut externalized = ExternalizedMode::new();
        externalized.add(StationArea::new("external", screen)).unwrap();

        let mut manager = LocationModeManager::new();
        manager.register_mode(normal).unwrap();
        manager.register_mode(minimized).unwrap();
        manager.register_mode(maximized).unwrap();
        manager.register_mode(externalized).unwrap();
        Self { tree, manager, center, west, screen }
    }

    /// Adds a registered dockable at the end of the center area.
    pub fn dockable(&mut self, key: &str) -> ElementId {
        let element = self.tree.add_dockable(key);
        let end = self.tree.children(self.center).len();
        self.tree.insert(self.center, element, end).unwrap();
        self.manager.add_dockable(&self.tree, element).unwrap();
        element
    }

    /// Adds a stack at the end of the center area holding one registered
    /// dockable per key.
    pub fn stack(&mut self, keys: &[&str]) -> (ElementId, Vec<ElementId>) {
        let stack = self.tree.add_stack(format!("stack-{}", keys.join("-")));
        let end = self.tree.children(self.center).len();
        self.tree.insert(self.center, stack, end).unwrap();
        let tabs = keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let tab = self.tree.add_dockable(*key);
                self.tree.insert(stack, tab, i).unwrap();
                self.manager.add_dockable(&self.tree, tab).unwrap();
                tab
            })
            .collect();
        (stack, tabs)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Record {
    Starting(ElementId),
    Done(ElementId, bool),
    Changed(ElementId, Option<ModeId>, Option<ModeId>),
}

/// Listener recording what it sees into a shared log.
#[derive(Clone, Default)]
pub struct Recorder(Rc<RefCell<Vec<Record>>>);

impl Recorder {
    pub fn take(&self) -> Vec<Record> { self.0.borrow_mut().drain(..).collect() }
}

impl ModeManagerListener for Recorder {
    fn mode_changed(&mut self, element: ElementId, old: Option<&ModeId>, new: Option<&ModeId>) {
        self.0.borrow_mut().push(Record::Changed(element, old.cloned(), new.cloned()));
    }
}

impl LocationModeListener for Recorder {
    fn apply_starting(&mut self, event: &mut LocationModeEvent) {
        self.0.borrow_mut().push(Record::Starting(event.dockable()));
    }

    fn apply_done(&mut self, event: &LocationModeEvent) {
        self.0.borrow_mut().push(Record::Done(event.dockable(), event.is_success()));
    }
}

//! The container hierarchy dockables live in.
//!
//! A `DockTree` is the structural source of truth every mode reads from:
//! which station holds which element, in what order, and which child a
//! station currently shows fullscreen. Modes never cache membership, they
//! ask the tree.

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use thiserror::Error;
use tracing::{debug, trace};

use crate::common::collections::HashSet;
use crate::model::location::{Bounds, Placement};

slotmap::new_key_type! {
    pub struct ElementId;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StationKind {
    /// Tiled station, hosts normal and maximized elements.
    Split,
    /// Tab group. A stack is itself a dockable.
    Stack,
    /// Edge strip holding minimized elements.
    Flap,
    /// Free floating windows.
    Screen,
}

impl StationKind {
    /// Whether a drop below a plain child of this station may create a tab
    /// group around that child.
    pub fn merges(self) -> bool { matches!(self, StationKind::Split | StationKind::Screen) }
}

/// Acceptance policy of a station, the veto consulted before every drop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Acceptance {
    #[default]
    All,
    Nothing,
    Reject(HashSet<ElementId>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("unknown element {0:?}")]
    UnknownElement(ElementId),
    #[error("element {0:?} is not a station")]
    NotAStation(ElementId),
    #[error("element {element:?} is not a child of station {station:?}")]
    NotAChild { station: ElementId, element: ElementId },
    #[error("cannot place {element:?} inside its own subtree at {station:?}")]
    Cycle { station: ElementId, element: ElementId },
}

/// Outcome of an attempt to place an element. A veto leaves the tree exactly
/// as it was.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaceResult {
    Placed,
    Vetoed,
}

impl PlaceResult {
    pub fn is_placed(self) -> bool { self == PlaceResult::Placed }
}

#[derive(Clone, Debug)]
struct Station {
    kind: StationKind,
    children: Vec<ElementId>,
    fullscreen: Option<ElementId>,
    acceptance: Acceptance,
}

#[derive(Clone, Debug)]
struct Element {
    key: String,
    parent: Option<ElementId>,
    bounds: Option<Bounds>,
    station: Option<Station>,
}

enum DropTarget {
    At(usize),
    Into { stack: ElementId, index: usize },
    Merge { anchor: ElementId, index: usize },
}

#[derive(Debug, Default)]
pub struct DockTree {
    elements: SlotMap<ElementId, Element>,
    focused: Option<ElementId>,
    focus_frozen: u32,
    stalled: u32,
    pending_cleanup: Vec<ElementId>,
    stack_counter: usize,
}

impl DockTree {
    pub fn new() -> Self { Self::default() }

    pub fn add_station(&mut self, key: impl Into<String>, kind: StationKind) -> ElementId {
        self.elements.insert(Element {
            key: key.into(),
            parent: None,
            bounds: None,
            station: Some(Station {
                kind,
                children: Vec::new(),
                fullscreen: None,
                acceptance: Acceptance::All,
            }),
        })
    }

    pub fn add_stack(&mut self, key: impl Into<String>) -> ElementId {
        self.add_station(key, StationKind::Stack)
    }

    pub fn add_dockable(&mut self, key: impl Into<String>) -> ElementId {
        self.elements.insert(Element {
            key: key.into(),
            parent: None,
            bounds: None,
            station: None,
        })
    }

    /// Removes `element` and its whole subtree.
    pub fn remove(&mut self, element: ElementId) -> Result<(), TreeError> {
        self.detach(element)?;
        for id in self.descendants(element).into_iter().chain(std::iter::once(element)) {
            if self.focused == Some(id) {
                self.focused = None;
            }
            self.elements.remove(id);
        }
        Ok(())
    }

    pub fn contains(&self, id: ElementId) -> bool { self.elements.contains_key(id) }

    pub fn key(&self, id: ElementId) -> Option<&str> {
        self.elements.get(id).map(|e| e.key.as_str())
    }

    pub fn find(&self, key: &str) -> Option<ElementId> {
        self.elements.iter().find(|(_, e)| e.key == key).map(|(id, _)| id)
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> { self.elements.get(id)?.parent }

    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.elements
            .get(id)
            .and_then(|e| e.station.as_ref())
            .map_or(&[], |s| s.children.as_slice())
    }

    pub fn is_station(&self, id: ElementId) -> bool { self.station_kind(id).is_some() }

    pub fn station_kind(&self, id: ElementId) -> Option<StationKind> {
        self.elements.get(id)?.station.as_ref().map(|s| s.kind)
    }

    pub fn bounds(&self, id: ElementId) -> Option<Bounds> { self.elements.get(id)?.bounds }

    pub fn set_bounds(&mut self, id: ElementId, bounds: Option<Bounds>) {
        if let Some(e) = self.elements.get_mut(id) {
            e.bounds = bounds;
        }
    }

    /// Parents of `id`, nearest first.
    pub fn ancestors(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// Strict ancestry: an element is not its own ancestor.
    pub fn is_ancestor(&self, ancestor: ElementId, element: ElementId) -> bool {
        self.ancestors(element).any(|a| a == ancestor)
    }

    /// All elements below `id` in preorder, `id` excluded.
    pub fn descendants(&self, id: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack: Vec<ElementId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn index_of(&self, element: ElementId) -> Option<usize> {
        let parent = self.parent(element)?;
        self.children(parent).iter().position(|&c| c == element)
    }

    /// The ancestor-or-self of `element` that is a direct child of `station`.
    pub fn top_level_child(&self, station: ElementId, element: ElementId) -> Option<ElementId> {
        std::iter::once(element)
            .chain(self.ancestors(element))
            .find(|&e| self.parent(e) == Some(station))
    }

    fn station(&self, id: ElementId) -> Result<&Station, TreeError> {
        self.elements
            .get(id)
            .ok_or(TreeError::UnknownElement(id))?
            .station
            .as_ref()
            .ok_or(TreeError::NotAStation(id))
    }

    fn station_mut(&mut self, id: ElementId) -> Result<&mut Station, TreeError> {
        self.elements
            .get_mut(id)
            .ok_or(TreeError::UnknownElement(id))?
            .station
            .as_mut()
            .ok_or(TreeError::NotAStation(id))
    }

    pub fn set_acceptance(
        &mut self,
        station: ElementId,
        acceptance: Acceptance,
    ) -> Result<(), TreeError> {
        self.station_mut(station)?.acceptance = acceptance;
        Ok(())
    }

    pub fn accepts(&self, station: ElementId, element: ElementId) -> bool {
        let Ok(s) = self.station(station) else {
            return false;
        };
        if s.kind == StationKind::Stack && self.is_station(element) {
            return false;
        }
        match &s.acceptance {
            Acceptance::All => true,
            Acceptance::Nothing => false,
            Acceptance::Reject(rejected) => !rejected.contains(&element),
        }
    }

    fn check_insert(&self, station: ElementId, element: ElementId) -> Result<(), TreeError> {
        self.station(station)?;
        if !self.contains(element) {
            return Err(TreeError::UnknownElement(element));
        }
        if station == element || self.is_ancestor(element, station) {
            return Err(TreeError::Cycle { station, element });
        }
        Ok(())
    }

    /// Moves `element` into `station` at `index`. The index is interpreted
    /// after `element` left its previous parent and is clamped to the number
    /// of children. Acceptance is not consulted; see [`DockTree::drop_at`].
    pub fn insert(
        &mut self,
        station: ElementId,
        element: ElementId,
        index: usize,
    ) -> Result<(), TreeError> {
        self.check_insert(station, element)?;
        self.detach(element)?;
        let s = self.station_mut(station)?;
        let index = index.min(s.children.len());
        s.children.insert(index, element);
        self.elements[element].parent = Some(station);
        trace!(?element, ?station, index, "inserted");
        Ok(())
    }

    /// Takes `element` out of its parent. Returns false if it had none.
    pub fn detach(&mut self, element: ElementId) -> Result<bool, TreeError> {
        let parent = self.elements.get(element).ok_or(TreeError::UnknownElement(element))?.parent;
        let Some(parent) = parent else {
            return Ok(false);
        };
        let s = self.station_mut(parent)?;
        s.children.retain(|&c| c != element);
        if s.fullscreen == Some(element) {
            s.fullscreen = None;
        }
        let dissolve = s.kind == StationKind::Stack && s.children.len() < 2;
        self.elements[element].parent = None;
        if dissolve {
            self.schedule_cleanup(parent);
        }
        Ok(true)
    }

    /// Places `element` in `station` following `placement`, or appends it when
    /// there is no placement. Already being at exactly that placement is a
    /// successful no-op.
    pub fn drop_at(
        &mut self,
        station: ElementId,
        element: ElementId,
        placement: Option<&Placement>,
    ) -> Result<PlaceResult, TreeError> {
        self.check_insert(station, element)?;
        if let Some(p) = placement
            && self.placement_of(station, element).as_ref() == Some(p)
        {
            return Ok(PlaceResult::Placed);
        }
        let Some(target) = self.drop_target(station, element, placement)? else {
            debug!(?element, ?station, "drop vetoed");
            return Ok(PlaceResult::Vetoed);
        };

        self.stall();
        let result = match target {
            DropTarget::At(index) => self.insert(station, element, index),
            DropTarget::Into { stack, index } => self.insert(stack, element, index),
            DropTarget::Merge { anchor, index } => self.detach(element).and_then(|_| {
                let stack = self.wrap_in_stack(anchor)?;
                self.insert(stack, element, index)
            }),
        };
        if result.is_ok()
            && let Some(bounds) = placement.and_then(|p| p.bounds)
            && let Some(top) = self.top_level_child(station, element)
        {
            self.set_bounds(top, Some(bounds));
        }
        self.unstall();
        result.map(|_| PlaceResult::Placed)
    }

    /// Whether [`DockTree::drop_at`] with the same arguments would place the
    /// element instead of being vetoed. Nothing is changed.
    pub fn can_drop(
        &self,
        station: ElementId,
        element: ElementId,
        placement: Option<&Placement>,
    ) -> Result<bool, TreeError> {
        self.check_insert(station, element)?;
        if let Some(p) = placement
            && self.placement_of(station, element).as_ref() == Some(p)
        {
            return Ok(true);
        }
        Ok(self.drop_target(station, element, placement)?.is_some())
    }

    fn drop_target(
        &self,
        station: ElementId,
        element: ElementId,
        placement: Option<&Placement>,
    ) -> Result<Option<DropTarget>, TreeError> {
        let kind = self.station(station)?.kind;
        let remaining: Vec<ElementId> =
            self.children(station).iter().copied().filter(|&c| c != element).collect();
        let path = placement.map_or(&[][..], |p| p.path.as_slice());
        let first = path.first().copied().unwrap_or(usize::MAX).min(remaining.len());
        let target = match path.get(1) {
            Some(&index) if first < remaining.len() => {
                let anchor = remaining[first];
                match self.station_kind(anchor) {
                    Some(StationKind::Stack) => DropTarget::Into {
                        stack: anchor,
                        index,
                    },
                    None if kind.merges() => DropTarget::Merge { anchor, index },
                    _ => DropTarget::At(first),
                }
            }
            _ => DropTarget::At(first),
        };

        let receiver = match target {
            DropTarget::Into { stack, .. } => stack,
            _ => station,
        };
        if !self.accepts(station, element) || !self.accepts(receiver, element) {
            return Ok(None);
        }
        if matches!(target, DropTarget::Merge { .. }) && self.is_station(element) {
            return Ok(None);
        }
        Ok(Some(target))
    }

    fn wrap_in_stack(&mut self, anchor: ElementId) -> Result<ElementId, TreeError> {
        let parent = self.parent(anchor).ok_or(TreeError::UnknownElement(anchor))?;
        self.stack_counter += 1;
        let stack = self.add_stack(format!("stack-{}", self.stack_counter));
        let bounds = self.bounds(anchor);
        let s = self.station_mut(parent)?;
        let index = s
            .children
            .iter()
            .position(|&c| c == anchor)
            .ok_or(TreeError::NotAChild { station: parent, element: anchor })?;
        s.children[index] = stack;
        if s.fullscreen == Some(anchor) {
            s.fullscreen = Some(stack);
        }
        self.elements[stack].parent = Some(parent);
        self.elements[stack].bounds = bounds;
        self.elements[anchor].parent = Some(stack);
        self.station_mut(stack)?.children.push(anchor);
        debug!(?anchor, ?stack, "merged into a new tab group");
        Ok(stack)
    }

    /// Reorders `element` inside its current parent. Returns whether the
    /// element actually moved.
    pub fn move_within(&mut self, element: ElementId, index: usize) -> Result<bool, TreeError> {
        let parent = self.parent(element).ok_or(TreeError::UnknownElement(element))?;
        let s = self.station_mut(parent)?;
        let Some(current) = s.children.iter().position(|&c| c == element) else {
            return Err(TreeError::NotAChild { station: parent, element });
        };
        let index = index.min(s.children.len() - 1);
        if current == index {
            return Ok(false);
        }
        let moved = s.children.remove(current);
        s.children.insert(index, moved);
        Ok(true)
    }

    /// Path of `element` relative to `station`, `None` if it is not below it.
    pub fn placement_of(&self, station: ElementId, element: ElementId) -> Option<Placement> {
        let mut path = Vec::new();
        let mut current = element;
        loop {
            let parent = self.parent(current)?;
            path.push(self.index_of(current)?);
            if parent == station {
                break;
            }
            current = parent;
        }
        path.reverse();
        let bounds = match self.station_kind(station) {
            Some(StationKind::Screen) => self.bounds(current),
            _ => None,
        };
        Some(Placement { path, bounds })
    }

    pub fn fullscreen(&self, station: ElementId) -> Option<ElementId> {
        self.station(station).ok()?.fullscreen
    }

    pub fn set_fullscreen(
        &mut self,
        station: ElementId,
        element: Option<ElementId>,
    ) -> Result<(), TreeError> {
        if let Some(element) = element
            && self.parent(element) != Some(station)
        {
            return Err(TreeError::NotAChild { station, element });
        }
        self.station_mut(station)?.fullscreen = element;
        Ok(())
    }

    pub fn stall(&mut self) { self.stalled += 1; }

    /// Releases one stall. Deferred cleanup runs once the last stall is
    /// released, in which case this returns true.
    pub fn unstall(&mut self) -> bool {
        self.stalled = self.stalled.saturating_sub(1);
        if self.stalled > 0 {
            return false;
        }
        for stack in std::mem::take(&mut self.pending_cleanup) {
            self.dissolve(stack);
        }
        true
    }

    pub fn is_stalled(&self) -> bool { self.stalled > 0 }

    fn schedule_cleanup(&mut self, stack: ElementId) {
        if self.is_stalled() {
            if !self.pending_cleanup.contains(&stack) {
                self.pending_cleanup.push(stack);
            }
        } else {
            self.dissolve(stack);
        }
    }

    /// Replaces a tab group with fewer than two children by its only child,
    /// or removes it when empty.
    fn dissolve(&mut self, stack: ElementId) {
        let Ok(s) = self.station(stack) else {
            return;
        };
        if s.children.len() >= 2 {
            return;
        }
        let child = s.children.first().copied();
        let Some(parent) = self.parent(stack) else {
            return;
        };
        let Some(index) = self.index_of(stack) else {
            return;
        };
        let bounds = self.bounds(stack);
        let Ok(p) = self.station_mut(parent) else {
            return;
        };
        let was_fullscreen = p.fullscreen == Some(stack);
        match child {
            Some(child) => {
                p.children[index] = child;
                if was_fullscreen {
                    p.fullscreen = Some(child);
                }
                self.elements[child].parent = Some(parent);
                if self.elements[child].bounds.is_none() {
                    self.elements[child].bounds = bounds;
                }
            }
            None => {
                p.children.remove(index);
                if was_fullscreen {
                    p.fullscreen = None;
                }
            }
        }
        if self.focused == Some(stack) {
            self.focused = child;
        }
        self.elements.remove(stack);
        debug!(?stack, ?child, "dissolved tab group");
    }

    pub fn focused(&self) -> Option<ElementId> { self.focused }

    /// Moves focus to `element` unless focus is frozen. Returns whether focus
    /// changed hands.
    pub fn request_focus(&mut self, element: ElementId) -> bool {
        if self.focus_frozen > 0 || !self.contains(element) {
            trace!(?element, "focus request dropped");
            return false;
        }
        self.focused = Some(element);
        true
    }

    pub fn clear_focus(&mut self) { self.focused = None; }

    pub fn freeze_focus(&mut self) { self.focus_frozen += 1; }

    pub fn melt_focus(&mut self) { self.focus_frozen = self.focus_frozen.saturating_sub(1); }

    pub fn is_focus_frozen(&self) -> bool { self.focus_frozen > 0 }

    pub fn draw_tree(&self, root: ElementId) -> String {
        let mut out = String::new();
        _ = ascii_tree::write_tree(&mut out, &self.ascii_tree(root));
        out
    }

    fn ascii_tree(&self, id: ElementId) -> ascii_tree::Tree {
        let mut desc = format!("{} {:?}", self.key(id).unwrap_or("?"), id);
        if let Some(kind) = self.station_kind(id) {
            desc.push_str(&format!(" [{kind}]"));
        }
        if self.parent(id).and_then(|p| self.fullscreen(p)) == Some(id) {
            desc.push_str(" (fullscreen)");
        }
        let children: Vec<_> = self.children(id).iter().map(|&c| self.ascii_tree(c)).collect();
        if children.is_empty() {
            ascii_tree::Tree::Leaf(vec![desc])
        } else {
            ascii_tree::Tree::Node(desc, children)
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn split_with(tree: &mut DockTree, keys: &[&str]) -> (ElementId, Vec<ElementId>) {
        let station = tree.add_station("center", StationKind::Split);
        let ids = keys
            .iter()
            .map(|k| {
                let id = tree.add_dockable(*k);
                tree.insert(station, id, usize::MAX).unwrap();
                id
            })
            .collect();
        (station, ids)
    }

    #[test]
    fn insert_clamps_and_tracks_parent() {
        let mut tree = DockTree::new();
        let (station, ids) = split_with(&mut tree, &["a", "b"]);
        let c = tree.add_dockable("c");
        tree.insert(station, c, 1).unwrap();
        assert_eq!(tree.children(station), &[ids[0], c, ids[1]]);
        assert_eq!(tree.parent(c), Some(station));
        assert_eq!(tree.placement_of(station, c), Some(Placement::at(1)));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut tree = DockTree::new();
        let (station, _) = split_with(&mut tree, &["a"]);
        let stack = tree.add_stack("s");
        tree.insert(station, stack, 0).unwrap();
        assert_eq!(
            tree.insert(stack, station, 0),
            Err(TreeError::Cycle { station: stack, element: station })
        );
    }

    #[test]
    fn drop_into_existing_stack_uses_nested_path() {
        let mut tree = DockTree::new();
        let (station, ids) = split_with(&mut tree, &["a"]);
        let stack = tree.add_stack("s");
        tree.insert(station, stack, 1).unwrap();
        let t1 = tree.add_dockable("t1");
        let t2 = tree.add_dockable("t2");
        tree.insert(stack, t1, 0).unwrap();
        tree.insert(stack, t2, 1).unwrap();

        let d = tree.add_dockable("d");
        let placed = tree.drop_at(station, d, Some(&Placement::path([1, 1]))).unwrap();
        assert!(placed.is_placed());
        assert_eq!(tree.children(stack), &[t1, d, t2]);
        assert_eq!(tree.placement_of(station, d), Some(Placement::path([1, 1])));
        assert_eq!(tree.children(station), &[ids[0], stack]);
    }

    #[test]
    fn drop_below_plain_child_merges_into_new_stack() {
        let mut tree = DockTree::new();
        let (station, ids) = split_with(&mut tree, &["a", "b"]);
        let d = tree.add_dockable("d");
        assert!(tree.drop_at(station, d, Some(&Placement::path([1, 0]))).unwrap().is_placed());

        let stack = tree.parent(d).unwrap();
        assert_eq!(tree.station_kind(stack), Some(StationKind::Stack));
        assert_eq!(tree.children(stack), &[d, ids[1]]);
        assert_eq!(tree.children(station), &[ids[0], stack]);
    }

    #[test]
    fn veto_leaves_tree_untouched() {
        let mut tree = DockTree::new();
        let (station, ids) = split_with(&mut tree, &["a"]);
        let flap = tree.add_station("west", StationKind::Flap);
        tree.set_acceptance(flap, Acceptance::Nothing).unwrap();

        assert!(!tree.can_drop(flap, ids[0], None).unwrap());
        assert_eq!(tree.drop_at(flap, ids[0], None).unwrap(), PlaceResult::Vetoed);
        assert_eq!(tree.parent(ids[0]), Some(station));
        assert!(tree.children(flap).is_empty());
    }

    #[test]
    fn can_drop_follows_the_receiving_stack() {
        let mut tree = DockTree::new();
        let (station, _) = split_with(&mut tree, &["a"]);
        let stack = tree.add_stack("s");
        tree.insert(station, stack, 1).unwrap();
        let t1 = tree.add_dockable("t1");
        let t2 = tree.add_dockable("t2");
        tree.insert(stack, t1, 0).unwrap();
        tree.insert(stack, t2, 1).unwrap();
        let d = tree.add_dockable("d");
        tree.set_acceptance(stack, Acceptance::Reject([d].into_iter().collect())).unwrap();

        assert!(tree.can_drop(station, d, None).unwrap());
        assert!(!tree.can_drop(station, d, Some(&Placement::path([1, 0]))).unwrap());
        assert_eq!(
            tree.drop_at(station, d, Some(&Placement::path([1, 0]))).unwrap(),
            PlaceResult::Vetoed
        );
        assert!(tree.can_drop(station, t1, Some(&Placement::path([1, 0]))).unwrap());
        assert_eq!(
            tree.can_drop(stack, station, None),
            Err(TreeError::Cycle { station: stack, element: station })
        );
        assert_eq!(tree.parent(d), None);
    }

    #[test]
    fn dropping_at_current_placement_is_noop() {
        let mut tree = DockTree::new();
        let (station, _) = split_with(&mut tree, &["a"]);
        let stack = tree.add_stack("s");
        tree.insert(station, stack, 1).unwrap();
        let t1 = tree.add_dockable("t1");
        let t2 = tree.add_dockable("t2");
        tree.insert(stack, t1, 0).unwrap();
        tree.insert(stack, t2, 1).unwrap();

        let here = tree.placement_of(station, t2).unwrap();
        assert!(tree.drop_at(station, t2, Some(&here)).unwrap().is_placed());
        assert!(tree.contains(stack));
        assert_eq!(tree.children(stack), &[t1, t2]);
    }

    #[test]
    fn single_child_stack_dissolves_after_unstall() {
        let mut tree = DockTree::new();
        let (station, _) = split_with(&mut tree, &["a"]);
        let flap = tree.add_station("west", StationKind::Flap);
        let stack = tree.add_stack("s");
        tree.insert(station, stack, 1).unwrap();
        let t1 = tree.add_dockable("t1");
        let t2 = tree.add_dockable("t2");
        tree.insert(stack, t1, 0).unwrap();
        tree.insert(stack, t2, 1).unwrap();
        tree.set_fullscreen(station, Some(stack)).unwrap();

        tree.stall();
        tree.insert(flap, t2, 0).unwrap();
        assert!(tree.contains(stack), "cleanup must wait for unstall");
        assert!(tree.unstall());

        assert!(!tree.contains(stack));
        assert_eq!(tree.parent(t1), Some(station));
        assert_eq!(tree.index_of(t1), Some(1));
        assert_eq!(tree.fullscreen(station), Some(t1));
    }

    #[test]
    fn stacks_reject_stations() {
        let mut tree = DockTree::new();
        let stack = tree.add_stack("s");
        let other = tree.add_stack("o");
        assert!(!tree.accepts(stack, other));
    }

    #[test]
    fn screen_placements_carry_bounds() {
        let mut tree = DockTree::new();
        let screen = tree.add_station("screen", StationKind::Screen);
        let d = tree.add_dockable("d");
        let bounds = Bounds::new(10, 20, 300, 200);
        let placed = tree.drop_at(screen, d, Some(&Placement::at(0).with_bounds(bounds))).unwrap();
        assert!(placed.is_placed());
        assert_eq!(tree.placement_of(screen, d), Some(Placement::at(0).with_bounds(bounds)));
    }

    #[test]
    fn move_within_reorders() {
        let mut tree = DockTree::new();
        let (station, ids) = split_with(&mut tree, &["a", "b", "c"]);
        assert!(tree.move_within(ids[0], 2).unwrap());
        assert_eq!(tree.children(station), &[ids[1], ids[2], ids[0]]);
        assert!(!tree.move_within(ids[0], 5).unwrap());
    }

    #[test]
    fn frozen_focus_drops_requests() {
        let mut tree = DockTree::new();
        let (_, ids) = split_with(&mut tree, &["a", "b"]);
        assert!(tree.request_focus(ids[0]));
        tree.freeze_focus();
        assert!(!tree.request_focus(ids[1]));
        tree.melt_focus();
        assert_eq!(tree.focused(), Some(ids[0]));
    }

    #[test]
    fn draw_tree_marks_fullscreen() {
        let mut tree = DockTree::new();
        let (station, ids) = split_with(&mut tree, &["a", "b"]);
        tree.set_fullscreen(station, Some(ids[1])).unwrap();
        let drawn = tree.draw_tree(station);
        assert!(drawn.contains("center"));
        assert!(drawn.contains("b") && drawn.contains("(fullscreen)"));
    }
}

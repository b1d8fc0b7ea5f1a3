use crate::common::collections::IndexSet;
use crate::model::tree::{DockTree, ElementId};

/// Every element touched by one transaction, in the order they were first
/// touched. Adding a station adds everything below it as well.
#[derive(Debug, Default, Clone)]
pub struct AffectedSet {
    elements: IndexSet<ElementId>,
}

impl AffectedSet {
    pub fn new() -> Self { Self::default() }

    pub fn add(&mut self, tree: &DockTree, element: ElementId) {
        self.elements.insert(element);
        self.elements.extend(tree.descendants(element));
    }

    pub fn contains(&self, element: ElementId) -> bool { self.elements.contains(&element) }

    pub fn len(&self) -> usize { self.elements.len() }

    pub fn is_empty(&self) -> bool { self.elements.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = ElementId> + '_ { self.elements.iter().copied() }

    pub fn merge(&mut self, other: AffectedSet) { self.elements.extend(other.elements); }

    pub fn take(&mut self) -> AffectedSet { std::mem::take(self) }
}

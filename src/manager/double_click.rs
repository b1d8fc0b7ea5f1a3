use crate::model::ExtendedMode;

/// Picks the mode a double-clicked dockable switches to.
pub trait DoubleClickLocationStrategy {
    /// `current` is the dockable's mode, `available` tells whether a mode may
    /// be entered. `None` means the click is ignored.
    fn handle(
        &self,
        current: Option<ExtendedMode>,
        available: &dyn Fn(ExtendedMode) -> bool,
    ) -> Option<ExtendedMode>;
}

/// Toggles between normalized and maximized.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultDoubleClickStrategy;

impl DoubleClickLocationStrategy for DefaultDoubleClickStrategy {
    fn handle(
        &self,
        current: Option<ExtendedMode>,
        available: &dyn Fn(ExtendedMode) -> bool,
    ) -> Option<ExtendedMode> {
        let target = match current? {
            ExtendedMode::Normalized => ExtendedMode::Maximized,
            ExtendedMode::Maximized => ExtendedMode::Normalized,
            ExtendedMode::Minimized | ExtendedMode::Externalized => return None,
        };
        available(target).then_some(target)
    }
}

/// Ignores every double click.
#[derive(Clone, Copy, Debug, Default)]
pub struct IgnoreDoubleClick;

impl DoubleClickLocationStrategy for IgnoreDoubleClick {
    fn handle(&self, _: Option<ExtendedMode>, _: &dyn Fn(ExtendedMode) -> bool) -> Option<ExtendedMode> {
        None
    }
}

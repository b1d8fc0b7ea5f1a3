use std::fmt;

use crate::manager::enablement::Availability;
use crate::model::{ElementId, ExtendedMode, ModeId};

/// A button or menu entry switching one dockable into a mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeAction {
    pub mode: ModeId,
    pub extended: ExtendedMode,
    pub label: String,
}

impl fmt::Display for ModeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.label) }
}

/// Decides which action a mode shows on a dockable.
pub trait ActionProvider {
    fn action(
        &self,
        mode: &ModeId,
        extended: ExtendedMode,
        current: Option<&ModeId>,
        availability: Availability,
    ) -> Option<ModeAction>;
}

/// Offers the switch into the mode whenever the dockable is somewhere else
/// and the mode is available and visible for it.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultActionProvider;

impl ActionProvider for DefaultActionProvider {
    fn action(
        &self,
        mode: &ModeId,
        extended: ExtendedMode,
        current: Option<&ModeId>,
        availability: Availability,
    ) -> Option<ModeAction> {
        if current == Some(mode) || availability != Availability::Available {
            return None;
        }
        let label = match extended {
            ExtendedMode::Normalized => "Normalize",
            ExtendedMode::Minimized => "Minimize",
            ExtendedMode::Maximized => "Maximize",
            ExtendedMode::Externalized => "Externalize",
        };
        Some(ModeAction {
            mode: mode.clone(),
            extended,
            label: label.to_owned(),
        })
    }
}

/// Per dockable cache of the action a mode currently shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DockableHandle {
    element: ElementId,
    action: Option<ModeAction>,
}

impl DockableHandle {
    pub fn new(element: ElementId) -> Self { Self { element, action: None } }

    pub fn element(&self) -> ElementId { self.element }

    pub fn action(&self) -> Option<&ModeAction> { self.action.as_ref() }

    pub fn set_action(&mut self, action: Option<ModeAction>) { self.action = action; }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_action_for_the_current_mode_or_hidden_modes() {
        let provider = DefaultActionProvider;
        let normal = ExtendedMode::Normalized.id();
        let max = ExtendedMode::Maximized.id();
        assert_eq!(
            provider.action(&normal, ExtendedMode::Normalized, Some(&normal), Availability::Available),
            None
        );
        assert_eq!(
            provider.action(&max, ExtendedMode::Maximized, Some(&normal), Availability::Hidden),
            None
        );
        let action = provider
            .action(&max, ExtendedMode::Maximized, Some(&normal), Availability::Available)
            .unwrap();
        assert_eq!(action.to_string(), "Maximize");
        assert_eq!(action.mode, max);
    }
}

use regex::Regex;
use tracing::trace;

use crate::common::config::DockableRule;
use crate::model::{DockTree, ElementId, ExtendedMode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Availability {
    Available,
    /// The mode may be used but no action for it is shown.
    Hidden,
    Unavailable,
}

impl Availability {
    pub fn is_available(self) -> bool { self != Availability::Unavailable }

    pub fn is_hidden(self) -> bool { self != Availability::Available }
}

/// Decides which modes an element may enter.
pub trait ExtendedModeEnablement {
    fn availability(&self, tree: &DockTree, element: ElementId, mode: ExtendedMode) -> Availability;
}

/// Everything is allowed everywhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultEnablement;

impl ExtendedModeEnablement for DefaultEnablement {
    fn availability(&self, _: &DockTree, _: ElementId, _: ExtendedMode) -> Availability {
        Availability::Available
    }
}

#[derive(Debug)]
struct CompiledRule {
    key: Regex,
    rule: DockableRule,
}

/// Enablement driven by `[[rules]]` in the config file. The first rule whose
/// key pattern matches the whole element key decides; elements matched by no
/// rule may enter every mode.
#[derive(Debug, Default)]
pub struct RuleEnablement {
    rules: Vec<CompiledRule>,
}

impl RuleEnablement {
    pub fn from_rules(rules: &[DockableRule]) -> Result<Self, regex::Error> {
        let rules = rules
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    key: Regex::new(&format!("^(?:{})$", rule.key))?,
                    rule: rule.clone(),
                })
            })
            .collect::<Result<_, regex::Error>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize { self.rules.len() }

    pub fn is_empty(&self) -> bool { self.rules.is_empty() }
}

impl ExtendedModeEnablement for RuleEnablement {
    fn availability(&self, tree: &DockTree, element: ElementId, mode: ExtendedMode) -> Availability {
        let Some(key) = tree.key(element) else {
            return Availability::Unavailable;
        };
        let Some(found) = self.rules.iter().find(|r| r.key.is_match(key)) else {
            return Availability::Available;
        };
        trace!(key, rule = %found.rule.key, %mode, "enablement rule matched");
        if !found.rule.allows(mode) {
            Availability::Unavailable
        } else if found.rule.hidden.contains(&mode) {
            Availability::Hidden
        } else {
            Availability::Available
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(key: &str) -> DockableRule {
        DockableRule {
            key: key.into(),
            ..DockableRule::default()
        }
    }

    #[test]
    fn first_matching_rule_decides() {
        let mut tree = DockTree::new();
        let console = tree.add_dockable("console");
        let editor = tree.add_dockable("editor-1");
        let other = tree.add_dockable("consoles");

        let enablement = RuleEnablement::from_rules(&[
            DockableRule {
                maximizable: false,
                ..rule("console")
            },
            DockableRule {
                hidden: vec![ExtendedMode::Externalized],
                ..rule("editor-.*")
            },
            DockableRule {
                externalizable: false,
                ..rule("editor-1")
            },
        ])
        .unwrap();

        assert_eq!(
            enablement.availability(&tree, console, ExtendedMode::Maximized),
            Availability::Unavailable
        );
        assert_eq!(
            enablement.availability(&tree, console, ExtendedMode::Minimized),
            Availability::Available
        );
        assert_eq!(
            enablement.availability(&tree, editor, ExtendedMode::Externalized),
            Availability::Hidden
        );
        assert_eq!(
            enablement.availability(&tree, other, ExtendedMode::Maximized),
            Availability::Available
        );
    }

    #[test]
    fn invalid_patterns_are_reported() {
        assert!(RuleEnablement::from_rules(&[rule("(")]).is_err());
    }
}

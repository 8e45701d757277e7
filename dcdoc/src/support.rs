//! Whether a set of groups and rules can be expressed on a target surface.

use std::collections::BTreeSet;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::Serialize;

use crate::mac_mappings;
use crate::model::{EntryType, Format, Group, GroupType, PolicyRule};

/// Accumulated check outcome; supported when no issue was found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Support {
    pub checked: usize,
    pub issues: BTreeSet<String>,
}

impl Support {
    pub fn ok() -> Self {
        Self {
            checked: 1,
            issues: BTreeSet::new(),
        }
    }

    pub fn issue(message: impl Into<String>) -> Self {
        let mut support = Self::ok();
        support.issues.insert(message.into());
        support
    }

    pub fn is_supported(&self) -> bool {
        self.issues.is_empty()
    }
}

impl AddAssign for Support {
    fn add_assign(&mut self, rhs: Self) {
        self.checked += rhs.checked;
        self.issues.extend(rhs.issues);
    }
}

impl Add for Support {
    type Output = Support;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl Sum for Support {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Support::default(), Add::add)
    }
}

pub trait SupportCheck {
    fn check_group(&self, group: &Group) -> Support;
    fn check_rule(&self, rule: &PolicyRule) -> Support;

    fn summarize(&self, groups: &[Group], rules: &[PolicyRule]) -> Support {
        groups
            .iter()
            .map(|group| self.check_group(group))
            .chain(rules.iter().map(|rule| self.check_rule(rule)))
            .sum()
    }
}

/// What the Intune device control UI can represent.
pub struct IntuneUx;

impl SupportCheck for IntuneUx {
    fn check_group(&self, group: &Group) -> Support {
        if group.origin == Format::Mac {
            return Support::issue(format!("{}: macOS groups", group.name));
        }
        match group.group_type {
            GroupType::Device | GroupType::PrinterDevice => Support::ok(),
            ref other => Support::issue(format!("{}: {} groups", group.name, other.label())),
        }
    }

    fn check_rule(&self, rule: &PolicyRule) -> Support {
        if rule.origin == Format::Mac {
            return Support::issue(format!("{}: macOS rules", rule.name));
        }
        let mut support = Support::ok();
        for entry in &rule.entries {
            if entry.parameters.is_some() {
                support.issues.insert(format!("{}: entries with parameters", rule.name));
            }
            if entry.has_computer_condition() {
                support.issues.insert(format!("{}: entries with a computer SID", rule.name));
            }
        }
        support
    }
}

/// What the Windows policy format can represent.
pub struct Windows;

impl SupportCheck for Windows {
    fn check_group(&self, group: &Group) -> Support {
        if group.origin != Format::Mac {
            return Support::ok();
        }
        let mappings = mac_mappings::mappings();
        let mut support = Support::ok();
        if group.clauses().next().is_some() {
            support.issues.insert(format!("{}: nested clauses", group.name));
        }
        for property in group.descriptors() {
            if mappings.windows_descriptor(&property.name).is_none() {
                support.issues.insert(format!(
                    "{}: {} property",
                    group.name,
                    group.group_type.property_label(&property.name)
                ));
            }
        }
        support
    }

    fn check_rule(&self, rule: &PolicyRule) -> Support {
        if rule.origin != Format::Mac {
            return Support::ok();
        }
        let mut support = Support::ok();
        for entry in &rule.entries {
            match entry.entry_type {
                EntryType::MacRemovableMedia | EntryType::MacGeneric => {}
                other => {
                    support.issues.insert(format!("{}: {} entries", rule.name, other.label()));
                    continue;
                }
            }
            for token in &entry.mac_access {
                let mapped = entry
                    .entry_type
                    .access_types()
                    .iter()
                    .any(|access| access.mask != 0 && access.token == Some(token.as_str()));
                if !mapped {
                    support.issues.insert(format!("{}: {token} access", rule.name));
                }
            }
        }
        support
    }
}

#[cfg(test)]
mod tests {
    use super::{IntuneUx, Support, SupportCheck, Windows};
    use crate::model::{
        Enforcement, Entry, EntryType, Format, Group, GroupProperty, GroupType, Parameters,
        PolicyRule, Property,
    };

    #[test]
    fn supports_sum_from_identity() {
        let total: Support = vec![Support::ok(), Support::issue("a"), Support::issue("a")]
            .into_iter()
            .sum();
        assert_eq!(total.checked, 3);
        assert_eq!(total.issues.len(), 1);
        assert!(!total.is_supported());
        assert!(Support::default().is_supported());
        assert_eq!(Support::default() + Support::ok(), Support::ok());
    }

    #[test]
    fn intune_ux_rejects_network_groups_and_parameters() {
        let mut network = Group::new("{n}", Format::Gpo);
        network.group_type = GroupType::Network;
        let device = Group::new("{d}", Format::Gpo);
        let mut rule = PolicyRule::new("{r}", Format::Gpo);
        let mut entry = Entry::windows("{e}", Enforcement::Allow, 1, 0);
        entry.parameters = Some(Parameters::new("MatchAll"));
        rule.entries.push(entry);

        assert!(IntuneUx.check_group(&device).is_supported());
        let support = IntuneUx.summarize(&[network, device], &[rule]);
        assert_eq!(support.checked, 3);
        assert_eq!(support.issues.len(), 2);
    }

    #[test]
    fn windows_rejects_unmapped_mac_constructs() {
        let mut group = Group::new("g", Format::Mac);
        group.name = "Encrypted".into();
        group.properties.push(GroupProperty::Descriptor(Property::new("encryption", "true")));
        let support = Windows.check_group(&group);
        assert!(support.issues.contains("Encrypted: Encryption property"));

        let mut rule = PolicyRule::new("r", Format::Mac);
        rule.name = "Phones".into();
        rule.entries.push(Entry::mac(
            "e",
            EntryType::MacAppleDevice,
            Enforcement::Deny,
            vec!["backup_device".into()],
            vec![],
        ));
        rule.entries.push(Entry::mac(
            "f",
            EntryType::MacRemovableMedia,
            Enforcement::Deny,
            vec!["read".into()],
            vec![],
        ));
        let support = Windows.check_rule(&rule);
        assert_eq!(
            support.issues.into_iter().collect::<Vec<_>>(),
            vec!["Phones: Mac Apple Device entries".to_string()]
        );
    }
}

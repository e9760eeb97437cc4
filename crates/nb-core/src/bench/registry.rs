//! Check registry: validated, ordered benchmark content.

use super::focus::Focus;
use super::item::{CheckGroup, CheckItem};
use nb_common::ItemId;
use std::collections::HashSet;
use thiserror::Error;

/// Errors in benchmark definitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate benchmark item id {0}")]
    DuplicateId(ItemId),

    #[error("item {id}: {check} cannot be evaluated against this group's subject")]
    IncompatibleCheck { id: ItemId, check: String },

    #[error("item {0} needs a target process but its group has none")]
    MissingProcess(ItemId),
}

/// Groups of items in declaration order.
///
/// Item ids are unique across the registry and reporting follows
/// declaration order, never id order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    groups: Vec<CheckGroup>,
}

impl Registry {
    pub fn new(groups: Vec<CheckGroup>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for group in &groups {
            for item in &group.items {
                if !seen.insert(item.id.clone()) {
                    return Err(RegistryError::DuplicateId(item.id.clone()));
                }
                if !group.subject.accepts(&item.check) {
                    return Err(RegistryError::IncompatibleCheck {
                        id: item.id.clone(),
                        check: item.check.to_string(),
                    });
                }
                if group.subject.needs_process() && group.process.is_none() {
                    return Err(RegistryError::MissingProcess(item.id.clone()));
                }
            }
        }
        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[CheckGroup] {
        &self.groups
    }

    /// All items in declaration order.
    pub fn items(&self) -> impl Iterator<Item = &CheckItem> {
        self.groups.iter().flat_map(|g| g.items.iter())
    }

    /// Items selected by `focus`, in declaration order.
    pub fn focused<'a>(&'a self, focus: &'a Focus) -> impl Iterator<Item = &'a CheckItem> + 'a {
        self.items().filter(move |item| focus.matches(item))
    }

    pub fn get(&self, id: &ItemId) -> Option<&CheckItem> {
        self.items().find(|item| &item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items().count()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.items.is_empty())
    }
}

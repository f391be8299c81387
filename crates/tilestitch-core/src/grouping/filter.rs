use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::{Result, StitchError};
use crate::view::{Attribute, AttributeValue, ViewDescription};

/// Allowed attribute values per attribute. An attribute without an entry is
/// unconstrained.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeFilter {
    allowed: BTreeMap<Attribute, HashSet<AttributeValue>>,
}

impl AttributeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict `attribute` to `values`, replacing any previous entry.
    pub fn insert(&mut self, attribute: Attribute, values: impl IntoIterator<Item = AttributeValue>) {
        self.allowed.insert(attribute, values.into_iter().collect());
    }

    pub fn remove(&mut self, attribute: Attribute) {
        self.allowed.remove(&attribute);
    }

    pub fn clear(&mut self) {
        self.allowed.clear();
    }

    pub fn contains(&self, attribute: Attribute) -> bool {
        self.allowed.contains_key(&attribute)
    }

    pub fn allowed(&self, attribute: Attribute) -> Option<&HashSet<AttributeValue>> {
        self.allowed.get(&attribute)
    }

    pub fn attributes(&self) -> impl Iterator<Item = Attribute> + '_ {
        self.allowed.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn permits(&self, view: &ViewDescription) -> bool {
        self.allowed
            .iter()
            .all(|(attribute, values)| values.contains(view.attribute(*attribute)))
    }
}

/// Views passing every entry of `filter`, in their original order.
pub fn filtered_views(views: &[ViewDescription], filter: &AttributeFilter) -> Vec<ViewDescription> {
    views
        .iter()
        .filter(|vd| filter.permits(vd))
        .cloned()
        .collect()
}

/// Distinct values of `attribute` across `views`.
pub fn instances_of_attribute<'a>(
    views: impl IntoIterator<Item = &'a ViewDescription>,
    attribute: Attribute,
) -> HashSet<AttributeValue> {
    views
        .into_iter()
        .map(|vd| vd.attribute(attribute).clone())
        .collect()
}

/// Distinct values of `attribute` across all members of all groups.
pub fn instances_of_attribute_grouped(
    groups: &[Vec<ViewDescription>],
    attribute: Attribute,
) -> HashSet<AttributeValue> {
    instances_of_attribute(groups.iter().flatten(), attribute)
}

/// Values of `attribute` present in at least one member of every group,
/// sorted by id.
pub fn instances_present_in_all_groups(
    groups: &[Vec<ViewDescription>],
    attribute: Attribute,
) -> Result<Vec<AttributeValue>> {
    let (first, rest) = groups.split_first().ok_or_else(|| {
        StitchError::InvalidArgument(format!(
            "cannot intersect {} instances over an empty group list",
            attribute
        ))
    })?;

    let mut common: BTreeSet<AttributeValue> = instances_of_attribute(first, attribute)
        .into_iter()
        .collect();

    for group in rest {
        let present = instances_of_attribute(group, attribute);
        // Filter a snapshot into a fresh set; the set being read is never mutated.
        let snapshot = common;
        common = snapshot
            .into_iter()
            .filter(|value| present.contains(value))
            .collect();
    }

    Ok(common.into_iter().collect())
}

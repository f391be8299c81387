use std::collections::{BTreeSet, HashMap};

use crate::error::Result;
use crate::view::{Attribute, AttributeValue, GroupedView, ViewDescription};

/// Partition `views` so that two views share a group iff they agree on
/// every attribute not listed in `grouping_factors`.
///
/// Groups appear in the order their first member was seen; members keep
/// their input order.
pub fn group_by_attributes(
    views: &[ViewDescription],
    grouping_factors: &BTreeSet<Attribute>,
) -> Vec<Vec<ViewDescription>> {
    let key_attributes: Vec<Attribute> = Attribute::ALL
        .into_iter()
        .filter(|a| !grouping_factors.contains(a))
        .collect();

    let mut index: HashMap<Vec<AttributeValue>, usize> = HashMap::new();
    let mut groups: Vec<Vec<ViewDescription>> = Vec::new();

    for vd in views {
        let key: Vec<AttributeValue> = key_attributes
            .iter()
            .map(|a| vd.attribute(*a).clone())
            .collect();
        match index.get(&key) {
            Some(&i) => groups[i].push(vd.clone()),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![vd.clone()]);
            }
        }
    }

    groups
}

/// Wrap each non-empty group into a [`GroupedView`].
pub fn grouped_views(groups: &[Vec<ViewDescription>]) -> Result<Vec<GroupedView>> {
    groups
        .iter()
        .map(|g| GroupedView::new(g.clone()))
        .collect()
}

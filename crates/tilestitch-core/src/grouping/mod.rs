//! Classifying views by attribute: filtering, grouping and deciding which
//! groups are compared against each other.

pub mod compare;
pub mod filter;
pub mod group;

pub use compare::{candidate_pairs, groups_differ, GroupingSpec};
pub use filter::{
    filtered_views, instances_of_attribute, instances_of_attribute_grouped,
    instances_present_in_all_groups, AttributeFilter,
};
pub use group::{group_by_attributes, grouped_views};

//! Filtering, grouping and aggregation state of one registration run, and
//! the three interaction steps that fill it in.
//!
//! Every step is driven by an [`Interaction`]: the caller (a dialog, a
//! config file, a test) either confirms a set of choices or cancels. A
//! cancelled step records the cancellation and leaves all state untouched.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::{AggregationAction, GroupedViewAggregator};
use crate::error::{Result, StitchError};
use crate::grouping::{
    candidate_pairs, filtered_views, group_by_attributes, grouped_views, instances_of_attribute,
    instances_present_in_all_groups, AttributeFilter, GroupingSpec,
};
use crate::pipeline::config::AttributeChoices;
use crate::view::{Attribute, AttributeValue, GroupedView, ViewCatalog, ViewDescription};

/// Answer to one interaction step.
#[derive(Clone, Debug, PartialEq)]
pub enum Interaction<T> {
    Confirmed(T),
    Cancelled,
}

/// Whether an interaction step changed the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Cancelled,
}

impl Outcome {
    pub fn ensure_applied(self) -> Result<()> {
        match self {
            Self::Applied => Ok(()),
            Self::Cancelled => Err(StitchError::Cancelled),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterChoice {
    /// Keep every instance of the attribute.
    #[default]
    All,
    /// Keep only the instances present in the current selection.
    Selected,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupingChoice {
    /// Register across instances of the attribute.
    Compare,
    /// Collapse instances of the attribute into one unit.
    Group,
    /// Process instances of the attribute independently.
    #[default]
    TreatIndividually,
}

impl std::fmt::Display for GroupingChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compare => write!(f, "compare"),
            Self::Group => write!(f, "group"),
            Self::TreatIndividually => write!(f, "treat individually"),
        }
    }
}

/// One entry of the list offered by [`FilteringAndGrouping::aggregation_options`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AggregationChoice {
    Average,
    PickBrightest,
    /// Index into the instances present in every group.
    Instance(usize),
}

/// Builds up the filter, grouping spec and aggregator of one run.
pub struct FilteringAndGrouping<'a, C: ViewCatalog> {
    catalog: &'a C,
    filter: AttributeFilter,
    spec: GroupingSpec,
    aggregator: GroupedViewAggregator,
    was_cancelled: bool,
}

impl<'a, C: ViewCatalog> FilteringAndGrouping<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self {
            catalog,
            filter: AttributeFilter::new(),
            spec: GroupingSpec::default(),
            aggregator: GroupedViewAggregator::new(),
            was_cancelled: false,
        }
    }

    pub fn catalog(&self) -> &C {
        self.catalog
    }

    pub fn filter(&self) -> &AttributeFilter {
        &self.filter
    }

    pub fn spec(&self) -> &GroupingSpec {
        &self.spec
    }

    pub fn aggregator(&self) -> &GroupedViewAggregator {
        &self.aggregator
    }

    pub fn aggregator_mut(&mut self) -> &mut GroupedViewAggregator {
        &mut self.aggregator
    }

    pub fn was_cancelled(&self) -> bool {
        self.was_cancelled
    }

    pub fn add_filter(&mut self, attribute: Attribute, values: impl IntoIterator<Item = AttributeValue>) {
        self.filter.insert(attribute, values);
    }

    /// Restrict every attribute to the instances present in `selection`.
    pub fn add_filters_from_selection(&mut self, selection: &[ViewDescription]) {
        for attribute in Attribute::ALL {
            self.filter
                .insert(attribute, instances_of_attribute(selection, attribute));
        }
    }

    pub fn clear_filters(&mut self) {
        self.filter.clear();
    }

    pub fn add_grouping_factor(&mut self, attribute: Attribute) {
        self.spec.grouping_factors.insert(attribute);
    }

    pub fn add_application_axis(&mut self, attribute: Attribute) {
        self.spec.application_axes.insert(attribute);
    }

    pub fn add_comparison_axis(&mut self, attribute: Attribute) {
        self.spec.comparison_axes.insert(attribute);
    }

    pub fn clear_grouping(&mut self) {
        self.spec.clear();
    }

    pub fn clear_aggregation(&mut self) {
        self.aggregator.clear();
    }

    pub fn grouping_factors(&self) -> &BTreeSet<Attribute> {
        &self.spec.grouping_factors
    }

    pub fn application_axes(&self) -> &BTreeSet<Attribute> {
        &self.spec.application_axes
    }

    pub fn comparison_axes(&self) -> &BTreeSet<Attribute> {
        &self.spec.comparison_axes
    }

    pub fn filtered_views(&self) -> Vec<ViewDescription> {
        filtered_views(self.catalog.view_descriptions(), &self.filter)
    }

    /// Views grouped by the current grouping factors, optionally after
    /// applying the filter.
    pub fn grouped_views(&self, filtered: bool) -> Vec<Vec<ViewDescription>> {
        let views = if filtered {
            self.filtered_views()
        } else {
            self.catalog.view_descriptions().to_vec()
        };
        group_by_attributes(&views, &self.spec.grouping_factors)
    }

    /// Pairs of grouped views to register: same application-axis values,
    /// different comparison-axis values.
    pub fn comparisons(&self) -> Result<Vec<(GroupedView, GroupedView)>> {
        self.spec.validate()?;
        let groups = self.grouped_views(true);
        let units = grouped_views(&groups)?;
        let pairs = candidate_pairs(
            &groups,
            &self.spec.application_axes,
            &self.spec.comparison_axes,
        );
        debug!(groups = units.len(), pairs = pairs.len(), "Enumerated comparisons");
        Ok(pairs
            .into_iter()
            .map(|(i, j)| (units[i].clone(), units[j].clone()))
            .collect())
    }

    /// "All" for attributes whose selected instances cover every instance
    /// in the dataset, "Selected" otherwise.
    pub fn default_filter_choices(&self, selection: &[ViewDescription]) -> AttributeChoices<FilterChoice> {
        let all = self.catalog.view_descriptions();
        AttributeChoices::from_fn(|attribute| {
            let selected = instances_of_attribute(selection, attribute);
            let present = instances_of_attribute(all, attribute);
            if selected.len() == present.len() {
                FilterChoice::All
            } else {
                FilterChoice::Selected
            }
        })
    }

    pub fn apply_filter_choices(
        &mut self,
        selection: &[ViewDescription],
        interaction: Interaction<AttributeChoices<FilterChoice>>,
    ) -> Outcome {
        let Interaction::Confirmed(choices) = interaction else {
            return self.cancel();
        };
        for (attribute, choice) in choices.iter() {
            if *choice == FilterChoice::Selected {
                self.filter
                    .insert(attribute, instances_of_attribute(selection, attribute));
            }
        }
        Outcome::Applied
    }

    /// Existing grouping factors stay grouped. Attributes that are filtered
    /// or have a single instance in `selection` are treated individually;
    /// the rest are compared.
    pub fn default_grouping_choices(&self, selection: &[ViewDescription]) -> AttributeChoices<GroupingChoice> {
        AttributeChoices::from_fn(|attribute| {
            if self.spec.grouping_factors.contains(&attribute) {
                GroupingChoice::Group
            } else if self.filter.contains(attribute)
                || instances_of_attribute(selection, attribute).len() <= 1
            {
                GroupingChoice::TreatIndividually
            } else {
                GroupingChoice::Compare
            }
        })
    }

    /// Replace the grouping spec with the confirmed choices.
    pub fn apply_grouping_choices(
        &mut self,
        interaction: Interaction<AttributeChoices<GroupingChoice>>,
    ) -> Outcome {
        let Interaction::Confirmed(choices) = interaction else {
            return self.cancel();
        };
        self.spec.clear();
        for (attribute, choice) in choices.iter() {
            match choice {
                GroupingChoice::Compare => self.add_comparison_axis(attribute),
                GroupingChoice::Group => self.add_grouping_factor(attribute),
                GroupingChoice::TreatIndividually => self.add_application_axis(attribute),
            }
        }
        debug!(spec = ?self.spec, "Grouping applied");
        Outcome::Applied
    }

    /// Labels offered for `attribute`: "average", "pick brightest", then
    /// every instance present in all current groups.
    pub fn aggregation_options(&self, attribute: Attribute) -> Result<Vec<String>> {
        let mut options = vec!["average".to_string(), "pick brightest".to_string()];
        options.extend(
            self.common_instances(attribute)?
                .iter()
                .map(AttributeValue::label),
        );
        Ok(options)
    }

    fn common_instances(&self, attribute: Attribute) -> Result<Vec<AttributeValue>> {
        instances_present_in_all_groups(&self.grouped_views(true), attribute)
    }

    /// Set one aggregation action per grouping factor. Factors missing from
    /// `choices` are averaged. Nothing changes if any choice is invalid.
    pub fn apply_aggregation_choices(
        &mut self,
        interaction: Interaction<BTreeMap<Attribute, AggregationChoice>>,
    ) -> Result<Outcome> {
        let Interaction::Confirmed(choices) = interaction else {
            return Ok(self.cancel());
        };

        let factors: HashSet<Attribute> = self.spec.grouping_factors.iter().copied().collect();
        if let Some(attribute) = choices.keys().find(|a| !factors.contains(a)) {
            return Err(StitchError::InvalidArgument(format!(
                "{} is not a grouping factor",
                attribute
            )));
        }

        let mut actions = Vec::with_capacity(factors.len());
        for &attribute in &self.spec.grouping_factors {
            let action = match choices.get(&attribute) {
                None | Some(AggregationChoice::Average) => AggregationAction::Average,
                Some(AggregationChoice::PickBrightest) => AggregationAction::PickBrightest,
                Some(AggregationChoice::Instance(index)) => {
                    let instances = self.common_instances(attribute)?;
                    let value = instances.get(*index).cloned().ok_or_else(|| {
                        StitchError::InvalidArgument(format!(
                            "{} instance #{} does not exist ({} available)",
                            attribute,
                            index,
                            instances.len()
                        ))
                    })?;
                    AggregationAction::PickSpecific(value)
                }
            };
            actions.push((attribute, action));
        }

        for (attribute, action) in actions {
            self.aggregator.add_action(attribute, action);
        }
        Ok(Outcome::Applied)
    }

    fn cancel(&mut self) -> Outcome {
        debug!("Interaction cancelled");
        self.was_cancelled = true;
        Outcome::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::view::{SpimDataset, ViewRegistrations, ViewSetup};

    /// Two channels on two tiles at one time point.
    fn dataset() -> SpimDataset {
        let mut views = Vec::new();
        let mut id = 0;
        for tile in 0..2 {
            for channel in 0..2 {
                let setup = Arc::new(ViewSetup {
                    id,
                    channel: AttributeValue::named(channel, format!("ch{}", channel)),
                    illumination: AttributeValue::new(0),
                    angle: AttributeValue::new(0),
                    tile: AttributeValue::new(tile),
                    size: vec![8, 8],
                });
                views.push(ViewDescription::new(AttributeValue::new(0), setup));
                id += 1;
            }
        }
        SpimDataset::new(views, ViewRegistrations::new())
    }

    #[test]
    fn cancelled_step_leaves_state_untouched() {
        let data = dataset();
        let mut session = FilteringAndGrouping::new(&data);
        session.add_grouping_factor(Attribute::Channel);
        let before = session.spec().clone();

        let outcome = session.apply_grouping_choices(Interaction::Cancelled);

        assert_eq!(outcome, Outcome::Cancelled);
        assert!(session.was_cancelled());
        assert_eq!(session.spec(), &before);
        assert!(outcome.ensure_applied().is_err());
    }

    #[test]
    fn default_grouping_compares_tiles_and_treats_singletons_individually() {
        let data = dataset();
        let mut session = FilteringAndGrouping::new(&data);
        session.add_grouping_factor(Attribute::Channel);

        let choices = session.default_grouping_choices(data.view_descriptions());

        assert_eq!(choices.channel, GroupingChoice::Group);
        assert_eq!(choices.tile, GroupingChoice::Compare);
        assert_eq!(choices.timepoint, GroupingChoice::TreatIndividually);
        assert_eq!(choices.angle, GroupingChoice::TreatIndividually);
    }

    #[test]
    fn default_filter_is_selected_only_for_partial_selections() {
        let data = dataset();
        let session = FilteringAndGrouping::new(&data);
        let first_tile: Vec<ViewDescription> = data.views[..2].to_vec();

        let choices = session.default_filter_choices(&first_tile);

        assert_eq!(choices.tile, FilterChoice::Selected);
        assert_eq!(choices.channel, FilterChoice::All);
    }

    #[test]
    fn aggregation_options_list_common_instances() {
        let data = dataset();
        let mut session = FilteringAndGrouping::new(&data);
        session.add_grouping_factor(Attribute::Channel);

        let options = session.aggregation_options(Attribute::Channel).unwrap();

        assert_eq!(options, vec!["average", "pick brightest", "ch0", "ch1"]);
    }

    #[test]
    fn out_of_range_instance_is_rejected_without_changes() {
        let data = dataset();
        let mut session = FilteringAndGrouping::new(&data);
        session.add_grouping_factor(Attribute::Channel);

        let choices = BTreeMap::from([(Attribute::Channel, AggregationChoice::Instance(7))]);
        let result = session.apply_aggregation_choices(Interaction::Confirmed(choices));

        assert!(result.is_err());
        assert!(session.aggregator().is_empty());
    }

    #[test]
    fn confirmed_instance_becomes_pick_specific() {
        let data = dataset();
        let mut session = FilteringAndGrouping::new(&data);
        session.add_grouping_factor(Attribute::Channel);

        let choices = BTreeMap::from([(Attribute::Channel, AggregationChoice::Instance(1))]);
        let outcome = session
            .apply_aggregation_choices(Interaction::Confirmed(choices))
            .unwrap();

        assert_eq!(outcome, Outcome::Applied);
        assert_eq!(
            session.aggregator().action(Attribute::Channel),
            Some(&AggregationAction::PickSpecific(AttributeValue::named(1, "ch1")))
        );
    }
}

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::consts::REGISTRATION_DIMENSIONS;
use crate::error::{Result, StitchError};

/// Semantic axis along which views are organised.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Attribute {
    TimePoint,
    Channel,
    Illumination,
    Angle,
    Tile,
}

impl Attribute {
    /// Every attribute, in the order the interaction steps present them.
    pub const ALL: [Attribute; 5] = [
        Attribute::TimePoint,
        Attribute::Channel,
        Attribute::Illumination,
        Attribute::Angle,
        Attribute::Tile,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::TimePoint => "TimePoint",
            Self::Channel => "Channel",
            Self::Illumination => "Illumination",
            Self::Angle => "Angle",
            Self::Tile => "Tile",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One instance of an attribute (a specific channel, tile, time point, ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeValue {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AttributeValue {
    pub fn new(id: u32) -> Self {
        Self { id, name: None }
    }

    pub fn named(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
        }
    }

    /// Label shown to the user: the name if present, the id otherwise.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.id.to_string(),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Identifies one acquisition.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ViewId {
    pub timepoint: u32,
    pub setup: u32,
}

impl ViewId {
    pub fn new(timepoint: u32, setup: u32) -> Self {
        Self { timepoint, setup }
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(tp={}, setup={})", self.timepoint, self.setup)
    }
}

/// Attribute tuple and spatial size shared by a setup across time points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewSetup {
    pub id: u32,
    pub channel: AttributeValue,
    pub illumination: AttributeValue,
    pub angle: AttributeValue,
    pub tile: AttributeValue,
    /// Spatial size in pixels, fastest axis first (x, y[, z]).
    pub size: Vec<usize>,
}

/// A view bound to its time point and setup.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewDescription {
    pub timepoint: AttributeValue,
    pub setup: Arc<ViewSetup>,
}

impl ViewDescription {
    pub fn new(timepoint: AttributeValue, setup: Arc<ViewSetup>) -> Self {
        Self { timepoint, setup }
    }

    pub fn id(&self) -> ViewId {
        ViewId::new(self.timepoint.id, self.setup.id)
    }

    /// Value of `attribute` for this view. The time point comes from the
    /// view itself, every other attribute from its setup.
    pub fn attribute(&self, attribute: Attribute) -> &AttributeValue {
        match attribute {
            Attribute::TimePoint => &self.timepoint,
            Attribute::Channel => &self.setup.channel,
            Attribute::Illumination => &self.setup.illumination,
            Attribute::Angle => &self.setup.angle,
            Attribute::Tile => &self.setup.tile,
        }
    }

    pub fn size(&self) -> &[usize] {
        &self.setup.size
    }
}

/// Several views processed as one unit.
///
/// The first member stands in for the group wherever a single id is needed
/// (pair enumeration, overlap tests, solver nodes).
#[derive(Clone, Debug, PartialEq)]
pub struct GroupedView {
    views: Vec<ViewDescription>,
}

impl GroupedView {
    pub fn new(views: Vec<ViewDescription>) -> Result<Self> {
        if views.is_empty() {
            return Err(StitchError::InvalidArgument(
                "a grouped view needs at least one member".into(),
            ));
        }
        Ok(Self { views })
    }

    pub fn single(view: ViewDescription) -> Self {
        Self { views: vec![view] }
    }

    pub fn id(&self) -> ViewId {
        self.views[0].id()
    }

    pub fn representative(&self) -> &ViewDescription {
        &self.views[0]
    }

    pub fn views(&self) -> &[ViewDescription] {
        &self.views
    }

    pub fn view_ids(&self) -> Vec<ViewId> {
        self.views.iter().map(ViewDescription::id).collect()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

impl fmt::Display for GroupedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())?;
        if self.views.len() > 1 {
            write!(f, "+{}", self.views.len() - 1)?;
        }
        Ok(())
    }
}

/// Current spatial transform of a view. Only the translation is modelled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewRegistration {
    pub translation: Vec<f64>,
}

impl Default for ViewRegistration {
    fn default() -> Self {
        Self {
            translation: vec![0.0; REGISTRATION_DIMENSIONS],
        }
    }
}

impl ViewRegistration {
    pub fn from_translation(translation: &[f64]) -> Self {
        Self {
            translation: translation.to_vec(),
        }
    }

    /// Translation restricted (or zero-padded) to `ndim` axes.
    pub fn translation_for(&self, ndim: usize) -> Vec<f64> {
        (0..ndim)
            .map(|d| self.translation.get(d).copied().unwrap_or(0.0))
            .collect()
    }

    /// Initial translation in downsampled pixel units.
    pub fn initial_translation(&self, ndim: usize, downsample: &[usize]) -> Vec<f64> {
        self.translation_for(ndim)
            .into_iter()
            .enumerate()
            .map(|(d, t)| t / downsample.get(d).copied().unwrap_or(1).max(1) as f64)
            .collect()
    }
}

/// Registration of every view, keyed by id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewRegistrations {
    registrations: BTreeMap<ViewId, ViewRegistration>,
}

impl ViewRegistrations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, view: ViewId, registration: ViewRegistration) {
        self.registrations.insert(view, registration);
    }

    pub fn get(&self, view: ViewId) -> Result<&ViewRegistration> {
        self.registrations
            .get(&view)
            .ok_or(StitchError::MissingView(view))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ViewId, &ViewRegistration)> {
        self.registrations.iter()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Translation of every view in `views`, restricted to `ndim` axes.
    pub fn translations(&self, views: &[ViewId], ndim: usize) -> Result<HashMap<ViewId, Vec<f64>>> {
        views
            .iter()
            .map(|v| Ok((*v, self.get(*v)?.translation_for(ndim))))
            .collect()
    }
}

/// Read access to the experiment metadata.
pub trait ViewCatalog {
    fn view_descriptions(&self) -> &[ViewDescription];

    fn attribute_of(&self, view: ViewId, attribute: Attribute) -> Option<&AttributeValue> {
        self.view_descriptions()
            .iter()
            .find(|vd| vd.id() == view)
            .map(|vd| vd.attribute(attribute))
    }

    fn time_point_of(&self, view: ViewId) -> Option<&AttributeValue> {
        self.attribute_of(view, Attribute::TimePoint)
    }
}

/// In-memory experiment: view descriptions plus their registrations.
#[derive(Clone, Debug, Default)]
pub struct SpimDataset {
    pub views: Vec<ViewDescription>,
    pub registrations: ViewRegistrations,
}

impl SpimDataset {
    pub fn new(views: Vec<ViewDescription>, registrations: ViewRegistrations) -> Self {
        Self {
            views,
            registrations,
        }
    }

    pub fn view(&self, id: ViewId) -> Result<&ViewDescription> {
        self.views
            .iter()
            .find(|vd| vd.id() == id)
            .ok_or(StitchError::MissingView(id))
    }
}

impl ViewCatalog for SpimDataset {
    fn view_descriptions(&self) -> &[ViewDescription] {
        &self.views
    }
}

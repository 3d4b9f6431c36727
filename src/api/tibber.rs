//! Price attributes of the Tibber price entity.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_with::{DefaultOnError, DisplayFromStr, PickFirst, VecSkipError, serde_as};

use crate::{
    core::price::{PricePoint, PriceTimeline},
    prelude::*,
    quantity::rate::KilowattHourRate,
};

/// `today` and `tomorrow` price lists.
///
/// Anything malformed degrades to an empty list or a point without a value.
#[must_use]
#[serde_as]
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PriceAttributes {
    #[serde_as(as = "DefaultOnError<VecSkipError<_>>")]
    #[serde(default)]
    pub today: Vec<RawPricePoint>,

    #[serde_as(as = "DefaultOnError<VecSkipError<_>>")]
    #[serde(default)]
    pub tomorrow: Vec<RawPricePoint>,
}

impl PriceAttributes {
    /// Parse the entity attributes, falling back to no prices at all.
    pub fn from_attributes(attributes: serde_json::Value) -> Self {
        serde_json::from_value(attributes).unwrap_or_else(|error| {
            warn!("malformed price attributes: {error:#}");
            Self::default()
        })
    }

    pub fn to_timeline(&self) -> PriceTimeline {
        let today = self.today.iter().map(PricePoint::from).collect::<Vec<_>>();
        let tomorrow = self.tomorrow.iter().map(PricePoint::from).collect::<Vec<_>>();
        PriceTimeline::build(&today, &tomorrow)
    }
}

#[serde_as]
#[derive(Copy, Clone, Debug, Deserialize)]
pub struct RawPricePoint {
    #[serde_as(as = "DefaultOnError")]
    #[serde(default, rename = "startsAt")]
    pub starts_at: Option<DateTime<FixedOffset>>,

    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    #[serde(default)]
    pub total: Option<f64>,
}

impl From<&RawPricePoint> for PricePoint {
    fn from(raw: &RawPricePoint) -> Self {
        Self { starts_at: raw.starts_at, total: raw.total.map(KilowattHourRate) }
    }
}

//! Home Assistant state shapes, as found in the history API and `state_changed` events.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_with::serde_as;

use crate::core::sample::Sample;

/// Entity state.
#[must_use]
#[derive(Clone, Debug, Deserialize)]
pub struct State {
    #[serde(default)]
    pub entity_id: Option<String>,

    #[serde(rename = "state")]
    pub value: String,

    #[serde(rename = "last_updated")]
    pub last_updated_at: DateTime<Utc>,

    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl State {
    pub fn to_sample(&self) -> Sample {
        Sample::parse(self.last_updated_at, Some(&self.value))
    }
}

/// Payload of the `state_changed` event.
#[must_use]
#[derive(Clone, Debug, Deserialize)]
pub struct StateChangedEvent {
    pub entity_id: String,
    pub old_state: Option<State>,
    pub new_state: Option<State>,
}

/// Response of `/api/history/period`: a list of state lists, one per entity.
#[must_use]
#[derive(Deserialize)]
pub struct EntitiesHistory(pub Vec<EntityHistory>);

/// States of a single entity, malformed ones are skipped.
#[must_use]
#[serde_as]
#[derive(Deserialize, derive_more::IntoIterator)]
pub struct EntityHistory(#[serde_as(as = "serde_with::VecSkipError<_>")] pub Vec<State>);

impl EntitiesHistory {
    /// Samples of the entity in chronological order.
    ///
    /// Without an entity ID, the first history is taken, which is what the API returns
    /// for a single filtered entity.
    pub fn into_samples(self, entity_id: Option<&str>) -> Vec<Sample> {
        let history = self.0.into_iter().find(|history| match entity_id {
            Some(entity_id) => {
                history.0.first().is_some_and(|state| state.entity_id.as_deref() == Some(entity_id))
            }
            None => true,
        });
        let mut samples: Vec<Sample> =
            history.into_iter().flatten().map(|state| state.to_sample()).collect();
        samples.sort_by_key(|sample| sample.timestamp);
        samples
    }
}

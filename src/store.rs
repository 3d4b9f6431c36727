use std::path::PathBuf;

use async_trait::async_trait;

use crate::{
    core::curve::{CurveState, Versioned},
    prelude::*,
};

/// Persistence of the aggregated curve.
#[async_trait]
pub trait Store: Send + Sync {
    /// Load the persisted state, or the empty one when there is nothing to load.
    async fn load(&self) -> Result<CurveState>;

    async fn save(&self, state: &CurveState) -> Result;
}

/// Pretty-printed JSON file.
pub struct JsonFileStore(PathBuf);

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }
}

#[async_trait]
impl Store for JsonFileStore {
    #[instrument(skip_all, fields(path = %self.0.display()))]
    async fn load(&self) -> Result<CurveState> {
        if !tokio::fs::try_exists(&self.0).await? {
            info!("no saved state yet");
            return Ok(CurveState::default());
        }
        let contents = tokio::fs::read(&self.0)
            .await
            .with_context(|| format!("failed to read `{}`", self.0.display()))?;
        let state = match serde_json::from_slice::<serde_json::Value>(&contents) {
            Ok(value @ serde_json::Value::Object(_)) => serde_json::from_value(value),
            Ok(_) => {
                error!("saved state is not an object, starting over");
                return Ok(CurveState::default());
            }
            Err(error) => Err(error),
        };
        Ok(state.unwrap_or_else(|error| {
            error!("malformed state, starting over: {error:#}");
            CurveState::default()
        }))
    }

    #[instrument(skip_all, fields(path = %self.0.display(), runs = state.runs))]
    async fn save(&self, state: &CurveState) -> Result {
        let contents = serde_json::to_vec_pretty(&Versioned::from(state))?;
        tokio::fs::write(&self.0, contents)
            .await
            .with_context(|| format!("failed to write `{}`", self.0.display()))?;
        debug!("saved");
        Ok(())
    }
}

#[cfg(test)]
pub use self::memory::MemoryStore;

#[cfg(test)]
mod memory {
    use std::sync::Mutex;

    use super::*;

    /// Keeps the serialized state in memory, so that the round trip is still exercised.
    #[derive(Default)]
    pub struct MemoryStore(Mutex<Option<String>>);

    impl MemoryStore {
        pub fn saved(&self) -> Option<String> {
            self.0.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Store for MemoryStore {
        async fn load(&self) -> Result<CurveState> {
            match self.saved() {
                Some(saved) => Ok(serde_json::from_str(&saved)?),
                None => Ok(CurveState::default()),
            }
        }

        async fn save(&self, state: &CurveState) -> Result {
            *self.0.lock().unwrap() = Some(serde_json::to_string(&Versioned::from(state))?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::process;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::quantity::energy::KilowattHours;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("powercurve-{}-{name}.json", process::id()))
    }

    fn state() -> CurveState {
        CurveState {
            runs: 2,
            mean_kwh_per_interval: vec![KilowattHours(0.05), KilowattHours(0.125)],
            bucket_counts: vec![2, 1],
            last_run_kwh_per_interval: vec![KilowattHours(0.1)],
            last_run_total_kwh: KilowattHours(0.1),
            last_run_duration_minutes: 3,
            last_updated: Some(Utc.with_ymd_and_hms(2026, 1, 22, 10, 5, 0).unwrap()),
        }
    }

    #[tokio::test]
    async fn test_json_file_round_trip() -> Result {
        let path = temp_path("round-trip");
        let store = JsonFileStore::new(&path);
        store.save(&state()).await?;
        let loaded = store.load().await;
        tokio::fs::remove_file(&path).await?;
        assert_eq!(loaded?, state());
        Ok(())
    }

    #[tokio::test]
    async fn test_json_file_missing() -> Result {
        let store = JsonFileStore::new(temp_path("missing"));
        assert_eq!(store.load().await?, CurveState::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_json_file_malformed() -> Result {
        for (name, contents) in [("array", "[1, 2, 3]"), ("truncated", r#"{"runs": 1"#)] {
            let path = temp_path(name);
            tokio::fs::write(&path, contents).await?;
            let loaded = JsonFileStore::new(&path).load().await;
            tokio::fs::remove_file(&path).await?;
            assert_eq!(loaded?, CurveState::default(), "{name}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_json_file_keeps_runs_with_both_timestamp_names() -> Result {
        let path = temp_path("both-timestamps");
        let contents = r#"{"runs": 2, "last_updated": null, "last_updated_iso": "2026-01-22T10:05:00Z"}"#;
        tokio::fs::write(&path, contents).await?;
        let loaded = JsonFileStore::new(&path).load().await;
        tokio::fs::remove_file(&path).await?;
        let loaded = loaded?;
        assert_eq!(loaded.runs, 2);
        assert_eq!(loaded.last_updated, Some(Utc.with_ymd_and_hms(2026, 1, 22, 10, 5, 0).unwrap()));
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_then_load() -> Result {
        let store = MemoryStore::default();
        store.save(&state()).await?;
        store.save(&CurveState::default()).await?;
        assert_eq!(store.load().await?, CurveState::default());
        assert!(store.saved().unwrap().contains(r#""version":2"#));
        Ok(())
    }
}

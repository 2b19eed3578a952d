//! Lazily populated sensor directory
//!
//! The directory starts empty and fills itself from one bulk fetch on the
//! first lookup. Once populated it is never refreshed: sensors paired with the
//! gateway after that point stay unknown until the process restarts.

use crate::error::{DefluxError, Result};
use crate::sensors::{SensorFetcher, SensorId, SensorLookup, SensorMeta, Sensors, TypeLookup};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Cache of sensor metadata keyed by sensor id
pub struct SensorDirectory {
    fetcher: Arc<dyn SensorFetcher>,
    sensors: OnceCell<Sensors>,
}

impl SensorDirectory {
    /// Create an empty directory backed by the given fetcher
    pub fn new(fetcher: Arc<dyn SensorFetcher>) -> Self {
        Self {
            fetcher,
            sensors: OnceCell::new(),
        }
    }

    /// Whether a bulk fetch has succeeded
    pub fn is_populated(&self) -> bool {
        self.sensors.initialized()
    }

    /// Number of cached sensors, zero while unpopulated
    pub fn len(&self) -> usize {
        self.sensors.get().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the type tag of a sensor, populating the cache first if needed
    pub async fn lookup_type(&self, id: SensorId) -> Result<String> {
        self.get(id).await.map(|meta| meta.type_tag.clone())
    }

    /// Return the metadata of a sensor, populating the cache first if needed
    pub async fn lookup_sensor(&self, id: SensorId) -> Result<SensorMeta> {
        self.get(id).await.cloned()
    }

    async fn get(&self, id: SensorId) -> Result<&SensorMeta> {
        let sensors = self.populated().await?;
        sensors.get(&id).ok_or(DefluxError::NotFound(id))
    }

    /// Concurrent callers wait on a single in-flight fetch. A failed fetch
    /// leaves the cell empty so the next lookup tries again.
    async fn populated(&self) -> Result<&Sensors> {
        self.sensors
            .get_or_try_init(|| async {
                debug!("Populating sensor directory");
                match self.fetcher.fetch_all_sensors().await {
                    Ok(sensors) => {
                        info!(sensor_count = sensors.len(), "Sensor directory populated");
                        Ok(sensors)
                    }
                    Err(e) => {
                        warn!(error_kind = e.kind(), "Sensor directory population failed: {e}");
                        Err(DefluxError::PopulationFailed(Box::new(e)))
                    }
                }
            })
            .await
    }
}

impl std::fmt::Debug for SensorDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorDirectory")
            .field("populated", &self.is_populated())
            .field("sensors", &self.len())
            .finish()
    }
}

#[async_trait]
impl TypeLookup for SensorDirectory {
    async fn lookup_type(&self, id: SensorId) -> Result<String> {
        SensorDirectory::lookup_type(self, id).await
    }
}

#[async_trait]
impl SensorLookup for SensorDirectory {
    async fn lookup_sensor(&self, id: SensorId) -> Result<SensorMeta> {
        SensorDirectory::lookup_sensor(self, id).await
    }
}

//! Practice location directory. Locations appear through manual admin entry
//! or the first time an upstream sync mentions them, and are only ever
//! soft-deactivated.

use crate::error::{AnalyticsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: u64,
    /// The upstream system's identifier for this practice.
    pub external_id: String,
    pub name: String,
    pub address: Option<String>,
    pub patient_count: u64,
    pub last_sync_date: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Default)]
struct DirectoryInner {
    locations: Vec<Location>,
    next_id: u64,
}

#[derive(Default)]
pub struct LocationDirectory {
    inner: Mutex<DirectoryInner>,
}

impl LocationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, DirectoryInner>> {
        self.inner
            .lock()
            .map_err(|_| AnalyticsError::Persistence("location directory lock poisoned".to_string()))
    }

    pub fn register_manual(&self, external_id: &str, name: &str, address: Option<&str>) -> Result<Location> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner
            .locations
            .iter_mut()
            .find(|l| l.external_id == external_id)
        {
            existing.name = name.to_string();
            existing.address = address.map(|s| s.to_string());
            return Ok(existing.clone());
        }

        inner.next_id += 1;
        let location = Location {
            id: inner.next_id,
            external_id: external_id.to_string(),
            name: name.to_string(),
            address: address.map(|s| s.to_string()),
            patient_count: 0,
            last_sync_date: None,
            is_active: true,
        };
        inner.locations.push(location.clone());
        Ok(location)
    }

    /// Upsert on first sight during an upstream sync: creates the location if
    /// the external id is new, and stamps the sync time either way.
    pub fn record_sync(&self, external_id: &str, name: &str, patient_count: u64) -> Result<Location> {
        let mut inner = self.lock()?;
        let now = Utc::now();

        if let Some(existing) = inner
            .locations
            .iter_mut()
            .find(|l| l.external_id == external_id)
        {
            existing.patient_count = patient_count;
            existing.last_sync_date = Some(now);
            return Ok(existing.clone());
        }

        inner.next_id += 1;
        let location = Location {
            id: inner.next_id,
            external_id: external_id.to_string(),
            name: name.to_string(),
            address: None,
            patient_count,
            last_sync_date: Some(now),
            is_active: true,
        };
        inner.locations.push(location.clone());
        Ok(location)
    }

    /// Soft deactivation; the row stays for history. Returns false for an
    /// unknown id.
    pub fn deactivate(&self, id: u64) -> Result<bool> {
        let mut inner = self.lock()?;
        match inner.locations.iter_mut().find(|l| l.id == id) {
            Some(location) => {
                location.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn active(&self) -> Result<Vec<Location>> {
        let inner = self.lock()?;
        Ok(inner
            .locations
            .iter()
            .filter(|l| l.is_active)
            .cloned()
            .collect())
    }

    pub fn all(&self) -> Result<Vec<Location>> {
        let inner = self.lock()?;
        Ok(inner.locations.clone())
    }
}

//! In-memory block storage service.
//!
//! New volumes report `creating` and then advance one status per
//! `get_volume` call along the configured progression (default: straight to
//! `available`).

use crate::call_log::{CallLog, FailurePlan, InjectedFailure};
use async_trait::async_trait;
use cloud_tests::adapters::VolumeApi;
use cloud_tests::models::{Volume, VolumeCreateRequest};
use common::error::{CloudError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct VolumeRecord {
    volume: Volume,
    pending: VecDeque<String>,
    request: VolumeCreateRequest,
}

#[derive(Debug)]
struct MockVolumeInner {
    next_id: u64,
    volumes: HashMap<String, VolumeRecord>,
    statuses: Vec<String>,
    failures: FailurePlan,
}

impl Default for MockVolumeInner {
    fn default() -> Self {
        Self {
            next_id: 0,
            volumes: HashMap::new(),
            statuses: vec!["creating".to_string(), "available".to_string()],
            failures: FailurePlan::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockVolume {
    inner: Arc<Mutex<MockVolumeInner>>,
    log: CallLog,
}

impl MockVolume {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    /// Status sequence of a new volume, starting with the create response.
    #[must_use]
    pub fn with_statuses(self, statuses: &[&str]) -> Self {
        self.inner.lock().unwrap().statuses = statuses.iter().map(|s| (*s).to_string()).collect();
        self
    }

    #[must_use]
    pub fn fail_on(self, operation: &str, failure: InjectedFailure) -> Self {
        self.inner.lock().unwrap().failures.insert(operation, failure);
        self
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.log.count(operation)
    }

    pub fn volume_count(&self) -> usize {
        self.inner.lock().unwrap().volumes.len()
    }

    /// Create request a volume was made from.
    pub fn create_request(&self, volume_id: &str) -> Option<VolumeCreateRequest> {
        let inner = self.inner.lock().unwrap();
        inner.volumes.get(volume_id).map(|r| r.request.clone())
    }

    fn begin(&self, operation: &str, resource: &str) -> Result<MutexGuard<'_, MockVolumeInner>> {
        self.log.record(format!("{operation}:{resource}"));
        let inner = self.inner.lock().unwrap();
        inner.failures.check(operation)?;
        Ok(inner)
    }
}

#[async_trait]
impl VolumeApi for MockVolume {
    async fn create_volume(&self, request: &VolumeCreateRequest) -> Result<Volume> {
        let mut inner = self.begin("create_volume", &request.name)?;
        inner.next_id += 1;
        let id = format!("volume-{}", inner.next_id);

        let mut pending: VecDeque<String> = inner.statuses.iter().cloned().collect();
        let status = pending.pop_front().unwrap_or_else(|| "available".to_string());
        let volume = Volume {
            id: id.clone(),
            status,
            size: Some(request.size),
        };
        inner.volumes.insert(
            id,
            VolumeRecord {
                volume: volume.clone(),
                pending,
                request: request.clone(),
            },
        );
        Ok(volume)
    }

    async fn get_volume(&self, volume_id: &str) -> Result<Volume> {
        let mut inner = self.begin("get_volume", volume_id)?;
        let record = inner
            .volumes
            .get_mut(volume_id)
            .ok_or_else(|| {
                CloudError::NotFound(format!("Volume {volume_id} could not be found."))
            })?;
        if let Some(next) = record.pending.pop_front() {
            record.volume.status = next;
        }
        Ok(record.volume.clone())
    }

    async fn delete_volume(&self, volume_id: &str) -> Result<()> {
        let mut inner = self.begin("delete_volume", volume_id)?;
        inner
            .volumes
            .remove(volume_id)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(format!("Volume {volume_id} could not be found.")))
    }
}

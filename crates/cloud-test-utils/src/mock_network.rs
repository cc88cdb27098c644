//! In-memory floating IP service.

use crate::call_log::{CallLog, FailurePlan, InjectedFailure};
use async_trait::async_trait;
use cloud_tests::adapters::NetworkApi;
use cloud_tests::models::FloatingIp;
use common::error::{CloudError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct FloatingIpRecord {
    floating_ip: FloatingIp,
    pool: Option<String>,
    server_id: Option<String>,
}

#[derive(Debug, Default)]
struct MockNetworkInner {
    next_id: u64,
    floating_ips: HashMap<String, FloatingIpRecord>,
    failures: FailurePlan,
}

/// Mock floating IP allocation; addresses are `172.24.4.<n>`.
#[derive(Debug, Clone, Default)]
pub struct MockNetwork {
    inner: Arc<Mutex<MockNetworkInner>>,
    log: CallLog,
}

impl MockNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.log = log;
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

    /// Server the address is associated with, if any.
    pub fn associated_server(&self, address: &str) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .floating_ips
            .values()
            .find(|r| r.floating_ip.ip == address)
            .and_then(|r| r.server_id.clone())
    }

    /// Pool a floating IP was allocated from.
    pub fn pool_of(&self, floating_ip_id: &str) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .floating_ips
            .get(floating_ip_id)
            .and_then(|r| r.pool.clone())
    }

    pub fn floating_ip_count(&self) -> usize {
        self.inner.lock().unwrap().floating_ips.len()
    }

    fn begin(&self, operation: &str, resource: &str) -> Result<MutexGuard<'_, MockNetworkInner>> {
        self.log.record(format!("{operation}:{resource}"));
        let inner = self.inner.lock().unwrap();
        inner.failures.check(operation)?;
        Ok(inner)
    }
}

#[async_trait]
impl NetworkApi for MockNetwork {
    async fn create_floating_ip(&self, pool: Option<&str>) -> Result<FloatingIp> {
        let mut inner = self.begin("create_floating_ip", pool.unwrap_or("default"))?;
        inner.next_id += 1;
        let floating_ip = FloatingIp {
            id: format!("fip-{}", inner.next_id),
            ip: format!("172.24.4.{}", inner.next_id),
        };
        inner.floating_ips.insert(
            floating_ip.id.clone(),
            FloatingIpRecord {
                floating_ip: floating_ip.clone(),
                pool: pool.map(str::to_string),
                server_id: None,
            },
        );
        Ok(floating_ip)
    }

    async fn associate_floating_ip(&self, address: &str, server_id: &str) -> Result<()> {
        let mut inner = self.begin("associate_floating_ip", address)?;
        let record = inner
            .floating_ips
            .values_mut()
            .find(|r| r.floating_ip.ip == address)
            .ok_or_else(|| CloudError::NotFound(format!("floating ip {address} not found")))?;
        record.server_id = Some(server_id.to_string());
        Ok(())
    }

    async fn delete_floating_ip(&self, floating_ip_id: &str) -> Result<()> {
        let mut inner = self.begin("delete_floating_ip", floating_ip_id)?;
        inner
            .floating_ips
            .remove(floating_ip_id)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(format!("floating ip {floating_ip_id} not found")))
    }
}

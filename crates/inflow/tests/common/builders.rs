//! Recording and fault-injecting test doubles shared by the integration
//! tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use inflow::{
    BrokerError, CheckError, CheckResult, HarvestError, HarvestRecord, Harvester,
    NotificationSummary, Notifier, NotifyError, Recipient, RemoteFile, StorageBroker,
};

/// Harvester that records every ingest/remove call.
#[derive(Default)]
pub struct RecordingHarvester {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingHarvester {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Harvester for RecordingHarvester {
    fn name(&self) -> &str {
        "recording"
    }

    fn ingest(&self, records: &[HarvestRecord]) -> Result<(), HarvestError> {
        let mut calls = self.calls.lock().unwrap();
        for r in records {
            calls.push(format!("ingest:{}", r.dest_path));
        }
        Ok(())
    }

    fn remove(&self, records: &[HarvestRecord]) -> Result<(), HarvestError> {
        let mut calls = self.calls.lock().unwrap();
        for r in records {
            calls.push(format!("remove:{}", r.dest_path));
        }
        Ok(())
    }
}

/// Notifier that records every delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Vec<Recipient>, NotificationSummary)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn summaries(&self) -> Vec<NotificationSummary> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, s)| s.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn send(
        &self,
        recipients: &[Recipient],
        summary: &NotificationSummary,
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipients.to_vec(), summary.clone()));
        Ok(())
    }
}

/// Wraps a real broker and fails `put` for configured remote paths.
pub struct FailingBroker {
    inner: Box<dyn StorageBroker>,
    fail_put: Vec<String>,
}

impl FailingBroker {
    pub fn new(inner: Box<dyn StorageBroker>, fail_put: &[&str]) -> Self {
        Self {
            inner,
            fail_put: fail_put.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl StorageBroker for FailingBroker {
    fn put(&self, local: &Path, remote: &str) -> Result<(), BrokerError> {
        if self.fail_put.iter().any(|r| r == remote) {
            return Err(BrokerError::Permanent {
                operation: "put",
                target: remote.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.inner.put(local, remote)
    }

    fn delete(&self, remote: &str) -> Result<(), BrokerError> {
        self.inner.delete(remote)
    }

    fn exists(&self, remote: &str) -> Result<bool, BrokerError> {
        self.inner.exists(remote)
    }

    fn query(&self, prefix: &str) -> Result<Vec<RemoteFile>, BrokerError> {
        self.inner.query(prefix)
    }
}

/// Compliance suite that fails any file whose content contains a marker.
pub struct MarkerSuite {
    name: String,
    marker: Vec<u8>,
}

impl MarkerSuite {
    pub fn new(name: &str, marker: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            marker: marker.to_vec(),
        })
    }
}

impl inflow::check::CheckSuite for MarkerSuite {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, path: &Path) -> Result<CheckResult, CheckError> {
        let content = std::fs::read(path).map_err(|e| CheckError::ReadFailure {
            path: path.to_path_buf(),
            source: e,
        })?;
        let violation = content
            .windows(self.marker.len().max(1))
            .any(|w| w == self.marker.as_slice());
        if violation {
            Ok(CheckResult::failed(vec![format!(
                "{}: content violates suite criteria",
                self.name
            )]))
        } else {
            Ok(CheckResult::passed())
        }
    }
}

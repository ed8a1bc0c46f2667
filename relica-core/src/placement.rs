use crate::identity::FileId;
use crate::naming::{FileRegistration, LocationRegistration, NamingService};
use crate::replication::ReplicationOutcome;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What the origin node knows about a finished original write.
#[derive(Debug, Clone)]
pub struct PlacementReport {
    pub file_id: FileId,
    pub original_filename: String,
    pub size_bytes: u64,
    pub checksum_sha256: String,
    pub replication: ReplicationOutcome,
}

/// How far registration got. Only used for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlacementSummary {
    pub registered: bool,
    pub locations_registered: usize,
}

/// Tells the naming service where a file ended up. Failures are logged and
/// swallowed.
#[derive(Clone)]
pub struct PlacementReporter {
    naming: Arc<dyn NamingService>,
    origin_node_id: String,
}

impl PlacementReporter {
    pub fn new(naming: Arc<dyn NamingService>, origin_node_id: impl Into<String>) -> Self {
        Self {
            naming,
            origin_node_id: origin_node_id.into(),
        }
    }

    /// Report on a background task. The upload response never waits for the
    /// naming service; dropping the handle leaves the task running.
    pub fn spawn_report(&self, report: PlacementReport) -> JoinHandle<PlacementSummary> {
        let reporter = self.clone();
        tokio::spawn(async move { reporter.report(&report).await })
    }

    pub async fn report(&self, report: &PlacementReport) -> PlacementSummary {
        let mut summary = PlacementSummary::default();

        let registration = FileRegistration {
            file_key: report.file_id.to_string(),
            original_filename: report.original_filename.clone(),
            size_bytes: report.size_bytes,
            checksum_sha256: report.checksum_sha256.clone(),
            node_id: self.origin_node_id.clone(),
            failed_nodes: report.replication.failed.iter().cloned().collect(),
        };

        match self.naming.register(&registration).await {
            Ok(()) => summary.registered = true,
            Err(e) => tracing::warn!(
                "Failed to register {} with naming service: {}",
                report.file_id,
                e
            ),
        }

        for node_id in &report.replication.succeeded {
            let location = LocationRegistration {
                file_key: report.file_id.to_string(),
                node_id: node_id.clone(),
            };
            match self.naming.register_location(&location).await {
                Ok(()) => summary.locations_registered += 1,
                Err(e) => tracing::warn!(
                    "Failed to register location {} for {}: {}",
                    node_id,
                    report.file_id,
                    e
                ),
            }
        }

        tracing::debug!(
            "Placement of {} reported: registered={} locations={}",
            report.file_id,
            summary.registered,
            summary.locations_registered
        );
        summary
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{RelicaError, Result};
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    /// Records every call; optionally rejects `register`.
    #[derive(Default)]
    pub(crate) struct RecordingNaming {
        pub registrations: Mutex<Vec<FileRegistration>>,
        pub locations: Mutex<Vec<LocationRegistration>>,
        pub reject_register: bool,
    }

    #[async_trait]
    impl NamingService for RecordingNaming {
        async fn register(&self, registration: &FileRegistration) -> Result<()> {
            self.registrations.lock().unwrap().push(registration.clone());
            if self.reject_register {
                return Err(RelicaError::NamingRejected {
                    endpoint: "/files/register".to_string(),
                    status: 503,
                });
            }
            Ok(())
        }

        async fn register_location(&self, location: &LocationRegistration) -> Result<()> {
            self.locations.lock().unwrap().push(location.clone());
            Ok(())
        }
    }

    fn report() -> PlacementReport {
        PlacementReport {
            file_id: FileId::parse("file-1").unwrap(),
            original_filename: "a.txt".to_string(),
            size_bytes: 5,
            checksum_sha256: crate::compute_hash(b"hello"),
            replication: ReplicationOutcome {
                succeeded: BTreeSet::from(["sn-2".to_string()]),
                failed: BTreeSet::from(["sn-3".to_string()]),
                errors: Default::default(),
            },
        }
    }

    #[tokio::test]
    async fn test_report_registers_file_and_successful_locations() {
        let naming = Arc::new(RecordingNaming::default());
        let reporter = PlacementReporter::new(naming.clone(), "sn-1");

        let summary = reporter.report(&report()).await;
        assert_eq!(
            summary,
            PlacementSummary {
                registered: true,
                locations_registered: 1
            }
        );

        let registrations = naming.registrations.lock().unwrap();
        assert_eq!(registrations.len(), 1);
        assert_eq!(registrations[0].node_id, "sn-1");
        assert_eq!(registrations[0].failed_nodes, vec!["sn-3".to_string()]);

        let locations = naming.locations.lock().unwrap();
        assert_eq!(
            *locations,
            vec![LocationRegistration {
                file_key: "file-1".to_string(),
                node_id: "sn-2".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_register_failure_is_swallowed() {
        let naming = Arc::new(RecordingNaming {
            reject_register: true,
            ..Default::default()
        });
        let reporter = PlacementReporter::new(naming.clone(), "sn-1");

        let summary = reporter.report(&report()).await;
        assert!(!summary.registered);
        assert_eq!(summary.locations_registered, 1);
    }

    #[tokio::test]
    async fn test_spawned_report_runs_to_completion() {
        let naming = Arc::new(RecordingNaming::default());
        let reporter = PlacementReporter::new(naming.clone(), "sn-1");

        let summary = reporter.spawn_report(report()).await.unwrap();
        assert!(summary.registered);
        assert_eq!(naming.registrations.lock().unwrap().len(), 1);
        assert_eq!(naming.locations.lock().unwrap().len(), 1);
    }
}

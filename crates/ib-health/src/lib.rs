//! Composite health aggregation.
//!
//! Components register once at startup and afterwards mutate only their own
//! status; [`HealthRegistry::snapshot`] folds everything into one composite
//! view on demand. Nothing is cached: every query recomputes the global
//! status, memory usage, per-component details and per-peer configuration
//! classification.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};

use ib_common::{HealthStatus, MonitoredComponent};

// ============================================================================
// Peer Services
// ============================================================================

/// A peer service this instance talks to, as configured. Only the presence of
/// the endpoint and credential matters for the snapshot; the aggregator never
/// calls the peer.
#[derive(Debug, Clone)]
pub struct PeerService {
    pub name: String,
    pub url: Option<String>,
    pub auth_key: Option<String>,
}

/// Configuration completeness of a peer service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PeerStatus {
    #[serde(rename = "configured")]
    Configured,
    #[serde(rename = "configuredWithoutAuthKey")]
    ConfiguredWithoutAuthKey,
    #[serde(rename = "urlMissing")]
    UrlMissing,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.is_empty())
}

fn classify_peer(peer: &PeerService) -> PeerStatus {
    if present(&peer.url) && present(&peer.auth_key) {
        PeerStatus::Configured
    } else if present(&peer.url) {
        PeerStatus::ConfiguredWithoutAuthKey
    } else {
        PeerStatus::UrlMissing
    }
}

// ============================================================================
// Snapshot Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ComponentDetail {
    pub status: HealthStatus,
    pub message: Option<String>,
}

/// The composite health view served to external monitors. Recomputed on
/// every query, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub version: String,
    pub memory: String,
    pub details: BTreeMap<String, ComponentDetail>,
    pub microservices: BTreeMap<String, PeerStatus>,
}

// ============================================================================
// Registry
// ============================================================================

/// Process-wide health registry.
///
/// Registration is append-only and happens at startup; there is deliberately
/// no deduplication, so a component may report twice under different aspects.
/// Each registered component is the sole writer of its own status, which is
/// why snapshot reads need no cross-entry coordination.
pub struct HealthRegistry {
    components: RwLock<Vec<Arc<dyn MonitoredComponent>>>,
    peers: RwLock<Vec<PeerService>>,
    version: String,
}

impl HealthRegistry {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            components: RwLock::new(Vec::new()),
            peers: RwLock::new(Vec::new()),
            version: version.into(),
        }
    }

    /// Registers a component to be monitored. Returns the new registry size.
    pub fn register_component(&self, component: Arc<dyn MonitoredComponent>) -> usize {
        let mut components = self.components.write();
        components.push(component);
        components.len()
    }

    /// Registers a peer service for configuration-completeness reporting.
    pub fn register_peer(&self, peer: PeerService) {
        self.peers.write().push(peer);
    }

    /// Computes the composite snapshot.
    pub fn snapshot(&self) -> HealthSnapshot {
        let components = self.components.read();

        // Left-to-right fold, first Fail wins outright.
        let mut global = HealthStatus::Pass;
        for component in components.iter() {
            match component.status() {
                HealthStatus::Fail => {
                    global = HealthStatus::Fail;
                    break;
                }
                HealthStatus::Warn => global = HealthStatus::Warn,
                HealthStatus::Pass => {}
            }
        }

        let details = components
            .iter()
            .map(|c| {
                (
                    c.name().to_string(),
                    ComponentDetail {
                        status: c.status(),
                        message: c.error_message(),
                    },
                )
            })
            .collect();

        let microservices = self
            .peers
            .read()
            .iter()
            .map(|p| (p.name.clone(), classify_peer(p)))
            .collect();

        HealthSnapshot {
            status: global,
            version: self.version.clone(),
            memory: format!("{} MB", resident_memory_mb()),
            details,
            microservices,
        }
    }
}

/// Resident memory of the current process, floored to whole megabytes.
fn resident_memory_mb() -> u64 {
    let pid = Pid::from_u32(std::process::id());
    let mut system = System::new();
    if system.refresh_process(pid) {
        system.process(pid).map(|p| p.memory()).unwrap_or(0) / 1024 / 1024
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct FakeComponent {
        name: String,
        status: Mutex<HealthStatus>,
        message: Mutex<Option<String>>,
    }

    impl FakeComponent {
        fn new(name: &str, status: HealthStatus, message: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                status: Mutex::new(status),
                message: Mutex::new(message.map(str::to_string)),
            })
        }
    }

    impl MonitoredComponent for FakeComponent {
        fn name(&self) -> &str {
            &self.name
        }

        fn status(&self) -> HealthStatus {
            *self.status.lock()
        }

        fn error_message(&self) -> Option<String> {
            self.message.lock().clone()
        }
    }

    fn registry_with(statuses: &[(&str, HealthStatus)]) -> HealthRegistry {
        let registry = HealthRegistry::new("1.0.0");
        for (name, status) in statuses {
            registry.register_component(FakeComponent::new(name, *status, None));
        }
        registry
    }

    #[test]
    fn empty_registry_is_passing() {
        assert_eq!(registry_with(&[]).snapshot().status, HealthStatus::Pass);
    }

    #[test]
    fn all_pass_folds_to_pass() {
        let registry = registry_with(&[
            ("a", HealthStatus::Pass),
            ("b", HealthStatus::Pass),
            ("c", HealthStatus::Pass),
        ]);
        assert_eq!(registry.snapshot().status, HealthStatus::Pass);
    }

    #[test]
    fn single_warn_escalates_to_warn() {
        let registry = registry_with(&[
            ("a", HealthStatus::Pass),
            ("b", HealthStatus::Warn),
            ("c", HealthStatus::Pass),
        ]);
        assert_eq!(registry.snapshot().status, HealthStatus::Warn);
    }

    #[test]
    fn any_fail_wins_outright() {
        let registry = registry_with(&[
            ("a", HealthStatus::Pass),
            ("b", HealthStatus::Fail),
            ("c", HealthStatus::Warn),
        ]);
        assert_eq!(registry.snapshot().status, HealthStatus::Fail);
    }

    #[test]
    fn details_carry_status_and_message() {
        let registry = HealthRegistry::new("1.0.0");
        registry.register_component(FakeComponent::new("rabbitmq", HealthStatus::Warn, Some("connection refused")));

        let snapshot = registry.snapshot();
        let detail = &snapshot.details["rabbitmq"];
        assert_eq!(detail.status, HealthStatus::Warn);
        assert_eq!(detail.message.as_deref(), Some("connection refused"));
    }

    #[test]
    fn version_is_reported() {
        let registry = HealthRegistry::new("2.0.0");
        assert_eq!(registry.snapshot().version, "2.0.0");
    }

    #[test]
    fn memory_is_rendered_in_megabytes() {
        let snapshot = HealthRegistry::new("1.0.0").snapshot();
        assert!(snapshot.memory.ends_with(" MB"), "got {}", snapshot.memory);
    }

    fn peer(url: Option<&str>, auth_key: Option<&str>) -> PeerService {
        PeerService {
            name: "ms-users-db".to_string(),
            url: url.map(str::to_string),
            auth_key: auth_key.map(str::to_string),
        }
    }

    #[test]
    fn peer_with_url_and_key_is_configured() {
        assert_eq!(classify_peer(&peer(Some("https://ms"), Some("key"))), PeerStatus::Configured);
    }

    #[test]
    fn peer_with_url_only_is_configured_without_auth_key() {
        assert_eq!(
            classify_peer(&peer(Some("https://ms"), None)),
            PeerStatus::ConfiguredWithoutAuthKey
        );
        assert_eq!(
            classify_peer(&peer(Some("https://ms"), Some(""))),
            PeerStatus::ConfiguredWithoutAuthKey
        );
    }

    #[test]
    fn peer_without_url_is_url_missing_regardless_of_key() {
        assert_eq!(classify_peer(&peer(None, Some("key"))), PeerStatus::UrlMissing);
        assert_eq!(classify_peer(&peer(Some(""), None)), PeerStatus::UrlMissing);
    }

    #[test]
    fn snapshot_serializes_to_the_external_contract() {
        let registry = HealthRegistry::new("1.2.3");
        registry.register_component(FakeComponent::new("rabbitmq", HealthStatus::Pass, None));
        registry.register_peer(peer(Some("https://ms"), None));

        let json = serde_json::to_value(registry.snapshot()).unwrap();
        assert_eq!(json["status"], "pass");
        assert_eq!(json["version"], "1.2.3");
        assert_eq!(json["details"]["rabbitmq"]["status"], "pass");
        assert_eq!(json["microservices"]["ms-users-db"], "configuredWithoutAuthKey");
    }
}

//! Read-only resource probes.

use crate::adapters::{AdapterResult, ClusterAdapter, KubeAdapter, PodSummary, ReleaseAdapter};
use crate::core::{ResourceId, ResourceState};
use crate::errors::AdapterError;
use async_trait::async_trait;
use std::sync::Arc;

/// Observes the current state of one external resource.
///
/// Implementations must not mutate anything.
#[async_trait]
pub trait ResourceProbe: Send + Sync {
    /// Returns the resource's current state.
    async fn probe(&self, resource: &ResourceId) -> AdapterResult<ResourceState>;
}

/// Probes a managed cluster.
pub struct ClusterProbe {
    adapter: Arc<dyn ClusterAdapter>,
}

impl ClusterProbe {
    /// Creates a cluster probe.
    #[must_use]
    pub fn new(adapter: Arc<dyn ClusterAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl ResourceProbe for ClusterProbe {
    async fn probe(&self, resource: &ResourceId) -> AdapterResult<ResourceState> {
        let (project, zone) = resource
            .zone()
            .ok_or_else(|| AdapterError::new("probe cluster", format!("{resource} has no zone")))?;
        if !self.adapter.cluster_exists(project, zone, &resource.name).await? {
            return Ok(ResourceState::Absent);
        }
        self.adapter.cluster_status(project, zone, &resource.name).await
    }
}

/// Probes a release and the pods it owns.
///
/// A deployed release is only `Ready` once `expected_pods` pods matching
/// `selector` report ready.
pub struct ReleaseProbe {
    releases: Arc<dyn ReleaseAdapter>,
    kube: Arc<dyn KubeAdapter>,
    selector: String,
    expected_pods: u32,
}

impl ReleaseProbe {
    /// Creates a release probe.
    #[must_use]
    pub fn new(
        releases: Arc<dyn ReleaseAdapter>,
        kube: Arc<dyn KubeAdapter>,
        selector: impl Into<String>,
        expected_pods: u32,
    ) -> Self {
        Self {
            releases,
            kube,
            selector: selector.into(),
            expected_pods,
        }
    }

    /// Returns the pod selector.
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }
}

#[async_trait]
impl ResourceProbe for ReleaseProbe {
    async fn probe(&self, resource: &ResourceId) -> AdapterResult<ResourceState> {
        let namespace = namespace_of(resource)?;
        if !self.releases.release_exists(namespace, &resource.name).await? {
            return Ok(ResourceState::Absent);
        }
        match self.releases.release_status(namespace, &resource.name).await? {
            ResourceState::Ready => {}
            // Includes releases uninstalled with their history kept.
            other => return Ok(other),
        }

        let pods = self.kube.pods_ready(namespace, &self.selector).await?;
        Ok(pods_state(pods, self.expected_pods))
    }
}

fn pods_state(pods: PodSummary, expected: u32) -> ResourceState {
    if pods.failed > 0 {
        ResourceState::failed(pods.to_string())
    } else if pods.ready >= expected {
        ResourceState::Ready
    } else {
        ResourceState::pending(format!("{}/{} pods ready", pods.ready, expected))
    }
}

/// Probes a batch job through its pods.
///
/// The job is ready once any pod is running or has completed.
pub struct JobProbe {
    kube: Arc<dyn KubeAdapter>,
}

impl JobProbe {
    /// Creates a job probe.
    #[must_use]
    pub fn new(kube: Arc<dyn KubeAdapter>) -> Self {
        Self { kube }
    }
}

#[async_trait]
impl ResourceProbe for JobProbe {
    async fn probe(&self, resource: &ResourceId) -> AdapterResult<ResourceState> {
        let namespace = namespace_of(resource)?;
        if !self.kube.object_exists(namespace, "job", &resource.name).await? {
            return Ok(ResourceState::Absent);
        }
        let pods = self
            .kube
            .pods_ready(namespace, &format!("job-name={}", resource.name))
            .await?;
        if pods.ready > 0 || pods.succeeded > 0 {
            Ok(ResourceState::Ready)
        } else if pods.failed > 0 {
            Ok(ResourceState::failed(pods.to_string()))
        } else {
            Ok(ResourceState::pending(format!("{} pods scheduled", pods.total)))
        }
    }
}

fn namespace_of(resource: &ResourceId) -> AdapterResult<&str> {
    resource
        .namespace()
        .ok_or_else(|| AdapterError::new("probe", format!("{resource} is not namespaced")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockClusterAdapter, MockKubeAdapter, MockReleaseAdapter};
    use mockall::predicate::eq;

    fn summary(total: u32, ready: u32, failed: u32) -> PodSummary {
        PodSummary {
            total,
            ready,
            succeeded: 0,
            failed,
        }
    }

    #[tokio::test]
    async fn test_cluster_probe_absent_skips_status() {
        let mut cluster = MockClusterAdapter::new();
        cluster
            .expect_cluster_exists()
            .with(eq("proj"), eq("zone-a"), eq("voltsp"))
            .times(1)
            .returning(|_, _, _| Ok(false));
        cluster.expect_cluster_status().never();

        let probe = ClusterProbe::new(Arc::new(cluster));
        let state = probe
            .probe(&ResourceId::cluster("proj", "zone-a", "voltsp"))
            .await
            .unwrap();
        assert_eq!(state, ResourceState::Absent);
    }

    #[tokio::test]
    async fn test_cluster_probe_reports_status() {
        let mut cluster = MockClusterAdapter::new();
        cluster.expect_cluster_exists().returning(|_, _, _| Ok(true));
        cluster
            .expect_cluster_status()
            .returning(|_, _, _| Ok(ResourceState::pending("PROVISIONING")));

        let probe = ClusterProbe::new(Arc::new(cluster));
        let state = probe
            .probe(&ResourceId::cluster("proj", "zone-a", "voltsp"))
            .await
            .unwrap();
        assert_eq!(state, ResourceState::pending("PROVISIONING"));
    }

    #[tokio::test]
    async fn test_release_probe_distinguishes_pending_and_failed() {
        let mut releases = MockReleaseAdapter::new();
        releases.expect_release_exists().returning(|_, _| Ok(true));
        releases
            .expect_release_status()
            .returning(|_, _| Ok(ResourceState::Ready));

        let mut kube = MockKubeAdapter::new();
        let mut calls = 0;
        kube.expect_pods_ready()
            .with(eq("default"), eq("app=broker"))
            .returning(move |_, _| {
                calls += 1;
                Ok(match calls {
                    1 => summary(3, 1, 0),
                    2 => summary(3, 2, 1),
                    _ => summary(3, 3, 0),
                })
            });

        let probe = ReleaseProbe::new(Arc::new(releases), Arc::new(kube), "app=broker", 3);
        let resource = ResourceId::release("default", "redpanda-cluster");

        assert_eq!(
            probe.probe(&resource).await.unwrap(),
            ResourceState::pending("1/3 pods ready")
        );
        assert!(matches!(
            probe.probe(&resource).await.unwrap(),
            ResourceState::Failed { .. }
        ));
        assert_eq!(probe.probe(&resource).await.unwrap(), ResourceState::Ready);
    }

    #[tokio::test]
    async fn test_release_probe_absent_release() {
        let mut releases = MockReleaseAdapter::new();
        releases.expect_release_exists().returning(|_, _| Ok(false));
        releases.expect_release_status().never();
        let mut kube = MockKubeAdapter::new();
        kube.expect_pods_ready().never();

        let probe = ReleaseProbe::new(Arc::new(releases), Arc::new(kube), "app=db", 1);
        let state = probe
            .probe(&ResourceId::release("voltdb", "volt-vwap"))
            .await
            .unwrap();
        assert_eq!(state, ResourceState::Absent);
    }

    #[tokio::test]
    async fn test_release_probe_uninstalled_release_is_absent() {
        let mut releases = MockReleaseAdapter::new();
        releases.expect_release_exists().returning(|_, _| Ok(true));
        releases
            .expect_release_status()
            .returning(|_, _| Ok(ResourceState::Absent));
        let mut kube = MockKubeAdapter::new();
        kube.expect_pods_ready().never();

        let probe = ReleaseProbe::new(Arc::new(releases), Arc::new(kube), "app=db", 1);
        let state = probe
            .probe(&ResourceId::release("voltdb", "volt-vwap"))
            .await
            .unwrap();
        assert_eq!(state, ResourceState::Absent);
    }

    #[tokio::test]
    async fn test_release_probe_failed_release_status() {
        let mut releases = MockReleaseAdapter::new();
        releases.expect_release_exists().returning(|_, _| Ok(true));
        releases
            .expect_release_status()
            .returning(|_, _| Ok(ResourceState::failed("STATUS: failed")));
        let mut kube = MockKubeAdapter::new();
        kube.expect_pods_ready().never();

        let probe = ReleaseProbe::new(Arc::new(releases), Arc::new(kube), "app=db", 1);
        let state = probe
            .probe(&ResourceId::release("voltdb", "volt-vwap"))
            .await
            .unwrap();
        assert_eq!(state, ResourceState::failed("STATUS: failed"));
    }

    #[tokio::test]
    async fn test_job_probe_states() {
        let mut kube = MockKubeAdapter::new();
        kube.expect_object_exists()
            .with(eq("voltsp"), eq("job"), eq("vwap-loadgen"))
            .returning(|_, _, _| Ok(true));
        kube.expect_pods_ready()
            .with(eq("voltsp"), eq("job-name=vwap-loadgen"))
            .returning(|_, _| Ok(summary(1, 1, 0)));

        let probe = JobProbe::new(Arc::new(kube));
        let state = probe
            .probe(&ResourceId::job("voltsp", "vwap-loadgen"))
            .await
            .unwrap();
        assert_eq!(state, ResourceState::Ready);
    }

    #[tokio::test]
    async fn test_probe_rejects_unscoped_resource() {
        let probe = JobProbe::new(Arc::new(MockKubeAdapter::new()));
        let err = probe
            .probe(&ResourceId::cluster("p", "z", "n"))
            .await
            .unwrap_err();
        assert!(err.diagnostic.contains("not namespaced"));
    }
}

//! In-process [`PlatformClient`] for tests.
//!
//! Keeps a single environment of services in memory, counts calls per
//! operation, and lets tests script status sequences and inject failures.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::status::DeploymentStatus;
use crate::traits::{
    Ack, PlatformClient, PlatformError, ServiceCreateInput, ServiceHandle, ServiceStatus,
    ServiceSummary,
};

#[derive(Debug, Clone)]
struct MockService {
    name: String,
    project_id: String,
    deployment: Option<(String, DeploymentStatus)>,
}

#[derive(Default)]
struct MockState {
    services: BTreeMap<String, MockService>,
    scripted: HashMap<String, VecDeque<Result<DeploymentStatus, PlatformError>>>,
    stop_failures: VecDeque<PlatformError>,
    delete_failures: VecDeque<PlatformError>,
    stopped: Vec<String>,
    deleted: Vec<String>,
    next_id: usize,
}

#[derive(Default)]
struct Counters {
    create: AtomicUsize,
    deploy: AtomicUsize,
    stop: AtomicUsize,
    delete: AtomicUsize,
    status: AtomicUsize,
    list: AtomicUsize,
}

/// A mock platform with per-operation call counters.
#[derive(Default)]
pub struct MockPlatform {
    state: Mutex<MockState>,
    calls: Counters,
    delay: Option<Duration>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long at the start of every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Register a service, optionally with a latest deployment.
    pub fn add_service(
        &self,
        service_id: &str,
        name: &str,
        deployment: Option<(&str, DeploymentStatus)>,
    ) {
        self.state.lock().unwrap().services.insert(
            service_id.to_string(),
            MockService {
                name: name.to_string(),
                project_id: "mock-project".to_string(),
                deployment: deployment.map(|(id, s)| (id.to_string(), s)),
            },
        );
    }

    /// Queue statuses returned by successive `get_service_status` calls for
    /// `service_id`. The last entry repeats once the queue drains.
    pub fn script_statuses(&self, service_id: &str, statuses: Vec<DeploymentStatus>) {
        let mut state = self.state.lock().unwrap();
        let queue = state.scripted.entry(service_id.to_string()).or_default();
        queue.extend(statuses.into_iter().map(Ok));
    }

    /// Queue one failing `get_service_status` answer for `service_id`.
    pub fn script_status_error(&self, service_id: &str, error: PlatformError) {
        let mut state = self.state.lock().unwrap();
        state
            .scripted
            .entry(service_id.to_string())
            .or_default()
            .push_back(Err(error));
    }

    /// Fail the next `stop_deployment` call with `error`.
    pub fn fail_next_stop(&self, error: PlatformError) {
        self.state.lock().unwrap().stop_failures.push_back(error);
    }

    /// Fail the next `delete_service` call with `error`.
    pub fn fail_next_delete(&self, error: PlatformError) {
        self.state.lock().unwrap().delete_failures.push_back(error);
    }

    pub fn create_calls(&self) -> usize {
        self.calls.create.load(Ordering::SeqCst)
    }

    pub fn deploy_calls(&self) -> usize {
        self.calls.deploy.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.calls.stop.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.calls.delete.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.calls.status.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.calls.list.load(Ordering::SeqCst)
    }

    /// Deployment ids the platform actually stopped, in call order.
    pub fn stopped_deployments(&self) -> Vec<String> {
        self.state.lock().unwrap().stopped.clone()
    }

    /// Service ids the platform actually deleted, in call order.
    pub fn deleted_services(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn has_service(&self, service_id: &str) -> bool {
        self.state.lock().unwrap().services.contains_key(service_id)
    }

    /// Current status of a service's latest deployment.
    pub fn deployment_status(&self, service_id: &str) -> Option<DeploymentStatus> {
        self.state
            .lock()
            .unwrap()
            .services
            .get(service_id)
            .and_then(|s| s.deployment.as_ref().map(|(_, status)| status.clone()))
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn summary(id: &str, service: &MockService) -> ServiceSummary {
    let (status, latest_deployment_id) = match &service.deployment {
        Some((dep, status)) => (status.clone(), Some(dep.clone())),
        None => (DeploymentStatus::Unknown, None),
    };
    ServiceSummary {
        id: id.to_string(),
        name: service.name.clone(),
        status,
        latest_deployment_id,
        last_deploy_time: None,
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    async fn create_service(
        &self,
        input: &ServiceCreateInput,
    ) -> Result<ServiceHandle, PlatformError> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("svc-{}", state.next_id);
        state.services.insert(
            id.clone(),
            MockService {
                name: input.name.clone(),
                project_id: input.project_id.clone(),
                deployment: None,
            },
        );
        Ok(ServiceHandle {
            id,
            name: input.name.clone(),
            project_id: input.project_id.clone(),
        })
    }

    async fn deploy_service(
        &self,
        service_id: &str,
        _environment_id: &str,
    ) -> Result<String, PlatformError> {
        self.calls.deploy.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let deployment_id = format!("dep-{}", state.next_id);
        let service = state
            .services
            .get_mut(service_id)
            .ok_or_else(|| PlatformError::NotFound(format!("service {service_id}")))?;
        service.deployment = Some((deployment_id.clone(), DeploymentStatus::Queued));
        Ok(deployment_id)
    }

    async fn stop_deployment(&self, deployment_id: &str) -> Result<Ack, PlatformError> {
        self.calls.stop.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.stop_failures.pop_front() {
            return Err(err);
        }
        let deployment = state
            .services
            .values_mut()
            .filter_map(|s| s.deployment.as_mut())
            .find(|(id, _)| id == deployment_id)
            .ok_or_else(|| PlatformError::NotFound(format!("deployment {deployment_id}")))?;
        if deployment.1.is_stopped() {
            return Ok(Ack::AlreadyInTargetState);
        }
        deployment.1 = DeploymentStatus::Removed;
        state.stopped.push(deployment_id.to_string());
        Ok(Ack::Applied)
    }

    async fn delete_service(&self, service_id: &str) -> Result<Ack, PlatformError> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.delete_failures.pop_front() {
            return Err(err);
        }
        if state.services.remove(service_id).is_none() {
            return Err(PlatformError::NotFound(format!("service {service_id}")));
        }
        state.deleted.push(service_id.to_string());
        Ok(Ack::Applied)
    }

    async fn get_service_status(
        &self,
        _environment_id: &str,
        service_id: &str,
    ) -> Result<ServiceStatus, PlatformError> {
        self.calls.status.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let mut state = self.state.lock().unwrap();

        let scripted = state.scripted.get_mut(service_id).and_then(|queue| {
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        });
        if let Some(next) = scripted {
            let status = next?;
            if let Some(service) = state.services.get_mut(service_id) {
                if let Some((_, current)) = service.deployment.as_mut() {
                    *current = status.clone();
                }
            }
            let latest_deployment_id = state
                .services
                .get(service_id)
                .and_then(|s| s.deployment.as_ref().map(|(id, _)| id.clone()));
            return Ok(ServiceStatus {
                service_id: service_id.to_string(),
                status,
                latest_deployment_id,
                last_deploy_time: None,
            });
        }

        state
            .services
            .get(service_id)
            .map(|s| ServiceStatus::from(&summary(service_id, s)))
            .ok_or_else(|| PlatformError::NotFound(format!("service {service_id}")))
    }

    async fn list_services(
        &self,
        _environment_id: &str,
    ) -> Result<Vec<ServiceSummary>, PlatformError> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .services
            .iter()
            .map(|(id, s)| summary(id, s))
            .collect())
    }

    fn platform_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mock = MockPlatform::new();
        mock.add_service("svc-a", "api", Some(("dep-a", DeploymentStatus::Success)));

        assert_eq!(mock.stop_deployment("dep-a").await.unwrap(), Ack::Applied);
        assert_eq!(
            mock.stop_deployment("dep-a").await.unwrap(),
            Ack::AlreadyInTargetState
        );
        assert_eq!(mock.stop_calls(), 2);
        assert_eq!(mock.stopped_deployments(), vec!["dep-a".to_string()]);
    }

    #[tokio::test]
    async fn delete_of_absent_service_is_not_found() {
        let mock = MockPlatform::new();
        mock.add_service("svc-a", "api", None);

        assert_eq!(mock.delete_service("svc-a").await.unwrap(), Ack::Applied);
        assert!(matches!(
            mock.delete_service("svc-a").await,
            Err(PlatformError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn scripted_statuses_drain_then_repeat() {
        let mock = MockPlatform::new();
        mock.add_service("svc-a", "api", Some(("dep-a", DeploymentStatus::Queued)));
        mock.script_statuses(
            "svc-a",
            vec![DeploymentStatus::Building, DeploymentStatus::Success],
        );

        let first = mock.get_service_status("env", "svc-a").await.unwrap();
        let second = mock.get_service_status("env", "svc-a").await.unwrap();
        let third = mock.get_service_status("env", "svc-a").await.unwrap();
        assert_eq!(first.status, DeploymentStatus::Building);
        assert_eq!(second.status, DeploymentStatus::Success);
        assert_eq!(third.status, DeploymentStatus::Success);
        assert_eq!(third.latest_deployment_id.as_deref(), Some("dep-a"));
        assert_eq!(mock.status_calls(), 3);
    }

    #[tokio::test]
    async fn injected_failure_is_consumed_once() {
        let mock = MockPlatform::new();
        mock.add_service("svc-a", "api", Some(("dep-a", DeploymentStatus::Success)));
        mock.fail_next_stop(PlatformError::Transport("boom".into()));

        assert!(mock.stop_deployment("dep-a").await.is_err());
        assert_eq!(mock.stop_deployment("dep-a").await.unwrap(), Ack::Applied);
    }
}

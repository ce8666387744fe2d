use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;
use loanlens::workflows::lending::applications::{
    AnalysisCacheStore, ApplicationId, ApplicationRecord, ApplicationRepository, AuditEntry,
    AuditTrail, DecisionNotification, NotificationPublisher, NotifyError, PolicyStore,
    RepositoryError, RiskPolicy,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationRepository {
    records: Arc<Mutex<HashMap<ApplicationId, ApplicationRecord>>>,
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.application_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.application_id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.application_id) {
            guard.insert(record.application_id.clone(), record);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self, limit: usize) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut records: Vec<ApplicationRecord> = guard.values().cloned().collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.application_id.0.cmp(&a.application_id.0))
        });
        records.truncate(limit);
        Ok(records)
    }

    fn count(&self) -> Result<usize, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.len())
    }

    fn delete(&self, id: &ApplicationId) -> Result<bool, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.remove(id).is_some())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAnalysisCache {
    entries: Arc<Mutex<HashMap<ApplicationId, Value>>>,
}

impl AnalysisCacheStore for InMemoryAnalysisCache {
    fn get(&self, id: &ApplicationId) -> Result<Option<Value>, RepositoryError> {
        let guard = self.entries.lock().expect("cache mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn put(&self, id: &ApplicationId, report: Value) -> Result<(), RepositoryError> {
        let mut guard = self.entries.lock().expect("cache mutex poisoned");
        guard.entry(id.clone()).or_insert(report);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryNotifier {
    events: Arc<Mutex<Vec<DecisionNotification>>>,
}

impl NotificationPublisher for InMemoryNotifier {
    fn publish(&self, notification: DecisionNotification) -> Result<(), NotifyError> {
        let mut guard = self.events.lock().expect("notifier mutex poisoned");
        guard.push(notification);
        Ok(())
    }
}

impl InMemoryNotifier {
    #[allow(dead_code)]
    pub(crate) fn events(&self) -> Vec<DecisionNotification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAuditTrail {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl AuditTrail for InMemoryAuditTrail {
    fn record(&self, entry: AuditEntry) -> Result<(), RepositoryError> {
        let mut guard = self.entries.lock().expect("audit mutex poisoned");
        guard.push(entry);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryPolicyStore {
    policy: Arc<Mutex<Option<RiskPolicy>>>,
}

impl PolicyStore for InMemoryPolicyStore {
    fn load(&self) -> Result<RiskPolicy, RepositoryError> {
        let guard = self.policy.lock().expect("policy mutex poisoned");
        Ok(guard.clone().unwrap_or_default())
    }

    fn save(&self, policy: RiskPolicy) -> Result<(), RepositoryError> {
        let mut guard = self.policy.lock().expect("policy mutex poisoned");
        *guard = Some(policy);
        Ok(())
    }
}

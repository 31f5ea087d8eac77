use cardio_advisor::assessment::{
    HistoryRecord, HistoryRepository, LogisticScorer, RepositoryError, Scorer, UserAccount,
    UserId, UserRepository,
};
use cardio_advisor::config::ModelConfig;
use cardio_advisor::error::AppError;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryUserRepository {
    accounts: Arc<Mutex<HashMap<UserId, UserAccount>>>,
}

impl UserRepository for InMemoryUserRepository {
    fn insert(&self, account: UserAccount) -> Result<UserAccount, RepositoryError> {
        let mut guard = self.accounts.lock().expect("user repository mutex poisoned");
        if guard.contains_key(&account.id)
            || guard.values().any(|existing| existing.email == account.email)
        {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(account.id, account.clone());
        Ok(account)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, RepositoryError> {
        let guard = self.accounts.lock().expect("user repository mutex poisoned");
        Ok(guard.values().find(|account| account.email == email).cloned())
    }

    fn find_by_id(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError> {
        let guard = self.accounts.lock().expect("user repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryHistoryRepository {
    records: Arc<Mutex<Vec<HistoryRecord>>>,
}

impl HistoryRepository for InMemoryHistoryRepository {
    fn append(&self, record: HistoryRecord) -> Result<HistoryRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("history repository mutex poisoned");
        if guard.iter().any(|existing| existing.id == record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(record.clone());
        Ok(record)
    }

    fn for_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, RepositoryError> {
        let guard = self.records.lock().expect("history repository mutex poisoned");
        // Later appends win ties on equal timestamps.
        let mut records: Vec<HistoryRecord> = guard
            .iter()
            .rev()
            .filter(|record| &record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(limit);
        Ok(records)
    }
}

pub(crate) fn load_scorer(config: &ModelConfig) -> Result<LogisticScorer, AppError> {
    let scorer =
        LogisticScorer::from_path(&config.path, &config.version, config.default_threshold)?;
    let descriptor = scorer.descriptor();
    info!(
        model = %descriptor.name,
        version = %descriptor.version,
        threshold = descriptor.threshold,
        path = %config.path.display(),
        "scoring model loaded"
    );
    Ok(scorer)
}

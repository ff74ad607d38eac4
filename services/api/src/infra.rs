use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use rodo_forms::workflows::forms::{
    RecordId, SubmissionError, SubmissionHooks, SubmissionPayload, SubmitOperation,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Stored submission as the record store keeps it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StoredRecord {
    pub(crate) form_id: String,
    pub(crate) payload: SubmissionPayload,
}

/// Submit operation backed by process memory. Records do not survive a restart.
#[derive(Default)]
pub(crate) struct InMemoryRecordStore {
    records: Mutex<BTreeMap<String, StoredRecord>>,
    sequence: AtomicU64,
    failures_remaining: AtomicU32,
}

impl InMemoryRecordStore {
    /// Store whose first `count` submissions fail as unavailable.
    pub(crate) fn with_failures(count: u32) -> Self {
        Self {
            failures_remaining: AtomicU32::new(count),
            ..Self::default()
        }
    }

    pub(crate) fn get(&self, id: &RecordId) -> Option<StoredRecord> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&id.0)
            .cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    fn take_failure(&self) -> bool {
        self.failures_remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
            .is_ok()
    }
}

impl SubmitOperation for InMemoryRecordStore {
    async fn submit(
        &self,
        form_id: &str,
        payload: SubmissionPayload,
    ) -> Result<RecordId, SubmissionError> {
        if self.take_failure() {
            return Err(SubmissionError::Unavailable(
                "record store is warming up".to_string(),
            ));
        }

        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let record_id = RecordId(format!("rec-{id:06}"));
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(
                record_id.0.clone(),
                StoredRecord {
                    form_id: form_id.to_string(),
                    payload,
                },
            );
        Ok(record_id)
    }
}

/// Outcome hooks that write an audit line per settled submission.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct AuditLogHooks;

impl SubmissionHooks for AuditLogHooks {
    fn on_success(&self, form_id: &str, record_id: &RecordId) {
        info!(form = form_id, record = %record_id.0, "audit: record created");
    }

    fn on_failure(&self, form_id: &str, error: &SubmissionError) {
        warn!(form = form_id, %error, "audit: submission failed");
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> SubmissionPayload {
        SubmissionPayload {
            form_id: "incident_report".to_string(),
            fields: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn records_get_sequential_ids() {
        let store = InMemoryRecordStore::default();
        let first = store
            .submit("incident_report", payload())
            .await
            .expect("stored");
        let second = store
            .submit("incident_report", payload())
            .await
            .expect("stored");
        assert_eq!(first.0, "rec-000001");
        assert_eq!(second.0, "rec-000002");
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.get(&first).map(|record| record.form_id),
            Some("incident_report".to_string())
        );
    }

    #[tokio::test]
    async fn configured_failures_happen_first() {
        let store = InMemoryRecordStore::with_failures(1);
        let failed = store.submit("incident_report", payload()).await;
        assert!(matches!(failed, Err(SubmissionError::Unavailable(_))));
        assert!(store.submit("incident_report", payload()).await.is_ok());
    }

    #[test]
    fn parse_date_reports_bad_input() {
        assert!(parse_date("2024-02-30").is_err());
        assert_eq!(
            parse_date(" 2024-02-29 "),
            Ok(NaiveDate::from_ymd_opt(2024, 2, 29).expect("leap day"))
        );
    }
}

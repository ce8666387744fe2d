//! Pipeline arbitration between the external analyst and the fallback
//! scorer.
//!
//! The pipeline is synchronous and intended to run on a blocking task: the
//! retry backoff uses a plain sleep, and none of the seams it calls are
//! async. The pure scoring and metrics functions never retry; bounded
//! retries with fixed backoff live here and nowhere else.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::warn;

use super::fallback::FallbackScorer;
use super::metrics;
use super::report::AnalysisReport;
use super::AnalysisRequest;
use crate::config::AnalysisConfig;
use crate::workflows::lending::applications::domain::ApplicationId;
use crate::workflows::lending::applications::repository::AnalysisCacheStore;

/// External risk analyst seam. The production implementation wraps an LLM
/// service; tests and the offline CLI plug in stubs.
pub trait RiskAnalyst: Send + Sync {
    fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReport, AnalystError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AnalystError {
    #[error("analyst unavailable: {0}")]
    Unavailable(String),
    #[error("analyst returned malformed report: {0}")]
    Malformed(String),
}

/// Bounded retry with fixed sleep backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            max_attempts: config.max_analyst_attempts.max(1),
            backoff: Duration::from_secs(config.retry_backoff_secs),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Which path produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisPath {
    Cached,
    Analyst,
    Fallback,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("analyst required but unavailable after {attempts} attempt(s): {reason}")]
    AnalystUnavailable { attempts: u32, reason: String },
}

/// Resolves one report per application: cache, then analyst with retries,
/// then the deterministic fallback (unless analyst-only mode forbids it).
pub struct AnalysisPipeline {
    analyst: Option<Arc<dyn RiskAnalyst>>,
    scorer: FallbackScorer,
    cache: Arc<dyn AnalysisCacheStore>,
    retry: RetryPolicy,
    analyst_only: bool,
}

impl AnalysisPipeline {
    pub fn new(
        analyst: Option<Arc<dyn RiskAnalyst>>,
        scorer: FallbackScorer,
        cache: Arc<dyn AnalysisCacheStore>,
        retry: RetryPolicy,
        analyst_only: bool,
    ) -> Self {
        Self {
            analyst,
            scorer,
            cache,
            retry,
            analyst_only,
        }
    }

    pub fn resolve(
        &self,
        request: &AnalysisRequest,
    ) -> Result<(AnalysisReport, AnalysisPath), PipelineError> {
        let id = &request.application_id;

        match self.cache.get(id) {
            Ok(Some(cached)) => match serde_json::from_value::<AnalysisReport>(cached) {
                Ok(mut report) => {
                    report.normalize();
                    return Ok((report, AnalysisPath::Cached));
                }
                Err(err) => {
                    warn!(application_id = %id.0, %err, "discarding unreadable cached report");
                }
            },
            Ok(None) => {}
            Err(err) => {
                warn!(application_id = %id.0, %err, "analysis cache unavailable, recomputing");
            }
        }

        let mut last_error: Option<AnalystError> = None;
        if let Some(analyst) = &self.analyst {
            for attempt in 1..=self.retry.max_attempts {
                match analyst.analyze(request) {
                    Ok(mut report) => {
                        metrics::apply(&mut report);
                        report.normalize();
                        self.store(id, &report);
                        return Ok((report, AnalysisPath::Analyst));
                    }
                    Err(err) => {
                        warn!(
                            application_id = %id.0,
                            attempt,
                            max_attempts = self.retry.max_attempts,
                            %err,
                            "analyst attempt failed"
                        );
                        last_error = Some(err);
                        if attempt < self.retry.max_attempts && !self.retry.backoff.is_zero() {
                            thread::sleep(self.retry.backoff);
                        }
                    }
                }
            }
        }

        if self.analyst_only {
            let attempts = if self.analyst.is_some() {
                self.retry.max_attempts
            } else {
                0
            };
            let reason = last_error
                .map(|err| err.to_string())
                .unwrap_or_else(|| "no analyst configured".to_string());
            return Err(PipelineError::AnalystUnavailable { attempts, reason });
        }

        let mut report = self.scorer.score(request);
        metrics::apply(&mut report);
        report.normalize();
        Ok((report, AnalysisPath::Fallback))
    }

    fn store(&self, id: &ApplicationId, report: &AnalysisReport) {
        match serde_json::to_value(report) {
            Ok(value) => {
                if let Err(err) = self.cache.put(id, value) {
                    warn!(application_id = %id.0, %err, "failed to cache analysis report");
                }
            }
            Err(err) => warn!(application_id = %id.0, %err, "failed to serialize report for cache"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::lending::analysis::ScoringConfig;
    use crate::workflows::lending::applications::domain::{ApplicationId, DocumentBundle};
    use crate::workflows::lending::applications::repository::RepositoryError;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryCache {
        entries: Mutex<HashMap<ApplicationId, Value>>,
    }

    impl AnalysisCacheStore for MemoryCache {
        fn get(&self, id: &ApplicationId) -> Result<Option<Value>, RepositoryError> {
            Ok(self.entries.lock().expect("lock").get(id).cloned())
        }

        fn put(&self, id: &ApplicationId, report: Value) -> Result<(), RepositoryError> {
            self.entries
                .lock()
                .expect("lock")
                .entry(id.clone())
                .or_insert(report);
            Ok(())
        }
    }

    struct FlakyAnalyst {
        calls: AtomicU32,
        succeed_on: u32,
    }

    impl RiskAnalyst for FlakyAnalyst {
        fn analyze(&self, _request: &AnalysisRequest) -> Result<AnalysisReport, AnalystError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.succeed_on {
                Ok(AnalysisReport {
                    risk_score: Some(81),
                    risk_level: Some("Low".to_string()),
                    ..AnalysisReport::default()
                })
            } else {
                Err(AnalystError::Unavailable("connection reset".to_string()))
            }
        }
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            application_id: ApplicationId("APP-000007".to_string()),
            loan_type: None,
            requested_amount: 15000.0,
            documents: DocumentBundle::default(),
        }
    }

    fn pipeline(
        analyst: Option<Arc<dyn RiskAnalyst>>,
        cache: Arc<dyn AnalysisCacheStore>,
        analyst_only: bool,
    ) -> AnalysisPipeline {
        AnalysisPipeline::new(
            analyst,
            FallbackScorer::new(ScoringConfig::default()),
            cache,
            RetryPolicy {
                max_attempts: 3,
                backoff: Duration::ZERO,
            },
            analyst_only,
        )
    }

    #[test]
    fn analyst_result_wins_and_is_cached() {
        let cache = Arc::new(MemoryCache::default());
        let analyst = Arc::new(FlakyAnalyst {
            calls: AtomicU32::new(0),
            succeed_on: 1,
        });
        let pipeline = pipeline(Some(analyst), cache.clone(), false);

        let (report, path) = pipeline.resolve(&request()).expect("resolves");
        assert_eq!(path, AnalysisPath::Analyst);
        assert_eq!(report.risk_score, Some(81));
        assert_eq!(report.final_decision.as_deref(), Some("Approved"));
        assert!(cache
            .get(&request().application_id)
            .expect("cache read")
            .is_some());

        let (_, path) = pipeline.resolve(&request()).expect("resolves again");
        assert_eq!(path, AnalysisPath::Cached);
    }

    #[test]
    fn retries_until_analyst_recovers() {
        let analyst = Arc::new(FlakyAnalyst {
            calls: AtomicU32::new(0),
            succeed_on: 3,
        });
        let pipeline = pipeline(Some(analyst.clone()), Arc::new(MemoryCache::default()), false);

        let (_, path) = pipeline.resolve(&request()).expect("resolves");
        assert_eq!(path, AnalysisPath::Analyst);
        assert_eq!(analyst.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn exhausted_analyst_degrades_to_fallback() {
        let analyst = Arc::new(FlakyAnalyst {
            calls: AtomicU32::new(0),
            succeed_on: 10,
        });
        let pipeline = pipeline(Some(analyst), Arc::new(MemoryCache::default()), false);

        let (report, path) = pipeline.resolve(&request()).expect("resolves");
        assert_eq!(path, AnalysisPath::Fallback);
        assert!(report.is_fallback());
    }

    #[test]
    fn analyst_only_mode_refuses_fallback() {
        let pipeline = pipeline(None, Arc::new(MemoryCache::default()), true);
        match pipeline.resolve(&request()) {
            Err(PipelineError::AnalystUnavailable { attempts: 0, reason }) => {
                assert!(reason.contains("no analyst"));
            }
            other => panic!("expected analyst-unavailable error, got {other:?}"),
        }
    }

    #[test]
    fn fallback_reports_carry_recomputed_metrics() {
        let pipeline = pipeline(None, Arc::new(MemoryCache::default()), false);
        let (report, _) = pipeline.resolve(&request()).expect("resolves");
        let dsr = report
            .financial_metrics
            .debt_service_ratio
            .as_ref()
            .expect("dsr recomputed");
        // default income RM 4000, 15000/24 installment => 15.6%
        assert!((dsr.value - (15000.0 / 24.0) / 4000.0 * 100.0).abs() < 0.01);
    }
}

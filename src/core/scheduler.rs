//! Bounded worker pool running one probe per parameter

use crate::core::config::{Pass, ScanMode, TestMode};
use crate::core::context::ScanContext;
use crate::payload::injector::ParameterTarget;
use crate::reporting::model::VulnerabilityRecord;
use crate::xss::dom::DomSinkHint;
use crate::xss::probe::{ParameterProbe, ProbeOutcome};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Progress notifications. Sent without blocking; dropped if nobody listens.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    ParameterStarted {
        parameter: String,
        test_mode: TestMode,
    },
    ParameterCompleted {
        parameter: String,
        completed: usize,
        total: usize,
    },
    VulnerabilityConfirmed {
        parameter: String,
        payload: String,
    },
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub records: Vec<VulnerabilityRecord>,
    pub dom_hints: Vec<DomSinkHint>,
    pub warnings: Vec<String>,
}

pub struct ScanScheduler {
    ctx: ScanContext,
    events: Option<UnboundedSender<ScanEvent>>,
}

fn emit(events: &Option<UnboundedSender<ScanEvent>>, event: ScanEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

/// Parameters a pass will probe: the first `param_limit`, minus confirmed ones.
pub fn select_targets(
    parameters: &[ParameterTarget],
    pass: &Pass,
    confirmed: &HashSet<String>,
) -> Vec<ParameterTarget> {
    parameters
        .iter()
        .take(pass.param_limit.unwrap_or(usize::MAX))
        .filter(|p| !confirmed.contains(&p.key()))
        .cloned()
        .collect()
}

impl ScanScheduler {
    pub fn new(ctx: ScanContext) -> Self {
        Self { ctx, events: None }
    }

    pub fn with_events(mut self, events: UnboundedSender<ScanEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run every pass of `mode` over `parameters`.
    ///
    /// Never fails: configuration problems degrade the plan and surface as
    /// warnings, per-parameter failures end that probe only.
    pub async fn run_all(&self, parameters: &[ParameterTarget], mode: ScanMode) -> ScanOutcome {
        let plan = mode.plan(self.ctx.config.callback.as_deref());
        let mut outcome = ScanOutcome::default();

        for warning in &plan.warnings {
            tracing::warn!("⚠️  {}", warning);
            outcome.warnings.push(warning.to_string());
        }

        let mut confirmed = HashSet::new();

        for pass in &plan.passes {
            if self.ctx.cancel.is_cancelled() {
                tracing::warn!("Scan cancelled, skipping remaining passes");
                break;
            }

            tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            tracing::info!("        {} PASS", pass.test_mode.to_string().to_uppercase());
            tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

            for probe in self.run_pass(parameters, pass, &confirmed).await {
                for hint in probe.dom_hints {
                    if !outcome.dom_hints.contains(&hint) {
                        outcome.dom_hints.push(hint);
                    }
                }
                if let Some(record) = probe.record {
                    confirmed.insert(record.parameter.key());
                    outcome.records.push(record);
                }
            }
        }

        outcome
    }

    /// One pass: a probe per selected parameter, at most `workers` at a time.
    /// Results come back in completion order.
    pub async fn run_pass(
        &self,
        parameters: &[ParameterTarget],
        pass: &Pass,
        confirmed: &HashSet<String>,
    ) -> Vec<ProbeOutcome> {
        let targets = select_targets(parameters, pass, confirmed);
        let total = targets.len();
        let test_mode = pass.test_mode;
        let semaphore = Arc::new(Semaphore::new(self.ctx.config.workers.max(1)));
        let mut tasks = JoinSet::new();

        tracing::info!(
            "Probing {} parameters with {} workers",
            total,
            self.ctx.config.workers.max(1)
        );

        for target in targets {
            if self.ctx.cancel.is_cancelled() {
                break;
            }

            let ctx = self.ctx.clone();
            let semaphore = Arc::clone(&semaphore);
            let events = self.events.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                if ctx.cancel.is_cancelled() {
                    return None;
                }
                emit(
                    &events,
                    ScanEvent::ParameterStarted {
                        parameter: target.name.clone(),
                        test_mode,
                    },
                );
                Some(ParameterProbe::new(ctx, target, test_mode).run().await)
            });
        }

        let mut outcomes = Vec::new();
        let mut completed = 0;

        while let Some(joined) = tasks.join_next().await {
            completed += 1;
            match joined {
                Ok(Some(outcome)) => {
                    emit(
                        &self.events,
                        ScanEvent::ParameterCompleted {
                            parameter: outcome.target.name.clone(),
                            completed,
                            total,
                        },
                    );
                    if let Some(record) = &outcome.record {
                        emit(
                            &self.events,
                            ScanEvent::VulnerabilityConfirmed {
                                parameter: record.parameter.name.clone(),
                                payload: record.payload.clone(),
                            },
                        );
                    }
                    outcomes.push(outcome);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Probe task failed: {}", e),
            }
            tracing::debug!("Progress: {}/{}", completed, total);
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn params(n: usize) -> Vec<ParameterTarget> {
        let url = Url::parse("http://example.com/").unwrap();
        (0..n)
            .map(|i| ParameterTarget::query(url.clone(), &format!("p{}", i)))
            .collect()
    }

    #[test]
    fn test_select_respects_limit_and_confirmed() {
        let all = params(30);
        let pass = Pass {
            test_mode: TestMode::Classic,
            param_limit: Some(20),
        };
        let mut confirmed = HashSet::new();
        confirmed.insert(all[3].key());

        let selected = select_targets(&all, &pass, &confirmed);
        assert_eq!(selected.len(), 19);
        assert!(selected.iter().all(|p| p.name != "p3"));
        assert!(selected.iter().all(|p| p.name != "p25"));
    }

    #[test]
    fn test_select_without_limit() {
        let all = params(3);
        let pass = Pass {
            test_mode: TestMode::Dom,
            param_limit: None,
        };
        assert_eq!(select_targets(&all, &pass, &HashSet::new()).len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_scan_produces_empty_outcome() {
        let config = crate::core::config::ScanConfig::new(Url::parse("http://127.0.0.1:9/").unwrap());
        let ctx = ScanContext::new(config).unwrap();
        ctx.cancel.cancel();
        let outcome = ScanScheduler::new(ctx).run_all(&params(2), ScanMode::Fast).await;
        assert!(outcome.records.is_empty());
    }
}

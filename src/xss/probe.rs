// Parameter Probe
// Per-parameter state machine: select, send, bypass, analyze, verify

use crate::core::config::TestMode;
use crate::core::context::ScanContext;
use crate::core::error::{ScanError, ScanResult};
use crate::core::rate_limit::RateLimiter;
use crate::http::response::HttpResponse;
use crate::payload::injector::ParameterTarget;
use crate::reporting::model::VulnerabilityRecord;
use crate::xss::context::{ContextHint, ContextKind};
use crate::xss::dom::{analyze_dom, DomSinkHint};
use crate::xss::mutate::{MutationCandidate, MutationEngine};
use crate::xss::payloads::Payload;
use crate::xss::reflect::{find_reflections, ReflectionMatch};
use crate::xss::validate::{best_exploitable, Verdict};
use crate::xss::verify::VerificationPass;
use crate::xss::waf::BlockGuard;
use std::collections::VecDeque;
use std::sync::Arc;

/// Something that can deliver a payload to one parameter and return the reply.
#[allow(async_fn_in_trait)]
pub trait PayloadSender {
    async fn send(&mut self, payload: &str) -> ScanResult<HttpResponse>;
}

/// Rate-limited, counted request path for a single parameter.
pub struct ProbeChannel {
    ctx: ScanContext,
    target: ParameterTarget,
    limiter: RateLimiter,
}

impl ProbeChannel {
    pub fn new(ctx: ScanContext, target: ParameterTarget) -> Self {
        let limiter = RateLimiter::new(ctx.config.delay);
        Self {
            ctx,
            target,
            limiter,
        }
    }
}

impl PayloadSender for ProbeChannel {
    async fn send(&mut self, payload: &str) -> ScanResult<HttpResponse> {
        let req = self.target.build_request(payload)?;
        self.limiter.wait().await;
        self.ctx.stats.record_request();
        self.ctx.client.execute(req).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Selecting,
    Sending,
    Bypassing,
    Analyzing,
    Verifying,
    Done,
}

/// What actually went on the wire.
#[derive(Debug, Clone)]
struct Attempt {
    source: Payload,
    text: String,
    technique_chain: Vec<String>,
    bypassed: bool,
}

impl Attempt {
    fn base(source: Payload) -> Self {
        Self {
            text: source.text.clone(),
            source,
            technique_chain: Vec::new(),
            bypassed: false,
        }
    }

    fn mutated(candidate: MutationCandidate) -> Self {
        Self {
            source: candidate.source,
            text: candidate.text,
            technique_chain: candidate.technique_chain,
            bypassed: true,
        }
    }
}

struct Candidate {
    attempt: Attempt,
    context: ReflectionMatch,
    verdict: Verdict,
}

struct BypassRound {
    candidates: VecDeque<MutationCandidate>,
    remaining: usize,
}

enum Step {
    Selecting,
    Sending(Attempt),
    Bypassing(Payload),
    Analyzing(Attempt, HttpResponse),
    Verifying(Candidate),
    Done,
}

impl Step {
    fn state(&self) -> ProbeState {
        match self {
            Step::Selecting => ProbeState::Selecting,
            Step::Sending(_) => ProbeState::Sending,
            Step::Bypassing(_) => ProbeState::Bypassing,
            Step::Analyzing(..) => ProbeState::Analyzing,
            Step::Verifying(_) => ProbeState::Verifying,
            Step::Done => ProbeState::Done,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub target: ParameterTarget,
    pub test_mode: TestMode,
    pub record: Option<VulnerabilityRecord>,
    pub dom_hints: Vec<DomSinkHint>,
    pub payloads_tried: usize,
}

pub struct ParameterProbe {
    ctx: ScanContext,
    target: ParameterTarget,
    test_mode: TestMode,
    channel: ProbeChannel,
    guard: BlockGuard,
    mutator: MutationEngine,
    verifier: VerificationPass,
    queue: VecDeque<Payload>,
    bypass: Option<BypassRound>,
    last_seen: Option<ContextHint>,
    dom_hints: Vec<DomSinkHint>,
    tried: usize,
}

fn resume(attempt: &Attempt) -> Step {
    if attempt.bypassed {
        Step::Bypassing(attempt.source.clone())
    } else {
        Step::Selecting
    }
}

impl ParameterProbe {
    pub fn new(ctx: ScanContext, target: ParameterTarget, test_mode: TestMode) -> Self {
        let queue = ctx
            .catalog
            .for_mode(test_mode, target.location, ctx.config.max_payloads)
            .into();
        let verifier = VerificationPass::new(ctx.config.verification_quorum)
            .with_block_handling(ctx.config.waf_handling)
            .with_stats(Arc::clone(&ctx.stats));

        Self {
            channel: ProbeChannel::new(ctx.clone(), target.clone()),
            mutator: MutationEngine::new(ctx.config.mutation_cap),
            guard: BlockGuard::new(),
            verifier,
            queue,
            bypass: None,
            last_seen: None,
            dom_hints: Vec::new(),
            tried: 0,
            ctx,
            target,
            test_mode,
        }
    }

    /// Replace the catalog selection, still capped at `max_payloads`.
    pub fn with_payloads(mut self, payloads: Vec<Payload>) -> Self {
        self.queue = payloads
            .into_iter()
            .take(self.ctx.config.max_payloads)
            .collect();
        self
    }

    fn waf_handling(&self) -> bool {
        self.ctx.config.waf_handling
    }

    fn mutation_hint(&self, payload: &Payload) -> ContextHint {
        self.last_seen
            .or(payload.context_affinity)
            .unwrap_or(ContextHint::Unknown)
    }

    pub async fn run(mut self) -> ProbeOutcome {
        tracing::info!(
            "🔍 Testing {} parameter: {} ({} pass, {} payloads)",
            self.target.location,
            self.target.name,
            self.test_mode,
            self.queue.len()
        );
        self.ctx.stats.record_parameter();

        let mut record = None;
        let mut step = Step::Selecting;

        loop {
            tracing::trace!(parameter = %self.target.name, state = ?step.state(), "probe step");
            step = match step {
                Step::Selecting => self.select(),
                Step::Sending(attempt) => self.send(attempt).await,
                Step::Bypassing(source) => self.bypass_next(source),
                Step::Analyzing(attempt, response) => self.analyze(attempt, &response),
                Step::Verifying(candidate) => match self.verify(candidate).await {
                    Some(confirmed) => {
                        record = Some(confirmed);
                        Step::Done
                    }
                    None => Step::Selecting,
                },
                Step::Done => break,
            };
        }

        if record.is_none() {
            tracing::info!(
                "   ✗ No exploitable XSS on {} ({} payloads tried)",
                self.target.name,
                self.tried
            );
        }

        ProbeOutcome {
            target: self.target,
            test_mode: self.test_mode,
            record,
            dom_hints: self.dom_hints,
            payloads_tried: self.tried,
        }
    }

    fn select(&mut self) -> Step {
        if self.ctx.cancel.is_cancelled() {
            tracing::debug!("Scan cancelled, stopping probe of {}", self.target.name);
            return Step::Done;
        }

        while let Some(payload) = self.queue.pop_front() {
            if self.waf_handling() && self.ctx.is_filtered(&payload.text) {
                self.ctx.stats.record_filtered();
                tracing::debug!("      Skipping previously filtered payload: {}", payload.text);
                continue;
            }
            self.tried += 1;
            return Step::Sending(Attempt::base(payload));
        }

        Step::Done
    }

    async fn send(&mut self, attempt: Attempt) -> Step {
        tracing::debug!("      Sending to {}: {}", self.target.name, attempt.text);

        match self.channel.send(&attempt.text).await {
            Ok(response) => {
                if self.waf_handling() && self.guard.is_blocked(&response) {
                    self.ctx.stats.record_block();
                    tracing::debug!(
                        "      🛡️ Blocked (HTTP {}) on {}",
                        response.status,
                        self.target.name
                    );
                    return Step::Bypassing(attempt.source);
                }
                if attempt.bypassed {
                    self.bypass = None;
                    tracing::info!(
                        "   ✓ Block bypassed on {} via [{}]",
                        self.target.name,
                        attempt.technique_chain.join(" > ")
                    );
                }
                Step::Analyzing(attempt, response)
            }
            Err(ScanError::MalformedResponse(e)) => {
                tracing::debug!("      Unreadable response, treating as no reflection: {}", e);
                self.bypass = None;
                Step::Selecting
            }
            Err(ScanError::MalformedRequest(e)) => {
                tracing::debug!("      Payload cannot be delivered: {}", e);
                resume(&attempt)
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!("⚠️  {} while testing {}, backing off", e, self.target.name);
                tokio::time::sleep(self.ctx.config.transport_backoff).await;
                resume(&attempt)
            }
            Err(e) => {
                tracing::warn!("✗ Abandoning parameter {}: {}", self.target.name, e);
                Step::Done
            }
        }
    }

    fn bypass_next(&mut self, source: Payload) -> Step {
        if self.bypass.is_none() {
            let hint = self.mutation_hint(&source);
            let candidates = self.mutator.mutate(&source, hint, &self.ctx.waf);
            tracing::debug!(
                "      Bypass round for {}: {} candidates, {} attempts allowed",
                self.target.name,
                candidates.len(),
                self.ctx.config.bypass_attempts
            );
            self.bypass = Some(BypassRound {
                candidates: candidates.into(),
                remaining: self.ctx.config.bypass_attempts,
            });
        }

        let next = match self.bypass.as_mut() {
            Some(round) if round.remaining > 0 => {
                round.remaining -= 1;
                round.candidates.pop_front()
            }
            _ => None,
        };

        match next {
            Some(candidate) => Step::Sending(Attempt::mutated(candidate)),
            None => {
                self.bypass = None;
                self.ctx.stats.record_filtered();
                if self.guard.likely_blocked(&source.text) {
                    self.ctx.mark_filtered(&source.text);
                }
                tracing::debug!("      Bypass exhausted for {}", self.target.name);
                Step::Selecting
            }
        }
    }

    fn analyze(&mut self, attempt: Attempt, response: &HttpResponse) -> Step {
        if response.is_binary() {
            return Step::Selecting;
        }

        let body = response.body_text();
        let matches = find_reflections(&attempt.text, &body);

        if let Some(m) = matches.iter().find(|m| m.kind != ContextKind::Direct) {
            self.last_seen = Some(m.kind.hint());
        }

        if matches!(
            self.test_mode,
            TestMode::Classic | TestMode::Dom | TestMode::Advanced
        ) {
            for hint in analyze_dom(&body, &self.target.name) {
                if !self.dom_hints.contains(&hint) {
                    self.dom_hints.push(hint);
                }
            }
        }

        match best_exploitable(&matches, &attempt.text, &body) {
            Some((m, verdict)) => {
                tracing::info!(
                    "   🎯 Exploitable {} reflection on {} ({:?})",
                    m.kind,
                    self.target.name,
                    verdict.rule
                );
                let context = m.clone();
                Step::Verifying(Candidate {
                    attempt,
                    context,
                    verdict,
                })
            }
            None => Step::Selecting,
        }
    }

    async fn verify(&mut self, candidate: Candidate) -> Option<VulnerabilityRecord> {
        let outcome = self
            .verifier
            .verify(&mut self.channel, &candidate.attempt.text)
            .await;

        if !outcome.confirmed() {
            tracing::info!(
                "   ✗ Verification failed on {} ({}/{} reproduced, quorum {})",
                self.target.name,
                outcome.reproduced,
                outcome.attempted,
                outcome.quorum
            );
            return None;
        }

        tracing::info!(
            "   ✅ Verified XSS on {} ({}/{} reproduced)",
            self.target.name,
            outcome.reproduced,
            outcome.attempted
        );
        self.ctx.stats.record_vulnerability();

        Some(VulnerabilityRecord {
            parameter: self.target.clone(),
            payload: candidate.attempt.text,
            context: candidate.context,
            confidence: candidate.verdict.rule.confidence(),
            rule: candidate.verdict.rule,
            waf_bypassed: candidate.attempt.bypassed,
            technique_chain: candidate.attempt.technique_chain,
            verification_count: outcome.reproduced,
            test_mode: self.test_mode,
            cwe: "CWE-79".to_string(),
        })
    }
}

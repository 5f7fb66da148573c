//! Event / advisory gateway — fire-and-forget calls to the oracle.
//!
//! Two triggers:
//!   - Periodic shock: every `shock_interval_ms` of simulated time,
//!     measured from the previous trigger (not from its reply).
//!   - Action advice: after a committed slot assignment.
//!
//! Calls run as detached tokio tasks and report back over an unbounded
//! channel. Each call yields exactly one reply, even when its task
//! panics or its runtime goes away, so `in_flight` always drains. The engine drains the channel on its own thread, so game
//! state is still mutated from one place only. Replies are applied in
//! arrival order and the last one wins the advisory text. A failed or
//! timed-out call changes nothing but the log. There are no retries.

use crate::{
    config::AdvisoryConfig,
    error::{OracleError, SimResult},
    event::SimEvent,
    ledger::PlayerStats,
    oracle::{AdvisoryOracle, EconomicEvent},
    rng::{next_uuid, RandomSource},
    subsystem::{SimSubsystem, TickContext},
    types::Timestamp,
};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum OracleReply {
    Shock {
        request_id: String,
        result:     Result<EconomicEvent, OracleError>,
    },
    Advice {
        request_id: String,
        result:     Result<String, OracleError>,
    },
}

/// What applying a reply did to the gateway's state.
#[derive(Debug, Clone, PartialEq)]
pub enum AppliedReply {
    Shock {
        request_id:  String,
        event:       EconomicEvent,
        /// Eco-score penalty the caller must apply to the ledger.
        eco_penalty: i32,
    },
    Advice {
        request_id: String,
    },
    Failed {
        request_id: String,
        error:      OracleError,
    },
}

pub struct AdvisoryGateway {
    config:          AdvisoryConfig,
    oracle:          Arc<dyn AdvisoryOracle>,
    tx:              mpsc::UnboundedSender<OracleReply>,
    rx:              mpsc::UnboundedReceiver<OracleReply>,
    in_flight:       usize,
    last_trigger_ms: Timestamp,
    advisory_text:   String,
    current_event:   Option<EconomicEvent>,
}

impl AdvisoryGateway {
    pub fn new(config: AdvisoryConfig, oracle: Arc<dyn AdvisoryOracle>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            advisory_text: config.greeting.clone(),
            config,
            oracle,
            tx,
            rx,
            in_flight: 0,
            last_trigger_ms: 0,
            current_event: None,
        }
    }

    pub fn advisory_text(&self) -> &str {
        &self.advisory_text
    }

    pub fn current_event(&self) -> Option<&EconomicEvent> {
        self.current_event.as_ref()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn last_trigger_ms(&self) -> Timestamp {
        self.last_trigger_ms
    }

    /// Replace the advisory text synchronously (intent feedback).
    pub fn set_advisory(&mut self, text: impl Into<String>) {
        self.advisory_text = text.into();
    }

    pub fn shock_due(&self, now: Timestamp) -> bool {
        now.saturating_sub(self.last_trigger_ms) >= self.config.shock_interval_ms
    }

    pub fn request_shock(&mut self, request_id: String, stats: &PlayerStats) {
        let oracle = Arc::clone(&self.oracle);
        let stats = stats.clone();
        let timeout = self.timeout();
        self.dispatch(CallKind::Shock, request_id, move |request_id| async move {
            let result = with_timeout(timeout, oracle.generate_shock(&stats)).await;
            OracleReply::Shock { request_id, result }
        });
    }

    pub fn request_advice(&mut self, request_id: String, action: String, stats: &PlayerStats) {
        let oracle = Arc::clone(&self.oracle);
        let stats = stats.clone();
        let timeout = self.timeout();
        self.dispatch(CallKind::Advice, request_id, move |request_id| async move {
            let result = with_timeout(timeout, oracle.advise(&action, &stats)).await;
            OracleReply::Advice { request_id, result }
        });
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.oracle_timeout_ms)
    }

    /// Spawn on the ambient runtime. Without one the call resolves
    /// immediately as unavailable.
    ///
    /// Every dispatch yields exactly one reply: a task that panics or is
    /// dropped with its runtime answers through its `ReplyGuard`.
    fn dispatch<C, F>(&mut self, kind: CallKind, request_id: String, call: C)
    where
        C: FnOnce(String) -> F,
        F: Future<Output = OracleReply> + Send + 'static,
    {
        self.in_flight += 1;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let guard = ReplyGuard {
                    tx:         self.tx.clone(),
                    kind,
                    request_id: Some(request_id.clone()),
                };
                let call = call(request_id);
                handle.spawn(async move {
                    let reply = call.await;
                    guard.deliver(reply);
                });
            }
            Err(_) => {
                let _ = self.tx.send(kind.failed(request_id, "no async runtime"));
            }
        }
    }

    /// Replies that have already arrived, without waiting.
    pub fn try_drain(&mut self) -> Vec<OracleReply> {
        let mut out = Vec::new();
        while let Ok(reply) = self.rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            out.push(reply);
        }
        out
    }

    /// Wait for the next reply. `None` when nothing is in flight.
    pub async fn next_reply(&mut self) -> Option<OracleReply> {
        if self.in_flight == 0 {
            return None;
        }
        let reply = self.rx.recv().await?;
        self.in_flight = self.in_flight.saturating_sub(1);
        Some(reply)
    }

    /// Fold a reply into the advisory text and current event.
    pub fn apply(&mut self, reply: OracleReply) -> AppliedReply {
        match reply {
            OracleReply::Shock { request_id, result: Ok(event) } => {
                let eco_penalty = if event.is_negative() { self.config.shock_eco_penalty } else { 0 };
                self.advisory_text = event.description.clone();
                self.current_event = Some(event.clone());
                AppliedReply::Shock { request_id, event, eco_penalty }
            }
            OracleReply::Advice { request_id, result: Ok(text) } => {
                self.advisory_text = text;
                AppliedReply::Advice { request_id }
            }
            OracleReply::Shock { request_id, result: Err(error) }
            | OracleReply::Advice { request_id, result: Err(error) } => {
                AppliedReply::Failed { request_id, error }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum CallKind {
    Shock,
    Advice,
}

impl CallKind {
    fn failed(self, request_id: String, reason: &str) -> OracleReply {
        let error = OracleError::Unavailable(reason.to_string());
        match self {
            CallKind::Shock => OracleReply::Shock { request_id, result: Err(error) },
            CallKind::Advice => OracleReply::Advice { request_id, result: Err(error) },
        }
    }
}

/// Owned by a spawned oracle task. Sends an `Unavailable` reply on drop
/// unless the task delivered its own.
struct ReplyGuard {
    tx:         mpsc::UnboundedSender<OracleReply>,
    kind:       CallKind,
    request_id: Option<String>,
}

impl ReplyGuard {
    fn deliver(mut self, reply: OracleReply) {
        self.request_id = None;
        // Receiver gone means the session ended; nothing to do.
        let _ = self.tx.send(reply);
    }
}

impl Drop for ReplyGuard {
    fn drop(&mut self) {
        if let Some(request_id) = self.request_id.take() {
            let _ = self.tx.send(self.kind.failed(request_id, "oracle task aborted"));
        }
    }
}

async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, OracleError>
where
    F: Future<Output = Result<T, OracleError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(OracleError::Unavailable(format!(
            "timed out after {} ms",
            limit.as_millis()
        ))),
    }
}

impl SimSubsystem for AdvisoryGateway {
    fn name(&self) -> &'static str { "advisory" }

    /// Fire the periodic shock when its interval has elapsed.
    fn update(
        &mut self,
        ctx: &TickContext<'_>,
        _events_in: &[SimEvent],
        rng: &mut dyn RandomSource,
    ) -> SimResult<Vec<SimEvent>> {
        if !self.shock_due(ctx.now) {
            return Ok(vec![]);
        }
        self.last_trigger_ms = ctx.now;

        let request_id = next_uuid(rng).to_string();
        self.request_shock(request_id.clone(), ctx.stats);
        log::info!(
            "tick={} advisory: shock requested ({} in flight)",
            ctx.tick,
            self.in_flight
        );

        Ok(vec![SimEvent::ShockRequested { tick: ctx.tick, request_id }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SessionConfig,
        ledger::EconomyLedger,
        oracle::{EventScope, ScriptedOracle},
        rng::ScriptedRng,
    };

    fn gateway(oracle: ScriptedOracle) -> (AdvisoryGateway, PlayerStats) {
        let config = SessionConfig::standard();
        let stats = EconomyLedger::new(config.ledger, &config.player).stats().clone();
        (AdvisoryGateway::new(config.advisory, Arc::new(oracle)), stats)
    }

    fn event(concept: &str) -> EconomicEvent {
        EconomicEvent {
            title: "Drought".into(),
            description: "The river is low.".into(),
            impact: "Fewer tours".into(),
            concept: concept.into(),
            scope: EventScope::Community,
        }
    }

    #[test]
    fn without_runtime_calls_resolve_unavailable() {
        let (mut gw, stats) = gateway(ScriptedOracle::new());
        let greeting = gw.advisory_text().to_string();
        gw.request_advice("r1".into(), "Started a tour".into(), &stats);
        assert_eq!(gw.in_flight(), 1);

        let replies = gw.try_drain();
        assert_eq!(gw.in_flight(), 0);
        let applied = gw.apply(replies.into_iter().next().unwrap());
        assert!(matches!(
            applied,
            AppliedReply::Failed { error: OracleError::Unavailable(_), .. }
        ));
        assert_eq!(gw.advisory_text(), greeting);
    }

    #[test]
    fn periodic_trigger_measures_from_last_trigger() {
        let (mut gw, stats) = gateway(ScriptedOracle::new());
        let mut rng = ScriptedRng::new([0.42]);
        let ctx = |now| TickContext { tick: now / 1000, now, stats: &stats };

        assert!(gw.update(&ctx(44_000), &[], &mut rng).unwrap().is_empty());
        assert_eq!(gw.update(&ctx(45_000), &[], &mut rng).unwrap().len(), 1);
        assert!(gw.update(&ctx(89_000), &[], &mut rng).unwrap().is_empty());
        assert_eq!(gw.update(&ctx(90_000), &[], &mut rng).unwrap().len(), 1);
        assert_eq!(gw.last_trigger_ms(), 90_000);
    }

    #[tokio::test]
    async fn negative_shock_carries_penalty_and_replaces_text() {
        let oracle = ScriptedOracle::new();
        oracle.push_shock(Ok(event("Negative Externality")));
        let (mut gw, stats) = gateway(oracle);

        gw.request_shock("s1".into(), &stats);
        let reply = gw.next_reply().await.unwrap();
        let applied = gw.apply(reply);

        assert!(matches!(applied, AppliedReply::Shock { eco_penalty: 5, .. }));
        assert_eq!(gw.advisory_text(), "The river is low.");
        assert_eq!(gw.current_event().map(|e| e.title.as_str()), Some("Drought"));
    }

    #[tokio::test]
    async fn failure_keeps_previous_event_and_text() {
        let oracle = ScriptedOracle::new();
        oracle.push_shock(Ok(event("Public Goods")));
        oracle.push_shock(Err(OracleError::Malformed("bad json".into())));
        let (mut gw, stats) = gateway(oracle);

        gw.request_shock("s1".into(), &stats);
        let first = gw.next_reply().await.unwrap();
        assert!(matches!(gw.apply(first), AppliedReply::Shock { eco_penalty: 0, .. }));

        gw.request_shock("s2".into(), &stats);
        let second = gw.next_reply().await.unwrap();
        assert!(matches!(gw.apply(second), AppliedReply::Failed { .. }));
        assert_eq!(gw.advisory_text(), "The river is low.");
        assert!(gw.current_event().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_oracle_times_out() {
        let oracle = ScriptedOracle::new().with_delay(Duration::from_secs(60));
        oracle.push_advice(Ok("too late".into()));
        let (mut gw, stats) = gateway(oracle);

        gw.request_advice("a1".into(), "Started".into(), &stats);
        let reply = gw.next_reply().await.unwrap();
        assert!(matches!(
            reply,
            OracleReply::Advice { result: Err(OracleError::Unavailable(_)), .. }
        ));
    }

    #[test]
    fn dropped_guard_reports_unavailable() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        drop(ReplyGuard { tx, kind: CallKind::Shock, request_id: Some("s9".into()) });
        assert!(matches!(
            rx.try_recv(),
            Ok(OracleReply::Shock { result: Err(OracleError::Unavailable(_)), .. })
        ));
    }

    #[tokio::test]
    async fn next_reply_is_none_when_idle() {
        let (mut gw, _) = gateway(ScriptedOracle::new());
        assert!(gw.next_reply().await.is_none());
    }
}

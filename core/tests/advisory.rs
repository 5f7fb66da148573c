//! Advisory gateway through the engine: periodic shocks, action advice,
//! oracle failures.
//!
//! Async tests run the oracle on a tokio runtime and use
//! `flush_advisories()` to wait for in-flight calls.

use async_trait::async_trait;
use ecovillage_core::{
    command::PlayerCommand,
    config::SessionConfig,
    engine::SessionEngine,
    error::OracleError,
    event::SimEvent,
    ledger::PlayerStats,
    oracle::{AdvisoryOracle, EconomicEvent, EventScope, ScriptedOracle},
};
use std::{sync::Arc, time::Duration};

fn build(session_id: &str, oracle: ScriptedOracle) -> SessionEngine {
    build_with(session_id, SessionConfig::standard(), oracle)
}

fn build_with(session_id: &str, config: SessionConfig, oracle: ScriptedOracle) -> SessionEngine {
    build_on(session_id, config, Arc::new(oracle))
}

fn build_on(session_id: &str, config: SessionConfig, oracle: Arc<dyn AdvisoryOracle>) -> SessionEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    SessionEngine::build_test_with(session_id.to_string(), 31, config, oracle)
        .expect("build test engine")
}

/// Oracle whose advice call panics mid-flight.
struct PanickingOracle;

#[async_trait]
impl AdvisoryOracle for PanickingOracle {
    async fn generate_shock(&self, _stats: &PlayerStats) -> Result<EconomicEvent, OracleError> {
        Err(OracleError::Unavailable("offline".into()))
    }

    async fn advise(&self, _action: &str, _stats: &PlayerStats) -> Result<String, OracleError> {
        panic!("mentor fell off the zipline")
    }
}

/// Answers every call, each kind after its own delay.
struct StaggeredOracle {
    shock:        EconomicEvent,
    shock_delay:  Duration,
    advice:       String,
    advice_delay: Duration,
}

#[async_trait]
impl AdvisoryOracle for StaggeredOracle {
    async fn generate_shock(&self, _stats: &PlayerStats) -> Result<EconomicEvent, OracleError> {
        tokio::time::sleep(self.shock_delay).await;
        Ok(self.shock.clone())
    }

    async fn advise(&self, _action: &str, _stats: &PlayerStats) -> Result<String, OracleError> {
        tokio::time::sleep(self.advice_delay).await;
        Ok(self.advice.clone())
    }
}

fn shock(title: &str, concept: &str) -> EconomicEvent {
    EconomicEvent {
        title: title.into(),
        description: format!("{title} hits the valley."),
        impact: "Visitors notice.".into(),
        concept: concept.into(),
        scope: EventScope::Community,
    }
}

fn assign_coffee(slot_id: usize) -> PlayerCommand {
    PlayerCommand::AssignService { slot_id, service_id: "coffee".into(), guest_name: None }
}

#[tokio::test]
async fn negative_shock_costs_eco_score() {
    let oracle = ScriptedOracle::new();
    oracle.push_shock(Ok(shock("Diesel Haze", "Negative Externality")));
    let mut engine = build("neg-shock", oracle);

    engine.run_ticks(45).unwrap();
    assert_eq!(engine.store_event_count("shock_requested").unwrap(), 1);

    let applied = engine.flush_advisories().await.unwrap();
    assert!(matches!(applied.as_slice(), [SimEvent::ShockApplied { eco_penalty: 5, .. }]));
    assert_eq!(engine.stats().eco_score, 80);
    assert_eq!(engine.advisory_text(), "Diesel Haze hits the valley.");
    assert_eq!(engine.current_event().map(|e| e.title.as_str()), Some("Diesel Haze"));
}

#[tokio::test]
async fn positive_shock_only_changes_the_story() {
    let oracle = ScriptedOracle::new();
    oracle.push_shock(Ok(shock("Ranger Fund Drive", "Public Goods")));
    let mut engine = build("pos-shock", oracle);

    engine.run_ticks(45).unwrap();
    engine.flush_advisories().await.unwrap();

    assert_eq!(engine.stats().eco_score, 85);
    assert_eq!(engine.advisory_text(), "Ranger Fund Drive hits the valley.");
}

#[tokio::test]
async fn failed_shock_keeps_previous_event_and_text() {
    let oracle = ScriptedOracle::new();
    oracle.push_shock(Ok(shock("Harvest Boom", "Positive Supply Shock")));
    oracle.push_shock(Err(OracleError::Malformed("missing field `scope`".into())));
    let mut engine = build("bad-shock", oracle);

    engine.run_ticks(45).unwrap();
    engine.flush_advisories().await.unwrap();
    engine.run_ticks(45).unwrap();
    let applied = engine.flush_advisories().await.unwrap();

    assert!(matches!(
        applied.as_slice(),
        [SimEvent::OracleFailed { error_kind, .. }] if error_kind == "oracle_malformed"
    ));
    assert_eq!(engine.advisory_text(), "Harvest Boom hits the valley.");
    assert_eq!(engine.current_event().map(|e| e.title.as_str()), Some("Harvest Boom"));
    assert_eq!(engine.stats().eco_score, 85);
}

#[tokio::test]
async fn shock_interval_counts_from_last_trigger() {
    let mut engine = build("interval", ScriptedOracle::new());

    engine.run_ticks(44).unwrap();
    assert_eq!(engine.store_event_count("shock_requested").unwrap(), 0);
    engine.run_ticks(1).unwrap();
    assert_eq!(engine.store_event_count("shock_requested").unwrap(), 1);
    engine.run_ticks(90).unwrap();
    assert_eq!(engine.store_event_count("shock_requested").unwrap(), 3);

    // every scripted queue is empty, so each call fails
    engine.flush_advisories().await.unwrap();
    assert_eq!(engine.store_event_count("oracle_failed").unwrap(), 3);
    assert_eq!(engine.advisory_text(), engine.config().advisory.greeting);
}

#[tokio::test]
async fn assignment_advice_replaces_text_without_blocking() {
    let oracle = ScriptedOracle::new();
    oracle.push_advice(Ok("Coffee tours help the farmers. ¡Pura vida!".into()));
    oracle.push_advice(Ok("Another tour already? Somos un equipo.".into()));
    let mut engine = build("advice", oracle);

    engine.submit(assign_coffee(0)).unwrap();
    // committed before the oracle answers
    assert!(!engine.scheduler().slot(0).unwrap().is_empty());
    assert_eq!(engine.stats().stock("beans"), 9);

    engine.flush_advisories().await.unwrap();
    assert_eq!(engine.advisory_text(), "Coffee tours help the farmers. ¡Pura vida!");

    engine.submit(assign_coffee(1)).unwrap();
    engine.flush_advisories().await.unwrap();
    assert_eq!(engine.advisory_text(), "Another tour already? Somos un equipo.");
    assert_eq!(engine.store_event_count("advice_received").unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_oracle_times_out_and_keeps_greeting() {
    let oracle = ScriptedOracle::new().with_delay(Duration::from_secs(60));
    oracle.push_advice(Ok("far too late".into()));
    let mut config = SessionConfig::standard();
    config.advisory.oracle_timeout_ms = 500;
    let mut engine = build_with("slow", config, oracle);

    engine.submit(assign_coffee(0)).unwrap();
    let applied = engine.flush_advisories().await.unwrap();

    assert!(matches!(
        applied.as_slice(),
        [SimEvent::OracleFailed { error_kind, .. }] if error_kind == "oracle_unavailable"
    ));
    assert_eq!(engine.advisory_text(), engine.config().advisory.greeting);
    assert_eq!(engine.stats().stock("beans"), 9);
}

#[test]
fn without_runtime_oracle_calls_fail_softly() {
    let oracle = ScriptedOracle::new();
    oracle.push_shock(Ok(shock("Diesel Haze", "Negative Externality")));
    let mut engine = build("no-runtime", oracle);

    engine.run_ticks(46).unwrap();

    // the reply is picked up at the start of the tick after the trigger
    assert_eq!(engine.store_event_count("oracle_failed").unwrap(), 1);
    assert_eq!(engine.stats().eco_score, 85);
    assert!(engine.current_event().is_none());
}

#[tokio::test]
async fn paused_session_fires_no_shocks() {
    let mut engine = build("paused", ScriptedOracle::new());
    engine.submit(PlayerCommand::Pause).unwrap();
    engine.run_ticks(100).unwrap();

    assert_eq!(engine.clock.current_tick, 0);
    assert_eq!(engine.store_event_count("shock_requested").unwrap(), 0);
}

#[tokio::test]
async fn panicking_oracle_settles_as_failed_call() {
    let mut engine = build_on("panic", SessionConfig::standard(), Arc::new(PanickingOracle));

    engine.submit(assign_coffee(0)).unwrap();
    let applied = tokio::time::timeout(Duration::from_secs(5), engine.flush_advisories())
        .await
        .expect("flush must not hang")
        .unwrap();

    assert!(matches!(
        applied.as_slice(),
        [SimEvent::OracleFailed { error_kind, .. }] if error_kind == "oracle_unavailable"
    ));
    assert_eq!(engine.advisory().in_flight(), 0);
    assert!(!engine.scheduler().slot(0).unwrap().is_empty());
    assert_eq!(engine.advisory_text(), engine.config().advisory.greeting);
}

#[test]
fn runtime_dropped_mid_call_still_settles() {
    let oracle = ScriptedOracle::new().with_delay(Duration::from_secs(60));
    oracle.push_advice(Ok("never delivered".into()));
    let mut engine = build("dropped", oracle);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        engine.submit(assign_coffee(0)).unwrap();
    });
    assert_eq!(engine.advisory().in_flight(), 1);
    drop(runtime);

    engine.tick().unwrap();
    assert_eq!(engine.advisory().in_flight(), 0);
    assert_eq!(engine.store_event_count("oracle_failed").unwrap(), 1);

    let fresh = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    assert!(fresh.block_on(engine.flush_advisories()).unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn overlapping_calls_slow_shock_lands_last() {
    let oracle = StaggeredOracle {
        shock:        shock("Diesel Haze", "Negative Externality"),
        shock_delay:  Duration::from_secs(10),
        advice:       "Tourists love the farm.".into(),
        advice_delay: Duration::from_secs(2),
    };
    let mut engine = build_on("overlap-shock", SessionConfig::standard(), Arc::new(oracle));

    engine.run_ticks(45).unwrap();
    engine.submit(assign_coffee(0)).unwrap();
    assert_eq!(engine.advisory().in_flight(), 2);

    let applied = engine.flush_advisories().await.unwrap();
    assert!(matches!(
        applied.as_slice(),
        [SimEvent::AdviceReceived { .. }, SimEvent::ShockApplied { eco_penalty: 5, .. }]
    ));
    assert_eq!(engine.advisory_text(), "Diesel Haze hits the valley.");
    assert_eq!(engine.current_event().map(|e| e.title.as_str()), Some("Diesel Haze"));
    assert_eq!(engine.stats().eco_score, 80);
}

#[tokio::test(start_paused = true)]
async fn overlapping_calls_slow_advice_keeps_shock_effects() {
    let oracle = StaggeredOracle {
        shock:        shock("Diesel Haze", "Negative Externality"),
        shock_delay:  Duration::from_secs(2),
        advice:       "Tourists love the farm.".into(),
        advice_delay: Duration::from_secs(10),
    };
    let mut engine = build_on("overlap-advice", SessionConfig::standard(), Arc::new(oracle));

    engine.run_ticks(45).unwrap();
    engine.submit(assign_coffee(0)).unwrap();

    let applied = engine.flush_advisories().await.unwrap();
    assert!(matches!(
        applied.as_slice(),
        [SimEvent::ShockApplied { eco_penalty: 5, .. }, SimEvent::AdviceReceived { .. }]
    ));
    assert_eq!(engine.advisory_text(), "Tourists love the farm.");
    assert_eq!(engine.current_event().map(|e| e.title.as_str()), Some("Diesel Haze"));
    assert_eq!(engine.stats().eco_score, 80);
}

//! Booking board through the engine: acceptance, capacity, refresh.

use ecovillage_core::{
    command::{CommandOutcome, PlayerCommand},
    config::SessionConfig,
    engine::SessionEngine,
    error::IntentError,
    oracle::VillageElderOracle,
};
use std::sync::Arc;

fn build(session_id: &str, seed: u64) -> SessionEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    SessionEngine::build_test(session_id.to_string(), seed).expect("build test engine")
}

fn fill_all_slots(engine: &mut SessionEngine) {
    for (slot_id, service) in ["lodge", "lodge", "zipline", "zipline", "coffee", "coffee"]
        .into_iter()
        .enumerate()
    {
        engine
            .submit(PlayerCommand::AssignService {
                slot_id,
                service_id: service.into(),
                guest_name: Some(format!("Guest {slot_id}")),
            })
            .expect("assign");
    }
}

#[test]
fn accepted_booking_takes_lowest_free_slot() {
    let mut engine = build("accept", 21);
    engine
        .submit(PlayerCommand::AssignService {
            slot_id: 0,
            service_id: "coffee".into(),
            guest_name: None,
        })
        .unwrap();

    let request = engine.bookings()[0].clone();
    let outcome = engine
        .submit(PlayerCommand::AcceptBooking { booking_id: request.id.clone() })
        .unwrap();

    let accepted = match outcome {
        CommandOutcome::BookingAccepted(a) => a,
        other => panic!("expected a booking, got {other:?}"),
    };
    assert_eq!(accepted.slot_id, 1);
    assert_eq!(accepted.occupancy.guest_name, request.group_name);
    assert_eq!(accepted.occupancy.service_id, request.service_id);
    assert_eq!(engine.bookings().len(), 3);
    assert!(engine.bookings().iter().all(|b| b.id != request.id));
    assert_eq!(engine.store_event_count("booking_accepted").unwrap(), 1);
    assert_eq!(engine.store_event_count("advice_requested").unwrap(), 2);
}

#[test]
fn full_house_keeps_booking_pending() {
    let mut engine = build("full", 22);
    fill_all_slots(&mut engine);
    let before = engine.stats().clone();

    let booking_id = engine.bookings()[0].id.clone();
    assert_eq!(
        engine.submit(PlayerCommand::AcceptBooking { booking_id: booking_id.clone() }),
        Err(IntentError::NoCapacity)
    );
    assert_eq!(engine.bookings().len(), 4);
    assert!(engine.bookings().iter().any(|b| b.id == booking_id));
    assert_eq!(engine.stats(), &before);
    assert_eq!(engine.advisory_text(), "¡Qué pena! No more room. We need more capacity!");
}

#[test]
fn out_of_stock_booking_stays_pending() {
    let mut config = SessionConfig::standard();
    config.player.inventory.clear();
    let mut engine =
        SessionEngine::build_test_with("empty".into(), 23, config, Arc::new(VillageElderOracle::new()))
            .unwrap();

    let booking_id = engine.bookings()[0].id.clone();
    let err = engine
        .submit(PlayerCommand::AcceptBooking { booking_id: booking_id.clone() })
        .unwrap_err();

    assert!(matches!(err, IntentError::InsufficientResource { available: 0, .. }));
    assert!(engine.bookings().iter().any(|b| b.id == booking_id));
    assert!(engine.scheduler().slot(0).unwrap().is_empty());
    assert!(engine.advisory_text().starts_with("¡Ay caramba! We're out of"));
}

#[test]
fn unknown_booking_is_rejected() {
    let mut engine = build("unknown", 24);
    assert_eq!(
        engine.submit(PlayerCommand::AcceptBooking { booking_id: "b-9-nope".into() }),
        Err(IntentError::UnknownBooking("b-9-nope".into()))
    );
}

#[test]
fn refresh_replaces_the_whole_batch() {
    let mut engine = build("refresh", 25);
    let old: Vec<String> = engine.bookings().iter().map(|b| b.id.clone()).collect();

    let outcome = engine.submit(PlayerCommand::RefreshBookings).unwrap();
    assert_eq!(outcome, CommandOutcome::BookingsRefreshed { count: 4 });
    assert!(engine.bookings().iter().all(|b| !old.contains(&b.id)));
    // one batch at session start, one on refresh
    assert_eq!(engine.store_event_count("bookings_generated").unwrap(), 2);
}

#[test]
fn offered_pay_includes_markup_over_quoted_tier() {
    let engine = build("prices", 26);
    let catalog = &engine.config().catalog;
    for request in engine.bookings() {
        let base = catalog.get(&request.service_id, request.quoted_tier).unwrap().base_price;
        assert!(request.offered_pay >= base);
        assert!(request.offered_pay as f64 <= base as f64 * 1.5 + 0.5);
        assert!((1..=2).contains(&request.quantity));
    }
}

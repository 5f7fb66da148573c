//! Simulation core of the eco-village tourism game.
//!
//! One `SessionEngine` owns one game session: the clock, the economy
//! ledger, the service slots, the booking board, the simulated
//! community, and the gateway to the advisory oracle.

pub mod advisory;
pub mod booking;
pub mod catalog;
pub mod clock;
pub mod command;
pub mod community;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod ledger;
pub mod name_generator;
pub mod oracle;
pub mod rng;
pub mod scheduler;
pub mod snapshot;
pub mod store;
pub mod subsystem;
pub mod types;

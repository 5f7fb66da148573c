use crate::types::{Money, SlotId, TierLevel};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Catalog has no service '{service_id}' at tier {tier}")]
    CatalogMiss { service_id: String, tier: TierLevel },

    #[error("Session not initialized")]
    SessionNotInitialized,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;

/// Recoverable rejections of a player intent.
///
/// None of these end the session: the engine reports them through the
/// advisory text and the event log, and state is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntentError {
    #[error("not enough {resource}: need {required}, have {available}")]
    InsufficientResource {
        resource:  String,
        required:  u32,
        available: u32,
    },

    #[error("not enough money: need {required}, have {available}")]
    InsufficientFunds { required: Money, available: Money },

    #[error("slot {0} is already occupied")]
    SlotOccupied(SlotId),

    #[error("slot {0} is empty")]
    SlotEmpty(SlotId),

    #[error("slot {slot_id} is not ready ({remaining_ms} ms remaining)")]
    NotReady { slot_id: SlotId, remaining_ms: u64 },

    #[error("no empty slot available")]
    NoCapacity,

    #[error("service '{service_id}' is already at max tier {tier}")]
    MaxTierReached { service_id: String, tier: TierLevel },

    #[error("unknown slot {0}")]
    UnknownSlot(SlotId),

    #[error("unknown service '{0}'")]
    UnknownService(String),

    #[error("unknown booking '{0}'")]
    UnknownBooking(String),

    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    #[error("invalid amount {0}")]
    InvalidAmount(Money),

    #[error("session is paused")]
    Paused,
}

impl IntentError {
    /// Stable snake_case name, used for the event log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientResource { .. } => "insufficient_resource",
            Self::InsufficientFunds { .. }    => "insufficient_funds",
            Self::SlotOccupied(_)             => "slot_occupied",
            Self::SlotEmpty(_)                => "slot_empty",
            Self::NotReady { .. }             => "not_ready",
            Self::NoCapacity                  => "no_capacity",
            Self::MaxTierReached { .. }       => "max_tier_reached",
            Self::UnknownSlot(_)              => "unknown_slot",
            Self::UnknownService(_)           => "unknown_service",
            Self::UnknownBooking(_)           => "unknown_booking",
            Self::UnknownResource(_)          => "unknown_resource",
            Self::InvalidAmount(_)            => "invalid_amount",
            Self::Paused                      => "paused",
        }
    }
}

/// Failures of the external advisory oracle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("oracle returned malformed output: {0}")]
    Malformed(String),
}

impl OracleError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "oracle_unavailable",
            Self::Malformed(_)   => "oracle_malformed",
        }
    }
}

//! Shared primitive types used across the entire simulation.

/// A simulation tick. One tick = one clock interval (1 second by default).
pub type Tick = u64;

/// Simulated milliseconds since session start.
pub type Timestamp = u64;

/// Whole currency units (colones). Signed so deltas share the type.
pub type Money = i64;

/// A stable, unique identifier for any entity in the simulation.
pub type EntityId = String;

/// The canonical session identifier.
pub type SessionId = String;

/// Catalog key for a service line ("lodge", "zipline", ...).
pub type ServiceId = String;

/// Upgrade level of a service. Starts at 1.
pub type TierLevel = u32;

/// Index of a service bay, `0..slot_count`.
pub type SlotId = usize;

//! External services for the iteration log aggregate.
//!
//! Services provide the aggregate's two ambient dependencies, time and id
//! generation, without coupling it to specific implementations. Tests supply
//! the fixed clock and the sequential id provider for deterministic output.

use crate::domain::types::TimestampUtc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Services injected into the log aggregate for command handling.
#[derive(Debug, Clone, Default)]
pub struct LogServices {
    pub clock: LogClock,
    pub ids: IdProvider,
}

/// Clock service for timestamp generation.
#[derive(Debug, Clone, Default)]
pub enum LogClock {
    /// Wall-clock time.
    #[default]
    System,
    /// A pinned timestamp, for deterministic tests.
    Fixed(TimestampUtc),
}

impl LogClock {
    /// Returns the current UTC timestamp.
    pub fn now(&self) -> TimestampUtc {
        match self {
            LogClock::System => TimestampUtc::now(),
            LogClock::Fixed(ts) => *ts,
        }
    }
}

/// Single source of unique ids for versions, feedback and suggestions.
///
/// Centralized here so no call site reaches for ambient randomness directly.
#[derive(Debug, Clone, Default)]
pub enum IdProvider {
    /// Random v4 UUIDs.
    #[default]
    Random,
    /// Counter-derived UUIDs, for deterministic tests.
    Sequential(Arc<AtomicU64>),
}

impl IdProvider {
    /// Creates a sequential provider starting at 1.
    pub fn sequential() -> Self {
        Self::Sequential(Arc::new(AtomicU64::new(1)))
    }

    /// Returns the next unique id.
    pub fn next_id(&self) -> Uuid {
        match self {
            IdProvider::Random => Uuid::new_v4(),
            IdProvider::Sequential(counter) => {
                Uuid::from_u128(u128::from(counter.fetch_add(1, Ordering::SeqCst)))
            }
        }
    }
}

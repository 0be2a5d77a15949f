/// Account record, balance invariants and mutation primitives.
pub mod account;

/// Currency codes and the directed exchange-rate table.
pub mod rates;

/// The transaction-fee policy, a pure calculation.
pub mod fee;

/// Account persistence contract, plus an "in memory" implementation with
/// row-level exclusive locks and optimistic-versioned saves.
pub mod store;

/// Bounded fixed-delay retry for transient failures.
pub mod retry;

/// The transfer engine: validation, lock ordering, currency conversion,
/// fees and the retry loop. The only part of the crate with real failure
/// semantics; everything else serves it.
pub mod engine;

/// Boundary layer: CSV request parsing, seed data and service wiring.
/// Could live in a crate of its own, but the integration tests drive it
/// too, so it stays here.
pub mod bin_utils;

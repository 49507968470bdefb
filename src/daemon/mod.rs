//! Daemon subsystem: detach and lifecycle, signal handling, and the
//! maintenance loop.

#[cfg(feature = "daemon")]
pub mod lifecycle;
#[cfg(feature = "daemon")]
pub mod loop_main;
#[cfg(feature = "daemon")]
pub mod signals;

//! Hardware-independent core library for spectro-node
//!
//! This crate contains all platform-agnostic logic for the battery-powered spectral
//! acquisition node: the wake/sleep state machine, the sample collector that drives the
//! light source and optical sensor, the fixed-capacity sample store, the connectivity
//! policy (link/session retries, bounded flush) and the telemetry payload builders.
//!
//! Peripherals and transport primitives are reached through traits so the whole engine
//! compiles on both embedded targets and desktop hosts (for the simulator and tests).
//! It is `#![no_std]` and never allocates outside of tests.

#![no_std]

extern crate alloc;

pub mod acquisition;
pub mod app_state;
pub mod board;
pub mod config;
pub mod connectivity;
pub mod light;
pub mod scheduler;
pub mod sensors;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

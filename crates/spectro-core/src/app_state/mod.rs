//! Node-wide state and error types for spectro-node

use log::{debug, error};
use thiserror_no_std::Error;

use crate::config::ConfigError;
use crate::sensors::{ClockError, SensorError};
use crate::storage::SampleStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Cold boot, peripherals not initialized yet
    Booting,
    Sleeping,
    Woken,
    Collecting,
    Reporting,
    ReportingVitalsOnly,
    Draining,
}

impl RunState {
    /// Whether the wake cycle may move from `self` to `next`.
    pub const fn can_transition_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (Self::Booting, Self::Sleeping)
                | (Self::Sleeping, Self::Woken)
                | (Self::Woken, Self::Collecting)
                | (Self::Woken, Self::ReportingVitalsOnly)
                | (Self::Collecting, Self::Reporting)
                | (Self::Reporting, Self::Draining)
                | (Self::ReportingVitalsOnly, Self::Draining)
                | (Self::Draining, Self::Sleeping)
        )
    }
}

/// Everything that must survive between wake cycles.
///
/// One explicitly owned value instead of process-wide globals: the scheduler holds it
/// and lends the parts each component needs. It lives in RAM that stays powered
/// during light sleep and is lost on any reset.
pub struct NodeContext<const CAP: usize> {
    run_state: RunState,
    pub store: SampleStore<CAP>,
    /// Batches collected in earlier cycles that were never offered to a broker
    pub pending_groups: usize,
    /// Completed wake cycles since boot
    pub cycles: u32,
}

impl<const CAP: usize> NodeContext<CAP> {
    pub const fn new() -> Self {
        Self {
            run_state: RunState::Booting,
            store: SampleStore::new(),
            pending_groups: 0,
            cycles: 0,
        }
    }

    pub const fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Move the state machine forward. Illegal transitions are logged and ignored.
    pub fn transition(&mut self, next: RunState) -> bool {
        if !self.run_state.can_transition_to(next) {
            error!(
                "Rejected run state transition {:?} -> {:?}",
                self.run_state, next
            );
            return false;
        }
        debug!("Run state {:?} -> {:?}", self.run_state, next);
        self.run_state = next;
        true
    }

    /// Record newly collected batches as unreported, bounded by what the store
    /// can still hand out.
    pub fn add_pending(&mut self, groups: usize) {
        self.pending_groups = (self.pending_groups + groups).min(self.store.groups_available());
    }
}

impl<const CAP: usize> Default for NodeContext<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Sensor error: {0}")]
    Sensor(SensorError),
    #[error("Clock error: {0}")]
    Clock(ClockError),
    #[error("Configuration error: {0}")]
    Config(ConfigError),
}

impl From<SensorError> for AppError {
    fn from(value: SensorError) -> Self {
        Self::Sensor(value)
    }
}

impl From<ClockError> for AppError {
    fn from(value: ClockError) -> Self {
        Self::Clock(value)
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_with_ts;

    #[test]
    fn test_wake_cycle_transitions() {
        let mut ctx = NodeContext::<8>::new();
        assert_eq!(ctx.run_state(), RunState::Booting);

        for next in [
            RunState::Sleeping,
            RunState::Woken,
            RunState::Collecting,
            RunState::Reporting,
            RunState::Draining,
            RunState::Sleeping,
            RunState::Woken,
            RunState::ReportingVitalsOnly,
            RunState::Draining,
            RunState::Sleeping,
        ] {
            assert!(ctx.transition(next), "transition to {:?}", next);
        }
    }

    #[test]
    fn test_illegal_transition_is_rejected() {
        let mut ctx = NodeContext::<8>::new();
        assert!(!ctx.transition(RunState::Collecting));
        assert_eq!(ctx.run_state(), RunState::Booting);

        ctx.transition(RunState::Sleeping);
        assert!(!ctx.transition(RunState::Draining));
        assert_eq!(ctx.run_state(), RunState::Sleeping);
    }

    #[test]
    fn test_pending_groups_bounded_by_store() {
        let mut ctx = NodeContext::<8>::new();
        for ts in 0..8 {
            ctx.store.push(sample_with_ts(ts));
        }
        ctx.add_pending(1);
        assert_eq!(ctx.pending_groups, 1);
        ctx.add_pending(5);
        assert_eq!(ctx.pending_groups, 2);
    }
}

//! # Scheduler Configuration
//!
//! Compile-time limits and the runtime tunables handed to the scheduler at
//! initialization. Table and queue sizes are fixed at compile time, so there is
//! no dynamic allocation anywhere in the core.

use crate::error::{SchedError, SchedResult};

/// Number of process slots in the table. Must match `PSTAT_NPROC` of the
/// snapshot ABI consumed by user-space monitors.
pub const NPROC: usize = 64;

/// Number of ready queues / priority levels. Level 0 is the highest.
pub const NUM_QUEUES: usize = 3;

/// Maximum process name length, including the NUL padding.
pub const PROC_NAME_LEN: usize = 16;

/// Ticks between global priority boosts unless overridden at init.
pub const DEFAULT_BOOST_INTERVAL: u64 = 100;

/// Runtime tunables of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedConfig {
    /// Ticks between two global boosts. Every RUNNABLE or RUNNING process
    /// below level 0 is moved back to level 0 when this many ticks have
    /// elapsed since the previous boost.
    pub boost_interval: u64,
}

impl SchedConfig {
    pub const DEFAULT: Self = Self {
        boost_interval: DEFAULT_BOOST_INTERVAL,
    };

    pub const fn with_boost_interval(boost_interval: u64) -> Self {
        Self { boost_interval }
    }

    /// Reject settings the policy cannot honor.
    ///
    /// A zero interval would boost on every tick, so no process could ever be
    /// observed below level 0.
    pub fn validate(&self) -> SchedResult<()> {
        if self.boost_interval == 0 {
            return Err(SchedError::InvalidConfig);
        }
        Ok(())
    }
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(SchedConfig::default().boost_interval, DEFAULT_BOOST_INTERVAL);
        assert!(SchedConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_boost_interval_is_rejected() {
        assert_eq!(
            SchedConfig::with_boost_interval(0).validate(),
            Err(SchedError::InvalidConfig)
        );
    }
}

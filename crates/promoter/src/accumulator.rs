//! Consecutive-failure accounting.

use crate::types::{CountingPolicy, ProbeResult};

/// Tracks failed probes for the control loop
#[derive(Debug, Clone, Default)]
pub struct FailureAccumulator {
    count: u64,
    policy: CountingPolicy,
}

impl FailureAccumulator {
    /// Create an accumulator at zero
    pub fn new(policy: CountingPolicy) -> Self {
        Self { count: 0, policy }
    }

    /// Feed one probe result and return the updated count.
    ///
    /// A failure adds exactly one. A success leaves the count untouched under
    /// `Sticky` and clears it under `ResetOnSuccess`.
    pub fn record_result(&mut self, result: &ProbeResult) -> u64 {
        if result.reachable {
            self.record_success()
        } else {
            self.record_failure()
        }
    }

    /// Count one failed probe
    pub fn record_failure(&mut self) -> u64 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    /// Note a successful probe
    pub fn record_success(&mut self) -> u64 {
        if self.policy == CountingPolicy::ResetOnSuccess {
            self.count = 0;
        }
        self.count
    }

    /// Whether the count has reached `threshold`
    pub fn threshold_crossed(&self, threshold: u32) -> bool {
        self.count >= u64::from(threshold)
    }

    /// Current failure count
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Switch policy on reload. The count carries over.
    pub fn set_policy(&mut self, policy: CountingPolicy) {
        self.policy = policy;
    }
}

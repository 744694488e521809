//! Engine configuration
//!
//! One `EngineConfig` is threaded into every evaluator and tuple-list
//! factory. Values are fixed for the lifetime of an evaluator.

use mdxcalc_diagnostics::{MDX0401, MdxError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of tuples in any tuple list; 0 means unbounded
    pub result_limit: usize,
    /// Poll for cancellation every this many iterations; 0 disables polling
    pub check_cancel_or_timeout_interval: u64,
    /// Query timeout in milliseconds; 0 means no timeout
    pub query_timeout_ms: u64,
    /// Record per-node timings
    pub profiling: bool,
    /// Maximum number of evaluation phases before giving up
    pub max_phases: usize,
    /// Number of queued cell requests that ends a phase early
    pub cell_batch_size: usize,
    /// Maximum nesting of calc evaluations
    pub max_eval_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            result_limit: 0,
            check_cancel_or_timeout_interval: 1000,
            query_timeout_ms: 0,
            profiling: true,
            max_phases: 16,
            cell_batch_size: 1000,
            max_eval_depth: 512,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, MdxError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| MdxError::system(MDX0401, format!("Invalid engine configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), MdxError> {
        if self.max_phases == 0 {
            return Err(MdxError::system(MDX0401, "max_phases must be at least 1"));
        }
        if self.max_eval_depth == 0 {
            return Err(MdxError::system(MDX0401, "max_eval_depth must be at least 1"));
        }
        if self.cell_batch_size == 0 {
            return Err(MdxError::system(MDX0401, "cell_batch_size must be at least 1"));
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        (self.query_timeout_ms > 0).then(|| Duration::from_millis(self.query_timeout_ms))
    }

    pub fn with_result_limit(mut self, limit: usize) -> Self {
        self.result_limit = limit;
        self
    }

    pub fn with_check_interval(mut self, interval: u64) -> Self {
        self.check_cancel_or_timeout_interval = interval;
        self
    }

    pub fn with_query_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.query_timeout_ms = timeout_ms;
        self
    }

    pub fn with_profiling(mut self, profiling: bool) -> Self {
        self.profiling = profiling;
        self
    }

    pub fn with_max_phases(mut self, max_phases: usize) -> Self {
        self.max_phases = max_phases;
        self
    }

    pub fn with_cell_batch_size(mut self, size: usize) -> Self {
        self.cell_batch_size = size;
        self
    }

    pub fn with_max_eval_depth(mut self, depth: usize) -> Self {
        self.max_eval_depth = depth;
        self
    }
}

//! Execution pattern monitor
//!
//! Keeps a time-windowed history of tool calls for one session and
//! classifies the recent sequence. A call can be individually valid and still
//! be refused because the sequence around it looks stuck.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use toolgate_core::{Ema, Parameters, PatternThresholds};
use tracing::debug;

/// Smoothing factor for the reported success rate.
const SUCCESS_RATE_ALPHA: f64 = 0.2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPattern {
    #[default]
    Normal,
    Repetitive,
    Erroneous,
    Looping,
}

impl std::fmt::Display for ExecutionPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            ExecutionPattern::Normal => "normal",
            ExecutionPattern::Repetitive => "repetitive",
            ExecutionPattern::Erroneous => "erroneous",
            ExecutionPattern::Looping => "looping",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CallOutcome {
    Success { execution_time: Option<Duration> },
    Failure { error: String, execution_time: Option<Duration> },
}

impl CallOutcome {
    pub fn success(execution_time: Duration) -> Self {
        Self::Success { execution_time: Some(execution_time) }
    }

    /// A call rejected before it ran.
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure { error: error.into(), execution_time: None }
    }

    /// A call that ran and failed.
    pub fn failed_after(error: impl Into<String>, execution_time: Duration) -> Self {
        Self::Failure { error: error.into(), execution_time: Some(execution_time) }
    }

    pub fn execution_time(&self) -> Option<Duration> {
        match self {
            Self::Success { execution_time } | Self::Failure { execution_time, .. } => *execution_time,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// One observed call attempt. Immutable once recorded.
#[derive(Clone, Debug)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub parameters: Parameters,
    pub timestamp: DateTime<Utc>,
    pub outcome: CallOutcome,
}

impl ToolCallRecord {
    pub fn success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            CallOutcome::Failure { error, .. } => Some(error),
            CallOutcome::Success { .. } => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExecutionMetrics {
    pub call_history: VecDeque<ToolCallRecord>,
    /// Lifetime totals, never pruned.
    pub error_count: u64,
    pub success_count: u64,
    pub lifetime_calls: u64,
    pub last_error_time: Option<DateTime<Utc>>,
    pub pattern_detected: ExecutionPattern,
    pub loop_detected: bool,
    pub success_rate: Ema,
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self {
            call_history: VecDeque::new(),
            error_count: 0,
            success_count: 0,
            lifetime_calls: 0,
            last_error_time: None,
            pattern_detected: ExecutionPattern::Normal,
            loop_detected: false,
            success_rate: Ema::new(SUCCESS_RATE_ALPHA, 1.0),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PatternVerdict {
    pub invalid: bool,
    pub pattern: ExecutionPattern,
    pub reason: String,
}

impl PatternVerdict {
    fn normal() -> Self {
        Self {
            invalid: false,
            pattern: ExecutionPattern::Normal,
            reason: "Pattern normal".to_string(),
        }
    }

    fn invalid(pattern: ExecutionPattern, reason: impl Into<String>) -> Self {
        Self { invalid: true, pattern, reason: reason.into() }
    }
}

/// Read-only snapshot for status displays.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PatternStatus {
    pub pattern: ExecutionPattern,
    pub error_count: u64,
    pub success_count: u64,
    /// Calls currently inside the window.
    pub total_calls: usize,
    pub lifetime_calls: u64,
    pub loop_detected: bool,
    pub last_error_time: Option<DateTime<Utc>>,
    pub success_rate: f64,
}

#[derive(Debug)]
pub struct ExecutionMonitor {
    thresholds: PatternThresholds,
    metrics: ExecutionMetrics,
}

impl Default for ExecutionMonitor {
    fn default() -> Self {
        Self::new(PatternThresholds::default())
    }
}

impl ExecutionMonitor {
    pub fn new(thresholds: PatternThresholds) -> Self {
        Self { thresholds, metrics: ExecutionMetrics::default() }
    }

    pub fn thresholds(&self) -> &PatternThresholds {
        &self.thresholds
    }

    pub fn metrics(&self) -> &ExecutionMetrics {
        &self.metrics
    }

    pub fn record_call(&mut self, tool_name: &str, parameters: &Parameters, outcome: CallOutcome) {
        self.record_call_at(tool_name, parameters, outcome, Utc::now());
    }

    /// `record_call` with an explicit clock reading.
    pub fn record_call_at(
        &mut self,
        tool_name: &str,
        parameters: &Parameters,
        outcome: CallOutcome,
        now: DateTime<Utc>,
    ) {
        let m = &mut self.metrics;
        m.lifetime_calls += 1;
        if outcome.is_success() {
            m.success_count += 1;
            m.success_rate.update(1.0);
        } else {
            m.error_count += 1;
            m.last_error_time = Some(now);
            m.success_rate.update(0.0);
        }
        m.call_history.push_back(ToolCallRecord {
            tool_name: tool_name.to_string(),
            parameters: parameters.clone(),
            timestamp: now,
            outcome,
        });

        self.prune(now);

        let verdict = self.detect_invalid_pattern();
        self.metrics.pattern_detected = verdict.pattern;
        self.metrics.loop_detected = verdict.pattern == ExecutionPattern::Looping;
        debug!(
            "recorded {} (window={}, pattern={})",
            tool_name,
            self.metrics.call_history.len(),
            verdict.pattern
        );
    }

    /// Drop records at or beyond the window edge.
    fn prune(&mut self, now: DateTime<Utc>) {
        let window = chrono::Duration::from_std(self.thresholds.window())
            .unwrap_or_else(|_| chrono::Duration::seconds(300));
        let cutoff = now - window;
        while let Some(front) = self.metrics.call_history.front() {
            if front.timestamp > cutoff {
                break;
            }
            self.metrics.call_history.pop_front();
        }
    }

    /// Classify the current window. First matching rule wins.
    pub fn detect_invalid_pattern(&self) -> PatternVerdict {
        let history = &self.metrics.call_history;
        if history.is_empty() {
            return PatternVerdict::normal();
        }
        let t = &self.thresholds;

        let failures: Vec<&ToolCallRecord> = history.iter().filter(|r| !r.success()).collect();
        if failures.len() >= t.max_errors_in_window {
            return PatternVerdict::invalid(
                ExecutionPattern::Erroneous,
                format!("Too many errors ({}) in recent calls", failures.len()),
            );
        }

        if t.max_repetitive_calls > 0 && history.len() >= t.max_repetitive_calls {
            let recent: Vec<_> = history.iter().rev().take(t.max_repetitive_calls).collect();
            let first = recent[0];
            if recent
                .iter()
                .all(|r| r.tool_name == first.tool_name && r.parameters == first.parameters)
            {
                return PatternVerdict::invalid(
                    ExecutionPattern::Repetitive,
                    "Repetitive identical calls detected",
                );
            }
        }

        if t.max_identical_failures > 0 && failures.len() >= t.max_identical_failures {
            let recent = &failures[failures.len() - t.max_identical_failures..];
            let first = recent[0].error_message();
            if recent.iter().all(|r| r.error_message() == first) {
                return PatternVerdict::invalid(
                    ExecutionPattern::Erroneous,
                    "Identical failures repeating",
                );
            }
        }

        if t.loop_length > 0 && history.len() >= t.loop_length {
            let recent: Vec<_> = history.iter().rev().take(t.loop_length).collect();
            let name = &recent[0].tool_name;
            if recent.iter().all(|r| &r.tool_name == name && !r.success()) {
                return PatternVerdict::invalid(ExecutionPattern::Looping, "Infinite loop detected");
            }
        }

        PatternVerdict::normal()
    }

    /// Replace all history and counters with a fresh state.
    pub fn reset_patterns(&mut self) {
        self.metrics = ExecutionMetrics::default();
    }

    pub fn get_pattern_status(&self) -> PatternStatus {
        let m = &self.metrics;
        PatternStatus {
            pattern: m.pattern_detected,
            error_count: m.error_count,
            success_count: m.success_count,
            total_calls: m.call_history.len(),
            lifetime_calls: m.lifetime_calls,
            loop_detected: m.loop_detected,
            last_error_time: m.last_error_time,
            success_rate: m.success_rate.value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(v: serde_json::Value) -> Parameters {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn prune_drops_records_outside_window() {
        let mut m = ExecutionMonitor::default();
        let start = Utc::now();
        m.record_call_at("read_file", &p(json!({"file_path": "a"})), CallOutcome::failure("x"), start);
        m.record_call_at(
            "read_file",
            &p(json!({"file_path": "b"})),
            CallOutcome::failure("y"),
            start + chrono::Duration::seconds(301),
        );
        assert_eq!(m.metrics().call_history.len(), 1);
        assert_eq!(m.metrics().error_count, 2);
        assert_eq!(m.metrics().lifetime_calls, 2);
        assert_eq!(m.get_pattern_status().total_calls, 1);
    }

    #[test]
    fn record_exactly_at_window_edge_is_pruned() {
        let mut m = ExecutionMonitor::default();
        let start = Utc::now();
        m.record_call_at("git_status", &Parameters::new(), CallOutcome::success(Duration::ZERO), start);
        m.record_call_at(
            "list_files",
            &Parameters::new(),
            CallOutcome::success(Duration::ZERO),
            start + chrono::Duration::seconds(300),
        );
        assert_eq!(m.metrics().call_history.len(), 1);
    }

    #[test]
    fn success_rate_is_smoothed() {
        let mut m = ExecutionMonitor::default();
        m.record_call("git_status", &Parameters::new(), CallOutcome::failure("boom"));
        let rate = m.get_pattern_status().success_rate;
        assert!((rate - 0.8).abs() < 1e-9);
    }
}

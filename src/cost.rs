use serde::{Serialize, Serializer};
use std::{fmt, ops::Add};

/// Fixed-point USD amount in millionths of a dollar.
///
/// Phase costs are summed as integers, so a running total never drifts; the
/// float form only exists on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Micros(pub u64);

impl Micros {
    pub const ZERO: Micros = Micros(0);

    pub fn from_usd(usd: f64) -> Self {
        if !usd.is_finite() || usd <= 0.0 {
            return Micros::ZERO;
        }
        Micros((usd * 1_000_000.0).round() as u64)
    }

    pub fn usd(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }
}

impl Add for Micros {
    type Output = Micros;

    fn add(self, rhs: Micros) -> Micros {
        Micros(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Display for Micros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.4}", self.usd())
    }
}

impl Serialize for Micros {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.usd())
    }
}

/// Running cost of one run. Not shared across runs and never persisted.
#[derive(Debug, Default)]
pub struct CostAccumulator {
    total: Micros,
}

impl CostAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cost(&mut self, unit: Micros) -> Micros {
        self.total = self.total + unit;
        self.total
    }

    pub fn total(&self) -> Micros {
        self.total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetDecision {
    Allow,
    /// Spend would cross the warning threshold; carries percent of limit used.
    Warn(u8),
    Block,
}

/// Per-run spend ceiling with a warning threshold.
#[derive(Debug, Clone)]
pub struct BudgetGuard {
    limit: Micros,
    warning_percent: f64,
    warned: bool,
}

impl BudgetGuard {
    pub fn new(limit: Micros, warning_percent: f64) -> Self {
        Self {
            limit,
            warning_percent,
            warned: false,
        }
    }

    pub fn limit(&self) -> Micros {
        self.limit
    }

    /// Decide whether `next` may be added on top of `spent`.
    ///
    /// `Warn` is returned at most once per guard. A zero limit disables the guard.
    pub fn check(&mut self, spent: Micros, next: Micros) -> BudgetDecision {
        if self.limit == Micros::ZERO {
            return BudgetDecision::Allow;
        }
        let projected = spent + next;
        if projected > self.limit {
            return BudgetDecision::Block;
        }
        let used = projected.0 as f64 * 100.0 / self.limit.0 as f64;
        if !self.warned && used >= self.warning_percent {
            self.warned = true;
            return BudgetDecision::Warn(used.floor().min(100.0) as u8);
        }
        BudgetDecision::Allow
    }
}

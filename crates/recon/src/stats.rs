//! Batch-wide statistics. Computed once per run, before any row is flagged.

use serde::Serialize;

use crate::model::OrderView;

/// Tukey fence multiplier.
const IQR_FENCE: f64 = 1.5;

/// Quartiles of the batch's known order amounts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AmountQuartiles {
    pub q1: f64,
    pub q3: f64,
}

impl AmountQuartiles {
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    pub fn lower_fence(&self) -> f64 {
        self.q1 - IQR_FENCE * self.iqr()
    }

    pub fn upper_fence(&self) -> f64 {
        self.q3 + IQR_FENCE * self.iqr()
    }

    pub fn is_outlier(&self, amount: f64) -> bool {
        amount < self.lower_fence() || amount > self.upper_fence()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BatchStats {
    /// `None` when the batch has no known order amount.
    pub amount_quartiles: Option<AmountQuartiles>,
}

impl BatchStats {
    pub fn compute(views: &[OrderView]) -> Self {
        let mut amounts: Vec<f64> = views
            .iter()
            .filter_map(|v| v.order.order_amount)
            .filter(|a| a.is_finite())
            .collect();
        amounts.sort_by(f64::total_cmp);

        let amount_quartiles = match (quantile(&amounts, 0.25), quantile(&amounts, 0.75)) {
            (Some(q1), Some(q3)) => Some(AmountQuartiles { q1, q3 }),
            _ => None,
        };
        if let Some(q) = amount_quartiles {
            log::debug!(
                "order_amount quartiles over {} values: q1={} q3={} fences=[{}, {}]",
                amounts.len(),
                q.q1,
                q.q3,
                q.lower_fence(),
                q.upper_fence()
            );
        }
        Self { amount_quartiles }
    }
}

/// Linear-interpolation quantile of an ascending slice.
fn quantile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let h = last as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(last);
    let frac = h - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

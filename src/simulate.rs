//! Forward outcome simulation for classified occurrences.

use crate::{pattern::Direction, search::ParameterCombination, Percent, Result, OHLCV};

/// Target/stop rule deciding whether an occurrence was a trading success.
///
/// The scan over future bars checks the stop condition *before* the
/// target on every bar, so a bar that crosses both counts as a failure.
/// Running out of future bars without either condition firing is also a
/// failure; an open position at series end is never settled at its
/// current price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeRule {
    target: Percent,
    stop: Percent,
}

impl TradeRule {
    pub fn new(target: f64, stop: f64) -> Result<Self> {
        Ok(Self {
            target: Percent::new(target)?,
            stop: Percent::new(stop)?,
        })
    }

    pub(crate) fn from_combination(combo: &ParameterCombination) -> Self {
        Self {
            target: Percent::new_const(combo.target_percent),
            stop: Percent::new_const(combo.stop_percent),
        }
    }

    #[inline]
    pub fn target(&self) -> f64 {
        self.target.get()
    }

    #[inline]
    pub fn stop(&self) -> f64 {
        self.stop.get()
    }

    /// Replay `future` (bars strictly after the occurrence, in order) and
    /// decide success. Entry price is the occurrence bar's close.
    pub fn evaluate<T: OHLCV>(&self, entry: f64, direction: Direction, future: &[T]) -> bool {
        match direction {
            Direction::Bull => {
                let stop_price = entry * (1.0 - self.stop.fraction());
                let target_price = entry * (1.0 + self.target.fraction());
                for bar in future {
                    if bar.low() < stop_price {
                        return false;
                    }
                    if bar.high() >= target_price {
                        return true;
                    }
                }
                false
            }
            Direction::Bear => {
                let stop_price = entry * (1.0 + self.stop.fraction());
                let target_price = entry * (1.0 - self.target.fraction());
                for bar in future {
                    if bar.high() > stop_price {
                        return false;
                    }
                    if bar.low() <= target_price {
                        return true;
                    }
                }
                false
            }
        }
    }
}

// ============================================================
// TESTS
// ============================================================

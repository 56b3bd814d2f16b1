//! Support/resistance level detection.
//!
//! Levels are derived from local close-price extrema confirmed by a
//! whole-series touch count, or (for charting) from a volume-weighted
//! histogram of closes.

use serde::{Deserialize, Serialize};

use crate::{search::ParameterCombination, Percent, Result, Window, OHLCV};

/// Side of a detected level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelKind {
    Support,
    Resistance,
}

/// A confirmed support or resistance level.
///
/// `bar_index` is the source extremum bar; `time` is its bar time. At
/// detection time the number of closes within the touch threshold of
/// `price` is at least the detector's `min_touches`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub price: f64,
    pub time: i64,
    pub bar_index: usize,
    pub kind: LevelKind,
}

/// Support and resistance levels detected for one parameter combination
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelSet {
    pub support: Vec<Level>,
    pub resistance: Vec<Level>,
}

impl LevelSet {
    #[inline]
    pub fn len(&self) -> usize {
        self.support.len() + self.resistance.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.support.is_empty() && self.resistance.is_empty()
    }
}

// ============================================================
// EXTREMUM LEVELS
// ============================================================

/// Detects levels from local close-price extrema.
///
/// A bar is a local maximum when its close is strictly greater than the
/// close of every bar within `order` bars on each side (strictly less for
/// a minimum). Bars within `order` of either series boundary never
/// qualify. A candidate extremum becomes a level only if at least
/// `min_touches` closes in the entire series lie within
/// `price * touch_threshold / 100` of its price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtremumLevelDetector {
    order: Window,
    min_touches: usize,
    touch_threshold: Percent,
}

impl ExtremumLevelDetector {
    pub fn new(order: usize, min_touches: usize, touch_threshold: f64) -> Result<Self> {
        Ok(Self {
            order: Window::new(order)?,
            min_touches,
            touch_threshold: Percent::new(touch_threshold)?,
        })
    }

    /// Build from a grid combination already validated by the search engine.
    pub(crate) fn from_combination(combo: &ParameterCombination) -> Self {
        Self {
            order: Window::new_const(combo.extrema_order),
            min_touches: combo.min_touches,
            touch_threshold: Percent::new_const(combo.touch_threshold),
        }
    }

    /// Detect all levels in `bars`.
    ///
    /// A series too short for the window, or one where no extremum passes
    /// the touch filter, yields an empty set; downstream stages treat that
    /// as zero classified occurrences, not a fault.
    pub fn detect<T: OHLCV>(&self, bars: &[T]) -> LevelSet {
        let w = self.order.get();
        let n = bars.len();
        let mut set = LevelSet::default();

        if n < 2 * w + 1 {
            return set;
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();

        for i in w..n - w {
            let c = closes[i];
            let neighbors = || closes[i - w..i].iter().chain(closes[i + 1..=i + w].iter());

            let is_max = neighbors().all(|&x| x < c);
            let is_min = !is_max && neighbors().all(|&x| x > c);
            if !is_max && !is_min {
                continue;
            }

            // Touch count over the whole series, the candidate included.
            let tolerance = c * self.touch_threshold.fraction();
            let touches = closes.iter().filter(|&&x| (x - c).abs() < tolerance).count();
            if touches < self.min_touches {
                continue;
            }

            let kind = if is_max {
                LevelKind::Resistance
            } else {
                LevelKind::Support
            };
            let level = Level {
                price: c,
                time: bars[i].time(),
                bar_index: i,
                kind,
            };
            match kind {
                LevelKind::Resistance => set.resistance.push(level),
                LevelKind::Support => set.support.push(level),
            }
        }

        set
    }
}

// ============================================================
// VOLUME PROFILE LEVELS
// ============================================================

/// A price level weighted by traded volume
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeLevel {
    pub price: f64,
    pub volume: f64,
}

/// Detects levels from a volume-weighted histogram of closes.
///
/// Closes are binned over `[min_close, max_close]`; the centers of the
/// `top_n` highest-volume bins become levels. These are a charting aid
/// and do not participate in the grid search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeLevelDetector {
    bins: usize,
    top_n: usize,
}

impl VolumeLevelDetector {
    pub fn new(bins: usize, top_n: usize) -> Result<Self> {
        if bins == 0 {
            return Err(crate::AnalysisError::InvalidValue("bins must be > 0"));
        }
        if top_n == 0 {
            return Err(crate::AnalysisError::InvalidValue("top_n must be > 0"));
        }
        Ok(Self { bins, top_n })
    }

    /// Detect up to `top_n` volume levels, sorted by ascending price.
    pub fn detect<T: OHLCV>(&self, bars: &[T]) -> Vec<VolumeLevel> {
        if bars.is_empty() {
            return Vec::new();
        }

        let mut min_close = f64::INFINITY;
        let mut max_close = f64::NEG_INFINITY;
        for bar in bars {
            min_close = min_close.min(bar.close());
            max_close = max_close.max(bar.close());
        }
        let span = max_close - min_close;
        if span <= 0.0 {
            // Degenerate series: every close identical, one bin holds it all.
            let volume: f64 = bars.iter().map(|b| b.volume()).sum();
            return vec![VolumeLevel {
                price: min_close,
                volume,
            }];
        }

        let mut histogram = vec![0.0_f64; self.bins];
        let width = span / self.bins as f64;
        for bar in bars {
            let mut bin = ((bar.close() - min_close) / width) as usize;
            if bin >= self.bins {
                bin = self.bins - 1; // max_close lands past the last edge
            }
            histogram[bin] += bar.volume();
        }

        let mut order: Vec<usize> = (0..self.bins).collect();
        order.sort_by(|&a, &b| {
            histogram[a]
                .partial_cmp(&histogram[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut levels: Vec<VolumeLevel> = order
            .into_iter()
            .rev()
            .take(self.top_n)
            .filter(|&bin| histogram[bin] > 0.0)
            .map(|bin| VolumeLevel {
                price: min_close + (bin as f64 + 0.5) * width,
                volume: histogram[bin],
            })
            .collect();
        levels.sort_by(|a, b| {
            a.price
                .partial_cmp(&b.price)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        levels
    }
}

// ============================================================
// TESTS
// ============================================================

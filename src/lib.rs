//! # levelscan
//!
//! Support/resistance level detection and candlestick pattern outcome
//! backtesting, with an exhaustive parameter grid search on top.
//!
//! The pipeline: local-extremum levels are derived from a bar series,
//! every pattern occurrence is classified by its position relative to
//! levels formed earlier in time, each classified occurrence is replayed
//! forward against a target/stop rule, and per-pattern accuracy is
//! aggregated. A [`SearchEngine`](search::SearchEngine) sweeps the
//! cartesian product of all tunable parameters and reports every cell.
//!
//! Raw per-bar pattern signals are *not* computed here: they come from an
//! external pattern-recognition library through the
//! [`PatternDetector`](pattern::PatternDetector) collaborator trait.
//!
//! ## Quick Start
//!
//! ```rust
//! use levelscan::prelude::*;
//!
//! // Host-supplied bars (ascending time, validated upstream).
//! let bars: Vec<Bar> = (0..120)
//!     .map(|i| {
//!         let c = 100.0 + (i % 10) as f64;
//!         Bar {
//!             time: i as i64,
//!             open: c,
//!             high: c + 1.0,
//!             low: c - 1.0,
//!             close: c,
//!             volume: 1_000.0,
//!         }
//!     })
//!     .collect();
//!
//! // Raw signals come from an external pattern-recognition library.
//! struct NoSignals;
//!
//! impl PatternDetector for NoSignals {
//!     fn catalog(&self) -> &[PatternId] {
//!         const CATALOG: [PatternId; 1] = [PatternId("CDL_HAMMER")];
//!         &CATALOG
//!     }
//!
//!     fn signals(&self, _o: &[f64], _h: &[f64], _l: &[f64], close: &[f64]) -> Vec<Vec<i32>> {
//!         vec![vec![0; close.len()]]
//!     }
//! }
//!
//! let engine = SearchEngine::new(&bars, &NoSignals, SearchConfig::default()).unwrap();
//! let mut sink = VecSink::default();
//! let report = engine
//!     .run(&ParameterGrid::default(), &mut sink, &mut NullRenderer)
//!     .unwrap();
//! assert_eq!(report.cells, ParameterGrid::default().len());
//! ```

pub mod classify;
pub mod levels;
pub mod pattern;
pub mod search;
pub mod simulate;
pub mod stats;

pub mod prelude {
    pub use crate::{
        // Classification
        classify::{Category, PatternClassifier},
        // Levels
        levels::{
            ExtremumLevelDetector, Level, LevelKind, LevelSet, VolumeLevel, VolumeLevelDetector,
        },
        // Occurrences
        pattern::{extract_occurrences, Direction, PatternDetector, PatternId, PatternOccurrence},
        // Grid search
        search::{
            ChartBundle, ChartRenderer, NullRenderer, OptimizationResult, ParameterCombination,
            ParameterGrid, ResultSink, SearchConfig, SearchEngine, SearchReport, VecSink,
        },
        // Simulation
        simulate::TradeRule,
        // Stats
        stats::{CategoryStats, PatternStats},
        // Errors
        AnalysisError,
        // Types
        Bar,
        Percent,
        Result,
        Window,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors that can occur during analysis or grid search setup
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnalysisError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Empty candidate list: {0}")]
    EmptyCandidates(&'static str),

    #[error("Signal matrix {what}: expected {expected}, got {got}")]
    SignalShape {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Result sink failure: {0}")]
    Sink(String),

    #[error("Chart render failure: {0}")]
    Render(String),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Percentage value (must be finite and > 0)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percent(f64);

impl Percent {
    /// Create a new Percent, validating the value is finite and positive
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(AnalysisError::InvalidValue(
                "Percent cannot be NaN or infinite",
            ));
        }
        if value <= 0.0 {
            return Err(AnalysisError::InvalidValue("Percent must be > 0"));
        }
        Ok(Self(value))
    }

    /// Create a Percent from an already-validated value (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }

    /// Value scaled to a fraction (e.g. 2.5% -> 0.025)
    #[inline]
    pub fn fraction(self) -> f64 {
        self.0 / 100.0
    }
}

impl serde::Serialize for Percent {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Percent {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Percent::new(value).map_err(serde::de::Error::custom)
    }
}

/// Extremum window half-width in bars (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Window(usize);

impl Window {
    /// Create a new Window, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(AnalysisError::InvalidValue("Window must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Window {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Window {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Window::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV
// ============================================================

/// Core OHLCV data trait.
///
/// `time` is required: level causality ("formed strictly earlier") is
/// decided by comparing bar times, not indices.
pub trait OHLCV {
    fn time(&self) -> i64;
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
}

/// Concrete OHLCV bar.
///
/// Immutable once loaded; series are positionally ordered with ascending
/// time and no gaps (caller contract, not re-validated here).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    /// Bar open time, e.g. epoch milliseconds
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OHLCV for Bar {
    fn time(&self) -> i64 {
        self.time
    }

    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_validation() {
        assert!(Percent::new(0.5).is_ok());
        assert!(Percent::new(100.0).is_ok());
        assert!(Percent::new(0.0).is_err());
        assert!(Percent::new(-1.0).is_err());
        assert!(Percent::new(f64::NAN).is_err());
        assert!(Percent::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_percent_fraction() {
        let p = Percent::new(2.5).unwrap();
        assert!((p.fraction() - 0.025).abs() < 1e-12);
    }

    #[test]
    fn test_window_validation() {
        assert!(Window::new(1).is_ok());
        assert!(Window::new(150).is_ok());
        assert!(Window::new(0).is_err());
    }

    #[test]
    fn test_percent_serde_revalidates() {
        let p: Percent = serde_json::from_str("1.5").unwrap();
        assert_eq!(p.get(), 1.5);
        assert!(serde_json::from_str::<Percent>("-1.0").is_err());
    }

    #[test]
    fn test_bar_roundtrip() {
        let bar = Bar {
            time: 1,
            open: 100.0,
            high: 110.0,
            low: 95.0,
            close: 105.0,
            volume: 1234.0,
        };
        let json = serde_json::to_string(&bar).unwrap();
        let back: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, back);
        assert_eq!(back.close(), 105.0);
    }
}

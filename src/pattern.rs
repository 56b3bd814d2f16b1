//! Pattern occurrence extraction.
//!
//! Raw per-bar signals are computed by an external pattern-recognition
//! library behind the [`PatternDetector`] trait; this module reduces its
//! signal matrix to at most one [`PatternOccurrence`] per bar.

use serde::{Deserialize, Serialize};

use crate::{AnalysisError, Result, OHLCV};

/// Unique identifier for a pattern type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternId(pub &'static str);

impl PatternId {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl serde::Serialize for PatternId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.0)
    }
}

/// Direction of a fired pattern signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Bull,
    Bear,
}

/// One pattern firing on one bar.
///
/// At most one occurrence exists per bar: when several catalog entries
/// fire simultaneously the first one in catalog order wins and the rest
/// only show up in `match_count`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PatternOccurrence {
    pub bar_index: usize,
    pub time: i64,
    /// Close of the occurrence bar; entry price for outcome simulation
    pub price: f64,
    pub pattern: PatternId,
    pub direction: Direction,
    /// Number of catalog entries that fired on this bar
    pub match_count: usize,
}

/// External pattern-recognition collaborator (black box).
///
/// Given aligned open/high/low/close arrays, returns one row per catalog
/// entry with a signed per-bar value: nonzero = fired, positive = bullish,
/// negative = bearish. The catalog order is the tie-break priority when
/// several patterns fire on the same bar.
pub trait PatternDetector {
    /// Catalog of pattern names in fixed priority order
    fn catalog(&self) -> &[PatternId];

    /// Signal matrix: `catalog().len()` rows, one value per bar each
    fn signals(&self, open: &[f64], high: &[f64], low: &[f64], close: &[f64]) -> Vec<Vec<i32>>;
}

/// Reduce a detector's signal matrix to one occurrence per bar.
///
/// Ties between simultaneous firings are broken by catalog position, not
/// signal magnitude. Errors only when the detector returns a matrix that
/// does not line up with its own catalog or with the bar series.
pub fn extract_occurrences<T, D>(bars: &[T], detector: &D) -> Result<Vec<PatternOccurrence>>
where
    T: OHLCV,
    D: PatternDetector + ?Sized,
{
    let catalog = detector.catalog();

    let open: Vec<f64> = bars.iter().map(|b| b.open()).collect();
    let high: Vec<f64> = bars.iter().map(|b| b.high()).collect();
    let low: Vec<f64> = bars.iter().map(|b| b.low()).collect();
    let close: Vec<f64> = bars.iter().map(|b| b.close()).collect();

    let matrix = detector.signals(&open, &high, &low, &close);
    if matrix.len() != catalog.len() {
        return Err(AnalysisError::SignalShape {
            what: "row count",
            expected: catalog.len(),
            got: matrix.len(),
        });
    }
    for row in &matrix {
        if row.len() != bars.len() {
            return Err(AnalysisError::SignalShape {
                what: "row length",
                expected: bars.len(),
                got: row.len(),
            });
        }
    }

    let mut occurrences = Vec::new();
    for (i, bar) in bars.iter().enumerate() {
        let fired = matrix.iter().filter(|row| row[i] != 0).count();
        if fired == 0 {
            continue;
        }
        // First nonzero entry in catalog order wins.
        for (pattern, row) in catalog.iter().zip(&matrix) {
            let signal = row[i];
            if signal == 0 {
                continue;
            }
            occurrences.push(PatternOccurrence {
                bar_index: i,
                time: bar.time(),
                price: bar.close(),
                pattern: *pattern,
                direction: if signal > 0 {
                    Direction::Bull
                } else {
                    Direction::Bear
                },
                match_count: fired,
            });
            break;
        }
    }

    Ok(occurrences)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    fn bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| Bar {
                time: i as i64,
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + i as f64,
                volume: 1_000.0,
            })
            .collect()
    }

    /// Fixed signal matrix detector for tests
    struct MatrixDetector {
        catalog: Vec<PatternId>,
        matrix: Vec<Vec<i32>>,
    }

    impl PatternDetector for MatrixDetector {
        fn catalog(&self) -> &[PatternId] {
            &self.catalog
        }

        fn signals(&self, _o: &[f64], _h: &[f64], _l: &[f64], _c: &[f64]) -> Vec<Vec<i32>> {
            self.matrix.clone()
        }
    }

    #[test]
    fn test_first_in_catalog_order_wins() {
        let detector = MatrixDetector {
            catalog: vec![PatternId("CDL_DOJI"), PatternId("CDL_HAMMER")],
            // Both fire on bar 1; doji has lower magnitude but earlier slot.
            matrix: vec![vec![0, 100, 0], vec![0, -200, 0]],
        };
        let occurrences = extract_occurrences(&bars(3), &detector).unwrap();
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].pattern, PatternId("CDL_DOJI"));
        assert_eq!(occurrences[0].direction, Direction::Bull);
        assert_eq!(occurrences[0].match_count, 2);
    }

    #[test]
    fn test_sign_sets_direction() {
        let detector = MatrixDetector {
            catalog: vec![PatternId("CDL_ENGULFING")],
            matrix: vec![vec![100, -100, 0]],
        };
        let occurrences = extract_occurrences(&bars(3), &detector).unwrap();
        assert_eq!(occurrences.len(), 2);
        assert_eq!(occurrences[0].direction, Direction::Bull);
        assert_eq!(occurrences[1].direction, Direction::Bear);
        assert_eq!(occurrences[1].bar_index, 1);
        assert_eq!(occurrences[1].price, 101.0);
    }

    #[test]
    fn test_occurrence_carries_bar_close_and_time() {
        let detector = MatrixDetector {
            catalog: vec![PatternId("CDL_HAMMER")],
            matrix: vec![vec![0, 0, 100]],
        };
        let occurrences = extract_occurrences(&bars(3), &detector).unwrap();
        assert_eq!(occurrences[0].time, 2);
        assert_eq!(occurrences[0].price, 102.0);
    }

    #[test]
    fn test_misaligned_row_count_errors() {
        let detector = MatrixDetector {
            catalog: vec![PatternId("A"), PatternId("B")],
            matrix: vec![vec![0, 0, 0]],
        };
        assert!(matches!(
            extract_occurrences(&bars(3), &detector),
            Err(AnalysisError::SignalShape { what: "row count", .. })
        ));
    }

    #[test]
    fn test_misaligned_row_length_errors() {
        let detector = MatrixDetector {
            catalog: vec![PatternId("A")],
            matrix: vec![vec![0, 0]],
        };
        assert!(matches!(
            extract_occurrences(&bars(3), &detector),
            Err(AnalysisError::SignalShape { what: "row length", .. })
        ));
    }

    #[test]
    fn test_empty_series() {
        let detector = MatrixDetector {
            catalog: vec![PatternId("A")],
            matrix: vec![vec![]],
        };
        let occurrences = extract_occurrences(&bars(0), &detector).unwrap();
        assert!(occurrences.is_empty());
    }
}

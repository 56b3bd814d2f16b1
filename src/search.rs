//! Parameter grid search over the level/classification/simulation pipeline.
//!
//! Every cell of the six-dimensional cartesian product is a pure function
//! of (series, occurrences, combination): levels are recomputed, every
//! occurrence reclassified, outcomes resimulated and aggregated, and one
//! result row emitted per pattern name that classified at least once.
//! Nothing carries over between cells except the report log and the
//! best-so-far scalar.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    classify::PatternClassifier,
    levels::{ExtremumLevelDetector, LevelSet},
    pattern::{extract_occurrences, PatternDetector, PatternId, PatternOccurrence},
    simulate::TradeRule,
    stats::PatternStats,
    AnalysisError, Percent, Result, Window, OHLCV,
};

// ============================================================
// PARAMETERS
// ============================================================

/// One point of the parameter grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterCombination {
    /// Extremum window half-width in bars
    pub extrema_order: usize,
    /// Minimum touch count confirming a level
    pub min_touches: usize,
    /// Close-to-level distance counting as a touch (%)
    pub touch_threshold: f64,
    /// Occurrence-to-level distance counting as "near" (%)
    pub level_proximity: f64,
    /// Forward move scored as success (%)
    pub target_percent: f64,
    /// Adverse move scored as failure (%)
    pub stop_percent: f64,
}

/// Candidate values for each tunable parameter.
///
/// The grid search enumerates the full cartesian product; candidate
/// lists are independent. Defaults match the reference sweep
/// (3 x 3 x 3 x 2 x 2 x 2 = 216 combinations).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterGrid {
    pub extrema_order: Vec<usize>,
    pub min_touches: Vec<usize>,
    pub touch_threshold: Vec<f64>,
    pub level_proximity: Vec<f64>,
    pub target_percent: Vec<f64>,
    pub stop_percent: Vec<f64>,
}

impl Default for ParameterGrid {
    fn default() -> Self {
        Self {
            extrema_order: vec![50, 100, 150],
            min_touches: vec![3, 5, 7],
            touch_threshold: vec![0.5, 1.0, 1.5],
            level_proximity: vec![2.0, 3.0],
            target_percent: vec![3.0, 4.0],
            stop_percent: vec![1.0, 1.5],
        }
    }
}

impl ParameterGrid {
    /// Number of combinations the grid enumerates
    pub fn len(&self) -> usize {
        self.extrema_order.len()
            * self.min_touches.len()
            * self.touch_threshold.len()
            * self.level_proximity.len()
            * self.target_percent.len()
            * self.stop_percent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check every candidate value once, so per-cell construction can use
    /// the validated fast path.
    pub fn validate(&self) -> Result<()> {
        if self.extrema_order.is_empty() {
            return Err(AnalysisError::EmptyCandidates("extrema_order"));
        }
        if self.min_touches.is_empty() {
            return Err(AnalysisError::EmptyCandidates("min_touches"));
        }
        if self.touch_threshold.is_empty() {
            return Err(AnalysisError::EmptyCandidates("touch_threshold"));
        }
        if self.level_proximity.is_empty() {
            return Err(AnalysisError::EmptyCandidates("level_proximity"));
        }
        if self.target_percent.is_empty() {
            return Err(AnalysisError::EmptyCandidates("target_percent"));
        }
        if self.stop_percent.is_empty() {
            return Err(AnalysisError::EmptyCandidates("stop_percent"));
        }

        for &order in &self.extrema_order {
            Window::new(order)?;
        }
        for &touches in &self.min_touches {
            if touches == 0 {
                return Err(AnalysisError::InvalidValue("min_touches must be > 0"));
            }
        }
        for &value in self
            .touch_threshold
            .iter()
            .chain(&self.level_proximity)
            .chain(&self.target_percent)
            .chain(&self.stop_percent)
        {
            Percent::new(value)?;
        }
        Ok(())
    }

    /// Cartesian-product iterator over all combinations.
    ///
    /// Enumeration order nests left to right: `extrema_order` outermost,
    /// `stop_percent` fastest.
    pub fn combinations(&self) -> Combinations<'_> {
        Combinations {
            grid: self,
            index: [0; 6],
            remaining: self.len(),
        }
    }
}

/// Odometer-style iterator over a [`ParameterGrid`]
pub struct Combinations<'a> {
    grid: &'a ParameterGrid,
    index: [usize; 6],
    remaining: usize,
}

impl<'a> Combinations<'a> {
    fn dimension_len(&self, dimension: usize) -> usize {
        match dimension {
            0 => self.grid.extrema_order.len(),
            1 => self.grid.min_touches.len(),
            2 => self.grid.touch_threshold.len(),
            3 => self.grid.level_proximity.len(),
            4 => self.grid.target_percent.len(),
            _ => self.grid.stop_percent.len(),
        }
    }
}

impl<'a> Iterator for Combinations<'a> {
    type Item = ParameterCombination;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let [a, b, c, d, e, f] = self.index;
        let combo = ParameterCombination {
            extrema_order: self.grid.extrema_order[a],
            min_touches: self.grid.min_touches[b],
            touch_threshold: self.grid.touch_threshold[c],
            level_proximity: self.grid.level_proximity[d],
            target_percent: self.grid.target_percent[e],
            stop_percent: self.grid.stop_percent[f],
        };

        self.remaining -= 1;
        for dimension in (0..6).rev() {
            self.index[dimension] += 1;
            if self.index[dimension] < self.dimension_len(dimension) {
                break;
            }
            self.index[dimension] = 0;
        }

        Some(combo)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a> ExactSizeIterator for Combinations<'a> {}

// ============================================================
// RESULTS & COLLABORATORS
// ============================================================

/// Fixed thresholds gating which results are chart-worthy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Minimum average accuracy (%) for a result to be kept
    pub min_accuracy: f64,
    /// Minimum prediction count for a reliable accuracy estimate
    pub min_predictions: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_accuracy: 60.0,
            min_predictions: 3,
        }
    }
}

/// Accuracy estimate for one (combination, pattern name) grid cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub combination: ParameterCombination,
    pub pattern: PatternId,
    /// Average accuracy in percent; forced to 0 below the sample-size bar
    pub avg_accuracy: f64,
    /// Raw classified-occurrence count, reported even when accuracy is 0
    pub total_predictions: usize,
    /// Per-category breakdown backing the accuracy figure
    pub stats: PatternStats,
}

impl OptimizationResult {
    /// Whether the result clears both confidence gates
    pub fn is_kept(&self, config: &SearchConfig) -> bool {
        self.avg_accuracy >= config.min_accuracy && self.total_predictions >= config.min_predictions
    }
}

/// Everything computed for one grid cell
#[derive(Debug, Clone, PartialEq)]
pub struct CellResult {
    pub levels: LevelSet,
    pub rows: Vec<OptimizationResult>,
}

/// Append-only tabular log of result rows (collaborator).
///
/// Receives one row per (combination, pattern name) pair, kept or not.
pub trait ResultSink {
    fn append(&mut self, row: &OptimizationResult) -> Result<()>;
}

/// In-memory sink collecting rows
#[derive(Debug, Default)]
pub struct VecSink {
    pub rows: Vec<OptimizationResult>,
}

impl ResultSink for VecSink {
    fn append(&mut self, row: &OptimizationResult) -> Result<()> {
        self.rows.push(row.clone());
        Ok(())
    }
}

/// Data bundle handed to a chart renderer for one kept result
#[derive(Debug)]
pub struct ChartBundle<'a, T: OHLCV> {
    pub result: &'a OptimizationResult,
    pub bars: &'a [T],
    pub levels: &'a LevelSet,
}

/// Visual artifact producer for kept results (collaborator).
///
/// The engine is agnostic to rendering technology; it only supplies the
/// plain data bundle.
pub trait ChartRenderer<T: OHLCV> {
    fn render(&mut self, bundle: &ChartBundle<'_, T>) -> Result<()>;
}

/// Renderer that discards every bundle
#[derive(Debug, Default)]
pub struct NullRenderer;

impl<T: OHLCV> ChartRenderer<T> for NullRenderer {
    fn render(&mut self, _bundle: &ChartBundle<'_, T>) -> Result<()> {
        Ok(())
    }
}

/// Summary of a completed (or cancelled) grid search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchReport {
    /// Highest-accuracy result seen, ties resolved to the earliest
    pub best: Option<OptimizationResult>,
    /// Grid cells evaluated
    pub cells: usize,
    /// Result rows emitted to the sink
    pub rows: usize,
    /// Rows that cleared both confidence gates
    pub kept: usize,
    pub elapsed: Duration,
    pub cancelled: bool,
}

// ============================================================
// ENGINE
// ============================================================

/// Drives the pipeline across the full parameter grid.
///
/// The series and the occurrence set are fixed for the engine's lifetime:
/// the external pattern detector does not depend on any swept parameter,
/// so its signals are reduced to occurrences exactly once.
pub struct SearchEngine<'a, T: OHLCV> {
    bars: &'a [T],
    occurrences: Vec<PatternOccurrence>,
    catalog: Vec<PatternId>,
    config: SearchConfig,
}

impl<'a, T: OHLCV> SearchEngine<'a, T> {
    pub fn new<D>(bars: &'a [T], detector: &D, config: SearchConfig) -> Result<Self>
    where
        D: PatternDetector + ?Sized,
    {
        let occurrences = extract_occurrences(bars, detector)?;
        debug!(
            bars = bars.len(),
            occurrences = occurrences.len(),
            "search engine initialized"
        );
        Ok(Self {
            bars,
            occurrences,
            catalog: detector.catalog().to_vec(),
            config,
        })
    }

    pub fn occurrences(&self) -> &[PatternOccurrence] {
        &self.occurrences
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Evaluate one grid cell: detect levels, classify and simulate every
    /// occurrence, aggregate per pattern name.
    ///
    /// Pure with respect to engine state; cells can be evaluated in any
    /// order, repeatedly, or in parallel with identical results. Pattern
    /// names with no classified occurrence under this combination produce
    /// no row.
    pub fn evaluate_cell(&self, combo: &ParameterCombination) -> CellResult {
        let detector = ExtremumLevelDetector::from_combination(combo);
        let classifier = PatternClassifier::from_combination(combo);
        let rule = TradeRule::from_combination(combo);

        let levels = detector.detect(self.bars);

        let mut rows = Vec::new();
        for &pattern in &self.catalog {
            let mut stats = PatternStats::default();
            for occ in self.occurrences.iter().filter(|o| o.pattern == pattern) {
                let Some(category) = classifier.classify(occ, &levels) else {
                    continue;
                };
                let future = &self.bars[occ.bar_index + 1..];
                let success = rule.evaluate(occ.price, category.direction(), future);
                stats.record(category, success);
            }
            if stats.total() == 0 {
                continue;
            }

            let (avg_accuracy, total_predictions) =
                stats.average_accuracy(self.config.min_predictions);
            rows.push(OptimizationResult {
                combination: combo.clone(),
                pattern,
                avg_accuracy,
                total_predictions,
                stats,
            });
        }

        CellResult { levels, rows }
    }

    /// Run the full grid sequentially.
    pub fn run<S, R>(&self, grid: &ParameterGrid, sink: &mut S, renderer: &mut R) -> Result<SearchReport>
    where
        S: ResultSink,
        R: ChartRenderer<T>,
    {
        self.run_with_cancel(grid, sink, renderer, &AtomicBool::new(false))
    }

    /// Run the full grid sequentially, checking `cancel` between cells.
    pub fn run_with_cancel<S, R>(
        &self,
        grid: &ParameterGrid,
        sink: &mut S,
        renderer: &mut R,
        cancel: &AtomicBool,
    ) -> Result<SearchReport>
    where
        S: ResultSink,
        R: ChartRenderer<T>,
    {
        grid.validate()?;
        let total = grid.len();
        let start = Instant::now();
        info!(combinations = total, "starting grid search");

        let mut report = SearchReport {
            best: None,
            cells: 0,
            rows: 0,
            kept: 0,
            elapsed: Duration::ZERO,
            cancelled: false,
        };

        for combo in grid.combinations() {
            if cancel.load(Ordering::Relaxed) {
                info!(cells = report.cells, "grid search cancelled");
                report.cancelled = true;
                break;
            }

            let cell = self.evaluate_cell(&combo);
            self.commit_cell(&cell, sink, renderer, &mut report);
            report.cells += 1;

            if report.cells == 1 || report.cells % 10 == 0 {
                let elapsed = start.elapsed().as_secs_f64();
                let eta = elapsed / report.cells as f64 * (total - report.cells) as f64;
                info!(
                    cells = report.cells,
                    total,
                    percent = report.cells as f64 / total as f64 * 100.0,
                    elapsed_secs = elapsed,
                    eta_secs = eta,
                    kept = report.kept,
                    "grid search progress"
                );
            }
        }

        report.elapsed = start.elapsed();
        info!(
            cells = report.cells,
            rows = report.rows,
            kept = report.kept,
            elapsed_secs = report.elapsed.as_secs_f64(),
            "grid search finished"
        );
        Ok(report)
    }

    /// Run the full grid with cells evaluated in parallel.
    ///
    /// Cell evaluation is a parallel map; sink/renderer emission and the
    /// best-so-far fold stay sequential in enumeration order, so the
    /// output is identical to [`run`](Self::run).
    pub fn run_parallel<S, R>(
        &self,
        grid: &ParameterGrid,
        sink: &mut S,
        renderer: &mut R,
    ) -> Result<SearchReport>
    where
        T: Sync,
        S: ResultSink,
        R: ChartRenderer<T>,
    {
        grid.validate()?;
        let start = Instant::now();
        info!(combinations = grid.len(), "starting parallel grid search");

        let combos: Vec<ParameterCombination> = grid.combinations().collect();
        let cells: Vec<CellResult> = combos
            .par_iter()
            .map(|combo| self.evaluate_cell(combo))
            .collect();

        let mut report = SearchReport {
            best: None,
            cells: 0,
            rows: 0,
            kept: 0,
            elapsed: Duration::ZERO,
            cancelled: false,
        };
        for cell in &cells {
            self.commit_cell(cell, sink, renderer, &mut report);
            report.cells += 1;
        }

        report.elapsed = start.elapsed();
        info!(
            cells = report.cells,
            rows = report.rows,
            kept = report.kept,
            elapsed_secs = report.elapsed.as_secs_f64(),
            "parallel grid search finished"
        );
        Ok(report)
    }

    /// Emit a cell's rows and fold them into the running report.
    ///
    /// Sink and renderer failures are logged and swallowed; one broken
    /// side effect must not abort the remaining grid.
    fn commit_cell<S, R>(
        &self,
        cell: &CellResult,
        sink: &mut S,
        renderer: &mut R,
        report: &mut SearchReport,
    ) where
        S: ResultSink,
        R: ChartRenderer<T>,
    {
        for row in &cell.rows {
            report.rows += 1;

            if let Err(error) = sink.append(row) {
                warn!(%error, pattern = row.pattern.as_str(), "result sink append failed");
            }

            if row.is_kept(&self.config) {
                report.kept += 1;
                let bundle = ChartBundle {
                    result: row,
                    bars: self.bars,
                    levels: &cell.levels,
                };
                if let Err(error) = renderer.render(&bundle) {
                    warn!(%error, pattern = row.pattern.as_str(), "chart render failed");
                }
            }

            // Strictly greater wins; ties keep the earliest result.
            let better = report
                .best
                .as_ref()
                .map_or(true, |best| row.avg_accuracy > best.avg_accuracy);
            if better {
                report.best = Some(row.clone());
            }
        }
    }
}

// ============================================================
// TESTS
// ============================================================

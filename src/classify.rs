//! Classification of pattern occurrences against level sets.

use serde::{Deserialize, Serialize};

use crate::{
    levels::{Level, LevelSet},
    pattern::{Direction, PatternOccurrence},
    search::ParameterCombination,
    Percent, Result,
};

/// Category of a classified occurrence.
///
/// `Bull`/`Bear` are the standard cases (bullish near support, bearish
/// near resistance); `LogicalBull`/`LogicalBear` are the contrarian ones
/// (bullish near resistance, bearish near support).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Bull,
    Bear,
    LogicalBull,
    LogicalBear,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Bull,
        Category::Bear,
        Category::LogicalBull,
        Category::LogicalBear,
    ];

    /// Counter slot for this category
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Category::Bull => 0,
            Category::Bear => 1,
            Category::LogicalBull => 2,
            Category::LogicalBear => 3,
        }
    }

    /// Trade direction simulated for this category.
    ///
    /// Logical categories keep the signal's own direction: a bullish
    /// pattern at resistance is still simulated as a long.
    #[inline]
    pub const fn direction(self) -> Direction {
        match self {
            Category::Bull | Category::LogicalBull => Direction::Bull,
            Category::Bear | Category::LogicalBear => Direction::Bear,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Bull => "Bull",
            Category::Bear => "Bear",
            Category::LogicalBull => "L_Bull",
            Category::LogicalBear => "L_Bear",
        }
    }
}

/// Classifies occurrences by proximity to previously formed levels.
///
/// Only levels with a formation time strictly earlier than the occurrence
/// are eligible; the *first* qualifying level in iteration order decides,
/// not the nearest one. Callers relying on level identity (charting)
/// must account for that.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternClassifier {
    proximity: Percent,
}

impl PatternClassifier {
    pub fn new(proximity: f64) -> Result<Self> {
        Ok(Self {
            proximity: Percent::new(proximity)?,
        })
    }

    pub(crate) fn from_combination(combo: &ParameterCombination) -> Self {
        Self {
            proximity: Percent::new_const(combo.level_proximity),
        }
    }

    /// First level formed strictly before `occ` whose relative distance to
    /// the occurrence price is under the proximity threshold.
    fn first_near<'a>(&self, occ: &PatternOccurrence, levels: &'a [Level]) -> Option<&'a Level> {
        let threshold = self.proximity.fraction();
        levels
            .iter()
            .find(|l| l.time < occ.time && (occ.price - l.price).abs() / occ.price < threshold)
    }

    /// Assign a category, or `None` when the occurrence sits near no
    /// eligible level and is excluded from further analysis.
    pub fn classify(&self, occ: &PatternOccurrence, levels: &LevelSet) -> Option<Category> {
        let near_support = self.first_near(occ, &levels.support).is_some();
        let near_resistance = self.first_near(occ, &levels.resistance).is_some();

        // Standard categories take priority over logical ones.
        match occ.direction {
            Direction::Bull if near_support => Some(Category::Bull),
            Direction::Bear if near_resistance => Some(Category::Bear),
            Direction::Bull if near_resistance => Some(Category::LogicalBull),
            Direction::Bear if near_support => Some(Category::LogicalBear),
            _ => None,
        }
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::LevelKind;
    use crate::pattern::PatternId;

    fn occurrence(time: i64, price: f64, direction: Direction) -> PatternOccurrence {
        PatternOccurrence {
            bar_index: time as usize,
            time,
            price,
            pattern: PatternId("CDL_TEST"),
            direction,
            match_count: 1,
        }
    }

    fn level(price: f64, time: i64, kind: LevelKind) -> Level {
        Level {
            price,
            time,
            bar_index: time as usize,
            kind,
        }
    }

    fn level_set(support: Vec<Level>, resistance: Vec<Level>) -> LevelSet {
        LevelSet {
            support,
            resistance,
        }
    }

    #[test]
    fn test_bull_near_support_is_standard() {
        let levels = level_set(vec![level(100.0, 5, LevelKind::Support)], vec![]);
        let classifier = PatternClassifier::new(2.0).unwrap();
        let occ = occurrence(10, 101.0, Direction::Bull);
        assert_eq!(classifier.classify(&occ, &levels), Some(Category::Bull));
    }

    #[test]
    fn test_bear_near_resistance_is_standard() {
        let levels = level_set(vec![], vec![level(100.0, 5, LevelKind::Resistance)]);
        let classifier = PatternClassifier::new(2.0).unwrap();
        let occ = occurrence(10, 99.5, Direction::Bear);
        assert_eq!(classifier.classify(&occ, &levels), Some(Category::Bear));
    }

    #[test]
    fn test_bull_near_resistance_is_logical() {
        let levels = level_set(vec![], vec![level(100.0, 5, LevelKind::Resistance)]);
        let classifier = PatternClassifier::new(2.0).unwrap();
        let occ = occurrence(10, 101.0, Direction::Bull);
        assert_eq!(
            classifier.classify(&occ, &levels),
            Some(Category::LogicalBull)
        );
    }

    #[test]
    fn test_bear_near_support_is_logical() {
        let levels = level_set(vec![level(100.0, 5, LevelKind::Support)], vec![]);
        let classifier = PatternClassifier::new(2.0).unwrap();
        let occ = occurrence(10, 100.5, Direction::Bear);
        assert_eq!(
            classifier.classify(&occ, &levels),
            Some(Category::LogicalBear)
        );
    }

    #[test]
    fn test_standard_beats_logical_when_both_near() {
        // Bull near both a support and a resistance: standard wins.
        let levels = level_set(
            vec![level(100.0, 5, LevelKind::Support)],
            vec![level(101.0, 5, LevelKind::Resistance)],
        );
        let classifier = PatternClassifier::new(3.0).unwrap();
        let occ = occurrence(10, 100.5, Direction::Bull);
        assert_eq!(classifier.classify(&occ, &levels), Some(Category::Bull));
    }

    #[test]
    fn test_far_from_all_levels_is_none() {
        let levels = level_set(vec![level(100.0, 5, LevelKind::Support)], vec![]);
        let classifier = PatternClassifier::new(2.0).unwrap();
        let occ = occurrence(10, 120.0, Direction::Bull);
        assert_eq!(classifier.classify(&occ, &levels), None);
    }

    #[test]
    fn test_formation_time_boundary_is_strict() {
        // Occurrence at exactly the level's formation time must not match.
        let levels = level_set(vec![level(100.0, 10, LevelKind::Support)], vec![]);
        let classifier = PatternClassifier::new(2.0).unwrap();
        let occ = occurrence(10, 100.0, Direction::Bull);
        assert_eq!(classifier.classify(&occ, &levels), None);

        let later = occurrence(11, 100.0, Direction::Bull);
        assert_eq!(classifier.classify(&later, &levels), Some(Category::Bull));
    }

    #[test]
    fn test_level_formed_later_is_ignored() {
        let levels = level_set(vec![level(100.0, 50, LevelKind::Support)], vec![]);
        let classifier = PatternClassifier::new(2.0).unwrap();
        let occ = occurrence(10, 100.0, Direction::Bull);
        assert_eq!(classifier.classify(&occ, &levels), None);
    }

    #[test]
    fn test_first_qualifying_level_in_order() {
        // Both levels qualify; the first in iteration order is the match
        // even though the second is nearer.
        let levels = level_set(
            vec![
                level(98.5, 5, LevelKind::Support),
                level(100.0, 6, LevelKind::Support),
            ],
            vec![],
        );
        let classifier = PatternClassifier::new(2.0).unwrap();
        let occ = occurrence(10, 100.0, Direction::Bull);
        let first = classifier.first_near(&occ, &levels.support).unwrap();
        assert_eq!(first.price, 98.5);
        assert_eq!(classifier.classify(&occ, &levels), Some(Category::Bull));
    }

    #[test]
    fn test_category_direction() {
        assert_eq!(Category::Bull.direction(), Direction::Bull);
        assert_eq!(Category::LogicalBull.direction(), Direction::Bull);
        assert_eq!(Category::Bear.direction(), Direction::Bear);
        assert_eq!(Category::LogicalBear.direction(), Direction::Bear);
    }

    #[test]
    fn test_category_indices_are_distinct() {
        let mut seen = [false; 4];
        for category in Category::ALL {
            assert!(!seen[category.index()]);
            seen[category.index()] = true;
        }
    }
}

//! Read-only lookup tables shared by all components.
//!
//! Built once at startup and handed around behind an `Arc`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::adaptive::types::{NumberRange, StrategyLabel};

const STAGES: [(&str, u32, u32, NumberRange); 8] = [
    ("Counting Meadow", 1, 10, NumberRange::Ten),
    ("Ten Friends Pond", 11, 20, NumberRange::Ten),
    ("Doubles Grove", 21, 30, NumberRange::Twenty),
    ("Bridge River", 31, 40, NumberRange::Twenty),
    ("Tens Trail", 41, 50, NumberRange::Hundred),
    ("Hundred Hills", 51, 60, NumberRange::Hundred),
    ("Crossing Canyon", 61, 80, NumberRange::Hundred),
    ("Summit of Thousands", 81, 100, NumberRange::Thousand),
];

const STRATEGY_RANKS: [(StrategyLabel, i32); 10] = [
    (StrategyLabel::CountingAll, 1),
    (StrategyLabel::CountingOn, 2),
    (StrategyLabel::Doubles, 3),
    (StrategyLabel::NearDoubles, 3),
    (StrategyLabel::Decomposition, 3),
    (StrategyLabel::MakeTen, 4),
    (StrategyLabel::PlaceValue, 4),
    (StrategyLabel::Derivation, 4),
    (StrategyLabel::Retrieval, 5),
    (StrategyLabel::Automatized, 5),
];

const STRATEGY_PROGRESSION: [StrategyLabel; 7] = [
    StrategyLabel::CountingAll,
    StrategyLabel::CountingOn,
    StrategyLabel::Doubles,
    StrategyLabel::NearDoubles,
    StrategyLabel::Decomposition,
    StrategyLabel::MakeTen,
    StrategyLabel::Automatized,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IconTier {
    Checkmark,
    Star,
    Trophy,
}

impl IconTier {
    pub fn for_level(level: u32) -> Self {
        if level % 10 == 0 {
            Self::Trophy
        } else if level % 5 == 0 {
            Self::Star
        } else {
            Self::Checkmark
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub index: usize,
    pub name: String,
    pub first_level: u32,
    pub last_level: u32,
    pub number_range: NumberRange,
}

impl Stage {
    pub fn contains(&self, level: u32) -> bool {
        (self.first_level..=self.last_level).contains(&level)
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    stages: Vec<Stage>,
    level_names: BTreeMap<u32, String>,
    strategy_ranks: BTreeMap<StrategyLabel, i32>,
    strategy_progression: Vec<StrategyLabel>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        let stages: Vec<Stage> = STAGES
            .iter()
            .enumerate()
            .map(|(index, (name, first, last, range))| Stage {
                index,
                name: name.to_string(),
                first_level: *first,
                last_level: *last,
                number_range: *range,
            })
            .collect();

        let mut level_names = BTreeMap::new();
        for stage in &stages {
            for level in stage.first_level..=stage.last_level {
                let step = level - stage.first_level + 1;
                level_names.insert(level, format!("{} {}", stage.name, step));
            }
        }

        Self {
            stages,
            level_names,
            strategy_ranks: STRATEGY_RANKS.into_iter().collect(),
            strategy_progression: STRATEGY_PROGRESSION.to_vec(),
        }
    }

    pub fn level_name(&self, level: u32) -> String {
        self.level_names
            .get(&level)
            .cloned()
            .unwrap_or_else(|| format!("Level {level}"))
    }

    pub fn stage_for(&self, level: u32) -> &Stage {
        self.stages
            .iter()
            .find(|stage| stage.contains(level))
            .unwrap_or_else(|| {
                if level == 0 {
                    &self.stages[0]
                } else {
                    &self.stages[self.stages.len() - 1]
                }
            })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn strategy_rank(&self, label: StrategyLabel) -> i32 {
        self.strategy_ranks.get(&label).copied().unwrap_or(1)
    }

    /// Next step on the counting → automatized ladder, if `label` is on it.
    pub fn next_strategy(&self, label: StrategyLabel) -> Option<StrategyLabel> {
        let pos = self
            .strategy_progression
            .iter()
            .position(|candidate| *candidate == label)?;
        self.strategy_progression.get(pos + 1).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_level_has_a_name() {
        let catalog = Catalog::new();
        assert_eq!(catalog.level_names.len(), 100);
        assert_eq!(catalog.level_name(1), "Counting Meadow 1");
        assert_eq!(catalog.level_name(100), "Summit of Thousands 20");
        assert_eq!(catalog.level_name(101), "Level 101");
        assert_eq!(catalog.stages().len(), 8);
    }

    #[test]
    fn icon_tiers() {
        assert_eq!(IconTier::for_level(7), IconTier::Checkmark);
        assert_eq!(IconTier::for_level(15), IconTier::Star);
        assert_eq!(IconTier::for_level(30), IconTier::Trophy);
    }

    #[test]
    fn strategy_ladder() {
        let catalog = Catalog::new();
        assert_eq!(catalog.strategy_rank(StrategyLabel::CountingAll), 1);
        assert_eq!(catalog.strategy_rank(StrategyLabel::Automatized), 5);
        assert_eq!(
            catalog.next_strategy(StrategyLabel::Doubles),
            Some(StrategyLabel::NearDoubles)
        );
        assert_eq!(catalog.next_strategy(StrategyLabel::Automatized), None);
        assert_eq!(catalog.next_strategy(StrategyLabel::Retrieval), None);
    }

    #[test]
    fn stage_lookup() {
        let catalog = Catalog::new();
        assert_eq!(catalog.stage_for(35).number_range, NumberRange::Twenty);
        assert_eq!(catalog.stage_for(70).name, "Crossing Canyon");
        assert_eq!(catalog.stage_for(140).index, 7);
    }
}

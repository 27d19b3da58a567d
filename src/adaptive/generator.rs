//! Structured task packages.
//!
//! Every pattern first builds a deterministic candidate pool from
//! (strategy, difficulty, range); randomness only decides which candidates
//! are picked and in which order. Tasks whose operands or result fall
//! outside `0..=range` are dropped from the pool, never emitted.

use std::collections::HashSet;
use std::fmt;

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::adaptive::types::{NumberRange, Operator, StrategyLabel, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PackagePattern {
    SumConstancy,
    NeighborTasks,
    InverseOperations,
    AnalogyPackage,
    ErrorPattern,
    TurningPoints,
    #[default]
    MixedPractice,
}

impl PackagePattern {
    pub const ALL: [PackagePattern; 7] = [
        Self::SumConstancy,
        Self::NeighborTasks,
        Self::InverseOperations,
        Self::AnalogyPackage,
        Self::ErrorPattern,
        Self::TurningPoints,
        Self::MixedPractice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SumConstancy => "sum_constancy",
            Self::NeighborTasks => "neighbor_tasks",
            Self::InverseOperations => "inverse_operations",
            Self::AnalogyPackage => "analogy_package",
            Self::ErrorPattern => "error_pattern",
            Self::TurningPoints => "turning_points",
            Self::MixedPractice => "mixed_practice",
        }
    }
}

impl fmt::Display for PackagePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPackage {
    pub pattern: PackagePattern,
    pub strategy: StrategyLabel,
    pub difficulty: u8,
    pub number_range: NumberRange,
    pub tasks: Vec<Task>,
}

const SUM_CONSTANCY_CAP: usize = 6;
const NEIGHBOR_SPAN: u32 = 6;
const ANALOGY_CAP: usize = 8;
const ERROR_DRILL_SIZE: usize = 6;
const MIXED_SIZE: usize = 8;

const CROSSING_PAIRS: [(u32, u32); 8] = [
    (8, 5),
    (9, 4),
    (7, 6),
    (6, 8),
    (9, 7),
    (8, 6),
    (7, 5),
    (9, 3),
];

#[derive(Debug, Clone, Default)]
pub struct TaskGenerator;

impl TaskGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate<R: Rng + ?Sized>(
        &self,
        pattern: PackagePattern,
        strategy: StrategyLabel,
        difficulty: u8,
        number_range: NumberRange,
        rng: &mut R,
    ) -> TaskPackage {
        let difficulty = difficulty.clamp(1, 5);
        let pool = self.candidates(pattern, strategy, difficulty, number_range);

        let tasks = match pattern {
            PackagePattern::ErrorPattern => {
                let picked: HashSet<usize> = (0..pool.len())
                    .collect::<Vec<_>>()
                    .choose_multiple(rng, ERROR_DRILL_SIZE)
                    .copied()
                    .collect();
                pool.into_iter()
                    .enumerate()
                    .filter(|(i, _)| picked.contains(i))
                    .map(|(_, task)| task)
                    .collect()
            }
            PackagePattern::MixedPractice => {
                let mut tasks = pool;
                tasks.shuffle(rng);
                tasks.truncate(MIXED_SIZE);
                tasks
            }
            _ => pool,
        };

        tracing::debug!(
            pattern = pattern.as_str(),
            strategy = %strategy,
            difficulty,
            range = number_range.limit(),
            tasks = tasks.len(),
            "task package generated"
        );

        TaskPackage {
            pattern,
            strategy,
            difficulty,
            number_range,
            tasks,
        }
    }

    /// The full deterministic pool a package is drawn from.
    pub fn candidates(
        &self,
        pattern: PackagePattern,
        strategy: StrategyLabel,
        difficulty: u8,
        number_range: NumberRange,
    ) -> Vec<Task> {
        let d = difficulty.clamp(1, 5) as u32;
        let limit = number_range.limit();
        let raw = match pattern {
            PackagePattern::SumConstancy => sum_constancy(d, number_range),
            PackagePattern::NeighborTasks => neighbor_tasks(d, number_range),
            PackagePattern::InverseOperations => inverse_operations(d, number_range),
            PackagePattern::AnalogyPackage => analogy_package(strategy, d, number_range),
            PackagePattern::ErrorPattern => error_pattern(strategy, d, number_range),
            PackagePattern::TurningPoints => turning_points(d, number_range),
            PackagePattern::MixedPractice => {
                let mut all = sum_constancy(d, number_range);
                all.extend(neighbor_tasks(d, number_range));
                all.extend(inverse_operations(d, number_range));
                all
            }
        };

        let mut seen = HashSet::new();
        let mut tasks: Vec<Task> = raw
            .into_iter()
            .filter_map(|(op, a, b)| Task::new(op, a, b))
            .filter(|t| t.op1 <= limit && t.op2 <= limit && t.result <= limit)
            .filter(|t| seen.insert(t.signature()))
            .collect();

        match pattern {
            PackagePattern::SumConstancy => tasks.truncate(SUM_CONSTANCY_CAP),
            PackagePattern::AnalogyPackage => tasks.truncate(ANALOGY_CAP),
            _ => {}
        }
        tasks
    }
}

type Candidate = (Operator, u32, u32);

fn sum_constancy(d: u32, range: NumberRange) -> Vec<Candidate> {
    let target = match range {
        NumberRange::Ten => 5 + d,
        NumberRange::Twenty => 10 + 2 * d,
        NumberRange::Hundred => 40 + 10 * d,
        NumberRange::Thousand => 400 + 100 * d,
    };
    let stride = range.stride() as usize;
    (stride as u32..target)
        .step_by(stride)
        .map(|a| (Operator::Add, a, target - a))
        .collect()
}

fn neighbor_tasks(d: u32, range: NumberRange) -> Vec<Candidate> {
    let (start, addend) = match range {
        NumberRange::Ten => (1, 1 + d / 2),
        NumberRange::Twenty => (3, 4 + d),
        NumberRange::Hundred => (10 * (d + 1) + 3, 3 + d),
        NumberRange::Thousand => (100 * d + 3, 10 * (3 + d)),
    };
    (start..start + NEIGHBOR_SPAN)
        .map(|a| (Operator::Add, a, addend))
        .collect()
}

fn inverse_operations(d: u32, range: NumberRange) -> Vec<Candidate> {
    let pairs = match range {
        NumberRange::Ten => [(d, 9 - d), (1 + d / 2, 2)],
        NumberRange::Twenty => [(6 + d, 5), (10 + d, 3)],
        NumberRange::Hundred => [(10 * d + 7, 5 + d), (20 + 5 * d, 10 * d)],
        NumberRange::Thousand => [(100 * d + 70, 50 + 10 * d), (200 + 50 * d, 100 * d)],
    };
    pairs
        .into_iter()
        .flat_map(|(a, b)| {
            let sum = a + b;
            [
                (Operator::Add, a, b),
                (Operator::Subtract, sum, a),
                (Operator::Subtract, sum, b),
            ]
        })
        .collect()
}

fn analogy_package(strategy: StrategyLabel, d: u32, range: NumberRange) -> Vec<Candidate> {
    let base: &[(u32, u32)] = match strategy {
        StrategyLabel::Doubles | StrategyLabel::NearDoubles => {
            &[(2, 2), (3, 4), (4, 4), (4, 5), (3, 3)]
        }
        _ => &[(3, 4), (2, 5), (6, 3), (4, 4), (5, 2)],
    };
    let count = (2 + d as usize / 2).min(base.len());

    base.iter()
        .take(count)
        .flat_map(|&(a, b)| {
            let mut facts = vec![(Operator::Add, a, b)];
            match range {
                NumberRange::Ten => facts.push((Operator::Add, b, a)),
                NumberRange::Twenty => facts.push((Operator::Add, a + 10, b)),
                NumberRange::Hundred => {
                    facts.push((Operator::Add, a + 10 * (d + 1), b));
                    facts.push((Operator::Add, a * 10, b * 10));
                }
                NumberRange::Thousand => {
                    facts.push((Operator::Add, a * 10, b * 10));
                    facts.push((Operator::Add, a * 100, b * 100));
                }
            }
            facts
        })
        .collect()
}

fn error_pattern(strategy: StrategyLabel, d: u32, range: NumberRange) -> Vec<Candidate> {
    if range == NumberRange::Ten {
        // no decade crossing fits below ten; drill the complements instead
        return (1..=9)
            .flat_map(|a| [(Operator::Add, a, 10 - a), (Operator::Subtract, 10, a)])
            .collect();
    }

    let bases: Vec<u32> = match range {
        NumberRange::Twenty => vec![0],
        NumberRange::Hundred => (1..=d + 2).map(|t| t * 10).collect(),
        _ => (1..=d + 2).map(|t| t * 100 + 40).collect(),
    };
    let pair_count = 4 + d as usize / 2;

    let mut additions = Vec::new();
    let mut subtractions = Vec::new();
    for base in bases {
        for &(x, y) in CROSSING_PAIRS.iter().take(pair_count) {
            additions.push((Operator::Add, base + x, y));
            subtractions.push((Operator::Subtract, base + x + y, y));
        }
    }

    let subtraction_first = matches!(
        strategy,
        StrategyLabel::Decomposition | StrategyLabel::PlaceValue | StrategyLabel::Derivation
    );
    if subtraction_first {
        subtractions.extend(additions);
        subtractions
    } else {
        additions.extend(subtractions);
        additions
    }
}

fn turning_points(d: u32, range: NumberRange) -> Vec<Candidate> {
    let keys: &[u32] = match range {
        NumberRange::Ten => &[5, 10],
        NumberRange::Twenty => &[5, 10, 15, 20],
        NumberRange::Hundred => &[25, 50, 75, 100],
        NumberRange::Thousand => &[250, 500, 750, 1000],
    };
    let breadth = (d as usize * 4).div_ceil(5).min(keys.len());

    keys.iter()
        .take(breadth)
        .flat_map(|&n| {
            let step = (n / 5).max(range.stride()).max(1) as usize;
            (step as u32..n)
                .step_by(step)
                .map(move |a| (Operator::Add, a, n - a))
        })
        .collect()
}

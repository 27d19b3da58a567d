pub mod competency;
pub mod levels;
pub mod scaffolding;

pub use competency::{
    competency_ids, competency_level, CompetencyBook, CompetencyProgress, CompetencyTracker,
    RecentError, TaskMastery,
};
pub use levels::{GapStatus, KnowledgeGap, LevelMachine, LevelOutcome, LevelProgress, LevelState};
pub use scaffolding::{ScaffoldingController, ScaffoldingSample, ScaffoldingState};

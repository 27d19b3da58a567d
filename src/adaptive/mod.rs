//! Adaptive diagnostic and progression engine for arithmetic practice.

pub mod catalog;
pub mod config;
pub mod diagnostic;
pub mod engine;
pub mod error;
pub mod errors;
pub mod events;
pub mod generator;
pub mod persistence;
pub mod progression;
pub mod strategy;
pub mod types;

pub use catalog::{Catalog, IconTier, Stage};
pub use config::EngineConfig;
pub use diagnostic::{CognitiveSnapshot, DiagnosticEngine};
pub use engine::{AttemptOutcome, LearnerState, LearningEngine};
pub use error::EngineError;
pub use errors::{classify_error, ErrorType};
pub use events::EngineEvent;
pub use generator::{PackagePattern, TaskGenerator, TaskPackage};
pub use persistence::{InMemoryLearnerStore, LearnerStore};
pub use strategy::{StrategyDetection, StrategyDetector};
pub use types::{
    AttemptSubmission, NumberRange, Operator, PlaceholderPosition, SolutionStep, StrategyLabel,
    Task, TaskAttempt,
};

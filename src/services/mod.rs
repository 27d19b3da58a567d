pub mod learning;

pub use learning::{LearningService, SubmissionResult};

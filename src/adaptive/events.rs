//! Plain data events emitted by the progression pipeline. Delivery is the
//! caller's concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adaptive::catalog::IconTier;
use crate::adaptive::errors::ErrorType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneStats {
    pub success_rate: f64,
    pub average_time_ms: f64,
    pub tasks_completed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneEvent {
    pub level: u32,
    pub title: String,
    pub icon_tier: IconTier,
    pub stats: MilestoneStats,
    pub achieved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeGapEvent {
    pub level: u32,
    pub error_type: ErrorType,
    pub occurrences: u32,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapResolvedEvent {
    pub level: u32,
    pub error_type: ErrorType,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepresentationChange {
    pub from: u8,
    pub to: u8,
    pub reason: String,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    Milestone(MilestoneEvent),
    KnowledgeGap(KnowledgeGapEvent),
    GapResolved(GapResolvedEvent),
    RepresentationChanged(RepresentationChange),
}

impl EngineEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Milestone(_) => "milestone",
            Self::KnowledgeGap(_) => "knowledge_gap",
            Self::GapResolved(_) => "gap_resolved",
            Self::RepresentationChanged(_) => "representation_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged() {
        let event = EngineEvent::KnowledgeGap(KnowledgeGapEvent {
            level: 4,
            error_type: ErrorType::OffByOne,
            occurrences: 1,
            detected_at: DateTime::<Utc>::UNIX_EPOCH,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "knowledge_gap");
        assert_eq!(json["errorType"], "off_by_one");
        assert_eq!(event.kind(), "knowledge_gap");

        let back: EngineEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}

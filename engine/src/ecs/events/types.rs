//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Event type definitions

use crate::services::{ItemId, ObjectId};
use hearthguard_common::ActionMode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a companion was relocated without pathing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeleportReason {
    /// The owner got too far away to path to
    Distance,
    /// Stuck escalation ran out of options
    Stuck,
}

/// All events the behavior core reports to the presentation layer
///
/// Events are keyed by the companion's persistent UUID so the host can route
/// them to the right speech bubble or notification feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompanionEvent {
    // Tasks
    TaskStarted {
        agent: Uuid,
        mode: ActionMode,
    },
    ModeChanged {
        agent: Uuid,
        from: ActionMode,
        to: ActionMode,
    },
    Overweight {
        agent: Uuid,
        carried: f32,
        capacity: f32,
    },
    DepositStarted {
        agent: Uuid,
        container: ObjectId,
    },

    // Combat
    Engaged {
        agent: Uuid,
        target: ObjectId,
    },
    Retreating {
        agent: Uuid,
        target: ObjectId,
    },
    Reengaging {
        agent: Uuid,
        target: ObjectId,
    },
    EquipmentBroken {
        agent: Uuid,
        item: ItemId,
    },

    // Movement
    Teleported {
        agent: Uuid,
        reason: TeleportReason,
    },

    // Commands
    DirectiveAccepted {
        agent: Uuid,
        directive: String,
    },
    /// Target missing, unreachable or outside the leash
    DirectiveRejected {
        agent: Uuid,
        directive: String,
    },
    Recalled {
        agent: Uuid,
    },
}

impl CompanionEvent {
    /// The companion this event is about
    pub fn agent(&self) -> Uuid {
        match self {
            CompanionEvent::TaskStarted { agent, .. }
            | CompanionEvent::ModeChanged { agent, .. }
            | CompanionEvent::Overweight { agent, .. }
            | CompanionEvent::DepositStarted { agent, .. }
            | CompanionEvent::Engaged { agent, .. }
            | CompanionEvent::Retreating { agent, .. }
            | CompanionEvent::Reengaging { agent, .. }
            | CompanionEvent::EquipmentBroken { agent, .. }
            | CompanionEvent::Teleported { agent, .. }
            | CompanionEvent::DirectiveAccepted { agent, .. }
            | CompanionEvent::DirectiveRejected { agent, .. }
            | CompanionEvent::Recalled { agent } => *agent,
        }
    }

    /// Line the companion says out loud, if the event warrants one
    pub fn speech(&self) -> Option<SpeechLine> {
        match self {
            CompanionEvent::TaskStarted { .. } => Some(SpeechLine::TaskStart),
            CompanionEvent::Overweight { .. } => Some(SpeechLine::Overweight),
            CompanionEvent::Engaged { .. } => Some(SpeechLine::Engage),
            CompanionEvent::Retreating { .. } => Some(SpeechLine::Retreat),
            CompanionEvent::EquipmentBroken { .. } => Some(SpeechLine::GearBroken),
            CompanionEvent::DirectiveAccepted { .. } => Some(SpeechLine::Acknowledge),
            CompanionEvent::DirectiveRejected { .. } => Some(SpeechLine::Refuse),
            CompanionEvent::Recalled { .. } => Some(SpeechLine::Recall),
            _ => None,
        }
    }
}

/// Canned speech lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeechLine {
    TaskStart,
    Overweight,
    Engage,
    Retreat,
    GearBroken,
    Acknowledge,
    Refuse,
    Recall,
}

impl SpeechLine {
    pub fn text(&self) -> &'static str {
        match self {
            SpeechLine::TaskStart => "On it.",
            SpeechLine::Overweight => "I can't carry any more!",
            SpeechLine::Engage => "To arms!",
            SpeechLine::Retreat => "Falling back!",
            SpeechLine::GearBroken => "My gear just broke.",
            SpeechLine::Acknowledge => "Understood.",
            SpeechLine::Refuse => "I can't get to that.",
            SpeechLine::Recall => "Coming back to you.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let agent = Uuid::new_v4();
        let event = CompanionEvent::Overweight {
            agent,
            carried: 298.0,
            capacity: 300.0,
        };

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: CompanionEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized, event);
        assert_eq!(deserialized.agent(), agent);
    }

    #[test]
    fn test_speech_lines() {
        let agent = Uuid::new_v4();
        let engaged = CompanionEvent::Engaged {
            agent,
            target: ObjectId(7),
        };
        assert_eq!(engaged.speech(), Some(SpeechLine::Engage));

        let teleported = CompanionEvent::Teleported {
            agent,
            reason: TeleportReason::Stuck,
        };
        assert_eq!(teleported.speech(), None);
        assert!(!SpeechLine::Retreat.text().is_empty());
    }
}

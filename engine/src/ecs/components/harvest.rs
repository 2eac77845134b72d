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

//! Harvest task state

use crate::services::{HarvestSource, ObjectId, WorldEntity};
use glam::Vec3;
use hearthguard_common::HarvestKind;
use serde::{Deserialize, Serialize};

/// Where a harvest task is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HarvestPhase {
    #[default]
    Seeking,
    Approaching,
    Striking,
    CollectingDrops,
}

impl HarvestPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HarvestPhase::Seeking => "Seeking",
            HarvestPhase::Approaching => "Approaching",
            HarvestPhase::Striking => "Striking",
            HarvestPhase::CollectingDrops => "CollectingDrops",
        }
    }
}

/// The candidate currently being worked
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestTask {
    pub candidate: ObjectId,
    pub kind: HarvestKind,
    pub source: HarvestSource,
    pub position: Vec3,
    pub score: f32,
    pub phase: HarvestPhase,
    /// Seconds until the next strike may land
    pub strike_timer: f32,
}

impl HarvestTask {
    /// Start approaching a candidate
    pub fn approach(entity: &WorldEntity, source: HarvestSource, score: f32) -> Self {
        Self {
            candidate: entity.id,
            kind: source.kind(),
            source,
            position: entity.position,
            score,
            phase: HarvestPhase::Approaching,
            strike_timer: 0.0,
        }
    }
}

/// Distance score for a candidate, lower is better
///
/// Standing trees are multiplied by `standing_tree_penalty` so logs and
/// stumps nearby win over felling a fresh tree.
pub fn score_candidate(source: HarvestSource, distance: f32, standing_tree_penalty: f32) -> f32 {
    match source {
        HarvestSource::StandingTree => distance * standing_tree_penalty,
        _ => distance,
    }
}

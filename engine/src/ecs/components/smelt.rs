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

//! Smelt task state

use crate::config::SmeltConfig;
use crate::services::{FacilitySlot, Material, ObjectId};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// One step of the facility tending cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SmeltOperation {
    RefillFuel,
    RefillOre,
    CollectOutput,
    DepositOutput,
}

impl SmeltOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmeltOperation::RefillFuel => "RefillFuel",
            SmeltOperation::RefillOre => "RefillOre",
            SmeltOperation::CollectOutput => "CollectOutput",
            SmeltOperation::DepositOutput => "DepositOutput",
        }
    }
}

/// Progress through a single operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmeltStage {
    /// Walking to a container to withdraw material
    Fetching { container: ObjectId },
    /// Walking to the facility side (or deposit container) to act
    Delivering,
    /// Output collected, sweeping ground drops near the output side
    Sweeping,
}

/// A facility visit in progress
#[derive(Debug, Clone, PartialEq)]
pub struct SmeltTask {
    /// Facility for refills and collection, container for deposits
    pub target: ObjectId,
    pub operation: SmeltOperation,
    pub stage: SmeltStage,
    pub material: Material,
    pub slot: Option<FacilitySlot>,
    /// Where the agent must stand to act
    pub point: Vec3,
    /// Amount wanted this trip, already bounded by the trip cap
    pub amount: u32,
}

/// Largest amount of a material moved in one trip
///
/// Kiln wood burns as fuel, so it shares the fuel cap with coal.
pub fn trip_cap(material: Material, config: &SmeltConfig) -> u32 {
    match material {
        Material::Ore => config.ore_trip_cap,
        Material::Wood | Material::Coal => config.fuel_trip_cap,
        _ => u32::MAX,
    }
}

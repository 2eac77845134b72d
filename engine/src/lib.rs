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

//! Hearthguard companion behavior engine
//!
//! The engine decides, once per simulation tick, what a companion agent does:
//! follow its owner, fight, gather, tend furnaces, patrol home or carry out a
//! directed command. The host game is reached only through the collaborator
//! traits in [`services`]; [`sandbox`] provides an in-repo host over a `hecs`
//! world for the binary, tests and benchmarks.

pub mod config;
pub mod ecs;
pub mod persistence;
pub mod sandbox;
pub mod services;

pub use ecs::systems::{ActiveController, BehaviorController, CommandInput, CompanionBrain, TickContext};

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

//! Entity Component System (ECS) module
//!
//! Components hold the per-companion behavior state, systems hold the
//! controllers that act on it, and events carry speech and notifications to
//! the presentation layer. The sandbox host stores companions and world
//! objects in a `hecs` world.

pub use hecs::{Entity, Query, QueryBorrow, QueryOne, World};

/// Type alias for hecs runtime entity handles (non-persistent, memory-only)
/// This is NOT the same as the persistent agent UUID stored on a companion
pub type EcsEntity = Entity;

/// Type alias for the sandbox world
pub type GameWorld = World;

pub mod components;
pub mod events;
pub mod registry;
pub mod systems;

pub use registry::{EntityRegistry, RegistryError};

#[cfg(test)]
pub mod test_utils;

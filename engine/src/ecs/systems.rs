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

//! ECS Systems
//!
//! This module contains the behavior controllers that operate on companion
//! components, and the brain that arbitrates between them each tick.

mod behavior;
mod combat;
mod command;
mod follow;
mod harvest;
mod home;
mod navigation;
mod smelt;
mod targeting;

// Re-export all systems
pub use behavior::*;
pub use combat::*;
pub use command::*;
pub use follow::*;
pub use harvest::*;
pub use home::*;
pub use navigation::*;
pub use smelt::*;
pub use targeting::*;

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

//! Companion registry mapping persistent agent ids to sandbox entities
//!
//! Brains are addressed by their agent `Uuid` everywhere outside the sandbox;
//! the registry resolves them to the `hecs` handle holding their components.
//! An entity handle can back at most one agent at a time.

use crate::ecs::EcsEntity;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Entity {0:?} is already registered")]
    EntityTaken(EcsEntity),

    #[error("Agent {0} is already registered")]
    AgentTaken(Uuid),
}

/// Bidirectional agent id to entity map
#[derive(Debug, Default)]
pub struct EntityRegistry {
    agents: HashMap<Uuid, EcsEntity>,
    entities: HashMap<EcsEntity, Uuid>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a companion entity under its agent id
    ///
    /// # Arguments
    /// * `entity` - Sandbox entity holding the companion's components
    /// * `agent` - Persistent agent id
    ///
    /// # Returns
    /// * `Ok(())` if registration succeeded
    /// * `Err(RegistryError)` if either side is already mapped; nothing changes
    pub fn register(&mut self, entity: EcsEntity, agent: Uuid) -> Result<(), RegistryError> {
        if self.entities.contains_key(&entity) {
            return Err(RegistryError::EntityTaken(entity));
        }
        if self.agents.contains_key(&agent) {
            return Err(RegistryError::AgentTaken(agent));
        }
        self.agents.insert(agent, entity);
        self.entities.insert(entity, agent);
        Ok(())
    }

    /// Remove an agent and its entity
    ///
    /// # Returns
    /// * `Some(EcsEntity)` - The entity that backed this agent
    /// * `None` - If the agent was not registered
    pub fn unregister_agent(&mut self, agent: Uuid) -> Option<EcsEntity> {
        let entity = self.agents.remove(&agent)?;
        self.entities.remove(&entity);
        Some(entity)
    }

    pub fn get_entity(&self, agent: Uuid) -> Option<EcsEntity> {
        self.agents.get(&agent).copied()
    }

    pub fn contains_agent(&self, agent: Uuid) -> bool {
        self.agents.contains_key(&agent)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Registered agent ids in ascending order, so iteration is reproducible
    pub fn agents(&self) -> Vec<Uuid> {
        let mut agents: Vec<Uuid> = self.agents.keys().copied().collect();
        agents.sort();
        agents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::GameWorld;

    #[test]
    fn test_register_and_lookup() {
        let mut world = GameWorld::new();
        let mut registry = EntityRegistry::new();
        let entity = world.spawn(());
        let agent = Uuid::new_v4();

        registry.register(entity, agent).unwrap();

        assert_eq!(registry.get_entity(agent), Some(entity));
        assert!(registry.contains_agent(agent));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_registration() {
        let mut world = GameWorld::new();
        let mut registry = EntityRegistry::new();
        let first = world.spawn(());
        let second = world.spawn(());
        let agent = Uuid::new_v4();

        registry.register(first, agent).unwrap();

        assert_eq!(registry.register(second, agent), Err(RegistryError::AgentTaken(agent)));
        assert_eq!(
            registry.register(first, Uuid::new_v4()),
            Err(RegistryError::EntityTaken(first))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let mut world = GameWorld::new();
        let mut registry = EntityRegistry::new();
        let a = world.spawn(());
        let b = world.spawn(());
        let agent_a = Uuid::new_v4();
        let agent_b = Uuid::new_v4();
        registry.register(a, agent_a).unwrap();
        registry.register(b, agent_b).unwrap();

        assert_eq!(registry.unregister_agent(agent_a), Some(a));
        assert_eq!(registry.unregister_agent(agent_b), Some(b));
        assert_eq!(registry.unregister_agent(agent_b), None);
        assert!(registry.is_empty());

        registry.register(a, agent_b).unwrap();
        assert_eq!(registry.get_entity(agent_b), Some(a));
    }

    #[test]
    fn test_agents_sorted() {
        let mut world = GameWorld::new();
        let mut registry = EntityRegistry::new();
        for _ in 0..5 {
            registry.register(world.spawn(()), Uuid::new_v4()).unwrap();
        }

        let agents = registry.agents();
        let mut sorted = agents.clone();
        sorted.sort();
        assert_eq!(agents, sorted);
    }
}

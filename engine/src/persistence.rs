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

//! Companion profile persistence
//!
//! The behavior core never touches storage itself. The host saves a
//! [`CompanionProfile`] whenever a brain reports its persisted state changed
//! and loads it again when the companion is spawned. Two stores are
//! provided:
//! - [`MemoryAgentStore`] for tests and throwaway sessions
//! - [`JsonFileAgentStore`] keeping one `<agent-id>.json` document per
//!   companion in a directory

use hearthguard_common::CompanionProfile;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Profile document is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} exists and is not a directory")]
    NotADirectory(PathBuf),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Keyed storage of companion profiles
#[cfg_attr(test, mockall::automock)]
pub trait AgentStore: Send + Sync {
    fn load(&self, agent: Uuid) -> PersistenceResult<Option<CompanionProfile>>;

    /// Insert or replace the profile stored under its agent id
    fn save(&self, profile: &CompanionProfile) -> PersistenceResult<()>;

    /// Remove a profile, returning whether one existed
    fn delete(&self, agent: Uuid) -> PersistenceResult<bool>;

    /// Every stored agent id in ascending order
    fn list(&self) -> PersistenceResult<Vec<Uuid>>;
}

/// Load every stored profile, skipping ids that vanish mid-listing
pub fn load_all(store: &dyn AgentStore) -> PersistenceResult<Vec<CompanionProfile>> {
    let mut profiles = Vec::new();
    for agent in store.list()? {
        if let Some(profile) = store.load(agent)? {
            profiles.push(profile);
        }
    }
    Ok(profiles)
}

/// Save a batch of profiles, returning how many were written
///
/// Stops at the first failure; profiles before it stay saved.
pub fn save_all(store: &dyn AgentStore, profiles: &[CompanionProfile]) -> PersistenceResult<usize> {
    for profile in profiles {
        store.save(profile)?;
    }
    if !profiles.is_empty() {
        tracing::debug!(count = profiles.len(), "Saved companion profiles");
        metrics::counter!("companion.profiles_saved").increment(profiles.len() as u64);
    }
    Ok(profiles.len())
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryAgentStore {
    profiles: RwLock<HashMap<Uuid, CompanionProfile>>,
}

impl MemoryAgentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.profiles.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AgentStore for MemoryAgentStore {
    fn load(&self, agent: Uuid) -> PersistenceResult<Option<CompanionProfile>> {
        let profiles = self.profiles.read().unwrap_or_else(|e| e.into_inner());
        Ok(profiles.get(&agent).cloned())
    }

    fn save(&self, profile: &CompanionProfile) -> PersistenceResult<()> {
        let mut profiles = self.profiles.write().unwrap_or_else(|e| e.into_inner());
        profiles.insert(profile.agent_id, profile.clone());
        Ok(())
    }

    fn delete(&self, agent: Uuid) -> PersistenceResult<bool> {
        let mut profiles = self.profiles.write().unwrap_or_else(|e| e.into_inner());
        Ok(profiles.remove(&agent).is_some())
    }

    fn list(&self) -> PersistenceResult<Vec<Uuid>> {
        let profiles = self.profiles.read().unwrap_or_else(|e| e.into_inner());
        let mut agents: Vec<Uuid> = profiles.keys().copied().collect();
        agents.sort();
        Ok(agents)
    }
}

/// Directory of pretty-printed JSON profile documents
#[derive(Debug, Clone)]
pub struct JsonFileAgentStore {
    directory: PathBuf,
}

impl JsonFileAgentStore {
    const EXTENSION: &'static str = "json";

    /// Open a store rooted at `directory`, creating it when missing
    pub fn open(directory: impl Into<PathBuf>) -> PersistenceResult<Self> {
        let directory = directory.into();
        if directory.exists() && !directory.is_dir() {
            return Err(PersistenceError::NotADirectory(directory));
        }
        fs::create_dir_all(&directory)?;
        tracing::info!(directory = %directory.display(), "Opened companion profile store");
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, agent: Uuid) -> PathBuf {
        self.directory.join(format!("{agent}.{}", Self::EXTENSION))
    }
}

impl AgentStore for JsonFileAgentStore {
    fn load(&self, agent: Uuid) -> PersistenceResult<Option<CompanionProfile>> {
        let text = match fs::read_to_string(self.path_for(agent)) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn save(&self, profile: &CompanionProfile) -> PersistenceResult<()> {
        let path = self.path_for(profile.agent_id);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_vec_pretty(profile)?)?;
        fs::rename(&staging, &path)?;
        tracing::trace!(agent = %profile.agent_id, path = %path.display(), "Saved profile");
        Ok(())
    }

    fn delete(&self, agent: Uuid) -> PersistenceResult<bool> {
        match fs::remove_file(self.path_for(agent)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> PersistenceResult<Vec<Uuid>> {
        let mut agents = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(Self::EXTENSION) {
                continue;
            }
            let Some(agent) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| Uuid::parse_str(stem).ok())
            else {
                tracing::warn!(path = %path.display(), "Ignoring stray file in profile store");
                continue;
            };
            agents.push(agent);
        }
        agents.sort();
        Ok(agents)
    }
}

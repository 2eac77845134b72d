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

use clap::Parser;
use hearthguard_engine::config::{Arguments, Configuration};
use hearthguard_engine::persistence::{self, AgentStore, JsonFileAgentStore};
use hearthguard_engine::sandbox::{Sandbox, Scenario};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

/// Persist every companion whose profile changed since the last save
fn save_dirty(store: &dyn AgentStore, sandbox: &mut Sandbox) {
    let dirty = sandbox.take_dirty_profiles();
    if let Err(e) = persistence::save_all(store, &dirty) {
        tracing::error!("Failed to save companion profiles: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load arguments from the command line
    let arguments: Arguments = Parser::parse();

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .with_ansi(true)
        .init();

    // Load environment variables from .env file if specified
    if let Some(ref env_file) = arguments.env_file {
        if std::path::Path::new(env_file).exists() {
            tracing::debug!("Loading environment variables from file: {}", env_file);
            dotenv::from_filename(env_file).ok();
        }
    } else {
        tracing::debug!("Loading environment variables from default file");
        dotenv::dotenv().ok();
    }

    // Load configuration, falling back to built-in tuning
    let config = match Configuration::load(&arguments.config_file) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Using default configuration ({}): {}", arguments.config_file, e);
            Configuration::default()
        }
    };
    tracing::debug!("Configuration loaded: {:?}", config);
    let Configuration {
        simulation,
        persistence: storage,
        behavior,
    } = config;

    tracing::info!("Starting Hearthguard sandbox...");
    let store = JsonFileAgentStore::open(storage.directory())?;
    let saved = persistence::load_all(&store)?;
    tracing::info!("Restored {} companion profiles from {}", saved.len(), store.directory().display());

    let mut sandbox = Scenario::new(simulation.seed)
        .companions(simulation.companions)
        .restore(saved)
        .build(Arc::new(behavior))?;

    // Speech goes to the log in place of bubbles
    sandbox.events().subscribe(|event| {
        if let Some(line) = event.speech() {
            tracing::info!(agent = %event.agent(), "\"{}\"", line.text());
        }
    });

    let tick_seconds = simulation.tick_seconds();
    let save_every = u64::from(simulation.tick_rate.max(1));
    let mut interval = tokio::time::interval(Duration::from_secs_f32(tick_seconds));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tracing::info!(
        "Running {} companions at {} ticks per second",
        sandbox.agents().len(),
        simulation.tick_rate
    );
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }

        for (agent, active) in sandbox.tick(tick_seconds) {
            tracing::trace!(%agent, controller = active.as_str(), "Tick");
        }
        sandbox.events().process_events();

        if sandbox.ticks() % save_every == 0 {
            save_dirty(&store, &mut sandbox);
        }
        if arguments.ticks.is_some_and(|limit| sandbox.ticks() >= limit) {
            tracing::info!("Reached {} ticks", sandbox.ticks());
            break;
        }
    }

    let saved = persistence::save_all(&store, &sandbox.profiles())?;
    tracing::info!(
        "Saved {} companion profiles after {:.1} simulated seconds",
        saved,
        sandbox.elapsed()
    );
    Ok(())
}

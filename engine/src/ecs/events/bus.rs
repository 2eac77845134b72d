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

//! Companion event bus
//!
//! Controllers publish while ticking; the host flushes the queue once per
//! frame. Handlers either see every event or only those of one companion,
//! which is how a speech bubble attached to a single agent listens.

use super::types::CompanionEvent;
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

pub type EventHandler = Box<dyn Fn(&CompanionEvent) + Send + Sync>;

struct Subscription {
    agent: Option<Uuid>,
    handler: EventHandler,
}

impl Subscription {
    fn wants(&self, event: &CompanionEvent) -> bool {
        self.agent.is_none_or(|agent| agent == event.agent())
    }
}

#[derive(Default)]
struct Shared {
    subscriptions: RwLock<Vec<Subscription>>,
    pending: Mutex<Vec<CompanionEvent>>,
}

/// Cloneable handle to one queue of companion events
///
/// Every brain holds a clone, so all companions of a sandbox publish into
/// the same queue.
#[derive(Clone, Default)]
pub struct EventBus {
    shared: Arc<Shared>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `handler` for every event on flush
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&CompanionEvent) + Send + Sync + 'static,
    {
        self.add(None, Box::new(handler));
    }

    /// Run `handler` only for events about `agent`
    pub fn subscribe_agent<F>(&self, agent: Uuid, handler: F)
    where
        F: Fn(&CompanionEvent) + Send + Sync + 'static,
    {
        self.add(Some(agent), Box::new(handler));
    }

    fn add(&self, agent: Option<Uuid>, handler: EventHandler) {
        let mut subscriptions = self.shared.subscriptions.write().unwrap_or_else(|e| e.into_inner());
        subscriptions.push(Subscription { agent, handler });
    }

    pub fn publish(&self, event: CompanionEvent) {
        tracing::trace!(agent = %event.agent(), "Companion event: {:?}", event);
        self.pending().push(event);
    }

    /// Hand every queued event to the matching handlers, oldest first
    ///
    /// Returns how many events were flushed. Handlers may publish; those
    /// events wait for the next flush.
    pub fn process_events(&self) -> usize {
        let events = self.drain();
        let subscriptions = self.shared.subscriptions.read().unwrap_or_else(|e| e.into_inner());
        for event in &events {
            subscriptions
                .iter()
                .filter(|subscription| subscription.wants(event))
                .for_each(|subscription| (subscription.handler)(event));
        }
        events.len()
    }

    /// Take the queue without running handlers
    pub fn drain(&self) -> Vec<CompanionEvent> {
        std::mem::take(&mut *self.pending())
    }

    /// Drop queued events about one companion, e.g. after it despawns
    pub fn forget(&self, agent: Uuid) {
        self.pending().retain(|event| event.agent() != agent);
    }

    pub fn clear(&self) {
        self.pending().clear();
    }

    pub fn queue_len(&self) -> usize {
        self.pending().len()
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, Vec<CompanionEvent>> {
        self.shared.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subscriptions = self
            .shared
            .subscriptions
            .read()
            .map(|subscriptions| subscriptions.len())
            .unwrap_or_default();
        f.debug_struct("EventBus")
            .field("queued", &self.queue_len())
            .field("subscriptions", &subscriptions)
            .finish()
    }
}

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

//! Owner commands resolved and carried out through the sandbox

use glam::Vec3;
use hearthguard_common::{ActionMode, BehaviorToggles, CompanionProfile};
use hearthguard_engine::config::BehaviorConfig;
use hearthguard_engine::ecs::components::{ActionRecord, BehaviorError, FixtureKind, HostileCreature, LockKind};
use hearthguard_engine::ecs::events::CompanionEvent;
use hearthguard_engine::ecs::systems::{DirectedAction, DirectedPhase, Directive};
use hearthguard_engine::sandbox::{Sandbox, SandboxError};
use hearthguard_engine::services::{Interaction, ItemClass};
use hearthguard_engine::{ActiveController, CommandInput};
use std::sync::Arc;
use uuid::Uuid;

const DT: f32 = 0.05;

fn sandbox_with(agent_at: Vec3) -> (Sandbox, Uuid) {
    let mut sandbox = Sandbox::new(Arc::new(BehaviorConfig::default()));
    sandbox.spawn_owner(Vec3::ZERO);
    let profile = CompanionProfile::new(Uuid::new_v4(), Uuid::new_v4(), "Thrall");
    sandbox.spawn_companion(&profile, agent_at).unwrap();
    sandbox
        .give_item(profile.agent_id, ItemClass::MeleeWeapon, 10.0)
        .unwrap();
    (sandbox, profile.agent_id)
}

fn mode_changes(events: &[CompanionEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, CompanionEvent::ModeChanged { .. }))
        .count()
}

#[test]
fn test_attack_preempts_cart_in_same_tick() {
    let (mut sandbox, agent) = sandbox_with(Vec3::new(3.0, 0.0, 0.0));
    let cart = Vec3::new(9.0, 0.0, 0.0);
    sandbox.spawn_fixture(cart, FixtureKind::Cart { attached: false });

    sandbox.set_aim(Some(cart));
    sandbox.issue(agent, CommandInput::Aim).unwrap();
    for _ in 0..3 {
        sandbox.tick(DT);
    }
    {
        let brain = sandbox.brain(agent).unwrap();
        let task = brain.commands().task().copied().expect("cart task");
        assert_eq!(task.action, DirectedAction::Interact(Interaction::AttachCart));
    }

    let here = sandbox.position(agent).unwrap();
    let wolf_at = here + Vec3::new(0.0, 0.0, 1.5);
    let wolf = sandbox.spawn_hostile(wolf_at, HostileCreature::dummy(200.0));
    sandbox.set_aim(Some(wolf_at));
    sandbox.issue(agent, CommandInput::Aim).unwrap();
    let report = sandbox.tick(DT);

    assert_eq!(report[0].1, ActiveController::Combat);
    let brain = sandbox.brain(agent).unwrap();
    assert!(brain.commands().task().is_none());
    let lock = brain.lock().copied().expect("directed lock");
    assert_eq!(lock.target, wolf);
    assert_eq!(lock.kind, LockKind::Directed);
    drop(brain);

    let mut landed = false;
    for _ in 0..40 {
        sandbox.tick(DT);
        landed |= sandbox
            .action_log(agent)
            .iter()
            .any(|record| matches!(record, ActionRecord::Attack { target, .. } if *target == wolf.0));
        if landed {
            break;
        }
    }
    assert!(landed, "never swung at the target");
}

#[test]
fn test_cancel_all_is_idempotent() {
    let (mut sandbox, agent) = sandbox_with(Vec3::new(3.0, 0.0, 0.0));
    sandbox.set_mode(agent, ActionMode::GatherWood).unwrap();
    sandbox.tick(DT);
    sandbox.events().clear();

    sandbox
        .issue(agent, CommandInput::Directive(Directive::CancelAll))
        .unwrap();
    sandbox.tick(DT);
    assert_eq!(sandbox.brain(agent).unwrap().companion().mode, ActionMode::Follow);
    assert_eq!(mode_changes(&sandbox.events().drain()), 1);

    sandbox
        .issue(agent, CommandInput::Directive(Directive::CancelAll))
        .unwrap();
    sandbox.tick(DT);
    let brain = sandbox.brain(agent).unwrap();
    assert_eq!(brain.companion().mode, ActionMode::Follow);
    assert!(brain.lock().is_none());
    assert!(brain.commands().task().is_none());
    drop(brain);
    assert_eq!(mode_changes(&sandbox.events().drain()), 0);
}

#[test]
fn test_aim_at_nothing_cancels() {
    let (mut sandbox, agent) = sandbox_with(Vec3::new(3.0, 0.0, 0.0));
    sandbox.set_mode(agent, ActionMode::GatherStone).unwrap();

    sandbox.set_aim(None);
    sandbox.issue(agent, CommandInput::Aim).unwrap();
    sandbox.tick(DT);

    assert_eq!(sandbox.brain(agent).unwrap().companion().mode, ActionMode::Follow);
}

#[test]
fn test_directed_lock_survives_nearer_hostile_until_expiry() {
    let (mut sandbox, agent) = sandbox_with(Vec3::new(3.0, 0.0, 0.0));
    let far = sandbox.spawn_hostile(Vec3::new(3.0, 0.0, 12.0), HostileCreature::dummy(10_000.0));

    sandbox.set_aim(Some(Vec3::new(3.0, 0.0, 12.0)));
    sandbox.issue(agent, CommandInput::Aim).unwrap();
    sandbox.tick(DT);
    let near = sandbox.spawn_hostile(Vec3::new(4.0, 0.0, 3.0), HostileCreature::dummy(10_000.0));

    for _ in 0..190 {
        sandbox.tick(DT);
        let brain = sandbox.brain(agent).unwrap();
        let lock = brain.lock().copied().expect("lock held");
        assert_eq!(lock.target, far);
        assert_eq!(lock.kind, LockKind::Directed);
    }

    for _ in 0..20 {
        sandbox.tick(DT);
    }
    let brain = sandbox.brain(agent).unwrap();
    assert!(brain.lock().is_none_or(|lock| lock.kind != LockKind::Directed));
    assert!(sandbox.exists(near));
}

#[test]
fn test_commands_refused_when_not_commandable() {
    let (mut sandbox, agent) = sandbox_with(Vec3::new(3.0, 0.0, 0.0));
    sandbox
        .set_toggles(
            agent,
            BehaviorToggles {
                commandable: false,
                ..BehaviorToggles::default()
            },
        )
        .unwrap();

    let result = sandbox.issue(agent, CommandInput::Recall);

    assert!(matches!(
        result,
        Err(SandboxError::Behavior(BehaviorError::NotCommandable))
    ));
}

#[test]
fn test_sit_holds_until_recalled() {
    let (mut sandbox, agent) = sandbox_with(Vec3::new(3.0, 0.0, 0.0));
    let chair_at = Vec3::new(-6.0, 0.0, 4.0);
    let chair = sandbox.spawn_fixture(chair_at, FixtureKind::Chair);

    sandbox.set_aim(Some(chair_at));
    sandbox.issue(agent, CommandInput::Aim).unwrap();
    let mut holding = false;
    for _ in 0..120 {
        let report = sandbox.tick(DT);
        assert_eq!(report[0].1, ActiveController::Directed);
        let brain = sandbox.brain(agent).unwrap();
        if brain.commands().task().is_some_and(|task| task.phase == DirectedPhase::Holding) {
            holding = true;
            break;
        }
    }
    assert!(holding, "never sat down");
    assert!(sandbox.action_log(agent).contains(&ActionRecord::Interact {
        target: chair.0,
        interaction: Interaction::Sit,
    }));

    // Holding survives the owner walking off
    sandbox.set_owner_position(Vec3::new(0.0, 0.0, 20.0));
    for _ in 0..20 {
        sandbox.tick(DT);
    }
    assert!(sandbox.brain(agent).unwrap().commands().task().is_some());

    sandbox.issue(agent, CommandInput::Recall).unwrap();
    let report = sandbox.tick(DT);
    assert_eq!(report[0].1, ActiveController::Follow);
    assert!(sandbox.brain(agent).unwrap().commands().task().is_none());
    assert!(sandbox
        .events()
        .drain()
        .iter()
        .any(|event| matches!(event, CompanionEvent::Recalled { .. })));
}

#[test]
fn test_move_to_holds_at_point() {
    let (mut sandbox, agent) = sandbox_with(Vec3::new(3.0, 0.0, 0.0));
    let point = Vec3::new(10.0, 0.0, 10.0);

    sandbox
        .issue(agent, CommandInput::Directive(Directive::MoveTo(point)))
        .unwrap();
    for _ in 0..200 {
        sandbox.tick(DT);
    }

    let brain = sandbox.brain(agent).unwrap();
    let task = brain.commands().task().copied().expect("move order held");
    assert_eq!(task.action, DirectedAction::Hold);
    assert_eq!(task.phase, DirectedPhase::Holding);
    drop(brain);
    assert!(sandbox.position(agent).unwrap().distance(point) <= 1.5 + 1e-3);
}

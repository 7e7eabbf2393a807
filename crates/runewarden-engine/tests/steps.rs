use std::sync::Arc;
use std::time::Duration;

use runewarden_engine::sim::{InputEvent, SimulatedClient};
use runewarden_engine::snapshot::{GameObject, ObjectKind, Position, SkillId, UnitId};
use runewarden_engine::step::{CloseAllMenus, MoveTo, OpenPortal, PressKey, SetSkill};
use runewarden_engine::{
    ExecutionContext, InputArbiter, MouseButton, SessionControl, SessionId, Step, StepStatus,
};

fn context(client: &SimulatedClient, control: &SessionControl) -> ExecutionContext {
    let arbiter = Arc::new(InputArbiter::new(Duration::from_secs(30)));
    ExecutionContext::new(SessionId(1), "steps", client.backend(), arbiter, control)
}

fn portal() -> GameObject {
    GameObject {
        id: UnitId(100),
        kind: ObjectKind::Portal,
        name: "TownPortal".into(),
        position: Position::new(2, 2),
        selectable: true,
    }
}

#[tokio::test(start_paused = true)]
async fn test_open_portal_is_throttled() {
    let client = SimulatedClient::new();
    let control = SessionControl::default();
    let mut ctx = context(&client, &control);
    let mut step = OpenPortal::new('t');

    step.run(&mut ctx).await.unwrap();
    step.run(&mut ctx).await.unwrap();
    assert_eq!(client.key_presses(), 1);
    assert_eq!(client.clicks(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    step.run(&mut ctx).await.unwrap();
    assert_eq!(client.key_presses(), 2);
    assert_eq!(client.clicks(), 2);

    let pairs: Vec<_> = client
        .inputs()
        .into_iter()
        .filter(|e| !matches!(e, InputEvent::Activate))
        .collect();
    assert_eq!(
        pairs,
        [
            InputEvent::Key(u16::from(b'T')),
            InputEvent::Click(MouseButton::Right, 300, 300),
            InputEvent::Key(u16::from(b'T')),
            InputEvent::Click(MouseButton::Right, 300, 300),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_open_portal_waits_for_settle_before_completing() {
    let client = SimulatedClient::new();
    let control = SessionControl::default();
    let mut ctx = context(&client, &control);
    let mut step = OpenPortal::new('t');

    step.run(&mut ctx).await.unwrap();
    client.update(|s| s.world.objects.push(portal()));
    ctx.refresh_game_data();
    assert_eq!(step.status(&ctx), StepStatus::InProgress);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(step.status(&ctx), StepStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_status_without_run_is_idempotent() {
    let client = SimulatedClient::new();
    client.update(|s| {
        s.world.menus.inventory = true;
        s.world.key_bindings.insert(SkillId(7), 0x46);
    });
    let control = SessionControl::default();
    let ctx = context(&client, &control);

    let mut steps: Vec<Box<dyn Step>> = vec![
        Box::new(OpenPortal::new('t')),
        Box::new(CloseAllMenus::new()),
        Box::new(SetSkill::new(SkillId(7))),
        Box::new(MoveTo::new(Position::new(50, 50))),
        Box::new(PressKey::new(0x31, "PressOne")),
    ];
    for step in steps.iter_mut() {
        let first = step.status(&ctx);
        for _ in 0..5 {
            assert_eq!(step.status(&ctx), first, "{} changed without run", step.name());
        }
        assert_eq!(step.attempts(), 0);
    }
    assert!(client.inputs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_completed_step_stays_completed() {
    let client = SimulatedClient::new().with_default_reactions();
    client.update(|s| s.world.menus.stash = true);
    let control = SessionControl::default();
    let mut ctx = context(&client, &control);
    let mut step = CloseAllMenus::new();

    step.run(&mut ctx).await.unwrap();
    ctx.refresh_game_data();
    assert_eq!(step.status(&ctx), StepStatus::Completed);

    // Reopening the menu does not revive a finished step
    client.update(|s| s.world.menus.stash = true);
    ctx.refresh_game_data();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(step.status(&ctx), StepStatus::Completed);
    step.run(&mut ctx).await.unwrap();
    assert_eq!(client.key_presses(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_set_skill_without_binding_completes() {
    let client = SimulatedClient::new();
    let control = SessionControl::default();
    let ctx = context(&client, &control);
    let mut step = SetSkill::new(SkillId(42));
    assert_eq!(step.status(&ctx), StepStatus::Completed);
}

use std::sync::Arc;
use std::time::Duration;

use runewarden_engine::snapshot::{AreaId, GroundItem, ItemQuality, Position, UnitId};
use runewarden_runner::config::{AuthMethod, AutoRestartConfig, CharacterConfig, RunName, RunewardenConfig};
use runewarden_runner::{
    CommandError, CommandTable, SimulatedLauncher, SupervisorError, SupervisorEvent,
    SupervisorManager, SupervisorStatus,
};

fn config(characters: &[(&str, AuthMethod)]) -> RunewardenConfig {
    let mut config = RunewardenConfig::default();
    config.engine.poll_jitter_ms = 0;
    for (name, auth_method) in characters {
        config.characters.insert(
            name.to_string(),
            CharacterConfig {
                auth_method: *auth_method,
                ..CharacterConfig::default()
            },
        );
    }
    config
}

fn manager(config: RunewardenConfig, launcher: &Arc<SimulatedLauncher>) -> Arc<SupervisorManager> {
    Arc::new(SupervisorManager::new(config, launcher.clone()))
}

#[tokio::test(start_paused = true)]
async fn test_token_start_refused_while_another_token_session_starts() {
    let launcher = Arc::new(SimulatedLauncher::new().with_launch_delay(Duration::from_secs(5)));
    let manager = manager(
        config(&[("first", AuthMethod::TokenAuth), ("second", AuthMethod::TokenAuth)]),
        &launcher,
    );

    let starting = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.start("first").await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(manager.status("first").unwrap(), SupervisorStatus::Starting);
    assert_eq!(launcher.launch_count(), 1);

    let before = manager.status("second").unwrap();
    let refused = manager.start("second").await;
    assert!(matches!(refused, Err(SupervisorError::StartRefused { .. })));
    assert_eq!(launcher.launch_count(), 1);
    assert_eq!(manager.status("second").unwrap(), before);

    starting.await.unwrap().unwrap();
    assert_eq!(manager.status("first").unwrap(), SupervisorStatus::InGame);

    // Once the first login is through, the second one may start
    manager.start("second").await.unwrap();
    assert_eq!(launcher.launch_count(), 2);
    manager.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_password_session_refused_while_token_session_starts() {
    let launcher = Arc::new(SimulatedLauncher::new().with_launch_delay(Duration::from_secs(5)));
    let manager = manager(
        config(&[("token", AuthMethod::TokenAuth), ("plain", AuthMethod::UsernamePassword)]),
        &launcher,
    );

    let starting = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.start("token").await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(matches!(
        manager.start("plain").await,
        Err(SupervisorError::StartRefused { .. })
    ));
    starting.await.unwrap().unwrap();
    manager.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_start_and_stop() {
    let launcher = Arc::new(SimulatedLauncher::new());
    let manager = manager(config(&[("bot", AuthMethod::None)]), &launcher);
    let mut events = manager.event_bus().subscribe();

    assert_eq!(manager.status("bot").unwrap(), SupervisorStatus::NotStarted);
    manager.start("bot").await.unwrap();
    assert_eq!(manager.status("bot").unwrap(), SupervisorStatus::InGame);
    assert_eq!(launcher.stray_cleanups(), 2);

    tokio::time::sleep(Duration::from_secs(1)).await;
    manager.stop("bot").await.unwrap();
    assert_eq!(manager.status("bot").unwrap(), SupervisorStatus::Stopped);
    assert_eq!(launcher.terminations(), 1);

    let mut transitions = Vec::new();
    while let Ok(envelope) = events.try_recv() {
        assert_eq!(envelope.supervisor, "bot");
        if let SupervisorEvent::StatusChanged { from, to } = envelope.event {
            transitions.push((from, to));
        }
    }
    assert_eq!(
        transitions,
        [
            (SupervisorStatus::NotStarted, SupervisorStatus::Starting),
            (SupervisorStatus::Starting, SupervisorStatus::InGame),
            (SupervisorStatus::InGame, SupervisorStatus::Stopping),
            (SupervisorStatus::Stopping, SupervisorStatus::Stopped),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_is_rejected() {
    let launcher = Arc::new(SimulatedLauncher::new());
    let manager = manager(config(&[("bot", AuthMethod::None)]), &launcher);

    manager.start("bot").await.unwrap();
    assert!(matches!(
        manager.start("bot").await,
        Err(SupervisorError::AlreadyRunning(_))
    ));
    assert!(matches!(
        manager.start("ghost").await,
        Err(SupervisorError::Config(_))
    ));
    manager.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_pause_suspends_input() {
    let launcher = Arc::new(SimulatedLauncher::new());
    let manager = manager(config(&[("bot", AuthMethod::None)]), &launcher);
    manager.start("bot").await.unwrap();
    let client = launcher.client("bot").unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(manager.toggle_pause("bot").unwrap(), SupervisorStatus::Paused);
    tokio::time::sleep(Duration::from_secs(1)).await;
    let inputs = client.inputs().len();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(client.inputs().len(), inputs);
    assert_eq!(manager.status("bot").unwrap(), SupervisorStatus::Paused);

    assert_eq!(manager.toggle_pause("bot").unwrap(), SupervisorStatus::InGame);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(client.inputs().len() > inputs);

    manager.stop("bot").await.unwrap();
    assert_eq!(manager.status("bot").unwrap(), SupervisorStatus::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_paused() {
    let launcher = Arc::new(SimulatedLauncher::new());
    let manager = manager(config(&[("bot", AuthMethod::None)]), &launcher);
    manager.start("bot").await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    manager.toggle_pause("bot").unwrap();
    let client = launcher.client("bot").unwrap();
    client.update(|s| {
        s.in_game = true;
        s.in_character_selection = false;
    });
    let inputs = client.inputs().len();

    manager.stop("bot").await.unwrap();
    assert_eq!(manager.status("bot").unwrap(), SupervisorStatus::Stopped);
    // The stopping loop left the game
    assert!(client.inputs().len() > inputs);
    assert!(!client.update(|s| s.in_game));
}

#[tokio::test(start_paused = true)]
async fn test_client_crash_enters_error() {
    let launcher = Arc::new(SimulatedLauncher::new());
    let manager = manager(config(&[("bot", AuthMethod::None)]), &launcher);
    manager.start("bot").await.unwrap();

    launcher.client("bot").unwrap().update(|s| s.alive = false);
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(manager.status("bot").unwrap(), SupervisorStatus::Error);
    let stats = manager.stats("bot").unwrap();
    assert!(stats.errors >= 1);
    assert!(stats.last_error.unwrap().contains("client process failure"));
    assert_eq!(launcher.launch_count(), 1);

    manager.stop("bot").await.unwrap();
    assert_eq!(manager.status("bot").unwrap(), SupervisorStatus::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_client_crash_restarts_when_configured() {
    let launcher = Arc::new(SimulatedLauncher::new());
    let mut config = config(&[]);
    config.characters.insert(
        "bot".into(),
        CharacterConfig {
            auto_restart: AutoRestartConfig {
                enabled: true,
                max_restarts: 1,
                delay_secs: 1,
            },
            ..CharacterConfig::default()
        },
    );
    let manager = manager(config, &launcher);
    manager.start("bot").await.unwrap();

    launcher.client("bot").unwrap().update(|s| s.alive = false);
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(launcher.launch_count(), 2);
    assert_eq!(launcher.terminations(), 1);
    assert_eq!(manager.stats("bot").unwrap().restarts, 1);
    assert_eq!(manager.status("bot").unwrap(), SupervisorStatus::InGame);

    // Restart budget spent
    launcher.client("bot").unwrap().update(|s| s.alive = false);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(launcher.launch_count(), 2);
    assert_eq!(manager.status("bot").unwrap(), SupervisorStatus::Error);
    manager.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_restart_replaces_supervisor_waiting_to_restart() {
    let launcher = Arc::new(SimulatedLauncher::new());
    let mut config = config(&[]);
    config.characters.insert(
        "bot".into(),
        CharacterConfig {
            auto_restart: AutoRestartConfig {
                enabled: true,
                max_restarts: 3,
                delay_secs: 10,
            },
            ..CharacterConfig::default()
        },
    );
    let manager = manager(config, &launcher);
    manager.start("bot").await.unwrap();
    let failed = manager.supervisor("bot").unwrap();

    launcher.client("bot").unwrap().update(|s| s.alive = false);
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(manager.status("bot").unwrap(), SupervisorStatus::Error);
    assert!(failed.is_running());

    // Starting again shuts the failed supervisor down instead of orphaning it
    manager.start("bot").await.unwrap();
    assert!(!failed.is_running());
    assert_eq!(failed.status(), SupervisorStatus::Stopped);
    assert_eq!(launcher.launch_count(), 2);
    assert_eq!(launcher.terminations(), 1);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(launcher.launch_count(), 2);
    assert_eq!(manager.status("bot").unwrap(), SupervisorStatus::InGame);

    manager.stop("bot").await.unwrap();
    assert_eq!(launcher.terminations(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_launch_enters_error() {
    let launcher = Arc::new(SimulatedLauncher::new().failing());
    let manager = manager(config(&[("bot", AuthMethod::None)]), &launcher);

    assert!(matches!(
        manager.start("bot").await,
        Err(SupervisorError::Launch(_))
    ));
    assert_eq!(manager.status("bot").unwrap(), SupervisorStatus::Error);
    assert_eq!(manager.stats("bot").unwrap().errors, 1);
}

#[tokio::test(start_paused = true)]
async fn test_picked_items_are_recorded() {
    let launcher = Arc::new(SimulatedLauncher::new());
    let mut config = config(&[]);
    config.characters.insert(
        "bot".into(),
        CharacterConfig {
            runs: vec![RunName::LowerKurast],
            pickit: vec!["Shako".into()],
            ..CharacterConfig::default()
        },
    );
    let manager = manager(config, &launcher);
    manager.start("bot").await.unwrap();

    launcher.client("bot").unwrap().update(|s| {
        s.in_game = true;
        s.in_character_selection = false;
        s.world.player.area = AreaId(79);
        s.world.ground_items.push(GroundItem {
            id: UnitId(900),
            name: "Shako".into(),
            quality: ItemQuality::Unique,
            position: Position::new(1, 0),
        });
    });
    tokio::time::sleep(Duration::from_secs(20)).await;

    let stats = manager.stats("bot").unwrap();
    assert_eq!(stats.drops.len(), 1);
    assert_eq!(stats.drops[0].name, "Shako");
    assert_eq!(stats.drops[0].quality, "unique");
    manager.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_command_table_dispatch() {
    let launcher = Arc::new(SimulatedLauncher::new());
    let manager = manager(config(&[("sorc", AuthMethod::None)]), &launcher);
    let table = CommandTable::new();

    assert_eq!(
        table.dispatch(&manager, "sorc status").await.unwrap(),
        "sorc: not started"
    );
    assert_eq!(
        table.dispatch(&manager, "sorc start").await.unwrap(),
        "sorc started"
    );
    assert_eq!(
        table.dispatch(&manager, "sorc pause").await.unwrap(),
        "sorc is paused"
    );
    assert_eq!(
        table.dispatch(&manager, "$ tmp sorc hell").await.unwrap(),
        "Created tmp config: sorc_tmp"
    );
    assert_eq!(
        table.dispatch(&manager, "$ copy sorc pala").await.unwrap(),
        "Created new config: pala"
    );
    assert_eq!(manager.available_supervisors(), ["pala", "sorc", "sorc_tmp"]);

    let unknown = table.dispatch(&manager, "sorc dance").await.unwrap_err();
    assert!(matches!(unknown, CommandError::Unknown { .. }));
    assert_eq!(unknown.to_string(), "no handler found for sorc dance@sorc");

    assert_eq!(
        table.dispatch(&manager, "$ stop-all").await.unwrap(),
        "All supervisors stopped"
    );
    assert_eq!(manager.status("sorc").unwrap(), SupervisorStatus::Stopped);
    assert_eq!(manager.available_supervisors(), ["pala", "sorc"]);
}

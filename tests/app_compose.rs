use std::sync::{Arc, Mutex};

use hearth_ecs::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Velocity {
    x: f64,
}

#[derive(Default, Clone)]
struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct Recorder {
    name: &'static str,
    log: CallLog,
}

impl System for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn init(&mut self, _app: &mut App) -> Result<()> {
        self.log.push(format!("init:{}", self.name));
        Ok(())
    }

    fn update(&mut self, _app: &mut App, _dt: f64) -> Result<()> {
        self.log.push(self.name);
        Ok(())
    }
}

struct Failing;

impl System for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn update(&mut self, _app: &mut App, _dt: f64) -> Result<()> {
        Err(EcsError::SystemUpdate {
            system: "failing".to_string(),
            message: "boom".to_string(),
        })
    }
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn stages_run_in_lifecycle_order() {
    init_logger();
    let mut app = App::new();
    let log = CallLog::default();

    // Registered out of order on purpose; stage order must win
    for (name, stage) in [
        ("draw", Stage::Render),
        ("input", Stage::PreUpdate),
        ("cleanup", Stage::PostUpdate),
        ("simulate", Stage::Update),
        ("hud", Stage::Render),
    ] {
        app.add_system(
            Box::new(Recorder {
                name,
                log: log.clone(),
            }),
            stage,
        )
        .unwrap();
    }

    app.build().unwrap();
    app.update(0.016).unwrap();

    let ticks: Vec<String> = log
        .entries()
        .into_iter()
        .filter(|entry| !entry.starts_with("init:"))
        .collect();
    assert_eq!(ticks, vec!["input", "simulate", "cleanup", "draw", "hud"]);
}

#[test]
fn disabled_systems_skip_update_but_init() {
    let mut app = App::new();
    let log = CallLog::default();

    app.add_system(
        Box::new(Recorder {
            name: "paused",
            log: log.clone(),
        }),
        Stage::Update,
    )
    .unwrap();
    assert!(app.systems.set_enabled("paused", false));

    app.build().unwrap();
    app.update(0.016).unwrap();

    assert_eq!(log.entries(), vec!["init:paused"]);

    // Re-enabling takes effect on the next tick
    assert!(app.systems.set_enabled("paused", true));
    app.update(0.016).unwrap();
    assert_eq!(log.entries(), vec!["init:paused", "paused"]);
}

#[test]
fn system_error_aborts_tick() {
    let mut app = App::new();
    let log = CallLog::default();

    app.add_system(Box::new(Failing), Stage::Update).unwrap();
    app.add_system(
        Box::new(Recorder {
            name: "after",
            log: log.clone(),
        }),
        Stage::PostUpdate,
    )
    .unwrap();

    app.build().unwrap();
    let err = app.update(0.016).unwrap_err();
    assert!(matches!(err, EcsError::SystemUpdate { .. }));

    // Init ran at build time, but nothing past the failing system ran
    // this tick
    assert_eq!(log.entries(), vec!["init:after"]);
}

#[test]
fn duplicate_system_name_rejected() {
    let mut app = App::new();
    app.add_system(
        Box::new(Recorder {
            name: "movement",
            log: CallLog::default(),
        }),
        Stage::Update,
    )
    .unwrap();

    let err = app
        .add_system(
            Box::new(Recorder {
                name: "movement",
                log: CallLog::default(),
            }),
            Stage::Render,
        )
        .unwrap_err();
    assert!(matches!(err, EcsError::DuplicateSystemName(_)));
}

struct OrderedPlugin {
    name: &'static str,
    deps: Vec<&'static str>,
    log: CallLog,
}

impl Plugin for OrderedPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn dependencies(&self) -> Vec<&str> {
        self.deps.clone()
    }

    fn build(&self, _app: &mut App) -> Result<()> {
        self.log.push(format!("build:{}", self.name));
        Ok(())
    }

    fn on_enable(&self, _app: &mut App) {
        self.log.push(format!("enable:{}", self.name));
    }

    fn on_disable(&self, _app: &mut App) {
        self.log.push(format!("disable:{}", self.name));
    }
}

#[test]
fn plugins_build_in_dependency_order() {
    let mut app = App::new();
    let log = CallLog::default();

    app.add_plugin(OrderedPlugin {
        name: "game",
        deps: vec!["core"],
        log: log.clone(),
    })
    .unwrap();
    app.add_plugin(OrderedPlugin {
        name: "core",
        deps: vec![],
        log: log.clone(),
    })
    .unwrap();

    app.build().unwrap();

    // Dependency builds first; every build precedes every enable
    assert_eq!(
        log.entries(),
        vec!["build:core", "build:game", "enable:core", "enable:game"]
    );

    // One-shot: building again is a composition error
    assert!(matches!(app.build(), Err(EcsError::PluginsAlreadyBuilt)));
}

#[test]
fn plugin_unknown_dependency_fails_build() {
    let mut app = App::new();
    app.add_plugin(OrderedPlugin {
        name: "game",
        deps: vec!["netcode"],
        log: CallLog::default(),
    })
    .unwrap();

    let err = app.build().unwrap_err();
    match err {
        EcsError::UnknownPluginDependency { plugin, dependency } => {
            assert_eq!(plugin, "game");
            assert_eq!(dependency, "netcode");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn plugin_cycle_fails_build() {
    let mut app = App::new();
    let log = CallLog::default();
    app.add_plugin(OrderedPlugin {
        name: "a",
        deps: vec!["b"],
        log: log.clone(),
    })
    .unwrap();
    app.add_plugin(OrderedPlugin {
        name: "b",
        deps: vec!["a"],
        log: log.clone(),
    })
    .unwrap();

    assert!(matches!(
        app.build(),
        Err(EcsError::PluginDependencyCycle(_))
    ));
    assert!(log.entries().is_empty());
}

#[test]
fn duplicate_plugin_name_rejected() {
    let mut app = App::new();
    app.add_plugin(OrderedPlugin {
        name: "core",
        deps: vec![],
        log: CallLog::default(),
    })
    .unwrap();

    let err = app
        .add_plugin(OrderedPlugin {
            name: "core",
            deps: vec![],
            log: CallLog::default(),
        })
        .unwrap_err();
    assert!(matches!(err, EcsError::DuplicatePluginName(_)));
}

#[test]
fn plugin_toggle_fires_hooks() {
    let mut app = App::new();
    let log = CallLog::default();
    app.add_plugin(OrderedPlugin {
        name: "audio",
        deps: vec![],
        log: log.clone(),
    })
    .unwrap();
    app.build().unwrap();
    assert_eq!(app.plugins.is_enabled("audio"), Some(true));

    assert!(app.set_plugin_enabled("audio", false));
    assert_eq!(app.plugins.is_enabled("audio"), Some(false));
    // Toggling to the current state is a no-op
    assert!(!app.set_plugin_enabled("audio", false));
    assert!(app.set_plugin_enabled("audio", true));

    assert_eq!(
        log.entries(),
        vec!["build:audio", "enable:audio", "disable:audio", "enable:audio"]
    );
}

struct MovementSystem {
    query: Option<QuerySystem>,
}

impl System for MovementSystem {
    fn name(&self) -> &str {
        "movement"
    }

    fn init(&mut self, app: &mut App) -> Result<()> {
        let pos = app
            .world
            .component_id::<Position>()
            .ok_or(EcsError::UnregisteredComponent("Position"))?;
        let vel = app
            .world
            .component_id::<Velocity>()
            .ok_or(EcsError::UnregisteredComponent("Velocity"))?;
        self.query = Some(QuerySystem::new([pos, vel]));
        Ok(())
    }

    fn update(&mut self, app: &mut App, dt: f64) -> Result<()> {
        let query = self.query.as_mut().unwrap();
        let matches: Vec<QueryResult> = query.query(&app.world).collect();
        for result in matches {
            let dv = result.get::<Velocity>(&app.world).unwrap().x * dt;
            result.get_mut::<Position>(&mut app.world).unwrap().x += dv;
        }
        Ok(())
    }
}

struct MovementPlugin;

impl Plugin for MovementPlugin {
    fn name(&self) -> &str {
        "movement"
    }

    fn build(&self, app: &mut App) -> Result<()> {
        app.world.register_component::<Position>();
        app.world.register_component::<Velocity>();
        app.add_system(Box::new(MovementSystem { query: None }), Stage::Update)?;
        Ok(())
    }
}

#[test]
fn plugin_driven_movement_end_to_end() {
    init_logger();
    let mut app = App::new();
    app.add_plugin(MovementPlugin).unwrap();
    app.build().unwrap();

    let e = app
        .world
        .spawn((Position { x: 0.0 }, Velocity { x: 2.0 }))
        .unwrap();
    let bystander = app.world.spawn((Position { x: 100.0 },)).unwrap();

    for _ in 0..10 {
        app.update(0.5).unwrap();
    }

    let moved = app.world.get_component::<Position>(e).unwrap().x;
    assert!((moved - 10.0).abs() < 1e-9);
    // Entities without a velocity stay put
    assert_eq!(app.world.get_component::<Position>(bystander).unwrap().x, 100.0);

    // The frame clock saw every tick
    let time = app.resources.get::<Time>().unwrap();
    assert_eq!(time.frame_count(), 10);
    assert!((time.elapsed_seconds() - 5.0).abs() < 1e-9);
}

struct PauseContext {
    paused: bool,
}

#[test]
fn host_resources_via_insert_ref() {
    // A host-owned value published by reference, the render-context case
    let context = PauseContext { paused: true };

    let mut app = App::new();
    unsafe { app.resources.insert_ref(&context) };

    assert!(app.resources.has::<PauseContext>());
    assert!(app.resources.get_ref::<PauseContext>().unwrap().paused);

    assert!(app.resources.remove::<PauseContext>());
    assert!(app.resources.get_ref::<PauseContext>().is_none());
}

//! End-to-end engine runs with live filesystem watches.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use stylesync::capabilities::NativeCapabilities;
use stylesync::config::{FetchConfig, SourcesConfig};
use stylesync::engine::{Engine, StaticConfig};
use stylesync::queue::TriggerReason;
use stylesync::sink::{ChannelSink, StyleRegistry};
use stylesync::source::CssEvent;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

const DEBOUNCE: Duration = Duration::from_millis(100);
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(600);

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn engine(home: &Path, config: Arc<StaticConfig>) -> Engine {
    Engine::new(
        Arc::new(NativeCapabilities::new().with_home(home)),
        config,
        &FetchConfig::default(),
    )
    .unwrap()
    .with_debounce(DEBOUNCE)
}

fn drain(rx: &mut UnboundedReceiver<CssEvent>) -> Vec<CssEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Wait for the next event matching `want`, skipping others.
async fn next_matching(
    rx: &mut UnboundedReceiver<CssEvent>,
    want: impl Fn(&CssEvent) -> bool,
) -> Option<CssEvent> {
    timeout(EVENT_TIMEOUT, async {
        while let Some(event) = rx.recv().await {
            if want(&event) {
                return Some(event);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

/// Collect whatever arrives within `QUIET`.
async fn collect_quiet(rx: &mut UnboundedReceiver<CssEvent>) -> Vec<CssEvent> {
    tokio::time::sleep(QUIET).await;
    drain(rx)
}

fn is_add_of(path: String) -> impl Fn(&CssEvent) -> bool {
    move |event| matches!(event, CssEvent::Add { file } if file.path == path)
}

#[tokio::test]
async fn test_recursion_toggle_controls_nested_events() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("themes");
    fs::create_dir_all(dir.join("nested")).unwrap();
    fs::write(dir.join("top.css"), "t{}").unwrap();
    let nested = dir.join("nested/deep.css");
    fs::write(&nested, "d{}").unwrap();

    let config = Arc::new(StaticConfig::new(SourcesConfig::new([key(&dir)], false)));
    let engine = engine(temp.path(), config.clone());
    let (sink, mut rx) = ChannelSink::new();
    let handle = engine.init(Arc::new(sink)).unwrap();
    handle.settled().await.unwrap();

    let initial = drain(&mut rx);
    assert_eq!(initial.len(), 1, "shallow scan sees only top.css: {initial:?}");

    fs::write(&nested, "d { color: red; }").unwrap();
    assert!(collect_quiet(&mut rx).await.is_empty());

    config.set(SourcesConfig::new([key(&dir)], true));
    handle.config_saved().unwrap();
    handle.settled().await.unwrap();

    let rescan = drain(&mut rx);
    assert_eq!(rescan[0], CssEvent::RemoveDir { path: key(&dir) });
    assert_eq!(rescan.len(), 3);

    fs::write(&nested, "d { color: blue; }").unwrap();
    let event = next_matching(&mut rx, is_add_of(key(&nested))).await;
    let Some(CssEvent::Add { file }) = event else {
        panic!("nested change not seen after enabling recursion");
    };
    assert_eq!(file.src, "d { color: blue; }");
    assert_eq!(file.parent.as_deref(), Some(key(&dir).as_str()));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_fixed_sass_emits_exactly_one_add() {
    let temp = TempDir::new().unwrap();
    let sass = temp.path().join("theme.scss");
    fs::write(&sass, "a { color: red;").unwrap();

    let config = Arc::new(StaticConfig::new(SourcesConfig::new([key(&sass)], false)));
    let engine = engine(temp.path(), config);
    let (sink, mut rx) = ChannelSink::new();
    let handle = engine.init(Arc::new(sink)).unwrap();
    handle.settled().await.unwrap();

    assert!(drain(&mut rx).is_empty());

    fs::write(&sass, "$c: green;\na { color: $c; }").unwrap();

    let event = next_matching(&mut rx, is_add_of(key(&sass))).await;
    let Some(CssEvent::Add { file }) = event else {
        panic!("fixed Sass file was not reloaded");
    };
    assert!(file.src.contains("color: green"));

    let extra: Vec<_> = collect_quiet(&mut rx)
        .await
        .into_iter()
        .filter(|event| matches!(event, CssEvent::Add { .. }))
        .collect();
    assert!(extra.is_empty(), "duplicate adds: {extra:?}");

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_deleting_files_emits_remove() {
    let temp = TempDir::new().unwrap();
    let single = temp.path().join("single.css");
    fs::write(&single, "s{}").unwrap();
    let dir = temp.path().join("themes");
    fs::create_dir(&dir).unwrap();
    let child = dir.join("child.css");
    fs::write(&child, "c{}").unwrap();

    let config = Arc::new(StaticConfig::new(SourcesConfig::new(
        [format!("@dark {}", key(&single)), key(&dir)],
        false,
    )));
    let engine = engine(temp.path(), config);
    let registry = Arc::new(StyleRegistry::new());
    let (sink, mut rx) = ChannelSink::new();
    let handle = engine.init(Arc::new(sink)).unwrap();
    handle.settled().await.unwrap();

    for event in drain(&mut rx) {
        registry.apply(event);
    }
    assert_eq!(registry.len(), 2);

    fs::remove_file(&child).unwrap();
    let removed = next_matching(&mut rx, |e| matches!(e, CssEvent::Remove { .. })).await;
    assert_eq!(removed, Some(CssEvent::Remove { path: key(&child) }));

    fs::remove_file(&single).unwrap();
    let removed = next_matching(&mut rx, |e| matches!(e, CssEvent::Remove { .. })).await;
    assert_eq!(
        removed,
        Some(CssEvent::Remove {
            path: format!("@dark {}", key(&single))
        })
    );

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_new_file_in_watched_directory_is_added() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("themes");
    fs::create_dir(&dir).unwrap();

    let config = Arc::new(StaticConfig::new(SourcesConfig::new([key(&dir)], false)));
    let engine = engine(temp.path(), config);
    let (sink, mut rx) = ChannelSink::new();
    let handle = engine.init(Arc::new(sink)).unwrap();
    handle.settled().await.unwrap();
    assert!(drain(&mut rx).is_empty());

    let created = dir.join("late.css");
    fs::write(&created, "late{}").unwrap();
    fs::write(dir.join("ignored.txt"), "x").unwrap();

    let event = next_matching(&mut rx, |_| true).await;
    assert!(matches!(event, Some(CssEvent::Add { ref file }) if file.path == key(&created)));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_queued_triggers_run_in_order() {
    let temp = TempDir::new().unwrap();
    let files: Vec<_> = ["a.css", "b.css", "c.css"]
        .iter()
        .map(|name| {
            let path = temp.path().join(name);
            fs::write(&path, format!("/* {name} */")).unwrap();
            path
        })
        .collect();

    let config = Arc::new(StaticConfig::new(SourcesConfig::new([key(&files[0])], false)));
    let engine = engine(temp.path(), config.clone());
    let registry = Arc::new(StyleRegistry::new());
    let handle = engine.init(registry.clone()).unwrap();

    config.set(SourcesConfig::new([key(&files[1])], false));
    handle.trigger(TriggerReason::Manual).unwrap();
    config.set(SourcesConfig::new([key(&files[2])], false));
    handle.trigger(TriggerReason::Manual).unwrap();
    handle.settled().await.unwrap();

    assert_eq!(handle.passes_completed(), 3);
    assert_eq!(registry.paths(), vec![key(&files[2])]);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_double_init_fails() {
    let temp = TempDir::new().unwrap();
    let engine = engine(temp.path(), Arc::new(StaticConfig::default()));

    let handle = engine.init(Arc::new(StyleRegistry::new())).unwrap();
    let second = engine.init(Arc::new(StyleRegistry::new()));
    assert!(matches!(
        second,
        Err(stylesync::EngineError::AlreadyInitialized)
    ));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_deleting_watched_directory_emits_remove_dir() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("themes");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("a.css"), "a{}").unwrap();

    let config = Arc::new(StaticConfig::new(SourcesConfig::new([key(&dir)], false)));
    let engine = engine(temp.path(), config);
    let (sink, mut rx) = ChannelSink::new();
    let handle = engine.init(Arc::new(sink)).unwrap();
    handle.settled().await.unwrap();
    assert_eq!(drain(&mut rx).len(), 1);

    fs::remove_dir_all(&dir).unwrap();

    let root = key(&dir);
    let event = next_matching(&mut rx, |event| {
        matches!(event, CssEvent::RemoveDir { path } if *path == root)
    })
    .await;
    assert!(event.is_some(), "directory removal not reported");

    handle.shutdown().await.unwrap();
}

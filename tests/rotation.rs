//! End-to-end rotation scenarios for floaty
//!
//! Drives a registry and handler through the lifecycles operators rely on,
//! using a controllable clock and counting generator.
//!
//! Run with: cargo test --test rotation

use floaty::{
    EntryConfig, FloatyConfig, FloatyError, FloatyHandler, Placeholders, Registry,
    parse_directive,
};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

/// Generator producing zero-padded sequence numbers, with a call counter
fn counting_generator() -> (
    impl Fn(usize) -> Result<String, FloatyError> + Send + Sync + 'static,
    Arc<AtomicUsize>,
) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let generator = move |length: usize| -> Result<String, FloatyError> {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{n:0>length$}"))
    };
    (generator, calls)
}

#[test]
fn test_single_entry_lifecycle() {
    let config = parse_directive("floaty 8 10s").unwrap();
    let registry = Registry::initialize(&config, 0).unwrap();

    let v0 = registry.snapshot("root").unwrap();
    assert_eq!(v0.value.len(), 8);
    assert_eq!(v0.expires_at, 10_000);

    assert_eq!(registry.get("root", 5_000).unwrap(), v0.value);

    let v1 = registry.get("root", 10_001).unwrap();
    assert_ne!(v1, v0.value);
    assert_eq!(registry.snapshot("root").unwrap().expires_at, 20_001);
}

#[test]
fn test_multiple_named_entries_published() {
    let config = FloatyConfig {
        length: Some(8),
        duration: Some(Duration::from_secs(60)),
        ..FloatyConfig::default()
    }
    .with_entry("session", EntryConfig::new(16, Duration::from_secs(30)));
    let registry = Registry::builder()
        .with_clock(|| Ok(0))
        .build(&config)
        .unwrap();
    let handler = FloatyHandler::new(Arc::new(registry));

    let mut vars = Placeholders::new();
    handler.annotate(&mut vars);

    let keys: Vec<&str> = vars.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, ["floaty", "floaty.session"]);
    assert_eq!(vars.get("floaty").unwrap().len(), 8);
    assert_eq!(vars.get("floaty.session").unwrap().len(), 16);
}

#[test]
fn test_unknown_entry_not_published() {
    let registry = Arc::new(Registry::initialize(&FloatyConfig::default(), 0).unwrap());
    assert_eq!(registry.get("nonexistent", 0), None);

    let handler = FloatyHandler::new(Arc::clone(&registry));
    let mut vars = Placeholders::new();
    handler.annotate(&mut vars);
    assert_eq!(vars.get("floaty.nonexistent"), None);
    assert_eq!(handler.resolve("floaty.nonexistent"), None);
}

#[test]
fn test_configuration_defaults_applied() {
    let config = FloatyConfig::default()
        .with_entry("short", EntryConfig::new(0, Duration::from_millis(500)))
        .with_entry("bare", EntryConfig::default());
    let registry = Registry::initialize(&config, 0).unwrap();

    let short = registry.snapshot("short").unwrap();
    assert_eq!(short.value.len(), 8);
    assert_eq!(short.expires_at, 10_000);

    let bare = registry.snapshot("bare").unwrap();
    assert_eq!(bare.expires_at, 900_000);

    assert_eq!(registry.snapshot("root").unwrap().expires_at, 5_400_000);
}

#[test]
fn test_short_directive_window_raised_to_minimum() {
    let config = parse_directive("floaty 8 500ms").unwrap();
    let registry = Registry::initialize(&config, 0).unwrap();

    let root = registry.snapshot("root").unwrap();
    assert_eq!(root.expires_at, 10_000);

    let v0 = root.value;
    assert_eq!(registry.get("root", 9_999).unwrap(), v0);
    assert_ne!(registry.get("root", 10_000).unwrap(), v0);
}

#[test]
fn test_concurrent_readers_rotate_once() {
    const READERS: usize = 32;

    let (generator, calls) = counting_generator();
    let config = FloatyConfig {
        duration: Some(Duration::from_secs(10)),
        ..FloatyConfig::default()
    };
    let registry = Arc::new(
        Registry::builder()
            .with_generator(generator)
            .build_at(&config, 0)
            .unwrap(),
    );
    let barrier = Arc::new(Barrier::new(READERS));

    let handles: Vec<_> = (0..READERS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                registry.get("root", 10_000).unwrap()
            })
        })
        .collect();
    let values: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(values.iter().all(|v| v == &values[0]));
    assert_eq!(registry.stats().rotations, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_generation() {
    let (generator, calls) = counting_generator();
    let clock = Arc::new(AtomicU64::new(0));
    let config = FloatyConfig {
        duration: Some(Duration::from_secs(10)),
        ..FloatyConfig::default()
    }
    .with_entry("session", EntryConfig::new(16, Duration::from_secs(10)));

    let clock_source = Arc::clone(&clock);
    let registry = Registry::builder()
        .with_generator(generator)
        .with_clock(move || Ok(clock_source.load(Ordering::SeqCst)))
        .build(&config)
        .unwrap();
    let handler = Arc::new(FloatyHandler::new(Arc::new(registry)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    clock.store(10_000, Ordering::SeqCst);

    let mut tasks = Vec::new();
    for _ in 0..64 {
        let handler = Arc::clone(&handler);
        tasks.push(tokio::spawn(async move {
            handler
                .serve(Placeholders::new(), |vars| async move { vars })
                .await
        }));
    }

    let mut seen = Vec::new();
    for task in tasks {
        seen.push(task.await.unwrap());
    }

    // One regeneration per entry, observed identically by every request
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(seen.iter().all(|vars| vars == &seen[0]));
    assert_eq!(handler.registry().stats().rotations, 2);
}

#[test]
fn test_handlers_do_not_share_state() {
    let config = FloatyConfig::default();
    let first = FloatyHandler::new(Arc::new(Registry::initialize(&config, 0).unwrap()));
    let second = FloatyHandler::new(Arc::new(Registry::initialize(&config, 0).unwrap()));

    let mut a = Placeholders::new();
    let mut b = Placeholders::new();
    first.annotate_at(&mut a, 1_000);
    second.annotate_at(&mut b, 1_000);
    assert_ne!(a.get("floaty"), b.get("floaty"));

    first.registry().current_values(6_000_000);
    let mut b_again = Placeholders::new();
    second.annotate_at(&mut b_again, 1_000);
    assert_eq!(b, b_again);
}

/// In-memory log sink shared with the subscriber
#[derive(Clone, Default)]
struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_rotation_is_logged_with_old_and_new_values() {
    let (generator, _) = counting_generator();
    let config = parse_directive("floaty 8 10s").unwrap();
    let registry = Registry::builder()
        .with_generator(generator)
        .build_at(&config, 0)
        .unwrap();
    let handler = FloatyHandler::new(Arc::new(registry));

    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let mut vars = Placeholders::new();
        handler.annotate_at(&mut vars, 5_000);
        handler.annotate_at(&mut vars, 10_000);
    });

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 1, "only the rotation is logged: {output}");
    assert!(lines[0].contains("identifier rotated"));
    assert!(lines[0].contains("entry=root"));
    assert!(lines[0].contains("old=00000000"));
    assert!(lines[0].contains("new=00000001"));
    assert!(lines[0].contains("previous_expires_at=10000"));
    assert!(lines[0].contains("expires_at=20000"));
}

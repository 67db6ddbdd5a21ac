//! End-to-end tests for the engine and its delivery stages

use sherlog_pipeline::{
    log_event, Deliver, Engine, EngineConfig, Envelope, FilePolicy, Generic, JsonSink, Publisher,
    Request, RequestPath, Severity, Stats, TerminalPolicy, TextSink,
};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

type CapturedText = Publisher<TerminalPolicy<Vec<u8>>, TextSink>;

fn config(pool_capacity: usize) -> EngineConfig {
    EngineConfig {
        pool_capacity,
        ..EngineConfig::default()
    }
}

fn captured_engine(pool_capacity: usize) -> Engine<CapturedText> {
    Engine::new(
        config(pool_capacity),
        Publisher::new(TerminalPolicy::with_writer(Vec::new())),
    )
}

/// Shut the engine down and return what the terminal policy received
fn finish(engine: Engine<CapturedText>) -> String {
    engine.shutdown();
    let publisher = engine.take_delivery().expect("delivery should survive shutdown");
    String::from_utf8(publisher.into_policy().writer().clone()).unwrap()
}

/// Delivery counting events per tag
#[derive(Default)]
struct TagCounter {
    generic: usize,
    request: usize,
}

impl Deliver for TagCounter {
    fn deliver<E: Envelope>(&mut self, envelope: &E, _line: &str) {
        match E::TAG {
            sherlog_pipeline::Tag::Generic => self.generic += 1,
            sherlog_pipeline::Tag::Request => self.request += 1,
        }
        assert_eq!(envelope.header().schema_version, 1);
    }
}

/// A generic event reaches the terminal as a text line
#[test]
fn test_generic_event_to_terminal() {
    let engine = captured_engine(16);
    engine.log::<Generic>((Severity::Info, 1000u64, 1u32, 0u32, 1u16, 1u16, 1u16));

    let output = finish(engine);
    assert!(output.contains("severity=Info"), "output: {output}");
    assert!(output.contains("timestamp=1000"), "output: {output}");
    assert!(output.contains("class_id=Handler"), "output: {output}");
    assert!(output.contains("method_id=Start"), "output: {output}");
    assert!(output.ends_with('\n'));
}

/// A request event ends with its body fields
#[test]
fn test_request_event_line_shape() {
    let engine = captured_engine(16);
    log_event!(
        engine,
        Request;
        Severity::Error,
        5u64,
        7u32,
        99u32,
        7u16,
        7u16,
        1u16,
        555u64,
        RequestPath::from("/api/v1/users"),
    );

    let output = finish(engine);
    let line = output.lines().next().unwrap();
    assert!(line.starts_with("[tag=1] severity=Error "), "line: {line}");
    assert!(line.ends_with("req_unique_id=555 path=/api/v1/users "), "line: {line}");
}

/// With no free slot the event is dropped and nothing is written
#[test]
fn test_exhausted_pool_drops() {
    let engine = captured_engine(0);
    let before = engine.stats();

    engine.log::<Generic>((Severity::Warn, 0u64, 0u32, 0u32, 0u16, 0u16, 1u16));

    let after = engine.stats();
    assert_eq!(after.dropped, before.dropped + 1);
    assert_eq!(after.written, before.written);
    assert_eq!(after.enqueued, 0);

    assert!(finish(engine).is_empty());
}

/// Everything enqueued before shutdown is written before the worker joins
#[test]
fn test_shutdown_drains_queue() {
    const K: u64 = 500;
    let engine = captured_engine(1024);

    for i in 0..K {
        engine.log::<Generic>((Severity::Info, i, 1u32, i as u32, 0u16, 0u16, 1u16));
    }
    engine.shutdown();

    assert_eq!(engine.stats(), Stats { dropped: 0, enqueued: K, written: K });
    assert_eq!(engine.available_slots(), engine.pool_capacity());

    let output = String::from_utf8(engine.take_delivery().unwrap().into_policy().writer().clone()).unwrap();
    let timestamps: Vec<u64> = output
        .lines()
        .map(|line| {
            let token = line.split(' ').find(|t| t.starts_with("timestamp=")).unwrap();
            token["timestamp=".len()..].parse().unwrap()
        })
        .collect();
    assert_eq!(timestamps, (0..K).collect::<Vec<u64>>());
}

/// Without draining, queued events are discarded and counted as dropped
#[test]
fn test_shutdown_without_drain_discards() {
    let engine = Engine::new(
        EngineConfig {
            pool_capacity: 64,
            idle_sleep: Duration::from_millis(200),
            drain_on_shutdown: false,
            ..EngineConfig::default()
        },
        TagCounter::default(),
    );

    for _ in 0..32 {
        engine.log::<Generic>((Severity::Info, 0u64, 0u32, 0u32, 0u16, 0u16, 1u16));
    }
    engine.shutdown();

    let stats = engine.stats();
    assert_eq!(stats.enqueued, 32);
    assert_eq!(stats.written + stats.dropped, 32);
    assert_eq!(engine.available_slots(), 64);

    let counter = engine.take_delivery().unwrap();
    assert_eq!(counter.generic as u64, stats.written);
}

/// Producers on many threads share one engine
#[test]
fn test_concurrent_producers() {
    const NUM_THREADS: usize = 8;
    const PER_THREAD: usize = 1_000;

    let engine = Arc::new(Engine::new(config(256), TagCounter::default()));
    let barrier = Arc::new(Barrier::new(NUM_THREADS));

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|t| {
            let engine = engine.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..PER_THREAD {
                    if t % 2 == 0 {
                        engine.log::<Generic>((Severity::Info, i as u64, t as u32, 0u32, 0u16, 0u16, 1u16));
                    } else {
                        engine.log::<Request>((
                            Severity::Info,
                            i as u64,
                            t as u32,
                            0u32,
                            0u16,
                            0u16,
                            1u16,
                            i as u64,
                            RequestPath::from("/concurrent"),
                        ));
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    engine.shutdown();
    let stats = engine.stats();
    assert_eq!(stats.enqueued + stats.dropped, (NUM_THREADS * PER_THREAD) as u64);
    assert_eq!(stats.written, stats.enqueued);

    let counter = engine.take_delivery().unwrap();
    assert_eq!((counter.generic + counter.request) as u64, stats.written);
}

/// File policy with the JSON sink appends one object per line
#[test]
fn test_file_json_delivery() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.jsonl");

    {
        let publisher: Publisher<FilePolicy, JsonSink> = Publisher::new(FilePolicy::new(&path));
        let engine = Engine::new(config(16), publisher);
        engine.log::<Request>((
            Severity::Warn,
            10u64,
            2u32,
            3u32,
            0u16,
            6u16,
            1u16,
            77u64,
            RequestPath::from("/files"),
        ));
        // Dropping the engine shuts it down
    }

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1);

    let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(value["tag"], 1);
    assert_eq!(value["severity"], "Warn");
    assert_eq!(value["req_unique_id"], 77);
    assert_eq!(value["path"], "/files");
}

/// Request body text cannot stand in for header fields in JSON output
#[test]
fn test_json_delivery_keeps_header_fields_with_tricky_paths() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tricky.jsonl");

    {
        let publisher: Publisher<FilePolicy, JsonSink> = Publisher::new(FilePolicy::new(&path));
        let engine = Engine::new(config(16), publisher);
        for request_path in ["/search severity=Info timestamp=0", "42"] {
            engine.log::<Request>((
                Severity::Error,
                1000u64,
                3u32,
                4u32,
                1u16,
                3u16,
                1u16,
                555u64,
                RequestPath::from(request_path),
            ));
        }
    }

    let contents = std::fs::read_to_string(&path).unwrap();
    let values: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(values.len(), 2);

    for value in &values {
        assert_eq!(value["severity"], "Error");
        assert_eq!(value["timestamp"], 1000);
        assert_eq!(value["req_unique_id"], 555);
    }
    assert_eq!(values[0]["path"], "/search severity=Info timestamp=0");
    assert_eq!(values[1]["path"], "42");
}

/// Id-like text inside a request path is not rewritten by the text sink
#[test]
fn test_text_delivery_leaves_path_ids_alone() {
    let engine = captured_engine(16);
    engine.log::<Request>((
        Severity::Info,
        1u64,
        1u32,
        1u32,
        1u16,
        3u16,
        1u16,
        9u64,
        RequestPath::from("/q class_id=1"),
    ));

    let output = finish(engine);
    let line = output.lines().next().unwrap();
    assert!(line.contains("class_id=Handler method_id=Run "), "line: {line}");
    assert!(line.ends_with("path=\"/q class_id=1\" "), "line: {line}");
}

/// File policy with the text sink keeps appending across engines
#[test]
fn test_file_text_appends() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.log");

    for run in 0..2u64 {
        let publisher: Publisher<FilePolicy, TextSink> =
            Publisher::new(FilePolicy::try_open(&path).unwrap());
        let engine = Engine::new(config(4), publisher);
        engine.log::<Generic>((Severity::Info, run, 0u32, 0u32, 2u16, 6u16, 1u16));
        engine.shutdown();
    }

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 2);
    assert!(contents.lines().all(|l| l.contains("class_id=Database method_id=Query")));
}

//! Basic usage example for the sherlog pipeline
//!
//! This example demonstrates:
//! 1. Building an engine from the environment-aware configuration
//! 2. Logging header-only and request events from several threads
//! 3. Switching the delivery to a JSON file through the type parameter
//! 4. Reading the counters after a draining shutdown
//!
//! Text lines go to standard output; the JSON copy is written to a file in
//! the system temp directory.

use sherlog_pipeline::clock::{mapped_thread_id, monotonic_ticks};
use sherlog_pipeline::names::{ClassId, MethodId};
use sherlog_pipeline::{
    log_event, Engine, EngineConfig, FilePolicy, Generic, JsonSink, Publisher, Request,
    RequestPath, Severity,
};

use std::sync::Arc;
use std::thread;

const NUM_WORKERS: usize = 4;
const REQUESTS_PER_WORKER: u32 = 5;

fn main() -> sherlog_pipeline::Result<()> {
    // SHERLOG_POOL_CAPACITY and friends override the defaults
    let config = EngineConfig::from_env()?;
    println!("Using pool capacity {}", config.pool_capacity);

    let engine = Arc::new(Engine::stdout(config.clone()));
    engine.start()?;

    engine.log::<Generic>((
        Severity::Info,
        monotonic_ticks(),
        mapped_thread_id(),
        0,
        ClassId::Server.as_u16(),
        MethodId::ServerStart.as_u16(),
        1,
    ));

    let handles: Vec<_> = (0..NUM_WORKERS)
        .map(|worker| {
            let engine = engine.clone();
            thread::spawn(move || {
                for n in 0..REQUESTS_PER_WORKER {
                    let request_id = worker as u32 * 100 + n;
                    let path = format!("/api/v1/users/{request_id}");
                    let severity = if n % 4 == 3 { Severity::Warn } else { Severity::Info };

                    log_event!(
                        engine,
                        Request;
                        severity,
                        monotonic_ticks(),
                        mapped_thread_id(),
                        request_id,
                        ClassId::Handler.as_u16(),
                        MethodId::HandlerRun.as_u16(),
                        1,
                        u64::from(request_id) << 8,
                        RequestPath::from(path.as_str()),
                    );
                }
            })
        })
        .collect();

    for handle in handles {
        let _ = handle.join();
    }

    engine.shutdown();
    let stats = engine.stats();
    println!(
        "Terminal engine: enqueued={} written={} dropped={}",
        stats.enqueued, stats.written, stats.dropped
    );

    // Same events, framed as JSON and appended to a file
    let json_path = std::env::temp_dir().join("sherlog_example.jsonl");
    let publisher: Publisher<FilePolicy, JsonSink> = Publisher::new(FilePolicy::try_open(&json_path)?);
    let file_engine = Engine::new(config, publisher);

    file_engine.log::<Request>((
        Severity::Error,
        monotonic_ticks(),
        mapped_thread_id(),
        42,
        ClassId::Database.as_u16(),
        MethodId::DatabaseCommit.as_u16(),
        1,
        4242,
        RequestPath::from("/api/v1/orders"),
    ));
    file_engine.shutdown();

    println!("JSON events appended to {}", json_path.display());
    Ok(())
}

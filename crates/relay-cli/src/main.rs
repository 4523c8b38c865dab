//! relay デモ
//!
//! インメモリのレコードソースにレコードを流し込みながら、ログに書くだけの
//! 書き込み先に向けて同期を 1 回走らせ、RunReport を JSON で出力する。
//!
//! ```text
//! relay-cli [scheduler.json] [stream ...]
//! ```
//!
//! scheduler.json は `SchedulerConfig` の JSON（省略時は既定値）。例:
//! ```json
//! { "max_concurrency": 8, "backoff": { "max_delay": 20 }, "drain_on_done": true }
//! ```
//! ストリーム名を省略すると users / orders / events。

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::time::{Duration, sleep};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use relay_core::app::{Scheduler, SchedulerConfig};
use relay_core::domain::{Record, RecordInput, StreamCatalog, StreamId, TaskError};
use relay_core::impls::InMemoryRecordSource;
use relay_core::ports::StandardDestination;

const DEFAULT_STREAMS: [&str; 3] = ["users", "orders", "events"];
const RECORDS_PER_STREAM: usize = 100;
const BATCH_SIZE: usize = 25;

/// Writes nothing; logs every call and counts records.
#[derive(Default)]
struct LoggingDestination {
    written: AtomicUsize,
}

#[async_trait]
impl StandardDestination for LoggingDestination {
    async fn setup(&self) -> Result<(), TaskError> {
        info!("destination setup");
        Ok(())
    }

    async fn open_stream(&self, stream: &StreamId) -> Result<(), TaskError> {
        info!(%stream, "stream opened");
        Ok(())
    }

    async fn process_batch(&self, stream: &StreamId, input: &RecordInput) -> Result<(), TaskError> {
        // 書き込みの代わり
        sleep(Duration::from_millis(2)).await;
        let total = self.written.fetch_add(input.payload.len(), Ordering::Relaxed) + input.payload.len();
        info!(%stream, records = input.payload.len(), end_of_stream = input.end_of_stream, total, "batch written");
        Ok(())
    }

    async fn close_stream(&self, stream: &StreamId) -> Result<(), TaskError> {
        info!(%stream, "stream closed");
        Ok(())
    }

    async fn teardown(&self) -> Result<(), TaskError> {
        info!(written = self.written.load(Ordering::Relaxed), "destination teardown");
        Ok(())
    }
}

/// `[scheduler.json] [stream ...]` from argv.
fn parse_args() -> Result<(SchedulerConfig, Vec<String>), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => SchedulerConfig::from_json_file(&path)?,
        None => SchedulerConfig::default(),
    };
    let mut streams: Vec<String> = args.collect();
    if streams.is_empty() {
        streams = DEFAULT_STREAMS.iter().map(|s| s.to_string()).collect();
    }
    Ok((config, streams))
}

/// Feed every stream in small bursts, then mark it complete.
async fn produce(source: Arc<InMemoryRecordSource>, streams: Vec<StreamId>, per_stream: usize) {
    for i in 0..per_stream {
        for stream in &streams {
            let record = Record::new(stream.clone(), serde_json::json!({ "seq": i, "stream": stream }));
            if let Err(e) = source.push(record) {
                warn!(error = %e, buffered = source.buffered(stream), "dropping record");
            }
        }
        if i % 20 == 19 {
            sleep(Duration::from_millis(5)).await;
        }
    }
    for stream in &streams {
        source.complete(stream);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (config, streams) = parse_args()?;
    let catalog = StreamCatalog::new(streams.iter().map(String::as_str))?;
    let streams: Vec<StreamId> = catalog.iter().cloned().collect();

    let source = Arc::new(InMemoryRecordSource::new(BATCH_SIZE, RECORDS_PER_STREAM));
    let producer = tokio::spawn(produce(Arc::clone(&source), streams, RECORDS_PER_STREAM));

    let destination = Arc::new(LoggingDestination::default());
    let scheduler = Scheduler::for_destination(config, catalog, source, destination)?;
    info!(
        streams = scheduler.catalog().len(),
        max_concurrency = scheduler.config().max_concurrency,
        drain_on_done = scheduler.config().drain_on_done,
        "starting sync"
    );
    let report = scheduler.run().await?;
    producer.await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

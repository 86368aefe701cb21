//! Binlog 위치 도구
//!
//! 사용법:
//!   binlog_position compare '<checkpoint json>' '<checkpoint json>'
//!   binlog_position normalize-gtid '<gtid set>'
//!   binlog_position replay < events.jsonl

use binlog_position::checkpoint::{spawn_checkpoint_writer, MemoryOffsetStore};
use binlog_position::{
    CdcError, GtidSet, LogCoordinates, ReplicationPosition, TrackerConfig, TrackerEvent,
    TransactionTracker,
};
use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 초기화
    tracing_subscriber::fmt::init();

    let config = TrackerConfig::from_env()?;
    let args: Vec<String> = env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("compare") if args.len() == 3 => {
            let a = ReplicationPosition::from_json(&serde_json::from_str::<serde_json::Value>(&args[1])?)?;
            let b = ReplicationPosition::from_json(&serde_json::from_str::<serde_json::Value>(&args[2])?)?;
            let order = config.comparator()?.compare(&a, &b)?;
            println!("{}", order);
        }
        Some("normalize-gtid") if args.len() == 2 => {
            println!("{}", GtidSet::parse(&args[1])?);
        }
        Some("replay") => replay(&config).await?,
        _ => {
            eprintln!("usage: binlog_position compare <a> <b> | normalize-gtid <set> | replay");
            std::process::exit(2);
        }
    }

    Ok(())
}

/// 표준 입력의 트래커 알림(JSON lines)을 재생하며 체크포인트를 기록
async fn replay(config: &TrackerConfig) -> Result<(), CdcError> {
    let mut tracker = match env::var("CDC_START_CHECKPOINT") {
        Ok(raw) => {
            let start = ReplicationPosition::from_json(&serde_json::from_str::<serde_json::Value>(&raw)?)?;
            TransactionTracker::restore(config, &start.to_checkpoint())?
        }
        Err(_) => TransactionTracker::new(config, LogCoordinates::new("mysql-bin.000001", 4)),
    };

    let store = Arc::new(MemoryOffsetStore::new());
    let writer = spawn_checkpoint_writer(
        tracker.checkpoint_reader(),
        store.clone(),
        config.checkpoint_interval,
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut applied = 0usize;
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| CdcError::InvalidFormat(format!("입력 읽기 실패: {}", e)))?
    {
        if line.trim().is_empty() {
            continue;
        }
        let event: TrackerEvent = serde_json::from_str(&line)?;
        event.apply(&mut tracker)?;
        applied += 1;
    }

    writer.stop().await?;
    info!(
        "Replayed {} notifications, {} checkpoints written",
        applied,
        store.history().len()
    );
    println!("{}", tracker.offset().to_json());
    Ok(())
}

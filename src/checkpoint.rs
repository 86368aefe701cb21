//! 체크포인트 스냅샷 공개 및 주기적 저장
//!
//! 트래커는 위치가 바뀔 때마다 불변 `ReplicationPosition`을 통째로 교체합니다.
//! 읽는 쪽은 `Arc`만 복제하므로 절반만 갱신된 값을 볼 수 없습니다.

use crate::error::{CdcError, Result};
use crate::offset::{CheckpointMap, ReplicationPosition};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

type Slot = Arc<RwLock<Arc<ReplicationPosition>>>;

/// 쓰기 측 (트래커 전용)
#[derive(Debug)]
pub struct PositionPublisher {
    slot: Slot,
}

impl PositionPublisher {
    pub fn new(initial: ReplicationPosition) -> Self {
        PositionPublisher {
            slot: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    pub fn publish(&self, position: ReplicationPosition) {
        *self.slot.write() = Arc::new(position);
    }

    pub fn reader(&self) -> CheckpointReader {
        CheckpointReader {
            slot: Arc::clone(&self.slot),
        }
    }
}

/// 읽기 측 (체크포인트 기록기 등)
#[derive(Debug, Clone)]
pub struct CheckpointReader {
    slot: Slot,
}

impl CheckpointReader {
    pub fn snapshot(&self) -> Arc<ReplicationPosition> {
        self.slot.read().clone()
    }

    pub fn checkpoint(&self) -> CheckpointMap {
        self.snapshot().to_checkpoint()
    }
}

/// 체크포인트 저장소
pub trait OffsetStore: Send + Sync {
    fn store(&self, offset: &CheckpointMap) -> Result<()>;

    fn load(&self) -> Result<Option<CheckpointMap>>;
}

/// 메모리 기반 저장소 (테스트 및 데모용)
#[derive(Debug, Default)]
pub struct MemoryOffsetStore {
    history: Mutex<Vec<CheckpointMap>>,
}

impl MemoryOffsetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금까지 저장된 모든 체크포인트
    pub fn history(&self) -> Vec<CheckpointMap> {
        self.history.lock().clone()
    }
}

impl OffsetStore for MemoryOffsetStore {
    fn store(&self, offset: &CheckpointMap) -> Result<()> {
        self.history.lock().push(offset.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<CheckpointMap>> {
        Ok(self.history.lock().last().cloned())
    }
}

/// 백그라운드 체크포인트 기록기 핸들
pub struct CheckpointWriter {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<()>>,
}

impl CheckpointWriter {
    /// 마지막 체크포인트를 기록하고 종료
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle
            .await
            .map_err(|e| CdcError::Store(format!("체크포인트 기록 태스크 실패: {}", e)))?
    }
}

/// `interval`마다 바뀐 체크포인트를 저장소에 기록하는 태스크 시작
pub fn spawn_checkpoint_writer(
    reader: CheckpointReader,
    store: Arc<dyn OffsetStore>,
    interval: Duration,
) -> CheckpointWriter {
    let (tx, rx) = oneshot::channel();
    let handle = tokio::spawn(run_writer(reader, store, interval, rx));

    CheckpointWriter {
        shutdown: Some(tx),
        handle,
    }
}

async fn run_writer(
    reader: CheckpointReader,
    store: Arc<dyn OffsetStore>,
    interval: Duration,
    mut shutdown: oneshot::Receiver<()>,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    let mut last_written: Option<CheckpointMap> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = write_if_changed(&reader, store.as_ref(), &mut last_written) {
                    error!("Checkpoint write failed: {}", e);
                    return Err(e);
                }
            }
            _ = &mut shutdown => {
                write_if_changed(&reader, store.as_ref(), &mut last_written)?;
                info!("Checkpoint writer stopped");
                return Ok(());
            }
        }
    }
}

fn write_if_changed(
    reader: &CheckpointReader,
    store: &dyn OffsetStore,
    last_written: &mut Option<CheckpointMap>,
) -> Result<()> {
    let current = reader.checkpoint();
    if last_written.as_ref() == Some(&current) {
        return Ok(());
    }

    debug!("Writing checkpoint: {:?}", current);
    store.store(&current)?;
    *last_written = Some(current);
    Ok(())
}

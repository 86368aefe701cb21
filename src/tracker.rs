//! 트랜잭션 경계를 고려한 위치 추적 상태 머신
//!
//! Binlog 리더는 이벤트/행 단위로 트래커에 알리고, 트래커는 재시작에
//! 필요한 위치(`ReplicationPosition`)를 갱신해 공개합니다.
//!
//! 트랜잭션이 열려 있는 동안 체크포인트 좌표는 트랜잭션 시작(BEGIN)에
//! 고정되고, 완료된 이벤트 수와 행 수로 재시작 지점을 표현합니다.

use crate::checkpoint::{CheckpointReader, PositionPublisher};
use crate::config::TrackerConfig;
use crate::coordinates::LogCoordinates;
use crate::error::Result;
use crate::gtid::GtidSet;
use crate::offset::{CheckpointMap, ReplicationPosition};
use crate::source::{SnapshotRecord, SourceInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// 트래커 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerState {
    Idle,
    InTransaction,
}

/// 복원된 체크포인트가 요구하는 건너뛰기 지점
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResumePoint {
    coordinates: LogCoordinates,
    events_to_skip: u32,
    rows_to_skip: u32,
}

impl ResumePoint {
    /// `position`이 아직 이 지점에 도달하지 못했는지 여부
    fn is_ahead_of(&self, position: &ReplicationPosition) -> bool {
        position.coordinates == self.coordinates
            && (position.events_to_skip, position.row_in_event)
                < (self.events_to_skip, self.rows_to_skip)
    }
}

/// Binlog 위치 추적기
#[derive(Debug)]
pub struct TransactionTracker {
    state: TrackerState,
    source: SourceInfo,
    /// 재시작 시 사용할 위치 (트랜잭션 밖에서는 events_to_skip이 항상 0)
    restart: ReplicationPosition,
    /// 마지막으로 공개된 위치
    published: ReplicationPosition,
    current_event_size: u64,
    /// 현재 트랜잭션이 커밋되면 완료 집합이 될 GTID 집합
    pending_gtid_set: Option<GtidSet>,
    /// 체크포인트에서 복원된 건너뛰기 값 (재시작 동안 유지)
    restored_skips: Option<ResumePoint>,
    /// 리더가 아직 건너뛰기 지점을 지나지 않았으면 Some
    resume: Option<ResumePoint>,
    publisher: PositionPublisher,
}

impl TransactionTracker {
    /// 주어진 좌표에서 새로 시작
    pub fn new(config: &TrackerConfig, start: LogCoordinates) -> Self {
        let mut source = SourceInfo::new(config.server_name.clone(), config.server_id);
        source.binlog_filename = start.filename.clone();
        source.binlog_position = start.position;

        let mut restart = ReplicationPosition::new(start);
        restart.server_id = Some(config.server_id).filter(|id| *id != 0);

        TransactionTracker {
            state: TrackerState::Idle,
            source,
            publisher: PositionPublisher::new(restart.clone()),
            published: restart.clone(),
            restart,
            current_event_size: 0,
            pending_gtid_set: None,
            restored_skips: None,
            resume: None,
        }
    }

    /// 저장된 체크포인트로부터 복원
    ///
    /// 트랜잭션 도중의 체크포인트라면 좌표는 BEGIN을 가리킵니다. 리더가
    /// BEGIN부터 다시 읽으며 완료된 이벤트와 행을 건너뛰는 동안 공개 위치는
    /// 복원된 위치 아래로 내려가지 않습니다.
    pub fn restore(config: &TrackerConfig, checkpoint: &CheckpointMap) -> Result<Self> {
        let position = ReplicationPosition::from_checkpoint(checkpoint)?;
        info!("Restoring position from checkpoint: {}", position);

        let mut tracker = TransactionTracker::new(config, position.coordinates.clone());
        tracker.source.snapshot = if position.in_snapshot {
            SnapshotRecord::True
        } else {
            SnapshotRecord::False
        };
        if position.events_to_skip > 0 || position.row_in_event > 0 {
            let skips = ResumePoint {
                coordinates: position.coordinates.clone(),
                events_to_skip: position.events_to_skip,
                rows_to_skip: position.row_in_event,
            };
            tracker.restored_skips = Some(skips.clone());
            tracker.resume = Some(skips);
        }
        tracker.restart = ReplicationPosition {
            server_id: position.server_id.or(tracker.restart.server_id),
            row_in_event: 0,
            events_to_skip: 0,
            ..position
        };
        tracker.publish();
        Ok(tracker)
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn is_in_transaction(&self) -> bool {
        self.state == TrackerState::InTransaction
    }

    /// 체크포인트에 기록될 현재 재시작 위치
    pub fn offset(&self) -> &ReplicationPosition {
        &self.published
    }

    pub fn checkpoint(&self) -> CheckpointMap {
        self.published.to_checkpoint()
    }

    /// 재시작 시 트랜잭션 시작부터 건너뛸 이벤트 수
    pub fn events_to_skip_upon_restart(&self) -> u32 {
        self.restored_skips.as_ref().map_or(0, |r| r.events_to_skip)
    }

    /// 재시작 시 건너뛴 이벤트 다음 이벤트에서 건너뛸 행 수
    pub fn rows_to_skip_upon_restart(&self) -> u32 {
        self.restored_skips.as_ref().map_or(0, |r| r.rows_to_skip)
    }

    /// 복원된 건너뛰기 지점을 아직 지나지 않았는지 여부
    pub fn is_resuming(&self) -> bool {
        self.resume.is_some()
    }

    pub fn checkpoint_reader(&self) -> CheckpointReader {
        self.publisher.reader()
    }

    /// 현재 행의 source 정보
    pub fn source(&self) -> &SourceInfo {
        &self.source
    }

    /// 파일의 첫 이벤트 위치로 이동 (로테이션 이후 등)
    pub fn set_start_point(&mut self, filename: &str, position: u64) {
        self.source.binlog_filename = filename.to_string();
        self.source.binlog_position = position;
        self.source.row = 0;
        self.restart.coordinates = LogCoordinates::new(filename, position);
        self.restart.row_in_event = 0;
        self.restart.events_to_skip = 0;
        self.publish();
    }

    /// 새 이벤트 관찰
    ///
    /// 트랜잭션 밖에서는 재시작 좌표가 이 이벤트의 시작으로 이동합니다.
    /// 트랜잭션 안에서는 BEGIN 위치를 유지하고 커밋 후 위치 계산용 값만 갱신합니다.
    pub fn observe_event(&mut self, filename: &str, offset: u64, size: u64) {
        if self.source.binlog_filename != filename {
            self.source.binlog_filename = filename.to_string();
        }
        self.source.binlog_position = offset;
        self.source.row = 0;
        self.current_event_size = size;

        if self.state == TrackerState::Idle {
            self.restart.coordinates = LogCoordinates::new(filename, offset);
            self.restart.row_in_event = 0;
            self.restart.events_to_skip = 0;
            self.publish();
        }
    }

    /// 트랜잭션 시작 (BEGIN 이벤트 관찰 직후 호출)
    pub fn begin_transaction(&mut self) {
        if self.state == TrackerState::InTransaction {
            warn!(
                "BEGIN observed inside an open transaction at {}:{}, restarting transaction",
                self.source.binlog_filename, self.source.binlog_position
            );
        }

        self.state = TrackerState::InTransaction;
        self.restart.coordinates =
            LogCoordinates::new(self.source.binlog_filename.clone(), self.source.binlog_position);
        self.restart.row_in_event = 0;
        self.restart.events_to_skip = 0;
        debug!("Transaction started at {}", self.restart.coordinates);
        self.publish();
    }

    /// 현재 이벤트의 행 번호 설정
    ///
    /// 마지막 행이면 재시작 행 수는 `total_rows`(이벤트 전체 완료),
    /// 그 외에는 `row_index + 1`(다음 행부터 재개)입니다.
    pub fn set_row(&mut self, row_index: u32, total_rows: u32) {
        self.source.row = row_index;
        self.restart.row_in_event = if row_index.saturating_add(1) < total_rows {
            row_index + 1
        } else {
            total_rows
        };
        self.publish();
    }

    /// 현재 이벤트 처리 완료
    pub fn complete_event(&mut self) {
        match self.state {
            TrackerState::InTransaction => {
                self.restart.events_to_skip += 1;
            }
            TrackerState::Idle => {
                // 트랜잭션 밖의 이벤트(DDL 등)는 끝났으므로 다음 이벤트부터 재개
                self.restart.coordinates = self.next_event_coordinates();
                if let Some(gtid_set) = self.pending_gtid_set.take() {
                    self.restart.gtid_set = Some(gtid_set);
                }
            }
        }
        self.restart.row_in_event = 0;
        self.publish();
    }

    /// 트랜잭션 커밋 (COMMIT/XID 이벤트 관찰 직후 호출)
    pub fn commit_transaction(&mut self) {
        if self.state == TrackerState::Idle {
            debug!("Commit observed outside of a transaction");
        }

        self.state = TrackerState::Idle;
        self.restart.coordinates = self.next_event_coordinates();
        self.restart.row_in_event = 0;
        self.restart.events_to_skip = 0;
        if let Some(gtid_set) = self.pending_gtid_set.take() {
            self.restart.gtid_set = Some(gtid_set);
        }
        self.source.query = None;
        debug!("Transaction committed, next position {}", self.restart.coordinates);
        self.publish();
    }

    /// 트랜잭션의 GTID 관찰
    ///
    /// `gtid_set`은 이 트랜잭션을 포함한 실행 완료 집합이며 커밋 시 체크포인트에 반영됩니다.
    /// GTID 이벤트는 BEGIN보다 먼저 오므로 `begin_transaction`은 이 값을 유지합니다.
    /// 트랜잭션 밖의 이벤트라면 `complete_event`에서 반영됩니다.
    pub fn start_gtid(&mut self, gtid: &str, gtid_set: &str) -> Result<()> {
        self.source.gtid = Some(gtid.to_string());
        if let Some(parsed) = GtidSet::parse_optional(Some(gtid_set))? {
            self.pending_gtid_set = Some(parsed);
        }
        Ok(())
    }

    /// 이미 완료된 GTID 집합 설정 (공백이면 무시)
    pub fn set_completed_gtid_set(&mut self, gtid_set: &str) -> Result<()> {
        if let Some(parsed) = GtidSet::parse_optional(Some(gtid_set))? {
            self.restart.gtid_set = Some(parsed);
            self.publish();
        }
        Ok(())
    }

    pub fn start_snapshot(&mut self) {
        self.restart.in_snapshot = true;
        self.source.snapshot = SnapshotRecord::True;
        self.publish();
    }

    pub fn mark_last_snapshot_record(&mut self) {
        self.source.snapshot = SnapshotRecord::Last;
    }

    pub fn complete_snapshot(&mut self) {
        self.restart.in_snapshot = false;
        self.source.snapshot = SnapshotRecord::False;
        self.publish();
    }

    pub fn is_snapshot_running(&self) -> bool {
        self.restart.in_snapshot
    }

    /// 이벤트 발생 시각 (체크포인트의 ts_sec에도 반영)
    pub fn set_source_time(&mut self, time: DateTime<Utc>) {
        self.source.source_time = Some(time);
        self.restart.ts_sec = u64::try_from(time.timestamp()).ok();
        self.publish();
    }

    pub fn database_event(&mut self, database: &str) {
        self.source.database = Some(database.to_string());
        self.source.table = None;
    }

    pub fn table_event(&mut self, database: &str, table: &str) {
        self.source.database = Some(database.to_string());
        self.source.table = Some(table.to_string());
    }

    pub fn set_thread_id(&mut self, thread_id: u64) {
        self.source.thread_id = Some(thread_id);
    }

    pub fn set_query(&mut self, query: Option<String>) {
        self.source.query = query;
    }

    fn next_event_coordinates(&self) -> LogCoordinates {
        LogCoordinates::new(
            self.source.binlog_filename.clone(),
            self.source.binlog_position + self.current_event_size,
        )
    }

    /// 현재 재시작 위치를 공개
    ///
    /// 복원된 건너뛰기 지점에 도달하기 전에는 그 지점의 카운터를 유지합니다.
    fn publish(&mut self) {
        let mut position = self.restart.clone();
        if let Some(resume) = self.resume.take() {
            if resume.is_ahead_of(&position) {
                position.events_to_skip = resume.events_to_skip;
                position.row_in_event = resume.rows_to_skip;
                self.resume = Some(resume);
            } else {
                debug!("Passed restored skip point, tracking from {}", position);
            }
        }
        self.publisher.publish(position.clone());
        self.published = position;
    }
}

/// Binlog 리더가 트래커에 전달하는 알림
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TrackerEvent {
    StartPoint { file: String, position: u64 },
    Event { file: String, offset: u64, size: u64 },
    Begin,
    Row { index: u32, total: u32 },
    CompleteEvent,
    Commit,
    Gtid { gtid: String, gtid_set: String },
}

impl TrackerEvent {
    pub fn apply(&self, tracker: &mut TransactionTracker) -> Result<()> {
        match self {
            TrackerEvent::StartPoint { file, position } => tracker.set_start_point(file, *position),
            TrackerEvent::Event { file, offset, size } => tracker.observe_event(file, *offset, *size),
            TrackerEvent::Begin => tracker.begin_transaction(),
            TrackerEvent::Row { index, total } => tracker.set_row(*index, *total),
            TrackerEvent::CompleteEvent => tracker.complete_event(),
            TrackerEvent::Commit => tracker.commit_transaction(),
            TrackerEvent::Gtid { gtid, gtid_set } => tracker.start_gtid(gtid, gtid_set)?,
        }
        Ok(())
    }
}

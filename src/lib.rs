//! MySQL Binlog CDC 위치 추적 및 순서 비교 엔진
//!
//! 이 라이브러리는 binlog 스트림에서 "어디까지 처리했는지"를 정확히 기록하고
//! 기록된 두 위치의 선후 관계를 판단합니다.
//! 주요 기능:
//! - GTID (Global Transaction ID) 집합 파싱 및 부분 순서 비교
//! - Binlog 좌표 (파일명 + 위치) 비교
//! - 트랜잭션 경계를 고려한 재시작 위치 추적
//! - 체크포인트 맵 변환 및 주기적 저장
//! - 블로킹 스냅샷 시그널 처리

pub mod checkpoint;
pub mod comparator;
pub mod config;
pub mod coordinates;
pub mod error;
pub mod gtid;
pub mod interval;
pub mod offset;
pub mod signal;
pub mod source;
pub mod tracker;

pub use checkpoint::{spawn_checkpoint_writer, CheckpointReader, MemoryOffsetStore, OffsetStore};
pub use comparator::{PositionComparator, PositionOrder};
pub use config::TrackerConfig;
pub use coordinates::LogCoordinates;
pub use error::{CdcError, Result};
pub use gtid::{GtidFilter, GtidSet};
pub use interval::IntervalSet;
pub use offset::{CheckpointMap, ReplicationPosition};
pub use signal::{BlockingSnapshotRequest, BlockingSnapshotSession};
pub use source::SourceInfo;
pub use tracker::{TrackerEvent, TrackerState, TransactionTracker};

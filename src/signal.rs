//! 블로킹 스냅샷 시그널
//!
//! 시그널 형식:
//! {"type": "blocking", "data-collections": ["db.tbl"], "additional-conditions": [...]}
//!
//! 시그널을 받은 커넥터는 스트리밍을 멈추고 대상 테이블을 스냅샷한 뒤
//! 멈춘 위치에서 다시 스트리밍합니다. 경계에서 이벤트가 중복될 수 있습니다.

use crate::comparator::{PositionComparator, PositionOrder};
use crate::error::{CdcError, Result};
use crate::offset::ReplicationPosition;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// 스냅샷 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    Blocking,
    Incremental,
}

/// 테이블별 추가 필터 조건
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalCondition {
    #[serde(rename = "data-collection")]
    pub data_collection: String,
    pub filter: String,
}

/// 스냅샷 시그널 원본 데이터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSignal {
    #[serde(rename = "type", default = "default_kind")]
    pub kind: SnapshotKind,
    #[serde(rename = "data-collections")]
    pub data_collections: Vec<String>,
    #[serde(rename = "additional-conditions", default)]
    pub additional_conditions: Vec<AdditionalCondition>,
}

fn default_kind() -> SnapshotKind {
    SnapshotKind::Incremental
}

/// 검증된 블로킹 스냅샷 요청
#[derive(Debug, Clone)]
pub struct BlockingSnapshotRequest {
    patterns: Vec<Regex>,
    data_collections: Vec<String>,
    conditions: BTreeMap<String, String>,
}

impl BlockingSnapshotRequest {
    pub fn parse(payload: &str) -> Result<Self> {
        let signal: SnapshotSignal = serde_json::from_str(payload)?;
        Self::from_signal(signal)
    }

    pub fn from_signal(signal: SnapshotSignal) -> Result<Self> {
        if signal.kind != SnapshotKind::Blocking {
            return Err(CdcError::Signal(format!(
                "블로킹 스냅샷 시그널이 아닙니다: {:?}",
                signal.kind
            )));
        }

        let data_collections: Vec<String> = signal
            .data_collections
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if data_collections.is_empty() {
            return Err(CdcError::Signal("data-collections가 비어 있습니다".to_string()));
        }

        let patterns = data_collections
            .iter()
            .map(|c| Regex::new(&format!("^(?:{})$", c)))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let conditions = signal
            .additional_conditions
            .into_iter()
            .map(|c| (c.data_collection, c.filter))
            .collect();

        Ok(BlockingSnapshotRequest {
            patterns,
            data_collections,
            conditions,
        })
    }

    pub fn data_collections(&self) -> &[String] {
        &self.data_collections
    }

    /// "db.table" 형식의 컬렉션이 요청 대상인지 여부
    pub fn matches(&self, collection: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(collection))
    }

    pub fn filter_for(&self, collection: &str) -> Option<&str> {
        self.conditions.get(collection).map(String::as_str)
    }
}

/// 진행 중인 블로킹 스냅샷
#[derive(Debug)]
pub struct BlockingSnapshotSession {
    request: BlockingSnapshotRequest,
    suspended_at: ReplicationPosition,
}

impl BlockingSnapshotSession {
    /// 스트리밍 중단 위치 기록
    pub fn suspend(request: BlockingSnapshotRequest, position: &ReplicationPosition) -> Self {
        info!(
            "Suspending streaming at {} for blocking snapshot of {:?}",
            position,
            request.data_collections()
        );
        BlockingSnapshotSession {
            request,
            suspended_at: position.clone(),
        }
    }

    pub fn request(&self) -> &BlockingSnapshotRequest {
        &self.request
    }

    pub fn suspended_at(&self) -> &ReplicationPosition {
        &self.suspended_at
    }

    /// 스냅샷 종료 후 스트리밍을 재개할 위치 반환
    ///
    /// `current`는 재개 시점에 기록된 위치이며, 중단 위치보다 앞서면 에러입니다.
    pub fn resume(
        self,
        comparator: &PositionComparator,
        current: &ReplicationPosition,
    ) -> Result<ReplicationPosition> {
        match comparator.compare(&self.suspended_at, current)? {
            PositionOrder::Before | PositionOrder::Same => {
                info!("Resuming streaming from {}", self.suspended_at);
                Ok(self.suspended_at)
            }
            PositionOrder::After => Err(CdcError::Signal(format!(
                "재개 위치 {}가 중단 위치 {}보다 앞섭니다",
                current, self.suspended_at
            ))),
            PositionOrder::Incomparable => Err(CdcError::Signal(format!(
                "재개 위치 {}와 중단 위치 {}를 비교할 수 없습니다",
                current, self.suspended_at
            ))),
        }
    }
}

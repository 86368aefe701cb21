//! 변경 레코드에 첨부되는 source 정보 (Debezium의 SourceInfo와 유사)
//!
//! 체크포인트와 달리 항상 "지금 내보내는 행"의 실제 위치를 가리킵니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const CONNECTOR_NAME: &str = "mysql";
pub const CONNECTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// 레코드의 스냅샷 구분값
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotRecord {
    /// 스냅샷 중 생성된 레코드
    True,
    /// 스냅샷의 마지막 레코드
    Last,
    /// 스트리밍 중 생성된 레코드
    False,
}

impl SnapshotRecord {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotRecord::True => "true",
            SnapshotRecord::Last => "last",
            SnapshotRecord::False => "false",
        }
    }
}

/// 현재 처리 중인 이벤트의 source 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    /// 논리 서버 이름
    pub name: String,
    /// MySQL 서버 ID
    pub server_id: u64,
    /// 이벤트 발생 시각
    pub source_time: Option<DateTime<Utc>>,
    pub snapshot: SnapshotRecord,
    pub database: Option<String>,
    pub table: Option<String>,
    /// 현재 트랜잭션의 GTID
    pub gtid: Option<String>,
    /// Binlog 파일명
    pub binlog_filename: String,
    /// 현재 이벤트의 시작 위치
    pub binlog_position: u64,
    /// 이벤트 안에서의 행 번호 (0부터)
    pub row: u32,
    pub thread_id: Option<u64>,
    /// 원본 SQL 문장
    pub query: Option<String>,
}

impl SourceInfo {
    pub fn new(name: impl Into<String>, server_id: u64) -> Self {
        SourceInfo {
            name: name.into(),
            server_id,
            source_time: None,
            snapshot: SnapshotRecord::False,
            database: None,
            table: None,
            gtid: None,
            binlog_filename: String::new(),
            binlog_position: 0,
            row: 0,
            thread_id: None,
            query: None,
        }
    }

    pub fn ts_ms(&self) -> i64 {
        self.source_time.map(|t| t.timestamp_millis()).unwrap_or(0)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "version": CONNECTOR_VERSION,
            "connector": CONNECTOR_NAME,
            "name": self.name,
            "ts_ms": self.ts_ms(),
            "snapshot": self.snapshot.as_str(),
            "db": self.database.clone().unwrap_or_default(),
            "table": self.table,
            "server_id": self.server_id,
            "gtid": self.gtid,
            "file": self.binlog_filename,
            "pos": self.binlog_position,
            "row": self.row,
            "thread": self.thread_id,
            "query": self.query,
        })
    }
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SourceInfo {{ server_id: {}, file: {}, pos: {}, row: {}, gtid: {:?} }}",
            self.server_id, self.binlog_filename, self.binlog_position, self.row, self.gtid
        )
    }
}

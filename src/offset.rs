//! 재시작 위치 (ReplicationPosition) 및 체크포인트 맵 변환
//!
//! 체크포인트는 외부 저장소에 문자열 키/값 맵으로 저장됩니다.
//! 기본값(0, false, GTID 없음)인 필드는 맵에서 생략됩니다.

use crate::coordinates::LogCoordinates;
use crate::error::{CdcError, Result};
use crate::gtid::GtidSet;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const FILENAME_KEY: &str = "filename";
pub const POSITION_KEY: &str = "position";
pub const ROW_KEY: &str = "row";
pub const EVENTS_TO_SKIP_KEY: &str = "events_to_skip";
pub const GTID_SET_KEY: &str = "gtid_set";
pub const SNAPSHOT_KEY: &str = "snapshot";
pub const SERVER_ID_KEY: &str = "server_id";
pub const TIMESTAMP_KEY: &str = "ts_sec";

/// 외부 저장소에 기록되는 체크포인트 형태
pub type CheckpointMap = BTreeMap<String, String>;

/// 재시작 가능한 복제 위치
///
/// 트랜잭션이 열려 있는 동안 `coordinates`는 트랜잭션 시작 위치를 가리키고,
/// `events_to_skip`과 `row_in_event`로 이미 처리한 이벤트와 행을 건너뜁니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationPosition {
    pub coordinates: LogCoordinates,
    pub gtid_set: Option<GtidSet>,
    /// 재시작 시 현재 이벤트에서 건너뛸 행 수
    pub row_in_event: u32,
    /// 열린 트랜잭션 안에서 이미 완료된 이벤트 수
    pub events_to_skip: u32,
    pub in_snapshot: bool,
    /// 좌표를 기록한 서버 ID (알 수 없으면 None)
    pub server_id: Option<u64>,
    /// 마지막 이벤트 타임스탬프 (초 단위)
    pub ts_sec: Option<u64>,
}

impl ReplicationPosition {
    pub fn new(coordinates: LogCoordinates) -> Self {
        ReplicationPosition {
            coordinates,
            gtid_set: None,
            row_in_event: 0,
            events_to_skip: 0,
            in_snapshot: false,
            server_id: None,
            ts_sec: None,
        }
    }

    pub fn with_gtid_set(mut self, gtid_set: Option<GtidSet>) -> Self {
        self.gtid_set = gtid_set;
        self
    }

    pub fn with_snapshot(mut self, in_snapshot: bool) -> Self {
        self.in_snapshot = in_snapshot;
        self
    }

    /// 체크포인트 맵으로부터 위치 복원
    pub fn from_checkpoint(map: &CheckpointMap) -> Result<Self> {
        let filename = map
            .get(FILENAME_KEY)
            .ok_or(CdcError::MissingField(FILENAME_KEY))?;
        let position = parse_field::<u64>(map, POSITION_KEY)?
            .ok_or(CdcError::MissingField(POSITION_KEY))?;

        Ok(ReplicationPosition {
            coordinates: LogCoordinates::new(filename.clone(), position),
            gtid_set: GtidSet::parse_optional(map.get(GTID_SET_KEY).map(String::as_str))?,
            row_in_event: parse_field(map, ROW_KEY)?.unwrap_or(0),
            events_to_skip: parse_field(map, EVENTS_TO_SKIP_KEY)?.unwrap_or(0),
            in_snapshot: parse_bool(map, SNAPSHOT_KEY)?,
            server_id: parse_field::<u64>(map, SERVER_ID_KEY)?.filter(|id| *id != 0),
            ts_sec: parse_field(map, TIMESTAMP_KEY)?,
        })
    }

    /// 체크포인트 맵으로 변환 (기본값 필드는 생략)
    pub fn to_checkpoint(&self) -> CheckpointMap {
        let mut map = CheckpointMap::new();
        map.insert(FILENAME_KEY.to_string(), self.coordinates.filename.clone());
        map.insert(POSITION_KEY.to_string(), self.coordinates.position.to_string());
        if self.row_in_event != 0 {
            map.insert(ROW_KEY.to_string(), self.row_in_event.to_string());
        }
        if self.events_to_skip != 0 {
            map.insert(EVENTS_TO_SKIP_KEY.to_string(), self.events_to_skip.to_string());
        }
        if let Some(ref gtid_set) = self.gtid_set {
            map.insert(GTID_SET_KEY.to_string(), gtid_set.to_string());
        }
        if self.in_snapshot {
            map.insert(SNAPSHOT_KEY.to_string(), true.to_string());
        }
        if let Some(server_id) = self.server_id {
            map.insert(SERVER_ID_KEY.to_string(), server_id.to_string());
        }
        if let Some(ts_sec) = self.ts_sec {
            map.insert(TIMESTAMP_KEY.to_string(), ts_sec.to_string());
        }
        map
    }

    /// JSON 객체로부터 복원 (값은 문자열, 숫자, 불리언 모두 허용)
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| CdcError::InvalidFormat("체크포인트는 JSON 객체여야 합니다".to_string()))?;

        let mut map = CheckpointMap::new();
        for (key, value) in object {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => continue,
                other => {
                    return Err(CdcError::InvalidFormat(format!(
                        "체크포인트 필드 '{}'의 값이 올바르지 않습니다: {}",
                        key, other
                    )))
                }
            };
            map.insert(key.clone(), text);
        }

        ReplicationPosition::from_checkpoint(&map)
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.to_checkpoint()
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect(),
        )
    }
}

impl fmt::Display for ReplicationPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (events: {}, row: {}",
            self.coordinates, self.events_to_skip, self.row_in_event
        )?;
        if let Some(ref gtid_set) = self.gtid_set {
            write!(f, ", gtids: {}", gtid_set)?;
        }
        if self.in_snapshot {
            write!(f, ", snapshot")?;
        }
        write!(f, ")")
    }
}

fn parse_field<T: FromStr>(map: &CheckpointMap, key: &'static str) -> Result<Option<T>> {
    map.get(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| {
                CdcError::InvalidFormat(format!("체크포인트 필드 '{}'가 숫자가 아닙니다: '{}'", key, raw))
            })
        })
        .transpose()
}

fn parse_bool(map: &CheckpointMap, key: &'static str) -> Result<bool> {
    match map.get(key).map(|raw| raw.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(raw) if raw == "true" => Ok(true),
        Some(raw) if raw == "false" => Ok(false),
        Some(raw) => Err(CdcError::InvalidFormat(format!(
            "체크포인트 필드 '{}'가 불리언이 아닙니다: '{}'",
            key, raw
        ))),
    }
}

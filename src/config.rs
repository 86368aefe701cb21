//! 위치 추적기 설정
//!
//! 환경 변수:
//! - CDC_SERVER_NAME: 논리 서버 이름 (기본값 "server")
//! - CDC_SERVER_ID: MySQL 서버 ID (기본값 1)
//! - CDC_GTID_INCLUDES / CDC_GTID_EXCLUDES: 서버 식별자 정규식 목록 (쉼표 구분)
//! - CDC_CHECKPOINT_INTERVAL_MS: 체크포인트 기록 주기 (기본값 1000)

use crate::comparator::PositionComparator;
use crate::error::{CdcError, Result};
use crate::gtid::GtidFilter;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub server_name: String,
    pub server_id: u64,
    pub gtid_source_includes: Vec<String>,
    pub gtid_source_excludes: Vec<String>,
    pub checkpoint_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            server_name: "server".to_string(),
            server_id: 1,
            gtid_source_includes: Vec::new(),
            gtid_source_excludes: Vec::new(),
            checkpoint_interval: Duration::from_millis(1000),
        }
    }
}

impl TrackerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = TrackerConfig::default();

        let server_id = match lookup("CDC_SERVER_ID") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| CdcError::Config(format!("CDC_SERVER_ID가 숫자가 아닙니다: '{}'", raw)))?,
            None => defaults.server_id,
        };

        let checkpoint_interval = match lookup("CDC_CHECKPOINT_INTERVAL_MS") {
            Some(raw) => Duration::from_millis(raw.trim().parse().map_err(|_| {
                CdcError::Config(format!("CDC_CHECKPOINT_INTERVAL_MS가 숫자가 아닙니다: '{}'", raw))
            })?),
            None => defaults.checkpoint_interval,
        };

        let config = TrackerConfig {
            server_name: lookup("CDC_SERVER_NAME").unwrap_or(defaults.server_name),
            server_id,
            gtid_source_includes: split_list(lookup("CDC_GTID_INCLUDES")),
            gtid_source_excludes: split_list(lookup("CDC_GTID_EXCLUDES")),
            checkpoint_interval,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.gtid_source_includes.is_empty() && !self.gtid_source_excludes.is_empty() {
            return Err(CdcError::Config(
                "GTID include와 exclude 목록은 동시에 설정할 수 없습니다".to_string(),
            ));
        }
        if self.checkpoint_interval.is_zero() {
            return Err(CdcError::Config("체크포인트 주기는 0보다 커야 합니다".to_string()));
        }
        Ok(())
    }

    /// 설정된 include/exclude 목록으로 GTID 필터 생성
    pub fn gtid_filter(&self) -> Result<Option<GtidFilter>> {
        self.validate()?;
        fn as_refs(list: &[String]) -> Vec<&str> {
            list.iter().map(String::as_str).collect()
        }

        if !self.gtid_source_includes.is_empty() {
            GtidFilter::include(&as_refs(&self.gtid_source_includes)).map(Some)
        } else if !self.gtid_source_excludes.is_empty() {
            GtidFilter::exclude(&as_refs(&self.gtid_source_excludes)).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn comparator(&self) -> Result<PositionComparator> {
        Ok(PositionComparator::with_gtid_filter(self.gtid_filter()?))
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

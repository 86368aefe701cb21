//! Binlog 좌표 (파일명 + 바이트 위치)
//!
//! 예: "mysql-bin.000003" 파일의 4097 바이트 위치
//! 파일명은 같은 접두사와 숫자 확장자를 가질 때만 비교할 수 있습니다.

use crate::error::{CdcError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// 접두사와 숫자 확장자로 분해된 binlog 파일명
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinlogFilename<'a> {
    pub prefix: &'a str,
    pub extension: &'a str,
}

impl<'a> BinlogFilename<'a> {
    /// 마지막 '.' 뒤가 숫자로만 이루어진 경우에만 분해 성공
    pub fn parse(filename: &'a str) -> Option<Self> {
        let (prefix, extension) = filename.rsplit_once('.')?;
        if prefix.is_empty()
            || extension.is_empty()
            || !extension.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        Some(BinlogFilename { prefix, extension })
    }

    /// 숫자 확장자의 순서 비교 (자릿수가 달라도 수치로 비교)
    fn compare_extension(&self, other: &BinlogFilename<'_>) -> Ordering {
        let lhs = self.extension.trim_start_matches('0');
        let rhs = other.extension.trim_start_matches('0');
        lhs.len().cmp(&rhs.len()).then_with(|| lhs.cmp(rhs))
    }

    pub fn sequence(&self) -> Option<u64> {
        self.extension.parse().ok()
    }
}

/// Binlog 파일 위치 정보
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogCoordinates {
    /// 바이너리 로그 파일명 (e.g., "mysql-bin.000001")
    pub filename: String,
    /// 바이트 위치
    pub position: u64,
}

impl LogCoordinates {
    pub fn new(filename: impl Into<String>, position: u64) -> Self {
        LogCoordinates {
            filename: filename.into(),
            position,
        }
    }

    /// 파일명에서 시퀀스 번호 추출
    pub fn file_sequence(&self) -> Option<u64> {
        BinlogFilename::parse(&self.filename).and_then(|f| f.sequence())
    }

    /// 파일명 숫자 확장자, 그 다음 바이트 위치 순으로 비교
    ///
    /// 접두사가 다르거나 숫자 확장자가 없으면 `IncompatibleFormat`.
    pub fn compare(&self, other: &LogCoordinates) -> Result<Ordering> {
        let incompatible = || CdcError::IncompatibleFormat {
            left: self.filename.clone(),
            right: other.filename.clone(),
        };

        let lhs = BinlogFilename::parse(&self.filename).ok_or_else(incompatible)?;
        let rhs = BinlogFilename::parse(&other.filename).ok_or_else(incompatible)?;
        if lhs.prefix != rhs.prefix {
            return Err(incompatible());
        }

        Ok(lhs
            .compare_extension(&rhs)
            .then(self.position.cmp(&other.position)))
    }
}

impl fmt::Display for LogCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.filename, self.position)
    }
}

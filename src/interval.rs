//! 트랜잭션 번호 구간 집합
//!
//! 형식: "1-5:7-9:12" (콜론으로 구분된 `low[-high]` 구간들)
//! 파싱 시 정렬 및 병합되어 항상 정규화된 형태를 유지합니다.

use crate::error::{CdcError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 닫힌 구간 [start, end]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: u64,
    pub end: u64,
}

impl Interval {
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if start > end {
            return Err(CdcError::InvalidFormat(format!(
                "구간의 시작이 끝보다 큽니다: {}-{}",
                start, end
            )));
        }
        Ok(Interval { start, end })
    }

    pub fn contains(&self, value: u64) -> bool {
        value >= self.start && value <= self.end
    }

    /// `other`가 이 구간 안에 완전히 포함되는지 여부
    pub fn covers(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// 겹치거나 맞닿은 구간이면 병합
    pub fn merge(&self, other: &Interval) -> Option<Interval> {
        if self.end.saturating_add(1) >= other.start && other.end.saturating_add(1) >= self.start {
            Some(Interval {
                start: self.start.min(other.start),
                end: self.end.max(other.end),
            })
        } else {
            None
        }
    }

    fn parse(segment: &str) -> Result<Self> {
        // u64 파싱은 앞의 '+'를 허용하므로 숫자만으로 이루어졌는지 먼저 확인
        let number = |s: &str| {
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(CdcError::InvalidFormat(format!("숫자가 아닌 구간: '{}'", segment)));
            }
            s.parse::<u64>()
                .map_err(|_| CdcError::InvalidFormat(format!("숫자가 아닌 구간: '{}'", segment)))
        };

        match segment.split_once('-') {
            Some((low, high)) => Interval::new(number(low)?, number(high)?),
            None => {
                let value = number(segment)?;
                Ok(Interval { start: value, end: value })
            }
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// 서로 겹치지 않는 구간들의 정렬된 집합 (불변)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    /// "1-5:7-9" 형식 파싱
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(CdcError::InvalidFormat("빈 구간 목록".to_string()));
        }

        let intervals = s
            .split(':')
            .map(Interval::parse)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::from_intervals(intervals))
    }

    /// 임의 순서의 구간들로부터 정규화된 집합 생성
    pub fn from_intervals(mut intervals: Vec<Interval>) -> Self {
        intervals.sort();

        let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
        for interval in intervals {
            match merged.last_mut() {
                Some(last) => match last.merge(&interval) {
                    Some(m) => *last = m,
                    None => merged.push(interval),
                },
                None => merged.push(interval),
            }
        }

        IntervalSet { intervals: merged }
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn contains(&self, value: u64) -> bool {
        self.intervals.iter().any(|i| i.contains(value))
    }

    /// `other`의 모든 구간이 이 집합에 포함되는지 여부
    ///
    /// 동등성이 아니라 포함 관계입니다. 정규화된 집합에서는 각 구간이
    /// 단 하나의 구간 안에 들어가야 합니다.
    pub fn contains_all(&self, other: &IntervalSet) -> bool {
        other.intervals.iter().all(|needle| {
            // needle.start 이하에서 시작하는 마지막 구간만 후보
            let idx = self.intervals.partition_point(|i| i.start <= needle.start);
            idx > 0 && self.intervals[idx - 1].covers(needle)
        })
    }

    pub fn to_canonical_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.intervals.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join(":"))
    }
}

impl FromStr for IntervalSet {
    type Err = CdcError;

    fn from_str(s: &str) -> Result<Self> {
        IntervalSet::parse(s)
    }
}

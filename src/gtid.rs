//! GTID (Global Transaction ID) 집합
//!
//! GTID 형식: UUID:interval[:interval...]
//! 여러 서버의 GTID 집합: "uuid1:1-100:200,uuid2:1-50"
//!
//! 집합 간에는 포함 관계에 따른 부분 순서만 존재합니다. 두 집합이 서로를
//! 포함하지 않으면 비교할 수 없습니다.

use crate::error::{CdcError, Result};
use crate::interval::IntervalSet;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// 서버 식별자별 구간 집합
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GtidSet {
    sets: BTreeMap<String, IntervalSet>,
}

impl GtidSet {
    pub fn new() -> Self {
        GtidSet {
            sets: BTreeMap::new(),
        }
    }

    /// GTID 문자열 파싱
    ///
    /// 모든 공백 및 개행 문자는 제거됩니다. 긴 GTID 문자열은 서버에서
    /// 줄바꿈이 섞여 오기 때문에 구분자로 취급하지 않습니다.
    pub fn parse(gtid_str: &str) -> Result<Self> {
        let cleaned: String = gtid_str.chars().filter(|c| !c.is_whitespace()).collect();

        let mut gtid_set = GtidSet::new();
        if cleaned.is_empty() {
            return Ok(gtid_set);
        }

        for segment in cleaned.split(',') {
            let (server_id, ranges) = segment.split_once(':').ok_or_else(|| {
                CdcError::InvalidFormat(format!("GTID 항목에 ':'가 없습니다: '{}'", segment))
            })?;
            if server_id.is_empty() {
                return Err(CdcError::InvalidFormat(format!(
                    "GTID 항목에 서버 식별자가 없습니다: '{}'",
                    segment
                )));
            }

            let intervals = IntervalSet::parse(ranges)?;
            let merged = match gtid_set.sets.remove(server_id) {
                Some(existing) => IntervalSet::from_intervals(
                    existing
                        .intervals()
                        .iter()
                        .chain(intervals.intervals())
                        .copied()
                        .collect(),
                ),
                None => intervals,
            };
            gtid_set.sets.insert(server_id.to_string(), merged);
        }

        Ok(gtid_set)
    }

    /// 공백 문자열이나 `None`은 "GTID 미사용"으로 정규화
    pub fn parse_optional(gtid_str: Option<&str>) -> Result<Option<Self>> {
        match gtid_str {
            Some(s) if !s.trim().is_empty() => GtidSet::parse(s).map(Some),
            _ => Ok(None),
        }
    }

    /// 조건을 만족하는 서버 식별자만 남긴 새 집합
    pub fn filtered<F>(&self, predicate: F) -> GtidSet
    where
        F: Fn(&str) -> bool,
    {
        GtidSet {
            sets: self
                .sets
                .iter()
                .filter(|(server_id, _)| predicate(server_id.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// 이 집합의 모든 서버 항목이 `other`에 포함되는지 여부
    pub fn is_contained_in(&self, other: &GtidSet) -> bool {
        self.sets.iter().all(|(server_id, intervals)| {
            other
                .sets
                .get(server_id)
                .is_some_and(|theirs| theirs.contains_all(intervals))
        })
    }

    pub fn server_ids(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    pub fn intervals_for(&self, server_id: &str) -> Option<&IntervalSet> {
        self.sets.get(server_id)
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl PartialOrd for GtidSet {
    /// 포함 관계 기반 부분 순서. 서로 포함하지 않으면 `None`.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.is_contained_in(other), other.is_contained_in(self)) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => None,
        }
    }
}

impl fmt::Display for GtidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .sets
            .iter()
            .map(|(server_id, intervals)| format!("{}:{}", server_id, intervals))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for GtidSet {
    type Err = CdcError;

    fn from_str(s: &str) -> Result<Self> {
        GtidSet::parse(s)
    }
}

/// 비교 전에 GTID 집합에서 남길 서버 식별자를 결정하는 필터
///
/// 폐기된 복제본처럼 순서 판단에서 제외해야 하는 서버를 걸러낼 때 사용합니다.
#[derive(Clone)]
pub struct GtidFilter {
    predicate: Arc<dyn Fn(&str) -> bool + Send + Sync>,
}

impl GtidFilter {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        GtidFilter {
            predicate: Arc::new(predicate),
        }
    }

    /// 패턴 중 하나와 전체 일치하는 서버만 남김
    pub fn include(patterns: &[&str]) -> Result<Self> {
        let regexes = compile_anchored(patterns)?;
        Ok(GtidFilter::new(move |server_id| {
            regexes.iter().any(|r| r.is_match(server_id))
        }))
    }

    /// 패턴 중 하나와 전체 일치하는 서버를 제외
    pub fn exclude(patterns: &[&str]) -> Result<Self> {
        let regexes = compile_anchored(patterns)?;
        Ok(GtidFilter::new(move |server_id| {
            !regexes.iter().any(|r| r.is_match(server_id))
        }))
    }

    pub fn retains(&self, server_id: &str) -> bool {
        (self.predicate)(server_id)
    }

    pub fn apply(&self, gtid_set: &GtidSet) -> GtidSet {
        gtid_set.filtered(|server_id| self.retains(server_id))
    }
}

impl fmt::Debug for GtidFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GtidFilter")
    }
}

fn compile_anchored(patterns: &[&str]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("^(?:{})$", p.trim())).map_err(CdcError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID_A: &str = "123e4567-e89b-12d3-a456-426655440000";
    const ID_B: &str = "123e4567-e89b-12d3-a456-426655440001";

    fn gtids(s: &str) -> GtidSet {
        GtidSet::parse(s).unwrap()
    }

    #[test]
    fn test_gtid_parse() {
        let set = gtids(&format!("{}:1-100:200:300-400", ID_A));
        assert_eq!(set.intervals_for(ID_A).unwrap().to_string(), "1-100:200:300-400");
        assert_eq!(set.server_ids().count(), 1);
    }

    #[test]
    fn test_order_of_entries_is_irrelevant() {
        let ab = gtids(&format!("{}:1-5,{}:1-20", ID_A, ID_B));
        let ba = gtids(&format!("{}:1-20,{}:1-5", ID_B, ID_A));
        assert_eq!(ab, ba);
        assert_eq!(ab.to_string(), ba.to_string());
        assert_eq!(gtids(&ba.to_string()), ab);
    }

    #[test]
    fn test_newlines_are_stripped() {
        let multi = "036d85a9-64e5-11e6-9b48-42010af0000c:1-2,\n\
                     7145bf69-d1ca-11e5-a588-0242ac110004:1-3149,\n\
                     7c1de3f2-3fd2-11e6-9cdc-42010af000bc:1-39";
        let single = "036d85a9-64e5-11e6-9b48-42010af0000c:1-2,\
                      7145bf69-d1ca-11e5-a588-0242ac110004:1-3149,\
                      7c1de3f2-3fd2-11e6-9cdc-42010af000bc:1-39";
        assert_eq!(gtids(multi), gtids(single));
        assert_eq!(gtids(multi).to_string(), single);
    }

    #[test]
    fn test_blank_is_no_gtid_set() {
        assert!(GtidSet::parse_optional(None).unwrap().is_none());
        assert!(GtidSet::parse_optional(Some("")).unwrap().is_none());
        assert!(GtidSet::parse_optional(Some(" \n ")).unwrap().is_none());
        assert!(GtidSet::parse_optional(Some("a:1")).unwrap().is_some());
    }

    #[test]
    fn test_malformed_is_rejected() {
        assert!(matches!(GtidSet::parse("gtid-set"), Err(CdcError::InvalidFormat(_))));
        assert!(matches!(GtidSet::parse(":1-5"), Err(CdcError::InvalidFormat(_))));
        assert!(matches!(GtidSet::parse("a:"), Err(CdcError::InvalidFormat(_))));
        assert!(matches!(GtidSet::parse("a:1-5,"), Err(CdcError::InvalidFormat(_))));
        assert!(matches!(GtidSet::parse("a:+3"), Err(CdcError::InvalidFormat(_))));
    }

    #[test]
    fn test_duplicate_server_entries_merge() {
        assert_eq!(gtids("a:1-3,a:4-6"), gtids("a:1-6"));
    }

    #[test]
    fn test_containment_partial_order() {
        let small = gtids(&format!("{}:1-5", ID_A));
        let extra_server = gtids(&format!("{}:1-5,{}:1-20", ID_A, ID_B));
        let other_server = gtids(&format!("{}:1-20", ID_B));

        assert!(small.is_contained_in(&small));
        assert!(small.is_contained_in(&extra_server));
        assert!(!extra_server.is_contained_in(&small));
        assert!(small < extra_server);

        // 서로 포함하지 않음
        assert!(!small.is_contained_in(&other_server));
        assert!(!other_server.is_contained_in(&small));
        assert_eq!(small.partial_cmp(&other_server), None);
    }

    #[test]
    fn test_containment_is_transitive() {
        let a = gtids("s:2-5:8-9");
        let b = gtids("s:1-9");
        let c = gtids("s:1-10,t:1");
        assert!(a.is_contained_in(&b));
        assert!(b.is_contained_in(&c));
        assert!(a.is_contained_in(&c));
    }

    #[test]
    fn test_filter_excludes_servers() {
        let set = gtids(&format!("{}:1-5,{}:1-20", ID_A, ID_B));
        let filter = GtidFilter::exclude(&[ID_B]).unwrap();
        assert_eq!(filter.apply(&set), gtids(&format!("{}:1-5", ID_A)));

        let include = GtidFilter::include(&["123e4567-.*-426655440001"]).unwrap();
        assert_eq!(include.apply(&set), gtids(&format!("{}:1-20", ID_B)));
    }
}

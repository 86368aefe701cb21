//! 두 복제 위치의 순서 비교
//!
//! 비교 규칙:
//! 1. GTID 필터가 있으면 양쪽 GTID 집합에 먼저 적용
//! 2. 둘 다 GTID가 없으면 (좌표, 완료 이벤트 수, 행 번호) 순으로 비교
//! 3. 한쪽만 GTID가 있으면 GTID가 없는 쪽이 항상 앞
//! 4. 둘 다 GTID가 있으면 포함 관계만으로 판단
//! 5. 동일한 위치라면 스냅샷 중인 쪽이 앞
//!
//! GTID가 없는 위치를 항상 앞에 두는 것은 GTID 활성화 전환 중의 재개 동작을
//! 위한 규칙이므로 그대로 유지합니다.

use crate::error::Result;
use crate::gtid::{GtidFilter, GtidSet};
use crate::offset::{CheckpointMap, ReplicationPosition};
use std::cmp::Ordering;
use std::fmt;
use tracing::warn;

/// 비교 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionOrder {
    Before,
    Same,
    After,
    /// GTID 집합이 서로를 포함하지 않음
    Incomparable,
}

impl PositionOrder {
    fn from_ordering(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Less => PositionOrder::Before,
            Ordering::Equal => PositionOrder::Same,
            Ordering::Greater => PositionOrder::After,
        }
    }

    pub fn is_at_or_before(&self) -> bool {
        matches!(self, PositionOrder::Before | PositionOrder::Same)
    }
}

impl fmt::Display for PositionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PositionOrder::Before => "before",
            PositionOrder::Same => "same",
            PositionOrder::After => "after",
            PositionOrder::Incomparable => "incomparable",
        };
        f.write_str(s)
    }
}

/// 위치 비교기 (상태 없음, 동시 사용 가능)
#[derive(Debug, Clone, Default)]
pub struct PositionComparator {
    gtid_filter: Option<GtidFilter>,
}

impl PositionComparator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gtid_filter(gtid_filter: Option<GtidFilter>) -> Self {
        PositionComparator { gtid_filter }
    }

    /// `a`가 `b`에 비해 어디에 있는지 판단
    ///
    /// 파일명 형식이 호환되지 않으면 `IncompatibleFormat` 에러를 그대로 전파합니다.
    pub fn compare(&self, a: &ReplicationPosition, b: &ReplicationPosition) -> Result<PositionOrder> {
        let a_gtids = self.filtered(a.gtid_set.as_ref());
        let b_gtids = self.filtered(b.gtid_set.as_ref());

        let order = match (a_gtids, b_gtids) {
            (Some(a_gtids), Some(b_gtids)) => match a_gtids.partial_cmp(&b_gtids) {
                Some(Ordering::Equal) => snapshot_tie_break(a, b),
                Some(ordering) => PositionOrder::from_ordering(ordering),
                None => {
                    warn!(
                        "GTID sets are not comparable: '{}' vs '{}'",
                        a_gtids, b_gtids
                    );
                    PositionOrder::Incomparable
                }
            },
            (None, Some(_)) => PositionOrder::Before,
            (Some(_), None) => PositionOrder::After,
            (None, None) => compare_coordinates(a, b)?,
        };
        Ok(order)
    }

    pub fn is_at_or_before(&self, a: &ReplicationPosition, b: &ReplicationPosition) -> Result<bool> {
        Ok(self.compare(a, b)?.is_at_or_before())
    }

    pub fn is_before(&self, a: &ReplicationPosition, b: &ReplicationPosition) -> Result<bool> {
        Ok(self.compare(a, b)? == PositionOrder::Before)
    }

    /// 비교할 수 없는 경우에는 `false` (역관계를 단정하지 않음)
    pub fn is_after(&self, a: &ReplicationPosition, b: &ReplicationPosition) -> Result<bool> {
        Ok(self.compare(a, b)? == PositionOrder::After)
    }

    /// 저장된 체크포인트 맵끼리 비교
    pub fn compare_checkpoints(&self, a: &CheckpointMap, b: &CheckpointMap) -> Result<PositionOrder> {
        let a = ReplicationPosition::from_checkpoint(a)?;
        let b = ReplicationPosition::from_checkpoint(b)?;
        self.compare(&a, &b)
    }

    /// 기록된 위치들 중 `target` 이전(또는 같은) 마지막 위치
    ///
    /// 히스토리 복구 시 어느 시점까지 재적용할지 결정하는 데 사용합니다.
    pub fn latest_at_or_before<'a, I>(
        &self,
        records: I,
        target: &ReplicationPosition,
    ) -> Result<Option<&'a ReplicationPosition>>
    where
        I: IntoIterator<Item = &'a ReplicationPosition>,
    {
        let mut latest = None;
        for record in records {
            if self.is_at_or_before(record, target)? {
                latest = Some(record);
            }
        }
        Ok(latest)
    }

    fn filtered(&self, gtid_set: Option<&GtidSet>) -> Option<GtidSet> {
        gtid_set.map(|g| match self.gtid_filter {
            Some(ref filter) => filter.apply(g),
            None => g.clone(),
        })
    }
}

fn compare_coordinates(a: &ReplicationPosition, b: &ReplicationPosition) -> Result<PositionOrder> {
    // 서로 다른 서버의 좌표는 관계가 없으므로 타임스탬프로 비교
    if let (Some(a_server), Some(b_server)) = (a.server_id, b.server_id) {
        if a_server != b_server {
            let ordering = a.ts_sec.unwrap_or(0).cmp(&b.ts_sec.unwrap_or(0));
            return Ok(match ordering {
                Ordering::Equal => snapshot_tie_break(a, b),
                other => PositionOrder::from_ordering(other),
            });
        }
    }

    let ordering = a
        .coordinates
        .compare(&b.coordinates)?
        .then(a.events_to_skip.cmp(&b.events_to_skip))
        .then(a.row_in_event.cmp(&b.row_in_event));

    Ok(match ordering {
        Ordering::Equal => snapshot_tie_break(a, b),
        other => PositionOrder::from_ordering(other),
    })
}

/// 스냅샷 중인 위치는 "여기서부터 다시 스트리밍"을, 그렇지 않은 위치는
/// "여기까지 스트리밍 완료"를 의미하므로 스냅샷 쪽이 앞
fn snapshot_tie_break(a: &ReplicationPosition, b: &ReplicationPosition) -> PositionOrder {
    match (a.in_snapshot, b.in_snapshot) {
        (true, false) => PositionOrder::Before,
        (false, true) => PositionOrder::After,
        _ => PositionOrder::Same,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinates::LogCoordinates;
    use crate::error::CdcError;
    use uuid::Uuid;

    fn id_a() -> Uuid {
        Uuid::parse_str("123e4567-e89b-12d3-a456-426655440000").unwrap()
    }

    fn id_b() -> Uuid {
        Uuid::parse_str("123e4567-e89b-12d3-a456-426655440001").unwrap()
    }

    fn with_gtids(gtids: &str, snapshot: bool) -> ReplicationPosition {
        ReplicationPosition::new(LogCoordinates::new("mysql-bin.000001", 4))
            .with_gtid_set(Some(GtidSet::parse(gtids).unwrap()))
            .with_snapshot(snapshot)
    }

    fn without_gtids(filename: &str, position: u64, event: u32, row: u32) -> ReplicationPosition {
        let mut pos = ReplicationPosition::new(LogCoordinates::new(filename, position));
        pos.events_to_skip = event;
        pos.row_in_event = row;
        pos
    }

    fn order(a: &ReplicationPosition, b: &ReplicationPosition) -> PositionOrder {
        PositionComparator::new().compare(a, b).unwrap()
    }

    #[test]
    fn test_same_gtid_sets_are_same() {
        let single = format!("{}:1-5", id_a());
        let multiple = format!("{}:1-5,{}:1-20", id_a(), id_b());
        let reordered = format!("{}:1-20,{}:1-5", id_b(), id_a());

        for snapshot in [false, true] {
            assert_eq!(order(&with_gtids(&single, snapshot), &with_gtids(&single, snapshot)), PositionOrder::Same);
            assert_eq!(order(&with_gtids(&multiple, snapshot), &with_gtids(&multiple, snapshot)), PositionOrder::Same);
            assert_eq!(order(&with_gtids(&multiple, snapshot), &with_gtids(&reordered, snapshot)), PositionOrder::Same);
        }
    }

    #[test]
    fn test_snapshot_orders_before_same_gtids() {
        let single = format!("{}:1-5", id_a());
        let reordered_a = format!("{}:1-5,{}:1-20", id_a(), id_b());
        let reordered_b = format!("{}:1-20,{}:1-5", id_b(), id_a());

        assert_eq!(order(&with_gtids(&single, true), &with_gtids(&single, false)), PositionOrder::Before);
        assert_eq!(order(&with_gtids(&single, false), &with_gtids(&single, true)), PositionOrder::After);
        assert_eq!(order(&with_gtids(&reordered_a, false), &with_gtids(&reordered_b, true)), PositionOrder::After);
    }

    #[test]
    fn test_gtid_containment_ordering() {
        let a = |s: String| with_gtids(&s, false);
        assert_eq!(
            order(&a(format!("{}:1-5", id_a())), &a(format!("{}:1-5,{}:1-20", id_a(), id_b()))),
            PositionOrder::Before
        );
        assert_eq!(order(&a(format!("{}:1-5", id_a())), &a(format!("{}:1-6", id_a()))), PositionOrder::Before);
        assert_eq!(order(&a(format!("{}:1-5:7-9", id_a())), &a(format!("{}:1-10", id_a()))), PositionOrder::Before);
        assert_eq!(order(&a(format!("{}:2-5:8-9", id_a())), &a(format!("{}:1-10", id_a()))), PositionOrder::Before);
        assert_eq!(order(&a(format!("{}:1-10", id_a())), &a(format!("{}:2-5:8-9", id_a()))), PositionOrder::After);
    }

    #[test]
    fn test_gtid_ignores_coordinates() {
        let gtids = format!("{}:1-5", id_a());
        let mut early = with_gtids(&gtids, false);
        early.coordinates = LogCoordinates::new("mysql-bin.000009", 900);
        early.events_to_skip = 3;
        let late = with_gtids(&format!("{}:1-6", id_a()), false);
        assert_eq!(order(&early, &late), PositionOrder::Before);

        // 서로 다른 파일명 형식이어도 GTID가 있으면 에러가 아님
        let mut odd = with_gtids(&gtids, false);
        odd.coordinates = LogCoordinates::new("other-log", 1);
        assert_eq!(order(&odd, &with_gtids(&gtids, false)), PositionOrder::Same);
    }

    #[test]
    fn test_position_without_gtid_is_before_position_with_gtid() {
        let with = with_gtids("IdA:1-5", false);
        let without = without_gtids("filename.01", u64::from(u32::MAX), 0, 0);
        assert_eq!(order(&without, &with), PositionOrder::Before);

        let comparator = PositionComparator::new();
        assert!(comparator.is_at_or_before(&without, &with).unwrap());
        assert!(!comparator.is_after(&without, &with).unwrap());
        assert!(comparator.is_after(&with, &without_gtids("filename.01", 0, 0, 0)).unwrap());
    }

    #[test]
    fn test_compare_without_gtids() {
        let p = without_gtids;
        let same = [
            ("fn.01", 1, 0, 0),
            ("fn.01", 1, 0, 1),
            ("fn.03", 1, 0, 1),
            ("fn.01", 1, 1, 0),
            ("fn.01", 1, 1, 1),
            ("fn.03", 1, 1, 1),
        ];
        for (f, pos, ev, row) in same {
            assert_eq!(order(&p(f, pos, ev, row), &p(f, pos, ev, row)), PositionOrder::Same);
        }

        let before = [
            (("fn.01", 1, 0, 0), ("fn.01", 1, 0, 1)),
            (("fn.01", 1, 0, 0), ("fn.01", 2, 0, 0)),
            (("fn.01", 1, 0, 1), ("fn.01", 1, 0, 2)),
            (("fn.01", 1, 0, 1), ("fn.01", 2, 0, 0)),
            (("fn.01", 1, 1, 0), ("fn.01", 1, 1, 1)),
            (("fn.01", 1, 1, 0), ("fn.01", 1, 2, 0)),
            (("fn.01", 1, 1, 1), ("fn.01", 1, 2, 0)),
            (("fn.01", 1, 1, 1), ("fn.01", 2, 0, 0)),
        ];
        for ((fa, pa, ea, ra), (fb, pb, eb, rb)) in before {
            assert_eq!(order(&p(fa, pa, ea, ra), &p(fb, pb, eb, rb)), PositionOrder::Before);
            assert_eq!(order(&p(fb, pb, eb, rb), &p(fa, pa, ea, ra)), PositionOrder::After);
        }

        assert_eq!(order(&p("fn.01", 1, 0, 1), &p("fn.01", 0, 0, 99)), PositionOrder::After);
        assert_eq!(order(&p("fn.01", 1, 1, 1), &p("fn.01", 1, 1, 0)), PositionOrder::After);
    }

    #[test]
    fn test_snapshot_tie_break_without_gtids() {
        let plain = without_gtids("fn.01", 1, 0, 0);
        let snapshot = without_gtids("fn.01", 1, 0, 0).with_snapshot(true);
        assert_eq!(order(&snapshot, &plain), PositionOrder::Before);
        assert_eq!(order(&plain, &snapshot), PositionOrder::After);
        assert_eq!(order(&snapshot, &snapshot), PositionOrder::Same);
    }

    #[test]
    fn test_compare_different_filenames() {
        let history = without_gtids("mysql-bin.000001", 1, 0, 0);
        assert_eq!(order(&history, &without_gtids("mysql-bin.000002", 1, 0, 0)), PositionOrder::Before);

        let history = without_gtids("mysql-bin.200001", 1, 0, 0);
        assert_eq!(order(&history, &without_gtids("mysql-bin.100001", 1, 0, 0)), PositionOrder::After);
        assert_eq!(order(&history, &without_gtids("mysql-bin.1000111", 1, 0, 0)), PositionOrder::Before);
    }

    #[test]
    fn test_incompatible_filenames_are_errors() {
        let history = without_gtids("mysql-bin.000001", 1, 0, 0);
        let comparator = PositionComparator::new();
        for other in ["mysql-binlog-filename.000001", "mysql-bin", "mysql-bin.not-numeric"] {
            assert!(matches!(
                comparator.is_at_or_before(&history, &without_gtids(other, 1, 0, 0)),
                Err(CdcError::IncompatibleFormat { .. })
            ));
        }
    }

    #[test]
    fn test_different_servers_fall_back_to_timestamps() {
        let mut a = without_gtids("mysql-bin.000009", 1, 0, 0);
        a.server_id = Some(1);
        a.ts_sec = Some(100);
        let mut b = without_gtids("other-bin.000001", 1, 0, 0);
        b.server_id = Some(2);
        b.ts_sec = Some(200);
        assert_eq!(order(&a, &b), PositionOrder::Before);
        assert_eq!(order(&b, &a), PositionOrder::After);
    }

    #[test]
    fn test_positions_with_different_fields() {
        let history = ReplicationPosition::from_json(&serde_json::json!({
            "filename": "mysql-bin.000008",
            "position": 380941551,
            "gtid_set": "01261278-6ade-11e6-b36a-42010af00790:1-378422946,\
                         4d1a4918-44ba-11e6-bf12-42010af0040b:1-11002284,\
                         716ec46f-d522-11e5-bb56-0242ac110004:1-34673215,\
                         96c2072e-e428-11e6-9590-42010a28002d:1-3,\
                         c627b2bc-9647-11e6-a886-42010af0044a:1-9541144",
            "snapshot": true,
        }))
        .unwrap();
        let current = ReplicationPosition::from_json(&serde_json::json!({
            "filename": "mysql-bin.000016",
            "position": 645115324,
            "gtid_set": "01261278-6ade-11e6-b36a-42010af00790:1-400944168,\
                         30efb117-e42a-11e6-ba9e-42010a28002e:1-9,\
                         4d1a4918-44ba-11e6-bf12-42010af0040b:1-11604379,\
                         621dc2f6-803b-11e6-acc1-42010af000a4:1-7963838,\
                         716ec46f-d522-11e5-bb56-0242ac110004:1-35850702,\
                         c627b2bc-9647-11e6-a886-42010af0044a:1-10426868,\
                         d079cbb3-750f-11e6-954e-42010af00c28:1-11544291:11544293-11885648",
            "events_to_skip": 2,
            "row": 1,
        }))
        .unwrap();

        let unfiltered = PositionComparator::new();
        assert!(!unfiltered.is_at_or_before(&current, &history).unwrap());
        // 폐기된 서버의 GTID 때문에 필터 없이는 비교 불가
        assert_eq!(unfiltered.compare(&history, &current).unwrap(), PositionOrder::Incomparable);
        assert!(!unfiltered.is_at_or_before(&history, &current).unwrap());
        assert!(!unfiltered.is_after(&history, &current).unwrap());

        let filter = GtidFilter::exclude(&["96c2072e-e428-11e6-9590-42010a28002d"]).unwrap();
        let filtered = PositionComparator::with_gtid_filter(Some(filter));
        assert!(filtered.is_at_or_before(&history, &current).unwrap());
        assert!(filtered.is_after(&current, &history).unwrap());
    }

    #[test]
    fn test_latest_at_or_before() {
        let records = vec![
            without_gtids("mysql-bin.000001", 100, 0, 0),
            without_gtids("mysql-bin.000001", 500, 0, 0),
            without_gtids("mysql-bin.000002", 4, 0, 0),
        ];
        let comparator = PositionComparator::new();

        let target = without_gtids("mysql-bin.000001", 600, 0, 0);
        let found = comparator.latest_at_or_before(&records, &target).unwrap();
        assert_eq!(found, Some(&records[1]));

        let target = without_gtids("mysql-bin.000000", 1, 0, 0);
        assert_eq!(comparator.latest_at_or_before(&records, &target).unwrap(), None);

        let bad = without_gtids("relay.000001", 1, 0, 0);
        assert!(comparator.latest_at_or_before(&records, &bad).is_err());
    }

    #[test]
    fn test_compare_checkpoints() {
        let mut a = CheckpointMap::new();
        a.insert("filename".to_string(), "mysql-bin.00001".to_string());
        a.insert("position".to_string(), "100".to_string());
        let mut b = a.clone();
        b.insert("row".to_string(), "2".to_string());

        let comparator = PositionComparator::new();
        assert_eq!(comparator.compare_checkpoints(&a, &b).unwrap(), PositionOrder::Before);
        assert_eq!(comparator.compare_checkpoints(&b, &b).unwrap(), PositionOrder::Same);
    }
}

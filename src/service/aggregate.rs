use bigdecimal::{BigDecimal, Zero};
use std::collections::HashMap;

use crate::models::{CounterRule, LineId, UsageEvent};
use crate::service::category::CategoryMap;

/// 单条线路的汇总
#[derive(Debug, Clone, Default)]
pub struct LineTotals {
    /// 桶 -> 费用合计；没有记录的桶不出现
    pub sums: HashMap<String, BigDecimal>,
    /// 计数子桶 -> 条数；没有命中的子桶不出现
    pub counts: HashMap<String, u64>,
    pub events: usize,
}

/// 按 (线路, 桶) 汇总的用量
#[derive(Debug, Clone, Default)]
pub struct LineAggregates {
    lines: HashMap<LineId, LineTotals>,
}

impl LineAggregates {
    pub fn sum(&self, line: &LineId, bucket: &str) -> Option<&BigDecimal> {
        self.lines.get(line).and_then(|t| t.sums.get(bucket))
    }

    pub fn count(&self, line: &LineId, counter: &str) -> Option<u64> {
        self.lines.get(line).and_then(|t| t.counts.get(counter)).copied()
    }

    /// 该线路在用量文件中是否有任意记录 (与金额是否为 0 无关)
    pub fn has_usage(&self, line: &LineId) -> bool {
        self.lines.contains_key(line)
    }

    pub fn line(&self, line: &LineId) -> Option<&LineTotals> {
        self.lines.get(line)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> impl Iterator<Item = &LineId> {
        self.lines.keys()
    }
}

/// 汇总用量记录
///
/// 金额路径：按线路和归一后的桶求和。
/// 计数路径：桶匹配且费用与 unit_cost 精确相等的记录计数，不累加金额。
pub fn aggregate(events: &[UsageEvent], categories: &CategoryMap, counters: &[CounterRule]) -> LineAggregates {
    let mut lines: HashMap<LineId, LineTotals> = HashMap::new();
    let mut unrecognized = 0usize;

    for event in events {
        if !categories.is_known(&event.category) {
            unrecognized += 1;
        }
        let bucket = categories.normalize(Some(event.category.as_str()));
        let totals = lines.entry(event.number.clone()).or_default();
        totals.events += 1;

        let sum = totals
            .sums
            .entry(bucket.to_string())
            .or_insert_with(BigDecimal::zero);
        *sum += &event.cost;

        for rule in counters {
            if rule.bucket == bucket && event.cost == rule.unit_cost {
                *totals.counts.entry(rule.name.clone()).or_insert(0) += 1;
            }
        }
    }

    if unrecognized > 0 {
        tracing::debug!(
            "{} usage events with unrecognized categories routed to '{}'",
            unrecognized,
            categories.catch_all()
        );
    }
    tracing::debug!("aggregated {} usage events over {} lines", events.len(), lines.len());

    LineAggregates { lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClientProfile;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn event(number: &str, category: &str, cost: &str) -> UsageEvent {
        UsageEvent::new(number, category, dec(cost))
    }

    fn run(events: &[UsageEvent]) -> LineAggregates {
        let profile = ClientProfile::islestar();
        let categories = CategoryMap::for_profile(&profile).unwrap();
        aggregate(events, &categories, &profile.counters)
    }

    #[test]
    fn sums_per_line_and_bucket() {
        let aggs = run(&[
            event("0770", "Roam Call MO", "1.25"),
            event("0770", "Roam Call MT", "0.75"),
            event("0770", "Data Abroad", "3.00"),
            event("0880", "Roam Call MO", "9.99"),
        ]);

        let a = LineId::normalize("0770");
        assert_eq!(aggs.sum(&a, "Roaming Calls"), Some(&dec("2.00")));
        assert_eq!(aggs.sum(&a, "Roaming Data"), Some(&dec("3")));
        assert_eq!(aggs.sum(&LineId::normalize("0880"), "Roaming Calls"), Some(&dec("9.99")));
    }

    #[test]
    fn empty_groups_are_absent_not_zero() {
        let aggs = run(&[event("0770", "Roam Call MO", "0")]);
        let a = LineId::normalize("0770");
        assert_eq!(aggs.sum(&a, "Roaming Calls"), Some(&BigDecimal::zero()));
        assert_eq!(aggs.sum(&a, "UK to Abroad"), None);
        assert!(aggs.has_usage(&a));
        assert!(!aggs.has_usage(&LineId::normalize("0999")));
    }

    #[test]
    fn unknown_category_goes_to_catch_all() {
        let aggs = run(&[event("0770", "Carrier Pigeon", "4.10")]);
        assert_eq!(aggs.sum(&LineId::normalize("0770"), "Other"), Some(&dec("4.10")));
    }

    #[test]
    fn counters_count_exact_unit_cost() {
        let aggs = run(&[
            event("0770", "Daily Rate Roaming", "2"),
            event("0770", "Daily Rate Roaming", "2.00"),
            event("0770", "Daily Rate Roaming", "2.0"),
            event("0770", "Daily Rate Roaming", "5"),
            event("0770", "Daily Rate Roaming", "2.01"),
            event("0770", "Daily Rate Roaming", "4.99"),
            // 同价但不在日费桶内
            event("0770", "Roam Call MO", "2"),
        ]);

        let a = LineId::normalize("0770");
        assert_eq!(aggs.count(&a, "EU Daily Roaming"), Some(3));
        assert_eq!(aggs.count(&a, "RoW Daily Roaming"), Some(1));
        assert_eq!(aggs.sum(&a, "Daily Rate Roaming"), Some(&dec("18.00")));
        assert_eq!(aggs.line(&a).unwrap().events, 7);
    }
}

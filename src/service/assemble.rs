use bigdecimal::{BigDecimal, Zero};
use indexmap::IndexMap;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use crate::models::{ClientProfile, DataVolumeSource, LineId, ReportRow, ServiceDirectory, SubscriberLine};
use crate::service::aggregate::LineAggregates;
use crate::service::sanitize::Sanitizer;

/// 行组装所需的全部输入
#[derive(Debug, Clone, Copy)]
pub struct AssemblyInputs<'a> {
    pub roster: &'a [SubscriberLine],
    pub aggregates: &'a LineAggregates,
    /// 流量汇总文件中的原始值
    pub data_volumes: &'a HashMap<LineId, String>,
    pub directory: &'a ServiceDirectory,
}

fn spare_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\bspare(?:\swas)?\b").expect("spare pattern is valid"))
}

fn spare_words() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\b(spare|was|-)+\b").expect("spare words pattern is valid"))
}

/// 识别空号线路，返回 (显示名, 是否空号)
pub fn clean_user_name(name: &str) -> (String, bool) {
    let name = name.trim();
    let is_spare = spare_pattern().is_match(name);
    let cleaned = spare_words().replace_all(name, "").trim().to_string();
    (cleaned, is_spare)
}

/// 以名册为准组装报表行 (名册左连接用量)
///
/// 每条名册线路恰好一行；名册外的用量被忽略。
/// Total = 月租 + 全部金额桶，计数子桶从不计入。
pub fn assemble(profile: &ClientProfile, inputs: AssemblyInputs<'_>, sanitizer: &mut Sanitizer) -> Vec<ReportRow> {
    let aggregates = inputs.aggregates;
    let mut rows = Vec::with_capacity(inputs.roster.len());

    for line in inputs.roster {
        // 1. 金额桶：缺失即为 0
        let mut charges: IndexMap<String, BigDecimal> = profile
            .buckets
            .iter()
            .map(|bucket| {
                let sum = aggregates
                    .sum(&line.number, bucket)
                    .cloned()
                    .unwrap_or_else(BigDecimal::zero);
                (bucket.clone(), sum)
            })
            .collect();

        // 2. 名册自带的用量费用
        if let (Some(charge), Some(amount)) = (&profile.roster.usage_charge, &line.roster_charge) {
            if let Some(slot) = charges.get_mut(&charge.bucket) {
                *slot += amount;
            }
        }

        // 3. 计数子桶：缺失即为 0
        let counters: IndexMap<String, u64> = profile
            .counters
            .iter()
            .map(|rule| (rule.name.clone(), aggregates.count(&line.number, &rule.name).unwrap_or(0)))
            .collect();

        let usage_total = charges
            .values()
            .fold(BigDecimal::zero(), |acc, amount| acc + amount);
        let total = &line.recurring + &usage_total;

        let (display_user, spare) = if profile.detect_spare_lines {
            clean_user_name(&line.user)
        } else {
            (line.user.clone(), false)
        };

        let data_volume = profile.data_volume.as_ref().map(|source| {
            let raw = match source {
                DataVolumeSource::RosterColumn { .. } => line.data_volume.as_deref(),
                DataVolumeSource::Summary { .. } => inputs.data_volumes.get(&line.number).map(String::as_str),
            };
            match raw {
                Some(raw) => sanitizer.data_volume(line.number.as_str(), "Data Volume", raw),
                None => BigDecimal::zero(),
            }
        });

        let directory = match (&profile.directory, inputs.directory.get(&line.number)) {
            (Some(schema), Some(entry)) => schema
                .fields
                .keys()
                .filter_map(|field| entry.get(field).map(|v| (field.clone(), v.clone())))
                .collect(),
            _ => IndexMap::new(),
        };

        // 名册自带的非零费用也算作有用量
        let roster_usage = line.roster_charge.as_ref().is_some_and(|c| !c.is_zero());

        rows.push(ReportRow {
            line: line.clone(),
            display_user,
            spare,
            charges,
            counters,
            no_usage: !aggregates.has_usage(&line.number) && !roster_usage,
            usage_total,
            total,
            data_volume,
            directory,
            tax: None,
        });
    }

    let roster_ids: HashSet<&LineId> = inputs.roster.iter().map(|l| &l.number).collect();
    let unattributed = aggregates.lines().filter(|id| !roster_ids.contains(id)).count();
    if unattributed > 0 {
        tracing::debug!("{} usage lines not on the roster were ignored", unattributed);
    }
    tracing::info!(
        "assembled {} rows ({} without usage)",
        rows.len(),
        rows.iter().filter(|r| r.no_usage).count()
    );

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UsageEvent;
    use crate::service::aggregate::aggregate;
    use crate::service::category::CategoryMap;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn line(number: &str, recurring: &str) -> SubscriberLine {
        SubscriberLine::new("Sales", "Ann Example", number, dec(recurring))
    }

    fn build(profile: &ClientProfile, roster: &[SubscriberLine], events: &[UsageEvent]) -> Vec<ReportRow> {
        let aggregates = match CategoryMap::for_profile(profile) {
            Some(categories) => aggregate(events, &categories, &profile.counters),
            None => LineAggregates::default(),
        };
        let data_volumes = HashMap::new();
        let directory = ServiceDirectory::new();
        let inputs = AssemblyInputs {
            roster,
            aggregates: &aggregates,
            data_volumes: &data_volumes,
            directory: &directory,
        };
        assemble(profile, inputs, &mut Sanitizer::new())
    }

    #[test]
    fn one_row_per_roster_line() {
        let profile = ClientProfile::islestar();
        let roster = vec![line("0770", "10"), line("0880", "12.5"), line("0770", "10")];
        let events = vec![
            UsageEvent::new("0770", "Roam Call MO", dec("1.00")),
            UsageEvent::new("0999", "Roam Call MO", dec("50.00")),
        ];

        let rows = build(&profile, &roster, &events);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.line.number.as_str() != "0999"));
        assert_eq!(rows[0].charges["Roaming Calls"], dec("1.00"));
        assert_eq!(rows[2].charges["Roaming Calls"], dec("1.00"));
    }

    #[test]
    fn total_excludes_counters() {
        let profile = ClientProfile::islestar();
        let roster = vec![line("0770", "15.00")];
        let events = vec![
            UsageEvent::new("0770", "Daily Rate Roaming", dec("2")),
            UsageEvent::new("0770", "Daily Rate Roaming", dec("2")),
            UsageEvent::new("0770", "Daily Rate Roaming", dec("2")),
            UsageEvent::new("0770", "Daily Rate Roaming", dec("5")),
            UsageEvent::new("0770", "Text Msg UK", dec("0.10")),
        ];

        let row = &build(&profile, &roster, &events)[0];
        assert_eq!(row.counters["EU Daily Roaming"], 3);
        assert_eq!(row.counters["RoW Daily Roaming"], 1);
        assert_eq!(row.charges["Daily Rate Roaming"], dec("11"));
        assert_eq!(row.total, dec("26.10"));
        assert!(!row.no_usage);
    }

    #[test]
    fn line_without_events_is_flagged_and_zero() {
        let profile = ClientProfile::islestar();
        let roster = vec![line("0770", "9.00"), line("0880", "0")];
        let events = vec![UsageEvent::new("0880", "Landline", dec("0"))];

        let rows = build(&profile, &roster, &events);
        assert!(rows[0].no_usage);
        assert!(rows[0].charges.values().all(|v| v.is_zero()));
        assert!(rows[0].counters.values().all(|c| *c == 0));
        assert_eq!(rows[0].total, dec("9"));

        // 有记录但金额为 0 不算无用量
        assert!(!rows[1].no_usage);
    }

    #[test]
    fn roster_charge_feeds_bucket() {
        let profile = ClientProfile::convatec_uk();
        let mut spare = line("07700 900123", "20.00");
        spare.user = "Spare was Bob Smith".to_string();
        spare.roster_charge = Some(dec("4.50"));
        spare.data_volume = Some("512 MB".to_string());

        let row = &build(&profile, &[spare], &[])[0];
        assert_eq!(row.charges["Out of Bundle spend"], dec("4.50"));
        assert_eq!(row.total, dec("24.50"));
        assert!(row.spare);
        assert_eq!(row.display_user, "Bob Smith");
        assert_eq!(row.data_volume, Some(dec("0.50")));
        assert!(!row.no_usage);
    }

    #[test]
    fn zero_roster_charge_is_no_usage() {
        let profile = ClientProfile::convatec_uk();
        let mut quiet = line("0770", "15.00");
        quiet.roster_charge = Some(BigDecimal::zero());

        let row = &build(&profile, &[quiet], &[])[0];
        assert!(row.no_usage);
        assert!(row.charges.values().all(|v| v.is_zero()));
    }

    #[test]
    fn clean_user_name_variants() {
        assert_eq!(clean_user_name("SPARE"), (String::new(), true));
        assert_eq!(clean_user_name(" Jane Doe "), ("Jane Doe".to_string(), false));
        assert_eq!(clean_user_name("Spareparts Ltd"), ("Spareparts Ltd".to_string(), false));
    }
}

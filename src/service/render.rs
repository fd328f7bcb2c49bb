use bigdecimal::{BigDecimal, Zero};

use crate::models::{ClientProfile, ColumnSource, RenderedReport, ReportRow, ReportRun};
use crate::service::sanitize::{format_money, format_quantity};

/// 将完成计算的行渲染为文本单元格
///
/// 格式化只发生在这里，所有运算已在此之前完成。
pub fn render(profile: &ClientProfile, run: &ReportRun) -> RenderedReport {
    let preamble = if profile.period_header {
        vec![
            ("Billing Period".to_string(), run.period.billing_period.clone()),
            ("Usage Period".to_string(), run.period.usage_period.clone()),
        ]
    } else {
        Vec::new()
    };

    RenderedReport {
        preamble,
        headers: profile.columns.iter().map(|c| c.header.clone()).collect(),
        rows: run.rows.iter().map(|row| render_row(profile, row)).collect(),
    }
}

fn render_row(profile: &ClientProfile, row: &ReportRow) -> Vec<String> {
    let money = |value: &BigDecimal| format_money(value, &profile.currency_symbol);
    let zero = BigDecimal::zero();

    profile
        .columns
        .iter()
        .map(|column| match &column.source {
            ColumnSource::Department => row.line.department.clone(),
            ColumnSource::User => row.display_user.clone(),
            ColumnSource::Number => row.line.number.to_string(),
            ColumnSource::Recurring => money(&row.line.recurring),
            ColumnSource::Bucket { bucket } => money(row.charges.get(bucket).unwrap_or(&zero)),
            ColumnSource::Counter { counter } => row.counters.get(counter).copied().unwrap_or(0).to_string(),
            ColumnSource::Total => money(&row.total),
            ColumnSource::TotalUsage => money(&row.usage_total),
            ColumnSource::Net => row.tax.as_ref().map(|t| money(&t.net)).unwrap_or_default(),
            ColumnSource::Vat => row.tax.as_ref().map(|t| money(&t.vat)).unwrap_or_default(),
            ColumnSource::Gross => row.tax.as_ref().map(|t| money(&t.gross)).unwrap_or_default(),
            ColumnSource::NoUsage => marker(row.no_usage, "X"),
            ColumnSource::Spare => marker(row.spare, "TRUE"),
            ColumnSource::DataVolume => format_quantity(row.data_volume.as_ref().unwrap_or(&zero)),
            ColumnSource::Attribute { name } => row.line.attributes.get(name).cloned().unwrap_or_default(),
            ColumnSource::Directory { field, default } => row
                .directory
                .get(field)
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| default.clone()),
            ColumnSource::Literal { value } => value.clone(),
        })
        .collect()
}

fn marker(flag: bool, text: &str) -> String {
    if flag {
        text.to_string()
    } else {
        String::new()
    }
}

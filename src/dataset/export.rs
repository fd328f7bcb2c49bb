use std::path::{Path, PathBuf};

use crate::error::ReportError;
use crate::models::{BillingPeriod, RenderedReport};

/// 报表文件名：<月份>_<年份>_Bill_Run_<客户>.csv
pub fn report_file_name(client: &str, period: &BillingPeriod) -> String {
    let client: String = client
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') { '-' } else { c })
        .collect();
    format!("{}_{}_Bill_Run_{}.csv", period.report_month, period.report_year, client)
}

pub fn report_path(output_dir: &Path, client: &str, period: &BillingPeriod) -> PathBuf {
    output_dir.join(report_file_name(client, period))
}

/// 导出渲染后的报表到 CSV 文件
pub fn export_to_csv(report: &RenderedReport, output_path: &Path) -> Result<(), ReportError> {
    use csv::WriterBuilder;

    let csv_err = |source| ReportError::Csv {
        path: output_path.to_path_buf(),
        source,
    };

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 账期行与表头列数不同
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .from_path(output_path)
        .map_err(csv_err)?;

    for (label, value) in &report.preamble {
        writer.write_record([label, value]).map_err(csv_err)?;
    }
    writer.write_record(&report.headers).map_err(csv_err)?;
    for row in &report.rows {
        writer.write_record(row).map_err(csv_err)?;
    }

    writer.flush()?;
    tracing::info!("✓ report written to {} ({} rows)", output_path.display(), report.rows.len());
    Ok(())
}

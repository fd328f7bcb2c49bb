use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{FieldWarning, SubscriberLine};

/// 单行税额
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxFigures {
    pub net: BigDecimal,
    pub vat: BigDecimal,
    pub gross: BigDecimal,
}

/// 每条名册线路对应的一行报表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub line: SubscriberLine,
    /// 去掉空号标记后的显示名
    pub display_user: String,
    pub spare: bool,
    /// 桶 -> 金额，包含配置中的全部桶
    pub charges: IndexMap<String, BigDecimal>,
    /// 计数子桶 -> 条数，从不计入金额
    pub counters: IndexMap<String, u64>,
    /// 该线路在用量文件中没有任何记录
    pub no_usage: bool,
    pub usage_total: BigDecimal,
    pub total: BigDecimal,
    pub data_volume: Option<BigDecimal>,
    pub directory: IndexMap<String, String>,
    pub tax: Option<TaxFigures>,
}

/// 账期信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    /// 报表月份所在的上一自然月名称，例如 "September"
    pub report_month: String,
    pub report_year: i32,
    /// 例如 "Oct-26"
    pub billing_period: String,
    /// 例如 "01/09/26 - 30/09/26"
    pub usage_period: String,
}

impl BillingPeriod {
    /// 按运行日期推算：报表对应上一自然月
    pub fn for_date(as_of: NaiveDate) -> Self {
        let first_of_month = as_of.with_day(1).unwrap_or(as_of);
        let last_of_previous = first_of_month.pred_opt().unwrap_or(first_of_month);
        let first_of_previous = last_of_previous.with_day(1).unwrap_or(last_of_previous);

        Self {
            report_month: last_of_previous.format("%B").to_string(),
            report_year: last_of_previous.year(),
            billing_period: as_of.format("%b-%y").to_string(),
            usage_period: format!(
                "{} - {}",
                first_of_previous.format("%d/%m/%y"),
                last_of_previous.format("%d/%m/%y")
            ),
        }
    }
}

/// 一次报表运行的完整结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRun {
    pub client: String,
    pub period: BillingPeriod,
    pub vat_ratio: Option<BigDecimal>,
    pub rows: Vec<ReportRow>,
    pub warnings: Vec<FieldWarning>,
}

/// 渲染后的文本表格 (输出边界的输入)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedReport {
    /// 表头之上的说明行，例如账期
    pub preamble: Vec<(String, String)>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// 生成的报表文件句柄，由调用方持有
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportArtifact {
    pub path: PathBuf,
    pub run: ReportRun,
}

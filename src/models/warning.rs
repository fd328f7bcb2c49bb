use serde::{Deserialize, Serialize};
use std::fmt;

/// 数值字段解析失败的原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ParseIssue {
    Blank,
    Invalid(String),
    NonFinite,
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blank => write!(f, "blank value"),
            Self::Invalid(raw) => write!(f, "cannot parse '{}'", raw),
            Self::NonFinite => write!(f, "non-finite number"),
        }
    }
}

/// 行/字段级告警，随报表一起返回供人工复核
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWarning {
    /// 线路标识，无法确定时为空
    pub line: String,
    pub field: String,
    pub raw: String,
    pub issue: ParseIssue,
}

use bigdecimal::BigDecimal;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 线路标识 (服务号码)
///
/// 只作为关联键使用，从不参与运算。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineId(String);

impl LineId {
    /// 去除首尾空白后只保留数字；全部被去除时退回到去空白后的原文
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            Self(trimmed.to_string())
        } else {
            Self(digits)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 账单名册中的一条线路 (Service Breakdown)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriberLine {
    pub department: String,
    pub user: String,
    pub number: LineId,
    /// 固定月租
    pub recurring: BigDecimal,
    /// 名册自带的用量费用 (无单独用量文件的客户)
    pub roster_charge: Option<BigDecimal>,
    /// 名册中的原始数据流量文本，例如 "512 MB"
    pub data_volume: Option<String>,
    /// 原样透传的列
    pub attributes: IndexMap<String, String>,
}

impl SubscriberLine {
    pub fn new(department: &str, user: &str, number: &str, recurring: BigDecimal) -> Self {
        Self {
            department: department.trim().to_string(),
            user: user.trim().to_string(),
            number: LineId::normalize(number),
            recurring,
            roster_charge: None,
            data_volume: None,
            attributes: IndexMap::new(),
        }
    }
}

/// 一条用量记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub number: LineId,
    /// 客户导出的原始分类标签
    pub category: String,
    pub cost: BigDecimal,
}

impl UsageEvent {
    pub fn new(number: &str, category: &str, cost: BigDecimal) -> Self {
        Self {
            number: LineId::normalize(number),
            category: category.to_string(),
            cost,
        }
    }
}

use bigdecimal::{BigDecimal, Zero};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;

use crate::models::{FieldWarning, ParseIssue};

/// 解析时剥离的货币符号
const CURRENCY_SYMBOLS: &[char] = &['£', '$', '€'];

/// 可接受的最大小数位数，超出视为坏值
const MAX_SCALE: i64 = 32;

/// 调用方传入的金额：数字或文本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

impl Default for RawAmount {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl RawAmount {
    pub fn parse(&self) -> Result<BigDecimal, ParseIssue> {
        match self {
            Self::Number(value) => parse_number(*value),
            Self::Text(text) => parse_amount(text),
        }
    }

    fn raw_text(&self) -> String {
        match self {
            Self::Number(value) => value.to_string(),
            Self::Text(text) => text.clone(),
        }
    }
}

/// 解析金额文本：去掉货币符号、千分位和空白后按十进制解析
pub fn parse_amount(raw: &str) -> Result<BigDecimal, ParseIssue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseIssue::Blank);
    }

    let cleaned: String = trimmed
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(c))
        .collect();

    // 不接受科学计数法，极端指数会让后续舍入溢出或长时间运算
    if cleaned.contains(['e', 'E']) {
        return Err(ParseIssue::Invalid(trimmed.to_string()));
    }

    BigDecimal::from_str(&cleaned)
        .map_err(|_| ParseIssue::Invalid(trimmed.to_string()))
        .and_then(|value| bounded(value, trimmed))
}

fn bounded(value: BigDecimal, raw: &str) -> Result<BigDecimal, ParseIssue> {
    let (_, scale) = value.as_bigint_and_exponent();
    if scale.abs() > MAX_SCALE {
        return Err(ParseIssue::Invalid(raw.to_string()));
    }
    Ok(value)
}

/// 已是数字的输入；经由最短十进制表示转换，避免二进制浮点尾数
pub fn parse_number(value: f64) -> Result<BigDecimal, ParseIssue> {
    if !value.is_finite() {
        return Err(ParseIssue::NonFinite);
    }
    let text = value.to_string();
    BigDecimal::from_str(&text)
        .map_err(|_| ParseIssue::Invalid(text.clone()))
        .and_then(|parsed| bounded(parsed, &text))
}

/// 解析失败一律为 0
pub fn sanitize(raw: &str) -> BigDecimal {
    parse_amount(raw).unwrap_or_else(|_| BigDecimal::zero())
}

fn data_volume_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(GB|MB|KB)").expect("data volume pattern is valid")
    })
}

/// 流量换算为 GB (1024 进制，保留两位)；无单位时按 GB 数字解析
pub fn parse_data_volume(raw: &str) -> Result<BigDecimal, ParseIssue> {
    let Some(caps) = data_volume_pattern().captures(raw) else {
        return parse_amount(raw).map(|gb| round_money(&gb));
    };

    let amount = BigDecimal::from_str(&caps[1])
        .map_err(|_| ParseIssue::Invalid(raw.trim().to_string()))
        .and_then(|value| bounded(value, raw.trim()))?;
    let gb = match caps[2].to_ascii_uppercase().as_str() {
        "MB" => amount / BigDecimal::from(1024),
        "KB" => amount / BigDecimal::from(1024 * 1024),
        _ => amount,
    };
    Ok(round_money(&gb))
}

/// 四舍五入到两位小数 (远离零)
pub fn round_money(value: &BigDecimal) -> BigDecimal {
    value.round(2).with_scale(2)
}

/// 货币格式：符号 + 千分位 + 两位小数，例如 "£1,942.00"
pub fn format_money(value: &BigDecimal, symbol: &str) -> String {
    let text = round_money(value).to_string();
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.as_str()),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

    format!(
        "{}{}{}.{}",
        if negative { "-" } else { "" },
        symbol,
        group_thousands(whole),
        fraction
    )
}

/// 两位小数，不带符号和千分位 (流量等数量)
pub fn format_quantity(value: &BigDecimal) -> String {
    round_money(value).to_string()
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// 带告警收集的清洗器：失败降级为 0，非空的坏值记录告警
#[derive(Debug, Default)]
pub struct Sanitizer {
    warnings: Vec<FieldWarning>,
}

impl Sanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn amount(&mut self, line: &str, field: &str, raw: &str) -> BigDecimal {
        let parsed = parse_amount(raw);
        self.settle(line, field, raw, parsed)
    }

    pub fn raw_amount(&mut self, field: &str, raw: &RawAmount) -> BigDecimal {
        let parsed = raw.parse();
        self.settle("", field, &raw.raw_text(), parsed)
    }

    pub fn data_volume(&mut self, line: &str, field: &str, raw: &str) -> BigDecimal {
        let parsed = parse_data_volume(raw);
        self.settle(line, field, raw, parsed)
    }

    pub fn warnings(&self) -> &[FieldWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<FieldWarning> {
        self.warnings
    }

    fn settle(&mut self, line: &str, field: &str, raw: &str, parsed: Result<BigDecimal, ParseIssue>) -> BigDecimal {
        match parsed {
            Ok(value) => value,
            Err(ParseIssue::Blank) => BigDecimal::zero(),
            Err(issue) => {
                tracing::warn!("line '{}' field '{}': {}, using 0", line, field, issue);
                self.warnings.push(FieldWarning {
                    line: line.to_string(),
                    field: field.to_string(),
                    raw: raw.to_string(),
                    issue,
                });
                BigDecimal::zero()
            }
        }
    }
}

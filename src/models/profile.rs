use bigdecimal::BigDecimal;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ReportError;

/// 客户报表类型配置
///
/// 一个通用流水线 + 一份客户配置：分类映射、计费桶、计数规则、
/// 是否计算增值税以及输出列布局都在这里声明。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientProfile {
    pub name: String,
    pub roster: RosterSchema,
    #[serde(default)]
    pub usage: Option<UsageSchema>,
    /// 原始分类 -> 计费桶 (多对一)
    #[serde(default)]
    pub categories: IndexMap<String, String>,
    /// 未识别分类的兜底桶
    #[serde(default)]
    pub catch_all: Option<String>,
    /// 金额桶，顺序即汇总顺序
    #[serde(default)]
    pub buckets: Vec<String>,
    /// 按单价精确相等计数的子桶
    #[serde(default)]
    pub counters: Vec<CounterRule>,
    /// 是否计算 Net -> VAT -> Gross
    #[serde(default)]
    pub vat: bool,
    #[serde(default)]
    pub data_volume: Option<DataVolumeSource>,
    #[serde(default)]
    pub directory: Option<DirectorySchema>,
    #[serde(default)]
    pub detect_spare_lines: bool,
    /// 在表头之上输出账期信息
    #[serde(default)]
    pub period_header: bool,
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    pub columns: Vec<ColumnSpec>,
}

fn default_currency_symbol() -> String {
    "£".to_string()
}

/// 名册文件的列名
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterSchema {
    #[serde(default = "RosterSchema::default_department")]
    pub department: String,
    #[serde(default = "RosterSchema::default_user")]
    pub user: String,
    #[serde(default = "RosterSchema::default_number")]
    pub number: String,
    #[serde(default = "RosterSchema::default_recurring")]
    pub recurring: String,
    /// 名册自带的用量费用列，计入指定桶
    #[serde(default)]
    pub usage_charge: Option<RosterCharge>,
    /// 原样透传的可选列
    #[serde(default)]
    pub attributes: Vec<AttributeColumn>,
    /// 每个名册文件按整行字典序排序后再拼接
    #[serde(default)]
    pub sort_records: bool,
}

impl RosterSchema {
    fn default_department() -> String {
        "Cost Centre".to_string()
    }
    fn default_user() -> String {
        "Name".to_string()
    }
    fn default_number() -> String {
        "Service".to_string()
    }
    fn default_recurring() -> String {
        "Fixed Charges".to_string()
    }
}

impl Default for RosterSchema {
    fn default() -> Self {
        Self {
            department: Self::default_department(),
            user: Self::default_user(),
            number: Self::default_number(),
            recurring: Self::default_recurring(),
            usage_charge: None,
            attributes: Vec::new(),
            sort_records: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterCharge {
    pub column: String,
    pub bucket: String,
}

/// 透传列：先精确匹配 name，再按候选词做大小写无关的包含匹配
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeColumn {
    pub name: String,
    #[serde(default)]
    pub candidates: Vec<String>,
}

/// 用量文件的列名
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSchema {
    #[serde(default = "RosterSchema::default_number")]
    pub number: String,
    #[serde(default = "UsageSchema::default_category")]
    pub category: String,
    #[serde(default = "UsageSchema::default_cost")]
    pub cost: String,
}

impl UsageSchema {
    fn default_category() -> String {
        "Usage Category".to_string()
    }
    fn default_cost() -> String {
        "Cost".to_string()
    }
}

impl Default for UsageSchema {
    fn default() -> Self {
        Self {
            number: RosterSchema::default_number(),
            category: Self::default_category(),
            cost: Self::default_cost(),
        }
    }
}

/// 计数子桶：统计某桶内费用恰好等于 unit_cost 的记录条数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterRule {
    pub name: String,
    pub bucket: String,
    pub unit_cost: BigDecimal,
}

/// 数据流量来源
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum DataVolumeSource {
    /// 名册中带单位的文本列 ("1.5 GB", "512 MB")
    RosterColumn { column: String },
    /// 单独的流量汇总文件，取号码列右侧一列
    Summary {
        #[serde(default = "RosterSchema::default_number")]
        key: String,
    },
}

/// 服务目录 (附加静态属性)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySchema {
    pub key: String,
    /// 字段名 -> 文件列名
    pub fields: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub header: String,
    #[serde(flatten)]
    pub source: ColumnSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSource {
    Department,
    User,
    Number,
    Recurring,
    Bucket { bucket: String },
    Counter { counter: String },
    /// 月租 + 全部金额桶
    Total,
    /// 仅金额桶
    TotalUsage,
    Net,
    Vat,
    Gross,
    NoUsage,
    Spare,
    DataVolume,
    Attribute { name: String },
    Directory {
        field: String,
        #[serde(default)]
        default: String,
    },
    Literal {
        #[serde(default)]
        value: String,
    },
}

impl ColumnSpec {
    pub fn new(header: &str, source: ColumnSource) -> Self {
        Self {
            header: header.to_string(),
            source,
        }
    }
}

impl ClientProfile {
    /// 注册前的一致性检查
    pub fn validate(&self) -> Result<(), ReportError> {
        let invalid = |msg: String| Err(ReportError::InvalidProfile(format!("{}: {}", self.name, msg)));

        let buckets: HashSet<&str> = self.buckets.iter().map(String::as_str).collect();
        if buckets.len() != self.buckets.len() {
            return invalid("duplicate bucket name".to_string());
        }

        if !self.categories.is_empty() && self.usage.is_none() {
            return invalid("category map without a usage schema".to_string());
        }

        if self.usage.is_some() {
            let Some(catch_all) = &self.catch_all else {
                return invalid("usage schema without a catch-all bucket".to_string());
            };
            if !buckets.contains(catch_all.as_str()) {
                return invalid(format!("catch-all bucket '{}' is not declared", catch_all));
            }
        }

        for (raw, bucket) in &self.categories {
            if !buckets.contains(bucket.as_str()) {
                return invalid(format!("category '{}' maps to undeclared bucket '{}'", raw, bucket));
            }
        }

        let mut counters = HashSet::new();
        for counter in &self.counters {
            if !buckets.contains(counter.bucket.as_str()) {
                return invalid(format!("counter '{}' reads undeclared bucket '{}'", counter.name, counter.bucket));
            }
            if !counters.insert(counter.name.as_str()) {
                return invalid(format!("duplicate counter '{}'", counter.name));
            }
        }

        if let Some(charge) = &self.roster.usage_charge {
            if !buckets.contains(charge.bucket.as_str()) {
                return invalid(format!("roster charge feeds undeclared bucket '{}'", charge.bucket));
            }
        }

        for column in &self.columns {
            match &column.source {
                ColumnSource::Bucket { bucket } if !buckets.contains(bucket.as_str()) => {
                    return invalid(format!("column '{}' reads undeclared bucket '{}'", column.header, bucket));
                }
                ColumnSource::Counter { counter } if !counters.contains(counter.as_str()) => {
                    return invalid(format!("column '{}' reads undeclared counter '{}'", column.header, counter));
                }
                ColumnSource::Net | ColumnSource::Vat | ColumnSource::Gross if !self.vat => {
                    return invalid(format!("column '{}' needs vat = true", column.header));
                }
                ColumnSource::DataVolume if self.data_volume.is_none() => {
                    return invalid(format!("column '{}' needs a data volume source", column.header));
                }
                ColumnSource::Directory { field, .. } => {
                    let known = self
                        .directory
                        .as_ref()
                        .map(|d| d.fields.contains_key(field))
                        .unwrap_or(false);
                    if !known {
                        return invalid(format!("column '{}' reads unknown directory field '{}'", column.header, field));
                    }
                }
                ColumnSource::Attribute { name } if !self.roster.attributes.iter().any(|a| &a.name == name) => {
                    return invalid(format!("column '{}' reads undeclared attribute '{}'", column.header, name));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Islestar：漫游日费按单价计数 (2 = EU, 5 = RoW)，无增值税
    pub fn islestar() -> Self {
        let categories = mapping(&[
            ("Daily Rate Roaming", "Daily Rate Roaming"),
            ("UK to Abroad SMS", "UK to Abroad"),
            ("UK to Abroad", "UK to Abroad"),
            ("Channel Islands & Isle of Man", "UK to Abroad"),
            ("Data Abroad", "Roaming Data"),
            ("Voda Red Data Overage", "Roaming Data"),
            ("Roam Call MO", "Roaming Calls"),
            ("Roam Call MT", "Roaming Calls"),
            ("Landline", "Other"),
            ("Domestic Data", "Other"),
            ("International SMS", "Other"),
            ("International", "Other"),
            ("Data UK", "Other"),
            ("On-Net", "Other"),
            ("Cross-Net", "Other"),
            ("Roam Text MT", "Other"),
            ("Special Numbers", "Other"),
            ("Text Msg UK", "Other"),
            ("Non Geo", "Other"),
            ("MMS", "Other"),
            ("Voicemail", "Other"),
            ("Roam Text MO", "Other"),
            ("Service", "Other"),
            ("Other Std", "Other"),
            ("SMS", "Other"),
        ]);

        Self {
            name: "Islestar".to_string(),
            roster: RosterSchema::default(),
            usage: Some(UsageSchema::default()),
            categories,
            catch_all: Some("Other".to_string()),
            buckets: names(&["Daily Rate Roaming", "Roaming Calls", "Roaming Data", "UK to Abroad", "Other"]),
            counters: vec![
                CounterRule {
                    name: "EU Daily Roaming".to_string(),
                    bucket: "Daily Rate Roaming".to_string(),
                    unit_cost: BigDecimal::from(2),
                },
                CounterRule {
                    name: "RoW Daily Roaming".to_string(),
                    bucket: "Daily Rate Roaming".to_string(),
                    unit_cost: BigDecimal::from(5),
                },
            ],
            vat: false,
            data_volume: None,
            directory: None,
            detect_spare_lines: false,
            period_header: false,
            currency_symbol: default_currency_symbol(),
            columns: vec![
                ColumnSpec::new("Department", ColumnSource::Department),
                ColumnSpec::new("User", ColumnSource::User),
                ColumnSpec::new("Number", ColumnSource::Number),
                ColumnSpec::new("Fixed Charges", ColumnSource::Recurring),
                ColumnSpec::new("EU Daily Roaming Charges", counter("EU Daily Roaming")),
                ColumnSpec::new("RoW Daily Roaming Charges", counter("RoW Daily Roaming")),
                ColumnSpec::new("Daily Rate Roaming", bucket("Daily Rate Roaming")),
                ColumnSpec::new("Roaming Calls", bucket("Roaming Calls")),
                ColumnSpec::new("Roaming Data", bucket("Roaming Data")),
                ColumnSpec::new("UK to Abroad", bucket("UK to Abroad")),
                ColumnSpec::new("Other Charges", bucket("Other")),
                ColumnSpec::new("Total", ColumnSource::Total),
                ColumnSpec::new("No Usage", ColumnSource::NoUsage),
            ],
        }
    }

    /// Tysers：完整 Net -> VAT -> Gross，流量来自单独汇总文件
    pub fn tysers() -> Self {
        let categories = mapping(&[
            ("Data UK", "Data UK (£)"),
            ("Data Abroad", "Data Roaming (£)"),
            ("Voda Red Data Overage", "Data Roaming (£)"),
            ("Daily Rate Roaming", "Business Traveller"),
            ("Channel Islands & Isle of Man Text Msg", "International/Roam"),
            ("Channel Islands & Isle of Man", "International/Roam"),
            ("Roam MMS", "International/Roam"),
            ("UK to Abroad", "International/Roam"),
            ("Roam Call MT", "International/Roam"),
            ("Roam Call MO", "International/Roam"),
            ("Roam Text MO", "International/Roam"),
            ("Roam Text MT", "International/Roam"),
            ("UK to Abroad SMS", "International/Roam"),
            ("Text Msg UK", "SMS/MMS"),
            ("Premium Text", "SMS/MMS"),
            ("MMS", "SMS/MMS"),
            ("Service", "Voice"),
            ("Cross-Net", "Voice"),
            ("On-Net", "Voice"),
            ("Voicemail", "Voice"),
            ("Landline", "Voice"),
            ("Premium", "Voice"),
            ("Non Geo", "Voice"),
            ("Freephone", "Voice"),
            ("Call Return", "Voice"),
            ("Personal", "Voice"),
        ]);

        let roster = RosterSchema {
            attributes: vec![AttributeColumn {
                name: "Voice Usage".to_string(),
                candidates: names(&["voice usage"]),
            }],
            ..RosterSchema::default()
        };

        Self {
            name: "Tysers".to_string(),
            roster,
            usage: Some(UsageSchema::default()),
            categories,
            catch_all: Some("Voice".to_string()),
            buckets: names(&[
                "Voice",
                "International/Roam",
                "SMS/MMS",
                "Business Traveller",
                "Data UK (£)",
                "Data Roaming (£)",
            ]),
            counters: Vec::new(),
            vat: true,
            data_volume: Some(DataVolumeSource::Summary {
                key: RosterSchema::default_number(),
            }),
            directory: None,
            detect_spare_lines: false,
            period_header: false,
            currency_symbol: String::new(),
            columns: vec![
                ColumnSpec::new("Cost Centre", ColumnSource::Department),
                ColumnSpec::new("User", ColumnSource::User),
                ColumnSpec::new("Number", ColumnSource::Number),
                ColumnSpec::new("Voice", bucket("Voice")),
                ColumnSpec::new("International/Roam", bucket("International/Roam")),
                ColumnSpec::new("SMS/MMS", bucket("SMS/MMS")),
                ColumnSpec::new("Business Traveller", bucket("Business Traveller")),
                ColumnSpec::new("Data (GB)", ColumnSource::DataVolume),
                ColumnSpec::new("Data UK (£)", bucket("Data UK (£)")),
                ColumnSpec::new("Data Roaming (£)", bucket("Data Roaming (£)")),
                ColumnSpec::new(
                    "Call Duration (hh:mm:ss)",
                    ColumnSource::Attribute {
                        name: "Voice Usage".to_string(),
                    },
                ),
                ColumnSpec::new("Total Usage", ColumnSource::TotalUsage),
                ColumnSpec::new("Recurring", ColumnSource::Recurring),
                ColumnSpec::new("Net", ColumnSource::Net),
                ColumnSpec::new("VAT", ColumnSource::Vat),
                ColumnSpec::new("Gross", ColumnSource::Gross),
            ],
        }
    }

    /// ConvaTec UK：无用量文件，名册自带超套餐费用，资费来自服务目录
    pub fn convatec_uk() -> Self {
        let mut profile = Self::convatec_base("ConvaTec UK", "Out of Bundle spend");
        profile.columns = vec![
            ColumnSpec::new("Number", ColumnSource::Number),
            ColumnSpec::new("User", ColumnSource::User),
            ColumnSpec::new("Spare?", ColumnSource::Spare),
            ColumnSpec::new("Company", ColumnSource::Department),
            ColumnSpec::new("Start/End Date", directory("start_date", "")),
            ColumnSpec::new("Tariff", directory("tariff", "Unknown")),
            ColumnSpec::new("Line Rental", ColumnSource::Recurring),
            ColumnSpec::new("Out of Bundle spend", bucket("Out of Bundle spend")),
            ColumnSpec::new("Total Spend", ColumnSource::Total),
            ColumnSpec::new("Data Used (GB)", ColumnSource::DataVolume),
        ];
        profile
    }

    /// ConvaTec iPad：同 UK，资费固定，成本中心来自服务目录
    pub fn convatec_ipad() -> Self {
        let mut profile = Self::convatec_base("ConvaTec iPad", "Out of Bundle Spend");
        profile.columns = vec![
            ColumnSpec::new("Number", ColumnSource::Number),
            ColumnSpec::new("User", ColumnSource::User),
            ColumnSpec::new("Spare?", ColumnSource::Spare),
            ColumnSpec::new("Cost Centre", directory("cost_centre", "")),
            ColumnSpec::new("Company", ColumnSource::Department),
            ColumnSpec::new("Notes", ColumnSource::Literal { value: String::new() }),
            ColumnSpec::new("Start/End Date", directory("start_date", "")),
            ColumnSpec::new(
                "Tariff",
                ColumnSource::Literal {
                    value: "Convatec MBB 5GB Sharer".to_string(),
                },
            ),
            ColumnSpec::new("Line Rental", ColumnSource::Recurring),
            ColumnSpec::new("Out of Bundle Spend", bucket("Out of Bundle Spend")),
            ColumnSpec::new("Total Spend", ColumnSource::Total),
            ColumnSpec::new("Data Used (GB)", ColumnSource::DataVolume),
        ];
        profile
    }

    fn convatec_base(name: &str, charge_bucket: &str) -> Self {
        let roster = RosterSchema {
            usage_charge: Some(RosterCharge {
                column: "Usage Charges".to_string(),
                bucket: charge_bucket.to_string(),
            }),
            sort_records: true,
            ..RosterSchema::default()
        };

        let mut fields = IndexMap::new();
        fields.insert("tariff".to_string(), "TEMPLATE_NAME".to_string());
        fields.insert("start_date".to_string(), "CONTRACT_START_DATE".to_string());
        fields.insert("cost_centre".to_string(), "ADDITIONAL_FIELD_1".to_string());

        Self {
            name: name.to_string(),
            roster,
            usage: None,
            categories: IndexMap::new(),
            catch_all: None,
            buckets: vec![charge_bucket.to_string()],
            counters: Vec::new(),
            vat: false,
            data_volume: Some(DataVolumeSource::RosterColumn {
                column: "Data Usage".to_string(),
            }),
            directory: Some(DirectorySchema {
                key: "SERVICE_NO".to_string(),
                fields,
            }),
            detect_spare_lines: true,
            period_header: true,
            currency_symbol: default_currency_symbol(),
            columns: Vec::new(),
        }
    }

    /// 内置的全部客户配置
    pub fn builtin() -> Vec<Self> {
        vec![Self::islestar(), Self::tysers(), Self::convatec_uk(), Self::convatec_ipad()]
    }
}

fn mapping(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs
        .iter()
        .map(|(raw, bucket)| (raw.to_string(), bucket.to_string()))
        .collect()
}

fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn bucket(name: &str) -> ColumnSource {
    ColumnSource::Bucket {
        bucket: name.to_string(),
    }
}

fn counter(name: &str) -> ColumnSource {
    ColumnSource::Counter {
        counter: name.to_string(),
    }
}

fn directory(field: &str, default: &str) -> ColumnSource {
    ColumnSource::Directory {
        field: field.to_string(),
        default: default.to_string(),
    }
}

use csv::StringRecord;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ReportError;
use crate::models::{
    ClientProfile, DataVolumeSource, DirectorySchema, LineId, ServiceDirectory, SubscriberLine, UsageEvent,
    UsageSchema,
};
use crate::service::sanitize::Sanitizer;

/// 一次报表运行的输入文件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSources {
    /// 名册 (Service Breakdown)，可以有多个
    pub roster_files: Vec<PathBuf>,
    #[serde(default)]
    pub usage_file: Option<PathBuf>,
    /// 流量汇总
    #[serde(default)]
    pub data_usage_file: Option<PathBuf>,
    /// 服务目录，后面的文件覆盖前面的
    #[serde(default)]
    pub directory_files: Vec<PathBuf>,
}

/// 已加载、已清洗的输入
#[derive(Debug, Clone, Default)]
pub struct ReportData {
    pub roster: Vec<SubscriberLine>,
    pub usage: Vec<UsageEvent>,
    pub data_volumes: HashMap<LineId, String>,
    pub directory: ServiceDirectory,
}

/// 读入内存的 CSV 表
#[derive(Debug, Clone)]
pub struct CsvTable {
    path: PathBuf,
    role: &'static str,
    headers: Vec<String>,
    records: Vec<StringRecord>,
}

impl CsvTable {
    pub fn read(path: &Path, role: &'static str) -> Result<Self, ReportError> {
        if !path.is_file() {
            return Err(ReportError::MissingDataset {
                role,
                path: path.to_path_buf(),
            });
        }

        let csv_err = |source| ReportError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(csv_err)?;

        let headers = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let records = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(csv_err)?;

        tracing::info!("Loaded {} file {} (rows: {})", role, path.display(), records.len());

        Ok(Self {
            path: path.to_path_buf(),
            role,
            headers,
            records,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[StringRecord] {
        &self.records
    }

    /// 必需列：精确匹配，其次大小写无关匹配；找不到即致命错误
    pub fn require(&self, column: &str) -> Result<usize, ReportError> {
        self.position(column).ok_or_else(|| ReportError::MissingColumn {
            role: self.role,
            column: column.to_string(),
            path: self.path.clone(),
        })
    }

    /// 可选列：先按 require 的规则，再按候选词做大小写无关的包含匹配
    pub fn find(&self, column: &str, candidates: &[String]) -> Option<usize> {
        self.position(column).or_else(|| {
            candidates.iter().find_map(|candidate| {
                let needle = candidate.to_lowercase();
                self.headers.iter().position(|h| h.to_lowercase().contains(&needle))
            })
        })
    }

    fn position(&self, column: &str) -> Option<usize> {
        let column = column.trim();
        self.headers
            .iter()
            .position(|h| h == column)
            .or_else(|| self.headers.iter().position(|h| h.eq_ignore_ascii_case(column)))
    }

    /// 按全部字段字典序排序
    fn sort_records(&mut self) {
        self.records.sort_by(|a, b| a.iter().cmp(b.iter()));
    }
}

fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("")
}

fn optional_field(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    idx.map(|i| field(record, i).trim().to_string())
}

/// 按客户配置加载全部输入；任何缺失的必需文件或列都在组装前报错
pub fn load(profile: &ClientProfile, sources: &ReportSources, sanitizer: &mut Sanitizer) -> Result<ReportData, ReportError> {
    let roster = load_roster(profile, &sources.roster_files, sanitizer)?;

    // 声明了用量结构的客户都需要用量文件 (分类表可以为空，全部落入兜底桶)
    let usage = match &profile.usage {
        Some(schema) if profile.catch_all.is_some() => {
            let path = sources
                .usage_file
                .as_deref()
                .ok_or(ReportError::DatasetNotSupplied("usage"))?;
            load_usage(path, schema, sanitizer)?
        }
        _ => Vec::new(),
    };

    let data_volumes = match &profile.data_volume {
        Some(DataVolumeSource::Summary { key }) => {
            let path = sources
                .data_usage_file
                .as_deref()
                .ok_or(ReportError::DatasetNotSupplied("data usage"))?;
            load_data_volumes(path, key)?
        }
        _ => HashMap::new(),
    };

    let directory = match &profile.directory {
        Some(schema) => load_directory(&sources.directory_files, schema)?,
        None => ServiceDirectory::new(),
    };

    Ok(ReportData {
        roster,
        usage,
        data_volumes,
        directory,
    })
}

/// 加载名册；按传入顺序拼接，配置要求时每个文件先各自排序
pub fn load_roster(
    profile: &ClientProfile,
    paths: &[PathBuf],
    sanitizer: &mut Sanitizer,
) -> Result<Vec<SubscriberLine>, ReportError> {
    if paths.is_empty() {
        return Err(ReportError::DatasetNotSupplied("roster"));
    }

    let schema = &profile.roster;
    let mut lines = Vec::new();

    for path in paths {
        let mut table = CsvTable::read(path, "roster")?;
        if schema.sort_records {
            table.sort_records();
        }

        let department = table.require(&schema.department)?;
        let user = table.require(&schema.user)?;
        let number = table.require(&schema.number)?;
        let recurring = table.require(&schema.recurring)?;

        let charge_col = schema.usage_charge.as_ref().and_then(|c| table.find(&c.column, &[]));
        if let (Some(charge), None) = (&schema.usage_charge, charge_col) {
            tracing::warn!("roster {} has no '{}' column, usage charges treated as 0", path.display(), charge.column);
        }

        let volume_col = match &profile.data_volume {
            Some(DataVolumeSource::RosterColumn { column }) => table.find(column, &[]),
            _ => None,
        };

        let attribute_cols: Vec<(String, Option<usize>)> = schema
            .attributes
            .iter()
            .map(|a| (a.name.clone(), table.find(&a.name, &a.candidates)))
            .collect();

        for record in table.records() {
            let mut line = SubscriberLine::new(
                field(record, department),
                field(record, user),
                field(record, number),
                Default::default(),
            );
            let id = line.number.to_string();

            line.recurring = sanitizer.amount(&id, &schema.recurring, field(record, recurring));
            if let (Some(charge), Some(idx)) = (&schema.usage_charge, charge_col) {
                line.roster_charge = Some(sanitizer.amount(&id, &charge.column, field(record, idx)));
            }
            line.data_volume = optional_field(record, volume_col);
            line.attributes = attribute_cols
                .iter()
                .map(|(name, idx)| (name.clone(), optional_field(record, *idx).unwrap_or_default()))
                .collect();

            lines.push(line);
        }
    }

    Ok(lines)
}

pub fn load_usage(path: &Path, schema: &UsageSchema, sanitizer: &mut Sanitizer) -> Result<Vec<UsageEvent>, ReportError> {
    let table = CsvTable::read(path, "usage")?;
    let number = table.require(&schema.number)?;
    let category = table.require(&schema.category)?;
    let cost = table.require(&schema.cost)?;

    let events = table
        .records()
        .iter()
        .map(|record| {
            let id = LineId::normalize(field(record, number));
            let amount = sanitizer.amount(id.as_str(), &schema.cost, field(record, cost));
            UsageEvent {
                number: id,
                category: field(record, category).trim().to_string(),
                cost: amount,
            }
        })
        .collect();

    Ok(events)
}

/// 流量汇总：取号码列右侧紧邻的一列作为流量值
pub fn load_data_volumes(path: &Path, key: &str) -> Result<HashMap<LineId, String>, ReportError> {
    let table = CsvTable::read(path, "data usage")?;
    let key_idx = table.require(key)?;
    let value_idx = key_idx + 1;
    if value_idx >= table.headers().len() {
        return Err(ReportError::MissingColumn {
            role: "data usage",
            column: format!("<value column right of '{}'>", key),
            path: path.to_path_buf(),
        });
    }
    tracing::debug!("mapping data usage from column '{}'", table.headers()[value_idx]);

    Ok(table
        .records()
        .iter()
        .map(|record| {
            (
                LineId::normalize(field(record, key_idx)),
                field(record, value_idx).trim().to_string(),
            )
        })
        .collect())
}

pub fn load_directory(paths: &[PathBuf], schema: &DirectorySchema) -> Result<ServiceDirectory, ReportError> {
    let mut directory = ServiceDirectory::new();

    for path in paths {
        let table = CsvTable::read(path, "service directory")?;
        let key = table.require(&schema.key)?;
        let columns: Vec<(String, Option<usize>)> = schema
            .fields
            .iter()
            .map(|(field_name, column)| (field_name.clone(), table.find(column, &[])))
            .collect();

        for record in table.records() {
            let raw_key = field(record, key);
            if raw_key.trim().is_empty() {
                continue;
            }
            let fields: IndexMap<String, String> = columns
                .iter()
                .map(|(name, idx)| (name.clone(), optional_field(record, *idx).unwrap_or_default()))
                .collect();
            directory.insert(LineId::normalize(raw_key), fields);
        }
    }

    tracing::debug!("service directory holds {} lines", directory.len());
    Ok(directory)
}

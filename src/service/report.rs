use bigdecimal::{BigDecimal, Zero};
use chrono::{Local, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::ReportsConfig;
use crate::dataset::{self, ReportData, ReportSources};
use crate::error::ReportError;
use crate::models::{BillingPeriod, ClientProfile, ReportArtifact, ReportRun};
use crate::service::aggregate::{aggregate, LineAggregates};
use crate::service::assemble::{assemble, AssemblyInputs};
use crate::service::category::CategoryMap;
use crate::service::render::render;
use crate::service::sanitize::{RawAmount, Sanitizer};
use crate::service::tax::VatRatio;

/// 报表生成请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportRequest {
    pub client: String,
    #[serde(flatten)]
    pub sources: ReportSources,
    /// 整张账单的税前金额
    #[serde(default)]
    pub pre_tax_amount: Option<RawAmount>,
    /// 整张账单的税额
    #[serde(default)]
    pub total_tax_amount: Option<RawAmount>,
    /// 运行日期，缺省为今天
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct ProfilesFile {
    #[serde(default)]
    profiles: Vec<ClientProfile>,
}

/// 报表服务：客户配置注册表 + 通用流水线
pub struct ReportService {
    profiles: IndexMap<String, ClientProfile>,
    output_dir: PathBuf,
}

impl ReportService {
    /// 仅含内置客户配置
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let profiles = ClientProfile::builtin()
            .into_iter()
            .map(|p| (p.name.to_lowercase(), p))
            .collect();
        Self {
            profiles,
            output_dir: output_dir.into(),
        }
    }

    pub fn from_config(config: &ReportsConfig) -> Result<Self, ReportError> {
        let mut service = Self::new(&config.output_dir);
        if let Some(path) = &config.profiles_file {
            let text = std::fs::read_to_string(path).map_err(|_| ReportError::MissingDataset {
                role: "client profiles",
                path: path.clone(),
            })?;
            let count = service.load_profiles_toml(&text)?;
            tracing::info!("Loaded {} client profiles from {}", count, path.display());
        }
        Ok(service)
    }

    /// 注册 (或覆盖同名) 客户配置
    pub fn register(&mut self, profile: ClientProfile) -> Result<(), ReportError> {
        profile.validate()?;
        self.profiles.insert(profile.name.to_lowercase(), profile);
        Ok(())
    }

    /// 从 TOML 文本加载 [[profiles]]，返回加载数量
    pub fn load_profiles_toml(&mut self, text: &str) -> Result<usize, ReportError> {
        let file: ProfilesFile = toml::from_str(text).map_err(|e| ReportError::InvalidProfile(e.to_string()))?;
        let count = file.profiles.len();
        for profile in file.profiles {
            self.register(profile)?;
        }
        Ok(count)
    }

    pub fn profile(&self, client: &str) -> Result<&ClientProfile, ReportError> {
        self.profiles
            .get(&client.trim().to_lowercase())
            .ok_or_else(|| ReportError::UnknownClient(client.to_string()))
    }

    pub fn client_names(&self) -> Vec<&str> {
        self.profiles.values().map(|p| p.name.as_str()).collect()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 加载输入并完成全部计算，不写文件
    pub fn run(&self, request: &ReportRequest) -> Result<ReportRun, ReportError> {
        let profile = self.profile(&request.client)?;
        tracing::info!("Generating {} report", profile.name);

        // 1. 加载 (缺文件/缺列在此失败，尚未组装任何行)
        let mut sanitizer = Sanitizer::new();
        let data = dataset::load(profile, &request.sources, &mut sanitizer)?;

        // 2. 账单参考税额
        let pre_tax = request
            .pre_tax_amount
            .as_ref()
            .map(|raw| sanitizer.raw_amount("pre_tax_amount", raw))
            .unwrap_or_else(BigDecimal::zero);
        let total_tax = request
            .total_tax_amount
            .as_ref()
            .map(|raw| sanitizer.raw_amount("total_tax_amount", raw))
            .unwrap_or_else(BigDecimal::zero);

        let as_of = request.as_of.unwrap_or_else(|| Local::now().date_naive());
        let period = BillingPeriod::for_date(as_of);

        // 3. 计算
        Ok(build_report(profile, &data, &pre_tax, &total_tax, period, sanitizer))
    }

    /// 计算并写出报表，返回文件句柄
    pub fn generate(&self, request: &ReportRequest) -> Result<ReportArtifact, ReportError> {
        let run = self.run(request)?;
        let profile = self.profile(&request.client)?;

        let rendered = render(profile, &run);
        let path = dataset::report_path(&self.output_dir, &profile.name, &run.period);
        dataset::export_to_csv(&rendered, &path)?;

        if !run.warnings.is_empty() {
            tracing::warn!("{} report generated with {} field warnings", profile.name, run.warnings.len());
        }

        Ok(ReportArtifact { path, run })
    }
}

/// 纯计算流水线：归一 -> 汇总 -> 组装 -> 计税
pub fn build_report(
    profile: &ClientProfile,
    data: &ReportData,
    pre_tax: &BigDecimal,
    total_tax: &BigDecimal,
    period: BillingPeriod,
    mut sanitizer: Sanitizer,
) -> ReportRun {
    let aggregates = match CategoryMap::for_profile(profile) {
        Some(categories) => aggregate(&data.usage, &categories, &profile.counters),
        None => LineAggregates::default(),
    };

    let inputs = AssemblyInputs {
        roster: &data.roster,
        aggregates: &aggregates,
        data_volumes: &data.data_volumes,
        directory: &data.directory,
    };
    let mut rows = assemble(profile, inputs, &mut sanitizer);

    let vat_ratio = if profile.vat {
        let ratio = VatRatio::reconcile(pre_tax, total_tax);
        ratio.apply_all(&mut rows);
        Some(ratio.value().clone())
    } else {
        None
    };

    ReportRun {
        client: profile.name.clone(),
        period,
        vat_ratio,
        rows,
        warnings: sanitizer.into_warnings(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SubscriberLine, UsageEvent};
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn period() -> BillingPeriod {
        BillingPeriod::for_date(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
    }

    fn tysers_data() -> ReportData {
        ReportData {
            roster: vec![
                SubscriberLine::new("Ops", "Ann", "0770", dec("40.00")),
                SubscriberLine::new("Ops", "Bob", "0880", dec("10.00")),
            ],
            usage: vec![
                UsageEvent::new("0770", "Roam Call MO", dec("35.00")),
                UsageEvent::new("0770", "Data UK", dec("25.00")),
                UsageEvent::new("0990", "Data UK", dec("99.00")),
            ],
            ..ReportData::default()
        }
    }

    #[test]
    fn tysers_cascade() {
        let run = build_report(
            &ClientProfile::tysers(),
            &tysers_data(),
            &dec("1000"),
            &dec("200"),
            period(),
            Sanitizer::new(),
        );

        assert_eq!(run.rows.len(), 2);
        assert_eq!(run.vat_ratio, Some(dec("0.2")));
        let tax = run.rows[0].tax.as_ref().unwrap();
        assert_eq!(run.rows[0].usage_total, dec("60"));
        assert_eq!(tax.net, dec("100"));
        assert_eq!(tax.vat, dec("20"));
        assert_eq!(tax.gross, dec("120"));
        assert!(run.rows[1].no_usage);
    }

    #[test]
    fn non_vat_profile_has_no_tax() {
        let run = build_report(
            &ClientProfile::islestar(),
            &tysers_data(),
            &BigDecimal::zero(),
            &BigDecimal::zero(),
            period(),
            Sanitizer::new(),
        );
        assert!(run.vat_ratio.is_none());
        assert!(run.rows.iter().all(|r| r.tax.is_none()));
    }

    #[test]
    fn idempotent_runs() {
        let data = tysers_data();
        let profile = ClientProfile::tysers();
        let first = build_report(&profile, &data, &dec("500"), &dec("100"), period(), Sanitizer::new());
        let second = build_report(&profile, &data, &dec("500"), &dec("100"), period(), Sanitizer::new());
        assert_eq!(first, second);
        assert_eq!(render(&profile, &first), render(&profile, &second));
    }

    #[test]
    fn unknown_client() {
        let service = ReportService::new("/tmp");
        assert!(matches!(service.profile("Acme"), Err(ReportError::UnknownClient(_))));
        assert_eq!(service.profile("  tysers ").unwrap().name, "Tysers");
    }

    #[test]
    fn register_profiles_from_toml() {
        let mut service = ReportService::new("/tmp");
        let text = r#"
            [[profiles]]
            name = "Acme"
            buckets = ["Calls", "Misc"]
            catch_all = "Misc"
            columns = [
                { header = "Number", kind = "number" },
                { header = "Total", kind = "total" },
            ]

            [profiles.roster]

            [profiles.usage]

            [profiles.categories]
            "Call MO" = "Calls"
        "#;
        assert_eq!(service.load_profiles_toml(text).unwrap(), 1);
        assert!(service.client_names().contains(&"Acme"));

        let broken = r#"
            [[profiles]]
            name = "Broken"
            buckets = ["Calls"]
            catch_all = "Nowhere"
            columns = []

            [profiles.roster]

            [profiles.usage]

            [profiles.categories]
            "Call MO" = "Calls"
        "#;
        assert!(matches!(
            service.load_profiles_toml(broken),
            Err(ReportError::InvalidProfile(_))
        ));
    }
}

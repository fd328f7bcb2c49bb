use std::collections::HashMap;

use crate::models::ClientProfile;

/// 分类归一：原始用量分类 -> 计费桶
///
/// 精确匹配 (仅去首尾空白)，不做模糊匹配；未识别或缺失的分类
/// 一律落入兜底桶，因此对任意输入都有结果。
#[derive(Debug, Clone)]
pub struct CategoryMap {
    table: HashMap<String, String>,
    catch_all: String,
}

impl CategoryMap {
    pub fn new<I>(pairs: I, catch_all: &str) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let table = pairs
            .into_iter()
            .map(|(raw, bucket)| (raw.trim().to_string(), bucket))
            .collect();
        Self {
            table,
            catch_all: catch_all.to_string(),
        }
    }

    /// 无分类映射的配置 (名册自带费用) 返回 None
    pub fn for_profile(profile: &ClientProfile) -> Option<Self> {
        let catch_all = profile.catch_all.as_deref()?;
        Some(Self::new(profile.categories.clone(), catch_all))
    }

    pub fn normalize(&self, raw: Option<&str>) -> &str {
        raw.and_then(|label| self.table.get(label.trim()))
            .map(String::as_str)
            .unwrap_or(&self.catch_all)
    }

    pub fn catch_all(&self) -> &str {
        &self.catch_all
    }

    pub fn is_known(&self, raw: &str) -> bool {
        self.table.contains_key(raw.trim())
    }
}

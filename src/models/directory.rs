use indexmap::IndexMap;
use std::collections::HashMap;

use super::LineId;

/// 服务目录：线路 -> 静态属性 (资费、合同开始日期、成本中心)
///
/// 只用于输出列，不覆盖任何计算值。
#[derive(Debug, Clone, Default)]
pub struct ServiceDirectory {
    entries: HashMap<LineId, IndexMap<String, String>>,
}

impl ServiceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 后插入的同号码记录覆盖先前的
    pub fn insert(&mut self, line: LineId, fields: IndexMap<String, String>) {
        self.entries.insert(line, fields);
    }

    pub fn get(&self, line: &LineId) -> Option<&IndexMap<String, String>> {
        self.entries.get(line)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

use std::path::PathBuf;
use thiserror::Error;

/// 报表生成的致命错误
///
/// 只有输入结构无法确定时才会返回错误；金额解析失败、未知分类、
/// 无法匹配的用量记录都在本地降级处理，不会出现在这里。
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("unknown client report type: {0}")]
    UnknownClient(String),

    #[error("no {0} dataset supplied")]
    DatasetNotSupplied(&'static str),

    #[error("missing {role} dataset: expected file at {}", path.display())]
    MissingDataset { role: &'static str, path: PathBuf },

    #[error("{role} file {}: missing required column '{column}'", path.display())]
    MissingColumn {
        role: &'static str,
        column: String,
        path: PathBuf,
    },

    #[error("invalid client profile: {0}")]
    InvalidProfile(String),

    #[error("csv error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReportError {
    /// 是否由调用方输入引起 (用于 HTTP 状态码映射)
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownClient(_)
                | Self::DatasetNotSupplied(_)
                | Self::MissingDataset { .. }
                | Self::MissingColumn { .. }
                | Self::InvalidProfile(_)
        )
    }
}

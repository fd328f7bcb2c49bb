use crate::api::AppState;
use crate::error::ReportError;
use crate::models::FieldWarning;
use crate::service::ReportRequest;
use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::path::PathBuf;

/// 会话标识请求头
pub const SESSION_HEADER: &str = "x-session-id";

/// 报表生成响应体
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub success: bool,
    pub message: String,
    pub report_path: Option<PathBuf>,
    pub row_count: usize,
    pub vat_ratio: Option<String>,
    pub warnings: Vec<FieldWarning>,
}

impl ReportResponse {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            message,
            report_path: None,
            row_count: 0,
            vat_ratio: None,
            warnings: Vec::new(),
        }
    }
}

/// 最近报表响应体
#[derive(Debug, Serialize)]
pub struct LastReportResponse {
    pub success: bool,
    pub message: String,
    pub report_path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct ClientsResponse {
    pub clients: Vec<String>,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 可用客户列表
pub async fn list_clients(State(state): State<AppState>) -> Json<ClientsResponse> {
    let clients = state.reports.client_names().into_iter().map(String::from).collect();
    Json(ClientsResponse { clients })
}

fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// 生成报表
pub async fn generate_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ReportRequest>,
) -> Response {
    let client = req.client.clone();
    let service = state.reports.clone();

    // 纯 CPU + 同步文件读写
    let result = tokio::task::spawn_blocking(move || service.generate(&req)).await;

    match result {
        Ok(Ok(artifact)) => {
            if let Some(session) = session_id(&headers) {
                state.sessions.remember(&session, artifact.path.clone());
            }

            let row_count = artifact.run.rows.len();
            let response = ReportResponse {
                success: true,
                message: format!(
                    "Generated {} report with {} rows, {} warnings",
                    artifact.run.client,
                    row_count,
                    artifact.run.warnings.len()
                ),
                report_path: Some(artifact.path),
                row_count,
                vat_ratio: artifact.run.vat_ratio.map(|r| r.to_string()),
                warnings: artifact.run.warnings,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(Err(e)) => {
            tracing::error!("{} report failed: {}", client, e);
            let status = error_status(&e);
            (status, Json(ReportResponse::failure(format!("Error: {}", e)))).into_response()
        }
        Err(e) => {
            tracing::error!("{} report task aborted: {}", client, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ReportResponse::failure("Error: report task aborted".to_string())),
            )
                .into_response()
        }
    }
}

/// 当前会话最近生成的报表
pub async fn last_report(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(session) = session_id(&headers) else {
        let response = LastReportResponse {
            success: false,
            message: format!("Missing {} header", SESSION_HEADER),
            report_path: None,
        };
        return (StatusCode::BAD_REQUEST, Json(response)).into_response();
    };

    match state.sessions.last(&session) {
        Some(path) if path.exists() => {
            let response = LastReportResponse {
                success: true,
                message: "Last report found".to_string(),
                report_path: Some(path),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        _ => {
            let response = LastReportResponse {
                success: false,
                message: "No report found".to_string(),
                report_path: None,
            };
            (StatusCode::NOT_FOUND, Json(response)).into_response()
        }
    }
}

fn error_status(err: &ReportError) -> StatusCode {
    if err.is_input_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

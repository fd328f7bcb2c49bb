use bill_run_rust::{api, AppConfig, ReportService};
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);

    // 创建报表服务 (内置客户 + 可选的配置文件)
    let reports = ReportService::from_config(&config.reports)?;
    info!("Client profiles: {}", reports.client_names().join(", "));

    let app = api::router(api::AppState::new(reports));

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  GET  /api/clients       - available client report types");
    info!("  POST /api/reports       - generate a bill run report");
    info!("  GET  /api/reports/last  - last report of the calling session");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

use mock_service::{run, tps_measure_task, MockConfig};
use std::net::SocketAddr;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter("mock_service=debug,tower_http=info")
        .init();

    tokio::task::spawn(async { tps_measure_task().await });

    let config = MockConfig {
        namespaces: vec!["default".to_string(), "kube-system".to_string()],
        buckets: vec!["stresser-results".to_string()],
        ..MockConfig::default()
    };
    let addr: SocketAddr = "0.0.0.0:3002".parse()?;
    run(addr, config).await
}

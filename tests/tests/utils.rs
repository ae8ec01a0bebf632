use mock_service::{MockConfig, MockState};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use stresser::LoadRunConfig;
use stresser_core::{OutputLocations, RemoteDirs};
use stresser_runtime::HttpClusterClient;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
            std::process::exit(1);
        }));

        FmtSubscriber::builder()
            .with_env_filter("stresser=debug,stresser_runtime=debug,mock_service=debug")
            .init();
    });
}

/// A mock control plane on an ephemeral port plus a client pointed at it.
#[allow(unused)]
pub async fn mock_cluster(
    config: MockConfig,
) -> anyhow::Result<(SocketAddr, Arc<MockState>, Arc<HttpClusterClient>)> {
    let (addr, state) = mock_service::spawn(config).await?;
    let client = HttpClusterClient::new(&format!("http://{addr}"), Duration::from_secs(5))?;
    Ok((addr, state, Arc::new(client)))
}

/// Config writing artifacts under `dir` that runs for `duration`.
#[allow(unused)]
pub fn run_config(dir: &std::path::Path, duration: Duration) -> LoadRunConfig {
    let base = LoadRunConfig::default();
    let outputs =
        OutputLocations::generate(dir, "it", "it", &base.run_suffix, &RemoteDirs::default());
    LoadRunConfig { outputs, ..base }.with_duration(duration)
}

use std::process::ExitCode;
use stresser::sink::render_table;
use stresser_runtime::{env_filter, StresserRuntime};
use tracing::error;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> ExitCode {
    FmtSubscriber::builder()
        .with_env_filter(env_filter())
        .init();

    match StresserRuntime::new().with_args().run().await {
        Ok(report) => {
            println!("{}", render_table(&report.metrics.writes.summary));
            println!("{}", render_table(&report.metrics.reads.summary));
            for path in &report.sink.written {
                println!("wrote {}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

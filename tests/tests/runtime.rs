mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;

    use clap::Parser;
    use mock_service::MockConfig;
    use stresser::StopTrigger;
    use stresser_runtime::{StresserArgs, StresserRuntime};

    fn args(flags: &[&str]) -> StresserArgs {
        StresserArgs::parse_from(std::iter::once("stresser").chain(flags.iter().copied()))
    }

    fn remote_dir_flags() -> Vec<&'static str> {
        vec![
            "--writes-raw-json-remote-dir",
            "runs",
            "--writes-summary-json-remote-dir",
            "runs",
            "--writes-summary-table-remote-dir",
            "runs",
            "--reads-raw-json-remote-dir",
            "runs",
            "--reads-summary-json-remote-dir",
            "runs",
            "--reads-summary-table-remote-dir",
            "runs",
        ]
    }

    #[tokio::test]
    #[ntest::timeout(15_000)]
    async fn full_run_uploads_every_artifact() {
        init();
        let config = MockConfig {
            buckets: vec!["results".to_string()],
            ..MockConfig::default()
        };
        let (addr, state) = mock_service::spawn(config).await.unwrap();
        let out = tempfile::tempdir().unwrap();

        let api_server = format!("http://{addr}");
        let store_url = format!("http://{addr}/store");
        let mut flags = vec![
            "--api-server",
            api_server.as_str(),
            "--object-size",
            "32",
            "--duration",
            "1s",
            "--output-dir",
            out.path().to_str().unwrap(),
            "--store-url",
            store_url.as_str(),
            "--bucket",
            "results",
        ];
        flags.extend(remote_dir_flags());

        let report = StresserRuntime::new()
            .args(args(&flags))
            .run()
            .await
            .unwrap();

        assert_eq!(report.metrics.trigger, Some(StopTrigger::Deadline));
        assert_eq!(report.sink.written.len(), 6);
        assert_eq!(report.sink.uploaded.len(), 6);
        for key in &report.sink.uploaded {
            let uploaded = state.upload("results", key).unwrap();
            assert!(!uploaded.is_empty());
        }

        let summary_key = report
            .sink
            .uploaded
            .iter()
            .find(|key| key.ends_with("-writes-summary.json"))
            .unwrap();
        let summary: serde_json::Value =
            serde_json::from_slice(&state.upload("results", summary_key).unwrap()).unwrap();
        assert_eq!(
            summary["total"].as_u64().unwrap(),
            report.metrics.writes.summary.total
        );
    }

    #[tokio::test]
    #[ntest::timeout(15_000)]
    async fn failed_uploads_keep_local_results() {
        init();
        let (addr, _state) = mock_service::spawn(MockConfig::default()).await.unwrap();
        let out = tempfile::tempdir().unwrap();

        let api_server = format!("http://{addr}");
        let store_url = format!("http://{addr}/store");
        let mut flags = vec![
            "--api-server",
            api_server.as_str(),
            "--duration",
            "500ms",
            "--output-dir",
            out.path().to_str().unwrap(),
            "--store-url",
            store_url.as_str(),
            "--bucket",
            "missing",
        ];
        flags.extend(remote_dir_flags());

        let report = StresserRuntime::new()
            .args(args(&flags))
            .run()
            .await
            .unwrap();

        assert!(!report.sink.fully_uploaded());
        assert_eq!(report.sink.failed_uploads.len(), 6);
        for path in &report.sink.written {
            assert!(path.exists(), "{}", path.display());
        }
    }
}

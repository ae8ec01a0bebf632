mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;

    use mock_service::MockConfig;
    use std::num::NonZeroU32;
    use std::time::Duration;
    use stresser::prelude::*;
    use stresser::ErrorClass;

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn writes_land_in_the_cluster() {
        init();
        let (_addr, state, client) = mock_cluster(MockConfig::default()).await.unwrap();
        let dir = tempfile::tempdir().unwrap();

        let config = LoadRunConfig {
            clients: 2,
            client_qps: 20.0,
            client_burst: 1,
            object_size: 64,
            ..run_config(dir.path(), Duration::from_secs(1))
        };
        let mut driver = LoadDriver::new(config, client, StopSignal::new());
        driver.start().unwrap();
        driver.finished().await;
        driver.stop().await;

        let metrics = driver.collect_metrics().unwrap();
        assert_eq!(metrics.trigger, Some(StopTrigger::Deadline));

        let writes = &metrics.writes.summary;
        assert_eq!(writes.failed, 0);
        // 2 clients * 20 QPS * 1s, plus one token each up front.
        assert!(writes.succeeded >= 30, "{}", writes.succeeded);
        assert!(writes.succeeded <= 44, "{}", writes.succeeded);

        let names = metrics.created_names();
        assert_eq!(names.len() as u64, writes.succeeded);
        assert_eq!(state.object_count("default"), names.len());
        for name in &names {
            assert_eq!(state.object_size("default", name), Some(64));
        }
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn reads_cover_every_namespace() {
        init();
        let config = MockConfig {
            namespaces: vec!["a".to_string(), "b".to_string()],
            page_size: 2,
            ..MockConfig::default()
        };
        let (_addr, state, client) = mock_cluster(config).await.unwrap();
        for i in 0..5 {
            state.seed("a", &format!("obj-{i}"), 1);
        }
        let dir = tempfile::tempdir().unwrap();

        let config = LoadRunConfig {
            clients: 1,
            namespaces_read: vec!["a".to_string(), "b".to_string()],
            list_limit: 0,
            ..run_config(dir.path(), Duration::from_millis(500))
        };
        let mut driver = LoadDriver::new(config, client, StopSignal::new());
        driver.start().unwrap();
        driver.finished().await;
        driver.stop().await;

        let metrics = driver.collect_metrics().unwrap();
        assert_eq!(metrics.writes.summary.total, 0);
        let reads = &metrics.reads;
        assert!(reads.summary.total >= 2);
        assert_eq!(reads.summary.failed, 0);
        assert!(reads.outcomes.iter().any(|o| o.namespace == "a"));
        assert!(reads.outcomes.iter().any(|o| o.namespace == "b"));
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn throttling_is_recorded_not_fatal() {
        init();
        let config = MockConfig {
            max_tps: NonZeroU32::new(5),
            ..MockConfig::default()
        };
        let (_addr, _state, client) = mock_cluster(config).await.unwrap();
        let dir = tempfile::tempdir().unwrap();

        let config = LoadRunConfig {
            clients: 2,
            client_qps: 50.0,
            object_size: 8,
            ..run_config(dir.path(), Duration::from_secs(1))
        };
        let mut driver = LoadDriver::new(config, client, StopSignal::new());
        driver.start().unwrap();
        driver.finished().await;
        driver.stop().await;

        let metrics = driver.collect_metrics().unwrap();
        let throttled: u64 = [&metrics.writes.summary, &metrics.reads.summary]
            .iter()
            .map(|s| s.error_breakdown.get(&ErrorClass::Throttled).copied().unwrap_or(0))
            .sum();
        assert!(throttled > 0);
        for summary in [&metrics.writes.summary, &metrics.reads.summary] {
            assert_eq!(summary.total, summary.succeeded + summary.failed);
        }
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn external_signal_ends_the_run_early() {
        init();
        let (_addr, _state, client) = mock_cluster(MockConfig::default()).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let stop = StopSignal::new();

        let config = LoadRunConfig {
            object_size: 8,
            ..run_config(dir.path(), Duration::from_secs(60))
        };
        let mut driver = LoadDriver::new(config, client, stop.clone());
        driver.start().unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        stop.raise();
        driver.finished().await;
        driver.stop().await;

        let metrics = driver.collect_metrics().unwrap();
        assert_eq!(metrics.trigger, Some(StopTrigger::Signal));
        assert!(metrics.time_frame.took().unwrap() < Duration::from_secs(5));

        let report = ResultSink::new(driver.config().outputs.clone())
            .persist(&metrics)
            .await
            .unwrap();
        assert_eq!(report.written.len(), 6);
        let raw = std::fs::read_to_string(&driver.config().outputs.writes_raw_json.local_path)
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            parsed.as_array().unwrap().len(),
            metrics.writes.outcomes.len()
        );
    }
}

//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 端到端测试：合成视频源 + 内存传输（无需 broker）

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{QosLevel, SourceConfig, TransportKind};

    /// 文档中的完整配置示例必须能被解析
    const FULL_CONFIG: &str = r#"
[transport]
kind = "mqtt"
host = "localhost"
port = 1883
client_id = "adaptive-streamer"
keepalive_secs = 60
max_inflight = 20
max_payload_bytes = 10485760
qos = "at_most_once"

[video]
topic = "test"
width = 1280
height = 720
jpeg_quality = 95
buffer_capacity = 2

[video.source]
kind = "image_sequence"
path = "frames/"
fps = 25.0
loop_playback = false

[rate]
min_hz = 5.0
max_hz = 30.0
step_hz = 1.0
window_size = 10
backoff_below = 0.8
speedup_above = 0.9

[telemetry]
topic = "drone/gps"
interval_ms = 1000
seed_latitude = 28.604537463058893
seed_longitude = 77.36896549554069
altitude = 100.0
drift_per_tick = 0.00025
"#;

    #[test]
    fn test_full_config_parses() {
        let blueprint = ConfigLoader::load_from_str(FULL_CONFIG, ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.transport.kind, TransportKind::Mqtt);
        assert_eq!(blueprint.transport.qos, QosLevel::AtMostOnce);
        assert_eq!(blueprint.video.buffer_capacity, 2);
        assert!(matches!(
            blueprint.video.source,
            SourceConfig::ImageSequence { fps, .. } if fps == 25.0
        ));
        assert_eq!(blueprint.rate.window_size, 10);
        assert_eq!(blueprint.telemetry.interval_ms, 1000);
    }

    #[test]
    fn test_effective_config_round_trips() {
        let blueprint = ConfigLoader::load_from_str(FULL_CONFIG, ConfigFormat::Toml).unwrap();
        let toml = ConfigLoader::to_toml(&blueprint).unwrap();
        let reparsed = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(reparsed.video.source, blueprint.video.source);
        assert_eq!(reparsed.rate, blueprint.rate);
        assert_eq!(reparsed.telemetry, blueprint.telemetry);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use capture::{frame_buffer, CaptureExit, CaptureLoop, CaptureMetrics, SyntheticSource};
    use contracts::{
        ConnectOptions, FrameSource, RateConfig, Resolution, TelemetryConfig, TelemetryReport,
        Transport,
    };
    use publisher::transports::{AckPolicy, MemoryTransport};
    use publisher::{
        ConnectionSupervisor, JpegEncoder, PublishExit, PublishLoop, PublisherMetrics,
        TelemetryGenerator, TelemetryLoop,
    };
    use rate_control::{pacing_channel, PacingReceiver, RateController, RateWindow};
    use tokio::task::JoinHandle;
    use tokio_util::sync::CancellationToken;

    const VIDEO_TOPIC: &str = "test";
    const GPS_TOPIC: &str = "drone/gps";

    /// Fully wired streamer on top of an in-memory transport
    struct Rig {
        transport: Arc<MemoryTransport>,
        metrics: Arc<PublisherMetrics>,
        capture_metrics: Arc<CaptureMetrics>,
        pacing: PacingReceiver,
        cancel: CancellationToken,
        capture: JoinHandle<CaptureExit>,
        publish: JoinHandle<publisher::PublishSummary>,
        telemetry: JoinHandle<u64>,
        supervisor: JoinHandle<()>,
    }

    async fn start(
        transport: MemoryTransport,
        source: SyntheticSource,
        buffer_capacity: usize,
        telemetry_interval_ms: u64,
    ) -> Rig {
        let transport = Arc::new(transport);
        let window = Arc::new(RateWindow::new(10));
        let metrics = Arc::new(PublisherMetrics::new());
        let supervisor = ConnectionSupervisor::attach(
            transport.clone(),
            VIDEO_TOPIC,
            window.clone(),
            metrics.clone(),
        );
        transport.connect(&ConnectOptions::default()).await.unwrap();

        let (pacing_tx, pacing) = pacing_channel(source.nominal_rate_hz());
        let controller = RateController::new(RateConfig::default(), pacing_tx);
        let (writer, reader) = frame_buffer(buffer_capacity);
        let capture_metrics = Arc::new(CaptureMetrics::new());

        let capture = CaptureLoop::new(source, writer, pacing.clone(), Resolution::new(32, 24))
            .with_metrics(capture_metrics.clone());
        let publish = PublishLoop::new(
            transport.clone(),
            JpegEncoder::default(),
            reader,
            VIDEO_TOPIC,
            window,
            controller,
            metrics.clone(),
        );
        let telemetry_config = TelemetryConfig {
            interval_ms: telemetry_interval_ms,
            ..Default::default()
        };
        let telemetry = TelemetryLoop::new(transport.clone(), &telemetry_config, metrics.clone());

        let cancel = CancellationToken::new();
        Rig {
            transport,
            metrics,
            capture_metrics,
            pacing,
            capture: tokio::spawn(capture.run(cancel.clone())),
            publish: tokio::spawn(publish.run(cancel.clone())),
            telemetry: tokio::spawn(telemetry.run(cancel.clone())),
            supervisor: tokio::spawn(supervisor.run(cancel.clone())),
            cancel,
        }
    }

    impl Rig {
        async fn stop(self) -> (CaptureExit, publisher::PublishSummary, u64) {
            self.cancel.cancel();
            let capture = self.capture.await.unwrap();
            let publish = self.publish.await.unwrap();
            let ticks = self.telemetry.await.unwrap();
            self.supervisor.await.unwrap();
            (capture, publish, ticks)
        }
    }

    /// 10 帧、10 Hz、每 10 个确认中 2 个失败：成功率 0.8 落在死区，速率保持 10
    #[tokio::test]
    async fn test_two_failures_per_window_hold_rate() {
        let transport = MemoryTransport::new().with_topic_policy(
            VIDEO_TOPIC,
            AckPolicy::FailEvery {
                period: 10,
                failures: 2,
            },
        );
        let source = SyntheticSource::new(64, 48, 10.0).with_max_frames(10);
        let rig = start(transport, source, 16, 1000).await;

        let summary = tokio::time::timeout(Duration::from_secs(5), rig.publish)
            .await
            .expect("publish loop did not finish")
            .unwrap();

        assert_eq!(summary.exit, PublishExit::SourceEnded);
        assert_eq!(summary.stats.windows_closed, 1);
        assert_eq!(summary.final_rate_hz, 10.0);
        assert_eq!(rig.pacing.rate_hz(), 10.0);
        let snapshot = rig.metrics.snapshot();
        assert_eq!(snapshot.acks_succeeded, 8);
        assert_eq!(snapshot.acks_failed, 2);

        rig.cancel.cancel();
        assert!(matches!(
            rig.capture.await.unwrap(),
            CaptureExit::SourceExhausted
        ));
        rig.telemetry.await.unwrap();
        rig.supervisor.await.unwrap();
    }

    /// 视频源在第 5 帧后结束：采集停止、缓冲排空、发布循环以 SourceEnded 结束
    #[tokio::test]
    async fn test_source_end_drains_buffer() {
        let source = SyntheticSource::new(64, 48, 30.0).with_max_frames(5);
        let rig = start(MemoryTransport::new(), source, 2, 1000).await;

        let summary = tokio::time::timeout(Duration::from_secs(5), rig.publish)
            .await
            .expect("publish loop did not finish")
            .unwrap();
        let capture_exit = rig.capture.await.unwrap();

        assert!(matches!(capture_exit, CaptureExit::SourceExhausted));
        assert_eq!(summary.exit, PublishExit::SourceEnded);

        let captured = rig.capture_metrics.snapshot();
        assert_eq!(captured.frames_captured, 5);
        let published = rig.transport.published_on(VIDEO_TOPIC);
        assert_eq!(published.len() as u64 + captured.frames_evicted, 5);

        // Published frames keep capture order and are real JPEGs at the target size
        let mut last_id = None;
        for message in &published {
            assert_eq!(&message.payload[..2], &[0xFF, 0xD8]);
            assert!(last_id.map_or(true, |id| message.message_id > id));
            last_id = Some(message.message_id);
        }

        rig.cancel.cancel();
        rig.telemetry.await.unwrap();
        rig.supervisor.await.unwrap();
    }

    /// 断线期间遥测照常计时，重连一次后继续发布
    #[tokio::test]
    async fn test_telemetry_survives_connection_loss() {
        let source = SyntheticSource::new(64, 48, 20.0);
        let rig = start(MemoryTransport::new(), source, 2, 20).await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        rig.transport.refuse_reconnect(true);
        rig.transport.simulate_connection_lost("broker restarted");
        tokio::time::sleep(Duration::from_millis(100)).await;

        // The single reconnect attempt failed; nothing retries it
        assert!(!rig.transport.is_connected());
        assert_eq!(rig.metrics.snapshot().reconnect_failures, 1);
        rig.transport.refuse_reconnect(false);
        rig.transport.simulate_connection_lost("second outage");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rig.transport.is_connected());
        assert_eq!(rig.transport.reconnect_count(), 1);

        let transport = rig.transport.clone();
        let metrics = rig.metrics.clone();
        let (_, publish, ticks) = rig.stop().await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connection_losses, 2);
        assert_eq!(snapshot.reconnects, 1);
        assert!(snapshot.telemetry_failed >= 1);
        assert_eq!(snapshot.telemetry_published + snapshot.telemetry_failed, ticks);
        assert!(publish.stats.total_rejected >= 1);

        // Ticks kept counting through the outage
        let gps = transport.published_on(GPS_TOPIC);
        let last: TelemetryReport =
            serde_json::from_slice(&gps[gps.len() - 1].payload).unwrap();
        let generator = TelemetryGenerator::new(&TelemetryConfig::default());
        assert_eq!(last, generator.report_at(ticks));
    }

    /// 全部确认失败：每个窗口降速 1 Hz，但不低于下限
    #[tokio::test]
    async fn test_persistent_failures_back_off() {
        let transport = MemoryTransport::new().with_topic_policy(
            VIDEO_TOPIC,
            AckPolicy::FailEvery {
                period: 1,
                failures: 1,
            },
        );
        let source = SyntheticSource::new(64, 48, 30.0).with_max_frames(30);
        let rig = start(transport, source, 64, 1000).await;

        let summary = tokio::time::timeout(Duration::from_secs(10), rig.publish)
            .await
            .expect("publish loop did not finish")
            .unwrap();

        assert_eq!(summary.stats.windows_closed, 3);
        assert_eq!(summary.stats.decreases, 3);
        assert_eq!(summary.final_rate_hz, 27.0);
        assert_eq!(rig.metrics.snapshot().acks_succeeded, 0);

        rig.cancel.cancel();
        rig.capture.await.unwrap();
        rig.telemetry.await.unwrap();
        rig.supervisor.await.unwrap();
    }
}

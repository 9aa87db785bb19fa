//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置加载到分发器构建的衔接
//! - 端到端测试：就绪等待 → 事件源 → 分发器 → sinks

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_blueprint_survives_toml_round_trip() {
        let content = r#"
[dispatcher]
workers = 3
max_attempts = 4

[[sinks]]
name = "console"
sink_type = "log"
"#;
        let blueprint = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap();
        let rendered = ConfigLoader::to_toml(&blueprint).unwrap();
        let reloaded = ConfigLoader::load_from_str(&rendered, ConfigFormat::Toml).unwrap();

        assert_eq!(reloaded.dispatcher.workers, 3);
        assert_eq!(reloaded.dispatcher.max_attempts, 4);
        assert_eq!(reloaded.sinks.len(), 1);
        assert_eq!(reloaded.version, contracts::ConfigVersion::V1);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::path::Path;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ContractError, DeliveryStatus, NotifierBlueprint};
    use dispatcher::{create_dispatcher, CancellationToken};
    use ingestion::{channel, LinesSource};
    use serde_json::{json, Value};
    use tempfile::tempdir;
    use tokio::net::TcpListener;

    fn read_json_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn load(content: &str) -> NotifierBlueprint {
        ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap()
    }

    /// Readiness gate → channel source → dispatcher → file sink
    ///
    /// 验证完整的数据流：
    /// 1. 依赖端口可连接后才开始分发
    /// 2. 每个事件在 file sink 中恰好出现一次
    #[tokio::test]
    async fn test_e2e_gate_then_dispatch_to_file() {
        let dependency = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = dependency.local_addr().unwrap().port();
        let dir = tempdir().unwrap();
        let out = dir.path().join("events.jsonl");

        let blueprint = load(&format!(
            r#"
[readiness]
deadline_secs = 5
retry_interval_ms = 50

[[readiness.endpoints]]
host = "127.0.0.1"
port = {port}

[dispatcher]
workers = 2
max_attempts = 3

[[sinks]]
name = "archive"
sink_type = "file"
params = {{ path = '{}' }}

[[sinks]]
name = "console"
sink_type = "log"
"#,
            out.display()
        ));

        let readiness = readiness::wait_for_dependencies(&blueprint.readiness)
            .await
            .unwrap();
        assert_eq!(readiness.endpoints.len(), 1);
        assert_eq!(readiness.endpoints[0].endpoint.port(), port);

        let dispatcher = create_dispatcher(&blueprint).await.unwrap();
        let (publisher, source) = channel("inbox", 16);

        let producer = tokio::spawn(async move {
            for i in 0..10 {
                publisher
                    .publish_payload(format!("evt-{i}"), format!(r#"{{"n":{i}}}"#))
                    .await
                    .unwrap();
            }
            // Dropping the publisher closes the source
        });

        let report = dispatcher
            .run(source, CancellationToken::new())
            .await
            .unwrap();
        producer.await.unwrap();

        assert!(report.is_clean());
        assert!(!report.cancelled);
        assert_eq!(report.events_received, 10);
        assert_eq!(report.delivered, 20);

        let lines = read_json_lines(&out);
        assert_eq!(lines.len(), 10);
        for i in 0..10 {
            let id = format!("evt-{i}");
            assert_eq!(lines.iter().filter(|l| l["id"] == id.as_str()).count(), 1);
        }
        assert_eq!(lines[0]["attempts"], 1);
    }

    #[tokio::test]
    async fn test_e2e_gate_deadline_stops_before_dispatch() {
        // Reserve a port, then free it so nothing listens there
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let blueprint = load(&format!(
            r#"
[readiness]
deadline_secs = 1
retry_interval_ms = 100

[[readiness.endpoints]]
host = "127.0.0.1"
port = {port}
timeout_ms = 200
"#
        ));

        let err = readiness::wait_for_dependencies(&blueprint.readiness)
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::ReadinessDeadline { .. }));
    }

    /// Notification sinks receive rendered notifications, raw sinks the envelope
    #[tokio::test]
    async fn test_e2e_rules_render_notifications() {
        let dir = tempdir().unwrap();
        let raw_out = dir.path().join("raw.jsonl");
        let mail_out = dir.path().join("mail.jsonl");

        let blueprint = load(&format!(
            r#"
[[sinks]]
name = "raw"
sink_type = "file"
params = {{ path = '{}' }}

[[sinks]]
name = "mail"
sink_type = "file"
format = "notification"
params = {{ path = '{}' }}

[rules]
from_address = "notifier@example.org"

[rules.contact]
hmdmc_verify = "hmdmc@example.org"
dev_team = "dev@example.org"

[rules.link]
root = "aker.example.org"
port = 3000
"#,
            raw_out.display(),
            mail_out.display()
        ));

        let dispatcher = create_dispatcher(&blueprint).await.unwrap();
        let (publisher, source) = channel("inbox", 4);

        let manifest = json!({
            "event_type": "aker.events.manifest.created",
            "timestamp": "2018-01-01T10:00:00Z",
            "user_identifier": "owner@example.org",
            "metadata": { "manifest_id": 42, "hmdmc": ["12/345"] },
            "notifier_info": {}
        });
        let unrouted = json!({ "event_type": "aker.events.something.else" });

        publisher
            .publish_payload("manifest-42", manifest.to_string())
            .await
            .unwrap();
        publisher
            .publish_payload("other-1", unrouted.to_string())
            .await
            .unwrap();
        drop(publisher);

        let report = dispatcher
            .run(source, CancellationToken::new())
            .await
            .unwrap();
        assert!(report.is_clean());
        assert_eq!(report.delivered, 4);

        assert_eq!(read_json_lines(&raw_out).len(), 2);

        let mails = read_json_lines(&mail_out);
        assert_eq!(mails.len(), 2);
        assert_eq!(mails[0]["subject"], "Manifest Created 42");
        assert_eq!(mails[0]["to"][0], "owner@example.org");
        assert_eq!(mails[1]["subject"], "Manifest Created (HMDMC) 42");
        assert_eq!(mails[1]["to"][0], "hmdmc@example.org");
        assert_eq!(
            mails[0]["data"]["link"],
            "http://aker.example.org:3000/reception/42"
        );
    }

    /// A sink that never accepts exhausts its attempts into the dead-letter file
    #[tokio::test]
    async fn test_e2e_unreachable_webhook_dead_letters() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let dir = tempdir().unwrap();
        let dead = dir.path().join("dead.jsonl");
        let out = dir.path().join("ok.jsonl");

        let blueprint = load(&format!(
            r#"
[dispatcher]
workers = 1
max_attempts = 2
retry_base_delay_ms = 10
retry_max_delay_ms = 20
delivery_timeout_ms = 2000

[dead_letter]
path = '{}'

[[sinks]]
name = "hook"
sink_type = "webhook"
params = {{ url = "http://127.0.0.1:{port}/notify", timeout_ms = "1000" }}

[[sinks]]
name = "archive"
sink_type = "file"
params = {{ path = '{}' }}
"#,
            dead.display(),
            out.display()
        ));

        let dispatcher = create_dispatcher(&blueprint).await.unwrap();
        let (publisher, source) = channel("inbox", 4);
        publisher
            .publish_payload("evt-1", r#"{"event_type":"x"}"#)
            .await
            .unwrap();
        drop(publisher);

        let report = dispatcher
            .run(source, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.dead_letter_total, 1);

        let statuses: Vec<_> = report
            .outcomes_for("evt-1")
            .filter(|o| o.sink_id == "hook")
            .map(|o| (o.status, o.attempts))
            .collect();
        assert_eq!(
            statuses,
            vec![(DeliveryStatus::Retrying, 1), (DeliveryStatus::Failed, 2)]
        );

        let letters = read_json_lines(&dead);
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0]["sink_id"], "hook");
        assert_eq!(letters[0]["attempts"], 2);

        // The healthy sink was not resent on the retry
        assert_eq!(read_json_lines(&out).len(), 1);
    }

    /// Undecodable lines are counted and skipped
    #[tokio::test]
    async fn test_e2e_file_source_skips_bad_lines() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.jsonl");
        let out = dir.path().join("out.jsonl");
        std::fs::write(
            &input,
            "{\"id\":\"a\"}\nnot json\n\n{\"id\":\"b\"}\n",
        )
        .unwrap();

        let blueprint = load(&format!(
            r#"
[[sinks]]
name = "archive"
sink_type = "file"
params = {{ path = '{}' }}
"#,
            out.display()
        ));

        let dispatcher = create_dispatcher(&blueprint).await.unwrap();
        let source = LinesSource::open(&input).await.unwrap();
        let metrics = source.metrics().clone();

        let report = dispatcher
            .run(source, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.events_received, 2);
        assert_eq!(report.source_errors, 1);
        assert_eq!(metrics.snapshot().decode_errors, 1);

        let ids: Vec<_> = read_json_lines(&out)
            .into_iter()
            .map(|l| l["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}

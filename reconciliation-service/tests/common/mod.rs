#![allow(dead_code)]

use reconciliation_service::config::ReconciliationConfig;
use reconciliation_service::jobs::{JobManager, JobView, PollPolicy};
use reconciliation_service::startup::Application;
use reqwest::multipart;
use std::sync::Once;
use std::time::Duration;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

pub const MERCHANT_CSV: &str = "\u{feff}Tracking ID;Status;Initial Amount;Operation Date;Payment Method
T1;Completed;10,00;05.01.2024 10:00:00;card
T2;Cancelled;5,00;05.01.2024 11:00:00;sepa
T3;Pending;7,50;06.01.2024 09:00:00;card
";

pub const PLATFORM_CSV: &str = "tracking_id,status,amount,created_at,company
T1,success,10.00,2024-01-05 10:00:01,Acme
T2,failed,5.00,2024-01-05 11:00:00,Acme
T4,success,3.00,2024-01-06 12:00:00,Globex
";

static TRACING: Once = Once::new();

fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("info"))
            .with_test_writer()
            .try_init();
    });
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub manager: JobManager,
    pub client: reqwest::Client,
    _temp_dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(configure: impl FnOnce(&mut ReconciliationConfig)) -> Self {
        init_test_tracing();
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = ReconciliationConfig::default();
        config.common.port = 0; // Random port for testing
        config.ingest.temp_dir = temp_dir.path().join("jobs");
        configure(&mut config);

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");
        let port = app.port();
        let manager = app.manager().clone();
        tokio::spawn(app.run_until_stopped());

        let address = format!("http://127.0.0.1:{}", port);
        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client.get(format!("{}/health", address)).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        TestApp {
            address,
            port,
            manager,
            client,
            _temp_dir: temp_dir,
        }
    }

    pub async fn upload(
        &self,
        contents: &[u8],
        provider: Option<&str>,
        mode: Option<&str>,
    ) -> reqwest::Response {
        let mut form = multipart::Form::new().part(
            "file",
            multipart::Part::bytes(contents.to_vec())
                .file_name("export.csv")
                .mime_str("text/csv")
                .unwrap(),
        );
        if let Some(provider) = provider {
            form = form.text("provider", provider.to_string());
        }
        if let Some(mode) = mode {
            form = form.text("mode", mode.to_string());
        }

        self.client
            .post(format!("{}/upload", self.address))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn reconcile(&self, merchant: Option<&str>, platform: Option<&str>) -> reqwest::Response {
        let mut form = multipart::Form::new();
        if let Some(merchant) = merchant {
            form = form.part(
                "merchant",
                multipart::Part::text(merchant.to_string()).file_name("merchant.csv"),
            );
        }
        if let Some(platform) = platform {
            form = form.part(
                "platform",
                multipart::Part::text(platform.to_string()).file_name("platform.csv"),
            );
        }

        self.client
            .post(format!("{}/reconcile", self.address))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn wait_for_job(&self, job_id: Uuid) -> JobView {
        self.manager
            .wait_for_completion(
                job_id,
                PollPolicy {
                    attempts: 200,
                    interval: Duration::from_millis(25),
                },
            )
            .await
            .expect("Job did not finish")
    }
}

pub fn job_id(body: &serde_json::Value) -> Uuid {
    body["jobId"]
        .as_str()
        .and_then(|id| id.parse().ok())
        .expect("Response has no jobId")
}

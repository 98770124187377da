//! Shared test harness for integration tests.
//!
//! [`TestHarness`] builds a full [`AppContext`] around a job engine whose
//! prober and combiner are stand-ins: the prober reports a fixed duration
//! (or fails for inputs containing `unprobeable`), and the combiner runs a
//! shell script with the artifact path as `$0` and the input url as `$1`.
//! [`TestHarness::with_server`] serves the router on a random port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use hf_av::{CombineRequest, CombineTemplate, CommandLine, DurationProber, ToolRegistry};
use hf_core::config::Config;
use hf_jobs::Orchestrator;
use hf_server::context::AppContext;
use hf_server::router::build_router;

/// Writes a small artifact after one progress line.
pub const SUCCEED: &str =
    "printf 'frame=50 time=00:00:05.00 speed=4.0x\\r' >&2; printf 'mp4-bytes' > \"$0\"";

/// Keeps a slot busy until killed.
pub const SLOW: &str = "sleep 30";

pub const PROBED_SECS: f64 = 10.0;

struct FakeProber;

#[async_trait]
impl DurationProber for FakeProber {
    async fn probe_duration(&self, input: &str) -> hf_core::Result<f64> {
        if input.contains("unprobeable") {
            return Err(hf_core::Error::ProbeFailed(format!("{input}: Invalid data found")));
        }
        Ok(PROBED_SECS)
    }
}

struct ScriptTemplate {
    script: String,
}

impl CombineTemplate for ScriptTemplate {
    fn command(&self, req: &CombineRequest<'_>) -> CommandLine {
        CommandLine::new(
            "sh",
            [
                "-c".to_string(),
                self.script.clone(),
                req.output_path.to_string_lossy().to_string(),
                req.input_url.to_string(),
            ],
        )
    }
}

pub struct TestHarness {
    pub ctx: AppContext,
    pub client: reqwest::Client,
    addr: SocketAddr,
    _cache: tempfile::TempDir,
}

impl TestHarness {
    /// Default config, combiner runs `script`.
    pub async fn with_server(script: &str) -> Self {
        Self::with_server_config(Config::default(), script).await
    }

    /// Custom config (cache dir is always replaced by a temp dir).
    pub async fn with_server_config(mut config: Config, script: &str) -> Self {
        let cache = tempfile::tempdir().expect("failed to create temp dir");
        config.jobs.cache_dir = cache.path().to_path_buf();

        let orchestrator = Orchestrator::new(
            config.jobs.cache_dir.clone(),
            config.jobs.ceiling(),
            Arc::new(FakeProber),
            Arc::new(ScriptTemplate {
                script: script.to_string(),
            }),
        )
        .expect("failed to build orchestrator");

        let ctx = AppContext::new(config, Arc::new(ToolRegistry::default()), orchestrator);
        let app = build_router(ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            ctx,
            client: reqwest::Client::new(),
            addr,
            _cache: cache,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// POST /optimize-version and return the new job id.
    pub async fn submit(&self, url: &str, device_id: Option<&str>) -> String {
        let resp = self
            .client
            .post(self.url("/optimize-version"))
            .json(&serde_json::json!({ "url": url, "deviceId": device_id, "itemId": "item-1" }))
            .send()
            .await
            .expect("submit request failed");
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["id"].as_str().expect("id in response").to_string()
    }

    pub async fn status(&self, id: &str) -> Value {
        let resp = self
            .client
            .get(self.url(&format!("/job-status/{id}")))
            .send()
            .await
            .expect("status request failed");
        assert_eq!(resp.status(), 200, "status of {id}");
        resp.json().await.unwrap()
    }

    /// Poll job-status until `status` is reached.
    pub async fn wait_for_status(&self, id: &str, status: &str) -> Value {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let job = self.status(id).await;
            if job["status"] == status {
                return job;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {id} stuck in {} waiting for {status}",
                job["status"]
            );
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.ctx.orchestrator.shutdown();
    }
}

//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use termshot::{CancellationToken, Session, SessionConfig, SessionConfigBuilder};

/// Route `tracing` output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A builder with waits short enough for tests.
pub fn quick(command: &str) -> SessionConfigBuilder {
    SessionConfig::builder(command)
        .env("LANG", "C")
        .wait_timeout(Duration::from_secs(5))
        .stable_quiet(Duration::from_millis(50))
}

/// Start a session for `config`.
pub async fn started(config: SessionConfig) -> Session {
    init_tracing();
    let mut session = Session::with_config(config).expect("valid config");
    session
        .start(CancellationToken::new())
        .await
        .expect("session starts");
    session
}

/// Collects assertion failure messages instead of panicking.
#[derive(Clone, Default)]
pub struct Recorder(pub Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn messages(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn install(&self, builder: SessionConfigBuilder) -> SessionConfigBuilder {
        let sink = Arc::clone(&self.0);
        builder.failure_hook(move |msg: &str| sink.lock().unwrap().push(msg.to_string()))
    }
}

/// Poll `f` until it returns `Some` or `timeout` passes.
pub async fn eventually<T, F, Fut>(timeout: Duration, mut f: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(value) = f().await {
            return Some(value);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

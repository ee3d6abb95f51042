//! Virtual-user scheduling and load test orchestration.

use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::config::TestConfig;
use crate::error::LoadResult;
use crate::host::{HttpGet, Instrumented, Pause, ReqwestGet, TokioPause};
use crate::metrics::{MetricsCollector, TestResults};
use crate::script::build_user;

/// Runs the configured user script under a pool of virtual users.
pub struct LoadRunner {
    config: TestConfig,
    get: Arc<dyn HttpGet>,
    pause: Arc<dyn Pause>,
}

impl LoadRunner {
    /// Create a runner backed by a pooled reqwest client and the tokio timer.
    pub fn new(config: TestConfig) -> LoadResult<Self> {
        config.validate()?;
        let get = ReqwestGet::new(config.request_timeout(), config.virtual_users as usize)?;
        Ok(Self::with_primitives(config, Arc::new(get), Arc::new(TokioPause)))
    }

    /// Create a runner with custom GET and pause primitives.
    pub fn with_primitives(config: TestConfig, get: Arc<dyn HttpGet>, pause: Arc<dyn Pause>) -> Self {
        Self { config, get, pause }
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Run the load test, stopping early on Ctrl-C.
    pub async fn run(&self) -> LoadResult<TestResults> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let listener = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Received shutdown signal, finishing in-flight iterations");
                shutdown_tx.send(true).ok();
            }
        });

        let results = self.run_with_shutdown(shutdown_rx).await;
        listener.abort();
        results
    }

    /// Run the load test until the budget is spent or `shutdown` flips to true.
    ///
    /// Budgets and shutdown are checked between iterations; an iteration that
    /// has started always runs to completion.
    pub async fn run_with_shutdown(&self, shutdown: watch::Receiver<bool>) -> LoadResult<TestResults> {
        // Runners built from primitives skip `new`, so check here as well
        self.config.validate()?;

        let virtual_users = self.config.virtual_users;
        let budget = self.config.iteration_budget();
        let run_for = self.config.duration();

        info!(
            scenario = %self.config.name,
            virtual_users,
            iterations = ?budget,
            duration_secs = ?self.config.duration_secs,
            "Starting load test"
        );

        let metrics = Arc::new(Mutex::new(MetricsCollector::new()));
        let get = Arc::new(Instrumented::new(self.get.clone(), metrics.clone()));
        let pb = self.progress_bar(budget, run_for);

        let start = Instant::now();
        let deadline = run_for.map(|d| start + d);

        // Duration-bound runs advance the bar from a ticker
        let ticker = run_for.map(|total| {
            let pb = pb.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_millis(250));
                loop {
                    interval.tick().await;
                    let elapsed = start.elapsed().min(total);
                    pb.set_position(elapsed.as_secs());
                    if elapsed >= total {
                        break;
                    }
                }
            })
        });

        let mut handles = Vec::with_capacity(virtual_users as usize);
        for index in 0..virtual_users {
            let script = build_user(&self.config, index);
            let get = get.clone();
            let pause = self.pause.clone();
            let metrics = metrics.clone();
            let shutdown = shutdown.clone();
            let pb = pb.clone();
            let count_iterations = run_for.is_none();

            handles.push(tokio::spawn(async move {
                let mut completed = 0u64;
                loop {
                    if budget.is_some_and(|b| completed >= b)
                        || deadline.is_some_and(|d| Instant::now() >= d)
                        || *shutdown.borrow()
                    {
                        break;
                    }

                    script.run(get.as_ref(), pause.as_ref()).await;
                    completed += 1;
                    metrics.lock().await.record_iteration();
                    if count_iterations {
                        pb.inc(1);
                    }
                }
                debug!(virtual_user = index, iterations = completed, "Virtual user finished");
            }));
        }

        for handle in handles {
            handle.await?;
        }
        let elapsed = start.elapsed();

        if let Some(ticker) = ticker {
            ticker.abort();
        }
        pb.finish_with_message("Complete!");

        let m = metrics.lock().await;
        info!(
            iterations = m.iterations(),
            requests = m.requests_total(),
            failed = m.requests_failed(),
            elapsed_secs = elapsed.as_secs_f64(),
            "Load test complete"
        );

        Ok(m.results(self.config.name.clone(), virtual_users, elapsed))
    }

    fn progress_bar(&self, budget: Option<u64>, run_for: Option<Duration>) -> ProgressBar {
        let (len, template) = match (run_for, budget) {
            (Some(total), _) => (
                total.as_secs(),
                "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len}s {msg}",
            ),
            (None, per_user) => (
                per_user.unwrap_or(1) * self.config.virtual_users as u64,
                "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} iterations {msg}",
            ),
        };

        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar().template(template) {
            pb.set_style(style.progress_chars("##-"));
        }
        pb
    }
}

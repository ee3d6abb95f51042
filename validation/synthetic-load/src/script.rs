//! User scripts: what one virtual user does per iteration.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::prelude::*;

use crate::config::{TestConfig, UserConfig, WeightedTask};
use crate::host::{HttpGet, Pause};
use crate::targets::{Target, TargetPlan};

/// One iteration of a user script.
///
/// Implementations issue requests through `get` and must not inspect the
/// outcomes; accounting belongs to the instrumentation around `get`.
#[async_trait]
pub trait Iteration: Send + Sync {
    async fn run(&self, get: &dyn HttpGet, pause: &dyn Pause);
}

/// Sweep every endpoint of every server in order, then pause once.
#[derive(Debug, Clone)]
pub struct Sweep {
    plan: TargetPlan,
    pause: Duration,
}

impl Sweep {
    pub fn new(plan: TargetPlan, pause: Duration) -> Self {
        Self { plan, pause }
    }

    pub fn plan(&self) -> &TargetPlan {
        &self.plan
    }
}

impl Default for Sweep {
    fn default() -> Self {
        Self::new(TargetPlan::default(), Duration::from_millis(500))
    }
}

#[async_trait]
impl Iteration for Sweep {
    async fn run(&self, get: &dyn HttpGet, pause: &dyn Pause) {
        for url in self.plan.urls() {
            // Outcome ignored, failures fall through to the next target
            let _ = get.get(&url).await;
        }
        pause.pause(self.pause).await;
    }
}

/// Pick one endpoint by weight, request it, then wait a random think time.
pub struct Weighted {
    server: String,
    endpoints: Vec<String>,
    cumulative: Vec<f64>,
    wait_range: (Duration, Duration),
    rng: Mutex<StdRng>,
}

impl Weighted {
    pub fn new(
        server: impl Into<String>,
        tasks: &[WeightedTask],
        wait_range: (Duration, Duration),
        seed: Option<u64>,
    ) -> Self {
        // Cumulative distribution over normalized weights
        let total: f64 = tasks.iter().map(|t| t.weight).sum();
        let mut cumulative = Vec::with_capacity(tasks.len());
        let mut sum = 0.0;
        for task in tasks {
            sum += task.weight / total;
            cumulative.push(sum);
        }

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            server: server.into(),
            endpoints: tasks.iter().map(|t| t.endpoint.clone()).collect(),
            cumulative,
            wait_range,
            rng: Mutex::new(rng),
        }
    }

    /// Draw the next target.
    pub fn next_target(&self) -> Target {
        let r: f64 = self.with_rng(|rng| rng.gen());
        Target::new(self.server.clone(), self.endpoints[self.select_index(r)].clone())
    }

    /// Draw the next think time, uniform over the configured range.
    pub fn next_wait(&self) -> Duration {
        let (min, max) = self.wait_range;
        if min >= max {
            return min;
        }
        self.with_rng(|rng| rng.gen_range(min..=max))
    }

    fn select_index(&self, r: f64) -> usize {
        // Zero-weight tasks share their cumulative value with the previous
        // entry, so the strict comparison never lands on them
        for (i, &cum) in self.cumulative.iter().enumerate() {
            if r < cum {
                return i;
            }
        }
        // Rounding can leave the last bound just under 1.0
        (0..self.cumulative.len())
            .rev()
            .find(|&i| self.cumulative[i] > if i == 0 { 0.0 } else { self.cumulative[i - 1] })
            .unwrap_or(0)
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut rng)
    }
}

#[async_trait]
impl Iteration for Weighted {
    async fn run(&self, get: &dyn HttpGet, pause: &dyn Pause) {
        let target = self.next_target();
        let _ = get.get(&target.url()).await;
        pause.pause(self.next_wait()).await;
    }
}

/// Build the script for one virtual user.
///
/// Weighted users derive their seed from the scenario seed and the user
/// index so seeded runs are reproducible without users sharing a stream.
pub fn build_user(config: &TestConfig, user_index: u32) -> Box<dyn Iteration> {
    match &config.user {
        UserConfig::Sweep => Box::new(Sweep::new(config.plan(), config.pause())),
        UserConfig::Weighted {
            tasks,
            base_server,
            wait_min_ms,
            wait_max_ms,
        } => {
            let server = base_server
                .clone()
                .or_else(|| config.servers.first().cloned())
                .unwrap_or_default();
            Box::new(Weighted::new(
                server,
                tasks,
                (
                    Duration::from_millis(*wait_min_ms),
                    Duration::from_millis(*wait_max_ms),
                ),
                config.seed.map(|s| s.wrapping_add(user_index as u64)),
            ))
        }
    }
}

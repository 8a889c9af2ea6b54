//! Test harness: named instances, verdicts, watchdog runner
//!
//! Each role registers as a named test. The runner executes an instance
//! under a watchdog that ticks periodically so livelocks are detected,
//! converts panics and budget overruns into failed verdicts, and emits a
//! serializable run report. A failed step can never be followed by a pass
//! verdict for that instance.

use std::time::Duration;

use futures::future::{join_all, BoxFuture, FutureExt};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::{interval, Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::config::HarnessConfig;
use crate::error::TestError;

/// Final result of one test instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "message")]
pub enum Verdict {
    Passed(String),
    Failed(String),
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Passed(msg) => write!(f, "PASSED: {}", msg),
            Verdict::Failed(msg) => write!(f, "FAILED: {}", msg),
        }
    }
}

/// Outcome of running one instance, printable as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub test_id: String,
    pub run_id: Uuid,
    pub verdict: Verdict,
    pub elapsed_ms: u64,
    pub ticks: u64,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        matches!(self.verdict, Verdict::Passed(_))
    }
}

type PostInitHook = Box<dyn Fn() + Send + Sync>;
type TickHook = Box<dyn Fn(u64) + Send + Sync>;

/// A named test: a role future plus optional lifecycle hooks.
pub struct TestInstance {
    id: &'static str,
    pass_message: &'static str,
    post_init: Option<PostInitHook>,
    tick: Option<TickHook>,
    main: BoxFuture<'static, Result<(), TestError>>,
}

impl TestInstance {
    pub fn new(
        id: &'static str,
        pass_message: &'static str,
        main: impl std::future::Future<Output = Result<(), TestError>> + Send + 'static,
    ) -> Self {
        Self {
            id,
            pass_message,
            post_init: None,
            tick: None,
            main: main.boxed(),
        }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    /// Hook invoked once before the test body starts.
    pub fn with_post_init(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.post_init = Some(Box::new(hook));
        self
    }

    /// Hook invoked on every watchdog tick with the tick count.
    pub fn with_tick(mut self, hook: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.tick = Some(Box::new(hook));
        self
    }

    /// Run this instance to a verdict under the watchdog.
    pub async fn run(self, tick_period: Duration, budget: Duration) -> RunReport {
        let id = self.id;
        info!("[{}] test starting", id);
        if let Some(hook) = &self.post_init {
            hook();
        }

        let start = Instant::now();
        let mut handle = tokio::spawn(self.main);
        let mut ticker = interval(tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks: u64 = 0;

        let verdict = loop {
            tokio::select! {
                joined = &mut handle => break match joined {
                    Ok(Ok(())) => Verdict::Passed(self.pass_message.to_string()),
                    Ok(Err(err)) => Verdict::Failed(err.to_string()),
                    Err(join_err) => Verdict::Failed(format!("test aborted: {}", join_err)),
                },
                _ = ticker.tick() => {
                    ticks += 1;
                    debug!("[{}] watchdog tick {}", id, ticks);
                    if let Some(hook) = &self.tick {
                        hook(ticks);
                    }
                    if start.elapsed() >= budget {
                        warn!("[{}] watchdog budget exhausted", id);
                        handle.abort();
                        break Verdict::Failed(format!("watchdog expired after {:?}", budget));
                    }
                }
            }
        };

        match &verdict {
            Verdict::Passed(msg) => info!("[{}] {}", id, msg),
            Verdict::Failed(msg) => error!("[{}] {}", id, msg),
        }

        RunReport {
            test_id: id.to_string(),
            run_id: Uuid::new_v4(),
            verdict,
            elapsed_ms: start.elapsed().as_millis() as u64,
            ticks,
        }
    }
}

/// Registered tests, exposed to the outer runner by name.
#[derive(Default)]
pub struct TestList {
    instances: Vec<TestInstance>,
}

impl TestList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, instance: TestInstance) {
        debug!("registered test '{}'", instance.id());
        self.instances.push(instance);
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Run all registered instances concurrently and collect reports.
    pub async fn run_all(self, config: &HarnessConfig) -> Vec<RunReport> {
        let tick = config.tick;
        let budget = config.watchdog_budget;
        join_all(
            self.instances
                .into_iter()
                .map(|instance| instance.run(tick, budget)),
        )
        .await
    }
}

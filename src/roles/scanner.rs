//! Scanner role: enable → scan → wait for a report → disable, repeated.

use std::sync::Arc;

use futures::future::FutureExt;
use log::{debug, info};

use crate::config::HarnessConfig;
use crate::error::TestError;
use crate::flag::{FlagError, SignalFlag};
use crate::harness::TestInstance;
use crate::host::{AdvReport, BleHost, ScanCallback, ScanMode};
use crate::roles::{step_err, Phase};

/// Drives the passive-scan side of the cycle test.
///
/// Per cycle: enable the stack, arm the completion flag, start a passive
/// scan, block until the report callback has stopped the scan and set the
/// flag, then disable. The callback runs in stack-internal context; its
/// first invocation is the only authoritative one; later deliveries of
/// reports already in flight are ignored.
pub struct Scanner {
    host: Arc<dyn BleHost>,
    config: HarnessConfig,
}

impl Scanner {
    pub fn new(host: Arc<dyn BleHost>, config: HarnessConfig) -> Self {
        Self { host, config }
    }

    /// Wrap this role as a named test instance for the harness.
    pub fn into_test(self) -> TestInstance {
        TestInstance::new("scanner", "GATT client Passed", self.run())
    }

    fn report_callback(&self, flag: &mut SignalFlag) -> ScanCallback {
        let setter = flag.arm();
        let host = Arc::clone(&self.host);
        Arc::new(move |report: AdvReport| {
            let setter = setter.clone();
            let host = Arc::clone(&host);
            async move {
                if !setter.claim() {
                    return;
                }
                info!("Device found: {} (RSSI {})", report.address, report.rssi);
                info!("Stopping scan");
                if let Err(err) = host.scan_stop().await {
                    setter.abort(err);
                    return;
                }
                setter.set();
            }
            .boxed()
        })
    }

    pub async fn run(self) -> Result<(), TestError> {
        let mut flag = SignalFlag::new();

        for cycle in 1..=self.config.iterations {
            debug!(
                "scanner cycle {}/{}: {} -> {}",
                cycle,
                self.config.iterations,
                Phase::Idle,
                Phase::Enabled
            );
            self.host
                .enable()
                .await
                .map_err(step_err("Bluetooth discover failed"))?;
            info!("Bluetooth initialized");

            // unset strictly before scan_start, wait strictly after
            let callback = self.report_callback(&mut flag);
            self.host
                .scan_start(ScanMode::Passive, callback)
                .await
                .map_err(step_err("Scanning failed to start"))?;
            info!("Scanning successfully started");
            debug!("scanner phase {}", Phase::Scanning);

            flag.wait(self.config.tick, self.config.wait_budget)
                .await
                .map_err(|err| match err {
                    FlagError::Aborted(stack) => {
                        TestError::Fail(format!("Could not stop scan: {}", stack.code))
                    }
                    FlagError::TimedOut(budget) => TestError::WaitTimeout(budget),
                })?;

            self.host
                .disable()
                .await
                .map_err(step_err("Bluetooth disable failed"))?;
            info!("Bluetooth successfully disabled");
            debug!("scanner phase {}", Phase::Idle);
        }

        Ok(())
    }
}

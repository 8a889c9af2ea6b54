//! Advertiser role: enable → identity → advertise → hold → tear down,
//! repeated.

use std::sync::Arc;

use log::{debug, info};
use tokio::time::sleep;

use crate::config::HarnessConfig;
use crate::error::TestError;
use crate::harness::TestInstance;
use crate::host::{
    AdData, AdvParams, BleHost, AD_FLAG_GENERAL_DISCOVERABLE, AD_FLAG_NO_BREDR,
};
use crate::roles::{step_err, Phase};

/// Drives the advertising side of the cycle test.
///
/// Per cycle: enable the stack, create a secondary identity, advertise
/// connectable with a flags-only payload (plus the device name) under
/// that identity, hold briefly, then stop, delete the identity and
/// disable. The identity never outlives the stack session that created
/// it.
pub struct Advertiser {
    host: Arc<dyn BleHost>,
    config: HarnessConfig,
}

impl Advertiser {
    pub fn new(host: Arc<dyn BleHost>, config: HarnessConfig) -> Self {
        Self { host, config }
    }

    /// Wrap this role as a named test instance for the harness.
    pub fn into_test(self) -> TestInstance {
        TestInstance::new("advertiser", "GATT server passed", self.run())
    }

    pub async fn run(self) -> Result<(), TestError> {
        let ad = [AdData::flags(AD_FLAG_GENERAL_DISCOVERABLE | AD_FLAG_NO_BREDR)];

        for cycle in 1..=self.config.iterations {
            debug!(
                "advertiser cycle {}/{}: {} -> {}",
                cycle,
                self.config.iterations,
                Phase::Idle,
                Phase::Enabled
            );
            self.host
                .enable()
                .await
                .map_err(step_err("Bluetooth init failed"))?;
            info!("Bluetooth initialized");

            let default_id = self.host.identity_current().await;
            info!("ID: {}", default_id);

            let id = self
                .host
                .identity_create(None)
                .await
                .map_err(step_err("ID create failed"))?;

            let params = AdvParams::connectable(id);
            self.host
                .adv_start(&params, &ad, &[])
                .await
                .map_err(step_err("Advertising failed to start"))?;
            info!("Advertising successfully started");
            debug!("advertiser phase {}", Phase::Advertising);

            sleep(self.config.adv_hold).await;

            self.host
                .adv_stop()
                .await
                .map_err(step_err("Advertising failed to stop"))?;
            info!("Advertising stopped");

            self.host
                .identity_delete(id)
                .await
                .map_err(step_err("ID delete failed"))?;

            self.host
                .disable()
                .await
                .map_err(step_err("Bluetooth disable failed"))?;
            info!("Bluetooth disabled");
            debug!("advertiser phase {}", Phase::Idle);
        }

        Ok(())
    }
}

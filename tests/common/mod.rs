//! Shared helpers for role integration tests
//!
//! `ScriptedHost` is a headless stand-in for the host stack: it records
//! every operation in order, can be told to fail one named operation, and
//! delivers a configurable number of advertisement reports after each
//! scan start so callback paths run without a radio.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::BDAddr;

use blecycle::{
    AdData, AdvParams, AdvReport, BleHost, IdentityId, ScanCallback, ScanMode, StackError,
    StatusCode,
};

/// Address the scripted host reports advertisements from.
pub const PEER_ADDR: [u8; 6] = [0xc0, 0xde, 0x00, 0x00, 0x00, 0x99];

pub struct ScriptedHost {
    ops: Mutex<Vec<String>>,
    fail: Option<(&'static str, StatusCode)>,
    reports_per_scan: usize,
    next_identity: AtomicUsize,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self {
            ops: Mutex::new(Vec::new()),
            fail: None,
            reports_per_scan: 1,
            next_identity: AtomicUsize::new(1),
        }
    }

    /// Fail the named operation with the given status; all other
    /// operations succeed.
    pub fn failing(op: &'static str, status: StatusCode) -> Self {
        Self {
            fail: Some((op, status)),
            ..Self::new()
        }
    }

    /// Deliver this many reports per scan session instead of one.
    pub fn with_reports_per_scan(mut self, n: usize) -> Self {
        self.reports_per_scan = n;
        self
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    fn record(&self, op: impl Into<String>) {
        self.ops.lock().unwrap().push(op.into());
    }

    fn check(&self, op: &'static str) -> Result<(), StackError> {
        match self.fail {
            Some((failing, status)) if failing == op => Err(StackError::new(op, status)),
            _ => Ok(()),
        }
    }

    fn report() -> AdvReport {
        AdvReport {
            address: BDAddr::from(PEER_ADDR),
            rssi: -55,
            adv_type: 0x00,
            data: AdData::encode(&[AdData::flags(0x06)]),
        }
    }
}

impl Default for ScriptedHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BleHost for ScriptedHost {
    async fn enable(&self) -> Result<(), StackError> {
        self.record("enable");
        self.check("enable")
    }

    async fn disable(&self) -> Result<(), StackError> {
        self.record("disable");
        self.check("disable")
    }

    async fn scan_start(&self, _mode: ScanMode, callback: ScanCallback) -> Result<(), StackError> {
        self.record("scan_start");
        self.check("scan_start")?;
        let reports = self.reports_per_scan;
        tokio::spawn(async move {
            for _ in 0..reports {
                tokio::time::sleep(Duration::from_millis(1)).await;
                callback(Self::report()).await;
            }
        });
        Ok(())
    }

    async fn scan_stop(&self) -> Result<(), StackError> {
        self.record("scan_stop");
        self.check("scan_stop")
    }

    async fn adv_start(
        &self,
        params: &AdvParams,
        ad: &[AdData],
        _sd: &[AdData],
    ) -> Result<(), StackError> {
        self.record(format!("adv_start:{}:{}", params.identity, ad.len()));
        self.check("adv_start")
    }

    async fn adv_stop(&self) -> Result<(), StackError> {
        self.record("adv_stop");
        self.check("adv_stop")
    }

    async fn identity_current(&self) -> IdentityId {
        self.record("identity_current");
        0
    }

    async fn identity_create(&self, _addr: Option<BDAddr>) -> Result<IdentityId, StackError> {
        self.record("identity_create");
        self.check("identity_create")?;
        Ok(self.next_identity.fetch_add(1, Ordering::SeqCst))
    }

    async fn identity_delete(&self, id: IdentityId) -> Result<(), StackError> {
        self.record(format!("identity_delete:{}", id));
        self.check("identity_delete")
    }
}

/// A short-budget config so failure tests stay fast.
pub fn test_config(iterations: usize) -> blecycle::HarnessConfig {
    blecycle::HarnessConfig {
        iterations,
        adv_hold: Duration::from_millis(2),
        tick: Duration::from_millis(10),
        wait_budget: Duration::from_millis(500),
        watchdog_budget: Duration::from_secs(10),
        device_name: "scripted".to_string(),
    }
}

/// Arc the host twice: one handle for the role, one for assertions.
pub fn shared(host: ScriptedHost) -> (Arc<ScriptedHost>, Arc<dyn BleHost>) {
    let host = Arc::new(host);
    let dyn_host: Arc<dyn BleHost> = Arc::clone(&host) as Arc<dyn BleHost>;
    (host, dyn_host)
}

//! In-process simulated host stack and radio
//!
//! A minimal stand-in for a real controller: advertisers publish packets
//! onto a shared broadcast medium while their session is active, scanners
//! subscribe and deliver packets to the registered callback from a spawned
//! task. State checks return the same errno-style codes a native stack
//! would (enable twice, operate while disabled, identity slots exhausted).
//!
//! The simulation compresses advertising intervals to [`RadioSim::adv_period`]
//! so short test holds still produce traffic; air-interface fidelity is not
//! a goal.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::BDAddr;
use log::{debug, trace};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::error::{StackError, StatusCode};
use crate::host::{
    AdData, AdvParams, AdvReport, BleHost, IdentityId, ScanCallback, ScanMode, ADV_TYPE_ADV_IND,
    ADV_TYPE_NONCONN_IND,
};

/// Shared radio medium between simulated devices.
pub struct RadioSim {
    tx: broadcast::Sender<AdvReport>,
    adv_period: Duration,
}

impl RadioSim {
    /// Packet buffer depth per subscriber.
    const CHANNEL_CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self::with_period(Duration::from_millis(1))
    }

    /// Medium with a custom publish period per advertising session.
    pub fn with_period(adv_period: Duration) -> Self {
        let (tx, _) = broadcast::channel(Self::CHANNEL_CAPACITY);
        Self { tx, adv_period }
    }

    pub fn adv_period(&self) -> Duration {
        self.adv_period
    }

    fn subscribe(&self) -> broadcast::Receiver<AdvReport> {
        self.tx.subscribe()
    }

    fn publish(&self, report: AdvReport) {
        // no scanners on the medium is not an error
        let _ = self.tx.send(report);
    }
}

impl Default for RadioSim {
    fn default() -> Self {
        Self::new()
    }
}

struct ScanSession {
    stop: watch::Sender<bool>,
    _task: JoinHandle<()>,
}

struct AdvSession {
    stop: watch::Sender<bool>,
    identity: IdentityId,
    _task: JoinHandle<()>,
}

struct SimState {
    enabled: bool,
    scan: Option<ScanSession>,
    adv: Option<AdvSession>,
    /// Identity table; slot 0 is the default identity while enabled.
    identities: Vec<Option<BDAddr>>,
}

/// Simulated [`BleHost`] bound to one device on a [`RadioSim`].
pub struct SimHost {
    radio: Arc<RadioSim>,
    address: BDAddr,
    name: String,
    state: Mutex<SimState>,
}

impl SimHost {
    /// Identity table size, default identity included.
    pub const MAX_IDENTITIES: usize = 4;

    pub fn new(radio: Arc<RadioSim>, address: BDAddr, name: impl Into<String>) -> Self {
        Self {
            radio,
            address,
            name: name.into(),
            state: Mutex::new(SimState {
                enabled: false,
                scan: None,
                adv: None,
                identities: Vec::new(),
            }),
        }
    }

    pub fn address(&self) -> BDAddr {
        self.address
    }

    /// Synthesized random-static address for a created identity: the
    /// device address with the two MSBs forced and the slot mixed into
    /// the low byte.
    fn identity_address(&self, slot: usize) -> BDAddr {
        let mut bytes = self.address.into_inner();
        bytes[0] |= 0xc0;
        bytes[5] = bytes[5].wrapping_add((slot as u8) << 4);
        BDAddr::from(bytes)
    }

    fn stop_session(stop: &watch::Sender<bool>) {
        // receiver may already be gone if the task wound down on its own
        let _ = stop.send(true);
    }
}

#[async_trait]
impl BleHost for SimHost {
    async fn enable(&self) -> Result<(), StackError> {
        let mut state = self.state.lock().await;
        if state.enabled {
            return Err(StackError::new("bt_enable", StatusCode::Already));
        }
        state.enabled = true;
        let mut identities = vec![None; Self::MAX_IDENTITIES];
        identities[0] = Some(self.address);
        state.identities = identities;
        debug!("[{}] stack enabled", self.name);
        Ok(())
    }

    async fn disable(&self) -> Result<(), StackError> {
        let mut state = self.state.lock().await;
        if !state.enabled {
            return Err(StackError::new("bt_disable", StatusCode::Already));
        }
        if let Some(scan) = state.scan.take() {
            Self::stop_session(&scan.stop);
        }
        if let Some(adv) = state.adv.take() {
            Self::stop_session(&adv.stop);
        }
        state.identities.clear();
        state.enabled = false;
        debug!("[{}] stack disabled", self.name);
        Ok(())
    }

    async fn scan_start(&self, _mode: ScanMode, callback: ScanCallback) -> Result<(), StackError> {
        let mut state = self.state.lock().await;
        if !state.enabled {
            return Err(StackError::new("bt_le_scan_start", StatusCode::NotReady));
        }
        if state.scan.is_some() {
            return Err(StackError::new("bt_le_scan_start", StatusCode::Already));
        }

        // snapshot of our own addresses so we never report ourselves
        let own: Vec<BDAddr> = state.identities.iter().flatten().copied().collect();
        let mut rx = self.radio.subscribe();
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let name = self.name.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    packet = rx.recv() => match packet {
                        Ok(report) => {
                            if own.contains(&report.address) {
                                continue;
                            }
                            trace!("[{}] delivering report from {}", name, report.address);
                            callback(report).await;
                            if *stop_rx.borrow() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            trace!("[{}] scanner lagged, dropped {} packets", name, n);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });
        state.scan = Some(ScanSession {
            stop: stop_tx,
            _task: task,
        });
        Ok(())
    }

    async fn scan_stop(&self) -> Result<(), StackError> {
        let mut state = self.state.lock().await;
        if !state.enabled {
            return Err(StackError::new("bt_le_scan_stop", StatusCode::NotReady));
        }
        let scan = state
            .scan
            .take()
            .ok_or_else(|| StackError::new("bt_le_scan_stop", StatusCode::Already))?;
        // signal only; the session task may be the caller's own context
        Self::stop_session(&scan.stop);
        Ok(())
    }

    async fn adv_start(
        &self,
        params: &AdvParams,
        ad: &[AdData],
        _sd: &[AdData],
    ) -> Result<(), StackError> {
        let mut state = self.state.lock().await;
        if !state.enabled {
            return Err(StackError::new("bt_le_adv_start", StatusCode::NotReady));
        }
        if state.adv.is_some() {
            return Err(StackError::new("bt_le_adv_start", StatusCode::Already));
        }
        if params.interval_min < 0x0020 || params.interval_max < params.interval_min {
            return Err(StackError::new("bt_le_adv_start", StatusCode::Invalid));
        }
        let address = state
            .identities
            .get(params.identity)
            .copied()
            .flatten()
            .ok_or_else(|| StackError::new("bt_le_adv_start", StatusCode::Invalid))?;

        let mut structures = ad.to_vec();
        if params.use_name {
            structures.push(AdData::complete_name(&self.name));
        }
        let data = AdData::encode(&structures);
        let adv_type = if params.connectable {
            ADV_TYPE_ADV_IND
        } else {
            ADV_TYPE_NONCONN_IND
        };

        let radio = Arc::clone(&self.radio);
        let period = self.radio.adv_period();
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut seq: u8 = 0;
            loop {
                radio.publish(AdvReport {
                    address,
                    // mild deterministic fading so reports are not identical
                    rssi: -60 - (seq % 8) as i8,
                    adv_type,
                    data: data.clone(),
                });
                seq = seq.wrapping_add(1);
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = sleep(period) => {}
                }
            }
        });
        state.adv = Some(AdvSession {
            stop: stop_tx,
            identity: params.identity,
            _task: task,
        });
        Ok(())
    }

    async fn adv_stop(&self) -> Result<(), StackError> {
        let mut state = self.state.lock().await;
        if !state.enabled {
            return Err(StackError::new("bt_le_adv_stop", StatusCode::NotReady));
        }
        let adv = state
            .adv
            .take()
            .ok_or_else(|| StackError::new("bt_le_adv_stop", StatusCode::Already))?;
        Self::stop_session(&adv.stop);
        Ok(())
    }

    async fn identity_current(&self) -> IdentityId {
        0
    }

    async fn identity_create(&self, addr: Option<BDAddr>) -> Result<IdentityId, StackError> {
        let mut state = self.state.lock().await;
        if !state.enabled {
            return Err(StackError::new("bt_id_create", StatusCode::NotReady));
        }
        let slot = state
            .identities
            .iter()
            .position(Option::is_none)
            .ok_or_else(|| StackError::new("bt_id_create", StatusCode::NoMemory))?;
        let address = addr.unwrap_or_else(|| self.identity_address(slot));
        state.identities[slot] = Some(address);
        debug!("[{}] identity {} created ({})", self.name, slot, address);
        Ok(slot)
    }

    async fn identity_delete(&self, id: IdentityId) -> Result<(), StackError> {
        let mut state = self.state.lock().await;
        if !state.enabled {
            return Err(StackError::new("bt_id_delete", StatusCode::NotReady));
        }
        if id == 0 {
            // default identity cannot be deleted
            return Err(StackError::new("bt_id_delete", StatusCode::Invalid));
        }
        if state.adv.as_ref().is_some_and(|adv| adv.identity == id) {
            return Err(StackError::new("bt_id_delete", StatusCode::Busy));
        }
        let slot = state
            .identities
            .get_mut(id)
            .ok_or_else(|| StackError::new("bt_id_delete", StatusCode::Invalid))?;
        if slot.take().is_none() {
            return Err(StackError::new("bt_id_delete", StatusCode::Invalid));
        }
        debug!("[{}] identity {} deleted", self.name, id);
        Ok(())
    }
}

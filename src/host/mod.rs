//! Bluetooth host boundary
//!
//! The trait and data types the cycle drivers call into. The real link
//! layer lives behind [`BleHost`]; the crate ships a simulated
//! implementation in [`sim`] so the roles can run against an in-process
//! radio.

pub mod sim;

use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::BDAddr;
use futures::future::BoxFuture;

use crate::error::StackError;

/// Index into the host's identity table.
pub type IdentityId = usize;

/// Callback invoked from stack-internal context for each observed
/// advertisement. Returns a future so the callback may call back into the
/// host (e.g. to stop scanning from within the report handler).
pub type ScanCallback = Arc<dyn Fn(AdvReport) -> BoxFuture<'static, ()> + Send + Sync>;

/// Fast advertising interval bounds, in 0.625 ms units (100-150 ms).
pub const ADV_FAST_INT_MIN_2: u16 = 0x00a0;
pub const ADV_FAST_INT_MAX_2: u16 = 0x00f0;

/// AD structure type: flags
pub const AD_TYPE_FLAGS: u8 = 0x01;
/// AD structure type: complete local name
pub const AD_TYPE_NAME_COMPLETE: u8 = 0x09;

/// Flags bit: general discoverable mode
pub const AD_FLAG_GENERAL_DISCOVERABLE: u8 = 0x02;
/// Flags bit: BR/EDR not supported
pub const AD_FLAG_NO_BREDR: u8 = 0x04;

/// PDU type of a connectable undirected advertisement.
pub const ADV_TYPE_ADV_IND: u8 = 0x00;
/// PDU type of a non-connectable undirected advertisement.
pub const ADV_TYPE_NONCONN_IND: u8 = 0x03;

/// Scan mode for [`BleHost::scan_start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Listen only; no scan requests are sent.
    Passive,
    /// Send scan requests for scannable advertisers.
    Active,
}

/// One observed advertising packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvReport {
    /// Advertiser address
    pub address: BDAddr,
    /// Received signal strength in dBm
    pub rssi: i8,
    /// Advertising PDU type
    pub adv_type: u8,
    /// Raw AD structures carried by the packet
    pub data: Vec<u8>,
}

/// One advertisement data structure (type byte plus payload).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdData {
    pub ad_type: u8,
    pub data: Vec<u8>,
}

impl AdData {
    /// Flags structure with the given flags byte.
    pub fn flags(flags: u8) -> Self {
        Self {
            ad_type: AD_TYPE_FLAGS,
            data: vec![flags],
        }
    }

    /// Complete local name structure.
    pub fn complete_name(name: &str) -> Self {
        Self {
            ad_type: AD_TYPE_NAME_COMPLETE,
            data: name.as_bytes().to_vec(),
        }
    }

    /// Encode a set of AD structures into the over-the-air byte form
    /// (length, type, payload per structure).
    pub fn encode(structures: &[AdData]) -> Vec<u8> {
        let mut out = Vec::new();
        for s in structures {
            out.push((s.data.len() + 1) as u8);
            out.push(s.ad_type);
            out.extend_from_slice(&s.data);
        }
        out
    }

    /// Decode over-the-air bytes back into AD structures. Returns None on
    /// a truncated or zero-length structure.
    pub fn decode(mut bytes: &[u8]) -> Option<Vec<AdData>> {
        let mut out = Vec::new();
        while !bytes.is_empty() {
            let len = bytes[0] as usize;
            if len == 0 || bytes.len() < len + 1 {
                return None;
            }
            out.push(AdData {
                ad_type: bytes[1],
                data: bytes[2..=len].to_vec(),
            });
            bytes = &bytes[len + 1..];
        }
        Some(out)
    }
}

/// Parameters for one advertising session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvParams {
    /// Identity the advertisement is sent under
    pub identity: IdentityId,
    /// Advertising set id
    pub sid: u8,
    /// Maximum periodic-advertising events that can be skipped
    pub secondary_max_skip: u8,
    /// Whether the advertisement accepts connections
    pub connectable: bool,
    /// Whether the device name is appended to the payload
    pub use_name: bool,
    /// Minimum advertising interval, 0.625 ms units
    pub interval_min: u16,
    /// Maximum advertising interval, 0.625 ms units
    pub interval_max: u16,
    /// Directed-advertising peer, if any
    pub peer: Option<BDAddr>,
}

impl AdvParams {
    /// Connectable undirected advertising under `identity`, with the
    /// device name included and fast interval bounds.
    pub fn connectable(identity: IdentityId) -> Self {
        Self {
            identity,
            sid: 0,
            secondary_max_skip: 0,
            connectable: true,
            use_name: true,
            interval_min: ADV_FAST_INT_MIN_2,
            interval_max: ADV_FAST_INT_MAX_2,
            peer: None,
        }
    }
}

/// The Bluetooth host stack the cycle drivers are exercised against.
///
/// Every fallible operation returns a [`StackError`] carrying an
/// errno-style status code; a non-error return means status zero.
#[async_trait]
pub trait BleHost: Send + Sync {
    /// Bring the stack up. Only one session may be active at a time.
    async fn enable(&self) -> Result<(), StackError>;

    /// Tear the stack down, terminating any scan or advertising session
    /// and discarding identities created during the session.
    async fn disable(&self) -> Result<(), StackError>;

    /// Start scanning; `callback` is invoked from stack-internal context
    /// for every observed advertisement until the scan stops.
    async fn scan_start(&self, mode: ScanMode, callback: ScanCallback) -> Result<(), StackError>;

    /// Stop an active scan.
    async fn scan_stop(&self) -> Result<(), StackError>;

    /// Start advertising `ad` (with `sd` as scan-response data) under the
    /// identity named in `params`.
    async fn adv_start(
        &self,
        params: &AdvParams,
        ad: &[AdData],
        sd: &[AdData],
    ) -> Result<(), StackError>;

    /// Stop an active advertising session.
    async fn adv_stop(&self) -> Result<(), StackError>;

    /// The default identity. Informational query, cannot fail.
    async fn identity_current(&self) -> IdentityId;

    /// Create a new identity, optionally with a caller-chosen address.
    async fn identity_create(&self, addr: Option<BDAddr>) -> Result<IdentityId, StackError>;

    /// Delete a previously created identity. The default identity cannot
    /// be deleted, nor can one an advertising session is bound to.
    async fn identity_delete(&self, id: IdentityId) -> Result<(), StackError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_only_payload_encodes_to_three_bytes() {
        let ad = [AdData::flags(AD_FLAG_GENERAL_DISCOVERABLE | AD_FLAG_NO_BREDR)];
        assert_eq!(AdData::encode(&ad), vec![0x02, 0x01, 0x06]);
    }

    #[test]
    fn encode_decode_preserves_structures() {
        let structures = vec![
            AdData::flags(AD_FLAG_GENERAL_DISCOVERABLE),
            AdData::complete_name("blecycle"),
        ];
        let bytes = AdData::encode(&structures);
        assert_eq!(AdData::decode(&bytes), Some(structures));
    }

    #[test]
    fn decode_rejects_truncated_structure() {
        // claims 5 payload bytes, carries 2
        assert_eq!(AdData::decode(&[0x06, 0x09, b'a', b'b']), None);
        assert_eq!(AdData::decode(&[0x00]), None);
    }

    #[test]
    fn connectable_params_use_fast_interval_bounds() {
        let params = AdvParams::connectable(1);
        assert_eq!(params.interval_min, 0x00a0);
        assert_eq!(params.interval_max, 0x00f0);
        assert!(params.connectable);
        assert!(params.use_name);
        assert_eq!(params.peer, None);
    }
}

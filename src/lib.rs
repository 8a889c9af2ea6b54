// Root module exports
pub mod config;
pub mod error;
pub mod flag;
pub mod harness;
pub mod host;
pub mod logging;
pub mod roles;

// Re-export common items for convenience
pub use config::{ConfigError, HarnessConfig};
pub use error::{StackError, StatusCode, TestError};
pub use flag::{FlagError, FlagSetter, SignalFlag};
pub use harness::{RunReport, TestInstance, TestList, Verdict};
pub use host::sim::{RadioSim, SimHost};
pub use host::{AdData, AdvParams, AdvReport, BleHost, IdentityId, ScanCallback, ScanMode};
pub use logging::init_logger;
pub use roles::{Advertiser, Phase, Scanner};

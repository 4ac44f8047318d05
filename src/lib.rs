//! bannerscan - a generalized banner-grab probe engine
//!
//! One scan connects to a single resolved target, drives a protocol's
//! send/await steps over the connection, extracts labeled fields from the
//! terminated frames and classifies the result into a closed outcome set.

pub mod config;
pub mod error;
pub mod extract;
pub mod frame;
pub mod network;
pub mod output;
pub mod probe;
pub mod scanner;
pub mod status;
pub mod target;
pub mod utils;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{ScanError, ScanPhase};
pub use extract::ResultExtractor;
pub use frame::{Frame, FrameReader, Terminator};
pub use network::{Connect, Connection, TargetConnector, TlsInfo};
pub use probe::{ProbeDefinition, ProbeStep, ProtocolRegistry};
pub use scanner::engine::{ScanEngine, ScanReport};
pub use scanner::ScanResult;
pub use status::{ScanOutcome, StatusClassifier};
pub use target::{ProxyDescriptor, ScanTarget};

pub type Result<T> = std::result::Result<T, ScanError>;

//! Convenient re-exports for common usage.
//!
//! ```rust,no_run
//! use deeppacket_core::prelude::*;
//!
//! let config = PipelineConfig::new(&["a.pcap".into()], None, Some("09:00"), None).unwrap();
//! let mut session = CaptureSession::with_window(config.window);
//! ```

// Pipeline
pub use crate::classify::{classify, Classification, ProtocolKind};
pub use crate::config::{PipelineConfig, TimeWindow};
pub use crate::session::{CaptureSession, SessionStats};

// Records and sinks
pub use crate::protocol::{NativeMessage, Normalize};
pub use crate::record::Record;
pub use crate::sink::{Envelope, JsonLinesSink, MemorySink, RecordSink, StoredRecord};

// Capture I/O
pub use crate::packet::{dissect, CapturedPacket};
pub use crate::pcap::PcapReader;

// Error types
pub use crate::error::{Error, Result};

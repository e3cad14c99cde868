//! deeppacket - classify captured packets and normalize them into flat
//! records.
//!
//! The packet pipeline lives in [`deeppacket_core`]; this crate adds the
//! command-line front end.
//!
//! # Example
//!
//! ```no_run
//! use deeppacket_core::{CaptureSession, MemorySink};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut session = CaptureSession::new();
//!     let mut sink = MemorySink::new();
//!     session.process_file("capture.pcap", &mut sink)?;
//!     for stored in sink.records() {
//!         println!("{}", stored.to_json()?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;

pub use deeppacket_core as core;

//! Fuzz target for the native protocol decoders and normalization.
//!
//! The first byte picks the decoder; the rest is the payload.

#![no_main]

use libfuzzer_sys::fuzz_target;
use deeppacket_core::{NativeMessage, Normalize, ProtocolKind};

const KINDS: [ProtocolKind; 5] = [
    ProtocolKind::Sip,
    ProtocolKind::Dns,
    ProtocolKind::Rtp,
    ProtocolKind::Rtcp,
    ProtocolKind::Diameter,
];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };
    let kind = KINDS[selector as usize % KINDS.len()];

    if let Some(Ok(message)) = NativeMessage::decode(kind, payload) {
        let _ = message.normalize();
    }
});

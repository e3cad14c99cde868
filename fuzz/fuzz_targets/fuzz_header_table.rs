//! Fuzz target for stateful header block decoding.
//!
//! Input is split on 0xff 0x00 into consecutive blocks for one
//! connection. A rejected block must leave the table exactly as it was.

#![no_main]

use libfuzzer_sys::fuzz_target;
use deeppacket_core::HeaderTable;

fuzz_target!(|data: &[u8]| {
    let mut table = HeaderTable::new();
    let mut rest = data;

    loop {
        let (block, next) = match rest.windows(2).position(|w| w == [0xff, 0x00]) {
            Some(i) => (&rest[..i], Some(&rest[i + 2..])),
            None => (rest, None),
        };

        let before = (table.len(), table.size());
        if table.decode(block).is_err() {
            assert_eq!((table.len(), table.size()), before);
        }

        match next {
            Some(next) => rest = next,
            None => break,
        }
    }
});

//! Fuzz target for datetime column parsing.
//!
//! Binlog decoders hand DATETIME columns over as text in more than one
//! format. Parsing arbitrary input must never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use txn_relay::record::parse_datetime;

fuzz_target!(|data: &str| {
    let _ = parse_datetime(data);
});

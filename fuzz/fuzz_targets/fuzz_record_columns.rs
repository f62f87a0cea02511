//! Fuzz target for positional column validation.
//!
//! Builds a column list from raw bytes and validates it against every
//! lifecycle layout. Validation must return an error, never panic, and must
//! reject any arity other than the layout's.

#![no_main]

use libfuzzer_sys::fuzz_target;
use txn_relay::error::RelayError;
use txn_relay::event::ColumnValue;
use txn_relay::record::{LifecycleKind, TransactionRecord};

fn decode(data: &[u8]) -> Vec<ColumnValue> {
    let mut columns = Vec::new();
    for chunk in data.chunks(9) {
        let Some((tag, rest)) = chunk.split_first() else {
            break;
        };
        let mut word = [0u8; 8];
        word[..rest.len()].copy_from_slice(rest);
        let value = match tag % 6 {
            0 => ColumnValue::Null,
            1 => ColumnValue::Int(i64::from_le_bytes(word)),
            2 => ColumnValue::UInt(u64::from_le_bytes(word)),
            3 => ColumnValue::Float(f64::from_le_bytes(word)),
            4 => ColumnValue::Text(String::from_utf8_lossy(rest).into_owned()),
            _ => ColumnValue::Bytes(rest.to_vec()),
        };
        columns.push(value);
    }
    columns
}

fuzz_target!(|data: &[u8]| {
    let columns = decode(data);
    for kind in [
        LifecycleKind::Start,
        LifecycleKind::StopNormal,
        LifecycleKind::StopFailed,
    ] {
        match TransactionRecord::from_columns(kind, "fuzz", &columns) {
            Ok(record) => assert_eq!(record.kind(), kind),
            Err(RelayError::RowShape { expected, actual, .. }) => {
                assert_eq!(expected, kind.expected_columns());
                assert_eq!(actual, columns.len());
            }
            Err(_) => assert_eq!(columns.len(), kind.expected_columns()),
        }
    }
});

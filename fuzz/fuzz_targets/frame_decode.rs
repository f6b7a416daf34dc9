//! Fuzz target for Frame::decode
//!
//! Arbitrary bytes must never panic the header parser: truncated headers,
//! bad magic, unknown opcodes and oversized length fields all return an
//! error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sealframe_proto::Frame;

fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = Frame::decode(data) {
        // A decoded frame re-encodes to a prefix of the input
        let bytes = frame.to_vec().expect("decoded frame must re-encode");
        assert_eq!(&data[..bytes.len()], bytes.as_slice());
    }
});

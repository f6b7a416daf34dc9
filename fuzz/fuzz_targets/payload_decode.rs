//! Fuzz target for Payload::from_frame
//!
//! Feeds arbitrary CBOR bodies under every opcode. Malformed CBOR, type
//! confusion and huge claimed lengths must return an error, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sealframe_proto::{Frame, FrameHeader, NodeId, Opcode, Payload};

fuzz_target!(|data: &[u8]| {
    for opcode in [Opcode::Lock, Opcode::Unlock, Opcode::Release] {
        let frame = Frame::new(FrameHeader::new(opcode, NodeId(1)), data.to_vec());
        if let Ok(payload) = Payload::from_frame(&frame) {
            assert_eq!(payload.opcode(), opcode);
        }
    }
});

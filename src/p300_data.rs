//! Generic field extractor for P300 / VS2 (Optolink) frames.
//!
//! Like the KW extractor this is heuristic: real deployments map datapoint
//! addresses to fields, which is a downstream concern. The common case of
//! big-endian 0.1 °C readings after the five-byte preamble is decoded here.

use byteorder::{BigEndian, ByteOrder};

use crate::{frame_buffer::FrameBuffer, snapshot::TelemetrySnapshot};

/// Decode a validated P300 frame
/// (`<start> <len> <type> <addr_hi> <addr_lo> <data…> <checksum>`).
pub(crate) fn decode_generic(buffer: &FrameBuffer, snapshot: &mut TelemetrySnapshot) {
    let len = buffer.len();
    if len < 6 {
        return;
    }

    // the length byte covers the type and address bytes as well
    let data_len = buffer [1].wrapping_sub(3);

    snapshot.temp_num = 0;

    if data_len >= 2 {
        let mut data_idx = 5;
        while data_idx + 1 < len - 1 && snapshot.temp_num < 4 {
            let raw = BigEndian::read_i16(&buffer [data_idx..data_idx + 2]);
            snapshot.temp [usize::from(snapshot.temp_num)] = f32::from(raw) / 10.0;
            snapshot.temp_num += 1;
            data_idx += 2;
        }
    }

    snapshot.pump_num = 0;
    snapshot.relay_num = 0;
}

//! Generic field extractor for KW-Bus (VS1) frames.
//!
//! KW devices do not announce their datapoint layout, so this extractor is
//! heuristic: most replies carry big-endian 0.1 °C readings right after the
//! address byte. Richer, device-specific extraction needs a datapoint table
//! and lives outside this crate.

use byteorder::{BigEndian, ByteOrder};

use crate::{frame_buffer::FrameBuffer, snapshot::TelemetrySnapshot};

/// Decode a validated KW frame (`0x01 <len> <addr> <data…> <checksum>`).
pub(crate) fn decode_generic(buffer: &FrameBuffer, snapshot: &mut TelemetrySnapshot) {
    let len = buffer.len();
    if len < 5 {
        return;
    }

    snapshot.temp_num = 0;
    let mut data_idx = 3;

    while data_idx + 1 < len - 1 && snapshot.temp_num < 4 {
        let raw = BigEndian::read_i16(&buffer [data_idx..data_idx + 2]);
        snapshot.temp [usize::from(snapshot.temp_num)] = f32::from(raw) / 10.0;
        snapshot.temp_num += 1;
        data_idx += 2;
    }

    snapshot.pump_num = 0;
    snapshot.relay_num = 0;
}

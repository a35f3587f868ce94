//! KM-Bus protocol constants, CRC, and the status-record extractor.
//!
//! KM-Bus long frames carry an M-Bus style envelope
//! (`0x68 L L 0x68 C A <data…> CRC_L CRC_H 0x16`). The payload of a write
//! record is additionally XOR-masked with `0xAA`.

use crate::snapshot::TelemetrySnapshot;

/// XOR mask applied to the data bytes of write-record frames.
pub const XOR_MASK: u8 = 0xAA;

/// Ping request command byte.
pub const CMD_PING: u8 = 0x00;

/// Pong response command byte.
pub const CMD_PONG: u8 = 0x80;

/// Read-one-byte request command byte.
pub const CMD_RD1_REQ: u8 = 0x31;

/// Read-N-bytes request command byte.
pub const CMD_RDN_REQ: u8 = 0x33;

/// Read-record request command byte.
pub const CMD_RDR_REQ: u8 = 0x3F;

/// Write-one-byte data command byte.
pub const CMD_WR1_DAT: u8 = 0xB1;

/// Write-N-bytes data command byte.
pub const CMD_WRN_DAT: u8 = 0xB3;

/// Write-record data command byte; the carrier of status records.
pub const CMD_WRR_DAT: u8 = 0xBF;

/// First status record selector (master status).
pub const RECORD_MASTER_STATUS: u8 = 0x1C;

/// Last status record selector (heating circuit 3 status).
pub const RECORD_CIRCUIT3_STATUS: u8 = 0x1F;

/// Burner-active bit in the burner/valve status flags.
pub const STATUS_BURNER: u8 = 0x04;

/// Main-circulation-pump bit in the pump status flags.
pub const STATUS_MAIN_PUMP: u8 = 0x80;

/// Hot-water-loop-pump bit in the pump status flags.
pub const STATUS_LOOP_PUMP: u8 = 0x40;

/// Operating mode byte: off / standby.
pub const MODE_OFF: u8 = 0x00;

/// Operating mode byte: night / reduced.
pub const MODE_NIGHT: u8 = 0x08;

/// Operating mode byte: day / comfort.
pub const MODE_DAY: u8 = 0x84;

/// Operating mode byte: eco.
pub const MODE_ECO: u8 = 0xC6;

/// Operating mode byte: party.
pub const MODE_PARTY: u8 = 0x86;

const CRC_POLYNOMIAL: u16 = 0x1021;

/// Calc the KM-Bus frame CRC: CRC-16-CCITT with init 0x0000 over
/// bit-reflected input bytes, with a bit-reflected result (CRC-16/KERMIT).
pub fn calc_crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0x0000;

    for &byte in data {
        let reflected = byte.reverse_bits();
        for bit in (0..8).rev() {
            let mut feedback = crc & 0x8000 != 0;
            crc <<= 1;
            if reflected & (1 << bit) != 0 {
                feedback = !feedback;
            }
            if feedback {
                crc ^= CRC_POLYNOMIAL;
            }
        }
    }

    crc.reverse_bits()
}

/// Human-readable name of an operating mode byte.
pub fn mode_name(mode: u8) -> &'static str {
    match mode {
        MODE_OFF => "off",
        MODE_NIGHT => "night",
        MODE_DAY => "day",
        MODE_ECO => "eco",
        MODE_PARTY => "party",
        _ => "unknown",
    }
}

/// Decode a validated KM-Bus long frame into the snapshot.
///
/// Only write-record frames long enough to carry a status record update the
/// channel arrays; anything else zeroes the channel counts.
pub(crate) fn decode_frame(frame: &[u8], snapshot: &mut TelemetrySnapshot) {
    let data_len = usize::from(frame [1]);
    let control = frame [4];

    if control == CMD_WRR_DAT && data_len >= 15 {
        decode_status_record(&frame [4..4 + data_len], snapshot);

        snapshot.temp_num = 5;
        snapshot.pump_num = 2;
        snapshot.relay_num = 1;
    } else {
        snapshot.temp_num = 0;
        snapshot.pump_num = 0;
        snapshot.relay_num = 0;
    }
}

/// Decode a status record (selectors 0x1C..=0x1F) into the KM view and
/// mirror it into the generic channel arrays.
fn decode_status_record(record: &[u8], snapshot: &mut TelemetrySnapshot) {
    let selector = record [3];
    if !(RECORD_MASTER_STATUS..=RECORD_CIRCUIT3_STATUS).contains(&selector) {
        return;
    }

    let burner_flags = record [4] ^ XOR_MASK;
    let pump_flags = record [11] ^ XOR_MASK;

    snapshot.km.burner = burner_flags & STATUS_BURNER != 0;
    snapshot.km.main_pump = pump_flags & STATUS_MAIN_PUMP != 0;
    snapshot.km.loop_pump = pump_flags & STATUS_LOOP_PUMP != 0;

    snapshot.km.boiler_temp = decode_temp(record [6]);
    snapshot.km.hot_water_temp = decode_temp(record [7]);
    snapshot.km.setpoint_temp = decode_temp(record [8]);
    snapshot.km.outdoor_temp = decode_temp(record [10]);
    snapshot.km.departure_temp = decode_temp(record [12]);

    // the mode byte is only valid when the gate byte decodes to zero
    if record [13] == XOR_MASK {
        snapshot.km.mode = record [14] ^ XOR_MASK;
    }

    snapshot.temp [0] = snapshot.km.boiler_temp;
    snapshot.temp [1] = snapshot.km.hot_water_temp;
    snapshot.temp [2] = snapshot.km.outdoor_temp;
    snapshot.temp [3] = snapshot.km.setpoint_temp;
    snapshot.temp [4] = snapshot.km.departure_temp;

    snapshot.pump [0] = if snapshot.km.main_pump { 100 } else { 0 };
    snapshot.pump [1] = if snapshot.km.loop_pump { 100 } else { 0 };

    snapshot.relay [0] = snapshot.km.burner;
}

/// Viessmann encodes KM-Bus temperatures with a 0.5 °C resolution.
fn decode_temp(encoded: u8) -> f32 {
    f32::from(encoded) * 0.5
}

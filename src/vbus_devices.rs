//! Device-specific field extractors for validated VBus frames.
//!
//! A VBus payload is a run of six-byte blocks (four data bytes, a septet
//! carrying their stripped MSBs, and a checksum). Because the sync byte is
//! not staged, the first block sits at buffer offset 9. Every extractor
//! injects the septet of a block before reading its data bytes and then
//! writes the decoded fields straight into the snapshot.

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    frame_buffer::FrameBuffer,
    snapshot::TelemetrySnapshot,
    utils::{calc_temp, septet_inject},
};

/// Source address of the Viessmann Vitosolic 200 controller.
pub const ADDR_VITOSOLIC_200: u16 = 0x1060;

/// Source address of the RESOL DeltaSol BX Plus controller.
pub const ADDR_DELTA_SOL_BX_PLUS: u16 = 0x7E11;

/// Source address of the RESOL DeltaSol BX controller.
pub const ADDR_DELTA_SOL_BX: u16 = 0x7E21;

/// Source address of the RESOL DeltaSol MX controller.
pub const ADDR_DELTA_SOL_MX: u16 = 0x7E31;

/// The channel configuration a bus address is known to report.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeviceProfile {
    /// Human-readable device name, empty for unknown addresses.
    pub name: &'static str,

    /// Number of temperature channels.
    pub temp_channels: u8,

    /// Number of pump channels.
    pub pump_channels: u8,

    /// Number of relay channels.
    pub relay_channels: u8,
}

/// Look up the channel configuration for a source address.
///
/// Unknown addresses get the conservative default of four temperatures and
/// two pump/relay channels, matching the generic extractor.
pub fn device_profile(address: u16) -> DeviceProfile {
    let (name, temp_channels, pump_channels, relay_channels) = match address {
        ADDR_VITOSOLIC_200 => ("Vitosolic 200", 12, 7, 7),
        ADDR_DELTA_SOL_BX_PLUS => ("DeltaSol BX Plus", 6, 2, 2),
        ADDR_DELTA_SOL_BX => ("DeltaSol BX", 6, 2, 2),
        ADDR_DELTA_SOL_MX => ("DeltaSol MX", 4, 4, 4),
        _ => ("", 4, 2, 2),
    };

    DeviceProfile {
        name,
        temp_channels,
        pump_channels,
        relay_channels,
    }
}

/// Dispatch a validated master-to-slave data frame to the extractor for its
/// source device.
pub(crate) fn dispatch(source_address: u16, buffer: &mut FrameBuffer, snapshot: &mut TelemetrySnapshot) {
    match source_address {
        ADDR_VITOSOLIC_200 => decode_vitosolic_200(buffer, snapshot),
        ADDR_DELTA_SOL_BX_PLUS | ADDR_DELTA_SOL_BX => decode_delta_sol_bx(buffer, snapshot),
        ADDR_DELTA_SOL_MX => decode_delta_sol_mx(buffer, snapshot),
        _ => decode_generic(buffer, snapshot),
    }
}

/// Injects the septet of the block at `offset` and returns its two
/// little-endian temperature readings.
fn temp_pair(buffer: &mut FrameBuffer, offset: usize) -> (f32, f32) {
    septet_inject(buffer, offset, 4);
    (
        calc_temp(buffer [offset + 1], buffer [offset]),
        calc_temp(buffer [offset + 3], buffer [offset + 2]),
    )
}

/// Generic extractor for RESOL controllers without a dedicated field map.
///
/// Temperature sensors 1 to 4 occupy the first two blocks on practically
/// every RESOL controller, so they can be decoded even when the rest of the
/// datagram format is unknown.
fn decode_generic(buffer: &mut FrameBuffer, snapshot: &mut TelemetrySnapshot) {
    snapshot.temp_num = 4;

    let (t0, t1) = temp_pair(buffer, 9);
    let (t2, t3) = temp_pair(buffer, 15);

    snapshot.temp [0] = t0;
    snapshot.temp [1] = t1;
    snapshot.temp [2] = t2;
    snapshot.temp [3] = t3;
}

/// Field map of the Vitosolic 200 (12 temperature sensors, 7 pump/relay
/// channels, error mask, system time, and system variant).
fn decode_vitosolic_200(buffer: &mut FrameBuffer, snapshot: &mut TelemetrySnapshot) {
    snapshot.temp_num = 12;
    snapshot.pump_num = 7;
    snapshot.relay_num = 7;

    for (pair, offset) in [ 9, 15, 21, 27, 33, 39 ].into_iter().enumerate() {
        let (first, second) = temp_pair(buffer, offset);
        snapshot.temp [pair * 2] = first;
        snapshot.temp [pair * 2 + 1] = second;
    }

    // pump duty cycles 1-4; the septet bit of each byte is an unused flag
    septet_inject(buffer, 75, 4);
    for i in 0..4 {
        snapshot.pump [i] = buffer [75 + i] & 0x7F;
    }

    // pump duty cycles 5-7
    septet_inject(buffer, 81, 4);
    for i in 0..3 {
        snapshot.pump [4 + i] = buffer [81 + i] & 0x7F;
    }

    // error mask and system time
    septet_inject(buffer, 87, 4);
    snapshot.error_mask = LittleEndian::read_u16(&buffer [87..89]);
    snapshot.system_time = LittleEndian::read_u16(&buffer [89..91]);

    // system variant
    septet_inject(buffer, 93, 4);
    snapshot.system_variant = buffer [93] & 0x7F;

    // the Vitosolic reports relays as duty cycles; 100 % means closed
    for i in 0..7 {
        snapshot.relay [i] = snapshot.pump [i] == 100;
    }
}

/// Field map of the DeltaSol BX / BX Plus (6 temperature sensors, 2 pump
/// channels, operating hours, and heat quantity).
fn decode_delta_sol_bx(buffer: &mut FrameBuffer, snapshot: &mut TelemetrySnapshot) {
    snapshot.temp_num = 6;
    snapshot.pump_num = 2;
    snapshot.relay_num = 2;

    for (pair, offset) in [ 9, 15, 21 ].into_iter().enumerate() {
        let (first, second) = temp_pair(buffer, offset);
        snapshot.temp [pair * 2] = first;
        snapshot.temp [pair * 2 + 1] = second;
    }

    septet_inject(buffer, 33, 4);
    snapshot.pump [0] = buffer [33] & 0x7F;
    snapshot.pump [1] = buffer [34] & 0x7F;
    snapshot.relay [0] = snapshot.pump [0] > 0;
    snapshot.relay [1] = snapshot.pump [1] > 0;

    septet_inject(buffer, 39, 4);
    snapshot.operating_hours [0] = u32::from(LittleEndian::read_u16(&buffer [39..41]));
    snapshot.operating_hours [1] = u32::from(LittleEndian::read_u16(&buffer [41..43]));

    septet_inject(buffer, 45, 4);
    snapshot.heat_quantity = LittleEndian::read_u16(&buffer [45..47]);
}

/// Field map of the DeltaSol MX (4 temperature sensors, 4 pump channels,
/// operating hours, heat quantity, and error mask).
fn decode_delta_sol_mx(buffer: &mut FrameBuffer, snapshot: &mut TelemetrySnapshot) {
    snapshot.temp_num = 4;
    snapshot.pump_num = 4;
    snapshot.relay_num = 4;

    for (pair, offset) in [ 9, 15 ].into_iter().enumerate() {
        let (first, second) = temp_pair(buffer, offset);
        snapshot.temp [pair * 2] = first;
        snapshot.temp [pair * 2 + 1] = second;
    }

    septet_inject(buffer, 21, 4);
    for i in 0..4 {
        snapshot.pump [i] = buffer [21 + i] & 0x7F;
        snapshot.relay [i] = snapshot.pump [i] > 0;
    }

    septet_inject(buffer, 27, 4);
    snapshot.operating_hours [0] = u32::from(LittleEndian::read_u16(&buffer [27..29]));
    snapshot.operating_hours [1] = u32::from(LittleEndian::read_u16(&buffer [29..31]));

    septet_inject(buffer, 33, 4);
    snapshot.heat_quantity = LittleEndian::read_u16(&buffer [33..35]);

    septet_inject(buffer, 39, 4);
    snapshot.error_mask = LittleEndian::read_u16(&buffer [39..41]);
}

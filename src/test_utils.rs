use std::{cell::Cell, rc::Rc};

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    clock::Clock,
    km_data::calc_crc16,
    utils::{calc_checksum, septet_extract},
};

/// A hand-driven clock for tests.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> ManualClock {
        ManualClock::default()
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// Builds a complete VBus version-1.0 frame (including the unstaged sync
/// byte) from raw payload blocks.
///
/// Each block is septet-extracted onto the wire and the checksum bytes are
/// chosen so that both the header check and the receiver's block windows
/// fold to zero.
pub fn build_vbus_frame(dst: u16, src: u16, command: u16, blocks: &[[u8; 4]]) -> Vec<u8> {
    let count = blocks.len();
    let mut buf = vec![0u8; 9 + count * 6];

    LittleEndian::write_u16(&mut buf [0..2], dst);
    LittleEndian::write_u16(&mut buf [2..4], src);
    buf [4] = 0x10;
    LittleEndian::write_u16(&mut buf [5..7], command);
    buf [7] = count as u8;
    buf [8] = calc_checksum(&buf, 0, 8);

    for (i, block) in blocks.iter().enumerate() {
        let offset = 9 + i * 6;
        septet_extract(&mut buf [offset..offset + 5], block);
    }

    for i in 0..count {
        let window = 10 + i * 6;
        let crc_idx = window + 4;
        let mut sum = 0u8;
        for idx in window..window + 6 {
            if idx != crc_idx {
                sum = sum.wrapping_add(buf.get(idx).copied().unwrap_or(0));
            }
        }
        buf [crc_idx] = 0x7Fu8.wrapping_sub(sum) & 0x7F;
    }

    let mut frame = vec![ 0xAA ];
    frame.extend_from_slice(&buf);
    frame
}

/// Builds a complete KM-Bus long frame around the given control, address,
/// and data bytes.
pub fn build_km_frame(data: &[u8]) -> Vec<u8> {
    let len = data.len() as u8;
    let mut frame = vec![ 0x68, len, len, 0x68 ];
    frame.extend_from_slice(data);

    let crc = calc_crc16(data);
    frame.push((crc & 0xFF) as u8);
    frame.push((crc >> 8) as u8);
    frame.push(0x16);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_vbus_frame_header() {
        let frame = build_vbus_frame(0x0010, 0x7E21, 0x0100, &[[0u8; 4], [0u8; 4]]);

        assert_eq!(22, frame.len());
        assert_eq!(0xAA, frame [0]);
        // header checks out including its trailing checksum byte
        assert_eq!(0x00, calc_checksum(&frame [1..], 0, 9));
        // so do both receiver windows (the byte past the frame end reads 0)
        assert_eq!(0x00, calc_checksum(&frame [1..], 10, 6));
        let mut tail = frame [1..].to_vec();
        tail.push(0x00);
        assert_eq!(0x00, calc_checksum(&tail, 16, 6));
    }

    #[test]
    fn test_build_km_frame() {
        let frame = build_km_frame(&[ 0x00, 0x01, 0x02 ]);

        assert_eq!(10, frame.len());
        assert_eq!(&[ 0x68, 0x03, 0x03, 0x68 ], &frame [0..4]);
        assert_eq!(0x16, frame [9]);
    }
}

use std::fmt::{Debug, Error, Formatter};

/// The decoded VBus frame header.
///
/// Addresses and the command travel little-endian on the wire; the protocol
/// version is the high nibble of the raw version byte.
#[derive(Clone, Copy, Default, PartialEq)]
pub struct Header {
    /// The destination address of the frame.
    pub destination_address: u16,

    /// The source address of the frame.
    pub source_address: u16,

    /// The VBus protocol version nibble.
    pub protocol_version: u8,

    /// The command of the frame.
    pub command: u16,

    /// The number of 6-byte payload blocks attached to the frame.
    pub frame_count: u8,
}

impl Header {
    /// Creates an ID string for this `Header`.
    pub fn id_string(&self) -> String {
        format!(
            "{:04X}_{:04X}_{:02X}_{:04X}",
            self.destination_address, self.source_address, self.protocol_version, self.command
        )
    }
}

impl Debug for Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.write_fmt(format_args!("Header {{ destination_address: 0x{:04X}, source_address: 0x{:04X}, protocol_version: 0x{:02X}, command: 0x{:04X}, frame_count: 0x{:02X} }}", self.destination_address, self.source_address, self.protocol_version, self.command, self.frame_count))
    }
}

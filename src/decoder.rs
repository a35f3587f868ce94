use byteorder::{ByteOrder, LittleEndian};
use log::{debug, trace};

use crate::{
    byte_source::ByteSource,
    clock::Clock,
    frame_buffer::FrameBuffer,
    header::Header,
    km_data, kw_data, p300_data,
    participant::{Participant, ParticipantRegistry},
    protocol::Protocol,
    snapshot::TelemetrySnapshot,
    utils::{calc_checksum, sum_checksum, xor_checksum},
    vbus_devices,
};

/// VBus frame start marker; not staged into the frame buffer.
const VBUS_SYNC_BYTE: u8 = 0xAA;

/// VBus command carrying master-to-slave payload data.
const VBUS_CMD_DATA: u16 = 0x0100;

/// KW-Bus frame start marker.
const KW_SYNC_BYTE: u8 = 0x01;

/// P300 start markers (response and request direction).
const P300_SYNC_BYTES: [u8; 2] = [ 0x05, 0x01 ];

/// KM-Bus long-frame start marker.
const KM_SYNC_BYTE: u8 = 0x68;

/// KM-Bus long-frame terminator.
const KM_STOP_BYTE: u8 = 0x16;

/// A bus with no accepted frame for this long is flagged as faulty.
const SILENCE_TIMEOUT_MS: u64 = 20_000;

#[derive(Clone, Copy, Debug, PartialEq)]
enum State {
    Sync,
    Receive,
    Decode,
    Error,
}

/// The multi-protocol frame decoder.
///
/// A decoder is bound to a byte source, a clock, and one fixed [`Protocol`]
/// at construction. Driving it is cooperative: call [`tick`](Self::tick)
/// periodically (nominally at 100 Hz or faster); each call runs one state
/// handler, consumes at most the bytes currently available, and never
/// blocks. Decoded telemetry is polled through
/// [`snapshot`](Self::snapshot); framing problems are surfaced through the
/// snapshot's `bus_ok`/`is_ready` flags, never as errors from `tick`.
#[derive(Debug)]
pub struct BusDecoder<S: ByteSource, C: Clock> {
    source: S,
    clock: C,
    protocol: Protocol,
    state: State,
    buffer: FrameBuffer,
    header: Header,
    frame_len: u16,
    last_progress: u64,
    snapshot: TelemetrySnapshot,
    registry: ParticipantRegistry,
}

impl<S: ByteSource, C: Clock> BusDecoder<S, C> {
    /// Constructs a decoder bound to `source` and `clock`, speaking
    /// `protocol`.
    pub fn new(source: S, clock: C, protocol: Protocol) -> BusDecoder<S, C> {
        let last_progress = clock.now_ms();
        BusDecoder {
            source,
            clock,
            protocol,
            state: State::Sync,
            buffer: FrameBuffer::new(),
            header: Header::default(),
            frame_len: 0,
            last_progress,
            snapshot: TelemetrySnapshot::new(protocol),
            registry: ParticipantRegistry::new(),
        }
    }

    /// The protocol this decoder is bound to.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Read access to the decoded telemetry.
    pub fn snapshot(&self) -> &TelemetrySnapshot {
        &self.snapshot
    }

    /// True once at least one frame has been successfully decoded.
    pub fn is_ready(&self) -> bool {
        self.snapshot.ready
    }

    /// False when the decoder hit an error since the last successful frame.
    pub fn bus_ok(&self) -> bool {
        self.snapshot.bus_ok
    }

    /// The most recently decoded frame header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The source address of the most recently decoded frame.
    pub fn current_source_address(&self) -> u16 {
        self.header.source_address
    }

    /// Read access to the byte source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the byte source, e.g. to feed a
    /// [`StreamBuffer`](crate::StreamBuffer).
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Read access to the participant registry.
    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    /// Enables or disables automatic registration of frame sources.
    pub fn enable_auto_discovery(&mut self, enable: bool) {
        self.registry.enable_auto_discovery(enable);
    }

    /// Whether frame sources are registered automatically.
    pub fn is_auto_discovery_enabled(&self) -> bool {
        self.registry.is_auto_discovery_enabled()
    }

    /// Number of registered participants.
    pub fn participant_count(&self) -> usize {
        self.registry.len()
    }

    /// The participant at insertion position `idx`.
    pub fn participant(&self, idx: usize) -> Option<&Participant> {
        self.registry.get(idx)
    }

    /// The participant registered for `address`.
    pub fn participant_by_address(&self, address: u16) -> Option<&Participant> {
        self.registry.by_address(address)
    }

    /// Registers or updates a participant explicitly. See
    /// [`ParticipantRegistry::add`].
    pub fn add_participant(
        &mut self,
        address: u16,
        name: Option<&str>,
        temp_channels: u8,
        pump_channels: u8,
        relay_channels: u8,
    ) -> bool {
        let now = self.clock.now_ms();
        self.registry.add(address, name, temp_channels, pump_channels, relay_channels, now)
    }

    /// Removes the participant registered for `address`.
    pub fn remove_participant(&mut self, address: u16) -> bool {
        self.registry.remove(address)
    }

    /// Removes all participants.
    pub fn clear_participants(&mut self) {
        self.registry.clear();
    }

    /// Runs one step of the decoder state machine.
    pub fn tick(&mut self) {
        match self.state {
            State::Sync => match self.protocol {
                Protocol::VBus => self.vbus_sync(),
                Protocol::Kw => self.kw_sync(),
                Protocol::P300 => self.p300_sync(),
                Protocol::Km => self.km_sync(),
            },
            State::Receive => match self.protocol {
                Protocol::VBus => self.vbus_receive(),
                Protocol::Kw => self.kw_receive(),
                Protocol::P300 => self.p300_receive(),
                Protocol::Km => self.km_receive(),
            },
            State::Decode => match self.protocol {
                Protocol::VBus => self.vbus_decode(),
                Protocol::Kw => self.kw_decode(),
                Protocol::P300 => self.p300_decode(),
                Protocol::Km => self.km_decode(),
            },
            State::Error => self.error_recover(),
        }
    }

    /// Marks a completed frame and hands over to the Decode handler.
    fn enter_decode(&mut self) {
        trace!("{}: frame complete ({} bytes)", self.protocol, self.buffer.len());
        self.last_progress = self.clock.now_ms();
        self.snapshot.bus_ok = true;
        self.state = State::Decode;
    }

    fn timed_out(&self) -> bool {
        self.clock.now_ms().saturating_sub(self.last_progress) > SILENCE_TIMEOUT_MS
    }

    /// Flags the bus fault and rearms the sync scan. A sync byte in the
    /// incoming stream recovers the decoder automatically.
    fn error_recover(&mut self) {
        trace!("{}: bus error, waiting for resync", self.protocol);
        self.snapshot.bus_ok = false;
        self.snapshot.ready = false;
        self.buffer.clear();
        self.state = State::Sync;
    }

    fn registry_touch(&mut self, address: u16) {
        if self.registry.is_auto_discovery_enabled() && address != 0 {
            let now = self.clock.now_ms();
            self.registry.touch(address, now);
        }
    }

    // --- VBus -----------------------------------------------------------

    fn vbus_sync(&mut self) {
        if self.timed_out() {
            self.state = State::Error;
        }
        if self.source.available() > 0 {
            if let Some(byte) = self.source.read() {
                if byte == VBUS_SYNC_BYTE {
                    self.buffer.clear();
                    self.header = Header::default();
                    self.frame_len = 0;
                    self.state = State::Receive;
                }
            }
        }
    }

    fn vbus_receive(&mut self) {
        while self.source.available() > 0 {
            let byte = match self.source.read() {
                Some(byte) => byte,
                None => break,
            };

            // a set MSB is only legal inside the sync byte
            if byte >= 0x80 {
                debug!("vbus: payload byte 0x{:02X} has its MSB set", byte);
                self.state = State::Error;
                return;
            }

            if !self.buffer.push(byte) {
                debug!("vbus: frame buffer overflow");
                self.state = State::Error;
                return;
            }
        }

        if self.buffer.len() > 10 && self.header.frame_count == 0 {
            self.decode_vbus_header();

            // only protocol version 1.0 is decoded; anything else is
            // silently dropped
            if self.header.protocol_version != 1 {
                self.state = State::Sync;
                return;
            }

            if calc_checksum(&self.buffer, 0, 9) != 0 {
                debug!("vbus: header checksum mismatch");
                self.state = State::Error;
                return;
            }
        }

        if self.frame_len > 0 && self.buffer.len() + 1 == usize::from(self.frame_len) {
            for i in 0..usize::from(self.header.frame_count) {
                let offset = i * 6 + 10;
                if offset + 6 > FrameBuffer::CAPACITY || calc_checksum(&self.buffer, offset, 6) != 0 {
                    debug!("vbus: block {} checksum mismatch", i);
                    self.state = State::Error;
                    return;
                }
            }
            self.enter_decode();
        }
    }

    fn decode_vbus_header(&mut self) {
        self.header = Header {
            destination_address: LittleEndian::read_u16(&self.buffer [0..2]),
            source_address: LittleEndian::read_u16(&self.buffer [2..4]),
            protocol_version: self.buffer [4] >> 4,
            command: LittleEndian::read_u16(&self.buffer [5..7]),
            frame_count: self.buffer [7],
        };
        self.frame_len = u16::from(self.buffer [7]) * 6 + 10;
    }

    fn vbus_decode(&mut self) {
        // only master-to-slave data frames carry the field maps; everything
        // else is dropped without touching the snapshot
        if self.header.command == VBUS_CMD_DATA {
            vbus_devices::dispatch(self.header.source_address, &mut self.buffer, &mut self.snapshot);
            self.registry_touch(self.header.source_address);
            self.snapshot.ready = true;
        }
        self.state = State::Sync;
    }

    // --- KW-Bus (VS1) ---------------------------------------------------

    fn kw_sync(&mut self) {
        if self.timed_out() {
            self.state = State::Error;
        }
        if self.source.available() > 0 {
            if let Some(byte) = self.source.read() {
                if byte == KW_SYNC_BYTE {
                    self.buffer.clear();
                    self.buffer.push(byte);
                    self.state = State::Receive;
                }
            }
        }
    }

    fn kw_receive(&mut self) {
        while self.source.available() > 0 {
            let byte = match self.source.read() {
                Some(byte) => byte,
                None => break,
            };

            if !self.buffer.push(byte) {
                debug!("kw: frame buffer overflow");
                self.state = State::Error;
                return;
            }

            let len = self.buffer.len();
            if len >= 2 {
                let expected = usize::from(self.buffer [1]);
                if len >= expected + 3 {
                    if xor_checksum(&self.buffer [..len - 1]) == self.buffer [len - 1] {
                        self.enter_decode();
                    } else {
                        debug!("kw: checksum mismatch");
                        self.state = State::Error;
                    }
                    return;
                }
            }
        }
    }

    fn kw_decode(&mut self) {
        kw_data::decode_generic(&self.buffer, &mut self.snapshot);
        self.snapshot.ready = true;
        self.state = State::Sync;
    }

    // --- P300 (VS2 / Optolink) ------------------------------------------

    fn p300_sync(&mut self) {
        if self.timed_out() {
            self.state = State::Error;
        }
        if self.source.available() > 0 {
            if let Some(byte) = self.source.read() {
                if P300_SYNC_BYTES.contains(&byte) {
                    self.buffer.clear();
                    self.buffer.push(byte);
                    self.state = State::Receive;
                }
            }
        }
    }

    fn p300_receive(&mut self) {
        while self.source.available() > 0 {
            let byte = match self.source.read() {
                Some(byte) => byte,
                None => break,
            };

            if !self.buffer.push(byte) {
                debug!("p300: frame buffer overflow");
                self.state = State::Error;
                return;
            }

            let len = self.buffer.len();
            if len >= 3 {
                let expected = usize::from(self.buffer [1]);
                if len >= expected + 3 {
                    if sum_checksum(&self.buffer [..len - 1]) == self.buffer [len - 1] {
                        self.enter_decode();
                    } else {
                        debug!("p300: checksum mismatch");
                        self.state = State::Error;
                    }
                    return;
                }
            }
        }
    }

    fn p300_decode(&mut self) {
        p300_data::decode_generic(&self.buffer, &mut self.snapshot);
        self.snapshot.ready = true;
        self.state = State::Sync;
    }

    // --- KM-Bus ---------------------------------------------------------

    fn km_sync(&mut self) {
        if self.timed_out() {
            self.state = State::Error;
        }
        if self.source.available() > 0 {
            if let Some(byte) = self.source.read() {
                if byte == KM_SYNC_BYTE {
                    self.buffer.clear();
                    self.buffer.push(byte);
                    self.state = State::Receive;
                }
            }
        }
    }

    fn km_receive(&mut self) {
        while self.source.available() > 0 {
            let byte = match self.source.read() {
                Some(byte) => byte,
                None => break,
            };

            if !self.buffer.push(byte) {
                debug!("km: frame buffer overflow");
                self.state = State::Error;
                return;
            }

            let len = self.buffer.len();
            if len < 4 {
                continue;
            }

            if self.buffer [3] != KM_SYNC_BYTE {
                debug!("km: second start marker missing");
                self.state = State::Error;
                return;
            }
            if self.buffer [1] != self.buffer [2] {
                debug!("km: length bytes disagree");
                self.state = State::Error;
                return;
            }

            let data_len = usize::from(self.buffer [1]);
            if len >= data_len + 7 {
                if self.buffer [len - 1] != KM_STOP_BYTE {
                    debug!("km: stop byte missing");
                    self.state = State::Error;
                    return;
                }

                let calculated = km_data::calc_crc16(&self.buffer [4..4 + data_len]);
                let received = LittleEndian::read_u16(&self.buffer [len - 3..len - 1]);
                if calculated != received {
                    debug!("km: crc mismatch (calculated 0x{:04X}, received 0x{:04X})", calculated, received);
                    self.state = State::Error;
                    return;
                }

                self.enter_decode();
                return;
            }
        }
    }

    fn km_decode(&mut self) {
        let address = u16::from(self.buffer [5]);
        self.header.source_address = address;
        self.registry_touch(address);

        km_data::decode_frame(&self.buffer, &mut self.snapshot);
        self.snapshot.ready = true;
        self.state = State::Sync;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        byte_source::StreamBuffer,
        km_data::{CMD_WRR_DAT, RECORD_MASTER_STATUS, XOR_MASK},
        test_utils::{build_km_frame, build_vbus_frame, ManualClock},
        vbus_devices::{ADDR_DELTA_SOL_BX, ADDR_DELTA_SOL_BX_PLUS, ADDR_DELTA_SOL_MX, ADDR_VITOSOLIC_200},
    };

    fn decoder(protocol: Protocol) -> (BusDecoder<StreamBuffer, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let decoder = BusDecoder::new(StreamBuffer::new(), clock.clone(), protocol);
        (decoder, clock)
    }

    fn feed_and_settle(decoder: &mut BusDecoder<StreamBuffer, ManualClock>, bytes: &[u8]) {
        decoder.source_mut().feed(bytes);
        for _ in 0..600 {
            decoder.tick();
        }
    }

    fn status_record() -> Vec<u8> {
        vec![
            CMD_WRR_DAT,
            0x00,
            0x00,
            RECORD_MASTER_STATUS,
            0x04 ^ XOR_MASK,
            XOR_MASK,
            120 ^ XOR_MASK,
            100 ^ XOR_MASK,
            80 ^ XOR_MASK,
            XOR_MASK,
            40 ^ XOR_MASK,
            0xC0 ^ XOR_MASK,
            110 ^ XOR_MASK,
            XOR_MASK,
            0x84 ^ XOR_MASK,
        ]
    }

    #[test]
    fn test_vbus_decodes_delta_sol_bx_frame() {
        let (mut decoder, _clock) = decoder(Protocol::VBus);
        let frame = build_vbus_frame(0x0010, ADDR_DELTA_SOL_BX, 0x0100, &[
            [ 0x20, 0x00, 0x40, 0x00 ],
            [ 0x00, 0x00, 0x00, 0x00 ],
        ]);

        decoder.source_mut().feed(&frame);
        decoder.tick(); // sync byte
        decoder.tick(); // receive the remaining 21 bytes
        decoder.tick(); // decode

        assert_eq!(State::Sync, decoder.state);
        assert_eq!(true, decoder.is_ready());
        assert_eq!(true, decoder.bus_ok());
        assert_eq!(ADDR_DELTA_SOL_BX, decoder.current_source_address());
        assert_eq!(1, decoder.header().protocol_version);
        assert_eq!("0010_7E21_01_0100", decoder.header().id_string());

        let snapshot = decoder.snapshot();
        assert_eq!(6, snapshot.temp_num());
        assert_eq!(3.2, snapshot.temp(0));
        assert_eq!(6.4, snapshot.temp(1));
        assert_eq!(0.0, snapshot.temp(2));
        assert_eq!(false, snapshot.relay(0));
        assert_eq!(false, snapshot.relay(1));
    }

    #[test]
    fn test_vbus_header_is_decoded_after_eleven_bytes() {
        let (mut decoder, _clock) = decoder(Protocol::VBus);
        let frame = build_vbus_frame(0x0010, ADDR_DELTA_SOL_BX, 0x0100, &[
            [ 0x20, 0x00, 0x40, 0x00 ],
            [ 0x00, 0x00, 0x00, 0x00 ],
        ]);

        feed_and_settle(&mut decoder, &frame [0..12]);

        assert_eq!(State::Receive, decoder.state);
        assert_eq!(ADDR_DELTA_SOL_BX, decoder.header().source_address);
        assert_eq!(0x0100, decoder.header().command);
        assert_eq!(false, decoder.is_ready());

        feed_and_settle(&mut decoder, &frame [12..]);

        assert_eq!(true, decoder.is_ready());
    }

    #[test]
    fn test_vbus_vitosolic_200_field_map() {
        let (mut decoder, _clock) = decoder(Protocol::VBus);

        // 15 blocks cover the field map up to the system variant
        let mut blocks = vec![[0u8; 4]; 15];
        blocks [0] = [ 0x2B, 0x02, 0x38, 0xFF ]; // 55.5 °C and -20.0 °C
        blocks [5] = [ 0xD2, 0x00, 0x00, 0x00 ]; // sensor 11: 21.0 °C
        blocks [11] = [ 100, 50, 0, 0 ];
        blocks [12] = [ 0, 0, 25, 0 ];
        blocks [13] = [ 0x03, 0x00, 0x22, 0x02 ];
        blocks [14] = [ 0x05, 0x00, 0x00, 0x00 ];
        let frame = build_vbus_frame(0x0010, ADDR_VITOSOLIC_200, 0x0100, &blocks);

        feed_and_settle(&mut decoder, &frame);

        let snapshot = decoder.snapshot();
        assert_eq!(true, decoder.is_ready());
        assert_eq!(12, snapshot.temp_num());
        assert_eq!(7, snapshot.pump_num());
        assert_eq!(7, snapshot.relay_num());
        assert_eq!(55.5, snapshot.temp(0));
        assert_eq!(-20.0, snapshot.temp(1));
        assert_eq!(21.0, snapshot.temp(10));
        assert_eq!(100, snapshot.pump(0));
        assert_eq!(50, snapshot.pump(1));
        assert_eq!(25, snapshot.pump(6));
        assert_eq!(true, snapshot.relay(0));
        assert_eq!(false, snapshot.relay(1));
        assert_eq!(0x0003, snapshot.error_mask());
        assert_eq!(0x0222, snapshot.system_time());
        assert_eq!(0x05, snapshot.system_variant());
    }

    #[test]
    fn test_vbus_delta_sol_bx_extended_fields() {
        let (mut decoder, _clock) = decoder(Protocol::VBus);

        let mut blocks = vec![[0u8; 4]; 7];
        blocks [0] = [ 0xF0, 0x00, 0x00, 0x00 ]; // 24.0 °C
        blocks [4] = [ 30, 0, 0, 0 ];
        blocks [5] = [ 0x10, 0x00, 0x20, 0x00 ];
        blocks [6] = [ 0xE8, 0x03, 0x00, 0x00 ];
        let frame = build_vbus_frame(0x0010, ADDR_DELTA_SOL_BX_PLUS, 0x0100, &blocks);

        feed_and_settle(&mut decoder, &frame);

        let snapshot = decoder.snapshot();
        assert_eq!(6, snapshot.temp_num());
        assert_eq!(24.0, snapshot.temp(0));
        assert_eq!(30, snapshot.pump(0));
        assert_eq!(true, snapshot.relay(0));
        assert_eq!(false, snapshot.relay(1));
        assert_eq!(16, snapshot.operating_hours(0));
        assert_eq!(32, snapshot.operating_hours(1));
        assert_eq!(1000, snapshot.heat_quantity());
    }

    #[test]
    fn test_vbus_delta_sol_mx_field_map() {
        let (mut decoder, _clock) = decoder(Protocol::VBus);

        let mut blocks = vec![[0u8; 4]; 6];
        blocks [0] = [ 0x20, 0x00, 0x40, 0x00 ];
        blocks [2] = [ 0, 40, 0, 80 ];
        blocks [3] = [ 0x08, 0x00, 0x09, 0x00 ];
        blocks [4] = [ 0x64, 0x00, 0x00, 0x00 ];
        blocks [5] = [ 0x01, 0x00, 0x00, 0x00 ];
        let frame = build_vbus_frame(0x0010, ADDR_DELTA_SOL_MX, 0x0100, &blocks);

        feed_and_settle(&mut decoder, &frame);

        let snapshot = decoder.snapshot();
        assert_eq!(4, snapshot.temp_num());
        assert_eq!(4, snapshot.pump_num());
        assert_eq!(3.2, snapshot.temp(0));
        assert_eq!(6.4, snapshot.temp(1));
        assert_eq!(0, snapshot.pump(0));
        assert_eq!(40, snapshot.pump(1));
        assert_eq!(80, snapshot.pump(3));
        assert_eq!(false, snapshot.relay(0));
        assert_eq!(true, snapshot.relay(1));
        assert_eq!(true, snapshot.relay(3));
        assert_eq!(8, snapshot.operating_hours(0));
        assert_eq!(9, snapshot.operating_hours(1));
        assert_eq!(100, snapshot.heat_quantity());
        assert_eq!(0x0001, snapshot.error_mask());
    }

    #[test]
    fn test_vbus_generic_device() {
        let (mut decoder, _clock) = decoder(Protocol::VBus);
        let frame = build_vbus_frame(0x0010, 0x4214, 0x0100, &[
            [ 0x20, 0x00, 0x40, 0x00 ],
            [ 0x38, 0xFF, 0x00, 0x00 ],
        ]);

        feed_and_settle(&mut decoder, &frame);

        let snapshot = decoder.snapshot();
        assert_eq!(4, snapshot.temp_num());
        assert_eq!(3.2, snapshot.temp(0));
        assert_eq!(-20.0, snapshot.temp(2));
    }

    #[test]
    fn test_vbus_drops_non_data_commands() {
        let (mut decoder, _clock) = decoder(Protocol::VBus);
        let frame = build_vbus_frame(0x0010, ADDR_DELTA_SOL_BX, 0x0200, &[[0u8; 4]]);

        feed_and_settle(&mut decoder, &frame);

        assert_eq!(State::Sync, decoder.state);
        assert_eq!(false, decoder.is_ready());
        assert_eq!(true, decoder.bus_ok());
        assert_eq!(0, decoder.participant_count());
    }

    #[test]
    fn test_vbus_discards_other_protocol_versions() {
        let (mut decoder, _clock) = decoder(Protocol::VBus);
        let mut frame = build_vbus_frame(0x0010, ADDR_DELTA_SOL_BX, 0x0100, &[[0u8; 4]]);
        frame [5] = 0x20; // protocol version 2.0

        feed_and_settle(&mut decoder, &frame);

        assert_eq!(false, decoder.is_ready());
        assert_eq!(true, decoder.bus_ok());
    }

    #[test]
    fn test_vbus_corrupt_payload_byte_recovers() {
        let (mut decoder, _clock) = decoder(Protocol::VBus);
        let frame = build_vbus_frame(0x0010, ADDR_DELTA_SOL_BX, 0x0100, &[
            [ 0x20, 0x00, 0x40, 0x00 ],
            [ 0x00, 0x00, 0x00, 0x00 ],
        ]);

        feed_and_settle(&mut decoder, &frame);
        assert_eq!(true, decoder.is_ready());

        let mut corrupt = frame.clone();
        corrupt [11] = 0x85;
        feed_and_settle(&mut decoder, &corrupt);

        assert_eq!(false, decoder.is_ready());
        assert_eq!(false, decoder.bus_ok());

        feed_and_settle(&mut decoder, &frame);

        assert_eq!(true, decoder.is_ready());
        assert_eq!(true, decoder.bus_ok());
    }

    #[test]
    fn test_vbus_header_checksum_mismatch() {
        let (mut decoder, _clock) = decoder(Protocol::VBus);
        let frame = build_vbus_frame(0x0010, ADDR_DELTA_SOL_BX, 0x0100, &[[0u8; 4]]);

        let mut corrupt = frame.clone();
        corrupt [9] = (corrupt [9] + 1) & 0x7F;
        feed_and_settle(&mut decoder, &corrupt);

        assert_eq!(false, decoder.bus_ok());
        assert_eq!(false, decoder.is_ready());

        feed_and_settle(&mut decoder, &frame);

        assert_eq!(true, decoder.is_ready());
        assert_eq!(true, decoder.bus_ok());
    }

    #[test]
    fn test_vbus_block_checksum_mismatch() {
        let (mut decoder, _clock) = decoder(Protocol::VBus);
        let mut frame = build_vbus_frame(0x0010, ADDR_DELTA_SOL_BX, 0x0100, &[
            [ 0x20, 0x00, 0x40, 0x00 ],
            [ 0x00, 0x00, 0x00, 0x00 ],
        ]);
        frame [11] = (frame [11] + 1) & 0x7F;

        feed_and_settle(&mut decoder, &frame);

        assert_eq!(false, decoder.bus_ok());
        assert_eq!(false, decoder.is_ready());
    }

    #[test]
    fn test_vbus_garbage_never_reports_ready() {
        let (mut decoder, _clock) = decoder(Protocol::VBus);
        let garbage: Vec<u8> = (0u8..=0x7Fu8).chain(0..=0x7F).collect();

        feed_and_settle(&mut decoder, &garbage);

        assert_eq!(false, decoder.is_ready());
    }

    #[test]
    fn test_vbus_participant_discovery() {
        let (mut decoder, clock) = decoder(Protocol::VBus);
        let blocks = [[0u8; 4], [0u8; 4]];

        for (ms, src) in [ (10, ADDR_VITOSOLIC_200), (20, ADDR_DELTA_SOL_MX), (30, 0x4214) ] {
            clock.set(ms);
            let frame = build_vbus_frame(0x0010, src, 0x0100, &blocks);
            feed_and_settle(&mut decoder, &frame);
        }

        assert_eq!(3, decoder.participant_count());
        assert_eq!(ADDR_VITOSOLIC_200, decoder.participant(0).unwrap().address());
        assert_eq!(ADDR_DELTA_SOL_MX, decoder.participant(1).unwrap().address());
        assert_eq!(0x4214, decoder.participant(2).unwrap().address());
        assert_eq!("Vitosolic 200", decoder.participant(0).unwrap().name());
        assert_eq!(true, decoder.participant(2).unwrap().is_auto_detected());
        assert_eq!(4, decoder.participant(2).unwrap().temp_channels());
        assert_eq!(0x4214, decoder.current_source_address());

        // a repeated sighting refreshes the entry instead of duplicating it
        clock.set(40);
        let frame = build_vbus_frame(0x0010, ADDR_VITOSOLIC_200, 0x0100, &blocks);
        feed_and_settle(&mut decoder, &frame);

        assert_eq!(3, decoder.participant_count());
        assert_eq!(40, decoder.participant_by_address(ADDR_VITOSOLIC_200).unwrap().last_seen_ms());
    }

    #[test]
    fn test_auto_discovery_can_be_disabled() {
        let (mut decoder, _clock) = decoder(Protocol::VBus);
        decoder.enable_auto_discovery(false);

        assert_eq!(false, decoder.is_auto_discovery_enabled());

        let frame = build_vbus_frame(0x0010, ADDR_DELTA_SOL_BX, 0x0100, &[[0u8; 4], [0u8; 4]]);
        feed_and_settle(&mut decoder, &frame);

        assert_eq!(true, decoder.is_ready());
        assert_eq!(0, decoder.participant_count());
    }

    #[test]
    fn test_explicit_participant_management() {
        let (mut decoder, _clock) = decoder(Protocol::VBus);

        for addr in 1..=16u16 {
            assert_eq!(true, decoder.add_participant(addr, None, 4, 2, 2));
        }
        assert_eq!(false, decoder.add_participant(17, None, 4, 2, 2));
        assert_eq!(16, decoder.participant_count());

        assert_eq!(true, decoder.remove_participant(1));
        assert_eq!(15, decoder.participant_count());

        decoder.clear_participants();
        assert_eq!(0, decoder.participant_count());
    }

    #[test]
    fn test_silence_timeout_boundary() {
        let (mut decoder, clock) = decoder(Protocol::VBus);

        clock.set(20_000);
        decoder.tick();
        decoder.tick();
        assert_eq!(true, decoder.bus_ok());

        clock.advance(1);
        decoder.tick(); // sync handler arms the error state
        decoder.tick(); // error handler flags the fault
        assert_eq!(false, decoder.bus_ok());
        assert_eq!(false, decoder.is_ready());

        // the next valid frame restores both flags
        let frame = build_vbus_frame(0x0010, ADDR_DELTA_SOL_BX, 0x0100, &[[0u8; 4], [0u8; 4]]);
        feed_and_settle(&mut decoder, &frame);

        assert_eq!(true, decoder.bus_ok());
        assert_eq!(true, decoder.is_ready());
    }

    #[test]
    fn test_kw_frame_decodes() {
        let (mut decoder, _clock) = decoder(Protocol::Kw);

        feed_and_settle(&mut decoder, &[ 0x01, 0x03, 0x10, 0x00, 0x10, 0x02 ]);

        assert_eq!(State::Sync, decoder.state);
        assert_eq!(true, decoder.is_ready());
        assert_eq!(true, decoder.bus_ok());
        assert_eq!(1, decoder.snapshot().temp_num());
        assert_eq!(1.6, decoder.snapshot().temp(0));
    }

    #[test]
    fn test_kw_checksum_mismatch() {
        let (mut decoder, _clock) = decoder(Protocol::Kw);

        feed_and_settle(&mut decoder, &[ 0x01, 0x03, 0x10, 0x00, 0x10, 0x55 ]);

        assert_eq!(false, decoder.is_ready());
        assert_eq!(false, decoder.bus_ok());
    }

    #[test]
    fn test_kw_oversized_frame_is_flagged() {
        let (mut decoder, _clock) = decoder(Protocol::Kw);
        let mut stream = vec![ 0x01, 0xFF ];
        stream.extend_from_slice(&[0u8; 260]);

        feed_and_settle(&mut decoder, &stream);

        assert_eq!(false, decoder.bus_ok());
        assert_eq!(false, decoder.is_ready());
    }

    #[test]
    fn test_p300_frame_decodes() {
        let (mut decoder, _clock) = decoder(Protocol::P300);

        feed_and_settle(&mut decoder, &[ 0x05, 0x05, 0x01, 0x23, 0x45, 0x00, 0x10, 0x83 ]);

        assert_eq!(true, decoder.is_ready());
        assert_eq!(1.6, decoder.snapshot().temp(0));
    }

    #[test]
    fn test_p300_accepts_both_sync_bytes() {
        let (mut decoder, _clock) = decoder(Protocol::P300);

        // 0x01 request-direction start byte
        feed_and_settle(&mut decoder, &[ 0x01, 0x05, 0x01, 0x23, 0x45, 0x00, 0x20, 0x8F ]);

        assert_eq!(true, decoder.is_ready());
        assert_eq!(3.2, decoder.snapshot().temp(0));
    }

    #[test]
    fn test_p300_checksum_mismatch() {
        let (mut decoder, _clock) = decoder(Protocol::P300);

        feed_and_settle(&mut decoder, &[ 0x05, 0x05, 0x01, 0x23, 0x45, 0x00, 0x10, 0x84 ]);

        assert_eq!(false, decoder.is_ready());
        assert_eq!(false, decoder.bus_ok());
    }

    #[test]
    fn test_km_status_record_decodes() {
        let (mut decoder, _clock) = decoder(Protocol::Km);
        let frame = build_km_frame(&status_record());

        feed_and_settle(&mut decoder, &frame);

        assert_eq!(State::Sync, decoder.state);
        assert_eq!(true, decoder.is_ready());
        assert_eq!(true, decoder.bus_ok());

        let km = decoder.snapshot().km();
        assert_eq!(true, km.burner());
        assert_eq!(true, km.main_pump());
        assert_eq!(true, km.loop_pump());
        assert_eq!(60.0, km.boiler_temp());
        assert_eq!(50.0, km.hot_water_temp());
        assert_eq!(20.0, km.outdoor_temp());
        assert_eq!(40.0, km.setpoint_temp());
        assert_eq!(55.0, km.departure_temp());
        assert_eq!(0x84, km.mode());

        assert_eq!(5, decoder.snapshot().temp_num());
        assert_eq!(60.0, decoder.snapshot().temp(0));
        assert_eq!(100, decoder.snapshot().pump(0));
        assert_eq!(true, decoder.snapshot().relay(0));
    }

    #[test]
    fn test_km_minimum_frame_passes_crc() {
        let (mut decoder, _clock) = decoder(Protocol::Km);
        let frame = build_km_frame(&[ 0x00, 0x11, 0x02 ]);

        feed_and_settle(&mut decoder, &frame);

        assert_eq!(true, decoder.is_ready());
        assert_eq!(true, decoder.bus_ok());
        assert_eq!(0, decoder.snapshot().temp_num());
        // the address byte feeds discovery
        assert_eq!(0x0011, decoder.current_source_address());
        assert_eq!(1, decoder.participant_count());
    }

    #[test]
    fn test_km_second_start_marker_missing() {
        let (mut decoder, _clock) = decoder(Protocol::Km);
        let mut frame = build_km_frame(&status_record());
        frame [3] = 0x00;

        feed_and_settle(&mut decoder, &frame);

        assert_eq!(false, decoder.bus_ok());
    }

    #[test]
    fn test_km_length_bytes_disagree() {
        let (mut decoder, _clock) = decoder(Protocol::Km);
        let mut frame = build_km_frame(&status_record());
        frame [2] = frame [2] + 1;

        feed_and_settle(&mut decoder, &frame);

        assert_eq!(false, decoder.bus_ok());
    }

    #[test]
    fn test_km_stop_byte_missing() {
        let (mut decoder, _clock) = decoder(Protocol::Km);
        let mut frame = build_km_frame(&status_record());
        let last = frame.len() - 1;
        frame [last] = 0x00;

        feed_and_settle(&mut decoder, &frame);

        assert_eq!(false, decoder.bus_ok());
    }

    #[test]
    fn test_km_crc_mismatch() {
        let (mut decoder, _clock) = decoder(Protocol::Km);
        let mut frame = build_km_frame(&status_record());
        let crc_lo = frame.len() - 3;
        frame [crc_lo] ^= 0xFF;

        feed_and_settle(&mut decoder, &frame);

        assert_eq!(false, decoder.bus_ok());
        assert_eq!(false, decoder.is_ready());
    }

    #[test]
    fn test_km_recovers_after_corrupt_frame() {
        let (mut decoder, _clock) = decoder(Protocol::Km);
        let frame = build_km_frame(&status_record());

        let mut corrupt = frame.clone();
        let crc_lo = corrupt.len() - 3;
        corrupt [crc_lo] ^= 0xFF;
        feed_and_settle(&mut decoder, &corrupt);
        assert_eq!(false, decoder.bus_ok());

        feed_and_settle(&mut decoder, &frame);

        assert_eq!(true, decoder.is_ready());
        assert_eq!(true, decoder.bus_ok());
    }
}

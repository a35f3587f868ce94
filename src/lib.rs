//! # heatbus
//!
//! A Rust library for decoding RESOL VBus and Viessmann heating-bus
//! telemetry.
//!
//!
//! ## Features
//!
//! - Decodes four wire protocols on one byte-stream abstraction: RESOL
//!   VBus, Viessmann KW-Bus (VS1), P300/VS2 (Optolink), and KM-Bus
//! - Non-blocking, cooperatively ticked frame decoder with automatic
//!   resynchronisation after line corruption
//! - Device field maps for the Vitosolic 200 and the DeltaSol BX / BX Plus
//!   / MX family, plus generic fallbacks
//! - Opportunistic bus participant discovery
//!
//!
//! ## Supported Devices
//!
//! * Viessmann Vitosolic 200 and other VBus controllers
//! * RESOL DeltaSol BX, BX Plus, and MX
//! * Viessmann Vitotronic controllers on KW-Bus, Optolink, or KM-Bus
//!
//!
//! ## Example
//!
//! ```rust
//! use heatbus::{BusDecoder, Protocol, StreamBuffer, SystemClock};
//!
//! // the decoder is bound to a byte source, a clock, and one protocol
//! let mut decoder = BusDecoder::new(StreamBuffer::new(), SystemClock::new(), Protocol::VBus);
//!
//! // feed bytes pulled from the serial line, then let the decoder run
//! decoder.source_mut().feed(&[ 0xAA ]);
//! decoder.tick();
//!
//! if decoder.is_ready() {
//!     let snapshot = decoder.snapshot();
//!     for idx in 0..snapshot.temp_num() {
//!         println!("sensor {}: {:.1} °C", idx + 1, snapshot.temp(idx));
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(nonstandard_style)]
#![deny(rust_2018_idioms)]

pub use chrono;

#[cfg(test)]
mod test_utils;

mod byte_source;
mod clock;
mod decoder;
mod error;
mod frame_buffer;
mod header;
pub mod km_data;
mod kw_data;
mod p300_data;
mod participant;
mod protocol;
mod snapshot;
pub mod utils;
pub mod vbus_devices;

pub use crate::{
    byte_source::{ByteSource, StreamBuffer},
    clock::{Clock, SystemClock},
    decoder::BusDecoder,
    error::{Error, Result},
    header::Header,
    participant::{Participant, ParticipantRegistry, MAX_PARTICIPANTS},
    protocol::Protocol,
    snapshot::{KmStatus, TelemetrySnapshot, MAX_CHANNELS},
};

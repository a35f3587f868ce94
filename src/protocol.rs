use std::{fmt, str::FromStr};

use crate::error::Error;

/// The wire protocol a decoder is bound to.
///
/// The protocol is selected once when the decoder is constructed and stays
/// fixed for its lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// RESOL VBus, 7-bit payload bytes with septet-carried MSBs.
    VBus,

    /// Viessmann KW-Bus (VS1), short frames with an XOR checksum.
    Kw,

    /// Viessmann P300 / VS2 (Optolink), length-prefixed frames with an
    /// additive checksum.
    P300,

    /// Viessmann KM-Bus, M-Bus style long frames with CRC-16-CCITT.
    Km,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Protocol::VBus => "vbus",
            Protocol::Kw => "kw",
            Protocol::P300 => "p300",
            Protocol::Km => "km",
        };
        f.write_str(name)
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Protocol, Error> {
        match s.to_ascii_lowercase().as_str() {
            "vbus" => Ok(Protocol::VBus),
            "kw" | "vs1" => Ok(Protocol::Kw),
            "p300" | "vs2" | "optolink" => Ok(Protocol::P300),
            "km" => Ok(Protocol::Km),
            _ => Err(Error::new(format!("Unknown protocol {:?}", s))),
        }
    }
}

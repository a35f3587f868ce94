use crate::vbus_devices::device_profile;

/// Maximum number of participants the registry can hold.
pub const MAX_PARTICIPANTS: usize = 16;

const MAX_NAME_LEN: usize = 31;

/// A device seen on (or registered for) the bus, identified by its 16-bit
/// address.
#[derive(Clone, Debug, PartialEq)]
pub struct Participant {
    address: u16,
    last_seen_ms: u64,
    temp_channels: u8,
    pump_channels: u8,
    relay_channels: u8,
    name: String,
    auto_detected: bool,
}

impl Participant {
    /// The bus address of this participant.
    pub fn address(&self) -> u16 {
        self.address
    }

    /// Monotonic timestamp of the last frame received from this address.
    pub fn last_seen_ms(&self) -> u64 {
        self.last_seen_ms
    }

    /// Number of temperature channels this device reports.
    pub fn temp_channels(&self) -> u8 {
        self.temp_channels
    }

    /// Number of pump channels this device reports.
    pub fn pump_channels(&self) -> u8 {
        self.pump_channels
    }

    /// Number of relay channels this device reports.
    pub fn relay_channels(&self) -> u8 {
        self.relay_channels
    }

    /// The device name, possibly empty.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when the entry was created by auto-discovery rather than by an
    /// explicit registration.
    pub fn is_auto_detected(&self) -> bool {
        self.auto_detected
    }
}

fn bounded_name(name: &str) -> String {
    name.chars().take(MAX_NAME_LEN).collect()
}

/// A bounded, insertion-ordered directory of bus participants.
///
/// Entries are keyed by address and looked up linearly; the table never
/// holds more than [`MAX_PARTICIPANTS`] entries.
#[derive(Debug)]
pub struct ParticipantRegistry {
    entries: Vec<Participant>,
    auto_discovery: bool,
}

impl ParticipantRegistry {
    pub(crate) fn new() -> ParticipantRegistry {
        ParticipantRegistry {
            entries: Vec::with_capacity(MAX_PARTICIPANTS),
            auto_discovery: true,
        }
    }

    /// Enables or disables automatic registration of frame sources.
    pub fn enable_auto_discovery(&mut self, enable: bool) {
        self.auto_discovery = enable;
    }

    /// Whether frame sources are registered automatically.
    pub fn is_auto_discovery_enabled(&self) -> bool {
        self.auto_discovery
    }

    /// Number of registered participants.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no participant is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The participant at insertion position `idx`.
    pub fn get(&self, idx: usize) -> Option<&Participant> {
        self.entries.get(idx)
    }

    /// The participant registered for `address`.
    pub fn by_address(&self, address: u16) -> Option<&Participant> {
        self.entries.iter().find(|p| p.address == address)
    }

    /// Iterates over the registered participants in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Participant> + '_ {
        self.entries.iter()
    }

    /// Inserts or updates a participant explicitly.
    ///
    /// Returns `false` for the reserved address 0 or when the table is full
    /// and `address` is not yet registered. When no name is given, the name
    /// from the device table is used; names are truncated to 31 characters.
    pub fn add(
        &mut self,
        address: u16,
        name: Option<&str>,
        temp_channels: u8,
        pump_channels: u8,
        relay_channels: u8,
        now_ms: u64,
    ) -> bool {
        if address == 0 {
            return false;
        }

        let name = bounded_name(name.unwrap_or(device_profile(address).name));

        if let Some(entry) = self.entries.iter_mut().find(|p| p.address == address) {
            entry.last_seen_ms = now_ms;
            entry.temp_channels = temp_channels;
            entry.pump_channels = pump_channels;
            entry.relay_channels = relay_channels;
            entry.name = name;
            entry.auto_detected = false;
            return true;
        }

        if self.entries.len() >= MAX_PARTICIPANTS {
            return false;
        }

        self.entries.push(Participant {
            address,
            last_seen_ms: now_ms,
            temp_channels,
            pump_channels,
            relay_channels,
            name,
            auto_detected: false,
        });
        true
    }

    /// Removes the participant registered for `address`, compacting the
    /// table. Returns `false` when the address is not registered.
    pub fn remove(&mut self, address: u16) -> bool {
        match self.entries.iter().position(|p| p.address == address) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Removes all participants.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Notes a frame arriving from `address`: refreshes the matching entry
    /// or, if there is room, inserts a new auto-detected one configured from
    /// the device table.
    pub(crate) fn touch(&mut self, address: u16, now_ms: u64) {
        if let Some(entry) = self.entries.iter_mut().find(|p| p.address == address) {
            entry.last_seen_ms = now_ms;
            return;
        }

        if self.entries.len() >= MAX_PARTICIPANTS {
            return;
        }

        let profile = device_profile(address);
        self.entries.push(Participant {
            address,
            last_seen_ms: now_ms,
            temp_channels: profile.temp_channels,
            pump_channels: profile.pump_channels,
            relay_channels: profile.relay_channels,
            name: profile.name.to_owned(),
            auto_detected: true,
        });
    }
}

use crate::protocol::Protocol;

/// Maximum number of temperature, pump, and relay channels any supported
/// device reports.
pub const MAX_CHANNELS: usize = 32;

/// Number of operating-hour counters carried in the snapshot.
pub const OPERATING_HOURS: usize = 8;

/// The KM-Bus specific view of the most recent status record.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct KmStatus {
    pub(crate) burner: bool,
    pub(crate) main_pump: bool,
    pub(crate) loop_pump: bool,
    pub(crate) mode: u8,
    pub(crate) boiler_temp: f32,
    pub(crate) hot_water_temp: f32,
    pub(crate) outdoor_temp: f32,
    pub(crate) setpoint_temp: f32,
    pub(crate) departure_temp: f32,
}

impl KmStatus {
    /// Whether the burner is firing.
    pub fn burner(&self) -> bool {
        self.burner
    }

    /// Whether the main circulation pump is running.
    pub fn main_pump(&self) -> bool {
        self.main_pump
    }

    /// Whether the hot-water loop pump is running.
    pub fn loop_pump(&self) -> bool {
        self.loop_pump
    }

    /// The raw operating mode byte.
    pub fn mode(&self) -> u8 {
        self.mode
    }

    /// Boiler temperature in °C.
    pub fn boiler_temp(&self) -> f32 {
        self.boiler_temp
    }

    /// Hot-water temperature in °C.
    pub fn hot_water_temp(&self) -> f32 {
        self.hot_water_temp
    }

    /// Outdoor temperature in °C.
    pub fn outdoor_temp(&self) -> f32 {
        self.outdoor_temp
    }

    /// Setpoint temperature in °C.
    pub fn setpoint_temp(&self) -> f32 {
        self.setpoint_temp
    }

    /// Departure (flow) temperature in °C.
    pub fn departure_temp(&self) -> f32 {
        self.departure_temp
    }
}

/// The observable, most-recent view of decoded telemetry.
///
/// The snapshot is written only by the decoder that owns it; callers read it
/// through [`BusDecoder::snapshot`](crate::BusDecoder::snapshot). All channel
/// accessors are total: indices beyond the valid range read as zero.
#[derive(Clone, Debug)]
pub struct TelemetrySnapshot {
    pub(crate) protocol: Protocol,
    pub(crate) ready: bool,
    pub(crate) bus_ok: bool,
    pub(crate) temp: [f32; MAX_CHANNELS],
    pub(crate) pump: [u8; MAX_CHANNELS],
    pub(crate) relay: [bool; MAX_CHANNELS],
    pub(crate) temp_num: u8,
    pub(crate) pump_num: u8,
    pub(crate) relay_num: u8,
    pub(crate) error_mask: u16,
    pub(crate) system_time: u16,
    pub(crate) operating_hours: [u32; OPERATING_HOURS],
    pub(crate) heat_quantity: u16,
    pub(crate) system_variant: u8,
    pub(crate) km: KmStatus,
}

impl TelemetrySnapshot {
    pub(crate) fn new(protocol: Protocol) -> TelemetrySnapshot {
        TelemetrySnapshot {
            protocol,
            ready: false,
            bus_ok: true,
            temp: [0.0; MAX_CHANNELS],
            pump: [0; MAX_CHANNELS],
            relay: [false; MAX_CHANNELS],
            temp_num: 0,
            pump_num: 0,
            relay_num: 0,
            error_mask: 0,
            system_time: 0,
            operating_hours: [0; OPERATING_HOURS],
            heat_quantity: 0,
            system_variant: 0,
            km: KmStatus::default(),
        }
    }

    /// The protocol this snapshot is fed from.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// True once at least one frame has been successfully decoded.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// False when the decoder hit an error since the last successful frame.
    pub fn bus_ok(&self) -> bool {
        self.bus_ok
    }

    /// Temperature channel `idx` in °C.
    pub fn temp(&self, idx: u8) -> f32 {
        self.temp.get(usize::from(idx)).copied().unwrap_or(0.0)
    }

    /// Pump channel `idx` duty cycle in percent.
    pub fn pump(&self, idx: u8) -> u8 {
        self.pump.get(usize::from(idx)).copied().unwrap_or(0)
    }

    /// Relay channel `idx` state.
    pub fn relay(&self, idx: u8) -> bool {
        self.relay.get(usize::from(idx)).copied().unwrap_or(false)
    }

    /// Number of valid temperature channels.
    pub fn temp_num(&self) -> u8 {
        self.temp_num
    }

    /// Number of valid pump channels.
    pub fn pump_num(&self) -> u8 {
        self.pump_num
    }

    /// Number of valid relay channels.
    pub fn relay_num(&self) -> u8 {
        self.relay_num
    }

    /// The controller's error bitmask.
    pub fn error_mask(&self) -> u16 {
        self.error_mask
    }

    /// The controller's system time in minutes since midnight.
    pub fn system_time(&self) -> u16 {
        self.system_time
    }

    /// Operating-hours counter `idx`, or 0 for indices beyond the range.
    pub fn operating_hours(&self, idx: u8) -> u32 {
        self.operating_hours.get(usize::from(idx)).copied().unwrap_or(0)
    }

    /// Accumulated heat quantity in Wh.
    pub fn heat_quantity(&self) -> u16 {
        self.heat_quantity
    }

    /// The controller's system variant byte.
    pub fn system_variant(&self) -> u8 {
        self.system_variant
    }

    /// The KM-Bus status view. Only meaningful when the decoder runs the
    /// [`Protocol::Km`] protocol.
    pub fn km(&self) -> &KmStatus {
        &self.km
    }
}

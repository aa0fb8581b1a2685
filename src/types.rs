use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Temperature in Celsius, held on the controller's 0.1 degree grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Temperature(f64);

impl Temperature {
    /// Snaps to the nearest tenth of a degree.
    pub fn from_celsius(c: f64) -> Self {
        Self::from_tenths((c * 10.0).round() as i64)
    }

    /// Like [`Temperature::from_celsius`], but `None` for NaN and infinities
    /// instead of snapping them onto the grid.
    pub fn try_from_celsius(c: f64) -> Option<Self> {
        c.is_finite().then(|| Self::from_celsius(c))
    }

    pub fn from_tenths(tenths: i64) -> Self {
        Self(tenths as f64 / 10.0)
    }

    pub fn celsius(&self) -> f64 {
        self.0
    }

    pub fn tenths(&self) -> i64 {
        (self.0 * 10.0).round() as i64
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}\u{00b0}C", self.0)
    }
}

/// One thermostat slot: controller 1-4, thermostat 1-12.
///
/// Renders as `C{controller}_T{thermostat}`, which is also the prefix of
/// every per-zone variable on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId {
    controller: u8,
    thermostat: u8,
}

impl ZoneId {
    pub const CONTROLLERS: std::ops::RangeInclusive<u8> = 1..=4;
    pub const THERMOSTATS: std::ops::RangeInclusive<u8> = 1..=12;

    pub fn new(controller: u8, thermostat: u8) -> Option<Self> {
        if Self::CONTROLLERS.contains(&controller) && Self::THERMOSTATS.contains(&thermostat) {
            Some(Self {
                controller,
                thermostat,
            })
        } else {
            None
        }
    }

    pub fn controller(&self) -> u8 {
        self.controller
    }

    pub fn thermostat(&self) -> u8 {
        self.thermostat
    }

    /// Name of a per-zone variable, e.g. `C1_T3_setpoint`.
    pub fn var(&self, suffix: &str) -> String {
        format!("{self}_{suffix}")
    }

    /// Name of a per-controller variable, e.g. `C1_sw_version`.
    pub fn controller_var(&self, suffix: &str) -> String {
        format!("C{}_{suffix}", self.controller)
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}_T{}", self.controller, self.thermostat)
    }
}

impl FromStr for ZoneId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidZone(s.to_string());
        let rest = s.strip_prefix('C').ok_or_else(invalid)?;
        let (controller, thermostat) = rest.split_once("_T").ok_or_else(invalid)?;
        let controller = controller.parse().map_err(|_| invalid())?;
        let thermostat = thermostat.parse().map_err(|_| invalid())?;
        ZoneId::new(controller, thermostat).ok_or_else(invalid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvacMode {
    Off,
    Heat,
    Cool,
}

impl HvacMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HvacMode::Off => "off",
            HvacMode::Heat => "heat",
            HvacMode::Cool => "cool",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "off" => Some(HvacMode::Off),
            "heat" => Some(HvacMode::Heat),
            "cool" => Some(HvacMode::Cool),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HvacAction {
    #[default]
    Off,
    Idle,
    Heating,
    Cooling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Eco,
    Away,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Eco => "eco",
            Preset::Away => "away",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "eco" => Some(Preset::Eco),
            "away" => Some(Preset::Away),
            _ => None,
        }
    }
}

/// Zone fault status. Variants before `TooHighTemperature` are listed in
/// the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultStatus {
    #[default]
    Ok,
    Battery,
    ValvePosition,
    GeneralSystem,
    AirSensor,
    ExternalSensor,
    HumiditySensor,
    RfSensor,
    Tamper,
    /// Room temperature above the sensor ceiling, usually a communication
    /// fault between thermostat and controller.
    TooHighTemperature,
}

impl FaultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultStatus::Ok => "OK",
            FaultStatus::Battery => "Battery error",
            FaultStatus::ValvePosition => "Valve position error",
            FaultStatus::GeneralSystem => "General system error",
            FaultStatus::AirSensor => "Air sensor error",
            FaultStatus::ExternalSensor => "External sensor error",
            FaultStatus::HumiditySensor => "Humidity sensor error",
            FaultStatus::RfSensor => "RF sensor error",
            FaultStatus::Tamper => "Tamper error",
            FaultStatus::TooHighTemperature => "API error",
        }
    }

    pub fn is_ok(&self) -> bool {
        *self == FaultStatus::Ok
    }
}

impl fmt::Display for FaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AvailabilityState {
    #[default]
    Healthy,
    Degraded,
    Unrecoverable,
}

/// Everything known about one zone, decoded from a single snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneState {
    pub id: ZoneId,
    pub name: String,
    pub thermostat_id: Option<String>,
    pub sw_version: Option<String>,
    pub temperature: Option<Temperature>,
    pub floor_temperature: Option<Temperature>,
    pub humidity: Option<i64>,
    pub min_setpoint: Option<Temperature>,
    pub max_setpoint: Option<Temperature>,
    pub setpoint: Option<Temperature>,
    pub eco_setback: Option<Temperature>,
    pub pwm: Option<i64>,
    pub status: FaultStatus,
    pub mode: HvacMode,
    pub action: HvacAction,
    pub preset: Option<Preset>,
    pub has_floor_sensor: bool,
    pub has_humidity_sensor: bool,
}

/// One variable whose value differs between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableChange {
    pub name: String,
    pub old: Option<String>,
    pub new: Option<String>,
}

/// Emitted to observers after every successful poll or write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateUpdate {
    Polled { changes: Vec<VariableChange> },
    Written { variables: Vec<String> },
}

use crate::types::{FaultStatus, Temperature};

pub const RAW_OFFSET: i64 = 320;
pub const RAW_PER_DEGREE: i64 = 18;
pub const TOO_HIGH_TEMP_LIMIT: i64 = 4508;
pub const NO_EXTERNAL_SENSOR: i64 = 32767;
pub const TOO_LOW_HUMIDITY_LIMIT: i64 = 0;
pub const DEFAULT_SETPOINT_C: f64 = 20.0;

/// `round((raw - 320) / 18, 1)` with no validity check.
pub fn raw_to_temperature(raw: i64) -> Temperature {
    // (raw - 320) / 1.8 never lands on .5 exactly, so this is plain rounding.
    let tenths = raw.saturating_sub(RAW_OFFSET).saturating_mul(10).saturating_add(9);
    Temperature::from_tenths(tenths.div_euclid(RAW_PER_DEGREE))
}

/// `floor((raw - 320) / 1.8) / 10`, the truncating variant used for setpoints.
pub fn raw_to_temperature_floor(raw: i64) -> Temperature {
    let tenths = raw.saturating_sub(RAW_OFFSET).saturating_mul(10);
    Temperature::from_tenths(tenths.div_euclid(RAW_PER_DEGREE))
}

pub fn decode_temperature(raw: i64) -> Option<Temperature> {
    if raw > TOO_HIGH_TEMP_LIMIT {
        return None;
    }
    Some(raw_to_temperature(raw))
}

pub fn decode_floor_temperature(raw: i64) -> Option<Temperature> {
    if raw == NO_EXTERNAL_SENSOR {
        return None;
    }
    decode_temperature(raw)
}

pub fn decode_humidity(raw: i64) -> Option<i64> {
    (raw >= TOO_LOW_HUMIDITY_LIMIT).then_some(raw)
}

/// Eco offset in Celsius, `round(raw / 18, 1)`.
pub fn offset_to_celsius(raw: i64) -> Temperature {
    let tenths = raw.saturating_mul(10).saturating_add(9);
    Temperature::from_tenths(tenths.div_euclid(RAW_PER_DEGREE))
}

/// Final setpoint once the setback baked into `raw` has been taken back out.
pub fn decode_setpoint(raw: i64, setback: i64) -> Temperature {
    raw_to_temperature_floor(raw.saturating_sub(setback))
}

/// Smallest raw value that [`decode_setpoint`] maps back to `temp`, i.e.
/// `ceil(celsius * 18) + setback + 320`. Equal to rounding on the
/// half-degree grid. `None` when the result does not fit the device's
/// 32-bit registers.
pub fn encode_setpoint(temp: Temperature, setback: i64) -> Option<i64> {
    let raw = temp
        .tenths()
        .checked_mul(RAW_PER_DEGREE)?
        .checked_add(9)?
        .div_euclid(10)
        .checked_add(setback)?
        .checked_add(RAW_OFFSET)?;
    i32::try_from(raw).ok().map(i64::from)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SetbackInputs {
    pub temperature: Temperature,
    pub min: Option<Temperature>,
    pub max: Option<Temperature>,
    pub cooling: bool,
    /// `sys_heat_cool_offset`, raw units.
    pub cool_offset: Option<i64>,
    /// Zone `eco_offset`, raw units.
    pub eco_offset: Option<i64>,
    /// Zone in eco or system-wide away.
    pub eco_active: bool,
}

/// Setback in raw units for a zone whose nominal setpoint is
/// `inputs.temperature`. A zone pinned to either bound has no setback.
pub fn active_setback(inputs: &SetbackInputs) -> i64 {
    let pinned = |bound: Option<Temperature>| bound == Some(inputs.temperature);
    if pinned(inputs.min) || pinned(inputs.max) {
        return 0;
    }

    let cool_setback = match inputs.cool_offset {
        Some(offset) if inputs.cooling => offset.saturating_neg(),
        _ => 0,
    };

    let sign = if inputs.cooling { -1 } else { 1 };
    let eco_setback = match inputs.eco_offset {
        Some(offset) if inputs.eco_active => offset.saturating_mul(sign),
        _ => 0,
    };

    cool_setback.saturating_add(eco_setback)
}

/// A zone counts as eco only when it has a nonzero eco offset and either its
/// own comfort/eco flag or the temporary eco activation is set. An unknown
/// offset does not rule eco out.
pub fn is_eco(eco_setback: Option<Temperature>, zone_flag: bool, temporary_flag: bool) -> bool {
    if eco_setback.is_some_and(|s| s.tenths() == 0) {
        return false;
    }
    zone_flag || temporary_flag
}

/// "Off" is encoded as the setpoint pinned to the bound the active mode
/// never reaches: max while cooling, min while heating.
pub fn is_zone_on(
    setpoint: Option<Temperature>,
    min: Option<Temperature>,
    max: Option<Temperature>,
    cooling: bool,
) -> bool {
    let Some(setpoint) = setpoint else {
        return true;
    };
    let off = if cooling {
        max.is_some_and(|max| setpoint >= max)
    } else {
        min.is_some_and(|min| setpoint <= min)
    };
    !off
}

pub fn off_setpoint(
    min: Option<Temperature>,
    max: Option<Temperature>,
    cooling: bool,
) -> Option<Temperature> {
    if cooling { max } else { min }
}

/// First active fault in priority order, then the too-high room
/// temperature check, otherwise OK.
pub fn resolve_fault(
    flags: impl IntoIterator<Item = (FaultStatus, bool)>,
    raw_room_temperature: Option<i64>,
) -> FaultStatus {
    if let Some((status, _)) = flags.into_iter().find(|(_, active)| *active) {
        return status;
    }
    match raw_room_temperature {
        Some(raw) if raw > TOO_HIGH_TEMP_LIMIT => FaultStatus::TooHighTemperature,
        _ => FaultStatus::Ok,
    }
}

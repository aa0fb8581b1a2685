use std::collections::HashMap;

use tracing::trace;

use crate::rules::{self, SetbackInputs};
use crate::types::*;

const FAULT_FLAGS: [(FaultStatus, FlagScope, &str); 8] = [
    (FaultStatus::Battery, FlagScope::Zone, "stat_battery_error"),
    (FaultStatus::ValvePosition, FlagScope::Zone, "stat_valve_position_err"),
    (FaultStatus::GeneralSystem, FlagScope::Controller, "stat_general_system_alarm"),
    (FaultStatus::AirSensor, FlagScope::Zone, "stat_air_sensor_error"),
    (FaultStatus::ExternalSensor, FlagScope::Zone, "stat_external_sensor_err"),
    (FaultStatus::HumiditySensor, FlagScope::Zone, "stat_rh_sensor_error"),
    (FaultStatus::RfSensor, FlagScope::Zone, "stat_rf_error"),
    (FaultStatus::Tamper, FlagScope::Zone, "stat_tamper_alarm"),
];

#[derive(Debug, Clone, Copy)]
enum FlagScope {
    Zone,
    Controller,
}

pub(crate) const HEAT_COOL_MODE: &str = "sys_heat_cool_mode";
pub(crate) const FORCED_ECO_MODE: &str = "sys_forced_eco_mode";
const HEAT_COOL_OFFSET: &str = "sys_heat_cool_offset";
const COOLING_AVAILABLE: &str = "sys_cooling_available";
const TEMPORARY_ECO: &str = "cust_Temporary_ECO_Activation";
const SW_VERSION_UPDATE: &str = "cust_SW_version_update";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    vars: HashMap<String, String>,
}

impl From<HashMap<String, String>> for Snapshot {
    fn from(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }
}

impl Snapshot {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub(crate) fn apply(&mut self, assignments: &[(String, String)]) {
        for (name, value) in assignments {
            self.vars.insert(name.clone(), value.clone());
        }
    }

    /// Device registers are 32-bit; anything else is treated as absent.
    fn int(&self, name: &str) -> Option<i64> {
        let raw = self.get(name)?;
        match raw.trim().parse::<i32>() {
            Ok(v) => Some(i64::from(v)),
            Err(_) => {
                trace!(name, raw, "ignoring value that is not a 32-bit integer");
                None
            }
        }
    }

    fn flag(&self, name: &str) -> bool {
        self.get(name) == Some("1")
    }

    fn flag_opt(&self, name: &str) -> Option<bool> {
        self.get(name).map(|v| v == "1")
    }

    // -- Discovery & device info --

    /// Zones with a presence flag of exactly "1", skipping controllers whose
    /// own presence flag is known and not "1".
    pub fn active_zones(&self) -> Vec<ZoneId> {
        let mut active = Vec::new();
        for c in ZoneId::CONTROLLERS {
            if let Some(presence) = self.get(&format!("sys_controller_{c}_presence"))
                && presence != "1"
            {
                continue;
            }
            for t in ZoneId::THERMOSTATS {
                if self.flag(&format!("C{c}_thermostat_{t}_presence"))
                    && let Some(zone) = ZoneId::new(c, t)
                {
                    active.push(zone);
                }
            }
        }
        active
    }

    pub fn room_name(&self, zone: &ZoneId) -> String {
        self.get(&format!("cust_{zone}_name"))
            .map(str::to_string)
            .unwrap_or_else(|| zone.to_string())
    }

    pub fn thermostat_id(&self, zone: &ZoneId) -> Option<String> {
        self.get(&format!("C{}_thermostat{}_id", zone.controller(), zone.thermostat()))
            .map(str::to_string)
    }

    pub fn model(&self) -> String {
        self.get(SW_VERSION_UPDATE)
            .and_then(|v| v.split('_').next())
            .unwrap_or("-")
            .to_string()
    }

    pub fn sw_version(&self, zone: &ZoneId) -> Option<String> {
        self.get(&zone.controller_var("sw_version"))
            .and_then(|v| v.split('_').next())
            .map(str::to_string)
    }

    // -- Temperatures & humidity --

    pub fn raw_temperature(&self, zone: &ZoneId) -> Option<i64> {
        self.int(&zone.var("room_temperature"))
    }

    pub fn temperature(&self, zone: &ZoneId) -> Option<Temperature> {
        self.raw_temperature(zone).and_then(rules::decode_temperature)
    }

    pub fn min_limit(&self, zone: &ZoneId) -> Option<Temperature> {
        self.int(&zone.var("minimum_setpoint"))
            .map(rules::raw_to_temperature)
    }

    pub fn max_limit(&self, zone: &ZoneId) -> Option<Temperature> {
        self.int(&zone.var("maximum_setpoint"))
            .map(rules::raw_to_temperature)
    }

    pub fn has_humidity_sensor(&self, zone: &ZoneId) -> bool {
        self.int(&zone.var("rh")).is_some_and(|rh| rh != 0)
    }

    pub fn humidity(&self, zone: &ZoneId) -> Option<i64> {
        self.int(&zone.var("rh")).and_then(rules::decode_humidity)
    }

    pub fn has_floor_temperature(&self, zone: &ZoneId) -> bool {
        self.int(&zone.var("external_temperature"))
            .is_some_and(|raw| raw != rules::NO_EXTERNAL_SENSOR)
    }

    pub fn floor_temperature(&self, zone: &ZoneId) -> Option<Temperature> {
        self.int(&zone.var("external_temperature"))
            .and_then(rules::decode_floor_temperature)
    }

    // -- Setpoint --

    /// Target temperature with the active setback removed. The setback
    /// depends on where the setpoint sits relative to the bounds, so a
    /// provisional value is decoded first.
    pub fn setpoint(&self, zone: &ZoneId) -> Option<Temperature> {
        let raw = self.int(&zone.var("setpoint"))?;
        let provisional = rules::raw_to_temperature_floor(raw);
        let setback = self.active_setback(zone, provisional);
        Some(rules::decode_setpoint(raw, setback))
    }

    /// Setback in raw units that applies to `zone` at `temperature`.
    pub fn active_setback(&self, zone: &ZoneId, temperature: Temperature) -> i64 {
        rules::active_setback(&SetbackInputs {
            temperature,
            min: self.min_limit(zone),
            max: self.max_limit(zone),
            cooling: self.is_cool_enabled(),
            cool_offset: self.int(HEAT_COOL_OFFSET),
            eco_offset: self.int(&zone.var("eco_offset")),
            eco_active: self.is_eco(zone) || self.is_away(),
        })
    }

    pub fn eco_setback(&self, zone: &ZoneId) -> Option<Temperature> {
        self.int(&zone.var("eco_offset"))
            .map(rules::offset_to_celsius)
    }

    // -- State --

    /// Actuator currently open.
    pub fn is_active(&self, zone: &ZoneId) -> Option<bool> {
        self.flag_opt(&zone.var("stat_cb_actuator"))
    }

    pub fn pwm(&self, zone: &ZoneId) -> Option<i64> {
        self.int(&zone.var("ufh_pwm_output"))
    }

    pub fn status(&self, zone: &ZoneId) -> FaultStatus {
        let flags = FAULT_FLAGS.iter().map(|(status, scope, suffix)| {
            let name = match scope {
                FlagScope::Zone => zone.var(suffix),
                FlagScope::Controller => zone.controller_var(suffix),
            };
            (*status, self.flag(&name))
        });
        rules::resolve_fault(flags, self.raw_temperature(zone))
    }

    pub fn is_on(&self, zone: &ZoneId) -> bool {
        rules::is_zone_on(
            self.setpoint(zone),
            self.min_limit(zone),
            self.max_limit(zone),
            self.is_cool_enabled(),
        )
    }

    pub fn off_setpoint(&self, zone: &ZoneId) -> Option<Temperature> {
        rules::off_setpoint(
            self.min_limit(zone),
            self.max_limit(zone),
            self.is_cool_enabled(),
        )
    }

    // -- Cooling, away & eco --

    pub fn is_cool_available(&self) -> Option<bool> {
        self.flag_opt(COOLING_AVAILABLE)
    }

    pub fn is_cool_enabled(&self) -> bool {
        self.flag(HEAT_COOL_MODE)
    }

    pub fn is_away(&self) -> bool {
        self.flag(FORCED_ECO_MODE)
    }

    pub fn is_eco(&self, zone: &ZoneId) -> bool {
        rules::is_eco(
            self.eco_setback(zone),
            self.flag(&zone.var("stat_cb_comfort_eco_mode")),
            self.flag(TEMPORARY_ECO),
        )
    }

    // -- Climate view --

    pub fn hvac_modes(&self) -> [HvacMode; 2] {
        if self.is_cool_enabled() {
            [HvacMode::Cool, HvacMode::Off]
        } else {
            [HvacMode::Heat, HvacMode::Off]
        }
    }

    pub fn hvac_mode(&self, zone: &ZoneId) -> HvacMode {
        if !self.is_on(zone) {
            HvacMode::Off
        } else if self.is_cool_enabled() {
            HvacMode::Cool
        } else {
            HvacMode::Heat
        }
    }

    pub fn hvac_action(&self, zone: &ZoneId) -> HvacAction {
        if !self.is_on(zone) {
            return HvacAction::Off;
        }
        match (self.is_active(zone), self.is_cool_enabled()) {
            (Some(true), true) => HvacAction::Cooling,
            (Some(true), false) => HvacAction::Heating,
            _ => HvacAction::Idle,
        }
    }

    pub fn preset(&self, zone: &ZoneId) -> Option<Preset> {
        if self.is_eco(zone) {
            Some(Preset::Eco)
        } else if self.is_away() {
            Some(Preset::Away)
        } else {
            None
        }
    }

    pub fn zone_state(&self, zone: &ZoneId) -> ZoneState {
        ZoneState {
            id: *zone,
            name: self.room_name(zone),
            thermostat_id: self.thermostat_id(zone),
            sw_version: self.sw_version(zone),
            temperature: self.temperature(zone),
            floor_temperature: self.floor_temperature(zone),
            // A reading of 0 means no sensor fitted.
            humidity: self.humidity(zone).filter(|rh| *rh != 0),
            min_setpoint: self.min_limit(zone),
            max_setpoint: self.max_limit(zone),
            setpoint: self.setpoint(zone),
            eco_setback: self.eco_setback(zone),
            pwm: self.pwm(zone),
            status: self.status(zone),
            mode: self.hvac_mode(zone),
            action: self.hvac_action(zone),
            preset: self.preset(zone),
            has_floor_sensor: self.has_floor_temperature(zone),
            has_humidity_sensor: self.has_humidity_sensor(zone),
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, error, info, warn};

use crate::availability::{Availability, DEFAULT_UNAVAILABLE_THRESHOLD_SECS};
use crate::client::JnapClient;
use crate::diff::diff_vars;
use crate::rules::{self, DEFAULT_SETPOINT_C};
use crate::snapshot::{FORCED_ECO_MODE, HEAT_COOL_MODE, Snapshot};
use crate::store::{MemorySetpointStore, SavedSetpoints, SetpointStore};
use crate::types::*;
use crate::{Error, Result};

type UpdateCallback = Box<dyn Fn(&StateUpdate) + Send + Sync>;
type ReloadCallback = Box<dyn Fn() + Send + Sync>;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct StateProxyBuilder {
    client: JnapClient,
    store: Option<Box<dyn SetpointStore>>,
    clock: Option<Box<dyn Clock>>,
    unavailable_threshold: TimeDelta,
    update_callbacks: Vec<UpdateCallback>,
    reload_callbacks: Vec<ReloadCallback>,
}

impl StateProxyBuilder {
    pub fn new(client: JnapClient) -> Self {
        Self {
            client,
            store: None,
            clock: None,
            unavailable_threshold: TimeDelta::seconds(DEFAULT_UNAVAILABLE_THRESHOLD_SECS),
            update_callbacks: Vec::new(),
            reload_callbacks: Vec::new(),
        }
    }

    /// Where turn-off remembers setpoints. Defaults to memory only.
    pub fn store(mut self, store: impl SetpointStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    pub fn unavailable_threshold(mut self, threshold: Duration) -> Self {
        if let Ok(threshold) = TimeDelta::from_std(threshold) {
            self.unavailable_threshold = threshold;
        }
        self
    }

    /// Called after every successful poll and every successful write.
    pub fn on_update(mut self, f: impl Fn(&StateUpdate) + Send + Sync + 'static) -> Self {
        self.update_callbacks.push(Box::new(f));
        self
    }

    /// Called once when the controller has been unreachable for longer than
    /// the threshold. The owner should drop this proxy and build a new one.
    pub fn on_reload(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.reload_callbacks.push(Box::new(f));
        self
    }

    pub fn build(self) -> StateProxy {
        StateProxy {
            client: self.client,
            store: self
                .store
                .unwrap_or_else(|| Box::new(MemorySetpointStore::new())),
            clock: self.clock.unwrap_or_else(|| Box::new(SystemClock)),
            snapshot: Arc::new(Snapshot::default()),
            availability: Availability::new(self.unavailable_threshold),
            saved: None,
            last_update_attempt: None,
            disposed: false,
            update_callbacks: self.update_callbacks,
            reload_callbacks: self.reload_callbacks,
        }
    }
}

/// Single owner of one controller's state.
///
/// Reads go through [`StateProxy::snapshot`]; polls swap the snapshot
/// wholesale and writes update it copy-on-write, so a snapshot handed out
/// earlier never changes underneath its reader.
pub struct StateProxy {
    client: JnapClient,
    store: Box<dyn SetpointStore>,
    clock: Box<dyn Clock>,
    snapshot: Arc<Snapshot>,
    availability: Availability,
    saved: Option<SavedSetpoints>,
    last_update_attempt: Option<DateTime<Utc>>,
    disposed: bool,
    update_callbacks: Vec<UpdateCallback>,
    reload_callbacks: Vec<ReloadCallback>,
}

impl StateProxy {
    pub fn builder(client: JnapClient) -> StateProxyBuilder {
        StateProxyBuilder::new(client)
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn active_zones(&self) -> Vec<ZoneId> {
        self.snapshot.active_zones()
    }

    pub fn availability(&self) -> AvailabilityState {
        self.availability.state()
    }

    pub fn last_update_attempt(&self) -> Option<DateTime<Utc>> {
        self.last_update_attempt
    }

    pub fn last_successful_update(&self) -> Option<DateTime<Utc>> {
        self.availability.last_success()
    }

    /// True once a reload has been requested. Nothing further happens on a
    /// disposed proxy's poll.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // -- Refresh --

    /// Polls the controller. Failures never escape; they drive the
    /// availability state instead.
    pub async fn update(&mut self) -> AvailabilityState {
        if self.disposed {
            debug!("ignoring update on disposed proxy");
            return self.availability.state();
        }
        self.last_update_attempt = Some(self.clock.now());

        match self.client.fetch_all().await {
            Ok(vars) => {
                let changes = diff_vars(self.snapshot.vars(), &vars);
                self.snapshot = Arc::new(Snapshot::from(vars));
                let state = self.availability.record_success(self.clock.now());
                debug!(changed = changes.len(), "poll succeeded");
                self.notify(&StateUpdate::Polled { changes });
                state
            }
            Err(e) => {
                error!("controller was unable to update: {e}");
                let state = self.availability.record_failure(self.clock.now());
                if state == AvailabilityState::Unrecoverable {
                    warn!(
                        since = ?self.availability.unavailable_since(),
                        "controller unavailable past threshold, requesting reload"
                    );
                    self.disposed = true;
                    for cb in &self.reload_callbacks {
                        cb();
                    }
                }
                state
            }
        }
    }

    // -- Write path --

    /// Writes raw assignments and mirrors them locally once the controller
    /// accepts them. On error the local snapshot is untouched.
    async fn write(&mut self, assignments: Vec<(String, String)>) -> Result<()> {
        self.client.write_many(&assignments).await?;
        Arc::make_mut(&mut self.snapshot).apply(&assignments);

        let variables = assignments.into_iter().map(|(name, _)| name).collect();
        self.notify(&StateUpdate::Written { variables });
        Ok(())
    }

    /// Raw escape hatch for arbitrary controller variables.
    pub async fn set_variable(&mut self, name: &str, value: &str) -> Result<()> {
        debug!(name, value, "set variable");
        self.write(vec![(name.to_string(), value.to_string())]).await
    }

    /// Stores `celsius` with the current setback applied, so the next read of
    /// the setpoint returns it as long as the setback has not changed.
    pub async fn set_target_temperature(&mut self, zone: &ZoneId, celsius: f64) -> Result<()> {
        let temp =
            Temperature::try_from_celsius(celsius).ok_or(Error::InvalidTemperature(celsius))?;
        self.write_setpoint(zone, temp).await
    }

    /// Climate-level setter: ignored while the zone is off.
    pub async fn set_zone_temperature(&mut self, zone: &ZoneId, celsius: f64) -> Result<()> {
        if !self.snapshot.is_on(zone) {
            debug!(zone = %zone, "zone is off, ignoring target temperature");
            return Ok(());
        }
        self.set_target_temperature(zone, celsius).await
    }

    async fn write_setpoint(&mut self, zone: &ZoneId, temp: Temperature) -> Result<()> {
        let setback = self.snapshot.active_setback(zone, temp);
        let raw = rules::encode_setpoint(temp, setback)
            .ok_or(Error::InvalidTemperature(temp.celsius()))?;
        debug!(zone = %zone, %temp, setback, raw, "set target temperature");
        self.write(vec![(zone.var("setpoint"), raw.to_string())]).await
    }

    pub async fn turn_on(&mut self, zone: &ZoneId) -> Result<()> {
        let temp = self
            .saved_setpoints()
            .await?
            .get(zone)
            .unwrap_or_else(|| Temperature::from_celsius(DEFAULT_SETPOINT_C));
        info!(zone = %zone, %temp, "turning zone on");
        self.write_setpoint(zone, temp).await
    }

    /// Remembers the current setpoint, then pins the zone to the bound for
    /// the active mode.
    pub async fn turn_off(&mut self, zone: &ZoneId) -> Result<()> {
        let snapshot = self.snapshot();
        let off = snapshot.off_setpoint(zone).ok_or_else(|| {
            let bound = if snapshot.is_cool_enabled() {
                "maximum_setpoint"
            } else {
                "minimum_setpoint"
            };
            Error::MissingValue(zone.var(bound))
        })?;

        if let Some(current) = snapshot.setpoint(zone) {
            let saved = self.saved_setpoints().await?;
            saved.set(zone, current);
            let saved = saved.clone();
            self.store.save(&saved).await?;
        }

        info!(zone = %zone, %off, "turning zone off");
        self.write_setpoint(zone, off).await
    }

    pub async fn set_hvac_mode(&mut self, zone: &ZoneId, mode: HvacMode) -> Result<()> {
        let on = self.snapshot.is_on(zone);
        match mode {
            HvacMode::Off if on => self.turn_off(zone).await,
            HvacMode::Heat | HvacMode::Cool if !on => self.turn_on(zone).await,
            _ => Ok(()),
        }
    }

    pub async fn switch_to_cooling(&mut self) -> Result<()> {
        self.switch_mode(true).await
    }

    pub async fn switch_to_heating(&mut self) -> Result<()> {
        self.switch_mode(false).await
    }

    /// Zones that are off in the old mode are moved to the new mode's off
    /// bound before the mode flag flips, so they stay off.
    async fn switch_mode(&mut self, cooling: bool) -> Result<()> {
        let snapshot = self.snapshot();
        for zone in snapshot.active_zones() {
            let (old_off, new_off) = if cooling {
                (snapshot.min_limit(&zone), snapshot.max_limit(&zone))
            } else {
                (snapshot.max_limit(&zone), snapshot.min_limit(&zone))
            };
            if let (Some(setpoint), Some(old_off), Some(new_off)) =
                (snapshot.setpoint(&zone), old_off, new_off)
                && setpoint == old_off
            {
                self.write_setpoint(&zone, new_off).await?;
            }
        }

        info!(cooling, "switching heat/cool mode");
        let flag = if cooling { "1" } else { "0" };
        self.write(vec![(HEAT_COOL_MODE.to_string(), flag.to_string())])
            .await
    }

    pub async fn set_away(&mut self, away: bool) -> Result<()> {
        let flag = if away { "1" } else { "0" };
        self.write(vec![(FORCED_ECO_MODE.to_string(), flag.to_string())])
            .await
    }

    /// Eco is derived, not settable: choosing it only leaves away mode.
    pub async fn set_preset_mode(&mut self, preset: Preset) -> Result<()> {
        match preset {
            Preset::Eco => self.set_away(false).await,
            Preset::Away => self.set_away(true).await,
        }
    }

    // -- Helpers --

    async fn saved_setpoints(&mut self) -> Result<&mut SavedSetpoints> {
        if self.saved.is_none() {
            let loaded = self.store.load().await?.unwrap_or_default();
            self.saved = Some(loaded);
        }
        Ok(self.saved.get_or_insert_with(SavedSetpoints::default))
    }

    fn notify(&self, update: &StateUpdate) {
        for cb in &self.update_callbacks {
            cb(update);
        }
    }
}

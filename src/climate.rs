use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::coordinator::Coordinator;
use crate::protocol::{DEFAULT_MODEL, ENTITY_DOMAIN, MANUFACTURER};
use crate::types::{DEFAULT_MAX_TEMP, DEFAULT_MIN_TEMP, DeviceRecord, HvacMode, Preset};
use crate::{Error, Result};

/// Capabilities a thermostat advertises to the host, which depend on the
/// home's heating/cooling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub target_temperature: bool,
    pub turn_on: bool,
    pub turn_off: bool,
    pub preset_mode: bool,
}

/// Registry entry for the physical unit behind a thermostat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// `(domain, unique_id)` pairs.
    pub identifiers: Vec<(String, String)>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub suggested_area: Option<String>,
}

impl DeviceInfo {
    pub fn from_record(device: &DeviceRecord) -> Self {
        let model = if device.device_type.is_empty() {
            DEFAULT_MODEL
        } else {
            device.device_type.as_str()
        };
        Self {
            identifiers: vec![(ENTITY_DOMAIN.to_string(), device.unique_id.clone())],
            name: device.name.clone(),
            manufacturer: MANUFACTURER.to_string(),
            model: model.to_string(),
            suggested_area: (!device.room.is_empty()).then(|| device.room.clone()),
        }
    }
}

/// Presentation-facing handle for one device. Reads always come from the
/// coordinator's latest snapshot; commands go through the coordinator and
/// trigger a refresh.
#[derive(Clone)]
pub struct Thermostat {
    coordinator: Arc<Coordinator>,
    uid: String,
    unique_id: String,
}

impl Thermostat {
    pub fn new(coordinator: Arc<Coordinator>, device: &DeviceRecord) -> Self {
        Self {
            coordinator,
            uid: device.uid.clone(),
            unique_id: format!("{ENTITY_DOMAIN}_{}", device.unique_id),
        }
    }

    /// One handle per device in the current snapshot.
    pub fn all(coordinator: &Arc<Coordinator>) -> Vec<Thermostat> {
        coordinator
            .devices()
            .map(|devices| {
                devices
                    .iter()
                    .map(|d| Thermostat::new(coordinator.clone(), d))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Latest record for this device, if the last snapshot still has it.
    pub fn device(&self) -> Option<DeviceRecord> {
        self.coordinator.device(&self.uid)
    }

    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.device().map(|d| DeviceInfo::from_record(&d))
    }

    pub fn available(&self) -> bool {
        self.coordinator.last_update_success() && self.device().is_some_and(|d| d.connected)
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.device().and_then(|d| d.temp_room)
    }

    pub fn target_temperature(&self) -> Option<f64> {
        self.device().and_then(|d| d.temp_set)
    }

    pub fn min_temp(&self) -> f64 {
        self.device().map_or(DEFAULT_MIN_TEMP, |d| d.min_temp)
    }

    pub fn max_temp(&self) -> f64 {
        self.device().map_or(DEFAULT_MAX_TEMP, |d| d.max_temp)
    }

    pub fn hvac_mode(&self) -> Option<HvacMode> {
        self.device().map(|d| d.hvac_mode())
    }

    pub fn hvac_modes(&self) -> Vec<HvacMode> {
        self.device()
            .map(|d| d.hvac_modes().to_vec())
            .unwrap_or_default()
    }

    pub fn preset(&self) -> Option<Preset> {
        self.device().and_then(|d| d.preset())
    }

    pub fn presets(&self) -> Option<&'static [Preset]> {
        self.device().and_then(|d| d.presets())
    }

    pub fn features(&self) -> Features {
        Features {
            target_temperature: true,
            turn_on: true,
            turn_off: true,
            preset_mode: self.device().is_some_and(|d| d.is_cooling()),
        }
    }

    pub async fn set_temperature(&self, value: f64) -> Result<()> {
        let device = self.require_device()?;
        if !device.accepts_setpoint(value) {
            return Err(Error::InvalidSetpoint {
                value,
                min: device.min_temp,
                max: device.max_temp,
            });
        }
        self.coordinator.set_temperature(&self.uid, value).await
    }

    /// `Off` powers the device down; `Heat`/`Cool` power it on, since the
    /// heating/cooling choice belongs to the home, not the device.
    pub async fn set_hvac_mode(&self, mode: HvacMode) -> Result<()> {
        self.require_device()?;
        match mode {
            HvacMode::Off => self.coordinator.power_off(&self.uid).await,
            HvacMode::Heat | HvacMode::Cool => self.coordinator.power_on(&self.uid).await,
        }
    }

    pub async fn set_preset(&self, preset: Preset) -> Result<()> {
        let device = self.require_device()?;
        if !device.is_cooling() {
            warn!(device = %self.uid, %preset, "presets are only available in cooling mode");
            return Err(Error::InvalidMode(preset.to_string()));
        }
        self.coordinator.set_function(&self.uid, preset.code()).await
    }

    pub async fn turn_on(&self) -> Result<()> {
        self.coordinator.power_on(&self.uid).await
    }

    pub async fn turn_off(&self) -> Result<()> {
        self.coordinator.power_off(&self.uid).await
    }

    fn require_device(&self) -> Result<DeviceRecord> {
        self.device()
            .ok_or_else(|| Error::UnknownDevice(self.uid.clone()))
    }
}

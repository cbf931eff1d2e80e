use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

pub const DEFAULT_MIN_TEMP: f64 = 5.0;
pub const DEFAULT_MAX_TEMP: f64 = 40.0;

/// Heating/cooling setting shared by every device of a home.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeMode {
    #[default]
    Heating,
    Cooling,
}

impl HomeMode {
    /// Gateway encoding: 1 is cooling, anything else heats.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => HomeMode::Cooling,
            _ => HomeMode::Heating,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            HomeMode::Heating => 0,
            HomeMode::Cooling => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
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

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "off" => Some(HvacMode::Off),
            "heat" => Some(HvacMode::Heat),
            "cool" => Some(HvacMode::Cool),
            _ => None,
        }
    }
}

impl fmt::Display for HvacMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cooling-only operating profile, sent to the gateway as the `function` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Home,
    Sleep,
    Eco,
    Boost,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Preset::Home, Preset::Sleep, Preset::Eco, Preset::Boost];

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Preset::Home),
            2 => Some(Preset::Sleep),
            3 => Some(Preset::Eco),
            4 => Some(Preset::Boost),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Preset::Home => 1,
            Preset::Sleep => 2,
            Preset::Eco => 3,
            Preset::Boost => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Home => "home",
            Preset::Sleep => "sleep",
            Preset::Eco => "eco",
            Preset::Boost => "boost",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Preset::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One climate device as reported by a single poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    pub uid: String,
    pub unique_id: String,
    pub name: String,
    pub room: String,
    pub home: String,
    pub home_mode: HomeMode,
    pub device_type: String,
    pub temp_room: Option<f64>,
    pub temp_set: Option<f64>,
    pub standby: bool,
    pub min_temp: f64,
    pub max_temp: f64,
    pub function: u8,
    pub function_options: BTreeMap<u8, String>,
    pub connected: bool,
}

impl Default for DeviceRecord {
    fn default() -> Self {
        Self {
            uid: String::new(),
            unique_id: String::new(),
            name: String::new(),
            room: String::new(),
            home: String::new(),
            home_mode: HomeMode::Heating,
            device_type: String::new(),
            temp_room: None,
            temp_set: None,
            standby: false,
            min_temp: DEFAULT_MIN_TEMP,
            max_temp: DEFAULT_MAX_TEMP,
            function: 1,
            function_options: BTreeMap::new(),
            connected: false,
        }
    }
}

impl DeviceRecord {
    pub fn is_cooling(&self) -> bool {
        self.home_mode == HomeMode::Cooling
    }

    /// Standby wins over the home mode.
    pub fn hvac_mode(&self) -> HvacMode {
        if self.standby {
            HvacMode::Off
        } else {
            match self.home_mode {
                HomeMode::Heating => HvacMode::Heat,
                HomeMode::Cooling => HvacMode::Cool,
            }
        }
    }

    pub fn hvac_modes(&self) -> [HvacMode; 2] {
        match self.home_mode {
            HomeMode::Heating => [HvacMode::Off, HvacMode::Heat],
            HomeMode::Cooling => [HvacMode::Off, HvacMode::Cool],
        }
    }

    /// Active preset, only while the home is cooling. Unknown codes read as `Home`.
    pub fn preset(&self) -> Option<Preset> {
        if !self.is_cooling() {
            return None;
        }
        Some(Preset::from_code(self.function).unwrap_or(Preset::Home))
    }

    pub fn presets(&self) -> Option<&'static [Preset]> {
        if self.is_cooling() {
            Some(&Preset::ALL)
        } else {
            None
        }
    }

    pub fn accepts_setpoint(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min_temp && value <= self.max_temp
    }
}

/// Changes observed between two consecutive snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    DeviceAdded { uid: String, name: String },
    DeviceRemoved { uid: String, name: String },
    RoomTemperatureChanged { uid: String, name: String, temp: Option<f64> },
    SetpointChanged { uid: String, name: String, temp: Option<f64> },
    StandbyChanged { uid: String, name: String, standby: bool },
    FunctionChanged { uid: String, name: String, function: u8 },
    ConnectionChanged { uid: String, name: String, connected: bool },
    HomeModeChanged { home: String, mode: HomeMode },
}

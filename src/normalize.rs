//! Flattening of the `getHomepage` payload into [`DeviceRecord`]s.
//!
//! Missing keys fall back to defaults. Containers of the wrong shape are
//! isolated: a malformed room is skipped as a whole, a malformed home skips
//! its rooms, and the rest of the payload is still used.

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ParseError;
use crate::protocol::is_truthy;
use crate::types::{DEFAULT_MAX_TEMP, DEFAULT_MIN_TEMP, DeviceRecord, HomeMode, Preset};

/// Outcome of one normalization pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub devices: Vec<DeviceRecord>,
    pub skipped: Vec<ParseError>,
}

impl Normalized {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

struct HomeContext<'a> {
    name: &'a str,
    mode: HomeMode,
}

pub fn normalize(payload: &Value) -> Normalized {
    let mut out = Normalized::default();

    let homes = match homes_of(payload) {
        Ok(homes) => homes,
        Err(e) => {
            out.skipped.push(e);
            return out;
        }
    };

    let mut seen = HashSet::new();
    for (hi, home) in homes.iter().enumerate() {
        let path = format!("RESULT.user.homes[{hi}]");
        let Some(home) = home.as_object() else {
            out.skipped.push(ParseError::new(path, "home is not an object"));
            continue;
        };

        let rooms = match optional_array(home, "rooms") {
            Ok(rooms) => rooms,
            Err(reason) => {
                out.skipped.push(ParseError::new(format!("{path}.rooms"), reason));
                continue;
            }
        };

        let ctx = HomeContext {
            name: str_field(home, "name").unwrap_or(""),
            mode: home
                .get("mode")
                .and_then(as_number)
                .map(|m| HomeMode::from_code(m as i64))
                .unwrap_or_default(),
        };

        for (ri, room) in rooms.iter().enumerate() {
            let room_path = format!("{path}.rooms[{ri}]");
            match normalize_room(&room_path, &ctx, room) {
                Ok(devices) => {
                    for device in devices {
                        if seen.insert(device.uid.clone()) {
                            out.devices.push(device);
                        } else {
                            out.skipped.push(ParseError::new(
                                format!("{room_path}.devices.{}", device.uid),
                                "duplicate device uid",
                            ));
                        }
                    }
                }
                Err(e) => out.skipped.push(e),
            }
        }
    }

    out
}

fn homes_of(payload: &Value) -> Result<&[Value], ParseError> {
    let result = match payload.get("RESULT") {
        None | Some(Value::Null) => return Ok(&[]),
        Some(Value::Object(result)) => result,
        Some(_) => return Err(ParseError::new("RESULT", "expected an object")),
    };
    let user = match result.get("user") {
        None | Some(Value::Null) => return Ok(&[]),
        Some(Value::Object(user)) => user,
        Some(_) => return Err(ParseError::new("RESULT.user", "expected an object")),
    };
    optional_array(user, "homes").map_err(|reason| ParseError::new("RESULT.user.homes", reason))
}

fn normalize_room(
    path: &str,
    home: &HomeContext<'_>,
    room: &Value,
) -> Result<Vec<DeviceRecord>, ParseError> {
    let room = room
        .as_object()
        .ok_or_else(|| ParseError::new(path, "room is not an object"))?;
    let room_name = str_field(room, "name").unwrap_or("");

    let devices = match room.get("devices") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(ParseError::new(
                format!("{path}.devices"),
                "devices is not an object",
            ));
        }
    };

    let mut records = Vec::with_capacity(devices.len());
    for (key, device) in devices {
        let device = device.as_object().ok_or_else(|| {
            ParseError::new(format!("{path}.devices.{key}"), "device is not an object")
        })?;
        records.push(device_record(key, device, room_name, home));
    }
    Ok(records)
}

fn device_record(
    key: &str,
    device: &Map<String, Value>,
    room_name: &str,
    home: &HomeContext<'_>,
) -> DeviceRecord {
    let settings = device.get("settings").unwrap_or(&Value::Null);
    let (min_temp, max_temp) = bounds(device);

    DeviceRecord {
        uid: id_field(device, "uid").unwrap_or_else(|| key.to_string()),
        unique_id: id_field(device, "uniqueId").unwrap_or_else(|| key.to_string()),
        name: str_field(device, "name").unwrap_or(room_name).to_string(),
        room: room_name.to_string(),
        home: home.name.to_string(),
        home_mode: home.mode,
        device_type: str_field(device, "type").unwrap_or("").to_string(),
        temp_room: device.get("tempRoom").and_then(as_number),
        temp_set: device.get("tempSet").and_then(as_number),
        standby: parse_standby(device.get("standBy").unwrap_or(&Value::Null)),
        min_temp,
        max_temp,
        function: parse_function(settings),
        function_options: parse_function_options(settings),
        connected: parse_connected(device.get("connectionStatus").unwrap_or(&Value::Null)),
    }
}

fn bounds(device: &Map<String, Value>) -> (f64, f64) {
    let min = device.get("min").and_then(as_number).unwrap_or(DEFAULT_MIN_TEMP);
    let max = device.get("max").and_then(as_number).unwrap_or(DEFAULT_MAX_TEMP);
    if min < max {
        (min, max)
    } else {
        debug!(min, max, "inverted setpoint bounds, using defaults");
        (DEFAULT_MIN_TEMP, DEFAULT_MAX_TEMP)
    }
}

/// `standBy` is normally `{"value": ...}`; a bare value is read the same way.
pub(crate) fn parse_standby(standby: &Value) -> bool {
    let value = match standby {
        Value::Object(obj) => obj.get("value").unwrap_or(&Value::Null),
        other => other,
    };
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true") || s == "1",
        other => is_truthy(other),
    }
}

pub(crate) fn parse_function(settings: &Value) -> u8 {
    settings
        .pointer("/function/value")
        .and_then(as_code)
        .unwrap_or(Preset::Home.code())
}

pub(crate) fn parse_function_options(settings: &Value) -> BTreeMap<u8, String> {
    let Some(Value::Array(options)) = settings.pointer("/function/fieldOptions") else {
        return BTreeMap::new();
    };
    options
        .iter()
        .filter_map(|opt| {
            let code = opt.get("value").and_then(as_code)?;
            let label = opt
                .get("label")
                .and_then(Value::as_str)
                .unwrap_or("")
                .replace("FUNCTION_", "")
                .to_lowercase();
            Some((code, label))
        })
        .collect()
}

pub(crate) fn parse_connected(status: &Value) -> bool {
    status
        .get("status")
        .is_some_and(|s| match s {
            Value::Bool(b) => *b,
            other => other.as_f64() == Some(1.0),
        })
}

fn optional_array<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a [Value], &'static str> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err("expected an array"),
    }
}

fn str_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn id_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|f| f.is_finite())
}

/// Integer preset code in 1..=4. Floats truncate, numeric strings must be integers.
fn as_code(value: &Value) -> Option<u8> {
    let code = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        Value::Bool(b) => i64::from(*b),
        _ => return None,
    };
    u8::try_from(code).ok().filter(|c| Preset::from_code(*c).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(homes: Value) -> Value {
        json!({"success": true, "RESULT": {"user": {"homes": homes}}})
    }

    fn sample() -> Value {
        payload(json!([{
            "name": "Casa",
            "mode": 0,
            "rooms": [{
                "name": "Salotto",
                "devices": {
                    "dev-1": {
                        "uid": "dev-1",
                        "uniqueId": "u-1",
                        "name": "Fancoil",
                        "type": "FCL485",
                        "tempRoom": 21.5,
                        "tempSet": 22,
                        "standBy": {"value": false},
                        "min": 10,
                        "max": 30,
                        "connectionStatus": {"status": 1},
                        "settings": {"function": {
                            "value": "3",
                            "fieldOptions": [
                                {"value": 1, "label": "FUNCTION_HOME"},
                                {"value": 3, "label": "FUNCTION_ECO"},
                                {"label": "FUNCTION_BROKEN"}
                            ]
                        }}
                    }
                }
            }]
        }]))
    }

    #[test]
    fn flattens_single_device() {
        let result = normalize(&sample());
        assert!(result.is_complete());
        assert_eq!(result.devices.len(), 1);
        let d = &result.devices[0];
        assert_eq!(d.uid, "dev-1");
        assert_eq!(d.unique_id, "u-1");
        assert_eq!(d.name, "Fancoil");
        assert_eq!(d.room, "Salotto");
        assert_eq!(d.home, "Casa");
        assert_eq!(d.home_mode, HomeMode::Heating);
        assert_eq!(d.device_type, "FCL485");
        assert_eq!(d.temp_room, Some(21.5));
        assert_eq!(d.temp_set, Some(22.0));
        assert!(!d.standby);
        assert_eq!((d.min_temp, d.max_temp), (10.0, 30.0));
        assert_eq!(d.function, 3);
        assert_eq!(d.function_options.len(), 2);
        assert_eq!(d.function_options[&3], "eco");
        assert!(d.connected);
    }

    #[test]
    fn uid_defaults_to_mapping_key() {
        let p = payload(json!([{"rooms": [{"name": "Bagno", "devices": {"k-9": {}}}]}]));
        let result = normalize(&p);
        let d = &result.devices[0];
        assert_eq!(d.uid, "k-9");
        assert_eq!(d.unique_id, "k-9");
        assert_eq!(d.name, "Bagno");
        assert_eq!((d.min_temp, d.max_temp), (5.0, 40.0));
        assert_eq!(d.function, 1);
        assert!(!d.connected);
        assert_eq!(d.temp_room, None);
    }

    #[test]
    fn one_record_per_device_across_homes() {
        let p = payload(json!([
            {"name": "A", "rooms": [
                {"devices": {"a1": {}, "a2": {}}},
                {"devices": {"a3": {}}}
            ]},
            {"name": "B", "mode": 1, "rooms": [{"devices": {"b1": {}}}]}
        ]));
        let result = normalize(&p);
        assert_eq!(result.devices.len(), 4);
        let b1 = result.devices.iter().find(|d| d.uid == "b1").unwrap();
        assert_eq!(b1.home_mode, HomeMode::Cooling);
        assert_eq!(b1.home, "B");
    }

    #[test]
    fn malformed_room_only_skips_that_room() {
        let p = payload(json!([{
            "rooms": [
                {"devices": {"ok-1": {}}},
                {"devices": ["not", "a", "map"]},
                "not a room",
                {"devices": {"ok-2": {}, "bad": 7}},
                {"devices": {"ok-3": {}}}
            ]
        }]));
        let result = normalize(&p);
        let uids: Vec<_> = result.devices.iter().map(|d| d.uid.as_str()).collect();
        assert_eq!(uids, ["ok-1", "ok-3"]);
        assert_eq!(result.skipped.len(), 3);
        assert_eq!(result.skipped[0].path, "RESULT.user.homes[0].rooms[1].devices");
        assert_eq!(result.skipped[1].path, "RESULT.user.homes[0].rooms[2]");
    }

    #[test]
    fn malformed_home_does_not_stop_others() {
        let p = payload(json!([
            {"rooms": {"oops": true}},
            42,
            {"rooms": [{"devices": {"x": {}}}]}
        ]));
        let result = normalize(&p);
        assert_eq!(result.devices.len(), 1);
        assert_eq!(result.skipped.len(), 2);
    }

    #[test]
    fn duplicate_uid_keeps_first() {
        let p = payload(json!([{"rooms": [
            {"name": "R1", "devices": {"a": {"uid": "same"}}},
            {"name": "R2", "devices": {"b": {"uid": "same"}}}
        ]}]));
        let result = normalize(&p);
        assert_eq!(result.devices.len(), 1);
        assert_eq!(result.devices[0].room, "R1");
        assert_eq!(result.skipped[0].reason, "duplicate device uid");
    }

    #[test]
    fn missing_structure_is_empty_not_error() {
        for p in [json!({}), json!({"RESULT": {}}), json!({"RESULT": {"user": {}}})] {
            let result = normalize(&p);
            assert!(result.devices.is_empty());
            assert!(result.is_complete());
        }
    }

    #[test]
    fn wrong_top_level_shape_is_reported() {
        let result = normalize(&json!({"RESULT": {"user": {"homes": "nope"}}}));
        assert!(result.devices.is_empty());
        assert_eq!(result.skipped[0].path, "RESULT.user.homes");

        let result = normalize(&json!({"RESULT": []}));
        assert_eq!(result.skipped[0].path, "RESULT");
    }

    #[test]
    fn standby_variants() {
        for v in [json!(true), json!("true"), json!("TRUE"), json!("1"), json!(1)] {
            assert!(parse_standby(&json!({"value": v})), "{v} should be standby");
        }
        for v in [json!(false), json!("false"), json!("0"), json!(0), json!(null), json!("yes")] {
            assert!(!parse_standby(&json!({"value": v})), "{v} should not be standby");
        }
        assert!(!parse_standby(&json!({})));
        assert!(!parse_standby(&Value::Null));
        assert!(parse_standby(&json!(true)));
    }

    #[test]
    fn function_parsing() {
        assert_eq!(parse_function(&json!({})), 1);
        assert_eq!(parse_function(&Value::Null), 1);
        assert_eq!(parse_function(&json!({"function": {"value": "abc"}})), 1);
        assert_eq!(parse_function(&json!({"function": {"value": "2"}})), 2);
        assert_eq!(parse_function(&json!({"function": {"value": 4}})), 4);
        assert_eq!(parse_function(&json!({"function": {"value": 3.0}})), 3);
        assert_eq!(parse_function(&json!({"function": {"value": 9}})), 1);
        assert_eq!(parse_function(&json!({"function": {"value": null}})), 1);
    }

    #[test]
    fn function_options_parsing() {
        let settings = json!({"function": {"fieldOptions": [
            {"value": 1, "label": "FUNCTION_HOME"},
            {"value": "2", "label": "FUNCTION_SLEEP"},
            {"value": 3, "label": "FUNCTION_ECO"},
            {"label": "FUNCTION_BOOST"},
            {"value": null, "label": "FUNCTION_NULL"},
            {"value": 4}
        ]}});
        let options = parse_function_options(&settings);
        assert_eq!(options.len(), 4);
        assert_eq!(options[&1], "home");
        assert_eq!(options[&2], "sleep");
        assert_eq!(options[&3], "eco");
        assert_eq!(options[&4], "");
        assert!(parse_function_options(&json!({"function": {"fieldOptions": {}}})).is_empty());
    }

    #[test]
    fn connection_status() {
        assert!(parse_connected(&json!({"status": 1})));
        assert!(!parse_connected(&json!({"status": 0})));
        assert!(!parse_connected(&json!({"status": "1"})));
        assert!(parse_connected(&json!({"status": true})));
        assert!(!parse_connected(&json!({"status": false})));
        assert!(!parse_connected(&json!({})));
    }

    #[test]
    fn inverted_bounds_fall_back() {
        let p = payload(json!([{"rooms": [{"devices": {"a": {"min": 30, "max": 12}}}]}]));
        let d = &normalize(&p).devices[0];
        assert_eq!((d.min_temp, d.max_temp), (5.0, 40.0));
    }

    #[test]
    fn string_temperatures_are_read() {
        let p = payload(json!([{"rooms": [{"devices": {"a": {"tempRoom": "19.5", "tempSet": "x"}}}]}]));
        let d = &normalize(&p).devices[0];
        assert_eq!(d.temp_room, Some(19.5));
        assert_eq!(d.temp_set, None);
    }
}

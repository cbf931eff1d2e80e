use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value;

use crate::types::{DeviceRecord, Event, HomeMode};

/// Walks two JSON trees and records `(path, old, new)` for every leaf that
/// differs. Keys gone from `current` are reported with `new = null`.
pub(crate) fn diff_json(
    previous: &Value,
    current: &Value,
    path_prefix: &str,
    changes: &mut Vec<(String, Value, Value)>,
) {
    let join = |key: &str| {
        if path_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{path_prefix}.{key}")
        }
    };

    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = join(key);
                match prev_map.get(key) {
                    Some(prev_val) => diff_json(prev_val, curr_val, &path, changes),
                    None if curr_val.is_object() => {
                        diff_json(&Value::Object(serde_json::Map::new()), curr_val, &path, changes);
                    }
                    None => changes.push((path, Value::Null, curr_val.clone())),
                }
            }
            for (key, prev_val) in prev_map {
                if !curr_map.contains_key(key) {
                    changes.push((join(key), prev_val.clone(), Value::Null));
                }
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((path_prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}

/// Events describing how `current` differs from `previous`, matched by uid.
pub(crate) fn diff_snapshots(previous: &[DeviceRecord], current: &[DeviceRecord]) -> Vec<Event> {
    let mut events = diff_home_modes(previous, current);
    let prev_by_uid: HashMap<&str, &DeviceRecord> =
        previous.iter().map(|d| (d.uid.as_str(), d)).collect();

    for curr in current {
        let Some(prev) = prev_by_uid.get(curr.uid.as_str()) else {
            events.push(Event::DeviceAdded {
                uid: curr.uid.clone(),
                name: curr.name.clone(),
            });
            continue;
        };

        let uid = || curr.uid.clone();
        let name = || curr.name.clone();

        if prev.temp_room != curr.temp_room {
            events.push(Event::RoomTemperatureChanged {
                uid: uid(),
                name: name(),
                temp: curr.temp_room,
            });
        }
        if prev.temp_set != curr.temp_set {
            events.push(Event::SetpointChanged {
                uid: uid(),
                name: name(),
                temp: curr.temp_set,
            });
        }
        if prev.standby != curr.standby {
            events.push(Event::StandbyChanged {
                uid: uid(),
                name: name(),
                standby: curr.standby,
            });
        }
        if prev.function != curr.function {
            events.push(Event::FunctionChanged {
                uid: uid(),
                name: name(),
                function: curr.function,
            });
        }
        if prev.connected != curr.connected {
            events.push(Event::ConnectionChanged {
                uid: uid(),
                name: name(),
                connected: curr.connected,
            });
        }
    }

    let current_uids: HashSet<&str> =
        current.iter().map(|d| d.uid.as_str()).collect();
    for prev in previous {
        if !current_uids.contains(prev.uid.as_str()) {
            events.push(Event::DeviceRemoved {
                uid: prev.uid.clone(),
                name: prev.name.clone(),
            });
        }
    }

    events
}

fn diff_home_modes(previous: &[DeviceRecord], current: &[DeviceRecord]) -> Vec<Event> {
    let modes = |devices: &[DeviceRecord]| -> BTreeMap<String, HomeMode> {
        devices
            .iter()
            .map(|d| (d.home.clone(), d.home_mode))
            .collect()
    };
    let prev = modes(previous);
    modes(current)
        .into_iter()
        .filter(|(home, mode)| prev.get(home).is_some_and(|p| p != mode))
        .map(|(home, mode)| Event::HomeModeChanged { home, mode })
        .collect()
}

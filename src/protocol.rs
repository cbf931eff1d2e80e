use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use crate::{Error, Result};

pub const API_PATH: &str = "/installedplugin/com.innova.ambiente/2.0/server/index.php";

pub const GET_HOMEPAGE_ACTION: &str = "getHomepage";
pub const SET_SETPOINT_ACTION: &str = "setSetPoint";
pub const POWER_OFF_DEVICE_ACTION: &str = "powerOffDevice";
pub const POWER_ON_DEVICE_ACTION: &str = "powerOnDevice";
pub const SET_FUNCTION_ACTION: &str = "setFunction";

pub const DEFAULT_PROTOCOL: &str = "http";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_NAME: &str = "Innova Butler";
pub const ENTITY_DOMAIN: &str = "innova_butler";
pub const MANUFACTURER: &str = "Innova";
/// Model reported when a device has no `type`.
pub const DEFAULT_MODEL: &str = "FCL485";

const GUI_VERSION: &str = "1.0.66.3";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";
const ACCEPT_LANGUAGE: &str = "it-IT,it;q=0.9,fr-FR;q=0.8,fr;q=0.7,ru-RU;q=0.6,ru;q=0.5,\
    es-ES;q=0.4,es;q=0.3,en-US;q=0.2,en;q=0.1";

pub fn base_url(protocol: &str, host: &str) -> String {
    format!("{protocol}://{host}{API_PATH}")
}

pub fn action_url(base_url: &str, action: &str) -> String {
    format!("{base_url}?Action={action}")
}

/// Headers the vendor web UI sends with every command. The gateway rejects
/// POSTs that do not look like they came from its own page.
pub fn command_headers(host: &str) -> Result<HeaderMap> {
    let origin = format!("http://{host}");
    let referer = format!("{origin}/v/{GUI_VERSION}/plugins/com.innova.ambiente/gui/index.html");

    let fixed: [(&str, &str); 9] = [
        ("accept", "application/json, text/javascript, */*; q=0.01"),
        ("accept-language", ACCEPT_LANGUAGE),
        ("connection", "keep-alive"),
        (
            "content-type",
            "application/x-www-form-urlencoded; charset=UTF-8",
        ),
        ("dnt", "1"),
        ("origin", origin.as_str()),
        ("referer", referer.as_str()),
        ("user-agent", USER_AGENT),
        ("x-requested-with", "XMLHttpRequest"),
    ];

    let mut headers = HeaderMap::with_capacity(fixed.len());
    for (name, value) in fixed {
        let value =
            HeaderValue::from_str(value).map_err(|_| Error::InvalidHost(host.to_string()))?;
        headers.insert(HeaderName::from_static(name), value);
    }
    Ok(headers)
}

/// Form body of a command: `deviceUid` first, then the action payload.
pub fn command_form(device_uid: &str, payload: &[(&str, String)]) -> Vec<(String, String)> {
    let mut form = Vec::with_capacity(payload.len() + 1);
    form.push(("deviceUid".to_string(), device_uid.to_string()));
    for (key, value) in payload {
        form.push((key.to_string(), value.clone()));
    }
    form
}

/// The web UI sends setpoints the way its backend prints floats: whole
/// numbers keep one decimal.
pub fn format_setpoint(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Loose truthiness of a JSON value, matching how the gateway's own client
/// reads flags.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

pub fn is_success(body: &Value) -> bool {
    body.get("success").is_some_and(is_truthy)
}

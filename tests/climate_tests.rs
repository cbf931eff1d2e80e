use std::sync::Arc;

use innova_butler::setup::{self, SetupError};
use innova_butler::{
    Coordinator, DeviceInfo, Error, GatewayClient, HvacMode, Preset, Thermostat,
};
use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn homepage(mode: i64) -> Value {
    json!({
        "success": true,
        "RESULT": {"user": {"homes": [{
            "name": "Villa",
            "mode": mode,
            "rooms": [{
                "name": "Cucina",
                "devices": {
                    "k1": {
                        "uid": "k1",
                        "uniqueId": "abc123",
                        "name": "Split",
                        "type": "FCL600",
                        "tempRoom": 27.0,
                        "tempSet": 24.5,
                        "min": 16,
                        "max": 30,
                        "standBy": {"value": false},
                        "connectionStatus": {"status": 1},
                        "settings": {"function": {
                            "value": 3,
                            "fieldOptions": [
                                {"value": 1, "label": "FUNCTION_HOME"},
                                {"value": 3, "label": "FUNCTION_ECO"}
                            ]
                        }}
                    },
                    "k2": {
                        "uid": "k2",
                        "uniqueId": "def456",
                        "standBy": {"value": true},
                        "connectionStatus": {"status": 0}
                    }
                }
            }]
        }]}}
    })
}

fn client_for(server: &MockServer) -> GatewayClient {
    let addr = server.address();
    GatewayClient::builder(format!("{}:{}", addr.ip(), addr.port()))
        .build()
        .unwrap()
}

async fn ready(server: &MockServer, mode: i64) -> Arc<Coordinator> {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(homepage(mode)))
        .mount(server)
        .await;
    setup::start(Coordinator::builder(client_for(server)))
        .await
        .expect("first refresh should succeed")
}

fn by_uid(coordinator: &Arc<Coordinator>, uid: &str) -> Thermostat {
    Thermostat::all(coordinator)
        .into_iter()
        .find(|t| t.uid() == uid)
        .expect("thermostat should exist")
}

#[tokio::test]
async fn heating_home_exposes_heat_without_presets() {
    let server = MockServer::start().await;
    let coordinator = ready(&server, 0).await;

    let split = by_uid(&coordinator, "k1");
    assert_eq!(split.unique_id(), "innova_butler_abc123");
    assert!(split.available());
    assert_eq!(split.current_temperature(), Some(27.0));
    assert_eq!(split.target_temperature(), Some(24.5));
    assert_eq!((split.min_temp(), split.max_temp()), (16.0, 30.0));
    assert_eq!(split.hvac_mode(), Some(HvacMode::Heat));
    assert_eq!(split.hvac_modes(), vec![HvacMode::Off, HvacMode::Heat]);
    assert_eq!(split.preset(), None);
    assert!(split.presets().is_none());
    assert!(!split.features().preset_mode);
}

#[tokio::test]
async fn cooling_home_exposes_presets() {
    let server = MockServer::start().await;
    let coordinator = ready(&server, 1).await;

    let split = by_uid(&coordinator, "k1");
    assert_eq!(split.hvac_mode(), Some(HvacMode::Cool));
    assert_eq!(split.preset(), Some(Preset::Eco));
    assert_eq!(split.presets().map(<[_]>::len), Some(4));
    assert!(split.features().preset_mode);

    let device = split.device().unwrap();
    assert_eq!(device.function_options.get(&3).map(String::as_str), Some("eco"));
}

#[tokio::test]
async fn device_info_for_registry() {
    let server = MockServer::start().await;
    let coordinator = ready(&server, 0).await;

    assert_eq!(
        by_uid(&coordinator, "k1").device_info(),
        Some(DeviceInfo {
            identifiers: vec![("innova_butler".into(), "abc123".into())],
            name: "Split".into(),
            manufacturer: "Innova".into(),
            model: "FCL600".into(),
            suggested_area: Some("Cucina".into()),
        })
    );

    let other = by_uid(&coordinator, "k2").device_info().unwrap();
    assert_eq!(other.model, "FCL485");
    assert_eq!(other.name, "Cucina");
}

#[tokio::test]
async fn standby_and_disconnected_device() {
    let server = MockServer::start().await;
    let coordinator = ready(&server, 1).await;

    let other = by_uid(&coordinator, "k2");
    assert_eq!(other.hvac_mode(), Some(HvacMode::Off));
    assert!(!other.available());
    assert_eq!(other.current_temperature(), None);
}

#[tokio::test]
async fn preset_rejected_while_heating() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(0)
        .mount(&server)
        .await;
    let coordinator = ready(&server, 0).await;

    let err = by_uid(&coordinator, "k1")
        .set_preset(Preset::Boost)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidMode(ref m) if m == "boost"), "got {err:?}");
}

#[tokio::test]
async fn preset_sent_as_function_code_while_cooling() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(query_param("Action", "setFunction"))
        .and(body_string_contains("deviceUid=k1&value=4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    let coordinator = ready(&server, 1).await;

    by_uid(&coordinator, "k1")
        .set_preset(Preset::Boost)
        .await
        .unwrap();
}

#[tokio::test]
async fn setpoint_outside_bounds_is_refused_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(0)
        .mount(&server)
        .await;
    let coordinator = ready(&server, 0).await;

    let err = by_uid(&coordinator, "k1")
        .set_temperature(31.0)
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::InvalidSetpoint { min, max, .. } if min == 16.0 && max == 30.0),
        "got {err:?}"
    );
}

#[tokio::test]
async fn hvac_mode_maps_to_power_commands() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(query_param("Action", "powerOnDevice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(query_param("Action", "powerOffDevice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    let coordinator = ready(&server, 0).await;

    let split = by_uid(&coordinator, "k1");
    split.set_hvac_mode(HvacMode::Heat).await.unwrap();
    split.set_hvac_mode(HvacMode::Cool).await.unwrap();
    split.set_hvac_mode(HvacMode::Off).await.unwrap();
}

#[tokio::test]
async fn unknown_device_is_an_error() {
    let server = MockServer::start().await;
    let coordinator = ready(&server, 0).await;

    let mut device = coordinator.device("k1").unwrap();
    device.uid = "ghost".into();
    let ghost = Thermostat::new(coordinator.clone(), &device);
    let err = ghost.set_hvac_mode(HvacMode::Off).await.unwrap_err();
    assert!(matches!(err, Error::UnknownDevice(ref uid) if uid == "ghost"));
    assert!(!ghost.available());
}

#[tokio::test]
async fn validate_uses_home_name_as_title() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(homepage(0)))
        .mount(&server)
        .await;

    let summary = setup::validate(&mut client_for(&server)).await.unwrap();
    assert_eq!(summary.title, "Villa");
    assert_eq!(summary.device_count, 2);
}

#[tokio::test]
async fn validate_without_devices() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "RESULT": {"user": {"homes": []}}})),
        )
        .mount(&server)
        .await;

    let err = setup::validate(&mut client_for(&server)).await.unwrap_err();
    assert!(matches!(err, SetupError::NoDevices));
    assert_eq!(err.reason(), "no_devices");
}

#[tokio::test]
async fn validate_unreachable_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = setup::validate(&mut client_for(&server)).await.unwrap_err();
    assert_eq!(err.reason(), "cannot_connect");
}

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::credentials::{CredentialProvider, NoCredentials};
use crate::logger::{MessageLogMode, MessageLogger};
use crate::normalize::{Normalized, normalize};
use crate::protocol::{
    DEFAULT_PROTOCOL, DEFAULT_TIMEOUT, GET_HOMEPAGE_ACTION, POWER_OFF_DEVICE_ACTION,
    POWER_ON_DEVICE_ACTION, SET_FUNCTION_ACTION, SET_SETPOINT_ACTION, action_url, base_url,
    command_form, command_headers, format_setpoint, is_success,
};
use crate::{Error, Result};

pub struct GatewayClientBuilder {
    host: String,
    protocol: String,
    timeout: Duration,
    credentials: Arc<dyn CredentialProvider>,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl GatewayClientBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            protocol: DEFAULT_PROTOCOL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            credentials: Arc::new(NoCredentials),
            log_mode: None,
            log_path: None,
        }
    }

    pub fn protocol(mut self, proto: &str) -> Self {
        self.protocol = proto.to_string();
        self
    }

    /// Per-request bound covering connect, send and body read.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn credentials(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.credentials = Arc::new(provider);
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<GatewayClient> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidHost(self.host));
        }

        let http = reqwest::Client::builder().timeout(self.timeout).build()?;
        let command_headers = command_headers(&self.host)?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, &path)?),
            _ => None,
        };

        Ok(GatewayClient {
            http,
            base_url: base_url(&self.protocol, &self.host),
            host: self.host,
            command_headers,
            credentials: self.credentials,
            logger,
        })
    }
}

/// HTTP client for one gateway's control-panel API.
pub struct GatewayClient {
    http: reqwest::Client,
    host: String,
    base_url: String,
    command_headers: reqwest::header::HeaderMap,
    credentials: Arc<dyn CredentialProvider>,
    logger: Option<MessageLogger>,
}

impl GatewayClient {
    pub fn builder(host: impl Into<String>) -> GatewayClientBuilder {
        GatewayClientBuilder::new(host)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Full homepage payload. Fails unless the gateway answers 200 with a
    /// truthy `success` flag.
    pub async fn fetch_state(&mut self) -> Result<Value> {
        let url = action_url(&self.base_url, GET_HOMEPAGE_ACTION);
        debug!(host = %self.host, "fetching gateway state");

        if let Some(ref mut logger) = self.logger {
            logger.log_request("GET", GET_HOMEPAGE_ACTION);
        }

        let resp = self
            .http
            .get(&url)
            .headers(self.credentials.headers(&self.host))
            .send()
            .await?;

        let (status, body) = read_body(GET_HOMEPAGE_ACTION, resp).await?;
        if let Some(ref mut logger) = self.logger {
            logger.log_poll(status, &body);
        }
        check_envelope(GET_HOMEPAGE_ACTION, status, body)
    }

    /// POSTs `action` for one device. Single attempt, no retry.
    pub async fn send_command(
        &mut self,
        action: &str,
        device_uid: &str,
        payload: &[(&str, String)],
    ) -> Result<Value> {
        let url = action_url(&self.base_url, action);
        let form = command_form(device_uid, payload);
        debug!(host = %self.host, action, device = device_uid, "sending command");

        if let Some(ref mut logger) = self.logger {
            logger.log_command(action, device_uid, &form);
        }

        let mut headers = self.command_headers.clone();
        headers.extend(self.credentials.headers(&self.host));

        // headers after form so the vendor content type (with charset) wins
        let resp = self
            .http
            .post(&url)
            .form(&form)
            .headers(headers)
            .send()
            .await?;

        let (status, body) = read_body(action, resp).await?;
        if let Some(ref mut logger) = self.logger {
            logger.log_response(action, status, &body);
        }
        check_envelope(action, status, body)
    }

    pub async fn set_temperature(&mut self, device_uid: &str, value: f64) -> Result<()> {
        let payload = [("value", format_setpoint(value))];
        self.send_command(SET_SETPOINT_ACTION, device_uid, &payload)
            .await?;
        Ok(())
    }

    pub async fn power_on(&mut self, device_uid: &str) -> Result<()> {
        let payload = [("value", "1".to_string())];
        self.send_command(POWER_ON_DEVICE_ACTION, device_uid, &payload)
            .await?;
        Ok(())
    }

    pub async fn power_off(&mut self, device_uid: &str) -> Result<()> {
        let payload = [("value", "0".to_string())];
        self.send_command(POWER_OFF_DEVICE_ACTION, device_uid, &payload)
            .await?;
        Ok(())
    }

    /// Changes the cooling preset. The gateway ignores it while heating.
    pub async fn set_function(&mut self, device_uid: &str, code: u8) -> Result<()> {
        let payload = [("value", code.to_string())];
        self.send_command(SET_FUNCTION_ACTION, device_uid, &payload)
            .await?;
        Ok(())
    }

    pub fn normalize(&self, payload: &Value) -> Normalized {
        let normalized = normalize(payload);
        for skipped in &normalized.skipped {
            warn!(host = %self.host, path = %skipped.path, reason = %skipped.reason, "skipped part of gateway payload");
        }
        trace!(count = normalized.devices.len(), "normalized devices");
        normalized
    }

    pub async fn fetch_devices(&mut self) -> Result<Normalized> {
        let payload = self.fetch_state().await?;
        Ok(self.normalize(&payload))
    }
}

async fn read_body(action: &str, resp: reqwest::Response) -> Result<(u16, Value)> {
    let status = resp.status();
    if status != StatusCode::OK {
        return Err(Error::Status {
            action: action.to_string(),
            status: status.as_u16(),
        });
    }
    let text = resp.text().await?;
    let body = serde_json::from_str(&text).map_err(|source| Error::Decode {
        action: action.to_string(),
        source,
    })?;
    Ok((status.as_u16(), body))
}

fn check_envelope(action: &str, status: u16, body: Value) -> Result<Value> {
    if !is_success(&body) {
        debug!(action, status, "gateway rejected request");
        return Err(Error::Rejected {
            action: action.to_string(),
        });
    }
    Ok(body)
}

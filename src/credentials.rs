use reqwest::header::HeaderMap;

/// Supplies authentication material (headers, cookies) for gateway requests.
///
/// The gateway's web UI carries a session cookie and access-token headers;
/// how those are obtained is not known, so the client only asks a provider
/// for them before each request.
pub trait CredentialProvider: Send + Sync {
    fn headers(&self, host: &str) -> HeaderMap;
}

/// Sends no credentials. Enough for gateways that accept anonymous LAN access.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn headers(&self, _host: &str) -> HeaderMap {
        HeaderMap::new()
    }
}

/// A fixed header set, e.g. a `KSESS` cookie copied from a browser session.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    headers: HeaderMap,
}

impl StaticCredentials {
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }
}

impl CredentialProvider for StaticCredentials {
    fn headers(&self, _host: &str) -> HeaderMap {
        self.headers.clone()
    }
}

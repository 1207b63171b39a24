use super::error::FixtureError;
use super::FixtureApi;
use crate::fixture::models::PanelPosition;
use crate::fixture::stream::{protocol::EXT_CONTROL_PORT, PanelStream, UdpPanelStream};
use async_trait::async_trait;
use leafcast_core::FixtureConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// REST client for the fixture's `/api/v1` interface.
pub struct FixtureClient {
    http: reqwest::Client,
    config: FixtureConfig,
}

#[derive(Deserialize)]
struct AuthTokenResponse {
    auth_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutResponse {
    #[serde(default)]
    num_panels: usize,
    position_data: Vec<PanelPosition>,
}

/// Identity of the fixture as reported by `GET /api/v1/{token}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub firmware_version: String,
}

#[derive(Serialize)]
struct ValueBody<T> {
    value: T,
}

#[derive(Serialize)]
struct PowerState {
    on: ValueBody<bool>,
}

#[derive(Serialize)]
struct BrightnessState {
    brightness: ValueBody<u8>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtControlCommand {
    command: &'static str,
    anim_type: &'static str,
    ext_control_version: &'static str,
}

#[derive(Serialize)]
struct EffectsWrite {
    write: ExtControlCommand,
}

fn build_client() -> Result<reqwest::Client, FixtureError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(FixtureError::Network)
}

/// Map non-success HTTP statuses to fixture errors
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, FixtureError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(FixtureError::Unauthorized);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(FixtureError::Api {
        status: status.as_u16(),
        message,
    })
}

impl FixtureClient {
    /// Create a client for a paired fixture.
    pub fn new(config: FixtureConfig) -> Result<Self, FixtureError> {
        if !config.is_complete() {
            return Err(FixtureError::NotConfigured);
        }
        Ok(Self {
            http: build_client()?,
            config,
        })
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "http://{}:{}/api/v1/{}/{}",
            self.config.address, self.config.port, self.config.auth_token, path
        )
    }

    /// Requests a new auth token from the fixture.
    ///
    /// Only succeeds while the fixture is in pairing mode (power button held
    /// for 5-7 seconds); otherwise returns [`FixtureError::PairingNotEnabled`].
    pub async fn generate_auth_token(address: &str, port: u16) -> Result<String, FixtureError> {
        let client = build_client()?;
        let url = format!("http://{}:{}/api/v1/new", address, port);
        let resp = client.post(&url).send().await?;

        if resp.status() == reqwest::StatusCode::FORBIDDEN {
            return Err(FixtureError::PairingNotEnabled);
        }
        let resp = check_status(resp).await?;
        let body: AuthTokenResponse = resp.json().await?;

        if body.auth_token.is_empty() {
            return Err(FixtureError::InvalidResponse(
                "Empty auth token from fixture".to_string(),
            ));
        }
        Ok(body.auth_token)
    }

    /// Poll for an auth token until the user enables pairing or `timeout` elapses.
    pub async fn wait_for_auth_token(
        address: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<String, FixtureError> {
        info!(
            "Requesting auth token from {} ({}s timeout)...",
            address,
            timeout.as_secs()
        );

        let start_time = std::time::Instant::now();
        let poll_interval = Duration::from_secs(2);

        loop {
            match Self::generate_auth_token(address, port).await {
                Ok(token) => {
                    info!("Received auth token from fixture");
                    return Ok(token);
                }
                Err(FixtureError::PairingNotEnabled) if start_time.elapsed() < timeout => {
                    info!(
                        "Pairing not enabled yet ({}s/{}s). Retrying...",
                        start_time.elapsed().as_secs(),
                        timeout.as_secs()
                    );
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Fetch name, model and firmware of the fixture
    pub async fn device_info(&self) -> Result<DeviceInfo, FixtureError> {
        let url = self.endpoint("");
        let resp = check_status(self.http.get(&url).send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn put_state<T: Serialize>(&self, body: &T) -> Result<(), FixtureError> {
        let url = self.endpoint("state");
        check_status(self.http.put(&url).json(body).send().await?).await?;
        Ok(())
    }

    async fn resolve_stream_target(&self) -> Result<SocketAddr, FixtureError> {
        let mut addrs =
            tokio::net::lookup_host((self.config.address.as_str(), EXT_CONTROL_PORT)).await?;
        addrs.next().ok_or_else(|| {
            FixtureError::InvalidResponse(format!(
                "Could not resolve fixture address {}",
                self.config.address
            ))
        })
    }
}

#[async_trait]
impl FixtureApi for FixtureClient {
    async fn panel_layout(&self) -> Result<Vec<PanelPosition>, FixtureError> {
        let url = self.endpoint("panelLayout/layout");
        let resp = check_status(self.http.get(&url).send().await?).await?;
        let layout: LayoutResponse = resp.json().await?;

        if layout.num_panels != layout.position_data.len() {
            debug!(
                "Layout reports {} panels but lists {}",
                layout.num_panels,
                layout.position_data.len()
            );
        }
        Ok(layout.position_data)
    }

    async fn set_power(&self, on: bool) -> Result<(), FixtureError> {
        debug!("Setting fixture power {}", if on { "on" } else { "off" });
        self.put_state(&PowerState {
            on: ValueBody { value: on },
        })
        .await
    }

    async fn set_brightness(&self, level: u8) -> Result<(), FixtureError> {
        debug!("Setting fixture brightness to {}", level);
        self.put_state(&BrightnessState {
            brightness: ValueBody {
                value: level.min(100),
            },
        })
        .await
    }

    async fn open_stream(&self) -> Result<Box<dyn PanelStream>, FixtureError> {
        let url = self.endpoint("effects");
        let body = EffectsWrite {
            write: ExtControlCommand {
                command: "display",
                anim_type: "extControl",
                ext_control_version: "v2",
            },
        };
        check_status(self.http.put(&url).json(&body).send().await?).await?;

        let target = self.resolve_stream_target().await?;
        let stream = UdpPanelStream::connect(target).await?;
        info!("External control stream open to {}", target);
        Ok(Box::new(stream))
    }
}

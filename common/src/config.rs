use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    #[serde(rename = "linkWarmupMs")]
    pub link_warmup_ms: u64,
    #[serde(rename = "brokerRetryMs")]
    pub broker_retry_ms: u64,
    #[serde(rename = "connectTimeoutMs")]
    pub connect_timeout_ms: u64,
    #[serde(rename = "keepAliveSecs")]
    pub keep_alive_secs: u64,
    #[serde(rename = "splashMs")]
    pub splash_ms: u64,
    #[serde(rename = "statusBlinkMs")]
    pub status_blink_ms: u64,
    #[serde(rename = "offAnimMs")]
    pub off_anim_ms: u64,
    #[serde(rename = "loopIntervalMs")]
    pub loop_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            link_warmup_ms: 10_000,
            broker_retry_ms: 5_000,
            connect_timeout_ms: 3_000,
            keep_alive_secs: 15,
            splash_ms: 5_000,
            status_blink_ms: 500,
            off_anim_ms: 50,
            loop_interval_ms: 10,
        }
    }
}

/// Credentials and broker address. Deliberately without usable defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    #[serde(rename = "wifiSsid")]
    pub wifi_ssid: String,
    #[serde(rename = "wifiPass")]
    pub wifi_pass: String,
    #[serde(rename = "mqttHost")]
    pub mqtt_host: String,
    #[serde(rename = "mqttPort")]
    pub mqtt_port: u16,
    #[serde(rename = "mqttUser")]
    pub mqtt_user: String,
    #[serde(rename = "mqttPass")]
    pub mqtt_pass: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_pass: String::new(),
            mqtt_host: String::new(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub network: NetworkConfig,
    pub timing: TimingConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_id: "ac_alpha".to_string(),
            network: NetworkConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_id.trim().is_empty() {
            return Err(ConfigError::Missing("deviceId"));
        }
        if self.device_id.contains(|c: char| matches!(c, '/' | '+' | '#')) {
            return Err(ConfigError::Invalid {
                field: "deviceId",
                reason: "must not contain MQTT topic separators or wildcards",
            });
        }
        if self.network.wifi_ssid.trim().is_empty() {
            return Err(ConfigError::Missing("wifiSsid"));
        }
        if self.network.wifi_pass.is_empty() {
            return Err(ConfigError::Missing("wifiPass"));
        }
        if self.network.mqtt_host.trim().is_empty() {
            return Err(ConfigError::Missing("mqttHost"));
        }
        if self.network.mqtt_port == 0 {
            return Err(ConfigError::Invalid {
                field: "mqttPort",
                reason: "must be between 1 and 65535",
            });
        }
        if self.timing.broker_retry_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "brokerRetryMs",
                reason: "must be greater than zero",
            });
        }
        if self.timing.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "connectTimeoutMs",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }
}

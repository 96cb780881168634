use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the HTTP server, the broadcast core and logging.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub log: LogSettings,
}

/// Configuration settings for the server.
///
/// Defines the host and port the server will bind to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Configuration settings for the broker.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    /// Capacity of each subscriber's delivery channel. Values below 1 are raised to 1.
    pub delivery_buffer: usize,
    /// Interval between SSE keep-alive comments. `0` disables them.
    pub keep_alive_secs: u64,
    /// Shortest username accepted by `/sse` and `/send`.
    pub min_username_len: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub delivery_buffer: Option<usize>,
    pub keep_alive_secs: Option<u64>,
    pub min_username_len: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            delivery_buffer: 1,
            keep_alive_secs: 15,
            min_username_len: 3,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Overlay whatever was present in `partial` on top of the defaults.
    pub fn merge(partial: PartialSettings) -> Self {
        let default = Settings::default();

        Settings {
            server: ServerSettings {
                host: partial
                    .server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: partial
                    .server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
            },
            broker: BrokerSettings {
                delivery_buffer: partial
                    .broker
                    .as_ref()
                    .and_then(|b| b.delivery_buffer)
                    .unwrap_or(default.broker.delivery_buffer),
                keep_alive_secs: partial
                    .broker
                    .as_ref()
                    .and_then(|b| b.keep_alive_secs)
                    .unwrap_or(default.broker.keep_alive_secs),
                min_username_len: partial
                    .broker
                    .as_ref()
                    .and_then(|b| b.min_username_len)
                    .unwrap_or(default.broker.min_username_len),
            },
            log: LogSettings {
                level: partial
                    .log
                    .and_then(|l| l.level)
                    .unwrap_or(default.log.level),
            },
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

use std::net::IpAddr;

/// Battle API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind_addr: IpAddr,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Per-connection outbound queue length. Messages beyond it are dropped.
    pub outbound_capacity: usize,
    /// Allowed CORS origin. `None` allows any origin.
    pub cors_allow_origin: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::from([0, 0, 0, 0]),
            port: 3000,
            outbound_capacity: 64,
            cors_allow_origin: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; missing or unparsable values fall back to
    /// the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: parsed(&lookup, "BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            outbound_capacity: parsed(&lookup, "GATEWAY_OUTBOUND_CAPACITY")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.outbound_capacity),
            cors_allow_origin: lookup("CORS_ALLOW_ORIGIN").filter(|s| !s.is_empty()),
        }
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring invalid config value");
            None
        }
    }
}

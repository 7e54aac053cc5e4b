//! Configuration for the control server

use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlServerConfig {
    /// Address to listen on, as `host:port`. Passed verbatim to the socket layer.
    pub bind: String,
    /// Close sessions which wait longer than this for their next call.
    /// Unset means sessions live until the peer disconnects.
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Control server config needs a bind setting")]
    MissingBind,
    #[error("Control server idle timeout must be non-zero")]
    ZeroIdleTimeout,
}

impl ControlServerConfig {
    pub fn new(bind: impl Into<String>) -> Self {
        Self {
            bind: bind.into(),
            idle_timeout_secs: None,
        }
    }

    /// Set the idle timeout, rounded up to a whole number of seconds
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        let partial = u64::from(timeout.subsec_nanos() > 0);
        self.idle_timeout_secs = Some(timeout.as_secs() + partial);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind.trim().is_empty() {
            return Err(ConfigError::MissingBind);
        }
        if self.idle_timeout_secs == Some(0) {
            return Err(ConfigError::ZeroIdleTimeout);
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bind_is_rejected() {
        assert_eq!(
            ControlServerConfig::new("").validate(),
            Err(ConfigError::MissingBind)
        );
        assert_eq!(
            ControlServerConfig::new("   ").validate(),
            Err(ConfigError::MissingBind)
        );
    }

    #[test]
    fn zero_idle_timeout_is_rejected() {
        let mut conf = ControlServerConfig::new("127.0.0.1:6660");
        conf.idle_timeout_secs = Some(0);

        assert_eq!(conf.validate(), Err(ConfigError::ZeroIdleTimeout));
    }

    #[test]
    fn deserialise_without_timeout() {
        let conf: ControlServerConfig =
            serde_json::from_str(r#"{ "bind": "127.0.0.1:6660" }"#).unwrap();

        assert_eq!(conf.validate(), Ok(()));
        assert_eq!(conf.idle_timeout(), None);
    }

    #[test]
    fn idle_timeout_in_seconds() {
        let conf = ControlServerConfig::new("[::1]:6660").with_idle_timeout(Duration::from_secs(30));

        assert_eq!(conf.idle_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn fractional_idle_timeout_rounds_up() {
        let conf = ControlServerConfig::new("127.0.0.1:6660")
            .with_idle_timeout(Duration::from_millis(500));
        assert_eq!(conf.validate(), Ok(()));
        assert_eq!(conf.idle_timeout(), Some(Duration::from_secs(1)));

        let conf = ControlServerConfig::new("127.0.0.1:6660")
            .with_idle_timeout(Duration::from_millis(1900));
        assert_eq!(conf.idle_timeout(), Some(Duration::from_secs(2)));

        let conf = ControlServerConfig::new("127.0.0.1:6660").with_idle_timeout(Duration::ZERO);
        assert_eq!(conf.validate(), Err(ConfigError::ZeroIdleTimeout));
    }
}

//! Configuration for a single upstream relay connection

use serde::{Deserialize, Serialize};

fn default_port() -> u16 {
    6667
}

/// Configuration of one named upstream IRC connection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConnectionConfig {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default)]
    pub flood_protection: bool,
    /// Nicknames to try, in order of preference
    #[serde(default)]
    pub nicks: Vec<String>,
    #[serde(default)]
    pub ident: String,
    #[serde(default)]
    pub realname: String,
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
}

impl ConnectionConfig {
    /// A config with only a name and address set, everything else defaulted
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            ssl: false,
            flood_protection: false,
            nicks: Vec::new(),
            ident: String::new(),
            realname: String::new(),
            admins: Vec::new(),
            channels: Vec::new(),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn minimal_config_uses_defaults() {
        let conf: ConnectionConfig =
            serde_json::from_str(r#"{ "name": "libera", "host": "irc.libera.chat" }"#).unwrap();

        assert_eq!(conf, ConnectionConfig::new("libera", "irc.libera.chat", 6667));
        assert_eq!(conf.address(), "irc.libera.chat:6667");
    }

    #[test]
    fn full_config() {
        let conf: ConnectionConfig = serde_json::from_str(
            r##"{
                "name": "mockirc",
                "host": "localhost",
                "port": 26661,
                "ssl": true,
                "flood_protection": true,
                "nicks": ["relay", "relay-"],
                "ident": "something",
                "realname": "relay",
                "admins": ["kyle"],
                "channels": ["#relay", "#test"]
            }"##,
        )
        .unwrap();

        assert!(conf.ssl);
        assert!(conf.flood_protection);
        assert_eq!(conf.nicks, vec!["relay", "relay-"]);
        assert_eq!(conf.channels, vec!["#relay", "#test"]);
    }
}

use crate::config::{MxbiliConfig, DEFAULT_PORT};

/// The user-editable pair the running proxy must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub port: u16,
    pub sessdata: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            sessdata: None,
        }
    }
}

impl From<&MxbiliConfig> for Settings {
    /// Port 0 (only reachable for configs built in code) falls back to the default.
    fn from(cfg: &MxbiliConfig) -> Self {
        let port = match cfg.port {
            0 => {
                tracing::warn!("configured port 0 is not usable, using {}", DEFAULT_PORT);
                DEFAULT_PORT
            }
            p => p,
        };
        Self {
            port,
            sessdata: normalize_sessdata(cfg.sessdata.as_deref()),
        }
    }
}

impl Settings {
    /// Write these settings into a full config, leaving other sections alone.
    pub fn apply_to(&self, cfg: &mut MxbiliConfig) {
        cfg.port = self.port;
        cfg.sessdata = self.sessdata.clone();
    }
}

/// Trim the cookie value; blank means "no cookie".
pub fn normalize_sessdata(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_sessdata_is_none() {
        assert_eq!(normalize_sessdata(None), None);
        assert_eq!(normalize_sessdata(Some("")), None);
        assert_eq!(normalize_sessdata(Some("  \t")), None);
        assert_eq!(normalize_sessdata(Some(" abc ")), Some("abc".to_string()));
    }

    #[test]
    fn settings_round_trip_through_config() {
        let mut cfg = MxbiliConfig::default();
        cfg.sessdata = Some(" tok ".to_string());
        let mut s = Settings::from(&cfg);
        assert_eq!(s.port, DEFAULT_PORT);
        assert_eq!(s.sessdata.as_deref(), Some("tok"));

        s.port = 9000;
        s.apply_to(&mut cfg);
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.upstream.default_origin, "https://i0.hdslb.com");
    }

    #[test]
    fn port_zero_falls_back_to_default() {
        let cfg = MxbiliConfig {
            port: 0,
            ..MxbiliConfig::default()
        };
        assert_eq!(Settings::from(&cfg).port, DEFAULT_PORT);
    }
}

//! URI authority (scheme + host + port) used for cross-domain checks.

use std::fmt;

use url::Url;

/// Where a URI lives. Plain local paths and `file://` URLs share the
/// [`Authority::Local`] authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Authority {
    Local,
    Remote {
        scheme: String,
        host: String,
        port: Option<u16>,
    },
    /// A URI with a scheme but no host (e.g. `info:`, `urn:`).
    Opaque { scheme: String },
}

impl Authority {
    pub fn of(uri: &str) -> Authority {
        if !resync_core::mapper::has_scheme(uri) {
            return Authority::Local;
        }
        match Url::parse(uri) {
            Ok(url) if url.scheme() == "file" => Authority::Local,
            Ok(url) => match url.host_str() {
                Some(host) => Authority::Remote {
                    scheme: url.scheme().to_string(),
                    host: host.to_ascii_lowercase(),
                    port: url.port_or_known_default(),
                },
                None => Authority::Opaque {
                    scheme: url.scheme().to_string(),
                },
            },
            Err(_) => Authority::Local,
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authority::Local => f.write_str("local"),
            Authority::Remote { scheme, host, port } => {
                write!(f, "{scheme}://{host}")?;
                if let Some(port) = port {
                    write!(f, ":{port}")?;
                }
                Ok(())
            }
            Authority::Opaque { scheme } => write!(f, "{scheme}:"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("http://example.org/a", "http://EXAMPLE.org:80/b")]
    #[case("https://ex.org/", "https://ex.org:443/x/y")]
    #[case("/data/src/a", "relative/b")]
    #[case("/data/src/a", "file:///elsewhere/b")]
    fn same_authority(#[case] a: &str, #[case] b: &str) {
        assert_eq!(Authority::of(a), Authority::of(b));
    }

    #[rstest]
    #[case("http://example.org/a", "https://example.org/a")]
    #[case("http://example.org/a", "http://example.org:8080/a")]
    #[case("http://example.org/a", "http://other.org/a")]
    #[case("/data/src/a", "http://example.org/a")]
    fn different_authority(#[case] a: &str, #[case] b: &str) {
        assert_ne!(Authority::of(a), Authority::of(b));
    }

    #[test]
    fn display_omits_nothing_it_knows() {
        assert_eq!(Authority::of("http://ex.org/a").to_string(), "http://ex.org:80");
        assert_eq!(Authority::of("info:whatever").to_string(), "info:");
        assert_eq!(Authority::of("/tmp").to_string(), "local");
    }
}

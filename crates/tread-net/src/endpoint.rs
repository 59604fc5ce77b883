//! Server URL derivation.
//!
//! In production the socket URL follows the page the client was served from:
//! `http` becomes `ws`, `https` becomes `wss`, and the host is kept. During
//! development a fixed port can replace the page's port, and an explicit URL
//! overrides everything.

use url::Url;

/// Why a server URL could not be derived.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid URL: {0}")]
    Parse(#[from] url::ParseError),

    #[error("unsupported scheme {0:?}, expected http, https, ws or wss")]
    UnsupportedScheme(String),

    #[error("origin has no host")]
    MissingHost,
}

/// Derive the socket URL from the page origin, e.g.
/// `https://game.example.com` to `wss://game.example.com/`.
pub fn server_url_from_origin(origin: &str, dev_port: Option<u16>) -> Result<String, EndpointError> {
    let parsed = Url::parse(origin)?;
    let scheme = match parsed.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
    };
    let host = parsed.host_str().ok_or(EndpointError::MissingHost)?;

    let mut url = Url::parse(&format!("{scheme}://{host}/"))?;
    let port = dev_port.or(parsed.port());
    // Only fails for cannot-be-a-base URLs, which ws/wss with a host never are.
    let _ = url.set_port(port);
    Ok(url.to_string())
}

/// Pick the server URL: an explicit URL wins, otherwise derive it from the
/// origin.
pub fn resolve_server_url(
    explicit: Option<&str>,
    origin: &str,
    dev_port: Option<u16>,
) -> Result<String, EndpointError> {
    match explicit {
        Some(url) => {
            let parsed = Url::parse(url)?;
            match parsed.scheme() {
                "ws" | "wss" => Ok(parsed.to_string()),
                other => Err(EndpointError::UnsupportedScheme(other.to_string())),
            }
        }
        None => server_url_from_origin(origin, dev_port),
    }
}

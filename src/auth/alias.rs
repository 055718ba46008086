use std::net::IpAddr;

use reqwest::Url;

/// Alias given to servers on this machine.
pub const LOOPBACK_ALIAS: &str = "local";

/// Short name for a server URL: `local` for loopback, the address for other
/// IPs, otherwise the first DNS label (`sc.example.com` -> `sc`).
pub fn derive_alias(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let bare = host.trim_start_matches('[').trim_end_matches(']');

    if bare.eq_ignore_ascii_case("localhost") {
        return Some(LOOPBACK_ALIAS.to_string());
    }
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return Some(if ip.is_loopback() {
            LOOPBACK_ALIAS.to_string()
        } else {
            ip.to_string()
        });
    }

    host.split('.')
        .next()
        .filter(|label| !label.is_empty())
        .map(str::to_lowercase)
}

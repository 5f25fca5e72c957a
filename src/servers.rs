//! Static table of Xeovo VPN gateways.

use std::collections::HashSet;

/// One configured VPN gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerEntry {
    /// Short server code, unique within the table
    pub code: &'static str,
    /// Hostname passed to `ping`
    pub host: &'static str,
    pub country: &'static str,
    pub city: &'static str,
}

const fn server(
    code: &'static str,
    host: &'static str,
    country: &'static str,
    city: &'static str,
) -> ServerEntry {
    ServerEntry {
        code,
        host,
        country,
        city,
    }
}

pub static XEOVO_SERVERS: &[ServerEntry] = &[
    server("al", "au.gw.xeovo.com", "Albania", "Tirana"),
    server("au", "au.gw.xeovo.com", "Australia", "Sydney"),
    server("ca", "ca.gw.xeovo.com", "Canada", "Montreal"),
    server("ch", "ch.gw.xeovo.com", "Switzerland", "Zurich"),
    server("de", "ch.gw.xeovo.com", "Germany", "Falkenstein"),
    server("fi", "fi.gw.xeovo.com", "Finland", "Helsinki"),
    server("fr", "fr.gw.xeovo.com", "France", "Paris"),
    server("jp", "jp.gw.xeovo.com", "Japan", "Tokyo"),
    server("lu", "lu.gw.xeovo.com", "Luxembourg", "Roost"),
    server("lv", "lv.gw.xeovo.com", "Latvia", "Riga"),
    server("nl", "nl.gw.xeovo.com", "Netherlands", "Amsterdam"),
    server("no", "no.gw.xeovo.com", "Norway", "Sandefjord"),
    server("pl", "pl.gw.xeovo.com", "Poland", "Warsaw"),
    server("ro", "ro.gw.xeovo.com", "Romania", "Iasi"),
    server("se", "se.gw.xeovo.com", "Sweden", "Stockholm"),
    server("sg", "sg.gw.xeovo.com", "Singapore", "Singapore"),
    server("ua", "ua.gw.xeovo.com", "Ukraine", "Kyiv"),
    server("uk", "uk.gw.xeovo.com", "United Kingdom", "London"),
    server("us-lv", "us-lv.gw.xeovo.com", "United States", "Las Vegas"),
    server("us-mia", "us-mia.gw.xeovo.com", "United States", "Miami"),
    server("us-nyc", "us-nyc.gw.xeovo.com", "United States", "New York"),
];

/// Checks that codes are unique and every host is non-empty.
pub fn validate(servers: &[ServerEntry]) -> Result<(), Box<dyn std::error::Error>> {
    let mut seen = HashSet::new();
    for entry in servers {
        if entry.host.trim().is_empty() {
            return Err(format!("Server '{}' has an empty host", entry.code).into());
        }
        if !seen.insert(entry.code) {
            return Err(format!("Duplicate server code '{}'", entry.code).into());
        }
    }
    Ok(())
}

//! Status Page Module
//!
//! Scrapes the provider's public status page for per-gateway load figures.
//!
//! The page has no stable structured markup for the server list, so the
//! extractor works on the flattened text of the "VPN Servers" section: each
//! leaf text node becomes one line, location labels are recognised
//! heuristically, and the first percentage after a label is bound to it.
//! This is best effort and will need adjusting whenever the upstream page
//! layout changes.
//!
//! # Example
//!
//! ```ignore
//! use crate::status_page::parse_load_lines;
//!
//! let loads = parse_load_lines(&["Finland, Helsinki", "Operational", "72%"]);
//! assert_eq!(loads["Finland, Helsinki"], "72%");
//! ```

use crate::config::NetworkConfig;
use crate::{log_debug, log_info, log_warning};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::time::Duration;

/// Location label -> load string ("42%" or "DOWN")
pub type LoadMap = HashMap<String, String>;

/// Sentinel bound to a location the page reports as offline
pub const LOAD_DOWN: &str = "DOWN";

const MODULE: &str = "status_page";

/// Lines that never name a location, compared case-insensitively
const IGNORED_LINES: &[&str] = &[
    "VPN Servers",
    "Operational",
    "Degraded Performance",
    "Partial Outage",
    "Major Outage",
    "Maintenance",
    "Under Maintenance",
    "Location",
    "Status",
    "Load",
    "Uptime",
    LOAD_DOWN,
];

const STATUS_DOTS: &[&str] = &["●", "•", "⬤", "🟢", "🟡", "🟠", "🔴"];

static HEADING_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<h([1-6])\b[^>]*>").unwrap());
static VPN_SERVERS_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)VPN\s+Servers").unwrap());
static NON_TEXT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<!--.*?-->|<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
        .unwrap()
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap());
static REGION_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]{2,3}[- ]?\d+$").unwrap());
static BARE_PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,3}%$").unwrap());
static PERCENT_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\D)(\d{1,3}%)").unwrap());

/// Downloads the raw HTML of the status page.
///
/// # Errors
///
/// Returns an error on connection failure, timeout, a non-2xx status or an
/// undecodable body.
pub fn fetch_status_page(network: &NetworkConfig) -> Result<String, Box<dyn std::error::Error>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(network.status_timeout_seconds))
        .user_agent(network.user_agent.as_str())
        .build()?;

    let response = client.get(&network.status_url).send()?;

    if !response.status().is_success() {
        return Err(format!("Server returned status code: {}", response.status()).into());
    }

    Ok(response.text()?)
}

/// Fetches the status page and extracts the load of every listed gateway.
///
/// Never fails: any network error, bad status or missing "VPN Servers"
/// section is logged and yields an empty map, which renders as "N/A".
pub fn fetch_server_load_data(network: &NetworkConfig) -> LoadMap {
    log_info!(MODULE, "Fetching server load from {}", network.status_url);

    let html = match fetch_status_page(network) {
        Ok(html) => html,
        Err(e) => {
            log_warning!(MODULE, "Could not fetch status page: {}", e);
            return LoadMap::new();
        }
    };

    let Some(lines) = extract_vpn_section(&html) else {
        log_warning!(MODULE, "No 'VPN Servers' section found on status page");
        return LoadMap::new();
    };

    log_debug!(MODULE, "VPN Servers section has {} text lines", lines.len());
    let loads = parse_load_lines(&lines);
    log_info!(MODULE, "Parsed load for {} locations", loads.len());
    loads
}

/// Returns the text lines between the "VPN Servers" heading and the next
/// heading of the same or a higher level, or `None` if the page has no such
/// heading.
pub fn extract_vpn_section(html: &str) -> Option<Vec<String>> {
    // ASCII lowercasing keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();

    for caps in HEADING_OPEN.captures_iter(html) {
        let open = caps.get(0)?;
        let close_tag = format!("</h{}", &caps[1]);
        let Some(close_rel) = lower[open.end()..].find(&close_tag) else {
            continue;
        };
        let close = open.end() + close_rel;

        let title = flatten_text(&html[open.end()..close]).join(" ");
        if !VPN_SERVERS_TITLE.is_match(&title) {
            continue;
        }

        let start = lower[close..]
            .find('>')
            .map_or(html.len(), |gt| close + gt + 1);

        // Subheadings nest inside the section; only a sibling or a higher
        // heading ends it.
        let level = &caps[1];
        let end = HEADING_OPEN
            .captures_iter(&html[start..])
            .find(|next| &next[1] <= level)
            .and_then(|next| next.get(0))
            .map_or(html.len(), |next| start + next.start());

        return Some(flatten_text(&html[start..end]));
    }

    None
}

/// Flattens an HTML fragment into trimmed, non-empty text lines, one per
/// text node, in document order.
pub fn flatten_text(fragment: &str) -> Vec<String> {
    let visible = NON_TEXT_BLOCK.replace_all(fragment, "");
    let text = TAG.replace_all(&visible, "\n");

    text.lines()
        .map(|line| decode_entities(line).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match body {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// Whether a section line names a gateway location, e.g. "Finland, Helsinki".
pub fn is_location_label(line: &str) -> bool {
    if IGNORED_LINES.iter().any(|ignored| ignored.eq_ignore_ascii_case(line)) {
        return false;
    }
    if STATUS_DOTS.iter().any(|dot| line.contains(dot)) {
        return false;
    }
    if REGION_CODE.is_match(line) || BARE_PERCENT.is_match(line) {
        return false;
    }
    line.contains(',') || line == "Singapore"
}

/// Load value carried by a line, if any: its first percentage token, or the
/// `DOWN` sentinel.
fn load_token(line: &str) -> Option<String> {
    if line.eq_ignore_ascii_case(LOAD_DOWN) {
        return Some(LOAD_DOWN.to_string());
    }
    PERCENT_TOKEN
        .captures(line)
        .map(|caps| caps[1].to_string())
}

/// Binds each location label to the first load token that follows it.
///
/// Lines between a label and its load (status words and the like) are
/// skipped. A label followed by another label before any load is dropped,
/// so a load is only ever bound to the nearest preceding label.
pub fn parse_load_lines<S: AsRef<str>>(lines: &[S]) -> LoadMap {
    let mut loads = LoadMap::new();
    let mut i = 0;

    while i < lines.len() {
        let label = lines[i].as_ref();
        if !is_location_label(label) {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        let mut bound = false;
        while j < lines.len() {
            let line = lines[j].as_ref();
            if is_location_label(line) {
                break;
            }
            if let Some(load) = load_token(line) {
                loads.entry(label.to_string()).or_insert(load);
                bound = true;
                break;
            }
            j += 1;
        }

        if !bound {
            log_debug!(MODULE, "No load found for '{}'", label);
        }
        i = if bound { j + 1 } else { j };
    }

    loads
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_section() {
        let text = "Finland, Helsinki\nOperational\n72%\nFrance, Paris\n5%";
        let lines: Vec<&str> = text.lines().collect();
        let loads = parse_load_lines(&lines);

        let mut expected = LoadMap::new();
        expected.insert("Finland, Helsinki".to_string(), "72%".to_string());
        expected.insert("France, Paris".to_string(), "5%".to_string());
        assert_eq!(loads, expected);
    }

    #[test]
    fn test_load_binds_to_nearest_preceding_label() {
        let lines = ["Japan, Tokyo", "Operational", "Latvia, Riga", "FI1", "33%"];
        let loads = parse_load_lines(&lines);
        assert_eq!(loads.len(), 1);
        assert_eq!(loads["Latvia, Riga"], "33%");
        assert!(!loads.contains_key("Japan, Tokyo"));
    }

    #[test]
    fn test_trailing_label_without_load_is_omitted() {
        let lines = ["Norway, Sandefjord", "12%", "Poland, Warsaw", "Operational"];
        let loads = parse_load_lines(&lines);
        assert_eq!(loads.len(), 1);
        assert_eq!(loads["Norway, Sandefjord"], "12%");
    }

    #[test]
    fn test_singapore_and_down_sentinel() {
        let lines = ["Singapore", "● Operational", "41% load", "USA, Miami", "DOWN"];
        let loads = parse_load_lines(&lines);
        assert_eq!(loads["Singapore"], "41%");
        assert_eq!(loads["USA, Miami"], LOAD_DOWN);
    }

    #[test]
    fn test_location_classification() {
        assert!(is_location_label("UK, London"));
        assert!(is_location_label("Singapore"));
        assert!(!is_location_label("Japan"));
        assert!(!is_location_label("Operational"));
        assert!(!is_location_label("VPN Servers"));
        assert!(!is_location_label("● Sweden, Stockholm"));
        assert!(!is_location_label("NL2"));
        assert!(!is_location_label("us-12"));
        assert!(!is_location_label("85%"));
    }

    #[test]
    fn test_percentage_token_requires_at_most_three_digits() {
        assert_eq!(load_token("load 100%").as_deref(), Some("100%"));
        assert_eq!(load_token("1000%"), None);
        assert_eq!(load_token("Operational"), None);
    }

    #[test]
    fn test_extract_section_between_headings() {
        let html = r#"
            <html><head><style>h2 { color: red; }</style></head><body>
            <h2>Website</h2><div>Germany, Berlin</div><span>99%</span>
            <h2 class="title">VPN <b>Servers</b></h2>
            <div class="row"><span class="dot">●</span><span>Finland, Helsinki</span>
              <span>Operational</span><span>72%</span></div>
            <!-- France, Nowhere 1% -->
            <div class="row"><span>USA, Las&nbsp;Vegas</span><span>8%</span></div>
            <script>var x = "Sweden, Stockholm 3%";</script>
            <h2>Other services</h2><div>Latvia, Riga</div><span>50%</span>
            </body></html>
        "#;

        let lines = extract_vpn_section(html).expect("section present");
        assert!(lines.contains(&"Finland, Helsinki".to_string()));
        assert!(!lines.iter().any(|l| l.contains("Berlin") || l.contains("Riga")));
        assert!(!lines.iter().any(|l| l.contains("Stockholm") || l.contains("Nowhere")));

        let loads = parse_load_lines(&lines);
        assert_eq!(loads.len(), 2);
        assert_eq!(loads["Finland, Helsinki"], "72%");
        assert_eq!(loads["USA, Las Vegas"], "8%");
    }

    #[test]
    fn test_subheadings_stay_inside_section() {
        let html = r#"
            <h2>VPN Servers</h2>
            <div><h3>Europe</h3><span>Finland, Helsinki</span><span>72%</span></div>
            <div><h3>Asia</h3><span>Singapore</span><span>Operational</span><span>18%</span></div>
            <h2>Website</h2><div>France, Paris</div><span>5%</span>
        "#;

        let lines = extract_vpn_section(html).expect("section present");
        assert!(lines.contains(&"Europe".to_string()));
        assert!(!lines.iter().any(|l| l.contains("Paris")));

        let loads = parse_load_lines(&lines);
        assert_eq!(loads.len(), 2);
        assert_eq!(loads["Finland, Helsinki"], "72%");
        assert_eq!(loads["Singapore"], "18%");
    }

    #[test]
    fn test_higher_heading_ends_section() {
        let html = "<h3>VPN Servers</h3><p>Japan, Tokyo</p><p>9%</p>\
                    <h1>Footer</h1><p>Latvia, Riga</p><p>50%</p>";
        let loads = parse_load_lines(&extract_vpn_section(html).unwrap());
        assert_eq!(loads.len(), 1);
        assert_eq!(loads["Japan, Tokyo"], "9%");
    }

    #[test]
    fn test_unreachable_status_page_yields_empty_map() {
        let network = NetworkConfig {
            status_url: "http://127.0.0.1:1/".to_string(),
            status_timeout_seconds: 2,
            ..NetworkConfig::default()
        };
        assert!(fetch_status_page(&network).is_err());
        assert!(fetch_server_load_data(&network).is_empty());
    }

    #[test]
    fn test_missing_section() {
        let html = "<html><body><h2>Website</h2><p>Finland, Helsinki</p><p>5%</p></body></html>";
        assert!(extract_vpn_section(html).is_none());
    }

    #[test]
    fn test_flatten_decodes_entities() {
        let lines = flatten_text("<p>A &amp; B</p><p>&#72;&#x69;</p><p> &nbsp; </p>");
        assert_eq!(lines, vec!["A & B".to_string(), "Hi".to_string()]);
    }
}

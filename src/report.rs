//! Joins probe results with scraped load figures and renders the table.

use crate::network_tools::{Latency, ProbeResult};
use crate::servers::ServerEntry;
use crate::status_page::{LoadMap, LOAD_DOWN};
use crossterm::style::Stylize;
use serde::Serialize;

pub const LOAD_UNKNOWN: &str = "N/A";

pub const TABLE_TITLE: &str = "Xeovo VPN Server Latency and Load List:";

const HEADERS: [&str; 5] = ["Country", "City", "Host", "Latency", "Load"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub country: String,
    pub city: String,
    pub host: String,
    pub latency: Latency,
    pub load: String,
}

impl ReportRow {
    fn cells(&self) -> [String; 5] {
        [
            self.country.clone(),
            self.city.clone(),
            self.host.clone(),
            self.latency.to_string(),
            self.load.clone(),
        ]
    }
}

/// Label the status page uses for a configured (country, city) pair.
pub fn resolve_load_label(country: &str, city: &str) -> String {
    if country == "United States" {
        format!("USA, {}", city)
    } else if country == "United Kingdom" {
        format!("UK, {}", city)
    } else if city == "Singapore" {
        "Singapore".to_string()
    } else {
        format!("{}, {}", country, city)
    }
}

/// Current load for a server, or "N/A" when the page does not list it.
pub fn get_server_load(country: &str, city: &str, loads: &LoadMap) -> String {
    let label = resolve_load_label(country, city);
    match loads.get(&label) {
        Some(load) => load.strip_suffix(" load").unwrap_or(load).to_string(),
        None => LOAD_UNKNOWN.to_string(),
    }
}

/// One row per server, in table order.
///
/// `probes` is matched to `servers` by position; a server without a probe
/// result is shown as unreachable.
pub fn build_rows(servers: &[ServerEntry], probes: &[ProbeResult], loads: &LoadMap) -> Vec<ReportRow> {
    servers
        .iter()
        .enumerate()
        .map(|(idx, server)| ReportRow {
            country: server.country.to_string(),
            city: server.city.to_string(),
            host: server.host.to_string(),
            latency: probes
                .get(idx)
                .map_or(Latency::Unreachable, |probe| probe.latency),
            load: get_server_load(server.country, server.city, loads),
        })
        .collect()
}

fn color_latency(latency: &Latency, cell: String) -> String {
    match latency.as_millis() {
        None => cell.red().to_string(),
        Some(ms) if ms < 50.0 => cell.green().to_string(),
        Some(ms) if ms < 100.0 => cell.yellow().to_string(),
        Some(_) => cell.red().to_string(),
    }
}

fn color_load(load: &str, cell: String) -> String {
    if load == LOAD_DOWN {
        return cell.red().to_string();
    }
    match load.trim_end_matches('%').parse::<u32>() {
        Ok(value) if value < 30 => cell.green().to_string(),
        Ok(value) if value < 60 => cell.yellow().to_string(),
        Ok(_) => cell.red().to_string(),
        Err(_) => cell,
    }
}

fn border(widths: &[usize], left: &str, fill: &str, mid: &str, right: &str) -> String {
    let segments: Vec<String> = widths.iter().map(|w| fill.repeat(w + 2)).collect();
    format!("{}{}{}", left, segments.join(mid), right)
}

fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    format!("{}{}", text, " ".repeat(width.saturating_sub(len)))
}

/// Renders rows as a box-drawn grid.
///
/// Widths are measured on the plain text so ANSI colour codes added with
/// `color` never shift the borders.
pub fn render_table(rows: &[ReportRow], color: bool) -> String {
    let cells: Vec<[String; 5]> = rows.iter().map(ReportRow::cells).collect();

    let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(rows.len() * 2 + 3);
    lines.push(border(&widths, "╒", "═", "╤", "╕"));

    let header: Vec<String> = HEADERS
        .iter()
        .zip(&widths)
        .map(|(h, w)| pad(h, *w))
        .collect();
    lines.push(format!("│ {} │", header.join(" │ ")));
    lines.push(border(&widths, "╞", "═", "╪", "╡"));

    for (idx, (row, texts)) in rows.iter().zip(&cells).enumerate() {
        let mut padded: Vec<String> = texts.iter().zip(&widths).map(|(t, w)| pad(t, *w)).collect();
        if color {
            padded[3] = color_latency(&row.latency, padded[3].clone());
            padded[4] = color_load(&row.load, padded[4].clone());
        }
        lines.push(format!("│ {} │", padded.join(" │ ")));

        if idx + 1 < rows.len() {
            lines.push(border(&widths, "├", "─", "┼", "┤"));
        }
    }

    lines.push(border(&widths, "╘", "═", "╧", "╛"));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::servers::XEOVO_SERVERS;

    fn loads(pairs: &[(&str, &str)]) -> LoadMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_load_label() {
        assert_eq!(resolve_load_label("United States", "Las Vegas"), "USA, Las Vegas");
        assert_eq!(resolve_load_label("United Kingdom", "London"), "UK, London");
        assert_eq!(resolve_load_label("Singapore", "Singapore"), "Singapore");
        assert_eq!(resolve_load_label("Anywhere", "Singapore"), "Singapore");
        assert_eq!(resolve_load_label("Finland", "Helsinki"), "Finland, Helsinki");
    }

    #[test]
    fn test_get_server_load() {
        let map = loads(&[("USA, Las Vegas", "8%"), ("Singapore", "40% load"), ("UK, London", "DOWN")]);
        assert_eq!(get_server_load("United States", "Las Vegas", &map), "8%");
        assert_eq!(get_server_load("Singapore", "Singapore", &map), "40%");
        assert_eq!(get_server_load("United Kingdom", "London", &map), "DOWN");
    }

    #[test]
    fn test_missing_label_is_na() {
        let map = loads(&[("Finland, Helsinki", "72%")]);
        assert_eq!(get_server_load("United States", "Miami", &map), LOAD_UNKNOWN);
        assert_eq!(get_server_load("USA", "Miami", &map), LOAD_UNKNOWN);
        assert_eq!(get_server_load("Finland", "Espoo", &map), LOAD_UNKNOWN);
        assert_eq!(get_server_load("Finland", "Helsinki", &LoadMap::new()), LOAD_UNKNOWN);
    }

    #[test]
    fn test_build_rows_keeps_static_order() {
        let probes: Vec<ProbeResult> = XEOVO_SERVERS
            .iter()
            .enumerate()
            .map(|(i, s)| ProbeResult {
                host: s.host.to_string(),
                latency: Latency::Millis(200.0 - i as f64),
            })
            .collect();
        let rows = build_rows(XEOVO_SERVERS, &probes, &loads(&[("France, Paris", "5%")]));

        assert_eq!(rows.len(), XEOVO_SERVERS.len());
        for (row, server) in rows.iter().zip(XEOVO_SERVERS) {
            assert_eq!(row.country, server.country);
            assert_eq!(row.city, server.city);
        }
        let paris = rows.iter().find(|r| r.city == "Paris").unwrap();
        assert_eq!(paris.load, "5%");
    }

    #[test]
    fn test_unreachable_host_with_empty_loads() {
        let servers = &XEOVO_SERVERS[..1];
        let probes = vec![ProbeResult {
            host: servers[0].host.to_string(),
            latency: Latency::Unreachable,
        }];
        let rows = build_rows(servers, &probes, &LoadMap::new());
        assert_eq!(rows[0].latency, Latency::Unreachable);
        assert_eq!(rows[0].load, LOAD_UNKNOWN);

        let table = render_table(&rows, false);
        let data_line = table.lines().nth(3).unwrap();
        let cells: Vec<&str> = data_line
            .trim_matches('│')
            .split('│')
            .map(str::trim)
            .collect();
        assert_eq!(cells, vec!["Albania", "Tirana", "au.gw.xeovo.com", "timeout", "N/A"]);
    }

    #[test]
    fn test_rows_serialize_for_run_summary() {
        let row = ReportRow {
            country: "Japan".to_string(),
            city: "Tokyo".to_string(),
            host: "jp.gw.xeovo.com".to_string(),
            latency: Latency::Unreachable,
            load: LOAD_UNKNOWN.to_string(),
        };
        let summary = serde_json::json!({ "rows": [row] });
        assert_eq!(summary["rows"][0]["host"], "jp.gw.xeovo.com");
        assert_eq!(summary["rows"][0]["latency"], "unreachable");
        assert_eq!(summary["rows"][0]["load"], "N/A");
    }

    #[test]
    fn test_render_table_layout() {
        let rows = vec![
            ReportRow {
                country: "Finland".to_string(),
                city: "Helsinki".to_string(),
                host: "fi.gw.xeovo.com".to_string(),
                latency: Latency::Millis(12.34),
                load: "72%".to_string(),
            },
            ReportRow {
                country: "United Kingdom".to_string(),
                city: "London".to_string(),
                host: "uk.gw.xeovo.com".to_string(),
                latency: Latency::Millis(0.5),
                load: "DOWN".to_string(),
            },
        ];

        let table = render_table(&rows, false);
        let lines: Vec<&str> = table.lines().collect();
        // top, header, header rule, row, separator, row, bottom
        assert_eq!(lines.len(), 7);
        assert!(lines[1].contains("Country") && lines[1].contains("Load"));
        assert!(lines[3].contains("12.3 ms"));
        assert!(lines[5].contains("0.5 ms"));

        let width = lines[0].chars().count();
        assert!(lines.iter().all(|l| l.chars().count() == width));
    }

    #[test]
    fn test_colored_table_keeps_text() {
        let rows = vec![ReportRow {
            country: "Japan".to_string(),
            city: "Tokyo".to_string(),
            host: "jp.gw.xeovo.com".to_string(),
            latency: Latency::Millis(240.0),
            load: "15%".to_string(),
        }];
        let table = render_table(&rows, true);
        assert!(table.contains("240.0 ms"));
        assert!(table.contains("15%"));
    }
}

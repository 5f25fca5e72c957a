//! Network Tools Module
//!
//! Latency probing through the operating system's `ping` utility.
//!
//! Each probe sends a single ICMP echo with a bounded timeout and parses the
//! reply time out of the command's output. Probing never fails: anything that
//! goes wrong (no reply, timeout, missing binary, unparseable output) is
//! reported as [`Latency::Unreachable`].
//!
//! # Examples
//!
//! ```ignore
//! use crate::network_tools::{PingProber, Prober};
//! use std::time::Duration;
//!
//! let prober = PingProber::new(Duration::from_secs(3));
//! println!("fi.gw.xeovo.com: {}", prober.probe("fi.gw.xeovo.com"));
//! ```

use crate::log_debug;
use crate::servers::ServerEntry;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::io;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const MODULE: &str = "network_tools";

/// Nominal value reported for a "time<1ms" reply
pub const SUB_MILLISECOND_MS: f64 = 0.5;

/// Extra time allowed for the ping process itself to start and exit
const PROCESS_GRACE: Duration = Duration::from_secs(1);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

static SUB_MS_REPLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)time\s*<\s*1\s*ms").unwrap());
static INLINE_REPLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)time\s*=\s*(\d+(?:\.\d+)?)\s*ms").unwrap());
static WINDOWS_AVERAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)average\s*=\s*(\d+(?:\.\d+)?)\s*ms").unwrap());
static RTT_SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:rtt|round-trip) min/avg/max(?:/(?:mdev|stddev))? = [\d.]+/(\d+(?:\.\d+)?)/").unwrap()
});

/// Round-trip time of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Latency {
    Millis(f64),
    Unreachable,
}

impl Latency {
    pub fn as_millis(&self) -> Option<f64> {
        match self {
            Latency::Millis(ms) => Some(*ms),
            Latency::Unreachable => None,
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, Latency::Millis(_))
    }
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Latency::Millis(ms) => write!(f, "{:.1} ms", ms),
            Latency::Unreachable => write!(f, "timeout"),
        }
    }
}

/// Latency measured for one host
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub host: String,
    pub latency: Latency,
}

/// Anything that can measure the latency to a host.
pub trait Prober: Sync {
    fn probe(&self, host: &str) -> Latency;
}

/// Platform flavour of the `ping` command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingPlatform {
    Windows,
    MacOs,
    Unix,
}

impl PingPlatform {
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => PingPlatform::Windows,
            "macos" | "ios" | "freebsd" | "openbsd" | "netbsd" | "dragonfly" => PingPlatform::MacOs,
            _ => PingPlatform::Unix,
        }
    }

    /// Arguments for a single echo to `host`, giving up after `timeout`.
    pub fn ping_args(&self, host: &str, timeout: Duration) -> Vec<String> {
        let secs = timeout.as_secs().max(1).to_string();
        match self {
            PingPlatform::Windows => vec![
                "-n".to_string(),
                "1".to_string(),
                "-w".to_string(),
                timeout.as_millis().max(1).to_string(),
                host.to_string(),
            ],
            // BSD ping: -t is the overall timeout in seconds.
            PingPlatform::MacOs => vec![
                "-c".to_string(),
                "1".to_string(),
                "-t".to_string(),
                secs,
                host.to_string(),
            ],
            PingPlatform::Unix => vec![
                "-c".to_string(),
                "1".to_string(),
                "-W".to_string(),
                secs,
                host.to_string(),
            ],
        }
    }
}

pub const PING_PROGRAM: &str = "ping";

/// Prober backed by the system `ping` binary
pub struct PingProber {
    program: String,
    platform: PingPlatform,
    timeout: Duration,
}

impl PingProber {
    pub fn new(timeout: Duration) -> Self {
        Self::with_program(PING_PROGRAM, timeout)
    }

    /// Uses `program` in place of `ping`, with the current platform's flags.
    pub fn with_program(program: &str, timeout: Duration) -> Self {
        Self {
            program: program.to_string(),
            platform: PingPlatform::current(),
            timeout,
        }
    }
}

impl Prober for PingProber {
    fn probe(&self, host: &str) -> Latency {
        ping(&self.program, host, self.platform, self.timeout)
    }
}

/// Sends one echo request to `host` and returns its round-trip time.
///
/// Returns [`Latency::Unreachable`] if the command cannot be run, exceeds
/// `timeout`, or produces no parseable reply time.
pub fn ping(program: &str, host: &str, platform: PingPlatform, timeout: Duration) -> Latency {
    let output = match run_with_timeout(program, host, platform, timeout) {
        Ok(Some(output)) => output,
        Ok(None) => {
            log_debug!(MODULE, "ping {} timed out after {:?}", host, timeout);
            return Latency::Unreachable;
        }
        Err(e) => {
            log_debug!(MODULE, "ping {} could not run: {}", host, e);
            return Latency::Unreachable;
        }
    };

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    let latency = parse_ping_output(&text);
    if !output.status.success() && !latency.is_reachable() {
        log_debug!(
            MODULE,
            "ping {} exited with status {}",
            host,
            output.status.code().unwrap_or(-1)
        );
    }
    log_debug!(MODULE, "ping {} -> {}", host, latency);
    latency
}

/// Runs the ping command, killing it if it outlives `timeout` plus a grace
/// period.
///
/// `Ok(None)` means the deadline passed. Ping output for a single echo is
/// small enough to sit in the pipe buffers until the child exits.
fn run_with_timeout(
    program: &str,
    host: &str,
    platform: PingPlatform,
    timeout: Duration,
) -> io::Result<Option<Output>> {
    let mut child = Command::new(program)
        .args(platform.ping_args(host, timeout))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let deadline = Instant::now() + timeout + PROCESS_GRACE;
    loop {
        if child.try_wait()?.is_some() {
            return child.wait_with_output().map(Some);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Extracts the round-trip time from `ping` output.
///
/// Looks first for an inline reply time (`time=12.3 ms`, `time<1ms`), then
/// falls back to the summary line (`Average = 12ms`, `rtt min/avg/max/mdev`).
/// A zero reading is treated as invalid; `time<1ms` maps to 0.5 ms.
pub fn parse_ping_output(output: &str) -> Latency {
    let inline = INLINE_REPLY.captures(output).map(|caps| caps.get(1));
    let sub_ms = SUB_MS_REPLY.find(output);

    // Whichever inline token appears first is the reply we report.
    match (inline.flatten(), sub_ms) {
        (Some(m), Some(sub)) if sub.start() < m.start() => {
            return Latency::Millis(SUB_MILLISECOND_MS)
        }
        (Some(m), _) => return millis_or_unreachable(m.as_str()),
        (None, Some(_)) => return Latency::Millis(SUB_MILLISECOND_MS),
        (None, None) => {}
    }

    let summary = WINDOWS_AVERAGE
        .captures(output)
        .or_else(|| RTT_SUMMARY.captures(output));
    match summary.and_then(|caps| caps.get(1)) {
        Some(m) => millis_or_unreachable(m.as_str()),
        None => Latency::Unreachable,
    }
}

fn millis_or_unreachable(value: &str) -> Latency {
    match value.parse::<f64>() {
        Ok(ms) if ms.is_finite() && ms > 0.0 => Latency::Millis(ms),
        _ => Latency::Unreachable,
    }
}

/// Probes every server, returning results in table order.
///
/// With `parallel` set, each host is probed on its own scoped thread.
pub fn probe_all(prober: &dyn Prober, servers: &[ServerEntry], parallel: bool) -> Vec<ProbeResult> {
    if !parallel {
        return servers
            .iter()
            .map(|server| ProbeResult {
                host: server.host.to_string(),
                latency: prober.probe(server.host),
            })
            .collect();
    }

    let mut latencies = vec![Latency::Unreachable; servers.len()];
    thread::scope(|scope| {
        for (slot, server) in latencies.iter_mut().zip(servers) {
            scope.spawn(move || {
                *slot = prober.probe(server.host);
            });
        }
    });

    servers
        .iter()
        .zip(latencies)
        .map(|(server, latency)| ProbeResult {
            host: server.host.to_string(),
            latency,
        })
        .collect()
}

//! Parsers for `/proc` filesystem records.
//!
//! These are pure functions over string input. Fixed-order records are split
//! into tokens and mapped to named fields through a [`Schema`]; the typed
//! per-kind records are built from the resulting [`RawRecord`].

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use super::schema::{CPU_STAT, FieldKind, NET_DEV, PROC_STAT, Schema};

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

// ============ Raw records ============

/// Value of one record field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Coerces a token: optional `-`, digits, at most one decimal point.
    /// Anything else, and integers too wide for 64 bits, stays text.
    pub fn coerce(token: &str) -> Self {
        let digits = token.strip_prefix('-').unwrap_or(token);
        let numeric = digits.bytes().any(|b| b.is_ascii_digit())
            && digits.bytes().all(|b| b.is_ascii_digit() || b == b'.')
            && digits.bytes().filter(|&b| b == b'.').count() <= 1;

        let parsed = if !numeric {
            None
        } else if digits.contains('.') {
            token.parse().ok().map(FieldValue::Float)
        } else if digits.len() != token.len() {
            token.parse().ok().map(FieldValue::Signed)
        } else {
            token.parse().ok().map(FieldValue::Unsigned)
        };
        parsed.unwrap_or_else(|| FieldValue::Text(token.to_string()))
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            FieldValue::Unsigned(v) => Some(v),
            FieldValue::Signed(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            FieldValue::Unsigned(v) => i64::try_from(v).ok(),
            FieldValue::Signed(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldValue::Unsigned(v) => Some(v as f64),
            FieldValue::Signed(v) => Some(v as f64),
            FieldValue::Float(v) => Some(v),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Field name to value mapping for one record line.
///
/// Fields whose position did not exist in the source line are absent.
/// The typed accessors return zero/empty for absent or non-numeric fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRecord {
    fields: BTreeMap<&'static str, FieldValue>,
    #[serde(skip)]
    token_count: usize,
}

impl RawRecord {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn u64(&self, name: &str) -> u64 {
        self.get(name).and_then(FieldValue::as_u64).unwrap_or(0)
    }

    pub fn i64(&self, name: &str) -> i64 {
        self.get(name).and_then(FieldValue::as_i64).unwrap_or(0)
    }

    pub fn text(&self, name: &str) -> &str {
        self.get(name).and_then(FieldValue::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of tokens the source line split into.
    pub fn token_count(&self) -> usize {
        self.token_count
    }

    /// True when the source line had a different field count than `schema`.
    pub fn is_schema_drift(&self, schema: &Schema) -> bool {
        self.token_count != schema.field_count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }
}

/// Maps tokens to schema fields by position.
fn extract(schema: &Schema, tokens: &[&str]) -> RawRecord {
    let fields = schema
        .fields()
        .iter()
        .zip(tokens)
        .map(|(field, token)| {
            let value = match field.kind {
                FieldKind::Numeric => FieldValue::coerce(token),
                FieldKind::Text => FieldValue::Text((*token).to_string()),
            };
            (field.name, value)
        })
        .collect();

    RawRecord {
        fields,
        token_count: tokens.len(),
    }
}

// ============ /proc/[pid]/stat ============

/// Parses one `/proc/[pid]/stat` line against [`PROC_STAT`].
///
/// The executable name is the span between the first `(` and the last `)`;
/// it may contain spaces and parentheses and is returned without the
/// enclosing brackets. A field count other than 52 is logged and parsed
/// best-effort. Missing brackets are an error.
pub fn parse_stat_line(line: &str) -> Result<RawRecord, ParseError> {
    let line = line.trim();

    let open = line
        .find('(')
        .ok_or_else(|| ParseError::new("missing '(' in stat"))?;
    let close = line
        .rfind(')')
        .ok_or_else(|| ParseError::new("missing ')' in stat"))?;
    if close < open {
        return Err(ParseError::new("invalid parentheses in stat"));
    }

    let mut tokens: Vec<&str> = line[..open].split_whitespace().collect();
    tokens.push(&line[open + 1..close]);
    tokens.extend(line[close + 1..].split_whitespace());

    let expected = PROC_STAT.field_count();
    if tokens.len() != expected {
        warn!(
            pid = tokens.first().copied().unwrap_or("?"),
            found = tokens.len(),
            expected,
            "unexpected stat field count, kernel format may be unsupported"
        );
    }

    Ok(extract(&PROC_STAT, &tokens))
}

/// Scheduler state of a process, from the stat `state` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Running,
    Sleeping,
    DiskSleep,
    Zombie,
    Stopped,
    TracingStop,
    Dead,
    WakeKill,
    Waking,
    Parked,
    Idle,
    Unknown,
}

impl ProcessState {
    /// Maps a one-character state code. Unrecognized codes map to `Unknown`.
    ///
    /// `W` was "paging" before Linux 2.6 and "waking" on 2.6.33 to 3.13; it is
    /// reported as waking.
    pub fn from_code(code: char) -> Self {
        match code {
            'R' => ProcessState::Running,
            'S' => ProcessState::Sleeping,
            'D' => ProcessState::DiskSleep,
            'Z' => ProcessState::Zombie,
            'T' => ProcessState::Stopped,
            't' => ProcessState::TracingStop,
            'X' | 'x' => ProcessState::Dead,
            'K' => ProcessState::WakeKill,
            'W' => ProcessState::Waking,
            'P' => ProcessState::Parked,
            'I' => ProcessState::Idle,
            _ => ProcessState::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProcessState::Running => "running",
            ProcessState::Sleeping => "sleeping",
            ProcessState::DiskSleep => "disk sleep",
            ProcessState::Zombie => "zombie",
            ProcessState::Stopped => "stopped",
            ProcessState::TracingStop => "tracing stop",
            ProcessState::Dead => "dead",
            ProcessState::WakeKill => "wakekill",
            ProcessState::Waking => "waking",
            ProcessState::Parked => "parked",
            ProcessState::Idle => "idle",
            ProcessState::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Parses `/proc/[pid]/cmdline`: NUL-separated arguments rejoined with spaces.
pub fn parse_cmdline(content: &str) -> String {
    content
        .split('\0')
        .filter(|arg| !arg.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============ /proc/net/dev ============

/// Parses one interface line of `/proc/net/dev` against [`NET_DEV`].
///
/// Format:
/// ```text
/// Inter-|   Receive                                                |  Transmit
///  face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
///    lo: 1234567     1234    0    0    0     0          0         0  1234567     1234    0    0    0     0       0          0
/// ```
///
/// Returns `None` for header lines, lines without a usable name and lines
/// with fewer than 16 counters.
pub fn parse_net_dev_line(line: &str) -> Option<RawRecord> {
    if line.contains('|') {
        return None;
    }

    let (name, counters) = line.split_once(':')?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }

    let mut tokens = vec![name];
    tokens.extend(counters.split_whitespace());
    if tokens.len() < NET_DEV.field_count() {
        return None;
    }

    Some(extract(&NET_DEV, &tokens))
}

// ============ /proc/stat ============

/// Parses one `cpu`/`cpuN` line of `/proc/stat` against [`CPU_STAT`].
///
/// Returns `None` for other lines. Kernels older than 2.6.11 report fewer
/// columns; missing trailing counters read as zero.
pub fn parse_cpu_line(line: &str) -> Option<RawRecord> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let suffix = tokens.first()?.strip_prefix("cpu")?;
    if !suffix.is_empty() && suffix.parse::<u32>().is_err() {
        return None;
    }
    // label plus user, nice, system, idle at minimum
    if tokens.len() < 5 {
        return None;
    }
    Some(extract(&CPU_STAT, &tokens))
}

// ============ /proc/uptime ============

/// Parsed data from `/proc/uptime`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Uptime {
    /// Seconds since boot (monotonic, unaffected by wall-clock changes).
    pub seconds: f64,
    /// Idle seconds summed over all CPUs.
    pub idle_seconds: f64,
}

/// Parses `/proc/uptime` content: `"<uptime> <idle>"`.
pub fn parse_uptime(content: &str) -> Result<Uptime, ParseError> {
    let mut parts = content.split_whitespace();

    let seconds = parts
        .next()
        .ok_or_else(|| ParseError::new("empty uptime"))?
        .parse()
        .map_err(|_| ParseError::new("invalid uptime seconds"))?;
    let idle_seconds = parts
        .next()
        .ok_or_else(|| ParseError::new("missing idle time in uptime"))?
        .parse()
        .map_err(|_| ParseError::new("invalid uptime idle seconds"))?;

    Ok(Uptime {
        seconds,
        idle_seconds,
    })
}

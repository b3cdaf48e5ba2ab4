//! Parsers for `/proc` filesystem files.
//!
//! These are pure functions that parse the content of various `/proc` files
//! into structured data. They are designed to be easily testable with string inputs.

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

/// CPU time fields of `/proc/[pid]/stat`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcStat {
    /// User-mode time in clock ticks.
    pub utime: u64,
    /// Kernel-mode time in clock ticks.
    pub stime: u64,
}

/// Parses the CPU time fields out of `/proc/[pid]/stat` content.
///
/// The format is tricky because the comm field can contain spaces and parentheses.
/// Format: pid (comm) state ppid pgrp session tty_nr ...
pub fn parse_proc_stat(content: &str) -> Result<ProcStat, ParseError> {
    let content = content.trim();

    // comm is everything between the first '(' and the last ')'
    let open_paren = content
        .find('(')
        .ok_or_else(|| ParseError::new("missing '(' in stat"))?;
    let close_paren = content
        .rfind(')')
        .ok_or_else(|| ParseError::new("missing ')' in stat"))?;

    if close_paren <= open_paren {
        return Err(ParseError::new("invalid parentheses in stat"));
    }

    content[..open_paren]
        .trim()
        .parse::<u32>()
        .map_err(|_| ParseError::new("invalid pid"))?;

    // Indexes below are relative to the field after ')' (the state field).
    let fields: Vec<&str> = content[close_paren + 1..].split_whitespace().collect();

    if fields.len() < 13 {
        return Err(ParseError::new(format!(
            "not enough fields in stat: expected 13+, got {}",
            fields.len()
        )));
    }

    let parse_field = |idx: usize, name: &str| -> Result<u64, ParseError> {
        fields
            .get(idx)
            .ok_or_else(|| ParseError::new(format!("missing field {}", name)))?
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {}", name)))
    };

    Ok(ProcStat {
        utime: parse_field(11, "utime")?,
        stime: parse_field(12, "stime")?,
    })
}

/// Parsed data from `/proc/[pid]/io`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcIo {
    pub rchar: u64,
    pub wchar: u64,
    /// Read syscalls.
    pub syscr: u64,
    /// Write syscalls.
    pub syscw: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// Parses `/proc/[pid]/io` content.
///
/// Both syscall counters must be present; the byte counters are optional.
pub fn parse_proc_io(content: &str) -> Result<ProcIo, ParseError> {
    let mut io = ProcIo::default();
    let mut seen_syscr = false;
    let mut seen_syscw = false;

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value: u64 = value
            .trim()
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {} in io", key)))?;
        match key {
            "rchar" => io.rchar = value,
            "wchar" => io.wchar = value,
            "syscr" => {
                io.syscr = value;
                seen_syscr = true;
            }
            "syscw" => {
                io.syscw = value;
                seen_syscw = true;
            }
            "read_bytes" => io.read_bytes = value,
            "write_bytes" => io.write_bytes = value,
            _ => {}
        }
    }

    if !(seen_syscr && seen_syscw) {
        return Err(ParseError::new("missing syscr/syscw in io"));
    }
    Ok(io)
}

/// Parses `/proc/uptime` into milliseconds since boot.
///
/// Format: "<uptime seconds> <idle seconds>", both with two decimals.
pub fn parse_uptime_millis(content: &str) -> Result<u64, ParseError> {
    let first = content
        .split_whitespace()
        .next()
        .ok_or_else(|| ParseError::new("empty uptime"))?;
    let seconds: f64 = first
        .parse()
        .map_err(|_| ParseError::new(format!("invalid uptime '{}'", first)))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ParseError::new(format!("invalid uptime '{}'", first)));
    }
    Ok((seconds * 1000.0).round() as u64)
}

/// Kind of a memory mapping in `/proc/[pid]/smaps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    /// The brk heap (`[heap]`).
    Heap,
    /// Anonymous mappings without a path (mmap'd allocator arenas).
    Anonymous,
    /// Files, stacks, vdso and everything else.
    Other,
}

impl MappingKind {
    fn from_pathname(pathname: &str) -> Self {
        match pathname {
            "[heap]" => MappingKind::Heap,
            "" => MappingKind::Anonymous,
            _ => MappingKind::Other,
        }
    }
}

/// Summed smaps fields of one mapping kind, in kB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmapsTotals {
    pub size: u64,
    pub rss: u64,
    pub pss: u64,
    pub private_dirty: u64,
    pub shared_dirty: u64,
}

/// `/proc/[pid]/smaps` aggregated per mapping kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Smaps {
    pub heap: SmapsTotals,
    pub anonymous: SmapsTotals,
    pub other: SmapsTotals,
}

impl Smaps {
    fn totals_mut(&mut self, kind: MappingKind) -> &mut SmapsTotals {
        match kind {
            MappingKind::Heap => &mut self.heap,
            MappingKind::Anonymous => &mut self.anonymous,
            MappingKind::Other => &mut self.other,
        }
    }
}

/// Returns the pathname of a mapping header line, or `None` if the line is
/// a field line.
///
/// Header format: "start-end perms offset dev inode [pathname]"
fn mapping_header(line: &str) -> Option<String> {
    let mut tokens = line.split_whitespace();
    let range = tokens.next()?;
    let (start, end) = range.split_once('-')?;
    if u64::from_str_radix(start, 16).is_err() || u64::from_str_radix(end, 16).is_err() {
        return None;
    }
    // perms, offset, dev, inode
    let rest: Vec<&str> = tokens.skip(4).collect();
    Some(rest.join(" "))
}

/// Parses `/proc/[pid]/smaps` content, summing Size, Rss, Pss,
/// Private_Dirty and Shared_Dirty per mapping kind.
pub fn parse_smaps(content: &str) -> Result<Smaps, ParseError> {
    let mut smaps = Smaps::default();
    let mut current: Option<MappingKind> = None;

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(pathname) = mapping_header(line) {
            current = Some(MappingKind::from_pathname(&pathname));
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if !matches!(key, "Size" | "Rss" | "Pss" | "Private_Dirty" | "Shared_Dirty") {
            continue;
        }
        let kind = current
            .ok_or_else(|| ParseError::new(format!("{} before first mapping in smaps", key)))?;
        let value: u64 = value
            .split_whitespace()
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ParseError::new(format!("invalid {} in smaps", key)))?;

        let totals = smaps.totals_mut(kind);
        match key {
            "Size" => totals.size += value,
            "Rss" => totals.rss += value,
            "Pss" => totals.pss += value,
            "Private_Dirty" => totals.private_dirty += value,
            _ => totals.shared_dirty += value,
        }
    }

    if current.is_none() {
        return Err(ParseError::new("no mappings in smaps"));
    }
    Ok(smaps)
}

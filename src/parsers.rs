//! Parsers for the fixed-format text the collectors read.
//!
//! These are deliberately forgiving about whitespace and strict about
//! structure: a line that does not fit the format is skipped, never guessed at.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BRACKET_ID_RE: Regex = Regex::new(r"\s*\[([0-9a-fA-F]{4})\]\s*$").unwrap();
}

pub type Fields = BTreeMap<String, String>;

/// `key: value` lines (ethtool -i style). First occurrence of a key wins.
pub fn parse_colon_fields(text: &str) -> Fields {
    let mut fields = Fields::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once(':') {
            fields
                .entry(key.trim().to_string())
                .or_insert_with(|| value.trim().to_string());
        }
    }
    fields
}

/// Blank-line separated blocks of `Key:\tvalue` lines (lspci -vmm style).
pub fn parse_key_value_blocks(text: &str) -> Vec<Fields> {
    let mut blocks = Vec::new();
    let mut current = Fields::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            current
                .entry(key.trim().to_string())
                .or_insert_with(|| value.trim().to_string());
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// PowerShell `Format-List` output: `Name : Value` blocks separated by blank
/// lines. Long values wrap onto indented continuation lines.
pub fn parse_property_blocks(text: &str) -> Vec<Fields> {
    let mut blocks = Vec::new();
    let mut current = Fields::new();
    let mut last_key: Option<String> = None;
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            last_key = None;
            continue;
        }
        if line.starts_with(char::is_whitespace) {
            if let Some(value) = last_key.as_ref().and_then(|k| current.get_mut(k)) {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            current.insert(key.clone(), value.trim().to_string());
            last_key = Some(key);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Trailing `[8086]` style numeric id of an lspci -nn value.
pub fn bracket_id(value: &str) -> Option<u16> {
    BRACKET_ID_RE
        .captures(value)
        .and_then(|caps| u16::from_str_radix(&caps[1], 16).ok())
}

/// The value with its trailing `[xxxx]` id removed.
pub fn strip_bracket_id(value: &str) -> String {
    BRACKET_ID_RE.replace(value, "").trim().to_string()
}

/// One `name -> target` line of `ls -l /sys/class/net`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysNetEntry {
    pub name: String,
    pub target: String,
}

pub fn parse_sys_class_net(listing: &str) -> Vec<SysNetEntry> {
    listing
        .lines()
        .filter_map(|line| {
            let (left, target) = line.split_once(" -> ")?;
            let name = left.split_whitespace().last()?;
            Some(SysNetEntry {
                name: name.to_string(),
                target: target.trim().to_string(),
            })
        })
        .collect()
}

/// Column-aligned table with a header row. Column boundaries are taken from
/// the header positions of `columns`; the last column runs to end of line.
/// Positions count characters, so non-ASCII text (`®`, `™`) in a cell does
/// not shift the cells after it.
pub fn parse_fixed_width_table(text: &str, columns: &[&str]) -> Vec<Fields> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = match lines.next() {
        Some(h) => h,
        None => return Vec::new(),
    };

    let mut offsets: Vec<(usize, &str)> = columns
        .iter()
        .filter_map(|col| {
            header
                .find(col)
                .map(|pos| (header[..pos].chars().count(), *col))
        })
        .collect();
    offsets.sort_by_key(|(pos, _)| *pos);

    lines
        .filter(|line| !line.trim_start().starts_with('-'))
        .map(|line| {
            let chars: Vec<char> = line.chars().collect();
            let mut row = Fields::new();
            for (i, &(start, col)) in offsets.iter().enumerate() {
                let end = offsets.get(i + 1).map(|(p, _)| *p).unwrap_or(chars.len());
                let end = end.min(chars.len());
                let cell: String = chars[start.min(end)..end].iter().collect();
                row.insert(col.to_string(), cell.trim().to_string());
            }
            row
        })
        .collect()
}

/// Counters from `ip -s link show dev <name>`: each `RX:`/`TX:` header line is
/// followed by a line of values. Keys come out as `rx_bytes`, `tx_dropped`,
/// `rx_errors_crc` and so on.
pub fn parse_ip_link_stats(text: &str) -> BTreeMap<String, u64> {
    let mut stats = BTreeMap::new();
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    for pair in lines.windows(2) {
        let (header, values) = (pair[0], pair[1]);
        if !(header.starts_with("RX") || header.starts_with("TX")) {
            continue;
        }
        let Some((prefix, keys)) = header.split_once(':') else {
            continue;
        };
        let prefix = prefix.trim().to_lowercase().replace(' ', "_");
        for (key, value) in keys.split_whitespace().zip(values.split_whitespace()) {
            if let Ok(v) = value.parse::<u64>() {
                stats.insert(format!("{}_{}", prefix, key.to_lowercase()), v);
            }
        }
    }
    stats
}

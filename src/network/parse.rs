//! Parsing of `ip link show` listings
//!
//! Example listing:
//!
//! ```text
//! 30: tap0: <NO-CARRIER,BROADCAST,MULTICAST,UP> mtu 1500 qdisc pfifo_fast state DOWN mode DEFAULT group default qlen 1000
//!     link/ether 12:85:f7:b0:07:54 brd ff:ff:ff:ff:ff:ff
//! ```
//!
//! Only the index header, the name and the ethernet address are read.
//! Unknown attributes are ignored, and interfaces without a `link/ether`
//! line are skipped.

use crate::network::{Bridge, MacAddr, Tap};
use regex::Regex;
use std::sync::LazyLock;

/// Start of an interface block: `<index>: <name>:`
static RECORD_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+: [\w\d]+:").expect("valid header regex"));

static TAP_RECORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)(\d+): (\w+):.*?link/ether ((?:[0-9a-f]{2}:){5}[0-9a-f]{2})")
        .expect("valid tap regex")
});

// Bridge names may carry hyphens
static BRIDGE_RECORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)(\d+): ([\w-]+):.*?link/ether ((?:[0-9a-f]{2}:){5}[0-9a-f]{2})")
        .expect("valid bridge regex")
});

/// Group listing lines into one string per interface
///
/// Lines within a record are joined with `\n`. A run of blank lines with
/// no content is not a record.
pub fn split_records(text: &str) -> Vec<String> {
    let mut records = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if RECORD_HEADER.is_match(line) {
            flush(&mut records, &mut current);
        }
        current.push(line);
    }
    flush(&mut records, &mut current);

    records
}

fn flush(records: &mut Vec<String>, current: &mut Vec<&str>) {
    if current.iter().any(|l| !l.trim().is_empty()) {
        records.push(current.join("\n"));
    }
    current.clear();
}

/// Extract (name, mac) from one match of an interface regex
fn extract(re: &Regex, text: &str) -> Option<(String, MacAddr)> {
    let caps = re.captures(text)?;
    let name = caps.get(2)?.as_str().to_string();
    let mac = caps.get(3)?.as_str().to_ascii_lowercase().parse().ok()?;
    Some((name, mac))
}

/// Parse the output of `ip link show type tun`
pub fn parse_taps(text: &str) -> Vec<Tap> {
    split_records(text)
        .iter()
        .filter_map(|record| extract(&TAP_RECORD, record))
        .map(|(name, mac)| Tap::discovered(name, mac))
        .collect()
}

/// Parse the output of `ip link show type bridge`
pub fn parse_bridges(text: &str) -> Vec<Bridge> {
    BRIDGE_RECORD
        .captures_iter(text)
        .filter_map(|caps| {
            let name = caps.get(2)?.as_str();
            let mac = caps.get(3)?.as_str().to_ascii_lowercase().parse().ok()?;
            Some(Bridge::discovered(name, mac))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAP_LISTING: &str = include_str!("../../testdata/tap-listing.txt");
    const TAP_WITH_TAILSCALE: &str = include_str!("../../testdata/tap-with-tailscale.txt");
    const BRIDGE_LISTING: &str = include_str!("../../testdata/bridge-listing.txt");

    #[test]
    fn test_split_empty() {
        assert!(split_records("").is_empty());
    }

    #[test]
    fn test_split_blank_input() {
        assert!(split_records("\n").is_empty());
        assert!(split_records("   \n\n").is_empty());
        assert!(parse_taps("   \n\n").is_empty());
    }

    #[test]
    fn test_split_drops_leading_blank_lines() {
        let records = split_records("\n  \n2: tap0: <UP>\n    link/ether 12:34:56:67:89:ab\n");
        assert_eq!(records.len(), 1);
        assert!(records[0].starts_with("2: tap0:"));
    }

    #[test]
    fn test_split_counts_headers() {
        let records = split_records(TAP_LISTING);
        let headers = TAP_LISTING
            .lines()
            .filter(|l| RECORD_HEADER.is_match(l))
            .count();
        assert_eq!(headers, 4);
        assert_eq!(records.len(), headers);
    }

    #[test]
    fn test_split_preserves_lines() {
        let records = split_records(TAP_LISTING);
        let rejoined: Vec<&str> = records.iter().flat_map(|r| r.lines()).collect();
        let original: Vec<&str> = TAP_LISTING.lines().collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn test_split_trailing_lines_belong_to_last_record() {
        let text = "1: lo: <LOOPBACK>\n    link/loopback 00:00:00:00:00:00\n2: tap0: <UP>\n    link/ether 12:34:56:67:89:ab\n    extra line";
        let records = split_records(text);
        assert_eq!(records.len(), 2);
        assert!(records[1].ends_with("extra line"));
    }

    #[test]
    fn test_parse_taps() {
        let taps = parse_taps(TAP_LISTING);
        assert_eq!(taps.len(), 4);
        let names: Vec<&str> = taps.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["tap0", "tap1", "tap2", "tap3"]);
        assert!(taps.iter().all(|t| !t.is_owned() && t.bridge().is_none()));
    }

    #[test]
    fn test_parse_taps_skips_interfaces_without_ether() {
        let taps = parse_taps(TAP_WITH_TAILSCALE);
        assert_eq!(taps.len(), 2);
        assert_eq!(taps[0].name(), "tap0");
        assert_eq!(taps[1].name(), "tap1");
        assert_eq!(taps[0].mac().to_string(), "12:34:56:67:89:ab");
        assert_eq!(taps[1].mac().to_string(), "12:34:56:67:89:ad");
    }

    #[test]
    fn test_parse_taps_lowercases_mac() {
        let text = "7: tap9: <BROADCAST> mtu 1500\n    link/ether 12:AB:CD:EF:00:11 brd ff:ff:ff:ff:ff:ff\n";
        let taps = parse_taps(text);
        assert_eq!(taps.len(), 1);
        assert_eq!(taps[0].mac().to_string(), "12:ab:cd:ef:00:11");
    }

    #[test]
    fn test_parse_taps_truncated_record() {
        let text = "7: tap9: <BROADCAST> mtu 1500\n";
        assert!(parse_taps(text).is_empty());
    }

    #[test]
    fn test_parse_taps_empty() {
        assert!(parse_taps("").is_empty());
    }

    #[test]
    fn test_parse_bridges() {
        let bridges = parse_bridges(BRIDGE_LISTING);
        let names: Vec<&str> = bridges.iter().map(|b| b.name()).collect();
        assert_eq!(names, vec!["br0", "br1"]);
        assert_eq!(
            bridges[0].mac().map(|m| m.to_string()).as_deref(),
            Some("5a:3e:26:c4:81:02")
        );
        assert!(bridges.iter().all(|b| b.members().is_empty()));
    }

    #[test]
    fn test_parse_bridges_with_hyphen() {
        let text = "12: br-lan: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc noqueue state UP\n    link/ether 02:42:ac:11:00:01 brd ff:ff:ff:ff:ff:ff\n";
        let bridges = parse_bridges(text);
        assert_eq!(bridges.len(), 1);
        assert_eq!(bridges[0].name(), "br-lan");
    }

    #[test]
    fn test_parse_bridges_empty() {
        assert!(parse_bridges("").is_empty());
    }
}

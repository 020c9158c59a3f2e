//! Program listing parsing.
//!
//! Program lines come from `get /tunerN/streaminfo` or the `scan` command:
//!
//! ```text
//! 3: 7.1 KABC-HD
//! 4: 7.2 KABC-SD (encrypted)
//! PROGRAM 5: 7.3 LAFF
//! tsid=0x0A1B
//! ```
//!
//! The listing keeps every entry in source order; capping for export is
//! left to the aggregator.

use log::trace;

use crate::types::{ProgramEntry, ProgramListing, RawStatusResponse};

const PROGRAM_PREFIX: &str = "program";

/// `7`, `7.1`, `107.12`
fn is_virtual_channel(word: &str) -> bool {
    let mut parts = word.splitn(2, '.');
    let major = parts.next().unwrap_or("");
    let minor_ok = parts
        .next()
        .map(|minor| !minor.is_empty() && minor.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(true);
    !major.is_empty() && major.bytes().all(|b| b.is_ascii_digit()) && minor_ok
}

/// Strip a leading `PROGRAM` keyword.
fn strip_program_prefix(line: &str) -> &str {
    if line.len() > PROGRAM_PREFIX.len()
        && line.is_char_boundary(PROGRAM_PREFIX.len())
        && line[..PROGRAM_PREFIX.len()].eq_ignore_ascii_case(PROGRAM_PREFIX)
    {
        let rest = &line[PROGRAM_PREFIX.len()..];
        if rest.starts_with(char::is_whitespace) {
            return rest.trim_start();
        }
    }
    line
}

/// Parse one line into `(program number, virtual channel, name)`.
fn parse_line(line: &str) -> Option<(u16, Option<String>, String)> {
    let line = strip_program_prefix(line.trim());
    let (number, rest) = line.split_once(':')?;
    let number = number.trim();
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let Ok(program_number) = number.parse::<u16>() else {
        trace!("program: malformed program number {:?}", number);
        return None;
    };

    let rest = rest.trim();
    if rest.is_empty() {
        trace!("program: entry {} has no name", program_number);
        return None;
    }

    match rest.split_once(char::is_whitespace) {
        Some((first, name)) if is_virtual_channel(first) && !name.trim().is_empty() => {
            let vch = (first != "0").then(|| first.to_string());
            Some((program_number, vch, name.trim().to_string()))
        }
        _ => Some((program_number, None, rest.to_string())),
    }
}

impl ProgramListing {
    /// Extract every program entry from a response, in source order.
    ///
    /// Lines that are not program entries are ignored and malformed entries
    /// are skipped.
    pub fn parse(response: &RawStatusResponse) -> ProgramListing {
        let mut entries = Vec::new();

        for line in response.as_str().lines() {
            let Some((program_number, virtual_channel, name)) = parse_line(line) else {
                continue;
            };
            entries.push(ProgramEntry {
                slot: entries.len() + 1,
                program_number,
                virtual_channel,
                name,
            });
        }

        ProgramListing { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ProgramListing {
        ProgramListing::parse(&RawStatusResponse::from(text))
    }

    #[test]
    fn test_parse_streaminfo() {
        let listing = parse("3: 7.1 KABC-HD\n4: 7.2 KABC-SD\ntsid=0x0A1B\n");
        assert_eq!(listing.len(), 2);
        assert_eq!(
            listing.entries[0],
            ProgramEntry {
                slot: 1,
                program_number: 3,
                virtual_channel: Some("7.1".to_string()),
                name: "KABC-HD".to_string(),
            }
        );
        assert_eq!(listing.entries[1].slot, 2);
        assert_eq!(listing.entries[1].name, "KABC-SD");
    }

    #[test]
    fn test_parse_scan_program_lines() {
        let listing = parse(
            "SCANNING: 57000000 (us-bcast:2)\nLOCK: 8vsb (ss=80 snq=90 seq=100)\nTSID: 0x0A1B\nPROGRAM 3: 7.1 KABC-HD\nPROGRAM 4: 7.2 KABC-SD\n",
        );
        let names: Vec<_> = listing.iter().map(|e| e.label()).collect();
        assert_eq!(names, vec!["7.1 KABC-HD", "7.2 KABC-SD"]);
    }

    #[test]
    fn test_names_without_virtual_channel() {
        let listing = parse("1: KABC-HD\n2: KABC-SD\n3: 0 (control)\n");
        assert_eq!(listing.len(), 3);
        assert_eq!(listing.entries[0].virtual_channel, None);
        assert_eq!(listing.entries[0].name, "KABC-HD");
        assert_eq!(listing.entries[2].virtual_channel, None);
        assert_eq!(listing.entries[2].name, "(control)");
    }

    #[test]
    fn test_malformed_entries_skipped() {
        let listing = parse("x: broken\n1:\n99999: too big\n5: 9.1 GOOD\n: empty\n");
        assert_eq!(listing.len(), 1);
        assert_eq!(listing.entries[0].slot, 1);
        assert_eq!(listing.entries[0].program_number, 5);
    }

    #[test]
    fn test_empty_listing() {
        assert!(parse("none\n").is_empty());
        assert!(parse("").is_empty());
        assert!(parse("tsid=0x0001").is_empty());
    }

    #[test]
    fn test_listing_is_not_capped() {
        let text: String = (1..=25).map(|i| format!("{}: 30.{} SUB{}\n", i, i, i)).collect();
        let listing = parse(&text);
        assert_eq!(listing.len(), 25);
        assert_eq!(listing.entries[24].slot, 25);
        assert_eq!(listing.entries[24].name, "SUB25");
    }

    #[test]
    fn test_parse_is_idempotent() {
        let raw = RawStatusResponse::from("3: 7.1 KABC-HD\n4: 7.2 KABC-SD\n");
        assert_eq!(ProgramListing::parse(&raw), ProgramListing::parse(&raw));
    }

    #[test]
    fn test_is_virtual_channel() {
        assert!(is_virtual_channel("7"));
        assert!(is_virtual_channel("7.1"));
        assert!(is_virtual_channel("107.12"));
        assert!(!is_virtual_channel("7."));
        assert!(!is_virtual_channel("KABC"));
        assert!(!is_virtual_channel(""));
    }
}

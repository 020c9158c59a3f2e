//! Tuner status parsing.
//!
//! Understands the key/value text printed by `hdhomerun_config` for
//! `get /tunerN/status`, `get /tunerN/streaminfo` and the `scan` command:
//!
//! ```text
//! ch=auto:57000000 lock=8vsb ss=83 snq=91 seq=100 bps=19394080 pps=0
//! tsid=0x0A1B
//! LOCK: 8vsb (ss=83 snq=91 seq=100)
//! TSID: 0x0A1B
//! ```
//!
//! | Key    | Field                 |
//! |--------|-----------------------|
//! | `lock` | lock / modulation     |
//! | `ss`   | signal strength       |
//! | `snq`  | signal to noise       |
//! | `seq`  | symbol error quality  |
//! | `tsid` | transport stream id   |
//!
//! Other keys are ignored. The first well-formed value of a key wins.

use log::trace;

use crate::types::{LockStatus, RawStatusResponse, TunerStatus};

/// Lock value reported when the tuner has no signal.
const LOCK_NONE: &str = "none";

/// A `key`/`value` pair pulled out of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Token<'a> {
    key: &'a str,
    value: &'a str,
}

/// Split a response into key/value tokens.
///
/// Accepts `key=value`, `key:value` and `KEY: value` forms. Commas separate
/// tokens; parentheses around a token are dropped, but a value that opens
/// with `(` keeps it so a parenthesized lock can be told apart.
fn tokenize(text: &str) -> Vec<Token<'_>> {
    let words: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .collect();

    let mut tokens = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        let word = words[i].trim_start_matches('(').trim_end_matches(')');
        i += 1;

        if let Some((key, value)) = word.split_once('=') {
            tokens.push(Token { key, value });
        } else if let Some(key) = word.strip_suffix(':') {
            if key.is_empty() {
                continue;
            }
            // `LOCK: 8vsb` - value is the next word, unless that word is a
            // token of its own
            match words.get(i) {
                Some(next) if !next.contains('=') => {
                    tokens.push(Token {
                        key,
                        value: next.trim_end_matches(')'),
                    });
                    i += 1;
                }
                _ => tokens.push(Token { key, value: "" }),
            }
        } else if let Some((key, value)) = word.split_once(':') {
            tokens.push(Token { key, value });
        }
    }

    tokens
}

fn parse_decimal(key: &str, value: &str) -> Option<f64> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            trace!("status: malformed {} value {:?}", key, value);
            None
        }
    }
}

/// Parse a transport stream id, `0x` hex or decimal.
pub fn parse_tsid(value: &str) -> Option<u16> {
    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => value.parse::<u16>().ok(),
    };
    if parsed.is_none() {
        trace!("status: malformed tsid value {:?}", value);
    }
    parsed
}

impl TunerStatus {
    /// Parse a raw response for the tuner tuned to `frequency_hz`.
    ///
    /// Malformed values become `None`. Without a lock every reading is
    /// dropped, since quality numbers are meaningless unlocked.
    pub fn parse(response: &RawStatusResponse, frequency_hz: u32) -> TunerStatus {
        let mut status = TunerStatus::unlocked(frequency_hz);
        let mut lock_seen = false;

        for token in tokenize(response.as_str()) {
            match token.key.to_ascii_lowercase().as_str() {
                "lock" if !lock_seen => {
                    lock_seen = true;
                    let value = token.value.trim();
                    // `(ntsc)` names a signal the tuner cannot demodulate
                    if !value.is_empty()
                        && !value.starts_with('(')
                        && !value.eq_ignore_ascii_case(LOCK_NONE)
                    {
                        status.lock = LockStatus::Locked;
                        status.modulation = Some(value.to_ascii_lowercase());
                    }
                }
                "ss" if status.signal_strength.is_none() => {
                    status.signal_strength = parse_decimal("ss", token.value);
                }
                "snq" if status.snr_quality.is_none() => {
                    status.snr_quality = parse_decimal("snq", token.value);
                }
                "seq" if status.symbol_quality.is_none() => {
                    status.symbol_quality = parse_decimal("seq", token.value);
                }
                "tsid" if status.transport_stream_id.is_none() => {
                    status.transport_stream_id = parse_tsid(token.value);
                }
                _ => {}
            }
        }

        if status.is_locked() {
            status
        } else {
            TunerStatus::unlocked(frequency_hz)
        }
    }

    /// Returns true if the response reports a lock.
    pub fn reports_lock(response: &RawStatusResponse) -> bool {
        TunerStatus::parse(response, 0).is_locked()
    }
}

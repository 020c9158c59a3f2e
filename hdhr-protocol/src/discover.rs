//! Parsing of `hdhomerun_config discover` output.
//!
//! ```text
//! hdhomerun device 1040ABCD found at 192.168.1.18
//! hdhomerun device 10A0F00D found at 192.168.1.24
//! ```

/// A device line from discovery, before its tuners are counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub id: String,
    pub address: Option<String>,
}

fn is_device_id(word: &str) -> bool {
    word.len() == 8 && word.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Extract every device from discovery output, in the order listed.
///
/// Lines that do not name a device (`no devices found`, warnings) are
/// ignored; duplicate IDs are reported once.
pub fn parse_discover_output(output: &str) -> Vec<DiscoveredDevice> {
    let mut devices: Vec<DiscoveredDevice> = Vec::new();

    for line in output.lines() {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some(pos) = words.iter().position(|w| w.eq_ignore_ascii_case("device")) else {
            continue;
        };
        let Some(id) = words.get(pos + 1).filter(|w| is_device_id(w)) else {
            continue;
        };
        let id = id.to_ascii_uppercase();
        if devices.iter().any(|d| d.id == id) {
            continue;
        }

        let address = words
            .iter()
            .position(|w| *w == "at")
            .and_then(|i| words.get(i + 1))
            .map(|a| a.to_string());

        devices.push(DiscoveredDevice { id, address });
    }

    devices
}

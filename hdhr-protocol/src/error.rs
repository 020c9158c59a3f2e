//! Error types for talking to tuner devices.

use thiserror::Error;

/// Errors reported by a tuner command.
///
/// Every variant is recoverable at the scope of a single frequency; the
/// scanner records the frequency as unlocked and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TunerError {
    /// Another client holds the tuner.
    #[error("Tuner is busy (locked by {owner})")]
    ResourceBusy { owner: String },

    /// The device did not answer before the command timed out.
    #[error("No response from device {0}")]
    NoResponse(String),

    /// The device rejected the command.
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// The command line tool could not be run at all.
    #[error("Tuner interface unavailable: {0}")]
    Unavailable(String),
}

impl TunerError {
    /// Returns true if the error means another client is using the tuner.
    pub fn is_busy(&self) -> bool {
        matches!(self, TunerError::ResourceBusy { .. })
    }
}

/// Prefix of error lines printed by `hdhomerun_config`.
const ERROR_PREFIX: &str = "ERROR:";

/// Message printed when a tuner is held by another client.
const LOCKED_BY: &str = "resource locked by";

/// Check a device reply for an `ERROR:` line.
///
/// Returns `Ok(())` when the reply carries no error line.
pub fn check_reply(device_id: &str, reply: &str) -> Result<(), TunerError> {
    for line in reply.lines() {
        let line = line.trim();
        let Some(message) = line.strip_prefix(ERROR_PREFIX) else {
            continue;
        };
        let message = message.trim();
        let lower = message.to_ascii_lowercase();

        if let Some(pos) = lower.find(LOCKED_BY) {
            let owner = message[pos + LOCKED_BY.len()..].trim();
            return Err(TunerError::ResourceBusy {
                owner: if owner.is_empty() {
                    "unknown".to_string()
                } else {
                    owner.to_string()
                },
            });
        }
        if lower.contains("unable to connect") || lower.contains("communication error") {
            return Err(TunerError::NoResponse(device_id.to_string()));
        }
        return Err(TunerError::CommandFailed(message.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_reply_ok() {
        assert!(check_reply("1040ABCD", "ch=auto:57000000 lock=8vsb ss=80").is_ok());
        assert!(check_reply("1040ABCD", "").is_ok());
    }

    #[test]
    fn test_check_reply_busy() {
        let err = check_reply("1040ABCD", "ERROR: resource locked by 192.168.1.50\n").unwrap_err();
        assert_eq!(
            err,
            TunerError::ResourceBusy {
                owner: "192.168.1.50".to_string()
            }
        );
        assert!(err.is_busy());
    }

    #[test]
    fn test_check_reply_no_response() {
        let err = check_reply("1040ABCD", "ERROR: unable to connect to device").unwrap_err();
        assert_eq!(err, TunerError::NoResponse("1040ABCD".to_string()));
        assert!(!err.is_busy());
    }

    #[test]
    fn test_check_reply_other_error() {
        let err = check_reply("1040ABCD", "ERROR: unknown getset variable").unwrap_err();
        assert_eq!(
            err,
            TunerError::CommandFailed("unknown getset variable".to_string())
        );
    }
}

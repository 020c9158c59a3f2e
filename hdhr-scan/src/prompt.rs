//! Interactive device and tuner selection.

use std::io::{self, BufRead, Write};

use thiserror::Error;

use hdhr_protocol::{DeviceDescriptor, TunerSelection};

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Invalid choice: {0:?}")]
    InvalidChoice(String),

    #[error("No selection entered")]
    NoInput,

    #[error("Prompt I/O failed: {0}")]
    Io(#[from] io::Error),
}

fn read_choice<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
) -> Result<String, PromptError> {
    write!(output, "{}", question)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(PromptError::NoInput);
    }
    Ok(line.trim().to_string())
}

/// Ask which device to scan. Choices are numbered from 1.
pub fn prompt_device<'a, R: BufRead, W: Write>(
    devices: &'a [DeviceDescriptor],
    input: &mut R,
    output: &mut W,
) -> Result<&'a DeviceDescriptor, PromptError> {
    writeln!(output, "Select an HDHomeRun device:")?;
    for (i, device) in devices.iter().enumerate() {
        writeln!(output, "{}) {}", i + 1, device)?;
    }

    let choice = read_choice(input, output, "Enter the device number: ")?;
    choice
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| devices.get(i))
        .ok_or(PromptError::InvalidChoice(choice))
}

/// Ask for a tuner index, or the auto mode that scans every tuner.
///
/// Auto mode is offered as the number after the last tuner.
pub fn prompt_tuner<R: BufRead, W: Write>(
    device: &DeviceDescriptor,
    input: &mut R,
    output: &mut W,
) -> Result<TunerSelection, PromptError> {
    let auto = device.tuner_count;

    writeln!(output, "Select a tuner or Auto mode:")?;
    for index in 0..device.tuner_count {
        writeln!(output, "{}) Tuner {}", index, index)?;
    }
    writeln!(output, "{}) Auto mode (scan all tuners)", auto)?;

    let choice = read_choice(input, output, "Enter the mode number: ")?;
    match choice.parse::<u8>() {
        Ok(n) if n == auto => Ok(TunerSelection::All),
        Ok(n) if n < device.tuner_count => Ok(TunerSelection::Index(n)),
        _ => Err(PromptError::InvalidChoice(choice)),
    }
}

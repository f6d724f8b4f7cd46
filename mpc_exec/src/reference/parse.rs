//! Waypoint file parsing
//!
//! One waypoint per line, three whitespace separated numbers `x y theta`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::warn;

use super::ReferenceError;
use crate::vehicle::State;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How lines that don't hold exactly three numbers are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Fields are read left to right until the first one that isn't a
    /// finite number. Missing fields are zero and extra fields are ignored.
    Tolerant,

    /// Any line which isn't exactly three numbers is rejected.
    Strict
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ParseMode {
    fn default() -> Self {
        ParseMode::Tolerant
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Parse waypoints from the text of a reference file.
///
/// Blank lines are skipped in both modes. At least two well formed lines must
/// be present, zero-filled lines in tolerant mode don't count towards this.
pub fn parse_waypoints(text: &str, mode: ParseMode) -> Result<Vec<State>, ReferenceError> {
    let mut waypoints = Vec::new();
    let mut num_well_formed = 0usize;

    for (i, line) in text.lines().enumerate() {
        let line_num = i + 1;

        if line.trim().is_empty() {
            continue;
        }

        let (values, well_formed) = parse_line(line);

        if !well_formed {
            match mode {
                ParseMode::Strict => return Err(ReferenceError::MalformedLine {
                    line: line_num,
                    content: line.to_string()
                }),
                ParseMode::Tolerant => warn!(
                    "Reference line {} is malformed, missing fields read as 0: {:?}",
                    line_num, line
                )
            }
        }
        else {
            num_well_formed += 1;
        }

        waypoints.push(State::from(values));
    }

    if num_well_formed < 2 {
        return Err(ReferenceError::TooFewWaypoints(num_well_formed))
    }

    Ok(waypoints)
}

/// Read up to three numeric fields from a line.
///
/// Returns the (zero-filled) values and whether the line was exactly three
/// numbers.
fn parse_line(line: &str) -> ([f64; 3], bool) {
    let mut values = [0f64; 3];
    let mut num_read = 0;
    let mut tokens = line.split_whitespace();

    for v in values.iter_mut() {
        match tokens.next().map(|t| t.parse::<f64>()) {
            Some(Ok(n)) if n.is_finite() => {
                *v = n;
                num_read += 1;
            },
            _ => break
        }
    }

    let well_formed = num_read == 3 && tokens.next().is_none();

    (values, well_formed)
}

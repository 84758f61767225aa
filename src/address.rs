//! Resolving `<crash address> <load address>` pairs.

use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::tool::ExternalResolver;

// e.g. 0x0000000103385dfc 0x102ed4000
static PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"0x(\w+)\s+0x(\w+)").expect("pair pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPair {
    /// Crash address exactly as written, leading zeros included.
    pub crash: String,
    pub load: String,
    pub crash_value: u64,
    pub load_value: u64,
}

impl AddressPair {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let captures = PAIR
            .captures(input)
            .ok_or_else(|| Error::PatternMismatch(input.to_owned()))?;
        let (crash_digits, load_digits) = match (captures.get(1), captures.get(2)) {
            (Some(crash), Some(load)) => (crash.as_str(), load.as_str()),
            _ => return Err(Error::PatternMismatch(input.to_owned())),
        };

        Ok(Self {
            crash: format!("0x{}", crash_digits),
            load: format!("0x{}", load_digits),
            crash_value: parse_hex(crash_digits)?,
            load_value: parse_hex(load_digits)?,
        })
    }
}

impl fmt::Display for AddressPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.crash, self.load)
    }
}

fn parse_hex(digits: &str) -> Result<u64> {
    u64::from_str_radix(digits, 16).map_err(|_| Error::ConversionFailure(format!("0x{}", digits)))
}

/// `atos -l <load> <crash>` for one pair.
pub fn resolve_pair<R: ExternalResolver + ?Sized>(
    resolver: &R,
    binary: &Path,
    pair: &AddressPair,
) -> Result<String> {
    let output = resolver.resolve(binary, Some(&pair.load), &[&pair.crash])?;
    Ok(output.trim().to_owned())
}

pub fn resolve_line<R: ExternalResolver + ?Sized>(
    resolver: &R,
    binary: &Path,
    line: &str,
) -> Result<String> {
    let pair = AddressPair::parse(line)?;
    resolve_pair(resolver, binary, &pair)
}

/// Resolves every non-blank line independently. A line that fails is echoed back
/// with a failure marker; the others are unaffected.
pub fn resolve_lines<R: ExternalResolver + ?Sized>(
    resolver: &R,
    binary: &Path,
    text: &str,
) -> Result<String> {
    if text.trim().is_empty() {
        return Err(Error::MissingInput("address lines"));
    }

    let resolved: Vec<String> = text
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                return line.to_owned();
            }
            match resolve_line(resolver, binary, line) {
                Ok(symbol) => symbol,
                Err(err) => {
                    tracing::warn!(line, error = %err, "address pair not resolved");
                    format!("{}: symbolication failed ({})", line, err)
                }
            }
        })
        .collect();
    Ok(resolved.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(Option<String>, Vec<String>)>>,
    }

    impl ExternalResolver for Recorder {
        fn resolve(&self, _: &Path, load: Option<&str>, addresses: &[&str]) -> Result<String> {
            self.calls.lock().unwrap().push((
                load.map(str::to_owned),
                addresses.iter().map(|a| a.to_string()).collect(),
            ));
            Ok("main (in Demo) (main.m:14)\n".to_owned())
        }
    }

    #[test]
    fn parses_padded_crash_address() {
        let pair = AddressPair::parse("0x0000000103385dfc 0x102ed4000").unwrap();
        assert_eq!(pair.crash, "0x0000000103385dfc");
        assert_eq!(pair.crash_value, 0x103385dfc);
        assert_eq!(pair.load, "0x102ed4000");
        assert_eq!(pair.load_value, 0x102ed4000);
    }

    #[test]
    fn single_address_is_pattern_mismatch() {
        let result = AddressPair::parse("0x0000000103385dfc");
        assert!(matches!(result, Err(Error::PatternMismatch(_))));
    }

    #[test]
    fn non_hex_is_conversion_failure() {
        let result = AddressPair::parse("0xZZZZ 0x1");
        assert!(matches!(result, Err(Error::ConversionFailure(ref s)) if s == "0xZZZZ"));
    }

    #[test]
    fn overflowing_address_is_conversion_failure() {
        let result = AddressPair::parse("0x1ffffffffffffffff 0x1");
        assert!(matches!(result, Err(Error::ConversionFailure(_))));
    }

    #[test]
    fn pair_is_passed_with_load_address() {
        let recorder = Recorder::default();
        let out = resolve_line(&recorder, Path::new("/tmp/Demo"), "  0x00000001000 0x1000 \n").unwrap();
        assert_eq!(out, "main (in Demo) (main.m:14)");
        let calls = recorder.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![(Some("0x1000".to_owned()), vec!["0x00000001000".to_owned()])]
        );
    }

    #[test]
    fn multi_line_marks_failures_only() {
        let recorder = Recorder::default();
        let out = resolve_lines(
            &recorder,
            Path::new("/tmp/Demo"),
            "0x10 0x1\nbogus\n\n0x20 0x1",
        )
        .unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "main (in Demo) (main.m:14)");
        assert!(lines[1].starts_with("bogus: symbolication failed"));
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "main (in Demo) (main.m:14)");
    }

    #[test]
    fn blank_input_is_missing() {
        let recorder = Recorder::default();
        let result = resolve_lines(&recorder, Path::new("/tmp/Demo"), " \n ");
        assert!(matches!(result, Err(Error::MissingInput(_))));
    }
}

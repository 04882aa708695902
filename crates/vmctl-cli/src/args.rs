//! Positional argument helpers shared by both dispatchers.

use vmctl_core::{Error, Result};

/// Fetch a required positional argument, failing with the command's usage
/// line when it is missing.
pub fn require<'a>(args: &'a [String], index: usize, usage: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| Error::Usage(usage.to_string()))
}

/// Fetch an optional positional argument.
#[must_use]
pub fn optional(args: &[String], index: usize) -> Option<&str> {
    args.get(index).map(String::as_str)
}

/// Parse a numeric argument, naming it in the failure.
pub fn parse_u64(value: &str, what: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("Invalid {what}: {value}")))
}

/// Parse a boolean flag the lenient way: anything but `true` (case
/// insensitive) is false.
#[must_use]
pub fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

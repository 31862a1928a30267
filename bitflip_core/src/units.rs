//! Human-readable quantities for log output.

const SI_PREFIXES: [&str; 7] = ["", "k", "M", "G", "T", "P", "E"];
const IEC_UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Formats `value` with a decimal SI prefix, e.g. `si(1500.0, "bits")` is `"1.5 kbits"`.
pub fn si(value: f64, unit: &str) -> String {
    let mut scaled = value;
    let mut prefix = 0;
    while scaled.abs() >= 1000.0 && prefix < SI_PREFIXES.len() - 1 {
        scaled /= 1000.0;
        prefix += 1;
    }
    format!("{} {}{}", trim_decimals(scaled), SI_PREFIXES[prefix], unit)
}

/// Formats a byte count with binary prefixes, e.g. `ibytes(84_000)` is `"82 KiB"`.
///
/// Sizes under ten units keep one decimal.
pub fn ibytes(size: u64) -> String {
    if size < 1024 {
        return format!("{} B", size);
    }
    let mut scaled = size as f64;
    let mut unit = 0;
    while scaled >= 1024.0 && unit < IEC_UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }
    if scaled < 10.0 {
        format!("{:.1} {}", scaled, IEC_UNITS[unit])
    } else {
        format!("{:.0} {}", scaled, IEC_UNITS[unit])
    }
}

/// Two decimals at most, without trailing zeros.
fn trim_decimals(value: f64) -> String {
    let formatted = format!("{:.2}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

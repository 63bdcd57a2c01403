// stepscope - interactive step debugger
// Copyright (C) 2024 The stepscope contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Value rendering helpers
//!
//! The wire format counts literal lines, so every rendering that lands
//! inside a counted payload must be newline-free. Collapsing happens
//! here, at the engine edge, so providers stay free to report natural
//! multi-line text.

/// Units accepted by the `amu` command. Anything else coerces to BYTES.
pub const KNOWN_UNITS: [&str; 3] = ["KB", "MB", "BYTES"];

/// Collapse a rendering to a single wire-safe line by deleting raw
/// newlines (and carriage returns) outright.
pub fn collapse(text: &str) -> String {
    text.replace(['\r', '\n'], "")
}

/// Format a byte count in the requested unit.
pub fn format_bytes(value: u64, unit: &str) -> String {
    let upper = unit.to_uppercase();

    // Forcing BYTES for unknown units
    let base_unit = if KNOWN_UNITS.contains(&upper.as_str()) { upper.as_str() } else { "BYTES" };

    let converted = match base_unit {
        "KB" => value as f64 / 1_000.0,
        "MB" => value as f64 / 1_000_000.0,
        _ => value as f64,
    };

    format!("{converted:.2} {base_unit}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_removes_newlines() {
        assert_eq!(collapse("Vec [\n    1,\n    2,\n]"), "Vec [    1,    2,]");
        assert_eq!(collapse("a\r\nb"), "ab");
        assert_eq!(collapse("plain"), "plain");
    }

    #[test]
    fn test_format_bytes_units() {
        assert_eq!(format_bytes(2_500, "KB"), "2.50 KB");
        assert_eq!(format_bytes(2_500_000, "mb"), "2.50 MB");
        assert_eq!(format_bytes(512, "BYTES"), "512.00 BYTES");
    }

    #[test]
    fn test_unknown_unit_coerces_to_bytes() {
        assert_eq!(format_bytes(100, "GB"), "100.00 BYTES");
        assert_eq!(format_bytes(100, ""), "100.00 BYTES");
    }
}

//! Small utility helpers used across modules.

use chrono::NaiveDate;

/// Strict `YYYY-MM-DD` parse. Anything else (including unpadded months or
/// trailing garbage) is rejected so a malformed configured start date falls
/// back to the built-in default instead of shifting the calendar.
pub fn parse_start_date(raw: &str) -> Option<NaiveDate> {
  let s = raw.trim();
  if s.len() != 10 {
    return None;
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Normalize a player display name the way the registry does: trim, strip an
/// email domain if present, upper-case. Empty input stays empty.
pub fn normalize_player_name(raw: &str) -> String {
  let value = raw.trim();
  if value.is_empty() {
    return String::new();
  }
  let value = value.split('@').next().unwrap_or(value);
  value.trim().to_uppercase()
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max { s.to_string() } else { format!("{}… ({} bytes total)", &s[..max], s.len()) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn start_date_parsing_is_strict() {
    assert_eq!(parse_start_date("2026-02-14"), NaiveDate::from_ymd_opt(2026, 2, 14));
    assert_eq!(parse_start_date(" 2026-02-14 "), NaiveDate::from_ymd_opt(2026, 2, 14));
    assert!(parse_start_date("2026-2-14").is_none());
    assert!(parse_start_date("2026-02-14T00:00").is_none());
    assert!(parse_start_date("not a date").is_none());
    assert!(parse_start_date("").is_none());
  }

  #[test]
  fn player_names_are_normalized() {
    assert_eq!(normalize_player_name("k_0001@korrika.app"), "K_0001");
    assert_eq!(normalize_player_name("  miren "), "MIREN");
    assert_eq!(normalize_player_name(""), "");
  }
}

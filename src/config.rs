//! Loading app configuration (challenge parameters + optional local question
//! bank and editorial entries) from TOML.
//!
//! See `AppConfig` for the expected schema. Everything has a default so an
//! empty or missing file still yields a working service.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{error, info};

use crate::util::parse_start_date;

/// Hard-coded fallback when no start date is configured anywhere, or the
/// configured value is malformed.
pub const DEFAULT_START_DATE: &str = "2026-02-14";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub challenge: ChallengeConfig,
  #[serde(default)]
  pub categories: Vec<CategoryCfg>,
  #[serde(default)]
  pub editorial: Vec<EditorialCfg>,
}

/// Challenge parameters. `start_date` here is only the fallback; the store
/// may carry an admin-updated value that takes precedence at runtime.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ChallengeConfig {
  pub start_date: String,
  pub days_count: usize,
  pub questions_per_day: usize,
  pub seconds_per_question: i64,
  pub admin_users: Vec<String>,
}

impl Default for ChallengeConfig {
  fn default() -> Self {
    Self {
      start_date: DEFAULT_START_DATE.into(),
      days_count: 11,
      questions_per_day: 12,
      seconds_per_question: 20,
      admin_users: vec!["admin".into(), "k_admin".into()],
    }
  }
}

/// Question bank entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct CategoryCfg {
  pub name: String,
  #[serde(default)] pub questions: Vec<QuestionCfg>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QuestionCfg {
  pub id: u32,
  pub prompt: String,
  #[serde(default)] pub options: BTreeMap<String, String>,
  pub correct_key: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EditorialCfg {
  pub day: u32,
  pub title: String,
  #[serde(default)] pub body: String,
}

/// The built-in default as a date. The literal is valid; `unwrap_or_default`
/// only keeps this total.
pub fn default_start_date() -> NaiveDate {
  parse_start_date(DEFAULT_START_DATE).unwrap_or_default()
}

impl ChallengeConfig {
  /// The configured fallback start date; a malformed value silently becomes
  /// the built-in default (logged, never user-facing).
  pub fn fallback_start_date(&self) -> NaiveDate {
    match parse_start_date(&self.start_date) {
      Some(d) => d,
      None => {
        error!(target: "korrika_backend", raw = %self.start_date, "Configured start_date is not YYYY-MM-DD; using built-in default");
        default_start_date()
      }
    }
  }

  pub fn is_admin(&self, user_name: &str) -> bool {
    let name = user_name.trim().to_lowercase();
    self.admin_users.iter().any(|admin| admin.trim().to_lowercase() == name)
  }
}

/// Attempt to load `AppConfig` from KORRIKA_CONFIG_PATH. On any parsing/IO
/// error, returns None and the caller falls back to defaults + seeds.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("KORRIKA_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "korrika_backend", %path, "Loaded app config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "korrika_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "korrika_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn malformed_start_date_falls_back_to_the_default() {
    let cfg = ChallengeConfig { start_date: "14/02/2026".into(), ..Default::default() };
    assert_eq!(cfg.fallback_start_date(), parse_start_date(DEFAULT_START_DATE).unwrap());

    let cfg = ChallengeConfig { start_date: "2026-03-01".into(), ..Default::default() };
    assert_eq!(cfg.fallback_start_date(), parse_start_date("2026-03-01").unwrap());
  }

  #[test]
  fn admin_check_is_case_insensitive() {
    let cfg = ChallengeConfig::default();
    assert!(cfg.is_admin("Admin"));
    assert!(cfg.is_admin(" K_ADMIN "));
    assert!(!cfg.is_admin("miren"));
  }

  #[test]
  fn toml_bank_round_trips() {
    let cfg: AppConfig = toml::from_str(
      r#"
        [challenge]
        start_date = "2026-02-14"
        days_count = 11

        [[categories]]
        name = "Historia"

        [[categories.questions]]
        id = 1
        prompt = "Zein urtetan antolatu zen lehen Korrika?"
        correct_key = "a"
        [categories.questions.options]
        a = "1980"
        b = "1984"

        [[editorial]]
        day = 1
        title = "Lehen eguna"
        body = "Ongi etorri!"
      "#,
    )
    .unwrap();

    assert_eq!(cfg.challenge.days_count, 11);
    assert_eq!(cfg.categories.len(), 1);
    assert_eq!(cfg.categories[0].questions[0].options.len(), 2);
    assert_eq!(cfg.editorial[0].day, 1);
  }
}

//! Thin client for the remote relational store (PostgREST-style REST API).
//!
//! The store is optional: without STORE_BASE_URL the backend runs entirely
//! on local/seed data. Reads are tolerant of loosely-typed rows (nullable
//! columns, junk values, renamed columns in legacy tables); malformed rows
//! are dropped or defaulted, never fatal. All failures surface as
//! `Result<_, String>` and the calling layer degrades to "no data".
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::domain::{AnswerRecord, Category, EditorialEntry, GameResultRow, ProgressRecord, Question};
use crate::ranking::ScoreRow;
use crate::util::{normalize_player_name, parse_start_date, trunc_for_log};

const TABLE_RESULTS: &str = "game_results";
const TABLE_CONTENT: &str = "korrika_edukiak";
const TABLE_CONFIG: &str = "korrika_app_config";
const START_DATE_CONFIG_KEY: &str = "challenge_start_date";

/// Candidate registry tables probed in order; legacy deployments used
/// different table/column names for the same data.
const PLAYER_SOURCES: &[(&str, &str)] = &[
  ("korrika_jokalariak", "name,username,email,code"),
  ("players", "name,username,email"),
  ("profiles", "username,full_name,email"),
  ("usuarios", "nombre,username,email,codigo"),
];

/// Why a result write was refused.
#[derive(Debug)]
pub enum StoreWriteError {
  /// The store already holds a row for this user + day: "already played".
  Conflict,
  Other(String),
}

#[derive(Clone)]
pub struct RemoteStore {
  client: reqwest::Client,
  base_url: String,
  api_key: Option<String>,
}

impl RemoteStore {
  /// Construct the client if STORE_BASE_URL is set; otherwise return None
  /// and the backend stays on local data.
  pub fn from_env() -> Option<Self> {
    let base_url = std::env::var("STORE_BASE_URL").ok()?;
    let base_url = base_url.trim_end_matches('/').to_string();
    let api_key = std::env::var("STORE_API_KEY").ok();

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(15))
      .build()
      .ok()?;

    Some(Self { client, base_url, api_key })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  fn request(&self, method: Method, table_and_query: &str) -> reqwest::RequestBuilder {
    let url = format!("{}/rest/v1/{}", self.base_url, table_and_query);
    let mut req = self
      .client
      .request(method, url)
      .header(USER_AGENT, "korrika-backend/0.1")
      .header(CONTENT_TYPE, "application/json");
    if let Some(key) = &self.api_key {
      req = req.header("apikey", key).header(AUTHORIZATION, format!("Bearer {}", key));
    }
    req
  }

  async fn get_rows<T: DeserializeOwned>(&self, table_and_query: &str) -> Result<Vec<T>, String> {
    let res = self
      .request(Method::GET, table_and_query)
      .send()
      .await
      .map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      return Err(format!("store HTTP {}: {}", status, trunc_for_log(&body, 300)));
    }
    res.json::<Vec<T>>().await.map_err(|e| e.to_string())
  }

  /// Fetch the raw question bank: chapters with nested questions/options.
  /// The caller sanitizes before anything else sees the data.
  #[instrument(level = "info", skip(self))]
  pub async fn fetch_question_bank(&self) -> Result<Vec<Category>, String> {
    #[derive(Deserialize)]
    struct OptionRow {
      #[serde(default)] opt_key: Option<String>,
      #[serde(default)] opt_text: Option<String>,
    }
    #[derive(Deserialize)]
    struct QuestionRow {
      #[serde(default)] id: Option<Value>,
      #[serde(default)] question_text: Option<String>,
      #[serde(default)] correct_key: Option<String>,
      #[serde(default)] options: Vec<OptionRow>,
    }
    #[derive(Deserialize)]
    struct ChapterRow {
      #[serde(default)] name: Option<String>,
      #[serde(default)] questions: Vec<QuestionRow>,
    }

    let rows: Vec<ChapterRow> = self
      .get_rows("chapters?select=id,name,questions:questions(id,question_text,correct_key,options:options(opt_key,opt_text))")
      .await?;

    let bank = rows
      .into_iter()
      .filter_map(|chapter| {
        let name = non_empty(chapter.name)?;
        let questions = chapter
          .questions
          .into_iter()
          .filter_map(|q| {
            let id = q.id.as_ref().and_then(parse_int)?;
            let prompt = non_empty(q.question_text)?;
            let correct_key = non_empty(q.correct_key)?;
            let options = q
              .options
              .into_iter()
              .filter_map(|o| Some((non_empty(o.opt_key)?, non_empty(o.opt_text)?)))
              .collect();
            Some(Question {
              id: id.max(0) as u32,
              prompt,
              options,
              correct_key,
              category: None,
            })
          })
          .collect();
        Some(Category { name, questions })
      })
      .collect();

    Ok(bank)
  }

  /// Fetch editorial entries. Legacy deployments used several column names
  /// for day/title/body, so rows are probed as raw JSON.
  #[instrument(level = "info", skip(self), fields(days_count))]
  pub async fn fetch_editorial(&self, days_count: usize) -> Result<Vec<EditorialEntry>, String> {
    let rows: Vec<Value> = self.get_rows(&format!("{}?select=*", TABLE_CONTENT)).await?;

    let mut entries: Vec<EditorialEntry> = rows
      .iter()
      .filter_map(|row| {
        let day = pick(row, &["day", "day_index", "dia", "eguna"]).and_then(parse_int)?;
        if day < 0 || day > days_count as i64 {
          return None;
        }
        let title = pick(row, &["title", "titulo", "izenburua", "izenburua_eu"])
          .and_then(parse_string)
          .unwrap_or_else(|| format!("Eguna {}", day));
        let body = pick(row, &["content", "text", "testua", "edukia", "body"]).and_then(parse_string)?;
        Some(EditorialEntry { day: day as u32, title, body })
      })
      .collect();

    entries.sort_by_key(|e| e.day);
    Ok(entries)
  }

  /// Fetch registered player names, trying each candidate source table until
  /// one yields data. A missing table is expected, not an error.
  #[instrument(level = "info", skip(self))]
  pub async fn fetch_registered_players(&self) -> Result<Vec<String>, String> {
    for (table, columns) in PLAYER_SOURCES {
      let rows: Vec<Value> = match self
        .get_rows(&format!("{}?select={}&limit=1000", table, columns))
        .await
      {
        Ok(rows) => rows,
        Err(e) => {
          warn!(target: "korrika_backend", table, error = %e, "Player source unavailable; trying next");
          continue;
        }
      };

      let mut names: Vec<String> = Vec::new();
      for row in &rows {
        let raw = pick(row, &["name", "username", "full_name", "nombre", "code", "codigo", "email"])
          .and_then(parse_string);
        if let Some(raw) = raw {
          let name = normalize_player_name(&raw);
          if !name.is_empty() && !names.contains(&name) {
            names.push(name);
          }
        }
      }
      if !names.is_empty() {
        info!(target: "korrika_backend", table, count = names.len(), "Registered players loaded");
        return Ok(names);
      }
    }
    Ok(Vec::new())
  }

  /// Fetch result rows for the leaderboards, newest first, capped.
  #[instrument(level = "info", skip(self))]
  pub async fn fetch_leaderboard_rows(&self) -> Result<Vec<ScoreRow>, String> {
    let rows: Vec<Value> = self
      .get_rows(&format!(
        "{}?select=player_name,correct_answers,played_at&order=played_at.desc&limit=5000",
        TABLE_RESULTS
      ))
      .await?;

    Ok(
      rows
        .iter()
        .map(|row| ScoreRow {
          player_name: pick(row, &["player_name"]).and_then(parse_string),
          correct_answers: pick(row, &["correct_answers"]).and_then(parse_int).map(|v| v.max(0) as u32),
          played_at: pick(row, &["played_at"]).and_then(parse_string).and_then(|s| parse_timestamp(&s)),
        })
        .collect(),
    )
  }

  /// Fetch one user's completed DAILY plays as progress records, one per day
  /// index (newest row wins), sorted by day index.
  #[instrument(level = "info", skip(self), fields(user_id = %user_id))]
  pub async fn fetch_user_daily_plays(
    &self,
    user_id: &str,
    days_count: usize,
  ) -> Result<Vec<ProgressRecord>, String> {
    let rows: Vec<Value> = self
      .get_rows(&format!(
        "{}?select=day_index,played_at,correct_answers,total_questions,answers&user_id=eq.{}&play_mode=eq.DAILY&day_index=not.is.null&order=played_at.desc&limit=200",
        TABLE_RESULTS, user_id
      ))
      .await?;

    let day_values: Vec<i64> = rows
      .iter()
      .filter_map(|row| pick(row, &["day_index"]).and_then(parse_int))
      .collect();
    let one_based = treat_as_one_based(&day_values, days_count);

    let mut records: Vec<ProgressRecord> = Vec::new();
    for row in &rows {
      let played_at = match pick(row, &["played_at"]).and_then(parse_string).and_then(|s| parse_timestamp(&s)) {
        Some(ts) => ts,
        None => continue,
      };
      let raw_day = match pick(row, &["day_index"]).and_then(parse_int) {
        Some(d) => d,
        None => continue,
      };
      let day = if one_based { raw_day - 1 } else { raw_day };
      if day < 0 || day >= days_count as i64 {
        continue;
      }
      let day_index = day as usize;
      // Rows arrive newest first; the first row per day wins.
      if records.iter().any(|r| r.day_index == day_index) {
        continue;
      }
      let answers = pick(row, &["answers"])
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(parse_answer).collect())
        .unwrap_or_default();
      records.push(ProgressRecord {
        day_index,
        completed: true,
        score: pick(row, &["correct_answers"]).and_then(parse_int).map(|v| v.max(0) as u32).unwrap_or(0),
        completed_at: played_at,
        answers,
      });
    }

    records.sort_by_key(|r| r.day_index);
    Ok(records)
  }

  /// Append result rows for a finished round. The store enforces one DAILY
  /// row per user + day; a second write comes back as `Conflict`.
  #[instrument(level = "info", skip(self, rows), fields(rows = rows.len()))]
  pub async fn insert_game_results(&self, rows: &[GameResultRow]) -> Result<(), StoreWriteError> {
    let res = self
      .request(Method::POST, TABLE_RESULTS)
      .json(rows)
      .send()
      .await
      .map_err(|e| StoreWriteError::Other(e.to_string()))?;

    let status = res.status();
    if status == reqwest::StatusCode::CONFLICT {
      return Err(StoreWriteError::Conflict);
    }
    if !status.is_success() {
      let body = res.text().await.unwrap_or_default();
      return Err(StoreWriteError::Other(format!(
        "store HTTP {}: {}",
        status,
        trunc_for_log(&body, 300)
      )));
    }
    Ok(())
  }

  /// Read the admin-configured start date. `Ok(None)` when absent or not a
  /// strict `YYYY-MM-DD` value.
  #[instrument(level = "info", skip(self))]
  pub async fn fetch_start_date(&self) -> Result<Option<chrono::NaiveDate>, String> {
    #[derive(Deserialize)]
    struct ConfigRow {
      #[serde(default)] config_value: Option<String>,
    }

    let rows: Vec<ConfigRow> = self
      .get_rows(&format!(
        "{}?select=config_value&config_key=eq.{}",
        TABLE_CONFIG, START_DATE_CONFIG_KEY
      ))
      .await?;

    Ok(rows.into_iter().next().and_then(|r| r.config_value).and_then(|v| parse_start_date(&v)))
  }

  /// Upsert the configured start date.
  #[instrument(level = "info", skip(self), fields(%value))]
  pub async fn save_start_date(&self, value: chrono::NaiveDate) -> Result<(), String> {
    let body = serde_json::json!([{
      "config_key": START_DATE_CONFIG_KEY,
      "config_value": value.format("%Y-%m-%d").to_string(),
    }]);

    let res = self
      .request(Method::POST, &format!("{}?on_conflict=config_key", TABLE_CONFIG))
      .header("Prefer", "resolution=merge-duplicates")
      .json(&body)
      .send()
      .await
      .map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let text = res.text().await.unwrap_or_default();
      return Err(format!("store HTTP {}: {}", status, trunc_for_log(&text, 300)));
    }
    Ok(())
  }
}

/// Legacy result sets stored day indices 1-based. Detect that shape: no zero
/// anywhere and every value inside `[1, days_count]`.
pub fn treat_as_one_based(day_values: &[i64], days_count: usize) -> bool {
  if day_values.is_empty() {
    return false;
  }
  if day_values.contains(&0) {
    return false;
  }
  day_values.iter().all(|v| (1..=days_count as i64).contains(v))
}

// -------- Tolerant JSON helpers --------

fn pick<'a>(row: &'a Value, keys: &[&str]) -> Option<&'a Value> {
  keys.iter().find_map(|k| {
    let v = row.get(*k)?;
    if v.is_null() { None } else { Some(v) }
  })
}

fn parse_int(v: &Value) -> Option<i64> {
  match v {
    Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
    Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.trunc() as i64),
    _ => None,
  }
}

fn parse_string(v: &Value) -> Option<String> {
  let s = match v {
    Value::String(s) => s.trim().to_string(),
    Value::Number(n) => n.to_string(),
    _ => return None,
  };
  if s.is_empty() { None } else { Some(s) }
}

fn non_empty(v: Option<String>) -> Option<String> {
  let s = v?.trim().to_string();
  if s.is_empty() { None } else { Some(s) }
}

/// Accept RFC 3339 (converted to the server's local wall time so calendar
/// comparisons share one zone) or an already-naive timestamp.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
  if let Ok(t) = DateTime::parse_from_rfc3339(s) {
    return Some(t.with_timezone(&Local).naive_local());
  }
  NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
    .ok()
}

fn parse_answer(item: &Value) -> Option<AnswerRecord> {
  if !item.is_object() {
    return None;
  }
  Some(AnswerRecord {
    question_id: pick(item, &["question_id"]).and_then(parse_int).map(|v| v.max(0) as u32).unwrap_or(0),
    question_text: pick(item, &["question_text"]).and_then(parse_string).unwrap_or_default(),
    category: pick(item, &["category"]).and_then(parse_string),
    selected_key: pick(item, &["selected_option_key"]).and_then(parse_string),
    selected_text: pick(item, &["selected_option_text"]).and_then(parse_string),
    correct_key: pick(item, &["correct_option_key"]).and_then(parse_string).unwrap_or_default(),
    correct_text: pick(item, &["correct_option_text"]).and_then(parse_string).unwrap_or_default(),
    is_correct: pick(item, &["is_correct"]).and_then(Value::as_bool).unwrap_or(false),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn one_based_detection() {
    // All values in [1, 11] with no zero: legacy 1-based set.
    assert!(treat_as_one_based(&[1, 2, 3, 11], 11));
    // A zero marks the set as 0-based.
    assert!(!treat_as_one_based(&[0, 1, 2], 11));
    // A value past days_count cannot be 1-based either.
    assert!(!treat_as_one_based(&[1, 12], 11));
    assert!(!treat_as_one_based(&[], 11));
  }

  #[test]
  fn ints_parse_from_numbers_and_strings() {
    assert_eq!(parse_int(&json!(4)), Some(4));
    assert_eq!(parse_int(&json!(4.9)), Some(4));
    assert_eq!(parse_int(&json!("7")), Some(7));
    assert_eq!(parse_int(&json!(" 7.2 ")), Some(7));
    assert_eq!(parse_int(&json!("junk")), None);
    assert_eq!(parse_int(&json!(null)), None);
  }

  #[test]
  fn pick_probes_alternate_column_names() {
    let row = json!({"eguna": 3, "izenburua": "Hirugarren eguna", "day": null});
    assert_eq!(pick(&row, &["day", "day_index", "dia", "eguna"]).and_then(parse_int), Some(3));
    assert_eq!(
      pick(&row, &["title", "titulo", "izenburua"]).and_then(parse_string).as_deref(),
      Some("Hirugarren eguna")
    );
    assert!(pick(&row, &["missing"]).is_none());
  }

  #[test]
  fn timestamps_parse_with_and_without_offset() {
    assert!(parse_timestamp("2026-02-14T10:00:00Z").is_some());
    assert!(parse_timestamp("2026-02-14T10:00:00+01:00").is_some());
    assert!(parse_timestamp("2026-02-14T10:00:00").is_some());
    assert!(parse_timestamp("2026-02-14 10:00:00").is_some());
    assert!(parse_timestamp("not a timestamp").is_none());
  }

  #[test]
  fn malformed_answer_entries_are_dropped() {
    assert!(parse_answer(&json!("junk")).is_none());
    let parsed = parse_answer(&json!({
      "question_id": "12",
      "question_text": "Zein urtetan?",
      "is_correct": true
    }))
    .unwrap();
    assert_eq!(parsed.question_id, 12);
    assert!(parsed.is_correct);
    assert_eq!(parsed.selected_key, None);
  }
}

//! Domain models used by the backend: questions, progress, results, and the
//! eligibility verdict computed for the daily challenge.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Which kind of round is the user playing?
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayMode {
  /// The gated once-per-calendar-day batch tied to a day index.
  Daily,
  /// Untimed practice play; never touches daily progress.
  Random,
}
impl Default for PlayMode {
  fn default() -> Self { PlayMode::Daily }
}

/// One multiple-choice question. Option keys are lower-cased and unique after
/// sanitization; `correct_key` is guaranteed present among them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Question {
  pub id: u32,
  pub prompt: String,
  /// Option key -> option text, ordered by key.
  pub options: BTreeMap<String, String>,
  pub correct_key: String,
  /// Source category name, tagged when a question set is built.
  #[serde(default)] pub category: Option<String>,
}

/// An ordered group of questions sharing a category name. Question order
/// within a category is stable and is the basis for day-index slicing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Category {
  pub name: String,
  #[serde(default)] pub questions: Vec<Question>,
}

/// Per-question outcome kept for review display; never consulted by the
/// eligibility logic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnswerRecord {
  pub question_id: u32,
  pub question_text: String,
  #[serde(default)] pub category: Option<String>,
  #[serde(default)] pub selected_key: Option<String>,
  #[serde(default)] pub selected_text: Option<String>,
  pub correct_key: String,
  pub correct_text: String,
  pub is_correct: bool,
}

/// Durable evidence that a user completed one day index. Created exactly once
/// when the round for that day finishes and never mutated afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressRecord {
  pub day_index: usize,
  pub completed: bool,
  pub score: u32,
  /// Completion timestamp; compared by calendar date only, never as an
  /// instant.
  pub completed_at: NaiveDateTime,
  #[serde(default)] pub answers: Vec<AnswerRecord>,
}

/// One persisted result row per player per finished round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameResultRow {
  pub user_id: String,
  pub player_name: String,
  pub play_mode: PlayMode,
  /// None for RANDOM rounds.
  #[serde(default)] pub day_index: Option<usize>,
  pub total_questions: u32,
  pub correct_answers: u32,
  pub incorrect_answers: u32,
  #[serde(default)] pub answers: Vec<AnswerRecord>,
  pub played_at: NaiveDateTime,
}

/// Editorial snippet shown on the home screen. `day` is 1-based in storage;
/// day 0 is the pre-challenge slot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EditorialEntry {
  pub day: u32,
  pub title: String,
  pub body: String,
}

/// Why the daily challenge cannot be played right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
  NotStarted,
  AlreadyPlayedToday,
  LockedFutureDay,
  ChallengeFinished,
  ChallengeExpired,
}

/// The computed answer to "can the user play, and which day, right now".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Eligibility {
  Playable { day_index: usize },
  Blocked { reason: BlockReason },
}

//! Question bank sanitization and per-round question set building.
//!
//! The bank reaches us from loosely-typed external sources (remote rows,
//! TOML). `sanitize_bank` turns that into the validated shape the rest of
//! the crate may assume: lower-cased unique option keys, duplicate option
//! texts collapsed, correct key present. `build_question_set` then selects
//! the subset for one round.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use tracing::warn;

use crate::domain::{Category, PlayMode, Question};

/// Questions each category contributes to one day / one random round.
pub const QUESTIONS_PER_CATEGORY: usize = 2;

/// Validate a raw bank. Questions that cannot be repaired (no options left,
/// or the correct key gone after key normalization) are dropped with a log;
/// categories are kept even when emptied so category order stays stable.
pub fn sanitize_bank(raw: Vec<Category>) -> Vec<Category> {
  raw
    .into_iter()
    .map(|cat| {
      let name = cat.name.trim().to_string();
      let questions = cat
        .questions
        .into_iter()
        .filter_map(|q| sanitize_question(q, &name))
        .collect();
      Category { name, questions }
    })
    .collect()
}

fn sanitize_question(q: Question, category: &str) -> Option<Question> {
  let correct_key = q.correct_key.trim().to_lowercase();
  let mut options: BTreeMap<String, String> = BTreeMap::new();
  // Option text -> key already holding it, for duplicate-text collapsing.
  let mut texts: BTreeMap<String, String> = BTreeMap::new();

  for (key, text) in &q.options {
    let key = key.trim().to_lowercase();
    let text = text.trim().to_string();
    if key.is_empty() || text.is_empty() || options.contains_key(&key) {
      continue;
    }
    if let Some(holder) = texts.get(&text).cloned() {
      // Same text under two keys: keep the copy under the correct key.
      if key == correct_key {
        options.remove(&holder);
        options.insert(key.clone(), text.clone());
        texts.insert(text, key);
      }
      continue;
    }
    texts.insert(text.clone(), key.clone());
    options.insert(key, text);
  }

  if !options.contains_key(&correct_key) {
    warn!(target: "challenge", id = q.id, category, "Dropping question: correct option key missing after sanitization");
    return None;
  }

  Some(Question { options, correct_key, ..q })
}

/// Select the questions for one round.
///
/// DAILY takes the fixed slice `[day_index*2, day_index*2 + 1]` of every
/// category in bank order, so each day consumes a disjoint pre-assigned part
/// of each pool; a short category simply contributes less, never wraps. The
/// combined list is cut to `questions_per_day`.
///
/// RANDOM draws two per category without replacement and shuffles the whole
/// set; repeats across sessions are expected.
///
/// An empty bank yields an empty set: "cannot start a round", not an error.
pub fn build_question_set(
  bank: &[Category],
  mode: PlayMode,
  day_index: usize,
  questions_per_day: usize,
) -> Vec<Question> {
  match mode {
    PlayMode::Daily => {
      let mut out = Vec::new();
      for cat in bank {
        let base = day_index * QUESTIONS_PER_CATEGORY;
        for pos in base..base + QUESTIONS_PER_CATEGORY {
          if let Some(q) = cat.questions.get(pos) {
            out.push(tagged(q, &cat.name));
          }
        }
      }
      out.truncate(questions_per_day);
      out
    }
    PlayMode::Random => {
      let mut rng = rand::thread_rng();
      let mut out: Vec<Question> = Vec::new();
      for cat in bank {
        for q in cat.questions.choose_multiple(&mut rng, QUESTIONS_PER_CATEGORY) {
          out.push(tagged(q, &cat.name));
        }
      }
      out.shuffle(&mut rng);
      out
    }
  }
}

fn tagged(q: &Question, category: &str) -> Question {
  Question { category: Some(category.to_string()), ..q.clone() }
}

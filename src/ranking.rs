//! Leaderboard aggregation over persisted game result rows.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// The slice of a result row the rankings need. Fields are optional because
/// rows come back from a loosely-typed store.
#[derive(Clone, Debug)]
pub struct ScoreRow {
  pub player_name: Option<String>,
  pub correct_answers: Option<u32>,
  pub played_at: Option<NaiveDateTime>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
  pub player_name: String,
  pub points: u32,
  pub games: u32,
}

/// Fold result rows into a ranking. `base_players` (the registered players)
/// are seeded with zero points so they show up before their first game; rows
/// aggregate per trimmed upper-cased name. Order: points desc, then fewer
/// games first, then name.
pub fn build_ranking(rows: &[ScoreRow], base_players: &[String]) -> Vec<RankingEntry> {
  let mut by_name: BTreeMap<String, RankingEntry> = BTreeMap::new();

  for name in base_players {
    let clean = name.trim();
    if clean.is_empty() {
      continue;
    }
    by_name.entry(clean.to_string()).or_insert_with(|| RankingEntry {
      player_name: clean.to_string(),
      points: 0,
      games: 0,
    });
  }

  for row in rows {
    let name = row.player_name.as_deref().unwrap_or("").trim().to_uppercase();
    if name.is_empty() {
      continue;
    }
    let entry = by_name.entry(name.clone()).or_insert_with(|| RankingEntry {
      player_name: name,
      points: 0,
      games: 0,
    });
    entry.points += row.correct_answers.unwrap_or(0);
    entry.games += 1;
  }

  let mut out: Vec<RankingEntry> = by_name.into_values().collect();
  out.sort_by(|a, b| {
    b.points
      .cmp(&a.points)
      .then(a.games.cmp(&b.games))
      .then(a.player_name.cmp(&b.player_name))
  });
  out
}

/// Keep only rows played on `today` (calendar date, not instant).
pub fn daily_rows(rows: &[ScoreRow], today: NaiveDate) -> Vec<ScoreRow> {
  rows
    .iter()
    .filter(|row| row.played_at.map(|t| t.date() == today).unwrap_or(false))
    .cloned()
    .collect()
}

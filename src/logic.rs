//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Resolving a user's eligibility snapshot (with admin simulation inputs)
//!   - Starting rounds, advancing them answer by answer, finishing them
//!   - Leaderboard views and "today's" editorial snippet
//!   - Admin start-date updates
//!
//! Simulation mode never branches inside the engines: an admin-supplied day
//! offset and progress set simply replace the clock and progress inputs here
//! at the call site.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{error, info, instrument, warn};

use crate::config::default_start_date;
use crate::domain::{
  BlockReason, Category, Eligibility, EditorialEntry, GameResultRow, PlayMode, ProgressRecord,
};
use crate::eligibility::{editorial_day_for, merge_progress, resolve_eligibility};
use crate::questions::build_question_set;
use crate::ranking::{build_ranking, daily_rows, RankingEntry};
use crate::round::{PlayerSlot, Round, RoundPhase};
use crate::state::AppState;
use crate::store::StoreWriteError;
use crate::util::{normalize_player_name, parse_start_date};

/// Wall-clock "now" in the zone every calendar comparison shares.
pub fn local_now() -> NaiveDateTime {
  chrono::Local::now().naive_local()
}

/// Admin-only synthetic inputs substituted for the real clock/progress.
#[derive(Clone, Debug, Default)]
pub struct SimInput {
  pub day: usize,
  pub progress: Vec<ProgressRecord>,
}

/// Everything the home screen needs in one computation.
#[derive(Clone, Debug)]
pub struct EligibilitySnapshot {
  pub eligibility: Eligibility,
  pub progress: Vec<Option<ProgressRecord>>,
  pub start_date: NaiveDate,
  pub seconds_until_start: i64,
  pub editorial: Option<EditorialEntry>,
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
  date.and_time(NaiveTime::MIN)
}

/// Accept the simulation request only from configured admins; anyone else
/// falls through to the real clock and progress.
fn accepted_sim(state: &AppState, user_name: Option<&str>, sim: Option<SimInput>) -> Option<SimInput> {
  let sim = sim?;
  let admin = user_name.map(|n| state.challenge.is_admin(n)).unwrap_or(false);
  if admin {
    Some(sim)
  } else {
    warn!(target: "challenge", user = user_name.unwrap_or(""), "Ignoring simulation input from non-admin");
    None
  }
}

#[instrument(level = "info", skip(state, local_progress, sim), fields(%user_id))]
pub async fn eligibility_snapshot(
  state: &AppState,
  user_id: &str,
  user_name: Option<&str>,
  local_progress: &[ProgressRecord],
  sim: Option<SimInput>,
) -> EligibilitySnapshot {
  let days_count = state.challenge.days_count;
  let start_date = state.challenge_start_date().await;

  let (now, merged) = match accepted_sim(state, user_name, sim) {
    Some(sim) => {
      let now = midnight(start_date) + Duration::days(sim.day as i64);
      (now, merge_progress(&sim.progress, &[], days_count))
    }
    None => {
      let server = state.user_progress(user_id, false).await;
      (local_now(), merge_progress(local_progress, &server, days_count))
    }
  };

  let eligibility = resolve_eligibility(start_date, days_count, now, &merged);
  let target_day = editorial_day_for(start_date, days_count, now);
  let editorial = state
    .editorial_entries()
    .await
    .into_iter()
    .find(|entry| entry.day == target_day);
  let seconds_until_start = (midnight(start_date) - now).num_seconds().max(0);

  EligibilitySnapshot { eligibility, progress: merged, start_date, seconds_until_start, editorial }
}

pub struct StartRoundRequest {
  pub user_id: String,
  pub user_name: Option<String>,
  pub mode: PlayMode,
  pub players: Vec<String>,
  pub local_progress: Vec<ProgressRecord>,
  pub sim: Option<SimInput>,
}

#[derive(Debug)]
pub enum StartRoundError {
  /// Daily play refused; carries the reason for the client message.
  Blocked(BlockReason),
  /// No usable questions: bank empty or the day's slice exhausted.
  EmptyBank,
  /// Simulation requested by a non-admin.
  AdminOnly,
}

fn bank_question_count(bank: &[Category]) -> usize {
  bank.iter().map(|c| c.questions.len()).sum()
}

/// Resolve the day, build the question set and register a new round.
#[instrument(level = "info", skip(state, req), fields(user_id = %req.user_id, mode = ?req.mode))]
pub async fn start_round(state: &AppState, req: StartRoundRequest) -> Result<Round, StartRoundError> {
  let bank = state.question_bank().await;
  if bank_question_count(&bank) == 0 {
    warn!(target: "challenge", "Cannot start round: question bank is empty");
    return Err(StartRoundError::EmptyBank);
  }

  let days_count = state.challenge.days_count;
  let sim_requested = req.sim.is_some();
  let sim = accepted_sim(state, req.user_name.as_deref(), req.sim.clone());
  if sim_requested && sim.is_none() {
    return Err(StartRoundError::AdminOnly);
  }

  let (day_index, simulated) = match req.mode {
    PlayMode::Random => (None, false),
    PlayMode::Daily => match &sim {
      Some(sim) if sim.progress.is_empty() => {
        // Single-day probe: jump straight to the clamped day.
        (Some(sim.day.min(days_count.saturating_sub(1))), true)
      }
      Some(sim) => {
        // Sequential simulation: the synthetic clock and progress run
        // through the same eligibility gate as real play.
        let start_date = state.challenge_start_date().await;
        let now = midnight(start_date) + Duration::days(sim.day as i64);
        let merged = merge_progress(&sim.progress, &[], days_count);
        match resolve_eligibility(start_date, days_count, now, &merged) {
          Eligibility::Playable { day_index } => (Some(day_index), true),
          Eligibility::Blocked { reason } => return Err(StartRoundError::Blocked(reason)),
        }
      }
      None => {
        let snapshot = eligibility_snapshot(
          state,
          &req.user_id,
          req.user_name.as_deref(),
          &req.local_progress,
          None,
        )
        .await;
        match snapshot.eligibility {
          Eligibility::Playable { day_index } => (Some(day_index), false),
          Eligibility::Blocked { reason } => return Err(StartRoundError::Blocked(reason)),
        }
      }
    },
  };

  let questions = build_question_set(
    &bank,
    req.mode,
    day_index.unwrap_or(0),
    state.challenge.questions_per_day,
  );
  if questions.is_empty() {
    warn!(target: "challenge", ?day_index, "Cannot start round: no questions for this day");
    return Err(StartRoundError::EmptyBank);
  }

  let mut players: Vec<String> = req
    .players
    .iter()
    .map(|name| {
      let trimmed = name.trim();
      if trimmed.is_empty() { "Izengabea".to_string() } else { trimmed.to_string() }
    })
    .collect();
  if players.is_empty() {
    players.push(default_player_name(req.user_name.as_deref(), &req.user_id));
  }
  players.truncate(4);

  let round = Round::new(
    &req.user_id,
    req.mode,
    day_index,
    simulated,
    questions,
    players,
    state.challenge.seconds_per_question,
  );
  info!(target: "challenge", round_id = %round.id, ?day_index, simulated, players = round.players.len(), "Round started");
  state.insert_round(round.clone()).await;
  Ok(round)
}

fn default_player_name(user_name: Option<&str>, user_id: &str) -> String {
  let from_name = user_name.map(normalize_player_name).unwrap_or_default();
  if !from_name.is_empty() {
    return from_name;
  }
  let from_id = normalize_player_name(user_id);
  if from_id.is_empty() { "GONBIDATUA".to_string() } else { from_id }
}

/// Countdown finished: activate the current player's first question.
#[instrument(level = "info", skip(state), fields(%round_id))]
pub async fn begin_turn(state: &AppState, round_id: &str) -> Result<TurnInfo, String> {
  let now = local_now();
  let turn = state
    .modify_round(round_id, |round| {
      if !round.begin_turn(now) {
        return None;
      }
      Some(TurnInfo {
        player_name: round.players[round.current_player].name.clone(),
        question_index: 0,
        deadline: round.question_deadline,
      })
    })
    .await
    .ok_or_else(|| format!("Unknown roundId: {}", round_id))?;
  turn.ok_or_else(|| "Round is not waiting on a countdown.".to_string())
}

#[derive(Clone, Debug)]
pub struct TurnInfo {
  pub player_name: String,
  pub question_index: usize,
  pub deadline: Option<NaiveDateTime>,
}

/// The next player confirmed the handover.
#[instrument(level = "info", skip(state), fields(%round_id))]
pub async fn confirm_turn(state: &AppState, round_id: &str) -> Result<String, String> {
  state
    .modify_round(round_id, |round| {
      if round.confirm_turn() {
        Some(round.players[round.current_player].name.clone())
      } else {
        None
      }
    })
    .await
    .ok_or_else(|| format!("Unknown roundId: {}", round_id))?
    .ok_or_else(|| "Round is not waiting on a turn handover.".to_string())
}

/// Per-player result of a finished round.
#[derive(Clone, Debug)]
pub struct RoundSummary {
  pub round_id: String,
  pub mode: PlayMode,
  pub day_index: Option<usize>,
  pub simulated: bool,
  /// The store refused the write: this user already played the day.
  pub duplicate_play: bool,
  pub players: Vec<PlayerSlot>,
  pub best_score: u32,
}

/// What one answer submission did.
#[derive(Clone, Debug)]
pub struct SubmitResult {
  /// False when the submission was stale and ignored.
  pub accepted: bool,
  pub is_correct: bool,
  pub correct_key: String,
  pub correct_text: String,
  pub next_question_index: Option<usize>,
  pub turn_done: bool,
  pub complete: bool,
  pub summary: Option<RoundSummary>,
}

/// Apply an answer (or timeout, `selected = None`) to a round, finishing it
/// when this was the last question of the last player.
#[instrument(level = "info", skip(state, selected), fields(%round_id, question_index))]
pub async fn submit_answer(
  state: &AppState,
  round_id: &str,
  question_index: usize,
  selected: Option<String>,
) -> Result<SubmitResult, String> {
  let now = local_now();
  let outcome = state
    .modify_round(round_id, |round| round.submit_answer(now, question_index, selected))
    .await
    .ok_or_else(|| format!("Unknown roundId: {}", round_id))?;

  let outcome = match outcome {
    Some(outcome) => outcome,
    None => {
      // Stale timer callback or double submit; the round is untouched.
      return Ok(SubmitResult {
        accepted: false,
        is_correct: false,
        correct_key: String::new(),
        correct_text: String::new(),
        next_question_index: None,
        turn_done: false,
        complete: false,
        summary: None,
      });
    }
  };

  let mut result = SubmitResult {
    accepted: true,
    is_correct: outcome.is_correct,
    correct_key: outcome.correct_key,
    correct_text: outcome.correct_text,
    next_question_index: None,
    turn_done: false,
    complete: false,
    summary: None,
  };

  match outcome.phase {
    RoundPhase::Active { question_index } => result.next_question_index = Some(question_index),
    RoundPhase::TurnDone => result.turn_done = true,
    RoundPhase::Complete => {
      result.complete = true;
      result.summary = Some(finish_round(state, round_id, now).await?);
    }
    RoundPhase::Countdown => {}
  }
  Ok(result)
}

/// Take the completed round out of the table, persist its results (unless
/// simulated) and build the summary.
async fn finish_round(
  state: &AppState,
  round_id: &str,
  now: NaiveDateTime,
) -> Result<RoundSummary, String> {
  let round = state
    .remove_round(round_id)
    .await
    .ok_or_else(|| format!("Unknown roundId: {}", round_id))?;

  let mut duplicate_play = false;
  if !round.simulated {
    let rows: Vec<GameResultRow> = round
      .players
      .iter()
      .map(|player| {
        let total = player.answers.len() as u32;
        GameResultRow {
          user_id: round.user_id.clone(),
          player_name: player.name.clone(),
          play_mode: round.mode,
          day_index: round.day_index,
          total_questions: total,
          correct_answers: player.score,
          incorrect_answers: total.saturating_sub(player.score),
          answers: player.answers.clone(),
          played_at: now,
        }
      })
      .collect();

    match state.record_results(rows).await {
      Ok(()) => {
        // New rows landed: bypass the leaderboard throttle once so the next
        // read reflects them.
        let _ = state.leaderboard_rows(true).await;
      }
      Err(StoreWriteError::Conflict) => {
        warn!(target: "challenge", round_id = %round.id, day_index = ?round.day_index, "Duplicate daily result rejected by store");
        duplicate_play = true;
        // Re-sync so the next eligibility verdict reflects the play that
        // beat us to the write.
        let _ = state.user_progress(&round.user_id, true).await;
      }
      Err(StoreWriteError::Other(e)) => {
        error!(target: "challenge", round_id = %round.id, error = %e, "Persisting round results failed");
      }
    }
  }

  info!(target: "challenge", round_id = %round.id, best = round.best_score(), duplicate_play, "Round complete");
  Ok(RoundSummary {
    round_id: round.id.clone(),
    mode: round.mode,
    day_index: round.day_index,
    simulated: round.simulated,
    duplicate_play,
    best_score: round.best_score(),
    players: round.players,
  })
}

/// Both leaderboard views. `viewer_name` joins the zero-point baseline so a
/// fresh player sees themselves listed.
#[instrument(level = "info", skip(state), fields(force))]
pub async fn leaderboards(
  state: &AppState,
  viewer_name: Option<&str>,
  force: bool,
) -> (Vec<RankingEntry>, Vec<RankingEntry>) {
  let rows = state.leaderboard_rows(force).await;

  let mut base = state.registered_players().await;
  if let Some(viewer) = viewer_name {
    let viewer = normalize_player_name(viewer);
    if !viewer.is_empty() && !base.contains(&viewer) {
      base.push(viewer);
    }
  }

  let today = local_now().date();
  let daily = build_ranking(&daily_rows(&rows, today), &[]);
  let general = build_ranking(&rows, &base);
  (daily, general)
}

/// The editorial snippet for "today" (or a simulated day, admins only).
#[instrument(level = "info", skip(state))]
pub async fn editorial_today(
  state: &AppState,
  user_name: Option<&str>,
  sim_day: Option<usize>,
) -> Option<EditorialEntry> {
  let days_count = state.challenge.days_count;
  let start_date = state.challenge_start_date().await;
  let sim = accepted_sim(state, user_name, sim_day.map(|day| SimInput { day, progress: vec![] }));
  let now = match sim {
    Some(sim) => midnight(start_date) + Duration::days(sim.day as i64),
    None => local_now(),
  };
  let target_day = editorial_day_for(start_date, days_count, now);
  state.editorial_entries().await.into_iter().find(|entry| entry.day == target_day)
}

/// The full bank, correct keys included, for the admin supervisor view.
#[instrument(level = "info", skip(state), fields(%user_name))]
pub async fn question_bank_overview(state: &AppState, user_name: &str) -> Result<Vec<Category>, String> {
  if !state.challenge.is_admin(user_name) {
    return Err("Only admins may browse the question bank.".into());
  }
  Ok(state.question_bank().await)
}

/// A read-only snapshot of where a round stands.
#[derive(Clone, Debug)]
pub struct RoundState {
  pub round_id: String,
  pub phase: RoundPhase,
  pub current_player: String,
  pub scores: Vec<(String, u32)>,
}

pub async fn round_state(state: &AppState, round_id: &str) -> Result<RoundState, String> {
  let round = state
    .round_snapshot(round_id)
    .await
    .ok_or_else(|| format!("Unknown roundId: {}", round_id))?;
  Ok(RoundState {
    round_id: round.id.clone(),
    phase: round.phase.clone(),
    current_player: round.players[round.current_player].name.clone(),
    scores: round.players.iter().map(|p| (p.name.clone(), p.score)).collect(),
  })
}

/// The user-facing message for a blocked daily round, matching the frontend
/// copy.
pub fn block_reason_message(reason: BlockReason) -> &'static str {
  match reason {
    BlockReason::NotStarted => "Erronka hasi gabe dago.",
    BlockReason::AlreadyPlayedToday => "Gaurkoa jokatuta. Bihar arte!",
    BlockReason::LockedFutureDay => "Egun hori oraindik itxita dago. Bihar saiatu.",
    BlockReason::ChallengeFinished => "Erronka amaituta. Eskerrik asko parte hartzeagatik!",
    BlockReason::ChallengeExpired => "Erronka amaitu da.",
  }
}

/// Admin: set the global start date. Strict `YYYY-MM-DD` only.
#[instrument(level = "info", skip(state), fields(%user_name, %value))]
pub async fn set_start_date(state: &AppState, user_name: &str, value: &str) -> Result<NaiveDate, String> {
  if !state.challenge.is_admin(user_name) {
    return Err("Only admins may change the start date.".into());
  }
  let date = parse_start_date(value).ok_or_else(|| "Start date must be YYYY-MM-DD.".to_string())?;
  state.set_start_date(date).await?;
  info!(target: "korrika_backend", %date, "Challenge start date updated");
  Ok(date)
}

/// Admin: restore the built-in default start date.
#[instrument(level = "info", skip(state), fields(%user_name))]
pub async fn reset_start_date(state: &AppState, user_name: &str) -> Result<NaiveDate, String> {
  if !state.challenge.is_admin(user_name) {
    return Err("Only admins may change the start date.".into());
  }
  let date = default_start_date();
  state.set_start_date(date).await?;
  info!(target: "korrika_backend", %date, "Challenge start date reset");
  Ok(date)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn daily_round_flows_from_start_to_summary() {
    let state = AppState::new();
    let round = start_round(
      &state,
      StartRoundRequest {
        user_id: "u1".into(),
        user_name: Some("miren".into()),
        mode: PlayMode::Daily,
        players: vec![],
        local_progress: vec![],
        sim: None,
      },
    )
    .await;

    // The outcome depends on the wall clock relative to the configured
    // start date; both arms must behave.
    match round {
      Ok(round) => {
        assert_eq!(round.day_index, Some(0));
        let turn = begin_turn(&state, &round.id).await.unwrap();
        assert_eq!(turn.question_index, 0);

        let mut index = 0usize;
        loop {
          let result = submit_answer(&state, &round.id, index, None).await.unwrap();
          assert!(result.accepted);
          if result.complete {
            let summary = result.summary.unwrap();
            assert_eq!(summary.best_score, 0);
            assert!(!summary.duplicate_play);
            break;
          }
          index = result.next_question_index.unwrap();
        }

        // The round is gone; a late submit reports an unknown round.
        assert!(submit_answer(&state, &round.id, 0, None).await.is_err());
      }
      Err(StartRoundError::Blocked(_)) => {}
      Err(other) => panic!("unexpected start failure: {:?}", other),
    }
  }

  #[tokio::test]
  async fn random_round_ignores_eligibility() {
    let state = AppState::new();
    let round = start_round(
      &state,
      StartRoundRequest {
        user_id: "u1".into(),
        user_name: None,
        mode: PlayMode::Random,
        players: vec!["Miren".into(), " ".into()],
        local_progress: vec![],
        sim: None,
      },
    )
    .await
    .unwrap();

    assert_eq!(round.day_index, None);
    assert_eq!(round.players[0].name, "Miren");
    assert_eq!(round.players[1].name, "Izengabea");
    assert!(!round.questions.is_empty());
  }

  #[tokio::test]
  async fn simulation_requires_admin() {
    let state = AppState::new();
    let denied = start_round(
      &state,
      StartRoundRequest {
        user_id: "u1".into(),
        user_name: Some("miren".into()),
        mode: PlayMode::Daily,
        players: vec![],
        local_progress: vec![],
        sim: Some(SimInput { day: 1, progress: vec![] }),
      },
    )
    .await;
    assert!(matches!(denied, Err(StartRoundError::AdminOnly)));

    let allowed = start_round(
      &state,
      StartRoundRequest {
        user_id: "u1".into(),
        user_name: Some("admin".into()),
        mode: PlayMode::Daily,
        players: vec![],
        local_progress: vec![],
        sim: Some(SimInput { day: 1, progress: vec![] }),
      },
    )
    .await
    .unwrap();
    assert_eq!(allowed.day_index, Some(1));
    assert!(allowed.simulated);
  }

  #[tokio::test]
  async fn simulated_rounds_never_persist_results() {
    let state = AppState::new();
    let round = start_round(
      &state,
      StartRoundRequest {
        user_id: "u1".into(),
        user_name: Some("admin".into()),
        mode: PlayMode::Daily,
        players: vec![],
        local_progress: vec![],
        sim: Some(SimInput { day: 0, progress: vec![] }),
      },
    )
    .await
    .unwrap();

    begin_turn(&state, &round.id).await.unwrap();
    let mut index = 0usize;
    loop {
      let result = submit_answer(&state, &round.id, index, None).await.unwrap();
      if result.complete {
        assert!(result.summary.unwrap().simulated);
        break;
      }
      index = result.next_question_index.unwrap();
    }

    assert!(state.user_progress("u1", false).await.is_empty());
  }

  #[tokio::test]
  async fn default_player_name_prefers_the_user_name() {
    assert_eq!(default_player_name(Some("miren@korrika.app"), "u1"), "MIREN");
    assert_eq!(default_player_name(None, "k_0001"), "K_0001");
    assert_eq!(default_player_name(None, "  "), "GONBIDATUA");
  }
}

//! HTTP endpoint handlers. These are thin wrappers that forward to core
//! logic. Each handler is instrumented and logs basic result info.

use std::sync::Arc;

use axum::{
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::logic::{self, SimInput, StartRoundError, StartRoundRequest};
use crate::protocol::*;
use crate::state::AppState;

fn sim_input(sim_day: Option<usize>, sim_progress: Option<Vec<crate::domain::ProgressRecord>>) -> Option<SimInput> {
  sim_day.map(|day| SimInput { day, progress: sim_progress.unwrap_or_default() })
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorOut>) {
  (status, Json(ErrorOut { message: message.into() }))
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state, body), fields(%body.user_id))]
pub async fn http_post_eligibility(
  State(state): State<Arc<AppState>>,
  Json(body): Json<EligibilityIn>,
) -> impl IntoResponse {
  let snapshot = logic::eligibility_snapshot(
    &state,
    &body.user_id,
    body.user_name.as_deref(),
    &body.local_progress,
    sim_input(body.sim_day, body.sim_progress),
  )
  .await;
  info!(target: "challenge", user = %body.user_id, eligibility = ?snapshot.eligibility, "HTTP eligibility resolved");
  Json(snapshot_to_out(&snapshot))
}

#[instrument(level = "info", skip(state, body), fields(%body.user_id, mode = ?body.mode))]
pub async fn http_post_round(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartRoundIn>,
) -> Result<Json<RoundOut>, (StatusCode, Json<ErrorOut>)> {
  let round = logic::start_round(
    &state,
    StartRoundRequest {
      user_id: body.user_id,
      user_name: body.user_name,
      mode: body.mode,
      players: body.players,
      local_progress: body.local_progress,
      sim: sim_input(body.sim_day, body.sim_progress),
    },
  )
  .await
  .map_err(|e| match e {
    StartRoundError::Blocked(reason) => {
      error_response(StatusCode::CONFLICT, logic::block_reason_message(reason))
    }
    StartRoundError::EmptyBank => {
      error_response(StatusCode::SERVICE_UNAVAILABLE, "Ez dago galderarik kargatuta.")
    }
    StartRoundError::AdminOnly => {
      error_response(StatusCode::FORBIDDEN, "Simulazioa administratzaileentzat bakarrik.")
    }
  })?;

  info!(target: "challenge", round_id = %round.id, "HTTP round started");
  Ok(Json(round_to_out(&round)))
}

#[instrument(level = "info", skip(state, body), fields(%body.round_id))]
pub async fn http_post_begin_turn(
  State(state): State<Arc<AppState>>,
  Json(body): Json<RoundRef>,
) -> Result<Json<TurnOut>, (StatusCode, Json<ErrorOut>)> {
  let turn = logic::begin_turn(&state, &body.round_id)
    .await
    .map_err(|e| error_response(StatusCode::BAD_REQUEST, e))?;
  Ok(Json(TurnOut { player_name: turn.player_name, question_index: turn.question_index }))
}

#[instrument(level = "info", skip(state, body), fields(%body.round_id, body.question_index))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<AnswerOut>, (StatusCode, Json<ErrorOut>)> {
  let result = logic::submit_answer(&state, &body.round_id, body.question_index, body.selected)
    .await
    .map_err(|e| error_response(StatusCode::BAD_REQUEST, e))?;
  info!(target: "challenge", round_id = %body.round_id, accepted = result.accepted, complete = result.complete, "HTTP answer applied");
  Ok(Json(submit_to_out(&result)))
}

#[instrument(level = "info", skip(state, body), fields(%body.round_id))]
pub async fn http_post_confirm_turn(
  State(state): State<Arc<AppState>>,
  Json(body): Json<RoundRef>,
) -> Result<Json<TurnOut>, (StatusCode, Json<ErrorOut>)> {
  let player_name = logic::confirm_turn(&state, &body.round_id)
    .await
    .map_err(|e| error_response(StatusCode::BAD_REQUEST, e))?;
  Ok(Json(TurnOut { player_name, question_index: 0 }))
}

#[instrument(level = "info", skip(state), fields(force = q.force))]
pub async fn http_get_leaderboard(
  State(state): State<Arc<AppState>>,
  Query(q): Query<LeaderboardQuery>,
) -> impl IntoResponse {
  let (daily, general) = logic::leaderboards(&state, q.user_name.as_deref(), q.force).await;
  Json(LeaderboardOut { daily, general })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_editorial(
  State(state): State<Arc<AppState>>,
  Query(q): Query<EditorialQuery>,
) -> impl IntoResponse {
  let entry = logic::editorial_today(&state, q.user_name.as_deref(), q.sim_day).await;
  Json(entry)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_players(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(PlayersOut { players: state.registered_players().await })
}

#[instrument(level = "info", skip(state), fields(%q.user_name))]
pub async fn http_get_questions(
  State(state): State<Arc<AppState>>,
  Query(q): Query<QuestionsQuery>,
) -> Result<Json<Vec<crate::domain::Category>>, (StatusCode, Json<ErrorOut>)> {
  let bank = logic::question_bank_overview(&state, &q.user_name)
    .await
    .map_err(|e| error_response(StatusCode::FORBIDDEN, e))?;
  Ok(Json(bank))
}

#[instrument(level = "info", skip(state), fields(%q.round_id))]
pub async fn http_get_round_state(
  State(state): State<Arc<AppState>>,
  Query(q): Query<RoundStateQuery>,
) -> Result<Json<RoundStateOut>, (StatusCode, Json<ErrorOut>)> {
  let rs = logic::round_state(&state, &q.round_id)
    .await
    .map_err(|e| error_response(StatusCode::NOT_FOUND, e))?;
  Ok(Json(round_state_to_out(&rs)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_start_date(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let date = state.challenge_start_date().await;
  Json(StartDateOut { value: date.format("%Y-%m-%d").to_string() })
}

#[instrument(level = "info", skip(state, body), fields(%body.user_name))]
pub async fn http_post_start_date(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartDateIn>,
) -> Result<Json<StartDateOut>, (StatusCode, Json<ErrorOut>)> {
  let date = logic::set_start_date(&state, &body.user_name, &body.value)
    .await
    .map_err(|e| error_response(StatusCode::FORBIDDEN, e))?;
  Ok(Json(StartDateOut { value: date.format("%Y-%m-%d").to_string() }))
}

#[instrument(level = "info", skip(state, body), fields(%body.user_name))]
pub async fn http_post_reset_start_date(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ResetStartDateIn>,
) -> Result<Json<StartDateOut>, (StatusCode, Json<ErrorOut>)> {
  let date = logic::reset_start_date(&state, &body.user_name)
    .await
    .map_err(|e| error_response(StatusCode::FORBIDDEN, e))?;
  Ok(Json(StartDateOut { value: date.format("%Y-%m-%d").to_string() }))
}

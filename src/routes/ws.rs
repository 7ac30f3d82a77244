//! WebSocket upgrade + message loop. Each client message is parsed as JSON
//! and forwarded to core logic. We reply with a single JSON message per
//! request.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::logic::{self, SimInput, StartRoundError, StartRoundRequest};
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "korrika_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "korrika_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "korrika_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "korrika_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "korrika_backend", "WebSocket disconnected");
}

fn sim_input(sim_day: Option<usize>, sim_progress: Option<Vec<crate::domain::ProgressRecord>>) -> Option<SimInput> {
  sim_day.map(|day| SimInput { day, progress: sim_progress.unwrap_or_default() })
}

#[instrument(level = "info", skip(msg, state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Eligibility { user_id, user_name, local_progress, sim_day, sim_progress } => {
      let snapshot = logic::eligibility_snapshot(
        state,
        &user_id,
        user_name.as_deref(),
        &local_progress,
        sim_input(sim_day, sim_progress),
      )
      .await;
      tracing::info!(target: "challenge", user = %user_id, eligibility = ?snapshot.eligibility, "WS eligibility resolved");
      ServerWsMessage::Eligibility(snapshot_to_out(&snapshot))
    }

    ClientWsMessage::StartRound { user_id, user_name, mode, players, local_progress, sim_day, sim_progress } => {
      let started = logic::start_round(
        state,
        StartRoundRequest {
          user_id,
          user_name,
          mode,
          players,
          local_progress,
          sim: sim_input(sim_day, sim_progress),
        },
      )
      .await;
      match started {
        Ok(round) => {
          tracing::info!(target: "challenge", round_id = %round.id, "WS round started");
          ServerWsMessage::RoundStarted { round: round_to_out(&round) }
        }
        Err(StartRoundError::Blocked(reason)) => {
          ServerWsMessage::Error { message: logic::block_reason_message(reason).into() }
        }
        Err(StartRoundError::EmptyBank) => {
          ServerWsMessage::Error { message: "Ez dago galderarik kargatuta.".into() }
        }
        Err(StartRoundError::AdminOnly) => {
          ServerWsMessage::Error { message: "Simulazioa administratzaileentzat bakarrik.".into() }
        }
      }
    }

    ClientWsMessage::BeginTurn { round_id } => match logic::begin_turn(state, &round_id).await {
      Ok(turn) => ServerWsMessage::Turn {
        player_name: turn.player_name,
        question_index: turn.question_index,
      },
      Err(e) => ServerWsMessage::Error { message: e },
    },

    ClientWsMessage::SubmitAnswer { round_id, question_index, selected } => {
      match logic::submit_answer(state, &round_id, question_index, selected).await {
        Ok(result) => {
          tracing::info!(target: "challenge", %round_id, accepted = result.accepted, complete = result.complete, "WS answer applied");
          ServerWsMessage::AnswerResult(submit_to_out(&result))
        }
        Err(e) => ServerWsMessage::Error { message: e },
      }
    }

    ClientWsMessage::ConfirmTurn { round_id } => match logic::confirm_turn(state, &round_id).await {
      Ok(player_name) => ServerWsMessage::Turn { player_name, question_index: 0 },
      Err(e) => ServerWsMessage::Error { message: e },
    },

    ClientWsMessage::Leaderboard { user_name, force } => {
      let (daily, general) = logic::leaderboards(state, user_name.as_deref(), force).await;
      ServerWsMessage::Leaderboard { daily, general }
    }

    ClientWsMessage::EditorialToday { user_name, sim_day } => {
      let entry = logic::editorial_today(state, user_name.as_deref(), sim_day).await;
      ServerWsMessage::Editorial { entry }
    }

    ClientWsMessage::SetStartDate { user_name, value } => {
      match logic::set_start_date(state, &user_name, &value).await {
        Ok(date) => ServerWsMessage::StartDate { value: date.format("%Y-%m-%d").to_string() },
        Err(e) => ServerWsMessage::Error { message: e },
      }
    }

    ClientWsMessage::ResetStartDate { user_name } => {
      match logic::reset_start_date(state, &user_name).await {
        Ok(date) => ServerWsMessage::StartDate { value: date.format("%Y-%m-%d").to_string() },
        Err(e) => ServerWsMessage::Error { message: e },
      }
    }
  }
}

//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.
//!
//! Internal rounds carry correct answers; the DTOs here strip them so a
//! client never sees a correct key before answering the question.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{
    AnswerRecord, EditorialEntry, Eligibility, PlayMode, ProgressRecord, Question,
};
use crate::logic::{EligibilitySnapshot, RoundSummary, SubmitResult};
use crate::ranking::RankingEntry;
use crate::round::Round;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Eligibility {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "userName")]
        user_name: Option<String>,
        #[serde(default, rename = "localProgress")]
        local_progress: Vec<ProgressRecord>,
        #[serde(rename = "simDay")]
        sim_day: Option<usize>,
        #[serde(rename = "simProgress")]
        sim_progress: Option<Vec<ProgressRecord>>,
    },
    StartRound {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "userName")]
        user_name: Option<String>,
        mode: PlayMode,
        #[serde(default)]
        players: Vec<String>,
        #[serde(default, rename = "localProgress")]
        local_progress: Vec<ProgressRecord>,
        #[serde(rename = "simDay")]
        sim_day: Option<usize>,
        #[serde(rename = "simProgress")]
        sim_progress: Option<Vec<ProgressRecord>>,
    },
    BeginTurn {
        #[serde(rename = "roundId")]
        round_id: String,
    },
    SubmitAnswer {
        #[serde(rename = "roundId")]
        round_id: String,
        #[serde(rename = "questionIndex")]
        question_index: usize,
        selected: Option<String>,
    },
    ConfirmTurn {
        #[serde(rename = "roundId")]
        round_id: String,
    },
    Leaderboard {
        #[serde(rename = "userName")]
        user_name: Option<String>,
        #[serde(default)]
        force: bool,
    },
    EditorialToday {
        #[serde(rename = "userName")]
        user_name: Option<String>,
        #[serde(rename = "simDay")]
        sim_day: Option<usize>,
    },
    SetStartDate {
        #[serde(rename = "userName")]
        user_name: String,
        value: String,
    },
    ResetStartDate {
        #[serde(rename = "userName")]
        user_name: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Eligibility(EligibilityOut),
    RoundStarted {
        round: RoundOut,
    },
    Turn {
        #[serde(rename = "playerName")]
        player_name: String,
        #[serde(rename = "questionIndex")]
        question_index: usize,
    },
    AnswerResult(AnswerOut),
    Leaderboard {
        daily: Vec<RankingEntry>,
        general: Vec<RankingEntry>,
    },
    Editorial {
        entry: Option<EditorialEntry>,
    },
    StartDate {
        value: String,
    },
    Error {
        message: String,
    },
}

/// Question DTO with the correct key stripped.
#[derive(Debug, Serialize)]
pub struct QuestionOut {
    pub id: u32,
    pub prompt: String,
    pub options: BTreeMap<String, String>,
    pub category: Option<String>,
}

pub fn question_to_out(q: &Question) -> QuestionOut {
    QuestionOut {
        id: q.id,
        prompt: q.prompt.clone(),
        options: q.options.clone(),
        category: q.category.clone(),
    }
}

/// DTO used by both WS and HTTP for a freshly started round.
#[derive(Debug, Serialize)]
pub struct RoundOut {
    #[serde(rename = "roundId")]
    pub round_id: String,
    pub mode: PlayMode,
    #[serde(rename = "dayIndex")]
    pub day_index: Option<usize>,
    pub simulated: bool,
    pub players: Vec<String>,
    #[serde(rename = "secondsPerQuestion")]
    pub seconds_per_question: i64,
    pub questions: Vec<QuestionOut>,
}

pub fn round_to_out(round: &Round) -> RoundOut {
    RoundOut {
        round_id: round.id.clone(),
        mode: round.mode,
        day_index: round.day_index,
        simulated: round.simulated,
        players: round.players.iter().map(|p| p.name.clone()).collect(),
        seconds_per_question: round.seconds_per_question,
        questions: round.questions.iter().map(question_to_out).collect(),
    }
}

#[derive(Debug, Serialize)]
pub struct PlayerOut {
    pub name: String,
    pub score: u32,
    pub answers: Vec<AnswerRecord>,
}

#[derive(Debug, Serialize)]
pub struct SummaryOut {
    #[serde(rename = "roundId")]
    pub round_id: String,
    pub mode: PlayMode,
    #[serde(rename = "dayIndex")]
    pub day_index: Option<usize>,
    pub simulated: bool,
    #[serde(rename = "duplicatePlay")]
    pub duplicate_play: bool,
    #[serde(rename = "bestScore")]
    pub best_score: u32,
    pub players: Vec<PlayerOut>,
}

pub fn summary_to_out(summary: &RoundSummary) -> SummaryOut {
    SummaryOut {
        round_id: summary.round_id.clone(),
        mode: summary.mode,
        day_index: summary.day_index,
        simulated: summary.simulated,
        duplicate_play: summary.duplicate_play,
        best_score: summary.best_score,
        players: summary
            .players
            .iter()
            .map(|p| PlayerOut { name: p.name.clone(), score: p.score, answers: p.answers.clone() })
            .collect(),
    }
}

#[derive(Debug, Serialize)]
pub struct AnswerOut {
    pub accepted: bool,
    pub correct: bool,
    #[serde(rename = "correctKey")]
    pub correct_key: String,
    #[serde(rename = "correctText")]
    pub correct_text: String,
    #[serde(rename = "nextQuestionIndex")]
    pub next_question_index: Option<usize>,
    #[serde(rename = "turnDone")]
    pub turn_done: bool,
    pub complete: bool,
    pub summary: Option<SummaryOut>,
}

pub fn submit_to_out(result: &SubmitResult) -> AnswerOut {
    AnswerOut {
        accepted: result.accepted,
        correct: result.is_correct,
        correct_key: result.correct_key.clone(),
        correct_text: result.correct_text.clone(),
        next_question_index: result.next_question_index,
        turn_done: result.turn_done,
        complete: result.complete,
        summary: result.summary.as_ref().map(summary_to_out),
    }
}

#[derive(Debug, Serialize)]
pub struct EligibilityOut {
    pub eligibility: Eligibility,
    /// Indexed by day; gaps stay null, never zero-valued placeholders.
    pub progress: Vec<Option<ProgressRecord>>,
    #[serde(rename = "startDate")]
    pub start_date: String,
    #[serde(rename = "secondsUntilStart")]
    pub seconds_until_start: i64,
    pub editorial: Option<EditorialEntry>,
}

pub fn snapshot_to_out(snapshot: &EligibilitySnapshot) -> EligibilityOut {
    EligibilityOut {
        eligibility: snapshot.eligibility,
        progress: snapshot.progress.clone(),
        start_date: snapshot.start_date.format("%Y-%m-%d").to_string(),
        seconds_until_start: snapshot.seconds_until_start,
        editorial: snapshot.editorial.clone(),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct EligibilityIn {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    #[serde(default, rename = "localProgress")]
    pub local_progress: Vec<ProgressRecord>,
    #[serde(rename = "simDay")]
    pub sim_day: Option<usize>,
    #[serde(rename = "simProgress")]
    pub sim_progress: Option<Vec<ProgressRecord>>,
}

#[derive(Debug, Deserialize)]
pub struct StartRoundIn {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    #[serde(default)]
    pub mode: PlayMode,
    #[serde(default)]
    pub players: Vec<String>,
    #[serde(default, rename = "localProgress")]
    pub local_progress: Vec<ProgressRecord>,
    #[serde(rename = "simDay")]
    pub sim_day: Option<usize>,
    #[serde(rename = "simProgress")]
    pub sim_progress: Option<Vec<ProgressRecord>>,
}

#[derive(Debug, Deserialize)]
pub struct RoundRef {
    #[serde(rename = "roundId")]
    pub round_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    #[serde(rename = "roundId")]
    pub round_id: String,
    #[serde(rename = "questionIndex")]
    pub question_index: usize,
    pub selected: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct EditorialQuery {
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    #[serde(rename = "simDay")]
    pub sim_day: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardOut {
    pub daily: Vec<RankingEntry>,
    pub general: Vec<RankingEntry>,
}

#[derive(Debug, Serialize)]
pub struct PlayersOut {
    pub players: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct StartDateIn {
    #[serde(rename = "userName")]
    pub user_name: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetStartDateIn {
    #[serde(rename = "userName")]
    pub user_name: String,
}

#[derive(Debug, Serialize)]
pub struct StartDateOut {
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct TurnOut {
    #[serde(rename = "playerName")]
    pub player_name: String,
    #[serde(rename = "questionIndex")]
    pub question_index: usize,
}

#[derive(Debug, Deserialize)]
pub struct QuestionsQuery {
    #[serde(rename = "userName")]
    pub user_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RoundStateQuery {
    #[serde(rename = "roundId")]
    pub round_id: String,
}

#[derive(Debug, Serialize)]
pub struct PlayerScoreOut {
    pub name: String,
    pub score: u32,
}

#[derive(Debug, Serialize)]
pub struct RoundStateOut {
    #[serde(rename = "roundId")]
    pub round_id: String,
    pub phase: String,
    #[serde(rename = "questionIndex")]
    pub question_index: Option<usize>,
    #[serde(rename = "currentPlayer")]
    pub current_player: String,
    pub scores: Vec<PlayerScoreOut>,
}

pub fn round_state_to_out(rs: &crate::logic::RoundState) -> RoundStateOut {
    use crate::round::RoundPhase;
    let (phase, question_index) = match rs.phase {
        RoundPhase::Countdown => ("countdown", None),
        RoundPhase::Active { question_index } => ("active", Some(question_index)),
        RoundPhase::TurnDone => ("turn_done", None),
        RoundPhase::Complete => ("complete", None),
    };
    RoundStateOut {
        round_id: rs.round_id.clone(),
        phase: phase.to_string(),
        question_index,
        current_player: rs.current_player.clone(),
        scores: rs
            .scores
            .iter()
            .map(|(name, score)| PlayerScoreOut { name: name.clone(), score: *score })
            .collect(),
    }
}

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub message: String,
}

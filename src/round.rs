//! Round lifecycle: countdown, one active question at a time, multiplayer
//! turn rotation, completion.
//!
//! Transitions are driven entirely by explicit calls carrying the question
//! index they refer to, so a stale timer callback (the client timed out a
//! question the player already answered) is a no-op instead of corrupting
//! state. Timestamps come in from the caller; nothing in here reads a clock.

use chrono::{Duration, NaiveDateTime};
use uuid::Uuid;

use crate::domain::{AnswerRecord, PlayMode, Question};

/// Where a round currently stands. A round never revisits a prior question
/// index; `Active` only ever moves forward.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundPhase {
    /// Waiting for the current player's countdown to finish.
    Countdown,
    Active { question_index: usize },
    /// Current player finished; the next one has to confirm before playing.
    TurnDone,
    Complete,
}

#[derive(Clone, Debug)]
pub struct PlayerSlot {
    pub name: String,
    pub score: u32,
    pub answers: Vec<AnswerRecord>,
}

#[derive(Clone, Debug)]
pub struct Round {
    pub id: String,
    pub user_id: String,
    pub mode: PlayMode,
    /// None for RANDOM rounds.
    pub day_index: Option<usize>,
    /// Simulated rounds never persist results or progress.
    pub simulated: bool,
    pub questions: Vec<Question>,
    pub players: Vec<PlayerSlot>,
    pub current_player: usize,
    pub phase: RoundPhase,
    /// Deadline for the active question; answers after it count as missed.
    pub question_deadline: Option<NaiveDateTime>,
    pub seconds_per_question: i64,
}

/// What a (non-stale) submission did to the round.
#[derive(Clone, Debug)]
pub struct AnswerOutcome {
    pub is_correct: bool,
    pub correct_key: String,
    pub correct_text: String,
    pub phase: RoundPhase,
}

impl Round {
    pub fn new(
        user_id: &str,
        mode: PlayMode,
        day_index: Option<usize>,
        simulated: bool,
        questions: Vec<Question>,
        player_names: Vec<String>,
        seconds_per_question: i64,
    ) -> Self {
        let players = player_names
            .into_iter()
            .map(|name| PlayerSlot { name, score: 0, answers: Vec::new() })
            .collect();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            mode,
            day_index,
            simulated,
            questions,
            players,
            current_player: 0,
            phase: RoundPhase::Countdown,
            question_deadline: None,
            seconds_per_question,
        }
    }

    pub fn is_multiplayer(&self) -> bool {
        self.players.len() > 1
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            RoundPhase::Active { question_index } => self.questions.get(question_index),
            _ => None,
        }
    }

    /// Countdown finished for the current player: activate their first
    /// question. Any other phase is left untouched.
    pub fn begin_turn(&mut self, now: NaiveDateTime) -> bool {
        if self.phase != RoundPhase::Countdown || self.questions.is_empty() {
            return false;
        }
        self.phase = RoundPhase::Active { question_index: 0 };
        self.question_deadline = Some(now + Duration::seconds(self.seconds_per_question));
        true
    }

    /// The next player confirmed after a turn handover.
    pub fn confirm_turn(&mut self) -> bool {
        if self.phase != RoundPhase::TurnDone {
            return false;
        }
        self.current_player += 1;
        self.phase = RoundPhase::Countdown;
        self.question_deadline = None;
        true
    }

    /// Apply one answer (or timeout, `selected = None`) to the question at
    /// `question_index`. Returns None without any state change when the
    /// submission is stale: wrong phase, or an index that is not the active
    /// one (double submit / late timer).
    pub fn submit_answer(
        &mut self,
        now: NaiveDateTime,
        question_index: usize,
        selected: Option<String>,
    ) -> Option<AnswerOutcome> {
        let current = match self.phase {
            RoundPhase::Active { question_index } => question_index,
            _ => return None,
        };
        if question_index != current {
            return None;
        }
        let question = self.questions.get(current)?.clone();

        // A pick that arrives past the deadline is scored like a timeout.
        let missed = self.question_deadline.map(|d| now > d).unwrap_or(false);
        let selected = if missed { None } else { selected };

        let is_correct = selected.as_deref() == Some(question.correct_key.as_str());
        let selected_text = selected.as_ref().and_then(|k| question.options.get(k).cloned());
        let correct_text = question
            .options
            .get(&question.correct_key)
            .cloned()
            .unwrap_or_default();

        let player = &mut self.players[self.current_player];
        if is_correct {
            player.score += 1;
        }
        player.answers.push(AnswerRecord {
            question_id: question.id,
            question_text: question.prompt.clone(),
            category: question.category.clone(),
            selected_key: selected,
            selected_text,
            correct_key: question.correct_key.clone(),
            correct_text: correct_text.clone(),
            is_correct,
        });

        if current + 1 < self.questions.len() {
            self.phase = RoundPhase::Active { question_index: current + 1 };
            self.question_deadline = Some(now + Duration::seconds(self.seconds_per_question));
        } else if self.current_player + 1 < self.players.len() {
            self.phase = RoundPhase::TurnDone;
            self.question_deadline = None;
        } else {
            self.phase = RoundPhase::Complete;
            self.question_deadline = None;
        }

        Some(AnswerOutcome {
            is_correct,
            correct_key: question.correct_key,
            correct_text,
            phase: self.phase.clone(),
        })
    }

    /// Best score across players; what the daily progress record carries.
    pub fn best_score(&self) -> u32 {
        self.players.iter().map(|p| p.score).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn q(id: u32) -> Question {
        let options: BTreeMap<String, String> = [("a", "bai"), ("b", "ez")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Question { id, prompt: format!("galdera {id}"), options, correct_key: "a".into(), category: None }
    }

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 14).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    fn solo_round(questions: usize) -> Round {
        let qs = (0..questions as u32).map(q).collect();
        Round::new("u1", PlayMode::Daily, Some(0), false, qs, vec!["MIREN".into()], 20)
    }

    #[test]
    fn solo_round_runs_to_completion() {
        let mut round = solo_round(3);
        assert!(round.begin_turn(ts(10, 0, 0)));
        assert_eq!(round.phase, RoundPhase::Active { question_index: 0 });

        let out = round.submit_answer(ts(10, 0, 5), 0, Some("a".into())).unwrap();
        assert!(out.is_correct);
        assert_eq!(out.phase, RoundPhase::Active { question_index: 1 });

        let out = round.submit_answer(ts(10, 0, 12), 1, Some("b".into())).unwrap();
        assert!(!out.is_correct);

        let out = round.submit_answer(ts(10, 0, 20), 2, None).unwrap();
        assert!(!out.is_correct);
        assert_eq!(out.phase, RoundPhase::Complete);
        assert_eq!(round.best_score(), 1);
        assert_eq!(round.players[0].answers.len(), 3);
    }

    #[test]
    fn stale_question_index_is_ignored() {
        let mut round = solo_round(2);
        round.begin_turn(ts(10, 0, 0));
        round.submit_answer(ts(10, 0, 5), 0, Some("a".into())).unwrap();

        // A late timeout for question 0 fires after question 1 is active.
        assert!(round.submit_answer(ts(10, 0, 21), 0, None).is_none());
        assert_eq!(round.phase, RoundPhase::Active { question_index: 1 });
        assert_eq!(round.players[0].answers.len(), 1);
    }

    #[test]
    fn deadline_expired_pick_scores_as_missed() {
        let mut round = solo_round(2);
        round.begin_turn(ts(10, 0, 0));

        // Deadline is 10:00:20; the pick lands at 10:00:25.
        let out = round.submit_answer(ts(10, 0, 25), 0, Some("a".into())).unwrap();
        assert!(!out.is_correct);
        assert_eq!(round.players[0].answers[0].selected_key, None);
        assert_eq!(round.players[0].score, 0);
    }

    #[test]
    fn submissions_outside_active_phase_are_ignored() {
        let mut round = solo_round(1);
        assert!(round.submit_answer(ts(10, 0, 0), 0, Some("a".into())).is_none());
        round.begin_turn(ts(10, 0, 0));
        round.submit_answer(ts(10, 0, 5), 0, Some("a".into())).unwrap();
        assert_eq!(round.phase, RoundPhase::Complete);
        assert!(round.submit_answer(ts(10, 0, 6), 0, Some("a".into())).is_none());
    }

    #[test]
    fn multiplayer_rotates_turns_and_takes_best_score() {
        let qs = (0..2).map(q).collect();
        let mut round = Round::new(
            "u1",
            PlayMode::Daily,
            Some(3),
            false,
            qs,
            vec!["MIREN".into(), "JON".into()],
            20,
        );
        round.begin_turn(ts(10, 0, 0));
        round.submit_answer(ts(10, 0, 2), 0, Some("a".into())).unwrap();
        let out = round.submit_answer(ts(10, 0, 4), 1, Some("a".into())).unwrap();
        assert_eq!(out.phase, RoundPhase::TurnDone);

        assert!(round.confirm_turn());
        assert_eq!(round.current_player, 1);
        round.begin_turn(ts(10, 1, 0));
        round.submit_answer(ts(10, 1, 2), 0, Some("b".into())).unwrap();
        let out = round.submit_answer(ts(10, 1, 4), 1, Some("b".into())).unwrap();
        assert_eq!(out.phase, RoundPhase::Complete);

        assert_eq!(round.players[0].score, 2);
        assert_eq!(round.players[1].score, 0);
        assert_eq!(round.best_score(), 2);
    }

    #[test]
    fn confirm_turn_only_applies_after_a_handover() {
        let mut round = solo_round(1);
        assert!(!round.confirm_turn());
        round.begin_turn(ts(10, 0, 0));
        assert!(!round.confirm_turn());
    }
}

//! Application state: local stores, caches, the optional remote store and
//! the active rounds.
//!
//! This module owns:
//!   - the sanitized question bank and editorial entries (config or seeds)
//!   - the local game-result store used when no remote store is configured
//!   - cache cells that throttle and coalesce remote reads
//!   - the table of in-flight rounds
//!
//! Every read method degrades: remote store absent or failing means local
//! (possibly seeded, possibly empty) data, never an error to the caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::cache::CacheCell;
use crate::config::{load_app_config_from_env, ChallengeConfig};
use crate::domain::{Category, EditorialEntry, GameResultRow, PlayMode, ProgressRecord, Question};
use crate::questions::sanitize_bank;
use crate::ranking::ScoreRow;
use crate::round::Round;
use crate::seeds::{seed_editorial, seed_question_bank};
use crate::store::{RemoteStore, StoreWriteError};

const BANK_MAX_AGE: Duration = Duration::from_secs(600);
const EDITORIAL_MAX_AGE: Duration = Duration::from_secs(600);
const PLAYERS_MAX_AGE: Duration = Duration::from_secs(600);
// Leaderboards churn during the event; refresh at most twice a minute unless
// a write forces it.
const LEADERBOARD_MAX_AGE: Duration = Duration::from_secs(30);
const START_DATE_MAX_AGE: Duration = Duration::from_secs(300);
// Progress only changes when the user finishes a round, and that path forces
// a refresh; this just coalesces the render-tick bursts.
const PROGRESS_MAX_AGE: Duration = Duration::from_secs(10);

pub struct AppState {
    pub challenge: ChallengeConfig,
    pub store: Option<RemoteStore>,

    bank: Arc<RwLock<Vec<Category>>>,
    editorial: Arc<RwLock<Vec<EditorialEntry>>>,
    start_date: Arc<RwLock<NaiveDate>>,
    results: Arc<RwLock<Vec<GameResultRow>>>,
    rounds: Arc<RwLock<HashMap<String, Round>>>,

    bank_cache: CacheCell<Vec<Category>>,
    editorial_cache: CacheCell<Vec<EditorialEntry>>,
    players_cache: CacheCell<Vec<String>>,
    leaderboard_cache: CacheCell<Vec<ScoreRow>>,
    start_date_cache: CacheCell<Option<NaiveDate>>,
    // One cell per user id, so identical concurrent progress reads coalesce.
    progress_cells: Arc<RwLock<HashMap<String, Arc<CacheCell<Vec<ProgressRecord>>>>>>,
}

impl AppState {
    /// Build state from env: load config, seed bank/editorial, init the
    /// remote store client.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_app_config_from_env().unwrap_or_default();
        let challenge = cfg.challenge.clone();

        let bank = if cfg.categories.is_empty() {
            seed_question_bank()
        } else {
            cfg.categories
                .iter()
                .map(|c| Category {
                    name: c.name.clone(),
                    questions: c
                        .questions
                        .iter()
                        .map(|q| Question {
                            id: q.id,
                            prompt: q.prompt.clone(),
                            options: q.options.clone(),
                            correct_key: q.correct_key.clone(),
                            category: None,
                        })
                        .collect(),
                })
                .collect()
        };
        let bank = sanitize_bank(bank);

        let editorial: Vec<EditorialEntry> = if cfg.editorial.is_empty() {
            seed_editorial()
        } else {
            cfg.editorial
                .iter()
                .map(|e| EditorialEntry { day: e.day, title: e.title.clone(), body: e.body.clone() })
                .collect()
        };

        // Startup inventory by category.
        for cat in &bank {
            info!(target: "challenge", category = %cat.name, questions = cat.questions.len(), "Startup bank inventory");
        }
        info!(target: "korrika_backend", editorial = editorial.len(), days = challenge.days_count, "Startup content inventory");

        let store = RemoteStore::from_env();
        match &store {
            Some(s) => info!(target: "korrika_backend", base_url = %s.base_url(), "Remote store enabled."),
            None => info!(target: "korrika_backend", "Remote store disabled (no STORE_BASE_URL). Using local data."),
        }

        let start_date = challenge.fallback_start_date();

        Self {
            challenge,
            store,
            bank: Arc::new(RwLock::new(bank)),
            editorial: Arc::new(RwLock::new(editorial)),
            start_date: Arc::new(RwLock::new(start_date)),
            results: Arc::new(RwLock::new(Vec::new())),
            rounds: Arc::new(RwLock::new(HashMap::new())),
            bank_cache: CacheCell::new("question_bank", BANK_MAX_AGE),
            editorial_cache: CacheCell::new("editorial", EDITORIAL_MAX_AGE),
            players_cache: CacheCell::new("players", PLAYERS_MAX_AGE),
            leaderboard_cache: CacheCell::new("leaderboard", LEADERBOARD_MAX_AGE),
            start_date_cache: CacheCell::new("start_date", START_DATE_MAX_AGE),
            progress_cells: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The sanitized question bank: remote (cached) when available and
    /// non-empty, local otherwise.
    #[instrument(level = "debug", skip(self))]
    pub async fn question_bank(&self) -> Vec<Category> {
        if let Some(store) = &self.store {
            let remote = self
                .bank_cache
                .get_with(false, || async { store.fetch_question_bank().await.map(sanitize_bank) })
                .await;
            if let Some(bank) = remote {
                if !bank.is_empty() {
                    return bank;
                }
            }
        }
        self.bank.read().await.clone()
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn editorial_entries(&self) -> Vec<EditorialEntry> {
        if let Some(store) = &self.store {
            let days = self.challenge.days_count;
            let remote = self
                .editorial_cache
                .get_with(false, || async { store.fetch_editorial(days).await })
                .await;
            if let Some(entries) = remote {
                if !entries.is_empty() {
                    return entries;
                }
            }
        }
        self.editorial.read().await.clone()
    }

    /// Registered player names; empty when no registry is reachable.
    #[instrument(level = "debug", skip(self))]
    pub async fn registered_players(&self) -> Vec<String> {
        if let Some(store) = &self.store {
            return self
                .players_cache
                .get_with(false, || async { store.fetch_registered_players().await })
                .await
                .unwrap_or_default();
        }
        Vec::new()
    }

    /// Result rows for the leaderboards. `force` bypasses the refresh
    /// throttle; used right after a round submits new results.
    #[instrument(level = "debug", skip(self), fields(force))]
    pub async fn leaderboard_rows(&self, force: bool) -> Vec<ScoreRow> {
        if let Some(store) = &self.store {
            return self
                .leaderboard_cache
                .get_with(force, || async { store.fetch_leaderboard_rows().await })
                .await
                .unwrap_or_default();
        }
        self.results
            .read()
            .await
            .iter()
            .map(|r| ScoreRow {
                player_name: Some(r.player_name.clone()),
                correct_answers: Some(r.correct_answers),
                played_at: Some(r.played_at),
            })
            .collect()
    }

    /// The authoritative daily progress for one user. Remote when available;
    /// the local result store otherwise. Failures mean "no data". `force`
    /// (set after a result write, including a rejected duplicate) bypasses
    /// the short coalescing window.
    #[instrument(level = "debug", skip(self), fields(user_id = %user_id))]
    pub async fn user_progress(&self, user_id: &str, force: bool) -> Vec<ProgressRecord> {
        if let Some(store) = &self.store {
            let cell = {
                let mut cells = self.progress_cells.write().await;
                cells
                    .entry(user_id.to_string())
                    .or_insert_with(|| Arc::new(CacheCell::new("user_progress", PROGRESS_MAX_AGE)))
                    .clone()
            };
            let days_count = self.challenge.days_count;
            return cell
                .get_with(force, || async {
                    store.fetch_user_daily_plays(user_id, days_count).await
                })
                .await
                .unwrap_or_else(|| {
                    warn!(target: "korrika_backend", "Fetching user plays failed; treating as no data");
                    Vec::new()
                });
        }

        let results = self.results.read().await;
        let mut records: Vec<ProgressRecord> = Vec::new();
        for row in results.iter() {
            if row.user_id != user_id || row.play_mode != PlayMode::Daily {
                continue;
            }
            let day_index = match row.day_index {
                Some(d) if d < self.challenge.days_count => d,
                _ => continue,
            };
            if records.iter().any(|r| r.day_index == day_index) {
                continue;
            }
            records.push(ProgressRecord {
                day_index,
                completed: true,
                score: row.correct_answers,
                completed_at: row.played_at,
                answers: row.answers.clone(),
            });
        }
        records.sort_by_key(|r| r.day_index);
        records
    }

    /// Persist a finished round's rows. The duplicate guard applies to DAILY
    /// rows only: one per user + day, remote or local alike.
    #[instrument(level = "info", skip(self, rows), fields(rows = rows.len()))]
    pub async fn record_results(&self, rows: Vec<GameResultRow>) -> Result<(), StoreWriteError> {
        if let Some(store) = &self.store {
            return store.insert_game_results(&rows).await;
        }

        let mut results = self.results.write().await;
        for row in &rows {
            if row.play_mode != PlayMode::Daily {
                continue;
            }
            let duplicate = results.iter().any(|existing| {
                existing.play_mode == PlayMode::Daily
                    && existing.user_id == row.user_id
                    && existing.day_index == row.day_index
            });
            if duplicate {
                return Err(StoreWriteError::Conflict);
            }
        }
        results.extend(rows);
        Ok(())
    }

    /// The effective challenge start date: the store's configured value when
    /// present, the config/default fallback otherwise.
    #[instrument(level = "debug", skip(self))]
    pub async fn challenge_start_date(&self) -> NaiveDate {
        if let Some(store) = &self.store {
            let remote = self
                .start_date_cache
                .get_with(false, || async { store.fetch_start_date().await })
                .await;
            if let Some(Some(date)) = remote {
                return date;
            }
        }
        *self.start_date.read().await
    }

    /// Update the start date everywhere it lives, so the next eligibility
    /// call sees it immediately.
    #[instrument(level = "info", skip(self), fields(%value))]
    pub async fn set_start_date(&self, value: NaiveDate) -> Result<(), String> {
        if let Some(store) = &self.store {
            store.save_start_date(value).await?;
            self.start_date_cache.invalidate().await;
        }
        *self.start_date.write().await = value;
        Ok(())
    }

    // -------- Active rounds --------

    pub async fn insert_round(&self, round: Round) {
        self.rounds.write().await.insert(round.id.clone(), round);
    }

    pub async fn round_snapshot(&self, id: &str) -> Option<Round> {
        self.rounds.read().await.get(id).cloned()
    }

    /// Apply `f` to a round under the write lock.
    pub async fn modify_round<F, R>(&self, id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut Round) -> R,
    {
        let mut rounds = self.rounds.write().await;
        rounds.get_mut(id).map(f)
    }

    pub async fn remove_round(&self, id: &str) -> Option<Round> {
        self.rounds.write().await.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(user: &str, mode: PlayMode, day: Option<usize>, score: u32) -> GameResultRow {
        GameResultRow {
            user_id: user.into(),
            player_name: user.to_uppercase(),
            play_mode: mode,
            day_index: day,
            total_questions: 12,
            correct_answers: score,
            incorrect_answers: 12 - score,
            answers: vec![],
            played_at: NaiveDate::from_ymd_opt(2026, 2, 14).unwrap().and_hms_opt(10, 0, 0).unwrap(),
        }
    }

    fn local_state() -> AppState {
        // No STORE_BASE_URL in the test environment: local mode.
        AppState::new()
    }

    #[tokio::test]
    async fn duplicate_daily_write_is_rejected_locally() {
        let state = local_state();
        state.record_results(vec![row("u1", PlayMode::Daily, Some(0), 9)]).await.unwrap();

        let again = state.record_results(vec![row("u1", PlayMode::Daily, Some(0), 11)]).await;
        assert!(matches!(again, Err(StoreWriteError::Conflict)));

        // A different day and a RANDOM round both go through.
        state.record_results(vec![row("u1", PlayMode::Daily, Some(1), 7)]).await.unwrap();
        state.record_results(vec![row("u1", PlayMode::Random, None, 4)]).await.unwrap();
    }

    #[tokio::test]
    async fn user_progress_derives_from_local_results() {
        let state = local_state();
        state.record_results(vec![row("u1", PlayMode::Daily, Some(1), 8)]).await.unwrap();
        state.record_results(vec![row("u1", PlayMode::Daily, Some(0), 10)]).await.unwrap();
        state.record_results(vec![row("u1", PlayMode::Random, None, 3)]).await.unwrap();
        state.record_results(vec![row("u2", PlayMode::Daily, Some(0), 5)]).await.unwrap();

        let progress = state.user_progress("u1", false).await;
        assert_eq!(progress.len(), 2);
        assert_eq!(progress[0].day_index, 0);
        assert_eq!(progress[0].score, 10);
        assert_eq!(progress[1].day_index, 1);
        assert!(progress.iter().all(|r| r.completed));
    }

    #[tokio::test]
    async fn seeded_bank_survives_sanitization() {
        let state = local_state();
        let bank = state.question_bank().await;
        assert!(!bank.is_empty());
        for cat in &bank {
            for q in &cat.questions {
                assert!(q.options.contains_key(&q.correct_key));
            }
        }
    }
}

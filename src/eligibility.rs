//! The daily-challenge eligibility engine.
//!
//! Everything here is a pure function of the challenge calendar, an explicit
//! "now" and a progress set. The caller supplies `now` (already converted to
//! the zone all calendar comparisons share), which is what lets simulation
//! mode feed a synthetic clock without any branches in here. No state is
//! cached, so an admin moving the start date is reflected on the next call.

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::{BlockReason, Eligibility, ProgressRecord};

/// Decide which day index the user may play right now, or why not.
///
/// Policy: sequential daily unlock. Only the earliest not-yet-completed day
/// is ever playable, at most one day unlocks per real calendar day, and a
/// day is held back until calendar time reaches its slot. A late joiner
/// therefore starts at day 0, not at "today's" index.
pub fn resolve_eligibility(
  start_date: NaiveDate,
  days_count: usize,
  now: NaiveDateTime,
  progress: &[Option<ProgressRecord>],
) -> Eligibility {
  let today_index = (now.date() - start_date).num_days();

  if today_index < 0 {
    return Eligibility::Blocked { reason: BlockReason::NotStarted };
  }
  if today_index >= days_count as i64 {
    return Eligibility::Blocked { reason: BlockReason::ChallengeExpired };
  }

  for i in 0..days_count {
    if completed_at(progress, i).is_some() {
      continue;
    }
    // First incomplete day. It is the only candidate: everything after it is
    // locked behind it by the scan order.
    if i == 0 {
      return Eligibility::Playable { day_index: 0 };
    }
    let prev_done = match completed_at(progress, i - 1) {
      Some(ts) => ts,
      // Unreachable given the scan order, but keeps the function total.
      None => return Eligibility::Blocked { reason: BlockReason::LockedFutureDay },
    };
    // The same-day verdict outranks the calendar lock: a user who just
    // finished the previous day is told "come back tomorrow", not "locked".
    if prev_done.date() == now.date() {
      return Eligibility::Blocked { reason: BlockReason::AlreadyPlayedToday };
    }
    if i as i64 > today_index {
      return Eligibility::Blocked { reason: BlockReason::LockedFutureDay };
    }
    return Eligibility::Playable { day_index: i };
  }

  Eligibility::Blocked { reason: BlockReason::ChallengeFinished }
}

fn completed_at(progress: &[Option<ProgressRecord>], i: usize) -> Option<NaiveDateTime> {
  progress
    .get(i)
    .and_then(|slot| slot.as_ref())
    .filter(|rec| rec.completed)
    .map(|rec| rec.completed_at)
}

/// Reconcile device-local progress with the authoritative server records.
///
/// Server records win for any day index they cover; local records survive
/// only for days the server has never seen (offline or not-yet-synced play).
/// Gaps stay `None`: "no record" and "incomplete" are the same thing to
/// every caller. Out-of-range day indices are dropped.
pub fn merge_progress(
  local: &[ProgressRecord],
  server: &[ProgressRecord],
  days_count: usize,
) -> Vec<Option<ProgressRecord>> {
  let mut merged: Vec<Option<ProgressRecord>> = vec![None; days_count];
  for rec in local.iter().chain(server.iter()) {
    if rec.completed && rec.day_index < days_count {
      merged[rec.day_index] = Some(rec.clone());
    }
  }
  merged
}

/// Which 1-based storage day the editorial snippet for "today" comes from.
/// Before the window opens this is 0, the pre-challenge slot; afterwards it
/// clamps to the final day so the closing entry keeps showing.
pub fn editorial_day_for(start_date: NaiveDate, days_count: usize, now: NaiveDateTime) -> u32 {
  let elapsed = (now.date() - start_date).num_days();
  if elapsed < 0 {
    0
  } else {
    (elapsed + 1).min(days_count as i64) as u32
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const DAYS: usize = 11;

  fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 14).unwrap()
  }

  fn at(date: (i32, u32, u32), hm: (u32, u32)) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(date.0, date.1, date.2)
      .unwrap()
      .and_hms_opt(hm.0, hm.1, 0)
      .unwrap()
  }

  fn record(day_index: usize, completed_at: NaiveDateTime) -> ProgressRecord {
    ProgressRecord {
      day_index,
      completed: true,
      score: 9,
      completed_at,
      answers: vec![],
    }
  }

  fn days(records: Vec<ProgressRecord>) -> Vec<Option<ProgressRecord>> {
    merge_progress(&records, &[], DAYS)
  }

  #[test]
  fn blocked_before_the_window_opens() {
    let e = resolve_eligibility(start(), DAYS, at((2026, 2, 13), (23, 59)), &days(vec![]));
    assert_eq!(e, Eligibility::Blocked { reason: BlockReason::NotStarted });
  }

  #[test]
  fn blocked_after_the_window_elapses() {
    let e = resolve_eligibility(start(), DAYS, at((2026, 2, 25), (0, 0)), &days(vec![]));
    assert_eq!(e, Eligibility::Blocked { reason: BlockReason::ChallengeExpired });
  }

  #[test]
  fn day_zero_playable_with_empty_progress() {
    let e = resolve_eligibility(start(), DAYS, at((2026, 2, 14), (9, 0)), &days(vec![]));
    assert_eq!(e, Eligibility::Playable { day_index: 0 });
  }

  #[test]
  fn late_joiner_starts_at_day_zero() {
    // Four days in with nothing played: day 0 is still the entry point.
    let e = resolve_eligibility(start(), DAYS, at((2026, 2, 18), (12, 0)), &days(vec![]));
    assert_eq!(e, Eligibility::Playable { day_index: 0 });
  }

  #[test]
  fn same_calendar_day_blocks_regardless_of_time() {
    let progress = days(vec![record(0, at((2026, 2, 14), (10, 0)))]);
    let e = resolve_eligibility(start(), DAYS, at((2026, 2, 14), (18, 0)), &progress);
    assert_eq!(e, Eligibility::Blocked { reason: BlockReason::AlreadyPlayedToday });
  }

  #[test]
  fn next_day_unlocks_after_midnight() {
    let progress = days(vec![record(0, at((2026, 2, 14), (10, 0)))]);
    let e = resolve_eligibility(start(), DAYS, at((2026, 2, 15), (8, 0)), &progress);
    assert_eq!(e, Eligibility::Playable { day_index: 1 });
  }

  #[test]
  fn catching_up_is_one_day_per_real_day() {
    // Days 0-1 done, user skipped two days, now on the start+4 date. Day 2 is
    // behind schedule but still the only playable day.
    let progress = days(vec![
      record(0, at((2026, 2, 14), (10, 0))),
      record(1, at((2026, 2, 15), (10, 0))),
    ]);
    let e = resolve_eligibility(start(), DAYS, at((2026, 2, 18), (9, 0)), &progress);
    assert_eq!(e, Eligibility::Playable { day_index: 2 });
  }

  #[test]
  fn same_day_verdict_outranks_the_calendar_lock() {
    // Day 0 finished late on the start date: day 1 is both not-yet-unlocked
    // and behind a same-day predecessor. The user is told "already played".
    let progress = days(vec![record(0, at((2026, 2, 14), (23, 0)))]);
    let e = resolve_eligibility(start(), DAYS, at((2026, 2, 14), (23, 30)), &progress);
    assert_eq!(e, Eligibility::Blocked { reason: BlockReason::AlreadyPlayedToday });
  }

  #[test]
  fn future_day_stays_locked_when_ahead_of_schedule() {
    // A synthetic (simulation-style) record dated before the window: day 1's
    // predecessor is done on an earlier date, but calendar time has not
    // reached day 1 yet.
    let progress = days(vec![record(0, at((2026, 2, 13), (10, 0)))]);
    let e = resolve_eligibility(start(), DAYS, at((2026, 2, 14), (18, 0)), &progress);
    assert_eq!(e, Eligibility::Blocked { reason: BlockReason::LockedFutureDay });
  }

  #[test]
  fn finished_once_every_day_is_complete() {
    let all: Vec<ProgressRecord> = (0..DAYS)
      .map(|i| record(i, at((2026, 2, 14 + i as u32), (10, 0))))
      .collect();
    let e = resolve_eligibility(start(), DAYS, at((2026, 2, 24), (12, 0)), &days(all));
    assert_eq!(e, Eligibility::Blocked { reason: BlockReason::ChallengeFinished });
  }

  #[test]
  fn first_days_walkthrough() {
    // start 2026-02-14, empty progress at 09:00 on day 0.
    let e = resolve_eligibility(start(), DAYS, at((2026, 2, 14), (9, 0)), &days(vec![]));
    assert_eq!(e, Eligibility::Playable { day_index: 0 });

    // Completed day 0 at 10:00; 18:00 the same day is blocked.
    let progress = days(vec![record(0, at((2026, 2, 14), (10, 0)))]);
    let e = resolve_eligibility(start(), DAYS, at((2026, 2, 14), (18, 0)), &progress);
    assert_eq!(e, Eligibility::Blocked { reason: BlockReason::AlreadyPlayedToday });

    // Next morning day 1 opens.
    let e = resolve_eligibility(start(), DAYS, at((2026, 2, 15), (8, 0)), &progress);
    assert_eq!(e, Eligibility::Playable { day_index: 1 });
  }

  #[test]
  fn merge_prefers_server_records() {
    let local = vec![record(0, at((2026, 2, 14), (10, 0))), record(2, at((2026, 2, 16), (10, 0)))];
    let mut server_rec = record(0, at((2026, 2, 14), (11, 30)));
    server_rec.score = 12;
    let server = vec![server_rec];

    let merged = merge_progress(&local, &server, DAYS);
    assert_eq!(merged.len(), DAYS);
    // Server wins on day 0.
    assert_eq!(merged[0].as_ref().unwrap().score, 12);
    // Local-only day 2 survives.
    assert_eq!(merged[2].as_ref().unwrap().score, 9);
    assert!(merged[1].is_none());
  }

  #[test]
  fn merge_is_idempotent() {
    let local = vec![record(1, at((2026, 2, 15), (10, 0)))];
    let server = vec![record(0, at((2026, 2, 14), (10, 0)))];

    let once = merge_progress(&local, &server, DAYS);
    let local_again: Vec<ProgressRecord> = once.iter().flatten().cloned().collect();
    let twice = merge_progress(&local_again, &server, DAYS);

    let key = |p: &[Option<ProgressRecord>]| -> Vec<(usize, u32)> {
      p.iter().flatten().map(|r| (r.day_index, r.score)).collect()
    };
    assert_eq!(key(&once), key(&twice));
  }

  #[test]
  fn merge_drops_out_of_range_and_incomplete_records() {
    let mut incomplete = record(1, at((2026, 2, 15), (10, 0)));
    incomplete.completed = false;
    let local = vec![record(99, at((2026, 2, 14), (10, 0))), incomplete];
    let merged = merge_progress(&local, &[], DAYS);
    assert!(merged.iter().all(|slot| slot.is_none()));
  }

  #[test]
  fn editorial_day_tracks_the_calendar() {
    assert_eq!(editorial_day_for(start(), DAYS, at((2026, 2, 10), (9, 0))), 0);
    assert_eq!(editorial_day_for(start(), DAYS, at((2026, 2, 14), (9, 0))), 1);
    assert_eq!(editorial_day_for(start(), DAYS, at((2026, 2, 20), (9, 0))), 7);
    // Clamped to the last day after the window.
    assert_eq!(editorial_day_for(start(), DAYS, at((2026, 3, 10), (9, 0))), 11);
  }
}

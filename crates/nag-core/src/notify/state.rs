use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use nag_model::{NagKind, NagView, Period, RateLimitView, Uniqid, Until};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use super::NotifyRequest;

/// Terminal condition of a registration as it evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TerminalState {
    Until(Until),
    Remaining(u32),
}

impl TerminalState {
    fn kind(&self) -> NagKind {
        match self {
            TerminalState::Until(_) => NagKind::UntilDate,
            TerminalState::Remaining(_) => NagKind::RemainCount,
        }
    }
}

pub(crate) struct NagRecord {
    pub uniqid: Uniqid,
    pub generation: u64,
    pub terminal: TerminalState,
    pub every: Period,
    pub request: NotifyRequest,
    pub timer: CancellationToken,
}

impl NagRecord {
    pub fn kind(&self) -> NagKind {
        self.terminal.kind()
    }
}

/// In-memory registrations and rate-limit windows.
pub(crate) struct NagState {
    inner: Mutex<NagStateInner>,
}

#[derive(Default)]
struct NagStateInner {
    nags: HashMap<Uniqid, NagRecord>,
    /// uniqid -> end of the open window.
    windows: HashMap<Uniqid, OffsetDateTime>,
}

impl NagStateInner {
    fn prune_windows(&mut self, now: OffsetDateTime) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, end| now < *end);
        before - self.windows.len()
    }
}

impl NagState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(NagStateInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, NagStateInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a registration, handing back the one it replaces.
    pub fn insert(&self, record: NagRecord) -> Option<NagRecord> {
        self.lock().nags.insert(record.uniqid.clone(), record)
    }

    pub fn remove(&self, uniqid: &str) -> Option<NagRecord> {
        self.lock().nags.remove(uniqid)
    }

    /// Remove only if the stored registration is still the given generation.
    pub fn remove_if(&self, uniqid: &str, generation: u64) -> Option<NagRecord> {
        let mut inner = self.lock();
        match inner.nags.get(uniqid) {
            Some(rec) if rec.generation == generation => inner.nags.remove(uniqid),
            _ => None,
        }
    }

    pub fn request_for(&self, uniqid: &str, generation: u64) -> Option<NotifyRequest> {
        self.lock()
            .nags
            .get(uniqid)
            .filter(|rec| rec.generation == generation)
            .map(|rec| rec.request.clone())
    }

    pub fn is_expired(&self, uniqid: &str, generation: u64, now: OffsetDateTime) -> bool {
        self.lock()
            .nags
            .get(uniqid)
            .filter(|rec| rec.generation == generation)
            .is_some_and(|rec| matches!(rec.terminal, TerminalState::Until(u) if u.has_passed(now)))
    }

    /// Count one fire. Returns fires left, `None` for date-bound or gone registrations.
    pub fn decrement(&self, uniqid: &str, generation: u64) -> Option<u32> {
        let mut inner = self.lock();
        let rec = inner
            .nags
            .get_mut(uniqid)
            .filter(|rec| rec.generation == generation)?;
        match &mut rec.terminal {
            TerminalState::Remaining(n) => {
                *n = n.saturating_sub(1);
                Some(*n)
            }
            TerminalState::Until(_) => None,
        }
    }

    /// Remove and return every date-bound registration past its date.
    pub fn take_expired(&self, now: OffsetDateTime) -> Vec<NagRecord> {
        let mut inner = self.lock();
        inner.prune_windows(now);
        let expired: Vec<Uniqid> = inner
            .nags
            .values()
            .filter(|rec| matches!(rec.terminal, TerminalState::Until(u) if u.has_passed(now)))
            .map(|rec| rec.uniqid.clone())
            .collect();
        expired
            .iter()
            .filter_map(|uniqid| inner.nags.remove(uniqid))
            .collect()
    }

    /// Check the window for `uniqid` and, when closed, open a fresh one.
    ///
    /// `Ok(end)` means the emission may proceed and the window now lasts until
    /// `end`; `Err(end)` means a window is still open until `end`.
    pub fn try_open_window(
        &self,
        uniqid: &str,
        now: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<OffsetDateTime, OffsetDateTime> {
        let mut inner = self.lock();
        if let Some(&open) = inner.windows.get(uniqid).filter(|&&open| now < open) {
            return Err(open);
        }
        inner.windows.insert(uniqid.to_string(), end);
        Ok(end)
    }

    /// Forget windows that have closed. Returns how many were dropped.
    pub fn prune_windows(&self, now: OffsetDateTime) -> usize {
        self.lock().prune_windows(now)
    }

    #[cfg(test)]
    pub fn window_count(&self) -> usize {
        self.lock().windows.len()
    }

    pub fn len(&self) -> usize {
        self.lock().nags.len()
    }

    pub fn contains(&self, uniqid: &str) -> bool {
        self.lock().nags.contains_key(uniqid)
    }

    /// Registrations and open windows, sorted by uniqid. Closed windows are dropped.
    pub fn views(&self, now: OffsetDateTime) -> (Vec<NagView>, Vec<RateLimitView>) {
        let mut inner = self.lock();
        inner.prune_windows(now);
        let inner = &*inner;
        let open = |uniqid: &str| {
            inner
                .windows
                .get(uniqid)
                .map(|end| Until::at(*end).to_rfc3339())
        };

        let mut nags: Vec<NagView> = inner
            .nags
            .values()
            .map(|rec| NagView {
                uniqid: rec.uniqid.clone(),
                nag_type: rec.kind(),
                until_date: match rec.terminal {
                    TerminalState::Until(u) => Some(u.to_rfc3339()),
                    TerminalState::Remaining(_) => None,
                },
                remain_count: match rec.terminal {
                    TerminalState::Remaining(n) => Some(n),
                    TerminalState::Until(_) => None,
                },
                frequency_mins: rec.every.as_minutes(),
                message: rec.request.message.clone(),
                tags: rec.request.tags.clone(),
                originated_from: rec.request.originated_from.clone(),
                once_per_n_mins: rec.request.once_per.map(|p| p.as_minutes()),
                rate_limit: open(&rec.uniqid),
            })
            .collect();
        nags.sort_by(|a, b| a.uniqid.cmp(&b.uniqid));

        let mut windows: Vec<RateLimitView> = inner
            .windows
            .keys()
            .filter_map(|uniqid| {
                open(uniqid).map(|until| RateLimitView {
                    uniqid: uniqid.clone(),
                    until,
                })
            })
            .collect();
        windows.sort_by(|a, b| a.uniqid.cmp(&b.uniqid));

        (nags, windows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + time::Duration::days(20_000)
    }

    fn record(uniqid: &str, generation: u64, terminal: TerminalState) -> NagRecord {
        NagRecord {
            uniqid: uniqid.into(),
            generation,
            terminal,
            every: Period::minutes(5),
            request: NotifyRequest::new("check the oven").with_uniqid(uniqid),
            timer: CancellationToken::new(),
        }
    }

    #[test]
    fn insert_hands_back_replaced_record() {
        let state = NagState::new();
        assert!(state.insert(record("a", 1, TerminalState::Remaining(3))).is_none());

        let old = state.insert(record("a", 2, TerminalState::Remaining(1))).unwrap();
        assert_eq!(old.generation, 1);
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn stale_generation_cannot_touch_new_record() {
        let state = NagState::new();
        state.insert(record("a", 2, TerminalState::Remaining(3)));

        assert!(state.request_for("a", 1).is_none());
        assert!(state.decrement("a", 1).is_none());
        assert!(state.remove_if("a", 1).is_none());
        assert!(state.contains("a"));

        assert_eq!(state.decrement("a", 2), Some(2));
        assert!(state.remove_if("a", 2).is_some());
    }

    #[test]
    fn take_expired_only_removes_passed_dates() {
        let state = NagState::new();
        let past = Until::at(t0() - time::Duration::minutes(1));
        let future = Until::at(t0() + time::Duration::minutes(1));
        state.insert(record("old", 1, TerminalState::Until(past)));
        state.insert(record("new", 2, TerminalState::Until(future)));
        state.insert(record("count", 3, TerminalState::Remaining(2)));

        let gone: Vec<_> = state.take_expired(t0()).into_iter().map(|r| r.uniqid).collect();
        assert_eq!(gone, vec!["old".to_string()]);
        assert_eq!(state.len(), 2);
    }

    fn mins(n: i64) -> OffsetDateTime {
        t0() + time::Duration::minutes(n)
    }

    #[test]
    fn window_blocks_until_its_end_then_reopens() {
        let state = NagState::new();

        let end = state.try_open_window("a", t0(), mins(10)).unwrap();
        assert_eq!(end, mins(10));

        let blocked = state.try_open_window("a", mins(9), mins(19)).unwrap_err();
        assert_eq!(blocked, end);

        assert_eq!(state.try_open_window("a", end, mins(20)), Ok(mins(20)));
        assert_eq!(state.window_count(), 1);
    }

    #[test]
    fn views_drop_closed_windows() {
        let state = NagState::new();
        state.try_open_window("a", t0(), mins(1)).unwrap();
        state.try_open_window("b", t0(), mins(30)).unwrap();

        let (_, windows) = state.views(mins(5));
        let ids: Vec<_> = windows.iter().map(|w| w.uniqid.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
        assert_eq!(state.window_count(), 1);
    }

    #[test]
    fn closed_windows_do_not_accumulate() {
        let state = NagState::new();
        for i in 0..1000 {
            state.try_open_window(&format!("msg-{i}"), t0(), mins(1)).unwrap();
        }
        assert_eq!(state.window_count(), 1000);

        state.views(t0() + time::Duration::days(1));
        assert_eq!(state.window_count(), 0);

        state.try_open_window("late", t0(), mins(1)).unwrap();
        assert!(state.take_expired(mins(2)).is_empty());
        assert_eq!(state.window_count(), 0);
        assert_eq!(state.prune_windows(mins(3)), 0);
    }
}

//! Size-bounded eviction of unpinned sessions.

use tracing::info;

use crate::chat::core::ids::SessionId;
use crate::chat::core::session::ChatSession;
use crate::chat::policy::ordering::sort_pinned_first;
use crate::chat::storage::codec::{list_size_bytes, session_size_bytes};

/// Outcome of an eviction pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Serialized list size before the pass, in bytes.
    pub before_bytes: usize,
    /// Serialized list size after the pass, in bytes.
    pub after_bytes: usize,
    /// Budget the pass aimed for.
    pub budget_bytes: usize,
    /// Ids of the evicted sessions.
    pub removed: Vec<SessionId>,
}

impl EvictionReport {
    /// Whether nothing was evicted.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty()
    }

    /// Whether the resulting list fits the budget.
    #[must_use]
    pub const fn within_budget(&self) -> bool {
        self.after_bytes <= self.budget_bytes
    }
}

/// Drop the oldest unpinned sessions until the list fits `budget_bytes`.
///
/// Pinned sessions and `protected` are always kept, even when they alone
/// exceed the budget. Unpinned sessions are admitted newest first (by
/// `created_at`) as long as they fit, so a smaller older session can still
/// be kept after a larger newer one was dropped. Survivors keep their
/// relative order, pinned first.
#[must_use]
pub fn evict_to_budget(
    sessions: Vec<ChatSession>,
    budget_bytes: usize,
    protected: Option<&SessionId>,
) -> (Vec<ChatSession>, EvictionReport) {
    let sizes: Vec<usize> = sessions.iter().map(session_size_bytes).collect();
    let before_bytes = list_size_bytes(sizes.iter().copied());

    if before_bytes <= budget_bytes {
        let report = EvictionReport {
            before_bytes,
            after_bytes: before_bytes,
            budget_bytes,
            removed: Vec::new(),
        };
        return (sessions, report);
    }

    let is_kept_unconditionally =
        |session: &ChatSession| session.is_pinned || protected.is_some_and(|id| &session.id == id);

    let mut keep = vec![false; sessions.len()];
    let mut kept_bytes = 0;
    let mut kept_count = 0;
    let mut candidates = Vec::new();
    for (index, session) in sessions.iter().enumerate() {
        if is_kept_unconditionally(session) {
            keep[index] = true;
            kept_bytes += sizes[index];
            kept_count += 1;
        } else {
            candidates.push(index);
        }
    }

    // Newest first; ties keep list order.
    candidates.sort_by(|&a, &b| sessions[b].created_at.cmp(&sessions[a].created_at));

    for index in candidates {
        let with_candidate = kept_bytes + sizes[index] + array_overhead(kept_count + 1);
        if with_candidate <= budget_bytes {
            keep[index] = true;
            kept_bytes += sizes[index];
            kept_count += 1;
        }
    }

    let mut removed = Vec::new();
    let mut survivors = Vec::with_capacity(kept_count);
    for (session, kept) in sessions.into_iter().zip(keep) {
        if kept {
            survivors.push(session);
        } else {
            removed.push(session.id);
        }
    }
    let survivors = sort_pinned_first(survivors);

    let after_bytes = kept_bytes + array_overhead(kept_count);
    info!(
        before_bytes,
        after_bytes,
        budget_bytes,
        removed = removed.len(),
        "evicted sessions to fit storage budget"
    );

    let report = EvictionReport {
        before_bytes,
        after_bytes,
        budget_bytes,
        removed,
    };
    (survivors, report)
}

/// Bytes of brackets and commas for an array of `count` elements.
const fn array_overhead(count: usize) -> usize {
    (2 + count.saturating_sub(1)) * 2
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::chat::core::message::NewMessage;
    use crate::chat::storage::codec::sessions_size_bytes;

    /// Session whose serialized size grows with `body_len`, created
    /// `age_minutes` ago.
    fn session(title: &str, body_len: usize, age_minutes: i64, pinned: bool) -> ChatSession {
        let mut s = ChatSession::new(SessionId::new(), title, None);
        if body_len > 0 {
            s.push_message(NewMessage::ai("x".repeat(body_len)), 30, "...");
        }
        s.created_at -= Duration::minutes(age_minutes);
        s.is_pinned = pinned;
        s
    }

    fn titles(sessions: &[ChatSession]) -> Vec<&str> {
        sessions.iter().map(|s| s.title.as_str()).collect()
    }

    #[test]
    fn test_under_budget_is_unchanged() {
        let list = vec![session("a", 10, 0, false), session("b", 10, 1, false)];
        let size = sessions_size_bytes(&list);
        let (kept, report) = evict_to_budget(list.clone(), size, None);
        assert_eq!(kept, list);
        assert!(report.is_noop());
        assert_eq!(report.after_bytes, size);
    }

    #[test]
    fn test_oldest_unpinned_go_first() {
        let list = vec![
            session("new", 100, 0, false),
            session("mid", 100, 1, false),
            session("old", 100, 2, false),
        ];
        let budget = sessions_size_bytes(&list[..2]);
        let old_id = list[2].id.clone();

        let (kept, report) = evict_to_budget(list, budget, None);
        assert_eq!(titles(&kept), ["new", "mid"]);
        assert_eq!(report.removed, vec![old_id]);
        assert_eq!(report.after_bytes, sessions_size_bytes(&kept));
        assert!(report.within_budget());
    }

    #[test]
    fn test_pinned_are_never_evicted() {
        let list = vec![
            session("pinned-old", 400, 10, true),
            session("new", 100, 0, false),
            session("old", 100, 5, false),
        ];
        let budget = sessions_size_bytes(&list[..1]);

        let (kept, report) = evict_to_budget(list, budget, None);
        assert_eq!(titles(&kept), ["pinned-old"]);
        assert_eq!(report.removed.len(), 2);
        assert!(report.within_budget());
    }

    #[test]
    fn test_pinned_alone_over_budget_keeps_pins() {
        let list = vec![session("p", 400, 0, true), session("u", 10, 0, false)];
        let (kept, report) = evict_to_budget(list, 10, None);
        assert_eq!(titles(&kept), ["p"]);
        assert!(!report.within_budget());
    }

    #[test]
    fn test_smaller_older_session_still_fits() {
        let list = vec![
            session("small-new", 10, 0, false),
            session("huge-mid", 2000, 1, false),
            session("small-old", 10, 2, false),
        ];
        let budget = sessions_size_bytes(&[list[0].clone(), list[2].clone()]);

        let (kept, report) = evict_to_budget(list, budget, None);
        assert_eq!(titles(&kept), ["small-new", "small-old"]);
        assert_eq!(report.removed.len(), 1);
    }

    #[test]
    fn test_protected_session_survives() {
        let list = vec![
            session("promoted", 500, 0, false),
            session("older", 10, 3, false),
        ];
        let protected = list[0].id.clone();
        let budget = sessions_size_bytes(&list[..1]);

        let (kept, _) = evict_to_budget(list, budget, Some(&protected));
        assert_eq!(titles(&kept), ["promoted"]);
    }

    #[test]
    fn test_survivors_keep_relative_order() {
        let list = vec![
            session("p", 10, 9, true),
            session("c", 10, 1, false),
            session("a", 10, 0, false),
            session("b", 10, 2, false),
            session("gone", 500, 5, false),
        ];
        let expected = [list[0].clone(), list[1].clone(), list[2].clone(), list[3].clone()];
        let budget = sessions_size_bytes(&expected);

        let (kept, _) = evict_to_budget(list, budget, None);
        assert_eq!(titles(&kept), ["p", "c", "a", "b"]);
    }
}

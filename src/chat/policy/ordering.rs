//! Pinned-first ordering of the session list.
//!
//! Invariant kept by every function here: pinned sessions form a contiguous
//! prefix of the list. Within each partition the list is most recent first.

use crate::chat::core::ids::SessionId;
use crate::chat::core::session::ChatSession;

/// Stable partition: pinned sessions first, relative order preserved.
#[must_use]
pub fn sort_pinned_first(sessions: Vec<ChatSession>) -> Vec<ChatSession> {
    let (pinned, unpinned): (Vec<_>, Vec<_>) =
        sessions.into_iter().partition(|session| session.is_pinned);
    let mut ordered = pinned;
    ordered.extend(unpinned);
    ordered
}

/// Insert `session` as the first unpinned entry.
pub fn insert_after_pinned(sessions: &mut Vec<ChatSession>, session: ChatSession) {
    let index = pinned_count(sessions);
    sessions.insert(index, session);
}

/// Flip the pin flag of `id` and move it to the front of its new partition.
///
/// Returns the new pinned state, or `None` if the id is unknown.
pub fn toggle_pin(sessions: &mut Vec<ChatSession>, id: &SessionId) -> Option<bool> {
    let index = sessions.iter().position(|session| &session.id == id)?;
    let mut target = sessions.remove(index);
    target.is_pinned = !target.is_pinned;
    target.touch();

    let pinned = target.is_pinned;
    if pinned {
        sessions.insert(0, target);
    } else {
        insert_after_pinned(sessions, target);
    }
    Some(pinned)
}

/// Number of leading pinned sessions.
#[must_use]
pub fn pinned_count(sessions: &[ChatSession]) -> usize {
    sessions
        .iter()
        .take_while(|session| session.is_pinned)
        .count()
}

/// Whether every pinned session precedes every unpinned one.
#[must_use]
pub fn is_pinned_prefix(sessions: &[ChatSession]) -> bool {
    let prefix = pinned_count(sessions);
    sessions[prefix..].iter().all(|session| !session.is_pinned)
}

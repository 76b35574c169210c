//! Transcript reconciliation.
//!
//! The transcript is an ordered list of finalized [`Turn`]s plus at most one
//! pending turn per speaker. Pending turns carry a fixed sentinel id so the
//! streaming text can be shown in place and later swapped for the finalized
//! turn without disturbing reading order.

use serde::Serialize;
use uuid::Uuid;

/// Sentinel id of the user's in-progress utterance.
pub const PENDING_USER_ID: &str = "pending-user";

/// Sentinel id of the assistant's in-progress utterance.
pub const PENDING_ASSISTANT_ID: &str = "pending-assistant";

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Sentinel id of this speaker's pending turn.
    pub fn pending_id(self) -> &'static str {
        match self {
            Role::User => PENDING_USER_ID,
            Role::Assistant => PENDING_ASSISTANT_ID,
        }
    }

    /// Sentinel id of the other speaker's pending turn.
    pub fn other_pending_id(self) -> &'static str {
        match self {
            Role::User => PENDING_ASSISTANT_ID,
            Role::Assistant => PENDING_USER_ID,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One conversational message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Milliseconds since the Unix epoch at which the utterance began
    pub timestamp: u64,
}

impl Turn {
    /// A finalized turn with a fresh `<role>-<uuid>` id.
    pub fn finalized(role: Role, content: impl Into<String>, timestamp: u64) -> Self {
        Self::with_prefix(role.as_str(), role, content, timestamp)
    }

    /// A finalized turn whose id starts with `prefix`.
    pub fn with_prefix(
        prefix: &str,
        role: Role,
        content: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            id: format!("{prefix}-{}", Uuid::new_v4()),
            role,
            content: content.into(),
            timestamp,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.id == PENDING_USER_ID || self.id == PENDING_ASSISTANT_ID
    }
}

/// Ordered conversation turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.turns.iter().position(|t| t.id == id)
    }

    /// The speaker's pending turn, if one is live.
    pub fn pending(&self, role: Role) -> Option<&Turn> {
        self.position(role.pending_id()).map(|i| &self.turns[i])
    }

    /// Finalized turns only, in order.
    pub fn finalized(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|t| !t.is_pending())
    }

    /// Replace the pending turn's text in place, or create it.
    ///
    /// A new pending turn goes right after `insert_after` when that id is
    /// present, otherwise at the end.
    pub fn upsert_pending(
        &mut self,
        role: Role,
        content: &str,
        timestamp: u64,
        insert_after: Option<&str>,
    ) {
        let pending_id = role.pending_id();
        if let Some(index) = self.position(pending_id) {
            let turn = &mut self.turns[index];
            turn.content.clear();
            turn.content.push_str(content);
            turn.timestamp = timestamp;
            return;
        }

        let turn = Turn {
            id: pending_id.to_string(),
            role,
            content: content.to_string(),
            timestamp,
        };
        match insert_after.and_then(|id| self.position(id)) {
            Some(anchor) => self.turns.insert(anchor + 1, turn),
            None => self.turns.push(turn),
        }
    }

    /// Swap the speaker's pending turn for `turn`.
    ///
    /// When `keep_after` names a pending turn that currently sits before the
    /// replaced slot, it is moved to directly follow `turn`. Without a pending
    /// turn to replace, `turn` goes in front of `keep_after` when present,
    /// otherwise at the end.
    pub fn finalize_pending(&mut self, role: Role, turn: Turn, keep_after: Option<&str>) {
        let slot = self.position(role.pending_id());
        let other = keep_after.and_then(|id| self.position(id));

        match (slot, other) {
            (Some(slot), Some(other)) if other < slot => {
                self.turns[slot] = turn;
                let moved = self.turns.remove(other);
                // `slot` shifted left by one after the removal.
                self.turns.insert(slot, moved);
            }
            (Some(slot), _) => self.turns[slot] = turn,
            (None, Some(other)) => self.turns.insert(other, turn),
            (None, None) => self.turns.push(turn),
        }
    }

    /// Drop the speaker's pending turn without finalizing it.
    pub fn discard_pending(&mut self, role: Role) -> Option<Turn> {
        self.position(role.pending_id())
            .map(|index| self.turns.remove(index))
    }

    /// Append a finalized turn.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

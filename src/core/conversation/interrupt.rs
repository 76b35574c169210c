//! Tool-flow interrupt state machine.
//!
//! ```text
//! Normal -> Triggered -> Running -> ResultInjected -> AwaitingResume -> Normal
//! ```
//!
//! The controller only tracks state. The orchestrator performs the matching
//! transport calls (cancel, clear, inject, resume) and asks the controller
//! which generation's output is stale.

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::intent::Intent;

/// Characters that end a sentence for the deferred cut-off.
const SENTENCE_TERMINATORS: &[char] = &['。', '！', '？', '.', '!', '?'];

/// Where the tool flow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolPhase {
    #[default]
    Normal,
    Triggered,
    Running,
    ResultInjected,
    AwaitingResume,
}

/// How much of the triggering utterance stays audible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterruptDiscipline {
    /// Cut off as soon as the intent is recognised
    Immediate,
    /// Let the current sentence finish first
    #[default]
    Deferred,
}

impl FromStr for InterruptDiscipline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "immediate" => Ok(Self::Immediate),
            "deferred" => Ok(Self::Deferred),
            other => Err(format!("unknown interrupt discipline '{other}'")),
        }
    }
}

/// Tool flow bookkeeping for one session.
#[derive(Debug, Default)]
pub struct InterruptController {
    discipline: InterruptDiscipline,
    phase: ToolPhase,
    intent: Option<Intent>,
    trigger_response_id: Option<String>,
    cut_off: bool,
    cancelled: HashSet<String>,
}

impl InterruptController {
    pub fn new(discipline: InterruptDiscipline) -> Self {
        Self {
            discipline,
            ..Default::default()
        }
    }

    pub fn discipline(&self) -> InterruptDiscipline {
        self.discipline
    }

    pub fn phase(&self) -> ToolPhase {
        self.phase
    }

    /// The intent driving the current flow.
    pub fn intent(&self) -> Option<&Intent> {
        self.intent.as_ref()
    }

    /// New intents are only accepted in `Normal`.
    pub fn can_trigger(&self) -> bool {
        self.phase == ToolPhase::Normal
    }

    /// A lookup is outstanding.
    pub fn tool_in_flight(&self) -> bool {
        matches!(self.phase, ToolPhase::Triggered | ToolPhase::Running)
    }

    /// Whether the triggering utterance has been cut off yet.
    pub fn is_cut_off(&self) -> bool {
        self.cut_off
    }

    /// `Normal -> Triggered`. Returns `false` if a flow is already active.
    pub fn trigger(&mut self, intent: Intent, response_id: Option<String>) -> bool {
        if !self.can_trigger() {
            return false;
        }
        self.phase = ToolPhase::Triggered;
        self.intent = Some(intent);
        self.trigger_response_id = response_id;
        self.cut_off = false;
        true
    }

    /// `Triggered -> Running` once the lookup has been dispatched.
    pub fn dispatched(&mut self) {
        if self.phase == ToolPhase::Triggered {
            self.phase = ToolPhase::Running;
        }
    }

    /// Byte offset at which the triggering utterance should be cut, if now.
    ///
    /// `complete` is set when the utterance has ended or the lookup has
    /// returned; either forces a cut at the end of what was said.
    pub fn cut_point(&self, text: &str, complete: bool) -> Option<usize> {
        if self.cut_off || !self.tool_in_flight() {
            return None;
        }
        let span_end = self.intent.map(|i| i.span_end.min(text.len()))?;

        match self.discipline {
            InterruptDiscipline::Immediate => Some(span_end),
            InterruptDiscipline::Deferred => sentence_end(text, span_end)
                .or(complete.then_some(text.len())),
        }
    }

    /// Record a cut-off; the triggering generation becomes stale.
    pub fn mark_cut_off(&mut self) {
        self.cut_off = true;
        if let Some(id) = self.trigger_response_id.take() {
            self.cancelled.insert(id);
        }
    }

    /// Mark any generation's output as stale.
    pub fn mark_cancelled(&mut self, response_id: impl Into<String>) {
        self.cancelled.insert(response_id.into());
    }

    /// Output tagged with a cancelled generation id must be dropped.
    pub fn is_stale(&self, response_id: Option<&str>) -> bool {
        response_id.is_some_and(|id| self.cancelled.contains(id))
    }

    /// A generation has ended. Returns whether it had been cancelled, and
    /// forgets it since no further output can carry its id.
    pub fn finish_response(&mut self, response_id: Option<&str>) -> bool {
        let Some(id) = response_id else {
            return false;
        };
        if self.trigger_response_id.as_deref() == Some(id) {
            self.trigger_response_id = None;
        }
        self.cancelled.remove(id)
    }

    /// `Running -> ResultInjected`.
    pub fn result_injected(&mut self) -> bool {
        if self.phase != ToolPhase::Running {
            return false;
        }
        self.phase = ToolPhase::ResultInjected;
        true
    }

    /// `ResultInjected -> AwaitingResume` after the resume was requested.
    pub fn resume_requested(&mut self) {
        if self.phase == ToolPhase::ResultInjected {
            self.phase = ToolPhase::AwaitingResume;
        }
    }

    /// `AwaitingResume -> Normal` when a fresh generation has started.
    pub fn confirm_resume(&mut self, response_id: Option<&str>) -> bool {
        if self.phase != ToolPhase::AwaitingResume || self.is_stale(response_id) {
            return false;
        }
        self.phase = ToolPhase::Normal;
        self.intent = None;
        self.cut_off = false;
        true
    }

    /// Abandon the current flow without resetting stale-generation tracking.
    pub fn abandon(&mut self) {
        self.phase = ToolPhase::Normal;
        self.intent = None;
        self.trigger_response_id = None;
        self.cut_off = false;
    }

    /// Forget everything, including cancelled generations.
    pub fn reset(&mut self) {
        self.abandon();
        self.cancelled.clear();
    }
}

/// Byte offset just past the first sentence terminator at or after `from`.
pub fn sentence_end(text: &str, from: usize) -> Option<usize> {
    let tail = text.get(from..)?;
    tail.char_indices()
        .find(|(_, c)| SENTENCE_TERMINATORS.contains(c))
        .map(|(i, c)| from + i + c.len_utf8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::conversation::intent::IntentSource;
    use crate::core::conversation::time_expr::TimeOfDay;

    fn intent(span_end: usize) -> Intent {
        Intent {
            time: TimeOfDay::new(19, 0).unwrap(),
            source: IntentSource::TriggerPhrase,
            span_end,
        }
    }

    #[test]
    fn test_full_cycle() {
        let mut controller = InterruptController::new(InterruptDiscipline::Deferred);
        assert!(controller.can_trigger());

        assert!(controller.trigger(intent(3), Some("resp_1".to_string())));
        assert_eq!(controller.phase(), ToolPhase::Triggered);
        controller.dispatched();
        assert_eq!(controller.phase(), ToolPhase::Running);
        assert!(controller.tool_in_flight());

        controller.mark_cut_off();
        assert!(controller.is_stale(Some("resp_1")));

        assert!(controller.result_injected());
        controller.resume_requested();
        assert_eq!(controller.phase(), ToolPhase::AwaitingResume);
        assert!(!controller.tool_in_flight());

        assert!(!controller.confirm_resume(Some("resp_1")));
        assert!(controller.confirm_resume(Some("resp_2")));
        assert_eq!(controller.phase(), ToolPhase::Normal);
    }

    #[test]
    fn test_trigger_is_not_reentrant() {
        let mut controller = InterruptController::default();
        assert!(controller.trigger(intent(0), None));
        assert!(!controller.trigger(intent(5), None));
        assert_eq!(controller.intent().map(|i| i.span_end), Some(0));
    }

    #[test]
    fn test_deferred_cut_point_waits_for_sentence_end() {
        let mut controller = InterruptController::new(InterruptDiscipline::Deferred);
        let text = "我查一下晚上7點";
        controller.trigger(intent(text.len()), None);
        controller.dispatched();

        assert_eq!(controller.cut_point(text, false), None);

        let longer = "我查一下晚上7點的空位。接下來";
        let cut = controller.cut_point(longer, false).unwrap();
        assert_eq!(&longer[..cut], "我查一下晚上7點的空位。");

        assert_eq!(controller.cut_point(text, true), Some(text.len()));
    }

    #[test]
    fn test_immediate_cut_point() {
        let mut controller = InterruptController::new(InterruptDiscipline::Immediate);
        controller.trigger(intent(4), None);
        assert_eq!(controller.cut_point("abcdefg", false), Some(4));

        controller.mark_cut_off();
        assert_eq!(controller.cut_point("abcdefg.", true), None);
    }

    #[test]
    fn test_abandon_keeps_stale_ids() {
        let mut controller = InterruptController::default();
        controller.trigger(intent(0), Some("resp_1".to_string()));
        controller.mark_cut_off();
        controller.abandon();
        assert!(controller.can_trigger());
        assert!(controller.is_stale(Some("resp_1")));

        controller.reset();
        assert!(!controller.is_stale(Some("resp_1")));
    }

    #[test]
    fn test_finished_responses_are_forgotten() {
        let mut controller = InterruptController::default();
        controller.trigger(intent(0), Some("resp_1".to_string()));
        controller.mark_cut_off();
        controller.mark_cancelled("resp_2");

        assert!(controller.finish_response(Some("resp_1")));
        assert!(!controller.is_stale(Some("resp_1")));
        assert!(controller.is_stale(Some("resp_2")));
        assert!(!controller.finish_response(Some("resp_3")));
        assert!(!controller.finish_response(None));

        assert!(controller.finish_response(Some("resp_2")));
        assert!(controller.cancelled.is_empty());
    }

    #[test]
    fn test_cut_after_trigger_finished_records_nothing() {
        let mut controller = InterruptController::default();
        controller.trigger(intent(0), Some("resp_1".to_string()));
        controller.dispatched();
        assert!(!controller.finish_response(Some("resp_1")));

        controller.mark_cut_off();
        assert!(controller.is_cut_off());
        assert!(controller.cancelled.is_empty());
    }

    #[test]
    fn test_sentence_end() {
        assert_eq!(sentence_end("Sure. Next", 0), Some(5));
        assert_eq!(sentence_end("好的！", 0), Some("好的！".len()));
        assert_eq!(sentence_end("no end", 0), None);
        assert_eq!(sentence_end("abc", 10), None);
    }

    #[test]
    fn test_discipline_from_str() {
        assert_eq!(
            "Immediate".parse::<InterruptDiscipline>(),
            Ok(InterruptDiscipline::Immediate)
        );
        assert!("later".parse::<InterruptDiscipline>().is_err());
    }
}

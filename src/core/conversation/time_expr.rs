//! Natural-language time-of-day extraction.
//!
//! Recognises the phrasings the assistant uses when announcing a lookup, in
//! Chinese and English. Patterns are tried in a fixed order and the first
//! one that yields a valid time wins:
//!
//! 1. noon (`中午`, `noon`)
//! 2. qualified hour (`早上9點`, `下午3點半`, `晚上7點15分`, `下午3:30`)
//! 3. 12-hour clock (`9am`, `7:30 PM`)
//! 4. 24-hour clock (`19:30`)
//! 5. hour and a half (`12點半`)
//! 6. hour and minutes (`3點15分`)
//! 7. bare hour (`7點`)
//!
//! On partial text a match that touches the end of the input and could still
//! grow into a different time (`7點` → `7點半`, `9:30` → `9:30pm`) is held
//! back until more text arrives.

use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Serialize, Serializer};

/// A wall-clock time, minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// `None` unless `hour < 24` and `minute < 60`.
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Parse a strict `H:MM` / `HH:MM` string.
    pub fn parse_hhmm(s: &str) -> Option<Self> {
        let (h, m) = s.trim().split_once(':')?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return None;
        }
        Self::new(h.parse().ok()?, m.parse().ok()?)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Where a time expression was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeMatch {
    pub time: TimeOfDay,
    /// Byte offset of the first matched character
    pub start: usize,
    /// Byte offset just past the match
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    Noon,
    Qualified,
    Meridiem,
    Clock,
    HourHalf,
    HourMinute,
    BareHour,
}

fn compile_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid time regex {pattern:?}: {err}"))
}

static PATTERNS: LazyLock<Vec<(Pattern, Regex)>> = LazyLock::new(|| {
    vec![
        (Pattern::Noon, compile_regex(r"(?i)中午|\bnoon\b")),
        (
            Pattern::Qualified,
            compile_regex(
                r"(早上|上午|凌晨|清晨|中午|下午|晚上|傍晚|夜裡|夜里)\s*([0-9]{1,2})(?:\s*[點点時时]\s*(?:(半)|([0-9]{1,2})\s*(分)?)?|[:：]([0-9]{2}))",
            ),
        ),
        (
            Pattern::Meridiem,
            compile_regex(r"(?i)([0-9]{1,2})(?:[:：]([0-9]{2}))?\s*([ap])\.?\s*m\.?"),
        ),
        (Pattern::Clock, compile_regex(r"([0-9]{1,2})[:：]([0-9]{2})")),
        (Pattern::HourHalf, compile_regex(r"([0-9]{1,2})\s*[點点時时]\s*半")),
        (
            Pattern::HourMinute,
            compile_regex(r"([0-9]{1,2})\s*[點点時时]\s*([0-9]{1,2})\s*(分)?"),
        ),
        (Pattern::BareHour, compile_regex(r"([0-9]{1,2})\s*[點点時时][鐘钟]?")),
    ]
});

/// Find the first time expression in `text`.
///
/// `is_final` says whether `text` is a complete utterance. Never fails: text
/// without a recognisable time yields `None`.
pub fn extract_time(text: &str, is_final: bool) -> Option<TimeMatch> {
    for (pattern, regex) in PATTERNS.iter() {
        for caps in regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let tail = &text[whole.end()..];
            if !follow_ok(*pattern, tail) {
                continue;
            }
            let Some(time) = interpret(*pattern, &caps) else {
                continue;
            };
            if !is_final && tail.is_empty() && could_extend(whole.as_str()) {
                return None;
            }
            return Some(TimeMatch {
                time,
                start: whole.start(),
                end: whole.end(),
            });
        }
    }
    None
}

/// Reject matches that are really the prefix of a more specific phrasing.
fn follow_ok(pattern: Pattern, tail: &str) -> bool {
    let next = tail.trim_start().chars().next();
    match pattern {
        // 中午1點 is an afternoon hour, not noon.
        Pattern::Noon => !matches!(next, Some(c) if c.is_ascii_digit()),
        Pattern::BareHour => !matches!(next, Some(c) if c == '半' || c == '分' || c.is_ascii_digit()),
        _ => true,
    }
}

fn could_extend(matched: &str) -> bool {
    matched.chars().last().is_some_and(|c| {
        c.is_ascii_digit() || matches!(c, '點' | '点' | '時' | '时')
    }) || matched.ends_with("中午")
}

fn number(caps: &Captures<'_>, index: usize) -> Option<u8> {
    caps.get(index).and_then(|m| m.as_str().parse().ok())
}

fn interpret(pattern: Pattern, caps: &Captures<'_>) -> Option<TimeOfDay> {
    match pattern {
        Pattern::Noon => TimeOfDay::new(12, 0),
        Pattern::Qualified => {
            let qualifier = caps.get(1)?.as_str();
            let raw = number(caps, 2)?;
            let hour = match qualifier {
                "早上" | "上午" | "凌晨" | "清晨" => {
                    if raw == 12 {
                        0
                    } else {
                        raw
                    }
                }
                _ if raw < 12 => raw + 12,
                _ => raw,
            };
            let minute = if caps.get(3).is_some() {
                30
            } else {
                number(caps, 4).or_else(|| number(caps, 6)).unwrap_or(0)
            };
            TimeOfDay::new(hour, minute)
        }
        Pattern::Meridiem => {
            let raw = number(caps, 1)?;
            if raw == 0 || raw > 12 {
                return None;
            }
            let minute = number(caps, 2).unwrap_or(0);
            let pm = caps.get(3)?.as_str().eq_ignore_ascii_case("p");
            let hour = match (pm, raw) {
                (false, 12) => 0,
                (true, h) if h < 12 => h + 12,
                (_, h) => h,
            };
            TimeOfDay::new(hour, minute)
        }
        Pattern::Clock => TimeOfDay::new(number(caps, 1)?, number(caps, 2)?),
        Pattern::HourHalf => TimeOfDay::new(number(caps, 1)?, 30),
        Pattern::HourMinute => TimeOfDay::new(number(caps, 1)?, number(caps, 2)?),
        Pattern::BareHour => TimeOfDay::new(number(caps, 1)?, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn final_time(text: &str) -> Option<String> {
        extract_time(text, true).map(|m| m.time.to_string())
    }

    #[test]
    fn test_reference_phrases() {
        assert_eq!(final_time("查一下12點半").as_deref(), Some("12:30"));
        assert_eq!(final_time("查一下下午3點").as_deref(), Some("15:00"));
        assert_eq!(final_time("查一下中午").as_deref(), Some("12:00"));
        assert_eq!(final_time("查一下9am").as_deref(), Some("09:00"));
        assert_eq!(final_time("查一下"), None);
    }

    #[test]
    fn test_qualified_hours() {
        assert_eq!(final_time("早上12點").as_deref(), Some("00:00"));
        assert_eq!(final_time("上午9點半").as_deref(), Some("09:30"));
        assert_eq!(final_time("晚上7點15分").as_deref(), Some("19:15"));
        assert_eq!(final_time("傍晚6:45").as_deref(), Some("18:45"));
        assert_eq!(final_time("下午12點").as_deref(), Some("12:00"));
        assert_eq!(final_time("中午1點").as_deref(), Some("13:00"));
    }

    #[test]
    fn test_meridiem() {
        assert_eq!(final_time("let me check 7pm").as_deref(), Some("19:00"));
        assert_eq!(final_time("around 7:30 P.M.").as_deref(), Some("19:30"));
        assert_eq!(final_time("12AM please").as_deref(), Some("00:00"));
        assert_eq!(final_time("12 pm").as_deref(), Some("12:00"));
        assert_eq!(final_time("13pm"), None);
    }

    #[test]
    fn test_clock_and_plain_hours() {
        assert_eq!(final_time("19:30 的位子").as_deref(), Some("19:30"));
        assert_eq!(final_time("3點15分").as_deref(), Some("03:15"));
        assert_eq!(final_time("3點15").as_deref(), Some("03:15"));
        assert_eq!(final_time("7點的空位").as_deref(), Some("07:00"));
        assert_eq!(final_time("8點鐘").as_deref(), Some("08:00"));
    }

    #[test]
    fn test_invalid_values_fall_through() {
        // 25:00 is not a time; the bare-hour-free text then has nothing else.
        assert_eq!(final_time("25:00"), None);
        // Invalid clock reading falls through to a later pattern.
        assert_eq!(final_time("99:99 或 8點").as_deref(), Some("08:00"));
        assert_eq!(final_time("no time here, sorry"), None);
    }

    #[test]
    fn test_noon_english() {
        assert_eq!(final_time("let me check noon").as_deref(), Some("12:00"));
        assert_eq!(final_time("Noon works.").as_deref(), Some("12:00"));
    }

    #[test]
    fn test_afternoon_is_not_noon() {
        assert_eq!(
            final_time("let me check 3pm this afternoon.").as_deref(),
            Some("15:00")
        );
        assert_eq!(
            final_time("let me check this afternoon at 3pm.").as_deref(),
            Some("15:00")
        );
        assert_eq!(final_time("sometime this afternoon"), None);
    }

    #[test]
    fn test_partial_text_waits_for_completion() {
        assert_eq!(extract_time("查一下晚上7點", false), None);
        assert_eq!(extract_time("查一下12點", false), None);
        assert_eq!(extract_time("查一下9:30", false), None);
        assert_eq!(extract_time("查一下中午", false), None);

        let m = extract_time("查一下晚上7點的", false).unwrap();
        assert_eq!(m.time.to_string(), "19:00");
        assert_eq!(&"查一下晚上7點的"[m.start..m.end], "晚上7點");

        assert_eq!(
            extract_time("查一下12點半", false).map(|m| m.time.to_string()).as_deref(),
            Some("12:30")
        );
    }

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(TimeOfDay::parse_hhmm("7:05"), TimeOfDay::new(7, 5));
        assert_eq!(TimeOfDay::parse_hhmm(" 19:00 "), TimeOfDay::new(19, 0));
        assert_eq!(TimeOfDay::parse_hhmm("24:00"), None);
        assert_eq!(TimeOfDay::parse_hhmm("7pm"), None);
        assert_eq!(TimeOfDay::parse_hhmm("7:5"), None);
    }
}

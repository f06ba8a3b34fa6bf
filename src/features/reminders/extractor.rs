//! Temporal-phrase extraction from free-form text
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.2.0: Weekday and numeric-date rules
//! - 1.1.0: English phrases alongside German
//! - 1.0.0: Relative offsets and day words
//!
//! Finds the leftmost German or English time reference in a message,
//! resolves it forward-looking against a reference instant, and returns
//! the remaining text as the reminder instruction. Resolution happens in
//! local time; the returned due instant is UTC.

use chrono::{
    DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc,
    Weekday,
};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Default clock time for phrases that only name a day or date
const DEFAULT_HOUR: u32 = 12;
/// Clock time for "tonight" / "heute abend"
const EVENING_HOUR: u32 = 20;

/// A recognized time reference and the residual instruction text
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub due_at: DateTime<Utc>,
    pub reminder_text: String,
}

#[derive(Debug, Clone, Copy)]
enum RuleKind {
    /// "in 10 minuten", "in an hour", "in 2 days"
    Relative,
    /// "morgen um 9", "tomorrow at 5pm", "tonight"
    DayWord,
    /// "am montag um 18 uhr", "on friday"
    WeekdayName,
    /// "24.12.", "am 24.12.2025 um 18 uhr"
    CalendarDate,
    /// "um 17 uhr", "at 5pm", "at 17:30"
    ClockTime,
}

struct Rule {
    pattern: Regex,
    kind: RuleKind,
}

fn rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        // The clock-time tail is shared by several rules: "um 9", "at 17:30",
        // "um 18 uhr", "at 5pm".
        let clock = r"(\d{1,2})(?:[:.](\d{2}))?(?:\s*(uhr|am|pm)\b)?";
        vec![
            Rule {
                pattern: Regex::new(
                    r"(?i)\bin\s+(\d{1,3}|einer|einem|einen|eine|ein|an|a|one)\s+(minuten|minutes|minute|min|stunden|stunde|std|hours|hour|tagen|tage|tag|days|day|wochen|woche|weeks|week)\b",
                )
                .expect("relative rule"),
                kind: RuleKind::Relative,
            },
            Rule {
                pattern: Regex::new(&format!(
                    r"(?i)\b(übermorgen|uebermorgen|tomorrow|morgen|heute\s+abend|tonight|heute|today)\b(?:\s+(?:um|at)\s+{clock})?"
                ))
                .expect("day-word rule"),
                kind: RuleKind::DayWord,
            },
            Rule {
                pattern: Regex::new(&format!(
                    r"(?i)\b(?:(?:am|on|next|nächsten|naechsten)\s+)?(montag|monday|dienstag|tuesday|mittwoch|wednesday|donnerstag|thursday|freitag|friday|samstag|sonnabend|saturday|sonntag|sunday)\b(?:\s+(?:um|at)\s+{clock})?"
                ))
                .expect("weekday rule"),
                kind: RuleKind::WeekdayName,
            },
            Rule {
                pattern: Regex::new(&format!(
                    r"(?i)\b(?:(?:am|on)\s+)?(\d{{1,2}})\.(\d{{1,2}})\.(\d{{4}})?(?:\s+(?:um|at)\s+{clock})?"
                ))
                .expect("calendar rule"),
                kind: RuleKind::CalendarDate,
            },
            Rule {
                pattern: Regex::new(&format!(r"(?i)\b(?:um|at)\s+{clock}"))
                    .expect("clock rule"),
                kind: RuleKind::ClockTime,
            },
        ]
    })
}

/// Extract the leftmost time reference from `text`
///
/// Returns `None` when no rule matches or the leftmost matches cannot be
/// resolved to a valid instant; callers treat that as "not a reminder".
pub fn extract(text: &str, reference: DateTime<Utc>) -> Option<Extraction> {
    if text.trim().is_empty() {
        return None;
    }

    let reference_local = reference.with_timezone(&Local);

    let mut candidates: Vec<(usize, usize, RuleKind, Captures)> = Vec::new();
    for rule in rules() {
        for caps in rule.pattern.captures_iter(text) {
            let whole = caps.get(0).map(|m| (m.start(), m.end()));
            if let Some((start, end)) = whole {
                candidates.push((start, end, rule.kind, caps));
            }
        }
    }

    // Leftmost phrase is authoritative; on a shared start the longer
    // match wins. Candidates that fail to resolve fall through to the next.
    candidates.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    for (start, end, kind, caps) in candidates {
        if let Some(due_local) = resolve(kind, &caps, reference_local) {
            return Some(Extraction {
                due_at: due_local.with_timezone(&Utc),
                reminder_text: residual_text(text, start, end),
            });
        }
    }
    None
}

fn resolve(
    kind: RuleKind,
    caps: &Captures,
    reference: DateTime<Local>,
) -> Option<DateTime<Local>> {
    match kind {
        RuleKind::Relative => resolve_relative(caps, reference),
        RuleKind::DayWord => resolve_day_word(caps, reference),
        RuleKind::WeekdayName => resolve_weekday(caps, reference),
        RuleKind::CalendarDate => resolve_calendar(caps, reference),
        RuleKind::ClockTime => {
            let (hour, minute) = clock_from(caps, 1)?;
            let candidate = at_time(reference.date_naive(), hour, minute)?;
            bump_until_future(candidate, reference, Duration::days(1))
        }
    }
}

fn resolve_relative(caps: &Captures, reference: DateTime<Local>) -> Option<DateTime<Local>> {
    let amount_str = caps.get(1)?.as_str().to_lowercase();
    let amount: i64 = match amount_str.as_str() {
        "einer" | "einem" | "einen" | "eine" | "ein" | "an" | "a" | "one" => 1,
        digits => digits.parse().ok()?,
    };

    let unit = caps.get(2)?.as_str().to_lowercase();
    let offset = if unit.starts_with("min") {
        Duration::minutes(amount)
    } else if unit.starts_with("stunde") || unit.starts_with("hour") || unit == "std" {
        Duration::hours(amount)
    } else if unit.starts_with("tag") || unit.starts_with("day") {
        Duration::days(amount)
    } else if unit.starts_with("woche") || unit.starts_with("week") {
        Duration::weeks(amount)
    } else {
        return None;
    };

    Some(reference + offset)
}

fn resolve_day_word(caps: &Captures, reference: DateTime<Local>) -> Option<DateTime<Local>> {
    let word = caps.get(1)?.as_str().to_lowercase();
    let word = word.split_whitespace().collect::<Vec<_>>().join(" ");

    let (day_offset, evening) = match word.as_str() {
        "übermorgen" | "uebermorgen" => (2, false),
        "morgen" | "tomorrow" => (1, false),
        "tonight" | "heute abend" => (0, true),
        "heute" | "today" => (0, false),
        _ => return None,
    };

    let (hour, minute) = match clock_from(caps, 2) {
        Some(clock) => clock,
        None => (if evening { EVENING_HOUR } else { DEFAULT_HOUR }, 0),
    };

    let date = reference.date_naive() + Duration::days(day_offset);
    let candidate = at_time(date, hour, minute)?;
    bump_until_future(candidate, reference, Duration::days(1))
}

fn resolve_weekday(caps: &Captures, reference: DateTime<Local>) -> Option<DateTime<Local>> {
    let target = match caps.get(1)?.as_str().to_lowercase().as_str() {
        "montag" | "monday" => Weekday::Mon,
        "dienstag" | "tuesday" => Weekday::Tue,
        "mittwoch" | "wednesday" => Weekday::Wed,
        "donnerstag" | "thursday" => Weekday::Thu,
        "freitag" | "friday" => Weekday::Fri,
        "samstag" | "sonnabend" | "saturday" => Weekday::Sat,
        "sonntag" | "sunday" => Weekday::Sun,
        _ => return None,
    };

    let (hour, minute) = clock_from(caps, 2).unwrap_or((DEFAULT_HOUR, 0));

    let today = reference.date_naive();
    let ahead = (target.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    let candidate = at_time(today + Duration::days(ahead), hour, minute)?;
    bump_until_future(candidate, reference, Duration::weeks(1))
}

fn resolve_calendar(caps: &Captures, reference: DateTime<Local>) -> Option<DateTime<Local>> {
    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    if !(1..=31).contains(&day) || !(1..=12).contains(&month) {
        return None;
    }

    let explicit_year: Option<i32> = match caps.get(3) {
        Some(year) => Some(year.as_str().parse().ok()?),
        None => None,
    };
    let (hour, minute) = clock_from(caps, 4).unwrap_or((DEFAULT_HOUR, 0));

    let year = explicit_year.unwrap_or_else(|| reference.year());
    let candidate = at_time(NaiveDate::from_ymd_opt(year, month, day)?, hour, minute)?;

    // An explicit year is taken literally even when in the past; a bare
    // day.month rolls into the next year instead.
    if explicit_year.is_none() && candidate <= reference {
        return at_time(NaiveDate::from_ymd_opt(year + 1, month, day)?, hour, minute);
    }
    Some(candidate)
}

/// Read the shared clock-time capture group starting at `first_index`
/// (hour, minute, am/pm/uhr suffix). `None` when no hour was given.
fn clock_from(caps: &Captures, first_index: usize) -> Option<(u32, u32)> {
    let hour: u32 = caps.get(first_index)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(first_index + 1) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    let suffix = caps
        .get(first_index + 2)
        .map(|s| s.as_str().to_lowercase());

    let hour = match suffix.as_deref() {
        Some("pm") if hour < 12 => hour + 12,
        Some("am") if hour == 12 => 0,
        Some("pm") | Some("am") if hour > 12 => return None,
        _ => hour,
    };

    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

fn at_time(date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Local>> {
    let naive: NaiveDateTime = date.and_hms_opt(hour, minute, 0)?;
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        // DST fold: take the earlier instant
        LocalResult::Ambiguous(first, _) => Some(first),
        LocalResult::None => None,
    }
}

/// Push a candidate forward by `period` until it lies after the reference
fn bump_until_future(
    candidate: DateTime<Local>,
    reference: DateTime<Local>,
    period: Duration,
) -> Option<DateTime<Local>> {
    let mut due = candidate;
    while due <= reference {
        due += period;
    }
    Some(due)
}

/// Remove the matched phrase and collapse the seam to a single space;
/// an empty residue falls back to the whole trimmed text.
fn residual_text(text: &str, start: usize, end: usize) -> String {
    let before = text[..start].trim_end();
    let after = text[end..].trim_start();

    let joined = if before.is_empty() {
        after.to_string()
    } else if after.is_empty() {
        before.to_string()
    } else {
        format!("{before} {after}")
    };

    if joined.is_empty() {
        text.trim().to_string()
    } else {
        joined
    }
}

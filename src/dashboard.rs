//! Dashboard metrics derived from an optimized report document.
//!
//! One page is built today (`overview`). Fields that need data the report does
//! not carry (purchases, tickets, leads...) are always present as `null` so the
//! front-end sees a stable schema.

use crate::optimizer::SENDER_AGENT;
use crate::timestamps::parse_timestamp;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Hours (UTC) from this one on are after hours.
pub const AFTER_HOURS_START: u32 = 19;
/// Hours (UTC) before this one are after hours.
///
/// Set so that 08:59 counts as after hours. The older rule and the glossary
/// put the end at 08:00 (`hour < 8`); confirm with the business owner before
/// changing either edge.
pub const AFTER_HOURS_END: u32 = 9;

/// Age distribution in fixed buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRanges {
    #[serde(rename = "0-17")]
    pub up_to_17: u64,
    #[serde(rename = "18-24")]
    pub from_18_to_24: u64,
    #[serde(rename = "25-34")]
    pub from_25_to_34: u64,
    #[serde(rename = "35-44")]
    pub from_35_to_44: u64,
    #[serde(rename = "45-54")]
    pub from_45_to_54: u64,
    #[serde(rename = "55+")]
    pub from_55: u64,
}

impl AgeRanges {
    pub fn record(&mut self, age: i32) {
        let bucket = match age {
            i32::MIN..=17 => &mut self.up_to_17,
            18..=24 => &mut self.from_18_to_24,
            25..=34 => &mut self.from_25_to_34,
            35..=44 => &mut self.from_35_to_44,
            45..=54 => &mut self.from_45_to_54,
            _ => &mut self.from_55,
        };
        *bucket += 1;
    }
}

/// Metrics for the overview page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverviewMetrics {
    pub total_conversations: u64,
    /// Messages sent by the AI agent.
    pub agent_messages: u64,
    /// Two-letter state code -> conversations.
    pub state_distribution: BTreeMap<String, u64>,
    pub age_ranges: AgeRanges,
    pub under_18: u64,
    pub under_18_percent: f64,
    pub after_hours_count: u64,
    pub after_hours_percent: f64,
    /// `HH:00` (UTC) -> conversations.
    pub conversations_by_hour: BTreeMap<String, u64>,
    /// `YYYY-MM-DD` -> conversations.
    pub daily_volume: BTreeMap<String, u64>,
    pub cohort_by_day: BTreeMap<String, u64>,

    // Need sources outside the report; always null.
    pub confirmed_purchases: Option<u64>,
    pub average_ticket: Option<f64>,
    pub qualified_leads: Option<u64>,
    pub appointments: Option<u64>,
    pub conversion_rate: Option<f64>,
    pub agent_effectiveness: Option<f64>,
}

/// Dashboard response, one key per page.
///
/// `previous_period` is absent when no comparison was requested and `null` when the
/// comparison was requested but could not be produced (see `previous_period_error`).
#[derive(Debug, Clone, Serialize)]
pub struct DashboardPayload {
    pub overview: OverviewMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_period: Option<Option<PeriodComparison>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_period_error: Option<String>,
}

impl DashboardPayload {
    pub fn with_comparison(mut self, comparison: PeriodComparison) -> Self {
        self.previous_period = Some(Some(comparison));
        self.previous_period_error = None;
        self
    }

    pub fn with_comparison_unavailable(mut self, reason: impl Into<String>) -> Self {
        self.previous_period = Some(None);
        self.previous_period_error = Some(reason.into());
        self
    }
}

/// Change of one numeric metric between two periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub current: f64,
    pub previous: f64,
    pub absolute_change: f64,
    /// `None` when the previous value is zero and the current one is not.
    pub percent_change: Option<f64>,
}

/// Month-over-month view attached to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodComparison {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub previous: OverviewMetrics,
    pub deltas: BTreeMap<String, MetricDelta>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percent_of(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(part as f64 / total as f64 * 100.0)
}

fn data_collect(record: &Map<String, Value>) -> Option<&Map<String, Value>> {
    record.get("dataCollectFromUser").and_then(Value::as_object)
}

/// Agent messages for one record: `botMessageCount` when it is a non-negative
/// number, otherwise the `"agent"` entries in `Full Conversation`.
pub fn agent_message_count(record: &Map<String, Value>) -> u64 {
    if let Some(count) = record
        .get("botMessageCount")
        .and_then(Value::as_f64)
        .filter(|c| *c >= 0.0)
    {
        return count as u64;
    }
    record
        .get("Full Conversation")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter(|e| e.get("sender").and_then(Value::as_str) == Some(SENDER_AGENT))
                .count() as u64
        })
        .unwrap_or(0)
}

/// Uppercased two-letter state, `None` when missing or blank.
pub fn state_code(record: &Map<String, Value>) -> Option<String> {
    let state = data_collect(record)?.get("state")?.as_str()?.trim();
    if state.is_empty() {
        return None;
    }
    Some(state.to_uppercase().chars().take(2).collect())
}

/// Whole years between `birth` and `today`; `None` for birth dates in the future.
pub fn age_in_years(birth: DateTime<Utc>, today: NaiveDate) -> Option<i32> {
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    (years >= 0).then_some(years)
}

pub fn is_after_hours(at: DateTime<Utc>) -> bool {
    let hour = at.hour();
    hour >= AFTER_HOURS_START || hour < AFTER_HOURS_END
}

/// Builds the overview page using today's UTC date for ages.
pub fn build_overview(optimized: &Value) -> OverviewMetrics {
    build_overview_at(optimized, Utc::now().date_naive())
}

/// Builds the overview page with an explicit "today".
pub fn build_overview_at(optimized: &Value, today: NaiveDate) -> OverviewMetrics {
    let records: &[Value] = optimized
        .get("data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let total = records.len() as u64;

    let mut agent_messages: u64 = 0;
    let mut state_distribution = BTreeMap::new();
    let mut age_ranges = AgeRanges::default();
    let mut under_18 = 0;
    let mut after_hours_count = 0;
    let mut conversations_by_hour = BTreeMap::new();
    let mut daily_volume = BTreeMap::new();
    let mut cohort_by_day = BTreeMap::new();

    for record in records.iter().filter_map(Value::as_object) {
        agent_messages = agent_messages.saturating_add(agent_message_count(record));

        if let Some(state) = state_code(record) {
            *state_distribution.entry(state).or_insert(0) += 1;
        }

        let age = data_collect(record)
            .and_then(|dc| dc.get("birthDate"))
            .and_then(parse_timestamp)
            .and_then(|birth| age_in_years(birth, today));
        if let Some(age) = age {
            age_ranges.record(age);
            if age < 18 {
                under_18 += 1;
            }
        }

        if let Some(created) = record.get("createdAt").and_then(parse_timestamp) {
            if is_after_hours(created) {
                after_hours_count += 1;
            }
            let day = created.format("%Y-%m-%d").to_string();
            *conversations_by_hour
                .entry(created.format("%H:00").to_string())
                .or_insert(0) += 1;
            *daily_volume.entry(day.clone()).or_insert(0) += 1;
            *cohort_by_day.entry(day).or_insert(0) += 1;
        }
    }

    OverviewMetrics {
        total_conversations: total,
        agent_messages,
        state_distribution,
        age_ranges,
        under_18,
        under_18_percent: percent_of(under_18, total),
        after_hours_count,
        after_hours_percent: percent_of(after_hours_count, total),
        conversations_by_hour,
        daily_volume,
        cohort_by_day,
        confirmed_purchases: None,
        average_ticket: None,
        qualified_leads: None,
        appointments: None,
        conversion_rate: None,
        agent_effectiveness: None,
    }
}

pub fn build_dashboard_payload(optimized: &Value) -> DashboardPayload {
    DashboardPayload {
        overview: build_overview(optimized),
        previous_period: None,
        previous_period_error: None,
    }
}

fn delta(current: f64, previous: f64) -> MetricDelta {
    let percent_change = if previous == 0.0 {
        (current == 0.0).then_some(0.0)
    } else {
        Some(round2((current - previous) / previous * 100.0))
    };
    MetricDelta {
        current,
        previous,
        absolute_change: round2(current - previous),
        percent_change,
    }
}

/// Absolute and percentage change for every numeric overview field.
pub fn compare_periods(
    current: &OverviewMetrics,
    previous: &OverviewMetrics,
) -> BTreeMap<String, MetricDelta> {
    let pairs = [
        (
            "total_conversations",
            current.total_conversations as f64,
            previous.total_conversations as f64,
        ),
        (
            "agent_messages",
            current.agent_messages as f64,
            previous.agent_messages as f64,
        ),
        ("under_18", current.under_18 as f64, previous.under_18 as f64),
        (
            "under_18_percent",
            current.under_18_percent,
            previous.under_18_percent,
        ),
        (
            "after_hours_count",
            current.after_hours_count as f64,
            previous.after_hours_count as f64,
        ),
        (
            "after_hours_percent",
            current.after_hours_percent,
            previous.after_hours_percent,
        ),
    ];
    pairs
        .into_iter()
        .map(|(name, cur, prev)| (name.to_string(), delta(cur, prev)))
        .collect()
}

/// First and last day of the calendar month before the one containing `anchor`.
pub fn previous_month_range(anchor: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first_of_month = anchor.with_day(1).unwrap_or(anchor);
    let last_of_previous = first_of_month - Duration::days(1);
    let first_of_previous = last_of_previous.with_day(1).unwrap_or(last_of_previous);
    (first_of_previous, last_of_previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_birthday_today_counts() {
        let birth = Utc.with_ymd_and_hms(2008, 10, 16, 0, 0, 0).unwrap();
        assert_eq!(age_in_years(birth, date(2026, 10, 16)), Some(18));
        assert_eq!(age_in_years(birth, date(2026, 10, 15)), Some(17));
    }

    #[test]
    fn test_future_birth_is_invalid() {
        let birth = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(age_in_years(birth, date(2026, 10, 16)), None);
    }

    #[test]
    fn test_after_hours_boundaries() {
        let at = |h, m| Utc.with_ymd_and_hms(2026, 1, 1, h, m, 0).unwrap();
        assert!(is_after_hours(at(19, 0)));
        assert!(is_after_hours(at(23, 59)));
        assert!(is_after_hours(at(0, 0)));
        assert!(is_after_hours(at(8, 59)));
        assert!(!is_after_hours(at(9, 0)));
        assert!(!is_after_hours(at(18, 59)));
    }

    #[test]
    fn test_bot_message_count_preferred() {
        let record = json!({
            "botMessageCount": 7,
            "Full Conversation": [{"sender": "agent"}]
        });
        assert_eq!(agent_message_count(record.as_object().unwrap()), 7);

        let record = json!({
            "botMessageCount": -1,
            "Full Conversation": [{"sender": "agent"}, {"sender": "user"}, {"sender": "agent"}]
        });
        assert_eq!(agent_message_count(record.as_object().unwrap()), 2);
    }

    #[test]
    fn test_huge_bot_message_counts_saturate() {
        let doc = json!({"data": [
            {"botMessageCount": 1e300},
            {"botMessageCount": 5},
            {"botMessageCount": 1e300}
        ]});
        let overview = build_overview_at(&doc, date(2026, 1, 1));
        assert_eq!(overview.agent_messages, u64::MAX);
        assert_eq!(overview.total_conversations, 3);
    }

    #[test]
    fn test_state_code_normalized() {
        let record = json!({"dataCollectFromUser": {"state": " sao paulo "}});
        assert_eq!(state_code(record.as_object().unwrap()), Some("SA".to_string()));
        let blank = json!({"dataCollectFromUser": {"state": "   "}});
        assert_eq!(state_code(blank.as_object().unwrap()), None);
    }

    #[test]
    fn test_previous_month_range_wraps_year() {
        assert_eq!(
            previous_month_range(date(2026, 1, 14)),
            (date(2025, 12, 1), date(2025, 12, 31))
        );
        assert_eq!(
            previous_month_range(date(2024, 3, 31)),
            (date(2024, 2, 1), date(2024, 2, 29))
        );
    }

    #[test]
    fn test_delta_zero_previous() {
        assert_eq!(delta(0.0, 0.0).percent_change, Some(0.0));
        assert_eq!(delta(5.0, 0.0).percent_change, None);
        assert_eq!(delta(15.0, 10.0).percent_change, Some(50.0));
        assert_eq!(delta(15.0, 10.0).absolute_change, 5.0);
    }
}

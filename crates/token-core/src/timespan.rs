//! Durations in rule configuration.
//!
//! Accepts `[-][d.]hh:mm:ss[.fffffff]` strings or a plain integer number of
//! seconds, either as a JSON number or a string. Use with
//! `#[serde(with = "crate::timespan")]`.

use chrono::Duration;
use serde::{Deserialize, Deserializer, Serializer};

/// Parse a time span
pub fn parse(text: &str) -> Option<Duration> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(seconds) = text.parse::<i64>() {
        return Duration::try_seconds(seconds);
    }

    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let (head, tail) = text.split_once(':')?;
    let (days, hours) = match head.split_once('.') {
        Some((days, hours)) => (parse_number(days)?, parse_number(hours)?),
        None => (0, parse_number(head)?),
    };

    let (minutes, seconds) = tail.split_once(':')?;
    let minutes = parse_number(minutes)?;
    let (seconds, nanos) = match seconds.split_once('.') {
        Some((whole, fraction)) => (parse_number(whole)?, parse_fraction(fraction)?),
        None => (parse_number(seconds)?, 0),
    };

    if hours > 23 || minutes > 59 || seconds > 59 {
        return None;
    }

    let total = Duration::try_days(days)?
        .checked_add(&Duration::try_hours(hours)?)?
        .checked_add(&Duration::try_minutes(minutes)?)?
        .checked_add(&Duration::try_seconds(seconds)?)?
        .checked_add(&Duration::nanoseconds(nanos))?;

    Some(if negative { -total } else { total })
}

fn parse_number(text: &str) -> Option<i64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn parse_fraction(text: &str) -> Option<i64> {
    if text.is_empty() || text.len() > 9 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits: i64 = text.parse().ok()?;
    Some(digits * 10_i64.pow(9 - text.len() as u32))
}

/// Render as `[-][d.]hh:mm:ss[.fffffffff]`
pub fn format(duration: &Duration) -> String {
    let sign = if *duration < Duration::zero() { "-" } else { "" };
    let duration = duration.abs();

    let days = duration.num_days();
    let hours = duration.num_hours() % 24;
    let minutes = duration.num_minutes() % 60;
    let seconds = duration.num_seconds() % 60;
    let nanos = (duration - Duration::seconds(duration.num_seconds()))
        .num_nanoseconds()
        .unwrap_or(0);

    let mut text = String::from(sign);
    if days > 0 {
        text.push_str(&format!("{days}."));
    }
    text.push_str(&format!("{hours:02}:{minutes:02}:{seconds:02}"));
    if nanos > 0 {
        let fraction = format!("{nanos:09}");
        text.push('.');
        text.push_str(fraction.trim_end_matches('0'));
    }
    text
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Repr {
    Seconds(i64),
    Text(String),
}

pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(duration))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    match Repr::deserialize(deserializer)? {
        Repr::Seconds(seconds) => Duration::try_seconds(seconds)
            .ok_or_else(|| serde::de::Error::custom("duration out of range")),
        Repr::Text(text) => parse(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time span '{text}'"))),
    }
}

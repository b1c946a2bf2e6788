//! Text rendering of the study history.

use chrono::{DateTime, Local, TimeZone, Utc};
use clap::ValueEnum;
use shared::history::HistoryEntry;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortMode {
    /// Most recently looked up first
    #[default]
    Recent,
    /// Most often looked up first
    Repeat,
}

/// Order for display. Ties under [`SortMode::Repeat`] keep recency order.
pub fn sort_entries(entries: &mut [HistoryEntry], mode: SortMode) {
    if mode == SortMode::Repeat {
        entries.sort_by(|a, b| b.repeat_count.cmp(&a.repeat_count));
    }
}

pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - then).num_seconds().max(0) / 60;
    let hours = minutes / 60;
    let days = hours / 24;
    if days > 0 {
        format!("{}天前", days)
    } else if hours > 0 {
        format!("{}小时前", hours)
    } else if minutes > 0 {
        format!("{}分钟前", minutes)
    } else {
        "刚刚".to_string()
    }
}

/// `YYYY-MM-DD HH:MM` in the given zone.
pub fn format_timestamp<Tz: TimeZone>(at: DateTime<Utc>, zone: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.with_timezone(zone).format("%Y-%m-%d %H:%M").to_string()
}

const COLD: (u8, u8, u8) = (52, 152, 219);
const HOT: (u8, u8, u8) = (231, 76, 60);
const HOTTEST_COUNT: u32 = 10;

/// Badge colour for a repeat count: blue at one lookup, red from ten on.
pub fn count_color(count: u32) -> (u8, u8, u8) {
    if count <= 1 {
        return COLD;
    }
    let t = f64::from(count.min(HOTTEST_COUNT) - 1) / f64::from(HOTTEST_COUNT - 1);
    let mix = |from: u8, to: u8| (f64::from(from) + t * (f64::from(to) - f64::from(from))).round() as u8;
    (mix(COLD.0, HOT.0), mix(COLD.1, HOT.1), mix(COLD.2, HOT.2))
}

pub struct HistoryView {
    pub sort: SortMode,
    pub advanced: bool,
    pub color: bool,
}

impl HistoryView {
    pub fn render(&self, entries: &[HistoryEntry], now: DateTime<Utc>) -> String {
        if entries.is_empty() {
            return "暂无历史记录\n".to_string();
        }
        let mut sorted = entries.to_vec();
        sort_entries(&mut sorted, self.sort);

        let mut out = String::new();
        for entry in &sorted {
            self.render_entry(&mut out, entry, now);
        }
        out
    }

    fn render_entry(&self, out: &mut String, entry: &HistoryEntry, now: DateTime<Utc>) {
        let _ = write!(out, "{}: ", entry.key);
        let repeated = self.advanced && entry.repeat_count > 1;
        if repeated {
            let badge = format!("{}次", entry.repeat_count);
            if self.color {
                let (r, g, b) = count_color(entry.repeat_count);
                let _ = write!(out, "\x1b[48;2;{};{};{}m\x1b[97m {} \x1b[0m", r, g, b, badge);
            } else {
                let _ = write!(out, "[{}]", badge);
            }
        }
        let _ = writeln!(out, " - {}", time_ago(entry.last_seen_at, now));
        let _ = writeln!(out, "    {}", entry.last_value);

        if repeated {
            if entry.occurrences.is_empty() {
                let _ = writeln!(out, "      没有详细记录");
            }
            for at in &entry.occurrences {
                let _ = writeln!(out, "      · {}", format_timestamp(*at, &Local));
            }
        }
    }
}

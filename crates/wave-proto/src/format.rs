//! Display formatting for durations, prices and play times.

use chrono::{DateTime, Utc};

/// Elapsed-time label, `M:SS`.  Minutes are not wrapped into hours: previews
/// are 30 seconds long and full tracks rarely reach an hour.
pub fn clock(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return "0:00".to_string();
    }
    let s = secs as u64;
    format!("{}:{:02}", s / 60, s % 60)
}

/// Track length from catalog milliseconds; empty when unknown.
pub fn duration_ms(ms: Option<u64>) -> String {
    match ms {
        Some(ms) if ms > 0 => clock((ms / 1000) as f64),
        _ => String::new(),
    }
}

pub fn price(price: Option<f64>) -> String {
    match price {
        Some(p) if p > 0.0 => format!("${:.2}", p),
        _ => "Free".to_string(),
    }
}

/// Relative play time for the history pane.
pub fn time_ago(played_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let mins = (now - played_at).num_minutes();
    if mins < 1 {
        return "Just now".to_string();
    }
    if mins < 60 {
        return format!("{}m ago", mins);
    }
    let hrs = mins / 60;
    if hrs < 24 {
        return format!("{}h ago", hrs);
    }
    let days = hrs / 24;
    if days < 7 {
        return format!("{}d ago", days);
    }
    if days < 30 {
        return format!("{}w ago", days / 7);
    }
    played_at
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d")
        .to_string()
}

/// Upper-case the first letter of every word ("hip hop" -> "Hip Hop").
pub fn capitalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start && c.is_alphanumeric() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !(c.is_alphanumeric() || c == '_');
    }
    out
}

/// "N song(s) played" caption for the history pane.
pub fn songs_played(count: usize) -> String {
    format!("{} song{} played", count, if count == 1 { "" } else { "s" })
}

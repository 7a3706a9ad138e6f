use chrono::{DateTime, Datelike, Local, Timelike, Utc};
use std::env;

/// Expands `%placeholder%` tokens in an archive name.
///
/// Unknown tokens are left as they are. Extension normalization happens
/// later, in the library.
pub fn expand_archive_name(template: &str) -> String {
    expand_at(template, Utc::now(), Local::now())
}

fn expand_at(template: &str, now_utc: DateTime<Utc>, now_local: DateTime<Local>) -> String {
    let pwd = env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "unknown".into());

    // Longer tokens first so %datetime% is not eaten by %date%
    let replacements = vec![
        ("%datetime%", now_utc.format("%Y-%m-%d_%H-%M-%S").to_string()),
        ("%ltime%", now_local.format("%Y-%m-%d_%H-%M-%S").to_string()),
        ("%date%", now_utc.format("%Y-%m-%d").to_string()),
        ("%time%", now_utc.format("%H-%M-%S").to_string()),
        ("%unix%", format!("{}", now_utc.timestamp())),
        ("%yyyy%", format!("{:04}", now_utc.year())),
        ("%mm%", format!("{:02}", now_utc.month())),
        ("%dd%", format!("{:02}", now_utc.day())),
        ("%hh%", format!("{:02}", now_utc.hour())),
        ("%pwd%", pwd),
    ];

    let mut name = template.to_string();
    for (pattern, value) in replacements {
        name = replace_case_insensitive(&name, pattern, &value);
    }
    name
}

/// Helper for case-insensitive substring replacement
fn replace_case_insensitive(s: &str, pattern: &str, replacement: &str) -> String {
    let lower_s = s.to_ascii_lowercase();
    let lower_pattern = pattern.to_ascii_lowercase();

    let mut result = String::new();
    let mut last_end = 0;

    while let Some(pos) = lower_s[last_end..].find(&lower_pattern) {
        let abs_pos = last_end + pos;
        result.push_str(&s[last_end..abs_pos]);
        result.push_str(replacement);
        last_end = abs_pos + pattern.len();
    }

    result.push_str(&s[last_end..]);
    result
}

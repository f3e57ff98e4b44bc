// src/formatting.rs

use chrono::{Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::panic::Location;

/// Controls which header fields precede the message of an emitted line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatFlags {
    /// Local date, `2026/10/19`.
    pub date: bool,
    /// Local time, `01:23:23`.
    pub time: bool,
    /// Microsecond resolution for the time. Implies `time`.
    pub microseconds: bool,
    /// Use UTC rather than the local time zone.
    pub utc: bool,
    /// Caller file base name and line, `main.rs:23`. Overrides `long_file`.
    pub short_file: bool,
    /// Full caller file path and line, `src/bin/main.rs:23`.
    pub long_file: bool,
}

impl FormatFlags {
    /// Date, time and short caller location.
    pub const fn standard() -> Self {
        Self {
            date: true,
            time: true,
            microseconds: false,
            utc: false,
            short_file: true,
            long_file: false,
        }
    }

    /// No header at all, only tag and message.
    pub const fn none() -> Self {
        Self {
            date: false,
            time: false,
            microseconds: false,
            utc: false,
            short_file: false,
            long_file: false,
        }
    }

    fn wants_clock(&self) -> bool {
        self.date || self.time || self.microseconds
    }

    fn now(&self) -> NaiveDateTime {
        if self.utc {
            Utc::now().naive_utc()
        } else {
            Local::now().naive_local()
        }
    }
}

impl Default for FormatFlags {
    fn default() -> Self {
        Self::standard()
    }
}

/// Renders the `[prefix][LEVEL]` tag for a severity label.
pub(crate) fn line_tag(prefix: &str, label: &str) -> String {
    format!("[{}][{}]", prefix, label)
}

/// Builds a complete output line, terminated by exactly one newline.
pub(crate) fn render_line(
    tag: &str,
    flags: &FormatFlags,
    location: &Location<'_>,
    message: &str,
) -> String {
    let now = if flags.wants_clock() {
        Some(flags.now())
    } else {
        None
    };
    render_line_at(tag, flags, now, location, message)
}

fn render_line_at(
    tag: &str,
    flags: &FormatFlags,
    now: Option<NaiveDateTime>,
    location: &Location<'_>,
    message: &str,
) -> String {
    let mut line = String::with_capacity(tag.len() + message.len() + 40);
    line.push_str(tag);
    // One space separates the tag from the header.
    line.push(' ');

    if let Some(now) = now {
        if flags.date {
            let _ = write!(line, "{} ", now.format("%Y/%m/%d"));
        }
        if flags.time || flags.microseconds {
            let pattern = if flags.microseconds {
                "%H:%M:%S%.6f "
            } else {
                "%H:%M:%S "
            };
            let _ = write!(line, "{}", now.format(pattern));
        }
    }

    if flags.short_file || flags.long_file {
        let file = if flags.short_file {
            short_file(location.file())
        } else {
            location.file()
        };
        let _ = write!(line, "{}:{}: ", file, location.line());
    }

    line.push_str(message);
    if !line.ends_with('\n') {
        line.push('\n');
    }
    line
}

fn short_file(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Joins operands with single spaces, the way `_ln` logging variants render them.
pub(crate) fn join_operands(items: &[&dyn fmt::Display]) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{}", item);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fixed_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 8)
            .unwrap()
            .and_hms_micro_opt(21, 3, 52, 123_456)
            .unwrap()
    }

    #[test]
    fn test_render_standard_header() {
        let location = Location::caller();
        let line = render_line_at(
            "[svc][INFO]",
            &FormatFlags::standard(),
            Some(fixed_time()),
            location,
            "hello",
        );

        let expected = format!(
            "[svc][INFO] 2025/07/08 21:03:52 formatting.rs:{}: hello\n",
            location.line()
        );
        assert_eq!(line, expected);
    }

    #[test]
    fn test_render_without_flags() {
        let line = render_line_at(
            "[svc][WARN]",
            &FormatFlags::none(),
            None,
            Location::caller(),
            "bare",
        );
        assert_eq!(line, "[svc][WARN] bare\n");
    }

    #[test]
    fn test_render_microseconds_and_long_file() {
        let flags = FormatFlags {
            microseconds: true,
            long_file: true,
            ..FormatFlags::none()
        };
        let location = Location::caller();
        let line = render_line_at("[x][DEBUG]", &flags, Some(fixed_time()), location, "m");

        let expected = format!(
            "[x][DEBUG] 21:03:52.123456 {}:{}: m\n",
            location.file(),
            location.line()
        );
        assert_eq!(line, expected);
    }

    #[test]
    fn test_trailing_newline_is_not_doubled() {
        let line = render_line_at(
            "[x][INFO]",
            &FormatFlags::none(),
            None,
            Location::caller(),
            "already terminated\n",
        );
        assert_eq!(line, "[x][INFO] already terminated\n");
    }

    #[test]
    fn test_short_file() {
        assert_eq!(short_file("src/notification/mod.rs"), "mod.rs");
        assert_eq!(short_file("C:\\proj\\main.rs"), "main.rs");
        assert_eq!(short_file("lib.rs"), "lib.rs");
    }

    #[test]
    fn test_join_operands() {
        assert_eq!(join_operands(&[&"disk", &93, &"% full"]), "disk 93 % full");
        assert_eq!(join_operands(&[]), "");
    }
}

//! Logger setup.

use anstyle::{AnsiColor, Style};
use env_logger::{Builder, Env, Target, WriteStyle};
use log::kv::Key;
use std::io::Write;

// ────────────────────────────────────────────────────────────────
// Logger Initialization
// ────────────────────────────────────────────────────────────────

const DURATION_WIDTH: usize = 10;

/// Format a `duration` key value as `"12.34 ms"`.
fn format_duration(raw: &str) -> String {
    if let Some(idx) = raw.find(|c: char| c.is_alphabetic()) {
        let (num, unit) = (&raw[..idx], &raw[idx..]);
        if let Ok(val) = num.parse::<f32>() {
            return format!("{:.2} {}", val, unit);
        }
    }
    raw.to_string()
}

/// Initialize the stderr logger. `RUST_LOG` overrides the default `info` level.
pub fn initialize_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let _ = Builder::from_env(Env::default().default_filter_or(default_level))
        .write_style(WriteStyle::Auto)
        .format(|buf, record| {
            let dim = Style::new().fg_color(Some(AnsiColor::BrightBlack.into()));
            let cyan = Style::new().fg_color(Some(AnsiColor::Cyan.into()));

            let level_style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "{dim}{}{dim:#} {level_style}{}{level_style:#} {dim}{}{dim:#}",
                buf.timestamp(),
                record.level(),
                record.target(),
            )?;

            let dur_raw = record
                .key_values()
                .get(Key::from("duration"))
                .map(|v| format_duration(&v.to_string()))
                .unwrap_or_default();
            let dur = if dur_raw.is_empty() {
                " ".repeat(DURATION_WIDTH)
            } else {
                format!("{cyan}{:>width$}{cyan:#}", dur_raw, width = DURATION_WIDTH)
            };

            let message = record.args().to_string();
            let mut lines = message.lines();
            if let Some(first_line) = lines.next() {
                writeln!(buf, "{} {}", dur, first_line)?;
            }
            let subsequent_indent = " ".repeat(DURATION_WIDTH + 1);
            for line in lines {
                writeln!(buf, "{}{}", subsequent_indent, line)?;
            }
            Ok(())
        })
        .target(Target::Stderr)
        .try_init();
}

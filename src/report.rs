//! Text, HTML and JSON rendering of scan results.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};

use stalescan_core::{MatchRecord, ScanResult};

const SECS_PER_DAY: f64 = 86_400.0;

/// Format size in human-readable form.
pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// `m:ss`, or `h:mm:ss` once the scan took an hour or more.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (hours, rem) = (total / 3600, total % 3600);
    let (minutes, secs) = (rem / 60, rem % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Calendar date in the local timezone.
pub fn format_date(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format("%Y-%m-%d").to_string()
}

fn age_days(record: &MatchRecord) -> String {
    format!("{:.0}", record.age.as_secs_f64() / SECS_PER_DAY)
}

fn criteria(result: &ScanResult) -> String {
    format!(
        "last touched before {} and size >= {}",
        format_date(result.cutoff()),
        format_size(result.config.min_size)
    )
}

fn summary(result: &ScanResult) -> String {
    format!(
        "Scanned {} directories, {} files in {}",
        result.stats.dirs_scanned,
        result.stats.files_scanned,
        format_elapsed(result.scan_duration)
    )
}

/// Write the plain text report.
pub fn render_text(result: &ScanResult, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{}", summary(result))?;
    writeln!(out, "Criteria: {} ({} basis)", criteria(result), result.config.time_basis)?;

    if result.matches.is_empty() {
        writeln!(out, "No directories matched the criteria.")?;
    } else {
        writeln!(
            out,
            "Flagged {} top-level directories ({} total):",
            result.matches.len(),
            format_size(result.total_match_size())
        )?;
        for record in &result.matches {
            write!(
                out,
                "- {} | {} | last touched {} ({} days ago)",
                record.path.display(),
                format_size(record.size),
                format_date(record.newest),
                age_days(record)
            )?;
            if record.incomplete {
                write!(out, " [incomplete]")?;
            }
            writeln!(out)?;
        }
    }

    let stats = &result.stats;
    if result.has_warnings() {
        writeln!(
            out,
            "Warnings: {} access errors. Showing {} sample(s).",
            stats.errors,
            result.warnings.len()
        )?;
        for warning in &result.warnings {
            writeln!(out, "  - {}: {}", warning.path.display(), warning.message)?;
        }
    }
    if stats.skipped_symlinks > 0 {
        writeln!(out, "Skipped symlinks: {}", stats.skipped_symlinks)?;
    }
    if stats.skipped_other_fs > 0 {
        writeln!(out, "Skipped other filesystems: {}", stats.skipped_other_fs)?;
    }
    if stats.skipped_cycles > 0 {
        writeln!(out, "Skipped symlink cycles: {}", stats.skipped_cycles)?;
    }
    if result.interrupted {
        writeln!(out, "Scan interrupted: results cover only what was read before the stop.")?;
    }

    Ok(())
}

/// Write the full result as pretty-printed JSON.
pub fn render_json(result: &ScanResult, out: &mut impl Write) -> serde_json::Result<()> {
    serde_json::to_writer_pretty(&mut *out, result)?;
    writeln!(out).map_err(serde_json::Error::io)
}

/// Escape text for use inside HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Build a self-contained HTML document.
pub fn render_html(result: &ScanResult) -> String {
    let rows = if result.matches.is_empty() {
        "      <tr><td colspan=\"4\">No matches</td></tr>\n".to_string()
    } else {
        result
            .matches
            .iter()
            .map(|record| {
                let path = record.path.display().to_string();
                format!(
                    "      <tr>\n        <td>{}{}</td>\n        <td>{}</td>\n        <td>{}</td>\n        <td>{}</td>\n      </tr>\n",
                    escape_html(&path),
                    if record.incomplete { " (incomplete)" } else { "" },
                    escape_html(&format_size(record.size)),
                    escape_html(&format_date(record.newest)),
                    age_days(record)
                )
            })
            .collect()
    };

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>stalescan report</title>
  <style>
    body {{ font-family: Arial, sans-serif; margin: 24px; }}
    h1 {{ margin-bottom: 8px; }}
    .meta {{ color: #555; margin-bottom: 16px; }}
    table {{ border-collapse: collapse; width: 100%; }}
    th, td {{ border: 1px solid #ccc; padding: 8px; text-align: left; }}
    th {{ background: #f6f6f6; }}
  </style>
</head>
<body>
  <h1>stalescan report</h1>
  <div class="meta">Root: {root}</div>
  <div class="meta">Generated {generated}</div>
  <div class="meta">Criteria: {criteria}</div>
  <div class="meta">{summary}</div>
  <h2>Flagged directories ({count})</h2>
  <table>
    <thead>
      <tr>
        <th>Path</th>
        <th>Size</th>
        <th>Last touched</th>
        <th>Age (days)</th>
      </tr>
    </thead>
    <tbody>
{rows}    </tbody>
  </table>
</body>
</html>
"#,
        root = escape_html(&result.root.path.display().to_string()),
        generated = escape_html(&format_date(result.reference_time)),
        criteria = escape_html(&criteria(result)),
        summary = escape_html(&summary(result)),
        count = result.matches.len(),
        rows = rows,
    )
}

/// Write the HTML report to `path`.
pub fn write_html(result: &ScanResult, path: &Path) -> io::Result<()> {
    fs::write(path, render_html(result))
}

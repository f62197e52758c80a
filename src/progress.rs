//! Batch evaluation progress reporting.
//!
//! Reports observable progress during `rfp evaluate` so users see which
//! prompt is being answered, its verdict, and how far the batch has come.
//! Progress is emitted on **stderr** so stdout stays parseable for scripts.

use std::io::Write;

use crate::verdict::Verdict;

/// A single progress event for a batch.
#[derive(Clone, Debug)]
pub enum EvalProgressEvent {
    /// Batch started with this many prompts.
    Started { total: usize },
    /// Prompt `n` of `total` answered.
    Answered {
        n: usize,
        total: usize,
        prompt: String,
        verdict: Verdict,
    },
    /// Prompt `n` failed and was skipped (keep-going mode only).
    Skipped {
        n: usize,
        total: usize,
        prompt: String,
        error: String,
    },
}

/// Reports batch progress. Implementations write to stderr (human or JSON).
pub trait EvalProgressReporter: Send + Sync {
    fn report(&self, event: EvalProgressEvent);
}

/// Human-friendly progress: `evaluate  [ 3 / 40]  7.50%  Yes  <prompt>`.
pub struct HumanProgress;

impl EvalProgressReporter for HumanProgress {
    fn report(&self, event: EvalProgressEvent) {
        let line = match &event {
            EvalProgressEvent::Started { total } => {
                format!("evaluate  {} prompts\n", format_number(*total))
            }
            EvalProgressEvent::Answered {
                n,
                total,
                prompt,
                verdict,
            } => format!(
                "evaluate  [{} / {}]  {:.2}%  {}  {}\n",
                format_number(*n),
                format_number(*total),
                percent(*n, *total),
                verdict,
                truncate(prompt, 60)
            ),
            EvalProgressEvent::Skipped {
                n,
                total,
                prompt,
                error,
            } => format!(
                "evaluate  [{} / {}]  skipped  {}  ({})\n",
                format_number(*n),
                format_number(*total),
                truncate(prompt, 60),
                error
            ),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// One JSON object per event, newline-delimited, on stderr.
pub struct JsonProgress;

impl EvalProgressReporter for JsonProgress {
    fn report(&self, event: EvalProgressEvent) {
        let obj = match &event {
            EvalProgressEvent::Started { total } => serde_json::json!({
                "event": "started",
                "total": total
            }),
            EvalProgressEvent::Answered {
                n,
                total,
                prompt,
                verdict,
            } => serde_json::json!({
                "event": "answered",
                "n": n,
                "total": total,
                "prompt": prompt,
                "verdict": verdict
            }),
            EvalProgressEvent::Skipped {
                n,
                total,
                prompt,
                error,
            } => serde_json::json!({
                "event": "skipped",
                "n": n,
                "total": total,
                "prompt": prompt,
                "error": error
            }),
        };
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", obj);
        let _ = err.flush();
    }
}

/// Discards every event.
pub struct NoProgress;

impl EvalProgressReporter for NoProgress {
    fn report(&self, _event: EvalProgressEvent) {}
}

fn percent(n: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        n as f64 / total as f64 * 100.0
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push('…');
        out
    }
}

fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Selected by `--progress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// `--progress auto`: human output on an interactive stderr, nothing otherwise.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn EvalProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(HumanProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_separated() {
        assert_eq!(format_number(7), "7");
        assert_eq!(format_number(12_000), "12,000");
        assert_eq!(format_number(4_500_321), "4,500,321");
    }

    #[test]
    fn percent_of_empty_batch() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(format!("{:.2}", percent(1, 3)), "33.33");
    }

    #[test]
    fn long_prompts_truncated() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 5), "abcde…");
    }
}

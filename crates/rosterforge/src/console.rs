//! Colorful console output for rebalancing runs.
//!
//! Provides a custom `tracing` layer that formats engine events with
//! colors. Enabled with the `console` feature.

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::sync::OnceLock;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static INIT: OnceLock<()> = OnceLock::new();

const DEFAULT_DIRECTIVE: &str = "rosterforge_solver=info";

/// Inner width of the summary box.
const BOX_WIDTH: usize = 58;

/// Initializes console output.
///
/// Safe to call multiple times - only the first call has effect. A global
/// subscriber installed elsewhere wins silently.
pub fn init() {
    INIT.get_or_init(|| {
        let mut filter = EnvFilter::from_default_env();
        if let Ok(directive) = DEFAULT_DIRECTIVE.parse::<Directive>() {
            filter = filter.add_directive(directive);
        }

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(RebalanceConsoleLayer)
            .try_init();
    });
}

/// A tracing layer that prints engine events with colors.
pub struct RebalanceConsoleLayer;

impl<S: Subscriber> Layer<S> for RebalanceConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let target = event.metadata().target();
        if !target.starts_with("rosterforge") {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let output = format_event(&visitor);
        if !output.is_empty() {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }
}

#[derive(Debug, Default)]
struct EventVisitor {
    event: Option<String>,
    id: Option<String>,
    reason: Option<String>,
    success: Option<bool>,
    workers: Option<u64>,
    days: Option<u64>,
    iteration: Option<u64>,
    iterations: Option<u64>,
    total: Option<u64>,
    general: Option<u64>,
    weekend: Option<u64>,
    best: Option<u64>,
    violations: Option<u64>,
    moves: Option<u64>,
    rollbacks: Option<u64>,
    duration_ms: Option<u64>,
    swaps: Option<u64>,
    max_before: Option<u64>,
    max_after: Option<u64>,
    score: Option<f64>,
}

fn unquote(s: &str) -> String {
    s.trim_matches('"').to_string()
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let s = format!("{:?}", value);
        match field.name() {
            "event" => self.event = Some(unquote(&s)),
            "id" => self.id = Some(unquote(&s)),
            "reason" => self.reason = Some(unquote(&s)),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "event" => self.event = Some(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            "reason" => self.reason = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "success" {
            self.success = Some(value);
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        let slot = match field.name() {
            "workers" => &mut self.workers,
            "days" => &mut self.days,
            "iteration" => &mut self.iteration,
            "iterations" => &mut self.iterations,
            "total" => &mut self.total,
            "general" => &mut self.general,
            "weekend" => &mut self.weekend,
            "best" => &mut self.best,
            "violations" => &mut self.violations,
            "moves" => &mut self.moves,
            "rollbacks" => &mut self.rollbacks,
            "duration_ms" => &mut self.duration_ms,
            "swaps" => &mut self.swaps,
            "max_before" => &mut self.max_before,
            "max_after" => &mut self.max_after,
            _ => return,
        };
        *slot = Some(value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_u64(field, value.max(0) as u64);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if field.name() == "score" {
            self.score = Some(value);
        }
    }
}

fn format_event(v: &EventVisitor) -> String {
    match v.event.as_deref().unwrap_or("") {
        "optimize_start" => format_optimize_start(v),
        "iteration" => format_iteration(v),
        "rollback" => format_rollback(v),
        "dead_end" => format_dead_end(v),
        "balance_end" => format_balance_end(v),
        "optimize_end" => format_optimize_end(v),
        _ => String::new(),
    }
}

fn format_optimize_start(v: &EventVisitor) -> String {
    format!(
        "{} {} {} workers ({}), days ({}), initial violations ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Rebalance]".bright_cyan(),
        count(v.workers).bright_yellow(),
        count(v.days).bright_yellow(),
        format_violations(v.general.zip(v.weekend).map(|(g, w)| g + w)),
    )
}

fn format_iteration(v: &EventVisitor) -> String {
    format!(
        "    {} Iteration {:>5} | violations {} | best {}",
        "->".bright_blue(),
        count(v.iteration).white(),
        format_violations(v.total),
        format_violations(v.best),
    )
}

fn format_rollback(v: &EventVisitor) -> String {
    let id = match v.id.as_deref() {
        Some(id) => id,
        None => return String::new(),
    };
    format!(
        "{} {} {} rolled back to {} (quality {})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Checkpoint]".bright_cyan(),
        id.white().bold(),
        format!("{:.1}", v.score.unwrap_or(0.0)).bright_magenta(),
    )
}

fn format_dead_end(v: &EventVisitor) -> String {
    format!(
        "{} {} {} dead end detected with {} violations",
        timestamp().bright_black(),
        "WARN".bright_yellow(),
        "[Checkpoint]".bright_cyan(),
        count(v.violations).bright_red(),
    )
}

fn format_balance_end(v: &EventVisitor) -> String {
    if v.swaps.is_none() {
        return String::new();
    }
    format!(
        "{} {} {} moves ({}), max deviation {} -> {}",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Balance]".bright_cyan(),
        count(v.swaps).bright_yellow(),
        count(v.max_before).white(),
        count(v.max_after).white().bold(),
    )
}

fn format_optimize_end(v: &EventVisitor) -> String {
    let success = v.success.unwrap_or(false);
    let reason = v.reason.as_deref().unwrap_or("Unknown");

    let mut output = format!(
        "{} {} {} Rebalancing ended ({}): time spent ({}), moves ({}), rollbacks ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Rebalance]".bright_cyan(),
        reason.white().bold(),
        format_duration_ms(v.duration_ms.unwrap_or(0)).yellow(),
        count(v.moves).bright_magenta().bold(),
        count(v.rollbacks).white(),
    );

    output.push_str("\n\n");
    output.push_str(&border('╔', '╗'));
    output.push('\n');

    let status_text = if success {
        "ALL WORKERS WITHIN TOLERANCE"
    } else {
        "TOLERANCE VIOLATIONS REMAIN"
    };
    let status_colored = if success {
        format!("  {}  ", status_text).bright_green().bold().to_string()
    } else {
        format!("  {}  ", status_text).bright_red().bold().to_string()
    };
    let status_padding = BOX_WIDTH - status_text.len() - 4;
    let left_pad = status_padding / 2;
    let right_pad = status_padding - left_pad;
    output.push_str(&format!(
        "{}{}{}{}{}",
        "║".bright_cyan(),
        " ".repeat(left_pad),
        status_colored,
        " ".repeat(right_pad),
        "║".bright_cyan()
    ));
    output.push('\n');

    output.push_str(&border('╠', '╣'));
    output.push('\n');

    for (label, value) in [
        ("Iterations:", count(v.iterations)),
        ("Violations:", count(v.violations)),
    ] {
        output.push_str(&format!(
            "{}  {:<18}{:>36}  {}",
            "║".bright_cyan(),
            label,
            value,
            "║".bright_cyan()
        ));
        output.push('\n');
    }

    output.push_str(&border('╚', '╝'));
    output.push('\n');

    output
}

/// A horizontal line of the summary box.
fn border(left: char, right: char) -> String {
    format!("{left}{}{right}", "═".repeat(BOX_WIDTH))
        .bright_cyan()
        .to_string()
}

fn count(value: Option<u64>) -> String {
    value.unwrap_or(0).to_formatted_string(&Locale::en)
}

fn format_violations(value: Option<u64>) -> String {
    match value {
        Some(0) => "0".bright_green().to_string(),
        Some(n) => n.to_formatted_string(&Locale::en).bright_red().to_string(),
        None => "N/A".white().to_string(),
    }
}

fn timestamp() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| {
            let secs = d.as_secs() % 100000;
            let millis = d.subsec_millis();
            format!("{:5}.{:03}", secs, millis)
        })
        .unwrap_or_else(|_| "    0.000".to_string())
}

fn format_duration_ms(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        let mins = ms / 60_000;
        let secs = (ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    }
}

use std::fmt::Display;
use std::io::IsTerminal;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use nu_ansi_term::{Color, Style};
use tpch_compare::inserts::InsertComparison;
use tpch_compare::provision::ParityReport;
use tpch_compare::timing::AlignedSeries;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum Theme {
    #[default]
    Auto,
    Light,
    Dark,
    Plain,
}

/// Human-facing progress output; diagnostics go through `tracing` instead.
pub struct Ui {
    palette: Palette,
    paint: bool,
    quiet: bool,
    spinner_style: ProgressStyle,
}

impl Ui {
    pub fn new(theme: Theme, quiet: bool) -> Self {
        let paint = theme != Theme::Plain && !quiet && std::io::stdout().is_terminal();
        let palette = match theme {
            Theme::Plain => Palette::plain(),
            Theme::Light => Palette::light(),
            Theme::Dark | Theme::Auto => Palette::dark(),
        };
        let spinner_style = ProgressStyle::with_template("{prefix} {spinner} {msg} {elapsed}")
            .map(|style| style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "))
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        Self {
            palette,
            paint,
            quiet,
            spinner_style,
        }
    }

    pub fn section<'a, I, V>(&self, title: &str, rows: I)
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Display,
    {
        let rows: Vec<(&str, String)> = rows
            .into_iter()
            .map(|(key, value)| (key, value.to_string()))
            .collect();
        if rows.is_empty() {
            return;
        }
        self.heading(title);
        let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (key, value) in rows {
            if self.paint {
                println!(
                    "  {} {}",
                    self.palette.key.paint(format!("{key:>width$}:")),
                    self.palette.value.paint(value)
                );
            } else {
                println!("  {key:>width$}: {value}");
            }
        }
    }

    /// Side-by-side per-query seconds with the faster engine marked.
    pub fn query_table(&self, series: &AlignedSeries) {
        let left = series.left();
        let right = series.right();
        self.heading(&format!("Query time ({} vs {})", left.engine, right.engine));
        let width = left.engine.len().max(right.engine.len());
        for (idx, label) in series.labels().iter().enumerate() {
            let a = left.samples[idx].seconds();
            let b = right.samples[idx].seconds();
            let faster = if a <= b { &left.engine } else { &right.engine };
            let ratio = a.max(b) / a.min(b).max(f64::EPSILON);
            let line = format!(
                "{label:>4}  {:>width$} {a:>9.3}s  {:>width$} {b:>9.3}s  {faster} {ratio:.1}x",
                left.engine, right.engine
            );
            self.bullet(&line);
        }
    }

    pub fn insert_summary(&self, comparison: &InsertComparison) {
        self.section(
            &format!("Insert time for {} records", comparison.requested),
            comparison.timings().map(|t| {
                (
                    t.engine.as_str(),
                    format!(
                        "{} statements in {}",
                        t.statements,
                        format_duration(t.elapsed)
                    ),
                )
            }),
        );
    }

    pub fn parity(&self, report: &ParityReport) {
        self.heading(&format!(
            "Row counts ({} / {})",
            report.source_engine, report.target_engine
        ));
        for count in &report.counts {
            let line = format!("{:<9} {:>12} {:>12}", count.relation.name(), count.source, count.target);
            if count.matches() {
                self.bullet(&line);
            } else {
                self.warn(&format!("{line}  mismatch"));
            }
        }
    }

    pub fn list<I>(&self, title: &str, entries: I)
    where
        I: IntoIterator<Item = String>,
    {
        let entries: Vec<String> = entries.into_iter().collect();
        if entries.is_empty() {
            return;
        }
        self.heading(title);
        for entry in entries {
            self.bullet(&entry);
        }
    }

    pub fn success(&self, message: &str) {
        self.line(SUCCESS_ICON, self.palette.success, message);
    }

    pub fn warn(&self, message: &str) {
        if self.quiet {
            eprintln!("{message}");
            return;
        }
        let prefix = if self.paint {
            self.palette.warn.paint(WARNING_ICON)
        } else {
            Style::new().paint(WARNING_ICON)
        };
        eprintln!("{prefix} {message}");
    }

    /// Starts a spinner that reports its elapsed time when finished or
    /// abandoned.
    pub fn task(&self, label: impl Into<String>) -> TaskGuard<'_> {
        let label = label.into();
        let pb = (!self.quiet).then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(self.spinner_style.clone());
            pb.set_prefix(if self.paint {
                self.palette.info.paint(PROGRESS_ICON).to_string()
            } else {
                PROGRESS_ICON.to_string()
            });
            pb.set_message(label.clone());
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        });
        TaskGuard {
            ui: self,
            label,
            start: Instant::now(),
            finished: false,
            pb,
        }
    }

    fn line(&self, icon: &str, style: Style, message: &str) {
        if self.quiet {
            println!("{message}");
        } else if self.paint {
            println!("{} {message}", style.paint(icon));
        } else {
            println!("{icon} {message}");
        }
    }

    fn bullet(&self, entry: &str) {
        if self.paint {
            println!("  {} {entry}", self.palette.bullet.paint("•"));
        } else {
            println!("  - {entry}");
        }
    }

    fn heading(&self, title: &str) {
        if self.quiet {
            println!("{title}");
        } else if self.paint {
            println!("{}", self.palette.heading.paint(format!("{HEADING_ICON} {title}")));
        } else {
            println!("{HEADING_ICON} {title}");
        }
    }
}

pub struct TaskGuard<'a> {
    ui: &'a Ui,
    label: String,
    start: Instant,
    finished: bool,
    pb: Option<ProgressBar>,
}

impl TaskGuard<'_> {
    pub fn finish(mut self) -> Duration {
        self.finished = true;
        let elapsed = self.start.elapsed();
        if let Some(pb) = self.pb.take() {
            pb.finish_and_clear();
        }
        self.ui
            .success(&format!("{} ({})", self.label, format_duration(elapsed)));
        elapsed
    }
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let message = format!(
            "{} failed after {}",
            self.label,
            format_duration(self.start.elapsed())
        );
        match self.pb.take() {
            Some(pb) => pb.abandon_with_message(message),
            None => self.ui.warn(&message),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs_f64() >= 1.0 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{:.0}ms", duration.as_secs_f64() * 1_000.0)
    }
}

#[derive(Clone, Copy)]
struct Palette {
    heading: Style,
    key: Style,
    value: Style,
    bullet: Style,
    info: Style,
    success: Style,
    warn: Style,
}

impl Palette {
    fn dark() -> Self {
        Self {
            heading: Style::new().fg(Color::Purple).bold(),
            key: Style::new().fg(Color::LightBlue).bold(),
            value: Style::new().fg(Color::White),
            bullet: Style::new().fg(Color::LightBlue),
            info: Style::new().fg(Color::LightCyan),
            success: Style::new().fg(Color::LightGreen).bold(),
            warn: Style::new().fg(Color::Yellow).bold(),
        }
    }

    fn light() -> Self {
        Self {
            heading: Style::new().fg(Color::Blue).bold(),
            key: Style::new().fg(Color::Black).bold(),
            value: Style::new().fg(Color::Black),
            bullet: Style::new().fg(Color::Blue),
            info: Style::new().fg(Color::Purple),
            success: Style::new().fg(Color::Green).bold(),
            warn: Style::new().fg(Color::Red).bold(),
        }
    }

    fn plain() -> Self {
        let none = Style::new();
        Self {
            heading: none,
            key: none,
            value: none,
            bullet: none,
            info: none,
            success: none,
            warn: none,
        }
    }
}

const HEADING_ICON: &str = "▸";
const SUCCESS_ICON: &str = "✔";
const WARNING_ICON: &str = "⚠";
const PROGRESS_ICON: &str = "▶";

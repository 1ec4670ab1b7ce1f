use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use tracing::info;

use crate::config::ReportSection;
use crate::error::{BenchError, Result};
use crate::inserts::InsertComparison;
use crate::timing::AlignedSeries;

const LEFT_COLOR: RGBColor = RGBColor(31, 119, 180);
const RIGHT_COLOR: RGBColor = RGBColor(255, 127, 14);
const FONT: &str = "sans-serif";
// Headroom beyond the longest bar for its value label.
const VALUE_MARGIN: f64 = 1.2;
const BAR: f64 = 0.4;

/// Pixel dimensions of a rendered chart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChartSize {
    #[allow(missing_docs)]
    pub width: u32,
    #[allow(missing_docs)]
    pub height: u32,
}

impl From<&ReportSection> for ChartSize {
    fn from(section: &ReportSection) -> Self {
        Self {
            width: section.width,
            height: section.height,
        }
    }
}

fn failed(path: &Path, err: impl Display) -> BenchError {
    BenchError::Render {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn prepare(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)
            .map_err(|err| BenchError::resource("create chart directory", dir, err)),
        _ => Ok(()),
    }
}

fn axis_max(largest: f64) -> f64 {
    if largest > 0.0 {
        largest * VALUE_MARGIN
    } else {
        1.0
    }
}

/// Category name for an integer tick; blank between ticks and out of range.
fn category(labels: &[&str], value: f64) -> String {
    let idx = value.round();
    if (value - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    labels
        .get(idx as usize)
        .map(|label| label.to_string())
        .unwrap_or_default()
}

/// Grouped horizontal bars: one group per query, one bar per engine, each
/// bar labelled with its seconds.
pub fn render_query_chart(path: &Path, series: &AlignedSeries, size: ChartSize) -> Result<PathBuf> {
    if series.is_empty() {
        return Err(failed(path, "no query samples to plot"));
    }
    prepare(path)?;
    let labels: Vec<&str> = series.labels().iter().map(String::as_str).collect();
    let groups = labels.len();
    let x_max = axis_max(series.max_seconds());

    let root = SVGBackend::new(path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE).map_err(|err| failed(path, err))?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Query time", (FONT, 22))
        .margin(16)
        .x_label_area_size(40)
        .y_label_area_size(56)
        .build_cartesian_2d(0f64..x_max, -0.5f64..(groups as f64 - 0.5))
        .map_err(|err| failed(path, err))?;
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(groups)
        .y_label_formatter(&|y: &f64| category(&labels, *y))
        .x_desc("seconds")
        .draw()
        .map_err(|err| failed(path, err))?;

    for (offset, engine, color) in [
        (-BAR, series.left(), LEFT_COLOR),
        (0.0, series.right(), RIGHT_COLOR),
    ] {
        let seconds = engine.seconds();
        chart
            .draw_series(seconds.iter().enumerate().map(|(i, secs)| {
                let low = i as f64 + offset;
                Rectangle::new([(0.0, low), (*secs, low + BAR)], color.filled())
            }))
            .map_err(|err| failed(path, err))?
            .label(engine.engine.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
        chart
            .draw_series(seconds.iter().enumerate().map(|(i, secs)| {
                Text::new(
                    format!("{secs:.2}"),
                    (*secs, i as f64 + offset + BAR / 2.0),
                    (FONT, 12).into_font(),
                )
            }))
            .map_err(|err| failed(path, err))?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(|err| failed(path, err))?;
    root.present().map_err(|err| failed(path, err))?;
    info!(path = %path.display(), queries = groups, "report.chart.queries");
    Ok(path.to_path_buf())
}

/// Vertical bar pair, one bar per engine, titled with the requested row count.
pub fn render_insert_chart(path: &Path, comparison: &InsertComparison, size: ChartSize) -> Result<PathBuf> {
    prepare(path)?;
    let timings = comparison.timings();
    let labels = timings.map(|t| t.engine.as_str());
    let seconds = timings.map(|t| t.elapsed.as_secs_f64());
    let y_max = axis_max(seconds[0].max(seconds[1]));

    let root = SVGBackend::new(path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE).map_err(|err| failed(path, err))?;
    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Insert time for {} records", comparison.requested),
            (FONT, 22),
        )
        .margin(16)
        .x_label_area_size(40)
        .y_label_area_size(56)
        .build_cartesian_2d(-0.5f64..1.5f64, 0f64..y_max)
        .map_err(|err| failed(path, err))?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(2)
        .x_label_formatter(&|x: &f64| category(&labels, *x))
        .y_desc("seconds")
        .draw()
        .map_err(|err| failed(path, err))?;

    for (i, color) in [LEFT_COLOR, RIGHT_COLOR].into_iter().enumerate() {
        let center = i as f64;
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(center - BAR / 2.0 - 0.1, 0.0), (center + BAR / 2.0 + 0.1, seconds[i])],
                color.filled(),
            )))
            .map_err(|err| failed(path, err))?;
        chart
            .draw_series(std::iter::once(Text::new(
                format!("{:.2}", seconds[i]),
                (center - 0.1, seconds[i] + y_max * 0.02),
                (FONT, 12).into_font(),
            )))
            .map_err(|err| failed(path, err))?;
    }

    root.present().map_err(|err| failed(path, err))?;
    info!(path = %path.display(), requested = comparison.requested, "report.chart.inserts");
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::inserts::{InsertMode, InsertTiming};
    use crate::timing::TimingSeries;

    const SIZE: ChartSize = ChartSize {
        width: 640,
        height: 400,
    };

    fn aligned() -> AlignedSeries {
        let mut left = TimingSeries::new("DuckDB");
        let mut right = TimingSeries::new("Postgres");
        for (i, label) in ["q1", "q2", "q3"].iter().enumerate() {
            left.push(*label, Duration::from_millis(20 + i as u64));
            right.push(*label, Duration::from_millis(900 + 10 * i as u64));
        }
        AlignedSeries::new(left, right).expect("aligned")
    }

    fn comparison() -> InsertComparison {
        InsertComparison {
            requested: 100,
            mode: InsertMode::Bound,
            left: InsertTiming {
                engine: "DuckDB".into(),
                statements: 101,
                elapsed: Duration::from_millis(250),
            },
            right: InsertTiming {
                engine: "Postgres".into(),
                statements: 101,
                elapsed: Duration::from_millis(40),
            },
        }
    }

    #[test]
    fn category_only_labels_integer_ticks() {
        let labels = ["q1", "q2"];
        assert_eq!(category(&labels, 0.0), "q1");
        assert_eq!(category(&labels, 1.0000000001), "q2");
        assert_eq!(category(&labels, 0.5), "");
        assert_eq!(category(&labels, 2.0), "");
        assert_eq!(category(&labels, -1.0), "");
    }

    #[test]
    fn axis_max_leaves_room_for_labels() {
        assert!((axis_max(2.0) - 2.4).abs() < 1e-9);
        assert_eq!(axis_max(0.0), 1.0);
    }

    #[test]
    fn query_chart_writes_svg_into_new_directory() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("img").join("query_time.svg");
        render_query_chart(&path, &aligned(), SIZE).expect("render");
        let svg = fs::read_to_string(&path).expect("read svg");
        assert!(svg.contains("<svg"));
        assert!(svg.contains("q2"));
        assert!(svg.contains("Postgres"));
    }

    #[test]
    fn insert_chart_title_names_requested_rows() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("insert_time.svg");
        render_insert_chart(&path, &comparison(), SIZE).expect("render");
        let svg = fs::read_to_string(&path).expect("read svg");
        assert!(svg.contains("Insert time for 100 records"));
    }

    #[test]
    fn empty_query_series_is_a_render_error() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let empty = AlignedSeries::new(TimingSeries::new("a"), TimingSeries::new("b"))
            .expect("aligned");
        let err = render_query_chart(&dir.path().join("q.svg"), &empty, SIZE).unwrap_err();
        assert!(matches!(err, BenchError::Render { .. }));
    }
}

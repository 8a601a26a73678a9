// CLUSTERBENCH CHART
// SCALABILITY MODE ONLY: PARAMETER VALUE VS AVERAGED TIME, ONE LINE WITH MARKERS.
// OUTPUT IS A SELF-CONTAINED HTML DOCUMENT (INLINE SVG, NO EXTERNAL ASSETS).
//
// EVERY MARKER CARRIES ITS EXACT VALUES AS TEXT: AN SVG <title> TOOLTIP,
// data-* ATTRIBUTES, AND AN EMBEDDED JSON BLOCK. NOT ONLY A PIXEL POSITION.
// X POSITIONS ARE ORDINAL (SWEEP ORDER), SO 2..1024 DOES NOT COLLAPSE TO THE LEFT EDGE.

use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;

use crate::aggregate::AggregateResult;
use crate::error::Result;
use crate::metrics::TimeUnit;
use crate::sink::write_atomic;

const WIDTH: f64 = 900.0;
const HEIGHT: f64 = 520.0;
const MARGIN_L: f64 = 90.0;
const MARGIN_R: f64 = 30.0;
const MARGIN_T: f64 = 70.0;
const MARGIN_B: f64 = 70.0;
const Y_TICKS: usize = 5;

#[derive(Clone, Debug)]
pub struct ChartSpec {
    pub title: String,
    pub x_label: String,
    pub unit: TimeUnit,
}

#[derive(Serialize, PartialEq, Debug)]
pub struct ChartPoint {
    pub param: u64,
    pub avg_time: f64,
    pub trials: u32,
}

// POINTS WITHOUT A PARAM OR WITHOUT A VALID TIME ARE LEFT OFF THE LINE
pub fn chart_points(results: &[AggregateResult]) -> Vec<ChartPoint> {
    results
        .iter()
        .filter_map(|r| {
            Some(ChartPoint {
                param: r.point.param?,
                avg_time: r.avg_time?,
                trials: r.time_trials,
            })
        })
        .collect()
}

pub fn render_html(results: &[AggregateResult], spec: &ChartSpec) -> Result<String> {
    let points = chart_points(results);
    let omitted = results.len() - points.len();
    let data = serde_json::to_string(&points)?;

    let plot_w = WIDTH - MARGIN_L - MARGIN_R;
    let plot_h = HEIGHT - MARGIN_T - MARGIN_B;
    let y_max = nice_ceiling(points.iter().map(|p| p.avg_time).fold(0.0, f64::max));
    let x_at = |i: usize| -> f64 {
        if points.len() <= 1 {
            MARGIN_L + plot_w / 2.0
        } else {
            MARGIN_L + plot_w * i as f64 / (points.len() - 1) as f64
        }
    };
    let y_at = |v: f64| MARGIN_T + plot_h * (1.0 - v / y_max);

    let mut svg = String::new();
    let _ = writeln!(svg, r#"<svg xmlns="http://www.w3.org/2000/svg" width="{W}" height="{H}" viewBox="0 0 {W} {H}">"#,
        W = WIDTH, H = HEIGHT);
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);

    // GRID + Y TICKS
    for t in 0..=Y_TICKS {
        let v = y_max * t as f64 / Y_TICKS as f64;
        let y = y_at(v);
        let _ = writeln!(svg, r##"<line x1="{:.1}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="#e5e5e5"/>"##,
            MARGIN_L, WIDTH - MARGIN_R);
        let _ = writeln!(svg, r#"<text x="{:.1}" y="{:.1}" text-anchor="end" font-size="12">{}</text>"#,
            MARGIN_L - 8.0, y + 4.0, trim_float(v));
    }

    // AXES
    let _ = writeln!(svg, r#"<line x1="{l}" y1="{b}" x2="{r}" y2="{b}" stroke="black"/>"#,
        l = MARGIN_L, r = WIDTH - MARGIN_R, b = HEIGHT - MARGIN_B);
    let _ = writeln!(svg, r#"<line x1="{l}" y1="{t}" x2="{l}" y2="{b}" stroke="black"/>"#,
        l = MARGIN_L, t = MARGIN_T, b = HEIGHT - MARGIN_B);

    // X TICKS
    for (i, p) in points.iter().enumerate() {
        let _ = writeln!(svg, r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="12">{}</text>"#,
            x_at(i), HEIGHT - MARGIN_B + 18.0, p.param);
    }

    // LINE
    if points.len() > 1 {
        let path: Vec<String> = points
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{:.1},{:.1}", x_at(i), y_at(p.avg_time)))
            .collect();
        let _ = writeln!(svg, r##"<polyline fill="none" stroke="#636efa" stroke-width="2" points="{}"/>"##,
            path.join(" "));
    }

    // MARKERS
    for (i, p) in points.iter().enumerate() {
        let _ = writeln!(svg,
            r##"<circle class="point" cx="{:.1}" cy="{:.1}" r="5" fill="#636efa" data-x="{}" data-y="{}"><title>{}: {}&#10;Execution Time: {:.2} {}</title></circle>"##,
            x_at(i), y_at(p.avg_time), p.param, p.avg_time,
            escape(&spec.x_label), p.param, p.avg_time, spec.unit);
    }

    // LABELS
    let _ = writeln!(svg, r#"<text x="{:.1}" y="32" text-anchor="middle" font-size="18">{}</text>"#,
        WIDTH / 2.0, escape(&spec.title));
    if omitted > 0 {
        let _ = writeln!(svg, r##"<text x="{:.1}" y="52" text-anchor="middle" font-size="12" fill="#b00">{} point(s) omitted: no valid execution time</text>"##,
            WIDTH / 2.0, omitted);
    }
    let _ = writeln!(svg, r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="14">{}</text>"#,
        MARGIN_L + plot_w / 2.0, HEIGHT - 20.0, escape(&spec.x_label));
    let _ = writeln!(svg, r#"<text x="20" y="{:.1}" text-anchor="middle" font-size="14" transform="rotate(-90 20 {:.1})">Average Execution Time ({})</text>"#,
        MARGIN_T + plot_h / 2.0, MARGIN_T + plot_h / 2.0, spec.unit);
    svg.push_str("</svg>\n");

    let mut html = String::new();
    let _ = writeln!(html, "<!DOCTYPE html>");
    let _ = writeln!(html, r#"<html><head><meta charset="utf-8"><title>{}</title></head>"#, escape(&spec.title));
    let _ = writeln!(html, r#"<body style="background:white;font-family:sans-serif">"#);
    html.push_str(&svg);
    let _ = writeln!(html, r#"<script type="application/json" id="chart-data">{}</script>"#,
        data.replace("</", "<\\/"));
    let _ = writeln!(html, "</body></html>");
    Ok(html)
}

pub fn write_chart(path: &Path, results: &[AggregateResult], spec: &ChartSpec) -> Result<()> {
    let html = render_html(results, spec)?;
    write_atomic(path, html.as_bytes())
}

// ROUND THE AXIS MAXIMUM UP TO 1, 2 OR 5 TIMES A POWER OF TEN
fn nice_ceiling(v: f64) -> f64 {
    if !v.is_finite() || v <= 0.0 {
        return 1.0;
    }
    let mag = 10f64.powf(v.log10().floor());
    let norm = v / mag;
    let step = if norm <= 1.0 {
        1.0
    } else if norm <= 2.0 {
        2.0
    } else if norm <= 5.0 {
        5.0
    } else {
        10.0
    };
    step * mag
}

fn trim_float(v: f64) -> String {
    let s = format!("{:.3}", v);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

//! PNG figure rendering for the analysis passes.
//!
//! All renderers draw into an RGB buffer and hand the encoded PNG back as
//! bytes; callers decide where the file lands.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use ndarray::Array1;
use plotters::prelude::*;

use crate::error::PipelineError;

#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub palette: Vec<RGBColor>,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 500,
            background: WHITE,
            palette: vec![BLUE, RED, GREEN, MAGENTA, CYAN, BLACK],
        }
    }
}

impl PlotStyle {
    /// Wide layout for full-session traces.
    pub fn session_trace() -> Self {
        Self {
            width: 2000,
            height: 1000,
            ..Self::default()
        }
    }
}

// Shade color for samples where the subject is speaking.
const SPEAKING_SHADE: RGBColor = RGBColor(255, 229, 236);

/// Full-session channel trace, shaded wherever the behavioral state is 0
/// (speaking), x-axis in seconds.
pub fn render_session_trace(
    eeg: &Array1<f64>,
    behavior: &Array1<f64>,
    sample_rate_hz: f64,
    title: &str,
    style: &PlotStyle,
) -> Result<Vec<u8>, PipelineError> {
    if eeg.is_empty() {
        return Err(PipelineError::Plot("channel trace has no samples".into()));
    }
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;

        let duration = eeg.len() as f64 / sample_rate_hz;
        let y_min = eeg.iter().fold(f64::INFINITY, |acc, &v| acc.min(v));
        let y_max = eeg.iter().fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        let y_bounds = if (y_max - y_min).abs() < f64::EPSILON {
            (y_min - 1.0, y_max + 1.0)
        } else {
            (y_min, y_max)
        };

        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(title, ("sans-serif", 24))
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 45)
            .build_cartesian_2d(0f64..duration, y_bounds.0..y_bounds.1)?;
        chart
            .configure_mesh()
            .x_desc("Time (s)")
            .y_desc("Microvolts (\u{00b5}V)")
            .light_line_style(BLACK.mix(0.05))
            .draw()?;

        // Speaking spans as one rectangle per contiguous run of zeros.
        let shaded = eeg.len().min(behavior.len());
        let mut run_start: Option<usize> = None;
        let mut spans = Vec::new();
        for i in 0..shaded {
            match (behavior[i] == 0.0, run_start) {
                (true, None) => run_start = Some(i),
                (false, Some(s)) => {
                    spans.push((s, i));
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = run_start {
            spans.push((s, shaded));
        }
        chart.draw_series(spans.iter().map(|&(s, e)| {
            Rectangle::new(
                [
                    (s as f64 / sample_rate_hz, y_bounds.0),
                    (e as f64 / sample_rate_hz, y_bounds.1),
                ],
                SPEAKING_SHADE.mix(0.3).filled(),
            )
        }))?;

        let series = eeg
            .iter()
            .enumerate()
            .map(|(i, &v)| (i as f64 / sample_rate_hz, v));
        chart.draw_series(LineSeries::new(series, &BLACK))?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}

/// Kernel-density plot of one value across labeled groups.
pub fn render_density_plot(
    groups: &[(String, Vec<f64>)],
    x_label: &str,
    title: &str,
    style: &PlotStyle,
) -> Result<Vec<u8>, PipelineError> {
    let usable: Vec<&(String, Vec<f64>)> =
        groups.iter().filter(|(_, v)| v.len() >= 2).collect();
    if usable.is_empty() {
        return Err(PipelineError::Plot(format!(
            "no group has enough samples for a density plot of {x_label}"
        )));
    }

    let bandwidths: Vec<f64> = usable
        .iter()
        .map(|(_, v)| silverman_bandwidth(v))
        .collect();
    let pad = bandwidths.iter().fold(0.0f64, |acc, &b| acc.max(b)) * 3.0;
    let lo = usable
        .iter()
        .flat_map(|(_, v)| v.iter())
        .fold(f64::INFINITY, |acc, &v| acc.min(v))
        - pad;
    let hi = usable
        .iter()
        .flat_map(|(_, v)| v.iter())
        .fold(f64::NEG_INFINITY, |acc, &v| acc.max(v))
        + pad;

    let curves: Vec<Vec<(f64, f64)>> = usable
        .iter()
        .zip(&bandwidths)
        .map(|((_, values), &bw)| kde_curve(values, (lo, hi), 256, bw))
        .collect();
    let y_max = curves
        .iter()
        .flat_map(|c| c.iter().map(|&(_, y)| y))
        .fold(0.0f64, f64::max)
        .max(f64::MIN_POSITIVE);

    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(title, ("sans-serif", 24))
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 45)
            .build_cartesian_2d(lo..hi, 0f64..y_max * 1.05)?;
        chart
            .configure_mesh()
            .x_desc(x_label)
            .y_desc("Density")
            .light_line_style(BLACK.mix(0.05))
            .draw()?;

        for (idx, ((label, _), curve)) in usable.iter().zip(&curves).enumerate() {
            let color = style.palette[idx % style.palette.len()];
            chart
                .draw_series(LineSeries::new(curve.iter().copied(), &color))?
                .label(label.clone())
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color)
                });
        }
        chart
            .configure_series_labels()
            .border_style(BLACK.mix(0.2))
            .background_style(style.background.mix(0.8))
            .draw()?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}

/// Per-channel bar chart with one translucent bar series per group,
/// overlaid the way the comparison figures stack truthful on deceptive.
pub fn render_channel_bars(
    categories: &[String],
    groups: &[(String, Vec<f64>)],
    y_label: &str,
    title: &str,
    style: &PlotStyle,
) -> Result<Vec<u8>, PipelineError> {
    if categories.is_empty() || groups.is_empty() {
        return Err(PipelineError::Plot(format!(
            "nothing to draw for bar chart {title:?}"
        )));
    }
    for (label, values) in groups {
        if values.len() != categories.len() {
            return Err(PipelineError::Plot(format!(
                "group {label:?} has {} values for {} categories",
                values.len(),
                categories.len()
            )));
        }
    }

    let y_max = groups
        .iter()
        .flat_map(|(_, v)| v.iter().copied())
        .fold(0.0f64, f64::max)
        .max(f64::MIN_POSITIVE);

    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let n = categories.len();
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(title, ("sans-serif", 24))
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 45)
            .build_cartesian_2d(0f64..n as f64, 0f64..y_max * 1.1)?;

        let names = categories.to_vec();
        chart
            .configure_mesh()
            .x_desc("Channels")
            .y_desc(y_label)
            .x_labels(n)
            .x_label_formatter(&move |x| {
                let idx = x.floor() as usize;
                names.get(idx).cloned().unwrap_or_default()
            })
            .disable_x_mesh()
            .light_line_style(BLACK.mix(0.05))
            .draw()?;

        for (idx, (label, values)) in groups.iter().enumerate() {
            let color = style.palette[idx % style.palette.len()];
            chart
                .draw_series(values.iter().enumerate().map(|(i, &v)| {
                    Rectangle::new(
                        [(i as f64 + 0.15, 0.0), (i as f64 + 0.85, v)],
                        color.mix(0.35).filled(),
                    )
                }))?
                .label(label.clone())
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color)
                });
        }
        chart
            .configure_series_labels()
            .border_style(BLACK.mix(0.2))
            .background_style(style.background.mix(0.8))
            .draw()?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}

pub fn save_png(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    std::fs::write(path, bytes)?;
    Ok(())
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, PipelineError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| PipelineError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}

fn silverman_bandwidth(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    let bw = 1.06 * std * n.powf(-0.2);
    if bw > 0.0 {
        bw
    } else {
        // Degenerate (constant) group; any positive width draws a spike.
        mean.abs().max(1.0) * 0.01
    }
}

fn kde_curve(values: &[f64], range: (f64, f64), points: usize, bandwidth: f64) -> Vec<(f64, f64)> {
    let (lo, hi) = range;
    let norm = 1.0 / ((2.0 * std::f64::consts::PI).sqrt() * bandwidth * values.len() as f64);
    (0..points)
        .map(|i| {
            let x = lo + (hi - lo) * i as f64 / (points - 1) as f64;
            let density = values
                .iter()
                .map(|&v| {
                    let z = (x - v) / bandwidth;
                    (-0.5 * z * z).exp()
                })
                .sum::<f64>()
                * norm;
            (x, density)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    #[test]
    fn session_trace_returns_png_bytes() {
        let eeg = Array1::from_shape_fn(1000, |i| (i as f64 * 0.1).sin());
        let behavior = Array1::from_shape_fn(1000, |i| f64::from(u8::from(i % 200 < 100)));
        let png =
            render_session_trace(&eeg, &behavior, 250.0, "Session 1 EEG Signal", &PlotStyle::default())
                .unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn empty_trace_is_an_error() {
        let eeg = Array1::from(Vec::<f64>::new());
        let behavior = Array1::from(Vec::<f64>::new());
        assert!(
            render_session_trace(&eeg, &behavior, 250.0, "t", &PlotStyle::default()).is_err()
        );
    }

    #[test]
    fn density_plot_handles_two_groups() {
        let groups = vec![
            ("Thinking".to_string(), vec![1.0, 1.2, 0.9, 1.1, 1.3]),
            ("Speaking".to_string(), vec![2.0, 2.2, 1.9, 2.1, 2.4]),
        ];
        let png =
            render_density_plot(&groups, "Alpha Power", "Alpha Power Distribution", &PlotStyle::default())
                .unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn kde_integrates_to_roughly_one() {
        let values = vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5];
        let bw = silverman_bandwidth(&values);
        let curve = kde_curve(&values, (-3.0, 5.0), 512, bw);
        let dx = 8.0 / 511.0;
        let integral: f64 = curve.iter().map(|&(_, y)| y * dx).sum();
        assert!((integral - 1.0).abs() < 0.05, "integral {integral}");
    }

    #[test]
    fn bar_chart_rejects_mismatched_groups() {
        let categories = vec!["Ch1".to_string(), "Ch2".to_string()];
        let groups = vec![("Truthful".to_string(), vec![1.0])];
        assert!(
            render_channel_bars(&categories, &groups, "Alpha Power", "t", &PlotStyle::default())
                .is_err()
        );
    }

    #[test]
    fn bar_chart_draws_overlaid_groups() {
        let categories: Vec<String> = (1..=8).map(|c| format!("Ch{c}")).collect();
        let groups = vec![
            ("Truthful".to_string(), vec![1.0; 8]),
            ("Deceptive".to_string(), vec![0.5; 8]),
        ];
        let png = render_channel_bars(
            &categories,
            &groups,
            "Alpha Power",
            "Alpha Power Distribution by Truth Value",
            &PlotStyle::default(),
        )
        .unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
    }
}

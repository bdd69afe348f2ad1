use std::path::Path;

use plotters::prelude::PathElement;
use plotters::prelude::*;

use crate::error::DynError;
use crate::sft::Lft;
use crate::utils::accumulate_power_add;

const PLOT_FONT_SCALE: f64 = 1.2;

fn scaled_font_size(base: i32) -> i32 {
    ((base as f64) * PLOT_FONT_SCALE).round() as i32
}

fn scaled_area_size(base: i32) -> i32 {
    ((base as f64) * PLOT_FONT_SCALE).round() as i32
}

/// Frequencies (Hz) and `|X_k|^2` of every bin of `lft`, lowest frequency
/// first.
pub fn power_spectrum(lft: &Lft) -> (Vec<f64>, Vec<f64>) {
    let freqs = (0..lft.num_bins())
        .map(|k| lft.f0 + k as f64 * lft.delta_f)
        .collect();
    let mut power = vec![0.0; lft.num_bins()];
    accumulate_power_add(&mut power, &lft.data);
    (freqs, power)
}

fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return None;
    }
    if lo == hi {
        // Flat series still needs a non-empty axis.
        let pad = if lo == 0.0 { 1.0 } else { lo.abs() * 0.05 };
        return Some((lo - pad, hi + pad));
    }
    Some((lo, hi))
}

pub fn plot_series_f64_x(
    x_vals: &[f64],
    data: &[f64],
    filename: &Path,
    x_label: &str,
    y_label: &str,
    label: &str,
) -> Result<(), DynError> {
    if x_vals.len() != data.len() {
        return Err("X-value vector length does not match data length".into());
    }
    if x_vals.is_empty() {
        return Err("No data points to plot".into());
    }
    let (x_min, x_max) = finite_range(x_vals).ok_or("Failed to determine x range")?;
    let (min_val, max_val) = finite_range(data).ok_or("Failed to determine y range")?;

    let root = BitMapBackend::new(filename, (1280, 720)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .x_label_area_size(scaled_area_size(40))
        .y_label_area_size(scaled_area_size(60))
        .build_cartesian_2d(x_min..x_max, min_val..max_val)?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .label_style(("sans-serif", scaled_font_size(20)).into_font())
        .axis_desc_style(("sans-serif", scaled_font_size(24)).into_font())
        .light_line_style(WHITE.mix(0.0))
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            x_vals.iter().zip(data.iter()).map(|(x, y)| (*x, *y)),
            &BLUE,
        ))
        .map(|s| {
            s.label(label)
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], BLUE))
        })?;

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(&WHITE.mix(0.8))
        .label_font(("sans-serif", scaled_font_size(20)).into_font())
        .draw()?;

    root.present()?;
    Ok(())
}

/// Draw the power spectrum of `lft` to a PNG.
pub fn plot_lft_power(lft: &Lft, filename: &Path) -> Result<(), DynError> {
    let (freqs, power) = power_spectrum(lft);
    plot_series_f64_x(
        &freqs,
        &power,
        filename,
        "Frequency [Hz]",
        "Power |X|^2",
        &lft.name,
    )
}

use std::path::Path;

use chrono::Duration;
use plotters::prelude::*;
use rust_decimal::prelude::ToPrimitive;

use super::alignment::AlignedPoint;
use crate::config::PlotConfig;
use crate::errors::AnalysisError;

pub const CHART_TITLE: &str = "Token Price vs Whale Activity";

/// Price line over whale volume bars (secondary axis), written as SVG.
pub fn render_price_vs_whale(
    points: &[AlignedPoint],
    path: &Path,
    config: &PlotConfig,
) -> Result<(), AnalysisError> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Err(AnalysisError::InsufficientData(0));
    };
    let first_date = first.date;
    let x_of = |p: &AlignedPoint| (p.date - first_date).num_days() as f64;
    let x_range = -0.5..(x_of(last) + 0.5);

    let price_max = axis_max(points.iter().map(|p| p.price.to_f64().unwrap_or_default()));
    let volume_max = axis_max(points.iter().map(|p| p.usd_value.to_f64().unwrap_or_default()));

    let price_color = parse_color(&config.price_color);
    let whale_color = parse_color(&config.whale_color);

    let root = SVGBackend::new(path, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(CHART_TITLE, ("sans-serif", 24))
        .margin(12)
        .x_label_area_size(48)
        .y_label_area_size(64)
        .right_y_label_area_size(80)
        .build_cartesian_2d(x_range.clone(), 0f64..price_max)
        .map_err(chart_err)?
        .set_secondary_coord(x_range, 0f64..volume_max);

    let date_label = |x: &f64| {
        (first_date + Duration::days(x.round() as i64))
            .format("%Y-%m-%d")
            .to_string()
    };
    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Price (USD)")
        .x_label_formatter(&date_label)
        .draw()
        .map_err(chart_err)?;
    chart
        .configure_secondary_axes()
        .y_desc("Whale volume (USD)")
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_secondary_series(points.iter().map(|p| {
            let x = x_of(p);
            let volume = p.usd_value.to_f64().unwrap_or_default();
            Rectangle::new([(x - 0.4, 0.0), (x + 0.4, volume)], whale_color.mix(0.5).filled())
        }))
        .map_err(chart_err)?
        .label("Whale volume")
        .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], whale_color.filled()));

    chart
        .draw_series(LineSeries::new(
            points
                .iter()
                .map(|p| (x_of(p), p.price.to_f64().unwrap_or_default())),
            price_color.stroke_width(2),
        ))
        .map_err(chart_err)?
        .label("Price")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], price_color.stroke_width(2)));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    tracing::info!(path = %path.display(), days = points.len(), "Chart written");
    Ok(())
}

fn chart_err(e: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::Chart(e.to_string())
}

/// Top of a y axis with 10% headroom; never zero.
fn axis_max(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.fold(0.0f64, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

/// Named colour or `#rrggbb`. Unknown names fall back to black.
pub fn parse_color(name: &str) -> RGBColor {
    let name = name.trim().to_lowercase();
    if let Some(hex) = name.strip_prefix('#') {
        if hex.len() == 6 {
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            if let (Some(r), Some(g), Some(b)) = (channel(0), channel(2), channel(4)) {
                return RGBColor(r, g, b);
            }
        }
    }

    match name.as_str() {
        "blue" => BLUE,
        "red" => RED,
        "green" => GREEN,
        "black" => BLACK,
        "orange" => RGBColor(255, 165, 0),
        "purple" => RGBColor(128, 0, 128),
        "gray" | "grey" => RGBColor(128, 128, 128),
        other => {
            tracing::warn!(color = %other, "Unknown plot colour, using black");
            BLACK
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn point(day: u32, price: i64, volume: i64) -> AlignedPoint {
        AlignedPoint {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            price: Decimal::from(price),
            usd_value: Decimal::from(volume),
        }
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("Blue"), BLUE);
        assert_eq!(parse_color("#ff8000"), RGBColor(255, 128, 0));
        assert_eq!(parse_color("orange"), RGBColor(255, 165, 0));
        assert_eq!(parse_color("chartreuse-ish"), BLACK);
    }

    #[test]
    fn test_axis_max_has_headroom() {
        assert!((axis_max([10.0, 50.0].into_iter()) - 55.0).abs() < 1e-9);
        assert_eq!(axis_max(std::iter::empty()), 1.0);
    }

    #[test]
    fn test_renders_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.svg");
        let points = vec![point(1, 100, 5_000), point(2, 110, 0), point(4, 120, 9_000)];

        render_price_vs_whale(&points, &path, &PlotConfig::default()).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_empty_series_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = render_price_vs_whale(&[], &dir.path().join("x.svg"), &PlotConfig::default());
        assert!(matches!(err, Err(AnalysisError::InsufficientData(0))));
    }
}

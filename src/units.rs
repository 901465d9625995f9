//! Percent / pixel unit strings.
//!
//! Room content positions and sizes everything with strings like `"50%"` or
//! `"120px"` so a room authored for one canvas still fits another.
//!
//! ┌──────────┬──────────────┬──────────────────────────────┐
//! │ Input    │ Axis::X      │ Axis::Y                      │
//! ├──────────┼──────────────┼──────────────────────────────┤
//! │ "50%"    │ width * 0.5  │ height * 0.5                 │
//! │ "-10%"   │ -width * 0.1 │ -height * 0.1                │
//! │ "120px"  │ 120          │ 120      (canvas not needed) │
//! └──────────┴──────────────┴──────────────────────────────┘
use crate::engine::{Point, Size};
use crate::error::{AdventureError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    pub fn new(width: f64, height: f64) -> Self {
        CanvasSize { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Length {
    Percent(f64),
    Pixels(f64),
}

/// Split a unit string into its magnitude and unit. The sign is returned
/// separately: a leading `-` negates whichever unit matched.
fn parse(spec: &str) -> Result<(Length, bool)> {
    let invalid = || AdventureError::InvalidUnitSpec(spec.to_string());
    let trimmed = spec.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let (number, to_length): (&str, fn(f64) -> Length) =
        if let Some(number) = unsigned.strip_suffix('%') {
            (number, Length::Percent)
        } else if let Some(number) = unsigned.strip_suffix("px") {
            (number, Length::Pixels)
        } else {
            return Err(invalid());
        };

    // only plain decimals, f64::from_str would also take "inf" or "1e3"
    let is_decimal = !number.is_empty()
        && number.chars().any(|c| c.is_ascii_digit())
        && number.chars().all(|c| c.is_ascii_digit() || c == '.');
    if !is_decimal {
        return Err(invalid());
    }
    let value: f64 = number.parse().map_err(|_| invalid())?;
    Ok((to_length(value), negative))
}

fn require_canvas(spec: &str, canvas: Option<CanvasSize>) -> Result<CanvasSize> {
    canvas.ok_or_else(|| AdventureError::StageUnavailable(spec.to_string()))
}

/// Absolute pixel value of `spec` along `axis`.
pub fn resolve_length(spec: &str, axis: Axis, canvas: Option<CanvasSize>) -> Result<f64> {
    let (length, negative) = parse(spec)?;
    let pixels = match length {
        Length::Percent(percent) => {
            let canvas = require_canvas(spec, canvas)?;
            let extent = match axis {
                Axis::X => canvas.width,
                Axis::Y => canvas.height,
            };
            extent * (percent / 100.0)
        }
        Length::Pixels(pixels) => pixels,
    };
    Ok(if negative { -pixels } else { pixels })
}

pub fn resolve_point(x: &str, y: &str, canvas: Option<CanvasSize>) -> Result<Point> {
    Ok(Point {
        x: resolve_length(x, Axis::X, canvas)?,
        y: resolve_length(y, Axis::Y, canvas)?,
    })
}

/// Scale factor that fits an object with `bounds` inside a square box of
/// `spec`, keeping its aspect ratio.
///
/// For percent boxes the X candidate is measured against the canvas
/// *height* and the Y candidate against the canvas *width*.
pub fn resolve_scale_to_fit(spec: &str, bounds: Size, canvas: Option<CanvasSize>) -> Result<f64> {
    let (length, negative) = parse(spec)?;
    if negative {
        return Err(AdventureError::InvalidUnitSpec(spec.to_string()));
    }
    if bounds.width <= 0.0 || bounds.height <= 0.0 {
        return Err(AdventureError::configuration(format!(
            "cannot scale to '{}' without the object's size (got {}x{})",
            spec, bounds.width, bounds.height
        )));
    }

    let (scale_x, scale_y) = match length {
        Length::Percent(percent) => {
            let canvas = require_canvas(spec, canvas)?;
            (
                (canvas.height * (percent / 100.0)) / bounds.height,
                (canvas.width * (percent / 100.0)) / bounds.width,
            )
        }
        Length::Pixels(pixels) => (pixels / bounds.width, pixels / bounds.height),
    };
    Ok(scale_x.min(scale_y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const CANVAS: Option<CanvasSize> = Some(CanvasSize {
        width: 800.0,
        height: 600.0,
    });

    #[test]
    fn percent_uses_width_for_x_and_height_for_y() {
        for percent in [0.0, 12.5, 50.0, 100.0, 150.0] {
            let spec = format!("{}%", percent);
            assert_relative_eq!(
                resolve_length(&spec, Axis::X, CANVAS).unwrap(),
                800.0 * percent / 100.0
            );
            assert_relative_eq!(
                resolve_length(&spec, Axis::Y, CANVAS).unwrap(),
                600.0 * percent / 100.0
            );
        }
    }

    #[test]
    fn pixels_ignore_the_canvas() {
        assert_eq!(resolve_length("120px", Axis::X, CANVAS).unwrap(), 120.0);
        assert_eq!(resolve_length("120px", Axis::Y, CANVAS).unwrap(), 120.0);
        assert_eq!(resolve_length("7.5px", Axis::Y, None).unwrap(), 7.5);
    }

    #[test]
    fn leading_minus_negates_either_unit() {
        assert_eq!(resolve_length("-10%", Axis::X, CANVAS).unwrap(), -80.0);
        assert_eq!(resolve_length("-40px", Axis::Y, CANVAS).unwrap(), -40.0);
        assert_eq!(resolve_length(" -40px ", Axis::Y, None).unwrap(), -40.0);
    }

    #[test]
    fn malformed_specs_are_rejected() {
        for spec in ["", "50", "px", "%", "12em", "1e3px", "infpx", "5 0%", "--5px"] {
            assert_eq!(
                resolve_length(spec, Axis::X, CANVAS),
                Err(AdventureError::InvalidUnitSpec(spec.to_string())),
                "{spec:?}"
            );
        }
    }

    #[test]
    fn percent_without_stage_fails() {
        assert_eq!(
            resolve_length("50%", Axis::X, None),
            Err(AdventureError::StageUnavailable("50%".into()))
        );
        assert!(matches!(
            resolve_scale_to_fit("10%", Size::new(10.0, 10.0), None),
            Err(AdventureError::StageUnavailable(_))
        ));
    }

    #[test]
    fn resolve_point_resolves_both_axes() {
        let point = resolve_point("50%", "100%", CANVAS).unwrap();
        assert_eq!(point, Point { x: 400.0, y: 600.0 });
    }

    #[test]
    fn scale_to_fit_percent_takes_the_smaller_candidate() {
        let scale = resolve_scale_to_fit("50%", Size::new(100.0, 100.0), CANVAS).unwrap();
        assert_relative_eq!(scale, 3.0);
    }

    #[test]
    fn scale_to_fit_percent_keeps_the_asymmetric_convention() {
        // x candidate: 600 * 0.1 / 20 = 3, y candidate: 800 * 0.1 / 40 = 2
        let scale = resolve_scale_to_fit("10%", Size::new(40.0, 20.0), CANVAS).unwrap();
        assert_relative_eq!(scale, 2.0);
    }

    #[test]
    fn scale_to_fit_pixels_never_overflows_the_box() {
        let scale = resolve_scale_to_fit("50px", Size::new(200.0, 100.0), None).unwrap();
        assert_relative_eq!(scale, 0.25);
        assert!(200.0 * scale <= 50.0 && 100.0 * scale <= 50.0);
    }

    #[test]
    fn scale_to_fit_needs_real_bounds() {
        assert!(matches!(
            resolve_scale_to_fit("50px", Size::new(0.0, 10.0), CANVAS),
            Err(AdventureError::Configuration(_))
        ));
        assert!(matches!(
            resolve_scale_to_fit("-50px", Size::new(10.0, 10.0), CANVAS),
            Err(AdventureError::InvalidUnitSpec(_))
        ));
    }
}

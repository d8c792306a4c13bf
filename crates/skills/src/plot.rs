//! Plot Skill
//!
//! `plot(y)` / `plot(x, y)` renders a line chart to an in-memory PNG and
//! writes it as an inline markdown image with the alt text `Plot`.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::Value;

use interactivity_core::{CoreError, CoreResult, Output, Skill, SkillCall, SkillModule};

use crate::PLOT_SKILLS;

pub const WIDTH: u32 = 600;
pub const HEIGHT: u32 = 400;

const MARGIN_LEFT: u32 = 50;
const MARGIN_RIGHT: u32 = 20;
const MARGIN_TOP: u32 = 20;
const MARGIN_BOTTOM: u32 = 40;
const GRID_DIVISIONS: u32 = 8;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([221, 221, 221]);
const DEFAULT_LINE: Rgb<u8> = Rgb([31, 119, 180]);

/// Parse `#rrggbb`, `#rgb` or a basic colour name.
pub fn parse_color(spec: &str) -> Option<Rgb<u8>> {
    let spec = spec.trim().to_lowercase();
    if let Some(hex) = spec.strip_prefix('#') {
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return None,
        };
        let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
        return Some(Rgb([channel(0)?, channel(2)?, channel(4)?]));
    }

    let rgb = match spec.as_str() {
        "blue" | "b" => [31, 119, 180],
        "red" | "r" => [214, 39, 40],
        "green" | "g" => [44, 160, 44],
        "orange" => [255, 127, 14],
        "purple" => [148, 103, 189],
        "black" | "k" => [0, 0, 0],
        "gray" | "grey" => [127, 127, 127],
        "cyan" | "c" => [23, 190, 207],
        "magenta" | "m" => [227, 119, 194],
        "yellow" | "y" => [188, 189, 34],
        _ => return None,
    };
    Some(Rgb(rgb))
}

fn to_series(value: &Value, name: &str) -> CoreResult<Vec<f64>> {
    let items = value.as_array().ok_or_else(|| {
        CoreError::invalid_arguments(format!("plot() argument '{}' must be a list of numbers", name))
    })?;
    items
        .iter()
        .map(|item| match item {
            Value::Number(n) => n.as_f64(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        })
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| {
            CoreError::invalid_arguments(format!("plot() argument '{}' must contain only numbers", name))
        })
}

/// Data range padded so flat series still get a visible span.
fn bounds(values: &[f64]) -> (f64, f64) {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        return (min - 1.0, max + 1.0);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

/// Render `(x, y)` as a line chart with grid.
pub fn render_chart(x: &[f64], y: &[f64], color: Rgb<u8>) -> RgbImage {
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);

    let left = MARGIN_LEFT as i64;
    let right = (WIDTH - MARGIN_RIGHT) as i64;
    let top = MARGIN_TOP as i64;
    let bottom = (HEIGHT - MARGIN_BOTTOM) as i64;

    for i in 0..=GRID_DIVISIONS as i64 {
        let gx = left + (right - left) * i / GRID_DIVISIONS as i64;
        let gy = top + (bottom - top) * i / GRID_DIVISIONS as i64;
        draw_line(&mut img, (gx, top), (gx, bottom), GRID, 1);
        draw_line(&mut img, (left, gy), (right, gy), GRID, 1);
    }

    draw_line(&mut img, (left, top), (left, bottom), AXIS, 1);
    draw_line(&mut img, (left, bottom), (right, bottom), AXIS, 1);
    draw_line(&mut img, (right, top), (right, bottom), AXIS, 1);
    draw_line(&mut img, (left, top), (right, top), AXIS, 1);

    let (x_min, x_max) = bounds(x);
    let (y_min, y_max) = bounds(y);
    let project = |px: f64, py: f64| -> (i64, i64) {
        let sx = left as f64 + (px - x_min) / (x_max - x_min) * (right - left) as f64;
        let sy = bottom as f64 - (py - y_min) / (y_max - y_min) * (bottom - top) as f64;
        (sx.round() as i64, sy.round() as i64)
    };

    let points: Vec<(i64, i64)> = x
        .iter()
        .zip(y.iter())
        .filter(|(px, py)| px.is_finite() && py.is_finite())
        .map(|(px, py)| project(*px, *py))
        .collect();

    match points.as_slice() {
        [single] => draw_line(&mut img, *single, *single, color, 3),
        _ => {
            for pair in points.windows(2) {
                draw_line(&mut img, pair[0], pair[1], color, 2);
            }
        }
    }

    img
}

/// Bresenham line with a square pen of `thickness` pixels.
fn draw_line(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>, thickness: i64) {
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let half = thickness / 2;

    loop {
        for ox in -half..=(thickness - 1 - half) {
            for oy in -half..=(thickness - 1 - half) {
                put_pixel(img, x0 + ox, y0 + oy, color);
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn put_pixel(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// Encode an image as base64 PNG.
pub fn encode_png_base64(img: &RgbImage) -> CoreResult<String> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| CoreError::skill(format!("Failed to encode plot: {}", e)))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(&bytes))
}

struct PlotSkill;

#[async_trait]
impl Skill for PlotSkill {
    fn name(&self) -> &str {
        "plot"
    }

    async fn invoke(&self, call: SkillCall, out: &mut Output) -> CoreResult<()> {
        let args = &call.args;
        args.only_keywords("plot", &["x", "y", "color"])?;
        let (x, y) = match (args.get(0, "x"), args.get(1, "y")) {
            (Some(x), Some(y)) => (to_series(x, "x")?, to_series(y, "y")?),
            (Some(y), None) | (None, Some(y)) => {
                let y = to_series(y, "y")?;
                let x = (0..y.len()).map(|i| i as f64).collect();
                (x, y)
            }
            _ => {
                return Err(CoreError::invalid_arguments(
                    "plot() missing required argument: 'y'",
                ))
            }
        };

        if x.len() != y.len() {
            return Err(CoreError::invalid_arguments(format!(
                "x and y must have same first dimension, but have shapes ({},) and ({},)",
                x.len(),
                y.len()
            )));
        }

        let color = match args.keyword_str("color")? {
            Some(spec) => parse_color(&spec).ok_or_else(|| {
                CoreError::invalid_arguments(format!("'{}' is not a valid color value", spec))
            })?,
            None => DEFAULT_LINE,
        };

        let png = encode_png_base64(&render_chart(&x, &y, color))?;
        tracing::debug!(points = y.len(), bytes = png.len(), "rendered plot");
        out.emit(&format!("![Plot](data:image/png;base64,{})\n", png))?;
        Ok(())
    }
}

/// The plot skill module.
#[derive(Debug, Default)]
pub struct PlotModule;

impl SkillModule for PlotModule {
    fn name(&self) -> &str {
        "plot"
    }

    fn availability(&self) -> Result<(), String> {
        Ok(())
    }

    fn skill_names(&self) -> Vec<String> {
        PLOT_SKILLS.iter().map(|s| s.to_string()).collect()
    }

    fn skills(&self) -> Vec<Arc<dyn Skill>> {
        vec![Arc::new(PlotSkill)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interactivity_core::{SharedBuffer, SkillArgs};
    use serde_json::{json, Map};

    async fn run(positional: Vec<Value>, keyword: Value) -> (CoreResult<()>, String) {
        let buffer = SharedBuffer::new();
        let mut out = Output::new(buffer.clone());
        let keyword: Map<String, Value> = keyword.as_object().cloned().unwrap_or_default();
        let call = SkillCall::new(SkillArgs::new(positional, keyword), Default::default());
        let result = PlotSkill.invoke(call, &mut out).await;
        (result, buffer.contents())
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#ff0000"), Some(Rgb([255, 0, 0])));
        assert_eq!(parse_color("#0f0"), Some(Rgb([0, 255, 0])));
        assert_eq!(parse_color("Red"), Some(Rgb([214, 39, 40])));
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("chartreuse-ish"), None);
    }

    #[test]
    fn test_render_dimensions_and_line_color() {
        let img = render_chart(&[0.0, 1.0], &[0.0, 1.0], Rgb([255, 0, 0]));
        assert_eq!(img.dimensions(), (WIDTH, HEIGHT));
        assert!(img.pixels().any(|p| *p == Rgb([255, 0, 0])));
        assert_eq!(*img.get_pixel(WIDTH - 1, 0), BACKGROUND);
    }

    #[test]
    fn test_bounds_flat_series() {
        assert_eq!(bounds(&[3.0, 3.0]), (2.0, 4.0));
        assert_eq!(bounds(&[]), (0.0, 1.0));
    }

    #[test]
    fn test_png_is_decodable() {
        let img = render_chart(&[0.0, 1.0, 2.0], &[1.0, 4.0, 9.0], DEFAULT_LINE);
        let encoded = encode_png_base64(&img).unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap();
        assert_eq!(decoded.width(), WIDTH);
        assert_eq!(decoded.height(), HEIGHT);
    }

    #[tokio::test]
    async fn test_plot_writes_inline_image() {
        let (result, output) = run(vec![json!([1, 4, 9, 16])], json!({})).await;
        result.unwrap();
        assert!(output.starts_with("![Plot](data:image/png;base64,"));
        assert!(output.ends_with(")\n\n"));
    }

    #[tokio::test]
    async fn test_plot_alt_text_is_fixed() {
        let (result, output) = run(
            vec![json!([1, 2, 3]), json!([3.5, 1.0, 2.0])],
            json!({"color": "green"}),
        )
        .await;
        result.unwrap();
        assert!(output.starts_with("![Plot](data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_plot_rejects_unknown_keywords() {
        let (result, output) = run(vec![json!([1, 2, 3])], json!({"title": "Pace"})).await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "plot() got an unexpected keyword argument 'title'"
        );
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_plot_rejects_bad_input() {
        let (result, output) = run(vec![json!([1, 2]), json!([1, 2, 3])], json!({})).await;
        assert!(result.unwrap_err().to_string().contains("same first dimension"));
        assert!(output.is_empty());

        let (result, _) = run(vec![json!(["a"])], json!({})).await;
        assert!(result.unwrap_err().to_string().contains("only numbers"));

        let (result, _) = run(vec![], json!({})).await;
        assert!(result.is_err());
    }
}

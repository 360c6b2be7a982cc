//! Diagnostic plots rendered as standalone SVG documents
//!
//! Three charts are produced for a fitted classifier:
//! - confusion matrix heatmap with annotated counts
//! - ROC curve with the chance diagonal
//! - horizontal bar chart of the largest feature importances

use std::fs;
use std::path::Path;

use crate::metrics::RocCurve;
use crate::{Error, Result};

/// RGB color for plot elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    /// Red component (0-255)
    pub r: u8,
    /// Green component (0-255)
    pub g: u8,
    /// Blue component (0-255)
    pub b: u8,
}

impl Color {
    /// Create a new color
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert to CSS color string
    #[must_use]
    pub fn to_css(&self) -> String {
        format!("rgb({},{},{})", self.r, self.g, self.b)
    }

    /// Linear blend from `self` (t = 0) to `other` (t = 1)
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn mix(&self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let lerp = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
        Self::new(lerp(self.r, other.r), lerp(self.g, other.g), lerp(self.b, other.b))
    }

    /// Curve/bar blue
    pub const BLUE: Color = Color::new(31, 119, 180);
    /// Diagonal reference orange
    pub const ORANGE: Color = Color::new(255, 127, 14);
    /// Heatmap low end
    pub const PALE: Color = Color::new(247, 251, 255);
    /// Heatmap high end
    pub const NAVY: Color = Color::new(8, 48, 107);
}

/// Canvas size, margins and captions
#[derive(Debug, Clone)]
pub struct PlotConfig {
    /// Plot width in pixels
    pub width: u32,
    /// Plot height in pixels
    pub height: u32,
    /// Left margin
    pub margin_left: u32,
    /// Right margin
    pub margin_right: u32,
    /// Top margin
    pub margin_top: u32,
    /// Bottom margin
    pub margin_bottom: u32,
    /// Title
    pub title: String,
    /// X-axis label
    pub x_label: Option<String>,
    /// Y-axis label
    pub y_label: Option<String>,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            margin_left: 80,
            margin_right: 40,
            margin_top: 50,
            margin_bottom: 60,
            title: String::new(),
            x_label: None,
            y_label: None,
        }
    }
}

impl PlotConfig {
    /// Create a new config with title
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set dimensions
    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set labels
    #[must_use]
    pub fn with_labels(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.x_label = Some(x.into());
        self.y_label = Some(y.into());
        self
    }

    /// Plot area as `(x, y, width, height)`
    #[must_use]
    pub fn plot_area(&self) -> (f64, f64, f64, f64) {
        (
            f64::from(self.margin_left),
            f64::from(self.margin_top),
            f64::from(self.width - self.margin_left - self.margin_right),
            f64::from(self.height - self.margin_top - self.margin_bottom),
        )
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Opening tag, styles, background, title and axis captions.
fn open_document(config: &PlotConfig) -> String {
    let mut svg = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">
<style>
    .title {{ font: bold 16px sans-serif; }}
    .label {{ font: 12px sans-serif; }}
    .axis {{ font: 10px sans-serif; }}
    .cell {{ font: bold 14px sans-serif; }}
    .grid {{ stroke: #e0e0e0; stroke-width: 1; }}
</style>
<rect width="100%" height="100%" fill="white"/>
<text x="{cx}" y="28" class="title" text-anchor="middle">{title}</text>
"#,
        w = config.width,
        h = config.height,
        cx = config.width / 2,
        title = escape(&config.title),
    );

    let (x_off, y_off, plot_w, plot_h) = config.plot_area();
    if let Some(label) = &config.x_label {
        svg.push_str(&format!(
            r#"<text x="{:.1}" y="{}" class="label" text-anchor="middle">{}</text>
"#,
            x_off + plot_w / 2.0,
            config.height - 15,
            escape(label)
        ));
    }
    if let Some(label) = &config.y_label {
        let cy = y_off + plot_h / 2.0;
        svg.push_str(&format!(
            r#"<text x="20" y="{cy:.1}" class="label" text-anchor="middle" transform="rotate(-90,20,{cy:.1})">{}</text>
"#,
            escape(label)
        ));
    }
    svg
}

/// Grid, axes and tick labels for a plot spanning `[0, x_max] × [0, y_max]`.
fn unit_axes(config: &PlotConfig, x_max: f64, y_max: f64, steps: u32) -> String {
    let (x_off, y_off, plot_w, plot_h) = config.plot_area();
    let mut svg = String::new();

    for i in 0..=steps {
        let frac = f64::from(i) / f64::from(steps);
        let x = x_off + plot_w * frac;
        let y = y_off + plot_h - plot_h * frac;
        svg.push_str(&format!(
            r#"<line x1="{x:.1}" y1="{y_off:.1}" x2="{x:.1}" y2="{:.1}" class="grid"/>
<line x1="{x_off:.1}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" class="grid"/>
<text x="{x:.1}" y="{:.1}" class="axis" text-anchor="middle">{:.2}</text>
<text x="{:.1}" y="{:.1}" class="axis" text-anchor="end">{:.2}</text>
"#,
            y_off + plot_h,
            x_off + plot_w,
            y_off + plot_h + 18.0,
            x_max * frac,
            x_off - 8.0,
            y + 4.0,
            y_max * frac,
        ));
    }

    svg.push_str(&format!(
        r#"<line x1="{x_off:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="black" stroke-width="2"/>
<line x1="{x_off:.1}" y1="{y_off:.1}" x2="{x_off:.1}" y2="{:.1}" stroke="black" stroke-width="2"/>
"#,
        y_off + plot_h,
        x_off + plot_w,
        y_off + plot_h,
        y_off + plot_h,
    ));
    svg
}

/// Render a 2 × 2 confusion matrix (`[[tn, fp], [fn, tp]]`) as a heatmap.
///
/// # Errors
///
/// Returns `Error::Plot` if every cell is zero.
#[allow(clippy::cast_precision_loss)]
pub fn confusion_matrix_svg(cm: &[[usize; 2]; 2], title: &str) -> Result<String> {
    let max = cm.iter().flatten().copied().max().unwrap_or(0);
    if max == 0 {
        return Err(Error::Plot("confusion matrix is empty".to_string()));
    }

    let config = PlotConfig::new(title)
        .with_size(520, 480)
        .with_labels("Predicted label", "True label");
    let (x_off, y_off, plot_w, plot_h) = config.plot_area();
    let (cell_w, cell_h) = (plot_w / 2.0, plot_h / 2.0);
    let mut svg = open_document(&config);

    for (row, counts) in cm.iter().enumerate() {
        for (col, &count) in counts.iter().enumerate() {
            let t = count as f64 / max as f64;
            let fill = Color::PALE.mix(Color::NAVY, t);
            let text_fill = if t > 0.5 { "white" } else { "black" };
            let x = x_off + cell_w * col as f64;
            let y = y_off + cell_h * row as f64;
            svg.push_str(&format!(
                r#"<rect x="{x:.1}" y="{y:.1}" width="{cell_w:.1}" height="{cell_h:.1}" fill="{}" stroke="white"/>
<text x="{:.1}" y="{:.1}" class="cell" text-anchor="middle" fill="{text_fill}">{count}</text>
"#,
                fill.to_css(),
                x + cell_w / 2.0,
                y + cell_h / 2.0 + 5.0,
            ));
        }
    }

    for class in 0..2u32 {
        let offset = f64::from(class) + 0.5;
        svg.push_str(&format!(
            r#"<text x="{:.1}" y="{:.1}" class="axis" text-anchor="middle">{class}</text>
<text x="{:.1}" y="{:.1}" class="axis" text-anchor="end">{class}</text>
"#,
            x_off + cell_w * offset,
            y_off + plot_h + 18.0,
            x_off - 8.0,
            y_off + cell_h * offset + 4.0,
        ));
    }

    svg.push_str("</svg>\n");
    Ok(svg)
}

/// Render an ROC curve with the dashed chance diagonal.
///
/// # Errors
///
/// Returns `Error::Plot` if the curve has fewer than two points.
pub fn roc_curve_svg(curve: &RocCurve, auc: f64) -> Result<String> {
    if curve.fpr.len() < 2 || curve.fpr.len() != curve.tpr.len() {
        return Err(Error::Plot("ROC curve needs at least two points".to_string()));
    }

    let config = PlotConfig::new(format!("ROC Curve (AUC={auc:.3})"))
        .with_labels("False Positive Rate", "True Positive Rate");
    let (x_off, y_off, plot_w, plot_h) = config.plot_area();
    let to_px = |fpr: f64, tpr: f64| (x_off + fpr * plot_w, y_off + plot_h - tpr * plot_h);

    let mut svg = open_document(&config);
    svg.push_str(&unit_axes(&config, 1.0, 1.0, 5));

    let (x0, y0) = to_px(0.0, 0.0);
    let (x1, y1) = to_px(1.0, 1.0);
    svg.push_str(&format!(
        r#"<line x1="{x0:.1}" y1="{y0:.1}" x2="{x1:.1}" y2="{y1:.1}" stroke="{}" stroke-width="1.5" stroke-dasharray="6,4"/>
"#,
        Color::ORANGE.to_css()
    ));

    let points: Vec<String> = curve
        .fpr
        .iter()
        .zip(&curve.tpr)
        .map(|(&f, &t)| {
            let (x, y) = to_px(f, t);
            format!("{x:.1},{y:.1}")
        })
        .collect();
    svg.push_str(&format!(
        r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="2"/>
"#,
        points.join(" "),
        Color::BLUE.to_css()
    ));

    svg.push_str("</svg>\n");
    Ok(svg)
}

/// Indices of the `top_k` largest values, smallest of them first.
#[must_use]
pub fn top_k_indices(values: &[f64], top_k: usize) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));
    idx.split_off(idx.len().saturating_sub(top_k))
}

/// Render the `top_k` largest importances as horizontal bars labelled
/// `f<index>`, largest at the top.
///
/// # Errors
///
/// Returns `Error::Plot` if there are no importances or `top_k` is zero.
#[allow(clippy::cast_precision_loss)]
pub fn feature_importance_svg(importances: &[f64], top_k: usize) -> Result<String> {
    if importances.is_empty() || top_k == 0 {
        return Err(Error::Plot("no feature importances to plot".to_string()));
    }
    let shown = top_k_indices(importances, top_k);
    let x_max = shown
        .iter()
        .map(|&i| importances[i])
        .fold(0.0_f64, f64::max)
        .max(f64::EPSILON)
        * 1.1;

    let config = PlotConfig::new(format!("Top {} Feature Importances (RF)", shown.len()))
        .with_size(640, 520)
        .with_labels("Importance", "Feature");
    let (x_off, y_off, plot_w, plot_h) = config.plot_area();
    let mut svg = open_document(&config);
    svg.push_str(&unit_axes(&config, x_max, 0.0, 4));

    let slot = plot_h / shown.len() as f64;
    for (rank, &feature) in shown.iter().enumerate() {
        // rank 0 is the smallest shown bar; it sits at the bottom.
        let y = y_off + plot_h - slot * (rank as f64 + 1.0) + slot * 0.1;
        let bar_w = importances[feature] / x_max * plot_w;
        svg.push_str(&format!(
            r#"<rect x="{x_off:.1}" y="{y:.1}" width="{bar_w:.1}" height="{:.1}" fill="{}"/>
<text x="{:.1}" y="{:.1}" class="axis" text-anchor="end">f{feature}</text>
"#,
            slot * 0.8,
            Color::BLUE.to_css(),
            x_off - 8.0,
            y + slot * 0.4 + 4.0,
        ));
    }

    svg.push_str("</svg>\n");
    Ok(svg)
}

/// Write an SVG document to `path`.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be written.
pub fn write_svg(path: impl AsRef<Path>, svg: &str) -> Result<()> {
    fs::write(path, svg)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_css_and_mix() {
        assert_eq!(Color::BLUE.to_css(), "rgb(31,119,180)");
        assert_eq!(Color::PALE.mix(Color::NAVY, 0.0), Color::PALE);
        assert_eq!(Color::PALE.mix(Color::NAVY, 1.0), Color::NAVY);
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b & c>"), "a&lt;b &amp; c&gt;");
    }

    #[test]
    fn test_confusion_matrix_svg_counts() {
        let svg = confusion_matrix_svg(&[[40, 3], [2, 69]], "Confusion Matrix").unwrap();
        assert!(svg.starts_with("<?xml"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains("Confusion Matrix"));
        for count in ["40", "3", "2", "69"] {
            assert!(svg.contains(&format!(">{count}</text>")));
        }
        assert_eq!(svg.matches("<rect x=").count(), 4);
    }

    #[test]
    fn test_confusion_matrix_svg_empty() {
        assert!(matches!(
            confusion_matrix_svg(&[[0, 0], [0, 0]], "cm"),
            Err(Error::Plot(_))
        ));
    }

    #[test]
    fn test_roc_curve_svg() {
        let curve = RocCurve {
            fpr: vec![0.0, 0.0, 1.0],
            tpr: vec![0.0, 1.0, 1.0],
            thresholds: vec![f64::INFINITY, 0.9, 0.1],
        };
        let svg = roc_curve_svg(&curve, 1.0).unwrap();
        assert!(svg.contains("ROC Curve (AUC=1.000)"));
        assert!(svg.contains("False Positive Rate"));
        assert!(svg.contains("stroke-dasharray"));
        assert!(svg.contains("<polyline"));
    }

    #[test]
    fn test_roc_curve_svg_rejects_single_point() {
        let curve = RocCurve {
            fpr: vec![0.0],
            tpr: vec![0.0],
            thresholds: vec![f64::INFINITY],
        };
        assert!(roc_curve_svg(&curve, 0.5).is_err());
    }

    #[test]
    fn test_top_k_indices() {
        let values = [0.1, 0.5, 0.05, 0.3];
        assert_eq!(top_k_indices(&values, 2), vec![3, 1]);
        assert_eq!(top_k_indices(&values, 10).len(), 4);
    }

    #[test]
    fn test_feature_importance_svg() {
        let importances: Vec<f64> = (0..30).map(|i| f64::from(i) / 435.0).collect();
        let svg = feature_importance_svg(&importances, 12).unwrap();
        assert!(svg.contains("Top 12 Feature Importances (RF)"));
        assert!(svg.contains(">f29</text>"));
        assert!(svg.contains(">f18</text>"));
        assert!(!svg.contains(">f17</text>"));
    }

    #[test]
    fn test_write_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.svg");
        write_svg(&path, "<svg/>").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "<svg/>");
    }
}

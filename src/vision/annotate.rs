//! Bounding-box overlays rendered as an SVG document over the analysed
//! image.

use std::fmt::Write as _;

use serde::Serialize;
use utoipa::ToSchema;

use super::{
    classes::DetectionClass,
    inference::{ImageSize, Prediction},
    source::ImagePayload,
};

const STROKE_WIDTH: f64 = 3.0;
const FONT_SIZE: f64 = 16.0;
const LABEL_HEIGHT: f64 = 25.0;
const LABEL_PADDING: f64 = 10.0;
/// Average advance of a 16px sans-serif glyph.
const CHAR_WIDTH: f64 = 9.0;

/// Used when the API did not report the image dimensions.
const FALLBACK_SIZE: ImageSize = ImageSize { width: 640.0, height: 640.0 };

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Converts a centre-based box into its top-left corner form.
    pub fn from_center(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { left: x - width / 2.0, top: y - height / 2.0, width, height }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Overlay {
    pub bbox: Rect,
    #[schema(value_type = String)]
    pub color: &'static str,
    pub label: String,
    /// Filled background of the label, sitting on top of the box.
    pub label_box: Rect,
    pub text_x: f64,
    pub text_y: f64,
}

pub fn label_for(p: &Prediction) -> String {
    format!("{} ({:.1}%)", p.class, p.confidence * 100.0)
}

impl Overlay {
    pub fn for_prediction(p: &Prediction) -> Self {
        let bbox = Rect::from_center(p.x, p.y, p.width, p.height);
        let label = label_for(p);
        let text_width = label.chars().count() as f64 * CHAR_WIDTH;
        Self {
            bbox,
            color: DetectionClass::parse(&p.class).color(),
            label_box: Rect {
                left: bbox.left,
                top: bbox.top - LABEL_HEIGHT,
                width: text_width + LABEL_PADDING,
                height: LABEL_HEIGHT,
            },
            text_x: bbox.left + 5.0,
            text_y: bbox.top - 5.0,
            label,
        }
    }
}

/// Overlays for a detection result; classification results get none.
pub fn overlays(predictions: &[Prediction], is_classification: bool) -> Vec<Overlay> {
    if is_classification {
        return Vec::new();
    }
    predictions.iter().map(Overlay::for_prediction).collect()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// SVG with the image embedded as a data URI and one box plus label per
/// overlay.
pub fn render_svg(image: &ImagePayload, size: Option<ImageSize>, overlays: &[Overlay]) -> String {
    let ImageSize { width, height } = size.unwrap_or(FALLBACK_SIZE);
    let mut svg = String::new();
    // Writing into a String cannot fail.
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    let _ = write!(
        svg,
        r#"<image href="{}" x="0" y="0" width="{width}" height="{height}"/>"#,
        image.data_uri()
    );

    for o in overlays {
        let Rect { left, top, width, height } = o.bbox;
        let _ = write!(
            svg,
            r#"<rect x="{left}" y="{top}" width="{width}" height="{height}" fill="none" stroke="{}" stroke-width="{STROKE_WIDTH}"/>"#,
            o.color
        );
        let lb = o.label_box;
        let _ = write!(
            svg,
            r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}"/>"#,
            lb.left, lb.top, lb.width, lb.height, o.color
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" fill="white" font-family="Arial" font-size="{FONT_SIZE}">{}</text>"#,
            o.text_x,
            o.text_y,
            escape(&o.label)
        );
    }

    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(class: &str, confidence: f64) -> Prediction {
        Prediction { class: class.to_owned(), confidence, x: 100.0, y: 100.0, width: 40.0, height: 20.0 }
    }

    #[test]
    fn centre_box_converts_to_top_left() {
        let r = Rect::from_center(100.0, 100.0, 40.0, 20.0);
        assert_eq!((r.left, r.top), (80.0, 90.0));
        assert_eq!((r.width, r.height), (40.0, 20.0));
    }

    #[test]
    fn label_sits_above_the_box() {
        let o = Overlay::for_prediction(&prediction("ripe", 0.8771));
        assert_eq!(o.label, "ripe (87.7%)");
        assert_eq!(o.color, "#22c55e");
        assert_eq!(o.label_box.top, 65.0);
        assert_eq!(o.label_box.height, 25.0);
        assert_eq!(o.label_box.width, 12.0 * CHAR_WIDTH + 10.0);
        assert_eq!((o.text_x, o.text_y), (85.0, 85.0));
    }

    #[test]
    fn classification_draws_nothing() {
        assert!(overlays(&[prediction("healthy", 0.9)], true).is_empty());
        assert_eq!(overlays(&[prediction("healthy", 0.9)], false).len(), 1);
    }

    #[test]
    fn svg_embeds_image_and_escapes_labels() {
        let image = ImagePayload { mime: "image/png".to_owned(), base64: "AAAA".to_owned() };
        let svg = render_svg(
            &image,
            Some(ImageSize { width: 320.0, height: 240.0 }),
            &overlays(&[prediction("<odd>", 0.5)], false),
        );

        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains(r#"href="data:image/png;base64,AAAA""#));
        assert!(svg.contains(r#"width="320""#));
        assert!(svg.contains(r#"<rect x="80" y="90" width="40" height="20""#));
        assert!(svg.contains("stroke=\"#3b82f6\""));
        assert!(svg.contains("&lt;odd&gt; (50.0%)"));
    }
}

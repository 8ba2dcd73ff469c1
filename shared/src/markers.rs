use serde::{Deserialize, Serialize};

/// Marker set declaration, created on first use and reused afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerSetSpec {
    pub id: String,
    pub label: String,
    pub toggleable: bool,
    pub default_hidden: bool,
}

/// Filled polygon with an outline, drawn at a fixed altitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeMarker {
    pub label: String,
    /// `(x, z)` vertices in world coordinates.
    pub shape: Vec<(f64, f64)>,
    pub altitude: f64,
    pub line_color: u32,
    pub line_width: u32,
    pub fill_color: u32,
    pub depth_test: bool,
}

/// Floating HTML label anchored at a world position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlMarker {
    pub label: String,
    pub position: [f64; 3],
    pub html: String,
    pub anchor: [i32; 2],
    pub min_distance: f64,
    pub max_distance: f64,
    pub listed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Marker {
    Shape(ShapeMarker),
    Html(HtmlMarker),
}

impl Marker {
    pub fn label(&self) -> &str {
        match self {
            Self::Shape(shape) => &shape.label,
            Self::Html(html) => &html.label,
        }
    }
}

/// Minimal HTML escaping for text placed inside marker markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(
            escape_html("<b>\"Old\" Ash & Co's</b>"),
            "&lt;b&gt;&quot;Old&quot; Ash &amp; Co&#39;s&lt;/b&gt;"
        );
        assert_eq!(escape_html("Stonehaven"), "Stonehaven");
    }

    #[test]
    fn markers_serialize_with_a_type_tag() {
        let marker = Marker::Html(HtmlMarker {
            label: "A1".to_string(),
            position: [0.5, 80.0, 0.5],
            html: "<div>A1</div>".to_string(),
            anchor: [0, 0],
            min_distance: 0.0,
            max_distance: 10_000.0,
            listed: false,
        });
        let json = serde_json::to_value(&marker).expect("marker should serialize");
        assert_eq!(json["type"], "html");
        assert_eq!(json["label"], "A1");
        assert_eq!(marker.label(), "A1");
    }
}

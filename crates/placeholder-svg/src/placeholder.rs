//! Inline SVG placeholder generation

/// Width and height used when a dimension is missing or zero
pub const DEFAULT_SIZE: u32 = 400;

/// Label used when none is given
pub const DEFAULT_LABEL: &str = "No Image";

/// Flat background of the placeholder, also painted behind patched images
pub const BACKGROUND_COLOR: &str = "#f0f0f0";

const TEXT_COLOR: &str = "#666";
const FONT_FAMILY: &str = "Arial, sans-serif";
const MIN_FONT_SIZE: u32 = 16;
const FONT_SCALE: f64 = 0.12;

/// A placeholder image: flat background with a centered label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    width: u32,
    height: u32,
    label: String,
}

impl Placeholder {
    /// Missing or zero dimensions become [`DEFAULT_SIZE`], a missing or empty
    /// label becomes [`DEFAULT_LABEL`]
    pub fn new(width: Option<u32>, height: Option<u32>, label: Option<&str>) -> Self {
        let dimension = |v: Option<u32>| v.filter(|&v| v > 0).unwrap_or(DEFAULT_SIZE);
        Self {
            width: dimension(width),
            height: dimension(height),
            label: label
                .filter(|l| !l.is_empty())
                .unwrap_or(DEFAULT_LABEL)
                .to_string(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// 12% of the shorter side, never below 16px
    pub fn font_size(&self) -> u32 {
        let shorter = f64::from(self.width.min(self.height));
        ((shorter * FONT_SCALE).round() as u32).max(MIN_FONT_SIZE)
    }

    /// Standalone SVG document
    pub fn to_svg(&self) -> String {
        format!(
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
                r#"<rect width="100%" height="100%" fill="{bg}"/>"#,
                r#"<text x="50%" y="50%" dominant-baseline="middle" text-anchor="middle" "#,
                r#"font-family="{font}" font-size="{size}" fill="{fg}">{label}</text>"#,
                "</svg>"
            ),
            w = self.width,
            h = self.height,
            bg = BACKGROUND_COLOR,
            font = FONT_FAMILY,
            size = self.font_size(),
            fg = TEXT_COLOR,
            label = escape_xml(&self.label),
        )
    }

    /// `data:` URI that can be assigned directly as an image source
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:image/svg+xml;charset=UTF-8,{}",
            urlencoding::encode(&self.to_svg())
        )
    }
}

/// Data URI for a placeholder with the given dimensions and label
pub fn generate(width: Option<u32>, height: Option<u32>, label: Option<&str>) -> String {
    Placeholder::new(width, height, label).to_data_uri()
}

fn escape_xml(text: &str) -> String {
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

//! SVG defect overlay serializer.
//!
//! Renders defect boxes as `<rect>` outlines with their category name
//! as `<text>` at the top-left corner, in the same colors the raster
//! annotations use. The document uses the inspected image's pixel
//! coordinates, so it can be layered over the PNG (or reference it as
//! a background `<image>`).
//!
//! Optional [`SvgMetadata`] embeds `<title>` and `<desc>` elements for
//! accessibility and to help file managers identify exported files.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use image::Rgb;
use svg::Document;
use svg::node::element::{Description, Element, Group, Rectangle, Title};
use svg::node::{Node, Text};

use pcbscan_pipeline::aggregate::{BOX_COLOR, BOX_THICKNESS, LABEL_COLOR};
use pcbscan_pipeline::{Defect, Dimensions};

/// Label font size in pixels.
const LABEL_FONT_SIZE: u32 = 14;

/// Metadata to embed in the SVG document.
///
/// All fields are optional. Text values are XML-escaped automatically
/// by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the test image filename (without extension).
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized inspection configuration, emitted inside a
    /// `<metadata>` element wrapped in a namespaced `<pcbscan:config>`
    /// element so overlays carry machine-parseable settings.
    pub config_json: Option<&'a str>,

    /// Relative URL of the inspected image, emitted as a full-size
    /// background `<image>` beneath the boxes.
    pub background_href: Option<&'a str>,
}

/// CSS `rgb()` notation for a pixel color.
fn css_color(Rgb([r, g, b]): Rgb<u8>) -> String {
    format!("rgb({r},{g},{b})")
}

/// Serialize `defects` as an SVG overlay sized to `dimensions`.
///
/// Boxes keep their unclamped coordinates; the `viewBox` clips any part
/// lying outside the image.
#[must_use]
pub fn to_overlay_svg(
    defects: &[Defect],
    dimensions: Dimensions,
    metadata: &SvgMetadata<'_>,
) -> String {
    let (w, h) = (dimensions.width, dimensions.height);
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(config_json) = metadata.config_json {
        let mut config_el = Element::new("pcbscan:config");
        config_el.assign("xmlns:pcbscan", "https://pcbscan.dev/ns/1");
        config_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(config_el);
        doc = doc.add(metadata_el);
    }

    if let Some(href) = metadata.background_href {
        let mut image = Element::new("image");
        image.assign("href", href);
        image.assign("x", 0);
        image.assign("y", 0);
        image.assign("width", w);
        image.assign("height", h);
        doc = doc.add(image);
    }

    let mut group = Group::new()
        .set("id", "defects")
        .set("fill", "none")
        .set("stroke", css_color(BOX_COLOR))
        .set("stroke-width", BOX_THICKNESS);

    for defect in defects {
        let b = defect.bbox;
        let name = defect.category.name();
        let rect = Rectangle::new()
            .set("x", b.x1)
            .set("y", b.y1)
            .set("width", b.width())
            .set("height", b.height())
            .set("data-category", name);
        group = group.add(rect);

        let mut label = Element::new("text");
        label.assign("x", b.x1);
        label.assign("y", b.y1);
        label.assign("fill", css_color(LABEL_COLOR));
        label.assign("stroke", "none");
        label.assign("font-size", LABEL_FONT_SIZE);
        label.assign("font-family", "sans-serif");
        label.append(Text::new(name));
        group = group.add(label);
    }
    doc = doc.add(group);

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

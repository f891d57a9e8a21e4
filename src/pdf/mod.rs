// Certificate rendering: draws the student name over the first page of a
// blank template, shrinking the font until the name fits the configured width.
mod color;
mod metrics;
mod overlay;

pub use color::{parse_color, Rgb};
pub use metrics::{encode_win_ansi, StandardFont};

use lopdf::content::Operation;
use lopdf::{Document, Object, StringFormat};
use serde::{Deserialize, Serialize};

use crate::positioning::{PositioningConfig, TextAlign, DEFAULT_FONT_SIZE, MAX_FONT_SIZE};

/// Offset between the preview's CSS box top and the PDF text box, in points.
pub const DEFAULT_VERTICAL_CORRECTION: f32 = 17.0;
pub const MIN_FONT_SIZE: f32 = 8.0;
pub const FONT_SIZE_STEP: f32 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("invalid template document: {0}")]
    Parse(#[source] lopdf::Error),

    #[error("no pages")]
    NoPages,

    #[error("malformed page: {0}")]
    MalformedPage(String),

    #[error("malformed document structure: {0}")]
    Structure(#[from] lopdf::Error),

    #[error("failed to encode overlay: {0}")]
    Encode(String),

    #[error("failed to write document: {0}")]
    Write(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub vertical_correction: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            vertical_correction: DEFAULT_VERTICAL_CORRECTION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Where and how the name ends up on the page. Coordinates use the PDF
/// convention: origin at the bottom-left corner of the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameLayout {
    pub font: StandardFont,
    pub base_font_size: f32,
    pub font_size: f32,
    pub text_width: f32,
    pub max_width: f32,
    /// Left edge of the alignment box.
    pub box_left: f32,
    pub box_width: f32,
    /// Bottom of the text box.
    pub y: f32,
    /// Where the glyph origin of the first character is placed.
    pub x: f32,
    pub baseline: f32,
    pub align: TextAlign,
    pub color: Rgb,
}

/// Largest size (stepping down from `base` by [`FONT_SIZE_STEP`]) at which
/// `text` fits in `max_width`, stopping at [`MIN_FONT_SIZE`].
/// Returns the size and the measured width at that size.
///
/// `base` is clamped to [`MAX_FONT_SIZE`]. Each step is computed from `base`
/// and a step count so that the size always decreases.
pub fn fit_font_size(font: StandardFont, text: &str, base: f32, max_width: f32) -> (f32, f32) {
    let base = if base.is_finite() { base.min(MAX_FONT_SIZE) } else { DEFAULT_FONT_SIZE };
    let mut steps: u32 = 0;
    let mut size = base;
    let mut width = font.text_width(text, size);
    while width > max_width && size > MIN_FONT_SIZE {
        steps += 1;
        size = base - steps as f32 * FONT_SIZE_STEP;
        width = font.text_width(text, size);
    }
    (size, width)
}

pub fn layout_name(
    page: PageSize,
    config: &PositioningConfig,
    name: &str,
    settings: &RenderSettings,
) -> NameLayout {
    let font = StandardFont::select(config.font_family(), config.font_weight());
    let base_font_size = config.base_font_size();
    let max_width = config.max_width();
    let (font_size, text_width) = fit_font_size(font, name, base_font_size, max_width);

    // y depends on the final size, so it is computed after fitting
    let y = page.height - config.top() - font_size - settings.vertical_correction;

    let box_left = config.left();
    let box_width = page.width - 2.0 * box_left;
    let align = config.text_align();
    let x = match align {
        TextAlign::Left => box_left,
        TextAlign::Center => box_left + (box_width - text_width) / 2.0,
        TextAlign::Right => box_left + box_width - text_width,
    };

    NameLayout {
        font,
        base_font_size,
        font_size,
        text_width,
        max_width,
        box_left,
        box_width,
        y,
        x,
        baseline: y + font.descent() * font_size / 1000.0,
        align,
        color: parse_color(config.color()),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Renderer {
    settings: RenderSettings,
}

impl Renderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn render(
        &self,
        template: &[u8],
        config: &PositioningConfig,
        student_name: &str,
    ) -> Result<Vec<u8>, RenderError> {
        self.render_with_layout(template, config, student_name)
            .map(|(bytes, _)| bytes)
    }

    /// Renders and also returns the computed layout. `template` is only read;
    /// the document is parsed into a fresh in-memory copy.
    pub fn render_with_layout(
        &self,
        template: &[u8],
        config: &PositioningConfig,
        student_name: &str,
    ) -> Result<(Vec<u8>, NameLayout), RenderError> {
        let mut doc = Document::load_mem(template).map_err(RenderError::Parse)?;

        let page_id = *doc.get_pages().values().next().ok_or(RenderError::NoPages)?;
        let page = overlay::page_box(&doc, page_id)?;
        tracing::debug!("Template page size: {}x{}", page.width, page.height);

        let layout = layout_name(
            PageSize {
                width: page.width,
                height: page.height,
            },
            config,
            student_name,
            &self.settings,
        );
        if layout.font_size != layout.base_font_size {
            tracing::info!(
                "Auto-fit applied: {}pt -> {}pt (text width {:.1} / max {:.1})",
                layout.base_font_size,
                layout.font_size,
                layout.text_width,
                layout.max_width
            );
        }

        let font_name = overlay::register_font(&mut doc, page_id, layout.font)?;
        let [r, g, b] = layout.color.components();
        let operations = vec![
            Operation::new("q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font_name), layout.font_size.into()]),
            Operation::new("rg", vec![r.into(), g.into(), b.into()]),
            Operation::new(
                "Td",
                vec![(page.llx + layout.x).into(), (page.lly + layout.baseline).into()],
            ),
            Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(student_name), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ];
        overlay::overlay_content(&mut doc, page_id, operations)?;

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|e| RenderError::Write(e.to_string()))?;

        Ok((output, layout))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream, StringFormat};

    fn save(mut doc: Document) -> Vec<u8> {
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn page_content(label: &str) -> Vec<u8> {
        Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![40.into(), 40.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::String(label.as_bytes().to_vec(), StringFormat::Literal)],
                ),
                Operation::new("ET", vec![]),
            ],
        }
        .encode()
        .unwrap()
    }

    /// A template with `pages` pages, each carrying its own MediaBox.
    pub fn blank_pdf(width: f32, height: f32, pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = vec![];
        for i in 1..=pages {
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                page_content(&format!("Template Page {}", i)),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => Object::Array(vec![0.into(), 0.into(), width.into(), height.into()]),
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }
            .into(),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        save(doc)
    }

    /// A one-page template whose MediaBox and Resources live on the page tree root.
    pub fn blank_pdf_inherited(width: f32, height: f32) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content_id = doc.add_object(Stream::new(dictionary! {}, page_content("Inherited")));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
                "MediaBox" => Object::Array(vec![0.into(), 0.into(), width.into(), height.into()]),
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            }
            .into(),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        save(doc)
    }
}

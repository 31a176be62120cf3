//! Serialises laid-out pages into a PDF using the base-14 Helvetica faces.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};

use crate::render::encoding::encode_text_string;
use crate::render::font_metrics::FontVariant;
use crate::render::layout::{DrawOp, Page, PageGeometry, Rgb};

const PRODUCER: &str = concat!("stratagem-api ", env!("CARGO_PKG_VERSION"));

fn color_operands(color: Rgb) -> Vec<Object> {
    vec![color.0.into(), color.1.into(), color.2.into()]
}

fn operations(page: &Page) -> Vec<Operation> {
    let mut ops = Vec::new();
    for op in &page.ops {
        match op {
            DrawOp::Text {
                x,
                y,
                font,
                size,
                color,
                bytes,
            } => {
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("rg", color_operands(*color)));
                ops.push(Operation::new(
                    "Tf",
                    vec![
                        Object::Name(font.resource_name().as_bytes().to_vec()),
                        (*size).into(),
                    ],
                ));
                ops.push(Operation::new("Td", vec![(*x).into(), (*y).into()]));
                ops.push(Operation::new(
                    "Tj",
                    vec![Object::string_literal(bytes.clone())],
                ));
                ops.push(Operation::new("ET", vec![]));
            }
            DrawOp::Line {
                x1,
                y1,
                x2,
                y2,
                width,
                color,
            } => {
                ops.push(Operation::new("RG", color_operands(*color)));
                ops.push(Operation::new("w", vec![(*width).into()]));
                ops.push(Operation::new("m", vec![(*x1).into(), (*y1).into()]));
                ops.push(Operation::new("l", vec![(*x2).into(), (*y2).into()]));
                ops.push(Operation::new("S", vec![]));
            }
            DrawOp::Rect {
                x,
                y,
                width,
                height,
                color,
            } => {
                ops.push(Operation::new("rg", color_operands(*color)));
                ops.push(Operation::new(
                    "re",
                    vec![(*x).into(), (*y).into(), (*width).into(), (*height).into()],
                ));
                ops.push(Operation::new("f", vec![]));
            }
        }
    }
    ops
}

fn font_resources(doc: &mut Document) -> Dictionary {
    let mut fonts = Dictionary::new();
    for variant in FontVariant::ALL {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => variant.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(variant.resource_name(), font_id);
    }
    fonts
}

/// Builds the PDF file. Output is a pure function of the inputs.
pub fn write_pdf(
    pages: &[Page],
    geometry: &PageGeometry,
    title: &str,
) -> Result<Vec<u8>, lopdf::Error> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let fonts = font_resources(&mut doc);
    let resources_id = doc.add_object(dictionary! {
        "Font" => fonts,
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let content = Content {
            operations: operations(page),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count,
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            geometry.width.into(),
            geometry.height.into(),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::String(encode_text_string(title), StringFormat::Hexadecimal),
        "Producer" => Object::string_literal(PRODUCER),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}

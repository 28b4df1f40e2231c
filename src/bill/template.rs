//! DOCX template rendering.
//!
//! The template is an Office Open XML package whose text contains `{{ name }}`
//! placeholders. Rendering rewrites the body, header and footer parts and
//! copies every other part unchanged.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use super::image::InlineImage;
use super::models::{RenderContext, IMAGE_KEY};
use super::GeneratorError;

const DOCUMENT_PART: &str = "word/document.xml";
const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const IMAGE_REL_ID: &str = "rIdRentBillImage";
const EMPTY_RELATIONSHIPS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#
);
/// First `wp:docPr` id given to inserted drawings.
const FIRST_DRAWING_ID: u32 = 4201;
const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const NAMESPACES: [(&str, &str); 4] = [
    (
        "wp",
        "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing",
    ),
    (
        "r",
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships",
    ),
    ("a", "http://schemas.openxmlformats.org/drawingml/2006/main"),
    ("pic", "http://schemas.openxmlformats.org/drawingml/2006/picture"),
];

lazy_static! {
    static ref SPLIT_PLACEHOLDER: Regex =
        Regex::new(r"(?s)\{(?:<[^>]*>)*\{(.*?)\}(?:<[^>]*>)*\}").unwrap();
    static ref MARKUP: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap();
    static ref HEADER_FOOTER_PART: Regex =
        Regex::new(r"^word/(header|footer)[0-9]*\.xml$").unwrap();
}

/// Fills the on-disk DOCX template. The template is opened on every call and
/// never written to.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    template_path: PathBuf,
}

impl TemplateRenderer {
    pub fn new(template_path: impl Into<PathBuf>) -> Self {
        Self {
            template_path: template_path.into(),
        }
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    /// File name used in error messages.
    pub fn template_name(&self) -> String {
        self.template_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.template_path.display().to_string())
    }

    pub fn template_exists(&self) -> bool {
        self.template_path.is_file()
    }

    /// Substitute `context` into the template and write the package to `output`.
    pub fn render(&self, context: &RenderContext, output: &Path) -> Result<(), GeneratorError> {
        let file = File::open(&self.template_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GeneratorError::TemplateNotFound(self.template_name())
            } else {
                GeneratorError::TemplateIo(e)
            }
        })?;
        let mut archive = ZipArchive::new(file)?;

        let out = File::create(output).map_err(GeneratorError::WriteDocument)?;
        let mut writer = ZipWriter::new(out);

        let image = context.image();
        let mut has_rels = false;

        for index in 0..archive.len() {
            let name = archive.by_index_raw(index)?.name().to_string();

            let rewritten = match (name.as_str(), image) {
                (DOCUMENT_PART, _) => {
                    Some(render_document(&read_part(&mut archive, index)?, context))
                }
                (DOCUMENT_RELS_PART, Some(image)) => {
                    has_rels = true;
                    Some(add_image_relationship(&read_part(&mut archive, index)?, image))
                }
                (CONTENT_TYPES_PART, Some(image)) => {
                    Some(ensure_content_type(&read_part(&mut archive, index)?, image))
                }
                (part, _) if HEADER_FOOTER_PART.is_match(part) => {
                    let xml = read_part(&mut archive, index)?;
                    Some(substitute(&normalize_placeholders(&xml), context, false))
                }
                _ => None,
            };

            match rewritten {
                Some(xml) => {
                    writer.start_file(
                        name.as_str(),
                        entry_options(CompressionMethod::Deflated),
                    )?;
                    writer
                        .write_all(xml.as_bytes())
                        .map_err(GeneratorError::WriteDocument)?;
                }
                None => {
                    let entry = archive.by_index_raw(index)?;
                    writer.raw_copy_file(entry)?;
                }
            }
        }

        if let Some(image) = image {
            if !has_rels {
                let rels = add_image_relationship(EMPTY_RELATIONSHIPS, image);
                writer.start_file(
                    DOCUMENT_RELS_PART,
                    entry_options(CompressionMethod::Deflated),
                )?;
                writer
                    .write_all(rels.as_bytes())
                    .map_err(GeneratorError::WriteDocument)?;
            }

            let bytes = fs::read(image.path()).map_err(GeneratorError::WriteDocument)?;
            writer.start_file(media_part(image), entry_options(CompressionMethod::Stored))?;
            writer
                .write_all(&bytes)
                .map_err(GeneratorError::WriteDocument)?;
        }

        writer.finish()?;
        log::debug!("Rendered {} into {}", self.template_name(), output.display());
        Ok(())
    }
}

/// Fixed timestamps keep the rendered package byte-stable for identical input.
fn entry_options(method: CompressionMethod) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(method)
        .last_modified_time(DateTime::default())
}

fn read_part(archive: &mut ZipArchive<File>, index: usize) -> Result<String, GeneratorError> {
    let mut xml = String::new();
    archive
        .by_index(index)?
        .read_to_string(&mut xml)
        .map_err(GeneratorError::TemplateIo)?;
    Ok(xml)
}

fn render_document(xml: &str, context: &RenderContext) -> String {
    let rendered = substitute(&normalize_placeholders(xml), context, true);
    if context.image().is_some() {
        ensure_namespaces(&rendered)
    } else {
        rendered
    }
}

/// Collapse placeholders that Word split across runs into a single text node,
/// e.g. `{</w:t></w:r><w:r><w:t>{ month }}` becomes `{{month}}`.
pub fn normalize_placeholders(xml: &str) -> String {
    SPLIT_PLACEHOLDER
        .replace_all(xml, |caps: &Captures| {
            let name = MARKUP.replace_all(&caps[1], "");
            format!("{{{{{}}}}}", name.trim())
        })
        .into_owned()
}

/// Replace `{{ name }}` placeholders. The image placeholder only expands when
/// `allow_image` is set; each expansion gets its own drawing id. Unknown names
/// render empty.
pub fn substitute(xml: &str, context: &RenderContext, allow_image: bool) -> String {
    let mut next_drawing_id = FIRST_DRAWING_ID;
    PLACEHOLDER
        .replace_all(xml, |caps: &Captures| {
            let key = &caps[1];
            if key == IMAGE_KEY {
                return match context.image() {
                    Some(image) if allow_image => {
                        let run = image_run(image, next_drawing_id);
                        next_drawing_id += 1;
                        run
                    }
                    _ => String::new(),
                };
            }
            match context.get(key) {
                Some(value) => escape_xml(value),
                None => {
                    log::debug!("No value for template placeholder '{}'", key);
                    String::new()
                }
            }
        })
        .into_owned()
}

/// Escape text for use inside an XML text node. Characters XML 1.0 does not
/// allow (most C0 controls, U+FFFE, U+FFFF) are dropped.
pub fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            ch if !is_xml_char(ch) => {}
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn is_xml_char(ch: char) -> bool {
    matches!(
        ch,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

fn media_part(image: &InlineImage) -> String {
    format!("word/media/rent_bill_image.{}", image.extension())
}

/// Close the surrounding text run, emit a drawing run, then reopen a text run.
fn image_run(image: &InlineImage, drawing_id: u32) -> String {
    let (cx, cy) = image.extent();
    let name = format!("rent_bill_image.{}", image.extension());
    format!(
        concat!(
            r#"</w:t></w:r><w:r><w:drawing>"#,
            r#"<wp:inline distT="0" distB="0" distL="0" distR="0">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:docPr id="{id}" name="Rent Bill Image {id}"/>"#,
            r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic><pic:nvPicPr><pic:cNvPr id="0" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic>"#,
            r#"</a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#,
            r#"<w:r><w:t xml:space="preserve">"#
        ),
        id = drawing_id,
        cx = cx,
        cy = cy,
        name = name,
        rel = IMAGE_REL_ID,
    )
}

/// Declare the drawing namespaces on the document root if the template lacks them.
fn ensure_namespaces(xml: &str) -> String {
    let Some(start) = xml.find("<w:document") else {
        return xml.to_string();
    };
    let Some(end) = xml[start..].find('>').map(|offset| start + offset) else {
        return xml.to_string();
    };

    let root = &xml[start..end];
    let mut missing = String::new();
    for (prefix, uri) in NAMESPACES {
        if !root.contains(&format!("xmlns:{}=", prefix)) {
            missing.push_str(&format!(r#" xmlns:{}="{}""#, prefix, uri));
        }
    }
    if missing.is_empty() {
        return xml.to_string();
    }

    let insert_at = if xml[..end].ends_with('/') { end - 1 } else { end };
    let mut out = String::with_capacity(xml.len() + missing.len());
    out.push_str(&xml[..insert_at]);
    out.push_str(&missing);
    out.push_str(&xml[insert_at..]);
    out
}

fn add_image_relationship(xml: &str, image: &InlineImage) -> String {
    let relationship = format!(
        r#"<Relationship Id="{}" Type="{}" Target="media/rent_bill_image.{}"/>"#,
        IMAGE_REL_ID,
        IMAGE_REL_TYPE,
        image.extension()
    );
    match xml.rfind("</Relationships>") {
        Some(pos) => format!("{}{}{}", &xml[..pos], relationship, &xml[pos..]),
        None => xml.to_string(),
    }
}

fn ensure_content_type(xml: &str, image: &InlineImage) -> String {
    let extension = format!(r#"extension="{}""#, image.extension());
    if xml.to_ascii_lowercase().contains(&extension) {
        return xml.to_string();
    }
    let default = format!(
        r#"<Default Extension="{}" ContentType="{}"/>"#,
        image.extension(),
        image.mime_type()
    );
    match xml.rfind("</Types>") {
        Some(pos) => format!("{}{}{}", &xml[..pos], default, &xml[pos..]),
        None => xml.to_string(),
    }
}

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use rent_bill_service::bill::converter::Converter;
use rent_bill_service::bill::{BillPipeline, GeneratorError, TemplateRenderer};

pub const PDF_HEADER: &[u8] = b"%PDF-1.4\n";

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"<Override PartName="/word/header1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml"/>"#,
    r#"</Types>"#
);

const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    r#"</Relationships>"#
);

const DOCUMENT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/header" Target="header1.xml"/>"#,
    r#"</Relationships>"#
);

const HEADER: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    r#"<w:p><w:r><w:t>Rent bill for {{ renter_name }}{{ image }}</w:t></w:r></w:p>"#,
    r#"</w:hdr>"#
);

/// Text fields rendered as one paragraph each; `month` is split across runs
/// the way Word stores edited text.
const FIELDS: [&str; 12] = [
    "owner_name",
    "owner_aadhar",
    "owner_acc",
    "renter_name",
    "sr_no",
    "date",
    "mobile",
    "monthly_rent",
    "increment",
    "total_after_increment",
    "tds_amount",
    "amount_paid",
];

pub fn document_xml() -> String {
    let mut body = String::from(
        r#"<w:p><w:r><w:t xml:space="preserve">Month: {</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>{ month }</w:t></w:r><w:r><w:t>}</w:t></w:r></w:p>"#,
    );
    for field in FIELDS {
        body.push_str(&format!(
            r#"<w:p><w:r><w:t xml:space="preserve">{}: {{{{ {} }}}}</w:t></w:r></w:p>"#,
            field, field
        ));
    }
    body.push_str(r#"<w:p><w:r><w:t xml:space="preserve">{{ image }}</w:t></w:r></w:p>"#);

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            r#"<w:body>{}</w:body></w:document>"#
        ),
        body
    )
}

/// Write a minimal bill template package to `path`.
pub fn write_template(path: &Path) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("word/document.xml", document_xml()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS.to_string()),
        ("word/header1.xml", HEADER.to_string()),
    ] {
        zip.start_file(name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// A directory holding `template.docx` and an empty `work/` workspace root.
pub struct Fixture {
    pub dir: TempDir,
    pub template: PathBuf,
    pub work: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.docx");
        write_template(&template);
        let work = dir.path().join("work");
        std::fs::create_dir(&work).unwrap();
        Self {
            dir,
            template,
            work,
        }
    }

    /// Same layout but without a template file.
    pub fn without_template() -> Self {
        let fixture = Self::new();
        std::fs::remove_file(&fixture.template).unwrap();
        fixture
    }

    pub fn pipeline(&self, converter: Arc<dyn Converter>) -> BillPipeline {
        BillPipeline::new(TemplateRenderer::new(&self.template), converter)
            .with_workspace_root(&self.work)
    }

    pub fn workspace_entries(&self) -> usize {
        std::fs::read_dir(&self.work).unwrap().count()
    }
}

/// Converter stand-in: the "PDF" is a fixed header followed by the DOCX bytes.
#[derive(Default)]
pub struct MockConverter {
    calls: AtomicUsize,
    documents: Mutex<Vec<Vec<u8>>>,
    workspace_files: Mutex<Vec<Vec<String>>>,
}

impl MockConverter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_document(&self) -> Vec<u8> {
        self.documents.lock().unwrap().last().cloned().unwrap()
    }

    /// Sorted file names present in the workspace at conversion time.
    pub fn last_workspace_files(&self) -> Vec<String> {
        self.workspace_files.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl Converter for MockConverter {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn convert(&self, source: &Path, target: &Path) -> Result<(), GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let document = std::fs::read(source).map_err(GeneratorError::WriteDocument)?;

        let mut files: Vec<String> = std::fs::read_dir(source.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        self.workspace_files.lock().unwrap().push(files);

        let mut pdf = PDF_HEADER.to_vec();
        pdf.extend_from_slice(&document);
        std::fs::write(target, pdf).map_err(GeneratorError::WriteDocument)?;
        self.documents.lock().unwrap().push(document);
        Ok(())
    }
}

/// Converter that exits non-zero.
pub struct FailingConverter;

#[async_trait]
impl Converter for FailingConverter {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn convert(&self, _source: &Path, _target: &Path) -> Result<(), GeneratorError> {
        Err(GeneratorError::ConverterExit {
            program: "soffice".to_string(),
            code: 1,
            stderr: "source file could not be loaded".to_string(),
        })
    }
}

/// Converter that reports success without producing anything.
pub struct SilentConverter;

#[async_trait]
impl Converter for SilentConverter {
    fn name(&self) -> &'static str {
        "silent"
    }

    async fn convert(&self, _source: &Path, _target: &Path) -> Result<(), GeneratorError> {
        Ok(())
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([180, 40, 40]));
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, image::ImageFormat::Png)
        .unwrap();
    cursor.into_inner()
}

pub fn png_base64(width: u32, height: u32) -> String {
    STANDARD.encode(png_bytes(width, height))
}

/// Strip the mock PDF header to get back the rendered DOCX.
pub fn docx_from_pdf(pdf: &[u8]) -> Vec<u8> {
    assert!(pdf.starts_with(PDF_HEADER));
    pdf[PDF_HEADER.len()..].to_vec()
}

pub fn read_part(docx: &[u8], name: &str) -> Option<String> {
    let mut archive = ZipArchive::new(Cursor::new(docx)).unwrap();
    let mut entry = archive.by_name(name).ok()?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml).unwrap();
    Some(xml)
}

pub fn part_names(docx: &[u8]) -> Vec<String> {
    let archive = ZipArchive::new(Cursor::new(docx)).unwrap();
    archive.file_names().map(String::from).collect()
}

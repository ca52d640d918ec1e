//! Word document rendering of a finished report.
//!
//! A `.docx` file is a zip package; the report body lives in
//! `word/document.xml`. Rendering copies every part of the template
//! untouched except that one, into which the report paragraphs are written.

use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use scout_core::Error;

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Paragraph in a template that the report replaces. Must sit in a single
/// run; otherwise the report is appended to the end of the body.
pub const REPORT_PLACEHOLDER: &str = "{{report}}";

const DOCUMENT_PART: &str = "word/document.xml";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const EMPTY_DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:sectPr/></w:body></w:document>"#;

/// Download name for a company's report.
pub fn report_file_name(company_name: &str) -> String {
    let safe: String = company_name
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    format!("{}_Report.docx", safe)
}

/// Renders report text into a document blob.
pub trait DocumentRenderer: Send + Sync {
    /// Media type of the produced blob.
    fn mime_type(&self) -> &str;

    fn render(&self, template: &Path, report: &str) -> Result<Vec<u8>, Error>;
}

/// Produces `.docx` packages.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxRenderer;

impl DocxRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentRenderer for DocxRenderer {
    fn mime_type(&self) -> &str {
        DOCX_MIME
    }

    fn render(&self, template: &Path, report: &str) -> Result<Vec<u8>, Error> {
        let body = paragraphs(report);

        if !template.exists() {
            debug!(template = %template.display(), "Template not found, building a plain document");
            return minimal_package(&body);
        }

        let file = File::open(template)
            .map_err(|e| Error::render(format!("Failed to open {}: {}", template.display(), e)))?;
        fill_template(file, &body)
    }
}

fn zip_error(e: zip::result::ZipError) -> Error {
    Error::render(e.to_string())
}

fn io_error(e: std::io::Error) -> Error {
    Error::render(e.to_string())
}

fn options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

fn minimal_package(body: &str) -> Result<Vec<u8>, Error> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    let document = insert_body(EMPTY_DOCUMENT, body)?;
    for (name, contents) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", PACKAGE_RELS),
        (DOCUMENT_PART, document.as_str()),
    ] {
        writer.start_file(name, options()).map_err(zip_error)?;
        writer.write_all(contents.as_bytes()).map_err(io_error)?;
    }

    Ok(writer.finish().map_err(zip_error)?.into_inner())
}

fn fill_template<R: Read + std::io::Seek>(reader: R, body: &str) -> Result<Vec<u8>, Error> {
    let mut archive = ZipArchive::new(reader).map_err(zip_error)?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut filled = false;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(zip_error)?;

        if entry.name() == DOCUMENT_PART {
            let mut xml = String::new();
            entry.read_to_string(&mut xml).map_err(io_error)?;
            let document = insert_body(&xml, body)?;

            writer.start_file(DOCUMENT_PART, options()).map_err(zip_error)?;
            writer.write_all(document.as_bytes()).map_err(io_error)?;
            filled = true;
        } else {
            writer.raw_copy_file(entry).map_err(zip_error)?;
        }
    }

    if !filled {
        return Err(Error::render(format!("Template has no {}", DOCUMENT_PART)));
    }

    Ok(writer.finish().map_err(zip_error)?.into_inner())
}

/// Place `body` into a `document.xml`: over the placeholder paragraph when
/// there is one, else at the end of the body ahead of the section
/// properties.
fn insert_body(xml: &str, body: &str) -> Result<String, Error> {
    if let Some((start, end)) = placeholder_paragraph(xml) {
        return Ok(format!("{}{}{}", &xml[..start], body, &xml[end..]));
    }

    let body_end = xml
        .rfind("</w:body>")
        .ok_or_else(|| Error::render("document.xml has no <w:body>"))?;
    let at = xml[..body_end].rfind("<w:sectPr").unwrap_or(body_end);

    Ok(format!("{}{}{}", &xml[..at], body, &xml[at..]))
}

fn placeholder_paragraph(xml: &str) -> Option<(usize, usize)> {
    let at = xml.find(REPORT_PLACEHOLDER)?;
    let before = &xml[..at];
    let start = before.rfind("<w:p>").max(before.rfind("<w:p "))?;
    let end = at + xml[at..].find("</w:p>")? + "</w:p>".len();
    Some((start, end))
}

/// WordprocessingML paragraphs for markdown-ish report text.
fn paragraphs(report: &str) -> String {
    let mut xml = String::new();

    for line in report.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some((level, text)) = heading(line) {
            xml.push_str(&format!(
                "<w:p><w:pPr><w:pStyle w:val=\"Heading{}\"/></w:pPr>{}</w:p>",
                level,
                runs(text, true)
            ));
        } else if let Some(item) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            xml.push_str(&format!(
                "<w:p><w:pPr><w:ind w:left=\"360\"/></w:pPr>{}{}</w:p>",
                run("\u{2022} ", false),
                runs(item, false)
            ));
        } else {
            xml.push_str(&format!("<w:p>{}</w:p>", runs(line, false)));
        }
    }

    xml
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    line[level..].strip_prefix(' ').map(|text| (level, text.trim()))
}

/// `**bold**` spans become bold runs.
fn runs(text: &str, bold: bool) -> String {
    text.split("**")
        .enumerate()
        .filter(|(_, segment)| !segment.is_empty())
        .map(|(i, segment)| run(segment, bold || i % 2 == 1))
        .collect()
}

fn run(text: &str, bold: bool) -> String {
    let properties = if bold { "<w:rPr><w:b/></w:rPr>" } else { "" };
    format!(
        "<w:r>{}<w:t xml:space=\"preserve\">{}</w:t></w:r>",
        properties,
        escape_xml(text)
    )
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

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "**Company Report**\n\n## Financial & Industry Insights\n\
                          - **ERP System:** SAP\n- **SIC Codes:** <none>\nPlain closing line.";

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut part = archive.by_name(name).unwrap();
        let mut contents = String::new();
        part.read_to_string(&mut contents).unwrap();
        contents
    }

    fn write_template(path: &Path, document: &str) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, contents) in [
            ("[Content_Types].xml", CONTENT_TYPES),
            ("_rels/.rels", PACKAGE_RELS),
            ("word/styles.xml", "<w:styles>letterhead</w:styles>"),
            (DOCUMENT_PART, document),
        ] {
            writer.start_file(name, options()).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_report_file_name() {
        assert_eq!(report_file_name("Acme Corp"), "Acme Corp_Report.docx");
        assert_eq!(report_file_name("AC/DC Ltd"), "AC_DC Ltd_Report.docx");
    }

    #[test]
    fn test_minimal_package_without_template() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = DocxRenderer::new()
            .render(&dir.path().join("ModelTemplate.docx"), REPORT)
            .unwrap();

        assert!(bytes.starts_with(b"PK"));
        assert!(read_part(&bytes, "[Content_Types].xml").contains("/word/document.xml"));
        assert!(read_part(&bytes, "_rels/.rels").contains("word/document.xml"));

        let document = read_part(&bytes, DOCUMENT_PART);
        assert!(document.contains("<w:pStyle w:val=\"Heading2\"/>"));
        assert!(document.contains("Financial &amp; Industry Insights"));
        assert!(document.contains("<w:rPr><w:b/></w:rPr><w:t xml:space=\"preserve\">ERP System:</w:t>"));
        assert!(document.contains("&lt;none&gt;"));
        assert!(document.contains("\u{2022} "));
        assert!(document.contains("<w:p><w:r><w:t xml:space=\"preserve\">Plain closing line.</w:t></w:r></w:p>"));
        assert!(document.ends_with("<w:sectPr/></w:body></w:document>"));
    }

    #[test]
    fn test_template_placeholder_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ModelTemplate.docx");
        write_template(
            &path,
            "<w:document><w:body><w:p><w:r><w:t>Letterhead</w:t></w:r></w:p>\
             <w:p w:rsidR=\"00A1\"><w:r><w:t>{{report}}</w:t></w:r></w:p>\
             <w:sectPr><w:pgSz w:w=\"12240\"/></w:sectPr></w:body></w:document>",
        );

        let bytes = DocxRenderer::new().render(&path, REPORT).unwrap();

        assert_eq!(read_part(&bytes, "word/styles.xml"), "<w:styles>letterhead</w:styles>");
        let document = read_part(&bytes, DOCUMENT_PART);
        assert!(!document.contains(REPORT_PLACEHOLDER));
        let letterhead = document.find("Letterhead").unwrap();
        let report = document.find("Company Report").unwrap();
        let section = document.find("<w:sectPr>").unwrap();
        assert!(letterhead < report && report < section);
    }

    #[test]
    fn test_template_without_placeholder_appends_before_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ModelTemplate.docx");
        write_template(
            &path,
            "<w:document><w:body><w:p><w:r><w:t>Letterhead</w:t></w:r></w:p>\
             <w:sectPr/></w:body></w:document>",
        );

        let document = read_part(&DocxRenderer::new().render(&path, REPORT).unwrap(), DOCUMENT_PART);
        assert!(document.starts_with("<w:document><w:body><w:p><w:r><w:t>Letterhead</w:t></w:r></w:p><w:p>"));
        assert!(document.ends_with("</w:p><w:sectPr/></w:body></w:document>"));
    }

    #[test]
    fn test_corrupt_template_is_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ModelTemplate.docx");
        std::fs::write(&path, b"not a zip").unwrap();

        let err = DocxRenderer::new().render(&path, REPORT).unwrap_err();
        assert!(matches!(err, Error::Render(_)));
    }

    #[test]
    fn test_heading_levels() {
        assert_eq!(heading("## Company Overview"), Some((2, "Company Overview")));
        assert_eq!(heading("#hashtag"), None);
        assert_eq!(heading("####### too deep"), None);
    }

    #[test]
    fn test_runs_toggle_bold() {
        assert_eq!(
            runs("a **b** c", false),
            "<w:r><w:t xml:space=\"preserve\">a </w:t></w:r>\
             <w:r><w:rPr><w:b/></w:rPr><w:t xml:space=\"preserve\">b</w:t></w:r>\
             <w:r><w:t xml:space=\"preserve\"> c</w:t></w:r>"
        );
    }
}

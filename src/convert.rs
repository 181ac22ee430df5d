//! Document-to-Markdown conversion.
//!
//! The pipeline treats conversion as an injected collaborator behind the
//! [`Converter`] trait: the orchestrator hands over a staged file path and an
//! extension hint and gets Markdown back. [`MarkdownConverter`] is the bundled
//! implementation — PDF via pdf-extract, OOXML via bounded ZIP entry reads and
//! quick-xml text walking, HTML via html2text, plain text and CSV directly.
//!
//! Conversion never panics on malformed input; it returns an error and the
//! orchestrator reports only the error's class.

use std::io::Read;
use std::path::Path;

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
/// Maximum worksheets processed in a workbook.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum rendered width for HTML-to-text conversion.
const HTML_WIDTH: usize = 100;

/// Conversion failure. Messages may reference entry names or library detail,
/// so callers surface only [`ConvertError::class`].
#[derive(Debug)]
pub enum ConvertError {
    Unsupported(String),
    Pdf(String),
    Ooxml(String),
    Html(String),
    Io(String),
}

impl ConvertError {
    /// Short class name, safe to put in telemetry.
    pub fn class(&self) -> &'static str {
        match self {
            ConvertError::Unsupported(_) => "unsupported",
            ConvertError::Pdf(_) => "pdf",
            ConvertError::Ooxml(_) => "ooxml",
            ConvertError::Html(_) => "html",
            ConvertError::Io(_) => "io",
        }
    }
}

impl std::fmt::Display for ConvertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConvertError::Unsupported(ext) => write!(f, "no converter for extension: {}", ext),
            ConvertError::Pdf(e) => write!(f, "PDF conversion failed: {}", e),
            ConvertError::Ooxml(e) => write!(f, "OOXML conversion failed: {}", e),
            ConvertError::Html(e) => write!(f, "HTML conversion failed: {}", e),
            ConvertError::Io(e) => write!(f, "read failed: {}", e),
        }
    }
}

impl std::error::Error for ConvertError {}

/// External converter interface: staged file in, Markdown out.
pub trait Converter: Send + Sync {
    fn convert(&self, path: &Path, extension: &str) -> Result<String, ConvertError>;
}

/// The bundled converter. Stateless; instantiate once at startup and share.
pub struct MarkdownConverter;

impl Converter for MarkdownConverter {
    fn convert(&self, path: &Path, extension: &str) -> Result<String, ConvertError> {
        let bytes = std::fs::read(path).map_err(|e| ConvertError::Io(e.to_string()))?;
        convert_bytes(&bytes, extension)
    }
}

/// Routes a byte payload to the converter for `extension`.
///
/// The download whitelist admits more types than the bundled converter can
/// render: legacy Office formats (`xls`, `ppt`, `doc`) and images (`png`,
/// `jpg`, `gif`, `webp`) are accepted for download but come back as
/// `Unsupported` here. A richer [`Converter`] implementation can be injected
/// to handle them.
pub fn convert_bytes(bytes: &[u8], extension: &str) -> Result<String, ConvertError> {
    match extension {
        "pdf" => convert_pdf(bytes),
        "docx" => convert_docx(bytes),
        "pptx" => convert_pptx(bytes),
        "xlsx" => convert_xlsx(bytes),
        "html" => convert_html(bytes),
        "txt" => Ok(String::from_utf8_lossy(bytes).into_owned()),
        "csv" => Ok(csv_to_table(&String::from_utf8_lossy(bytes))),
        "zip" => convert_zip_listing(bytes),
        other => Err(ConvertError::Unsupported(other.to_string())),
    }
}

fn convert_pdf(bytes: &[u8]) -> Result<String, ConvertError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ConvertError::Pdf(e.to_string()))
}

fn convert_html(bytes: &[u8]) -> Result<String, ConvertError> {
    html2text::from_read(bytes, HTML_WIDTH).map_err(|e| ConvertError::Html(e.to_string()))
}

/// Renders CSV text as a Markdown table. Quoting is not handled; cells are
/// split on bare commas.
fn csv_to_table(text: &str) -> String {
    let mut out = String::new();
    for (i, line) in text.lines().filter(|l| !l.trim().is_empty()).enumerate() {
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        out.push_str("| ");
        out.push_str(&cells.join(" | "));
        out.push_str(" |\n");
        if i == 0 {
            out.push_str("| ");
            out.push_str(&vec!["---"; cells.len()].join(" | "));
            out.push_str(" |\n");
        }
    }
    out
}

/// Lists archive entries as a Markdown bullet list.
fn convert_zip_listing(bytes: &[u8]) -> Result<String, ConvertError> {
    let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ConvertError::Ooxml(e.to_string()))?;
    let mut out = String::from("# Archive contents\n\n");
    for name in archive.file_names() {
        out.push_str("- ");
        out.push_str(name);
        out.push('\n');
    }
    Ok(out)
}

fn open_archive(bytes: &[u8]) -> Result<zip::ZipArchive<std::io::Cursor<&[u8]>>, ConvertError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ConvertError::Ooxml(e.to_string()))
}

fn read_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, ConvertError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ConvertError::Ooxml(e.to_string()))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| ConvertError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ConvertError::Ooxml(format!(
            "ZIP entry {} exceeds size limit",
            name
        )));
    }
    Ok(out)
}

/// Collects the text of every `<t>`-local-named element. Both WordprocessingML
/// (`w:t`) and DrawingML (`a:t`) carry run text under that local name, so one
/// walker serves docx paragraphs and pptx slides alike.
fn collect_run_text(xml: &[u8]) -> Result<String, ConvertError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                in_t = e.local_name().as_ref() == b"t";
            }
            Ok(quick_xml::events::Event::Text(te)) if in_t => {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(_)) => {
                in_t = false;
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ConvertError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn convert_docx(bytes: &[u8]) -> Result<String, ConvertError> {
    let mut archive = open_archive(bytes)?;
    let doc_xml = read_entry_bounded(&mut archive, "word/document.xml")?;
    collect_run_text(&doc_xml)
}

fn convert_pptx(bytes: &[u8]) -> Result<String, ConvertError> {
    let mut archive = open_archive(bytes)?;
    let mut slide_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    slide_names.sort_by_key(|name| {
        name.trim_start_matches("ppt/slides/slide")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });

    let mut out = String::new();
    for name in slide_names {
        let xml = read_entry_bounded(&mut archive, &name)?;
        let text = collect_run_text(&xml)?;
        if !out.is_empty() && !text.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&text);
    }
    Ok(out)
}

fn convert_xlsx(bytes: &[u8]) -> Result<String, ConvertError> {
    let mut archive = open_archive(bytes)?;
    let shared = read_shared_strings(&mut archive)?;

    let mut sheet_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    sheet_names.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });

    let mut out = String::new();
    for name in sheet_names.into_iter().take(XLSX_MAX_SHEETS) {
        let xml = read_entry_bounded(&mut archive, &name)?;
        let cells = resolve_shared_cells(&xml, &shared)?;
        if !out.is_empty() && !cells.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&cells);
    }
    Ok(out)
}

fn read_shared_strings(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, ConvertError> {
    let xml = read_entry_bounded(archive, "xl/sharedStrings.xml")?;
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_si = false;
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => in_si = true,
                b"t" if in_si => in_t = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_t => {
                strings.push(te.unescape().unwrap_or_default().into_owned());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"si" => in_si = false,
                b"t" => in_t = false,
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ConvertError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Resolves shared-string cell references (`<c t="s"><v>idx</v></c>`) in a
/// worksheet into their text, space-joined.
fn resolve_shared_cells(xml: &[u8], shared: &[String]) -> Result<String, ConvertError> {
    let mut cells: Vec<&str> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut shared_cell = false;
    let mut in_v = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    shared_cell = e.attributes().any(|a| {
                        a.as_ref()
                            .map(|a| a.key.as_ref() == b"t" && a.value.as_ref() == b"s")
                            .unwrap_or(false)
                    });
                }
                b"v" => in_v = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_v && shared_cell => {
                if let Ok(i) = te.unescape().unwrap_or_default().trim().parse::<usize>() {
                    if let Some(s) = shared.get(i) {
                        cells.push(s);
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_v = false,
                b"c" => shared_cell = false,
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ConvertError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(cells.join(" "))
}

//! Spreadsheet reader (xlsx): every sheet, blank rows skipped, cells
//! joined with pipe delimiters, each sheet block prefixed with its name.
//! Sheets holding only a header block contribute nothing.

use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::Event;
use tracing::debug;

use super::{ExtractError, ExtractedFile};
use crate::config::Limits;
use crate::sources::SourceOrigin;
use crate::text::truncate_chars;

/// Bound on one decompressed archive entry (zip-bomb protection).
const MAX_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

pub(super) fn read_xlsx(path: &Path, limits: &Limits) -> Result<ExtractedFile, ExtractError> {
    let bytes = fs::read(path)?;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice()))
        .map_err(|e| ExtractError::Excel(e.to_string()))?;

    let shared = match read_entry(&mut archive, "xl/sharedStrings.xml") {
        Ok(xml) => parse_shared_strings(&xml)?,
        Err(_) => Vec::new(),
    };
    let sheet_names = match read_entry(&mut archive, "xl/workbook.xml") {
        Ok(xml) => parse_sheet_names(&xml)?,
        Err(_) => Vec::new(),
    };

    let mut sheet_files: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    sheet_files.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });

    let mut blocks = Vec::new();
    for (i, file) in sheet_files.iter().enumerate() {
        let xml = read_entry(&mut archive, file)?;
        let rows = parse_sheet_rows(&xml, &shared)?;
        // A single row is a header block with no data beneath it.
        if rows.len() <= 1 {
            continue;
        }
        let name = sheet_names
            .get(i)
            .cloned()
            .unwrap_or_else(|| format!("Sheet{}", i + 1));
        blocks.push(format!("[sheet: {name}]\n{}", rows.join("\n")));
    }

    debug!(path = %path.display(), sheets = sheet_files.len(), kept = blocks.len(), "xlsx extracted");
    Ok(ExtractedFile::new(
        SourceOrigin::Excel,
        path,
        truncate_chars(&blocks.join("\n\n"), limits.file_content_chars),
        sheet_files.len(),
    ))
}

fn read_entry(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Excel(e.to_string()))?;
    let mut out = Vec::new();
    entry
        .take(MAX_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Excel(e.to_string()))?;
    if out.len() as u64 >= MAX_ENTRY_BYTES {
        return Err(ExtractError::Excel(format!(
            "archive entry {name} exceeds size limit"
        )));
    }
    Ok(out)
}

fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si => in_t = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => {
                    strings.push(current.clone());
                    in_si = false;
                }
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_t => {
                current.push_str(t.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Excel(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

fn parse_sheet_names(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut names = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheet" => {
                if let Ok(Some(attr)) = e.try_get_attribute("name") {
                    if let Ok(value) = attr.unescape_value() {
                        names.push(value.into_owned());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Excel(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(names)
}

#[derive(Clone, Copy, PartialEq)]
enum CellType {
    Shared,
    Inline,
    Raw,
}

fn parse_sheet_rows(xml: &[u8], shared: &[String]) -> Result<Vec<String>, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rows = Vec::new();
    let mut cells: Vec<String> = Vec::new();
    let mut cell_type = CellType::Raw;
    let mut capture = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => cells.clear(),
                b"c" => {
                    cell_type = match e.try_get_attribute("t") {
                        Ok(Some(attr)) if attr.value.as_ref() == b"s" => CellType::Shared,
                        Ok(Some(attr)) if attr.value.as_ref() == b"inlineStr" => CellType::Inline,
                        _ => CellType::Raw,
                    };
                }
                b"v" => capture = true,
                b"t" if cell_type == CellType::Inline => capture = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"row" => {
                    if cells.iter().any(|c| !c.trim().is_empty()) {
                        rows.push(cells.join(" | "));
                    }
                }
                b"v" | b"t" => capture = false,
                _ => {}
            },
            Ok(Event::Text(t)) if capture => {
                let raw = t.unescape().unwrap_or_default().into_owned();
                let value = match cell_type {
                    CellType::Shared => raw
                        .trim()
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| shared.get(i).cloned())
                        .unwrap_or_default(),
                    _ => raw,
                };
                cells.push(value.trim().to_string());
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Excel(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const WORKBOOK: &str = r#"<?xml version="1.0"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheets>
    <sheet name="Varieties" sheetId="1" r:id="rId1" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/>
    <sheet name="Empty" sheetId="2" r:id="rId2" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/>
  </sheets>
</workbook>"#;

    const SHARED: &str = r#"<?xml version="1.0"?>
<sst><si><t>Name</t></si><si><t>Yield</t></si><si><t>Red Champagne</t></si></sst>"#;

    const SHEET1: &str = r#"<?xml version="1.0"?>
<worksheet><sheetData>
  <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
  <row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2"><v>4.5</v></c></row>
  <row r="3"><c r="A3"/><c r="B3"/></row>
  <row r="4"><c r="A4" t="inlineStr"><is><t>Inline note</t></is></c></row>
</sheetData></worksheet>"#;

    const SHEET2: &str = r#"<?xml version="1.0"?>
<worksheet><sheetData>
  <row r="1"><c r="A1" t="s"><v>0</v></c></row>
</sheetData></worksheet>"#;

    fn build_xlsx(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("data.xlsx");
        let file = fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (name, body) in [
            ("xl/workbook.xml", WORKBOOK),
            ("xl/sharedStrings.xml", SHARED),
            ("xl/worksheets/sheet1.xml", SHEET1),
            ("xl/worksheets/sheet2.xml", SHEET2),
        ] {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    #[test]
    fn rows_rendered_pipe_delimited_under_sheet_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = build_xlsx(&dir);
        let file = read_xlsx(&path, &Limits::default()).unwrap();

        assert_eq!(file.origin, SourceOrigin::Excel);
        assert!(file.content.starts_with("[sheet: Varieties]"));
        assert!(file.content.contains("Name | Yield"));
        assert!(file.content.contains("Red Champagne | 4.5"));
        assert!(file.content.contains("Inline note"));
        assert_eq!(file.unit_count, 2);
    }

    #[test]
    fn blank_rows_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = build_xlsx(&dir);
        let file = read_xlsx(&path, &Limits::default()).unwrap();
        // Row 3 holds only empty cells and produces no line: name + 3 rows.
        assert_eq!(file.content.lines().count(), 4);
    }

    #[test]
    fn header_only_sheet_contributes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = build_xlsx(&dir);
        let file = read_xlsx(&path, &Limits::default()).unwrap();
        assert!(!file.content.contains("[sheet: Empty]"));
    }

    #[test]
    fn non_zip_bytes_are_an_excel_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.xlsx");
        fs::write(&path, b"definitely not a zip").unwrap();
        let err = read_xlsx(&path, &Limits::default()).unwrap_err();
        assert!(matches!(err, ExtractError::Excel(_)));
    }
}

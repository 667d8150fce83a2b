use calamine::{Data, Reader, Xlsx};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek};

pub const COL_LECTURER_NAME: &str = "Lecturer Name";
pub const COL_SUBJECT_NAME: &str = "Subject Name";
pub const COL_SUBJECT_CODE: &str = "Subject Code";

const REQUIRED_COLUMNS: [&str; 3] = [COL_LECTURER_NAME, COL_SUBJECT_NAME, COL_SUBJECT_CODE];

/// One uploaded roster line. `Room No` is optional in the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RosterRow {
    #[serde(rename = "Lecturer Name", default)]
    pub name: String,
    #[serde(rename = "Subject Name", default)]
    pub subject_name: String,
    #[serde(rename = "Subject Code", default)]
    pub subject_code: String,
    #[serde(rename = "Room No", default)]
    pub room_no: String,
}

impl RosterRow {
    fn is_blank(&self) -> bool {
        self.name.is_empty()
            && self.subject_name.is_empty()
            && self.subject_code.is_empty()
            && self.room_no.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RosterOptions {
    pub default_room_no: String,
    pub skip_blank_rows: bool,
}

impl Default for RosterOptions {
    fn default() -> Self {
        Self {
            default_room_no: String::new(),
            skip_blank_rows: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRow {
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct RosterImport {
    pub rows: Vec<RosterRow>,
    pub skipped: Vec<SkippedRow>,
}

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("roster is missing required column: {0}")]
    MissingColumn(&'static str),
    #[error("failed to read roster: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to read workbook: {0}")]
    Workbook(#[from] calamine::XlsxError),
    #[error("workbook has no worksheets")]
    NoWorksheet,
}

fn check_headers(headers: &StringRecord) -> Result<(), RosterError> {
    for col in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == col) {
            return Err(RosterError::MissingColumn(col));
        }
    }
    Ok(())
}

/// Applies the row rules shared by every sheet format: blank rows are dropped
/// (or reported), nameless rows are reported, empty rooms take the default.
fn take_row(
    out: &mut RosterImport,
    headers: &StringRecord,
    record: &StringRecord,
    line: u64,
    opts: &RosterOptions,
) -> Result<(), RosterError> {
    let mut row: RosterRow = record.deserialize(Some(headers))?;
    if row.is_blank() {
        if !opts.skip_blank_rows {
            out.skipped.push(SkippedRow {
                line,
                reason: "blank row".into(),
            });
        }
        return Ok(());
    }
    if row.name.is_empty() {
        out.skipped.push(SkippedRow {
            line,
            reason: format!("missing {}", COL_LECTURER_NAME),
        });
        return Ok(());
    }
    if row.room_no.is_empty() {
        row.room_no = opts.default_room_no.clone();
    }
    out.rows.push(row);
    Ok(())
}

/// Maps sheet rows 1:1 to roster rows. Subject codes are taken as-is and
/// duplicates are kept; only rows without a lecturer name are dropped.
pub fn parse_roster_csv<R: Read>(
    input: R,
    opts: &RosterOptions,
) -> Result<RosterImport, RosterError> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(input);

    let headers = rdr.headers()?.clone();
    check_headers(&headers)?;

    let mut out = RosterImport::default();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        take_row(&mut out, &headers, &record, line, opts)?;
    }
    Ok(out)
}

fn cells_to_record(cells: &[Data]) -> StringRecord {
    let mut record: StringRecord = cells.iter().map(|c| c.to_string()).collect();
    record.trim();
    record
}

/// First worksheet of an `.xlsx` workbook, header row first. Line numbers in
/// skip reports are worksheet row numbers.
pub fn parse_roster_xlsx<R: Read + Seek>(
    input: R,
    opts: &RosterOptions,
) -> Result<RosterImport, RosterError> {
    let mut workbook: Xlsx<R> = Xlsx::new(input)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(RosterError::NoWorksheet)??;
    let header_line = range.start().map_or(0, |(row, _)| u64::from(row)) + 1;

    let mut rows = range.rows();
    let headers = rows
        .next()
        .map(cells_to_record)
        .unwrap_or_default();
    check_headers(&headers)?;

    let mut out = RosterImport::default();
    for (i, cells) in rows.enumerate() {
        let line = header_line + 1 + i as u64;
        take_row(&mut out, &headers, &cells_to_record(cells), line, opts)?;
    }
    Ok(out)
}

/// Rows posted directly as JSON (`name`, `subjectName`, `subjectCode`, `roomNo`).
pub fn rows_from_json(value: &serde_json::Value) -> Result<Vec<RosterRow>, String> {
    let arr = value
        .as_array()
        .ok_or_else(|| "rows must be an array".to_string())?;
    let mut rows = Vec::with_capacity(arr.len());
    for (i, item) in arr.iter().enumerate() {
        let field = |key: &str| -> String {
            item.get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        let name = field("name");
        if name.is_empty() {
            return Err(format!("rows[{}].name must not be empty", i));
        }
        rows.push(RosterRow {
            name,
            subject_name: field("subjectName"),
            subject_code: field("subjectCode"),
            room_no: field("roomNo"),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_sheet_with_optional_room_column_missing() {
        let csv = "Lecturer Name,Subject Name,Subject Code\n\
                   Dr. A,Compilers,CS501\n\
                   Dr. B,Systems Lab,CS501L\n";
        let parsed = parse_roster_csv(csv.as_bytes(), &RosterOptions::default()).expect("parse");
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].name, "Dr. A");
        assert_eq!(parsed.rows[1].subject_code, "CS501L");
        assert_eq!(parsed.rows[1].room_no, "");
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn trims_cells_and_applies_default_room() {
        let csv = "Lecturer Name , Subject Name,Subject Code,Room No\n\
                   \u{20}Dr. A ,Compilers,CS501,\n\
                   Dr. B,Networks,CS502,305\n";
        let opts = RosterOptions {
            default_room_no: "101".into(),
            skip_blank_rows: true,
        };
        let parsed = parse_roster_csv(csv.as_bytes(), &opts).expect("parse");
        assert_eq!(parsed.rows[0].name, "Dr. A");
        assert_eq!(parsed.rows[0].room_no, "101");
        assert_eq!(parsed.rows[1].room_no, "305");
    }

    #[test]
    fn keeps_duplicates_and_reports_nameless_rows() {
        let csv = "Lecturer Name,Subject Name,Subject Code,Room No\n\
                   Dr. A,Compilers,CS501,204\n\
                   Dr. A,Compilers,CS501,204\n\
                   ,Orphan Subject,CS599,\n\
                   ,,,\n";
        let parsed = parse_roster_csv(csv.as_bytes(), &RosterOptions::default()).expect("parse");
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].line, 4);
        assert!(parsed.skipped[0].reason.contains("Lecturer Name"));
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let csv = "Lecturer Name,Subject Name\nDr. A,Compilers\n";
        let e = parse_roster_csv(csv.as_bytes(), &RosterOptions::default()).unwrap_err();
        assert!(matches!(e, RosterError::MissingColumn(COL_SUBJECT_CODE)));
    }

    fn sheet_cell(col: char, row: usize, value: &str) -> String {
        if value.is_empty() {
            return String::new();
        }
        match value.parse::<f64>() {
            Ok(_) => format!(r#"<c r="{col}{row}"><v>{value}</v></c>"#),
            Err(_) => format!(r#"<c r="{col}{row}" t="inlineStr"><is><t>{value}</t></is></c>"#),
        }
    }

    /// Smallest workbook Excel would accept: one sheet of inline strings.
    fn xlsx_bytes(rows: &[[&str; 4]]) -> Vec<u8> {
        use std::io::Write;
        use zip::write::FileOptions;

        let sheet_rows: String = rows
            .iter()
            .enumerate()
            .map(|(i, cells)| {
                let r = i + 1;
                let body: String = ['A', 'B', 'C', 'D']
                    .iter()
                    .zip(cells.iter())
                    .map(|(col, v)| sheet_cell(*col, r, v))
                    .collect();
                format!(r#"<row r="{r}">{body}</row>"#)
            })
            .collect();
        let parts = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#.to_string(),
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_string(),
            ),
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Roster" sheetId="1" r:id="rId1"/></sheets></workbook>"#.to_string(),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#.to_string(),
            ),
            (
                "xl/worksheets/sheet1.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{sheet_rows}</sheetData></worksheet>"#
                ),
            ),
        ];

        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, body) in parts {
            zip.start_file(name, FileOptions::default()).expect("start part");
            zip.write_all(body.as_bytes()).expect("write part");
        }
        zip.finish().expect("finish workbook").into_inner()
    }

    #[test]
    fn xlsx_first_sheet_follows_the_csv_rules() {
        let bytes = xlsx_bytes(&[
            ["Lecturer Name", "Subject Name", "Subject Code", "Room No"],
            ["Dr. A", "Compilers", "CS501", "204"],
            ["", "Orphan Subject", "CS599", ""],
            [" Dr. B ", "Systems Lab", "CS501L", ""],
        ]);
        let opts = RosterOptions {
            default_room_no: "101".into(),
            skip_blank_rows: true,
        };
        let parsed = parse_roster_xlsx(std::io::Cursor::new(bytes), &opts).expect("parse");
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].room_no, "204");
        assert_eq!(parsed.rows[1].name, "Dr. B");
        assert_eq!(parsed.rows[1].room_no, "101");
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].line, 3);
    }

    #[test]
    fn xlsx_without_required_header_is_rejected() {
        let bytes = xlsx_bytes(&[
            ["Lecturer Name", "Subject Name", "Room No", ""],
            ["Dr. A", "Compilers", "204", ""],
        ]);
        let e = parse_roster_xlsx(std::io::Cursor::new(bytes), &RosterOptions::default())
            .unwrap_err();
        assert!(matches!(e, RosterError::MissingColumn(COL_SUBJECT_CODE)));
    }

    #[test]
    fn json_rows_require_a_name() {
        let rows = rows_from_json(&json!([
            { "name": "Dr. A", "subjectName": "Compilers", "subjectCode": "CS501" }
        ]))
        .expect("rows");
        assert_eq!(rows[0].room_no, "");

        let e = rows_from_json(&json!([{ "subjectName": "Compilers" }])).unwrap_err();
        assert!(e.contains("rows[0].name"));
    }
}

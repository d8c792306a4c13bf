//! Table Skills
//!
//! `csv_table(path, sep=',')` and `excel_table(path, sheet_name=None)` read
//! a file and write it as a markdown pipe table. Any read or parse failure
//! prints `Unable to load the table` instead of raising.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use calamine::{open_workbook_auto, Data, Reader};
use serde_json::Value;

use interactivity_core::{CoreResult, Output, Skill, SkillCall, SkillModule};

use crate::TABLE_SKILLS;

pub const LOAD_FAILURE_MESSAGE: &str = "Unable to load the table";

/// Header row plus data rows, all rendered to strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Build from raw records; the first record is the header.
    ///
    /// Short rows are padded with empty cells. A row wider than the header
    /// is an error, as is an input without a header.
    pub fn from_records(records: Vec<Vec<String>>) -> Result<Self, String> {
        let mut records = records.into_iter();
        let headers = records.next().ok_or_else(|| "No columns to parse".to_string())?;
        let width = headers.len();

        let mut rows = Vec::new();
        for (idx, mut record) in records.enumerate() {
            if record.len() > width {
                return Err(format!(
                    "Expected {} fields in line {}, saw {}",
                    width,
                    idx + 2,
                    record.len()
                ));
            }
            record.resize(width, String::new());
            rows.push(record);
        }
        Ok(Self { headers, rows })
    }

    fn is_numeric_column(&self, col: usize) -> bool {
        let mut saw_value = false;
        for row in &self.rows {
            let cell = row[col].trim();
            if cell.is_empty() {
                continue;
            }
            if cell.parse::<f64>().is_err() {
                return false;
            }
            saw_value = true;
        }
        saw_value
    }

    /// Render as a markdown pipe table.
    ///
    /// A leading unnamed index column numbers the rows from 0. The index
    /// and every numeric column are right-aligned.
    pub fn to_markdown(&self) -> String {
        let headers: Vec<String> = std::iter::once(String::new())
            .chain(self.headers.iter().cloned())
            .collect();
        let rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| std::iter::once(i.to_string()).chain(row.iter().cloned()).collect())
            .collect();
        let numeric: Vec<bool> = std::iter::once(true)
            .chain((0..self.headers.len()).map(|c| self.is_numeric_column(c)))
            .collect();

        let mut col_widths = vec![3usize; headers.len()]; // minimum width 3
        for row in std::iter::once(&headers).chain(rows.iter()) {
            for (i, cell) in row.iter().enumerate() {
                col_widths[i] = col_widths[i].max(cell.chars().count());
            }
        }

        let render_row = |row: &[String]| -> String {
            let mut line = String::from("|");
            for (i, &width) in col_widths.iter().enumerate() {
                let cell = row.get(i).map(|s| s.as_str()).unwrap_or("");
                if numeric[i] {
                    line.push_str(&format!(" {:>width$} |", cell, width = width));
                } else {
                    line.push_str(&format!(" {:<width$} |", cell, width = width));
                }
            }
            line
        };

        let mut lines = vec![render_row(&headers)];

        let mut separator = String::from("|");
        for (i, &width) in col_widths.iter().enumerate() {
            if numeric[i] {
                separator.push_str(&format!("{}:|", "-".repeat(width + 1)));
            } else {
                separator.push_str(&format!(":{}|", "-".repeat(width + 1)));
            }
        }
        lines.push(separator);

        lines.extend(rows.iter().map(|row| render_row(row)));
        lines.join("\n")
    }
}

/// Split delimited text into records.
///
/// Supports double-quoted fields (with `""` escapes and embedded newlines).
/// Blank lines are skipped.
pub fn parse_delimited(content: &str, sep: char) -> Result<Vec<Vec<String>>, String> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut field_started = false;
    let mut chars = content.trim_start_matches('\u{feff}').chars().peekable();

    let mut finish_record = |record: &mut Vec<String>, field: &mut String, started: bool| {
        if started || !record.is_empty() {
            record.push(std::mem::take(field));
            records.push(std::mem::take(record));
        }
    };

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => {
                in_quotes = true;
                field_started = true;
            }
            '\r' => {}
            '\n' => {
                finish_record(&mut record, &mut field, field_started);
                field_started = false;
            }
            c if c == sep => {
                record.push(std::mem::take(&mut field));
                field_started = true;
            }
            _ => {
                field.push(c);
                field_started = true;
            }
        }
    }

    if in_quotes {
        return Err("EOF inside string".to_string());
    }
    finish_record(&mut record, &mut field, field_started);
    Ok(records)
}

/// Read a CSV file into a table.
pub fn read_csv(path: &Path, sep: &str) -> Result<Table, String> {
    let mut sep_chars = sep.chars();
    let sep = match (sep_chars.next(), sep_chars.next()) {
        (Some(c), None) => c,
        _ => return Err(format!("Unsupported separator: {:?}", sep)),
    };
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    Table::from_records(parse_delimited(&content, sep)?)
}

/// Which worksheet to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    Index(usize),
    Name(String),
}

impl SheetSelector {
    fn from_value(value: Option<&Value>) -> Result<Self, String> {
        match value {
            None => Ok(SheetSelector::Index(0)),
            Some(Value::String(name)) => Ok(SheetSelector::Name(name.clone())),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(|i| SheetSelector::Index(i as usize))
                .ok_or_else(|| format!("Invalid sheet index: {}", n)),
            Some(other) => Err(format!("Invalid sheet_name: {}", other)),
        }
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Read a worksheet (xlsx, xlsm, xls, ods) into a table.
pub fn read_spreadsheet(path: &Path, sheet: &SheetSelector) -> Result<Table, String> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| format!("Failed to open spreadsheet: {}", e))?;

    let sheet_names = workbook.sheet_names();
    let name = match sheet {
        SheetSelector::Name(name) => name.clone(),
        SheetSelector::Index(idx) => sheet_names
            .get(*idx)
            .cloned()
            .ok_or_else(|| format!("Worksheet index {} is invalid", idx))?,
    };

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| format!("Failed to read sheet '{}': {}", name, e))?;

    let records: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();
    Table::from_records(records)
}

fn write_table(result: Result<Table, String>, out: &mut Output) -> CoreResult<()> {
    match result {
        Ok(table) => out.emit(&format!("\n{}\n", table.to_markdown()))?,
        Err(e) => {
            tracing::debug!("Table load failed: {}", e);
            out.emit(&format!("{}\n", LOAD_FAILURE_MESSAGE))?;
        }
    }
    Ok(())
}

struct CsvTableSkill;

#[async_trait]
impl Skill for CsvTableSkill {
    fn name(&self) -> &str {
        "csv_table"
    }

    async fn invoke(&self, call: SkillCall, out: &mut Output) -> CoreResult<()> {
        let path = call.args.require_str(0, "path", "csv_table")?;
        let result = match call.args.get(1, "sep") {
            None => read_csv(Path::new(&path), ","),
            Some(Value::String(sep)) => read_csv(Path::new(&path), sep),
            Some(other) => Err(format!("Invalid separator: {}", other)),
        };
        write_table(result, out)
    }
}

struct ExcelTableSkill;

#[async_trait]
impl Skill for ExcelTableSkill {
    fn name(&self) -> &str {
        "excel_table"
    }

    async fn invoke(&self, call: SkillCall, out: &mut Output) -> CoreResult<()> {
        let path = call.args.require_str(0, "path", "excel_table")?;
        let result = SheetSelector::from_value(call.args.get(1, "sheet_name"))
            .and_then(|sheet| read_spreadsheet(Path::new(&path), &sheet));
        write_table(result, out)
    }
}

/// The table skill module.
#[derive(Debug, Default)]
pub struct TablesModule;

impl SkillModule for TablesModule {
    fn name(&self) -> &str {
        "tables"
    }

    fn availability(&self) -> Result<(), String> {
        Ok(())
    }

    fn skill_names(&self) -> Vec<String> {
        TABLE_SKILLS.iter().map(|s| s.to_string()).collect()
    }

    fn skills(&self) -> Vec<Arc<dyn Skill>> {
        vec![Arc::new(CsvTableSkill), Arc::new(ExcelTableSkill)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interactivity_core::{SharedBuffer, SkillArgs};
    use serde_json::{json, Map};

    fn records(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    async fn run(skill: &dyn Skill, positional: Vec<Value>, keyword: Value) -> (CoreResult<()>, String) {
        let buffer = SharedBuffer::new();
        let mut out = Output::new(buffer.clone());
        let keyword: Map<String, Value> = keyword.as_object().cloned().unwrap_or_default();
        let call = SkillCall::new(SkillArgs::new(positional, keyword), Default::default());
        let result = skill.invoke(call, &mut out).await;
        (result, buffer.contents())
    }

    #[test]
    fn test_parse_delimited_quotes_and_blank_lines() {
        let content = "name,note\n\"Smith, J\",\"said \"\"hi\"\"\"\n\nb,\"two\nlines\"\n";
        let parsed = parse_delimited(content, ',').unwrap();
        assert_eq!(
            parsed,
            records(&[
                &["name", "note"],
                &["Smith, J", "said \"hi\""],
                &["b", "two\nlines"],
            ])
        );
    }

    #[test]
    fn test_parse_delimited_trailing_empty_field() {
        let parsed = parse_delimited("a;b\n1;\n", ';').unwrap();
        assert_eq!(parsed, records(&[&["a", "b"], &["1", ""]]));
    }

    #[test]
    fn test_parse_delimited_unterminated_quote() {
        assert!(parse_delimited("a\n\"oops", ',').is_err());
    }

    #[test]
    fn test_from_records_pads_and_rejects() {
        let table = Table::from_records(records(&[&["a", "b"], &["1"]])).unwrap();
        assert_eq!(table.rows, records(&[&["1", ""]]));

        let err = Table::from_records(records(&[&["a"], &["1", "2"]])).unwrap_err();
        assert!(err.contains("Expected 1 fields"));
        assert!(Table::from_records(Vec::new()).is_err());
    }

    #[test]
    fn test_to_markdown_alignment() {
        let table =
            Table::from_records(records(&[&["name", "km"], &["Mon", "5.2"], &["Tuesday", "10"]]))
                .unwrap();
        assert_eq!(
            table.to_markdown(),
            "|     | name    |  km |\n\
             |----:|:--------|----:|\n\
             |   0 | Mon     | 5.2 |\n\
             |   1 | Tuesday |  10 |"
        );
    }

    #[test]
    fn test_index_column_grows_with_row_count() {
        let mut rows = vec![vec!["n".to_string()]];
        rows.extend((0..1001).map(|i| vec![format!("r{}", i)]));
        let markdown = Table::from_records(rows).unwrap().to_markdown();
        let lines: Vec<&str> = markdown.lines().collect();
        assert_eq!(lines[0], "|      | n     |");
        assert_eq!(lines[1], "|-----:|:------|");
        assert_eq!(lines[2], "|    0 | r0    |");
        assert_eq!(lines[1002], "| 1000 | r1000 |");
    }

    #[tokio::test]
    async fn test_csv_table_writes_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.csv");
        std::fs::write(&path, "day,km\nMon,5\n").unwrap();

        let (result, output) = run(&CsvTableSkill, vec![json!(path.to_string_lossy())], json!({})).await;
        result.unwrap();
        assert_eq!(
            output,
            "\n|     | day |  km |\n|----:|:----|----:|\n|   0 | Mon |   5 |\n\n"
        );
    }

    #[tokio::test]
    async fn test_csv_table_custom_separator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.tsv");
        std::fs::write(&path, "day\tkm\nMon\t5\n").unwrap();

        let (result, output) = run(
            &CsvTableSkill,
            vec![json!(path.to_string_lossy())],
            json!({"sep": "\t"}),
        )
        .await;
        result.unwrap();
        assert!(output.contains("| Mon |"));
    }

    #[tokio::test]
    async fn test_missing_file_prints_failure() {
        let (result, output) = run(&CsvTableSkill, vec![json!("/no/such/file.csv")], json!({})).await;
        result.unwrap();
        assert_eq!(output, "Unable to load the table\n\n");

        let (result, output) =
            run(&ExcelTableSkill, vec![json!("/no/such/book.xlsx")], json!({})).await;
        result.unwrap();
        assert_eq!(output, "Unable to load the table\n\n");
    }

    #[tokio::test]
    async fn test_not_a_spreadsheet_prints_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.xlsx");
        std::fs::write(&path, "not a zip").unwrap();
        let (result, output) = run(
            &ExcelTableSkill,
            vec![json!(path.to_string_lossy())],
            json!({"sheet_name": "Sheet1"}),
        )
        .await;
        result.unwrap();
        assert_eq!(output, "Unable to load the table\n\n");
    }

    #[tokio::test]
    async fn test_path_is_required() {
        let (result, output) = run(&CsvTableSkill, vec![], json!({})).await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "csv_table() missing required argument: 'path'"
        );
        assert!(output.is_empty());
    }

    #[test]
    fn test_sheet_selector() {
        assert_eq!(SheetSelector::from_value(None), Ok(SheetSelector::Index(0)));
        assert_eq!(
            SheetSelector::from_value(Some(&json!("Runs"))),
            Ok(SheetSelector::Name("Runs".to_string()))
        );
        assert_eq!(
            SheetSelector::from_value(Some(&json!(2))),
            Ok(SheetSelector::Index(2))
        );
        assert!(SheetSelector::from_value(Some(&json!(-1))).is_err());
    }
}

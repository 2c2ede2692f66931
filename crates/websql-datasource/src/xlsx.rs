//! Workbook reading and writing
//!
//! Sheets are read with calamine and written back with rust_xlsxwriter. A
//! rewrite keeps every other sheet's cell values; styles and formulas are not
//! carried over.

use calamine::{Data, Reader, Xlsx};
use rust_xlsxwriter::Workbook;
use std::io::Cursor;
use websql_core::{QueryResult, Result, Value, WebSqlError, delimited::write_delimited};

/// One cell of a sheet
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::DateTimeIso(s) => Cell::Text(s.clone()),
            Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(e) => Cell::Text(format!("#ERR:{:?}", e)),
        }
    }
}

/// Largest magnitude up to which every integer is exact as an `f64`
const MAX_EXACT_INT: u64 = 1 << 53;

impl From<&Value> for Cell {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null | Value::Bytes(_) => Cell::Empty,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Int64(i) if i.unsigned_abs() > MAX_EXACT_INT => Cell::Text(i.to_string()),
            Value::Int64(i) => Cell::Number(*i as f64),
            Value::Float64(f) => Cell::Number(*f),
            Value::Decimal(s) => s.parse().map(Cell::Number).unwrap_or_else(|_| Cell::Text(s.clone())),
            Value::String(s) => Cell::Text(s.clone()),
        }
    }
}

impl Cell {
    fn to_value(&self) -> Value {
        match self {
            Cell::Empty => Value::Null,
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Value::Int64(*n as i64),
            Cell::Number(n) => Value::Float64(*n),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Bool(b) => Value::Bool(*b),
        }
    }
}

/// A named grid of cells
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    /// Header row plus data rows of a query result
    pub fn from_result(name: &str, result: &QueryResult) -> Self {
        let mut rows = Vec::with_capacity(result.rows.len() + 1);
        rows.push(result.columns.iter().map(|c| Cell::Text(c.name.clone())).collect());
        for row in &result.rows {
            rows.push(row.values.iter().map(Cell::from).collect());
        }
        Self {
            name: name.to_string(),
            rows,
        }
    }
}

fn open(bytes: &[u8]) -> Result<Xlsx<Cursor<&[u8]>>> {
    Xlsx::new(Cursor::new(bytes))
        .map_err(|e| WebSqlError::Spreadsheet(format!("Failed to open workbook: {}", e)))
}

/// Names of the sheets of a workbook (xlsx or legacy xls), in workbook order
pub fn sheet_names(bytes: &[u8]) -> Result<Vec<String>> {
    let workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| WebSqlError::Spreadsheet(format!("Failed to open workbook: {}", e)))?;
    Ok(workbook.sheet_names().to_vec())
}

/// Read every sheet of a workbook
pub fn read_sheets(bytes: &[u8]) -> Result<Vec<Sheet>> {
    let mut workbook = open(bytes)?;
    let names = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| WebSqlError::Spreadsheet(format!("Failed to read sheet {}: {}", name, e)))?;
        let rows = range
            .rows()
            .map(|row| row.iter().map(Cell::from).collect())
            .collect();
        sheets.push(Sheet { name, rows });
    }
    Ok(sheets)
}

/// Extract one sheet as delimited text ready for import.
///
/// With no sheet name the first sheet is used. The first row is the header.
pub fn sheet_to_delimited(bytes: &[u8], sheet_name: Option<&str>, delimiter: u8) -> Result<String> {
    let sheets = read_sheets(bytes)?;
    let sheet = match sheet_name {
        Some(name) => sheets.iter().find(|s| s.name == name),
        None => sheets.first(),
    }
    .ok_or_else(|| {
        WebSqlError::Spreadsheet(format!(
            "Sheet {} not found in workbook",
            sheet_name.unwrap_or("(first)")
        ))
    })?;

    let mut rows = sheet.rows.iter();
    let header: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(|c| c.to_value().to_cell_text()).collect(),
        None => {
            return Err(WebSqlError::Spreadsheet(format!("Sheet {} is empty", sheet.name)));
        }
    };
    let data: Vec<Vec<Value>> = rows
        .map(|row| row.iter().map(Cell::to_value).collect())
        .collect();

    write_delimited(&header, &data, delimiter)
}

/// Serialize sheets as a workbook
pub fn write_workbook(sheets: &[Sheet]) -> Result<Vec<u8>> {
    let xlsx_err = |e: rust_xlsxwriter::XlsxError| WebSqlError::Spreadsheet(e.to_string());

    let mut workbook = Workbook::new();
    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet.name).map_err(xlsx_err)?;
        for (r, row) in sheet.rows.iter().enumerate() {
            let r = u32::try_from(r)
                .map_err(|_| WebSqlError::Spreadsheet("Too many rows for a worksheet".into()))?;
            for (c, cell) in row.iter().enumerate() {
                let c = u16::try_from(c)
                    .map_err(|_| WebSqlError::Spreadsheet("Too many columns for a worksheet".into()))?;
                match cell {
                    Cell::Empty => {}
                    Cell::Number(n) => {
                        worksheet.write_number(r, c, *n).map_err(xlsx_err)?;
                    }
                    Cell::Text(s) => {
                        worksheet.write_string(r, c, s).map_err(xlsx_err)?;
                    }
                    Cell::Bool(b) => {
                        worksheet.write_boolean(r, c, *b).map_err(xlsx_err)?;
                    }
                }
            }
        }
    }
    workbook.save_to_buffer().map_err(xlsx_err)
}

/// Replace the sheet named like `sheet` in `existing` (or append it), keeping
/// every other sheet. With no existing workbook a new one is created.
pub fn replace_sheet(existing: Option<&[u8]>, sheet: Sheet) -> Result<Vec<u8>> {
    let mut sheets = match existing {
        Some(bytes) => read_sheets(bytes)?,
        None => Vec::new(),
    };
    match sheets.iter_mut().find(|s| s.name == sheet.name) {
        Some(slot) => *slot = sheet,
        None => sheets.push(sheet),
    }
    write_workbook(&sheets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sheet(name: &str, rows: Vec<Vec<Cell>>) -> Sheet {
        Sheet {
            name: name.to_string(),
            rows,
        }
    }

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn test_replace_keeps_other_sheets() {
        let original = write_workbook(&[
            sheet("Orders", vec![vec![text("id")], vec![Cell::Number(1.0)]]),
            sheet("Customers", vec![vec![text("name")], vec![text("Ada")]]),
        ])
        .unwrap();

        let updated = replace_sheet(
            Some(&original),
            sheet("Orders", vec![vec![text("id")], vec![Cell::Number(2.0)], vec![Cell::Number(3.0)]]),
        )
        .unwrap();

        assert_eq!(sheet_names(&updated).unwrap(), vec!["Orders", "Customers"]);
        assert_eq!(
            sheet_to_delimited(&updated, Some("Orders"), b',').unwrap(),
            "id\n2\n3\n"
        );
        assert_eq!(
            sheet_to_delimited(&updated, Some("Customers"), b',').unwrap(),
            "name\nAda\n"
        );
    }

    #[test]
    fn test_missing_sheet_is_appended() {
        let updated = replace_sheet(None, sheet("Sheet1", vec![vec![text("a")]])).unwrap();
        let updated = replace_sheet(Some(&updated), sheet("Extra", vec![vec![text("b")]])).unwrap();
        assert_eq!(sheet_names(&updated).unwrap(), vec!["Sheet1", "Extra"]);
    }

    #[test]
    fn test_first_sheet_is_default_and_values_are_quoted() {
        let bytes = write_workbook(&[sheet(
            "People",
            vec![
                vec![text("name"), text("score")],
                vec![text("Smith, J."), Cell::Number(1.5)],
                vec![Cell::Empty, Cell::Bool(true)],
            ],
        )])
        .unwrap();

        assert_eq!(
            sheet_to_delimited(&bytes, None, b',').unwrap(),
            "name,score\n\"Smith, J.\",1.5\n,true\n"
        );
        assert!(sheet_to_delimited(&bytes, Some("Nope"), b',').is_err());
    }

    #[test]
    fn test_sheet_from_result() {
        let result = QueryResult::from_rows(
            vec!["id".into(), "name".into()],
            vec![vec![Value::Int64(1), Value::Null]],
        );

        let sheet = Sheet::from_result("Sheet1", &result);
        assert_eq!(
            sheet.rows,
            vec![
                vec![text("id"), text("name")],
                vec![Cell::Number(1.0), Cell::Empty],
            ]
        );
    }

    #[test]
    fn test_large_integers_are_written_as_text() {
        let result = QueryResult::from_rows(
            vec!["id".into()],
            vec![
                vec![Value::Int64(9_007_199_254_740_993)],
                vec![Value::Int64(-9_007_199_254_740_993)],
                vec![Value::Int64(42)],
            ],
        );

        let sheet = Sheet::from_result("Sheet1", &result);
        assert_eq!(
            sheet.rows[1..].to_vec(),
            vec![
                vec![text("9007199254740993")],
                vec![text("-9007199254740993")],
                vec![Cell::Number(42.0)],
            ]
        );

        let bytes = write_workbook(&[sheet]).unwrap();
        assert_eq!(
            sheet_to_delimited(&bytes, None, b',').unwrap(),
            "id\n9007199254740993\n-9007199254740993\n42\n"
        );
    }
}

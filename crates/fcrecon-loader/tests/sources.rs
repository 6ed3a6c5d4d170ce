//! Loading sources from disk

use std::io::Write;

use fcrecon_core::week::find_week_columns;
use fcrecon_core::{CellValue, ColumnLayout};
use fcrecon_loader::{load_table, LoadError};
use pretty_assertions::assert_eq;
use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

#[test]
fn loads_csv_named_after_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("constrained.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "Helper,Region,Price,202534,202535").unwrap();
    writeln!(file, "H1,West,$10.00,$100.00,").unwrap();

    let table = load_table(&path, None).unwrap();

    assert_eq!(table.name, "constrained");
    assert_eq!(table.header[4], CellValue::Numeral("202535".into()));
    assert_eq!(table.rows[0][3], CellValue::Text("$100.00".into()));
    assert_eq!(table.rows[0][4], CellValue::Empty);
}

#[test]
fn csv_identifier_columns_survive_to_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("constrained.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "Helper,,Price,,,,Type,Id,Customer,Sku,202540").unwrap();
    writeln!(file, "007001,,$10.00,,,,Chargers,0042,Acme,000456,$100.00").unwrap();

    let table = load_table(&path, None).unwrap();
    let weeks = find_week_columns(&table.header, 10).unwrap();
    let layout = ColumnLayout::default();
    let row = table.wide_rows(&layout, &weeks).next().unwrap();

    assert_eq!(row.helper_key, "007001");
    assert_eq!(row.customer_id.as_deref(), Some("0042"));
    assert_eq!(row.sku, "000456");
    assert_eq!(weeks[0].week_id, 202540);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let err = load_table(&dir.path().join("nope.csv"), None).unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
    assert!(err.to_string().contains("nope.csv"));
}

fn write_workbook(path: &std::path::Path) {
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Notes").unwrap();
    sheet.write_string(0, 0, "ignore me").unwrap();

    let sheet = workbook.add_worksheet();
    sheet.set_name("NEW WIDE CONST. FCST DATA").unwrap();
    sheet.write_string(0, 0, "Helper").unwrap();
    sheet.write_string(0, 2, "Price").unwrap();
    sheet.write_number(0, 3, 202534).unwrap();
    sheet.write_number(0, 4, 202535).unwrap();
    sheet.write_string(1, 0, "H1").unwrap();
    sheet.write_number(1, 2, 10.0).unwrap();
    sheet.write_number(1, 3, 100.0).unwrap();
    sheet.write_string(1, 4, "#N/A").unwrap();
    sheet.write_string(1, 5, "000456").unwrap();

    workbook.save(path).unwrap();
}

#[test]
fn loads_named_sheet_from_workbook() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("forecast.xlsx");
    write_workbook(&path);

    let table = load_table(&path, Some("NEW WIDE CONST. FCST DATA")).unwrap();

    assert_eq!(table.name, "NEW WIDE CONST. FCST DATA");
    assert_eq!(table.header[0], CellValue::Text("Helper".into()));
    assert_eq!(table.header[3], CellValue::Number(202534.0));
    assert_eq!(table.rows[0][2], CellValue::Number(10.0));
    assert_eq!(table.rows[0][4], CellValue::Text("#N/A".into()));
    assert_eq!(table.rows[0][5], CellValue::Text("000456".into()));
}

#[test]
fn defaults_to_first_sheet() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("forecast.xlsx");
    write_workbook(&path);

    let table = load_table(&path, None).unwrap();
    assert_eq!(table.name, "Notes");
}

#[test]
fn missing_sheet_lists_available() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("forecast.xlsx");
    write_workbook(&path);

    let err = load_table(&path, Some("NEW WIDE UNCONST. FCST DATA")).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("NEW WIDE UNCONST. FCST DATA"));
    assert!(msg.contains("Notes"));
}

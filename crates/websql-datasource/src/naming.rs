//! Table names derived from file names

use std::path::Path;

/// Replace everything outside `[A-Za-z0-9_]` with `_`
pub fn sanitize_identifier(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Name of the table a file (or one sheet of a workbook) is imported as:
/// `<short_name>_<file stem>[_<sheet>]`
pub fn table_name_for(short_name: &str, file_path: &str, sheet_name: Option<&str>) -> String {
    let file_name = file_path.rsplit(['/', '\\']).next().unwrap_or(file_path);
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    let mut name = format!("{}_{}", short_name, sanitize_identifier(stem));
    if let Some(sheet) = sheet_name {
        name.push('_');
        name.push_str(&sanitize_identifier(sheet));
    }
    name
}

use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::NamedTempFile;

use crate::domain::{CompoundRecord, ResultSet, SearchRequest};
use crate::error::KnapsackError;

pub const CSV_HEADER: [&str; 4] = ["id", "common_name(s)", "cas_number", "smiles"];

const NAME_SEPARATOR: &str = ", ";

/// `results_KNApSAcK_<type>_<keyword>.csv`, with the keyword reduced to a
/// filename-safe form.
pub fn default_output_path(request: &SearchRequest) -> Utf8PathBuf {
    Utf8PathBuf::from(format!(
        "results_KNApSAcK_{}_{}.csv",
        request.search_type(),
        sanitize_filename(request.keyword().as_str())
    ))
}

/// Writes `results` to `path` through a temp file in the same directory.
pub fn write_csv(results: &ResultSet, path: &Utf8Path) -> Result<(), KnapsackError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    };
    fs::create_dir_all(dir.as_std_path())
        .map_err(|err| KnapsackError::Filesystem(err.to_string()))?;

    let mut temp = NamedTempFile::new_in(dir.as_std_path())
        .map_err(|err| KnapsackError::Filesystem(err.to_string()))?;
    write_csv_to(&mut temp, results)
        .map_err(|err| KnapsackError::Filesystem(format!("write {path}: {err}")))?;
    temp.flush()
        .map_err(|err| KnapsackError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| KnapsackError::Filesystem(format!("persist {path}: {}", err.error)))?;
    Ok(())
}

pub fn write_csv_to<W: Write>(mut writer: W, results: &ResultSet) -> io::Result<()> {
    write_row(&mut writer, &CSV_HEADER)?;
    for record in results {
        write_row(&mut writer, &record_row(record))?;
    }
    Ok(())
}

fn record_row(record: &CompoundRecord) -> [String; 4] {
    [
        record.knapsack_id.to_string(),
        record.common_names.join(NAME_SEPARATOR),
        record.cas_number.clone().unwrap_or_default(),
        record.smiles.clone().unwrap_or_default(),
    ]
}

fn write_row<W: Write, S: AsRef<str>>(writer: &mut W, row: &[S]) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            writer.write_all(b",")?;
        }
        first = false;
        let cell = cell.as_ref();
        if needs_quotes(cell) {
            write!(writer, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            writer.write_all(cell.as_bytes())?;
        }
    }
    writer.write_all(b"\n")
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn sanitize_filename(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            out.push(ch);
        } else if ch.is_whitespace() && !out.ends_with('_') {
            out.push('_');
        }
    }
    let out = out.trim_matches('_').to_string();
    if out.is_empty() {
        "query".to_string()
    } else {
        out
    }
}

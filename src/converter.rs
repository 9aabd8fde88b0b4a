//! Raw loan dataset cleaning.
//!
//! Drops the identifier column, imputes missing values (median for numeric
//! columns, mode for categorical ones) and maps categorical values to small
//! integer codes so that every column of the output is numeric.

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Identifier column removed from the output
pub const ID_COLUMN: &str = "Loan_ID";

/// Columns imputed with the column median
pub const NUMERIC_COLUMNS: [&str; 5] = [
    "ApplicantIncome",
    "CoapplicantIncome",
    "LoanAmount",
    "Loan_Amount_Term",
    "Credit_History",
];

/// Columns imputed with the column mode
pub const CATEGORICAL_COLUMNS: [&str; 6] = [
    "Gender",
    "Married",
    "Dependents",
    "Education",
    "Self_Employed",
    "Property_Area",
];

/// Cell spellings treated as missing
const MISSING_MARKERS: [&str; 10] = [
    "", "NA", "N/A", "n/a", "NaN", "nan", "null", "NULL", "None", "<NA>",
];

const GENDER_CODES: &[(&str, i64)] = &[("Male", 1), ("Female", 0)];
const YES_NO_CODES: &[(&str, i64)] = &[("Yes", 1), ("No", 0)];
const EDUCATION_CODES: &[(&str, i64)] = &[("Graduate", 1), ("Not Graduate", 0)];
const PROPERTY_AREA_CODES: &[(&str, i64)] = &[("Rural", 0), ("Semiurban", 1), ("Urban", 2)];
const LOAN_STATUS_CODES: &[(&str, i64)] = &[("Y", 1), ("N", 0)];

/// Fixed category-to-code map for a column, if it has one
fn category_codes(column: &str) -> Option<&'static [(&'static str, i64)]> {
    match column {
        "Gender" => Some(GENDER_CODES),
        "Married" | "Self_Employed" => Some(YES_NO_CODES),
        "Education" => Some(EDUCATION_CODES),
        "Property_Area" => Some(PROPERTY_AREA_CODES),
        crate::feature_contract::TARGET_COLUMN => Some(LOAN_STATUS_CODES),
        _ => None,
    }
}

/// Outcome of a conversion run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionSummary {
    /// Data rows written
    pub rows: usize,
    /// Columns written (identifier excluded)
    pub columns: Vec<String>,
    /// Cells filled per column, with the fill value
    pub imputed: BTreeMap<String, (String, usize)>,
    /// Category values that had no code and were written as empty cells
    pub unmapped: usize,
}

/// A single column held as optional cells; `None` marks a missing value
struct Column {
    name: String,
    cells: Vec<Option<String>>,
}

impl Column {
    fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }

    fn fill_missing(&mut self, value: &str) -> usize {
        let mut filled = 0;
        for cell in self.cells.iter_mut().filter(|c| c.is_none()) {
            *cell = Some(value.to_string());
            filled += 1;
        }
        filled
    }
}

/// Convert the raw dataset at `input` and write the cleaned dataset to `output`.
///
/// The output is only written once conversion has succeeded, so `output` may
/// name the input file.
pub fn convert_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
) -> Result<ConversionSummary> {
    let input = input.as_ref();
    let output = output.as_ref();

    let reader = File::open(input)
        .with_context(|| format!("Failed to open raw dataset {}", input.display()))?;

    let mut cleaned = Vec::new();
    let summary = convert(reader, &mut cleaned)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(output, cleaned)
        .with_context(|| format!("Failed to write cleaned dataset {}", output.display()))?;

    info!(
        input = %input.display(),
        output = %output.display(),
        rows = summary.rows,
        columns = summary.columns.len(),
        unmapped = summary.unmapped,
        "Dataset converted"
    );

    Ok(summary)
}

/// Convert a raw CSV stream into a cleaned CSV stream
pub fn convert<R: Read, W: Write>(reader: R, writer: W) -> Result<ConversionSummary> {
    let mut columns = read_columns(reader)?;

    let id_index = columns
        .iter()
        .position(|c| c.name == ID_COLUMN)
        .with_context(|| format!("Raw dataset has no `{}` column", ID_COLUMN))?;
    columns.remove(id_index);

    let mut summary = ConversionSummary::default();

    for name in NUMERIC_COLUMNS {
        let column = find_column(&mut columns, name)?;
        impute_median(column, &mut summary)?;
    }

    for name in CATEGORICAL_COLUMNS {
        let column = find_column(&mut columns, name)?;
        impute_mode(column, &mut summary);
    }

    for column in columns.iter_mut() {
        if column.name == "Dependents" {
            encode_dependents(column)?;
        } else if let Some(codes) = category_codes(&column.name) {
            summary.unmapped += encode_categories(column, codes);
        }
    }

    if !columns
        .iter()
        .any(|c| c.name == crate::feature_contract::TARGET_COLUMN)
    {
        bail!(
            "Raw dataset has no `{}` column",
            crate::feature_contract::TARGET_COLUMN
        );
    }

    summary.rows = columns.first().map(|c| c.cells.len()).unwrap_or(0);
    summary.columns = columns.iter().map(|c| c.name.clone()).collect();

    write_columns(writer, &columns)?;

    Ok(summary)
}

fn read_columns<R: Read>(reader: R) -> Result<Vec<Column>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut columns: Vec<Column> = reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(|name| Column {
            name: name.to_string(),
            cells: Vec::new(),
        })
        .collect();

    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read CSV row {}", row + 1))?;
        for (column, cell) in columns.iter_mut().zip(record.iter()) {
            let cell = if MISSING_MARKERS.contains(&cell) {
                None
            } else {
                Some(cell.to_string())
            };
            column.cells.push(cell);
        }
    }

    Ok(columns)
}

fn find_column<'a>(columns: &'a mut [Column], name: &str) -> Result<&'a mut Column> {
    columns
        .iter_mut()
        .find(|c| c.name == name)
        .with_context(|| format!("Raw dataset has no `{}` column", name))
}

fn impute_median(column: &mut Column, summary: &mut ConversionSummary) -> Result<()> {
    let mut values = Vec::with_capacity(column.cells.len());
    for (row, cell) in column.cells.iter().enumerate() {
        if let Some(cell) = cell {
            let value: f64 = cell.parse().with_context(|| {
                format!(
                    "Column `{}` row {}: `{}` is not numeric",
                    column.name,
                    row + 1,
                    cell
                )
            })?;
            values.push(value);
        }
    }

    // Normalise every present cell so numeric columns share one formatting
    for cell in column.cells.iter_mut().flatten() {
        if let Ok(value) = cell.parse::<f64>() {
            *cell = format_number(value);
        }
    }

    if column.missing_count() == 0 {
        return Ok(());
    }

    match median(&mut values) {
        Some(fill) => {
            let fill = format_number(fill);
            let filled = column.fill_missing(&fill);
            debug!(column = %column.name, median = %fill, filled, "Imputed numeric column");
            summary.imputed.insert(column.name.clone(), (fill, filled));
        }
        None => warn!(column = %column.name, "Column has no values, leaving cells empty"),
    }
    Ok(())
}

fn impute_mode(column: &mut Column, summary: &mut ConversionSummary) {
    if column.missing_count() == 0 {
        return;
    }

    match mode(&column.cells) {
        Some(fill) => {
            let filled = column.fill_missing(&fill);
            debug!(column = %column.name, mode = %fill, filled, "Imputed categorical column");
            summary.imputed.insert(column.name.clone(), (fill, filled));
        }
        None => warn!(column = %column.name, "Column has no values, leaving cells empty"),
    }
}

/// Median over present values; the mean of the two middle values for even counts
fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Most frequent present value; ties resolve to the lexicographically smallest
fn mode(cells: &[Option<String>]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for cell in cells.iter().flatten() {
        *counts.entry(cell.as_str()).or_insert(0) += 1;
    }
    // max_by_key keeps the last maximum, so iterate in reverse key order
    counts
        .into_iter()
        .rev()
        .max_by_key(|(_, count)| *count)
        .map(|(value, _)| value.to_string())
}

/// Map categories to codes; unknown categories become empty cells
fn encode_categories(column: &mut Column, codes: &[(&str, i64)]) -> usize {
    let mut unmapped = 0;
    for (row, cell) in column.cells.iter_mut().enumerate() {
        let Some(value) = cell.as_deref() else {
            continue;
        };
        match codes.iter().find(|(category, _)| *category == value) {
            Some((_, code)) => *cell = Some(code.to_string()),
            None => {
                warn!(column = %column.name, row = row + 1, value = %value, "Unmapped category");
                *cell = None;
                unmapped += 1;
            }
        }
    }
    unmapped
}

/// `3+` collapses to 3; every other value must already be an integer
fn encode_dependents(column: &mut Column) -> Result<()> {
    for (row, cell) in column.cells.iter_mut().enumerate() {
        let Some(value) = cell.as_deref() else {
            continue;
        };
        let count: i64 = if value == "3+" {
            3
        } else {
            value.parse().with_context(|| {
                format!("Column `Dependents` row {}: `{}` is not a count", row + 1, value)
            })?
        };
        *cell = Some(count.to_string());
    }
    Ok(())
}

fn format_number(value: f64) -> String {
    format!("{}", value)
}

fn write_columns<W: Write>(writer: W, columns: &[Column]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer
        .write_record(columns.iter().map(|c| c.name.as_str()))
        .context("Failed to write CSV header")?;

    let rows = columns.first().map(|c| c.cells.len()).unwrap_or(0);
    for row in 0..rows {
        writer
            .write_record(
                columns
                    .iter()
                    .map(|c| c.cells[row].as_deref().unwrap_or("")),
            )
            .with_context(|| format!("Failed to write CSV row {}", row + 1))?;
    }
    writer.flush().context("Failed to flush cleaned dataset")?;
    Ok(())
}

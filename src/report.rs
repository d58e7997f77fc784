//! Report Output
//!
//! HTML-wrapped plain-text report of a batch run: the coding matrix in
//! fixed-width decimal columns and each phase's shards as hexadecimal words.

use std::io::Write;

use crate::config::DriverConfig;
use crate::ec::matrix::Matrix;
use crate::error::{Error, Result};
use crate::gf::FieldWidth;

/// Title line shared by the `<TITLE>` and `<h3>` elements.
fn title(config: &DriverConfig) -> String {
    format!(
        "serasure {} {} {} {}",
        config.codec.data_shards,
        config.codec.coding_shards,
        config.codec.width.bits(),
        config.seed
    )
}

pub fn write_header<W: Write>(out: &mut W, config: &DriverConfig) -> Result<()> {
    let title = title(config);
    writeln!(out, "<HTML><TITLE>{title}</title>")?;
    writeln!(out, "<h3>{title}</h3>")?;
    writeln!(out, "<pre>")?;
    Ok(())
}

pub fn write_footer<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out, "</pre>")?;
    Ok(())
}

/// Phase heading followed by a blank line.
pub fn write_phase<W: Write>(out: &mut W, heading: &str) -> Result<()> {
    writeln!(out, "{heading}\n")?;
    Ok(())
}

/// Column width: digits of 2^w - 1, or 10 for w = 32.
pub fn matrix_column_width(width: FieldWidth) -> usize {
    match width {
        FieldWidth::W32 => 10,
        other => other.max_element().to_string().len(),
    }
}

/// Print `matrix` one row per line, right-aligned, single-space separated.
pub fn write_matrix<W: Write>(out: &mut W, matrix: &Matrix, width: FieldWidth) -> Result<()> {
    let fw = matrix_column_width(width);
    for r in 0..matrix.rows() {
        let line = matrix
            .row(r)
            .iter()
            .map(|e| format!("{e:>fw$}"))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "{line}")?;
    }
    Ok(())
}

/// One stripe as space-prefixed hex words of w/8 bytes each.
fn hex_words(stripe: &[u8], width: FieldWidth) -> String {
    stripe
        .chunks(width.word_bytes())
        .map(|word| format!(" {}", hex::encode(word)))
        .collect()
}

/// Data stripes on the left, coding stripes on the right, then a blank line.
pub fn write_data_and_coding<W, D, C>(
    out: &mut W,
    width: FieldWidth,
    data: &[D],
    coding: &[C],
) -> Result<()>
where
    W: Write,
    D: AsRef<[u8]>,
    C: AsRef<[u8]>,
{
    let size = data
        .first()
        .map(|s| s.as_ref().len())
        .or_else(|| coding.first().map(|s| s.as_ref().len()))
        .unwrap_or(0);
    let sp = size * 2 + size / width.word_bytes() + 8;

    writeln!(out, "{:<sp$}Coding", "Data")?;
    for i in 0..data.len().max(coding.len()) {
        let mut line = match data.get(i) {
            Some(stripe) => format!("D{:<2}:{}    ", i, hex_words(stripe.as_ref(), width)),
            None => " ".repeat(sp),
        };
        if let Some(stripe) = coding.get(i) {
            line.push_str(&format!("C{:<2}:{}", i, hex_words(stripe.as_ref(), width)));
        }
        writeln!(out, "{line}")?;
    }
    writeln!(out)?;
    Ok(())
}

/// One `ERROR:` line per failure.
pub fn write_failures<W: Write>(out: &mut W, failures: &[Error]) -> Result<()> {
    for failure in failures {
        writeln!(out, "ERROR: {failure}<br>")?;
    }
    Ok(())
}

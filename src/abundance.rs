// src/abundance.rs

//! Bin abundance quantification.
//!
//! Pure computation, no subprocesses: given per-bin mapped-read counts, bin
//! lengths and a sample's total mapped-read count, compute per-bin relative
//! abundance and sample-normalized abundance fractions.
//!
//! The raw abundance mirrors the original workflow's formula:
//!
//! ```text
//! raw = (reads_mapped_to_bin / bin_length_bp / sample_total_mapped) * 1e6
//! ```
//!
//! where the 1e6 scaling converts bp to Mbp. Normalized abundances are raw
//! values divided by the sample-wide raw sum, so they sum to 1 per sample.

use std::path::Path;

use crate::errors::{PipelineError, Result};

/// Per-bin mapping counts for one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbundanceRecord {
    pub bin_id: String,
    pub mapped_reads: u64,
    pub bin_length_bp: u64,
}

/// One bin's computed abundance.
#[derive(Debug, Clone, PartialEq)]
pub struct BinAbundance {
    pub bin_id: String,
    pub raw: f64,
    pub normalized: f64,
}

/// Compute per-bin raw and normalized abundances for one sample.
///
/// A bin with zero mapped reads yields raw = normalized = 0 (not an error).
/// A sample whose total mapped reads is zero fails with `DegenerateSample`;
/// division by zero must be surfaced, not silently produce NaN/Inf.
pub fn compute_abundance(
    sample: &str,
    records: &[AbundanceRecord],
    sample_total_mapped: u64,
) -> Result<Vec<BinAbundance>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    if sample_total_mapped == 0 {
        return Err(PipelineError::DegenerateSample {
            sample: sample.to_string(),
        });
    }

    let total = sample_total_mapped as f64;
    let raws: Vec<f64> = records
        .iter()
        .map(|r| {
            debug_assert!(r.bin_length_bp > 0, "bin length must be positive");
            (r.mapped_reads as f64) / (r.bin_length_bp as f64) / total * 1e6
        })
        .collect();

    let norm: f64 = raws.iter().sum();

    Ok(records
        .iter()
        .zip(raws)
        .map(|(record, raw)| BinAbundance {
            bin_id: record.bin_id.clone(),
            raw,
            normalized: if norm > 0.0 { raw / norm } else { 0.0 },
        })
        .collect())
}

/// Load abundance records from a whitespace-separated counts table:
/// one `bin_id  mapped_reads  bin_length_bp` row per bin. Lines starting
/// with `#` and blank lines are ignored.
pub fn load_records(path: &Path) -> Result<Vec<AbundanceRecord>> {
    let contents = std::fs::read_to_string(path)?;
    let mut records = Vec::new();

    for (lineno, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (Some(bin_id), Some(reads), Some(length)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(PipelineError::Config(format!(
                "{}:{}: expected 'bin_id mapped_reads bin_length_bp'",
                path.display(),
                lineno + 1
            )));
        };

        let mapped_reads: u64 = reads.parse().map_err(|_| {
            PipelineError::Config(format!(
                "{}:{}: invalid mapped_reads '{reads}'",
                path.display(),
                lineno + 1
            ))
        })?;
        let bin_length_bp: u64 = length.parse().map_err(|_| {
            PipelineError::Config(format!(
                "{}:{}: invalid bin_length_bp '{length}'",
                path.display(),
                lineno + 1
            ))
        })?;
        if bin_length_bp == 0 {
            return Err(PipelineError::Config(format!(
                "{}:{}: bin_length_bp must be positive",
                path.display(),
                lineno + 1
            )));
        }

        records.push(AbundanceRecord {
            bin_id: bin_id.to_string(),
            mapped_reads,
            bin_length_bp,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(bin_id: &str, mapped_reads: u64, bin_length_bp: u64) -> AbundanceRecord {
        AbundanceRecord {
            bin_id: bin_id.to_string(),
            mapped_reads,
            bin_length_bp,
        }
    }

    #[test]
    fn computes_raw_and_normalized_abundance() {
        // raw(A) = 100/1000/1000 * 1e6 = 100
        // raw(B) = 300/2000/1000 * 1e6 = 150
        let records = vec![record("A", 100, 1000), record("B", 300, 2000)];
        let out = compute_abundance("s1", &records, 1000).unwrap();

        assert_eq!(out.len(), 2);
        assert!((out[0].raw - 100.0).abs() < 1e-9);
        assert!((out[1].raw - 150.0).abs() < 1e-9);
        assert!((out[0].normalized - 0.4).abs() < 1e-9);
        assert!((out[1].normalized - 0.6).abs() < 1e-9);

        let sum: f64 = out.iter().map(|b| b.normalized).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_read_bin_is_zero_not_an_error() {
        let records = vec![record("A", 0, 1000), record("B", 300, 2000)];
        let out = compute_abundance("s1", &records, 1000).unwrap();

        assert_eq!(out[0].raw, 0.0);
        assert_eq!(out[0].normalized, 0.0);
        assert!((out[1].normalized - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_total_is_degenerate() {
        let records = vec![record("A", 100, 1000)];
        let err = compute_abundance("s1", &records, 0).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DegenerateSample { sample } if sample == "s1"
        ));
    }

    #[test]
    fn empty_sample_yields_no_records() {
        let out = compute_abundance("s1", &[], 0).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn all_zero_reads_normalize_to_zero() {
        let records = vec![record("A", 0, 1000), record("B", 0, 2000)];
        let out = compute_abundance("s1", &records, 1000).unwrap();
        assert!(out.iter().all(|b| b.raw == 0.0 && b.normalized == 0.0));
    }
}

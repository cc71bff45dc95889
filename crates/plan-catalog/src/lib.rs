#![deny(warnings)]

//! Benchmark catalog: loads per-industry channel benchmarks from CSV and
//! answers industry/channel queries. The catalog is immutable after load.

use plan_core::{validate_benchmark_row, BenchmarkRow, ChannelId, IndustryId, ValidationError};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Columns the source must provide, matched after trimming.
pub const REQUIRED_COLUMNS: [&str; 5] = ["Industry", "Channel", "CPC", "CTR", "ConvRate"];

/// Failure to produce a usable catalog. The session must not compute after one.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open benchmark source {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot read benchmark source: {0}")]
    Io(#[from] std::io::Error),
    #[error("benchmark source is missing required column {0:?}")]
    MissingColumn(&'static str),
    #[error("malformed benchmark data at line {line:?}: {message}")]
    Malformed { line: Option<u64>, message: String },
    #[error("invalid benchmark at line {line:?}: {source}")]
    Invalid {
        line: Option<u64>,
        source: ValidationError,
    },
    #[error("duplicate benchmark for {industry} / {channel}")]
    DuplicateKey {
        industry: IndustryId,
        channel: ChannelId,
    },
    #[error("benchmark source contains no rows")]
    Empty,
}

impl From<csv::Error> for LoadError {
    fn from(e: csv::Error) -> Self {
        LoadError::Malformed {
            line: e.position().map(|p| p.line()),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Industry")]
    industry: String,
    #[serde(rename = "Channel")]
    channel: String,
    #[serde(rename = "CPC")]
    cpc: f64,
    #[serde(rename = "CTR")]
    ctr: f64,
    #[serde(rename = "ConvRate")]
    conv_rate: f64,
}

impl From<CsvRow> for BenchmarkRow {
    fn from(r: CsvRow) -> Self {
        BenchmarkRow {
            industry: IndustryId(r.industry),
            channel: ChannelId(r.channel),
            cpc: r.cpc,
            ctr_pct: r.ctr,
            conv_rate_pct: r.conv_rate,
        }
    }
}

/// Distinct industries in first-seen order.
pub fn industries_of(rows: &[BenchmarkRow]) -> Vec<&IndustryId> {
    let mut seen: HashSet<&IndustryId> = HashSet::new();
    rows.iter()
        .map(|r| &r.industry)
        .filter(|i| seen.insert(*i))
        .collect()
}

/// Rows of one industry in source order.
pub fn channels_for<'a>(rows: &'a [BenchmarkRow], industry: &IndustryId) -> Vec<&'a BenchmarkRow> {
    rows.iter().filter(|r| &r.industry == industry).collect()
}

/// Validated, immutable set of benchmark rows.
#[derive(Clone, Debug)]
pub struct BenchmarkCatalog {
    rows: Vec<BenchmarkRow>,
    industries: Vec<IndustryId>,
}

impl BenchmarkCatalog {
    /// Build from typed rows, applying the same checks as the CSV loader.
    pub fn from_rows(rows: Vec<BenchmarkRow>) -> Result<Self, LoadError> {
        let mut keys: HashSet<(&IndustryId, &ChannelId)> = HashSet::new();
        for r in &rows {
            validate_benchmark_row(r).map_err(|source| LoadError::Invalid { line: None, source })?;
            if !keys.insert(r.key()) {
                return Err(LoadError::DuplicateKey {
                    industry: r.industry.clone(),
                    channel: r.channel.clone(),
                });
            }
        }
        if rows.is_empty() {
            return Err(LoadError::Empty);
        }
        let industries = industries_of(&rows).into_iter().cloned().collect();
        Ok(Self { rows, industries })
    }

    /// Parse CSV text with a header row. A leading UTF-8 BOM is ignored.
    pub fn from_csv_str(text: &str) -> Result<Self, LoadError> {
        let text = text.trim_start_matches('\u{FEFF}');
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers = reader.headers()?.clone();
        for col in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == col) {
                return Err(LoadError::MissingColumn(col));
            }
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line());
            let raw: CsvRow = record.deserialize(Some(&headers))?;
            let row = BenchmarkRow::from(raw);
            validate_benchmark_row(&row).map_err(|source| LoadError::Invalid { line, source })?;
            rows.push(row);
        }
        Self::from_rows(rows)
    }

    /// Read an entire source and parse it.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, LoadError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::from_csv_str(&text)
    }

    pub fn rows(&self) -> &[BenchmarkRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Industries in first-seen order.
    pub fn industries(&self) -> &[IndustryId] {
        &self.industries
    }

    pub fn first_industry(&self) -> Option<&IndustryId> {
        self.industries.first()
    }

    pub fn contains_industry(&self, industry: &IndustryId) -> bool {
        self.industries.contains(industry)
    }

    pub fn channels_for(&self, industry: &IndustryId) -> Vec<&BenchmarkRow> {
        channels_for(&self.rows, industry)
    }

    pub fn benchmark(&self, industry: &IndustryId, channel: &ChannelId) -> Option<&BenchmarkRow> {
        self.rows
            .iter()
            .find(|r| &r.industry == industry && &r.channel == channel)
    }
}

/// Load the catalog from a CSV file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<BenchmarkCatalog, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    });
    let result = file.and_then(BenchmarkCatalog::from_reader);
    match &result {
        Ok(c) => info!(
            path = %path.display(),
            rows = c.len(),
            industries = c.industries().len(),
            "benchmark catalog loaded"
        ),
        Err(e) => warn!(path = %path.display(), error = %e, "benchmark catalog unavailable"),
    }
    result
}

//! Feature Vectorizer
//!
//! Maps a transaction into the fixed-order vector the trained pipeline
//! consumes. The column order belongs to the artifact, not to this code:
//! it is read from the schema file shipped next to the model and pinned
//! by a CRC32 layout hash.
//!
//! ## Rules
//! 1. Every column (`Time`, `V1`..`V28`, `Amount`) appears exactly once.
//! 2. Reordering columns changes the layout hash.
//! 3. Missing PCA slots in a request default to `0.0`, never an error.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::TransactionRequest;

/// Number of anonymised PCA slots (`V1`..`V28`)
pub const PCA_SLOTS: usize = 28;

/// Time + 28 PCA slots + Amount
pub const FEATURE_COUNT: usize = PCA_SLOTS + 2;

/// Longest schema version accepted
pub const MAX_VERSION_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read feature schema {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse feature schema: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unknown feature column {0:?}")]
    UnknownColumn(String),

    #[error("feature column {0} appears more than once")]
    DuplicateColumn(Column),

    #[error("schema version must be 1..={max} characters, got {actual}")]
    VersionLength { max: usize, actual: usize },

    #[error("feature schema has {actual} columns, expected {expected}")]
    ColumnCount { expected: usize, actual: usize },
}

// ============================================================================
// COLUMNS
// ============================================================================

/// One input column of the trained pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Time,
    Amount,
    /// PCA slot, 1-based (`V1` is `Pca(1)`)
    Pca(u8),
}

impl Column {
    /// Parse a column token as it appears in the training data header
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "Time" => Some(Column::Time),
            "Amount" => Some(Column::Amount),
            _ => pca_slot(token).map(Column::Pca),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Column::Time => f.write_str("Time"),
            Column::Amount => f.write_str("Amount"),
            Column::Pca(n) => write!(f, "V{}", n),
        }
    }
}

/// `"V7"` -> `Some(7)`; anything outside `V1`..`V28` -> `None`
pub fn pca_slot(name: &str) -> Option<u8> {
    let digits = name.strip_prefix('V')?;
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u8 = digits.parse().ok()?;
    (1..=PCA_SLOTS as u8).contains(&n).then_some(n)
}

// ============================================================================
// SCHEMA
// ============================================================================

/// On-disk form of the schema sidecar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaFile {
    pub version: String,
    pub columns: Vec<String>,
    #[serde(default = "default_input_name")]
    pub input_name: String,
    #[serde(default = "default_probability_output")]
    pub probability_output: String,
    #[serde(default = "default_label_output")]
    pub label_output: String,
}

fn default_input_name() -> String {
    "float_input".to_string()
}

fn default_probability_output() -> String {
    "probabilities".to_string()
}

fn default_label_output() -> String {
    "label".to_string()
}

/// Validated, versioned feature layout of a model artifact
#[derive(Debug, Clone)]
pub struct FeatureSchema {
    version: String,
    columns: Vec<Column>,
    hash: u32,
    pub input_name: String,
    pub probability_output: String,
    pub label_output: String,
}

impl FeatureSchema {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, SchemaError> {
        let file: SchemaFile = serde_json::from_str(raw)?;
        Self::try_from(file)
    }

    /// Time, V1..V28, Amount: the column order of the raw training CSV.
    /// Production always loads the artifact's own schema file.
    pub fn default_layout() -> Self {
        let mut columns = Vec::with_capacity(FEATURE_COUNT);
        columns.push(Column::Time);
        columns.extend((1..=PCA_SLOTS as u8).map(Column::Pca));
        columns.push(Column::Amount);

        Self::build(
            "default".to_string(),
            columns,
            default_input_name(),
            default_probability_output(),
            default_label_output(),
        )
    }

    fn build(
        version: String,
        columns: Vec<Column>,
        input_name: String,
        probability_output: String,
        label_output: String,
    ) -> Self {
        let hash = layout_hash(&version, &columns);
        Self {
            version,
            columns,
            hash,
            input_name,
            probability_output,
            label_output,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// `<version>:<hash>`, persisted with each prediction
    pub fn tag(&self) -> String {
        format!("{}:{:08x}", self.version, self.hash)
    }
}

impl TryFrom<SchemaFile> for FeatureSchema {
    type Error = SchemaError;

    fn try_from(file: SchemaFile) -> Result<Self, Self::Error> {
        let version_len = file.version.chars().count();
        if version_len == 0 || version_len > MAX_VERSION_LEN {
            return Err(SchemaError::VersionLength {
                max: MAX_VERSION_LEN,
                actual: version_len,
            });
        }

        let mut columns = Vec::with_capacity(file.columns.len());
        for token in &file.columns {
            let column = Column::parse(token)
                .ok_or_else(|| SchemaError::UnknownColumn(token.clone()))?;
            if columns.contains(&column) {
                return Err(SchemaError::DuplicateColumn(column));
            }
            columns.push(column);
        }

        if columns.len() != FEATURE_COUNT {
            return Err(SchemaError::ColumnCount {
                expected: FEATURE_COUNT,
                actual: columns.len(),
            });
        }

        Ok(Self::build(
            file.version,
            columns,
            file.input_name,
            file.probability_output,
            file.label_output,
        ))
    }
}

/// CRC32 over the version and the ordered column names
fn layout_hash(version: &str, columns: &[Column]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(version.as_bytes());
    hasher.update(&[0]);
    for column in columns {
        hasher.update(column.to_string().as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize()
}

// ============================================================================
// VECTOR
// ============================================================================

/// Model input, ordered per the schema it was built from
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Build the model input for a request. Slots absent from the request,
/// and names outside `V1`..`V28`, contribute nothing beyond a `0.0`.
pub fn vectorize(schema: &FeatureSchema, request: &TransactionRequest) -> FeatureVector {
    let slots = pca_values(&request.pca_features);

    let values = schema
        .columns()
        .iter()
        .map(|column| match column {
            Column::Time => request.time as f32,
            Column::Amount => request.amount as f32,
            Column::Pca(n) => slots[usize::from(*n) - 1],
        })
        .collect();

    FeatureVector(values)
}

fn pca_values(features: &HashMap<String, f64>) -> [f32; PCA_SLOTS] {
    let mut slots = [0.0f32; PCA_SLOTS];
    for (name, value) in features {
        if let Some(n) = pca_slot(name) {
            slots[usize::from(n) - 1] = *value as f32;
        }
    }
    slots
}

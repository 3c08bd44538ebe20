use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Zarr V2 group metadata (`.zgroup`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZarrGroupMetadata {
    pub zarr_format: u8,
}

impl Default for ZarrGroupMetadata {
    fn default() -> Self {
        Self { zarr_format: 2 }
    }
}

/// Zarr V2 array metadata (`.zarray`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZarrArrayMetadata {
    pub zarr_format: u8,
    pub shape: Vec<u64>,
    pub chunks: Vec<u64>,
    /// NumPy-style type string, e.g. `<f4`.
    pub dtype: String,
    pub compressor: Option<Compressor>,
    pub fill_value: Value,
    pub order: String,
    pub filters: Option<Vec<Value>>,
    pub dimension_separator: String,
}

impl ZarrArrayMetadata {
    /// Build array metadata.
    ///
    /// `chunks` of `None` means the array is stored as a single chunk.
    pub fn new(
        shape: Vec<u64>,
        chunks: Option<Vec<u64>>,
        data_type: &DataType,
        fill_value: Option<&Scalar>,
        compressor: Option<Compressor>,
    ) -> crate::Result<Self> {
        let chunks = match chunks {
            Some(c) if c.len() != shape.len() => {
                return Err(crate::Error::general(format!(
                    "chunk shape {c:?} does not match array shape {shape:?}"
                )));
            }
            Some(c) if c.contains(&0) => {
                return Err(crate::Error::general("zero chunk size"));
            }
            Some(c) => c,
            // zarr chunks must be non-zero
            None => shape.iter().map(|&n| n.max(1)).collect(),
        };
        Ok(Self {
            zarr_format: 2,
            shape,
            chunks,
            dtype: data_type.to_dtype_string(),
            compressor,
            fill_value: fill_value.map_or(Value::Null, encode_fill_value),
            order: "C".into(),
            filters: None,
            dimension_separator: ".".into(),
        })
    }

    /// Number of chunks along each dimension.
    pub fn grid_shape(&self) -> Vec<u64> {
        self.shape
            .iter()
            .zip(&self.chunks)
            .map(|(&n, &c)| n.div_ceil(c))
            .collect()
    }
}

/// Zarr V2 compressor configuration.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Copy)]
#[serde(rename_all = "lowercase", tag = "id")]
pub enum Compressor {
    /// Zlib-wrapped deflate, as written by the HDF5 deflate filter.
    Zlib {
        #[serde(default = "default_zlib_level")]
        level: u32,
    },
}

fn default_zlib_level() -> u32 {
    1
}

/// Byte order of multi-byte elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    #[default]
    Little,
    Big,
}

/// Element type of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum DataType {
    Bool,
    Int {
        size: usize,
        #[serde(default)]
        endian: Endian,
    },
    UInt {
        size: usize,
        #[serde(default)]
        endian: Endian,
    },
    Float {
        size: usize,
        #[serde(default)]
        endian: Endian,
    },
    /// Fixed-length byte string.
    Bytes { size: usize },
}

impl DataType {
    pub fn validate(&self) -> crate::Result<()> {
        let ok = match self {
            DataType::Bool => true,
            DataType::Int { size, .. } | DataType::UInt { size, .. } => {
                matches!(size, 1 | 2 | 4 | 8)
            }
            DataType::Float { size, .. } => matches!(size, 2 | 4 | 8),
            DataType::Bytes { size } => *size > 0,
        };
        if ok {
            Ok(())
        } else {
            Err(crate::Error::UnsupportedDataType(format!("{self:?}")))
        }
    }

    /// Render as a NumPy type string.
    pub fn to_dtype_string(&self) -> String {
        fn order(size: usize, endian: Endian) -> char {
            match (size, endian) {
                (1, _) => '|',
                (_, Endian::Little) => '<',
                (_, Endian::Big) => '>',
            }
        }
        match self {
            DataType::Bool => "|b1".into(),
            DataType::Int { size, endian } => format!("{}i{size}", order(*size, *endian)),
            DataType::UInt { size, endian } => format!("{}u{size}", order(*size, *endian)),
            DataType::Float { size, endian } => format!("{}f{size}", order(*size, *endian)),
            DataType::Bytes { size } => format!("|S{size}"),
        }
    }
}

/// A single attribute or fill value element.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bytes(Vec<u8>),
    Text(String),
}

/// Encode a fill value the way Zarr V2 metadata expects.
pub fn encode_fill_value(value: &Scalar) -> Value {
    match value {
        Scalar::Bool(b) => Value::Bool(*b),
        Scalar::Int(i) => Value::from(*i),
        Scalar::UInt(u) => Value::from(*u),
        Scalar::Float(f) if f.is_nan() => Value::String("NaN".into()),
        Scalar::Float(f) if f.is_infinite() => Value::String(
            if f.is_sign_positive() {
                "Infinity"
            } else {
                "-Infinity"
            }
            .into(),
        ),
        Scalar::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Scalar::Bytes(b) => Value::String(STANDARD.encode(b)),
        Scalar::Text(s) => Value::String(s.clone()),
    }
}

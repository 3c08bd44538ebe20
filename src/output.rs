use std::{io::Write, path::Path, str::FromStr};

use indexmap::IndexMap;
use serde::Serialize;

use crate::reference::{Reference, ReferenceFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// The version 1 JSON document.
    Json,
    /// Equal-length `key`/`offset`/`size`/`data`/`url` columns.
    Columnar,
}

impl FromStr for OutputFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "columnar" => Ok(Self::Columnar),
            other => Err(crate::Error::UnknownFormat(other.into())),
        }
    }
}

impl OutputFormat {
    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> crate::Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Self::Json),
            Some(ext) => ext.parse(),
            None => Err(crate::Error::UnknownFormat(path.display().to_string())),
        }
    }
}

/// Column layout of a reference document.
///
/// Remote rows come first, sorted by offset; inline rows follow with zero
/// offset and size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceColumns {
    pub key: Vec<String>,
    pub offset: Vec<u64>,
    pub size: Vec<u64>,
    pub data: Vec<Option<String>>,
    pub url: Vec<Option<String>>,
}

impl ReferenceColumns {
    pub fn new(file: &ReferenceFile) -> Self {
        let mut rows: Vec<_> = file.refs.iter().collect();
        rows.sort_by_key(|(_, r)| match r {
            Reference::Remote(r) => (false, r.offset),
            Reference::Inline(_) => (true, 0),
        });
        let mut out = Self::default();
        for (key, r) in rows {
            out.key.push(key.clone());
            match r {
                Reference::Remote(r) => {
                    out.offset.push(r.offset);
                    out.size.push(r.length);
                    out.data.push(None);
                    out.url.push(Some(r.url.clone()));
                }
                Reference::Inline(v) => {
                    out.offset.push(0);
                    out.size.push(0);
                    out.data.push(Some(v.clone()));
                    out.url.push(None);
                }
            }
        }
        out
    }
}

#[derive(Serialize)]
struct ColumnarDocument<'a> {
    version: u32,
    templates: &'a IndexMap<String, String>,
    columns: ReferenceColumns,
}

/// Write `file` in the given format.
pub fn write_references<W: Write>(
    file: &ReferenceFile,
    format: OutputFormat,
    pretty: bool,
    writer: W,
) -> crate::Result<()> {
    match format {
        OutputFormat::Json => write_json(file, pretty, writer),
        OutputFormat::Columnar => write_json(
            &ColumnarDocument {
                version: file.version,
                templates: &file.templates,
                columns: ReferenceColumns::new(file),
            },
            pretty,
            writer,
        ),
    }
}

fn write_json<W: Write>(value: &impl Serialize, pretty: bool, writer: W) -> crate::Result<()> {
    if pretty {
        serde_json::to_writer_pretty(writer, value)?;
    } else {
        serde_json::to_writer(writer, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceStore;

    fn file() -> ReferenceFile {
        let mut refs = ReferenceStore::new();
        refs.insert(".zgroup", Reference::Inline(r#"{"zarr_format":2}"#.into()));
        refs.insert("x/1", Reference::remote("{{a}}", 200, 50));
        refs.insert("x/0", Reference::remote("{{a}}", 100, 50));
        let mut out = ReferenceFile::new(refs);
        out.templates.insert("a".into(), "s3://b/f.h5".into());
        out
    }

    #[test]
    fn parses_known_formats_only() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!(matches!(
            "parquet".parse::<OutputFormat>(),
            Err(crate::Error::UnknownFormat(f)) if f == "parquet"
        ));
        assert_eq!(
            OutputFormat::from_path(Path::new("out/refs.json")).unwrap(),
            OutputFormat::Json
        );
        assert!(OutputFormat::from_path(Path::new("refs")).is_err());
    }

    #[test]
    fn columns_sorted_by_offset() {
        let cols = ReferenceColumns::new(&file());
        assert_eq!(cols.key, vec!["x/0", "x/1", ".zgroup"]);
        assert_eq!(cols.offset, vec![100, 200, 0]);
        assert_eq!(cols.size, vec![50, 50, 0]);
        assert_eq!(cols.url[0].as_deref(), Some("{{a}}"));
        assert_eq!(cols.data[2].as_deref(), Some(r#"{"zarr_format":2}"#));
    }

    #[test]
    fn json_round_trips() {
        let mut buf = Vec::new();
        write_references(&file(), OutputFormat::Json, false, &mut buf).unwrap();
        let back = ReferenceFile::from_json(std::str::from_utf8(&buf).unwrap()).unwrap();
        assert_eq!(back, file());
    }
}

mod common;

use std::collections::HashSet;

use h5refs::dims::{DatasetShape, VariableShape};
use h5refs::reference::{decode_inline, parse_chunk_name};
use h5refs::{
    Alignment, ConsolidateOptions, Consolidator, Error, OutputFormat, Reference, ReferenceFile,
    ReferenceStore, write_references,
};
use zarrs::filesystem::FilesystemStore;

use common::{SourceFile, f4_bytes, init_logging};

const SOURCES: usize = 3;

fn url(i: usize) -> String {
    format!("s3://bucket/run/{i}.h5")
}

fn variable(dims: &[&str], shape: &[u64], chunks: &[u64]) -> VariableShape {
    VariableShape {
        dims: dims.iter().map(|d| d.to_string()).collect(),
        shape: shape.to_vec(),
        chunks: chunks.to_vec(),
    }
}

fn dataset(time: u64) -> DatasetShape {
    DatasetShape {
        dims: [("feature_id".to_string(), 4), ("time".to_string(), time)]
            .into_iter()
            .collect(),
        variables: [
            (
                "feature_id".to_string(),
                variable(&["feature_id"], &[4], &[4]),
            ),
            ("time".to_string(), variable(&["time"], &[time], &[time])),
            ("flow".to_string(), variable(&["time"], &[time], &[1])),
            ("crs".to_string(), variable(&[], &[], &[])),
        ]
        .into_iter()
        .collect(),
    }
}

/// Per-source store, as the single-source translator would produce it.
fn source_store(i: usize) -> ReferenceStore {
    let u = url(i);
    let mut s = ReferenceStore::new();
    s.insert(".zgroup", Reference::Inline(r#"{"zarr_format":2}"#.into()));
    s.insert("feature_id/.zarray", Reference::Inline("{}".into()));
    s.insert("feature_id/0", Reference::remote(&u, 1000, 160));
    s.insert("time/.zarray", Reference::Inline("{}".into()));
    s.insert("time/0", Reference::remote(&u, 2000, 400));
    s.insert("crs/.zarray", Reference::Inline("{}".into()));
    s.insert("crs/0", Reference::remote(&u, 3000, 200));
    s.insert("flow/.zarray", Reference::Inline("{}".into()));
    for j in 0..5u64 {
        s.insert(format!("flow/{j}"), Reference::remote(&u, 4000 + j * 400, 400));
    }
    s
}

fn alignment() -> Alignment {
    let mut metadata = ReferenceStore::new();
    metadata.insert(".zgroup", Reference::Inline(r#"{"zarr_format":2}"#.into()));
    metadata.insert("time/.zarray", Reference::Inline("{}".into()));
    metadata.insert("time/0", Reference::Inline("base64:AAAAAA==".into()));
    metadata.insert("feature_id/.zarray", Reference::Inline("{}".into()));
    metadata.insert("flow/.zarray", Reference::Inline("{}".into()));
    metadata.insert("crs/.zarray", Reference::Inline("{}".into()));
    Alignment {
        merged: dataset(15),
        representative: dataset(5),
        sources: SOURCES,
        metadata,
    }
}

fn consolidate(
    alignment: &Alignment,
    stores: &[ReferenceStore],
) -> h5refs::Result<ReferenceFile> {
    init_logging();
    let partition = alignment.partition()?;
    let reader = FilesystemStore::new("/").expect("should be able to create store");
    Consolidator::new(ConsolidateOptions {
        template_count: 5,
        inline_threshold: 0,
    })
    .consolidate(alignment, stores, &partition, &reader)
    .map(|(file, _)| file)
}

fn stores() -> Vec<ReferenceStore> {
    (0..SOURCES).map(source_store).collect()
}

#[test]
fn partition_of_the_fixture() {
    let p = alignment().partition().unwrap();
    assert!(p.extra.is_empty());
    assert_eq!(p.concatenated, ["time".to_string()].into_iter().collect());
    assert_eq!(p.shared, ["feature_id".to_string()].into_iter().collect());
}

#[test]
fn concatenated_variable_gets_source_index() {
    let file = consolidate(&alignment(), &stores()).unwrap();
    let flow: Vec<_> = file.refs.chunks_of("flow").map(|(k, _)| k).collect();
    assert_eq!(flow.len(), 15);
    let coords: HashSet<_> = flow.iter().map(|k| parse_chunk_name(k).unwrap()).collect();
    assert_eq!(coords.len(), 15);
    for i in 0..SOURCES as u64 {
        for j in 0..5 {
            assert!(coords.contains(&vec![i, j]));
        }
    }
    assert_eq!(
        file.resolve().get("flow/2.4"),
        Some(&Reference::remote(url(2), 4000 + 4 * 400, 400))
    );
}

#[test]
fn shared_coordinates_appear_once() {
    let file = consolidate(&alignment(), &stores()).unwrap();
    let resolved = file.resolve();
    let shared: Vec<_> = resolved.chunks_of("feature_id").collect();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].1, &Reference::remote(url(0), 1000, 160));
    // unstacked variables come from the first source only
    assert_eq!(resolved.get("crs/0"), Some(&Reference::remote(url(0), 3000, 200)));
    // derived coordinates keep their inline values
    assert_eq!(
        file.refs.get("time/0"),
        Some(&Reference::Inline("base64:AAAAAA==".into()))
    );
    assert_eq!(file.refs.chunks_of("time").count(), 1);
}

#[test]
fn frequent_urls_are_templated() {
    let file = consolidate(&alignment(), &stores()).unwrap();
    // the first source has 5 flow chunks, one shared coordinate and crs
    assert_eq!(file.templates.len(), 1);
    assert_eq!(file.templates.get("a"), Some(&url(0)));
    let templated = file
        .refs
        .remotes()
        .filter(|(_, r)| r.url == "{{a}}")
        .count();
    assert_eq!(templated, 7);
    assert!(!file.refs.remotes().any(|(_, r)| r.url == url(0)));
    // the others fall at the threshold and stay literal
    assert_eq!(
        file.refs.remotes().filter(|(_, r)| r.url == url(1)).count(),
        5
    );
}

#[test]
fn six_uses_above_threshold_of_five() {
    let mut store = ReferenceStore::new();
    for j in 0..6u64 {
        store.insert(format!("flow/{j}"), Reference::remote(url(0), j * 100, 100));
    }
    let representative = DatasetShape {
        dims: [("time".to_string(), 6)].into_iter().collect(),
        variables: [("flow".to_string(), variable(&["time"], &[6], &[1]))]
            .into_iter()
            .collect(),
    };
    let alignment = Alignment {
        merged: representative.clone(),
        representative,
        sources: 1,
        metadata: ReferenceStore::new(),
    };
    let file = consolidate(&alignment, &[store]).unwrap();
    assert_eq!(file.templates.len(), 1);
    assert_eq!(file.templates.get("a"), Some(&url(0)));
    assert_eq!(file.refs.remotes().filter(|(_, r)| r.url == "{{a}}").count(), 6);
}

#[test]
fn consolidation_is_deterministic() {
    let render = || {
        let file = consolidate(&alignment(), &stores()).unwrap();
        let mut buf = Vec::new();
        write_references(&file, OutputFormat::Json, false, &mut buf).unwrap();
        buf
    };
    assert_eq!(render(), render());
}

#[test]
fn mismatched_dimensions_fail() {
    let mut a = alignment();
    a.merged
        .variables
        .insert("flow".into(), variable(&["member", "x"], &[3, 15], &[1, 1]));
    assert!(matches!(
        consolidate(&a, &stores()),
        Err(Error::ShapeMismatch { variable, .. }) if variable == "flow"
    ));

    let mut a = alignment();
    a.representative.variables.shift_remove("flow");
    assert!(matches!(
        consolidate(&a, &stores()),
        Err(Error::ShapeMismatch { .. })
    ));
}

#[test]
fn out_of_range_chunks_fail() {
    let mut s = stores();
    s[1].insert("flow/5", Reference::remote(url(1), 9000, 400));
    assert!(matches!(
        consolidate(&alignment(), &s),
        Err(Error::ChunkOutOfRange { key, .. }) if key == "flow/5"
    ));
}

#[test]
fn source_count_must_match() {
    assert!(consolidate(&alignment(), &stores()[..2]).is_err());
    assert!(matches!(
        consolidate(&alignment(), &[]),
        Err(Error::NoSources)
    ));
}

#[test]
fn small_references_are_inlined_from_the_first_handle() {
    init_logging();
    let mut files = Vec::new();
    let mut stores = Vec::new();
    for i in 0..2 {
        let mut file = SourceFile::new(&format!("part{i}.h5"));
        let mut store = ReferenceStore::new();
        for j in 0..2u64 {
            let value = (i * 2) as f32 + j as f32;
            let c = file.chunk(vec![j], &f4_bytes(&[value, value]));
            store.insert(
                format!("v/{j}"),
                Reference::remote(file.url(), c.byte_offset, c.size),
            );
        }
        file.flush();
        files.push(file);
        stores.push(store);
    }
    let single = DatasetShape {
        dims: [("t".to_string(), 4)].into_iter().collect(),
        variables: [("v".to_string(), variable(&["t"], &[4], &[2]))]
            .into_iter()
            .collect(),
    };
    let mut merged = single.clone();
    merged.dims.insert("run".into(), 2);
    merged
        .variables
        .insert("v".into(), variable(&["run", "t"], &[2, 4], &[1, 2]));
    let alignment = Alignment {
        merged,
        representative: single,
        sources: 2,
        metadata: ReferenceStore::new(),
    };
    let partition = alignment.partition().unwrap();
    assert_eq!(partition.extra, ["run".to_string()].into_iter().collect());

    let reader = FilesystemStore::new("/").expect("should be able to create store");
    let (file, stats) = Consolidator::new(ConsolidateOptions {
        template_count: 5,
        inline_threshold: 16,
    })
    .consolidate(&alignment, &stores, &partition, &reader)
    .unwrap();
    assert_eq!(stats.inlined, 4);
    assert_eq!(file.refs.remotes().count(), 0);
    let Some(Reference::Inline(v)) = file.refs.get("v/1.1") else {
        panic!("expected an inlined chunk");
    };
    assert_eq!(decode_inline(v).unwrap(), f4_bytes(&[3.0, 3.0]));
}

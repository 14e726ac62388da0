//! Binary framing shared by store and index files.
//!
//! Both formats use the same envelope: a 4-byte magic, a little-endian u32
//! format version, a bincode body whose first field is the length-prefixed
//! name, and a little-endian CRC32 footer over everything before it. Readers
//! check, in order: length, magic, checksum, version, body.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::index::{matrix_from_parts, DenseIndex, RecordRef};
use crate::record::{DocStore, Record};

/// Current on-disk format version for stores and indices.
pub const FORMAT_VERSION: u32 = 1;

const STORE_MAGIC: [u8; 4] = *b"FVDS";
const INDEX_MAGIC: [u8; 4] = *b"FVIX";

const HEADER_LEN: usize = 8;
const FOOTER_LEN: usize = 4;

#[derive(Serialize)]
struct StoreBodyRef<'a> {
    name: &'a str,
    records: &'a [Record],
}

#[derive(Deserialize)]
struct StoreBody {
    name: String,
    records: Vec<Record>,
}

#[derive(Serialize)]
struct IndexBodyRef<'a> {
    name: &'a str,
    dim: u32,
    rows: u32,
    vectors: Vec<f32>,
    refs: &'a [RecordRef],
}

#[derive(Deserialize)]
struct IndexBody {
    name: String,
    dim: u32,
    rows: u32,
    vectors: Vec<f32>,
    refs: Vec<RecordRef>,
}

fn frame(magic: [u8; 4], version: u32, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + body.len() + FOOTER_LEN);
    out.extend_from_slice(&magic);
    out.extend_from_slice(&version.to_le_bytes());
    out.extend_from_slice(body);
    let crc = crc32fast::hash(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

fn unframe(bytes: &[u8], magic: [u8; 4]) -> Result<&[u8]> {
    if bytes.len() < HEADER_LEN + FOOTER_LEN {
        return Err(Error::Format(format!("truncated file: {} bytes", bytes.len())));
    }
    if bytes[..4] != magic {
        return Err(Error::Format("bad magic".into()));
    }
    let (checked, footer) = bytes.split_at(bytes.len() - FOOTER_LEN);
    let mut crc = [0u8; 4];
    crc.copy_from_slice(footer);
    if crc32fast::hash(checked) != u32::from_le_bytes(crc) {
        return Err(Error::Format("checksum mismatch".into()));
    }
    let mut ver = [0u8; 4];
    ver.copy_from_slice(&checked[4..8]);
    let found = u32::from_le_bytes(ver);
    if found != FORMAT_VERSION {
        return Err(Error::Version {
            found,
            expected: FORMAT_VERSION,
        });
    }
    Ok(&checked[HEADER_LEN..])
}

pub(crate) fn encode_store(store: &DocStore) -> Result<Vec<u8>> {
    let body = bincode::serialize(&StoreBodyRef {
        name: &store.name,
        records: &store.records,
    })
    .map_err(|err| Error::Format(err.to_string()))?;
    Ok(frame(STORE_MAGIC, store.version, &body))
}

pub(crate) fn decode_store(bytes: &[u8]) -> Result<DocStore> {
    let body = unframe(bytes, STORE_MAGIC)?;
    let body: StoreBody =
        bincode::deserialize(body).map_err(|err| Error::Format(err.to_string()))?;
    Ok(DocStore {
        name: body.name,
        version: FORMAT_VERSION,
        records: body.records,
    })
}

pub(crate) fn encode_index(index: &DenseIndex) -> Result<Vec<u8>> {
    let body = bincode::serialize(&IndexBodyRef {
        name: &index.name,
        dim: index.dim() as u32,
        rows: index.len() as u32,
        vectors: index.vectors.iter().copied().collect(),
        refs: &index.refs,
    })
    .map_err(|err| Error::Format(err.to_string()))?;
    Ok(frame(INDEX_MAGIC, FORMAT_VERSION, &body))
}

pub(crate) fn decode_index(bytes: &[u8]) -> Result<DenseIndex> {
    let body = unframe(bytes, INDEX_MAGIC)?;
    let body: IndexBody =
        bincode::deserialize(body).map_err(|err| Error::Format(err.to_string()))?;
    let rows = body.rows as usize;
    let dim = body.dim as usize;
    if body.vectors.len() != rows * dim {
        return Err(Error::Format(format!(
            "vector block holds {} floats, header says {rows}x{dim}",
            body.vectors.len()
        )));
    }
    if body.refs.len() != rows {
        return Err(Error::Format(format!(
            "reference table holds {} entries, header says {rows}",
            body.refs.len()
        )));
    }
    Ok(DenseIndex {
        name: body.name,
        vectors: matrix_from_parts(rows, dim, body.vectors)?,
        refs: body.refs,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::index::build_index;
    use crate::record::{Record, Value};

    fn sample_store() -> DocStore {
        DocStore::new(
            "sample",
            vec![
                Record::new()
                    .with("text", "hello")
                    .with("embedding", vec![1.0f32, 0.0]),
                Record::new()
                    .with("text", "world")
                    .with("embedding", vec![0.0f32, 1.0]),
            ],
        )
    }

    fn sample_index() -> DenseIndex {
        let store = sample_store();
        build_index("sample-index", std::slice::from_ref(&store), |r| {
            Ok(r.embedding().unwrap().to_vec())
        })
        .unwrap()
    }

    #[test]
    fn store_round_trips() {
        let store = sample_store();
        let back = decode_store(&encode_store(&store).unwrap()).unwrap();
        assert_eq!(store, back);
    }

    #[test]
    fn index_round_trips_bit_exact() {
        let store = DocStore::new(
            "odd",
            vec![
                Record::new().with("embedding", vec![0.1f32, 1.0e-30, -3.5e8]),
                Record::new().with("embedding", vec![f32::MIN_POSITIVE, 0.2, 2.0]),
            ],
        );
        let index = build_index("odd-index", std::slice::from_ref(&store), |r| {
            Ok(r.embedding().unwrap().to_vec())
        })
        .unwrap();
        let back = decode_index(&encode_index(&index).unwrap()).unwrap();
        assert_eq!(index, back);
    }

    #[test]
    fn rejects_wrong_magic() {
        let bytes = encode_store(&sample_store()).unwrap();
        let err = decode_index(&bytes).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn rejects_truncation() {
        let bytes = encode_store(&sample_store()).unwrap();
        for cut in [0, 5, bytes.len() / 2, bytes.len() - 1] {
            let err = decode_store(&bytes[..cut]).unwrap_err();
            assert!(matches!(err, Error::Format(_)), "cut at {cut}");
        }
    }

    #[test]
    fn rejects_corrupted_byte() {
        let mut bytes = encode_store(&sample_store()).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xff;
        let err = decode_store(&bytes).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn rejects_future_version() {
        let mut store = sample_store();
        store.version = FORMAT_VERSION + 1;
        let bytes = encode_store(&store).unwrap();
        let err = decode_store(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::Version { found, expected }
                if found == FORMAT_VERSION + 1 && expected == FORMAT_VERSION
        ));
    }

    #[test]
    fn rejects_reference_table_mismatch() {
        let index = sample_index();
        let body = bincode::serialize(&IndexBodyRef {
            name: &index.name,
            dim: index.dim() as u32,
            rows: (index.len() + 1) as u32,
            vectors: index.vectors.iter().copied().collect(),
            refs: &index.refs,
        })
        .unwrap();
        let bytes = frame(INDEX_MAGIC, FORMAT_VERSION, &body);
        let err = decode_index(&bytes).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    fn value_strategy() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            (-1.0e12..1.0e12f64).prop_map(Value::Float),
            "[ -~]{0,12}".prop_map(Value::Str),
            prop::collection::vec(-1.0e6f32..1.0e6, 0..8).prop_map(Value::Vector),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Seq),
                prop::collection::btree_map("[a-z]{1,5}", inner, 0..4).prop_map(Value::Map),
            ]
        })
    }

    fn record_strategy() -> impl Strategy<Value = Record> {
        prop::collection::btree_map("[a-z]{1,6}", value_strategy(), 0..5).prop_map(Record::from)
    }

    proptest! {
        #[test]
        fn any_store_round_trips(
            name in "[a-z0-9_ ]{0,12}",
            records in prop::collection::vec(record_strategy(), 0..4),
        ) {
            let store = DocStore::new(name, records);
            let bytes = encode_store(&store).unwrap();
            prop_assert_eq!(decode_store(&bytes).unwrap(), store);
        }
    }
}

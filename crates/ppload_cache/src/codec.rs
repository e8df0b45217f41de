//! Encoding and decoding of whole cache entries.
//!
//! An entry is `[host header][bincode compiled unit][trailer?]`. The trailer
//! is present exactly when the unit's origin belongs to the preprocessed
//! extension family; plain sources produce byte-for-byte host entries.

use std::path::Path;

use ppload_config::LoaderConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CacheError;
use crate::fingerprint::{FingerprintMode, Trailer};
use crate::header::{CacheHeader, HEADER_LEN};

/// A compiled unit the host can store in the cache.
pub trait CompiledUnit: Serialize + DeserializeOwned {
    /// The source file this unit was compiled from.
    fn origin(&self) -> &Path;
}

/// The outcome of reading the trailer of a decoded entry.
#[derive(Debug)]
pub enum TrailerState {
    /// The origin is a plain source; no trailer was looked for.
    NotExpected,
    /// The trailer decoded successfully.
    Present(Trailer),
    /// The trailer was expected but missing or malformed.
    Unreadable(CacheError),
}

/// A decoded cache entry.
#[derive(Debug)]
pub struct CacheRecord<U> {
    /// The host header.
    pub header: CacheHeader,
    /// The compiled unit.
    pub unit: U,
    /// What was found after the unit.
    pub trailer: TrailerState,
}

/// Encodes `unit` behind `header`, followed by `trailer` if given.
///
/// An empty trailer is still written. The trailer must be in the header's
/// fingerprint mode.
pub fn serialize<U: CompiledUnit>(
    unit: &U,
    header: &CacheHeader,
    trailer: Option<&Trailer>,
) -> Result<Vec<u8>, CacheError> {
    if let Some(trailer) = trailer {
        if trailer.mode() != FingerprintMode::for_header(header) {
            return Err(CacheError::Serialization {
                reason: format!(
                    "{:?} trailer does not match a {:?} header",
                    trailer.mode(),
                    FingerprintMode::for_header(header)
                ),
            });
        }
    }

    let mut out = Vec::with_capacity(HEADER_LEN + 256);
    out.extend_from_slice(&header.encode());
    bincode::serde::encode_into_std_write(unit, &mut out, bincode::config::standard()).map_err(
        |e| CacheError::Serialization {
            reason: e.to_string(),
        },
    )?;

    if let Some(trailer) = trailer {
        tracing::debug!(
            target = "ppload.cache",
            origin = %unit.origin().display(),
            dependencies = trailer.len(),
            "appending dependency trailer"
        );
        out.extend_from_slice(&trailer.encode()?);
    }
    Ok(out)
}

/// Decodes a cache entry.
///
/// Header and unit failures are errors. Trailer failures are reported through
/// [`TrailerState::Unreadable`] so the caller can still tell which unit the
/// entry held.
pub fn deserialize<U: CompiledUnit>(
    bytes: &[u8],
    config: &LoaderConfig,
) -> Result<CacheRecord<U>, CacheError> {
    let header = CacheHeader::decode(bytes)?;
    let body = &bytes[HEADER_LEN..];
    let (unit, consumed): (U, usize) =
        bincode::serde::decode_from_slice(body, bincode::config::standard()).map_err(|e| {
            CacheError::Decode {
                reason: e.to_string(),
            }
        })?;
    let rest = &body[consumed..];

    let trailer = if config.is_preprocessed(unit.origin()) {
        if rest.is_empty() {
            TrailerState::Unreadable(CacheError::Decode {
                reason: "missing dependency trailer".to_string(),
            })
        } else {
            match Trailer::decode(rest, FingerprintMode::for_header(&header)) {
                Ok(trailer) => TrailerState::Present(trailer),
                Err(err) => TrailerState::Unreadable(err),
            }
        }
    } else {
        TrailerState::NotExpected
    };

    Ok(CacheRecord {
        header,
        unit,
        trailer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppload_common::Mtime;
    use serde::Deserialize;
    use std::path::PathBuf;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Unit {
        origin: PathBuf,
        code: Vec<String>,
    }

    impl CompiledUnit for Unit {
        fn origin(&self) -> &Path {
            &self.origin
        }
    }

    fn unit(origin: &str) -> Unit {
        Unit {
            origin: PathBuf::from(origin),
            code: vec!["print 1".to_string()],
        }
    }

    fn header() -> CacheHeader {
        CacheHeader::timestamp(Mtime::from_secs(100), 10)
    }

    fn timestamps(deps: &[PathBuf]) -> Trailer {
        Trailer::capture(deps, FingerprintMode::Timestamp)
    }

    #[test]
    fn plain_entry_has_no_trailer() {
        let config = LoaderConfig::default();
        let u = unit("/app/plain.py");
        let bytes = serialize(&u, &header(), None).unwrap();

        let mut host_only = header().encode().to_vec();
        host_only.extend(bincode::serde::encode_to_vec(&u, bincode::config::standard()).unwrap());
        assert_eq!(bytes, host_only);

        let record: CacheRecord<Unit> = deserialize(&bytes, &config).unwrap();
        assert_eq!(record.unit, u);
        assert!(matches!(record.trailer, TrailerState::NotExpected));
    }

    #[test]
    fn family_entry_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let dep = dir.path().join("header.pph");
        std::fs::write(&dep, "#define VALUE 1\n").unwrap();

        let config = LoaderConfig::default();
        let u = unit("/app/main.ppy");
        let bytes = serialize(&u, &header(), Some(&timestamps(&[dep.clone()]))).unwrap();

        let record: CacheRecord<Unit> = deserialize(&bytes, &config).unwrap();
        assert_eq!(record.header, header());
        match record.trailer {
            TrailerState::Present(Trailer::Timestamp { mtimes, .. }) => {
                assert!(mtimes.contains_key(&dep));
            }
            other => panic!("expected timestamp trailer, got {other:?}"),
        }
    }

    #[test]
    fn empty_dependency_list_still_writes_trailer() {
        let config = LoaderConfig::default();
        let u = unit("/app/main.ppy");
        let bytes = serialize(&u, &header(), Some(&timestamps(&[]))).unwrap();
        let record: CacheRecord<Unit> = deserialize(&bytes, &config).unwrap();
        match record.trailer {
            TrailerState::Present(trailer) => assert!(trailer.is_empty()),
            other => panic!("expected empty trailer, got {other:?}"),
        }
    }

    #[test]
    fn missing_trailer_is_unreadable() {
        let config = LoaderConfig::default();
        let bytes = serialize(&unit("/app/main.ppy"), &header(), None).unwrap();
        let record: CacheRecord<Unit> = deserialize(&bytes, &config).unwrap();
        assert!(matches!(record.trailer, TrailerState::Unreadable(_)));
    }

    #[test]
    fn truncated_trailer_is_unreadable() {
        let config = LoaderConfig::default();
        let mut bytes = serialize(&unit("/app/main.ppy"), &header(), Some(&timestamps(&[]))).unwrap();
        bytes.pop();
        let record: CacheRecord<Unit> = deserialize(&bytes, &config).unwrap();
        assert!(matches!(record.trailer, TrailerState::Unreadable(_)));
    }

    #[test]
    fn hash_header_selects_hash_trailer() {
        let dir = tempfile::tempdir().unwrap();
        let dep = dir.path().join("header.pph");
        std::fs::write(&dep, "#define VALUE 1\n").unwrap();

        let header = CacheHeader::hash(crate::host_source_hash(b"main"), true);
        let trailer = Trailer::capture(&[dep], FingerprintMode::Hash);
        let bytes = serialize(&unit("/app/main.ppy"), &header, Some(&trailer)).unwrap();
        let record: CacheRecord<Unit> = deserialize(&bytes, &LoaderConfig::default()).unwrap();
        assert!(matches!(
            record.trailer,
            TrailerState::Present(Trailer::Hash { .. })
        ));
    }

    #[test]
    fn trailer_mode_must_match_header() {
        let trailer = Trailer::capture(&[], FingerprintMode::Hash);
        let result = serialize(&unit("/app/main.ppy"), &header(), Some(&trailer));
        assert!(matches!(result, Err(CacheError::Serialization { .. })));
    }

    #[test]
    fn corrupt_unit_is_an_error() {
        let mut bytes = header().encode().to_vec();
        bytes.extend_from_slice(&[0xff, 0xff, 0xff]);
        let result: Result<CacheRecord<Unit>, _> = deserialize(&bytes, &LoaderConfig::default());
        assert!(matches!(result, Err(CacheError::Decode { .. })));
    }

    #[test]
    fn bad_header_is_an_error() {
        let result: Result<CacheRecord<Unit>, _> =
            deserialize(b"not a cache entry", &LoaderConfig::default());
        assert!(matches!(result, Err(CacheError::InvalidHeader { .. })));
    }
}

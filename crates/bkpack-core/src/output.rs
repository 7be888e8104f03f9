//! File helpers shared by every stage
//!
//! Outputs are written to a temporary file beside the target and renamed
//! into place, so an aborted build never leaves a half-written artifact.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::string::String;
use std::vec::Vec;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::{Error, Result};

/// Write `contents` to `path`, replacing it atomically
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    tmp.write_all(contents).map_err(|e| Error::io(path, e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;

    log::debug!("wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

/// Read a required input, reporting absence as [`Error::ConfigMissing`]
pub fn read_required(what: &'static str, path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(Error::ConfigMissing {
            what,
            path: path.to_path_buf(),
        });
    }
    fs::read(path).map_err(|e| Error::io(path, e))
}

/// Read and parse a required JSON document
pub fn read_json<T: DeserializeOwned>(what: &'static str, path: &Path) -> Result<T> {
    let bytes = read_required(what, path)?;
    serde_json::from_slice(&bytes).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize with 4-space indentation and a trailing newline
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser).map_err(|source| Error::Json {
        path: "<memory>".into(),
        source,
    })?;
    buf.push(b'\n');
    // serde_json only ever emits UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;
    use std::vec;

    #[derive(Serialize, serde::Deserialize, Debug, PartialEq)]
    struct Doc {
        name: String,
        list: Vec<u32>,
    }

    #[test]
    fn test_pretty_json() {
        let doc = Doc {
            name: "x".into(),
            list: vec![1],
        };
        assert_eq!(
            to_pretty_json(&doc).unwrap(),
            "{\n    \"name\": \"x\",\n    \"list\": [\n        1\n    ]\n}\n"
        );
    }

    #[test]
    fn test_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");
        let doc = Doc {
            name: "bootloader".into(),
            list: vec![1, 2],
        };
        write_atomic(&path, to_pretty_json(&doc).unwrap().as_bytes()).unwrap();
        let back: Doc = read_json("config json", &path).unwrap();
        assert_eq!(back, doc);

        write_atomic(&path, b"{}").unwrap();
        assert!(matches!(
            read_json::<Doc>("config json", &path),
            Err(Error::Json { .. })
        ));
    }

    #[test]
    fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_required("config json", &dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().starts_with("config json "));
        assert!(err.to_string().ends_with("not exist."));
    }
}

//! In-memory reading and writing of `.tar.gz` archives
//!
//! Chart and manifest archives are small, so they are unpacked straight into
//! a map of relative path to contents instead of onto disk.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use tar::{Archive, Builder, Header};

use crate::error::{CoreError, Result};

/// Read every regular file of a gzip tarball
///
/// Paths are relative, `/`-separated, with a leading `./` removed. When all
/// files live under one top-level directory, that directory is stripped.
pub fn read_archive(bytes: &[u8]) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut archive = Archive::new(GzDecoder::new(bytes));
    let mut files = BTreeMap::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry.path()?.to_string_lossy().replace('\\', "/");
        let path = path.trim_start_matches("./").to_string();
        if path.is_empty() {
            continue;
        }

        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        files.insert(path, data);
    }

    if files.is_empty() {
        return Err(CoreError::Archive {
            message: "archive contains no files".to_string(),
        });
    }

    Ok(strip_common_root(files))
}

/// Like [`read_archive`], requiring every file to be UTF-8 text
pub fn read_archive_text(bytes: &[u8]) -> Result<BTreeMap<String, String>> {
    read_archive(bytes)?
        .into_iter()
        .map(|(path, data)| {
            String::from_utf8(data)
                .map(|text| (path.clone(), text))
                .map_err(|e| CoreError::Archive {
                    message: format!("Invalid UTF-8 in {}: {}", path, e),
                })
        })
        .collect()
}

/// Build a gzip tarball from relative paths and contents
///
/// Entries are written in path order with a zero mtime, so equal inputs
/// produce equal bytes.
pub fn create_archive<'a, I>(files: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut files: Vec<_> = files.into_iter().collect();
    files.sort_by(|a, b| a.0.cmp(b.0));

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);

    for (path, content) in files {
        add_bytes_to_archive(&mut builder, path, content)?;
    }

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

fn add_bytes_to_archive<W: Write>(
    builder: &mut Builder<W>,
    archive_path: &str,
    content: &[u8],
) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();

    builder.append_data(&mut header, archive_path, content)?;

    Ok(())
}

fn strip_common_root(files: BTreeMap<String, Vec<u8>>) -> BTreeMap<String, Vec<u8>> {
    let mut roots = files.keys().map(|path| path.split_once('/').map(|(root, _)| root));
    let Some(Some(first)) = roots.next() else {
        return files;
    };
    if !roots.all(|root| root == Some(first)) {
        return files;
    }

    let prefix = format!("{}/", first);
    files
        .into_iter()
        .map(|(path, data)| (path[prefix.len()..].to_string(), data))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_root_is_stripped() {
        let bytes = create_archive([
            ("gloo/values.yaml", b"replicas: 1\n".as_slice()),
            ("gloo/templates/deployment.yaml", b"kind: Deployment\n".as_slice()),
        ])
        .unwrap();

        let files = read_archive_text(&bytes).unwrap();

        let paths: Vec<_> = files.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["templates/deployment.yaml", "values.yaml"]);
        assert_eq!(files["values.yaml"], "replicas: 1\n");
    }

    #[test]
    fn test_mixed_roots_are_kept() {
        let bytes = create_archive([
            ("a/one.yaml", b"kind: A\n".as_slice()),
            ("b/two.yaml", b"kind: B\n".as_slice()),
        ])
        .unwrap();

        let files = read_archive(&bytes).unwrap();
        assert!(files.contains_key("a/one.yaml"));
        assert!(files.contains_key("b/two.yaml"));
    }

    #[test]
    fn test_flat_archive() {
        let bytes = create_archive([("crds.yaml", b"kind: CustomResourceDefinition\n".as_slice())])
            .unwrap();

        let files = read_archive(&bytes).unwrap();
        assert!(files.contains_key("crds.yaml"));
    }

    #[test]
    fn test_archive_is_reproducible() {
        let a = create_archive([("x.yaml", b"kind: X\n".as_slice())]).unwrap();
        let b = create_archive([("x.yaml", b"kind: X\n".as_slice())]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_not_gzip() {
        assert!(read_archive(b"definitely not a tarball").is_err());
    }

    #[test]
    fn test_invalid_utf8() {
        let bytes = create_archive([("bin.dat", [0xffu8, 0xfe].as_slice())]).unwrap();
        let err = read_archive_text(&bytes).unwrap_err();
        assert!(matches!(err, CoreError::Archive { .. }));
    }
}

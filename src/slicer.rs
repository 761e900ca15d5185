//! Fixed-size slicing and MD5 hashing of local files.
//!
//! The upload protocol identifies content by the MD5 of each 4 MiB slice. The
//! hashes are pure byte-level digests, so the same file yields the same
//! sequence on every platform.

use std::{
    fs::File,
    io::{ErrorKind, Read},
    path::{Path, PathBuf},
};

use crate::{Res, error::PanError, types::SliceDescriptor};

/// Slice size expected by the upload endpoints.
pub const DEFAULT_SLICE_SIZE: usize = 4 * 1024 * 1024;

/// Lowercase hex MD5 of `data`.
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Lazy, single-pass sequence of slice descriptors over one file.
///
/// Reading starts at offset 0 and never seeks; to start over, call
/// [`slice_hashes`] again.
pub struct SliceHashes {
    file: File,
    path: PathBuf,
    buf: Vec<u8>,
    index: usize,
    done: bool,
}

/// Opens `path` for slicing.
///
/// A `slice_size` of 0 selects [`DEFAULT_SLICE_SIZE`].
pub fn slice_hashes(path: &Path, slice_size: usize) -> Res<SliceHashes> {
    let file = File::open(path).map_err(|e| PanError::io("cannot open", path, e))?;
    let slice_size = if slice_size == 0 {
        DEFAULT_SLICE_SIZE
    } else {
        slice_size
    };

    Ok(SliceHashes {
        file,
        path: path.to_path_buf(),
        buf: vec![0u8; slice_size],
        index: 0,
        done: false,
    })
}

/// Runs [`slice_hashes`] to completion.
pub fn collect_slices(path: &Path, slice_size: usize) -> Res<Vec<SliceDescriptor>> {
    slice_hashes(path, slice_size)?.collect()
}

/// MD5 of the whole file, streamed.
pub fn whole_file_hash(path: &Path) -> Res<String> {
    let mut file = File::open(path).map_err(|e| PanError::io("cannot open", path, e))?;
    let mut ctx = md5::Context::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(PanError::io("cannot read", path, e)),
        };
        ctx.consume(&buf[..n]);
    }
    Ok(format!("{:x}", ctx.compute()))
}

impl SliceHashes {
    /// Fills the buffer as far as the file allows; returns the bytes read.
    fn fill(&mut self) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < self.buf.len() {
            match self.file.read(&mut self.buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl Iterator for SliceHashes {
    type Item = Res<SliceDescriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let filled = match self.fill() {
            Ok(n) => n,
            Err(e) => {
                self.done = true;
                return Some(Err(PanError::io("cannot read", &self.path, e)));
            }
        };
        if filled < self.buf.len() {
            self.done = true;
        }
        if filled == 0 {
            return None;
        }

        let slice = SliceDescriptor {
            index: self.index,
            content_hash: hash_bytes(&self.buf[..filled]),
            byte_length: filled as u64,
        };
        self.index += 1;
        Some(Ok(slice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(data: &[u8]) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(data).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn known_digest() {
        assert_eq!(hash_bytes(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(hash_bytes(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn empty_file_has_no_slices() {
        let f = file_with(b"");
        assert!(collect_slices(f.path(), 4).unwrap().is_empty());
        assert_eq!(whole_file_hash(f.path()).unwrap(), hash_bytes(b""));
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_slice() {
        let f = file_with(b"abcdefgh");
        let slices = collect_slices(f.path(), 4).unwrap();
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[1].byte_length, 4);
        assert_eq!(slices[1].content_hash, hash_bytes(b"efgh"));
    }

    #[test]
    fn only_the_last_slice_is_short() {
        let f = file_with(b"abcdefghij");
        let slices = collect_slices(f.path(), 4).unwrap();
        let lengths: Vec<u64> = slices.iter().map(|s| s.byte_length).collect();
        assert_eq!(lengths, vec![4, 4, 2]);
        assert_eq!(
            slices.iter().map(|s| s.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = slice_hashes(Path::new("/definitely/not/here.bin"), 4)
            .err()
            .unwrap();
        assert!(matches!(err, PanError::Io { .. }));
    }
}

use super::{FileIdentity, LogPosition, TailError};
use encoding_rs::Encoding;
use memchr::memchr_iter;
use memmap2::Mmap;
use rayon::prelude::*;
use std::fs;
use std::path::Path;

/// Lines already present in the log, plus the position right after the last complete one.
pub struct Replay {
    pub lines: Vec<String>,
    pub position: LogPosition,
}

/// Read every complete line currently in the file in one pass.
///
/// Used to fast-forward the session state before live tailing starts; a
/// trailing partial line is left for the tailer to pick up.
pub fn read_existing(path: &Path, encoding: &'static Encoding) -> Result<Replay, TailError> {
    let file = fs::File::open(path).map_err(|source| TailError::OpenFile {
        path: path.to_path_buf(),
        source,
    })?;
    let metadata = file.metadata().map_err(|source| TailError::OpenFile {
        path: path.to_path_buf(),
        source,
    })?;
    let identity = FileIdentity::of(&metadata);

    // Mapping an empty file fails on some platforms
    if metadata.len() == 0 {
        return Ok(Replay {
            lines: Vec::new(),
            position: LogPosition::new(identity, 0),
        });
    }

    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| TailError::MemoryMap {
        path: path.to_path_buf(),
        source,
    })?;
    let bytes = mmap.as_ref();

    let mut line_ranges: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    for end in memchr_iter(b'\n', bytes) {
        let content_end = if end > start && bytes[end - 1] == b'\r' {
            end - 1
        } else {
            end
        };
        line_ranges.push((start, content_end));
        start = end + 1;
    }
    let consumed = start as u64;

    // Decoding is independent per line; collect keeps file order
    let lines: Vec<String> = line_ranges
        .par_iter()
        .map(|&(start, end)| {
            let (line, _, _) = encoding.decode(&bytes[start..end]);
            line.into_owned()
        })
        .collect();

    tracing::debug!(path = %path.display(), lines = lines.len(), bytes = consumed, "Read existing log contents");

    Ok(Replay {
        lines,
        position: LogPosition::new(identity, consumed),
    })
}

/// CSV export of a full snapshot (every directory, not just the top N).
use serde::Serialize;
use std::io;
use std::path::PathBuf;

#[derive(Serialize)]
struct CsvRecord<'a> {
    path: std::borrow::Cow<'a, str>,
    bytes: u64,
}

/// Write `snapshot` as `path,bytes` rows with a header line.
///
/// Rows keep the snapshot's order (by path). Non-UTF-8 path components
/// are written lossily.
pub fn write_csv<W: io::Write>(snapshot: &[(PathBuf, u64)], writer: W) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for (path, bytes) in snapshot {
        wtr.serialize(CsvRecord {
            path: path.to_string_lossy(),
            bytes: *bytes,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

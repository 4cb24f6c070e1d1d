//! Byte-chunk stream over a captured NDJSON body

use std::path::Path;

use anyhow::Context;
use futures::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};

type Reader = Box<dyn AsyncRead + Unpin + Send>;

/// Open `path` for replay; `-` reads stdin.
pub async fn open(path: &Path) -> anyhow::Result<Reader> {
    if path == Path::new("-") {
        return Ok(Box::new(tokio::io::stdin()));
    }
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open capture: {}", path.display()))?;
    Ok(Box::new(file))
}

/// Yield reads of at most `chunk_size` bytes until EOF. A read error is
/// yielded once and ends the stream.
pub fn chunks<R>(reader: R, chunk_size: usize) -> impl Stream<Item = std::io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let chunk_size = chunk_size.max(1);
    futures::stream::unfold(Some(reader), move |state| async move {
        let mut reader = state?;
        let mut buf = vec![0u8; chunk_size];
        match reader.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(buf), Some(reader)))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}

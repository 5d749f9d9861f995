//! Forwarding child output streams into the log

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::info;

use crate::error::PipelineError;
use crate::logging::PROC_TARGET;

/// Read `stream` line by line until end-of-stream, logging each line at PROC
/// severity tagged with `pid`. A final line without a newline is still logged.
pub(super) async fn drain<R>(stream: R, pid: u32) -> Result<(), PipelineError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();

    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .await
            .map_err(|source| PipelineError::Drain { pid, source })?;
        if read == 0 {
            return Ok(());
        }

        let text = String::from_utf8_lossy(&line);
        info!(target: PROC_TARGET, "({}) {}", pid, text.trim_end());
    }
}

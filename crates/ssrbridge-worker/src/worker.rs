//! Serve loop: framed requests in, framed responses out
//!
//! A reader task pulls frames off the input as they arrive and queues them;
//! the loop handles them strictly one at a time and writes each response
//! (flushed) before taking the next request, so responses leave in arrival
//! order. A render that never settles blocks every request queued behind it.
//!
//! When the input reaches end of file, requests already queued are still
//! answered; then the loop returns.

use ssrbridge_common::transport::{Frame, FrameReader, JsonCodec, MAX_FRAME_BYTES};
use ssrbridge_common::{BridgeError, RenderError, RenderResponse, Result};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::session::{BundleLoader, RenderSession};

/// Answer every request on `input` through `session`, writing to `output`.
///
/// Returns the number of responses written. Fails only when writing a
/// response fails; request-level errors are answered, never returned.
pub async fn serve<L, R, W>(session: &mut RenderSession<L>, input: R, mut output: W) -> Result<u64>
where
    L: BundleLoader,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let reader = tokio::spawn(read_frames(input, tx));

    let mut written = 0u64;
    while let Some(frame) = rx.recv().await {
        let response = match frame {
            Frame::Message(payload) => session.handle_payload(&payload).await,
            Frame::Oversized { len } => {
                tracing::warn!(len, "Rejecting oversized request frame");
                RenderResponse::failure(&RenderError::render_failed(format!(
                    "Request frame of {len} bytes exceeds the {MAX_FRAME_BYTES}-byte limit"
                )))
            }
        };
        write_response(&mut output, &response).await?;
        written += 1;
    }

    if let Err(e) = reader.await {
        tracing::error!("Request reader task failed: {}", e);
    }
    tracing::info!(responses = written, "Input closed, worker finished");
    Ok(written)
}

async fn read_frames<R>(input: R, tx: mpsc::UnboundedSender<Frame>)
where
    R: AsyncRead + Unpin,
{
    let mut frames = FrameReader::new(BufReader::new(input));
    loop {
        match frames.next_frame().await {
            Ok(Some(frame)) => {
                if tx.send(frame).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed to read request stream: {}", e);
                break;
            }
        }
    }
}

/// Write one response frame and flush it.
///
/// A response too large to frame is replaced by a `RenderFailed` response
/// stating its size, so the requester still gets exactly one answer.
pub async fn write_response<W>(output: &mut W, response: &RenderResponse) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = match JsonCodec::encode_response(response) {
        Ok(line) => line,
        Err(BridgeError::FrameTooLarge { len, max }) => {
            tracing::warn!(len, max, "Rendered response exceeds the frame limit");
            let error = RenderError::render_failed(format!(
                "Rendered response of {len} bytes exceeds the {max}-byte frame limit"
            ));
            JsonCodec::encode_response(&RenderResponse::failure(&error))?
        }
        Err(e) => return Err(e),
    };

    output.write_all(&line).await?;
    output.flush().await?;
    Ok(())
}

//! STDIO Transport
//!
//! Newline-delimited JSON over any `AsyncRead`/`AsyncWrite` pair: our own
//! stdin/stdout when running as a subprocess server, or the pipes of a child
//! process when launching one. Each line is one frame; blank lines are
//! skipped.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{ AtomicBool, Ordering };

use async_trait::async_trait;
use bytes::Bytes;
use futures::{ SinkExt, StreamExt };
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::process::{ Child, Command };
use tokio::sync::Mutex;
use tokio_util::codec::{ FramedRead, FramedWrite, LinesCodec, LinesCodecError };
use tracing::{ debug, info };

use crate::errors::Error;
use crate::transport::{ Connection, InboundFrames, Transport };

/// Longest line accepted from the peer
pub const MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

fn codec_error(e: LinesCodecError) -> Error {
    match e {
        LinesCodecError::Io(e) => Error::Io(e),
        LinesCodecError::MaxLineLengthExceeded => {
            Error::Transport(format!("line longer than {} bytes", MAX_LINE_LENGTH))
        }
    }
}

/// Outbound half of a line-delimited connection
pub struct LineTransport<W> {
    writer: Mutex<Option<FramedWrite<W, LinesCodec>>>,
    connected: AtomicBool,
}

#[async_trait]
impl<W> Transport for LineTransport<W> where W: AsyncWrite + Send + Unpin + 'static {
    async fn send_frame(&self, frame: Bytes) -> Result<(), Error> {
        let line = String::from_utf8(frame.to_vec()).map_err(|e|
            Error::Transport(format!("frame is not UTF-8: {}", e))
        )?;
        if line.contains('\n') {
            return Err(Error::Transport("frame contains a raw newline".to_string()));
        }

        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(Error::SessionClosed)?;
        writer.send(line).await.map_err(codec_error)
    }

    async fn close(&self) -> Result<(), Error> {
        self.connected.store(false, Ordering::SeqCst);
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            debug!("Closing line transport");
            SinkExt::<String>::close(&mut writer).await.map_err(codec_error)?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Frame a reader/writer pair as newline-delimited JSON
pub fn connect<R, W>(reader: R, writer: W) -> Connection
    where R: AsyncRead + Send + Unpin + 'static, W: AsyncWrite + Send + Unpin + 'static
{
    let inbound: InboundFrames = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH))
        .filter_map(|line| async move {
            match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some(Ok(Bytes::from(line))),
                Err(e) => Some(Err(codec_error(e))),
            }
        })
        .boxed();

    let transport = LineTransport {
        writer: Mutex::new(Some(FramedWrite::new(writer, LinesCodec::new()))),
        connected: AtomicBool::new(true),
    };
    Connection::new(transport, inbound)
}

/// Use this process's stdin and stdout
pub fn stdio() -> Connection {
    connect(tokio::io::stdin(), tokio::io::stdout())
}

/// Launch a child process and talk to it over its stdin/stdout.
///
/// The child's stderr is inherited. The returned [`Child`] is configured to
/// be killed when dropped.
pub fn spawn(
    command: &str,
    args: &[String],
    env: Option<&HashMap<String, String>>
) -> Result<(Connection, Child), Error> {
    info!("Starting stdio server process: {} {:?}", command, args);

    let mut cmd = Command::new(command);
    cmd.args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    if let Some(env) = env {
        cmd.envs(env);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| Error::Transport(format!("Failed to spawn process: {}", e)))?;
    let stdin = child.stdin
        .take()
        .ok_or_else(|| Error::Transport("Failed to get stdin handle".to_string()))?;
    let stdout = child.stdout
        .take()
        .ok_or_else(|| Error::Transport("Failed to get stdout handle".to_string()))?;

    Ok((connect(stdout, stdin), child))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{ AsyncReadExt, AsyncWriteExt };

    #[tokio::test]
    async fn reads_one_frame_per_line_and_skips_blanks() {
        let (mut remote, local) = tokio::io::duplex(1024);
        let (read_half, write_half) = tokio::io::split(local);
        let mut connection = connect(read_half, write_half);

        remote.write_all(b"{\"a\":1}\n\n{\"b\":2}\r\n").await.unwrap();
        drop(remote);

        let first = connection.inbound.next().await.unwrap().unwrap();
        let second = connection.inbound.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b"{\"a\":1}");
        assert_eq!(&second[..], b"{\"b\":2}");
        assert!(connection.inbound.next().await.is_none());
    }

    #[tokio::test]
    async fn writes_newline_terminated_frames() {
        let (mut remote, local) = tokio::io::duplex(1024);
        let (read_half, write_half) = tokio::io::split(local);
        let connection = connect(read_half, write_half);

        connection.transport.send_frame(Bytes::from_static(b"{\"x\":true}")).await.unwrap();
        connection.transport.close().await.unwrap();

        let mut written = Vec::new();
        remote.read_to_end(&mut written).await.unwrap();
        assert_eq!(written, b"{\"x\":true}\n");
        assert!(matches!(
            connection.transport.send_frame(Bytes::from_static(b"{}")).await,
            Err(Error::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn close_is_visible_while_a_write_is_blocked() {
        let (mut remote, local) = tokio::io::duplex(8);
        let (read_half, write_half) = tokio::io::split(local);
        let connection = connect(read_half, write_half);
        assert!(connection.transport.is_connected());

        // Nobody reads yet, so this write parks while holding the writer
        let writing = tokio::spawn({
            let transport = connection.transport.clone();
            async move { transport.send_frame(Bytes::from(vec![b'x'; 64])).await }
        });
        tokio::task::yield_now().await;
        let closing = tokio::spawn({
            let transport = connection.transport.clone();
            async move { transport.close().await }
        });
        tokio::task::yield_now().await;
        assert!(!connection.transport.is_connected());

        let mut written = Vec::new();
        remote.read_to_end(&mut written).await.unwrap();
        writing.await.unwrap().unwrap();
        closing.await.unwrap().unwrap();
        assert_eq!(written.len(), 65);
    }

    #[tokio::test]
    async fn rejects_frames_that_would_break_framing() {
        let (_remote, local) = tokio::io::duplex(64);
        let (read_half, write_half) = tokio::io::split(local);
        let connection = connect(read_half, write_half);

        let err = connection.transport.send_frame(Bytes::from_static(b"{\n}")).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}

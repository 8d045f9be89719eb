//! Relay server link: length-prefixed envelopes over one TCP stream.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use gate_core::wire::{encode_frame, frame_len, LEN_SIZE};
use gate_core::{GateCore, Transport};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub type SharedCore = Arc<Mutex<GateCore>>;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Core-side transport: queues encoded envelopes for the writer task.
pub struct ChannelTransport {
    tx: UnboundedSender<Vec<u8>>,
}

impl Transport for ChannelTransport {
    fn send(&mut self, envelope: Vec<u8>) {
        if self.tx.send(envelope).is_err() {
            debug!("link closed, dropping outbound envelope");
        }
    }
}

pub fn channel() -> (ChannelTransport, UnboundedReceiver<Vec<u8>>) {
    let (tx, rx) = unbounded_channel();
    (ChannelTransport { tx }, rx)
}

/// Run one server connection until the server closes it or either direction
/// fails. The core is told about the broken pipe either way.
pub async fn run_connection<R, W>(
    reader: R,
    writer: W,
    core: SharedCore,
    outbound: UnboundedReceiver<Vec<u8>>,
) -> io::Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut write_task = tokio::spawn(write_loop(writer, outbound));
    let result = tokio::select! {
        res = read_loop(reader, core.clone()) => res,
        res = &mut write_task => match res {
            Ok(Ok(())) => {
                info!("outbound queue closed");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("write to server failed: {}", e);
                Err(e)
            }
            Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
        },
    };
    core.lock().await.on_broken_pipe();
    write_task.abort();
    result
}

async fn read_loop<R: AsyncRead + Unpin>(mut reader: R, core: SharedCore) -> io::Result<()> {
    let mut header = [0u8; LEN_SIZE];
    loop {
        match reader.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                info!("server closed the connection");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        let len = frame_len(&header).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload).await?;
        let mut c = core.lock().await;
        // Routing may transceive with a blocking reader.
        if let Err(e) = tokio::task::block_in_place(|| c.route(&payload)) {
            debug!("frame dropped: {}", e);
        }
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut outbound: UnboundedReceiver<Vec<u8>>,
) -> io::Result<()> {
    while let Some(envelope) = outbound.recv().await {
        let frame = encode_frame(&envelope)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writer.write_all(&frame).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Drive the core's keepalive clock.
pub async fn run_ticks(core: SharedCore) {
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    interval.tick().await;
    loop {
        interval.tick().await;
        core.lock().await.tick();
    }
}

/// Connect to the relay server.
pub async fn connect(host: &str, port: u16) -> io::Result<tokio::net::TcpStream> {
    let stream = tokio::net::TcpStream::connect((host, port)).await?;
    if let Err(e) = stream.set_nodelay(true) {
        warn!("set_nodelay: {}", e);
    }
    info!("connected to relay server {}:{}", host, port);
    Ok(stream)
}

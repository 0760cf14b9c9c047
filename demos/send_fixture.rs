//! Sends a synthetic FreeD camera move to the relay's input port.
//!
//! Bursts of frames are sent back to back with gaps in between, the kind of
//! arrival pattern the relay is meant to smooth out.
//!
//! Usage: `cargo run --example send_fixture [host:port]`

use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use freed_relay::{FreeDCodec, FreeDFrame};
use tokio::net::UdpSocket;
use tokio::time::sleep;
use tokio_util::codec::Encoder;

#[tokio::main]
async fn main() -> freed_relay::Result<()> {
    let target: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:6301".to_string())
        .parse()
        .map_err(|e| freed_relay::Error::config(format!("Invalid target address: {}", e)))?;

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    let mut codec = FreeDCodec::new();
    let mut buf = BytesMut::new();

    println!("Sending FreeD frames to {}", target);
    for burst in 0..20u32 {
        for step in 0..6u32 {
            let n = burst * 6 + step;
            let frame = FreeDFrame {
                pitch: -5.0 + n as f32 * 0.05,
                yaw: n as f32 * 0.25,
                posz: 1500.0,
                posx: n as f32 * 2.0,
                zoom: 1000 + n * 10,
                focus: 2000,
                ..FreeDFrame::new(1)
            };

            buf.clear();
            codec.encode(frame, &mut buf)?;
            socket.send_to(&buf, target).await?;
        }
        sleep(Duration::from_millis(250)).await;
    }

    println!("Done");
    Ok(())
}

//! Minimal echo server: accepts one peer and echoes values back through a
//! command handler.
//!
//! Run with:
//!   cargo run -p objwire --example echo-server
//!
//! In another terminal:
//!   cargo run -p objwire --features cli -- send 127.0.0.1:7070 \
//!     --json '{"hello":"world"}' --wait --wait-timeout 3s

use std::time::Duration;

use objwire::ChannelListener;
use serde_json::Value;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = ChannelListener::bind("127.0.0.1:7070")?;
    eprintln!("Listening on {}", listener.local_addr());

    let channel = listener.accept_with_handler(|ctx| {
        while ctx.should_continue() {
            match ctx.try_read::<Value>() {
                Ok(value) => {
                    eprintln!("Received {value}");
                    ctx.endpoint().write_one(&value);
                }
                Err(err) if err.is_disconnect() => break,
                Err(err) => eprintln!("Skipping value: {err}"),
            }
        }
    })?;
    eprintln!("Peer connected: {}", channel.peer());

    while channel.handler_running() {
        std::thread::sleep(Duration::from_millis(100));
    }

    eprintln!("Peer disconnected");
    channel.dispose();
    Ok(())
}

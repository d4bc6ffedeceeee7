//! Print numbered lines of a file or of stdin
//!
//! ```text
//! seqcat [PATH]
//! ```
//!
//! The input is read through a text-mode device, so `"\r\n"` endings come
//! out as `"\n"`. Stdin is fed into a pipe from a separate thread; lines are
//! read inside a transaction and rolled back until they are complete.
//!
//! Environment:
//! - `SEQIO_CHUNK_SIZE`: read buffer chunk size (0 disables buffering)
//! - `RUST_LOG`: log filter

use seqio::{pipe, Backend, Device, DeviceConfig, FileBackend, OpenMode};
use std::io::{self, Read, Write};
use std::thread;

fn config_from_env() -> DeviceConfig {
    let mut config = DeviceConfig::default();
    if let Ok(value) = std::env::var("SEQIO_CHUNK_SIZE") {
        match value.parse() {
            Ok(size) => config.read_chunk_size = size,
            Err(e) => log::warn!("ignoring SEQIO_CHUNK_SIZE={value:?}: {e}"),
        }
    }
    config
}

fn stdin_backend() -> Box<dyn Backend> {
    let (writer, reader) = pipe("stdin");
    thread::spawn(move || {
        let mut stdin = io::stdin().lock();
        let mut chunk = [0u8; 4096];
        loop {
            match stdin.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    if writer.write(&chunk[..n]) < 0 {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("stdin: {e}");
                    writer.set_error(e.raw_os_error().unwrap_or(5));
                    break;
                }
            }
        }
        writer.close();
    });
    Box::new(reader)
}

/// Next complete line, or the unterminated tail at the end of the stream.
fn next_line(device: &mut Device<Box<dyn Backend>>) -> Option<Vec<u8>> {
    loop {
        device.start_transaction();
        let line = device.read_line(0);
        if line.ends_with(b"\n") || device.at_end() {
            device.commit_transaction();
            return (!line.is_empty()).then_some(line);
        }
        device.rollback_transaction();
        if !device.wait_for_ready_read(-1) && !device.at_end() {
            // The backend cannot wait; take what there is.
            let line = device.read_line(0);
            return (!line.is_empty()).then_some(line);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = config_from_env();
    let backend: Box<dyn Backend> = match std::env::args().nth(1) {
        Some(path) => Box::new(FileBackend::new(path)),
        None => stdin_backend(),
    };

    let mut device = Device::with_config(backend, &config);
    if !device.open(OpenMode::READ_ONLY | OpenMode::TEXT) {
        return Err(device.error_string().into());
    }
    log::debug!("seqcat: {device:?}");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut number = 0;
    while let Some(line) = next_line(&mut device) {
        number += 1;
        let text = String::from_utf8_lossy(&line);
        writeln!(out, "{number:6}\t{}", text.trim_end_matches('\n'))?;
    }

    device.close();
    Ok(())
}

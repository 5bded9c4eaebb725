use bitwire::read::{Reader, SliceReader};
use bitwire::size;
use docopt::Docopt;
use serde::Deserialize;

use std::fs;
use std::io;

static USAGE: &str = "
Decode the session trailer of a bitwire image.

A stream written with sessions ends in a 4-byte table size preceded by the
size-encoded session endpoints. Print the data size, the endpoint list, and
the bytes each session spans, so a mismatched reader/writer pair can be
debugged without running either program.

Usage:
  dump-sessions <file>
";

#[derive(Debug, Deserialize)]
struct Args {
    arg_file: String,
}

fn main() -> io::Result<()> {
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());

    let bytes = fs::read(&args.arg_file)?;
    println!("{}: {} bytes", args.arg_file, bytes.len());

    if bytes.len() < 4 {
        println!("no session trailer (shorter than the 4-byte table size)");
        return Ok(());
    }

    let mut table_size = [0u8; 4];
    table_size.copy_from_slice(&bytes[bytes.len() - 4..]);
    let table_size = u32::from_le_bytes(table_size) as usize;
    if table_size < 4 || table_size > bytes.len() {
        println!(
            "no session trailer (table size {} does not fit the image)",
            table_size
        );
        return Ok(());
    }

    let data_size = bytes.len() - table_size;
    println!("data: {} bytes, trailer: {} bytes", data_size, table_size);

    let mut reader: SliceReader = SliceReader::new(&bytes);
    reader.set_read_pos(data_size);
    let mut endpoints = Vec::new();
    while reader.current_read_pos() < bytes.len() - 4 {
        let endpoint = size::read_size(&mut reader, bytes.len());
        if reader.error() != bitwire::ReaderError::NoError {
            println!("trailer is corrupt at offset {}", reader.current_read_pos());
            return Ok(());
        }
        endpoints.push(endpoint);
    }

    println!("{} session endpoint(s):", endpoints.len());
    let mut previous = 0usize;
    for (index, &endpoint) in endpoints.iter().enumerate() {
        let span = endpoint.saturating_sub(previous);
        let note = if endpoint > data_size {
            "  (past the data region!)"
        } else {
            ""
        };
        println!(
            "  [{}] ends at {} ({} byte(s) after the previous){}",
            index, endpoint, span, note
        );
        previous = endpoint;
    }

    Ok(())
}

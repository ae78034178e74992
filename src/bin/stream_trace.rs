//! Feed captured 3270 records through the interpreter and show the screen.
//!
//! Reads whitespace-separated hex bytes from stdin (one record per line,
//! without the Telnet framing) and prints the resulting screen and field map
//! after each record. Useful for replaying wireshark captures against the
//! data-stream interpreter.

use std::io::{self, BufRead};

use anyhow::{bail, Context, Result};
use tn3270r::lib3270::display::{ScreenPair, TerminalModel};
use tn3270r::lib3270::protocol::ProtocolProcessor3270;

fn parse_hex_line(line: &str) -> Result<Vec<u8>> {
    line.split_whitespace()
        .map(|tok| {
            u8::from_str_radix(tok.trim_start_matches("0x"), 16)
                .with_context(|| format!("bad hex byte '{tok}'"))
        })
        .collect()
}

fn main() -> Result<()> {
    env_logger::init();

    let model = match std::env::args().nth(1).as_deref() {
        None | Some("2") => TerminalModel::Model2,
        Some("3") => TerminalModel::Model3,
        Some("4") => TerminalModel::Model4,
        Some("5") => TerminalModel::Model5,
        Some(other) => bail!("unknown model '{other}' (expected 2-5)"),
    };

    let mut screens = ScreenPair::new(model);
    let mut processor = ProtocolProcessor3270::new();

    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let record = parse_hex_line(&line)?;
        match processor.process_record(&record, &mut screens) {
            Ok(outcome) => {
                if let Some(error) = outcome.error {
                    eprintln!("record error (prior mutations kept): {error}");
                }
                for (i, reply) in outcome.replies.iter().enumerate() {
                    let hex: Vec<String> = reply.iter().map(|b| format!("{b:02X}")).collect();
                    println!("reply[{i}]: {}", hex.join(" "));
                }
            }
            Err(e) => {
                eprintln!("record discarded: {e}");
                continue;
            }
        }

        let display = screens.active();
        println!("+{}+", "-".repeat(display.cols()));
        for row in 0..display.rows() {
            println!("|{}|", display.render_row(row).unwrap_or_default());
        }
        println!("+{}+", "-".repeat(display.cols()));

        for (pos, protected) in display.field_list() {
            println!(
                "field at {:4} ({:3},{:2}) protected={}",
                pos,
                pos % display.cols(),
                pos / display.cols(),
                protected
            );
        }
    }

    Ok(())
}

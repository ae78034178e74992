use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tn3270r::lib3270::codes::*;
use tn3270r::lib3270::display::{addressing, ScreenPair, TerminalModel};
use tn3270r::lib3270::protocol::ProtocolProcessor3270;
use tn3270r::telnet_negotiation::{TelnetFramer, EOR_MARK, IAC};

/// A representative login-screen record: erase, a handful of labelled input
/// fields, a status line.
fn sample_record() -> Vec<u8> {
    let mut record = vec![CMD_EW, 0xC3];

    for row in 0..8u16 {
        let label_at = (row as usize) * 160 + 80;
        let (b1, b2) = addressing::encode_address(label_at, 1920);
        record.extend_from_slice(&[ORDER_SBA, b1, b2]);
        record.extend_from_slice(&[ORDER_SF, 0xF0]);
        // "USERID. . :" style label
        record.extend_from_slice(&[0xE4, 0xE2, 0xC5, 0xD9, 0xC9, 0xC4, 0x7A]);
        record.extend_from_slice(&[ORDER_SF, 0x00]);
    }

    let (b1, b2) = addressing::encode_address(1840, 1920);
    record.extend_from_slice(&[ORDER_SBA, b1, b2, ORDER_SF, 0xF0]);
    record.extend_from_slice(&[0xD9, 0xE4, 0xD5, 0xD5, 0xC9, 0xD5, 0xC7]);
    record.extend_from_slice(&[ORDER_IC]);

    record
}

fn bench_process_record(c: &mut Criterion) {
    let record = sample_record();

    c.bench_function("process_record", |b| {
        let mut processor = ProtocolProcessor3270::new();
        let mut screens = ScreenPair::new(TerminalModel::Model2);
        b.iter(|| {
            black_box(
                processor
                    .process_record(black_box(&record), black_box(&mut screens))
                    .unwrap(),
            );
        });
    });
}

fn bench_framer_feed(c: &mut Criterion) {
    // The sample record wrapped in telnet framing, repeated as one large read
    let mut wire = Vec::new();
    for _ in 0..16 {
        for &b in &sample_record() {
            wire.push(b);
            if b == IAC {
                wire.push(IAC);
            }
        }
        wire.push(IAC);
        wire.push(EOR_MARK);
    }

    c.bench_function("framer_feed_16_records", |b| {
        b.iter(|| {
            let mut framer = TelnetFramer::new(TerminalModel::Model2, None);
            black_box(framer.feed(black_box(&wire)));
        });
    });
}

fn bench_read_modified(c: &mut Criterion) {
    let mut processor = ProtocolProcessor3270::new();
    let mut screens = ScreenPair::new(TerminalModel::Model2);
    processor.process_record(&sample_record(), &mut screens).unwrap();

    // Fill the input fields and tag them modified
    for row in 0..8usize {
        let field = row * 160 + 88;
        let display = screens.active_mut();
        for i in 1..=8 {
            display.set_char(field + i, 0xC1 + (i as u8 % 9), false);
        }
        display.set_mdt(field + 1, true);
    }

    c.bench_function("read_modified", |b| {
        b.iter(|| {
            let display = screens.active_mut();
            let mut buffer = Vec::new();
            buffer.push(AID_ENTER);
            display.push_address(&mut buffer, display.cursor_pos());
            display.modified_fields(&mut buffer);
            black_box(buffer);
        });
    });
}

criterion_group!(
    benches,
    bench_process_record,
    bench_framer_feed,
    bench_read_modified
);
criterion_main!(benches);

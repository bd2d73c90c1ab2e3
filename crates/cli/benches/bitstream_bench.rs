use bitstream::BitBuffer;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

const N: usize = 10_000;

fn write_unaligned_fields(c: &mut Criterion) {
    c.bench_function("write_bits_mixed_widths_10k", |b| {
        b.iter(|| {
            let mut buf = BitBuffer::new();
            for i in 0..N as u32 {
                buf.write_bits(i, 24);
                buf.write_bits(i & 0x7, 3);
                buf.write_bits(i & 0x1f, 5);
            }
            buf
        });
    });
}

fn write_aligned_fields(c: &mut Criterion) {
    c.bench_function("write_bits64_aligned_10k", |b| {
        b.iter(|| {
            let mut buf = BitBuffer::with_capacity(N * 8);
            for i in 0..N as u64 {
                buf.write_bits64(i * 1_000_003, 64);
            }
            buf
        });
    });
}

fn read_fields(c: &mut Criterion) {
    c.bench_function("read_bits_mixed_widths_10k", |b| {
        b.iter_batched(
            || {
                let mut buf = BitBuffer::new();
                for i in 0..N as u32 {
                    buf.write_bits(i, 24);
                    buf.write_bits(i & 0x7, 3);
                    buf.write_bits(i & 0x1f, 5);
                }
                buf
            },
            |buf| {
                let mut cursor = 0;
                for _ in 0..N {
                    buf.read_bits(&mut cursor, 24).unwrap();
                    buf.read_bits(&mut cursor, 3).unwrap();
                    buf.read_bits(&mut cursor, 5).unwrap();
                }
                assert_eq!(cursor, buf.len_bits());
            },
            BatchSize::LargeInput,
        );
    });
}

fn pascal_strings(c: &mut Criterion) {
    c.bench_function("pascal_roundtrip_5k", |b| {
        b.iter(|| {
            let mut buf = BitBuffer::new();
            for i in 0..N / 2 {
                buf.write_bits(1, 3);
                buf.write_pascal_string(&format!("mod-{i}.jar")).unwrap();
            }
            let mut cursor = 0;
            for _ in 0..N / 2 {
                buf.read_bits(&mut cursor, 3).unwrap();
                buf.read_pascal_string(&mut cursor).unwrap();
            }
        });
    });
}

criterion_group!(
    benches,
    write_unaligned_fields,
    write_aligned_fields,
    read_fields,
    pascal_strings,
);

criterion_main!(benches);

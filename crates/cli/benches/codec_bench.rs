use chrono::DateTime;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use records::{
    decode_mod_list, encode_mod_list, CatalogLayout, DownloadField, GameVersion, ModEntry,
    ModLoader, RecordLayout, VersionCatalog, NEXT_MAJOR,
};

const N: u32 = 1_000;

fn mods() -> Vec<ModEntry> {
    (0..N)
        .map(|i| ModEntry {
            id: 200_000 + i,
            loader: ModLoader::Forge,
            game_version: GameVersion::new(20, 1),
            deps: (0..i % 4).map(|d| 300_000 + d).collect(),
            name: format!("mod-{i}.jar"),
            download_url: format!("https://edge.forgecdn.net/files/{}/{:03}/mod-{i}.jar", 4000 + i, i % 1000),
            uploaded: DateTime::from_timestamp(1_689_000_000 + i64::from(i), 0).unwrap(),
        })
        .collect()
}

fn encode_list(c: &mut Criterion) {
    let entries = mods();
    for (label, download) in [("url", DownloadField::Url), ("cdn", DownloadField::CdnPath)] {
        let layout = RecordLayout {
            download,
            ..RecordLayout::default()
        };
        c.bench_function(&format!("encode_mod_list_1k_{label}"), |b| {
            b.iter(|| encode_mod_list(&entries, &layout).unwrap());
        });
    }
}

fn decode_list(c: &mut Criterion) {
    let layout = RecordLayout::default();
    c.bench_function("decode_mod_list_1k", |b| {
        b.iter_batched(
            || encode_mod_list(&mods(), &layout).unwrap(),
            |buf| {
                let decoded = decode_mod_list(&buf, &layout);
                assert_eq!(decoded.len(), N as usize);
            },
            BatchSize::LargeInput,
        );
    });
}

fn catalog_roundtrip(c: &mut Criterion) {
    let versions: Vec<GameVersion> = (NEXT_MAJOR..=31u8)
        .rev()
        .flat_map(|major| (0..=9u8).rev().map(move |minor| GameVersion::new(major, minor)))
        .collect();
    let catalog = VersionCatalog::new(versions);
    c.bench_function("catalog_group_count_roundtrip", |b| {
        b.iter(|| {
            let mut buf = bitstream::BitBuffer::new();
            catalog.encode(&mut buf, CatalogLayout::GroupCount).unwrap();
            let mut cursor = 0;
            VersionCatalog::decode(&buf, &mut cursor, CatalogLayout::GroupCount).unwrap()
        });
    });
}

criterion_group!(benches, encode_list, decode_list, catalog_roundtrip);
criterion_main!(benches);

use byteorder::{BigEndian, WriteBytesExt};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use icon_theme_cache::IconCache;

const OFFSET_NONE: u32 = 0xFFFF_FFFF;

fn name_hash(name: &str) -> u32 {
    let bytes = name.as_bytes();
    let mut h = u32::from(bytes[0]);
    for &b in &bytes[1..] {
        h = h.wrapping_mul(31).wrapping_add(u32::from(b));
    }
    h
}

/// Assemble a payload-free blob with `n_icons` icons spread over the
/// directories, one image entry per icon.
fn synthetic_blob(directories: &[&str], n_icons: usize) -> Vec<u8> {
    let names: Vec<String> = (0..n_icons).map(|i| format!("app-icon-{i:05}")).collect();
    let n_buckets = (n_icons / 3).max(1) as u32;

    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); n_buckets as usize];
    for (i, name) in names.iter().enumerate() {
        buckets[(name_hash(name) % n_buckets) as usize].push(i);
    }
    let order: Vec<usize> = buckets.iter().flatten().copied().collect();

    let hash_offset: u32 = 12;
    let nodes_start = hash_offset + 4 + 4 * n_buckets;
    let mut node_offset = vec![0u32; n_icons];
    for (pos, &i) in order.iter().enumerate() {
        node_offset[i] = nodes_start + 12 * pos as u32;
    }

    let lists_start = nodes_start + 12 * n_icons as u32;
    let mut list_offset = vec![0u32; n_icons];
    let mut cursor = lists_start;
    for &i in &order {
        list_offset[i] = cursor;
        cursor += 4 + 8;
    }

    let dir_list_offset = cursor;
    cursor += 4 + 4 * directories.len() as u32;
    let mut dir_name_offset = vec![0u32; directories.len()];
    for (i, name) in directories.iter().enumerate() {
        dir_name_offset[i] = cursor;
        cursor += name.len() as u32 + 1;
    }
    let mut icon_name_offset = vec![0u32; n_icons];
    for &i in &order {
        icon_name_offset[i] = cursor;
        cursor += names[i].len() as u32 + 1;
    }

    let mut blob = Vec::with_capacity(cursor as usize);
    blob.write_u16::<BigEndian>(1).unwrap();
    blob.write_u16::<BigEndian>(0).unwrap();
    blob.write_u32::<BigEndian>(hash_offset).unwrap();
    blob.write_u32::<BigEndian>(dir_list_offset).unwrap();

    blob.write_u32::<BigEndian>(n_buckets).unwrap();
    for chain in &buckets {
        let head = chain.first().map_or(OFFSET_NONE, |&i| node_offset[i]);
        blob.write_u32::<BigEndian>(head).unwrap();
    }
    for chain in &buckets {
        for (k, &i) in chain.iter().enumerate() {
            let next = chain.get(k + 1).map_or(OFFSET_NONE, |&n| node_offset[n]);
            blob.write_u32::<BigEndian>(next).unwrap();
            blob.write_u32::<BigEndian>(icon_name_offset[i]).unwrap();
            blob.write_u32::<BigEndian>(list_offset[i]).unwrap();
        }
    }
    for &i in &order {
        blob.write_u32::<BigEndian>(1).unwrap();
        blob.write_u16::<BigEndian>((i % directories.len()) as u16).unwrap();
        blob.write_u16::<BigEndian>(4).unwrap(); // png suffix
        blob.write_u32::<BigEndian>(0).unwrap();
    }

    blob.write_u32::<BigEndian>(directories.len() as u32).unwrap();
    for offset in &dir_name_offset {
        blob.write_u32::<BigEndian>(*offset).unwrap();
    }
    for name in directories {
        blob.extend_from_slice(name.as_bytes());
        blob.push(0);
    }
    for &i in &order {
        blob.extend_from_slice(names[i].as_bytes());
        blob.push(0);
    }

    assert_eq!(blob.len() as u32, cursor);
    blob
}

const DIRECTORIES: &[&str] = &["16x16/apps", "32x32/apps", "48x48/apps", "scalable/apps"];

fn benchmark_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("construction");
    for n_icons in [100, 1_000, 10_000] {
        let blob = synthetic_blob(DIRECTORIES, n_icons);
        group.bench_with_input(BenchmarkId::new("from_bytes", n_icons), &blob, |b, blob| {
            b.iter(|| {
                let cache = IconCache::from_bytes(black_box(blob.clone())).unwrap();
                black_box(cache);
            })
        });
    }
    group.finish();
}

fn benchmark_lookups(c: &mut Criterion) {
    let cache = IconCache::from_bytes(synthetic_blob(DIRECTORIES, 10_000)).unwrap();

    c.bench_function("has_icon_hit", |b| {
        b.iter(|| {
            for i in 0..100usize {
                let name = format!("app-icon-{:05}", i * 97 % 10_000);
                black_box(cache.has_icon(black_box(&name)));
            }
        })
    });

    c.bench_function("has_icon_miss", |b| {
        b.iter(|| {
            black_box(cache.has_icon(black_box("no-such-icon")));
        })
    });

    c.bench_function("directory_index", |b| {
        b.iter(|| {
            black_box(cache.directory_index(black_box("scalable/apps")));
        })
    });

    c.bench_function("icon_flags", |b| {
        b.iter(|| {
            black_box(cache.icon_flags(black_box("app-icon-00042"), 2));
        })
    });

    c.bench_function("icons_in_directory", |b| {
        b.iter(|| {
            black_box(cache.icons_in_directory(black_box("16x16/apps")));
        })
    });
}

criterion_group!(benches, benchmark_construction, benchmark_lookups);
criterion_main!(benches);

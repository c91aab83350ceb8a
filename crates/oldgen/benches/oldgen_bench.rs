//! Old Generation Benchmarks
//!
//! Run with: `cargo bench --package oldgen`

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use oldgen::util::constants::MB;
use oldgen::{AllocationPretouch, OldGen, OldGenConfig};

fn bench_config() -> OldGenConfig {
    let alignment = (64 * 1024).max(oldgen::heap::page::get_page_size());
    OldGenConfig {
        min_size: 4 * MB,
        initial_size: 16 * MB,
        max_size: 256 * MB,
        alignment,
        zap_unused_heap_area: false,
        ..Default::default()
    }
}

fn create_gen() -> OldGen {
    OldGen::new(bench_config(), "old", 1).unwrap()
}

fn bench_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("cas_allocate_noexpand_4_words", |b| {
        b.iter_batched(
            create_gen,
            |gen| {
                for _ in 0..1000 {
                    black_box(gen.cas_allocate_noexpand(4));
                }
                gen
            },
            BatchSize::LargeInput,
        )
    });

    group.bench_function("allocate_with_growth_512_words", |b| {
        b.iter_batched(
            || {
                let gen = create_gen();
                while gen.cas_allocate_noexpand(512).is_some() {}
                gen
            },
            |gen| {
                for _ in 0..1000 {
                    black_box(gen.allocate(512).unwrap());
                }
                gen
            },
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

fn bench_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("resize");
    let gen = create_gen();

    group.bench_function("grow_and_shrink_16mb", |b| {
        b.iter(|| {
            gen.resize(black_box(32 * MB));
            gen.resize(black_box(0));
        })
    });

    group.bench_function("noop", |b| {
        gen.resize(16 * MB);
        let desired = gen.capacity_in_bytes() - gen.used_in_bytes();
        b.iter(|| gen.resize(black_box(desired)))
    });

    group.finish();
}

fn bench_pretouch_hook(c: &mut Criterion) {
    let gen = create_gen();
    let space = gen.object_space();
    let stride = oldgen::heap::page::get_page_size();

    c.bench_function("pretouch_hook_sequential", |b| {
        b.iter_batched(
            || AllocationPretouch::new(space.bottom(), stride, 4),
            |cursor| {
                let mut addr = space.bottom();
                for _ in 0..1000 {
                    cursor.on_allocation(addr, 64, space.end());
                    addr += 64;
                }
                cursor
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("iteration");
    let gen = create_gen();
    for i in 0..100_000 {
        gen.allocate(2 + i % 30).unwrap();
    }

    group.bench_function("object_iterate", |b| {
        b.iter(|| {
            let mut count = 0usize;
            gen.object_iterate(|_| count += 1);
            black_box(count)
        })
    });

    group.bench_function("object_iterate_parallel", |b| {
        b.iter(|| gen.object_iterate_parallel(|obj| {
            black_box(obj.addr());
        }))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_allocation,
    bench_resize,
    bench_pretouch_hook,
    bench_iteration
);
criterion_main!(benches);

use craftrelay::bridge::format::{game_lines, truncate_for_chat};
use craftrelay::events::classify;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

const LINES: [&str; 6] = [
    "[12:00:00] [Server thread/INFO]: <Steve> relay whereis Alex",
    "[12:00:00] [Server thread/INFO]: Steve joined the game",
    "[12:00:00] [Server thread/INFO]: Steve has just earned the achievement [Taking Inventory]",
    "[12:00:00] [Server thread/INFO]: Alex was slain by Zombie",
    "[12:00:00] [Server thread/INFO]: UUID of player Steve is 069a79f4-44e9-4726-a5be-fca90e38aaf5",
    "[12:00:00] [Server thread/WARN]: Can't keep up! Is the server overloaded?",
];

fn classify_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    group.throughput(Throughput::Elements(LINES.len() as u64));

    group.bench_function("mixed_lines", |b| {
        b.iter(|| {
            for line in LINES {
                black_box(classify(black_box(line)));
            }
        })
    });

    group.finish();
}

fn format_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("format");
    let text = "There are 3 of a max of 20 players online: Steve, Alex, @p\n".repeat(40);
    group.throughput(Throughput::Bytes(text.len() as u64));

    group.bench_function("game_lines", |b| b.iter(|| game_lines(black_box(&text))));
    group.bench_function("truncate_for_chat", |b| {
        b.iter(|| truncate_for_chat(black_box(&text), 1024, "..."))
    });

    group.finish();
}

criterion_group!(benches, classify_benchmark, format_benchmark);
criterion_main!(benches);

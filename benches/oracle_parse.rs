use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vigia::resolver::sentinel::{parse_reply, query_command};

fn bench_parse_reply(c: &mut Criterion) {
    let mut group = c.benchmark_group("sentinel_reply");

    let replies: [(&str, &[u8]); 3] = [
        ("ipv4", b"*2\r\n$8\r\n10.0.0.5\r\n$4\r\n6380\r\n"),
        ("hostname", b"*2\r\n$27\r\nredis-0.redis.svc.cluster.x\r\n$4\r\n6379\r\n"),
        ("null", b"*-1\r\n"),
    ];

    for (name, reply) in replies.iter() {
        group.bench_with_input(BenchmarkId::new("parse", name), reply, |b, reply| {
            b.iter(|| {
                let result = parse_reply(black_box(reply));
                black_box(result.is_ok());
            });
        });
    }

    group.finish();
}

fn bench_query_command(c: &mut Criterion) {
    c.bench_function("query_command", |b| {
        b.iter(|| black_box(query_command(black_box("mymaster"))))
    });
}

criterion_group!(benches, bench_parse_reply, bench_query_command);
criterion_main!(benches);

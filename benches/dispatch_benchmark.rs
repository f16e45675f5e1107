use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rolebond::{
    Dispatcher, EventBus, MessageCodec, ProtocolConfig, RelationBook, Whitelist,
};
use tokio::runtime::Runtime;

fn partners(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("Partner {i}")).collect()
}

/// Decoding alone, valid and malformed lines
fn decode_benchmark(c: &mut Criterion) {
    let codec = MessageCodec::new(&ProtocolConfig::default());
    c.bench_function("decode_valid", |b| {
        b.iter(|| codec.decode(black_box("[rolebond] 14|Partner 42|Absolute-Slave")))
    });
    c.bench_function("decode_malformed", |b| {
        b.iter(|| codec.decode(black_box("[rolebond] 14|Partner 42")))
    });
}

/// Decode + resolve + transition against a whitelist of 200 partners
fn dispatch_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let config = ProtocolConfig::default();
    let dispatcher = Dispatcher::new(&config, "Bench", EventBus::new());
    let mut book = RelationBook::new(Whitelist::from_names(partners(200)).unwrap());

    let lines = [
        "[rolebond] 11|Partner 150|Owner",
        "[rolebond] 14|Partner 150|Pet",
        "[rolebond] 17|Partner 150|",
        "[rolebond] 18|Partner 150|",
        "[rolebond] 11|Stranger|Owner",
    ];
    c.bench_function("dispatch_cycle", |b| {
        b.iter(|| {
            rt.block_on(async {
                for line in lines {
                    let _ = dispatcher.handle_payload(&mut book, black_box(line)).await;
                }
            })
        })
    });
}

criterion_group!(benches, decode_benchmark, dispatch_benchmark);
criterion_main!(benches);

// Token and envelope benchmarks for txnwrap.
//
// Covers the raw cipher, payload envelopes of growing size, and the full
// issue/validate path against the in-memory and sled stores.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use txnwrap::config::WrapperConfig;
use txnwrap::crypto::{self, CipherKey};
use txnwrap::envelope::PayloadEnvelope;
use txnwrap::storage::{MemoryTokenStore, TokenDB, TokenStore};
use txnwrap::token::{IssueRequest, TokenService};

const KEY: &str = "0123456789abcdef0123456789abcdef";
const IV: &str = "abcdef9876543210";

fn config() -> WrapperConfig {
    WrapperConfig::new(KEY, IV, "s3cret")
}

/// Requests with distinct clients so every issue writes a new row.
fn request(i: u64) -> IssueRequest {
    IssueRequest {
        client_id: format!("client-{i}"),
        processor: "razorpay".into(),
        transaction_user_id: "U1".into(),
        transaction_merchant_id: "M1".into(),
        transaction_timestamp: chrono::Local::now()
            .naive_local()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
    }
}

fn bench_cipher(c: &mut Criterion) {
    let key = CipherKey::from_bytes(KEY.as_bytes(), IV.as_bytes()).unwrap();
    let plaintext = "U1M1s3cret2024-01-01 10:00:00RAZORPAY";
    let token = crypto::encrypt(plaintext, &key);

    c.bench_function("cipher/encrypt_token", |b| {
        b.iter(|| crypto::encrypt(plaintext, &key));
    });
    c.bench_function("cipher/decrypt_token", |b| {
        b.iter(|| crypto::decrypt(&token, &key).unwrap());
    });
}

fn bench_envelope(c: &mut Criterion) {
    let envelope = PayloadEnvelope::new(&config()).unwrap();
    let mut group = c.benchmark_group("envelope/roundtrip");

    for size in [256usize, 4 * 1024, 64 * 1024] {
        let body = format!(r#"{{"blob":"{}"}}"#, "x".repeat(size));
        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &body, |b, body| {
            b.iter(|| {
                let sealed = envelope.encrypt_payload(body);
                envelope.decrypt_payload(&sealed).unwrap()
            });
        });
    }

    group.finish();
}

fn bench_issue_validate(c: &mut Criterion) {
    let stores: Vec<(&str, Arc<dyn TokenStore>)> = vec![
        ("memory", Arc::new(MemoryTokenStore::new())),
        ("sled", Arc::new(TokenDB::open_temporary().unwrap())),
    ];

    for (name, store) in stores {
        let service = TokenService::new(&config(), store).unwrap();

        let mut next = 0u64;
        c.bench_function(&format!("token/issue_new/{name}"), |b| {
            b.iter(|| {
                next += 1;
                service.issue(&request(next)).unwrap()
            });
        });

        let reused = request(u64::MAX);
        service.issue(&reused).unwrap();
        c.bench_function(&format!("token/issue_reuse/{name}"), |b| {
            b.iter(|| service.issue(&reused).unwrap());
        });

        let token = service.issue(&reused).unwrap();
        c.bench_function(&format!("token/validate/{name}"), |b| {
            b.iter(|| service.validate(&token, Some(reused.client_id.as_str()), Some("RAZORPAY")));
        });
    }
}

criterion_group!(benches, bench_cipher, bench_envelope, bench_issue_validate);
criterion_main!(benches);

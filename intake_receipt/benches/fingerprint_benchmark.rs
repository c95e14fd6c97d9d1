// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use intake_receipt::{callback::ExtractionCallback, fingerprint, Amount};

pub fn criterion_benchmark(c: &mut Criterion) {
    let date = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
    let amount: Amount = "12.50".parse().unwrap();

    c.bench_function("fingerprint", |b| {
        b.iter(|| {
            fingerprint(
                black_box(Some(" ACME Mart ")),
                black_box(Some(date)),
                black_box(Some(amount)),
            )
        })
    });

    let payload = r#"{"receipt_id": 1, "store_name": "ACME Mart", "receipt_date": "2026-02-10",
        "total_amount": 12.5, "payment_method": "cash", "raw_text": "ACME MART 12.50"}"#;
    c.bench_function("parse and fingerprint callback", |b| {
        b.iter(|| {
            let callback: ExtractionCallback = serde_json::from_str(black_box(payload)).unwrap();
            callback.into_parts().1.fingerprint()
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

// SPDX-License-Identifier: AGPL-3.0-or-later
//! Benchmark for request decoding and registry updates.
//!
//! Measures the per-request cost on the ingestion path without sockets:
//! decoding a frame from memory and applying an update to a warm registry.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hublib::codec::{read_request, DEFAULT_MAX_FIELD_LEN};
use hublib::registry::{Device, DeviceInfo, DeviceRegistry, SensorInfo};
use hublib::{Registration, Request, Update};

fn registration_frame() -> Vec<u8> {
    Request::Registration(Registration {
        device_id: "a4cf12f0e2b1".into(),
        sensor_id: "temperature".into(),
        display_name: "Temperature".into(),
        unit_of_measurement: "°C".into(),
        state_class: "measurement".into(),
        device_class: "temperature".into(),
    })
    .encode()
}

fn update_frame() -> Vec<u8> {
    Request::Update(Update {
        device_id: "a4cf12f0e2b1".into(),
        sensor_id: "temperature".into(),
        value: "21.5".into(),
    })
    .encode()
}

fn bench_decode(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let registration = registration_frame();
    c.bench_function("decode_registration", |b| {
        b.iter(|| {
            let mut reader = registration.as_slice();
            runtime
                .block_on(read_request(&mut reader, DEFAULT_MAX_FIELD_LEN))
                .unwrap()
        });
    });

    let update = update_frame();
    c.bench_function("decode_update", |b| {
        b.iter(|| {
            let mut reader = update.as_slice();
            runtime
                .block_on(read_request(&mut reader, DEFAULT_MAX_FIELD_LEN))
                .unwrap()
        });
    });
}

fn bench_registry_update(c: &mut Criterion) {
    let mut registry = DeviceRegistry::new();
    for d in 0..32 {
        let device_id = format!("node{}", d);
        registry.add(Device::new(DeviceInfo {
            device_id: device_id.clone(),
            ..Default::default()
        }));
        for s in 0..8 {
            registry.register_sensor(&device_id, &format!("s{}", s), SensorInfo::default());
        }
    }

    c.bench_function("registry_update_value", |b| {
        b.iter(|| registry.update_value(black_box("node31"), black_box("s7"), black_box("21.5")));
    });
}

criterion_group!(benches, bench_decode, bench_registry_update);
criterion_main!(benches);

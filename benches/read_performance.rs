//! Performance benchmarks for managed-datafile.
//!
//! Reads through a managed client should cost one `arc-swap` load plus the inner
//! call, and must keep succeeding while new clients are being installed.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use managed_datafile::client::{EventTags, UserAttributes};
use managed_datafile::core::DatafileListener;
use managed_datafile::notify::UpdateChannel;
use managed_datafile::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn datafile(revision: usize) -> Datafile {
    Datafile::from_json(&format!(
        r#"{{"revision":"{revision}","enabledFeatures":["checkout","search"]}}"#
    ))
    .unwrap()
}

/// Minimal evaluation client answering from its datafile's feature list.
struct BenchClient {
    features: Vec<String>,
}

impl BenchClient {
    fn from_config(config: ClientConfig) -> Self {
        let features = config
            .datafile
            .as_ref()
            .and_then(|d| d.get("enabledFeatures"))
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        Self { features }
    }
}

impl EvaluationClient for BenchClient {
    type NotificationCenter = ();

    fn invalid() -> Self {
        Self { features: Vec::new() }
    }

    fn is_valid_instance(&self) -> bool {
        !self.features.is_empty()
    }

    fn activate(&self, key: &str, _: &str, _: Option<&UserAttributes>) -> Option<String> {
        Some(key.to_string())
    }

    fn get_variation(&self, key: &str, _: &str, _: Option<&UserAttributes>) -> Option<String> {
        Some(key.to_string())
    }

    fn track(&self, _: &str, _: &str, _: Option<&UserAttributes>, _: Option<&EventTags>) {}

    fn is_feature_enabled(&self, key: &str, _: &str, _: Option<&UserAttributes>) -> bool {
        self.features.iter().any(|f| f == key)
    }

    fn get_enabled_features(&self, _: &str, _: Option<&UserAttributes>) -> Vec<String> {
        self.features.clone()
    }

    fn get_feature_variable_string(
        &self,
        _: &str,
        _: &str,
        _: &str,
        _: Option<&UserAttributes>,
    ) -> Option<String> {
        None
    }

    fn get_feature_variable_boolean(
        &self,
        _: &str,
        _: &str,
        _: &str,
        _: Option<&UserAttributes>,
    ) -> Option<bool> {
        None
    }

    fn get_feature_variable_integer(
        &self,
        _: &str,
        _: &str,
        _: &str,
        _: Option<&UserAttributes>,
    ) -> Option<i64> {
        None
    }

    fn get_feature_variable_double(
        &self,
        _: &str,
        _: &str,
        _: &str,
        _: Option<&UserAttributes>,
    ) -> Option<f64> {
        None
    }

    fn get_forced_variation(&self, _: &str, _: &str) -> Option<String> {
        None
    }

    fn set_forced_variation(&self, _: &str, _: &str, _: Option<&str>) -> bool {
        false
    }

    fn notification_center(&self) -> Option<()> {
        None
    }

    fn close(&self) {}
}

/// Manager whose updates are pushed by the benchmark itself.
struct PushManager {
    datafile: Arc<Datafile>,
    updates: UpdateChannel<Arc<Datafile>>,
}

impl PushManager {
    fn new() -> Self {
        Self {
            datafile: Arc::new(datafile(0)),
            updates: UpdateChannel::new(),
        }
    }

    fn push(&self, datafile: Datafile) {
        self.updates.emit(&Arc::new(datafile));
    }
}

impl DatafileManager for PushManager {
    fn get(&self) -> Option<Arc<Datafile>> {
        Some(Arc::clone(&self.datafile))
    }

    fn on_ready(&self) -> Readiness<Arc<Datafile>> {
        Readiness::resolved(Arc::clone(&self.datafile))
    }

    fn on_update(&self, listener: DatafileListener) -> ListenerDisposer {
        self.updates.subscribe_arc(Arc::from(listener))
    }

    fn start(&self) {}

    fn stop(&self) {}
}

fn static_client() -> ManagedClient<BenchClient> {
    ManagedClient::builder(BenchClient::from_config)
        .with_datafile(datafile(0))
        .build()
}

/// Benchmark single-threaded reads of the cached datafile
fn benchmark_manager_get(c: &mut Criterion) {
    let manager = StaticDatafileManager::new(datafile(0));

    let mut group = c.benchmark_group("manager_get");
    group.bench_function("static_get", |b| {
        b.iter(|| {
            let datafile = manager.get();
            black_box(datafile);
        });
    });
    group.finish();
}

/// Benchmark a single proxied evaluation call
fn benchmark_proxy_read(c: &mut Criterion) {
    let client = static_client();

    let mut group = c.benchmark_group("proxy_read");
    group.bench_function("is_feature_enabled", |b| {
        b.iter(|| black_box(client.is_feature_enabled("search", "user", None)));
    });
    group.bench_function("client_handle", |b| {
        b.iter(|| black_box(client.client()));
    });
    group.finish();
}

/// Benchmark concurrent proxied reads with varying thread counts
fn benchmark_concurrent_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_reads");

    for num_threads in [1, 2, 4, 8, 16] {
        group.throughput(Throughput::Elements(num_threads as u64 * 1000));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_threads", num_threads)),
            &num_threads,
            |b, &num_threads| {
                let client = Arc::new(static_client());
                let barrier = Arc::new(Barrier::new(num_threads + 1));

                b.iter_custom(|iters| {
                    let mut handles = vec![];

                    for _ in 0..num_threads {
                        let client = Arc::clone(&client);
                        let barrier = Arc::clone(&barrier);

                        handles.push(thread::spawn(move || {
                            barrier.wait();

                            let start = std::time::Instant::now();
                            for _ in 0..iters {
                                black_box(client.is_feature_enabled("search", "user", None));
                            }
                            start.elapsed()
                        }));
                    }

                    barrier.wait();

                    let total: Duration = handles.into_iter().map(|h| h.join().unwrap()).sum();
                    total / num_threads as u32
                });
            },
        );
    }

    group.finish();
}

/// Benchmark client installs while readers keep evaluating
fn benchmark_install_under_load(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("install_under_load");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("install_with_16_readers", |b| {
        b.iter_custom(|iters| {
            runtime.block_on(async move {
                let manager = Arc::new(PushManager::new());
                let client = Arc::new(
                    ManagedClient::builder(BenchClient::from_config)
                        .with_manager(manager.clone())
                        .build(),
                );
                let keep_running = Arc::new(AtomicBool::new(true));
                let failed_reads = Arc::new(AtomicUsize::new(0));

                let mut readers = vec![];
                for _ in 0..16 {
                    let client = Arc::clone(&client);
                    let running = Arc::clone(&keep_running);
                    let failed = Arc::clone(&failed_reads);

                    readers.push(tokio::spawn(async move {
                        while running.load(Ordering::Relaxed) {
                            if !client.is_feature_enabled("search", "user", None) {
                                failed.fetch_add(1, Ordering::Relaxed);
                            }
                            tokio::task::yield_now().await;
                        }
                    }));
                }

                let start = std::time::Instant::now();
                for i in 0..iters {
                    manager.push(datafile(i as usize + 1));
                    tokio::time::sleep(Duration::from_micros(100)).await;
                }
                let duration = start.elapsed();

                keep_running.store(false, Ordering::Relaxed);
                for reader in readers {
                    reader.await.unwrap();
                }
                assert_eq!(failed_reads.load(Ordering::Relaxed), 0);

                duration
            })
        });
    });

    group.finish();
}

/// Benchmark fan-out to update listeners
fn benchmark_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("emit");

    for listeners in [1, 8, 64] {
        group.bench_with_input(
            BenchmarkId::from_parameter(listeners),
            &listeners,
            |b, &listeners| {
                let channel = UpdateChannel::<u64>::new();
                let sum = Arc::new(AtomicUsize::new(0));
                let _disposers: Vec<_> = (0..listeners)
                    .map(|_| {
                        let sum = Arc::clone(&sum);
                        channel.subscribe(move |v: &u64| {
                            sum.fetch_add(*v as usize, Ordering::Relaxed);
                        })
                    })
                    .collect();

                b.iter(|| channel.emit(black_box(&1)));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_manager_get,
    benchmark_proxy_read,
    benchmark_concurrent_reads,
    benchmark_install_under_load,
    benchmark_emit,
);

criterion_main!(benches);

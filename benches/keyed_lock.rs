use braid::sync::KeyedAsyncLock;
use braid::sync::KeyedGuard;
use criterion::BenchmarkGroup;
use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use std::hint::black_box;
use std::time::Duration;
use std::time::Instant;
use tokio::runtime::Builder;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use triomphe::Arc;

const TASKS: &[usize] = &[2, 4, 6, 8, 10];

fn runtime() -> Runtime {
  Builder::new_multi_thread().enable_all().build().unwrap()
}

fn bench_keyed_lock(criterion: &mut Criterion) {
  let mut group: BenchmarkGroup<_> = criterion.benchmark_group("keyed_lock");
  let runtime: Runtime = runtime();

  group.bench_function("uncontended", |bench| {
    let lock: KeyedAsyncLock<u64> = KeyedAsyncLock::new();

    bench.iter(|| {
      let guard: Option<KeyedGuard<'_, u64>> = lock.try_acquire(black_box(1));
      black_box(guard);
    })
  });

  for tasks in TASKS {
    let id: BenchmarkId = BenchmarkId::new("distinct-keys", tasks);

    group.bench_with_input(id, tasks, |bench, &tasks| {
      bench.to_async(&runtime).iter_custom(|iters| async move {
        let lock: Arc<KeyedAsyncLock<usize>> = Arc::new(KeyedAsyncLock::new());
        let mut handles: Vec<JoinHandle<Duration>> = Vec::with_capacity(tasks);

        for key in 0..tasks {
          let lock: Arc<KeyedAsyncLock<usize>> = Arc::clone(&lock);

          let handle: JoinHandle<Duration> = tokio::spawn(async move {
            let cancel: CancellationToken = CancellationToken::new();
            let start: Instant = Instant::now();

            for _ in 0..iters {
              black_box(lock.acquire(key, &cancel).await.unwrap());
            }

            start.elapsed()
          });

          handles.push(handle);
        }

        let mut total: Duration = Duration::ZERO;

        for handle in handles {
          total += handle.await.unwrap();
        }

        total
      })
    });
  }

  group.finish();
}

criterion_group! {
  name = benches;
  config = Criterion::default();
  targets = bench_keyed_lock
}

criterion_main!(benches);

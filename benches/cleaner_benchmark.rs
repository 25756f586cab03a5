use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use clinic_etl::cleaners::{clean_date_column, clean_id_column, normalize_status_column};
use clinic_etl::prelude::*;
use std::sync::OnceLock;
use std::hint::black_box;

// Synthetic raw appointments, built once and shared by every benchmark
static RAW_APPOINTMENTS: OnceLock<Table> = OnceLock::new();

const DATES: &[&str] = &["2023-11-01", "2023/11/02", "11/03/2023", "05-11-2023", " 2023-11-04 ", "soon"];
const STATUSES: &[&str] = &["Confirmed", "CANCELLED!!", "canceled", "pending", " confirm-ed "];

fn raw_appointments() -> &'static Table {
    RAW_APPOINTMENTS.get_or_init(|| {
        let rows = (0..100_000i64)
            .map(|i| {
                let patient = if i % 50 == 0 { Value::Null } else { Value::from(format!("{} ", i % 997)) };
                vec![
                    Value::Int(i % 90_000),
                    patient,
                    Value::Float((i % 40) as f64 + 0.5),
                    Value::from(DATES[i as usize % DATES.len()]),
                    Value::from(STATUSES[i as usize % STATUSES.len()]),
                ]
            })
            .collect();

        Table::from_rows(AppointmentSchema::column_names(), rows).expect("fixture rows match the schema")
    })
}

fn column(name: &str) -> Vec<Value> {
    raw_appointments().column_values(name).unwrap().cloned().collect()
}

fn benchmark_cleaners(c: &mut Criterion) {
    let ids = column("patient_id");
    let dates = column("booking_date");
    let statuses = column("status");

    let mut group = c.benchmark_group("cleaners");
    group.bench_function("clean_id_column", |b| b.iter(|| clean_id_column(black_box(&ids))));
    group.bench_function("clean_date_column", |b| b.iter(|| clean_date_column(black_box(&dates))));
    group.bench_function("normalize_status_column", |b| {
        b.iter(|| normalize_status_column(black_box(&statuses)))
    });
    group.finish();
}

fn benchmark_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("appointment_pipeline");
    group.sample_size(10);

    for rows in [1_000usize, 10_000, 100_000] {
        let all = raw_appointments();
        let subset = Table::from_rows(all.columns().to_vec(), all.rows()[..rows].to_vec()).unwrap();
        let events = |_: &PipelineEvent| {};

        group.bench_with_input(BenchmarkId::from_parameter(rows), &subset, |b, table| {
            b.iter(|| AppointmentPipeline::default().run(table.clone(), &events).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_cleaners, benchmark_pipeline);
criterion_main!(benches);

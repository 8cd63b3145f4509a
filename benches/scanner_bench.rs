use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sql_cleaner::cleaner::{CleanOptions, CleanSession, SMALL_BUFFER_SIZE};
use sql_cleaner::metadata::TableMetadata;
use sql_cleaner::scanner::unwrap::Unwrapper;
use sql_cleaner::scanner::Scanner;
use std::hint::black_box;
use std::io;
use std::sync::Arc;

fn generate_dump(num_tables: usize, rows_per_table: usize) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"/*!40101 SET NAMES utf8mb4 */;\n/*!40103 SET TIME_ZONE='+00:00' */;\n\n");

    for t in 0..num_tables {
        let stmt = format!(
            "DROP TABLE IF EXISTS `table_{t}`;\n\
             /*!40101 SET @saved_cs_client     = @@character_set_client */;\n\
             CREATE TABLE `table_{t}` (\n  `id` int NOT NULL AUTO_INCREMENT,\n  `name` varchar(255) DEFAULT NULL,\n  PRIMARY KEY (`id`)\n) ENGINE=InnoDB AUTO_INCREMENT={rows} DEFAULT CHARSET=utf8mb4;\n\
             /*!40000 ALTER TABLE `table_{t}` DISABLE KEYS */;\n",
            t = t,
            rows = rows_per_table
        );
        data.extend_from_slice(stmt.as_bytes());

        for r in 0..rows_per_table {
            let row = format!(
                "INSERT INTO `table_{}` VALUES ({}, 'Name {} /* not a comment */ ''quoted''');\n",
                t, r, r
            );
            data.extend_from_slice(row.as_bytes());
        }
        data.extend_from_slice(
            format!("/*!40000 ALTER TABLE `table_{}` ENABLE KEYS */;\n\n", t).as_bytes(),
        );
    }

    data.extend_from_slice(b"/*!50001 CREATE VIEW `v` AS\nselect 1 AS `one` */;\n");
    data
}

fn bench_scanner(c: &mut Criterion) {
    let mut group = c.benchmark_group("scanner_throughput");

    for rows in [100, 1000, 10000] {
        let data = String::from_utf8(generate_dump(10, rows)).unwrap();
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("scan_unwrap", format!("{}_rows", rows * 10)),
            &data,
            |b, data| {
                b.iter(|| {
                    let mut scanner = Scanner::new();
                    let mut unwrapper = Unwrapper::new(80000);
                    let mut out = String::with_capacity(data.len());
                    for chunk in data.as_bytes().chunks(SMALL_BUFFER_SIZE) {
                        let chunk = std::str::from_utf8(chunk).unwrap_or_default();
                        scanner.feed(chunk, |seg| unwrapper.accept(seg, &mut out));
                    }
                    scanner.finish(|seg| unwrapper.accept(seg, &mut out));
                    unwrapper.finish(&mut out);
                    black_box(out.len())
                })
            },
        );
    }

    group.finish();
}

fn bench_session(c: &mut Criterion) {
    let data = generate_dump(10, 5000);
    let metadata = Arc::new(TableMetadata::new());

    let mut group = c.benchmark_group("session");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for (name, options) in [
        ("default", CleanOptions::default()),
        (
            "all_modes",
            CleanOptions {
                no_drop: true,
                ddl_sanitize: true,
                ..Default::default()
            },
        ),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut session = CleanSession::new(&options, metadata.clone(), io::sink());
                for chunk in data.chunks(SMALL_BUFFER_SIZE) {
                    session.push(chunk).unwrap();
                }
                let (stats, _) = session.finish().unwrap();
                black_box(stats.bytes_written)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_scanner, bench_session);
criterion_main!(benches);

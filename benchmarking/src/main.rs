use clap::Parser;
use common::api::MvccSnapshot;
use common::tuple::{Column, Schema, Tuple, Type, Value};
use compressed_stream::BackendKind;
use query_engine::catalog::{Catalog, TableInfo};
use query_engine::executor::{Executor, TableScanExecutor};
use query_engine::{col, ExecContext, Expression};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use storage_engine::{StorageKind, StorageOptions, TableWriter};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Load and scan row and columnar append-only tables", long_about = None)]
struct Args {
    /// Rows loaded into each table
    #[arg(short, long, default_value_t = 200_000, value_parser = clap::value_parser!(i32).range(0..))]
    rows: i32,

    /// Integer columns per table
    #[arg(short, long, default_value_t = 8)]
    columns: usize,

    /// Block codec: none, zlib, zstd or lz4
    #[arg(long, default_value_t = BackendKind::Zstd)]
    compression: BackendKind,

    /// Compression level, 0 for the codec default
    #[arg(long, default_value_t = 0)]
    level: u32,

    /// Maximum uncompressed block size in bytes
    #[arg(long, default_value_t = common::api::DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// Directory for relation files; a temporary directory when omitted
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Columns read by the projected scan
    #[arg(short, long, default_value_t = 1)]
    project: usize,
}

struct BenchmarkResult {
    load: Duration,
    full_scan: Duration,
    projected_scan: Duration,
    files: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if args.columns == 0 || args.project == 0 || args.project > args.columns {
        error!(columns = args.columns, project = args.project, "--project must be between 1 and --columns");
        return;
    }

    // The temporary directory is removed when `_temp_dir` drops.
    let (data_dir, _temp_dir) = match args.data_dir.clone() {
        Some(dir) => (dir, None),
        None => match tempfile::tempdir() {
            Ok(dir) => (dir.path().to_path_buf(), Some(dir)),
            Err(e) => {
                error!(error = %e, "failed to create data directory");
                return;
            }
        },
    };
    info!(
        rows = args.rows,
        columns = args.columns,
        compression = %args.compression,
        level = args.level,
        block_size = args.block_size,
        data_dir = %data_dir.display(),
        "setting up benchmark"
    );

    let catalog = match Catalog::open(&data_dir) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!(error = %e, "failed to open catalog");
            return;
        }
    };
    let options = StorageOptions::default()
        .with_block_size(args.block_size)
        .with_compression(args.compression, args.level);

    let mut results = Vec::new();
    for storage in [StorageKind::Row, StorageKind::Column] {
        match run_benchmark(&catalog, storage, options, &args) {
            Ok(result) => results.push((storage, result)),
            Err(e) => {
                error!(%storage, error = %e, "benchmark failed");
                return;
            }
        }
    }

    println!("\n--- Benchmark Results ---");
    println!("| Storage | Files | Load            | Full Scan       | Projected Scan  |");
    println!("|---------|-------|-----------------|-----------------|-----------------|");
    for (storage, result) in &results {
        println!(
            "| {:<7} | {:<5} | {:<15?} | {:<15?} | {:<15?} |",
            storage.name(),
            result.files,
            result.load,
            result.full_scan,
            result.projected_scan
        );
    }
}

fn run_benchmark(
    catalog: &Catalog,
    storage: StorageKind,
    options: StorageOptions,
    args: &Args,
) -> query_engine::Result<BenchmarkResult> {
    let schema = Schema::new(
        (0..args.columns)
            .map(|i| Column::new(format!("c{}", i), Type::Integer))
            .collect(),
    );
    let name = format!("bench_{}", storage.name());
    let table = catalog.create_table(&name, schema, storage, options)?;

    let start = Instant::now();
    load_table(&table, args.rows, args.columns)?;
    let load = start.elapsed();

    let ctx = ExecContext::new(MvccSnapshot::up_to(2));
    let full_scan = time_scan(TableScanExecutor::select_all(table.relation.clone(), vec![])?, &ctx, args.rows)?;
    let projection: Vec<Expression> = (0..args.project).map(|i| col(&format!("c{}", i))).collect();
    let projected_scan = time_scan(
        TableScanExecutor::new(table.relation.clone(), projection, vec![])?,
        &ctx,
        args.rows,
    )?;

    let files = table.relation.file_count();
    catalog.drop_table(&name)?;
    Ok(BenchmarkResult {
        load,
        full_scan,
        projected_scan,
        files,
    })
}

fn load_table(table: &Arc<TableInfo>, rows: i32, columns: usize) -> query_engine::Result<()> {
    let mut writer = TableWriter::new(&table.relation, 1)?;
    for row in 0..rows {
        // Low-cardinality columns so the codecs have something to work with.
        let values = (0..columns)
            .map(|c| Value::Integer(row / (c as i32 + 1) % 1000))
            .collect();
        writer.insert(&Tuple::new(values))?;
    }
    writer.finish()?;
    Ok(())
}

fn time_scan(mut scan: TableScanExecutor, ctx: &ExecContext, expected: i32) -> query_engine::Result<Duration> {
    let start = Instant::now();
    scan.init(ctx)?;
    let mut count = 0i32;
    while scan.next(ctx)?.is_some() {
        count += 1;
    }
    scan.close()?;
    let elapsed = start.elapsed();
    if count != expected {
        error!(count, expected, "scan returned an unexpected row count");
    }
    Ok(elapsed)
}

//! Flatwire - Serialization Engine Demo & Benchmark
//!
//! Mengukur:
//! - Builder: Build record Monster lengkap (reuse scratch buffer)
//! - Reader: Akses field zero-copy dari buffer final
//! - Codec: Encode/decode generic lewat descriptor
//! - Mmap: Tulis buffer ke file lalu baca via mmap

use std::time::Instant;

use flatwire::protocol::wire::TableMarker;
use flatwire::protocol::{Offset, TableView};
use flatwire::schema::sample::{self, monster, weapon};
use flatwire::schema::{decode_root, encode_root};
use flatwire::{BufferView, Builder, BuilderConfig, MappedBuffer, ReaderOptions, Result};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_target(false)
        .init();

    println!("Flatwire Serialization Engine - v0.1");
    println!("====================================\n");

    let result = benchmark_builder()
        .and_then(|_| benchmark_reader())
        .and_then(|_| benchmark_codec())
        .and_then(|_| benchmark_mapped_file());

    match result {
        Ok(()) => println!("\nAll benchmarks complete!"),
        Err(err) => {
            eprintln!("\nBenchmark failed: {err}");
            std::process::exit(1);
        }
    }
}

/// Build Orc memakai builder API langsung
fn build_orc(builder: &mut Builder) -> Result<Offset<TableMarker>> {
    let axe_name = builder.create_string("Axe")?;
    builder.start_record()?;
    builder.add_field_offset(weapon::NAME, axe_name)?;
    builder.add_field(weapon::DAMAGE, 50i16, 0)?;
    let axe = builder.end_record()?;

    let weapons = builder.create_vector_of_offsets(&[axe])?;
    let inventory = builder.create_vector(&[1u8, 2, 3])?;
    builder.start_vector(0, 12, 4)?;
    let path = builder.end_vector()?;
    let name = builder.create_string("Orc")?;

    let mut pos = [0u8; 12];
    pos[0..4].copy_from_slice(&1.0f32.to_le_bytes());
    pos[4..8].copy_from_slice(&2.0f32.to_le_bytes());
    pos[8..12].copy_from_slice(&3.0f32.to_le_bytes());

    builder.start_record()?;
    builder.add_field_struct(monster::POS, &pos, 4)?;
    builder.add_field_offset(monster::NAME, name)?;
    builder.add_field_offset(monster::INVENTORY, inventory)?;
    builder.add_field_offset(monster::WEAPONS, weapons)?;
    builder.add_field_offset(monster::PATH, path)?;
    builder.add_field(monster::HP, 300i16, monster::DEFAULT_HP)?;
    builder.add_field(monster::MANA, 150i16, monster::DEFAULT_MANA)?;
    builder.add_field(monster::COLOR, 0i8, 2)?;
    builder.end_record()
}

fn read_orc(orc: &TableView<'_>) -> Result<usize> {
    let name = orc.get_str(monster::NAME)?.map_or(0, |s| s.len());
    let hp = orc.get::<i16>(monster::HP, monster::DEFAULT_HP)? as usize;
    let inventory = orc
        .get_vector::<u8>(monster::INVENTORY)?
        .map_or(0, |v| v.len());
    let damage = match orc.get_vector::<TableView>(monster::WEAPONS)? {
        Some(weapons) if !weapons.is_empty() => {
            weapons.get(0)?.get::<i16>(weapon::DAMAGE, 0)? as usize
        }
        _ => 0,
    };
    Ok(name + hp + inventory + damage)
}

fn print_latency(label: &str, total_ns: f64, ops: usize) {
    let per_op = total_ns / ops as f64;
    println!(
        "  {label}: {:.2} ns/op ({:.3} μs/op)",
        per_op,
        per_op / 1000.0
    );
}

fn benchmark_builder() -> Result<()> {
    println!("📊 Builder Benchmark (Back-to-Front)");
    println!("------------------------------------");

    const ITERATIONS: usize = 200_000;
    let mut builder = Builder::with_config(BuilderConfig::default().with_initial_capacity(256));

    // Warm up: scratch buffer mencapai kapasitas final
    for _ in 0..1000 {
        builder.reset();
        let root = build_orc(&mut builder)?;
        builder.finish(root)?;
    }

    let start = Instant::now();
    let mut bytes = 0usize;
    for _ in 0..ITERATIONS {
        builder.reset();
        let root = build_orc(&mut builder)?;
        bytes += builder.finish(root)?.len();
    }
    let duration = start.elapsed();

    println!("  Buffer size: {} bytes", bytes / ITERATIONS);
    println!("  Operations: {}", ITERATIONS);
    print_latency("Build latency", duration.as_nanos() as f64, ITERATIONS);
    println!(
        "  Throughput:   {:.2} M records/sec\n",
        ITERATIONS as f64 / duration.as_secs_f64() / 1_000_000.0
    );
    Ok(())
}

fn benchmark_reader() -> Result<()> {
    println!("📊 Reader Benchmark (Zero-Copy)");
    println!("-------------------------------");

    const ITERATIONS: usize = 1_000_000;
    let mut builder = Builder::new();
    let root = build_orc(&mut builder)?;
    let buf = builder.finish(root)?.to_vec();

    let start = Instant::now();
    let mut checksum = 0usize;
    for _ in 0..ITERATIONS {
        let orc = BufferView::open(&buf)?.root()?;
        checksum = checksum.wrapping_add(read_orc(&orc)?);
    }
    let lazy = start.elapsed();

    let schema = sample::game_schema();
    let start = Instant::now();
    for _ in 0..ITERATIONS / 10 {
        let view = BufferView::open_strict(&buf, &schema)?;
        checksum = checksum.wrapping_add(view.len());
    }
    let strict = start.elapsed();

    println!("  Operations: {} (checksum {})", ITERATIONS, checksum);
    print_latency("Lazy open + 4 fields", lazy.as_nanos() as f64, ITERATIONS);
    print_latency("Strict verify", strict.as_nanos() as f64, ITERATIONS / 10);
    println!();
    Ok(())
}

fn benchmark_codec() -> Result<()> {
    println!("📊 Codec Benchmark (Descriptor-Driven)");
    println!("--------------------------------------");

    const ITERATIONS: usize = 100_000;
    let schema = sample::game_schema();
    let orc = sample::orc();
    let config = BuilderConfig::default();

    let start = Instant::now();
    let mut buf = Vec::new();
    for _ in 0..ITERATIONS {
        buf = encode_root(&schema, &orc, &config)?;
    }
    let encode = start.elapsed();

    let start = Instant::now();
    let options = ReaderOptions::default();
    for _ in 0..ITERATIONS {
        let decoded = decode_root(&schema, &buf, &options)?;
        debug_assert_eq!(decoded.get_str("name"), Some("Orc"));
    }
    let decode = start.elapsed();

    println!("  Buffer size: {} bytes", buf.len());
    print_latency("Encode latency", encode.as_nanos() as f64, ITERATIONS);
    print_latency("Decode latency", decode.as_nanos() as f64, ITERATIONS);
    println!();
    Ok(())
}

fn benchmark_mapped_file() -> Result<()> {
    println!("📊 Mapped File Benchmark (Mmap)");
    println!("-------------------------------");

    const ITERATIONS: usize = 1_000_000;
    let schema = sample::game_schema();
    let buf = encode_root(&schema, &sample::orc(), &BuilderConfig::default())?;

    let path = std::env::temp_dir().join("flatwire_bench.bin");
    let mapped = match MappedBuffer::create(&path, &buf) {
        Ok(mapped) => mapped,
        Err(err) => {
            println!("  Skipped: {err}\n");
            return Ok(());
        }
    };

    let start = Instant::now();
    let mut checksum = 0usize;
    for _ in 0..ITERATIONS {
        let orc = mapped.view()?.root()?;
        checksum = checksum.wrapping_add(read_orc(&orc)?);
    }
    let duration = start.elapsed();

    println!("  File size: {} bytes", mapped.len());
    println!("  Operations: {} (checksum {})", ITERATIONS, checksum);
    print_latency("Mapped read latency", duration.as_nanos() as f64, ITERATIONS);

    drop(mapped);
    std::fs::remove_file(&path).ok();
    Ok(())
}

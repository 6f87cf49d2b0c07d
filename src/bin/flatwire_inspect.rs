//! Flatwire Inspector - Dump struktur buffer file
//!
//! Map file secara read-only, tampilkan root header dan field table, lalu
//! decode isi record memakai sample game schema.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin flatwire_inspect -- --write-demo orc.bin
//! cargo run --release --bin flatwire_inspect -- --strict orc.bin
//! ```
//!
//! # Options
//!
//! - `--strict` - Verifikasi seluruh graph sebelum decode
//! - `--size-prefixed` - Buffer diawali u32 size prefix
//! - `--write-demo` - Tulis Monster "Orc" ke PATH sebelum inspect
//! - `--verbose` - Tampilkan log debug

use std::io;

use flatwire::protocol::wire::{FILE_IDENTIFIER_LENGTH, SIZE_PREFIX};
use flatwire::protocol::Builder;
use flatwire::schema::{sample, to_owned, FieldType, Record, Schema, Value};
use flatwire::{BufferView, MappedBuffer, ReaderOptions, TableView};

#[derive(Default)]
struct InspectConfig {
    path: Option<String>,
    strict: bool,
    size_prefixed: bool,
    write_demo: bool,
    verbose: bool,
}

fn invalid(err: flatwire::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

fn write_demo(path: &str, schema: &Schema, size_prefixed: bool) -> io::Result<()> {
    let root_type = schema.root_record().map_err(invalid)?.name.clone();
    let mut builder = Builder::new();
    let root = flatwire::schema::encode(&mut builder, schema, &root_type, &sample::orc())
        .map_err(invalid)?;
    let identifier = schema.file_identifier();
    let bytes = if size_prefixed {
        builder.finish_size_prefixed(root, identifier.as_ref())
    } else {
        match identifier {
            Some(id) => builder.finish_with_identifier(root, &id),
            None => builder.finish(root),
        }
    }
    .map_err(invalid)?;

    MappedBuffer::create(path, bytes)?;
    println!("Wrote demo Monster to {} ({} bytes)\n", path, bytes.len());
    Ok(())
}

fn print_header(view: &BufferView<'_>, root: &TableView<'_>, size_prefixed: bool) {
    let bytes = view.as_bytes();
    let header = if size_prefixed { SIZE_PREFIX } else { 0 };

    println!("Buffer:");
    println!("  Size:        {} bytes", bytes.len());
    if size_prefixed {
        println!("  Size prefix: {}", bytes.len() - SIZE_PREFIX);
    }
    println!("  Root record: byte {}", root.position());

    let id_start = header + 4;
    if let Some(id) = bytes.get(id_start..id_start + FILE_IDENTIFIER_LENGTH) {
        if id.iter().all(|b| b.is_ascii_alphanumeric()) {
            println!("  Identifier:  {:?}", String::from_utf8_lossy(id));
        }
    }
    println!();
}

fn print_slots(root: &TableView<'_>, schema: &Schema) -> io::Result<()> {
    let desc = schema.root_record().map_err(invalid)?;

    println!("Field table ({} slots, inline size {}):", root.slot_count(), root.inline_size());
    for slot in 0..root.slot_count() as u16 {
        let name = desc
            .field_by_slot(slot)
            .map_or("<unknown>", |f| f.name.as_str());
        match root.slot_offset(slot) {
            Some(offset) => println!("  [{slot:2}] {name:<10} +{offset}"),
            None => println!("  [{slot:2}] {name:<10} absent"),
        }
    }
    println!();
    Ok(())
}

fn print_value(schema: &Schema, ty: Option<&FieldType>, value: &Value, indent: usize) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Scalar(v) => match ty {
            Some(FieldType::Enum(name)) => {
                let variant = schema
                    .enumeration(name)
                    .ok()
                    .and_then(|e| v.as_i64().and_then(|raw| e.name_of(raw)));
                match variant {
                    Some(variant) => println!("{variant} ({v})"),
                    None => println!("{v}"),
                }
            }
            _ => println!("{v}"),
        },
        Value::String(s) => println!("{s:?}"),
        Value::Bytes(b) => println!("<{} non-UTF-8 bytes>", b.len()),
        Value::Struct(r) => {
            let members: Vec<String> = r
                .iter()
                .map(|(k, v)| match v {
                    Value::Scalar(s) => format!("{k}: {s}"),
                    other => format!("{k}: {other:?}"),
                })
                .collect();
            println!("{{ {} }}", members.join(", "));
        }
        Value::Record(r) => {
            println!();
            print_record(schema, None, r, indent + 1);
        }
        Value::Vector(items) => {
            println!("[{} items]", items.len());
            for (i, item) in items.iter().enumerate() {
                print!("{pad}  - [{i}] ");
                print_value(schema, None, item, indent + 2);
            }
        }
    }
}

fn print_record(schema: &Schema, record_type: Option<&str>, record: &Record, indent: usize) {
    let pad = "  ".repeat(indent);
    let desc = record_type.and_then(|name| schema.record(name).ok());
    for (name, value) in record.iter() {
        let ty = desc.and_then(|d| d.field(name)).map(|f| &f.ty);
        print!("{pad}{name}: ");
        print_value(schema, ty, value, indent);
    }
}

fn run_inspect(config: InspectConfig) -> io::Result<()> {
    let path = config.path.clone().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "missing buffer file path")
    })?;
    let schema = sample::game_schema();

    if config.write_demo {
        write_demo(&path, &schema, config.size_prefixed)?;
    }

    let mapped = MappedBuffer::open(&path)?;
    let options = ReaderOptions::default().with_strict(config.strict);
    let view = if config.size_prefixed {
        BufferView::open_size_prefixed_with(mapped.as_bytes(), &options, &schema)
    } else {
        BufferView::open_with(mapped.as_bytes(), &options, &schema)
    }
    .map_err(invalid)?;

    let root = view.root().map_err(invalid)?;
    print_header(&view, &root, config.size_prefixed);
    print_slots(&root, &schema)?;

    let root_type = schema.root_record().map_err(invalid)?.name.clone();
    let record = to_owned(&schema, &root_type, root).map_err(invalid)?;
    println!("{root_type}:");
    print_record(&schema, Some(&root_type), &record, 1);

    if config.strict {
        println!("\nVerified: all offsets in bounds");
    }
    Ok(())
}

fn parse_args() -> InspectConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = InspectConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--strict" | "-s" => {
                config.strict = true;
            }
            "--size-prefixed" | "-p" => {
                config.size_prefixed = true;
            }
            "--write-demo" | "-w" => {
                config.write_demo = true;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--help" | "-h" => {
                println!("Flatwire Inspector - Dump buffer structure\n");
                println!("Usage: flatwire_inspect [OPTIONS] <PATH>\n");
                println!("Options:");
                println!("  -s, --strict          Verify the whole buffer before decoding");
                println!("  -p, --size-prefixed   Buffer starts with a u32 size prefix");
                println!("  -w, --write-demo      Write the sample Monster to PATH first");
                println!("  -v, --verbose         Debug logging");
                println!("  -h, --help            Show this help");
                std::process::exit(0);
            }
            other => {
                config.path = Some(other.to_string());
            }
        }
        i += 1;
    }

    config
}

fn main() {
    let config = parse_args();

    let level = if config.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    if let Err(e) = run_inspect(config) {
        eprintln!("Inspect error: {}", e);
        std::process::exit(1);
    }
}

//! Round-Trip Test - Build, Read, Decode
//!
//! Skenario end-to-end: builder -> buffer -> view/owned record, termasuk
//! kompatibilitas schema lama/baru dan mapped file.
//!
//! Usage:
//!   cargo test --test roundtrip_test

use flatwire::protocol::wire::ScalarType;
use flatwire::schema::sample::{self, game_schema, monster, vec3, weapon};
use flatwire::schema::{
    decode_root, encode, encode_root, to_owned, ElementType, FieldDescriptor, RecordDescriptor,
};
use flatwire::{
    BufferView, Builder, BuilderConfig, MappedBuffer, ReaderOptions, Record, ScalarValue, Schema,
    TableView, Value,
};
use proptest::prelude::*;

fn default_config() -> BuilderConfig {
    BuilderConfig::default()
}

/// Schema dengan semua jenis scalar, string, dan vector of strings
fn kitchen_sink_schema() -> Schema {
    Schema::new()
        .with_record(RecordDescriptor::new(
            "Sink",
            vec![
                FieldDescriptor::scalar("flag", 0, ScalarType::Bool),
                FieldDescriptor::scalar("small", 1, ScalarType::I8),
                FieldDescriptor::scalar("count", 2, ScalarType::U32),
                FieldDescriptor::scalar("big", 3, ScalarType::U64),
                FieldDescriptor::scalar("ratio", 4, ScalarType::F64),
                FieldDescriptor::string("label", 5),
                FieldDescriptor::vector("tags", 6, ElementType::String),
                FieldDescriptor::vector("scores", 7, ElementType::Scalar(ScalarType::I32)),
                FieldDescriptor::scalar("delta", 8, ScalarType::I64),
                FieldDescriptor::scalar("tiny", 9, ScalarType::U16),
            ],
        ))
        .with_root("Sink")
}

#[test]
fn test_orc_scenario() {
    let schema = game_schema();
    let buf = encode_root(&schema, &sample::orc(), &default_config()).unwrap();

    let view = BufferView::open_strict(&buf, &schema).unwrap();
    assert!(view.has_identifier(b"MONS"));

    let orc = view.root().unwrap();
    assert_eq!(orc.get_str(monster::NAME).unwrap().unwrap(), "Orc");
    assert_eq!(orc.get::<i16>(monster::HP, monster::DEFAULT_HP).unwrap(), 300);

    let inventory = orc.get_vector::<u8>(monster::INVENTORY).unwrap().unwrap();
    assert_eq!(inventory.len(), 3);

    let weapons = orc.get_vector::<TableView>(monster::WEAPONS).unwrap().unwrap();
    let axe = weapons.get(0).unwrap();
    assert_eq!(axe.get_str(sample::weapon::NAME).unwrap().unwrap(), "Axe");
    assert_eq!(axe.get::<i16>(sample::weapon::DAMAGE, 0).unwrap(), 50);

    let vec3_size = 12;
    let path = orc
        .get_struct_vector(monster::PATH, vec3_size)
        .unwrap()
        .unwrap();
    assert_eq!(path.len(), 0);

    let pos = orc.get_struct(monster::POS, vec3_size).unwrap().unwrap();
    assert_eq!(pos.get::<f32>(4).unwrap(), 2.0);
}

#[test]
fn test_kitchen_sink_roundtrip() {
    let schema = kitchen_sink_schema();
    let record = Record::new()
        .with("flag", true)
        .with("small", -7i8)
        .with("count", 4_000_000_000u32)
        .with("big", u64::MAX)
        .with("ratio", 0.25f64)
        .with("label", "sink")
        .with("tags", vec![Value::from("a"), Value::from(""), Value::from("ccc")])
        .with("scores", vec![Value::from(-1i32), Value::from(i32::MAX)])
        .with("delta", i64::MIN)
        .with("tiny", 65535u16);

    let buf = encode_root(&schema, &record, &default_config()).unwrap();
    let decoded = decode_root(&schema, &buf, &ReaderOptions::strict()).unwrap();
    assert_eq!(decoded, record);
}

#[test]
fn test_scalar_only_record_defaults() {
    let schema = kitchen_sink_schema();
    let buf = encode_root(&schema, &Record::new(), &default_config()).unwrap();
    let decoded = decode_root(&schema, &buf, &ReaderOptions::strict()).unwrap();

    // Semua scalar muncul dengan default, offset fields absent
    assert_eq!(decoded.get_scalar("flag"), Some(ScalarValue::Bool(false)));
    assert_eq!(decoded.get_scalar("ratio"), Some(ScalarValue::F64(0.0)));
    assert!(!decoded.contains("label"));
    assert!(!decoded.contains("tags"));

    let root = BufferView::open(&buf).unwrap().root().unwrap();
    assert_eq!(root.slot_count(), 0);
}

#[test]
fn test_encoding_is_idempotent() {
    let schema = game_schema();
    let first = encode_root(&schema, &sample::orc(), &default_config()).unwrap();
    let decoded = decode_root(&schema, &first, &ReaderOptions::default()).unwrap();
    let second = encode_root(&schema, &decoded, &default_config()).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_empty_vector_vs_absent() {
    let schema = game_schema();
    let with_empty = Record::new()
        .with("name", "Ghost")
        .with("inventory", Vec::<Value>::new());
    let without = Record::new().with("name", "Ghost");

    let buf = encode_root(&schema, &with_empty, &default_config()).unwrap();
    let root = BufferView::open(&buf).unwrap().root().unwrap();
    assert!(root.has_field(monster::INVENTORY));
    assert!(root.get_vector::<u8>(monster::INVENTORY).unwrap().unwrap().is_empty());

    let buf = encode_root(&schema, &without, &default_config()).unwrap();
    let root = BufferView::open(&buf).unwrap().root().unwrap();
    assert!(!root.has_field(monster::INVENTORY));
    assert!(root.get_vector::<u8>(monster::INVENTORY).unwrap().is_none());

    let decoded = decode_root(&schema, &buf, &ReaderOptions::strict()).unwrap();
    assert!(!decoded.contains("inventory"));
}

fn schema_v1() -> Schema {
    Schema::new()
        .with_record(RecordDescriptor::new(
            "Player",
            vec![
                FieldDescriptor::string("name", 0),
                FieldDescriptor::scalar("level", 1, ScalarType::U16),
            ],
        ))
        .with_root("Player")
}

fn schema_v2() -> Schema {
    Schema::new()
        .with_record(RecordDescriptor::new(
            "Player",
            vec![
                FieldDescriptor::string("name", 0),
                FieldDescriptor::scalar("level", 1, ScalarType::U16),
                FieldDescriptor::scalar("gold", 2, ScalarType::U32)
                    .with_default(ScalarValue::U32(500)),
                FieldDescriptor::vector("titles", 3, ElementType::String),
            ],
        ))
        .with_root("Player")
}

#[test]
fn test_old_buffer_read_with_new_schema() {
    let old = Record::new().with("name", "Ada").with("level", 7u16);
    let buf = encode_root(&schema_v1(), &old, &default_config()).unwrap();

    let decoded = decode_root(&schema_v2(), &buf, &ReaderOptions::strict()).unwrap();
    assert_eq!(decoded.get_str("name"), Some("Ada"));
    assert_eq!(decoded.get_scalar("gold"), Some(ScalarValue::U32(500)));
    assert!(!decoded.contains("titles"));
}

#[test]
fn test_new_buffer_read_with_old_schema() {
    let new = Record::new()
        .with("name", "Ada")
        .with("level", 7u16)
        .with("gold", 12u32)
        .with("titles", vec![Value::from("Countess")]);
    let buf = encode_root(&schema_v2(), &new, &default_config()).unwrap();

    let decoded = decode_root(&schema_v1(), &buf, &ReaderOptions::strict()).unwrap();
    assert_eq!(
        decoded,
        Record::new().with("name", "Ada").with("level", 7u16)
    );
}

#[test]
fn test_response_of_monsters() {
    let schema = game_schema();
    let mut builder = Builder::new();

    let monsters: Vec<Value> = (0..5i16)
        .map(|i| {
            Record::new()
                .with("name", format!("Goblin {i}"))
                .with("hp", 10 * i)
                .with("weapons", vec![weapon("Club", i)])
                .with("path", vec![vec3(i as f32, 0.0, 0.0)])
                .into()
        })
        .collect();
    let response = Record::new().with("monsters", monsters);

    let root = encode(&mut builder, &schema, sample::RESPONSE, &response).unwrap();
    let buf = builder.finish(root).unwrap().to_vec();

    let table = BufferView::open(&buf).unwrap().root().unwrap();
    let decoded = to_owned(&schema, sample::RESPONSE, table).unwrap();

    let goblins = decoded.get_vector("monsters").unwrap();
    assert_eq!(goblins.len(), 5);
    let third = goblins[3].as_record().unwrap();
    assert_eq!(third.get_str("name"), Some("Goblin 3"));
    assert_eq!(third.get_scalar("hp"), Some(ScalarValue::I16(30)));
    // hp = 0 adalah nilai eksplisit yang berbeda dari default 100
    let first = goblins[0].as_record().unwrap();
    assert_eq!(first.get_scalar("hp"), Some(ScalarValue::I16(0)));
}

#[test]
fn test_vtables_shared_across_records() {
    let schema = game_schema();
    let weapons: Vec<Value> = (1..=50i16).map(|i| weapon("Spear", i)).collect();
    let record = Record::new().with("weapons", weapons);

    let deduped = encode_root(&schema, &record, &default_config()).unwrap();
    let plain = encode_root(
        &schema,
        &record,
        &default_config().with_dedup_vtables(false),
    )
    .unwrap();

    assert!(deduped.len() < plain.len());
    assert_eq!(
        decode_root(&schema, &deduped, &ReaderOptions::strict()).unwrap(),
        decode_root(&schema, &plain, &ReaderOptions::strict()).unwrap()
    );
}

#[test]
fn test_size_prefixed_stream() {
    let schema = game_schema();
    let mut stream = Vec::new();

    for name in ["Orc", "Troll"] {
        let mut builder = Builder::new();
        let record = Record::new().with("name", name);
        let root = encode(&mut builder, &schema, sample::MONSTER, &record).unwrap();
        stream.extend_from_slice(builder.finish_size_prefixed(root, None).unwrap());
    }

    let options = ReaderOptions::strict();
    let first = BufferView::open_size_prefixed_with(&stream, &options, &schema).unwrap();
    assert_eq!(
        first.root().unwrap().get_str(monster::NAME).unwrap().unwrap(),
        "Orc"
    );

    let second = BufferView::open_size_prefixed_with(&stream[first.len()..], &options, &schema)
        .unwrap();
    assert_eq!(
        second.root().unwrap().get_str(monster::NAME).unwrap().unwrap(),
        "Troll"
    );
}

#[test]
fn test_file_identifier_check() {
    let schema = game_schema();
    let buf = encode_root(&schema, &sample::orc(), &default_config()).unwrap();

    let monsters = ReaderOptions::default().with_file_identifier(*b"MONS");
    assert!(BufferView::open_with(&buf, &monsters, &schema).is_ok());

    let weapons = ReaderOptions::default().with_file_identifier(*b"WEAP");
    assert!(BufferView::open_with(&buf, &weapons, &schema).is_err());
}

#[test]
fn test_mapped_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orc.bin");
    let schema = game_schema();
    let buf = encode_root(&schema, &sample::orc(), &default_config()).unwrap();

    MappedBuffer::create(&path, &buf).unwrap();
    let mapped = MappedBuffer::open(&path).unwrap();

    let view = mapped.view_with(&ReaderOptions::strict(), &schema).unwrap();
    let decoded = to_owned(&schema, sample::MONSTER, view.root().unwrap()).unwrap();
    assert_eq!(decoded.get_str("name"), Some("Orc"));
    assert_eq!(
        decoded,
        decode_root(&schema, &buf, &ReaderOptions::default()).unwrap()
    );
}

#[test]
fn test_builder_reuse_after_reset() {
    let schema = game_schema();
    let mut builder = Builder::new();

    let root = encode(&mut builder, &schema, sample::MONSTER, &sample::orc()).unwrap();
    let first = builder.finish(root).unwrap().to_vec();

    builder.reset();
    let root = encode(&mut builder, &schema, sample::MONSTER, &sample::orc()).unwrap();
    let second = builder.finish(root).unwrap().to_vec();

    assert_eq!(first, second);
}

fn arb_weapon() -> impl Strategy<Value = Value> {
    ("[a-zA-Z ]{0,12}", any::<i16>()).prop_map(|(name, damage)| weapon(&name, damage))
}

fn arb_monster() -> impl Strategy<Value = Record> {
    (
        proptest::option::of("\\PC{0,24}"),
        any::<i16>(),
        any::<i16>(),
        0i8..3,
        proptest::option::of(proptest::collection::vec(any::<u8>(), 0..32)),
        proptest::option::of(proptest::collection::vec(arb_weapon(), 0..6)),
        proptest::option::of((-1000.0f32..1000.0, -1000.0f32..1000.0, -1000.0f32..1000.0)),
    )
        .prop_map(|(name, hp, mana, color, inventory, weapons, pos)| {
            let mut record = Record::new()
                .with("hp", hp)
                .with("mana", mana)
                .with("color", ScalarValue::I8(color));
            if let Some(name) = name {
                record.set("name", name);
            }
            if let Some(inventory) = inventory {
                let items: Vec<Value> = inventory.into_iter().map(Value::from).collect();
                record.set("inventory", items);
            }
            if let Some(weapons) = weapons {
                record.set("weapons", weapons);
            }
            if let Some((x, y, z)) = pos {
                record.set("pos", vec3(x, y, z));
            }
            record
        })
}

proptest! {
    #[test]
    fn prop_monster_roundtrip(record in arb_monster()) {
        let schema = game_schema();
        let buf = encode_root(&schema, &record, &default_config()).unwrap();
        let decoded = decode_root(&schema, &buf, &ReaderOptions::strict()).unwrap();
        prop_assert_eq!(decoded, record);
    }

    #[test]
    fn prop_force_defaults_reads_the_same(record in arb_monster()) {
        let schema = game_schema();
        let compact = encode_root(&schema, &record, &default_config()).unwrap();
        let forced = encode_root(
            &schema,
            &record,
            &default_config().with_force_defaults(true),
        )
        .unwrap();

        prop_assert!(forced.len() >= compact.len());
        prop_assert_eq!(
            decode_root(&schema, &compact, &ReaderOptions::strict()).unwrap(),
            decode_root(&schema, &forced, &ReaderOptions::strict()).unwrap()
        );
    }
}

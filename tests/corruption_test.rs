//! Corruption Test - Untrusted Input Safety
//!
//! Buffer terpotong atau rusak harus gagal dengan TruncatedBuffer /
//! CorruptBuffer / IndexOutOfRange, tidak pernah panic atau membaca di
//! luar batas.
//!
//! Usage:
//!   cargo test --release --test corruption_test

use flatwire::schema::sample::{self, game_schema, monster, weapon};
use flatwire::protocol::wire::{ScalarType, TableMarker};
use flatwire::protocol::Offset;
use flatwire::schema::{
    decode_root, encode_root, to_owned, to_owned_with, FieldDescriptor, RecordDescriptor,
};
use flatwire::{
    BufferView, Builder, BuilderConfig, Error, ReaderOptions, Result, Schema, VerifierOptions,
};
use proptest::prelude::*;

fn orc_buffer() -> Vec<u8> {
    encode_root(&game_schema(), &sample::orc(), &BuilderConfig::default()).unwrap()
}

/// Baca semua field lewat jalur lazy (tanpa verifikasi)
fn lazy_decode(schema: &Schema, buf: &[u8]) -> Result<()> {
    let view = BufferView::open(buf)?;
    to_owned(schema, sample::MONSTER, view.root()?)?;
    Ok(())
}

fn assert_untrusted(result: Result<()>) {
    if let Err(err) = result {
        assert!(err.is_untrusted_input(), "unexpected error kind: {err:?}");
    }
}

#[test]
fn test_truncation_at_every_length() {
    let schema = game_schema();
    let buf = orc_buffer();

    for k in 0..buf.len() {
        let truncated = &buf[..k];

        if k < 4 {
            assert_eq!(
                BufferView::open(truncated).unwrap_err(),
                Error::TruncatedBuffer {
                    needed: 4,
                    actual: k
                }
            );
        }

        let strict = BufferView::open_strict(truncated, &schema).map(|_| ());
        assert!(strict.is_err(), "strict open accepted buffer truncated at {k}");
        assert_untrusted(strict);

        // Jalur lazy boleh sukses sebagian, tapi error harus dari input
        assert_untrusted(lazy_decode(&schema, truncated));
    }

    assert!(BufferView::open_strict(&buf, &schema).is_ok());
}

#[test]
fn test_root_offset_past_end() {
    let schema = game_schema();
    let mut buf = orc_buffer();
    let len = buf.len() as u32;
    buf[0..4].copy_from_slice(&len.to_le_bytes());

    let view = BufferView::open(&buf).unwrap();
    assert!(matches!(view.root(), Err(Error::CorruptBuffer { .. })));
    assert!(matches!(
        BufferView::open_strict(&buf, &schema),
        Err(Error::CorruptBuffer { .. })
    ));
}

#[test]
fn test_zero_root_offset() {
    let mut buf = orc_buffer();
    buf[0..4].copy_from_slice(&0u32.to_le_bytes());

    let view = BufferView::open(&buf).unwrap();
    assert!(matches!(
        view.root(),
        Err(Error::CorruptBuffer { position: 0, .. })
    ));
}

#[test]
fn test_field_table_out_of_bounds() {
    let mut buf = orc_buffer();
    let root = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

    // soffset menunjuk jauh sebelum awal buffer
    buf[root..root + 4].copy_from_slice(&i32::MAX.to_le_bytes());
    let view = BufferView::open(&buf).unwrap();
    assert!(matches!(view.root(), Err(Error::CorruptBuffer { .. })));

    // soffset menunjuk ke belakang akhir buffer
    buf[root..root + 4].copy_from_slice(&i32::MIN.to_le_bytes());
    let view = BufferView::open(&buf).unwrap();
    assert!(matches!(view.root(), Err(Error::CorruptBuffer { .. })));
}

#[test]
fn test_vector_length_overflow() {
    let schema = game_schema();
    let mut builder = Builder::new();
    let inventory = builder.create_vector(&[9u8; 4]).unwrap();
    builder.start_record().unwrap();
    builder.add_field_offset(monster::INVENTORY, inventory).unwrap();
    let root = builder.end_record().unwrap();
    let mut buf = builder.finish(root).unwrap().to_vec();

    // Vector ditulis pertama: length prefix ada 8 byte sebelum akhir
    let len_pos = buf.len() - 8;
    buf[len_pos..len_pos + 4].copy_from_slice(&u32::MAX.to_le_bytes());

    let table = BufferView::open(&buf).unwrap().root().unwrap();
    assert!(matches!(
        table.get_vector::<u8>(monster::INVENTORY),
        Err(Error::CorruptBuffer { .. })
    ));
    assert!(BufferView::open_strict(&buf, &schema).is_err());
}

#[test]
fn test_missing_string_terminator() {
    let schema = game_schema();
    let mut builder = Builder::new();
    let name = builder.create_string("Orc").unwrap();
    builder.start_record().unwrap();
    builder.add_field_offset(monster::NAME, name).unwrap();
    let root = builder.end_record().unwrap();
    let mut buf = builder.finish(root).unwrap().to_vec();

    let last = buf.len() - 1;
    buf[last] = b'!';

    let table = BufferView::open(&buf).unwrap().root().unwrap();
    assert!(matches!(
        table.get_str(monster::NAME),
        Err(Error::CorruptBuffer {
            reason: "string missing zero terminator",
            ..
        })
    ));
    assert!(BufferView::open_strict(&buf, &schema).is_err());
}

#[test]
fn test_invalid_utf8_on_text_access() {
    let mut builder = Builder::new();
    let name = builder.create_byte_string(&[0xC3, 0x28]).unwrap();
    builder.start_record().unwrap();
    builder.add_field_offset(monster::NAME, name).unwrap();
    let root = builder.end_record().unwrap();
    let buf = builder.finish(root).unwrap().to_vec();

    let table = BufferView::open(&buf).unwrap().root().unwrap();
    let name = table.get_str(monster::NAME).unwrap().unwrap();
    assert_eq!(name.as_bytes(), &[0xC3, 0x28]);
    assert_eq!(name.to_str(), Err(Error::InvalidUtf8));
}

#[test]
fn test_size_prefix_larger_than_buffer() {
    let mut builder = Builder::new();
    builder.start_record().unwrap();
    let root = builder.end_record().unwrap();
    let mut buf = builder.finish_size_prefixed(root, None).unwrap().to_vec();

    let claimed = (buf.len() * 2) as u32;
    buf[0..4].copy_from_slice(&claimed.to_le_bytes());

    assert!(matches!(
        BufferView::open_size_prefixed(&buf),
        Err(Error::TruncatedBuffer { .. })
    ));
}

#[test]
fn test_decode_root_strict_rejects_corruption() {
    let schema = game_schema();
    let mut buf = orc_buffer();
    let len = buf.len();
    buf[len - 1] = 0xFF;

    let result = decode_root(&schema, &buf, &ReaderOptions::strict());
    assert!(result.is_err());
    assert!(result.unwrap_err().is_untrusted_input());
}

/// Node yang me-reference dirinya sendiri
fn node_schema() -> Schema {
    Schema::new()
        .with_record(RecordDescriptor::new(
            "Node",
            vec![
                FieldDescriptor::record("next", 0, "Node"),
                FieldDescriptor::scalar("value", 1, ScalarType::U32),
            ],
        ))
        .with_root("Node")
}

fn node_chain(depth: usize) -> Vec<u8> {
    let mut builder = Builder::new();
    let mut next: Option<Offset<TableMarker>> = None;
    for i in 0..depth {
        builder.start_record().unwrap();
        if let Some(child) = next {
            builder.add_field_offset(0, child).unwrap();
        }
        builder.add_field(1, i as u32 + 1, 0).unwrap();
        next = Some(builder.end_record().unwrap());
    }
    builder.finish(next.unwrap()).unwrap().to_vec()
}

#[test]
fn test_deep_chain_rejected_without_verification() {
    let schema = node_schema();
    let buf = node_chain(20_000);

    let result = decode_root(&schema, &buf, &ReaderOptions::default());
    assert!(matches!(
        result,
        Err(Error::CorruptBuffer {
            reason: "record nesting too deep",
            ..
        })
    ));

    let root = BufferView::open(&buf).unwrap().root().unwrap();
    assert!(to_owned(&schema, "Node", root).unwrap_err().is_untrusted_input());
}

#[test]
fn test_chain_within_depth_limit_decodes() {
    let schema = node_schema();
    let buf = node_chain(100);
    let root = BufferView::open(&buf).unwrap().root().unwrap();

    let limits = VerifierOptions::default().with_max_depth(128);
    let mut record = to_owned_with(&schema, "Node", root, &limits).unwrap();
    let mut depth = 1;
    while let Some(next) = record.get_record("next") {
        record = next.clone();
        depth += 1;
    }
    assert_eq!(depth, 100);
    assert_eq!(record.get_scalar("value").and_then(|v| v.as_i64()), Some(1));

    assert!(to_owned(&schema, "Node", root).is_err());
}

/// Response dengan `monsters` offset ke Monster yang sama, dan Monster itu
/// punya `weapons` offset ke Weapon yang sama
fn shared_children(monsters: usize, weapons: usize) -> Vec<u8> {
    let mut builder = Builder::new();
    let name = builder.create_string("Axe").unwrap();
    builder.start_record().unwrap();
    builder.add_field_offset(weapon::NAME, name).unwrap();
    builder.add_field(weapon::DAMAGE, 50i16, 0).unwrap();
    let axe = builder.end_record().unwrap();

    let arsenal = builder.create_vector_of_offsets(&vec![axe; weapons]).unwrap();
    builder.start_record().unwrap();
    builder.add_field_offset(monster::WEAPONS, arsenal).unwrap();
    let orc = builder.end_record().unwrap();

    let horde = builder.create_vector_of_offsets(&vec![orc; monsters]).unwrap();
    builder.start_record().unwrap();
    builder.add_field_offset(0, horde).unwrap();
    let root = builder.end_record().unwrap();
    builder.finish(root).unwrap().to_vec()
}

#[test]
fn test_shared_children_capped_by_object_budget() {
    let schema = game_schema();
    let buf = shared_children(200, 200);
    let root = BufferView::open(&buf).unwrap().root().unwrap();

    // 200 x 200 weapon jauh melebihi budget walaupun buffer kecil
    let limits = VerifierOptions::default().with_max_tables(10_000);
    assert!(matches!(
        to_owned_with(&schema, sample::RESPONSE, root, &limits),
        Err(Error::CorruptBuffer {
            reason: "too many objects to materialize",
            ..
        })
    ));

    // Buffer kecil yang sama di bawah budget tetap bisa di-decode
    let buf = shared_children(3, 4);
    let root = BufferView::open(&buf).unwrap().root().unwrap();
    let response = to_owned_with(&schema, sample::RESPONSE, root, &limits).unwrap();
    let monsters = response.get_vector("monsters").unwrap();
    assert_eq!(monsters.len(), 3);
    let weapons = monsters[0].as_record().unwrap().get_vector("weapons").unwrap();
    assert_eq!(weapons.len(), 4);
}

#[test]
fn test_decode_root_uses_reader_limits() {
    let schema = game_schema();
    let buf = orc_buffer();

    let tight =
        ReaderOptions::default().with_verifier(VerifierOptions::default().with_max_tables(2));
    assert!(matches!(
        decode_root(&schema, &buf, &tight),
        Err(Error::CorruptBuffer { .. })
    ));
    assert!(decode_root(&schema, &buf, &ReaderOptions::default()).is_ok());
}

proptest! {
    #[test]
    fn prop_random_byte_corruption_never_panics(
        index in any::<prop::sample::Index>(),
        value in any::<u8>(),
    ) {
        let schema = game_schema();
        let mut buf = orc_buffer();
        let at = index.index(buf.len());
        buf[at] = value;

        assert_untrusted(lazy_decode(&schema, &buf));
        assert_untrusted(BufferView::open_strict(&buf, &schema).map(|_| ()));
    }

    #[test]
    fn prop_random_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let schema = game_schema();
        assert_untrusted(lazy_decode(&schema, &bytes));
        assert_untrusted(BufferView::open_strict(&bytes, &schema).map(|_| ()));
    }

    #[test]
    fn prop_strict_success_implies_lazy_success(
        index in any::<prop::sample::Index>(),
        value in any::<u8>(),
    ) {
        let schema = game_schema();
        let mut buf = orc_buffer();
        let at = index.index(buf.len());
        buf[at] = value;

        if BufferView::open_strict(&buf, &schema).is_ok() {
            prop_assert!(lazy_decode(&schema, &buf).is_ok());
        }
    }
}

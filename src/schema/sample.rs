//! Sample Game Schema
//!
//! Vec3 / Color / Weapon / Monster / Response. Dipakai oleh tests,
//! benchmark, dan `flatwire_inspect`.

use super::descriptor::{
    ElementType, EnumDescriptor, FieldDescriptor, RecordDescriptor, Schema, StructDescriptor,
};
use super::value::{Record, ScalarValue, Value};
use crate::protocol::wire::ScalarType;

pub const VEC3: &str = "Vec3";
pub const COLOR: &str = "Color";
pub const WEAPON: &str = "Weapon";
pub const MONSTER: &str = "Monster";
pub const RESPONSE: &str = "Response";

pub const MONSTER_FILE_IDENTIFIER: [u8; 4] = *b"MONS";

/// Slot Monster (dipakai akses typed tanpa descriptor)
pub mod monster {
    pub const POS: u16 = 0;
    pub const MANA: u16 = 1;
    pub const HP: u16 = 2;
    pub const NAME: u16 = 3;
    pub const FRIENDLY: u16 = 4;
    pub const INVENTORY: u16 = 5;
    pub const COLOR: u16 = 6;
    pub const WEAPONS: u16 = 7;
    pub const PATH: u16 = 8;

    pub const DEFAULT_MANA: i16 = 150;
    pub const DEFAULT_HP: i16 = 100;
}

/// Slot Weapon
pub mod weapon {
    pub const NAME: u16 = 0;
    pub const DAMAGE: u16 = 1;
}

pub fn vec3_descriptor() -> StructDescriptor {
    StructDescriptor::new(
        VEC3,
        &[
            ("x", ScalarType::F32),
            ("y", ScalarType::F32),
            ("z", ScalarType::F32),
        ],
    )
}

pub fn color_descriptor() -> EnumDescriptor {
    EnumDescriptor::new(
        COLOR,
        ScalarType::I8,
        &[("Red", 0), ("Green", 1), ("Blue", 2)],
        "Blue",
    )
}

pub fn weapon_descriptor() -> RecordDescriptor {
    RecordDescriptor::new(
        WEAPON,
        vec![
            FieldDescriptor::string("name", weapon::NAME),
            FieldDescriptor::scalar("damage", weapon::DAMAGE, ScalarType::I16),
        ],
    )
}

pub fn monster_descriptor() -> RecordDescriptor {
    RecordDescriptor::new(
        MONSTER,
        vec![
            FieldDescriptor::structure("pos", monster::POS, VEC3),
            FieldDescriptor::scalar("mana", monster::MANA, ScalarType::I16)
                .with_default(ScalarValue::I16(monster::DEFAULT_MANA)),
            FieldDescriptor::scalar("hp", monster::HP, ScalarType::I16)
                .with_default(ScalarValue::I16(monster::DEFAULT_HP)),
            FieldDescriptor::string("name", monster::NAME),
            FieldDescriptor::scalar("friendly", monster::FRIENDLY, ScalarType::Bool).deprecated(),
            FieldDescriptor::vector(
                "inventory",
                monster::INVENTORY,
                ElementType::Scalar(ScalarType::U8),
            ),
            FieldDescriptor::enumeration("color", monster::COLOR, COLOR),
            FieldDescriptor::vector(
                "weapons",
                monster::WEAPONS,
                ElementType::Record(WEAPON.to_string()),
            ),
            FieldDescriptor::vector("path", monster::PATH, ElementType::Struct(VEC3.to_string())),
        ],
    )
}

pub fn response_descriptor() -> RecordDescriptor {
    RecordDescriptor::new(
        RESPONSE,
        vec![FieldDescriptor::vector(
            "monsters",
            0,
            ElementType::Record(MONSTER.to_string()),
        )],
    )
}

/// Schema lengkap dengan root Monster dan identifier "MONS"
pub fn game_schema() -> Schema {
    Schema::new()
        .with_struct(vec3_descriptor())
        .with_enum(color_descriptor())
        .with_record(weapon_descriptor())
        .with_record(monster_descriptor())
        .with_record(response_descriptor())
        .with_root(MONSTER)
        .with_file_identifier(MONSTER_FILE_IDENTIFIER)
}

pub fn vec3(x: f32, y: f32, z: f32) -> Value {
    Value::Struct(Record::new().with("x", x).with("y", y).with("z", z))
}

pub fn weapon(name: &str, damage: i16) -> Value {
    Record::new()
        .with("name", name)
        .with("damage", damage)
        .into()
}

/// Monster contoh: "Orc" dengan satu senjata dan path kosong
pub fn orc() -> Record {
    Record::new()
        .with("pos", vec3(1.0, 2.0, 3.0))
        .with("hp", 300i16)
        .with("name", "Orc")
        .with(
            "inventory",
            vec![Value::from(1u8), Value::from(2u8), Value::from(3u8)],
        )
        .with("color", ScalarValue::I8(0))
        .with("weapons", vec![weapon("Axe", 50)])
        .with("path", Vec::<Value>::new())
}

use std::collections::BTreeMap;

use crate::extract::Entity;
use crate::registry::Category;
use crate::value::Value;

const SCHOOLS: [(i64, &str); 8] = [
    (0, "Conjuration"),
    (1, "Alteration"),
    (2, "Evocation"),
    (3, "Construction"),
    (4, "Enchantment"),
    (5, "Thaumaturgy"),
    (6, "Blood"),
    (7, "Divine"),
];

const RARITIES: [(i64, &str); 7] = [
    (0, "Common"),
    (1, "Uncommon"),
    (2, "Rare"),
    (5, "Never random"),
    (11, "Throne lvl1"),
    (12, "Throne lvl2"),
    (13, "Throne lvl3"),
];

const INVALID_SCHOOL: i64 = -1;

/// Entity ready for persistence: declared fields only, no float values.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEntity(Entity);

impl NormalizedEntity {
    pub fn entity(&self) -> &Entity {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Persist(NormalizedEntity),
    Skip(String),
}

/// Code → label tables used during enrichment.
#[derive(Debug, Clone)]
pub struct EnrichTables {
    schools: BTreeMap<i64, &'static str>,
    rarities: BTreeMap<i64, &'static str>,
}

impl Default for EnrichTables {
    fn default() -> Self {
        EnrichTables {
            schools: SCHOOLS.into_iter().collect(),
            rarities: RARITIES.into_iter().collect(),
        }
    }
}

impl EnrichTables {
    pub fn enrich(&self, category: Category, mut entity: Entity) -> Outcome {
        match category {
            Category::Spell => {
                if entity.get("gemcost").map_or(true, Value::is_null) {
                    entity.set("gemcost", Value::text("0"));
                }
                if let Some(code) = entity.get("school").and_then(school_code) {
                    if code == INVALID_SCHOOL as f64 {
                        return Outcome::Skip("invalid school".into());
                    }
                    if let Some(label) = self.school(code) {
                        entity.set("school", Value::text(label));
                    }
                }
            }
            Category::Site => {
                if let Some(code) = entity.get("rarity").and_then(rarity_code) {
                    let label = self.rarities.get(&code).copied().unwrap_or("");
                    entity.set("rarity", Value::text(label));
                }
            }
            Category::Item | Category::Unit | Category::Merc | Category::Event => {}
        }
        Outcome::Persist(NormalizedEntity(entity.map_values(Value::coerce)))
    }

    fn school(&self, code: f64) -> Option<&'static str> {
        if code.fract() != 0.0 {
            return None;
        }
        self.schools.get(&(code as i64)).copied()
    }
}

/// Schools arrive as numeric text ("2", "-1"), occasionally as plain numbers.
fn school_code(v: &Value) -> Option<f64> {
    match v {
        Value::Text(s) => s.trim().parse::<f64>().ok(),
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Null => None,
    }
}

/// Rarity accepts integers, floats (truncated) and integer text. Unparseable text
/// yields `None`, leaving the raw value in place.
fn rarity_code(v: &Value) -> Option<i64> {
    match v {
        Value::Integer(i) => Some(*i),
        Value::Float(f) => Some(f.trunc() as i64),
        Value::Text(s) => s.trim().parse::<i64>().ok(),
        Value::Null => None,
    }
}

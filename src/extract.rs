use std::collections::BTreeMap;

use crate::value::Value;

/// Field map exactly as the render host returned it.
pub type RawEntity = BTreeMap<String, Value>;

/// An entity restricted to one category's declared fields, in declared order.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    columns: Vec<(String, Value)>,
}

impl Entity {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.columns.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    /// Replaces a declared field; unknown fields are ignored so the column set never grows.
    pub fn set(&mut self, field: &str, value: Value) {
        if let Some(slot) = self.columns.iter_mut().find(|(k, _)| k == field) {
            slot.1 = value;
        }
    }

    pub fn id(&self) -> &Value {
        &self.columns[0].1
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.columns.iter().map(|(_, v)| v)
    }

    pub(crate) fn map_values(self, f: impl Fn(Value) -> Value) -> Self {
        Entity {
            columns: self.columns.into_iter().map(|(k, v)| (k, f(v))).collect(),
        }
    }
}

/// Project `raw` onto `fields` (which must start with `id`). Missing fields become null;
/// returns `None` when the id is null or absent.
pub fn project(raw: &RawEntity, fields: &[String]) -> Option<Entity> {
    let columns: Vec<(String, Value)> = fields
        .iter()
        .map(|f| (f.clone(), raw.get(f).cloned().unwrap_or(Value::Null)))
        .collect();

    match columns.first() {
        Some((name, id)) if name == "id" && !id.is_null() => Some(Entity { columns }),
        _ => None,
    }
}

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConfigError;

const BUILTIN_CATEGORIES: &str = include_str!("../categories.json");

static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Item,
    Spell,
    Unit,
    Merc,
    Site,
    Event,
}

impl Category {
    /// Processing order for a run.
    pub const ALL: [Category; 6] = [
        Category::Item,
        Category::Spell,
        Category::Unit,
        Category::Merc,
        Category::Site,
        Category::Event,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Item => "item",
            Category::Spell => "spell",
            Category::Unit => "unit",
            Category::Merc => "merc",
            Category::Site => "site",
            Category::Event => "event",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            Category::Item => "items",
            Category::Spell => "spells",
            Category::Unit => "units",
            Category::Merc => "mercs",
            Category::Site => "sites",
            Category::Event => "events",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| ConfigError::UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategorySpec {
    pub category: Category,
    /// Persisted columns in insert order, `id` first.
    pub fields: Vec<String>,
}

impl CategorySpec {
    pub fn table(&self) -> &'static str {
        self.category.table()
    }
}

/// Immutable field registry, built once at startup.
#[derive(Debug, Clone)]
pub struct Registry {
    specs: Vec<CategorySpec>,
}

impl Registry {
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_CATEGORIES).expect("built-in category config is valid")
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let parsed: BTreeMap<String, Vec<String>> = serde_json::from_str(raw)?;
        let mut specs = Vec::with_capacity(parsed.len());
        for (name, fields) in parsed {
            let category: Category = name.parse()?;
            validate_fields(category, &fields)?;
            specs.push(CategorySpec { category, fields });
        }
        // file order is irrelevant; runs always follow Category::ALL
        specs.sort_by_key(|s| s.category);
        Ok(Registry { specs })
    }

    pub fn spec(&self, category: Category) -> Result<&CategorySpec, ConfigError> {
        self.specs
            .iter()
            .find(|s| s.category == category)
            .ok_or_else(|| ConfigError::UnknownCategory(category.to_string()))
    }

    pub fn fields(&self, category: Category) -> Result<&[String], ConfigError> {
        self.spec(category).map(|s| s.fields.as_slice())
    }

    pub fn table(&self, category: Category) -> Result<&'static str, ConfigError> {
        self.spec(category).map(CategorySpec::table)
    }

    pub fn specs(&self) -> &[CategorySpec] {
        &self.specs
    }

    /// Registered category names, in processing order.
    pub fn names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.category.to_string()).collect()
    }
}

fn validate_fields(category: Category, fields: &[String]) -> Result<(), ConfigError> {
    if fields.first().map(String::as_str) != Some("id") {
        return Err(ConfigError::MissingIdField(category.to_string()));
    }
    let mut seen = HashSet::new();
    for field in fields {
        if !IDENT_RE.is_match(field) {
            return Err(ConfigError::InvalidIdentifier(field.clone()));
        }
        if !seen.insert(field.as_str()) {
            return Err(ConfigError::DuplicateField {
                category: category.to_string(),
                field: field.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_every_category_in_order() {
        let reg = Registry::builtin();
        let cats: Vec<Category> = reg.specs().iter().map(|s| s.category).collect();
        assert_eq!(cats, Category::ALL.to_vec());
        assert!(reg.specs().iter().all(|s| s.fields[0] == "id"));
        assert_eq!(
            reg.fields(Category::Spell).unwrap(),
            ["id", "name", "gemcost", "mpath", "type", "school", "researchlevel"]
        );
        assert_eq!(reg.table(Category::Merc).unwrap(), "mercs");
    }

    #[test]
    fn category_names_round_trip() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
            assert_eq!(c.table(), format!("{}s", c.as_str()));
        }
        assert!(matches!(
            "nation".parse::<Category>(),
            Err(ConfigError::UnknownCategory(n)) if n == "nation"
        ));
    }

    #[test]
    fn file_order_does_not_change_processing_order() {
        let reg = Registry::from_json(r#"{"site": ["id", "name"], "item": ["id"]}"#).unwrap();
        assert_eq!(reg.names(), ["item", "site"]);
        assert!(matches!(
            reg.spec(Category::Spell),
            Err(ConfigError::UnknownCategory(_))
        ));
    }

    #[test]
    fn rejects_bad_configs() {
        assert!(matches!(
            Registry::from_json(r#"{"site": ["name", "id"]}"#),
            Err(ConfigError::MissingIdField(c)) if c == "site"
        ));
        assert!(matches!(
            Registry::from_json(r#"{"site": ["id", "name; DROP TABLE sites"]}"#),
            Err(ConfigError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            Registry::from_json(r#"{"site": ["id", "name", "name"]}"#),
            Err(ConfigError::DuplicateField { .. })
        ));
        assert!(matches!(
            Registry::from_json(r#"{"hero": ["id"]}"#),
            Err(ConfigError::UnknownCategory(_))
        ));
        assert!(matches!(Registry::from_json("[]"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cats.json");
        std::fs::write(&path, r#"{"event": ["id", "name", "description"]}"#).unwrap();
        let reg = Registry::load(&path).unwrap();
        assert_eq!(reg.fields(Category::Event).unwrap().len(), 3);

        let missing = Registry::load(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}

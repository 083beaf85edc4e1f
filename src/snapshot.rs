use std::path::{Path, PathBuf};

use crate::error::SnapshotError;
use crate::registry::{Category, Registry};
use crate::value::Value;

/// `<data_dir>/<table>/<id>.png`
pub fn path(data_dir: &Path, category: Category, id: &Value) -> PathBuf {
    let name: String = id
        .to_string()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    data_dir.join(category.table()).join(format!("{}.png", name))
}

pub fn ensure_dirs(data_dir: &Path, registry: &Registry) -> Result<(), SnapshotError> {
    for spec in registry.specs() {
        let dir = data_dir.join(spec.table());
        std::fs::create_dir_all(&dir).map_err(|source| SnapshotError::Io { path: dir, source })?;
    }
    Ok(())
}

pub fn count(data_dir: &Path, category: Category) -> usize {
    std::fs::read_dir(data_dir.join(category.table()))
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().is_some_and(|x| x == "png"))
                .count()
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_deterministic() {
        let base = Path::new("Data");
        assert_eq!(
            path(base, Category::Spell, &Value::Integer(12)),
            Path::new("Data/spells/12.png")
        );
        assert_eq!(
            path(base, Category::Event, &Value::text("../x")),
            Path::new("Data/events/___x.png")
        );
    }

    #[test]
    fn creates_and_counts_category_folders() {
        let dir = tempfile::tempdir().unwrap();
        ensure_dirs(dir.path(), &Registry::builtin()).unwrap();
        for c in Category::ALL {
            assert!(dir.path().join(c.table()).is_dir());
        }
        std::fs::write(path(dir.path(), Category::Unit, &Value::Integer(1)), b"png").unwrap();
        std::fs::write(dir.path().join("units").join("notes.txt"), b"x").unwrap();
        assert_eq!(count(dir.path(), Category::Unit), 1);
        assert_eq!(count(dir.path(), Category::Site), 0);
    }
}

//! In-memory render host for tests: datasets per category plus scripted failures.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::RenderHost;
use crate::error::RenderError;
use crate::extract::RawEntity;
use crate::registry::Category;
use crate::value::Value;

#[derive(Default)]
pub struct ScriptedHost {
    data: BTreeMap<Category, Vec<RawEntity>>,
    never_ready: HashSet<Category>,
    failures: HashMap<(Category, usize), VecDeque<RenderError>>,
    fail_snapshots: bool,
    selected: Option<Category>,
    cancel_after: Option<(usize, CancellationToken)>,
    pub calls: Vec<String>,
    pub render_attempts: HashMap<(Category, usize), usize>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `tests/fixtures/<name>.json`: an object of category → array of entities.
    pub fn from_fixture(name: &str) -> Self {
        let raw = std::fs::read_to_string(format!("tests/fixtures/{}.json", name)).unwrap();
        let parsed: BTreeMap<String, Vec<serde_json::Map<String, serde_json::Value>>> =
            serde_json::from_str(&raw).unwrap();
        let mut host = Self::new();
        for (cat, rows) in parsed {
            let rows: Vec<RawEntity> = rows
                .into_iter()
                .map(|m| m.into_iter().map(|(k, v)| (k, Value::from(v))).collect::<RawEntity>())
                .collect();
            host.data.insert(cat.parse().unwrap(), rows);
        }
        host
    }

    pub fn with(mut self, category: Category, rows: Vec<RawEntity>) -> Self {
        self.data.insert(category, rows);
        self
    }

    pub fn never_ready(mut self, category: Category) -> Self {
        self.never_ready.insert(category);
        self
    }

    /// Queue errors for successive render attempts of one index (indexes are post-sort).
    pub fn fail(mut self, category: Category, index: usize, errors: Vec<RenderError>) -> Self {
        self.failures.insert((category, index), errors.into());
        self
    }

    /// Trip `token` once `renders` render calls have been made.
    pub fn cancel_after(mut self, renders: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((renders, token));
        self
    }

    pub fn failing_snapshots(mut self) -> Self {
        self.fail_snapshots = true;
        self
    }

    fn rows(&self, category: Category) -> &[RawEntity] {
        self.data.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn id_key(row: &RawEntity) -> i64 {
    match row.get("id") {
        Some(Value::Integer(i)) => *i,
        Some(Value::Float(f)) => *f as i64,
        Some(Value::Text(s)) => s.parse().unwrap_or(i64::MAX),
        _ => i64::MAX,
    }
}

#[async_trait]
impl RenderHost for ScriptedHost {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        self.calls.push(format!("navigate {}", url));
        Ok(())
    }

    async fn select_category(&mut self, category: Category) -> Result<(), RenderError> {
        self.calls.push(format!("select {}", category));
        self.selected = Some(category);
        Ok(())
    }

    async fn wait_data_ready(
        &mut self,
        category: Category,
        timeout: Duration,
    ) -> Result<(), RenderError> {
        self.calls.push(format!("ready {}", category));
        if self.never_ready.contains(&category) || self.rows(category).is_empty() {
            return Err(RenderError::Timeout { op: "wait-data-ready", after: timeout });
        }
        Ok(())
    }

    async fn sort_by_id(&mut self, category: Category) -> Result<(), RenderError> {
        self.calls.push(format!("sort {}", category));
        if let Some(rows) = self.data.get_mut(&category) {
            rows.sort_by_key(id_key);
        }
        Ok(())
    }

    async fn count(&mut self, category: Category) -> Result<usize, RenderError> {
        Ok(self.rows(category).len())
    }

    async fn render_entity(
        &mut self,
        category: Category,
        index: usize,
        fields: &[String],
        timeout: Duration,
    ) -> Result<RawEntity, RenderError> {
        assert_eq!(self.selected, Some(category), "render outside the selected view");
        *self.render_attempts.entry((category, index)).or_default() += 1;
        if let Some((renders, token)) = &self.cancel_after {
            if self.render_attempts.values().sum::<usize>() >= *renders {
                token.cancel();
            }
        }
        if let Some(err) = self.failures.get_mut(&(category, index)).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        let row = self
            .rows(category)
            .get(index)
            .ok_or(RenderError::Timeout { op: "render", after: timeout })?;
        Ok(fields
            .iter()
            .filter_map(|f| row.get(f).map(|v| (f.clone(), v.clone())))
            .collect())
    }

    async fn snapshot(&mut self, category: Category, path: &Path) -> Result<(), RenderError> {
        self.calls.push(format!("snapshot {} {}", category, path.display()));
        if self.fail_snapshots {
            return Err(RenderError::Script("overlay not found".into()));
        }
        std::fs::write(path, b"\x89PNG").map_err(|e| RenderError::Script(e.to_string()))
    }
}

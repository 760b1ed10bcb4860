//! Typed in-memory table with primary key, auto-increment sequence,
//! one optional unique column and one optional btree-indexed column.

use hashbrown::HashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::ops::RangeBounds;

use crate::db::error::ReducerError;

/// A record type stored in a [`Table`]
pub trait Row: Clone + Debug {
    type Key: Ord + Clone + Debug;

    /// Table name, used in constraint errors and logs
    const TABLE: &'static str;
    /// Primary key column name
    const PRIMARY_KEY: &'static str;

    fn key(&self) -> Self::Key;

    /// Fill the auto-increment column with `next` if it is still 0.
    /// Returns true when the sequence value was consumed.
    fn assign_auto_inc(&mut self, _next: u64) -> bool {
        false
    }

    /// Secondary unique column (name, value)
    fn unique_column(&self) -> Option<(&'static str, u64)> {
        None
    }

    /// Value of the btree-indexed column
    fn indexed_column(&self) -> Option<u64> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct Table<R: Row> {
    rows: BTreeMap<R::Key, R>,
    /// Last value handed out by the auto-increment sequence
    sequence: u64,
    unique: HashMap<u64, R::Key>,
    index: BTreeMap<u64, BTreeSet<R::Key>>,
}

impl<R: Row> Default for Table<R> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            sequence: 0,
            unique: HashMap::new(),
            index: BTreeMap::new(),
        }
    }
}

impl<R: Row> Table<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row, returning it with generated keys filled in
    pub fn insert(&mut self, mut row: R) -> Result<R, ReducerError> {
        let next = self.sequence + 1;
        let consumed = row.assign_auto_inc(next);

        let key = row.key();
        if self.rows.contains_key(&key) {
            return Err(ReducerError::ConstraintViolation {
                table: R::TABLE,
                column: R::PRIMARY_KEY,
                value: format!("{:?}", key),
            });
        }

        let unique = row.unique_column();
        if let Some((column, value)) = unique {
            if self.unique.contains_key(&value) {
                return Err(ReducerError::ConstraintViolation {
                    table: R::TABLE,
                    column,
                    value: value.to_string(),
                });
            }
        }

        if consumed {
            self.sequence = next;
        }
        if let Some((_, value)) = unique {
            self.unique.insert(value, key.clone());
        }
        if let Some(value) = row.indexed_column() {
            self.index.entry(value).or_default().insert(key.clone());
        }
        self.rows.insert(key, row.clone());

        Ok(row)
    }

    pub fn find(&self, key: &R::Key) -> Option<&R> {
        self.rows.get(key)
    }

    /// Look up a row through its unique column
    pub fn find_by_unique(&self, value: u64) -> Option<&R> {
        self.unique.get(&value).and_then(|key| self.rows.get(key))
    }

    pub fn delete(&mut self, key: &R::Key) -> Option<R> {
        let row = self.rows.remove(key)?;

        if let Some((_, value)) = row.unique_column() {
            self.unique.remove(&value);
        }
        if let Some(value) = row.indexed_column() {
            if let Some(keys) = self.index.get_mut(&value) {
                keys.remove(key);
                if keys.is_empty() {
                    self.index.remove(&value);
                }
            }
        }

        Some(row)
    }

    pub fn count(&self) -> u64 {
        self.rows.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> + '_ {
        self.rows.values()
    }

    /// Rows whose indexed column falls in `range`, ordered by that column then key
    pub fn range_by_index<B>(&self, range: B) -> impl Iterator<Item = &R> + '_
    where
        B: RangeBounds<u64>,
    {
        self.index
            .range(range)
            .flat_map(move |(_, keys)| keys.iter().filter_map(move |k| self.rows.get(k)))
    }
}

//! In-memory store with per-cell timestamp resolution.
//!
//! The store keeps, per partition, static cells, rows keyed by their
//! clustering values, and deletions at partition, row and range level.
//! Conflicts resolve the way a timestamped wide-column store resolves them:
//!
//! - The higher write timestamp wins.
//! - On a tie, a deletion beats a write, and between two writes the value
//!   with the greater serialized bytes wins.
//! - A deletion at timestamp `t` shadows every cell and row marker written
//!   at or before `t`.
//!
//! A row is live while its marker or any of its regular cells is live. A
//! partition with live statics but no live rows returns one static-only row
//! to full-partition reads.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use harrow_core::statement::{ClusteringRestriction, ColumnValue, Selector};
use harrow_core::{CompiledStatement, Row, SutError, SystemUnderTest};
use harrow_schema::{ColumnKind, SchemaSpec, Value};
use harrow_types::{ConsistencyLevel, Rts};

type Key = Vec<Value>;

// ============================================================================
// Cells
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cell {
    Live { value: Value, ts: Rts },
    Dead { ts: Rts },
}

impl Cell {
    fn ts(&self) -> Rts {
        match self {
            Cell::Live { ts, .. } | Cell::Dead { ts } => *ts,
        }
    }

    /// Whether `self` replaces `current`.
    fn supersedes(&self, current: &Cell) -> bool {
        match self.ts().cmp(&current.ts()) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => match (self, current) {
                (Cell::Dead { .. }, Cell::Live { .. }) => true,
                (Cell::Live { value: a, .. }, Cell::Live { value: b, .. }) => {
                    a.compare_bytes(b) == Ordering::Greater
                }
                _ => false,
            },
        }
    }

    /// The value and its timestamp, unless dead or shadowed by `shadow`.
    fn live(&self, shadow: Option<Rts>) -> Option<(&Value, Rts)> {
        match self {
            Cell::Live { value, ts } if shadow.is_none_or(|s| *ts > s) => Some((value, *ts)),
            _ => None,
        }
    }
}

fn merge(slot: &mut Option<Cell>, incoming: Cell) {
    match slot {
        Some(current) if !incoming.supersedes(current) => {}
        _ => *slot = Some(incoming),
    }
}

fn in_range(key: &Key, lower: &Bound<Key>, upper: &Bound<Key>) -> bool {
    let above = match lower {
        Bound::Included(l) => key >= l,
        Bound::Excluded(l) => key > l,
        Bound::Unbounded => true,
    };
    let below = match upper {
        Bound::Included(u) => key <= u,
        Bound::Excluded(u) => key < u,
        Bound::Unbounded => true,
    };
    above && below
}

// ============================================================================
// Partitions
// ============================================================================

#[derive(Debug, Clone)]
struct RowState {
    marker: Option<Rts>,
    deletion: Option<Rts>,
    cells: Vec<Option<Cell>>,
}

impl RowState {
    fn new(regulars: usize) -> Self {
        Self {
            marker: None,
            deletion: None,
            cells: vec![None; regulars],
        }
    }
}

#[derive(Debug, Clone)]
struct RangeTombstone {
    lower: Bound<Key>,
    upper: Bound<Key>,
    ts: Rts,
}

type LiveCells<'a> = Vec<Option<(&'a Value, Rts)>>;

#[derive(Debug, Clone)]
struct Partition {
    deletion: Option<Rts>,
    statics: Vec<Option<Cell>>,
    rows: BTreeMap<Key, RowState>,
    ranges: Vec<RangeTombstone>,
}

impl Partition {
    fn new(statics: usize) -> Self {
        Self {
            deletion: None,
            statics: vec![None; statics],
            rows: BTreeMap::new(),
            ranges: Vec::new(),
        }
    }

    fn row_mut(&mut self, key: Key, regulars: usize) -> &mut RowState {
        self.rows
            .entry(key)
            .or_insert_with(|| RowState::new(regulars))
    }

    fn row_shadow(&self, key: &Key, row: &RowState) -> Option<Rts> {
        self.ranges
            .iter()
            .filter(|range| in_range(key, &range.lower, &range.upper))
            .map(|range| range.ts)
            .max()
            .max(row.deletion)
            .max(self.deletion)
    }

    fn live_statics(&self) -> LiveCells<'_> {
        self.statics
            .iter()
            .map(|cell| cell.as_ref().and_then(|c| c.live(self.deletion)))
            .collect()
    }

    fn live_rows(&self) -> impl Iterator<Item = (&Key, LiveCells<'_>)> {
        self.rows.iter().filter_map(|(key, row)| {
            let shadow = self.row_shadow(key, row);
            let cells: LiveCells<'_> = row
                .cells
                .iter()
                .map(|cell| cell.as_ref().and_then(|c| c.live(shadow)))
                .collect();
            let marker_live = row
                .marker
                .is_some_and(|marker| shadow.is_none_or(|s| marker > s));
            (marker_live || cells.iter().any(Option::is_some)).then_some((key, cells))
        })
    }
}

// ============================================================================
// Store
// ============================================================================

/// A statement's columns split by role.
#[derive(Debug, Default)]
struct Resolved {
    pk: Key,
    /// `None` when no clustering column was given.
    ck: Option<Key>,
    statics: Vec<(usize, Value)>,
    regulars: Vec<(usize, Value)>,
}

/// Single-node in-memory store for one table.
///
/// Consistency levels are accepted and ignored: every write is immediately
/// visible.
#[derive(Debug)]
pub struct InMemorySut {
    schema: Arc<SchemaSpec>,
    columns: HashMap<String, (ColumnKind, usize)>,
    partitions: Mutex<HashMap<Key, Partition>>,
    schema_changes: Mutex<Vec<String>>,
    shutdown: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicU64,
}

impl InMemorySut {
    pub fn new(schema: Arc<SchemaSpec>) -> Self {
        let mut columns = HashMap::new();
        let groups = [
            (ColumnKind::PartitionKey, schema.partition_keys()),
            (ColumnKind::Clustering, schema.clustering_keys()),
            (ColumnKind::Static, schema.statics()),
            (ColumnKind::Regular, schema.regulars()),
        ];
        for (kind, group) in groups {
            for (index, column) in group.iter().enumerate() {
                columns.insert(column.name.clone(), (kind, index));
            }
        }
        Self {
            columns,
            partitions: Mutex::new(HashMap::new()),
            schema_changes: Mutex::new(Vec::new()),
            shutdown: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            writes: AtomicU64::new(0),
            schema,
        }
    }

    /// Makes every following write fail with [`SutError::Execution`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, AtomicOrdering::SeqCst);
    }

    /// Writes applied so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(AtomicOrdering::SeqCst)
    }

    /// Partitions that received at least one write.
    pub fn partition_count(&self) -> usize {
        lock(&self.partitions).len()
    }

    pub fn schema_changes(&self) -> Vec<String> {
        lock(&self.schema_changes).clone()
    }

    fn reject(statement: &CompiledStatement, reason: impl Into<String>) -> SutError {
        SutError::Rejected {
            statement: statement.to_string(),
            reason: reason.into(),
        }
    }

    fn resolve<'a>(
        &self,
        statement: &CompiledStatement,
        values: impl IntoIterator<Item = &'a ColumnValue>,
    ) -> Result<Resolved, SutError> {
        let mut pk = vec![None; self.schema.partition_keys().len()];
        let mut ck = vec![None; self.schema.clustering_keys().len()];
        let mut resolved = Resolved::default();
        for (name, value) in values {
            let Some(&(kind, index)) = self.columns.get(name) else {
                return Err(Self::reject(statement, format!("unknown column {name}")));
            };
            let value = value.clone();
            match kind {
                ColumnKind::PartitionKey => pk[index] = Some(value),
                ColumnKind::Clustering => ck[index] = Some(value),
                ColumnKind::Static => resolved.statics.push((index, value)),
                ColumnKind::Regular => resolved.regulars.push((index, value)),
            }
        }

        resolved.pk = pk
            .into_iter()
            .collect::<Option<Key>>()
            .ok_or_else(|| Self::reject(statement, "incomplete partition key"))?;
        resolved.ck = if ck.iter().all(Option::is_none) && !ck.is_empty() {
            None
        } else {
            Some(
                ck.into_iter()
                    .collect::<Option<Key>>()
                    .ok_or_else(|| Self::reject(statement, "incomplete clustering key"))?,
            )
        };
        Ok(resolved)
    }

    fn write(&self, statement: &CompiledStatement) -> Result<(), SutError> {
        let regulars = self.schema.regulars().len();
        let statics = self.schema.statics().len();
        let mut partitions = lock(&self.partitions);

        match statement {
            CompiledStatement::Insert {
                columns, timestamp, ..
            } => {
                let resolved = self.resolve(statement, columns)?;
                let ck = resolved
                    .ck
                    .ok_or_else(|| Self::reject(statement, "insert without clustering key"))?;
                let partition = partitions
                    .entry(resolved.pk)
                    .or_insert_with(|| Partition::new(statics));
                apply(&mut partition.statics, resolved.statics, *timestamp);
                let row = partition.row_mut(ck, regulars);
                row.marker = row.marker.max(Some(*timestamp));
                apply(&mut row.cells, resolved.regulars, *timestamp);
            }
            CompiledStatement::Update {
                assignments,
                key,
                timestamp,
                ..
            } => {
                let resolved = self.resolve(statement, key.iter().chain(assignments))?;
                if resolved.ck.is_none() && !resolved.regulars.is_empty() {
                    return Err(Self::reject(statement, "regular columns need a clustering key"));
                }
                let partition = partitions
                    .entry(resolved.pk)
                    .or_insert_with(|| Partition::new(statics));
                apply(&mut partition.statics, resolved.statics, *timestamp);
                if let Some(ck) = resolved.ck
                    && !resolved.regulars.is_empty()
                {
                    let row = partition.row_mut(ck, regulars);
                    apply(&mut row.cells, resolved.regulars, *timestamp);
                }
            }
            CompiledStatement::Delete {
                columns,
                partition: pk_values,
                clustering,
                timestamp,
                ..
            } => {
                let pk = self.resolve(statement, pk_values)?.pk;
                let partition = partitions
                    .entry(pk)
                    .or_insert_with(|| Partition::new(statics));
                if columns.is_empty() {
                    self.delete_rows(statement, partition, clustering, *timestamp)?;
                } else {
                    self.delete_cells(statement, partition, columns, clustering, *timestamp)?;
                }
            }
            CompiledStatement::Select { .. } => {}
        }
        Ok(())
    }

    fn delete_rows(
        &self,
        statement: &CompiledStatement,
        partition: &mut Partition,
        clustering: &ClusteringRestriction,
        ts: Rts,
    ) -> Result<(), SutError> {
        match clustering {
            ClusteringRestriction::None => partition.deletion = partition.deletion.max(Some(ts)),
            ClusteringRestriction::Eq(values) => {
                let ck = self
                    .resolve_clustering(statement, values)?
                    .ok_or_else(|| Self::reject(statement, "row delete without clustering key"))?;
                let row = partition.row_mut(ck, self.schema.regulars().len());
                row.deletion = row.deletion.max(Some(ts));
            }
            ClusteringRestriction::Range { lower, upper, .. } => {
                partition.ranges.push(RangeTombstone {
                    lower: lower.clone(),
                    upper: upper.clone(),
                    ts,
                });
            }
        }
        Ok(())
    }

    fn delete_cells(
        &self,
        statement: &CompiledStatement,
        partition: &mut Partition,
        columns: &[String],
        clustering: &ClusteringRestriction,
        ts: Rts,
    ) -> Result<(), SutError> {
        let mut regulars = Vec::new();
        for name in columns {
            match self.columns.get(name) {
                Some(&(ColumnKind::Static, index)) => {
                    merge(&mut partition.statics[index], Cell::Dead { ts });
                }
                Some(&(ColumnKind::Regular, index)) => regulars.push(index),
                _ => return Err(Self::reject(statement, format!("cannot delete column {name}"))),
            }
        }
        if regulars.is_empty() {
            return Ok(());
        }

        let ck = match clustering {
            ClusteringRestriction::Eq(values) => self.resolve_clustering(statement, values)?,
            ClusteringRestriction::None if self.schema.clustering_keys().is_empty() => {
                Some(Vec::new())
            }
            _ => None,
        }
        .ok_or_else(|| Self::reject(statement, "column delete needs a single row"))?;
        let row = partition.row_mut(ck, self.schema.regulars().len());
        for index in regulars {
            merge(&mut row.cells[index], Cell::Dead { ts });
        }
        Ok(())
    }

    fn resolve_clustering(
        &self,
        statement: &CompiledStatement,
        values: &[ColumnValue],
    ) -> Result<Option<Key>, SutError> {
        let mut ck = vec![None; self.schema.clustering_keys().len()];
        for (name, value) in values {
            match self.columns.get(name) {
                Some(&(ColumnKind::Clustering, index)) => ck[index] = Some(value.clone()),
                _ => return Err(Self::reject(statement, format!("{name} is not a clustering column"))),
            }
        }
        Ok(ck.into_iter().collect())
    }

    fn read(&self, statement: &CompiledStatement) -> Result<Vec<Row>, SutError> {
        let CompiledStatement::Select {
            selection,
            partition: pk_values,
            clustering,
            reverse,
            ..
        } = statement
        else {
            return Ok(Vec::new());
        };
        let pk = self.resolve(statement, pk_values)?.pk;
        let eq_key = match clustering {
            ClusteringRestriction::Eq(values) => self.resolve_clustering(statement, values)?,
            _ => None,
        };

        let partitions = lock(&self.partitions);
        let Some(partition) = partitions.get(&pk) else {
            return Ok(Vec::new());
        };
        let statics = partition.live_statics();
        let selected = |key: &Key| match clustering {
            ClusteringRestriction::None => true,
            ClusteringRestriction::Eq(_) => eq_key.as_ref() == Some(key),
            ClusteringRestriction::Range { lower, upper, .. } => in_range(key, lower, upper),
        };

        let mut any_live = false;
        let mut rows = Vec::new();
        for (key, cells) in partition.live_rows() {
            any_live = true;
            if selected(key) {
                rows.push(self.project(statement, selection, &pk, Some(key), &statics, &cells)?);
            }
        }
        if *reverse {
            rows.reverse();
        }
        let has_statics = statics.iter().any(Option::is_some);
        if !any_live && has_statics && matches!(clustering, ClusteringRestriction::None) {
            let empty = vec![None; self.schema.regulars().len()];
            rows.push(self.project(statement, selection, &pk, None, &statics, &empty)?);
        }
        Ok(rows)
    }

    fn project(
        &self,
        statement: &CompiledStatement,
        selection: &[Selector],
        pk: &Key,
        ck: Option<&Key>,
        statics: &LiveCells<'_>,
        regulars: &LiveCells<'_>,
    ) -> Result<Row, SutError> {
        let value = |cell: &Option<(&Value, Rts)>| cell.map(|(value, _)| value.clone());
        let write_time = |cell: &Option<(&Value, Rts)>| cell.map(|(_, ts)| Value::BigInt(ts.as_i64()));
        selection
            .iter()
            .map(|selector| {
                let name = match selector {
                    Selector::Column(name) | Selector::WriteTime(name) => name,
                };
                let Some(&(kind, index)) = self.columns.get(name) else {
                    return Err(Self::reject(statement, format!("unknown column {name}")));
                };
                Ok(match (selector, kind) {
                    (Selector::Column(_), ColumnKind::PartitionKey) => Some(pk[index].clone()),
                    (Selector::Column(_), ColumnKind::Clustering) => ck.map(|k| k[index].clone()),
                    (Selector::Column(_), ColumnKind::Static) => value(&statics[index]),
                    (Selector::Column(_), ColumnKind::Regular) => value(&regulars[index]),
                    (Selector::WriteTime(_), ColumnKind::Static) => write_time(&statics[index]),
                    (Selector::WriteTime(_), ColumnKind::Regular) => write_time(&regulars[index]),
                    (Selector::WriteTime(_), _) => {
                        return Err(Self::reject(statement, format!("no write time for key column {name}")));
                    }
                })
            })
            .collect()
    }
}

fn apply(cells: &mut [Option<Cell>], values: Vec<(usize, Value)>, ts: Rts) {
    for (index, value) in values {
        merge(&mut cells[index], Cell::Live { value, ts });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SystemUnderTest for InMemorySut {
    fn execute(
        &self,
        statement: &CompiledStatement,
        _consistency: ConsistencyLevel,
    ) -> Result<Vec<Row>, SutError> {
        if self.is_shutdown() {
            return Err(SutError::Shutdown);
        }
        if statement.table() != self.schema.qualified_name() {
            return Err(Self::reject(
                statement,
                format!("unknown table {}", statement.table()),
            ));
        }
        if !statement.is_write() {
            return self.read(statement);
        }
        if self.fail_writes.load(AtomicOrdering::SeqCst) {
            return Err(SutError::Execution("injected write failure".into()));
        }
        self.write(statement)?;
        self.writes.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(Vec::new())
    }

    fn schema_change(&self, statement: &str) -> Result<(), SutError> {
        if self.is_shutdown() {
            return Err(SutError::Shutdown);
        }
        tracing::debug!(statement, "applying schema change");
        lock(&self.schema_changes).push(statement.to_owned());
        Ok(())
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(AtomicOrdering::SeqCst)
    }

    fn shutdown(&self) -> Result<(), SutError> {
        self.shutdown.store(true, AtomicOrdering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harrow_schema::DataType;
    use test_case::test_case;

    fn schema() -> Arc<SchemaSpec> {
        Arc::new(
            SchemaSpec::builder("harrow", "mem")
                .partition_key("pk", DataType::BigInt)
                .clustering_key("ck", DataType::BigInt)
                .static_column("s", DataType::BigInt)
                .regular_column("v", DataType::BigInt)
                .build()
                .unwrap(),
        )
    }

    fn col(name: &str, value: i64) -> ColumnValue {
        (name.to_owned(), Value::BigInt(value))
    }

    fn insert(ck: i64, v: i64, ts: u64) -> CompiledStatement {
        CompiledStatement::Insert {
            table: "harrow.mem".into(),
            columns: vec![col("pk", 1), col("ck", ck), col("v", v)],
            timestamp: Rts::new(ts),
        }
    }

    fn update_static(s: i64, ts: u64) -> CompiledStatement {
        CompiledStatement::Update {
            table: "harrow.mem".into(),
            assignments: vec![col("s", s)],
            key: vec![col("pk", 1)],
            timestamp: Rts::new(ts),
        }
    }

    fn delete(columns: &[&str], clustering: ClusteringRestriction, ts: u64) -> CompiledStatement {
        CompiledStatement::Delete {
            table: "harrow.mem".into(),
            columns: columns.iter().map(|c| (*c).to_owned()).collect(),
            partition: vec![col("pk", 1)],
            clustering,
            timestamp: Rts::new(ts),
        }
    }

    fn row_key(ck: i64) -> ClusteringRestriction {
        ClusteringRestriction::Eq(vec![col("ck", ck)])
    }

    fn select(clustering: ClusteringRestriction, reverse: bool) -> CompiledStatement {
        CompiledStatement::Select {
            table: "harrow.mem".into(),
            selection: ["pk", "ck", "s", "v"]
                .into_iter()
                .map(|c| Selector::Column(c.into()))
                .chain(["s", "v"].into_iter().map(|c| Selector::WriteTime(c.into())))
                .collect(),
            partition: vec![col("pk", 1)],
            clustering,
            order_by: vec!["ck".into()],
            reverse,
        }
    }

    fn run(sut: &InMemorySut, statements: &[CompiledStatement]) -> Vec<Row> {
        for statement in statements {
            sut.execute(statement, ConsistencyLevel::All).unwrap();
        }
        sut.execute(&select(ClusteringRestriction::None, false), ConsistencyLevel::All)
            .unwrap()
    }

    fn big(v: i64) -> Option<Value> {
        Some(Value::BigInt(v))
    }

    #[test]
    fn later_write_wins() {
        let sut = InMemorySut::new(schema());
        let rows = run(&sut, &[insert(1, 10, 5), insert(1, 20, 3)]);
        assert_eq!(rows, vec![vec![big(1), big(1), None, big(10), None, big(5)]]);
    }

    #[test_case(10, 20, 20 ; "greater bytes replace")]
    #[test_case(20, 10, 20 ; "smaller bytes do not")]
    #[test_case(1, -1, -1 ; "negative sorts after positive")]
    fn ties_pick_greater_bytes(first: i64, second: i64, kept: i64) {
        let sut = InMemorySut::new(schema());
        let rows = run(&sut, &[insert(1, first, 5), insert(1, second, 5)]);
        assert_eq!(rows[0][3], big(kept));
    }

    #[test]
    fn deletion_wins_ties() {
        let sut = InMemorySut::new(schema());
        let rows = run(&sut, &[insert(1, 10, 5), delete(&[], row_key(1), 5)]);
        assert!(rows.is_empty());
    }

    #[test]
    fn row_delete_shadows_only_older_writes() {
        let sut = InMemorySut::new(schema());
        let rows = run(
            &sut,
            &[insert(1, 10, 5), delete(&[], row_key(1), 6), insert(1, 30, 7)],
        );
        assert_eq!(rows, vec![vec![big(1), big(1), None, big(30), None, big(7)]]);
    }

    #[test]
    fn marker_keeps_row_alive_after_cell_delete() {
        let sut = InMemorySut::new(schema());
        let rows = run(&sut, &[insert(1, 10, 5), delete(&["v"], row_key(1), 6)]);
        assert_eq!(rows, vec![vec![big(1), big(1), None, None, None, None]]);
    }

    #[test]
    fn updated_row_dies_with_its_cells() {
        let sut = InMemorySut::new(schema());
        let update = CompiledStatement::Update {
            table: "harrow.mem".into(),
            assignments: vec![col("v", 4)],
            key: vec![col("pk", 1), col("ck", 2)],
            timestamp: Rts::new(5),
        };
        let rows = run(&sut, &[update, delete(&["v"], row_key(2), 6)]);
        assert!(rows.is_empty());
    }

    #[test]
    fn range_delete_covers_bounds() {
        let sut = InMemorySut::new(schema());
        let range = ClusteringRestriction::Range {
            columns: vec!["ck".into()],
            lower: Bound::Included(vec![Value::BigInt(2)]),
            upper: Bound::Excluded(vec![Value::BigInt(4)]),
        };
        let writes: Vec<_> = (1..=4).map(|ck| insert(ck, ck, 5)).collect();
        let mut statements = writes.clone();
        statements.push(delete(&[], range, 6));
        let cks: Vec<_> = run(&sut, &statements).into_iter().map(|r| r[1].clone()).collect();
        assert_eq!(cks, vec![big(1), big(4)]);
    }

    #[test]
    fn partition_delete_leaves_static_only_row_when_statics_are_newer() {
        let sut = InMemorySut::new(schema());
        let rows = run(
            &sut,
            &[insert(1, 10, 5), delete(&[], ClusteringRestriction::None, 6), update_static(9, 7)],
        );
        assert_eq!(rows, vec![vec![big(1), None, big(9), None, big(7), None]]);
    }

    #[test]
    fn statics_repeat_on_every_row_and_survive_row_deletes() {
        let sut = InMemorySut::new(schema());
        let rows = run(
            &sut,
            &[update_static(3, 4), insert(1, 10, 5), insert(2, 20, 5), delete(&[], row_key(1), 9)],
        );
        assert_eq!(rows, vec![vec![big(1), big(2), big(3), big(20), big(4), big(5)]]);
    }

    #[test]
    fn reverse_and_slice_reads() {
        let sut = InMemorySut::new(schema());
        for ck in 1..=3 {
            sut.execute(&insert(ck, ck, 5), ConsistencyLevel::One).unwrap();
        }
        let reversed = sut
            .execute(&select(ClusteringRestriction::None, true), ConsistencyLevel::One)
            .unwrap();
        let cks: Vec<_> = reversed.iter().map(|r| r[1].clone()).collect();
        assert_eq!(cks, vec![big(3), big(2), big(1)]);

        let single = sut
            .execute(&select(row_key(2), false), ConsistencyLevel::One)
            .unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0][1], big(2));
    }

    #[test]
    fn rejects_unknown_tables_and_columns() {
        let sut = InMemorySut::new(schema());
        let wrong_table = CompiledStatement::Insert {
            table: "harrow.other".into(),
            columns: vec![col("pk", 1)],
            timestamp: Rts::new(1),
        };
        assert!(matches!(
            sut.execute(&wrong_table, ConsistencyLevel::All),
            Err(SutError::Rejected { .. })
        ));
        let wrong_column = CompiledStatement::Insert {
            table: "harrow.mem".into(),
            columns: vec![col("pk", 1), col("ck", 1), col("nope", 1)],
            timestamp: Rts::new(1),
        };
        assert!(sut.execute(&wrong_column, ConsistencyLevel::All).is_err());
        assert_eq!(sut.writes(), 0);
    }

    #[test]
    fn injected_failures_and_shutdown() {
        let sut = InMemorySut::new(schema());
        sut.set_fail_writes(true);
        assert!(matches!(
            sut.execute(&insert(1, 1, 1), ConsistencyLevel::All),
            Err(SutError::Execution(_))
        ));
        sut.set_fail_writes(false);
        sut.execute(&insert(1, 1, 1), ConsistencyLevel::All).unwrap();
        assert_eq!(sut.writes(), 1);
        assert_eq!(sut.partition_count(), 1);

        sut.shutdown().unwrap();
        assert!(sut.is_shutdown());
        assert_eq!(
            sut.execute(&insert(1, 1, 2), ConsistencyLevel::All),
            Err(SutError::Shutdown)
        );
        assert_eq!(sut.schema_change("CREATE TABLE x"), Err(SutError::Shutdown));
    }
}

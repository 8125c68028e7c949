//! Compiles operations into write statements.

use std::sync::Arc;

use harrow_schema::{ColumnSpec, SchemaSpec};
use harrow_types::{Cd, ColumnMask, OperationKind, Pd, Rts};

use crate::operation::Operation;
use crate::select_helper::{clustering_key, clustering_range, partition_key};
use crate::statement::{ClusteringRestriction, ColumnValue, CompiledStatement};

/// Turns descriptors into insert, update and delete statements for one
/// schema.
#[derive(Debug, Clone)]
pub struct WriteHelper {
    schema: Arc<SchemaSpec>,
}

impl WriteHelper {
    pub fn new(schema: Arc<SchemaSpec>) -> Self {
        Self { schema }
    }

    /// Compiles `operation` at write timestamp `rts`.
    pub fn compile(&self, operation: &Operation, rts: Rts) -> CompiledStatement {
        let (pd, cd) = (operation.pd, operation.cd);
        match operation.kind {
            OperationKind::Insert => self.insert(pd, cd, &operation.vds, None, rts),
            OperationKind::InsertWithStatics => {
                self.insert(pd, cd, &operation.vds, Some(&operation.sds), rts)
            }
            OperationKind::Update | OperationKind::UpdateWithStatics => self.update(
                pd,
                cd,
                &masked(self.schema.regulars(), operation.regular_mask, &operation.vds),
                &masked(self.schema.statics(), operation.static_mask, &operation.sds),
                rts,
            ),
            OperationKind::DeleteRow => self.delete_row(pd, cd, rts),
            OperationKind::DeletePartition => self.delete_partition(pd, rts),
            OperationKind::DeleteColumns | OperationKind::DeleteColumnsWithStatics => self
                .delete_columns(pd, cd, operation.regular_mask, operation.static_mask, rts),
            OperationKind::DeleteRange | OperationKind::DeleteSlice => match operation.range {
                Some(range) => CompiledStatement::Delete {
                    table: self.schema.qualified_name(),
                    columns: Vec::new(),
                    partition: partition_key(&self.schema, pd),
                    clustering: clustering_range(&self.schema, range.lower, range.upper),
                    timestamp: rts,
                },
                // Range kinds always carry a range; fall back to the row.
                None => self.delete_row(pd, cd, rts),
            },
        }
    }

    /// Inserts a full row, and every static column when `sds` is given.
    pub fn insert(
        &self,
        pd: Pd,
        cd: Cd,
        vds: &[u64],
        sds: Option<&[u64]>,
        rts: Rts,
    ) -> CompiledStatement {
        let mut columns = partition_key(&self.schema, pd);
        columns.extend(clustering_key(&self.schema, cd));
        if let Some(sds) = sds {
            columns.extend(inflate(self.schema.statics(), sds));
        }
        columns.extend(inflate(self.schema.regulars(), vds));
        CompiledStatement::Insert {
            table: self.schema.qualified_name(),
            columns,
            timestamp: rts,
        }
    }

    /// Assigns regular cells `(index, vd)` and static cells `(index, sd)`.
    ///
    /// The clustering key is left out when only statics are assigned.
    pub fn update(
        &self,
        pd: Pd,
        cd: Cd,
        regular: &[(usize, u64)],
        statics: &[(usize, u64)],
        rts: Rts,
    ) -> CompiledStatement {
        let assign = |columns: &[ColumnSpec], cells: &[(usize, u64)]| -> Vec<ColumnValue> {
            cells
                .iter()
                .filter_map(|&(index, descriptor)| {
                    let column = columns.get(index)?;
                    Some((column.name.clone(), column.data_type.inflate(descriptor)))
                })
                .collect()
        };
        let mut assignments = assign(self.schema.statics(), statics);
        assignments.extend(assign(self.schema.regulars(), regular));

        let mut key = partition_key(&self.schema, pd);
        if !regular.is_empty() {
            key.extend(clustering_key(&self.schema, cd));
        }
        CompiledStatement::Update {
            table: self.schema.qualified_name(),
            assignments,
            key,
            timestamp: rts,
        }
    }

    pub fn delete_row(&self, pd: Pd, cd: Cd, rts: Rts) -> CompiledStatement {
        CompiledStatement::Delete {
            table: self.schema.qualified_name(),
            columns: Vec::new(),
            partition: partition_key(&self.schema, pd),
            clustering: ClusteringRestriction::row(clustering_key(&self.schema, cd)),
            timestamp: rts,
        }
    }

    pub fn delete_partition(&self, pd: Pd, rts: Rts) -> CompiledStatement {
        CompiledStatement::Delete {
            table: self.schema.qualified_name(),
            columns: Vec::new(),
            partition: partition_key(&self.schema, pd),
            clustering: ClusteringRestriction::None,
            timestamp: rts,
        }
    }

    /// Deletes the selected regular and static cells of one row.
    pub fn delete_columns(
        &self,
        pd: Pd,
        cd: Cd,
        regular_mask: ColumnMask,
        static_mask: ColumnMask,
        rts: Rts,
    ) -> CompiledStatement {
        let names = |columns: &[ColumnSpec], mask: ColumnMask| -> Vec<String> {
            mask.iter()
                .filter_map(|i| columns.get(i).map(|c| c.name.clone()))
                .collect()
        };
        let mut columns = names(self.schema.regulars(), regular_mask);
        columns.extend(names(self.schema.statics(), static_mask));
        CompiledStatement::Delete {
            table: self.schema.qualified_name(),
            columns,
            partition: partition_key(&self.schema, pd),
            clustering: ClusteringRestriction::row(clustering_key(&self.schema, cd)),
            timestamp: rts,
        }
    }
}

fn inflate(columns: &[ColumnSpec], descriptors: &[u64]) -> Vec<ColumnValue> {
    columns
        .iter()
        .zip(descriptors)
        .map(|(column, &descriptor)| (column.name.clone(), column.data_type.inflate(descriptor)))
        .collect()
}

fn masked(columns: &[ColumnSpec], mask: ColumnMask, descriptors: &[u64]) -> Vec<(usize, u64)> {
    mask.iter()
        .take_while(|&i| i < columns.len())
        .filter_map(|i| descriptors.get(i).map(|&d| (i, d)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor_selector::{DefaultDescriptorSelector, SelectorConfig};
    use crate::rng::PcgRng;
    use harrow_schema::DataType;
    use harrow_types::Lts;

    fn schema() -> Arc<SchemaSpec> {
        Arc::new(
            SchemaSpec::builder("harrow", "w")
                .partition_key("pk", DataType::BigInt)
                .clustering_key("ck", DataType::Integer)
                .static_column("s0", DataType::Integer)
                .static_column("s1", DataType::Integer)
                .regular_column("v0", DataType::TinyInt)
                .regular_column("v1", DataType::TinyInt)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn insert_writes_keys_then_statics_then_regulars() {
        let helper = WriteHelper::new(schema());
        let statement = helper.insert(
            Pd::new(1 << 63),
            Cd::new(0x8000_0000),
            &[0x80, 0x81],
            Some(&[0x8000_0000, 0x8000_0001]),
            Rts::new(10),
        );
        assert_eq!(
            statement.to_string(),
            "INSERT INTO harrow.w (pk, ck, s0, s1, v0, v1) VALUES (0, 0, 0, 1, 0, 1) USING TIMESTAMP 10;"
        );
    }

    #[test]
    fn static_only_update_omits_clustering_key() {
        let helper = WriteHelper::new(schema());
        let statement = helper.update(
            Pd::new(1 << 63),
            Cd::new(0),
            &[],
            &[(1, 0x8000_0002)],
            Rts::new(4),
        );
        assert_eq!(
            statement.to_string(),
            "UPDATE harrow.w USING TIMESTAMP 4 SET s1 = 2 WHERE pk = 0;"
        );
    }

    #[test]
    fn delete_columns_lists_masked_columns() {
        let helper = WriteHelper::new(schema());
        let statement = helper.delete_columns(
            Pd::new(1 << 63),
            Cd::new(0x8000_0005),
            ColumnMask::empty().with(1),
            ColumnMask::empty().with(0),
            Rts::new(8),
        );
        assert_eq!(
            statement.to_string(),
            "DELETE v1, s0 FROM harrow.w USING TIMESTAMP 8 WHERE pk = 0 AND ck = 5;"
        );
    }

    #[test]
    fn compiles_every_generated_operation_at_its_rts() {
        let schema = schema();
        let selector = DefaultDescriptorSelector::new(
            PcgRng::new(3, schema.fingerprint()),
            Arc::clone(&schema),
            SelectorConfig::default(),
        )
        .unwrap();
        let helper = WriteHelper::new(Arc::clone(&schema));
        for lts in 0..300 {
            for op in selector.operations(Pd::new(lts % 5), Lts::new(lts)) {
                let statement = helper.compile(&op, Rts::new(lts + 100));
                assert_eq!(statement.timestamp(), Some(Rts::new(lts + 100)));
                match (&statement, op.kind) {
                    (CompiledStatement::Insert { columns, .. }, OperationKind::Insert) => {
                        assert_eq!(columns.len(), 4);
                    }
                    (CompiledStatement::Insert { columns, .. }, OperationKind::InsertWithStatics) => {
                        assert_eq!(columns.len(), 6);
                    }
                    (CompiledStatement::Update { assignments, .. }, kind) => {
                        assert!(kind == OperationKind::Update || kind == OperationKind::UpdateWithStatics);
                        assert_eq!(
                            assignments.len(),
                            op.regular_mask.count() + op.static_mask.count()
                        );
                    }
                    (CompiledStatement::Delete { clustering, .. }, OperationKind::DeletePartition) => {
                        assert_eq!(*clustering, ClusteringRestriction::None);
                    }
                    (CompiledStatement::Delete { clustering, .. }, kind) if kind.is_range() => {
                        assert!(matches!(clustering, ClusteringRestriction::Range { .. }));
                    }
                    (CompiledStatement::Delete { .. }, kind) => assert!(kind.is_delete()),
                    (other, kind) => panic!("{kind} compiled to {other}"),
                }
            }
        }
    }
}

//! Translated result rows.

use harrow_types::{Cd, Lts, Pd};

/// A result row expressed in descriptors.
///
/// Cells are aligned with the schema's static and regular columns. A `None`
/// descriptor is a null cell; a `None` lts means the cell has no write
/// time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSetRow {
    pub pd: Pd,
    /// `None` for a static-only row: the partition has statics but no live
    /// rows.
    pub cd: Option<Cd>,
    pub sds: Vec<Option<u64>>,
    pub vds: Vec<Option<u64>>,
    /// Write lts of each static cell.
    pub slts: Vec<Option<Lts>>,
    /// Write lts of each regular cell.
    pub lts: Vec<Option<Lts>>,
}

impl ResultSetRow {
    /// Largest lts among the regular cells.
    pub fn max_regular_lts(&self) -> Option<Lts> {
        self.lts.iter().flatten().copied().max()
    }

    /// Largest lts among all cells, static ones included.
    pub fn max_lts(&self) -> Option<Lts> {
        self.slts
            .iter()
            .flatten()
            .copied()
            .max()
            .max(self.max_regular_lts())
    }

    pub fn is_static_only(&self) -> bool {
        self.cd.is_none()
    }
}

/// Largest lts across rows, static cells included.
pub fn max_lts<'a>(rows: impl IntoIterator<Item = &'a ResultSetRow>) -> Option<Lts> {
    rows.into_iter().filter_map(ResultSetRow::max_lts).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(slts: Vec<Option<u64>>, lts: Vec<Option<u64>>) -> ResultSetRow {
        ResultSetRow {
            pd: Pd::new(1),
            cd: Some(Cd::new(2)),
            sds: slts.iter().map(|_| Some(0)).collect(),
            vds: lts.iter().map(|_| Some(0)).collect(),
            slts: slts.into_iter().map(|l| l.map(Lts::new)).collect(),
            lts: lts.into_iter().map(|l| l.map(Lts::new)).collect(),
        }
    }

    #[test]
    fn max_lts_includes_statics() {
        let row = row(vec![Some(9)], vec![Some(3), None, Some(7)]);
        assert_eq!(row.max_regular_lts(), Some(Lts::new(7)));
        assert_eq!(row.max_lts(), Some(Lts::new(9)));
    }

    #[test]
    fn max_lts_of_empty_cells_is_none() {
        assert_eq!(row(vec![], vec![None]).max_lts(), None);
        assert_eq!(max_lts(&[]), None);
    }

    #[test]
    fn max_lts_across_rows() {
        let rows = [
            row(vec![], vec![Some(3)]),
            row(vec![], vec![Some(7)]),
            row(vec![], vec![Some(2)]),
        ];
        assert_eq!(max_lts(&rows), Some(Lts::new(7)));
    }
}

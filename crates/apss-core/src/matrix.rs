//! Compressed sparse row storage for vector collections.

use crate::error::MatrixError;

#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    nrows: usize,
    ncols: usize,
    row_ptr: Vec<usize>,
    col_ind: Vec<u32>,
    values: Vec<f32>,
}

/// Borrowed view of one row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    pub cols: &'a [u32],
    pub vals: &'a [f32],
}

impl<'a> Row<'a> {
    pub fn len(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + 'a {
        self.cols
            .iter()
            .zip(self.vals.iter())
            .map(|(&c, &v)| (c as usize, v))
    }
}

impl SparseMatrix {
    pub fn new(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_ind: Vec<u32>,
        values: Vec<f32>,
    ) -> Result<Self, MatrixError> {
        if row_ptr.len() != nrows + 1 {
            return Err(MatrixError::Shape(format!(
                "row_ptr has {} entries, expected {}",
                row_ptr.len(),
                nrows + 1
            )));
        }
        if col_ind.len() != values.len() {
            return Err(MatrixError::Shape(format!(
                "{} column indices but {} values",
                col_ind.len(),
                values.len()
            )));
        }
        if row_ptr[0] != 0 || row_ptr[nrows] != col_ind.len() {
            return Err(MatrixError::Shape(
                "row_ptr does not span the stored entries".to_string(),
            ));
        }
        if row_ptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(MatrixError::Shape("row_ptr is not monotone".to_string()));
        }
        if let Some(&c) = col_ind.iter().find(|&&c| c as usize >= ncols) {
            return Err(MatrixError::Shape(format!(
                "column {} out of range for {} columns",
                c, ncols
            )));
        }
        Ok(Self {
            nrows,
            ncols,
            row_ptr,
            col_ind,
            values,
        })
    }

    pub fn empty(ncols: usize) -> Self {
        Self {
            nrows: 0,
            ncols,
            row_ptr: vec![0],
            col_ind: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn row(&self, i: usize) -> Row<'_> {
        let (start, end) = (self.row_ptr[i], self.row_ptr[i + 1]);
        Row {
            cols: &self.col_ind[start..end],
            vals: &self.values[start..end],
        }
    }

    /// Drops explicit zeros, then rows left without entries.
    pub fn compact(&mut self) {
        let mut row_ptr = Vec::with_capacity(self.nrows + 1);
        let mut col_ind = Vec::with_capacity(self.col_ind.len());
        let mut values = Vec::with_capacity(self.values.len());
        row_ptr.push(0);
        for i in 0..self.nrows {
            let before = values.len();
            for (c, v) in self.row(i).iter() {
                if v != 0.0 {
                    col_ind.push(c as u32);
                    values.push(v);
                }
            }
            if values.len() > before {
                row_ptr.push(values.len());
            }
        }
        self.nrows = row_ptr.len() - 1;
        self.row_ptr = row_ptr;
        self.col_ind = col_ind;
        self.values = values;
    }

    /// Scales every row to unit L2 norm. Rows with zero norm are left as is.
    pub fn normalize(&mut self) {
        for i in 0..self.nrows {
            let (start, end) = (self.row_ptr[i], self.row_ptr[i + 1]);
            let vals = &mut self.values[start..end];
            let norm = vals.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                vals.iter_mut().for_each(|v| *v /= norm);
            }
        }
    }

    /// Orders the entries inside each row by ascending column.
    pub fn sort_columns(&mut self) {
        let mut scratch: Vec<(u32, f32)> = Vec::new();
        for i in 0..self.nrows {
            let (start, end) = (self.row_ptr[i], self.row_ptr[i + 1]);
            scratch.clear();
            scratch.extend(
                self.col_ind[start..end]
                    .iter()
                    .copied()
                    .zip(self.values[start..end].iter().copied()),
            );
            scratch.sort_by_key(|&(c, _)| c);
            for (k, &(c, v)) in scratch.iter().enumerate() {
                self.col_ind[start + k] = c;
                self.values[start + k] = v;
            }
        }
    }

    /// Column-major copy of the matrix. Each output row is a posting list
    /// whose entries are in ascending source-row order.
    pub fn transpose(&self) -> SparseMatrix {
        let mut counts = vec![0usize; self.ncols + 1];
        for &c in &self.col_ind {
            counts[c as usize + 1] += 1;
        }
        for k in 1..counts.len() {
            counts[k] += counts[k - 1];
        }
        let row_ptr = counts.clone();
        let mut next = counts;
        let mut col_ind = vec![0u32; self.nnz()];
        let mut values = vec![0f32; self.nnz()];
        for i in 0..self.nrows {
            for (c, v) in self.row(i).iter() {
                let slot = next[c];
                col_ind[slot] = i as u32;
                values[slot] = v;
                next[c] += 1;
            }
        }
        SparseMatrix {
            nrows: self.ncols,
            ncols: self.nrows,
            row_ptr,
            col_ind,
            values,
        }
    }

    /// Largest absolute value seen in each column.
    pub fn column_max(&self) -> Vec<f32> {
        let mut out = vec![0f32; self.ncols];
        for (&c, &v) in self.col_ind.iter().zip(self.values.iter()) {
            let slot = &mut out[c as usize];
            if v.abs() > *slot {
                *slot = v.abs();
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SparseMatrix {
        // 0: (0, 3.0) (2, 4.0)
        // 1: (1, 0.0)
        // 2: (2, 2.0) (0, 1.0)
        SparseMatrix::new(
            3,
            3,
            vec![0, 2, 3, 5],
            vec![0, 2, 1, 2, 0],
            vec![3.0, 4.0, 0.0, 2.0, 1.0],
        )
        .expect("valid matrix")
    }

    #[test]
    fn new_rejects_out_of_range_column() {
        let err = SparseMatrix::new(1, 2, vec![0, 1], vec![5], vec![1.0])
            .expect_err("column 5 must be rejected");
        assert!(err.to_string().contains("out of range"), "{}", err);
    }

    #[test]
    fn compact_drops_zeros_and_empty_rows() {
        let mut m = sample();
        m.compact();
        assert_eq!(m.nrows(), 2);
        assert_eq!(m.nnz(), 4);
        assert_eq!(m.row(1).cols, &[2, 0]);
    }

    #[test]
    fn normalize_gives_unit_rows() {
        let mut m = sample();
        m.compact();
        m.normalize();
        assert_eq!(m.row(0).vals, &[0.6, 0.8]);
        let norm: f32 = m.row(1).vals.iter().map(|v| v * v).sum();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn sort_columns_orders_entries_within_rows() {
        let mut m = sample();
        m.sort_columns();
        assert_eq!(m.row(0).cols, &[0, 2]);
        assert_eq!(m.row(2).cols, &[0, 2]);
        assert_eq!(m.row(2).vals, &[1.0, 2.0]);
    }

    #[test]
    fn transpose_builds_posting_lists_in_row_order() {
        let mut m = sample();
        m.compact();
        let t = m.transpose();
        assert_eq!(t.nrows(), 3);
        assert_eq!(t.ncols(), 2);
        assert_eq!(t.row(0).cols, &[0, 1]);
        assert_eq!(t.row(0).vals, &[3.0, 1.0]);
        assert!(t.row(1).is_empty());
        assert_eq!(t.row(2).cols, &[0, 1]);
        assert_eq!(t.transpose(), m_sorted(&m));
    }

    fn m_sorted(m: &SparseMatrix) -> SparseMatrix {
        let mut s = m.clone();
        s.sort_columns();
        s
    }

    #[test]
    fn column_max_uses_absolute_values() {
        let m = SparseMatrix::new(2, 2, vec![0, 1, 2], vec![0, 0], vec![-5.0, 2.0])
            .expect("valid matrix");
        assert_eq!(m.column_max(), vec![5.0, 0.0]);
    }
}

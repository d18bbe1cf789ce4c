//! Reader for the CLUTO matrix text format.
//!
//! A sparse file starts with `nrows ncols nnz` and then holds one line per
//! row made of 1-based `column value` pairs. A dense file starts with
//! `nrows ncols` and holds `ncols` values per row. Lines starting with `%`
//! are comments.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::MatrixError;
use crate::matrix::SparseMatrix;

/// Upper bound on row offsets reserved from the header before any row is read.
const PREALLOC_ROWS: usize = 1 << 16;

pub fn load(path: &Path) -> Result<SparseMatrix, MatrixError> {
    let file = File::open(path).map_err(|source| MatrixError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read(BufReader::new(file)).map_err(|e| match e {
        MatrixError::Io { source, .. } => MatrixError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

pub fn read<R: BufRead>(reader: R) -> Result<SparseMatrix, MatrixError> {
    let mut lines = reader
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line))
        .filter(|(_, line)| {
            line.as_ref()
                .map(|l| !l.trim_start().starts_with('%'))
                .unwrap_or(true)
        });

    let (header_line, header) = match lines.next() {
        Some((n, line)) => (n, line.map_err(io_error)?),
        None => return Err(parse_error(1, "missing header")),
    };
    let dims = header
        .split_whitespace()
        .map(|tok| {
            tok.parse::<usize>()
                .map_err(|_| parse_error(header_line, format!("bad header token `{}`", tok)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let (nrows, ncols, expected_nnz) = match dims.as_slice() {
        [r, c, z] => (*r, *c, Some(*z)),
        [r, c] => (*r, *c, None),
        _ => {
            return Err(parse_error(
                header_line,
                "header must be `nrows ncols [nnz]`",
            ))
        }
    };

    // row and column ids are stored as u32
    let limit = u32::MAX as usize;
    if nrows > limit || ncols > limit {
        return Err(MatrixError::Shape(format!(
            "header declares {} x {}, ids must fit in 32 bits",
            nrows, ncols
        )));
    }
    let mut row_ptr = Vec::with_capacity(nrows.min(PREALLOC_ROWS) + 1);
    let mut col_ind = Vec::new();
    let mut values = Vec::new();
    row_ptr.push(0);

    for (line_no, line) in lines {
        let line = line.map_err(io_error)?;
        if row_ptr.len() > nrows {
            if line.trim().is_empty() {
                continue;
            }
            return Err(parse_error(
                line_no,
                format!("more than {} rows", nrows),
            ));
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if expected_nnz.is_some() {
            if tokens.len() % 2 != 0 {
                return Err(parse_error(line_no, "odd number of tokens in sparse row"));
            }
            for pair in tokens.chunks(2) {
                let col = pair[0]
                    .parse::<usize>()
                    .map_err(|_| parse_error(line_no, format!("bad column `{}`", pair[0])))?;
                if col == 0 || col > ncols {
                    return Err(parse_error(
                        line_no,
                        format!("column {} outside 1..={}", col, ncols),
                    ));
                }
                col_ind.push((col - 1) as u32);
                values.push(parse_value(line_no, pair[1])?);
            }
        } else {
            if tokens.len() != ncols {
                return Err(parse_error(
                    line_no,
                    format!("dense row has {} values, expected {}", tokens.len(), ncols),
                ));
            }
            for (col, tok) in tokens.iter().enumerate() {
                let v = parse_value(line_no, tok)?;
                if v != 0.0 {
                    col_ind.push(col as u32);
                    values.push(v);
                }
            }
        }
        row_ptr.push(values.len());
    }

    if row_ptr.len() - 1 != nrows {
        return Err(MatrixError::Shape(format!(
            "header declares {} rows, found {}",
            nrows,
            row_ptr.len() - 1
        )));
    }
    if let Some(nnz) = expected_nnz {
        if nnz != values.len() {
            return Err(MatrixError::Shape(format!(
                "header declares {} non-zeros, found {}",
                nnz,
                values.len()
            )));
        }
    }
    SparseMatrix::new(nrows, ncols, row_ptr, col_ind, values)
}

fn parse_value(line: usize, tok: &str) -> Result<f32, MatrixError> {
    tok.parse::<f32>()
        .map_err(|_| parse_error(line, format!("bad value `{}`", tok)))
}

fn parse_error(line: usize, message: impl Into<String>) -> MatrixError {
    MatrixError::Parse {
        line,
        message: message.into(),
    }
}

fn io_error(source: std::io::Error) -> MatrixError {
    MatrixError::Io {
        path: Default::default(),
        source,
    }
}

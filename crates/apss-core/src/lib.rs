//! Sparse matrix collaborators and reference all-pairs similarity search
//! algorithms used by the benchmark harness.

pub mod apss;
pub mod cluto;
pub mod counters;
pub mod error;
pub mod matrix;

pub use apss::{AllPairs, Apss, BruteForce, IdxJoin, Input, MmJoin, SimilarPair, Solution};
pub use counters::Counters;
pub use error::{AlgorithmError, MatrixError};
pub use matrix::{Row, SparseMatrix};

/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Vertex permutations and their application to edge lists.

use rayon::prelude::*;
use sync_cell_slice::SyncSlice;
use thiserror::Error;

use crate::graph::WeightedArc;

const RAYON_MIN_LEN: usize = 100000;

/// Errors raised by permutation validation and application.
///
/// These indicate an internal invariant violation (a non-bijective
/// mapping) or a mismatch between a permutation and the edges it is
/// applied to; they are never recovered from silently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermError {
    /// Two original ids were assigned the same new id.
    #[error("invalid permutation: new id {new_id} is assigned more than once (length {len})")]
    DuplicateNewId { new_id: usize, len: usize },

    /// A new id falls outside `[0, len)`.
    #[error("invalid permutation: new id {new_id} is out of range for length {len}")]
    NewIdOutOfRange { new_id: usize, len: usize },

    /// An edge endpoint falls outside the permuted vertex range.
    #[error("edge ({src}, {dst}) references a vertex outside the permuted range [0, {len})")]
    EdgeOutOfRange { src: usize, dst: usize, len: usize },
}

/// A bijection from original vertex ids to new vertex ids in `[0, N)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation(Box<[usize]>);

impl Permutation {
    /// Validates and wraps a candidate permutation.
    pub fn new(perm: Vec<usize>) -> Result<Self, PermError> {
        let len = perm.len();
        let mut seen = vec![false; len];
        for &new_id in &perm {
            if new_id >= len {
                return Err(PermError::NewIdOutOfRange { new_id, len });
            }
            if seen[new_id] {
                return Err(PermError::DuplicateNewId { new_id, len });
            }
            seen[new_id] = true;
        }
        Ok(Self(perm.into_boxed_slice()))
    }

    /// Wraps a permutation that is bijective by construction.
    pub(crate) fn from_trusted(perm: Vec<usize>) -> Self {
        debug_assert!(Self::new(perm.clone()).is_ok());
        Self(perm.into_boxed_slice())
    }

    /// The identity permutation over `[0, n)`.
    pub fn identity(n: usize) -> Self {
        Self((0..n).collect())
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the new id of an original vertex.
    #[inline(always)]
    pub fn get(&self, original: usize) -> usize {
        self.0[original]
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Computes the inverse permutation (new id -> original id) with a
    /// parallel scatter.
    pub fn invert(&self) -> Permutation {
        let mut inverse = vec![0; self.len()];
        let sync_slice = inverse.as_sync_slice();
        self.0
            .par_iter()
            .with_min_len(RAYON_MIN_LEN)
            .enumerate()
            .for_each(|(original, &new_id)| {
                // SAFETY: a bijection hits each slot exactly once, so
                // there are no data races.
                unsafe { sync_slice[new_id].set(original) };
            });
        Self(inverse.into_boxed_slice())
    }
}

impl From<Permutation> for Box<[usize]> {
    fn from(perm: Permutation) -> Self {
        perm.0
    }
}

/// Maps every edge endpoint through the permutation, preserving edge
/// order and weights.
///
/// Fails if an endpoint is outside the permuted vertex range. The
/// permutation itself is validated at construction, so a [`Permutation`]
/// value is always bijective here.
pub fn apply(edges: &[WeightedArc], perm: &Permutation) -> Result<Vec<WeightedArc>, PermError> {
    let len = perm.len();
    edges
        .iter()
        .map(|&(src, dst, weight)| {
            if src >= len || dst >= len {
                return Err(PermError::EdgeOutOfRange { src, dst, len });
            }
            Ok((perm.get(src), perm.get(dst), weight))
        })
        .collect()
}

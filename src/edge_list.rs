/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Plain-text edge lists: `src dst [weight]`, one edge per line, with an
//! optional header that is passed through verbatim.
//!
//! The weight column is kept only when every edge line carries one;
//! otherwise the output drops the column, mirroring the behavior of the
//! writers this format comes from. Malformed lines are rejected with
//! their line number; nothing is skipped silently.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::graph::WeightedArc;
use crate::perm::{PermError, Permutation};

/// Errors raised while parsing an edge-list file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// An edge line did not have 2 or 3 whitespace-separated fields.
    #[error("line {line}: expected 2 or 3 fields, found {found}")]
    FieldCount { line: usize, found: usize },

    /// A field could not be parsed as a non-negative integer.
    #[error("line {line}: could not parse {token:?} as a non-negative integer")]
    BadInteger { line: usize, token: String },
}

/// An edge list loaded from (or destined for) a text file.
#[derive(Debug)]
pub struct EdgeList {
    header: Vec<String>,
    edges: Vec<(usize, usize)>,
    /// One weight per edge when the input carried a complete weight
    /// column, empty or shorter otherwise.
    weights: Vec<u64>,
}

impl EdgeList {
    /// Reads an edge list, treating the first `header_lines` lines as an
    /// opaque header to preserve verbatim.
    pub fn read(path: impl AsRef<Path>, header_lines: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Could not open edge list {}", path.display()))?;
        let mut header = Vec::with_capacity(header_lines);
        let mut edges = Vec::new();
        let mut weights = Vec::new();

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line
                .with_context(|| format!("Could not read line {} of {}", index + 1, path.display()))?;
            if index < header_lines {
                header.push(line);
                continue;
            }
            let number = index + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [src, dst] => {
                    edges.push((parse_field(src, number)?, parse_field(dst, number)?));
                }
                [src, dst, weight] => {
                    edges.push((parse_field(src, number)?, parse_field(dst, number)?));
                    weights.push(parse_field(weight, number)? as u64);
                }
                fields => {
                    return Err(ParseError::FieldCount {
                        line: number,
                        found: fields.len(),
                    }
                    .into());
                }
            }
        }

        if !weights.is_empty() && weights.len() != edges.len() {
            log::warn!(
                "{}: only {} of {} edges carry a weight; the weight column will be dropped on output",
                path.display(),
                weights.len(),
                edges.len()
            );
        }

        Ok(Self {
            header,
            edges,
            weights,
        })
    }

    /// Builds an edge list to be written out, with an optional complete
    /// weight column.
    pub fn from_edges(
        header: Vec<String>,
        edges: Vec<(usize, usize)>,
        weights: Vec<u64>,
    ) -> Self {
        Self {
            header,
            edges,
            weights,
        }
    }

    #[inline(always)]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    #[inline(always)]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Whether every edge carries a weight, i.e. the weight column
    /// survives a round trip.
    #[inline(always)]
    pub fn has_weights(&self) -> bool {
        self.weights.len() == self.edges.len()
    }

    /// The number of vertices: one past the largest referenced id.
    pub fn num_nodes(&self) -> usize {
        self.edges
            .iter()
            .map(|&(src, dst)| src.max(dst) + 1)
            .max()
            .unwrap_or(0)
    }

    /// The edges as weighted arcs for graph construction; weight defaults
    /// to 1 unless the weight column is complete.
    pub fn arcs(&self) -> Vec<WeightedArc> {
        let complete = self.has_weights();
        self.edges
            .iter()
            .enumerate()
            .map(|(i, &(src, dst))| {
                let weight = if complete { self.weights[i] } else { 1 };
                (src, dst, weight)
            })
            .collect()
    }

    /// Returns a copy with every endpoint mapped through the permutation.
    /// Header and weights are carried over unchanged.
    pub fn permuted(&self, perm: &Permutation) -> Result<Self, PermError> {
        let len = perm.len();
        let edges = self
            .edges
            .iter()
            .map(|&(src, dst)| {
                if src >= len || dst >= len {
                    return Err(PermError::EdgeOutOfRange { src, dst, len });
                }
                Ok((perm.get(src), perm.get(dst)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            header: self.header.clone(),
            edges,
            weights: self.weights.clone(),
        })
    }

    /// Writes the edge list: header lines verbatim, then one edge per
    /// line, with the weight column only when it is complete.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Could not create edge list {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for line in &self.header {
            writeln!(writer, "{}", line)?;
        }
        let complete = self.has_weights();
        for (i, &(src, dst)) in self.edges.iter().enumerate() {
            if complete {
                writeln!(writer, "{} {} {}", src, dst, self.weights[i])?;
            } else {
                writeln!(writer, "{} {}", src, dst)?;
            }
        }
        writer
            .flush()
            .with_context(|| format!("Could not write edge list {}", path.display()))
    }
}

fn parse_field(token: &str, line: usize) -> Result<usize, ParseError> {
    token.parse().map_err(|_| ParseError::BadInteger {
        line,
        token: token.to_owned(),
    })
}

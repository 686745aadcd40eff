//! Classification of how two dense operands' dimension sets relate.
//!
//! A dense elementwise join iterates the primary operand's buffer linearly.
//! The classification decides how the secondary operand's flat index follows
//! along: identical shapes map one-to-one, a trailing (fastest-varying)
//! block wraps around, and a leading (slowest-varying) block advances every
//! `factor` cells. Anything else is complex and takes no fast path.

use crate::types::ValueType;

/// Which join operand drives iteration and owns the output element count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primary {
    Lhs,
    Rhs,
}

/// Relation between the primary and secondary dimension lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    /// Identical ordered dimension lists; one-to-one correspondence.
    Full,

    /// The secondary's dimensions are the trailing, fastest-varying block
    /// of the primary's; the secondary repeats as a whole block.
    Inner,

    /// The secondary's dimensions are the leading, slowest-varying block of
    /// the primary's; each secondary cell covers a run of primary cells.
    Outer,

    /// Neither; not eligible for any dense fast path.
    Complex,
}

/// How a specialized dense join iterates its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinLayout {
    /// The operand with the larger element count (LHS on ties).
    pub primary: Primary,

    /// Dimension overlap between primary and secondary.
    pub overlap: Overlap,

    /// Repetition factor: primary element count / secondary element count.
    ///
    /// Meaningful for `Full`/`Inner`/`Outer` only; 1 for `Complex`.
    pub factor: usize,
}

impl JoinLayout {
    /// Secondary flat index for primary flat index `i`.
    ///
    /// `secondary_count` is the secondary operand's element count
    /// (primary count / factor).
    pub fn secondary_index(&self, i: usize, secondary_count: usize) -> usize {
        match self.overlap {
            Overlap::Full => i,
            Overlap::Inner => i % secondary_count,
            Overlap::Outer => i / self.factor,
            Overlap::Complex => panic!("complex overlap has no linear secondary index"),
        }
    }
}

/// Classify how two dense operand types relate for an elementwise join.
///
/// The operand with the larger (or equal) dense element count is primary.
/// Dimension lists are compared in declared (name-sorted, stride) order,
/// matching names and sizes.
pub fn classify_dense_join(lhs: &ValueType, rhs: &ValueType) -> JoinLayout {
    debug_assert!(!lhs.has_mapped() && !rhs.has_mapped());

    let primary = if lhs.dense_count() >= rhs.dense_count() {
        Primary::Lhs
    } else {
        Primary::Rhs
    };
    let (pri, sec) = match primary {
        Primary::Lhs => (lhs, rhs),
        Primary::Rhs => (rhs, lhs),
    };

    let pri_dims = pri.dimensions();
    let sec_dims = sec.dimensions();
    if pri_dims == sec_dims {
        return JoinLayout {
            primary,
            overlap: Overlap::Full,
            factor: 1,
        };
    }

    if sec_dims.len() >= pri_dims.len() {
        // More dimensions than the primary (or equal rank with different
        // names/sizes): cannot be a contiguous block of it.
        return JoinLayout {
            primary,
            overlap: Overlap::Complex,
            factor: 1,
        };
    }

    let factor = pri.dense_count() / sec.dense_count();
    let extra = pri_dims.len() - sec_dims.len();
    if &pri_dims[extra..] == sec_dims {
        return JoinLayout {
            primary,
            overlap: Overlap::Inner,
            factor,
        };
    }
    if &pri_dims[..sec_dims.len()] == sec_dims {
        return JoinLayout {
            primary,
            overlap: Overlap::Outer,
            factor,
        };
    }
    JoinLayout {
        primary,
        overlap: Overlap::Complex,
        factor: 1,
    }
}

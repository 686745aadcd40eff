//! Run-time values: contiguous numeric buffers tagged with a value type.

use crate::types::{CellType, ValueType};

use num_traits::{AsPrimitive, Float};

/// Storage scalar of one cell width.
///
/// Both supported widths widen losslessly to `f64`, which is the arithmetic
/// type of every scalar kernel. The trait also provides typed views into a
/// [`CellBuffer`], so kernels monomorphized per cell type never dispatch on
/// the buffer variant per element.
pub trait CellScalar: Float + AsPrimitive<f64> + Send + Sync + 'static {
    /// Declared cell type tag for this storage width.
    const CELL_TYPE: CellType;

    /// Narrow an `f64` kernel result back to this storage width.
    fn from_f64(value: f64) -> Self;

    /// View a buffer's cells at this width, if the variant matches.
    fn cells(buffer: &CellBuffer) -> Option<&[Self]>;

    /// Mutable view of a buffer's cells at this width.
    fn cells_mut(buffer: &mut CellBuffer) -> Option<&mut [Self]>;

    /// Wrap owned cells into a buffer of the matching variant.
    fn into_buffer(cells: Vec<Self>) -> CellBuffer;
}

impl CellScalar for f64 {
    const CELL_TYPE: CellType = CellType::F64;

    fn from_f64(value: f64) -> Self {
        value
    }

    fn cells(buffer: &CellBuffer) -> Option<&[Self]> {
        match buffer {
            CellBuffer::F64(cells) => Some(cells),
            CellBuffer::F32(_) => None,
        }
    }

    fn cells_mut(buffer: &mut CellBuffer) -> Option<&mut [Self]> {
        match buffer {
            CellBuffer::F64(cells) => Some(cells),
            CellBuffer::F32(_) => None,
        }
    }

    fn into_buffer(cells: Vec<Self>) -> CellBuffer {
        CellBuffer::F64(cells)
    }
}

impl CellScalar for f32 {
    const CELL_TYPE: CellType = CellType::F32;

    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn cells(buffer: &CellBuffer) -> Option<&[Self]> {
        match buffer {
            CellBuffer::F32(cells) => Some(cells),
            CellBuffer::F64(_) => None,
        }
    }

    fn cells_mut(buffer: &mut CellBuffer) -> Option<&mut [Self]> {
        match buffer {
            CellBuffer::F32(cells) => Some(cells),
            CellBuffer::F64(_) => None,
        }
    }

    fn into_buffer(cells: Vec<Self>) -> CellBuffer {
        CellBuffer::F32(cells)
    }
}

/// Contiguous cell storage for one dense value.
#[derive(Debug, Clone, PartialEq)]
pub enum CellBuffer {
    F64(Vec<f64>),
    F32(Vec<f32>),
}

impl CellBuffer {
    /// Allocate a zero-filled buffer of the given width and length.
    pub fn zeros(cell_type: CellType, len: usize) -> Self {
        match cell_type {
            CellType::F64 => CellBuffer::F64(vec![0.0; len]),
            CellType::F32 => CellBuffer::F32(vec![0.0; len]),
        }
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        match self {
            CellBuffer::F64(cells) => cells.len(),
            CellBuffer::F32(cells) => cells.len(),
        }
    }

    /// Check if the buffer holds no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The cell type of this buffer.
    pub fn cell_type(&self) -> CellType {
        match self {
            CellBuffer::F64(_) => CellType::F64,
            CellBuffer::F32(_) => CellType::F32,
        }
    }

    /// Read one cell, widened to `f64`.
    ///
    /// Used by the generic (non-specialized) evaluation paths, which
    /// dispatch on the buffer variant per element.
    pub fn get(&self, index: usize) -> f64 {
        match self {
            CellBuffer::F64(cells) => cells[index],
            CellBuffer::F32(cells) => f64::from(cells[index]),
        }
    }

    /// Write one cell, narrowing from `f64`.
    pub fn set(&mut self, index: usize, value: f64) {
        match self {
            CellBuffer::F64(cells) => cells[index] = value,
            CellBuffer::F32(cells) => cells[index] = value as f32,
        }
    }
}

/// A dense run-time value: a value type plus its backing buffer.
///
/// Only fully dense values are representable here; sparse and mixed values
/// live in an external storage engine. Whether a value may be overwritten
/// in place is not a property of the value itself but of the expression
/// tree's parameter declarations (the evaluation ownership contract).
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    ty: ValueType,
    cells: CellBuffer,
}

impl Value {
    /// Create a value from a type and a matching buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer's length or cell type disagrees with the type.
    pub fn new(ty: ValueType, cells: CellBuffer) -> Self {
        assert_eq!(
            cells.len(),
            ty.dense_count(),
            "buffer holds {} cells but type {} needs {}",
            cells.len(),
            ty,
            ty.dense_count()
        );
        assert_eq!(
            cells.cell_type(),
            ty.cell_type(),
            "buffer cell type {} does not match type {}",
            cells.cell_type(),
            ty
        );
        Self { ty, cells }
    }

    /// Create a scalar (double-precision) value.
    pub fn scalar(value: f64) -> Self {
        Self {
            ty: ValueType::scalar(),
            cells: CellBuffer::F64(vec![value]),
        }
    }

    /// Get the value type.
    pub fn ty(&self) -> &ValueType {
        &self.ty
    }

    /// Get the backing buffer.
    pub fn cells(&self) -> &CellBuffer {
        &self.cells
    }

    /// Get the backing buffer mutably.
    pub fn cells_mut(&mut self) -> &mut CellBuffer {
        &mut self.cells
    }

    /// Read a scalar value, if this is one.
    pub fn as_f64(&self) -> Option<f64> {
        if self.ty.is_scalar() {
            Some(self.cells.get(0))
        } else {
            None
        }
    }
}

//! Cell types and value types for dense tensor expressions.
//!
//! A `ValueType` pairs a cell type with an ordered dimension list. Dimensions
//! are kept sorted by name, and that declared order is also the stride order
//! of the backing buffer: the first dimension varies slowest (row-major).

use crate::{Error, Result};

use std::fmt;

/// Numeric storage width of tensor cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellType {
    /// Double-precision cells (the default, and the only scalar type).
    F64,

    /// Single-precision cells.
    F32,
}

impl CellType {
    /// Promotion rule for join results.
    ///
    /// The result is single-precision only when both operands are; any
    /// double-precision operand promotes the result to double.
    pub fn unify(lhs: CellType, rhs: CellType) -> CellType {
        match (lhs, rhs) {
            (CellType::F32, CellType::F32) => CellType::F32,
            _ => CellType::F64,
        }
    }

    /// Storage size of one cell in bytes.
    pub fn size(&self) -> usize {
        match self {
            CellType::F64 => 8,
            CellType::F32 => 4,
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellType::F64 => write!(f, "double"),
            CellType::F32 => write!(f, "float"),
        }
    }
}

/// Size descriptor of one dimension.
///
/// Dense dimensions carry a definite size; mapped dimensions are identified
/// by labels in an external storage engine and are excluded from every fast
/// path in this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionSize {
    /// Fully indexed dimension with a definite size.
    Dense(usize),

    /// Label-addressed dimension (external storage, no fast path).
    Mapped,
}

/// A single named dimension of a value type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    /// Dimension name (unique within a type).
    pub name: String,

    /// Dense size or mapped marker.
    pub size: DimensionSize,
}

impl Dimension {
    /// Create a dense dimension.
    pub fn dense(name: &str, size: usize) -> Self {
        Self {
            name: name.to_string(),
            size: DimensionSize::Dense(size),
        }
    }

    /// Create a mapped dimension.
    pub fn mapped(name: &str) -> Self {
        Self {
            name: name.to_string(),
            size: DimensionSize::Mapped,
        }
    }

    /// Check if this dimension is dense.
    pub fn is_dense(&self) -> bool {
        matches!(self.size, DimensionSize::Dense(_))
    }

    /// Get the dense size, if any.
    pub fn dense_size(&self) -> Option<usize> {
        match self.size {
            DimensionSize::Dense(size) => Some(size),
            DimensionSize::Mapped => None,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.size {
            DimensionSize::Dense(size) => write!(f, "{}[{}]", self.name, size),
            DimensionSize::Mapped => write!(f, "{}{{}}", self.name),
        }
    }
}

/// Declared result type of an expression node or run-time value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueType {
    cell_type: CellType,
    dimensions: Vec<Dimension>,
}

impl ValueType {
    /// The scalar type: no dimensions, double-precision.
    pub fn scalar() -> Self {
        Self {
            cell_type: CellType::F64,
            dimensions: Vec::new(),
        }
    }

    /// Create a tensor type from a cell type and a dimension list.
    ///
    /// Dimensions are sorted by name; the sorted order is the stride order
    /// of any buffer carrying this type.
    ///
    /// # Errors
    ///
    /// Returns an error for duplicate dimension names, zero-sized dense
    /// dimensions, or an empty dimension list (use [`ValueType::scalar`]).
    pub fn tensor(cell_type: CellType, mut dimensions: Vec<Dimension>) -> Result<Self> {
        if dimensions.is_empty() {
            return Err(Error::InvalidType(
                "tensor type needs at least one dimension".to_string(),
            ));
        }
        dimensions.sort_by(|a, b| a.name.cmp(&b.name));
        for pair in dimensions.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(Error::InvalidType(format!(
                    "duplicate dimension name '{}'",
                    pair[0].name
                )));
            }
        }
        if dimensions.iter().any(|d| d.dense_size() == Some(0)) {
            return Err(Error::InvalidType(
                "dense dimensions must have nonzero size".to_string(),
            ));
        }
        Ok(Self {
            cell_type,
            dimensions,
        })
    }

    /// Get the cell type.
    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    /// Get the ordered dimension list (sorted by name, stride order).
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Check if this is the scalar type.
    pub fn is_scalar(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Check if this type is a fully dense tensor (at least one dimension,
    /// all of them dense).
    pub fn is_dense(&self) -> bool {
        !self.dimensions.is_empty() && self.dimensions.iter().all(Dimension::is_dense)
    }

    /// Check if any dimension is mapped.
    pub fn has_mapped(&self) -> bool {
        self.dimensions.iter().any(|d| !d.is_dense())
    }

    /// Total dense element count: the product of all dense dimension sizes.
    ///
    /// Scalars count as one element; mapped dimensions contribute nothing.
    pub fn dense_count(&self) -> usize {
        self.dimensions
            .iter()
            .filter_map(Dimension::dense_size)
            .product()
    }

    /// Compute the result type of joining two operand types.
    ///
    /// The dimension list is the name-sorted union of both operands'
    /// dimensions; shared names must agree on size. The cell type follows
    /// [`CellType::unify`], except that a scalar operand does not take part
    /// in promotion (the tensor side's cell type wins).
    ///
    /// # Errors
    ///
    /// Returns an error if a shared dimension name disagrees on size.
    pub fn join(lhs: &ValueType, rhs: &ValueType) -> Result<ValueType> {
        if lhs.is_scalar() && rhs.is_scalar() {
            return Ok(ValueType::scalar());
        }
        if lhs.is_scalar() {
            return Ok(rhs.clone());
        }
        if rhs.is_scalar() {
            return Ok(lhs.clone());
        }

        let mut dimensions = Vec::with_capacity(lhs.dimensions.len() + rhs.dimensions.len());
        let mut l = lhs.dimensions.iter().peekable();
        let mut r = rhs.dimensions.iter().peekable();
        loop {
            match (l.peek(), r.peek()) {
                (Some(a), Some(b)) if a.name == b.name => {
                    if a.size != b.size {
                        return Err(Error::IncompatibleJoin(format!(
                            "dimension '{}' has conflicting sizes: {} vs {}",
                            a.name, a, b
                        )));
                    }
                    dimensions.push((*a).clone());
                    l.next();
                    r.next();
                }
                (Some(a), Some(b)) if a.name < b.name => {
                    dimensions.push((*a).clone());
                    l.next();
                }
                (Some(_), Some(b)) => {
                    dimensions.push((*b).clone());
                    r.next();
                }
                (Some(a), None) => {
                    dimensions.push((*a).clone());
                    l.next();
                }
                (None, Some(b)) => {
                    dimensions.push((*b).clone());
                    r.next();
                }
                (None, None) => break,
            }
        }

        Ok(ValueType {
            cell_type: CellType::unify(lhs.cell_type, rhs.cell_type),
            dimensions,
        })
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_scalar() {
            return write!(f, "double");
        }
        match self.cell_type {
            CellType::F64 => write!(f, "tensor(")?,
            CellType::F32 => write!(f, "tensor<float>(")?,
        }
        for (i, dim) in self.dimensions.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{dim}")?;
        }
        write!(f, ")")
    }
}

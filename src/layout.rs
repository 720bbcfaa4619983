//! Size and alignment of argument types, per traced process ABI.

use crate::process::TracedProcess;

/// Shape of a primitive or composite type used to interpret call arguments.
///
/// Sizes are not stored here: `long`, pointer, and `double` layouts depend on the
/// personality of the process they are read from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ArgType {
    Void,
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Pointer(Box<ArgType>),
    Float,
    Double,
    Array { elem: Box<ArgType>, len: usize },
    Struct { fields: Vec<ArgType> },
}

#[derive(thiserror::Error, Clone, Copy, Debug, Eq, PartialEq)]
pub enum LayoutError {
    #[error("Layout is undefined without a traced process")]
    NoProcess,

    /// The caller must compute the layout from the element or field layouts.
    #[error("Layout of a composite type depends on its members")]
    Composite,
}

/// Size in bytes of `ty`, as laid out in `process`.
pub fn size_of<H>(process: Option<&TracedProcess<H>>, ty: &ArgType) -> Result<usize, LayoutError> {
    let process = process.ok_or(LayoutError::NoProcess)?;
    let word = word_size(process);

    let size = match ty {
        ArgType::Void => 0,
        ArgType::Char | ArgType::UChar => 1,
        ArgType::Short | ArgType::UShort => 2,
        ArgType::Int | ArgType::UInt => 4,
        ArgType::Long | ArgType::ULong | ArgType::Pointer(_) => word,
        ArgType::Float => 4,
        ArgType::Double => 8,
        ArgType::Array { .. } | ArgType::Struct { .. } => {
            return Err(LayoutError::Composite);
        },
    };

    Ok(size)
}

/// Alignment in bytes of `ty`, as laid out in `process`.
///
/// # Panics
///
/// Panics if `ty` is [`ArgType::Void`], which has no alignment. This is a caller
/// bug. Callers must not recover from it; build with `panic = "abort"` to terminate
/// on the spot instead of unwinding.
pub fn align_of<H>(process: Option<&TracedProcess<H>>, ty: &ArgType) -> Result<usize, LayoutError> {
    let process = process.ok_or(LayoutError::NoProcess)?;
    let word = word_size(process);

    let align = match ty {
        ArgType::Void => unreachable!("alignment of `void` is undefined"),
        ArgType::Char | ArgType::UChar => 1,
        ArgType::Short | ArgType::UShort => 2,
        ArgType::Int | ArgType::UInt => 4,
        ArgType::Long | ArgType::ULong | ArgType::Pointer(_) => word,
        ArgType::Float => 4,
        // i386 aligns `double` to 4 bytes.
        ArgType::Double => word,
        ArgType::Array { .. } | ArgType::Struct { .. } => {
            return Err(LayoutError::Composite);
        },
    };

    Ok(align)
}

fn word_size<H>(process: &TracedProcess<H>) -> usize {
    if process.personality().is_64bit() {
        8
    } else {
        4
    }
}

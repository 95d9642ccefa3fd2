//! Typed bind parameter descriptors.

use std::fmt;

/// Column type of a bind parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindType {
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// 32-bit IEEE float.
    Float,
    /// 64-bit IEEE float.
    Double,
    /// UTF-8 text without terminator.
    String,
    /// Opaque binary data.
    Blob,
    /// Large binary data.
    Image,
}

impl BindType {
    /// Canonical lowercase name, used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Blob => "blob",
            Self::Image => "image",
        }
    }

    /// Encoded width for fixed-size types; `None` for variable-length ones.
    #[must_use]
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Int8 => Some(1),
            Self::Int16 => Some(2),
            Self::Int32 | Self::Float => Some(4),
            Self::Int64 | Self::Double => Some(8),
            Self::String | Self::Blob | Self::Image => None,
        }
    }
}

impl fmt::Display for BindType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// One parameter of a query: a typed window into the query's buffer.
///
/// `offset` is relative to the owning query's buffer. Zero-length parameters
/// (SQL `NULL`) never reference the buffer and always carry offset `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindParam {
    bind_type: BindType,
    offset: usize,
    len: usize,
}

impl BindParam {
    pub(crate) const fn new(bind_type: BindType, offset: usize, len: usize) -> Self {
        Self {
            bind_type,
            offset,
            len,
        }
    }

    pub(crate) const fn null(bind_type: BindType) -> Self {
        Self::new(bind_type, 0, 0)
    }

    /// Declared column type.
    #[must_use]
    pub const fn bind_type(&self) -> BindType {
        self.bind_type
    }

    /// Start of the encoded value within the query buffer.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Encoded length in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for `NULL` parameters.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(BindType::Int8, Some(1))]
    #[case(BindType::Int16, Some(2))]
    #[case(BindType::Float, Some(4))]
    #[case(BindType::Int64, Some(8))]
    #[case(BindType::String, None)]
    #[case(BindType::Image, None)]
    fn reports_fixed_widths(#[case] bind_type: BindType, #[case] width: Option<usize>) {
        assert_eq!(bind_type.fixed_width(), width);
    }

    #[test]
    fn null_params_do_not_reference_the_buffer() {
        let param = BindParam::null(BindType::Blob);
        assert!(param.is_null());
        assert_eq!(param.offset(), 0);
    }
}

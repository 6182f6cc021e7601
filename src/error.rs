use std::io;

#[derive(thiserror::Error, Debug)]
pub enum KKVError {
    #[error("{0}")]
    IOError(#[from] io::Error),

    /// The value stream grew past what a normal skey node can address.
    #[error("value chunk offset {chunk_offset} exceeds max {max}, table too large")]
    ValueOffsetOutOfRange { chunk_offset: u64, max: u64 },

    #[error("invalid sort field `{field}`: {reason}")]
    InvalidSortField { field: String, reason: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("corrupted data: {0}")]
    Corruption(String),

    #[error("{0}")]
    Custom(String),
}

impl PartialEq for KKVError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::IOError(e1), Self::IOError(e2)) => e1.kind() == e2.kind(),
            (
                Self::ValueOffsetOutOfRange {
                    chunk_offset: o1,
                    max: m1,
                },
                Self::ValueOffsetOutOfRange {
                    chunk_offset: o2,
                    max: m2,
                },
            ) => o1 == o2 && m1 == m2,
            (
                Self::InvalidSortField { field: f1, .. },
                Self::InvalidSortField { field: f2, .. },
            ) => f1 == f2,
            (Self::InvalidConfig(s1), Self::InvalidConfig(s2))
            | (Self::Corruption(s1), Self::Corruption(s2))
            | (Self::Custom(s1), Self::Custom(s2)) => s1.eq(s2),
            _ => false,
        }
    }
}

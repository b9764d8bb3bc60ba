//! Negative return codes of the compatibility API.
//!
//! Mutating operations report a non-negative count of affected rows or
//! fields; failures are folded into these negative codes only at the outer
//! API boundary. Internally every operation returns a typed `Result`.

/// Error classes that a mutating operation can report as a sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sentinel {
    /// A required argument was missing or empty, or the target table does
    /// not exist.
    InvalidArgument,
    /// The table was missing and creating it implicitly failed.
    AutoCreateFailed,
    /// The value could not be turned into a field map.
    UnsupportedShape,
    /// Backend, codec or other internal failure.
    Internal,
}

impl Sentinel {
    pub const fn code(self) -> i64 {
        match self {
            Sentinel::InvalidArgument => -1,
            Sentinel::AutoCreateFailed => -2,
            Sentinel::UnsupportedShape => -8,
            Sentinel::Internal => -9,
        }
    }

    /// Map a code back to its class. Non-negative codes are counts.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(Sentinel::InvalidArgument),
            -2 => Some(Sentinel::AutoCreateFailed),
            -8 => Some(Sentinel::UnsupportedShape),
            -9 => Some(Sentinel::Internal),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_contract() {
        assert_eq!(Sentinel::InvalidArgument.code(), -1);
        assert_eq!(Sentinel::AutoCreateFailed.code(), -2);
        assert_eq!(Sentinel::UnsupportedShape.code(), -8);
        assert_eq!(Sentinel::Internal.code(), -9);
    }

    #[test]
    fn counts_are_not_sentinels() {
        assert_eq!(Sentinel::from_code(0), None);
        assert_eq!(Sentinel::from_code(3), None);
        assert_eq!(Sentinel::from_code(-2), Some(Sentinel::AutoCreateFailed));
    }
}

use crate::error::{Error, ErrorKind};
use std::fmt;

/// Number of parallel download jobs, always within [`Jobs::MIN`]..=[`Jobs::MAX`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct Jobs(u32);

impl Jobs {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 20;

    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl Default for Jobs {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

impl TryFrom<u32> for Jobs {
    type Error = Error;
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            exn::bail!(ErrorKind::JobsOutOfRange(value));
        }
        Ok(Self(value))
    }
}

impl fmt::Display for Jobs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//! Table-driven non-linear byte hash for the registry buckets.
//!
//! Each input byte selects one of 256 pseudo-random words, which is folded
//! into a rotating accumulator. Spreads keys well enough for bucket
//! selection; it is not meant to resist adversarial input.

use ring::rand::{SecureRandom, SystemRandom};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::error::{AuditError, Result};

/// Hash seeded with a random 256-entry substitution table.
#[derive(Clone)]
pub struct TableHasher {
    table: [u32; 256],
}

impl TableHasher {
    /// Seed the table from the system random source. Done once per run.
    pub fn seeded() -> Result<Self> {
        let mut raw = [0u8; 256 * 4];
        SystemRandom::new()
            .fill(&mut raw)
            .map_err(|_| AuditError::Random)?;

        let mut table = [0u32; 256];
        for (slot, chunk) in table.iter_mut().zip(raw.chunks_exact(4)) {
            *slot = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(Self { table })
    }

    /// Use a fixed table.
    #[must_use]
    pub const fn from_table(table: [u32; 256]) -> Self {
        Self { table }
    }

    /// Hash an arbitrary byte string.
    #[must_use]
    pub fn hash_bytes(&self, bytes: &[u8]) -> u32 {
        bytes
            .iter()
            .fold(0u32, |acc, &b| acc.rotate_left(1) ^ self.table[usize::from(b)])
    }

    /// Hash the raw bytes of a path.
    #[must_use]
    pub fn hash_path(&self, path: &Path) -> u32 {
        self.hash_bytes(path.as_os_str().as_bytes())
    }
}

impl std::fmt::Debug for TableHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableHasher").finish_non_exhaustive()
    }
}

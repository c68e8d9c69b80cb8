use remap_core::{Error, Result};

/// Tuning knobs for one reindex evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexConfig {
    /// Outputs with at least this many elements are resolved in parallel.
    pub parallel_threshold: usize,
    /// Number of output positions per rayon work unit.
    pub chunk_size: usize,
    /// Refuse outputs larger than this many elements.
    pub max_output_elems: Option<usize>,
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 1 << 15,
            chunk_size: 4096,
            max_output_elems: None,
        }
    }
}

impl ReindexConfig {
    pub fn parallel_threshold(mut self, n: usize) -> Self {
        self.parallel_threshold = n;
        self
    }

    pub fn chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n;
        self
    }

    pub fn max_output_elems(mut self, n: usize) -> Self {
        self.max_output_elems = Some(n);
        self
    }

    /// Always resolve sequentially.
    pub fn sequential(self) -> Self {
        self.parallel_threshold(usize::MAX)
    }

    /// Whether an output of `elems` elements should be resolved in parallel.
    pub fn use_parallel(&self, elems: usize) -> bool {
        elems >= self.parallel_threshold && elems > self.chunk_size
    }

    pub(crate) fn validate(&self, elems: usize) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::invalid_argument("reindex", "chunk_size must be > 0"));
        }
        if let Some(limit) = self.max_output_elems {
            if elems > limit {
                return Err(Error::invalid_argument(
                    "reindex",
                    format!("output has {elems} elements, limit is {limit}"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = ReindexConfig::default();
        assert_eq!(c.parallel_threshold, 32768);
        assert_eq!(c.chunk_size, 4096);
        assert_eq!(c.max_output_elems, None);
        assert!(!c.use_parallel(100));
        assert!(c.use_parallel(40_000));
    }

    #[test]
    fn test_builders() {
        let c = ReindexConfig::default()
            .parallel_threshold(10)
            .chunk_size(4)
            .max_output_elems(100);
        assert!(c.use_parallel(10));
        assert!(c.validate(100).is_ok());
        assert!(c.validate(101).is_err());
        assert!(!ReindexConfig::default().sequential().use_parallel(usize::MAX - 1));
    }

    #[test]
    fn test_zero_chunk_rejected() {
        let c = ReindexConfig::default().chunk_size(0);
        assert!(matches!(c.validate(1), Err(Error::InvalidArgument { .. })));
    }
}

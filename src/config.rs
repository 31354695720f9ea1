//! Configuration module

use crate::defaults::*;

/// HNSW index parameters
#[derive(Clone, Debug)]
pub struct IndexParams {
    /// Target degree per node at levels >= 1 (M parameter)
    pub m: usize,
    /// Degree cap at level 0 (usually 2*M)
    pub m_max0: usize,
    /// Beam width during construction
    pub ef_construction: usize,
    /// Default search beam width (can be overridden per query)
    pub ef_search: usize,
    /// Initial capacity hint for the node arena
    pub import_limit: usize,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            m: DEFAULT_M,
            m_max0: DEFAULT_M_MAX0,
            ef_construction: DEFAULT_EF_CONSTRUCTION,
            ef_search: DEFAULT_EF_SEARCH,
            import_limit: DEFAULT_IMPORT_LIMIT,
        }
    }
}

impl IndexParams {
    /// Create with a custom M parameter; m_max0 follows as 2*M
    pub fn with_m(m: usize) -> Self {
        Self {
            m,
            m_max0: m * 2,
            ..Self::default()
        }
    }

    /// Level-assignment normalizer, `1 / ln(m)`
    pub fn level_norm(&self) -> f64 {
        1.0 / (self.m as f64).ln()
    }

    /// Degree cap for a given level
    pub fn max_connections(&self, level: usize) -> usize {
        if level == 0 {
            self.m_max0
        } else {
            self.m
        }
    }
}

/// Top-level configuration, loaded from the environment
#[derive(Clone, Debug)]
pub struct Config {
    pub index: IndexParams,
    /// Commit log segment rotation threshold in bytes
    pub segment_max_bytes: u64,
}

impl Config {
    /// Load config from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
        where
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            match std::env::var(name) {
                Ok(v) => v
                    .parse()
                    .map_err(|e| anyhow::anyhow!("invalid {name}: {e}")),
                Err(_) => Ok(default),
            }
        }

        let m = parse_var("GOSSAMER_M", DEFAULT_M)?;
        let index = IndexParams {
            m,
            m_max0: parse_var("GOSSAMER_M_MAX0", m * 2)?,
            ef_construction: parse_var("GOSSAMER_EF_CONSTRUCTION", DEFAULT_EF_CONSTRUCTION)?,
            ef_search: parse_var("GOSSAMER_EF_SEARCH", DEFAULT_EF_SEARCH)?,
            import_limit: parse_var("GOSSAMER_IMPORT_LIMIT", DEFAULT_IMPORT_LIMIT)?,
        };

        Ok(Self {
            index,
            segment_max_bytes: parse_var("GOSSAMER_SEGMENT_MAX_BYTES", DEFAULT_SEGMENT_MAX_BYTES)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index: IndexParams::default(),
            segment_max_bytes: DEFAULT_SEGMENT_MAX_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_with_m() {
        let params = IndexParams::with_m(32);
        assert_eq!(params.m, 32);
        assert_eq!(params.m_max0, 64);
        assert_eq!(params.max_connections(0), 64);
        assert_eq!(params.max_connections(1), 32);
        assert_eq!(params.max_connections(5), 32);
    }

    #[test]
    fn test_level_norm() {
        let params = IndexParams::with_m(16);
        let expected = 1.0 / (16.0f64).ln();
        assert!((params.level_norm() - expected).abs() < 1e-12);
    }
}

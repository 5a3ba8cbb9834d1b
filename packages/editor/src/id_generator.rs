use crc32fast::Hasher;

/// Generate a short seed from a document key using CRC32
pub fn get_document_seed(key: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(format!("sop://{}", key).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sequential ID generator for rows and blocks within a document
#[derive(Debug, Clone)]
pub struct IdGenerator {
    seed: String,
    count: u64,
}

impl IdGenerator {
    /// Generator seeded from a document key (remote id, or a fixed key for unsaved docs)
    pub fn new(key: &str) -> Self {
        Self {
            seed: get_document_seed(key),
            count: 0,
        }
    }

    pub fn from_seed(seed: String) -> Self {
        Self { seed, count: 0 }
    }

    /// Generate next sequential ID
    pub fn new_id(&mut self) -> String {
        self.count = self.count.saturating_add(1);
        format!("{}-{}", self.seed, self.count)
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Skip past ids already present in a loaded document so new ids never collide.
    /// Suffixes too large to step past are left alone; they cannot collide with minted ids.
    pub fn observe<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        let prefix = format!("{}-", self.seed);
        for id in ids {
            if let Some(n) = id
                .strip_prefix(&prefix)
                .and_then(|suffix| suffix.parse::<u64>().ok())
                .filter(|n| *n < u64::MAX)
            {
                self.count = self.count.max(n);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_seed_is_stable() {
        let id1 = get_document_seed("doc-42");
        let id2 = get_document_seed("doc-42");
        assert_eq!(id1, id2);
        assert_ne!(id1, get_document_seed("doc-43"));
    }

    #[test]
    fn test_sequential_ids() {
        let mut gen = IdGenerator::new("unsaved");

        let id1 = gen.new_id();
        let id2 = gen.new_id();

        assert!(id1.ends_with("-1"));
        assert!(id2.ends_with("-2"));
        assert!(id1.starts_with(gen.seed()));
    }

    #[test]
    fn test_observe_skips_existing_ids() {
        let mut gen = IdGenerator::from_seed("abc".to_string());
        gen.observe(["abc-7", "abc-3", "other-99", "abc-x", "row-title"]);
        assert_eq!(gen.new_id(), "abc-8");
    }

    #[test]
    fn test_observe_huge_suffixes() {
        let mut gen = IdGenerator::from_seed("abc".to_string());
        gen.observe(["abc-4294967295"]);
        assert_eq!(gen.new_id(), "abc-4294967296");

        gen.observe(["abc-18446744073709551615", "abc-99999999999999999999"]);
        assert_eq!(gen.new_id(), "abc-4294967297");
    }
}

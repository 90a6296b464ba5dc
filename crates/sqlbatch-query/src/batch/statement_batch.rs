//! Bounded buffer of statements awaiting execution

/// Ordered statements collected for the next flush
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementBatch {
    statements: Vec<String>,
    capacity: usize,
}

impl StatementBatch {
    /// Create an empty batch that is full after `capacity` statements
    pub fn new(capacity: usize) -> Self {
        Self {
            statements: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a statement, returning true once the batch is full
    pub fn push(&mut self, statement: impl Into<String>) -> bool {
        self.statements.push(statement.into());
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.statements.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Remove and return the buffered statements, leaving the batch empty
    pub fn take(&mut self) -> Vec<String> {
        std::mem::replace(&mut self.statements, Vec::with_capacity(self.capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_reports_full_at_capacity() {
        let mut batch = StatementBatch::new(2);

        assert!(!batch.push("INSERT A"));
        assert!(batch.push("INSERT B"));
        assert!(batch.is_full());
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_take_clears_and_preserves_order() {
        let mut batch = StatementBatch::new(3);
        batch.push("INSERT A");
        batch.push("INSERT B");

        assert_eq!(batch.take(), vec!["INSERT A", "INSERT B"]);
        assert!(batch.is_empty());
        assert_eq!(batch.capacity(), 3);
        assert!(batch.take().is_empty());
    }

    #[test]
    fn test_capacity_one_is_full_after_every_push() {
        let mut batch = StatementBatch::new(1);

        assert!(batch.push("INSERT A"));
        batch.take();
        assert!(batch.push("INSERT B"));
        assert_eq!(batch.statements(), ["INSERT B".to_string()]);
    }
}

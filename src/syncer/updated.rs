//! Copy-on-write update builder
//!
//! Starts out as "no change" and materializes a clone of the base object the
//! first time a difference is written, so a comparison that finds nothing
//! to change never allocates.

/// Lazily cloned update of `base`
#[derive(Debug)]
pub struct Updated<'a, T: Clone> {
    base: &'a T,
    updated: Option<T>,
}

impl<'a, T: Clone> Updated<'a, T> {
    pub fn new(base: &'a T) -> Self {
        Self {
            base,
            updated: None,
        }
    }

    /// Mutable access to the update, cloning the base on first use
    pub fn get_mut(&mut self) -> &mut T {
        let base = self.base;
        self.updated.get_or_insert_with(|| base.clone())
    }

    /// `None` when nothing was written
    pub fn into_inner(self) -> Option<T> {
        self.updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untouched_yields_none() {
        let base = vec![1, 2, 3];
        let updated = Updated::new(&base);
        assert_eq!(updated.into_inner(), None);
    }

    #[test]
    fn test_clones_once_and_accumulates() {
        let base = vec![1, 2, 3];
        let mut updated = Updated::new(&base);
        updated.get_mut().push(4);
        updated.get_mut().push(5);

        assert_eq!(updated.into_inner(), Some(vec![1, 2, 3, 4, 5]));
        assert_eq!(base, vec![1, 2, 3]);
    }
}

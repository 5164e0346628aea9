//! Merging of fan-out responses
//!
//! Diagnostics are concatenated in backend order without deduplication or
//! severity changes. Singleton fields may be populated by at most one
//! backend; a second value is a conflict that fails the call once the
//! diagnostics have been merged.

use tracing::warn;

use crate::backend::BackendId;
use crate::protocol::Diagnostic;
use crate::{Error, Result};

/// Accumulates one merged fan-out response.
#[derive(Debug)]
pub(crate) struct Merge {
    rpc: &'static str,
    diagnostics: Vec<Diagnostic>,
    conflict: Option<(&'static str, Vec<BackendId>)>,
}

impl Merge {
    pub(crate) fn new(rpc: &'static str) -> Self {
        Self {
            rpc,
            diagnostics: Vec::new(),
            conflict: None,
        }
    }

    /// Append one backend's diagnostics. Call in ordinal order.
    pub(crate) fn diagnostics(&mut self, diagnostics: Vec<Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// Append a diagnostic raised by the mux itself.
    pub(crate) fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Pick the single populated value of `field`.
    ///
    /// Returns `None` when nobody populated it, and also when several
    /// backends did; the latter is recorded and reported by [`Merge::finish`].
    pub(crate) fn singleton<T>(
        &mut self,
        field: &'static str,
        values: impl IntoIterator<Item = (BackendId, Option<T>)>,
    ) -> Option<T> {
        let mut populated: Vec<(BackendId, T)> = values
            .into_iter()
            .filter_map(|(id, value)| value.map(|v| (id, v)))
            .collect();

        if populated.len() > 1 {
            let backends: Vec<BackendId> = populated.iter().map(|(id, _)| *id).collect();
            warn!(rpc = self.rpc, field, backends = ?backends, "Fan-out conflict on singleton field");
            if self.conflict.is_none() {
                self.conflict = Some((field, backends));
            }
            return None;
        }

        populated.pop().map(|(_, value)| value)
    }

    /// Finish the merge, returning the concatenated diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousSingleton`] for the first conflicting field,
    /// carrying the merged diagnostics.
    pub(crate) fn finish(self) -> Result<Vec<Diagnostic>> {
        match self.conflict {
            Some((field, backends)) => Err(Error::AmbiguousSingleton {
                rpc: self.rpc,
                field,
                backends,
                diagnostics: self.diagnostics,
            }),
            None => Ok(self.diagnostics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(index: usize) -> BackendId {
        BackendId::new(index)
    }

    #[test]
    fn diagnostics_concatenate_without_dedup() {
        let mut merge = Merge::new("ConfigureProvider");
        merge.diagnostics(vec![Diagnostic::error("same", "detail")]);
        merge.diagnostics(vec![]);
        merge.diagnostics(vec![Diagnostic::error("same", "detail")]);

        let diags = merge.finish().unwrap();
        assert_eq!(
            diags,
            vec![Diagnostic::error("same", "detail"), Diagnostic::error("same", "detail")]
        );
    }

    #[test]
    fn singleton_none_when_unpopulated() {
        let mut merge = Merge::new("ValidateProviderConfig");
        let value: Option<u32> =
            merge.singleton("PreparedConfig", vec![(id(0), None), (id(1), None)]);
        assert_eq!(value, None);
        assert!(merge.finish().is_ok());
    }

    #[test]
    fn singleton_single_value_used_verbatim() {
        let mut merge = Merge::new("ValidateProviderConfig");
        let value = merge.singleton("PreparedConfig", vec![(id(0), None), (id(1), Some(7)), (id(2), None)]);
        assert_eq!(value, Some(7));
        assert!(merge.finish().is_ok());
    }

    #[test]
    fn singleton_conflict_keeps_diagnostics() {
        let mut merge = Merge::new("ValidateProviderConfig");
        merge.diagnostics(vec![Diagnostic::warning("w", "")]);
        merge.diagnostics(vec![Diagnostic::error("e", "")]);

        let value = merge.singleton("PreparedConfig", vec![(id(0), Some(1)), (id(1), None), (id(2), Some(2))]);
        assert_eq!(value, None);

        match merge.finish().unwrap_err() {
            Error::AmbiguousSingleton {
                rpc,
                field,
                backends,
                diagnostics,
            } => {
                assert_eq!(rpc, "ValidateProviderConfig");
                assert_eq!(field, "PreparedConfig");
                assert_eq!(backends, vec![id(0), id(2)]);
                assert_eq!(
                    diagnostics,
                    vec![Diagnostic::warning("w", ""), Diagnostic::error("e", "")]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn first_conflicting_field_is_reported() {
        let mut merge = Merge::new("Example");
        let _ = merge.singleton("First", vec![(id(0), Some(1)), (id(1), Some(2))]);
        let kept = merge.singleton("Second", vec![(id(0), Some(3))]);
        let _ = merge.singleton("Third", vec![(id(0), Some(4)), (id(1), Some(5))]);

        assert_eq!(kept, Some(3));
        assert!(matches!(
            merge.finish(),
            Err(Error::AmbiguousSingleton { field: "First", .. })
        ));
    }
}

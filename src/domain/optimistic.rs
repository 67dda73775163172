// Optimistic update helper: snapshot, apply, restore on failure

/// Value a slot held before an optimistic write.
///
/// Obtained from [`apply`]; the caller either [`commit`](Rollback::commit)s it once the
/// server confirms, or [`restore`](Rollback::restore)s it into the same slot when the
/// confirmation fails.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "an optimistic update must be either committed or restored"]
pub struct Rollback<T> {
    previous: T,
}

/// Overwrite `slot` with `value`, remembering what was there.
pub fn apply<T>(slot: &mut T, value: T) -> Rollback<T> {
    Rollback {
        previous: std::mem::replace(slot, value),
    }
}

impl<T> Rollback<T> {
    pub fn previous(&self) -> &T {
        &self.previous
    }

    pub fn restore(self, slot: &mut T) {
        *slot = self.previous;
    }

    pub fn commit(self) {}
}

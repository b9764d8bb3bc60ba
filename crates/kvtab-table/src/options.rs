/// Knobs for overwriting writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateOptions {
    /// A `None` value deletes the field when set; otherwise it is skipped.
    pub null_means_delete: bool,
    /// Expire the row this many seconds after the write, measured on the
    /// backend's clock. Only applied when at least one field changed.
    pub expire_seconds: Option<u64>,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            null_means_delete: true,
            expire_seconds: None,
        }
    }
}

impl UpdateOptions {
    pub fn expiring(seconds: u64) -> Self {
        Self {
            expire_seconds: Some(seconds),
            ..Self::default()
        }
    }

    pub fn keep_nulls(mut self) -> Self {
        self.null_means_delete = false;
        self
    }
}

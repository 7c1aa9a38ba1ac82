//! Session scoped id minting.
//!
//! Loaded ids are opaque strings from the backing store, so a minted id is
//! only handed out after checking it is not already on the canvas. Each
//! canvas owns its own generators; two editors never share a counter.

use tracing::trace;

#[derive(Debug, Clone)]
pub struct IdGenerator {
    prefix: String,
    next: u64,
}

impl IdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::starting_at(prefix, 1)
    }

    pub fn starting_at(
        prefix: impl Into<String>,
        next: u64,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            next,
        }
    }

    /// Moves the counter past `id` when it looks like one of ours.
    pub fn observe(
        &mut self,
        id: &str,
    ) {
        let suffix = id.strip_prefix(self.prefix.as_str()).and_then(|s| s.parse::<u64>().ok());
        if let Some(n) = suffix {
            if n >= self.next {
                self.next = n.saturating_add(1);
            }
        }
    }

    /// Returns the next id for which `taken` is false. Suffixes strictly increase.
    pub fn mint(
        &mut self,
        taken: impl Fn(&str) -> bool,
    ) -> String {
        loop {
            let id = format!("{}{}", self.prefix, self.next);
            self.next = self.next.saturating_add(1);
            if !taken(&id) {
                trace!(id = %id, "minted id");
                return id;
            }
        }
    }
}

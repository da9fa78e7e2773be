/*
 * nodebooks-kernel
 *
 * Copyright (C) 2024-2026 NodeBooks Contributors
 * SPDX-License-Identifier: GPL-3.0-only
 *
 * This library is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, version 3.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Interaction dispatch: callables registered by UI helpers during cell
//! evaluation, addressable by opaque handler identifiers so later UI
//! events can invoke them.

use indexmap::IndexMap;
use sha2::{Digest, Sha256};

use crate::runtime::Value;

pub struct Handler {
    pub id: String,
    pub cell: String,
    pub component: Option<String>,
    pub callback: Value,
}

/// Registrations live until the owning cell is re-executed or the
/// execution context is reset.
#[derive(Default)]
pub struct HandlerTable {
    inner: IndexMap<String, Handler>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Handler) {
        self.inner.insert(handler.id.clone(), handler);
    }

    pub fn get(&self, id: &str) -> Option<&Handler> {
        self.inner.get(id)
    }

    pub fn remove_cell(&mut self, cell: &str) {
        self.inner.retain(|_, handler| handler.cell != cell);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Opaque handler identifier derived from the owning notebook, cell, and
/// a per-context counter.
pub fn handler_id(notebook: &str, cell: &str, counter: u64) -> String {
    let mut hasher = Sha256::new();

    hasher.update(notebook.as_bytes());
    hasher.update([0]);
    hasher.update(cell.as_bytes());
    hasher.update(counter.to_le_bytes());

    let digest = hasher.finalize();
    let mut id = String::with_capacity(18);

    id.push('h');

    for byte in digest.iter().take(8) {
        id.push_str(&format!("{byte:02x}"));
    }

    id
}

#[cfg(test)]
mod test {
    use crate::interaction::*;
    use crate::runtime::value::Value;

    fn handler(id: &str, cell: &str) -> Handler {
        Handler {
            id: id.into(),
            cell: cell.into(),
            component: None,
            callback: Value::Undefined,
        }
    }

    #[test]
    fn re_execution_replaces_cell_handlers() {
        let mut table = HandlerTable::new();

        table.register(handler("a", "c1"));
        table.register(handler("b", "c2"));
        table.remove_cell("c1");
        assert!(table.get("a").is_none());
        assert!(table.get("b").is_some());
    }

    #[test]
    fn identifiers_are_stable_and_distinct() {
        assert_eq!(handler_id("n", "c", 1), handler_id("n", "c", 1));
        assert_ne!(handler_id("n", "c", 1), handler_id("n", "c", 2));
        assert_ne!(handler_id("n", "c1", 1), handler_id("n", "c2", 1));
    }
}

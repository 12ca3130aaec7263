// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Open-file table for RelayFS Core
//!
//! Keyed by the caller-assigned opaque id. The channel serializes
//! operations, so the table is owned by the dispatcher context and needs no
//! lock; the caller must not reuse an id while its entry is live.

use std::collections::HashMap;
use std::sync::Arc;

use crate::storage::{DirHandle, ExclusiveHandle};

pub struct OpenFile {
    pub id: u64,
    pub access: Box<dyn ExclusiveHandle>,
    pub dir: Arc<dyn DirHandle>,
    pub path: String,
    pub name: String,
    pub read_only: bool,
    pub delete_on_close: bool,
}

#[derive(Default)]
pub struct OpenFiles {
    entries: HashMap<u64, OpenFile>,
}

impl OpenFiles {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, entry: OpenFile) {
        self.entries.insert(entry.id, entry);
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut OpenFile> {
        self.entries.get_mut(&id)
    }

    pub fn remove(&mut self, id: u64) -> Option<OpenFile> {
        self.entries.remove(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Normalize a path into its segment list: empty and `.` segments are
/// dropped, `..` pops the segment before it.
pub(crate) fn split_path(path: &str) -> Vec<String> {
    let mut segments: Vec<String> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other.to_string()),
        }
    }
    segments
}

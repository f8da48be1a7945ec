//! The ordered edit history of one image.
//!
//! A [`DImageHistory`] is a sequence of [`HistoryEntry`] values in the order
//! the edits were applied. The referred images of an entry name the image
//! state that exists after the entry's action; the first entry usually has no
//! action and names the loaded original.
//!
//! Grouping rule: a non-null action always opens a new entry, and ids are
//! added to the last entry. So appending `id1, a1, id2, a2, id3, id4` yields
//! three entries `[id1]`, `a1 [id2]`, `a2 [id3, id4]`.

use serde::{Deserialize, Serialize};

use crate::action::{ActionFlags, FilterAction};
use crate::id::{HistoryImageId, ImageType};

/// One step of a history: an optional action and the images known to hold
/// its result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub referred_images: Vec<HistoryImageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<FilterAction>,
}

impl HistoryEntry {
    pub fn with_action(action: FilterAction) -> Self {
        HistoryEntry {
            referred_images: Vec::new(),
            action: Some(action),
        }
    }
}

/// The chronological edit history of an image.
///
/// The serde form is the bare entry list, for embedding in larger documents.
/// Standalone histories use [`to_text`](Self::to_text) and
/// [`from_text`](Self::from_text).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DImageHistory {
    entries: Vec<HistoryEntry>,
}

impl DImageHistory {
    pub fn new() -> Self {
        DImageHistory::default()
    }

    /// Builds a history from already-parsed entries. Null actions are
    /// normalized to `None`.
    pub(crate) fn from_entries(mut entries: Vec<HistoryEntry>) -> Self {
        for entry in &mut entries {
            if entry.action.as_ref().is_some_and(FilterAction::is_null) {
                entry.action = None;
            }
        }
        DImageHistory { entries }
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A history is valid if any entry carries an action or a referred image.
    pub fn is_valid(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.action.is_some() || !e.referred_images.is_empty())
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    /// Iterates the recorded actions in application order.
    pub fn actions(&self) -> impl Iterator<Item = &FilterAction> + '_ {
        self.entries.iter().filter_map(|e| e.action.as_ref())
    }

    pub fn action_count(&self) -> usize {
        self.actions().count()
    }

    pub fn has_actions(&self) -> bool {
        self.actions().next().is_some()
    }

    /// The referred images of entry `index`; empty if out of range.
    pub fn referred_images(&self, index: usize) -> &[HistoryImageId] {
        self.entries
            .get(index)
            .map(|e| e.referred_images.as_slice())
            .unwrap_or(&[])
    }

    pub fn all_referred_images(&self) -> Vec<&HistoryImageId> {
        self.entries
            .iter()
            .flat_map(|e| e.referred_images.iter())
            .collect()
    }

    pub fn has_referred_image_of_type(&self, image_type: ImageType) -> bool {
        self.referred_image_of_type(image_type).is_some()
    }

    /// The first referred image of the given type, scanning from the oldest
    /// entry.
    pub fn referred_image_of_type(&self, image_type: ImageType) -> Option<&HistoryImageId> {
        self.entries
            .iter()
            .flat_map(|e| e.referred_images.iter())
            .find(|id| id.image_type == Some(image_type))
    }

    pub fn current_referred_image(&self) -> Option<&HistoryImageId> {
        self.entries
            .iter()
            .rev()
            .flat_map(|e| e.referred_images.iter())
            .find(|id| id.is_current_file())
    }

    pub fn original_referred_image(&self) -> Option<&HistoryImageId> {
        self.referred_image_of_type(ImageType::Original)
    }

    // -----------------------------------------------------------------------
    // Appending
    // -----------------------------------------------------------------------

    /// Appends an action, opening a new entry. Null actions are ignored.
    pub fn append_action(&mut self, action: FilterAction) -> &mut Self {
        if action.is_null() {
            tracing::debug!("ignoring null filter action");
            return self;
        }
        self.entries.push(HistoryEntry::with_action(action));
        self
    }

    /// Adds an id to the last entry, opening one if the history is empty.
    pub fn append_id(&mut self, id: HistoryImageId) -> &mut Self {
        let last = self.entries.len().saturating_sub(1);
        self.insert_referred_image(last, id);
        self
    }

    /// Adds an id to entry `index` (clamped to the valid range).
    ///
    /// Invalid ids are dropped. A `Current` id demotes every other `Current`
    /// id in the history to `Intermediate`, so at most one remains.
    pub fn insert_referred_image(&mut self, index: usize, id: HistoryImageId) {
        if !id.is_valid() {
            tracing::warn!(%id, "dropping invalid referred image");
            return;
        }
        if id.is_current_file() {
            for existing in self.entries.iter_mut().flat_map(|e| e.referred_images.iter_mut()) {
                if existing.is_current_file() {
                    existing.set_type(ImageType::Intermediate);
                }
            }
        }
        if self.entries.is_empty() {
            self.entries.push(HistoryEntry::default());
        }
        let index = index.min(self.entries.len() - 1);
        self.entries[index].referred_images.push(id);
    }

    // -----------------------------------------------------------------------
    // Adjusting referred images
    // -----------------------------------------------------------------------

    /// Only the last entry may refer to the current file; earlier `Current`
    /// ids become `Intermediate`.
    pub fn adjust_referred_images(&mut self) {
        let last = self.entries.len().saturating_sub(1);
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if index == last {
                continue;
            }
            for id in &mut entry.referred_images {
                if id.is_current_file() {
                    id.set_type(ImageType::Intermediate);
                }
            }
        }
    }

    /// Rewrites the location of the most recent current id. Used when the
    /// loaded file is about to be saved under a different name.
    ///
    /// Returns false if the history refers to no current file.
    pub fn move_current_referred_image(&mut self, new_path: &str, new_name: &str) -> bool {
        let current = self
            .entries
            .iter_mut()
            .rev()
            .flat_map(|e| e.referred_images.iter_mut().rev())
            .find(|id| id.is_current_file());
        match current {
            Some(id) => {
                id.set_path(new_path);
                id.set_file_name(new_name);
                true
            }
            None => false,
        }
    }

    /// Removes every referred image located at `path`/`name`. Used when that
    /// file is about to be replaced by unrelated content.
    ///
    /// Returns the number of ids removed.
    pub fn purge_path_from_referred_images(&mut self, path: &str, name: &str) -> usize {
        let mut removed = 0;
        for entry in &mut self.entries {
            let before = entry.referred_images.len();
            entry
                .referred_images
                .retain(|id| !(id.file_path == path && id.file_name == name));
            removed += before - entry.referred_images.len();
        }
        removed
    }

    /// Drops the referred images of entry `index`, keeping its action.
    pub fn remove_referred_images(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.referred_images.clear();
        }
    }

    /// Drops all referred images, keeping the action sequence.
    pub fn clear_referred_images(&mut self) {
        for entry in &mut self.entries {
            entry.referred_images.clear();
        }
    }

    /// Removes the last `count` actions together with their entries.
    pub fn remove_last_actions(&mut self, count: usize) {
        let mut remaining = count;
        while remaining > 0 {
            match self.entries.iter().rposition(|e| e.action.is_some()) {
                Some(index) => {
                    self.entries.truncate(index);
                    remaining -= 1;
                }
                None => break,
            }
        }
    }

    // -----------------------------------------------------------------------
    // Branches
    // -----------------------------------------------------------------------

    /// Marks the first action added on top of `base` as the start of a new
    /// branch (or clears the mark).
    pub fn set_history_branch_after(&mut self, base: &DImageHistory, is_branch: bool) {
        let added = self.entries.len().saturating_sub(base.len());
        self.set_history_branch_for_last_steps(added, is_branch);
    }

    /// Marks the first action among the last `steps` entries.
    pub fn set_history_branch_for_last_steps(&mut self, steps: usize, is_branch: bool) {
        if steps == 0 {
            return;
        }
        let first = self.entries.len().saturating_sub(steps);
        let action = self.entries[first..]
            .iter_mut()
            .find_map(|e| e.action.as_mut());
        if let Some(action) = action {
            if is_branch {
                action.add_flag(ActionFlags::EXPLICIT_BRANCH);
            } else {
                action.remove_flag(ActionFlags::EXPLICIT_BRANCH);
            }
        }
    }
}

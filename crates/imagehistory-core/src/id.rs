//! Identity of one physical image occurrence referenced from a history.
//!
//! A [`HistoryImageId`] names an original file, an intermediate save, or the
//! current state of an edited image. Identity is carried by the uuid or by the
//! content fingerprint (`unique_hash` + `file_size`); the file location is a
//! hint only, since files move.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role an image plays within a history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageType {
    /// A file the original was derived from outside of the editor (e.g. a raw
    /// converter input).
    Source,
    /// The unedited original.
    Original,
    /// A saved state that has since been edited further.
    Intermediate,
    /// The most recent state of the edit chain.
    Current,
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageType::Source => "source",
            ImageType::Original => "original",
            ImageType::Intermediate => "intermediate",
            ImageType::Current => "current",
        };
        f.write_str(name)
    }
}

fn is_zero(size: &u64) -> bool {
    *size == 0
}

/// Identifies one image occurrence referred to by a history entry.
///
/// Empty strings and `None` mean "unknown". An id without a type, or without
/// any identifying field, is invalid and is ignored by [`DImageHistory`].
///
/// `==` compares every field. Use [`is_same_image`](Self::is_same_image) to
/// ask whether two ids denote the same image.
///
/// [`DImageHistory`]: crate::history::DImageHistory
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryImageId {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub image_type: Option<ImageType>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_name: String,
    /// Directory containing the file.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unique_hash: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub file_size: u64,
    /// Uuid of the original this image was resolved to, filled in at runtime.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub original_uuid: String,
}

impl HistoryImageId {
    /// Creates an id carrying only a uuid and a type.
    pub fn new(uuid: impl Into<String>, image_type: ImageType) -> Self {
        HistoryImageId {
            uuid: uuid.into(),
            image_type: Some(image_type),
            ..Default::default()
        }
    }

    /// Creates an id for a file on disk, without uuid or fingerprint.
    pub fn from_path(full_path: impl AsRef<Path>, image_type: ImageType) -> Self {
        let mut id = HistoryImageId {
            image_type: Some(image_type),
            ..Default::default()
        };
        id.set_path_on_disk(full_path);
        id
    }

    /// Assigns a fresh random uuid.
    pub fn with_new_uuid(mut self) -> Self {
        self.uuid = Uuid::new_v4().to_string();
        self
    }

    pub fn set_type(&mut self, image_type: ImageType) {
        self.image_type = Some(image_type);
    }

    pub fn set_uuid(&mut self, uuid: impl Into<String>) {
        self.uuid = uuid.into();
    }

    pub fn set_file_name(&mut self, name: impl Into<String>) {
        self.file_name = name.into();
    }

    pub fn set_path(&mut self, directory: impl Into<String>) {
        self.file_path = directory.into();
    }

    pub fn set_creation_date(&mut self, date: NaiveDateTime) {
        self.creation_date = Some(date);
    }

    pub fn set_original_uuid(&mut self, uuid: impl Into<String>) {
        self.original_uuid = uuid.into();
    }

    /// Splits a full file path into directory and file name.
    pub fn set_path_on_disk(&mut self, full_path: impl AsRef<Path>) {
        let path = full_path.as_ref();
        self.file_path = path
            .parent()
            .map(|dir| dir.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
    }

    pub fn set_unique_hash(&mut self, hash: impl Into<String>, file_size: u64) {
        self.unique_hash = hash.into();
        self.file_size = file_size;
    }

    /// Computes the content fingerprint of `data` and stores it as the
    /// `(unique_hash, file_size)` pair.
    pub fn set_fingerprint(&mut self, data: &[u8]) {
        let (hash, size) = fingerprint(data);
        self.set_unique_hash(hash, size);
    }

    /// The full path of the file, if both directory and name are known.
    pub fn full_path(&self) -> Option<PathBuf> {
        if self.has_file_on_disk() {
            Some(Path::new(&self.file_path).join(&self.file_name))
        } else {
            None
        }
    }

    // -----------------------------------------------------------------------
    // Predicates
    // -----------------------------------------------------------------------

    /// An id is valid if it has a type and at least one identifying field.
    pub fn is_valid(&self) -> bool {
        self.image_type.is_some()
            && (self.has_uuid() || self.has_file_name() || self.has_unique_hash_identifier())
    }

    pub fn has_uuid(&self) -> bool {
        !self.uuid.is_empty()
    }

    pub fn has_file_name(&self) -> bool {
        !self.file_name.is_empty()
    }

    pub fn has_file_on_disk(&self) -> bool {
        !self.file_path.is_empty() && !self.file_name.is_empty()
    }

    pub fn has_unique_hash_identifier(&self) -> bool {
        !self.unique_hash.is_empty() && self.file_size > 0
    }

    pub fn has_creation_date(&self) -> bool {
        self.creation_date.is_some()
    }

    pub fn has_original_uuid(&self) -> bool {
        !self.original_uuid.is_empty()
    }

    pub fn is_source_file(&self) -> bool {
        self.image_type == Some(ImageType::Source)
    }

    pub fn is_original_file(&self) -> bool {
        self.image_type == Some(ImageType::Original)
    }

    pub fn is_intermediate_file(&self) -> bool {
        self.image_type == Some(ImageType::Intermediate)
    }

    pub fn is_current_file(&self) -> bool {
        self.image_type == Some(ImageType::Current)
    }

    /// Returns true if both ids denote the same image occurrence.
    ///
    /// When both carry a uuid, the uuid decides alone. Otherwise the content
    /// fingerprint must match. Path and name are never compared. Content hash
    /// collisions are an accepted residual risk.
    pub fn is_same_image(&self, other: &HistoryImageId) -> bool {
        if !self.is_valid() || !other.is_valid() {
            return false;
        }
        if self.has_uuid() && other.has_uuid() {
            return self.uuid == other.uuid;
        }
        self.has_unique_hash_identifier()
            && self.unique_hash == other.unique_hash
            && self.file_size == other.file_size
    }
}

impl fmt::Display for HistoryImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.image_type {
            Some(t) => write!(f, "{t}")?,
            None => f.write_str("invalid")?,
        }
        if self.has_uuid() {
            write!(f, " {}", self.uuid)?;
        }
        if let Some(path) = self.full_path() {
            write!(f, " {}", path.display())?;
        } else if self.has_file_name() {
            write!(f, " {}", self.file_name)?;
        }
        Ok(())
    }
}

/// Computes the `(unique_hash, file_size)` content fingerprint of `data`.
pub fn fingerprint(data: &[u8]) -> (String, u64) {
    let hash = blake3::hash(data).to_hex().to_string();
    (hash, data.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hashed(hash: &str, size: u64) -> HistoryImageId {
        let mut id = HistoryImageId::from_path("/photos/a.jpg", ImageType::Original);
        id.set_unique_hash(hash, size);
        id
    }

    #[test]
    fn path_on_disk_splits_directory_and_name() {
        let id = HistoryImageId::from_path("/photos/2010/img_001.jpg", ImageType::Current);
        assert_eq!(id.file_path, "/photos/2010");
        assert_eq!(id.file_name, "img_001.jpg");
        assert_eq!(
            id.full_path(),
            Some(PathBuf::from("/photos/2010/img_001.jpg"))
        );
    }

    #[test]
    fn validity_requires_type_and_identifier() {
        assert!(!HistoryImageId::default().is_valid());

        let untyped = HistoryImageId {
            uuid: "abc".into(),
            ..Default::default()
        };
        assert!(!untyped.is_valid());

        assert!(HistoryImageId::new("abc", ImageType::Original).is_valid());
    }

    #[test]
    fn uuid_decides_when_both_present() {
        let mut a = hashed("h1", 10);
        let mut b = hashed("h1", 10);
        a.set_uuid("u1");
        b.set_uuid("u2");
        assert!(!a.is_same_image(&b));

        b.set_uuid("u1");
        b.set_unique_hash("other", 99);
        assert!(a.is_same_image(&b));
    }

    #[test]
    fn fingerprint_identifies_without_uuid() {
        let a = hashed("h1", 10);
        let mut b = HistoryImageId::from_path("/moved/elsewhere.jpg", ImageType::Intermediate);
        b.set_unique_hash("h1", 10);
        assert!(a.is_same_image(&b));

        b.set_unique_hash("h1", 11);
        assert!(!a.is_same_image(&b));
    }

    #[test]
    fn path_alone_is_not_identity() {
        let a = HistoryImageId::from_path("/photos/a.jpg", ImageType::Original);
        let b = HistoryImageId::from_path("/photos/a.jpg", ImageType::Original);
        assert_eq!(a, b);
        assert!(!a.is_same_image(&b));
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let (h1, s1) = fingerprint(b"pixels");
        let (h2, s2) = fingerprint(b"pixels");
        assert_eq!(h1, h2);
        assert_eq!(s1, 6);
        assert_eq!(s1, s2);
        assert_ne!(fingerprint(b"other").0, h1);
    }

    #[test]
    fn new_uuid_is_assigned() {
        let a = HistoryImageId::from_path("/a.jpg", ImageType::Current).with_new_uuid();
        let b = HistoryImageId::from_path("/a.jpg", ImageType::Current).with_new_uuid();
        assert!(a.has_uuid());
        assert_ne!(a.uuid, b.uuid);
    }

    #[test]
    fn type_predicates() {
        let id = HistoryImageId::new("u", ImageType::Intermediate);
        assert!(id.is_intermediate_file());
        assert!(!id.is_current_file());
        assert!(!id.is_original_file());
        assert!(!id.is_source_file());
    }

    #[test]
    fn display_includes_type_and_location() {
        let id = HistoryImageId::from_path("/p/a.jpg", ImageType::Current);
        assert_eq!(id.to_string(), format!("current {}", Path::new("/p/a.jpg").display()));
    }
}

//! Dropbox API metadata records
//!
//! Defines the metadata record returned by the metadata, fileops and
//! files_put endpoints.

use serde::{Deserialize, Serialize};

/// Metadata for one remote path
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Full path of the entry, as the remote spells it
    #[serde(default)]
    pub path: String,
    /// Whether the entry is a folder
    #[serde(default)]
    pub is_dir: bool,
    /// Whether the entry was deleted (only reported with include_deleted)
    #[serde(default)]
    pub is_deleted: bool,
    /// Size in bytes (0 for folders)
    #[serde(default)]
    pub bytes: u64,
    /// Modification time, e.g. "Wed, 27 Apr 2011 22:18:51 +0000"
    #[serde(default)]
    pub modified: Option<String>,
    /// Listing version tag, only present on folder listings
    #[serde(default)]
    pub hash: Option<String>,
    /// File revision identifier
    #[serde(default)]
    pub rev: Option<String>,
    /// MIME type guessed by the remote
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Folder members, only present when a listing was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<Vec<Metadata>>,
}

impl Metadata {
    /// Get the base name (last component of path)
    pub fn base_name(&self) -> &str {
        let name = self.path.trim_end_matches('/');
        name.rsplit('/').next().unwrap_or(name)
    }

    /// Detach the listing from this record, leaving the record itself
    pub fn take_contents(&mut self) -> Vec<Metadata> {
        self.contents.take().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_file_record() {
        let json = r#"{
            "size": "225.4KB",
            "rev": "35e97029684fe",
            "thumb_exists": false,
            "bytes": 230783,
            "modified": "Tue, 19 Jul 2011 21:55:38 +0000",
            "path": "/Getting_Started.pdf",
            "is_dir": false,
            "icon": "page_white_acrobat",
            "root": "dropbox",
            "mime_type": "application/pdf",
            "revision": 220823
        }"#;
        let meta: Metadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.path, "/Getting_Started.pdf");
        assert_eq!(meta.bytes, 230783);
        assert!(!meta.is_dir);
        assert!(!meta.is_deleted);
        assert_eq!(meta.rev.as_deref(), Some("35e97029684fe"));
        assert_eq!(meta.hash, None);
        assert!(meta.contents.is_none());
    }

    #[test]
    fn test_deserialize_folder_listing() {
        let json = r#"{
            "size": "0 bytes",
            "hash": "37eb1ba1849d4b0fb0b28caf7ef3af52",
            "bytes": 0,
            "thumb_exists": false,
            "rev": "714f029684fe",
            "modified": "Wed, 27 Apr 2011 22:18:51 +0000",
            "path": "/Photos",
            "is_dir": true,
            "icon": "folder",
            "root": "dropbox",
            "contents": [
                {
                    "bytes": 0,
                    "modified": "Wed, 27 Apr 2011 22:18:51 +0000",
                    "path": "/Photos/Sample Album",
                    "is_dir": true
                },
                {
                    "bytes": 10,
                    "path": "/Photos/old.jpg",
                    "is_dir": false,
                    "is_deleted": true
                }
            ]
        }"#;
        let mut meta: Metadata = serde_json::from_str(json).unwrap();
        assert!(meta.is_dir);
        assert_eq!(
            meta.hash.as_deref(),
            Some("37eb1ba1849d4b0fb0b28caf7ef3af52")
        );

        let contents = meta.take_contents();
        assert_eq!(contents.len(), 2);
        assert!(contents[0].is_dir);
        assert!(contents[1].is_deleted);
        assert!(meta.contents.is_none());
    }

    #[test]
    fn test_base_name() {
        let meta = Metadata {
            path: "/Photos/Sample Album".to_string(),
            ..Default::default()
        };
        assert_eq!(meta.base_name(), "Sample Album");

        let root_file = Metadata {
            path: "/readme.txt".to_string(),
            ..Default::default()
        };
        assert_eq!(root_file.base_name(), "readme.txt");
    }
}

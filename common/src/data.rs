use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IntentError;

/// Parent id that denotes the root of a drive.
pub const ROOT_PARENT_ID: &str = "root";
pub const MAX_NAME_BYTES: usize = 1024;

pub const MIN_PART_SIZE: u64 = 100 * 1024;
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;
pub const MAX_PARTS: usize = 10_000;

/// The only content hash algorithm the service accepts.
pub const CONTENT_HASH_NAME: &str = "sha1";
pub const PROOF_VERSION: &str = "v1";

/// What the service does when `name` already exists under the parent.
///
/// Concurrent creates of the same name under `AutoRename` may each succeed
/// with a distinct renamed entry. Under `Refuse`, concurrent duplicates race
/// and at most one of them succeeds. Neither can be controlled client side.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckNameMode {
    #[default]
    AutoRename,
    Refuse,
    Ignore,
}

impl CheckNameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckNameMode::AutoRename => "auto_rename",
            CheckNameMode::Refuse => "refuse",
            CheckNameMode::Ignore => "ignore",
        }
    }
}

impl fmt::Display for CheckNameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CheckNameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto_rename" => Ok(Self::AutoRename),
            "refuse" => Ok(Self::Refuse),
            "ignore" => Ok(Self::Ignore),
            other => Err(format!(
                "unknown check name mode {other:?}, expected auto_rename, refuse or ignore"
            )),
        }
    }
}

/// One entry of the client's proposed split of a file.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PartRequest {
    pub part_number: u32,
    pub part_size: u64,
}

/// Full content hash plus proof of possession, needed for rapid upload.
/// The hash algorithm is always [`CONTENT_HASH_NAME`] and the proof version
/// always [`PROOF_VERSION`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentProof {
    pub content_hash: String,
    pub proof_code: String,
}

/// Everything only a file carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileDetails {
    pub size: u64,
    pub parts: Vec<PartRequest>,
    /// Hash of the first KiB, lets the service rule out rapid upload
    /// before the client hashes the whole file.
    pub pre_hash: Option<String>,
    pub content: Option<ContentProof>,
    pub local_created_at: Option<DateTime<Utc>>,
    pub local_modified_at: Option<DateTime<Utc>>,
}

impl FileDetails {
    pub fn new(size: u64, parts: Vec<PartRequest>) -> Self {
        Self {
            size,
            parts,
            pre_hash: None,
            content: None,
            local_created_at: None,
            local_modified_at: None,
        }
    }

    pub fn with_pre_hash(mut self, pre_hash: impl Into<String>) -> Self {
        self.pre_hash = Some(pre_hash.into());
        self
    }

    pub fn with_content_proof(
        mut self,
        content_hash: impl Into<String>,
        proof_code: impl Into<String>,
    ) -> Self {
        self.content = Some(ContentProof {
            content_hash: content_hash.into(),
            proof_code: proof_code.into(),
        });
        self
    }

    pub fn with_local_times(
        mut self,
        created_at: Option<DateTime<Utc>>,
        modified_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.local_created_at = created_at;
        self.local_modified_at = modified_at;
        self
    }

    fn validate(&self) -> Result<(), IntentError> {
        if self.parts.is_empty() {
            return Err(IntentError::NoParts);
        }
        if self.parts.len() > MAX_PARTS {
            return Err(IntentError::TooManyParts(self.parts.len()));
        }
        let last = self.parts.len() - 1;
        let mut total: u64 = 0;
        for (i, part) in self.parts.iter().enumerate() {
            let expected = i as u32 + 1;
            if part.part_number != expected {
                return Err(IntentError::PartOutOfOrder {
                    part_number: part.part_number,
                    expected,
                });
            }
            // Only the final part may fall below the minimum.
            let too_small = i != last && part.part_size < MIN_PART_SIZE;
            if too_small || part.part_size > MAX_PART_SIZE {
                return Err(IntentError::PartSize {
                    part_number: part.part_number,
                    size: part.part_size,
                });
            }
            total = total.saturating_add(part.part_size);
        }
        if total != self.size {
            return Err(IntentError::SizeMismatch {
                expected: self.size,
                actual: total,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File(FileDetails),
    Folder,
}

/// A pending create, validated on construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadIntent {
    drive_id: String,
    parent_id: String,
    name: String,
    kind: EntryKind,
    check_name_mode: Option<CheckNameMode>,
}

impl UploadIntent {
    pub fn file(
        drive_id: impl Into<String>,
        name: impl Into<String>,
        details: FileDetails,
    ) -> Result<Self, IntentError> {
        details.validate()?;
        Self::new(drive_id.into(), name.into(), EntryKind::File(details))
    }

    pub fn folder(drive_id: impl Into<String>, name: impl Into<String>) -> Result<Self, IntentError> {
        Self::new(drive_id.into(), name.into(), EntryKind::Folder)
    }

    fn new(drive_id: String, name: String, kind: EntryKind) -> Result<Self, IntentError> {
        if drive_id.is_empty() {
            return Err(IntentError::EmptyDriveId);
        }
        if name.is_empty() {
            return Err(IntentError::EmptyName);
        }
        if name.len() > MAX_NAME_BYTES {
            return Err(IntentError::NameTooLong(name.len()));
        }
        if name.ends_with('/') {
            return Err(IntentError::TrailingSeparator);
        }
        Ok(Self {
            drive_id,
            parent_id: ROOT_PARENT_ID.to_string(),
            name,
            kind,
            check_name_mode: None,
        })
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = parent_id.into();
        self
    }

    pub fn with_check_name_mode(mut self, mode: CheckNameMode) -> Self {
        self.check_name_mode = Some(mode);
        self
    }

    pub fn drive_id(&self) -> &str {
        &self.drive_id
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    /// The mode as given by the caller, `None` if it was never set.
    pub fn check_name_mode(&self) -> Option<CheckNameMode> {
        self.check_name_mode
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, EntryKind::Folder)
    }

    /// Number of parts the caller asked for; zero for folders.
    pub fn part_count(&self) -> usize {
        match &self.kind {
            EntryKind::File(details) => details.parts.len(),
            EntryKind::Folder => 0,
        }
    }
}

/// Where to send one chunk of the file.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChunkTarget {
    pub part_number: u32,
    pub upload_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_size: Option<u64>,
}

/// The service's answer to a create. Handed on to the chunk transfer phase.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct UploadCreateOutcome {
    pub drive_id: String,
    pub parent_id: String,
    pub entry_id: String,
    pub entry_name: String,
    pub status: String,
    /// Absent for folders and possibly for rapid uploads.
    pub upload_session_id: Option<String>,
    pub is_available: bool,
    pub already_exists: bool,
    pub rapid_upload_accepted: bool,
    /// Ordered from part 1. Empty for folders and rapid uploads.
    pub chunk_targets: Vec<ChunkTarget>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum NextStep<'a> {
    /// Nothing left to transfer.
    Done,
    TransferChunks(&'a [ChunkTarget]),
}

impl UploadCreateOutcome {
    pub fn next_step(&self) -> NextStep<'_> {
        if self.chunk_targets.is_empty() {
            NextStep::Done
        } else {
            NextStep::TransferChunks(&self.chunk_targets)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(sizes: &[u64]) -> Vec<PartRequest> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &part_size)| PartRequest {
                part_number: i as u32 + 1,
                part_size,
            })
            .collect()
    }

    #[test]
    fn check_name_mode_strings() {
        let tests = [
            (CheckNameMode::AutoRename, "auto_rename"),
            (CheckNameMode::Refuse, "refuse"),
            (CheckNameMode::Ignore, "ignore"),
        ];
        for (src, expected) in tests {
            assert_eq!(format!("{}", src), expected);
            assert_eq!(
                serde_json::to_value(src).unwrap().as_str().unwrap(),
                expected
            );
            assert_eq!(expected.parse::<CheckNameMode>().unwrap(), src);
        }
        assert!("rename".parse::<CheckNameMode>().is_err());
        assert_eq!(CheckNameMode::default(), CheckNameMode::AutoRename);
    }

    #[test]
    fn folder_defaults() {
        let intent = UploadIntent::folder("d1", "photos").unwrap();
        assert_eq!(intent.parent_id(), ROOT_PARENT_ID);
        assert_eq!(intent.check_name_mode(), None);
        assert!(intent.is_folder());
        assert_eq!(intent.part_count(), 0);
    }

    #[test]
    fn rejects_bad_names() {
        assert_eq!(
            UploadIntent::folder("", "a").unwrap_err(),
            IntentError::EmptyDriveId
        );
        assert_eq!(
            UploadIntent::folder("d1", "").unwrap_err(),
            IntentError::EmptyName
        );
        assert_eq!(
            UploadIntent::folder("d1", "dir/").unwrap_err(),
            IntentError::TrailingSeparator
        );
        let long = "é".repeat(513);
        assert_eq!(
            UploadIntent::folder("d1", long).unwrap_err(),
            IntentError::NameTooLong(1026)
        );
        assert!(UploadIntent::folder("d1", "a".repeat(MAX_NAME_BYTES)).is_ok());
    }

    #[test]
    fn small_last_part_is_allowed() {
        let size = MIN_PART_SIZE * 2 + 5;
        let details = FileDetails::new(size, parts(&[MIN_PART_SIZE, MIN_PART_SIZE, 5]));
        let intent = UploadIntent::file("d1", "a.bin", details).unwrap();
        assert_eq!(intent.part_count(), 3);
    }

    #[test]
    fn rejects_bad_part_plans() {
        let cases = [
            (FileDetails::new(0, vec![]), IntentError::NoParts),
            (
                FileDetails::new(MIN_PART_SIZE + 10, parts(&[10, MIN_PART_SIZE])),
                IntentError::PartSize {
                    part_number: 1,
                    size: 10,
                },
            ),
            (
                FileDetails::new(MAX_PART_SIZE + 1, parts(&[MAX_PART_SIZE + 1])),
                IntentError::PartSize {
                    part_number: 1,
                    size: MAX_PART_SIZE + 1,
                },
            ),
            (
                FileDetails::new(100, parts(&[99])),
                IntentError::SizeMismatch {
                    expected: 100,
                    actual: 99,
                },
            ),
            (
                FileDetails::new(
                    100,
                    vec![PartRequest {
                        part_number: 2,
                        part_size: 100,
                    }],
                ),
                IntentError::PartOutOfOrder {
                    part_number: 2,
                    expected: 1,
                },
            ),
            (
                FileDetails::new(0, parts(&vec![0; MAX_PARTS + 1])),
                IntentError::TooManyParts(MAX_PARTS + 1),
            ),
        ];
        for (details, expected) in cases {
            assert_eq!(
                UploadIntent::file("d1", "a.bin", details).unwrap_err(),
                expected
            );
        }
    }

    #[test]
    fn next_step() {
        let mut outcome = UploadCreateOutcome {
            drive_id: "d1".to_string(),
            parent_id: "root".to_string(),
            entry_id: "f1".to_string(),
            entry_name: "a.txt".to_string(),
            status: String::new(),
            upload_session_id: None,
            is_available: true,
            already_exists: false,
            rapid_upload_accepted: true,
            chunk_targets: vec![],
        };
        assert_eq!(outcome.next_step(), NextStep::Done);

        outcome.rapid_upload_accepted = false;
        outcome.chunk_targets.push(ChunkTarget {
            part_number: 1,
            upload_url: "https://upload.example/1".to_string(),
            part_size: Some(100),
        });
        assert_eq!(
            outcome.next_step(),
            NextStep::TransferChunks(&outcome.chunk_targets)
        );
    }
}

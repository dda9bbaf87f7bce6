use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::data::{
    CheckNameMode, ChunkTarget, EntryKind, FileDetails, PartRequest, UploadCreateOutcome,
    UploadIntent, CONTENT_HASH_NAME, PROOF_VERSION,
};
use crate::error::NegotiationError;

// Request payloads

/// Body of `POST /adrive/v1.0/openFile/create`.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct CreateRequest<'a> {
    pub drive_id: &'a str,
    pub parent_file_id: &'a str,
    pub name: &'a str,
    pub check_name_mode: CheckNameMode,
    #[serde(flatten)]
    pub entry: CreateEntry<'a>,
}

/// Folders carry no file fields at all, so a folder request cannot put
/// them on the wire.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CreateEntry<'a> {
    File(FileFields<'a>),
    Folder,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct FileFields<'a> {
    pub size: u64,
    pub part_info_list: &'a [PartRequest],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_hash: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash_name: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_version: Option<&'static str>,
    #[serde(
        serialize_with = "local_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub local_created_at: Option<DateTime<Utc>>,
    #[serde(
        serialize_with = "local_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub local_modified_at: Option<DateTime<Utc>>,
}

/// `yyyy-MM-ddTHH:mm:ss.SSSZ`, always UTC.
pub const LOCAL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

fn local_time<S: Serializer>(t: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
    match t {
        Some(t) => s.collect_str(&t.format(LOCAL_TIME_FORMAT)),
        None => s.serialize_none(),
    }
}

impl<'a> From<&'a FileDetails> for FileFields<'a> {
    fn from(details: &'a FileDetails) -> Self {
        let content = details.content.as_ref();
        Self {
            size: details.size,
            part_info_list: &details.parts,
            pre_hash: details.pre_hash.as_deref(),
            content_hash: content.map(|c| c.content_hash.as_str()),
            content_hash_name: content.map(|_| CONTENT_HASH_NAME),
            proof_code: content.map(|c| c.proof_code.as_str()),
            proof_version: content.map(|_| PROOF_VERSION),
            local_created_at: details.local_created_at,
            local_modified_at: details.local_modified_at,
        }
    }
}

impl<'a> From<&'a UploadIntent> for CreateRequest<'a> {
    /// An unset check name mode always goes out as `auto_rename`, whatever
    /// the service default happens to be.
    fn from(intent: &'a UploadIntent) -> Self {
        let entry = match intent.kind() {
            EntryKind::File(details) => CreateEntry::File(details.into()),
            EntryKind::Folder => CreateEntry::Folder,
        };
        Self {
            drive_id: intent.drive_id(),
            parent_file_id: intent.parent_id(),
            name: intent.name(),
            check_name_mode: intent.check_name_mode().unwrap_or_default(),
            entry,
        }
    }
}

// Response payloads

/// The service's common error envelope.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ApiErrorPayload {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl From<ApiErrorPayload> for NegotiationError {
    fn from(value: ApiErrorPayload) -> Self {
        Self::Service {
            code: value.code,
            message: value.message.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PartInfo {
    pub part_number: u32,
    pub upload_url: String,
    #[serde(default)]
    pub part_size: Option<u64>,
}

/// Create result as the service sends it. Only `file_id` is mandatory.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CreateResponse {
    #[serde(default)]
    pub drive_id: Option<String>,
    #[serde(default)]
    pub parent_file_id: Option<String>,
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub upload_id: Option<String>,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub exist: bool,
    #[serde(default)]
    pub rapid_upload: bool,
    #[serde(default)]
    pub part_info_list: Option<Vec<PartInfo>>,
}

impl CreateResponse {
    /// Checks the response against the intent it answers and converts it.
    pub fn into_outcome(self, intent: &UploadIntent) -> Result<UploadCreateOutcome, NegotiationError> {
        let parts = self.part_info_list.unwrap_or_default();
        if self.rapid_upload && !parts.is_empty() {
            return Err(NegotiationError::Decode(format!(
                "rapid upload accepted but {} part targets returned",
                parts.len()
            )));
        }
        if intent.is_folder() && !parts.is_empty() {
            return Err(NegotiationError::Decode(format!(
                "folder create returned {} part targets",
                parts.len()
            )));
        }
        // A file the service neither deduplicated nor reported as an existing
        // entry must get one target per requested part.
        let needs_transfer = !intent.is_folder() && !self.rapid_upload;
        let existing_only = self.exist && parts.is_empty();
        if needs_transfer && !existing_only && parts.len() != intent.part_count() {
            return Err(NegotiationError::Decode(format!(
                "requested {} parts but {} targets returned",
                intent.part_count(),
                parts.len()
            )));
        }

        let mut chunk_targets = Vec::with_capacity(parts.len());
        for (i, part) in parts.into_iter().enumerate() {
            let expected = i as u32 + 1;
            if part.part_number != expected {
                return Err(NegotiationError::Decode(format!(
                    "part target {} out of order, expected {expected}",
                    part.part_number
                )));
            }
            chunk_targets.push(ChunkTarget {
                part_number: part.part_number,
                upload_url: part.upload_url,
                part_size: part.part_size,
            });
        }

        Ok(UploadCreateOutcome {
            drive_id: self.drive_id.unwrap_or_default(),
            parent_id: self.parent_file_id.unwrap_or_default(),
            entry_id: self.file_id,
            entry_name: self.file_name.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            upload_session_id: self.upload_id.filter(|id| !id.is_empty()),
            is_available: self.available,
            already_exists: self.exist,
            rapid_upload_accepted: self.rapid_upload,
            chunk_targets,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::{json, Value};

    use super::*;
    use crate::data::{CheckNameMode, FileDetails, MIN_PART_SIZE};

    const FILE_ONLY: [&str; 9] = [
        "size",
        "part_info_list",
        "pre_hash",
        "content_hash",
        "content_hash_name",
        "proof_code",
        "proof_version",
        "local_created_at",
        "local_modified_at",
    ];

    fn one_part(size: u64) -> FileDetails {
        FileDetails::new(
            size,
            vec![PartRequest {
                part_number: 1,
                part_size: size,
            }],
        )
    }

    fn to_json(intent: &UploadIntent) -> Value {
        serde_json::to_value(CreateRequest::from(intent)).unwrap()
    }

    #[test]
    fn folder_request_has_no_file_fields() {
        let intent = UploadIntent::folder("d1", "photos")
            .unwrap()
            .with_check_name_mode(CheckNameMode::Refuse);
        let body = to_json(&intent);
        assert_eq!(
            body,
            json!({
                "drive_id": "d1",
                "parent_file_id": "root",
                "name": "photos",
                "type": "folder",
                "check_name_mode": "refuse",
            })
        );
        let map = body.as_object().unwrap();
        for field in FILE_ONLY {
            assert!(!map.contains_key(field), "{field} present on folder");
        }
    }

    #[test]
    fn unset_mode_defaults_to_auto_rename() {
        let intent = UploadIntent::file("d1", "a.txt", one_part(100)).unwrap();
        assert_eq!(intent.check_name_mode(), None);
        let body = to_json(&intent);
        assert_eq!(body["check_name_mode"], "auto_rename");
        assert_eq!(body["type"], "file");
        assert_eq!(body["size"], 100);
        assert_eq!(
            body["part_info_list"],
            json!([{"part_number": 1, "part_size": 100}])
        );
    }

    #[test]
    fn unset_optional_file_fields_are_absent() {
        let intent = UploadIntent::file("d1", "a.txt", one_part(100)).unwrap();
        let body = to_json(&intent);
        let map = body.as_object().unwrap();
        for field in [
            "pre_hash",
            "content_hash",
            "content_hash_name",
            "proof_code",
            "proof_version",
            "local_created_at",
            "local_modified_at",
        ] {
            assert!(!map.contains_key(field), "{field} should be omitted");
        }
    }

    #[test]
    fn full_file_request() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 5).unwrap();
        let modified = created + chrono::Duration::milliseconds(1234);
        let details = FileDetails::new(
            MIN_PART_SIZE + 1,
            vec![
                PartRequest {
                    part_number: 1,
                    part_size: MIN_PART_SIZE,
                },
                PartRequest {
                    part_number: 2,
                    part_size: 1,
                },
            ],
        )
        .with_pre_hash("PRE")
        .with_content_proof("ABCDEF", "cHJvb2Y=")
        .with_local_times(Some(created), Some(modified));
        let intent = UploadIntent::file("d1", "big.bin", details)
            .unwrap()
            .with_parent("p1")
            .with_check_name_mode(CheckNameMode::Ignore);

        let body = to_json(&intent);
        assert_eq!(body["parent_file_id"], "p1");
        assert_eq!(body["check_name_mode"], "ignore");
        assert_eq!(body["pre_hash"], "PRE");
        assert_eq!(body["content_hash"], "ABCDEF");
        assert_eq!(body["content_hash_name"], "sha1");
        assert_eq!(body["proof_code"], "cHJvb2Y=");
        assert_eq!(body["proof_version"], "v1");
        assert_eq!(body["local_created_at"], "2024-03-01T08:30:05.000Z");
        assert_eq!(body["local_modified_at"], "2024-03-01T08:30:06.234Z");
        assert_eq!(body["part_info_list"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn error_envelope_conversion() {
        let payload: ApiErrorPayload =
            serde_json::from_str(r#"{"code":"AlreadyExist.File","message":"exists"}"#).unwrap();
        assert_eq!(
            NegotiationError::from(payload),
            NegotiationError::Service {
                code: "AlreadyExist.File".to_string(),
                message: "exists".to_string(),
            }
        );
    }

    #[test]
    fn upload_url_is_a_string() {
        let resp: CreateResponse = serde_json::from_value(json!({
            "file_id": "f1",
            "upload_id": "u1",
            "part_info_list": [
                {"part_number": 1, "upload_url": "https://upload.example/p1?sig=x", "part_size": 100}
            ]
        }))
        .unwrap();
        let intent = UploadIntent::file("d1", "a.txt", one_part(100)).unwrap();
        let outcome = resp.into_outcome(&intent).unwrap();
        assert_eq!(
            outcome.chunk_targets,
            vec![ChunkTarget {
                part_number: 1,
                upload_url: "https://upload.example/p1?sig=x".to_string(),
                part_size: Some(100),
            }]
        );
        assert_eq!(outcome.upload_session_id.as_deref(), Some("u1"));
    }

    #[test]
    fn rapid_upload_with_targets_is_rejected() {
        let resp: CreateResponse = serde_json::from_value(json!({
            "file_id": "f1",
            "rapid_upload": true,
            "part_info_list": [{"part_number": 1, "upload_url": "https://u/1"}]
        }))
        .unwrap();
        let intent = UploadIntent::file("d1", "a.txt", one_part(100)).unwrap();
        assert!(matches!(
            resp.into_outcome(&intent),
            Err(NegotiationError::Decode(_))
        ));
    }

    #[test]
    fn folder_outcome() {
        let resp: CreateResponse = serde_json::from_value(json!({
            "drive_id": "d1",
            "parent_file_id": "root",
            "file_id": "dir1",
            "file_name": "photos",
            "upload_id": "",
            "part_info_list": null
        }))
        .unwrap();
        let intent = UploadIntent::folder("d1", "photos").unwrap();
        let outcome = resp.into_outcome(&intent).unwrap();
        assert_eq!(outcome.entry_id, "dir1");
        assert_eq!(outcome.upload_session_id, None);
        assert!(outcome.chunk_targets.is_empty());
    }

    #[test]
    fn targets_must_be_contiguous() {
        let details = FileDetails::new(
            MIN_PART_SIZE * 2,
            vec![
                PartRequest {
                    part_number: 1,
                    part_size: MIN_PART_SIZE,
                },
                PartRequest {
                    part_number: 2,
                    part_size: MIN_PART_SIZE,
                },
            ],
        );
        let intent = UploadIntent::file("d1", "a.bin", details).unwrap();
        let resp: CreateResponse = serde_json::from_value(json!({
            "file_id": "f1",
            "part_info_list": [
                {"part_number": 2, "upload_url": "https://u/2"},
                {"part_number": 1, "upload_url": "https://u/1"}
            ]
        }))
        .unwrap();
        assert!(matches!(
            resp.into_outcome(&intent),
            Err(NegotiationError::Decode(_))
        ));
    }

    fn three_parts() -> UploadIntent {
        let details = FileDetails::new(
            MIN_PART_SIZE * 3,
            (1..=3)
                .map(|part_number| PartRequest {
                    part_number,
                    part_size: MIN_PART_SIZE,
                })
                .collect(),
        );
        UploadIntent::file("d1", "a.bin", details).unwrap()
    }

    #[test]
    fn non_rapid_file_needs_every_target() {
        let intent = three_parts();
        for body in [
            json!({"file_id": "f1", "rapid_upload": false, "part_info_list": []}),
            json!({"file_id": "f1"}),
            json!({"file_id": "f1", "part_info_list": null}),
        ] {
            let resp: CreateResponse = serde_json::from_value(body.clone()).unwrap();
            assert!(
                matches!(resp.into_outcome(&intent), Err(NegotiationError::Decode(_))),
                "{body} accepted"
            );
        }
    }

    #[test]
    fn existing_entry_without_targets() {
        let resp: CreateResponse = serde_json::from_value(json!({
            "file_id": "f0",
            "exist": true,
            "rapid_upload": false,
        }))
        .unwrap();
        let outcome = resp
            .into_outcome(&three_parts().with_check_name_mode(CheckNameMode::Refuse))
            .unwrap();
        assert!(outcome.already_exists);
        assert!(outcome.chunk_targets.is_empty());
    }

    #[test]
    fn folder_with_targets_is_rejected() {
        let resp: CreateResponse = serde_json::from_value(json!({
            "file_id": "dir1",
            "part_info_list": [{"part_number": 1, "upload_url": "https://u/1"}]
        }))
        .unwrap();
        let intent = UploadIntent::folder("d1", "photos").unwrap();
        let err = resp.into_outcome(&intent).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Decode);
    }
}

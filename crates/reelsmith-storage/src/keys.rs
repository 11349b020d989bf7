//! Object key layout.

use chrono::{DateTime, Utc};

use reelsmith_models::CompositionRequest;

use crate::error::{StorageError, StorageResult};

/// Prefix for finished renders.
pub const COMPOSITIONS_PREFIX: &str = "compositions";

/// Key for a request's render: `compositions/{project}/{millis}-{short id}.mp4`.
///
/// The request id keeps keys distinct even when two renders of one project
/// finish in the same millisecond.
pub fn composition_key(request: &CompositionRequest, at: DateTime<Utc>) -> String {
    format!(
        "{}/{}/{}",
        COMPOSITIONS_PREFIX,
        request.project_id.sanitized(),
        request.output_file_name(at)
    )
}

/// Reject keys that are empty, absolute or escape their prefix.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.starts_with('/') || key.split('/').any(|s| s.is_empty() || s == "..") {
        return Err(StorageError::invalid_key(key));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reelsmith_models::ProjectId;

    fn request(project: &str) -> CompositionRequest {
        CompositionRequest::new(ProjectId::new(project), "bg.mp4", "voice.mp3")
    }

    #[test]
    fn test_composition_key_layout() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let req = request("my project");
        let key = composition_key(&req, at);

        assert!(key.starts_with("compositions/my_project/1700000000123-"));
        assert!(key.ends_with(".mp4"));
        assert!(validate_key(&key).is_ok());
    }

    #[test]
    fn test_keys_distinct_for_same_instant() {
        let at = Utc::now();
        let a = composition_key(&request("p"), at);
        let b = composition_key(&request("p"), at);
        assert_ne!(a, b);
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("compositions/p/x.mp4").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/abs/x.mp4").is_err());
        assert!(validate_key("compositions/../x.mp4").is_err());
        assert!(validate_key("compositions//x.mp4").is_err());
    }
}

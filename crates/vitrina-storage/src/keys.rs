//! Shared key generation for upload objects.

use crate::traits::{StorageError, StorageResult};
use vitrina_core::models::{DocumentType, OwnerRef};

const KEY_PREFIX: &str = "documents";

/// Generate the storage key for an upload intent.
///
/// Produces `documents/{owner_entity_type}/{owner_entity_id}/{document_type}/{token}`.
/// The same inputs always yield the same key.
pub fn generate_storage_key(
    owner: &OwnerRef,
    document_type: DocumentType,
    upload_token: &str,
) -> StorageResult<String> {
    let key = format!(
        "{}/{}/{}/{}/{}",
        KEY_PREFIX,
        owner.entity_type.as_str(),
        owner.entity_id,
        document_type.as_str(),
        upload_token
    );
    validate_storage_key(&key)?;
    Ok(key)
}

/// Reject keys that could escape the upload prefix.
pub fn validate_storage_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains("..")
        || key.contains("//")
        || key.chars().any(|c| c.is_control())
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrina_core::models::OwnerEntityType;

    #[test]
    fn test_key_is_deterministic() {
        let owner = OwnerRef {
            entity_type: OwnerEntityType::Commerce,
            entity_id: 42,
        };
        let a = generate_storage_key(&owner, DocumentType::IdCard, "abc123").unwrap();
        let b = generate_storage_key(&owner, DocumentType::IdCard, "abc123").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "documents/commerce/42/id_card/abc123");
    }

    #[test]
    fn test_branch_photo_key() {
        let owner = OwnerRef {
            entity_type: OwnerEntityType::CommerceBranch,
            entity_id: 7,
        };
        let key = generate_storage_key(&owner, DocumentType::BranchPhoto, "ff00").unwrap();
        assert_eq!(key, "documents/commerce_branch/7/branch_photo/ff00");
    }

    #[test]
    fn test_rejects_traversal() {
        assert!(validate_storage_key("documents/../secrets").is_err());
        assert!(validate_storage_key("/documents/a").is_err());
        assert!(validate_storage_key("").is_err());
        assert!(validate_storage_key("documents/commerce/1/id_card/t").is_ok());
    }
}

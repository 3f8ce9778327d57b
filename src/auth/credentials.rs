use crate::storage::{self, StoreError};
use crate::types::identity::{AdminFile, AdminIdentity, AdminRecord, Role};

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::RngCore;
use rand::rngs::OsRng;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const ADMINS_FILE: &str = "admins.toml";

const MIN_SECRET_LEN: usize = 8;

/// Returned for every rejected login, whether the account is unknown or the
/// secret is wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid credentials")]
pub struct AuthFailure;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("an administrator with email '{0}' already exists")]
    DuplicateEmail(String),
    #[error("{0}")]
    Invalid(&'static str),
    #[error("failed to hash secret: {0}")]
    Hash(String),
}

/// Provisioned administrator accounts backed by `admins.toml`.
pub struct CredentialStore {
    path: PathBuf,
    admins: Mutex<Vec<AdminRecord>>,
}

impl CredentialStore {
    pub fn load(path: PathBuf) -> Result<Self, CredentialError> {
        let file: AdminFile = storage::load_toml_or_default(&path)?;
        if file.admins.is_empty() {
            tracing::warn!(path = %path.display(), "no administrators provisioned");
        }
        Ok(Self {
            path,
            admins: Mutex::new(file.admins),
        })
    }

    pub async fn len(&self) -> usize {
        self.admins.lock().await.len()
    }

    /// Checks `secret` against the account for `email`. The file is re-read
    /// on every attempt, so accounts provisioned while the server runs are
    /// picked up and never overwritten.
    pub async fn authenticate(
        &self,
        email: &str,
        secret: &str,
    ) -> Result<AdminIdentity, AuthFailure> {
        let email = normalize_email(email);
        let known = {
            let mut admins = self.admins.lock().await;
            self.reload(&mut admins);
            admins
                .iter()
                .find(|admin| normalize_email(&admin.email) == email)
                .map(|admin| (admin.id.clone(), admin.secret_hash.clone()))
        };

        // Unknown accounts still pay for one hash verification.
        let hash = known.as_ref().map(|(_, hash)| hash.clone());
        let secret = secret.to_string();
        let verified = tokio::task::spawn_blocking(move || {
            let hash = hash.as_deref().unwrap_or_else(|| dummy_hash());
            verify_secret(&secret, hash)
        })
        .await
        .unwrap_or(false);

        let Some((admin_id, _)) = known.filter(|_| verified) else {
            tracing::info!("rejected administrator login");
            return Err(AuthFailure);
        };
        let identity = self.record_login(&admin_id).await.ok_or(AuthFailure)?;
        tracing::info!(admin_id = %identity.id, "administrator authenticated");
        Ok(identity)
    }

    /// Stamps `last_authenticated_at` on the freshest copy of the file.
    async fn record_login(&self, admin_id: &str) -> Option<AdminIdentity> {
        let mut admins = self.admins.lock().await;
        self.reload(&mut admins);
        let record = admins.iter_mut().find(|admin| admin.id == admin_id)?;
        record.last_authenticated_at = Some(OffsetDateTime::now_utc());
        let identity = record.identity();

        let snapshot = AdminFile {
            admins: admins.to_vec(),
        };
        if let Err(err) = self.persist(&snapshot).await {
            tracing::warn!(error = %err, admin_id = %identity.id, "failed to record login time");
        }
        Some(identity)
    }

    fn reload(&self, admins: &mut Vec<AdminRecord>) {
        match storage::load_toml_or_default::<AdminFile>(&self.path) {
            Ok(file) => *admins = file.admins,
            Err(err) => {
                tracing::warn!(error = %err, "failed to reload administrators, using cached copy");
            }
        }
    }

    async fn persist(&self, file: &AdminFile) -> Result<(), StoreError> {
        let contents = storage::encode_toml(&self.path, file)?;
        storage::write_atomically(&self.path, contents).await
    }
}

/// A real argon2 hash with default parameters, so verifying against it costs
/// the same as verifying a provisioned secret.
fn dummy_hash() -> &'static str {
    static DUMMY_HASH: OnceLock<String> = OnceLock::new();
    DUMMY_HASH.get_or_init(|| {
        SaltString::encode_b64(b"backoffice-dummy-salt")
            .ok()
            .and_then(|salt| {
                Argon2::default()
                    .hash_password(b"backoffice-dummy-secret", &salt)
                    .ok()
                    .map(|hash| hash.to_string())
            })
            .unwrap_or_default()
    })
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn verify_secret(secret: &str, secret_hash: &str) -> bool {
    let hash = match PasswordHash::new(secret_hash) {
        Ok(hash) => hash,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &hash)
        .is_ok()
}

pub fn hash_secret(secret: &str) -> Result<String, CredentialError> {
    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|err| CredentialError::Hash(err.to_string()))?;
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| CredentialError::Hash(err.to_string()))
}

/// Appends a new administrator to `path`, creating the file if needed.
pub fn provision_admin(
    path: &Path,
    email: &str,
    name: &str,
    role: Role,
    secret: &str,
) -> Result<AdminIdentity, CredentialError> {
    let email = email.trim();
    let name = name.trim();
    if !email.contains('@') {
        return Err(CredentialError::Invalid("email must contain '@'"));
    }
    if name.is_empty() {
        return Err(CredentialError::Invalid("name cannot be empty"));
    }
    if secret.chars().count() < MIN_SECRET_LEN {
        return Err(CredentialError::Invalid(
            "secret must be at least 8 characters",
        ));
    }

    let mut file: AdminFile = storage::load_toml_or_default(path)?;
    let normalized = normalize_email(email);
    if file
        .admins
        .iter()
        .any(|admin| normalize_email(&admin.email) == normalized)
    {
        return Err(CredentialError::DuplicateEmail(email.to_string()));
    }

    let record = AdminRecord {
        id: uuid::Uuid::new_v4().to_string(),
        email: email.to_string(),
        name: name.to_string(),
        role,
        secret_hash: hash_secret(secret)?,
        last_authenticated_at: None,
    };
    let identity = record.identity();
    file.admins.push(record);

    let contents = storage::encode_toml(path, &file)?;
    storage::write_atomically_blocking(path, &contents)?;
    Ok(identity)
}

#[cfg(test)]
#[allow(non_snake_case)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::create_temp_root;

    pub(crate) fn provision(root: &Path, email: &str, role: Role, secret: &str) -> AdminIdentity {
        provision_admin(&root.join(ADMINS_FILE), email, "Test Admin", role, secret)
            .expect("provision admin")
    }

    const SECRET_ADA: &str = "correct horse";

    #[tokio::test]
    async fn authenticate__should_return_identity_and_record_login_time() {
        // Given
        let root = create_temp_root("credentials-ok");
        let provisioned = provision(&root, "ada@studio.example", Role::Editor, "correct horse");
        let store = CredentialStore::load(root.join(ADMINS_FILE)).expect("load store");

        // When
        let identity = store
            .authenticate("  ADA@studio.example ", "correct horse")
            .await
            .expect("authenticate");

        // Then
        assert_eq!(identity, provisioned);
        let file: AdminFile =
            storage::load_toml_or_default(&root.join(ADMINS_FILE)).expect("reload admins");
        assert!(file.admins[0].last_authenticated_at.is_some());

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn authenticate__should_not_distinguish_unknown_email_from_wrong_secret() {
        // Given
        let root = create_temp_root("credentials-fail");
        provision(&root, "ada@studio.example", Role::Administrator, "correct horse");
        let store = CredentialStore::load(root.join(ADMINS_FILE)).expect("load store");

        // When
        let wrong_secret = store
            .authenticate("ada@studio.example", "battery staple")
            .await;
        let unknown_email = store
            .authenticate("grace@studio.example", "correct horse")
            .await;

        // Then
        assert_eq!(wrong_secret, Err(AuthFailure));
        assert_eq!(unknown_email, Err(AuthFailure));
        let file: AdminFile =
            storage::load_toml_or_default(&root.join(ADMINS_FILE)).expect("reload admins");
        assert!(file.admins[0].last_authenticated_at.is_none());

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn authenticate__should_keep_admins_provisioned_after_startup() {
        // Given
        let root = create_temp_root("credentials-late-provision");
        provision(&root, "ada@studio.example", Role::Administrator, SECRET_ADA);
        let store = CredentialStore::load(root.join(ADMINS_FILE)).expect("load store");
        let grace = provision(&root, "grace@studio.example", Role::Editor, "grace secret");

        // When
        store
            .authenticate("ada@studio.example", SECRET_ADA)
            .await
            .expect("authenticate ada");
        let late = store
            .authenticate("grace@studio.example", "grace secret")
            .await;

        // Then
        let file: AdminFile =
            storage::load_toml_or_default(&root.join(ADMINS_FILE)).expect("reload admins");
        assert_eq!(file.admins.len(), 2);
        assert_eq!(late, Ok(grace));
        assert!(file.admins.iter().all(|admin| admin.last_authenticated_at.is_some()));

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn provision_admin__should_reject_duplicate_email() {
        // Given
        let root = create_temp_root("credentials-duplicate");
        provision(&root, "ada@studio.example", Role::Administrator, "correct horse");

        // When
        let result = provision_admin(
            &root.join(ADMINS_FILE),
            "Ada@Studio.example",
            "Ada again",
            Role::Editor,
            "another secret",
        );

        // Then
        assert!(matches!(result, Err(CredentialError::DuplicateEmail(_))));

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn provision_admin__should_reject_short_secret() {
        // Given
        let root = create_temp_root("credentials-short");

        // When
        let result = provision_admin(
            &root.join(ADMINS_FILE),
            "ada@studio.example",
            "Ada",
            Role::Editor,
            "short",
        );

        // Then
        assert!(matches!(result, Err(CredentialError::Invalid(_))));
        assert!(!root.join(ADMINS_FILE).exists());

        std::fs::remove_dir_all(&root).expect("cleanup");
    }
}

//! Public profiles.

use crate::caller::Caller;
use blobhub_common::{AppError, AppResult, is_path_safe};
use blobhub_db::{
    DocumentStore,
    entities::{self, UserProfile, user_profile},
    repositories::ProfileRepository,
};
use serde::Deserialize;
use tracing::info;

/// Profile fields to merge. `None` leaves a field alone, a blank string
/// clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub public_email: Option<String>,
    pub avatar_url: Option<String>,
}

/// Profile service for business logic.
#[derive(Clone, Debug)]
pub struct ProfileService {
    store: DocumentStore,
    profile_repo: ProfileRepository,
}

impl ProfileService {
    /// Create a new profile service.
    #[must_use]
    pub fn new(store: DocumentStore) -> Self {
        Self {
            profile_repo: ProfileRepository::new(store.clone()),
            store,
        }
    }

    /// A user's profile. Users without one get an empty profile.
    pub async fn get(&self, user_id: &str) -> AppResult<UserProfile> {
        if !is_path_safe(user_id) {
            return Err(AppError::Validation(format!("invalid user id: {user_id:?}")));
        }
        Ok(self.profile_repo.find(user_id).await?.unwrap_or_default())
    }

    /// Merge `update` into the caller's profile.
    pub async fn update(&self, caller: &Caller, update: ProfileUpdate) -> AppResult<UserProfile> {
        let profile = self
            .store
            .run_transaction(|tx| {
                let uid = caller.uid.clone();
                let update = update.clone();
                Box::pin(async move {
                    let path = user_profile::path(&uid);
                    let mut profile = tx
                        .get_as::<UserProfile>(&path)
                        .await?
                        .unwrap_or_default();

                    merge(&mut profile.display_name, update.display_name);
                    merge(&mut profile.bio, update.bio);
                    merge(&mut profile.location, update.location);
                    merge(&mut profile.public_email, update.public_email);
                    merge(&mut profile.avatar_url, update.avatar_url);
                    profile.updated_at = Some(entities::now());

                    tx.set(&path, &profile)?;
                    Ok(profile)
                })
            })
            .await?;

        info!(user_id = %caller.uid, "Profile updated");
        Ok(profile)
    }

    /// Clear every editable field. The follower counter is kept.
    pub async fn clear(&self, caller: &Caller) -> AppResult<UserProfile> {
        let profile = self
            .store
            .run_transaction(|tx| {
                let uid = caller.uid.clone();
                Box::pin(async move {
                    let path = user_profile::path(&uid);
                    let followers_count = tx
                        .get_as::<UserProfile>(&path)
                        .await?
                        .map_or(0, |p| p.followers_count);

                    let profile = UserProfile {
                        followers_count,
                        updated_at: Some(entities::now()),
                        ..UserProfile::default()
                    };
                    tx.set(&path, &profile)?;
                    Ok(profile)
                })
            })
            .await?;

        info!(user_id = %caller.uid, "Profile cleared");
        Ok(profile)
    }
}

fn merge(field: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        let value = value.trim();
        *field = (!value.is_empty()).then(|| value.to_string());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::testing::TestEnv;

    #[tokio::test]
    async fn test_missing_profile_reads_empty() {
        let env = TestEnv::new();
        let profile = env.profiles.get("nobody").await.unwrap();
        assert_eq!(profile, UserProfile::default());
        assert!(matches!(
            env.profiles.get("../etc").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_merges_and_blank_clears() {
        let env = TestEnv::new();
        let alice = Caller::new("alice");

        env.profiles
            .update(
                &alice,
                ProfileUpdate {
                    display_name: Some("  Alice ".to_string()),
                    bio: Some("hi".to_string()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();
        let profile = env
            .profiles
            .update(
                &alice,
                ProfileUpdate {
                    bio: Some("   ".to_string()),
                    location: Some("Osaka".to_string()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(profile.display_name.as_deref(), Some("Alice"));
        assert_eq!(profile.bio, None);
        assert_eq!(profile.location.as_deref(), Some("Osaka"));
        assert!(profile.updated_at.is_some());
        assert_eq!(env.profiles.get("alice").await.unwrap(), profile);
    }

    #[tokio::test]
    async fn test_clear_keeps_followers_count() {
        let env = TestEnv::new();
        let alice = Caller::new("alice");
        env.follows
            .toggle_follow(&Caller::new("bob"), "alice")
            .await
            .unwrap();
        env.profiles
            .update(
                &alice,
                ProfileUpdate {
                    bio: Some("hello".to_string()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();

        let cleared = env.profiles.clear(&alice).await.unwrap();

        assert_eq!(cleared.bio, None);
        assert_eq!(cleared.followers_count, 1);
    }
}

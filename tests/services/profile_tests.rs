//! Profiles and membership listings.

use fake::faker::internet::en::Username;
use fake::Fake;
use pretty_assertions::assert_eq;

use community_hub::application::services::{CommunityService, ProfileError, ProfileService};
use community_hub::domain::{MemberRole, ProfilePatch, User, Visibility};
use community_hub::shared::error::AppError;

use crate::common::TestHub;

const ADA: i64 = 11;
const GRACE: i64 = 12;

fn rename(username: &str) -> ProfilePatch {
    ProfilePatch {
        username: Some(username.into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_ensure_profile_provisions_once() {
    let hub = TestHub::new();
    let profiles = hub.profiles();

    let err = profiles.get_profile(ADA).await.unwrap_err();
    assert!(matches!(err, ProfileError::NotFound));

    let created = profiles.ensure_profile(ADA).await.unwrap();
    assert_eq!(created.username, format!("user_{}", ADA));
    assert_eq!(created.name(), created.username);

    profiles
        .update_profile(
            ADA,
            ADA,
            ProfilePatch {
                display_name: Some("Ada".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // A second sighting keeps the edited profile.
    let again = profiles.ensure_profile(ADA).await.unwrap();
    assert_eq!(again.display_name.as_deref(), Some("Ada"));
}

#[tokio::test]
async fn test_username_is_normalized_and_unique() {
    let hub = TestHub::new();
    let profiles = hub.profiles();
    profiles.ensure_profile(ADA).await.unwrap();
    profiles.ensure_profile(GRACE).await.unwrap();

    let wanted: String = Username().fake();
    let updated = profiles
        .update_profile(ADA, ADA, rename(&format!("  {}  ", wanted.to_uppercase())))
        .await
        .unwrap();
    assert_eq!(updated.username, wanted.to_lowercase());

    let found = profiles
        .get_profile_by_username(&wanted.to_lowercase())
        .await
        .unwrap();
    assert_eq!(found.id, ADA);

    let err = profiles
        .update_profile(GRACE, GRACE, rename(&wanted))
        .await
        .unwrap_err();
    assert!(matches!(err, ProfileError::UsernameTaken));

    // Re-saving your own name is not a clash.
    profiles
        .update_profile(ADA, ADA, rename(&wanted))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_placeholder_names_stay_free_for_their_owner() {
    let hub = TestHub::new();
    let profiles = hub.profiles();
    profiles.ensure_profile(ADA).await.unwrap();

    let claimed = format!("user_{}", GRACE);
    let err = profiles
        .update_profile(ADA, ADA, rename(&claimed))
        .await
        .unwrap_err();
    assert!(matches!(err, ProfileError::UsernameReserved));

    // Grace's first sign-in still gets the placeholder.
    let grace = profiles.ensure_profile(GRACE).await.unwrap();
    assert_eq!(grace.username, claimed);

    // Ada may return to her own placeholder.
    profiles.update_profile(ADA, ADA, rename("ada")).await.unwrap();
    let back = profiles
        .update_profile(ADA, ADA, rename(&format!("user_{}", ADA)))
        .await
        .unwrap();
    assert_eq!(back.username, format!("user_{}", ADA));
}

#[tokio::test]
async fn test_provisioning_respects_unique_usernames() {
    let hub = TestHub::new();
    let mut squatter = User::placeholder(ADA);
    squatter.id = GRACE;
    hub.store.tables().users.insert(GRACE, squatter);

    let err = hub.profiles().ensure_profile(ADA).await.unwrap_err();
    assert!(matches!(err, ProfileError::Repository(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_only_owner_edits_profile() {
    let hub = TestHub::new();
    let profiles = hub.profiles();
    profiles.ensure_profile(ADA).await.unwrap();

    let err = profiles
        .update_profile(
            GRACE,
            ADA,
            ProfilePatch {
                bio: Some("hijacked".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProfileError::Forbidden));

    let updated = profiles
        .update_profile(
            ADA,
            ADA,
            ProfilePatch {
                bio: Some("analytical engines".into()),
                website: Some("   ".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.bio.as_deref(), Some("analytical engines"));
    assert_eq!(updated.website, None);
}

#[tokio::test]
async fn test_list_communities_shows_active_memberships() {
    let hub = TestHub::new();
    let open = hub.community(ADA, Visibility::Public).await.community;
    let closed = hub.community(ADA, Visibility::Private).await.community;
    hub.add_member(open.id, GRACE, MemberRole::Member);
    hub.communities()
        .join_community(closed.id, GRACE)
        .await
        .unwrap();

    let owned = hub.profiles().list_communities(ADA).await.unwrap();
    assert_eq!(owned.len(), 2);

    // The pending request does not count.
    let joined = hub.profiles().list_communities(GRACE).await.unwrap();
    let ids: Vec<i64> = joined.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![open.id]);
}

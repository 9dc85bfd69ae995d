//! Realtime capability tokens and subscription checks.

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use pretty_assertions::assert_eq;

use community_hub::application::services::{
    ChannelService, CommunityService, CreateChannelDto, CreateDocumentDto, CreateMessageDto,
    CreatePostDto, DocumentService, ForumService, MessageService, RealtimeClaims, RealtimeError,
    RealtimeService, REALTIME_AUDIENCE,
};
use community_hub::domain::{EditPolicy, MemberRole, Scope, Visibility};

use crate::common::{title, TestHub, TEST_SECRET};

const OWNER: i64 = 1;
const ALICE: i64 = 2;
const MALLORY: i64 = 66;

#[tokio::test]
async fn test_token_grants_memberships() {
    let hub = TestHub::new();
    let joined = hub.community(OWNER, Visibility::Public).await.community;
    let pending = hub.community(OWNER, Visibility::Private).await.community;
    hub.add_member(joined.id, ALICE, MemberRole::Member);
    hub.communities()
        .join_community(pending.id, ALICE)
        .await
        .unwrap();
    let general = hub.general_channel(joined.id);

    let realtime = hub.realtime();
    let issued = realtime.issue_token(ALICE).await.unwrap();
    assert_eq!(
        issued.channels,
        vec![
            format!("user:{}", ALICE),
            format!("community:{}", joined.id),
            format!("channel:{}", general.id),
        ]
    );
    assert!(issued.expires_at > Utc::now());

    let claims = realtime.verify_token(&issued.token).unwrap();
    assert_eq!(claims.user_id(), Some(ALICE));
    assert_eq!(claims.aud, REALTIME_AUDIENCE);
    assert_eq!(claims.communities, vec![joined.id]);
    assert_eq!(claims.channels, issued.channels);
}

#[tokio::test]
async fn test_garbage_and_expired_tokens_rejected() {
    let hub = TestHub::new();
    let realtime = hub.realtime();

    let err = realtime.verify_token("not-a-token").unwrap_err();
    assert!(matches!(err, RealtimeError::InvalidToken));

    let now = Utc::now().timestamp();
    let stale = RealtimeClaims {
        sub: ALICE.to_string(),
        aud: REALTIME_AUDIENCE.to_string(),
        communities: Vec::new(),
        channels: Vec::new(),
        iat: now - 7200,
        exp: now - 3600,
    };
    let token = encode(
        &Header::default(),
        &stale,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap();
    let err = realtime.verify_token(&token).unwrap_err();
    assert!(matches!(err, RealtimeError::TokenExpired));

    // Right shape, wrong audience.
    let access = RealtimeClaims {
        aud: "api".to_string(),
        exp: now + 3600,
        ..stale
    };
    let token = encode(
        &Header::default(),
        &access,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap();
    let err = realtime.verify_token(&token).unwrap_err();
    assert!(matches!(err, RealtimeError::InvalidToken));
}

#[tokio::test]
async fn test_user_channels_are_private() {
    let hub = TestHub::new();
    let realtime = hub.realtime();
    let claims = realtime
        .verify_token(&realtime.issue_token(ALICE).await.unwrap().token)
        .unwrap();

    let scope = realtime
        .authorize(&claims, &format!("user:{}", ALICE))
        .await
        .unwrap();
    assert_eq!(scope, Scope::User(ALICE));

    let err = realtime
        .authorize(&claims, &format!("user:{}", MALLORY))
        .await
        .unwrap_err();
    assert!(matches!(err, RealtimeError::Forbidden));

    let err = realtime.authorize(&claims, "lobby:1").await.unwrap_err();
    assert!(matches!(err, RealtimeError::InvalidChannel));
    let err = realtime.authorize(&claims, "community:abc").await.unwrap_err();
    assert!(matches!(err, RealtimeError::InvalidChannel));
}

#[tokio::test]
async fn test_resources_resolve_to_their_community() {
    let hub = TestHub::new();
    let community = hub.community(OWNER, Visibility::Public).await.community;
    hub.add_member(community.id, ALICE, MemberRole::Member);
    let general = hub.general_channel(community.id);

    let root = hub
        .messages()
        .send_message(
            general.id,
            ALICE,
            CreateMessageDto {
                content: "hello".into(),
                reply_to: None,
            },
        )
        .await
        .unwrap();
    let post = hub
        .forum()
        .create_post(
            community.id,
            ALICE,
            CreatePostDto {
                title: title(),
                body: String::new(),
            },
        )
        .await
        .unwrap();
    let document = hub
        .documents()
        .create_document(
            community.id,
            ALICE,
            CreateDocumentDto {
                title: title(),
                content: "notes".into(),
                edit_policy: EditPolicy::Members,
            },
        )
        .await
        .unwrap();

    let realtime = hub.realtime();
    let alice = realtime
        .verify_token(&realtime.issue_token(ALICE).await.unwrap().token)
        .unwrap();
    let mallory = realtime
        .verify_token(&realtime.issue_token(MALLORY).await.unwrap().token)
        .unwrap();

    // Created after the token was issued; allowed through the community.
    let later = hub
        .channels()
        .create_channel(
            community.id,
            OWNER,
            CreateChannelDto {
                name: "later".into(),
                topic: None,
            },
        )
        .await
        .unwrap();

    let names = [
        format!("community:{}", community.id),
        format!("channel:{}", general.id),
        format!("channel:{}", later.id),
        format!("thread:{}", root.id),
        format!("post:{}", post.id),
        format!("document:{}", document.id),
    ];
    for name in &names {
        realtime.authorize(&alice, name).await.unwrap();
        let err = realtime.authorize(&mallory, name).await.unwrap_err();
        assert!(matches!(err, RealtimeError::Forbidden), "{}", name);
    }

    // Unknown resources are refused, not leaked.
    let err = realtime.authorize(&alice, "post:12345").await.unwrap_err();
    assert!(matches!(err, RealtimeError::Forbidden));
}

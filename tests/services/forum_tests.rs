//! Forum posts, votes and comments.

use pretty_assertions::assert_eq;
use test_case::test_case;

use community_hub::application::services::{
    CreateCommentDto, CreatePostDto, ForumError, ForumService, PostQueryDto, UpdatePostDto,
};
use community_hub::domain::{MemberRole, Post, PostSort, Visibility, VoteValue};

use crate::common::{title, TestHub};

const OWNER: i64 = 1;
const ALICE: i64 = 2;
const BOB: i64 = 3;
const OUTSIDER: i64 = 50;

async fn forum(visibility: Visibility) -> (TestHub, i64) {
    let hub = TestHub::new();
    let community = hub.community(OWNER, visibility).await.community;
    hub.add_member(community.id, ALICE, MemberRole::Member);
    hub.add_member(community.id, BOB, MemberRole::Member);
    (hub, community.id)
}

async fn post(hub: &TestHub, community_id: i64, author_id: i64) -> Post {
    hub.forum()
        .create_post(
            community_id,
            author_id,
            CreatePostDto {
                title: title(),
                body: "body".into(),
            },
        )
        .await
        .unwrap()
}

fn comment(body: &str, parent_id: Option<i64>) -> CreateCommentDto {
    CreateCommentDto {
        body: body.into(),
        parent_id,
    }
}

#[tokio::test]
async fn test_create_post_revalidates_listing() {
    let (hub, community_id) = forum(Visibility::Public).await;
    hub.clear_recordings();

    let created = post(&hub, community_id, ALICE).await;
    assert_eq!(created.score, 0);
    assert_eq!(
        hub.revalidator.tags(),
        vec![format!("community:{}:posts", community_id)]
    );

    let err = hub
        .forum()
        .create_post(
            community_id,
            OUTSIDER,
            CreatePostDto {
                title: title(),
                body: String::new(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ForumError::Forbidden));
}

#[tokio::test]
async fn test_private_forum_hidden_from_outsiders() {
    let (hub, community_id) = forum(Visibility::Private).await;
    let created = post(&hub, community_id, ALICE).await;

    let err = hub.forum().get_post(created.id, OUTSIDER).await.unwrap_err();
    assert!(matches!(err, ForumError::Forbidden));

    let (public_hub, public_id) = forum(Visibility::Public).await;
    let open = post(&public_hub, public_id, ALICE).await;
    let view = public_hub.forum().get_post(open.id, OUTSIDER).await.unwrap();
    assert_eq!(view.my_vote, VoteValue::None);
}

#[test_case(vec![VoteValue::Up], 1, 1, 0 ; "single upvote")]
#[test_case(vec![VoteValue::Up, VoteValue::Up], 1, 1, 0 ; "repeat is idempotent")]
#[test_case(vec![VoteValue::Up, VoteValue::Down], -1, 0, 1 ; "flip")]
#[test_case(vec![VoteValue::Down, VoteValue::None], 0, 0, 0 ; "clear")]
#[tokio::test]
async fn test_vote_sequences(votes: Vec<VoteValue>, score: i32, up: i32, down: i32) {
    let (hub, community_id) = forum(Visibility::Public).await;
    let created = post(&hub, community_id, ALICE).await;

    let mut last = created;
    for vote in &votes {
        last = hub.forum().vote(last.id, BOB, *vote).await.unwrap();
    }
    assert_eq!((last.score, last.upvotes, last.downvotes), (score, up, down));

    let view = hub.forum().get_post(last.id, BOB).await.unwrap();
    assert_eq!(view.my_vote, *votes.last().unwrap());
}

#[tokio::test]
async fn test_top_and_new_sorting_with_pins_first() {
    let (hub, community_id) = forum(Visibility::Public).await;
    let forum_service = hub.forum();
    let first = post(&hub, community_id, ALICE).await;
    let second = post(&hub, community_id, ALICE).await;
    let third = post(&hub, community_id, ALICE).await;

    forum_service.vote(first.id, BOB, VoteValue::Up).await.unwrap();
    forum_service.vote(first.id, OWNER, VoteValue::Up).await.unwrap();
    forum_service.vote(third.id, BOB, VoteValue::Down).await.unwrap();

    let top = forum_service
        .list_posts(
            community_id,
            BOB,
            PostQueryDto {
                sort: PostSort::Top,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let ids: Vec<i64> = top.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![first.id, second.id, third.id]);

    forum_service.pin_post(third.id, OWNER, true).await.unwrap();
    let newest = forum_service
        .list_posts(
            community_id,
            BOB,
            PostQueryDto {
                sort: PostSort::New,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let ids: Vec<i64> = newest.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![third.id, second.id, first.id]);

    let second_page = forum_service
        .list_posts(
            community_id,
            BOB,
            PostQueryDto {
                sort: PostSort::New,
                page: Some(2),
                per_page: Some(2),
            },
        )
        .await
        .unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].id, first.id);
}

#[tokio::test]
async fn test_locked_post_rejects_interaction() {
    let (hub, community_id) = forum(Visibility::Public).await;
    let forum_service = hub.forum();
    let created = post(&hub, community_id, ALICE).await;

    let err = forum_service
        .lock_post(created.id, ALICE, true)
        .await
        .unwrap_err();
    assert!(matches!(err, ForumError::Forbidden));
    forum_service.lock_post(created.id, OWNER, true).await.unwrap();

    let err = forum_service
        .vote(created.id, BOB, VoteValue::Up)
        .await
        .unwrap_err();
    assert!(matches!(err, ForumError::Locked));
    let err = forum_service
        .add_comment(created.id, BOB, comment("late", None))
        .await
        .unwrap_err();
    assert!(matches!(err, ForumError::Locked));
    let err = forum_service
        .edit_post(
            created.id,
            ALICE,
            UpdatePostDto {
                title: Some("new".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ForumError::Locked));
}

#[tokio::test]
async fn test_comment_tree_and_counts() {
    let (hub, community_id) = forum(Visibility::Public).await;
    let forum_service = hub.forum();
    let created = post(&hub, community_id, ALICE).await;

    let top = forum_service
        .add_comment(created.id, BOB, comment("top", None))
        .await
        .unwrap();
    let nested = forum_service
        .add_comment(created.id, ALICE, comment("nested", Some(top.id)))
        .await
        .unwrap();
    assert_eq!(top.depth, 0);
    assert_eq!(nested.depth, 1);
    assert_eq!(nested.parent_id, Some(top.id));

    let err = forum_service
        .add_comment(created.id, BOB, comment("   ", None))
        .await
        .unwrap_err();
    assert!(matches!(err, ForumError::EmptyBody));

    forum_service.delete_comment(top.id, BOB).await.unwrap();
    forum_service.delete_comment(top.id, BOB).await.unwrap();

    let err = forum_service
        .add_comment(created.id, ALICE, comment("reply", Some(top.id)))
        .await
        .unwrap_err();
    assert!(matches!(err, ForumError::CommentDeleted));

    let comments = forum_service.list_comments(created.id, OUTSIDER).await.unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].body, "");
    assert_eq!(comments[1].body, "nested");

    let view = forum_service.get_post(created.id, ALICE).await.unwrap();
    assert_eq!(view.post.comment_count, 1);
}

#[tokio::test]
async fn test_comment_parent_must_share_post() {
    let (hub, community_id) = forum(Visibility::Public).await;
    let forum_service = hub.forum();
    let a = post(&hub, community_id, ALICE).await;
    let b = post(&hub, community_id, ALICE).await;
    let on_a = forum_service
        .add_comment(a.id, BOB, comment("on a", None))
        .await
        .unwrap();

    let err = forum_service
        .add_comment(b.id, BOB, comment("cross", Some(on_a.id)))
        .await
        .unwrap_err();
    assert!(matches!(err, ForumError::ParentMismatch));
}

#[tokio::test]
async fn test_deleted_post_disappears() {
    let (hub, community_id) = forum(Visibility::Public).await;
    let forum_service = hub.forum();
    let created = post(&hub, community_id, ALICE).await;

    let err = forum_service.delete_post(created.id, BOB).await.unwrap_err();
    assert!(matches!(err, ForumError::Forbidden));

    let deleted = forum_service.delete_post(created.id, ALICE).await.unwrap();
    assert!(deleted.is_deleted());

    let err = forum_service.get_post(created.id, ALICE).await.unwrap_err();
    assert!(matches!(err, ForumError::PostNotFound));
    let listed = forum_service
        .list_posts(community_id, ALICE, PostQueryDto::default())
        .await
        .unwrap();
    assert!(listed.is_empty());
    assert!(hub
        .publisher
        .events_on(&format!("community:{}", community_id))
        .contains(&"post.deleted".to_string()));
}

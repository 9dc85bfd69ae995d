//! Collaborative documents and revision history.

use pretty_assertions::assert_eq;

use community_hub::application::services::{
    CreateDocumentDto, DocumentError, DocumentService, UpdateDocumentDto,
};
use community_hub::domain::{content_hash, Document, EditPolicy, MemberRole, Visibility};

use crate::common::{title, TestHub};

const OWNER: i64 = 1;
const ALICE: i64 = 2;
const BOB: i64 = 3;
const OUTSIDER: i64 = 70;

async fn space(visibility: Visibility) -> (TestHub, i64) {
    let hub = TestHub::new();
    let community = hub.community(OWNER, visibility).await.community;
    hub.add_member(community.id, ALICE, MemberRole::Member);
    hub.add_member(community.id, BOB, MemberRole::Member);
    (hub, community.id)
}

async fn document(hub: &TestHub, community_id: i64, policy: EditPolicy) -> Document {
    hub.documents()
        .create_document(
            community_id,
            ALICE,
            CreateDocumentDto {
                title: format!("  {}  ", title()),
                content: "first draft".into(),
                edit_policy: policy,
            },
        )
        .await
        .unwrap()
}

fn content_update(content: &str, expected_version: i32) -> UpdateDocumentDto {
    UpdateDocumentDto {
        title: None,
        content: Some(content.into()),
        edit_policy: None,
        expected_version,
    }
}

#[tokio::test]
async fn test_create_starts_at_version_one() {
    let (hub, community_id) = space(Visibility::Public).await;
    let doc = document(&hub, community_id, EditPolicy::Members).await;

    assert_eq!(doc.version, 1);
    assert_eq!(doc.title, doc.title.trim());
    assert_eq!(doc.content_hash, content_hash("first draft"));
    assert_eq!(doc.last_edited_by, ALICE);

    let err = hub
        .documents()
        .create_document(
            community_id,
            OUTSIDER,
            CreateDocumentDto {
                title: title(),
                content: String::new(),
                edit_policy: EditPolicy::Members,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentError::Forbidden));
}

#[tokio::test]
async fn test_stale_version_conflicts() {
    let (hub, community_id) = space(Visibility::Public).await;
    let docs = hub.documents();
    let doc = document(&hub, community_id, EditPolicy::Members).await;
    hub.clear_recordings();

    let updated = docs
        .update_document(doc.id, BOB, content_update("bob's edit", 1))
        .await
        .unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(updated.last_edited_by, BOB);
    assert_eq!(
        hub.publisher.events_on(&format!("document:{}", doc.id)),
        vec!["document.updated".to_string()]
    );
    assert_eq!(hub.revalidator.tags(), vec![format!("community:{}", community_id)]);

    // Alice still holds version 1.
    let err = docs
        .update_document(doc.id, ALICE, content_update("alice's edit", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentError::VersionConflict { current: 2 }));

    let current = docs.get_document(doc.id, ALICE).await.unwrap();
    assert_eq!(current.content, "bob's edit");
}

#[tokio::test]
async fn test_unchanged_update_keeps_version() {
    let (hub, community_id) = space(Visibility::Public).await;
    let doc = document(&hub, community_id, EditPolicy::Members).await;

    let same = hub
        .documents()
        .update_document(doc.id, BOB, content_update("first draft", 1))
        .await
        .unwrap();
    assert_eq!(same.version, 1);
    assert_eq!(same.last_edited_by, ALICE);
}

#[tokio::test]
async fn test_edit_policy_is_enforced() {
    let (hub, community_id) = space(Visibility::Public).await;
    let docs = hub.documents();
    let doc = document(&hub, community_id, EditPolicy::Author).await;

    let err = docs
        .update_document(doc.id, BOB, content_update("not mine", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentError::Forbidden));

    // Only the creator or a moderator may change the policy.
    let open_up = UpdateDocumentDto {
        title: None,
        content: None,
        edit_policy: Some(EditPolicy::Moderators),
        expected_version: 1,
    };
    let restricted = docs.update_document(doc.id, ALICE, open_up).await.unwrap();
    assert_eq!(restricted.edit_policy, EditPolicy::Moderators);

    let err = docs
        .update_document(doc.id, ALICE, content_update("still mine?", 2))
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentError::Forbidden));

    let by_owner = docs
        .update_document(doc.id, OWNER, content_update("moderated", 2))
        .await
        .unwrap();
    assert_eq!(by_owner.version, 3);
}

#[tokio::test]
async fn test_restore_writes_a_new_version() {
    let (hub, community_id) = space(Visibility::Public).await;
    let docs = hub.documents();
    let doc = document(&hub, community_id, EditPolicy::Members).await;
    docs.update_document(doc.id, BOB, content_update("second", 1))
        .await
        .unwrap();
    docs.update_document(doc.id, ALICE, content_update("third", 2))
        .await
        .unwrap();

    let restored = docs.restore_revision(doc.id, 1, BOB).await.unwrap();
    assert_eq!(restored.version, 4);
    assert_eq!(restored.content, "first draft");
    assert_eq!(restored.title, doc.title);

    let history = docs.list_revisions(doc.id, OUTSIDER).await.unwrap();
    let versions: Vec<i32> = history.iter().map(|r| r.version).collect();
    assert_eq!(versions, vec![4, 3, 2, 1]);
    assert_eq!(history[0].content_hash, history[3].content_hash);
    assert_eq!(history[0].edited_by, BOB);

    let second = docs.get_revision(doc.id, 2, ALICE).await.unwrap();
    assert_eq!(second.content, "second");

    let err = docs.restore_revision(doc.id, 9, BOB).await.unwrap_err();
    assert!(matches!(err, DocumentError::RevisionNotFound));
}

#[tokio::test]
async fn test_delete_hides_document() {
    let (hub, community_id) = space(Visibility::Public).await;
    let docs = hub.documents();
    let doc = document(&hub, community_id, EditPolicy::Members).await;

    let err = docs.delete_document(doc.id, BOB).await.unwrap_err();
    assert!(matches!(err, DocumentError::Forbidden));

    docs.delete_document(doc.id, OWNER).await.unwrap();
    assert!(hub
        .publisher
        .events_on(&format!("document:{}", doc.id))
        .contains(&"document.deleted".to_string()));

    let err = docs.get_document(doc.id, ALICE).await.unwrap_err();
    assert!(matches!(err, DocumentError::NotFound));
    assert!(docs
        .list_documents(community_id, ALICE)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_listing_is_most_recently_updated_first() {
    let (hub, community_id) = space(Visibility::Public).await;
    let docs = hub.documents();
    let older = document(&hub, community_id, EditPolicy::Members).await;
    let newer = document(&hub, community_id, EditPolicy::Members).await;

    docs.update_document(older.id, BOB, content_update("bumped", 1))
        .await
        .unwrap();

    let listed = docs.list_documents(community_id, OUTSIDER).await.unwrap();
    let ids: Vec<i64> = listed.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![older.id, newer.id]);
    assert_eq!(listed[0].version, 2);
}

#[tokio::test]
async fn test_private_documents_need_membership() {
    let (hub, community_id) = space(Visibility::Private).await;
    let docs = hub.documents();
    let doc = document(&hub, community_id, EditPolicy::Members).await;

    let err = docs.get_document(doc.id, OUTSIDER).await.unwrap_err();
    assert!(matches!(err, DocumentError::Forbidden));
    let err = docs.list_revisions(doc.id, OUTSIDER).await.unwrap_err();
    assert!(matches!(err, DocumentError::Forbidden));

    assert_eq!(docs.get_document(doc.id, BOB).await.unwrap().id, doc.id);
}

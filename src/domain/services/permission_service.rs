//! Permission checks over community membership.
//!
//! Every check takes the actor's membership row (or `None` for
//! non-members). Pending and banned memberships fail every check.

use crate::domain::entities::{EditPolicy, Member, MemberRole};

/// Domain service for role-based authorization.
pub struct PermissionService;

impl PermissionService {
    /// Active member of the community.
    pub fn is_active_member(member: Option<&Member>) -> bool {
        member.is_some_and(Member::is_active)
    }

    /// Owners and moderators.
    pub fn can_moderate(member: Option<&Member>) -> bool {
        member.is_some_and(Member::is_moderator)
    }

    /// Community settings and role changes are owner-only.
    pub fn can_manage_community(member: Option<&Member>) -> bool {
        member.is_some_and(Member::is_owner)
    }

    /// Editing content is reserved to its author, who must still be active.
    pub fn can_edit_own(author_id: i64, actor_id: i64, member: Option<&Member>) -> bool {
        author_id == actor_id && Self::is_active_member(member)
    }

    /// Authors delete their own content; moderators delete anyone's.
    pub fn can_delete(author_id: i64, actor_id: i64, member: Option<&Member>) -> bool {
        Self::can_edit_own(author_id, actor_id, member) || Self::can_moderate(member)
    }

    pub fn can_pin_in_channel(member: Option<&Member>) -> bool {
        Self::can_moderate(member)
    }

    /// The thread starter curates pins in their own thread.
    pub fn can_pin_in_thread(root_author_id: i64, actor_id: i64, member: Option<&Member>) -> bool {
        Self::can_moderate(member) || Self::can_edit_own(root_author_id, actor_id, member)
    }

    pub fn can_edit_document(
        policy: EditPolicy,
        created_by: i64,
        actor_id: i64,
        member: Option<&Member>,
    ) -> bool {
        match policy {
            EditPolicy::Members => Self::is_active_member(member),
            EditPolicy::Moderators => Self::can_moderate(member),
            EditPolicy::Author => Self::can_edit_own(created_by, actor_id, member),
        }
    }

    /// Whether `actor` may remove or ban `target`.
    ///
    /// Nobody acts on the owner; only the owner acts on moderators.
    pub fn can_act_on_member(actor: Option<&Member>, target: &Member) -> bool {
        if actor.is_some_and(|a| a.user_id == target.user_id) {
            return false;
        }
        match target.role {
            MemberRole::Owner => false,
            MemberRole::Moderator => Self::can_manage_community(actor),
            MemberRole::Member => Self::can_moderate(actor),
        }
    }
}

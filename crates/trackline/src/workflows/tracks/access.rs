use super::domain::{MemberId, MemberRole, Membership, Organization};

/// Authority under which a member may act as an admin over a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCapability {
    OrgOwner,
    OrgAdmin,
    TrackAdmin,
}

impl AdminCapability {
    pub const fn label(self) -> &'static str {
        match self {
            AdminCapability::OrgOwner => "org_owner",
            AdminCapability::OrgAdmin => "org_admin",
            AdminCapability::TrackAdmin => "track_admin",
        }
    }
}

/// The single place admin authority over a track is decided. Org owners and
/// org admins hold it everywhere in the org; otherwise an admin-role
/// membership on the track itself is required.
pub fn admin_capability(
    actor: &MemberId,
    org: &Organization,
    membership: Option<&Membership>,
) -> Option<AdminCapability> {
    if org.owner == *actor {
        return Some(AdminCapability::OrgOwner);
    }
    if org.admins.contains(actor) {
        return Some(AdminCapability::OrgAdmin);
    }
    match membership {
        Some(held) if held.member_id == *actor && held.role == MemberRole::Admin => {
            Some(AdminCapability::TrackAdmin)
        }
        _ => None,
    }
}

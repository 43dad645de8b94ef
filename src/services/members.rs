//! Member registry service

use std::sync::Arc;

use validator::Validate;

use super::{non_blank, today};
use crate::{
    error::AppResult,
    models::{
        loan::LoanDetails,
        member::{CreateMember, Member, MemberLogin, NewMember},
    },
    repository::LibraryStore,
};

#[derive(Clone)]
pub struct MembersService {
    store: Arc<dyn LibraryStore>,
}

impl MembersService {
    pub fn new(store: Arc<dyn LibraryStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> AppResult<Vec<Member>> {
        self.store.members_list().await
    }

    pub async fn get(&self, id: i32) -> AppResult<Member> {
        self.store.members_get(id).await
    }

    /// Register a new member
    pub async fn register(&self, member: CreateMember) -> AppResult<Member> {
        member.validate()?;

        let new_member = NewMember {
            name: member.name.trim().to_string(),
            group_label: non_blank(member.group_label.as_deref()),
            registered_on: today(),
        };
        let created = self.store.members_create(&new_member).await?;
        tracing::info!(member_id = created.id, name = %created.name, "Member registered");
        Ok(created)
    }

    /// Name-based login. Returns the member and whether it was just registered.
    pub async fn login(&self, login: MemberLogin) -> AppResult<(Member, bool)> {
        login.validate()?;

        if let Some(member) = self.store.members_find_by_name(login.name.trim()).await? {
            tracing::debug!(member_id = member.id, "Member logged in");
            return Ok((member, false));
        }

        let member = self.register(login.into()).await?;
        Ok((member, true))
    }

    /// Remove a member that holds no open loan
    pub async fn delete(&self, id: i32) -> AppResult<i32> {
        self.store.members_delete(id).await?;
        tracing::info!(member_id = id, "Member deleted");
        Ok(id)
    }

    /// Open loans held by a member
    pub async fn open_loans(&self, member_id: i32) -> AppResult<Vec<LoanDetails>> {
        // Verify member exists
        self.store.members_get(member_id).await?;
        self.store.loans_open_for_member(member_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::AppError, repository::MemoryStore};

    fn service() -> MembersService {
        MembersService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_register_trims_and_drops_blank_group() {
        let members = service();
        let created = members
            .register(CreateMember {
                name: "  Siti Nurhaliza ".to_string(),
                group_label: Some("   ".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(created.name, "Siti Nurhaliza");
        assert_eq!(created.group_label, None);
        assert_eq!(members.get(created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_register_requires_name() {
        let err = service()
            .register(CreateMember::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_login_finds_existing_member_case_insensitively() {
        let members = service();
        let (first, created) = members
            .login(MemberLogin {
                name: "Budi".to_string(),
                group_label: Some("XI IPA 2".to_string()),
            })
            .await
            .unwrap();
        assert!(created);
        assert_eq!(first.group_label.as_deref(), Some("XI IPA 2"));

        let (again, created) = members
            .login(MemberLogin {
                name: " BUDI ".to_string(),
                group_label: None,
            })
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(again.id, first.id);
        assert_eq!(members.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_unknown_member() {
        let err = service().delete(42).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_open_loans_of_unknown_member() {
        let err = service().open_loans(7).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}

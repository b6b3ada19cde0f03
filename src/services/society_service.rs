use crate::error::{AppError, AppResult};
use crate::models::society::{generate_join_code, normalize_join_code};
use crate::models::{MemberProfile, NotificationKind, Society};
use crate::repositories::{JoinOutcome, SocietyMemberRepository, SocietyRepository};
use crate::services::NotificationService;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const JOIN_CODE_ATTEMPTS: usize = 8;
const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSocietyRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Service for societies and their membership
pub struct SocietyService {
    society_repo: Arc<SocietyRepository>,
    member_repo: Arc<SocietyMemberRepository>,
    notifications: Arc<NotificationService>,
}

impl SocietyService {
    pub fn new(
        society_repo: Arc<SocietyRepository>,
        member_repo: Arc<SocietyMemberRepository>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            society_repo,
            member_repo,
            notifications,
        }
    }

    pub async fn create_society(&self, creator_id: Uuid, request: CreateSocietyRequest) -> AppResult<Society> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Society name is required".to_string()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(AppError::Validation(format!(
                "Society name exceeds {} characters",
                MAX_NAME_LEN
            )));
        }

        let join_code = self.unused_join_code().await?;
        let description = trimmed(request.description.as_deref());
        let location = trimmed(request.location.as_deref());

        let society = self
            .society_repo
            .create_with_creator(name, description, location, &join_code, creator_id)
            .await?;

        info!("Created society {} ({}) by {}", society.name, society.id, creator_id);
        Ok(society)
    }

    /// Join by code, case-insensitively. Idempotent for existing active members.
    pub async fn join_by_code(&self, user_id: Uuid, code: &str) -> AppResult<(Society, JoinOutcome)> {
        let code = normalize_join_code(code)
            .ok_or_else(|| AppError::Validation("Join code must be 6 letters or digits".to_string()))?;
        let society = self
            .society_repo
            .find_by_join_code(&code)
            .await?
            .ok_or_else(|| AppError::NotFound("No society with that join code".to_string()))?;

        let outcome = self.member_repo.join(society.id, user_id).await?;
        if outcome != JoinOutcome::AlreadyMember {
            info!("User {} joined society {} ({:?})", user_id, society.id, outcome);
            if society.created_by != user_id {
                self.notifications
                    .notify_or_log(
                        society.created_by,
                        NotificationKind::SocietyJoined,
                        "New society member",
                        &format!("A new member joined {}", society.name),
                        Some(society.id),
                    )
                    .await;
            }
        }

        // Re-read so the member count reflects the join
        let society = self.get_society(society.id).await?;
        Ok((society, outcome))
    }

    pub async fn leave(&self, user_id: Uuid, society_id: Uuid) -> AppResult<()> {
        if !self.member_repo.leave(society_id, user_id).await? {
            return Err(AppError::NotFound("You are not a member of this society".to_string()));
        }
        info!("User {} left society {}", user_id, society_id);
        Ok(())
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Society>> {
        Ok(self.society_repo.list_for_user(user_id).await?)
    }

    /// Society details, visible to its members only
    pub async fn get(&self, viewer_id: Uuid, society_id: Uuid) -> AppResult<Society> {
        let society = self.get_society(society_id).await?;
        self.require_member(society_id, viewer_id).await?;
        Ok(society)
    }

    pub async fn members(&self, viewer_id: Uuid, society_id: Uuid) -> AppResult<Vec<MemberProfile>> {
        self.get_society(society_id).await?;
        self.require_member(society_id, viewer_id).await?;
        Ok(self.member_repo.find_by_society(society_id).await?)
    }

    pub async fn require_member(&self, society_id: Uuid, user_id: Uuid) -> AppResult<()> {
        if !self.member_repo.is_active_member(society_id, user_id).await? {
            return Err(AppError::Forbidden("You are not a member of this society".to_string()));
        }
        Ok(())
    }

    async fn get_society(&self, society_id: Uuid) -> AppResult<Society> {
        self.society_repo
            .find_by_id(society_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Society {} not found", society_id)))
    }

    async fn unused_join_code(&self) -> AppResult<String> {
        for _ in 0..JOIN_CODE_ATTEMPTS {
            let code = generate_join_code();
            if !self.society_repo.join_code_exists(&code).await? {
                return Ok(code);
            }
        }
        Err(AppError::Message("Could not allocate a join code".to_string()))
    }
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

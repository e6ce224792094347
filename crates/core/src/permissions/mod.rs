//! Permission system for session operations

use crate::error::{Error, Result};
use crate::models::Role;

/// Actions a connection can request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    // Poll management
    CreatePoll,
    SetCorrectAnswer,

    // Roster management
    RemoveStudent,

    // Participation
    SubmitAnswer,

    // Chat
    SendMessage,
}

impl SessionAction {
    pub fn describe(&self) -> &'static str {
        match self {
            SessionAction::CreatePoll => "create polls",
            SessionAction::SetCorrectAnswer => "set the correct answer",
            SessionAction::RemoveStudent => "remove students",
            SessionAction::SubmitAnswer => "submit answers",
            SessionAction::SendMessage => "send messages",
        }
    }
}

/// Permission matrix for session roles. `None` is a connection that has not
/// joined as either role yet.
pub struct PermissionMatrix;

impl PermissionMatrix {
    /// Check if a role has permission to perform an action
    pub fn can_perform(role: Option<Role>, action: SessionAction) -> bool {
        match action {
            // Teacher only
            SessionAction::CreatePoll => role == Some(Role::Teacher),
            SessionAction::SetCorrectAnswer => role == Some(Role::Teacher),
            SessionAction::RemoveStudent => role == Some(Role::Teacher),

            // Student only
            SessionAction::SubmitAnswer => role == Some(Role::Student),

            // Anyone connected
            SessionAction::SendMessage => true,
        }
    }

    /// Like [`can_perform`](Self::can_perform) but as a `NotAuthorized` error
    pub fn require(role: Option<Role>, action: SessionAction) -> Result<()> {
        if Self::can_perform(role, action) {
            Ok(())
        } else {
            Err(Error::NotAuthorized(format!(
                "only {} may {}",
                match action {
                    SessionAction::SubmitAnswer => "students",
                    _ => "teachers",
                },
                action.describe()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teacher_permissions() {
        let teacher = Some(Role::Teacher);
        assert!(PermissionMatrix::can_perform(teacher, SessionAction::CreatePoll));
        assert!(PermissionMatrix::can_perform(teacher, SessionAction::SetCorrectAnswer));
        assert!(PermissionMatrix::can_perform(teacher, SessionAction::RemoveStudent));
        assert!(PermissionMatrix::can_perform(teacher, SessionAction::SendMessage));
        assert!(!PermissionMatrix::can_perform(teacher, SessionAction::SubmitAnswer));
    }

    #[test]
    fn test_student_permissions() {
        let student = Some(Role::Student);
        assert!(PermissionMatrix::can_perform(student, SessionAction::SubmitAnswer));
        assert!(PermissionMatrix::can_perform(student, SessionAction::SendMessage));
        assert!(!PermissionMatrix::can_perform(student, SessionAction::CreatePoll));
        assert!(!PermissionMatrix::can_perform(student, SessionAction::RemoveStudent));
    }

    #[test]
    fn test_unjoined_connection() {
        assert!(!PermissionMatrix::can_perform(None, SessionAction::CreatePoll));
        assert!(!PermissionMatrix::can_perform(None, SessionAction::SubmitAnswer));
        assert!(PermissionMatrix::can_perform(None, SessionAction::SendMessage));
    }

    #[test]
    fn test_require() {
        let err = PermissionMatrix::require(Some(Role::Student), SessionAction::CreatePoll)
            .unwrap_err();
        assert_eq!(err.code(), "NOT_AUTHORIZED");
        assert!(err.to_string().contains("teachers"));
        assert!(PermissionMatrix::require(Some(Role::Teacher), SessionAction::CreatePoll).is_ok());
    }
}

//! Moderator Resolver: skill matching with admin fallback.
//!
//! ```text
//! related skills
//!   ├─ empty            → SkillPattern::Any  (every moderator qualifies)
//!   └─ ["Docker", "CI"] → (?i)(?:Docker|CI)  (substring, case-insensitive)
//!
//! best matching moderator ─▶ lowest-id admin ─▶ None (ticket stays unassigned)
//! ```
//!
//! Ranking is deterministic: most matching skills first, then lowest user id.

use std::cmp::Reverse;
use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::adapters::{AdapterResult, TicketStore};
use crate::model::User;

/// Which moderator skills qualify for a ticket.
#[derive(Debug, Clone)]
pub enum SkillPattern {
    /// No skills to match on: every moderator is a candidate.
    Any,
    /// Case-insensitive alternation of the ticket's skills.
    Matching(Regex),
}

impl SkillPattern {
    /// Build a pattern from a ticket's related skills.
    ///
    /// Skills are trimmed and regex-escaped; blank entries are ignored. If
    /// nothing usable remains the result is [`SkillPattern::Any`].
    pub fn from_skills(skills: &[String]) -> Self {
        let alternatives: Vec<String> = skills
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(regex::escape)
            .collect();
        if alternatives.is_empty() {
            return Self::Any;
        }
        let source = format!("(?i)(?:{})", alternatives.join("|"));
        match Regex::new(&source) {
            Ok(regex) => Self::Matching(regex),
            // Escaped literals always compile; only the size limit can trip.
            Err(e) => {
                tracing::warn!(error = %e, "Skill pattern rejected, matching all moderators");
                Self::Any
            }
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Whether a single user skill qualifies.
    pub fn matches(&self, skill: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Matching(regex) => regex.is_match(skill),
        }
    }

    /// Number of the user's skills this pattern matches.
    ///
    /// Under `Any` every candidate scores zero so only the id breaks ties.
    pub fn score(&self, user: &User) -> usize {
        match self {
            Self::Any => 0,
            Self::Matching(_) => user.skills.iter().filter(|s| self.matches(s)).count(),
        }
    }

    /// Whether the user is a candidate at all.
    pub fn qualifies(&self, user: &User) -> bool {
        match self {
            Self::Any => true,
            Self::Matching(_) => user.skills.iter().any(|s| self.matches(s)),
        }
    }
}

/// Pick the best moderator for `pattern`, or `None` if nobody qualifies.
pub fn rank_moderators(moderators: Vec<User>, pattern: &SkillPattern) -> Option<User> {
    moderators
        .into_iter()
        .filter(|u| pattern.qualifies(u))
        .min_by(|a, b| {
            (Reverse(pattern.score(a)), &a.id).cmp(&(Reverse(pattern.score(b)), &b.id))
        })
}

/// Pick the fallback admin: lowest id.
pub fn rank_admins(admins: Vec<User>) -> Option<User> {
    admins.into_iter().min_by(|a, b| a.id.cmp(&b.id))
}

/// Resolves the assignee for a ticket from the user directory.
pub struct ModeratorResolver {
    store: Arc<dyn TicketStore>,
}

impl ModeratorResolver {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    /// Best moderator for `related_skills`, else an admin, else `None`.
    pub async fn resolve(&self, related_skills: &[String]) -> AdapterResult<Option<User>> {
        let pattern = SkillPattern::from_skills(related_skills);

        if let Some(moderator) = self.store.find_moderator(&pattern).await? {
            debug!(user_id = %moderator.id, match_all = pattern.is_any(), "Moderator resolved");
            return Ok(Some(moderator));
        }

        let admin = self.store.find_admin().await?;
        match &admin {
            Some(user) => debug!(user_id = %user.id, "No moderator matched, falling back to admin"),
            None => debug!("No moderator or admin available"),
        }
        Ok(admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStore;
    use crate::model::Role;

    fn user(id: &str, role: Role, skills: &[&str]) -> User {
        User {
            id: id.into(),
            email: format!("{id}@example.com"),
            role,
            skills: skills.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn skills(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    async fn store_with(users: Vec<User>) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for u in users {
            store.put_user(u).await;
        }
        store
    }

    #[test]
    fn test_empty_skills_match_all() {
        assert!(SkillPattern::from_skills(&[]).is_any());
        assert!(SkillPattern::from_skills(&skills(&["", "  "])).is_any());
    }

    #[test]
    fn test_pattern_is_case_insensitive_substring() {
        let pattern = SkillPattern::from_skills(&skills(&["Docker", "CI"]));
        assert!(pattern.matches("docker"));
        assert!(pattern.matches("Docker Compose"));
        assert!(pattern.matches("gitlab ci"));
        assert!(!pattern.matches("kubernetes"));
    }

    #[test]
    fn test_pattern_escapes_metacharacters() {
        let pattern = SkillPattern::from_skills(&skills(&["C++", "node.js"]));
        assert!(pattern.matches("c++"));
        assert!(pattern.matches("Node.js"));
        assert!(!pattern.matches("nodexjs"));
    }

    #[test]
    fn test_rank_prefers_more_matching_skills() {
        let pattern = SkillPattern::from_skills(&skills(&["rust", "tokio"]));
        let picked = rank_moderators(
            vec![
                user("m-1", Role::Moderator, &["rust"]),
                user("m-2", Role::Moderator, &["Rust", "Tokio"]),
            ],
            &pattern,
        )
        .unwrap();
        assert_eq!(picked.id, "m-2");
    }

    #[test]
    fn test_rank_ties_break_on_lowest_id() {
        let pattern = SkillPattern::from_skills(&skills(&["kubernetes"]));
        for order in [["m-b", "m-a"], ["m-a", "m-b"]] {
            let users = order
                .iter()
                .map(|id| user(id, Role::Moderator, &["Kubernetes"]))
                .collect();
            assert_eq!(rank_moderators(users, &pattern).unwrap().id, "m-a");
        }
    }

    #[test]
    fn test_any_pattern_includes_moderators_without_skills() {
        let picked = rank_moderators(
            vec![
                user("m-2", Role::Moderator, &["docker"]),
                user("m-1", Role::Moderator, &[]),
            ],
            &SkillPattern::Any,
        )
        .unwrap();
        assert_eq!(picked.id, "m-1");
    }

    #[tokio::test]
    async fn test_resolve_matching_moderator_over_admin() {
        let store = store_with(vec![
            user("a-1", Role::Admin, &[]),
            user("m-1", Role::Moderator, &["docker"]),
        ])
        .await;
        let resolver = ModeratorResolver::new(store);
        let picked = resolver.resolve(&skills(&["Docker"])).await.unwrap();
        assert_eq!(picked.unwrap().id, "m-1");
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_admin() {
        let store = store_with(vec![
            user("a-2", Role::Admin, &[]),
            user("a-1", Role::Admin, &[]),
            user("m-1", Role::Moderator, &["networking"]),
        ])
        .await;
        let resolver = ModeratorResolver::new(store);
        let picked = resolver.resolve(&skills(&["Docker"])).await.unwrap();
        assert_eq!(picked.unwrap().id, "a-1");
    }

    #[tokio::test]
    async fn test_resolve_none_when_directory_empty() {
        let store = store_with(vec![user("u-1", Role::User, &["docker"])]).await;
        let resolver = ModeratorResolver::new(store);
        assert!(resolver.resolve(&skills(&["docker"])).await.unwrap().is_none());
        assert!(resolver.resolve(&[]).await.unwrap().is_none());
    }
}

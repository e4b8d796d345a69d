//! Per-caller repository context.

/// Acting user, their groups and the table prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoContext {
    pub user_id: String,
    pub group_ids: Vec<String>,
    /// Table prefix; `<schema>_<table>` when non-empty.
    pub schema: String,
}

impl RepoContext {
    pub fn new(user_id: &str, group_ids: &[&str], schema: &str) -> Self {
        let mut context = Self {
            user_id: user_id.to_string(),
            group_ids: Vec::new(),
            schema: schema.to_string(),
        };
        for group_id in group_ids {
            context.add_group(group_id);
        }
        context
    }

    /// Context with no acting user.
    pub fn anonymous(schema: &str) -> Self {
        Self::new("", &[], schema)
    }

    pub fn is_in_group(&self, group_id: &str) -> bool {
        self.group_ids.iter().any(|candidate| candidate == group_id)
    }

    /// Adds `group_id` unless already present.
    pub fn add_group(&mut self, group_id: &str) {
        if !self.is_in_group(group_id) {
            self.group_ids.push(group_id.to_string());
        }
    }

    pub fn is_user(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    pub fn has_user(&self) -> bool {
        !self.user_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::RepoContext;

    #[test]
    fn groups_are_deduplicated() {
        let mut context = RepoContext::new("u1", &["g1", "g1"], "rprj");
        context.add_group("g2");
        context.add_group("g1");
        assert_eq!(context.group_ids, vec!["g1".to_string(), "g2".to_string()]);
        assert!(context.is_in_group("g2"));
        assert!(!context.is_in_group("g3"));
    }

    #[test]
    fn user_identity_checks() {
        let context = RepoContext::new("u1", &[], "rprj");
        assert!(context.is_user("u1"));
        assert!(!context.is_user("u2"));
        assert!(!RepoContext::anonymous("rprj").has_user());
    }
}

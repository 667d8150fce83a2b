use serde::{Deserialize, Serialize};

pub const MIN_SEMESTER: i64 = 1;
pub const MAX_SEMESTER: i64 = 8;

/// One class cohort: the unit every timetable partition and roster belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionScope {
    pub branch: String,
    pub semester: i64,
    pub section: String,
}

impl SectionScope {
    pub fn new(branch: impl Into<String>, semester: i64, section: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            semester,
            section: section.into(),
        }
    }

    /// Storage partition name. Existing workspaces are keyed by this exact
    /// string, so the format (including the lowercased section) is fixed.
    pub fn partition_name(&self) -> String {
        partition_name(&self.branch, self.semester, &self.section)
    }

    /// Ledger ownership compares sections case-insensitively, matching the
    /// partition name.
    pub fn same_section(&self, branch: &str, semester: i64, section: &str) -> bool {
        self.branch == branch
            && self.semester == semester
            && self.section.eq_ignore_ascii_case(section)
    }

    pub fn label(&self) -> String {
        format!("{} {}-{}", self.branch, self.semester, self.section)
    }
}

pub fn partition_name(branch: &str, semester: i64, section: &str) -> String {
    format!(
        "{}_{}th_sem_{}_section",
        branch,
        semester,
        section.to_lowercase()
    )
}

/// Reads `branch`, `semester`, `section` out of request params.
pub fn scope_from_params(params: &serde_json::Value) -> Result<SectionScope, String> {
    let branch = params
        .get("branch")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| "missing branch".to_string())?;
    if branch.is_empty() {
        return Err("branch must not be empty".into());
    }
    let semester = match params.get("semester") {
        Some(v) if v.is_i64() => v.as_i64().unwrap_or_default(),
        Some(v) if v.is_string() => v
            .as_str()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or_else(|| "semester must be an integer".to_string())?,
        Some(_) => return Err("semester must be an integer".into()),
        None => return Err("missing semester".into()),
    };
    if !(MIN_SEMESTER..=MAX_SEMESTER).contains(&semester) {
        return Err(format!(
            "semester must be in {}..={}",
            MIN_SEMESTER, MAX_SEMESTER
        ));
    }
    let section = params
        .get("section")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| "missing section".to_string())?;
    if section.is_empty() {
        return Err("section must not be empty".into());
    }
    Ok(SectionScope::new(branch, semester, section))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partition_name_lowercases_section_only() {
        let scope = SectionScope::new("Computer Science", 5, "b");
        assert_eq!(scope.partition_name(), "Computer Science_5th_sem_b_section");

        let upper = SectionScope::new("Computer Science", 5, "B");
        assert_eq!(upper.partition_name(), "Computer Science_5th_sem_b_section");
    }

    #[test]
    fn partition_name_keeps_th_suffix_for_every_semester() {
        assert_eq!(
            partition_name("Civil Engineering", 1, "A"),
            "Civil Engineering_1th_sem_a_section"
        );
        assert_eq!(
            partition_name("Civil Engineering", 2, "A"),
            "Civil Engineering_2th_sem_a_section"
        );
    }

    #[test]
    fn scope_from_params_accepts_string_semester() {
        let scope = scope_from_params(&json!({
            "branch": "Mechanical Engineering",
            "semester": "3",
            "section": "C"
        }))
        .expect("scope");
        assert_eq!(scope.semester, 3);
        assert_eq!(scope.section, "C");
    }

    #[test]
    fn scope_from_params_rejects_out_of_range_semester() {
        let e = scope_from_params(&json!({
            "branch": "Mechanical Engineering",
            "semester": 9,
            "section": "C"
        }))
        .unwrap_err();
        assert!(e.contains("semester"));
    }

    #[test]
    fn same_section_ignores_section_case() {
        let scope = SectionScope::new("ECE", 4, "a");
        assert!(scope.same_section("ECE", 4, "A"));
        assert!(!scope.same_section("ECE", 3, "a"));
        assert!(!scope.same_section("EEE", 4, "a"));
    }
}

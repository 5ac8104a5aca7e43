//! Section-based policy file parsing.

use lodestone_types::PrivilegeError;
use thiserror::Error;
use tracing::warn;

use crate::document::PolicyDocument;

/// Errors produced while parsing a policy document.
///
/// Every variant carries the 1-based line number of the offending line.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A line was not a section header, a comment, or `name = value`.
    #[error("line {line}: expected 'name = value', got {content:?}")]
    Syntax { line: usize, content: String },

    /// A section header named a section the format does not define.
    #[error("line {line}: unknown section [{name}]")]
    UnknownSection { line: usize, name: String },

    /// An entry appeared before any section header.
    #[error("line {line}: entry before any section header")]
    EntryOutsideSection { line: usize },

    /// A `[roles]` entry contained a privilege string that failed to parse.
    #[error("line {line}: invalid privilege {text:?}: {source}")]
    InvalidPrivilege {
        line: usize,
        text: String,
        source: PrivilegeError,
    },
}

/// The sections a policy document may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Groups,
    Roles,
    Users,
    Databases,
    /// An unknown section the caller chose to ignore; entries are skipped.
    Ignored,
}

impl Section {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "groups" => Some(Section::Groups),
            "roles" => Some(Section::Roles),
            "users" => Some(Section::Users),
            "databases" => Some(Section::Databases),
            _ => None,
        }
    }
}

/// Parser for the section-based policy format.
///
/// Recognizes `[groups]`, `[roles]`, `[users]` and `[databases]` sections
/// with `name = value[, value...]` bodies. Blank lines and lines starting
/// with `#` or `;` are skipped. Privilege strings in `[roles]` entries are
/// parsed to structured form immediately, so a malformed privilege fails
/// the document load.
#[derive(Debug, Clone, Default)]
pub struct PolicyParser {
    allow_unknown_sections: bool,
}

impl PolicyParser {
    /// Creates a parser with default options (unknown sections rejected).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether unknown sections are skipped (with a warning) instead
    /// of failing the parse.
    #[must_use]
    pub fn allow_unknown_sections(mut self, allow: bool) -> Self {
        self.allow_unknown_sections = allow;
        self
    }

    /// Parses raw policy text into a [`PolicyDocument`].
    pub fn parse(&self, text: &str) -> Result<PolicyDocument, PolicyError> {
        let mut doc = PolicyDocument::new();
        let mut section: Option<Section> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if let Some(name) = header_name(trimmed) {
                section = Some(match Section::from_name(name) {
                    Some(s) => s,
                    None if self.allow_unknown_sections => {
                        warn!(section = %name, line, "skipping unknown policy section");
                        Section::Ignored
                    }
                    None => {
                        return Err(PolicyError::UnknownSection {
                            line,
                            name: name.to_string(),
                        });
                    }
                });
                continue;
            }

            let Some(section) = section else {
                return Err(PolicyError::EntryOutsideSection { line });
            };

            if section == Section::Ignored {
                continue;
            }

            // A role with no privileges is valid (but useless), so only
            // `[roles]` entries may have an empty value.
            let (name, value) = split_entry(trimmed, line, section == Section::Roles)?;
            match section {
                Section::Groups => doc.add_group(name, split_list(value)),
                Section::Users => doc.add_user(name, split_list(value)),
                Section::Roles => {
                    let mut privileges = Vec::new();
                    for text in split_list(value) {
                        let privilege =
                            text.parse()
                                .map_err(|source| PolicyError::InvalidPrivilege {
                                    line,
                                    text: text.clone(),
                                    source,
                                })?;
                        privileges.push(privilege);
                    }
                    doc.add_role(name, privileges);
                }
                Section::Databases => doc.add_database(name, value),
                Section::Ignored => {}
            }
        }

        Ok(doc)
    }
}

/// Returns the section name if the line is a `[name]` header.
fn header_name(line: &str) -> Option<&str> {
    line.strip_prefix('[')?.strip_suffix(']').map(str::trim)
}

/// Splits a `name = value` entry. The name must be non-empty; the value
/// may be empty only when the caller allows it.
fn split_entry(
    line: &str,
    line_no: usize,
    allow_empty_value: bool,
) -> Result<(&str, &str), PolicyError> {
    let syntax = || PolicyError::Syntax {
        line: line_no,
        content: line.to_string(),
    };
    let (name, value) = line.split_once('=').ok_or_else(syntax)?;
    let (name, value) = (name.trim(), value.trim());
    if name.is_empty() || (value.is_empty() && !allow_empty_value) {
        return Err(syntax());
    }
    Ok((name, value))
}

/// Splits a comma-or-whitespace separated value list.
fn split_list(value: &str) -> Vec<String> {
    value
        .split([',', ' ', '\t'])
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestone_types::{Action, Privilege, Resource};
    use test_case::test_case;

    fn parse(text: &str) -> PolicyDocument {
        PolicyParser::new().parse(text).unwrap()
    }

    #[test]
    fn parses_all_sections() {
        let doc = parse(
            "[groups]\n\
             admin = all_server\n\
             user_group1 = select_tbl1\n\
             [roles]\n\
             all_server = server=server1\n\
             select_tbl1 = server=server1->db=db1->table=tbl1->action=select\n\
             [users]\n\
             user_1 = user_group1\n\
             [databases]\n\
             db2 = /policies/db2-policy.ini\n",
        );

        assert_eq!(doc.groups()["admin"], vec!["all_server".to_string()]);
        assert_eq!(
            doc.roles()["select_tbl1"],
            vec![Privilege::new(
                Resource::table("server1", "db1", "tbl1"),
                Action::Select
            )]
        );
        assert_eq!(doc.users()["user_1"], vec!["user_group1".to_string()]);
        assert_eq!(
            doc.databases()["db2"].to_str(),
            Some("/policies/db2-policy.ini")
        );
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let doc = parse(
            "# group assignments\n\
             \n\
             [groups]\n\
             ; legacy entry below\n\
             ops = admin_role\n",
        );
        assert_eq!(doc.groups()["ops"], vec!["admin_role".to_string()]);
    }

    #[test]
    fn merges_duplicate_group_keys() {
        let doc = parse(
            "[groups]\n\
             analysts = role_a\n\
             analysts = role_b, role_a\n",
        );
        assert_eq!(
            doc.groups()["analysts"],
            vec!["role_a".to_string(), "role_b".to_string()]
        );
    }

    #[test]
    fn splits_lists_on_commas_and_spaces() {
        let doc = parse("[users]\nuser_1 = g1, g2 g3\n");
        assert_eq!(doc.users()["user_1"], vec!["g1", "g2", "g3"]);
    }

    #[test]
    fn rejects_unknown_section_by_default() {
        let err = PolicyParser::new()
            .parse("[grants]\nx = y\n")
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyError::UnknownSection { line: 1, ref name } if name == "grants"
        ));
    }

    #[test]
    fn skips_unknown_section_when_allowed() {
        let doc = PolicyParser::new()
            .allow_unknown_sections(true)
            .parse("[grants]\nx = y\n[groups]\nops = admin_role\n")
            .unwrap();
        assert_eq!(doc.groups()["ops"], vec!["admin_role".to_string()]);
    }

    #[test]
    fn rejects_malformed_privilege_at_parse_time() {
        let err = PolicyParser::new()
            .parse("[roles]\nbad = server=s1->table=t1\n")
            .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidPrivilege { line: 2, .. }));
    }

    #[test]
    fn role_with_no_privileges_is_valid() {
        let doc = parse(
            "[roles]\n\
             shelved_role =\n\
             [groups]\n\
             ops = shelved_role\n",
        );
        assert!(doc.roles()["shelved_role"].is_empty());
        assert_eq!(doc.groups()["ops"], vec!["shelved_role".to_string()]);
    }

    #[test_case("x = y\n"; "entry before section")]
    #[test_case("[groups]\nno_equals_here\n"; "missing equals")]
    #[test_case("[groups]\n= roles\n"; "empty name")]
    #[test_case("[groups]\nops =\n"; "empty value")]
    fn rejects_malformed_lines(text: &str) {
        assert!(PolicyParser::new().parse(text).is_err());
    }

    #[test]
    fn error_reports_line_number() {
        let err = PolicyParser::new()
            .parse("[groups]\nops = admin_role\nbroken line\n")
            .unwrap_err();
        assert!(matches!(err, PolicyError::Syntax { line: 3, .. }));
    }
}

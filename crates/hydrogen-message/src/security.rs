//! Pattern scanners backing C2's security pass (spec §4.2).

const SQL_KEYWORDS: &[&str] = &[
    "select ", "insert ", "update ", "delete ", "drop ", "union ", "--", "/*", "xp_cmdshell",
];

const XSS_PATTERNS: &[&str] = &[
    "<script", "javascript:", "onerror=", "onload=", "onclick=", "eval(", "document.cookie",
];

const PATH_TRAVERSAL_PATTERNS: &[&str] = &["../", "..\\", "%2e%2e%2f", "%2e%2e/", "..%2f"];

/// One hit from scanning a string field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityFinding {
    pub kind: FindingKind,
    pub pattern: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    SqlInjection,
    Xss,
    PathTraversal,
    Blocked,
}

fn scan(haystack: &str, patterns: &[&str], kind: FindingKind) -> Vec<SecurityFinding> {
    let lower = haystack.to_lowercase();
    patterns
        .iter()
        .filter(|p| lower.contains(&p.to_lowercase()))
        .map(|p| SecurityFinding {
            kind,
            pattern: (*p).to_owned(),
        })
        .collect()
}

pub fn scan_sql_injection(s: &str) -> Vec<SecurityFinding> {
    scan(s, SQL_KEYWORDS, FindingKind::SqlInjection)
}

pub fn scan_xss(s: &str) -> Vec<SecurityFinding> {
    scan(s, XSS_PATTERNS, FindingKind::Xss)
}

pub fn scan_path_traversal(s: &str) -> Vec<SecurityFinding> {
    scan(s, PATH_TRAVERSAL_PATTERNS, FindingKind::PathTraversal)
}

/// Scan for a caller-configured set of disallowed substrings — hits are
/// hard errors (spec §4.2 "blocked substrings"), unlike the other scanners
/// which only warn.
pub fn scan_blocked_substrings(s: &str, blocked: &[String]) -> Vec<SecurityFinding> {
    let lower = s.to_lowercase();
    blocked
        .iter()
        .filter(|b| !b.is_empty() && lower.contains(&b.to_lowercase()))
        .map(|b| SecurityFinding {
            kind: FindingKind::Blocked,
            pattern: b.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_sql_keywords() {
        let hits = scan_sql_injection("name'; DROP TABLE users; --");
        assert!(hits.iter().any(|h| h.pattern == "drop "));
    }

    #[test]
    fn detects_script_tag() {
        let hits = scan_xss("<script>alert(1)</script>");
        assert!(hits.iter().any(|h| h.kind == FindingKind::Xss));
    }

    #[test]
    fn detects_path_traversal() {
        let hits = scan_path_traversal("../../etc/passwd");
        assert!(!hits.is_empty());
    }

    #[test]
    fn clean_string_has_no_findings() {
        assert!(scan_sql_injection("set_focus_position").is_empty());
        assert!(scan_xss("set_focus_position").is_empty());
        assert!(scan_path_traversal("set_focus_position").is_empty());
    }
}

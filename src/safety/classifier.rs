//! Lexical sensitivity classification of proposed actions.
//!
//! Rules are checked in a fixed order and the first match wins:
//!
//! 1. destructive command tokens (`rm -rf`, `sudo`, `mkfs`, ...) -> `shell_command`
//! 2. deletion verbs -> `file_delete`
//! 3. filesystem roots and system directories -> `file_modify`
//! 4. SQL mutation verbs -> `database_write`
//! 5. payment verbs -> `payment`
//! 6. a configuration noun next to a mutation verb -> `system_config`
//!
//! Destructive command tokens are checked before the plain deletion verbs so
//! that `rm -rf /var/data` is reported as a shell command rather than an
//! ordinary delete. Anything else is `unknown` and not sensitive.

use std::sync::LazyLock;

use aho_corasick::AhoCorasick;
use regex::Regex;
use serde::Serialize;

use crate::safety::OperationCategory;

/// Free-form key/value context that accompanies an operation.
pub type OperationContext = serde_json::Map<String, serde_json::Value>;

/// Context keys whose values are checked against the path rule.
const PATH_CONTEXT_KEYS: &[&str] = &["path", "target", "file", "directory"];

/// Command fragments that are destructive regardless of their arguments.
static DANGEROUS_COMMANDS: LazyLock<(AhoCorasick, Vec<&'static str>)> = LazyLock::new(|| {
    let patterns = vec![
        "rm -rf",
        "rm -fr",
        "rm -r ",
        "rmdir /s",
        "sudo ",
        "doas ",
        "su -",
        "mkfs",
        "format c:",
        "dd if=",
        "> /dev/sd",
        "chmod -r 777",
        "chmod 777",
        "chown -r",
        "drop table",
        "drop database",
        "truncate table",
        "kill -9",
        "killall",
        "pkill",
        "shutdown",
        "reboot",
        ":(){",
        "| sh",
        "| bash",
    ];
    let matcher = AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(&patterns)
        .expect("Failed to build dangerous command matcher");
    (matcher, patterns)
});

/// System locations written as path fragments.
static SYSTEM_PATHS: LazyLock<(AhoCorasick, Vec<&'static str>)> = LazyLock::new(|| {
    let patterns = vec![
        "/etc/",
        "/usr/",
        "/bin/",
        "/sbin/",
        "/boot/",
        "/sys/",
        "/proc/",
        "/var/",
        "/root/",
        "/lib/",
        "/dev/",
        "/system/library",
        "c:\\windows",
        "c:\\program files",
        "system32",
    ];
    let matcher = AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(&patterns)
        .expect("Failed to build system path matcher");
    (matcher, patterns)
});

/// Bare roots and system directories written as a whole token (`/`, `/etc`, `C:\`).
static ROOT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:/\*?|/(?:etc|usr|bin|sbin|boot|sys|proc|var|root|lib|dev)/?\*?|[a-z]:[\\/]\*?)$",
    )
    .expect("Invalid root token regex")
});

static DELETE_VERBS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:delet|remov)\w*|(?:^|[\s;&|])(?:rm|del|rmdir|unlink)\s|删除|移除")
        .expect("Invalid delete verb regex")
});

static SQL_MUTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:insert|update|delete|drop|alter|truncate)\b")
        .expect("Invalid SQL mutation regex")
});

static PAYMENT_VERBS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:pay|pays|paid|payment|transfer|withdraw\w*|charge)\b|支付|付款|转账|提现")
        .expect("Invalid payment regex")
});

static CONFIG_NOUNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:config|configuration|settings?|preferences?|env|environment|registry)\b|配置|设置",
    )
    .expect("Invalid config noun regex")
});

static MUTATION_VERBS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:change|modify|set|edit|overwrite|reset|disable|enable|write)\b|修改|更改|变更",
    )
    .expect("Invalid mutation verb regex")
});

/// Verdict for a single command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub is_sensitive: bool,
    pub category: OperationCategory,
    pub reason: String,
}

impl Classification {
    fn sensitive(category: OperationCategory, reason: impl Into<String>) -> Self {
        Self {
            is_sensitive: true,
            category,
            reason: reason.into(),
        }
    }

    fn benign() -> Self {
        Self {
            is_sensitive: false,
            category: OperationCategory::Unknown,
            reason: "no sensitive pattern matched".to_string(),
        }
    }
}

/// Classify a command. Pure and total.
pub fn classify(command: &str, context: Option<&OperationContext>) -> Classification {
    let text = command.to_lowercase();

    if let Some(pattern) = first_match(&DANGEROUS_COMMANDS, &text) {
        return Classification::sensitive(
            OperationCategory::ShellCommand,
            format!("destructive command pattern '{}'", pattern.trim()),
        );
    }

    if let Some(m) = DELETE_VERBS.find(&text) {
        return Classification::sensitive(
            OperationCategory::FileDelete,
            format!("deletion verb '{}'", m.as_str().trim()),
        );
    }

    let context_paths = context
        .into_iter()
        .flat_map(|ctx| PATH_CONTEXT_KEYS.iter().filter_map(move |k| ctx.get(*k)))
        .filter_map(|v| v.as_str())
        .map(str::to_lowercase);
    for candidate in std::iter::once(text.clone()).chain(context_paths) {
        if let Some(location) = system_location(&candidate) {
            return Classification::sensitive(
                OperationCategory::FileModify,
                format!("touches system location '{}'", location),
            );
        }
    }

    if let Some(m) = SQL_MUTATION.find(&text) {
        return Classification::sensitive(
            OperationCategory::DatabaseWrite,
            format!("SQL mutation '{}'", m.as_str()),
        );
    }

    if let Some(m) = PAYMENT_VERBS.find(&text) {
        return Classification::sensitive(
            OperationCategory::Payment,
            format!("payment verb '{}'", m.as_str()),
        );
    }

    if let (Some(noun), Some(verb)) = (CONFIG_NOUNS.find(&text), MUTATION_VERBS.find(&text)) {
        return Classification::sensitive(
            OperationCategory::SystemConfig,
            format!("'{}' of '{}'", verb.as_str(), noun.as_str()),
        );
    }

    Classification::benign()
}

fn first_match(
    matcher: &(AhoCorasick, Vec<&'static str>),
    text: &str,
) -> Option<&'static str> {
    let (automaton, patterns) = matcher;
    automaton
        .find(text)
        .map(|m| patterns[m.pattern().as_usize()])
}

fn system_location(text: &str) -> Option<String> {
    if let Some(pattern) = first_match(&SYSTEM_PATHS, text) {
        return Some(pattern.to_string());
    }
    text.split(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == '=')
        .find(|token| ROOT_TOKEN.is_match(token))
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_recursive_remove_is_shell_command() {
        let verdict = classify("rm -rf /var/data", None);
        assert!(verdict.is_sensitive);
        assert_eq!(verdict.category, OperationCategory::ShellCommand);
    }

    #[test]
    fn test_benign_request() {
        let verdict = classify("please tell me the weather", None);
        assert_eq!(
            verdict,
            Classification {
                is_sensitive: false,
                category: OperationCategory::Unknown,
                reason: "no sensitive pattern matched".to_string(),
            }
        );
    }

    #[test]
    fn test_deletion_verbs() {
        assert_eq!(
            classify("delete the old file", None).category,
            OperationCategory::FileDelete
        );
        assert_eq!(
            classify("rm notes.txt", None).category,
            OperationCategory::FileDelete
        );
        assert_eq!(
            classify("删除旧文件", None).category,
            OperationCategory::FileDelete
        );
        // "rm" inside a word is not a command
        assert_eq!(
            classify("fill in the form data", None).category,
            OperationCategory::Unknown
        );
    }

    #[test]
    fn test_delete_of_config_file_is_not_system_config() {
        let verdict = classify("delete the config file and change settings", None);
        assert_eq!(verdict.category, OperationCategory::FileDelete);
    }

    #[test]
    fn test_system_paths() {
        assert_eq!(
            classify("write to /etc/hosts", None).category,
            OperationCategory::FileModify
        );
        assert_eq!(
            classify(r"copy report.txt C:\Windows\System32", None).category,
            OperationCategory::FileModify
        );
        assert_eq!(
            classify("chown me /", None).category,
            OperationCategory::FileModify
        );
        assert_eq!(
            classify("chown me D:/", None).category,
            OperationCategory::FileModify
        );
    }

    #[test]
    fn test_letter_with_colon_is_not_a_drive() {
        let verdict = classify("plan a: summarize the news", None);
        assert!(!verdict.is_sensitive);
        assert_eq!(verdict.category, OperationCategory::Unknown);
    }

    #[test]
    fn test_path_from_context() {
        let mut context = OperationContext::new();
        context.insert("path".into(), serde_json::json!("/usr/local/bin/tool"));
        let verdict = classify("write_file", Some(&context));
        assert_eq!(verdict.category, OperationCategory::FileModify);

        assert_eq!(
            classify("write_file", None).category,
            OperationCategory::Unknown
        );
    }

    #[test]
    fn test_sql_payment_and_config() {
        assert_eq!(
            classify("INSERT INTO users VALUES (1)", None).category,
            OperationCategory::DatabaseWrite
        );
        assert_eq!(
            classify("transfer $40 to alice", None).category,
            OperationCategory::Payment
        );
        assert_eq!(
            classify("change the proxy settings", None).category,
            OperationCategory::SystemConfig
        );
        // A config noun alone is harmless
        assert_eq!(
            classify("show me the settings", None).category,
            OperationCategory::Unknown
        );
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(
            classify("SUDO reboot", None).category,
            OperationCategory::ShellCommand
        );
    }
}

//! `Handler@action` references and handler-name normalization.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub const ACTION_SEPARATOR: char = '@';

/// A parsed `HandlerName@action` string.
///
/// The handler part may carry `/`-separated namespace segments
/// (`Home/HomeController@index`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionRef {
    handler: String,
    action: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionParseError {
    #[error("missing '@' separator in '{0}'")]
    MissingSeparator(String),
    #[error("more than one '@' separator in '{0}'")]
    MultipleSeparators(String),
    #[error("empty handler name in '{0}'")]
    EmptyHandler(String),
    #[error("empty action name in '{0}'")]
    EmptyAction(String),
}

impl ActionRef {
    pub fn parse(s: &str) -> Result<Self, ActionParseError> {
        let raw = s.trim();
        let (handler, action) = raw
            .split_once(ACTION_SEPARATOR)
            .ok_or_else(|| ActionParseError::MissingSeparator(raw.to_string()))?;

        if action.contains(ACTION_SEPARATOR) {
            return Err(ActionParseError::MultipleSeparators(raw.to_string()));
        }
        let handler = handler.trim();
        let action = action.trim();
        if handler.is_empty() || handler.trim_matches('/').is_empty() {
            return Err(ActionParseError::EmptyHandler(raw.to_string()));
        }
        if action.is_empty() {
            return Err(ActionParseError::EmptyAction(raw.to_string()));
        }

        Ok(Self {
            handler: handler.to_string(),
            action: action.to_string(),
        })
    }

    pub fn handler(&self) -> &str {
        &self.handler
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

impl FromStr for ActionRef {
    type Err = ActionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.handler, ACTION_SEPARATOR, self.action)
    }
}

/// Collapse a `/`-separated name: drops empty and `.` segments and resolves `..`.
pub fn normalize_name(name: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for seg in name.split(['/', '\\']) {
        match seg.trim() {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s),
        }
    }
    out.join("/")
}

/// Registry key of `handler` when resolved relative to `base_dir`.
pub fn handler_key(base_dir: &str, handler: &str) -> String {
    normalize_name(&format!("{base_dir}/{handler}"))
}

/// Human-readable form of the base directory for error messages.
pub fn display_base_dir(base_dir: &str) -> String {
    let n = normalize_name(base_dir);
    if n.is_empty() {
        ".".to_string()
    } else {
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_handler_and_action() {
        let a = ActionRef::parse("Home@index").unwrap();
        assert_eq!(a.handler(), "Home");
        assert_eq!(a.action(), "index");
        assert_eq!(a.to_string(), "Home@index");
    }

    #[test]
    fn keeps_namespace_segments() {
        let a: ActionRef = "Home/HomeController@index".parse().unwrap();
        assert_eq!(a.handler(), "Home/HomeController");
    }

    #[test]
    fn rejects_missing_separator() {
        assert_eq!(
            ActionRef::parse("Home"),
            Err(ActionParseError::MissingSeparator("Home".into()))
        );
    }

    #[test]
    fn rejects_empty_halves() {
        assert!(matches!(
            ActionRef::parse("@index"),
            Err(ActionParseError::EmptyHandler(_))
        ));
        assert!(matches!(
            ActionRef::parse("Home@"),
            Err(ActionParseError::EmptyAction(_))
        ));
        assert!(matches!(
            ActionRef::parse("/@index"),
            Err(ActionParseError::EmptyHandler(_))
        ));
    }

    #[test]
    fn rejects_extra_separators() {
        assert!(matches!(
            ActionRef::parse("Home@index@again"),
            Err(ActionParseError::MultipleSeparators(_))
        ));
    }

    #[test]
    fn key_normalization() {
        assert_eq!(handler_key("backend", "Home"), "backend/Home");
        assert_eq!(handler_key("./backend/", "/Home/HomeController"), "backend/Home/HomeController");
        assert_eq!(handler_key("", "Home"), "Home");
        assert_eq!(handler_key("src/backend", "../Home"), "src/Home");
        assert_eq!(display_base_dir(""), ".");
        assert_eq!(display_base_dir("./src//backend/"), "src/backend");
    }
}

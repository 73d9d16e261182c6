//! Agent modes a chat session can target.
//!
//! The mode is fixed when a session is created and decides which remote
//! agent behaviour the session talks to. `None` (no mode) is modelled as
//! `Option<AgentMode>` at the use sites.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// `agent_type` sent to the remote agent when a session has no mode.
pub const DEFAULT_API_AGENT: &str = "default";

/// Remote agent specialization.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    /// Jira issue summarization.
    Jira,
    /// CR (change request) generation from a BR.
    Cr,
    /// Service and UI policy lookup.
    Policy,
    /// Person / owner lookup.
    Person,
}

impl AgentMode {
    /// Every mode, in menu order.
    pub const ALL: [Self; 4] = [Self::Jira, Self::Cr, Self::Policy, Self::Person];

    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jira => "jira",
            Self::Cr => "cr",
            Self::Policy => "policy",
            Self::Person => "person",
        }
    }

    /// `agent_type` value understood by the remote agent API.
    #[must_use]
    pub const fn api_name(self) -> &'static str {
        match self {
            Self::Jira => "summary",
            Self::Cr => "br_cr",
            Self::Policy => "policy",
            Self::Person => "owner",
        }
    }

    /// Canned guidance shown when the user picks this mode from the menu.
    #[must_use]
    pub const fn announcement(self) -> &'static str {
        match self {
            Self::Jira => {
                "어떤 이슈인지 금방 파악하고 싶은가요?\n**CR이나 BR 번호**만 주시면,\n히스토리부터 핵심 요점까지 정리해드릴게요."
            }
            Self::Cr => {
                "<div>사업 기획서를 개발 요청서로 바꾸고 싶을 때 사용하세요.<br><strong>BR 번호</strong>를 주시면,<br>바로 쓸 수 있는 CR 형식으로 정리해드릴게요.<br><br>기본적으로 <strong>배경, 필요 개발 컴포넌트, 카테고리, Acceptance Criteria, 요구사항</strong> 항목이 포함돼요.<br>추가로 넣고 싶은 항목이 있다면 이어서 질문해 주세요.</div>"
            }
            Self::Policy => {
                "**B tv 서비스, UI 정책**이 궁금하신가요?\n\"홈 배너 노출 조건이 뭐야?\"처럼\n구체적으로 질문해주시면 Figma, Confluence 정책 문서를 기반으로 알려드릴게요."
            }
            Self::Person => {
                "누구랑 이야기해야 할지 막막할 때 써보세요.\n궁금한 기능의 **UI·GUI·개발 담당자**를 찾는 건 물론,\n새로운 기획을 제안하거나 논의하고 싶을 때 연결할 담당자도 찾아드릴게요."
            }
        }
    }

    /// Map an optional mode to its API `agent_type`.
    #[must_use]
    pub const fn api_name_for(mode: Option<Self>) -> &'static str {
        match mode {
            Some(mode) => mode.api_name(),
            None => DEFAULT_API_AGENT,
        }
    }
}

impl fmt::Display for AgentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown agent mode.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AgentModeParseError(pub String);

impl fmt::Display for AgentModeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown agent mode: {}", self.0)
    }
}

impl std::error::Error for AgentModeParseError {}

impl FromStr for AgentMode {
    type Err = AgentModeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "jira" => Ok(Self::Jira),
            "cr" => Ok(Self::Cr),
            "policy" => Ok(Self::Policy),
            "person" => Ok(Self::Person),
            _ => Err(AgentModeParseError(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_mapping() {
        assert_eq!(AgentMode::Jira.api_name(), "summary");
        assert_eq!(AgentMode::Cr.api_name(), "br_cr");
        assert_eq!(AgentMode::Policy.api_name(), "policy");
        assert_eq!(AgentMode::Person.api_name(), "owner");
        assert_eq!(AgentMode::api_name_for(None), "default");
    }

    #[test]
    fn test_parse_modes() {
        for mode in AgentMode::ALL {
            assert_eq!(mode.as_str().parse::<AgentMode>(), Ok(mode));
        }
        assert!("summary".parse::<AgentMode>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Some(AgentMode::Cr)).unwrap();
        assert_eq!(json, "\"cr\"");
        let none: Option<AgentMode> = serde_json::from_str("null").unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_every_mode_has_announcement() {
        for mode in AgentMode::ALL {
            assert!(!mode.announcement().is_empty());
        }
    }
}

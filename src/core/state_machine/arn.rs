//! ARN validation and resource identifier classification.

use regex::Regex;
use std::sync::OnceLock;

const PARTITION_REGION_ACCOUNT: &str = r"arn:aws[a-z-]*:(?:states|lambda):[a-z0-9-]+:\d{12}";
const NAME: &str = r"[A-Za-z0-9_.-]{1,80}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArnKind {
    Activity,
    Function,
    StateMachine,
    Execution,
}

impl ArnKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "activity" => Some(ArnKind::Activity),
            "function" => Some(ArnKind::Function),
            "stateMachine" => Some(ArnKind::StateMachine),
            "execution" => Some(ArnKind::Execution),
            _ => None,
        }
    }

    fn pattern(&self) -> Option<&'static Regex> {
        static ACTIVITY: OnceLock<Option<Regex>> = OnceLock::new();
        static FUNCTION: OnceLock<Option<Regex>> = OnceLock::new();
        static STATE_MACHINE: OnceLock<Option<Regex>> = OnceLock::new();
        static EXECUTION: OnceLock<Option<Regex>> = OnceLock::new();

        let (slot, resource) = match self {
            ArnKind::Activity => (&ACTIVITY, format!("activity:{NAME}")),
            ArnKind::Function => (
                &FUNCTION,
                r"function:[A-Za-z0-9_-]{1,64}(?::(?:\$LATEST|[A-Za-z0-9_-]{1,128}))?".to_string(),
            ),
            ArnKind::StateMachine => (&STATE_MACHINE, format!("stateMachine:{NAME}")),
            ArnKind::Execution => (&EXECUTION, format!("execution:{NAME}:{NAME}")),
        };
        slot.get_or_init(|| Regex::new(&format!("^{PARTITION_REGION_ACCOUNT}:{resource}$")).ok())
            .as_ref()
    }
}

/// Whether `arn` is a well-formed ARN of the given kind.
pub fn is_valid_arn(arn: &str, kind: ArnKind) -> bool {
    kind.pattern().is_some_and(|pattern| pattern.is_match(arn))
}

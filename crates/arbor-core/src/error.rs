use std::fmt;

use crate::host::HostError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    Host(HostError),
    InvalidElement { kind: String, reason: &'static str },
    MissingRenderProp { component: String },
    ProviderChildren { count: usize },
    NotMounted { component: String },
    ReentrantDispatch { event_type: String },
    RuntimeDropped,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Host(err) => write!(f, "host tree error: {err}"),
            RenderError::InvalidElement { kind, reason } => {
                write!(f, "invalid element {kind:?}: {reason}")
            }
            RenderError::MissingRenderProp { component } => {
                write!(f, "{component} expects a render function as its only child")
            }
            RenderError::ProviderChildren { count } => {
                write!(f, "provider expects exactly one child, got {count}")
            }
            RenderError::NotMounted { component } => {
                write!(f, "{component} has no mounted host node")
            }
            RenderError::ReentrantDispatch { event_type } => {
                write!(f, "dispatch of {event_type:?} while another event is dispatching")
            }
            RenderError::RuntimeDropped => f.write_str("runtime was dropped"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Host(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HostError> for RenderError {
    fn from(err: HostError) -> Self {
        RenderError::Host(err)
    }
}

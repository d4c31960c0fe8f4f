//! Node identity: an action paired with its reduced context.

use mdl_core::Context;

/// Identifies one graph node: an action name plus the (already reduced)
/// context it runs under.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey {
    pub action: String,
    pub context: Context,
}

impl NodeKey {
    pub fn new(action: impl Into<String>, context: Context) -> Self {
        Self {
            action: action.into(),
            context,
        }
    }

    /// Directory-safe run-store identifier: the action name alone when the
    /// context is global, `action@hash` otherwise.
    pub fn id(&self) -> String {
        if self.context.is_empty() {
            self.action.clone()
        } else {
            format!("{}@{}", self.action, self.context.stable_id())
        }
    }

    /// Human-readable label for plan display and error messages.
    pub fn label(&self) -> String {
        if self.context.is_empty() {
            self.action.clone()
        } else {
            format!("{} ({})", self.action, self.context.label())
        }
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DestinationOperation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            OperationKind::Create => "+",
            OperationKind::Update => "~",
            OperationKind::Delete => "-",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl From<OperationKind> for DestinationOperation {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Create => DestinationOperation::Create,
            OperationKind::Update => DestinationOperation::Update,
            OperationKind::Delete => DestinationOperation::Delete,
        }
    }
}

use super::Path;

/// Scalar carried by an update.
///
/// Accessors follow gNMI getter semantics: asking for the wrong kind
/// yields the zero value instead of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    String(String),
    Bool(bool),
    Int(i64),
    Uint(u64),
}

impl TypedValue {
    pub fn as_str(&self) -> &str {
        match self {
            TypedValue::String(s) => s,
            _ => "",
        }
    }

    pub fn as_bool(&self) -> bool {
        matches!(self, TypedValue::Bool(true))
    }

    pub fn as_int(&self) -> i64 {
        match self {
            TypedValue::Int(v) => *v,
            TypedValue::Uint(v) => i64::try_from(*v).unwrap_or(i64::MAX),
            _ => 0,
        }
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        TypedValue::String(v.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        TypedValue::String(v)
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        TypedValue::Bool(v)
    }
}

impl From<i64> for TypedValue {
    fn from(v: i64) -> Self {
        TypedValue::Int(v)
    }
}

impl From<u64> for TypedValue {
    fn from(v: u64) -> Self {
        TypedValue::Uint(v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub path: Path,
    pub val: TypedValue,
}

impl Update {
    pub fn new(
        path: impl Into<Path>,
        val: impl Into<TypedValue>,
    ) -> Self {
        Self {
            path: path.into(),
            val: val.into(),
        }
    }
}

/// A batch of changes under a common prefix, as delivered by a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Notification {
    pub prefix: Path,
    pub updates: Vec<Update>,
    pub deletes: Vec<Path>,
}

impl Notification {
    pub fn new(prefix: Path) -> Self {
        Self {
            prefix,
            ..Default::default()
        }
    }

    pub fn update(
        mut self,
        path: impl Into<Path>,
        val: impl Into<TypedValue>,
    ) -> Self {
        self.updates.push(Update::new(path, val));
        self
    }

    pub fn delete(
        mut self,
        path: impl Into<Path>,
    ) -> Self {
        self.deletes.push(path.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeResponse {
    Update(Notification),
    /// All historical data for the subscription has been delivered.
    SyncResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeMode {
    /// Deliver current state, the sync marker, then close.
    Once,
    /// Deliver current state, the sync marker, then stream changes until cancelled.
    Stream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    pub path: Path,
    pub mode: SubscribeMode,
}

/// Replacement and deletion of paths under a common prefix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetRequest {
    pub prefix: Path,
    pub updates: Vec<Update>,
    pub deletes: Vec<Path>,
}

impl SetRequest {
    pub fn new(prefix: Path) -> Self {
        Self {
            prefix,
            ..Default::default()
        }
    }

    pub fn update(
        mut self,
        path: impl Into<Path>,
        val: impl Into<TypedValue>,
    ) -> Self {
        self.updates.push(Update::new(path, val));
        self
    }

    pub fn delete(
        mut self,
        path: impl Into<Path>,
    ) -> Self {
        self.deletes.push(path.into());
        self
    }
}

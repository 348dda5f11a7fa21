use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, U256};

/// One argument of a read call.
///
/// Arguments compare structurally: `Uint(5)` and `Str("5")` are different
/// arguments and produce different keys. Normalizing loosely typed input is
/// the caller's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallArg {
    Address(Address),
    Uint(U256),
    Bool(bool),
    Str(String),
    List(Vec<CallArg>),
}

impl fmt::Display for CallArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(a) => write!(f, "{a}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<Address> for CallArg {
    fn from(a: Address) -> Self {
        Self::Address(a)
    }
}

impl From<U256> for CallArg {
    fn from(v: U256) -> Self {
        Self::Uint(v)
    }
}

impl From<u64> for CallArg {
    fn from(v: u64) -> Self {
        Self::Uint(U256::from(v))
    }
}

impl From<bool> for CallArg {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for CallArg {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

/// What to read: a method on a target, with its arguments in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallDescriptor {
    pub target: String,
    pub method: String,
    pub args: Vec<CallArg>,
}

impl CallDescriptor {
    pub fn new(target: impl Into<String>, method: impl Into<String>, args: Vec<CallArg>) -> Self {
        Self {
            target: target.into(),
            method: method.into(),
            args,
        }
    }

    pub fn key(&self) -> CacheKey {
        derive(self.target.clone(), self.method.clone(), self.args.clone())
    }
}

impl fmt::Display for CallDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.target, self.method)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

/// Identity of a cached read. Equal calls give equal keys no matter which
/// instances the arguments came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Arc<CallDescriptor>);

impl CacheKey {
    pub fn call(&self) -> &CallDescriptor {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Derives the cache key for `target.method(args)`.
///
/// Argument order is significant. An empty target or method is a caller bug
/// and panics in debug builds.
pub fn derive(target: impl Into<String>, method: impl Into<String>, args: Vec<CallArg>) -> CacheKey {
    let target = target.into();
    let method = method.into();
    debug_assert!(!target.is_empty(), "call target must not be empty");
    debug_assert!(!method.is_empty(), "call method must not be empty");
    CacheKey(Arc::new(CallDescriptor {
        target,
        method,
        args,
    }))
}

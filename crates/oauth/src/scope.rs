//! Permissions requested during authorization.
//!
//! Every scope must also be enabled in the application settings at
//! `https://oauth.yandex.com/`.

use serde::{Deserialize, Serialize};

/// A permission token.
///
/// The four scopes the Disk API knows about are named variants. Anything
/// else is kept as a [`CustomScope`]; use [`AuthScope::of`] so that a known
/// token always maps onto its named variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthScope {
    /// Access information about Yandex Disk
    Info,
    /// Read all of Yandex Disk
    Read,
    /// Write anywhere on Yandex Disk
    Write,
    /// Access the app folder on Yandex Disk
    AppFolder,
    Custom(CustomScope),
}

/// Scope token outside the named set. Only constructed through
/// [`AuthScope::of`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomScope(String);

impl CustomScope {
    #[must_use]
    pub fn token(&self) -> &str {
        &self.0
    }
}

const NAMED: [AuthScope; 4] = [
    AuthScope::Info,
    AuthScope::Read,
    AuthScope::Write,
    AuthScope::AppFolder,
];

impl AuthScope {
    /// Wrap `token`, returning the named variant when the token is known.
    pub fn of(token: impl Into<String>) -> Self {
        let token = token.into();
        match NAMED.iter().find(|named| named.token() == token) {
            Some(named) => named.clone(),
            None => Self::Custom(CustomScope(token)),
        }
    }

    /// All named scopes, in declaration order.
    #[must_use]
    pub fn values() -> [Self; 4] {
        NAMED
    }

    #[must_use]
    pub fn token(&self) -> &str {
        match self {
            Self::Info => "cloud_api:disk.info",
            Self::Read => "cloud_api:disk.read",
            Self::Write => "cloud_api:disk.write",
            Self::AppFolder => "cloud_api:disk.app_folder",
            Self::Custom(custom) => custom.token(),
        }
    }

    #[must_use]
    pub fn is_named(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }

    fn bit(&self) -> Option<u8> {
        NAMED
            .iter()
            .position(|named| named == self)
            .map(|index| 1 << index)
    }
}

impl std::fmt::Display for AuthScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

impl std::str::FromStr for AuthScope {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::of(value))
    }
}

impl From<String> for AuthScope {
    fn from(token: String) -> Self {
        Self::of(token)
    }
}

impl From<AuthScope> for String {
    fn from(scope: AuthScope) -> Self {
        match scope {
            AuthScope::Custom(CustomScope(token)) => token,
            named => named.token().to_owned(),
        }
    }
}

/// Set of [`AuthScope`]s.
///
/// Holds a bitmask while only named scopes are present and switches to an
/// insertion-ordered token list once a custom scope is added.
#[derive(Debug, Clone)]
pub struct AuthScopeSet {
    repr: Repr,
}

#[derive(Debug, Clone)]
enum Repr {
    Named(u8),
    Custom(Vec<String>),
}

impl Default for AuthScopeSet {
    fn default() -> Self {
        Self {
            repr: Repr::Named(0),
        }
    }
}

impl AuthScopeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the scope was not present yet.
    pub fn insert(&mut self, scope: AuthScope) -> bool {
        match &mut self.repr {
            Repr::Named(bits) => match scope.bit() {
                Some(bit) => {
                    let added = *bits & bit == 0;
                    *bits |= bit;
                    added
                },
                None => {
                    let mut tokens: Vec<String> = NAMED
                        .iter()
                        .filter(|named| named.bit().is_some_and(|b| *bits & b != 0))
                        .map(|named| named.token().to_owned())
                        .collect();
                    tokens.push(scope.into());
                    self.repr = Repr::Custom(tokens);
                    true
                },
            },
            Repr::Custom(tokens) => {
                if tokens.iter().any(|t| t == scope.token()) {
                    return false;
                }
                tokens.push(scope.into());
                true
            },
        }
    }

    /// Returns `true` when the scope was present.
    pub fn remove(&mut self, scope: &AuthScope) -> bool {
        match &mut self.repr {
            Repr::Named(bits) => match scope.bit() {
                Some(bit) => {
                    let present = *bits & bit != 0;
                    *bits &= !bit;
                    present
                },
                None => false,
            },
            Repr::Custom(tokens) => match tokens.iter().position(|t| t == scope.token()) {
                Some(index) => {
                    tokens.remove(index);
                    true
                },
                None => false,
            },
        }
    }

    #[must_use]
    pub fn contains(&self, scope: &AuthScope) -> bool {
        match &self.repr {
            Repr::Named(bits) => scope.bit().is_some_and(|bit| bits & bit != 0),
            Repr::Custom(tokens) => tokens.iter().any(|t| t == scope.token()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Named(bits) => bits.count_ones() as usize,
            Repr::Custom(tokens) => tokens.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.repr = Repr::Named(0);
    }

    pub fn iter(&self) -> Iter<'_> {
        match &self.repr {
            Repr::Named(bits) => Iter(IterInner::Named {
                bits: *bits,
                index: 0,
            }),
            Repr::Custom(tokens) => Iter(IterInner::Custom(tokens.iter())),
        }
    }

    /// Value of the `scope` parameter: tokens separated by single spaces.
    #[must_use]
    pub fn to_param(&self) -> String {
        self.iter()
            .map(String::from)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parse a space separated `scope` value as returned by the token endpoint.
    #[must_use]
    pub fn from_param(param: &str) -> Self {
        param.split_whitespace().map(AuthScope::of).collect()
    }
}

impl PartialEq for AuthScopeSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|scope| other.contains(&scope))
    }
}

impl Eq for AuthScopeSet {}

impl FromIterator<AuthScope> for AuthScopeSet {
    fn from_iter<I: IntoIterator<Item = AuthScope>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl Extend<AuthScope> for AuthScopeSet {
    fn extend<I: IntoIterator<Item = AuthScope>>(&mut self, iter: I) {
        for scope in iter {
            self.insert(scope);
        }
    }
}

impl<'a> IntoIterator for &'a AuthScopeSet {
    type IntoIter = Iter<'a>;
    type Item = AuthScope;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over an [`AuthScopeSet`]. Named scopes come out in declaration
/// order, custom sets in insertion order.
pub struct Iter<'a>(IterInner<'a>);

enum IterInner<'a> {
    Named { bits: u8, index: usize },
    Custom(std::slice::Iter<'a, String>),
}

impl Iterator for Iter<'_> {
    type Item = AuthScope;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.0 {
            IterInner::Named { bits, index } => {
                while *index < NAMED.len() {
                    let current = *index;
                    *index += 1;
                    if *bits & (1 << current) != 0 {
                        return Some(NAMED[current].clone());
                    }
                }
                None
            },
            IterInner::Custom(tokens) => tokens.next().map(|token| AuthScope::of(token.as_str())),
        }
    }
}

//! Canonical store keys.
//!
//! Every entity maps to one key string. Components are percent-encoded so
//! that the separators used here (`:` between components, `=` and `,` inside
//! label sets) can never appear inside a component, which keeps key
//! construction injective for arbitrary project, ref and label values.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::fmt;

const COMPONENT: &AsciiSet = &CONTROLS.add(b'%').add(b':').add(b'=').add(b',');

/// Percent-encode a single key component.
pub(crate) fn encode_component(component: &str) -> String {
    utf8_percent_encode(component, COMPONENT).to_string()
}

/// Join already meaningful components into a key, encoding each one.
pub(crate) fn join_components<'a>(components: impl IntoIterator<Item = &'a str>) -> String {
    components
        .into_iter()
        .map(encode_component)
        .collect::<Vec<_>>()
        .join(":")
}

macro_rules! entity_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a key previously produced by an entity (e.g. read back from a store).
            pub fn from_raw(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Get the key string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

entity_key!(
    /// Key of a [`crate::Project`], derived from its full path.
    ProjectKey
);
entity_key!(
    /// Key of a [`crate::Environment`], derived from (project, name).
    EnvironmentKey
);
entity_key!(
    /// Key of a [`crate::Ref`], derived from (project, kind, name).
    RefKey
);
entity_key!(
    /// Key of a [`crate::Metric`], derived from (kind, labels).
    MetricKey
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_are_escaped() {
        assert_eq!(encode_component("a:b"), "a%3Ab");
        assert_eq!(encode_component("50%"), "50%25");
        assert_eq!(encode_component("k=v,w"), "k%3Dv%2Cw");
        assert_eq!(encode_component("group/sub/project"), "group/sub/project");
    }

    #[test]
    fn join_is_injective_across_separator_positions() {
        let a = join_components(["a:b", "c"]);
        let b = join_components(["a", "b:c"]);
        assert_ne!(a, b);
        assert_eq!(a, "a%3Ab:c");
        assert_eq!(b, "a:b%3Ac");
    }
}

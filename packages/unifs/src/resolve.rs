//! Overlaying configuration overrides onto an endpoint.

use std::fmt;

use unifs_core::{parse_query, Endpoint, Error};

/// Field overrides applied on top of a base endpoint. Empty means "keep".
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub username: String,
    pub password: String,
    pub path: String,
    /// Raw query string; replaces all extras when non-empty.
    pub extras: String,
}

impl Overrides {
    pub fn is_empty(&self) -> bool {
        self.username.is_empty()
            && self.password.is_empty()
            && self.path.is_empty()
            && self.extras.is_empty()
    }
}

impl fmt::Debug for Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() { "" } else { "***" };
        f.debug_struct("Overrides")
            .field("username", &self.username)
            .field("password", &password)
            .field("path", &self.path)
            .field("extras", &self.extras)
            .finish()
    }
}

/// Apply `overrides` to a copy of `endpoint`.
///
/// Each non-empty override replaces its field verbatim. A non-empty extras
/// override is parsed as a query string and replaces the whole extras map;
/// nothing is merged.
///
/// # Errors
///
/// [`Error::Config`] when the extras override is not a valid query string.
pub fn resolve(endpoint: &Endpoint, overrides: &Overrides) -> Result<Endpoint, Error> {
    let mut resolved = endpoint.clone();

    if !overrides.path.is_empty() {
        resolved.path = overrides.path.clone();
    }
    if !overrides.username.is_empty() {
        resolved.username = overrides.username.clone();
    }
    if !overrides.password.is_empty() {
        resolved.password = overrides.password.clone();
    }
    if !overrides.extras.is_empty() {
        resolved.extras = parse_query(&overrides.extras)?;
    }

    tracing::trace!(endpoint = %resolved, "resolved endpoint");
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Endpoint {
        "s3://user:pass@host:9000/bucket/a?c=3".parse().unwrap()
    }

    #[test]
    fn empty_overrides_are_identity() {
        assert!(Overrides::default().is_empty());
        assert_eq!(resolve(&base(), &Overrides::default()).unwrap(), base());
        assert_eq!(
            resolve(&Endpoint::default(), &Overrides::default()).unwrap(),
            Endpoint::default()
        );
    }

    #[test]
    fn each_field_replaced_alone() {
        let e = base();

        let r = resolve(&e, &Overrides { path: "/p".into(), ..Default::default() }).unwrap();
        assert_eq!(r, Endpoint { path: "/p".into(), ..e.clone() });

        let r = resolve(&e, &Overrides { username: "u2".into(), ..Default::default() }).unwrap();
        assert_eq!(r, Endpoint { username: "u2".into(), ..e.clone() });

        let r = resolve(&e, &Overrides { password: "p2".into(), ..Default::default() }).unwrap();
        assert_eq!(r, Endpoint { password: "p2".into(), ..e.clone() });
    }

    #[test]
    fn overrides_are_verbatim() {
        let r = resolve(
            &base(),
            &Overrides {
                path: "no/leading slash/..".into(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(r.path, "no/leading slash/..");
    }

    #[test]
    fn extras_replace_whole_map() {
        let r = resolve(&base(), &Overrides { extras: "a=1&b=2".into(), ..Default::default() })
            .unwrap();
        assert_eq!(r.extras.len(), 2);
        assert_eq!(r.extras["a"], vec!["1".to_string()]);
        assert_eq!(r.extras["b"], vec!["2".to_string()]);
        assert!(!r.extras.contains_key("c"));
    }

    #[test]
    fn bad_extras_fail_without_touching_input() {
        let e = base();
        let before = e.clone();
        let err = resolve(&e, &Overrides { extras: "a=%zz".into(), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert_eq!(e, before);
    }

    #[test]
    fn debug_masks_password() {
        let o = Overrides { password: "hunter2".into(), ..Default::default() };
        assert!(!format!("{:?}", o).contains("hunter2"));
    }
}

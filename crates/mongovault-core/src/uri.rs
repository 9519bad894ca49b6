//! Credential surgery on MongoDB connection strings.
//!
//! Only the userinfo part of the authority is touched; hosts, database, and
//! options are carried through byte for byte. Passwords are expected to be
//! percent-encoded, so the userinfo ends at the last `@` before the first `/`
//! or `?`.

use crate::error::{VaultError, VaultResult};

const SCHEMES: [&str; 2] = ["mongodb://", "mongodb+srv://"];

struct Authority<'a> {
    prefix: &'a str,
    user: Option<&'a str>,
    password: Option<&'a str>,
    rest: &'a str,
}

fn split(uri: &str) -> Option<Authority<'_>> {
    let scheme_end = uri.find("://")? + 3;
    let (prefix, rest) = uri.split_at(scheme_end);
    let host_end = rest.find(['/', '?']).unwrap_or(rest.len());

    let Some(at) = rest[..host_end].rfind('@') else {
        return Some(Authority {
            prefix,
            user: None,
            password: None,
            rest,
        });
    };

    let userinfo = &rest[..at];
    let (user, password) = match userinfo.split_once(':') {
        Some((user, password)) => (user, Some(password)),
        None => (userinfo, None),
    };
    Some(Authority {
        prefix,
        user: Some(user),
        password,
        rest: &rest[at + 1..],
    })
}

/// An `@` past the authority that can only be the end of credentials holding a
/// raw `/` or `?`: one in the database path, or one in an option name.
fn has_unescaped_userinfo(rest: &str) -> bool {
    let host_end = rest.find(['/', '?']).unwrap_or(rest.len());
    if rest[..host_end].contains('@') {
        return false;
    }
    let tail = &rest[host_end..];
    let (path, options) = tail.split_once('?').unwrap_or((tail, ""));
    path.contains('@')
        || options
            .split('&')
            .any(|option| option.split('=').next().is_some_and(|name| name.contains('@')))
}

/// Reject anything that is not a `mongodb://` or `mongodb+srv://` URI with a
/// host, or whose credentials carry an unescaped `/` or `?`.
pub fn validate(uri: &str) -> VaultResult<()> {
    let uri = uri.trim();
    if !SCHEMES.iter().any(|scheme| uri.starts_with(scheme)) {
        return Err(VaultError::validation(
            "connection URI must start with mongodb:// or mongodb+srv://",
        ));
    }
    let authority = split(uri).ok_or_else(|| VaultError::validation("malformed connection URI"))?;
    if has_unescaped_userinfo(&uri[authority.prefix.len()..]) {
        return Err(VaultError::validation(
            "connection URI credentials must be percent-encoded (found '@' after '/' or '?')",
        ));
    }
    let host_end = authority
        .rest
        .find(['/', '?'])
        .unwrap_or(authority.rest.len());
    if authority.rest[..host_end].trim().is_empty() {
        return Err(VaultError::validation("connection URI has no host"));
    }
    Ok(())
}

/// The embedded username, if any.
pub fn username(uri: &str) -> Option<&str> {
    split(uri)?.user.filter(|u| !u.is_empty())
}

/// The embedded password, if present and non-empty.
pub fn password(uri: &str) -> Option<&str> {
    split(uri)?.password.filter(|p| !p.is_empty())
}

/// Remove any embedded password, keeping the username.
pub fn strip_password(uri: &str) -> String {
    let Some(authority) = split(uri) else {
        return uri.to_string();
    };
    match authority.user {
        Some(user) if !user.is_empty() => {
            format!("{}{}@{}", authority.prefix, user, authority.rest)
        }
        Some(_) => format!("{}{}", authority.prefix, authority.rest),
        None => uri.to_string(),
    }
}

/// Put `password` into `uri`. A URI without a username is returned unchanged,
/// since a password alone has nowhere to go.
pub fn with_password(uri: &str, password: &str) -> String {
    match split(uri) {
        Some(Authority {
            prefix,
            user: Some(user),
            rest,
            ..
        }) if !user.is_empty() => format!("{prefix}{user}:{password}@{rest}"),
        _ => uri.to_string(),
    }
}

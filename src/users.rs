//! User and group records for the assembled image.
//!
//! A declared non-root user becomes `etc/passwd` and `etc/group` artifacts
//! so the runtime can resolve the user the manifest names.

use crate::artifact::{Artifact, Owner};

/// Declared non-root user for the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSpec {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: String,
    pub shell: String,
}

impl UserSpec {
    /// A service user with no login shell and `/` as home.
    pub fn new(name: impl Into<String>, uid: u32, gid: u32) -> Self {
        Self {
            name: name.into(),
            uid,
            gid,
            home: "/".to_string(),
            shell: "/sbin/nologin".to_string(),
        }
    }

    pub fn with_home(mut self, home: impl Into<String>) -> Self {
        self.home = home.into();
        self
    }
}

/// Expand a declared user into passwd and group record artifacts.
/// Root is always present so uid 0 remains resolvable.
pub fn user_record_artifacts(user: &UserSpec) -> Vec<Artifact> {
    let passwd = format!(
        "root:x:0:0:root:/root:/sbin/nologin\n{}:x:{}:{}:{}:{}:{}\n",
        user.name, user.uid, user.gid, user.name, user.home, user.shell
    );
    let group = format!("root:x:0:\n{}:x:{}:\n", user.name, user.gid);

    vec![
        Artifact::new("etc/passwd", passwd.into_bytes(), 0o644, Owner::ROOT),
        Artifact::new("etc/group", group.into_bytes(), 0o644, Owner::ROOT),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn passwd_record_format() {
        let artifacts = user_record_artifacts(&UserSpec::new("svc", 1000, 1000));
        let passwd = &artifacts[0];
        assert_eq!(passwd.dest(), Path::new("etc/passwd"));

        let content = String::from_utf8(passwd.content().to_vec()).unwrap();
        assert!(content.contains("root:x:0:0:"));
        assert!(content.contains("svc:x:1000:1000:svc:/:/sbin/nologin"));
    }

    #[test]
    fn group_record_format() {
        let artifacts = user_record_artifacts(&UserSpec::new("svc", 1000, 985));
        let group = &artifacts[1];
        assert_eq!(group.dest(), Path::new("etc/group"));

        let content = String::from_utf8(group.content().to_vec()).unwrap();
        assert!(content.contains("root:x:0:\n"));
        assert!(content.contains("svc:x:985:\n"));
    }

    #[test]
    fn custom_home_is_preserved() {
        let user = UserSpec::new("app", 2000, 2000).with_home("/srv/app");
        let artifacts = user_record_artifacts(&user);
        let content = String::from_utf8(artifacts[0].content().to_vec()).unwrap();
        assert!(content.contains(":/srv/app:"));
    }
}

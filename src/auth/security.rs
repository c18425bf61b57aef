use crate::error::{Error, Result};
use crate::repository::Repository;
use crate::types::{AccessTokenIdentity, Location, Permission, Visibility};

/// Evaluates repository visibility and token routes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityProvider;

impl SecurityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns true if the token may read a single file.
    #[must_use]
    pub fn can_access_resource(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &Repository,
        location: &Location,
    ) -> bool {
        match repository.visibility {
            Visibility::Public | Visibility::Hidden => true,
            Visibility::Private => has_permission(token, repository, location, Permission::READ),
        }
    }

    /// Returns true if the token may list a directory.
    #[must_use]
    pub fn can_browse_resource(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &Repository,
        location: &Location,
    ) -> bool {
        match repository.visibility {
            Visibility::Public => true,
            Visibility::Hidden | Visibility::Private => {
                has_permission(token, repository, location, Permission::READ)
            }
        }
    }

    /// Returns true if the token may write or delete.
    #[must_use]
    pub fn can_modify_resource(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &Repository,
        location: &Location,
    ) -> bool {
        has_permission(token, repository, location, Permission::WRITE)
    }

    /// Returns true if the repository shows up in top-level listings.
    #[must_use]
    pub fn can_access_repository(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &Repository,
    ) -> bool {
        if repository.visibility == Visibility::Public {
            return true;
        }

        let Some(token) = token else {
            return false;
        };

        if token.is_manager() {
            return true;
        }

        let repository_path = Location::root().route_path(&repository.name);
        token
            .routes
            .iter()
            .any(|route| route.covers(&repository_path) || route.is_within(&repository_path))
    }

    /// Like `can_access_resource`, returning unauthorized if not.
    pub fn require_access(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &Repository,
        location: &Location,
    ) -> Result<()> {
        if !self.can_access_resource(token, repository, location) {
            return Err(Error::unauthorized(format!(
                "Unauthorized access to {}",
                location.route_path(&repository.name)
            )));
        }
        Ok(())
    }

    /// Like `can_browse_resource`, returning unauthorized if not.
    pub fn require_browse(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &Repository,
        location: &Location,
    ) -> Result<()> {
        if !self.can_browse_resource(token, repository, location) {
            return Err(Error::unauthorized(format!(
                "Unauthorized directory listing of {}",
                location.route_path(&repository.name)
            )));
        }
        Ok(())
    }

    /// Like `can_modify_resource`, returning unauthorized if not.
    pub fn require_modify(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &Repository,
        location: &Location,
    ) -> Result<()> {
        if !self.can_modify_resource(token, repository, location) {
            return Err(Error::unauthorized(format!(
                "Write access to {} requires a token with a write route",
                location.route_path(&repository.name)
            )));
        }
        Ok(())
    }
}

fn has_permission(
    token: Option<&AccessTokenIdentity>,
    repository: &Repository,
    location: &Location,
    required: Permission,
) -> bool {
    let Some(token) = token else {
        return false;
    };

    token.is_manager()
        || token.has_route_permission(&location.route_path(&repository.name), required)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepositoryConfig;

    async fn repository(visibility: Visibility) -> (tempfile::TempDir, Repository) {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut config = RepositoryConfig::new("releases");
        config.visibility = visibility;
        let repository = Repository::open(&config, temp_dir.path()).await.unwrap();
        (temp_dir, repository)
    }

    fn loc(path: &str) -> Location {
        Location::parse(path).unwrap()
    }

    #[tokio::test]
    async fn test_public_repository() {
        let (_dir, repo) = repository(Visibility::Public).await;
        let security = SecurityProvider::new();
        let path = loc("com/example/lib.jar");

        assert!(security.can_access_resource(None, &repo, &path));
        assert!(security.can_browse_resource(None, &repo, &path));
        assert!(security.can_access_repository(None, &repo));
        assert!(!security.can_modify_resource(None, &repo, &path));
    }

    #[tokio::test]
    async fn test_hidden_repository() {
        let (_dir, repo) = repository(Visibility::Hidden).await;
        let security = SecurityProvider::new();
        let path = loc("com/example");
        let reader = AccessTokenIdentity::new("reader").with_route("/releases", Permission::READ);

        assert!(security.can_access_resource(None, &repo, &path));
        assert!(!security.can_browse_resource(None, &repo, &path));
        assert!(security.can_browse_resource(Some(&reader), &repo, &path));
        assert!(!security.can_access_repository(None, &repo));
        assert!(security.can_access_repository(Some(&reader), &repo));
    }

    #[tokio::test]
    async fn test_private_repository() {
        let (_dir, repo) = repository(Visibility::Private).await;
        let security = SecurityProvider::new();
        let path = loc("com/example/lib.jar");
        let reader =
            AccessTokenIdentity::new("reader").with_route("/RELEASES/com", Permission::READ);
        let other = AccessTokenIdentity::new("other").with_route("/releases/org", Permission::READ);
        let manager = AccessTokenIdentity::new("admin").with_permissions(Permission::MANAGER);

        assert!(!security.can_access_resource(None, &repo, &path));
        assert!(security.can_access_resource(Some(&reader), &repo, &path));
        assert!(!security.can_access_resource(Some(&other), &repo, &path));
        assert!(security.can_access_resource(Some(&manager), &repo, &path));
        assert!(security.can_browse_resource(Some(&reader), &repo, &path));
        assert!(security.can_access_repository(Some(&other), &repo));
        assert!(security.require_access(None, &repo, &path).is_err());

        let directory = loc("com/example");
        assert!(!security.can_browse_resource(None, &repo, &directory));
        assert!(!security.can_browse_resource(Some(&other), &repo, &directory));
        assert!(security.can_browse_resource(Some(&reader), &repo, &directory));
    }

    #[tokio::test]
    async fn test_routes_stop_at_repository_name() {
        let (_dir, repo) = repository(Visibility::Private).await;
        let security = SecurityProvider::new();
        let path = loc("com/example/lib.jar");
        let neighbour =
            AccessTokenIdentity::new("neighbour").with_route("/releases-private", Permission::READ);
        let everything = AccessTokenIdentity::new("root").with_route("/", Permission::READ);

        assert!(!security.can_access_resource(Some(&neighbour), &repo, &path));
        assert!(!security.can_access_repository(Some(&neighbour), &repo));
        assert!(security.can_access_resource(Some(&everything), &repo, &path));
        assert!(security.can_access_repository(Some(&everything), &repo));
    }

    #[tokio::test]
    async fn test_modify_requires_write_route() {
        let (_dir, repo) = repository(Visibility::Public).await;
        let security = SecurityProvider::new();
        let path = loc("com/example/lib.jar");
        let reader = AccessTokenIdentity::new("reader").with_route("/releases", Permission::READ);
        let writer = AccessTokenIdentity::new("writer").with_route("/releases/com", Permission::WRITE);
        let manager = AccessTokenIdentity::new("admin").with_permissions(Permission::MANAGER);

        assert!(!security.can_modify_resource(Some(&reader), &repo, &path));
        assert!(security.can_modify_resource(Some(&writer), &repo, &path));
        assert!(security.can_modify_resource(Some(&manager), &repo, &path));
        assert!(!security.can_modify_resource(Some(&writer), &repo, &loc("org/x")));
        assert!(matches!(
            security.require_modify(Some(&reader), &repo, &path),
            Err(Error::Unauthorized(_))
        ));
    }
}

use crate::{
    client::{DbClient, DbError, Result},
    store::NewUser,
};
use inkwell_common::model::{
    Id,
    auth::{AuthToken, Authentication, PasswordDigest},
    user::{CreateUser, Email, User, UserMarker},
};
use time::{OffsetDateTime, UtcDateTime};
use tracing::debug;

/// A user together with a freshly issued bearer token.
#[derive(Clone, Debug)]
pub struct SignedIn {
    pub token: AuthToken,
    pub user: User,
}

impl DbClient {
    pub async fn sign_up(&self, new_user: CreateUser) -> Result<SignedIn> {
        let password_digest = PasswordDigest::generate(new_user.password.get())?;
        let email = new_user.email.clone();

        let user = self
            .store
            .insert_user(NewUser {
                id: self.next_id()?,
                name: new_user.name,
                email: new_user.email,
                password_digest,
                created_at: OffsetDateTime::now_utc(),
            })
            .await?
            .ok_or(DbError::EmailTaken(email))?;
        debug!(user = %user.id, "Signed up user");

        let token = self.issue_token(user.id).await?;
        Ok(SignedIn { token, user })
    }

    pub async fn log_in(&self, email: &Email, password: &str) -> Result<SignedIn> {
        let credentials = self
            .store
            .fetch_credentials(email)
            .await?
            .ok_or(DbError::InvalidCredentials)?;

        if !credentials.password_digest.verify(password) {
            debug!(user = %credentials.user, "Rejected login with wrong password");
            return Err(DbError::InvalidCredentials);
        }

        let user = self
            .store
            .fetch_user(credentials.user)
            .await?
            .ok_or(DbError::UserNotFound(credentials.user))?;
        let token = self.issue_token(user.id).await?;

        Ok(SignedIn { token, user })
    }

    pub async fn issue_token(&self, user: Id<UserMarker>) -> Result<AuthToken> {
        let token = AuthToken::generate_random(user);
        let authentication = Authentication {
            user,
            token_hash: token.hash()?,
            created_at: UtcDateTime::now(),
            expires_after: self.config.token_lifetime,
        };
        self.store.insert_authentication(&authentication).await?;

        Ok(token)
    }

    /// Resolves a bearer token to the user it was issued to.
    pub async fn authenticate(&self, token: &AuthToken) -> Result<Id<UserMarker>> {
        self.authenticate_at(token, UtcDateTime::now()).await
    }

    async fn authenticate_at(&self, token: &AuthToken, now: UtcDateTime) -> Result<Id<UserMarker>> {
        let token_hash = token.hash()?;
        let authentication = self
            .store
            .fetch_authentication(&token_hash)
            .await?
            .ok_or(DbError::Unauthenticated)?;

        if authentication.user != token.user_id || authentication.is_expired_at(now) {
            return Err(DbError::Unauthenticated);
        }

        Ok(authentication.user)
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{DbClient, DbError, test_support::sign_up};
    use inkwell_common::model::{
        auth::AuthToken,
        user::{CreateUser, Email, Password, UserName},
    };
    use time::{Duration, UtcDateTime};

    #[tokio::test]
    async fn duplicate_emails_conflict() {
        let client = DbClient::in_memory();
        sign_up(&client, "ada").await;

        let again = client
            .sign_up(CreateUser {
                name: UserName::new("Another Ada").unwrap(),
                email: Email::new("ADA@example.org").unwrap(),
                password: Password::new("something else".into()).unwrap(),
            })
            .await;
        assert!(matches!(again, Err(DbError::EmailTaken(_))));
    }

    #[tokio::test]
    async fn login_checks_the_password() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;
        let email = Email::new("ada@example.org").unwrap();

        let signed_in = client.log_in(&email, "correct horse battery").await.unwrap();
        assert_eq!(signed_in.user.id, ada);
        assert_eq!(client.authenticate(&signed_in.token).await.unwrap(), ada);

        assert!(matches!(
            client.log_in(&email, "wrong horse battery").await,
            Err(DbError::InvalidCredentials)
        ));
        let unknown = Email::new("nobody@example.org").unwrap();
        assert!(matches!(
            client.log_in(&unknown, "correct horse battery").await,
            Err(DbError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn tampered_and_expired_tokens_are_rejected() {
        let client = DbClient::in_memory();
        let ada = sign_up(&client, "ada").await;
        let bob = sign_up(&client, "bob").await;
        let token = client.issue_token(ada).await.unwrap();

        let mut tampered = token.clone();
        tampered.core[0] ^= 0xFF;
        assert!(matches!(
            client.authenticate(&tampered).await,
            Err(DbError::Unauthenticated)
        ));

        let impersonating = AuthToken {
            user_id: bob,
            ..token.clone()
        };
        assert!(matches!(
            client.authenticate(&impersonating).await,
            Err(DbError::Unauthenticated)
        ));

        let later = UtcDateTime::now() + Duration::days(8);
        assert!(matches!(
            client.authenticate_at(&token, later).await,
            Err(DbError::Unauthenticated)
        ));
    }
}
